//! # Transaction Journal
//!
//! Append-only record of every committed balance change. The ledger
//! appends write-ahead, while the affected wallets are still locked and
//! before any balance moves, so a failed append commits nothing. On
//! restart, replaying the journal into a fresh ledger reproduces every
//! balance and the supply book exactly.
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "GFJL"]
//! [4 bytes: version]
//!
//! Record format:
//! [8 bytes: sequence number]
//! [4 bytes: payload length]
//! [N bytes: payload (tagged, little-endian fields)]
//! [4 bytes: CRC32 of the above]
//! ```
//!
//! A torn final record (crash mid-write) fails its CRC and replay stops
//! there; everything before it is intact.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use gatefall_core::{Amount, CurrencyCode, TransactionId, WalletId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

const JOURNAL_MAGIC: &[u8; 4] = b"GFJL";
const JOURNAL_VERSION: u32 = 1;

/// Why a mint happened; journaled so audits can attribute supply growth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MintReason {
    /// Gate clear reward.
    GateReward = 1,
    /// External deposit settled on-chain.
    Settlement = 2,
    /// Administrative grant.
    Admin = 3,
}

impl MintReason {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::GateReward),
            2 => Some(Self::Settlement),
            3 => Some(Self::Admin),
            _ => None,
        }
    }
}

/// One committed balance change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JournalRecord {
    /// Taxed player-to-player transfer. `gross = net + base_tax + guild_tax`.
    Transfer {
        /// Transaction id.
        tx: TransactionId,
        /// Debited wallet.
        from: WalletId,
        /// Credited wallet.
        to: WalletId,
        /// Currency moved.
        currency: CurrencyCode,
        /// Amount debited from `from`.
        gross: Amount,
        /// Base tax leg.
        base_tax: Amount,
        /// Guild tax leg (zero outside guild context).
        guild_tax: Amount,
    },
    /// Supply-increasing credit.
    Mint {
        /// Transaction id.
        tx: TransactionId,
        /// Credited wallet.
        to: WalletId,
        /// Currency minted.
        currency: CurrencyCode,
        /// Amount minted.
        amount: Amount,
        /// Attribution.
        reason: MintReason,
    },
    /// Supply-decreasing debit.
    Burn {
        /// Transaction id.
        tx: TransactionId,
        /// Debited wallet.
        from: WalletId,
        /// Currency burned.
        currency: CurrencyCode,
        /// Amount burned.
        amount: Amount,
    },
    /// Untaxed wallet-to-wallet move (stakes, payouts, penalties, repairs).
    Move {
        /// Transaction id.
        tx: TransactionId,
        /// Debited wallet.
        from: WalletId,
        /// Credited wallet.
        to: WalletId,
        /// Currency moved.
        currency: CurrencyCode,
        /// Amount moved.
        amount: Amount,
    },
    /// Hold transition on a wallet.
    HoldChange {
        /// Transaction id.
        tx: TransactionId,
        /// Affected wallet.
        wallet: WalletId,
        /// New hold, encoded as 0=none, 1=frozen, 2=shadow.
        hold: u8,
    },
}

impl JournalRecord {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        match self {
            Self::Transfer {
                tx,
                from,
                to,
                currency,
                gross,
                base_tax,
                guild_tax,
            } => {
                buf.push(1);
                buf.extend_from_slice(&tx.0.to_le_bytes());
                buf.extend_from_slice(&from.0.to_le_bytes());
                buf.extend_from_slice(&to.0.to_le_bytes());
                buf.extend_from_slice(&currency.raw());
                buf.extend_from_slice(&gross.raw().to_le_bytes());
                buf.extend_from_slice(&base_tax.raw().to_le_bytes());
                buf.extend_from_slice(&guild_tax.raw().to_le_bytes());
            }
            Self::Mint {
                tx,
                to,
                currency,
                amount,
                reason,
            } => {
                buf.push(2);
                buf.extend_from_slice(&tx.0.to_le_bytes());
                buf.extend_from_slice(&to.0.to_le_bytes());
                buf.extend_from_slice(&currency.raw());
                buf.extend_from_slice(&amount.raw().to_le_bytes());
                buf.push(*reason as u8);
            }
            Self::Burn {
                tx,
                from,
                currency,
                amount,
            } => {
                buf.push(3);
                buf.extend_from_slice(&tx.0.to_le_bytes());
                buf.extend_from_slice(&from.0.to_le_bytes());
                buf.extend_from_slice(&currency.raw());
                buf.extend_from_slice(&amount.raw().to_le_bytes());
            }
            Self::Move {
                tx,
                from,
                to,
                currency,
                amount,
            } => {
                buf.push(4);
                buf.extend_from_slice(&tx.0.to_le_bytes());
                buf.extend_from_slice(&from.0.to_le_bytes());
                buf.extend_from_slice(&to.0.to_le_bytes());
                buf.extend_from_slice(&currency.raw());
                buf.extend_from_slice(&amount.raw().to_le_bytes());
            }
            Self::HoldChange { tx, wallet, hold } => {
                buf.push(5);
                buf.extend_from_slice(&tx.0.to_le_bytes());
                buf.extend_from_slice(&wallet.0.to_le_bytes());
                buf.push(*hold);
            }
        }
        buf
    }

    fn deserialize(data: &[u8]) -> Option<Self> {
        let (&tag, rest) = data.split_first()?;
        let u64_at = |off: usize| -> Option<u64> {
            Some(u64::from_le_bytes(rest.get(off..off + 8)?.try_into().ok()?))
        };
        let code_at = |off: usize| -> Option<CurrencyCode> {
            let raw: [u8; 8] = rest.get(off..off + 8)?.try_into().ok()?;
            Some(CurrencyCode::from_raw(raw))
        };
        match tag {
            1 if rest.len() >= 56 => Some(Self::Transfer {
                tx: TransactionId(u64_at(0)?),
                from: WalletId(u64_at(8)?),
                to: WalletId(u64_at(16)?),
                currency: code_at(24)?,
                gross: Amount::from_raw(u64_at(32)?),
                base_tax: Amount::from_raw(u64_at(40)?),
                guild_tax: Amount::from_raw(u64_at(48)?),
            }),
            2 if rest.len() >= 33 => Some(Self::Mint {
                tx: TransactionId(u64_at(0)?),
                to: WalletId(u64_at(8)?),
                currency: code_at(16)?,
                amount: Amount::from_raw(u64_at(24)?),
                reason: MintReason::from_u8(*rest.get(32)?)?,
            }),
            3 if rest.len() >= 32 => Some(Self::Burn {
                tx: TransactionId(u64_at(0)?),
                from: WalletId(u64_at(8)?),
                currency: code_at(16)?,
                amount: Amount::from_raw(u64_at(24)?),
            }),
            4 if rest.len() >= 40 => Some(Self::Move {
                tx: TransactionId(u64_at(0)?),
                from: WalletId(u64_at(8)?),
                to: WalletId(u64_at(16)?),
                currency: code_at(24)?,
                amount: Amount::from_raw(u64_at(32)?),
            }),
            5 if rest.len() >= 17 => Some(Self::HoldChange {
                tx: TransactionId(u64_at(0)?),
                wallet: WalletId(u64_at(8)?),
                hold: *rest.get(16)?,
            }),
            _ => None,
        }
    }
}

/// Append-only journal file.
pub struct Journal {
    sequence: AtomicU64,
    file: Mutex<BufWriter<File>>,
    /// Test-only fault injection: a set flag makes every append report
    /// an I/O failure, for exercising the write-ahead commit paths.
    #[cfg(test)]
    pub(crate) fail_appends: std::sync::atomic::AtomicBool,
}

impl Journal {
    /// Opens (or creates) a journal and returns it along with every
    /// intact record already on disk, in commit order.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Journal`] on I/O failure or a bad header.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<(Self, Vec<JournalRecord>)> {
        let path = path.as_ref();
        let (records, valid_len) = if path.exists() {
            Self::replay(path)?
        } else {
            (Vec::new(), 0)
        };

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| LedgerError::Journal(format!("open {}: {e}", path.display())))?;
        // Drop any torn tail so new frames start on a clean boundary.
        if valid_len > 0 {
            file.set_len(valid_len)
                .map_err(|e| LedgerError::Journal(format!("truncate: {e}")))?;
        }
        file.metadata()
            .and_then(|m| {
                use std::io::{Seek, SeekFrom};
                let mut f = &file;
                f.seek(SeekFrom::Start(m.len())).map(|_| ())
            })
            .map_err(|e| LedgerError::Journal(format!("seek: {e}")))?;
        let mut writer = BufWriter::new(file);

        if valid_len == 0 {
            writer
                .write_all(JOURNAL_MAGIC)
                .and_then(|()| writer.write_all(&JOURNAL_VERSION.to_le_bytes()))
                .and_then(|()| writer.flush())
                .map_err(|e| LedgerError::Journal(format!("write header: {e}")))?;
        }

        Ok((
            Self {
                sequence: AtomicU64::new(records.len() as u64),
                file: Mutex::new(writer),
                #[cfg(test)]
                fail_appends: std::sync::atomic::AtomicBool::new(false),
            },
            records,
        ))
    }

    /// Appends one record and flushes it to the OS.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Journal`] on I/O failure.
    pub fn append(&self, record: &JournalRecord) -> LedgerResult<()> {
        #[cfg(test)]
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(LedgerError::Journal("append: injected fault".to_string()));
        }
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let payload = record.serialize();

        let mut frame = Vec::with_capacity(16 + payload.len());
        frame.extend_from_slice(&seq.to_le_bytes());
        #[allow(clippy::cast_possible_truncation)]
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        let crc = crc32fast::hash(&frame);

        let mut file = self.file.lock();
        file.write_all(&frame)
            .and_then(|()| file.write_all(&crc.to_le_bytes()))
            .and_then(|()| file.flush())
            .map_err(|e| LedgerError::Journal(format!("append: {e}")))
    }

    /// Forces the journal contents to stable storage.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Journal`] on I/O failure.
    pub fn sync(&self) -> LedgerResult<()> {
        let mut file = self.file.lock();
        file.flush()
            .and_then(|()| file.get_ref().sync_all())
            .map_err(|e| LedgerError::Journal(format!("sync: {e}")))
    }

    /// Scans the file, returning intact records and the byte length of
    /// the valid prefix (header included).
    fn replay(path: &Path) -> LedgerResult<(Vec<JournalRecord>, u64)> {
        let file =
            File::open(path).map_err(|e| LedgerError::Journal(format!("replay open: {e}")))?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        if reader.read_exact(&mut magic).is_err() {
            return Ok((Vec::new(), 0));
        }
        if &magic != JOURNAL_MAGIC {
            return Err(LedgerError::Journal("bad magic".to_string()));
        }
        let mut version = [0u8; 4];
        reader
            .read_exact(&mut version)
            .map_err(|e| LedgerError::Journal(format!("read version: {e}")))?;
        let version = u32::from_le_bytes(version);
        if version != JOURNAL_VERSION {
            return Err(LedgerError::Journal(format!("unsupported version {version}")));
        }

        let mut records = Vec::new();
        let mut valid_len: u64 = 8; // magic + version
        loop {
            let mut head = [0u8; 12];
            match reader.read_exact(&mut head) {
                Ok(()) => {}
                Err(_) => break, // clean EOF or torn header
            }
            let len = u32::from_le_bytes([head[8], head[9], head[10], head[11]]) as usize;
            if len > 1 << 20 {
                break; // implausible length, treat as torn tail
            }
            let mut payload = vec![0u8; len];
            if reader.read_exact(&mut payload).is_err() {
                break;
            }
            let mut crc_bytes = [0u8; 4];
            if reader.read_exact(&mut crc_bytes).is_err() {
                break;
            }
            let mut frame = Vec::with_capacity(12 + len);
            frame.extend_from_slice(&head);
            frame.extend_from_slice(&payload);
            if crc32fast::hash(&frame) != u32::from_le_bytes(crc_bytes) {
                break;
            }
            match JournalRecord::deserialize(&payload) {
                Some(record) => records.push(record),
                None => {
                    return Err(LedgerError::Journal(
                        "unrecognized record in intact frame".to_string(),
                    ))
                }
            }
            valid_len += 12 + len as u64 + 4;
        }
        Ok((records, valid_len))
    }
}

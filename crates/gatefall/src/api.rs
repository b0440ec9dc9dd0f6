//! Request and response shapes for the server handlers.
//!
//! The core defines no routes; the excluded web layer maps these onto
//! whatever transport it likes. Requests carry the caller-supplied
//! idempotency key wherever a retry must not double-apply.

use gatefall_core::{
    Amount, CurrencyCode, GateId, PlayerId, PoolId, SessionId, Tier, TransactionId, WalletId,
};
use gatefall_ledger::{MintReason, OpKey};
use serde::{Deserialize, Serialize};

/// Taxed wallet-to-wallet transfer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Source wallet.
    pub from: WalletId,
    /// Destination wallet.
    pub to: WalletId,
    /// Currency.
    pub currency: CurrencyCode,
    /// Gross amount debited from the source.
    pub amount: Amount,
    /// Caller idempotency key.
    pub idempotency_key: OpKey,
    /// Whether the additive guild tax leg applies.
    pub guild_context: bool,
}

/// Result of a committed transfer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TransferResponse {
    /// Committed transaction id.
    pub transaction_id: TransactionId,
    /// Amount the recipient received.
    pub net_amount: Amount,
    /// Total tax routed to the sinks.
    pub tax_amount: Amount,
}

/// Administrative supply issuance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MintRequest {
    /// Credited wallet.
    pub wallet: WalletId,
    /// Currency.
    pub currency: CurrencyCode,
    /// Amount minted into circulation.
    pub amount: Amount,
    /// Why the supply grew; recorded in the journal.
    pub reason: MintReason,
}

/// Administrative supply retirement.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BurnRequest {
    /// Debited wallet.
    pub wallet: WalletId,
    /// Currency.
    pub currency: CurrencyCode,
    /// Amount removed from circulation.
    pub amount: Amount,
}

/// A committed supply operation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TxResponse {
    /// Committed transaction id.
    pub transaction_id: TransactionId,
}

/// One gacha pull.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RollRequest {
    /// The rolling player.
    pub player: PlayerId,
    /// Wallet the stake is charged from.
    pub wallet: WalletId,
    /// Pool to roll against.
    pub pool: PoolId,
    /// Stake, in the pool's stake currency.
    pub stake: Amount,
    /// Caller idempotency key for the stake charge.
    pub idempotency_key: OpKey,
}

/// Result of a gacha pull.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RollResponse {
    /// Tier drawn.
    pub tier: Tier,
    /// Pity counter after this roll.
    pub pity_counter: u32,
    /// Whether the pity guarantee forced the result.
    pub pity_triggered: bool,
    /// The seed the draw derived from, for audit replay.
    pub seed: u64,
}

/// One coin flip.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FlipRequest {
    /// The betting player.
    pub player: PlayerId,
    /// Wallet staked from and paid into.
    pub wallet: WalletId,
    /// Stake, within the configured bet range.
    pub stake: Amount,
    /// Caller idempotency key covering the stake and any payout.
    pub idempotency_key: OpKey,
}

/// Result of a coin flip.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FlipResponse {
    /// Did the player win.
    pub won: bool,
    /// Amount paid out (zero on a loss).
    pub payout: Amount,
    /// The seed the draw derived from.
    pub seed: u64,
}

/// Gate entry for a party (or a solo hunter).
#[derive(Clone, Debug)]
pub struct EnterGateRequest {
    /// The gate.
    pub gate: GateId,
    /// Party members with their combat loadouts.
    pub entrants: Vec<gatefall_combat::EntrantSpec>,
}

/// Accepted gate entry.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EnterGateResponse {
    /// The live session.
    pub session_id: SessionId,
}

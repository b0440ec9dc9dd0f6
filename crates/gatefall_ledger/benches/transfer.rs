//! Benchmark for taxed transfer throughput.
//!
//! Run with: cargo bench --package gatefall_ledger --bench transfer

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gatefall_core::{Amount, CurrencyCode, GameConfig, PlayerId, WalletId};
use gatefall_ledger::{Ledger, MintReason, OpKey};

fn funded_ledger(wallets: u64) -> (Ledger, CurrencyCode) {
    let ledger = Ledger::new(GameConfig::stock());
    let crystal = CurrencyCode::new("CRYSTAL").unwrap();
    for i in 0..wallets {
        let id = WalletId(1_000 + i);
        ledger.create_wallet(id, PlayerId(i)).unwrap();
        ledger
            .mint(id, crystal, Amount::from_whole(10_000), MintReason::Admin)
            .unwrap();
    }
    (ledger, crystal)
}

fn benchmark_taxed_transfer(c: &mut Criterion) {
    let (ledger, crystal) = funded_ledger(64);

    // Small enough that tax drain never empties a wallet over a run.
    let gross = Amount::from_raw(1_000);

    c.bench_function("taxed_transfer_pair", |b| {
        let mut key = 0u128;
        let mut i = 0u64;
        b.iter(|| {
            key += 1;
            i = (i + 1) % 63;
            let from = WalletId(1_000 + i);
            let to = WalletId(1_001 + i);
            black_box(ledger.transfer(OpKey(key), from, to, crystal, gross, true))
        });
    });
}

fn benchmark_balance_lookup(c: &mut Criterion) {
    let (ledger, crystal) = funded_ledger(64);

    c.bench_function("balance_lookup", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i = (i + 1) % 64;
            black_box(ledger.balance(WalletId(1_000 + i), crystal))
        });
    });
}

criterion_group!(benches, benchmark_taxed_transfer, benchmark_balance_lookup);
criterion_main!(benches);

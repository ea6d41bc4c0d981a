//! # Keyserver Hot-Path Benchmarks
//!
//! | Path | Work per call |
//! |------|---------------|
//! | write validation | bincode decode + size check + digests |
//! | signature check | secp256k1 verify + address derivation |
//! | commit | one ledger critical section |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ks_01_commitment_ledger::{
    CommitmentLedgerApi, DemandTemplate, LedgerConfig, LedgerService, TokenIssuer,
};
use ks_03_metadata_store::decode_write;
use shared_crypto::{verify_auth_wrapper, Secp256k1KeyPair};
use shared_types::{AddressMetadata, AuthWrapper, CommitmentKey, Entry, MockTimeSource};
use std::sync::Arc;

fn metadata(entry_bytes: usize) -> AddressMetadata {
    AddressMetadata {
        timestamp: 1_000_000,
        ttl: 3600,
        entries: vec![Entry {
            headers: vec![],
            entry_data: vec![0xab; entry_bytes],
        }],
    }
}

fn bench_write_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("ks-03-write-validation");
    let keys = Secp256k1KeyPair::generate();

    for size in [64usize, 1024, 4096] {
        let raw = keys.sign_metadata(&metadata(size)).unwrap().encode().unwrap();
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::new("decode_write", size), &raw, |b, raw| {
            b.iter(|| black_box(decode_write(raw, 5 * 1024).is_ok()))
        });
    }
    group.finish();
}

fn bench_signature_check(c: &mut Criterion) {
    let keys = Secp256k1KeyPair::generate();
    let address = keys.address();
    let wrapper: AuthWrapper = keys.sign_metadata(&metadata(256)).unwrap();

    c.bench_function("shared-crypto/verify_auth_wrapper", |b| {
        b.iter(|| black_box(verify_auth_wrapper(&wrapper, &address).is_ok()))
    });
}

fn bench_commit(c: &mut Criterion) {
    let ledger = LedgerService::new(
        LedgerConfig::default(),
        DemandTemplate::default(),
        TokenIssuer::new([1; 32]),
        Arc::new(MockTimeSource::new(1_000_000)),
    );

    let mut group = c.benchmark_group("ks-01-commit");
    group.bench_function("repeat_same_key", |b| {
        let key = CommitmentKey::new([1; 32], [2; 32]);
        b.iter(|| black_box(ledger.commit(key, Some(512))))
    });

    let mut counter = 0u64;
    group.bench_function("fresh_keys", |b| {
        b.iter(|| {
            counter += 1;
            let mut digest = [0u8; 32];
            digest[..8].copy_from_slice(&counter.to_le_bytes());
            black_box(ledger.commit(CommitmentKey::new([3; 32], digest), Some(512)))
        })
    });
    group.finish();
}

criterion_group!(benches, bench_write_validation, bench_signature_check, bench_commit);
criterion_main!(benches);

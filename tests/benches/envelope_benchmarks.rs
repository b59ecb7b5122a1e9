//! # Envelope Benchmarks
//!
//! | Operation | Notes |
//! |-----------|-------|
//! | Key derivation | Secure (PBKDF2, default work factor) vs deprecated Fast |
//! | Encrypt | Full pipeline: derive, seal, sign |
//! | Decrypt | Full pipeline: negotiate, verify, derive, open, parse |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use payload_envelope::{
    derive_key, negotiate, Decryptor, Encryptor, KdfMode, MasterSecret, SessionToken,
    DEFAULT_REPLAY_WINDOW_MS,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn secret() -> Arc<MasterSecret> {
    Arc::new(MasterSecret::new(b"benchmark-master-secret-0123456789abcdef".to_vec()).unwrap())
}

fn bench_key_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("key-derivation");
    group.measurement_time(Duration::from_secs(10));
    let secret = secret();
    let session = SessionToken::new("sess_1");

    for (name, mode) in [("secure_default", KdfMode::default()), ("fast", KdfMode::Fast)] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(derive_key(&secret, &session, mode).unwrap()))
        });
    }

    group.finish();
}

fn bench_envelope_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");
    let secret = secret();
    // Fast mode isolates cipher and signature cost from the KDF.
    let mode = KdfMode::Fast;
    let encryptor = Encryptor::new(Arc::clone(&secret), mode);
    let decryptor = Decryptor::new(secret, mode, DEFAULT_REPLAY_WINDOW_MS);
    let session = SessionToken::new("sess_1");

    for size in [64usize, 1_024, 16_384] {
        let payload = json!({"blob": "x".repeat(size)});
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("encrypt", size), &payload, |b, payload| {
            b.iter(|| black_box(encryptor.encrypt(payload, &session).unwrap()))
        });

        let wire = serde_json::to_value(encryptor.encrypt(&payload, &session).unwrap().into_wire())
            .unwrap();
        group.bench_with_input(BenchmarkId::new("decrypt", size), &wire, |b, wire| {
            b.iter(|| {
                let format = negotiate(wire).unwrap();
                black_box(decryptor.decrypt(&format, &session).unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_key_derivation, bench_envelope_pipeline);
criterion_main!(benches);

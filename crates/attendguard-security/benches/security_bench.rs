// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for digesting, sealing, verification and payload
// encryption in the attendguard-security crate.

use std::sync::Arc;

use attendguard_bridge::memory::{FixedDeviceInfo, MemorySecretStorage};
use attendguard_core::SecurityConfig;
use attendguard_core::types::{AttendanceRecord, Location};
use attendguard_security::{IntegrityStack, PayloadCipher, canonical_digest};
use chrono::{NaiveDate, TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn stack() -> IntegrityStack {
    IntegrityStack::new(
        Arc::new(MemorySecretStorage::new()),
        Arc::new(FixedDeviceInfo::new("Pixel 8", Some("SN-BENCH"))),
        &SecurityConfig::default(),
    )
}

/// A completed working day with both locations and a break.
fn full_day() -> AttendanceRecord {
    let mut r = AttendanceRecord::new(
        "bench-user",
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date"),
    );
    r.check_in = Some(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
    r.check_out = Some(Utc.with_ymd_and_hms(2026, 3, 2, 17, 30, 0).unwrap());
    r.break_start = Some(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap());
    r.break_end = Some(Utc.with_ymd_and_hms(2026, 3, 2, 12, 30, 0).unwrap());
    r.check_in_location = Some(Location::new(52.52, 13.405, "Office"));
    r.check_out_location = Some(Location::new(52.52, 13.405, "Office"));
    r.total_break_secs = 1800;
    r.worked_secs = 8 * 3600;
    r.notes = "benchmark record".into();
    r
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Canonical digest of a fully populated record.
fn bench_canonical_digest(c: &mut Criterion) {
    let record = full_day();
    c.bench_function("canonical_digest", |b| {
        b.iter(|| black_box(canonical_digest(black_box(&record))));
    });
}

/// Full seal: digest, device identity (cached), payload JSON and AES-GCM.
fn bench_seal(c: &mut Criterion) {
    let stack = stack();
    let record = full_day();
    c.bench_function("seal", |b| {
        b.iter(|| black_box(stack.sealer.seal(black_box(&record)).expect("seal failed")));
    });
}

fn bench_verify(c: &mut Criterion) {
    let stack = stack();
    let sealed = stack
        .sealer
        .seal_record(full_day())
        .expect("seal failed");
    c.bench_function("verify", |b| {
        b.iter(|| black_box(stack.verifier.verify(black_box(&sealed))));
    });
}

/// AES-256-GCM encrypt-then-decrypt at payload sizes from a typical audit
/// payload up to 64 KiB.
fn bench_encrypt_decrypt_roundtrip(c: &mut Criterion) {
    let stack = stack();
    let cipher = PayloadCipher::new(stack.keys.clone());
    let sizes: &[(&str, usize)] = &[("256 B", 256), ("4 KiB", 4 * 1024), ("64 KiB", 64 * 1024)];

    let mut group = c.benchmark_group("encrypt_decrypt_roundtrip");
    for &(label, size) in sizes {
        let plaintext = vec![0x42u8; size];
        group.bench_function(label, |b| {
            b.iter(|| {
                let sealed = cipher.encrypt(black_box(&plaintext)).expect("encrypt failed");
                let opened = cipher.decrypt(&sealed).expect("decrypt failed");
                assert_eq!(opened.len(), plaintext.len());
                black_box(opened);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_canonical_digest,
    bench_seal,
    bench_verify,
    bench_encrypt_decrypt_roundtrip,
);
criterion_main!(benches);

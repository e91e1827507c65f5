// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Canonical record digest: SHA-256 over an explicitly enumerated, ordered
// field set.
//
// Encoding: a version tag, then for every field in `CANONICAL_FIELDS` order
// the field name and its value, each as a big-endian u32 length followed by
// the bytes.  Optional values carry a presence byte first.  Length prefixes
// make field boundaries unambiguous ("a"+"bc" never collides with "ab"+"c").
//
// Changing the field set or any value rendering invalidates every existing
// seal, so both are versioned together through `CANONICAL_VERSION`.

use attendguard_core::types::{AttendanceRecord, Location};
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Length of a rendered digest in hex characters.
pub const DIGEST_HEX_LEN: usize = 64;

/// Domain-separation tag mixed into every canonical digest.
pub const CANONICAL_VERSION: &str = "attendguard.record.v1";

/// The protected field set, in digest order.
///
/// Everything an audit dispute can hinge on is covered.  Excluded: the
/// security envelope itself and `updated_at`, which the record store may
/// touch on sync without a semantic change.
pub const CANONICAL_FIELDS: &[&str] = &[
    "id",
    "user_id",
    "date",
    "check_in",
    "check_out",
    "check_in_location",
    "check_out_location",
    "break_start",
    "break_end",
    "total_break_secs",
    "worked_secs",
    "status",
    "notes",
    "manual_entry",
    "approved_by",
    "created_at",
];

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Compute the canonical digest of `record`'s protected fields.
///
/// The security envelope is never read, so a sealed record and the same
/// record with its envelope blanked produce the same digest.
pub fn canonical_digest(record: &AttendanceRecord) -> String {
    let mut enc = CanonicalEncoder::new();

    enc.field("id", Some(record.id.to_string().as_bytes()));
    enc.field("user_id", Some(record.user_id.as_bytes()));
    enc.field("date", Some(record.date.format("%Y-%m-%d").to_string().as_bytes()));
    enc.timestamp("check_in", record.check_in.as_ref());
    enc.timestamp("check_out", record.check_out.as_ref());
    enc.location("check_in_location", record.check_in_location.as_ref());
    enc.location("check_out_location", record.check_out_location.as_ref());
    enc.timestamp("break_start", record.break_start.as_ref());
    enc.timestamp("break_end", record.break_end.as_ref());
    enc.field("total_break_secs", Some(record.total_break_secs.to_be_bytes().as_slice()));
    enc.field("worked_secs", Some(record.worked_secs.to_be_bytes().as_slice()));
    enc.field("status", Some(record.status.as_str().as_bytes()));
    enc.field("notes", Some(record.notes.as_bytes()));
    enc.field("manual_entry", Some([u8::from(record.manual_entry)].as_slice()));
    enc.field("approved_by", record.approved_by.as_deref().map(str::as_bytes));
    enc.timestamp("created_at", Some(&record.created_at));

    enc.finish()
}

/// Incremental length-prefixed encoder feeding SHA-256.
struct CanonicalEncoder {
    hasher: Sha256,
    #[cfg(debug_assertions)]
    seen: Vec<&'static str>,
}

impl CanonicalEncoder {
    fn new() -> Self {
        let mut enc = Self {
            hasher: Sha256::new(),
            #[cfg(debug_assertions)]
            seen: Vec::with_capacity(CANONICAL_FIELDS.len()),
        };
        enc.chunk(CANONICAL_VERSION.as_bytes());
        enc
    }

    fn chunk(&mut self, bytes: &[u8]) {
        let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
        self.hasher.update(len.to_be_bytes());
        self.hasher.update(bytes);
    }

    fn field(&mut self, name: &'static str, value: Option<&[u8]>) {
        #[cfg(debug_assertions)]
        self.seen.push(name);

        self.chunk(name.as_bytes());
        match value {
            Some(bytes) => {
                self.hasher.update([1u8]);
                self.chunk(bytes);
            }
            None => self.hasher.update([0u8]),
        }
    }

    fn timestamp(&mut self, name: &'static str, value: Option<&DateTime<Utc>>) {
        let rendered = value.map(|t| t.to_rfc3339_opts(SecondsFormat::Nanos, true));
        self.field(name, rendered.as_deref().map(str::as_bytes));
    }

    fn location(&mut self, name: &'static str, value: Option<&Location>) {
        let rendered = value.map(|loc| {
            // Bit patterns, so the digest is exact.  JSON stores must round-trip
            // floats exactly (serde_json `float_roundtrip`).
            let mut out = Vec::with_capacity(20 + loc.address.len() + 4);
            out.extend_from_slice(&loc.latitude.to_bits().to_be_bytes());
            out.extend_from_slice(&loc.longitude.to_bits().to_be_bytes());
            out.extend_from_slice(&loc.accuracy.to_bits().to_be_bytes());
            let addr_len = u32::try_from(loc.address.len()).unwrap_or(u32::MAX);
            out.extend_from_slice(&addr_len.to_be_bytes());
            out.extend_from_slice(loc.address.as_bytes());
            out
        });
        self.field(name, rendered.as_deref());
    }

    fn finish(self) -> String {
        #[cfg(debug_assertions)]
        debug_assert_eq!(self.seen, CANONICAL_FIELDS, "canonical field order drifted");

        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendguard_core::types::{AttendanceStatus, SecurityEnvelope};
    use chrono::{NaiveDate, TimeZone};

    /// SHA-256 of the empty byte slice (well-known constant).
    const EMPTY_SHA256: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn record() -> AttendanceRecord {
        let mut r = AttendanceRecord::new("u1", NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        r.check_in = Some(Utc.with_ymd_and_hms(2026, 3, 2, 8, 59, 0).unwrap());
        r.check_in_location = Some(Location::new(52.52, 13.405, "Office"));
        r.status = AttendanceStatus::Present;
        r
    }

    #[test]
    fn hash_empty_input() {
        assert_eq!(hash_bytes(b""), EMPTY_SHA256);
    }

    #[test]
    fn hash_known_value() {
        // SHA-256("hello"); verified against coreutils sha256sum.
        let expected = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert_eq!(hash_bytes(b"hello"), expected);
    }

    #[test]
    fn digest_is_deterministic_lowercase_hex() {
        let r = record();
        let d = canonical_digest(&r);
        assert_eq!(d, canonical_digest(&r.clone()));
        assert_eq!(d.len(), DIGEST_HEX_LEN);
        assert!(d.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn envelope_does_not_affect_digest() {
        let r = record();
        let sealed = r.clone().with_envelope(SecurityEnvelope {
            security_hash: "f".repeat(64),
            device_fingerprint: "e".repeat(64),
            encrypted_audit_payload: "AAAA".into(),
            tamper_detected: true,
        });
        assert_eq!(canonical_digest(&r), canonical_digest(&sealed));
    }

    #[test]
    fn updated_at_is_not_covered() {
        let r = record();
        let mut touched = r.clone();
        touched.updated_at = r.updated_at + chrono::Duration::hours(1);
        assert_eq!(canonical_digest(&r), canonical_digest(&touched));
    }

    #[test]
    fn every_protected_field_changes_the_digest() {
        let base = record();
        let d0 = canonical_digest(&base);

        let mutations: Vec<(&str, Box<dyn Fn(&mut AttendanceRecord)>)> = vec![
            ("user_id", Box::new(|r: &mut AttendanceRecord| r.user_id = "u2".into())),
            ("date", Box::new(|r: &mut AttendanceRecord| r.date = r.date.succ_opt().unwrap())),
            ("check_in", Box::new(|r: &mut AttendanceRecord| r.check_in = None)),
            ("check_out", Box::new(|r: &mut AttendanceRecord| r.check_out = r.check_in)),
            ("check_in_location", Box::new(|r: &mut AttendanceRecord| {
                r.check_in_location.as_mut().unwrap().address = "Home".into()
            })),
            ("latitude", Box::new(|r: &mut AttendanceRecord| {
                r.check_in_location.as_mut().unwrap().latitude += 0.0001
            })),
            ("check_out_location", Box::new(|r: &mut AttendanceRecord| {
                r.check_out_location = Some(Location::default())
            })),
            ("break_start", Box::new(|r: &mut AttendanceRecord| r.break_start = r.check_in)),
            ("break_end", Box::new(|r: &mut AttendanceRecord| r.break_end = r.check_in)),
            ("total_break_secs", Box::new(|r: &mut AttendanceRecord| r.total_break_secs = 1)),
            ("worked_secs", Box::new(|r: &mut AttendanceRecord| r.worked_secs = 28_800)),
            ("status", Box::new(|r: &mut AttendanceRecord| r.status = AttendanceStatus::Late)),
            ("notes", Box::new(|r: &mut AttendanceRecord| r.notes = "left early".into())),
            ("manual_entry", Box::new(|r: &mut AttendanceRecord| r.manual_entry = true)),
            ("approved_by", Box::new(|r: &mut AttendanceRecord| r.approved_by = Some("mgr".into()))),
            ("created_at", Box::new(|r: &mut AttendanceRecord| {
                r.created_at += chrono::Duration::seconds(1)
            })),
        ];

        for (name, mutate) in mutations {
            let mut r = base.clone();
            mutate(&mut r);
            assert_ne!(canonical_digest(&r), d0, "mutating {name} went undetected");
        }
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let mut a = record();
        a.user_id = "a".into();
        a.notes = "bc".into();
        let mut b = a.clone();
        b.user_id = "ab".into();
        b.notes = "c".into();
        assert_ne!(canonical_digest(&a), canonical_digest(&b));
    }

    #[test]
    fn absent_and_empty_optional_differ() {
        let mut a = record();
        a.approved_by = None;
        let mut b = a.clone();
        b.approved_by = Some(String::new());
        assert_ne!(canonical_digest(&a), canonical_digest(&b));
    }
}

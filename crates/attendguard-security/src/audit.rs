// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Security audit: runs the verifier over a set of records and tallies the
// outcomes into a `SecurityReport`.

use std::sync::Arc;

use attendguard_core::types::{AttendanceRecord, SecurityReport, VerificationOutcome};
use chrono::Utc;
use tracing::{info, instrument};

use crate::verifier::RecordVerifier;

/// Produces on-demand security reports.
pub struct SecurityAuditService {
    verifier: Arc<RecordVerifier>,
}

impl SecurityAuditService {
    pub fn new(verifier: Arc<RecordVerifier>) -> Self {
        Self { verifier }
    }

    /// Verify every record and summarise.  An empty input yields a report
    /// with every count at zero.
    #[instrument(skip_all)]
    pub fn audit<'a, I>(&self, records: I) -> SecurityReport
    where
        I: IntoIterator<Item = &'a AttendanceRecord>,
    {
        let mut report = SecurityReport {
            total_records: 0,
            valid_records: 0,
            unsealed_records: 0,
            tampered_records: 0,
            foreign_device_records: 0,
            flagged_record_ids: Vec::new(),
            device_fingerprint: self.verifier.current_device(),
            generated_at: Utc::now(),
        };

        for record in records {
            report.total_records += 1;
            match self.verifier.verify(record) {
                VerificationOutcome::Valid => report.valid_records += 1,
                VerificationOutcome::Unsealed => report.unsealed_records += 1,
                VerificationOutcome::TamperedHash => {
                    report.tampered_records += 1;
                    report.flagged_record_ids.push(record.id);
                }
                VerificationOutcome::ForeignDevice => {
                    report.foreign_device_records += 1;
                    report.flagged_record_ids.push(record.id);
                }
            }
        }

        info!(
            total = report.total_records,
            tampered = report.tampered_records,
            foreign = report.foreign_device_records,
            unsealed = report.unsealed_records,
            "security audit complete"
        );
        report
    }
}

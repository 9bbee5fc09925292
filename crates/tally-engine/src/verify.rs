// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Verification: aggregate checks, per-record tamper detection, sweeps.
//!
//! Two distinct questions are answered here. The aggregate check asks
//! whether the *stored* aggregate still matches the sum of *stored* record
//! checksums — it audits the bookkeeping. The record verifier asks whether
//! each record's *content* still matches its stored checksum — it is the
//! tamper detector. A tampered field trips the second without the first;
//! a lost aggregate trips the first without the second.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tally_core::{
    record_checksum, AuditEvent, AuditKind, AuditSink, Checksum, Clock, RecordId, RegistryStore,
    Storage, TableName, TableState, Timestamp,
};

use crate::{EngineError, IntegrityEngine};

/// Outcome of one aggregate verification.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AggregateCheck {
    /// Table verified.
    pub table: TableName,
    /// Whether the stored aggregate equals the recomputed one.
    pub integrity: bool,
    /// Aggregate on record, absent when the table was never reconciled.
    pub stored_sum: Option<i64>,
    /// Aggregate derived from the current stored record checksums.
    pub recomputed_sum: i64,
    /// When the stored aggregate was computed.
    pub computed_at: Option<Timestamp>,
    /// Table state after this verification's side effects.
    pub state: TableState,
    /// When this verification ran.
    pub checked_at: Timestamp,
}

impl AggregateCheck {
    /// Whether a repair is needed before this table can be trusted.
    #[must_use]
    pub fn requires_recalculation(&self) -> bool {
        !self.integrity || self.state.requires_recalculation()
    }

    /// Age of the stored aggregate at check time, when one exists.
    #[must_use]
    pub fn staleness_millis(&self) -> Option<i64> {
        self.computed_at
            .map(|computed| self.checked_at.saturating_millis_since(computed))
    }
}

/// One record's verification outcome.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct VerificationFinding {
    /// Record verified.
    pub record_id: RecordId,
    /// Checksum on record, absent for rows that predate tracking.
    pub stored: Option<Checksum>,
    /// Checksum recomputed from current content.
    pub recomputed: Checksum,
    /// Whether stored and recomputed disagree (an absent stored checksum
    /// counts as disagreement — the row is unprotected).
    pub mismatch: bool,
}

/// Full per-record verification of one table.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RecordVerification {
    /// Table verified.
    pub table: TableName,
    /// Records examined.
    pub total_records: usize,
    /// Records whose stored checksum disagreed with their content.
    pub mismatched: usize,
    /// One finding per record, in storage scan order.
    pub findings: Vec<VerificationFinding>,
    /// When this verification ran.
    pub checked_at: Timestamp,
}

impl RecordVerification {
    /// Whether every record verified clean.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.mismatched == 0
    }
}

/// One table's slot in a sweep: a check, or the error that prevented one.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SweepEntry {
    /// Table swept.
    pub table: TableName,
    /// The aggregate check, when verification ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<AggregateCheck>,
    /// The failure, when it did not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SweepEntry {
    /// Whether verification ran at all for this table.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.check.is_some()
    }
}

/// Outcome of verifying every tracked table.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SweepReport {
    /// One entry per tracked table, in catalog order.
    pub entries: Vec<SweepEntry>,
    /// When the sweep finished.
    pub checked_at: Timestamp,
}

impl SweepReport {
    /// Whether every table verified and came back with integrity intact.
    #[must_use]
    pub fn healthy(&self) -> bool {
        self.entries
            .iter()
            .all(|entry| entry.check.as_ref().is_some_and(|check| check.integrity))
    }
}

impl<S, R, A, C> IntegrityEngine<S, R, A, C>
where
    S: Storage,
    R: RegistryStore,
    A: AuditSink,
    C: Clock,
{
    /// Verify the stored aggregate of `table` against a fresh recomputation,
    /// without overwriting the stored sum.
    ///
    /// A mismatch against an existing row appends an `IntegrityViolation`
    /// audit entry; if the table believed itself `Reconciled`, it is marked
    /// `Corrupt` (a mismatch on a `Stale` table is already explained by the
    /// recorded maintenance failure).
    ///
    /// # Errors
    ///
    /// Propagates untracked-table, storage, and registry failures.
    pub fn verify_table(&self, table: &TableName) -> Result<AggregateCheck, EngineError> {
        self.verify_table_counted(table).map(|(check, _)| check)
    }

    pub(crate) fn verify_table_counted(
        &self,
        table: &TableName,
    ) -> Result<(AggregateCheck, usize), EngineError> {
        self.schema_for(table)?;
        let scan = self.scan_stored(table)?;
        let row = self.registry.load(table)?;
        let checked_at = self.clock.now();

        let (stored_sum, computed_at, mut state) = row.map_or(
            (None, None, TableState::Uninitialized),
            |row| (Some(row.aggregate_sum), Some(row.computed_at), row.state),
        );
        let integrity = stored_sum == Some(scan.stored_sum);

        if let (false, Some(stored)) = (integrity, stored_sum) {
            warn!(
                table = %table,
                stored,
                recomputed = scan.stored_sum,
                %state,
                "aggregate mismatch detected"
            );
            self.audit.append(AuditEvent::new(
                AuditKind::IntegrityViolation,
                table.clone(),
                format!(
                    "aggregate mismatch: stored {stored}, recomputed {}",
                    scan.stored_sum
                ),
                checked_at,
            ));
            if state == TableState::Reconciled {
                self.mark_degraded(table, TableState::Corrupt)?;
                state = TableState::Corrupt;
            }
        }

        let check = AggregateCheck {
            table: table.clone(),
            integrity,
            stored_sum,
            recomputed_sum: scan.stored_sum,
            computed_at,
            state,
            checked_at,
        };
        Ok((check, scan.record_count))
    }

    /// Recompute every record's checksum from current content and compare
    /// against what is stored. This is the tamper detector.
    ///
    /// Any mismatch appends one `IntegrityViolation` entry for the table
    /// (count and ids in the detail) and marks a `Reconciled` table
    /// `Corrupt`.
    ///
    /// # Errors
    ///
    /// Propagates untracked-table, storage, and registry failures.
    pub fn verify_records(&self, table: &TableName) -> Result<RecordVerification, EngineError> {
        let schema = self.schema_for(table)?;
        let records = self.storage.read(table)?;
        let checked_at = self.clock.now();

        let mut findings = Vec::with_capacity(records.len());
        let mut mismatched = 0usize;
        for record in &records {
            let recomputed = record_checksum(record, schema);
            let stored = record.stored_checksum();
            let mismatch = stored != Some(recomputed);
            if mismatch {
                mismatched += 1;
            }
            findings.push(VerificationFinding {
                record_id: record.id(),
                stored,
                recomputed,
                mismatch,
            });
        }

        if mismatched > 0 {
            warn!(table = %table, mismatched, total = records.len(), "record checksum mismatches detected");
            self.audit.append(AuditEvent::new(
                AuditKind::IntegrityViolation,
                table.clone(),
                format!(
                    "record checksum mismatch on {mismatched} of {} records ({})",
                    records.len(),
                    summarize_mismatched_ids(&findings)
                ),
                checked_at,
            ));
            self.corrupt_if_reconciled(table)?;
        }

        Ok(RecordVerification {
            table: table.clone(),
            total_records: records.len(),
            mismatched,
            findings,
            checked_at,
        })
    }

    /// Verify one record by id.
    ///
    /// Same side effects as [`verify_records`](Self::verify_records), with
    /// the audit entry attributed to the record.
    ///
    /// # Errors
    ///
    /// Fails when the table is untracked or the record does not exist.
    pub fn verify_record(
        &self,
        table: &TableName,
        id: RecordId,
    ) -> Result<VerificationFinding, EngineError> {
        let schema = self.schema_for(table)?;
        let record = self.storage.read_one(table, id)?;
        let recomputed = record_checksum(&record, schema);
        let stored = record.stored_checksum();
        let mismatch = stored != Some(recomputed);

        if mismatch {
            warn!(table = %table, record = %id, "record checksum mismatch detected");
            self.audit.append(
                AuditEvent::new(
                    AuditKind::IntegrityViolation,
                    table.clone(),
                    format!(
                        "record checksum mismatch: stored {}, recomputed {recomputed}",
                        stored.map_or_else(|| "none".to_owned(), |c| c.to_string())
                    ),
                    self.clock.now(),
                )
                .with_record(id),
            );
            self.corrupt_if_reconciled(table)?;
        }

        Ok(VerificationFinding {
            record_id: id,
            stored,
            recomputed,
            mismatch,
        })
    }

    /// Run the aggregate verification over every tracked table, isolating
    /// per-table failures into the report instead of aborting.
    pub fn sweep(&self) -> SweepReport {
        let mut entries = Vec::with_capacity(self.catalog.len());
        for schema in &self.catalog {
            let table = schema.name().clone();
            match self.verify_table(&table) {
                Ok(check) => entries.push(SweepEntry {
                    table,
                    check: Some(check),
                    error: None,
                }),
                Err(err) => {
                    warn!(table = %table, err = %err, "sweep could not verify table");
                    entries.push(SweepEntry {
                        table,
                        check: None,
                        error: Some(err.to_string()),
                    });
                }
            }
        }
        let report = SweepReport {
            entries,
            checked_at: self.clock.now(),
        };
        info!(
            tables = report.entries.len(),
            healthy = report.healthy(),
            "verification sweep finished"
        );
        report
    }

    /// `Reconciled → Corrupt`, the only corruption edge in the machine.
    fn corrupt_if_reconciled(&self, table: &TableName) -> Result<(), EngineError> {
        if let Some(row) = self.registry.load(table)? {
            if row.state == TableState::Reconciled {
                self.mark_degraded(table, TableState::Corrupt)?;
            }
        }
        Ok(())
    }
}

/// First few mismatched ids for an audit detail line.
fn summarize_mismatched_ids(findings: &[VerificationFinding]) -> String {
    const LISTED: usize = 10;
    let ids: Vec<String> = findings
        .iter()
        .filter(|finding| finding.mismatch)
        .take(LISTED)
        .map(|finding| finding.record_id.to_string())
        .collect();
    let total = findings.iter().filter(|finding| finding.mismatch).count();
    if total > ids.len() {
        format!("ids {} and {} more", ids.join(", "), total - ids.len())
    } else {
        format!("ids {}", ids.join(", "))
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reporting surfaces for embedders: status, detail, violation paging.
//!
//! Every report type serializes with serde, so an HTTP or CLI layer can
//! encode them directly. Status checks run real verifications, so reading
//! status has the same side effects verification has (violation audits,
//! corruption marking); per-table failures are isolated into the report.

use serde::{Deserialize, Serialize};
use tracing::warn;

use tally_core::{
    AuditEvent, AuditKind, AuditQuery, AuditSink, Clock, RegistryStore, Storage, TableName,
    TableState, Timestamp,
};

use crate::verify::{AggregateCheck, RecordVerification};
use crate::{EngineError, IntegrityEngine};

/// Page size used when a violations query passes no explicit limit.
pub const DEFAULT_VIOLATION_PAGE: usize = 50;

/// Hard ceiling on one violations page, whatever the caller asks for.
pub const MAX_VIOLATION_PAGE: usize = 200;

/// One tracked table's line in the status report.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TableStatus {
    /// Table described.
    pub table: TableName,
    /// Live records, when the table could be scanned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_records: Option<usize>,
    /// Aggregate on record, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_sum: Option<i64>,
    /// When that aggregate was computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_at: Option<Timestamp>,
    /// Reconciliation state (best effort when the check failed).
    pub state: TableState,
    /// Whether the stored aggregate matched recomputation.
    pub integrity: bool,
    /// Whether a repair is needed before this table can be trusted.
    pub requires_recalculation: bool,
    /// The failure that prevented a full check, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Roll-up over every tracked table.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StatusTotals {
    /// Tracked tables.
    pub tables: usize,
    /// Tables reconciled with integrity intact.
    pub tables_reconciled: usize,
    /// Live records across tables that could be scanned.
    pub total_records: usize,
    /// Sum of the recorded aggregates that exist.
    pub aggregate_sum_total: i64,
    /// Tables needing a repair.
    pub tables_requiring_recalculation: usize,
}

/// Full status report: one line per tracked table plus totals.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StatusReport {
    /// Per-table lines, in catalog order.
    pub tables: Vec<TableStatus>,
    /// Roll-up.
    pub totals: StatusTotals,
    /// When the report was assembled.
    pub checked_at: Timestamp,
}

/// Aggregate and per-record verification of one table, side by side.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct IntegrityDetail {
    /// Bookkeeping-level check.
    pub aggregate: AggregateCheck,
    /// Content-level check.
    pub records: RecordVerification,
}

impl<S, R, A, C> IntegrityEngine<S, R, A, C>
where
    S: Storage,
    R: RegistryStore,
    A: AuditSink,
    C: Clock,
{
    /// Verify and describe every tracked table.
    ///
    /// A table whose check fails contributes an error line (with whatever
    /// the registry still knows about it) instead of aborting the report.
    pub fn status(&self) -> StatusReport {
        let mut tables = Vec::with_capacity(self.catalog.len());
        for schema in &self.catalog {
            let line = match self.verify_table_counted(schema.name()) {
                Ok((check, record_count)) => TableStatus {
                    table: schema.name().clone(),
                    total_records: Some(record_count),
                    aggregate_sum: check.stored_sum,
                    computed_at: check.computed_at,
                    state: check.state,
                    integrity: check.integrity,
                    requires_recalculation: check.requires_recalculation(),
                    error: None,
                },
                Err(err) => {
                    warn!(table = %schema.name(), err = %err, "status check failed for table");
                    let row = self.registry.load(schema.name()).ok().flatten();
                    TableStatus {
                        table: schema.name().clone(),
                        total_records: None,
                        aggregate_sum: row.as_ref().map(|r| r.aggregate_sum),
                        computed_at: row.as_ref().map(|r| r.computed_at),
                        state: row.as_ref().map_or(TableState::Uninitialized, |r| r.state),
                        integrity: false,
                        requires_recalculation: true,
                        error: Some(err.to_string()),
                    }
                }
            };
            tables.push(line);
        }

        let totals = StatusTotals {
            tables: tables.len(),
            tables_reconciled: tables
                .iter()
                .filter(|t| t.integrity && t.state == TableState::Reconciled)
                .count(),
            total_records: tables.iter().filter_map(|t| t.total_records).sum(),
            aggregate_sum_total: tables
                .iter()
                .filter_map(|t| t.aggregate_sum)
                .fold(0i64, i64::saturating_add),
            tables_requiring_recalculation: tables
                .iter()
                .filter(|t| t.requires_recalculation)
                .count(),
        };
        StatusReport {
            tables,
            totals,
            checked_at: self.clock.now(),
        }
    }

    /// Aggregate check and full record verification for one table.
    ///
    /// # Errors
    ///
    /// Propagates untracked-table, storage, and registry failures.
    pub fn integrity_detail(&self, table: &TableName) -> Result<IntegrityDetail, EngineError> {
        let aggregate = self.verify_table(table)?;
        let records = self.verify_records(table)?;
        Ok(IntegrityDetail { aggregate, records })
    }
}

impl<S, R, A, C> IntegrityEngine<S, R, A, C>
where
    S: Storage,
    R: RegistryStore,
    A: AuditSink + AuditQuery,
    C: Clock,
{
    /// Recent `IntegrityViolation` audit entries, newest first.
    ///
    /// `limit` defaults to [`DEFAULT_VIOLATION_PAGE`] and is clamped to
    /// [`MAX_VIOLATION_PAGE`]; the page stays bounded no matter what the
    /// caller asks for.
    ///
    /// # Errors
    ///
    /// Fails when the audit backend cannot serve reads.
    pub fn recent_violations(&self, limit: Option<usize>) -> Result<Vec<AuditEvent>, EngineError> {
        let limit = limit
            .unwrap_or(DEFAULT_VIOLATION_PAGE)
            .min(MAX_VIOLATION_PAGE);
        Ok(self.audit.recent(AuditKind::IntegrityViolation, limit)?)
    }
}

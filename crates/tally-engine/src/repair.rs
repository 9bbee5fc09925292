// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Repair: full recalculation of record checksums and table aggregates.
//!
//! Repair is the only edge that returns a `Stale` or `Corrupt` table to
//! `Reconciled`, and the bootstrap edge for tables that were never
//! reconciled at all. It trusts current record content by definition: after
//! a repair, stored checksums assert what the table contains *now*, and any
//! pre-repair mismatch survives only in the audit log.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tally_core::{
    record_checksum, AuditEvent, AuditKind, AuditSink, Clock, RegistryStore, Storage,
    TableAggregate, TableName, TableState,
};

use crate::{EngineError, IntegrityEngine};

/// Outcome of recalculating one table.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TableRepair {
    /// Table repaired.
    pub table: TableName,
    /// Records whose stored checksum had to change.
    pub records_updated: usize,
    /// Freshly derived aggregate now on record.
    pub aggregate_sum: i64,
}

/// One table that could not be repaired during a bulk run.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FailedRepair {
    /// Table that failed.
    pub table: TableName,
    /// Why, in display form.
    pub error: String,
}

/// Outcome of recalculating every tracked table.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RepairRun {
    /// Tables repaired, in catalog order.
    pub succeeded: Vec<TableRepair>,
    /// Tables that failed, in catalog order. Failures are isolated; one
    /// table's failure never aborts the rest of the run.
    pub failed: Vec<FailedRepair>,
}

impl RepairRun {
    /// Whether every tracked table was repaired.
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<S, R, A, C> IntegrityEngine<S, R, A, C>
where
    S: Storage,
    R: RegistryStore,
    A: AuditSink,
    C: Clock,
{
    /// Recalculate every record checksum of `table`, persist the ones that
    /// changed, and reconcile the aggregate row.
    ///
    /// On a table currently marked `Corrupt`, the pre-repair aggregate row
    /// is archived to the audit log first (`CorruptionArchived`), so the
    /// evidence of the mismatch survives the overwrite.
    ///
    /// # Errors
    ///
    /// Propagates untracked-table, storage, and registry failures; on error
    /// the table keeps whatever state it had.
    pub fn recalculate_table(&self, table: &TableName) -> Result<TableRepair, EngineError> {
        let schema = self.schema_for(table)?;

        if let Some(row) = self.registry.load(table)? {
            if row.state == TableState::Corrupt {
                self.audit.append(AuditEvent::new(
                    AuditKind::CorruptionArchived,
                    table.clone(),
                    format!(
                        "pre-repair aggregate archived: sum {}, computed at {}",
                        row.aggregate_sum, row.computed_at
                    ),
                    self.clock.now(),
                ));
            }
        }

        let records = self.storage.read(table)?;
        let mut records_updated = 0usize;
        let mut aggregate_sum: i64 = 0;
        for record in &records {
            let fresh = record_checksum(record, schema);
            if record.stored_checksum() != Some(fresh) {
                self.storage.write_checksum(table, record.id(), fresh)?;
                records_updated += 1;
            }
            aggregate_sum = aggregate_sum.saturating_add(i64::from(fresh.value()));
        }

        self.registry.upsert(TableAggregate::new(
            table.clone(),
            aggregate_sum,
            self.clock.now(),
            TableState::Reconciled,
        ))?;

        info!(
            table = %table,
            records = records.len(),
            updated = records_updated,
            sum = aggregate_sum,
            "table recalculated"
        );
        Ok(TableRepair {
            table: table.clone(),
            records_updated,
            aggregate_sum,
        })
    }

    /// Recalculate every tracked table, in catalog order.
    ///
    /// Also the first-time initialization path: run it once at process
    /// start to bootstrap tables that have never been reconciled. Failures
    /// are audited as `RepairFailure` and isolated into the report; the run
    /// itself never fails. Not transactional across tables.
    pub fn recalculate_all(&self) -> RepairRun {
        info!(tables = self.catalog.len(), "full recalculation started");
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for schema in &self.catalog {
            let table = schema.name().clone();
            match self.recalculate_table(&table) {
                Ok(repair) => succeeded.push(repair),
                Err(err) => {
                    warn!(table = %table, err = %err, "table recalculation failed");
                    self.audit.append(AuditEvent::new(
                        AuditKind::RepairFailure,
                        table.clone(),
                        format!("recalculation failed: {err}"),
                        self.clock.now(),
                    ));
                    failed.push(FailedRepair {
                        table,
                        error: err.to_string(),
                    });
                }
            }
        }
        let run = RepairRun { succeeded, failed };
        info!(
            succeeded = run.succeeded.len(),
            failed = run.failed.len(),
            "full recalculation finished"
        );
        run
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tally_core::{
        AuditKind, CatalogConfig, Checksum, Record, RecordId, RegistryStore as _, SchemaCatalog,
        Severity, Storage as _, TableName, TableState,
    };
    use tally_store_mem::{ManualClock, MemoryAuditLog, MemoryRegistry, MemoryStorage};

    use crate::IntegrityEngine;

    type MemEngine = IntegrityEngine<MemoryStorage, MemoryRegistry, MemoryAuditLog, ManualClock>;

    struct Fixture {
        storage: MemoryStorage,
        registry: MemoryRegistry,
        audit: MemoryAuditLog,
        engine: Arc<MemEngine>,
        table: TableName,
    }

    fn fixture_with_tables(tables_json: &str) -> Fixture {
        let config: CatalogConfig = serde_json::from_str(tables_json).unwrap();
        let catalog = SchemaCatalog::from_config(config).unwrap();
        let storage = MemoryStorage::new();
        storage.create_table("recipes");
        let registry = MemoryRegistry::new();
        let audit = MemoryAuditLog::new();
        let engine = Arc::new(IntegrityEngine::with_clock(
            catalog,
            storage.clone(),
            registry.clone(),
            audit.clone(),
            ManualClock::new(9_000),
        ));
        storage.subscribe(engine.clone());
        Fixture {
            storage,
            registry,
            audit,
            engine,
            table: TableName::from("recipes"),
        }
    }

    fn fixture() -> Fixture {
        fixture_with_tables(
            r#"{ "tables": [ { "name": "recipes", "fields": ["title", "body"] } ] }"#,
        )
    }

    fn recipe(id: u64, title: &str) -> Record {
        Record::new(RecordId(id)).with("title", title)
    }

    // ── 1. bootstrap: pre-existing rows gain checksums and a row ────────

    #[test]
    fn bootstrap_reconciles_untracked_rows() {
        let fx = fixture();
        // Rows that predate tracking: present in storage, never announced.
        for (id, title) in [(1, "d"), (2, "g"), (3, "c")] {
            fx.storage.seed(&fx.table, recipe(id, title)).unwrap();
        }
        assert_eq!(fx.registry.load(&fx.table).unwrap(), None);

        // 'd' -> 2, 'g' -> 5, 'c' -> 1 under mod 7.
        let repair = fx.engine.recalculate_table(&fx.table).unwrap();
        assert_eq!(repair.records_updated, 3);
        assert_eq!(repair.aggregate_sum, 8);

        let row = fx.registry.load(&fx.table).unwrap().unwrap();
        assert_eq!(row.state, TableState::Reconciled);
        assert_eq!(row.aggregate_sum, 8);
        let stored = fx.storage.read_one(&fx.table, RecordId(2)).unwrap();
        assert_eq!(stored.stored_checksum(), Some(Checksum(5)));
    }

    // ── 2. repair is idempotent ─────────────────────────────────────────

    #[test]
    fn repeat_repair_changes_nothing() {
        let fx = fixture();
        fx.storage.insert(&fx.table, recipe(1, "ab")).unwrap();

        let first = fx.engine.recalculate_table(&fx.table).unwrap();
        assert_eq!(first.records_updated, 0); // maintenance already wrote it
        let second = fx.engine.recalculate_table(&fx.table).unwrap();
        assert_eq!(second.records_updated, 0);
        assert_eq!(first.aggregate_sum, second.aggregate_sum);
    }

    // ── 3. corrupt evidence is archived before the fix ──────────────────

    #[test]
    fn corrupt_repair_archives_evidence_first() {
        let fx = fixture();
        fx.storage.insert(&fx.table, recipe(1, "ab")).unwrap(); // 6
        fx.storage
            .overwrite_stored_checksum(&fx.table, RecordId(1), Some(Checksum(2)))
            .unwrap();
        fx.engine.verify_table(&fx.table).unwrap(); // -> Corrupt + violation

        let repair = fx.engine.recalculate_table(&fx.table).unwrap();
        assert_eq!(repair.records_updated, 1);
        assert_eq!(repair.aggregate_sum, 6);

        let entries = fx.audit.entries();
        assert_eq!(entries[0].kind, AuditKind::IntegrityViolation);
        assert_eq!(entries[1].kind, AuditKind::CorruptionArchived);
        assert_eq!(entries[1].severity, Severity::Medium);
        assert!(entries[1].detail.contains("sum 6"));
        assert_eq!(
            fx.registry.load(&fx.table).unwrap().unwrap().state,
            TableState::Reconciled
        );
    }

    // ── 4. repair clears a stale flag ───────────────────────────────────

    #[test]
    fn repair_clears_stale() {
        let fx = fixture();
        fx.storage.insert(&fx.table, recipe(1, "ab")).unwrap();
        fx.engine.mark_degraded(&fx.table, TableState::Stale).unwrap();

        fx.engine.recalculate_table(&fx.table).unwrap();
        assert_eq!(
            fx.registry.load(&fx.table).unwrap().unwrap().state,
            TableState::Reconciled
        );
        // A healthy repair archives nothing.
        assert!(fx.audit.entries().is_empty());
    }

    // ── 5. bulk runs isolate failures per table ─────────────────────────

    #[test]
    fn recalculate_all_isolates_failures() {
        let fx = fixture_with_tables(
            r#"{ "tables": [
                { "name": "ghosts", "fields": ["name"] },
                { "name": "recipes", "fields": ["title", "body"] }
            ] }"#,
        );
        // "ghosts" is tracked but absent from storage; "recipes" is healthy.
        fx.storage.insert(&fx.table, recipe(1, "ab")).unwrap();

        let run = fx.engine.recalculate_all();
        assert!(!run.success());
        assert_eq!(run.failed.len(), 1);
        assert_eq!(run.failed[0].table, TableName::from("ghosts"));
        assert_eq!(run.succeeded.len(), 1);
        assert_eq!(run.succeeded[0].table, fx.table);

        let entries = fx.audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, AuditKind::RepairFailure);
        assert_eq!(entries[0].table, TableName::from("ghosts"));
    }
}

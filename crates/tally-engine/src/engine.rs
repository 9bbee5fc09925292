// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The engine core: collaborator wiring and the shared state helpers every
//! role builds on.

use tally_core::{
    AuditQueryError, AuditSink, Clock, RegistryError, RegistryStore, SchemaCatalog, Storage,
    StorageError, SystemClock, TableAggregate, TableName, TableSchema, TableState,
};

/// Explicitly-invoked engine operation failed.
///
/// Only surfaced by the caller-facing operations (verify, repair, status,
/// queries). The maintenance path never returns this to the mutating caller;
/// it absorbs failures into audit entries and a `Stale` mark.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum EngineError {
    /// The named table is not in the tracked-table catalog.
    #[error("table `{table}` is not tracked")]
    UntrackedTable {
        /// Requested table.
        table: TableName,
    },
    /// Row access failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Aggregate registry access failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Audit log read failed.
    #[error(transparent)]
    AuditQuery(#[from] AuditQueryError),
}

/// The integrity service object.
///
/// Generic over its collaborators so embedders inject real adapters and
/// tests inject in-memory ones. `Send + Sync` whenever the collaborators
/// are; share it behind an `Arc` and hand a clone of that `Arc` to the
/// storage adapter as the mutation observer.
pub struct IntegrityEngine<S, R, A, C = SystemClock> {
    pub(crate) catalog: SchemaCatalog,
    pub(crate) storage: S,
    pub(crate) registry: R,
    pub(crate) audit: A,
    pub(crate) clock: C,
}

impl<S, R, A> IntegrityEngine<S, R, A, SystemClock> {
    /// Engine over `catalog` using the system clock.
    pub fn new(catalog: SchemaCatalog, storage: S, registry: R, audit: A) -> Self {
        Self::with_clock(catalog, storage, registry, audit, SystemClock)
    }
}

impl<S, R, A, C> IntegrityEngine<S, R, A, C> {
    /// Engine with an explicit clock, for deterministic tests.
    pub fn with_clock(catalog: SchemaCatalog, storage: S, registry: R, audit: A, clock: C) -> Self {
        Self {
            catalog,
            storage,
            registry,
            audit,
            clock,
        }
    }

    /// Tracked-table catalog this engine enforces.
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }
}

/// Totals of one full table scan.
pub(crate) struct TableScan {
    /// Live records seen.
    pub(crate) record_count: usize,
    /// Sum of stored checksums, absent counting zero.
    pub(crate) stored_sum: i64,
}

impl<S, R, A, C> IntegrityEngine<S, R, A, C>
where
    S: Storage,
    R: RegistryStore,
    A: AuditSink,
    C: Clock,
{
    /// Recompute and persist the aggregate row of `table` from a full scan.
    ///
    /// Sums the **stored** checksum of every live record (absent counts
    /// zero — this layer audits stored checksums, record content is the
    /// record verifier's business) and upserts the row in one write.
    /// Idempotent. A `Stale` or `Corrupt` state survives the recompute;
    /// those flags are cleared only by repair.
    ///
    /// # Errors
    ///
    /// Propagates storage and registry failures.
    pub fn recompute(&self, table: &TableName) -> Result<TableAggregate, EngineError> {
        self.schema_for(table)?;
        self.recompute_aggregate(table)
    }

    pub(crate) fn schema_for(&self, table: &TableName) -> Result<&TableSchema, EngineError> {
        self.catalog
            .get(table)
            .ok_or_else(|| EngineError::UntrackedTable {
                table: table.clone(),
            })
    }

    pub(crate) fn scan_stored(&self, table: &TableName) -> Result<TableScan, EngineError> {
        let records = self.storage.read(table)?;
        let mut stored_sum: i64 = 0;
        for record in &records {
            if let Some(checksum) = record.stored_checksum() {
                stored_sum = stored_sum.saturating_add(i64::from(checksum.value()));
            }
        }
        Ok(TableScan {
            record_count: records.len(),
            stored_sum,
        })
    }

    /// Full-scan upsert shared by recompute, the maintenance fallback, and
    /// repair bookkeeping.
    pub(crate) fn recompute_aggregate(
        &self,
        table: &TableName,
    ) -> Result<TableAggregate, EngineError> {
        let scan = self.scan_stored(table)?;
        let state = match self.registry.load(table)? {
            Some(row) if row.state.requires_recalculation() => row.state,
            _ => TableState::Reconciled,
        };
        let row = TableAggregate::new(table.clone(), scan.stored_sum, self.clock.now(), state);
        self.registry.upsert(row.clone())?;
        Ok(row)
    }

    /// Flag `table` as `Stale` (maintenance failed) or `Corrupt` (verified
    /// mismatch), preserving the recorded sum. `Corrupt` is never downgraded
    /// to `Stale`; only repair clears either flag.
    pub(crate) fn mark_degraded(
        &self,
        table: &TableName,
        target: TableState,
    ) -> Result<(), EngineError> {
        let row = match self.registry.load(table)? {
            Some(existing) => {
                let state = match (existing.state, target) {
                    (TableState::Corrupt, TableState::Stale) => TableState::Corrupt,
                    _ => target,
                };
                TableAggregate::new(
                    table.clone(),
                    existing.aggregate_sum,
                    existing.computed_at,
                    state,
                )
            }
            None => TableAggregate::new(table.clone(), 0, self.clock.now(), target),
        };
        self.registry.upsert(row)?;
        Ok(())
    }
}

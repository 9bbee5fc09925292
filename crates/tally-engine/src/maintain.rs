// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Checksum maintenance on announced mutations.
//!
//! The engine subscribes to the storage adapter as a
//! [`MutationObserver`]. For every announced mutation of a tracked table it
//! freshens the affected records' stored checksums, then brings the table
//! aggregate forward — incrementally when the table is `Reconciled` and
//! every prior checksum is known, by full rescan otherwise.
//!
//! This path runs inside the application's write flow, so it never returns
//! an error to the mutating caller. A failure is warned, audited as a
//! `MaintenanceFailure`, and leaves the table marked `Stale` until repaired.

use tracing::{debug, warn};

use tally_core::{
    record_checksum, AuditEvent, AuditKind, AuditSink, Checksum, Clock, MutationEvent,
    MutationObserver, RecordId, RegistryStore, RemovedRecord, Storage, TableAggregate, TableName,
    TableSchema, TableState,
};

use crate::{EngineError, IntegrityEngine};

/// How the table aggregate must move after the per-record writes.
enum AggregateStep {
    /// Add this signed amount to the reconciled baseline.
    Delta(i64),
    /// No usable baseline; derive the sum from a full scan.
    Rescan,
}

/// Maintenance failure, attributed to one record when possible.
type MaintainFailure = (Option<RecordId>, EngineError);

impl<S, R, A, C> MutationObserver for IntegrityEngine<S, R, A, C>
where
    S: Storage,
    R: RegistryStore,
    A: AuditSink,
    C: Clock,
{
    fn on_mutation(&self, event: &MutationEvent) {
        let table = event.table();
        if !self.catalog.contains(table) {
            warn!(table = %table, kind = %event.kind(), "mutation event for untracked table ignored");
            return;
        }
        match self.apply_event(event) {
            Ok(()) => {
                debug!(table = %table, kind = %event.kind(), "checksum maintenance applied");
            }
            Err((record_id, err)) => self.absorb_failure(table, record_id, &err),
        }
    }
}

impl<S, R, A, C> IntegrityEngine<S, R, A, C>
where
    S: Storage,
    R: RegistryStore,
    A: AuditSink,
    C: Clock,
{
    fn apply_event(&self, event: &MutationEvent) -> Result<(), MaintainFailure> {
        let table = event.table();
        let schema = self.schema_for(table).map_err(|err| (None, err))?;
        let step = match event {
            MutationEvent::Created { id, .. } => {
                self.freshen_inserted(schema, std::slice::from_ref(id))?
            }
            MutationEvent::BulkCreated { ids, .. } => self.freshen_inserted(schema, ids)?,
            MutationEvent::Updated { id, .. } => {
                self.freshen_updated(schema, std::slice::from_ref(id))?
            }
            MutationEvent::BulkUpdated { ids, .. } => self.freshen_updated(schema, ids)?,
            MutationEvent::Deleted { removed, .. } => {
                Self::removal_step(std::slice::from_ref(removed))
            }
            MutationEvent::BulkDeleted { removed, .. } => Self::removal_step(removed),
        };
        self.apply_step(table, step).map_err(|err| (None, err))
    }

    /// Inserted rows contributed nothing before, so each adds its fresh
    /// checksum.
    fn freshen_inserted(
        &self,
        schema: &TableSchema,
        ids: &[RecordId],
    ) -> Result<AggregateStep, MaintainFailure> {
        let mut delta: i64 = 0;
        for &id in ids {
            let fresh = self.freshen_record(schema, id).map_err(|err| (Some(id), err))?;
            delta = delta.saturating_add(i64::from(fresh.value()));
        }
        Ok(AggregateStep::Delta(delta))
    }

    /// Updated rows move the sum by `new - old`. A row with no stored
    /// checksum has no known prior, which forces the rescan path.
    fn freshen_updated(
        &self,
        schema: &TableSchema,
        ids: &[RecordId],
    ) -> Result<AggregateStep, MaintainFailure> {
        let mut delta: i64 = 0;
        let mut prior_unknown = false;
        for &id in ids {
            let record = self
                .storage
                .read_one(schema.name(), id)
                .map_err(|err| (Some(id), EngineError::from(err)))?;
            let previous = record.stored_checksum();
            let fresh = record_checksum(&record, schema);
            if previous != Some(fresh) {
                self.storage
                    .write_checksum(schema.name(), id, fresh)
                    .map_err(|err| (Some(id), EngineError::from(err)))?;
            }
            match previous {
                Some(old) => {
                    delta = delta
                        .saturating_add(i64::from(fresh.value()))
                        .saturating_sub(i64::from(old.value()));
                }
                None => prior_unknown = true,
            }
        }
        Ok(if prior_unknown {
            AggregateStep::Rescan
        } else {
            AggregateStep::Delta(delta)
        })
    }

    /// Destroyed rows subtract the checksum they carried out. A destroyed
    /// row without one forces the rescan path.
    fn removal_step(removed: &[RemovedRecord]) -> AggregateStep {
        let mut delta: i64 = 0;
        for gone in removed {
            match gone.checksum {
                Some(checksum) => delta = delta.saturating_sub(i64::from(checksum.value())),
                None => return AggregateStep::Rescan,
            }
        }
        AggregateStep::Delta(delta)
    }

    /// Recompute and persist one record's checksum; returns the fresh value.
    fn freshen_record(&self, schema: &TableSchema, id: RecordId) -> Result<Checksum, EngineError> {
        let record = self.storage.read_one(schema.name(), id)?;
        let fresh = record_checksum(&record, schema);
        if record.stored_checksum() != Some(fresh) {
            self.storage.write_checksum(schema.name(), id, fresh)?;
        }
        Ok(fresh)
    }

    fn apply_step(&self, table: &TableName, step: AggregateStep) -> Result<(), EngineError> {
        match step {
            AggregateStep::Rescan => {
                self.recompute_aggregate(table)?;
            }
            AggregateStep::Delta(delta) => match self.registry.load(table)? {
                Some(row) if row.state == TableState::Reconciled => {
                    let next = row.aggregate_sum.saturating_add(delta);
                    if next < 0 {
                        debug!(table = %table, delta, "delta would drive aggregate negative; rescanning");
                        self.recompute_aggregate(table)?;
                    } else {
                        self.registry.upsert(TableAggregate::new(
                            table.clone(),
                            next,
                            self.clock.now(),
                            TableState::Reconciled,
                        ))?;
                    }
                }
                // Uninitialized or degraded: no trustworthy baseline to
                // apply a delta against.
                _ => {
                    self.recompute_aggregate(table)?;
                }
            },
        }
        Ok(())
    }

    fn absorb_failure(&self, table: &TableName, record_id: Option<RecordId>, err: &EngineError) {
        warn!(
            table = %table,
            record = ?record_id,
            err = %err,
            "checksum maintenance failed; marking table stale"
        );
        let mut entry = AuditEvent::new(
            AuditKind::MaintenanceFailure,
            table.clone(),
            format!("checksum maintenance failed: {err}"),
            self.clock.now(),
        );
        if let Some(id) = record_id {
            entry = entry.with_record(id);
        }
        self.audit.append(entry);
        if let Err(mark_err) = self.mark_degraded(table, TableState::Stale) {
            warn!(table = %table, err = %mark_err, "could not mark table stale after maintenance failure");
        }
    }
}

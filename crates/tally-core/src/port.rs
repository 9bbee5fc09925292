// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Collaborator ports.
//!
//! The engine owns no durable state of its own. Rows live behind [`Storage`],
//! aggregate rows behind [`RegistryStore`], incident entries behind
//! [`AuditSink`], and the wall clock behind [`Clock`]. All ports take
//! `&self`: adapters own their synchronization, and callers may share one
//! adapter across threads freely.

use crate::audit::{AuditEvent, AuditKind};
use crate::digest::Checksum;
use crate::ident::{RecordId, TableName};
use crate::record::Record;
use crate::registry::TableAggregate;
use crate::value::Timestamp;

/// Read and checksum-write access to tracked tables.
///
/// Content mutations happen elsewhere (the embedding application owns its
/// write paths) and are announced through
/// [`MutationObserver`](crate::MutationObserver). The one write this port
/// exposes is checksum maintenance, which adapters must apply *without*
/// announcing a mutation event — it is metadata upkeep, not content change.
pub trait Storage: Send + Sync {
    /// All live records of `table`.
    ///
    /// # Errors
    ///
    /// Fails when the table is unknown to the backend or the backend is
    /// unavailable.
    fn read(&self, table: &TableName) -> Result<Vec<Record>, StorageError>;

    /// One live record by id.
    ///
    /// # Errors
    ///
    /// Fails when the table or record is missing, or the backend is
    /// unavailable.
    fn read_one(&self, table: &TableName, id: RecordId) -> Result<Record, StorageError>;

    /// Persist `checksum` as the stored checksum of one record.
    ///
    /// Must not emit a mutation event.
    ///
    /// # Errors
    ///
    /// Fails when the table or record is missing, or the backend is
    /// unavailable.
    fn write_checksum(
        &self,
        table: &TableName,
        id: RecordId,
        checksum: Checksum,
    ) -> Result<(), StorageError>;
}

/// Storage backend failure.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend has no such table.
    #[error("unknown table `{table}`")]
    UnknownTable {
        /// Requested table.
        table: TableName,
    },
    /// The table exists but the record does not.
    #[error("no record {id} in table `{table}`")]
    MissingRecord {
        /// Requested table.
        table: TableName,
        /// Requested record.
        id: RecordId,
    },
    /// The backend could not serve the request at all.
    #[error("storage unavailable: {reason}")]
    Unavailable {
        /// Backend-specific cause.
        reason: String,
    },
}

/// Durable home of the per-table aggregate rows.
///
/// At most one row per table. A table with no row has never been
/// reconciled.
pub trait RegistryStore: Send + Sync {
    /// Aggregate row for `table`, if one has ever been written.
    ///
    /// # Errors
    ///
    /// Fails when the backend cannot be read.
    fn load(&self, table: &TableName) -> Result<Option<TableAggregate>, RegistryError>;

    /// Insert or replace the aggregate row for `row.table`.
    ///
    /// One atomic write; callers never hold a row across this call.
    ///
    /// # Errors
    ///
    /// Fails when the backend cannot be written.
    fn upsert(&self, row: TableAggregate) -> Result<(), RegistryError>;
}

/// Registry backend failure.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum RegistryError {
    /// Load failed.
    #[error("registry read failed: {reason}")]
    Read {
        /// Backend-specific cause.
        reason: String,
    },
    /// Upsert failed.
    #[error("registry write failed: {reason}")]
    Write {
        /// Backend-specific cause.
        reason: String,
    },
}

/// Append-only incident log.
///
/// Best-effort by contract: implementations absorb their own failures.
/// Integrity tracking must keep working when the audit backend is down,
/// which is why `append` cannot fail.
pub trait AuditSink: Send + Sync {
    /// Append one entry.
    fn append(&self, event: AuditEvent);
}

/// Read side of the audit log, for adapters that can serve it.
///
/// Kept separate from [`AuditSink`] so the sink stays write-only
/// fire-and-forget while reporting surfaces declare the read capability
/// explicitly.
pub trait AuditQuery: Send + Sync {
    /// Up to `limit` entries of `kind`, newest first.
    ///
    /// # Errors
    ///
    /// Fails when the backend cannot be read.
    fn recent(&self, kind: AuditKind, limit: usize) -> Result<Vec<AuditEvent>, AuditQueryError>;
}

/// Audit log read failure.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
#[error("audit query failed: {reason}")]
pub struct AuditQueryError {
    /// Backend-specific cause.
    pub reason: String,
}

/// Wall clock, injected so reconciliation stamps are testable.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Timestamp;
}

/// [`Clock`] backed by the operating system.
#[derive(Clone, Copy, Default, Debug)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |since| {
                i64::try_from(since.as_millis()).unwrap_or(i64::MAX)
            });
        Timestamp::from_unix_millis(millis)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. system clock reads as post-epoch unix millis ─────────────────

    #[test]
    fn system_clock_is_post_epoch() {
        let now = SystemClock.now();
        // 2024-01-01T00:00:00Z; any sane host clock is past this.
        assert!(now.unix_millis() > 1_704_067_200_000);
    }

    // ── 2. error displays carry the identifying detail ──────────────────

    #[test]
    fn error_display() {
        let err = StorageError::MissingRecord {
            table: TableName::from("recipes"),
            id: RecordId(12),
        };
        assert_eq!(err.to_string(), "no record 12 in table `recipes`");

        let err = RegistryError::Write {
            reason: "disk full".to_owned(),
        };
        assert_eq!(err.to_string(), "registry write failed: disk full");

        let err = AuditQueryError {
            reason: "backend offline".to_owned(),
        };
        assert_eq!(err.to_string(), "audit query failed: backend offline");
    }
}

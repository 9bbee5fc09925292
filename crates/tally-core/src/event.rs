// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed mutation events and the observer seam.
//!
//! The storage collaborator announces every content mutation *after* it has
//! been applied. Events identify rows rather than carrying them; observers
//! read current state back through the storage port. The one exception is
//! deletion, where the row no longer exists — those events carry the stored
//! checksum the row had at the moment it was destroyed.

use serde::{Deserialize, Serialize};

use crate::digest::Checksum;
use crate::ident::{RecordId, TableName};

/// Identity and last stored checksum of a destroyed row.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RemovedRecord {
    /// Identifier the row had.
    pub id: RecordId,
    /// Stored checksum at destruction time, if the row had one.
    pub checksum: Option<Checksum>,
}

/// A content mutation, announced post-commit.
///
/// Mirrors the six mutation paths a row-oriented store exposes: single and
/// bulk forms of create, update, and delete. Checksum maintenance writes are
/// not mutations and must never be announced.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationEvent {
    /// One row inserted.
    Created {
        /// Table mutated.
        table: TableName,
        /// Inserted row.
        id: RecordId,
    },
    /// One row's content changed.
    Updated {
        /// Table mutated.
        table: TableName,
        /// Updated row.
        id: RecordId,
    },
    /// One row destroyed.
    Deleted {
        /// Table mutated.
        table: TableName,
        /// What was destroyed.
        removed: RemovedRecord,
    },
    /// Several rows inserted in one statement.
    BulkCreated {
        /// Table mutated.
        table: TableName,
        /// Inserted rows.
        ids: Vec<RecordId>,
    },
    /// Several rows' content changed in one statement.
    BulkUpdated {
        /// Table mutated.
        table: TableName,
        /// Updated rows.
        ids: Vec<RecordId>,
    },
    /// Several rows destroyed in one statement.
    BulkDeleted {
        /// Table mutated.
        table: TableName,
        /// What was destroyed.
        removed: Vec<RemovedRecord>,
    },
}

impl MutationEvent {
    /// Table the mutation hit.
    #[must_use]
    pub fn table(&self) -> &TableName {
        match self {
            Self::Created { table, .. }
            | Self::Updated { table, .. }
            | Self::Deleted { table, .. }
            | Self::BulkCreated { table, .. }
            | Self::BulkUpdated { table, .. }
            | Self::BulkDeleted { table, .. } => table,
        }
    }

    /// Which mutation path produced this event.
    #[must_use]
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::Created { .. } => MutationKind::Created,
            Self::Updated { .. } => MutationKind::Updated,
            Self::Deleted { .. } => MutationKind::Deleted,
            Self::BulkCreated { .. } => MutationKind::BulkCreated,
            Self::BulkUpdated { .. } => MutationKind::BulkUpdated,
            Self::BulkDeleted { .. } => MutationKind::BulkDeleted,
        }
    }
}

/// Discriminant of [`MutationEvent`], for logs and audit detail.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Single insert.
    Created,
    /// Single update.
    Updated,
    /// Single delete.
    Deleted,
    /// Bulk insert.
    BulkCreated,
    /// Bulk update.
    BulkUpdated,
    /// Bulk delete.
    BulkDeleted,
}

impl MutationKind {
    /// Stable lowercase name, as it appears in logs and audit entries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::BulkCreated => "bulk_created",
            Self::BulkUpdated => "bulk_updated",
            Self::BulkDeleted => "bulk_deleted",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription seam between a storage adapter and checksum maintenance.
///
/// Called synchronously on the mutating path, after the mutation is durable.
/// Implementations absorb their own failures: a slow or broken observer must
/// degrade integrity tracking, never the mutation that triggered it.
pub trait MutationObserver: Send + Sync {
    /// Handle one post-commit mutation event.
    fn on_mutation(&self, event: &MutationEvent);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. accessors cover every variant ────────────────────────────────

    #[test]
    fn table_and_kind_accessors() {
        let table = TableName::from("recipes");
        let removed = RemovedRecord {
            id: RecordId(9),
            checksum: Some(Checksum(3)),
        };
        let events = [
            MutationEvent::Created {
                table: table.clone(),
                id: RecordId(1),
            },
            MutationEvent::Updated {
                table: table.clone(),
                id: RecordId(1),
            },
            MutationEvent::Deleted {
                table: table.clone(),
                removed,
            },
            MutationEvent::BulkCreated {
                table: table.clone(),
                ids: vec![RecordId(1), RecordId(2)],
            },
            MutationEvent::BulkUpdated {
                table: table.clone(),
                ids: vec![RecordId(1)],
            },
            MutationEvent::BulkDeleted {
                table: table.clone(),
                removed: vec![removed],
            },
        ];
        let kinds: Vec<MutationKind> = events.iter().map(MutationEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                MutationKind::Created,
                MutationKind::Updated,
                MutationKind::Deleted,
                MutationKind::BulkCreated,
                MutationKind::BulkUpdated,
                MutationKind::BulkDeleted,
            ]
        );
        assert!(events.iter().all(|e| e.table() == &table));
    }

    // ── 2. wire shape is tagged and snake_case ──────────────────────────

    #[test]
    fn serde_shape() {
        let event = MutationEvent::Deleted {
            table: TableName::from("recipes"),
            removed: RemovedRecord {
                id: RecordId(4),
                checksum: None,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "deleted");
        assert_eq!(json["table"], "recipes");
        assert_eq!(json["removed"]["id"], 4);
        assert!(json["removed"]["checksum"].is_null());
        let back: MutationEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    // ── 3. observer trait is object-safe ────────────────────────────────

    #[test]
    fn observer_is_object_safe() {
        struct Counter(std::sync::atomic::AtomicUsize);
        impl MutationObserver for Counter {
            fn on_mutation(&self, _event: &MutationEvent) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }
        let counter = Counter(std::sync::atomic::AtomicUsize::new(0));
        let observer: &dyn MutationObserver = &counter;
        observer.on_mutation(&MutationEvent::Created {
            table: TableName::from("recipes"),
            id: RecordId(1),
        });
        assert_eq!(counter.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}

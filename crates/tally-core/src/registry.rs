// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-table aggregate rows and their reconciliation state.

use serde::{Deserialize, Serialize};

use crate::ident::TableName;
use crate::value::Timestamp;

/// Reconciliation state of one tracked table.
///
/// Transitions are owned by the engine: `Uninitialized` tables become
/// `Reconciled` on their first repair, maintenance failures mark
/// `Reconciled` tables `Stale`, a verified aggregate mismatch marks them
/// `Corrupt`, and only a repair returns `Stale` or `Corrupt` to
/// `Reconciled`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableState {
    /// No aggregate has ever been computed. Represented in storage by the
    /// absence of a registry row, never written.
    Uninitialized,
    /// Aggregate reflects the stored record checksums as of `computed_at`.
    Reconciled,
    /// A maintenance step failed since the last repair; the aggregate may
    /// lag the table.
    Stale,
    /// A verification found the stored aggregate disagreeing with the
    /// table while no maintenance failure explains it.
    Corrupt,
}

impl TableState {
    /// Whether the table's aggregate can currently be trusted.
    #[must_use]
    pub fn is_reconciled(self) -> bool {
        matches!(self, Self::Reconciled)
    }

    /// Whether a repair is needed before verifications are meaningful.
    #[must_use]
    pub fn requires_recalculation(self) -> bool {
        !self.is_reconciled()
    }

    /// Stable lowercase name, as serialized and logged.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Reconciled => "reconciled",
            Self::Stale => "stale",
            Self::Corrupt => "corrupt",
        }
    }
}

impl std::fmt::Display for TableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored aggregate row for one tracked table.
///
/// One row per table, owned exclusively by this subsystem. Created by the
/// first recalculation and updated in place from then on; never deleted in
/// normal operation. The absence of a row means [`TableState::Uninitialized`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TableAggregate {
    /// Table this row describes.
    pub table: TableName,
    /// Plain sum of the stored checksums of every live record. Not reduced
    /// modulo anything, so single-record deltas stay arithmetically exact.
    pub aggregate_sum: i64,
    /// When the sum was last written.
    pub computed_at: Timestamp,
    /// Reconciliation state. Stored rows carry `Reconciled`, `Stale`, or
    /// `Corrupt`; `Uninitialized` is expressed by having no row.
    pub state: TableState,
}

impl TableAggregate {
    /// Aggregate row with the given sum and state.
    #[must_use]
    pub fn new(
        table: TableName,
        aggregate_sum: i64,
        computed_at: Timestamp,
        state: TableState,
    ) -> Self {
        Self {
            table,
            aggregate_sum,
            computed_at,
            state,
        }
    }
}

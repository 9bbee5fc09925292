// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Durable audit entries for integrity incidents.
//!
//! Every detected mismatch and every absorbed failure leaves one of these in
//! the audit log. The log is the only place corruption evidence survives a
//! repair, so entries are written before state is overwritten, never after.

use serde::{Deserialize, Serialize};

use crate::ident::{RecordId, TableName};
use crate::value::Timestamp;

/// What class of integrity incident an entry records.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// A verification found stored state disagreeing with recomputation.
    IntegrityViolation,
    /// A checksum maintenance step failed and was absorbed.
    MaintenanceFailure,
    /// A table's repair attempt failed.
    RepairFailure,
    /// Pre-repair snapshot of a corrupt table's aggregate row, written
    /// before the repair overwrites it.
    CorruptionArchived,
}

impl AuditKind {
    /// Severity this kind carries unless overridden.
    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            Self::IntegrityViolation | Self::MaintenanceFailure | Self::RepairFailure => {
                Severity::High
            }
            Self::CorruptionArchived => Severity::Medium,
        }
    }

    /// Stable lowercase name, as serialized and logged.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IntegrityViolation => "integrity_violation",
            Self::MaintenanceFailure => "maintenance_failure",
            Self::RepairFailure => "repair_failure",
            Self::CorruptionArchived => "corruption_archived",
        }
    }
}

impl std::fmt::Display for AuditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incident criticality, ordered `Low < Medium < High`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational.
    Low,
    /// Notable but not a trust failure.
    Medium,
    /// Integrity of stored data is in question.
    High,
}

impl Severity {
    /// Numeric level (1 to 3), as older audit trails encoded criticality.
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

/// One audit log entry.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Incident class.
    pub kind: AuditKind,
    /// Criticality.
    pub severity: Severity,
    /// Table involved.
    pub table: TableName,
    /// Record involved, when the incident is attributable to one row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
    /// Human-readable description of what was observed.
    pub detail: String,
    /// When the entry was appended.
    pub at: Timestamp,
}

impl AuditEvent {
    /// Entry with the kind's default severity and no record attribution.
    #[must_use]
    pub fn new(kind: AuditKind, table: TableName, detail: impl Into<String>, at: Timestamp) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            table,
            record_id: None,
            detail: detail.into(),
            at,
        }
    }

    /// Attribute the incident to one record.
    #[must_use]
    pub fn with_record(mut self, id: RecordId) -> Self {
        self.record_id = Some(id);
        self
    }

    /// Override the default severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

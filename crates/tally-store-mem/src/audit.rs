// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory audit log.

use std::sync::{Arc, Mutex};

use tally_core::{AuditEvent, AuditKind, AuditQuery, AuditQueryError, AuditSink};

use crate::lock;

/// Append-only audit log held in memory.
///
/// Appends never fail; the log keeps everything for the life of the
/// process. [`entries`](Self::entries) returns oldest-first while the
/// [`AuditQuery`] port pages newest-first, matching how an operator
/// reads recent trouble.
#[derive(Clone)]
pub struct MemoryAuditLog {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditLog {
    /// Empty log.
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every event appended so far, oldest first.
    pub fn entries(&self) -> Vec<AuditEvent> {
        lock(&self.events).clone()
    }

    /// Number of events appended so far.
    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, event: AuditEvent) {
        lock(&self.events).push(event);
    }
}

impl AuditQuery for MemoryAuditLog {
    fn recent(&self, kind: AuditKind, limit: usize) -> Result<Vec<AuditEvent>, AuditQueryError> {
        let events = lock(&self.events);
        Ok(events
            .iter()
            .rev()
            .filter(|event| event.kind == kind)
            .take(limit)
            .cloned()
            .collect())
    }
}

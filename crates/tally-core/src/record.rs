// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Logical row shape shared with the storage collaborator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::digest::Checksum;
use crate::ident::RecordId;
use crate::value::FieldValue;

/// One logical row of a tracked table.
///
/// Fields are keyed by name; which of them participate in the digest is
/// decided by the table's [`TableSchema`](crate::TableSchema), never by the
/// record itself. `checksum` is the stored per-record checksum — `None` for
/// rows that predate tracking or whose maintenance write failed.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    fields: BTreeMap<String, FieldValue>,
    checksum: Option<Checksum>,
}

impl Record {
    /// New record with no fields and no stored checksum.
    #[must_use]
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
            checksum: None,
        }
    }

    /// Builder-style field assignment.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Row identifier.
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Value of `name`, if the row carries it.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Assign `name`, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// All fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Stored per-record checksum, if any.
    #[must_use]
    pub fn stored_checksum(&self) -> Option<Checksum> {
        self.checksum
    }

    /// Overwrite the stored checksum.
    ///
    /// Storage adapters call this from their checksum-write path; it is
    /// metadata maintenance, not a content mutation, so no mutation event
    /// should follow it.
    pub fn set_stored_checksum(&mut self, checksum: Option<Checksum>) {
        self.checksum = checksum;
    }
}

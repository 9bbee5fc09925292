// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory aggregate registry.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tally_core::{RegistryError, RegistryStore, TableAggregate, TableName};

use crate::lock;

/// One registry row per table, keyed by table name.
///
/// Absent row means the table is uninitialized; the engine never writes
/// an uninitialized row, it simply has not written one yet.
#[derive(Clone)]
pub struct MemoryRegistry {
    rows: Arc<Mutex<BTreeMap<TableName, TableAggregate>>>,
}

impl MemoryRegistry {
    /// Empty registry with no rows.
    pub fn new() -> Self {
        Self {
            rows: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Snapshot of every row in table-name order.
    pub fn rows(&self) -> Vec<TableAggregate> {
        lock(&self.rows).values().cloned().collect()
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryStore for MemoryRegistry {
    fn load(&self, table: &TableName) -> Result<Option<TableAggregate>, RegistryError> {
        Ok(lock(&self.rows).get(table).cloned())
    }

    fn upsert(&self, row: TableAggregate) -> Result<(), RegistryError> {
        lock(&self.rows).insert(row.table.clone(), row);
        Ok(())
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory storage collaborator with mutation announcement.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tally_core::{
    Checksum, FieldValue, MutationEvent, MutationObserver, Record, RecordId, RemovedRecord,
    Storage, StorageError, TableName,
};

use crate::lock;

type Table = BTreeMap<RecordId, Record>;

struct Inner {
    tables: Mutex<BTreeMap<TableName, Table>>,
    observers: Mutex<Vec<Arc<dyn MutationObserver>>>,
}

/// In-memory row store that announces its own mutations.
///
/// Mirrors the contract a database-backed collaborator would honor:
/// content mutations go through [`insert`](Self::insert) and friends and are
/// announced *after* they are applied; checksum writes through the
/// [`Storage`] port touch only the checksum and announce nothing. The
/// `overwrite_*` methods bypass announcement entirely — they exist to
/// simulate out-of-band writes (the tamper scenario) in tests.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<Inner>,
}

impl MemoryStorage {
    /// Empty store with no tables and no observers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(BTreeMap::new()),
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create `table` if it does not exist yet.
    pub fn create_table(&self, table: impl Into<TableName>) {
        lock(&self.inner.tables).entry(table.into()).or_default();
    }

    /// Register `observer` for every future mutation announcement.
    pub fn subscribe(&self, observer: Arc<dyn MutationObserver>) {
        lock(&self.inner.observers).push(observer);
    }

    /// Load a pre-existing row without announcing anything, replacing any
    /// row with the same id. This is initial-state restore, not a mutation.
    pub fn seed(&self, table: &TableName, record: Record) -> Result<(), StorageError> {
        let mut tables = lock(&self.inner.tables);
        let rows = Self::table_mut(&mut tables, table)?;
        rows.insert(record.id(), record);
        Ok(())
    }

    /// Insert one new row, then announce `Created`.
    pub fn insert(&self, table: &TableName, record: Record) -> Result<(), StorageError> {
        let id = record.id();
        {
            let mut tables = lock(&self.inner.tables);
            let rows = Self::table_mut(&mut tables, table)?;
            if rows.contains_key(&id) {
                return Err(StorageError::Unavailable {
                    reason: format!("duplicate id {id} in table `{table}`"),
                });
            }
            rows.insert(id, record);
        }
        self.announce(&MutationEvent::Created {
            table: table.clone(),
            id,
        });
        Ok(())
    }

    /// Insert several new rows in one statement, then announce
    /// `BulkCreated`.
    pub fn insert_many(
        &self,
        table: &TableName,
        records: Vec<Record>,
    ) -> Result<(), StorageError> {
        let ids: Vec<RecordId> = records.iter().map(Record::id).collect();
        {
            let mut tables = lock(&self.inner.tables);
            let rows = Self::table_mut(&mut tables, table)?;
            for id in &ids {
                if rows.contains_key(id) {
                    return Err(StorageError::Unavailable {
                        reason: format!("duplicate id {id} in table `{table}`"),
                    });
                }
            }
            for record in records {
                rows.insert(record.id(), record);
            }
        }
        self.announce(&MutationEvent::BulkCreated {
            table: table.clone(),
            ids,
        });
        Ok(())
    }

    /// Replace one row's content, then announce `Updated`.
    ///
    /// The stored checksum is maintenance-owned: it survives the content
    /// update untouched and is refreshed by the observer afterwards.
    pub fn update(&self, table: &TableName, record: Record) -> Result<(), StorageError> {
        let id = record.id();
        {
            let mut tables = lock(&self.inner.tables);
            let rows = Self::table_mut(&mut tables, table)?;
            Self::replace_content(rows, table, record)?;
        }
        self.announce(&MutationEvent::Updated {
            table: table.clone(),
            id,
        });
        Ok(())
    }

    /// Replace several rows' content in one statement, then announce
    /// `BulkUpdated`.
    pub fn update_many(
        &self,
        table: &TableName,
        records: Vec<Record>,
    ) -> Result<(), StorageError> {
        let ids: Vec<RecordId> = records.iter().map(Record::id).collect();
        {
            let mut tables = lock(&self.inner.tables);
            let rows = Self::table_mut(&mut tables, table)?;
            for id in &ids {
                if !rows.contains_key(id) {
                    return Err(StorageError::MissingRecord {
                        table: table.clone(),
                        id: *id,
                    });
                }
            }
            for record in records {
                Self::replace_content(rows, table, record)?;
            }
        }
        self.announce(&MutationEvent::BulkUpdated {
            table: table.clone(),
            ids,
        });
        Ok(())
    }

    /// Destroy one row, then announce `Deleted` carrying the checksum the
    /// row had.
    pub fn remove(&self, table: &TableName, id: RecordId) -> Result<(), StorageError> {
        let removed = {
            let mut tables = lock(&self.inner.tables);
            let rows = Self::table_mut(&mut tables, table)?;
            let record = rows.remove(&id).ok_or_else(|| StorageError::MissingRecord {
                table: table.clone(),
                id,
            })?;
            RemovedRecord {
                id,
                checksum: record.stored_checksum(),
            }
        };
        self.announce(&MutationEvent::Deleted {
            table: table.clone(),
            removed,
        });
        Ok(())
    }

    /// Destroy several rows in one statement, then announce `BulkDeleted`.
    pub fn remove_many(&self, table: &TableName, ids: &[RecordId]) -> Result<(), StorageError> {
        let removed = {
            let mut tables = lock(&self.inner.tables);
            let rows = Self::table_mut(&mut tables, table)?;
            for id in ids {
                if !rows.contains_key(id) {
                    return Err(StorageError::MissingRecord {
                        table: table.clone(),
                        id: *id,
                    });
                }
            }
            ids.iter()
                .filter_map(|id| {
                    rows.remove(id).map(|record| RemovedRecord {
                        id: *id,
                        checksum: record.stored_checksum(),
                    })
                })
                .collect::<Vec<_>>()
        };
        self.announce(&MutationEvent::BulkDeleted {
            table: table.clone(),
            removed,
        });
        Ok(())
    }

    /// Overwrite one field without any announcement. Simulates an
    /// out-of-band write that dodges the mutation path.
    pub fn overwrite_field(
        &self,
        table: &TableName,
        id: RecordId,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), StorageError> {
        let mut tables = lock(&self.inner.tables);
        let record = Self::record_mut(&mut tables, table, id)?;
        record.set(name, value);
        Ok(())
    }

    /// Overwrite one stored checksum without any announcement. Simulates
    /// bookkeeping loss or direct tampering with the checksum column.
    pub fn overwrite_stored_checksum(
        &self,
        table: &TableName,
        id: RecordId,
        checksum: Option<Checksum>,
    ) -> Result<(), StorageError> {
        let mut tables = lock(&self.inner.tables);
        let record = Self::record_mut(&mut tables, table, id)?;
        record.set_stored_checksum(checksum);
        Ok(())
    }

    fn announce(&self, event: &MutationEvent) {
        // Snapshot the observer list so no lock is held during dispatch;
        // observers reenter this store to read and write checksums.
        let observers: Vec<Arc<dyn MutationObserver>> = lock(&self.inner.observers).clone();
        for observer in observers {
            observer.on_mutation(event);
        }
    }

    fn table_mut<'t>(
        tables: &'t mut BTreeMap<TableName, Table>,
        table: &TableName,
    ) -> Result<&'t mut Table, StorageError> {
        tables.get_mut(table).ok_or_else(|| StorageError::UnknownTable {
            table: table.clone(),
        })
    }

    fn record_mut<'t>(
        tables: &'t mut BTreeMap<TableName, Table>,
        table: &TableName,
        id: RecordId,
    ) -> Result<&'t mut Record, StorageError> {
        Self::table_mut(tables, table)?
            .get_mut(&id)
            .ok_or_else(|| StorageError::MissingRecord {
                table: table.clone(),
                id,
            })
    }

    /// Replace `record`'s content while keeping the checksum column.
    fn replace_content(
        rows: &mut Table,
        table: &TableName,
        mut record: Record,
    ) -> Result<(), StorageError> {
        let id = record.id();
        let existing = rows.get(&id).ok_or_else(|| StorageError::MissingRecord {
            table: table.clone(),
            id,
        })?;
        record.set_stored_checksum(existing.stored_checksum());
        rows.insert(id, record);
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, table: &TableName) -> Result<Vec<Record>, StorageError> {
        let tables = lock(&self.inner.tables);
        let rows = tables.get(table).ok_or_else(|| StorageError::UnknownTable {
            table: table.clone(),
        })?;
        Ok(rows.values().cloned().collect())
    }

    fn read_one(&self, table: &TableName, id: RecordId) -> Result<Record, StorageError> {
        let tables = lock(&self.inner.tables);
        let rows = tables.get(table).ok_or_else(|| StorageError::UnknownTable {
            table: table.clone(),
        })?;
        rows.get(&id)
            .cloned()
            .ok_or_else(|| StorageError::MissingRecord {
                table: table.clone(),
                id,
            })
    }

    fn write_checksum(
        &self,
        table: &TableName,
        id: RecordId,
        checksum: Checksum,
    ) -> Result<(), StorageError> {
        let mut tables = lock(&self.inner.tables);
        let record = Self::record_mut(&mut tables, table, id)?;
        record.set_stored_checksum(Some(checksum));
        Ok(())
    }
}

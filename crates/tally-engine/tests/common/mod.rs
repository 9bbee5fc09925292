// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tally_core::{
    CatalogConfig, Checksum, Record, RecordId, SchemaCatalog, Storage, StorageError, TableName,
};
use tally_engine::IntegrityEngine;
use tally_store_mem::{ManualClock, MemoryAuditLog, MemoryRegistry, MemoryStorage};

// =============================================================================
// STANDARD HARNESS
// =============================================================================

pub type RecipeEngine = IntegrityEngine<MemoryStorage, MemoryRegistry, MemoryAuditLog, ManualClock>;

/// Fully wired engine over two tracked tables, `recipes` and `ratings`,
/// with the engine subscribed to the storage adapter's announcements.
pub struct Harness {
    pub storage: MemoryStorage,
    pub registry: MemoryRegistry,
    pub audit: MemoryAuditLog,
    pub clock: ManualClock,
    pub engine: Arc<RecipeEngine>,
    pub recipes: TableName,
    pub ratings: TableName,
}

pub fn harness() -> Harness {
    let config: CatalogConfig = serde_json::from_str(
        r#"{
            "tables": [
                { "name": "recipes", "fields": ["title", "body"] },
                { "name": "ratings", "fields": ["score", "comment"] }
            ]
        }"#,
    )
    .expect("catalog config parses");
    let catalog = SchemaCatalog::from_config(config).expect("catalog builds");

    let storage = MemoryStorage::new();
    storage.create_table("recipes");
    storage.create_table("ratings");
    let registry = MemoryRegistry::new();
    let audit = MemoryAuditLog::new();
    let clock = ManualClock::new(1_000);
    let engine = Arc::new(IntegrityEngine::with_clock(
        catalog,
        storage.clone(),
        registry.clone(),
        audit.clone(),
        clock.clone(),
    ));
    storage.subscribe(engine.clone());

    Harness {
        storage,
        registry,
        audit,
        clock,
        engine,
        recipes: TableName::from("recipes"),
        ratings: TableName::from("ratings"),
    }
}

/// Recipe row with only a title; the `body` digest field stays absent.
pub fn recipe(id: u64, title: &str) -> Record {
    Record::new(RecordId(id)).with("title", title)
}

/// Rating row with both digest fields populated.
pub fn rating(id: u64, score: i64, comment: &str) -> Record {
    Record::new(RecordId(id))
        .with("score", score)
        .with("comment", comment)
}

// =============================================================================
// FLAKY STORAGE
// =============================================================================

/// Storage wrapper with switchable failures, for exercising the absorb
/// and isolation paths.
///
/// Content mutations go through the wrapped [`MemoryStorage`] directly (the
/// engine only ever reads and writes checksums), so announcements keep
/// flowing while the port misbehaves.
#[derive(Clone)]
pub struct FlakyStorage {
    pub inner: MemoryStorage,
    offline: Arc<Mutex<Option<TableName>>>,
    checksum_writes_fail: Arc<AtomicBool>,
}

impl FlakyStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            offline: Arc::new(Mutex::new(None)),
            checksum_writes_fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// All reads of `table` fail with `Unavailable` until brought back.
    pub fn take_offline(&self, table: &TableName) {
        *self.offline.lock().expect("offline flag") = Some(table.clone());
    }

    pub fn bring_online(&self) {
        *self.offline.lock().expect("offline flag") = None;
    }

    /// Every checksum write fails with `Unavailable` while set.
    pub fn fail_checksum_writes(&self, fail: bool) {
        self.checksum_writes_fail.store(fail, Ordering::SeqCst);
    }

    fn check_online(&self, table: &TableName) -> Result<(), StorageError> {
        let offline = self.offline.lock().expect("offline flag");
        if offline.as_ref() == Some(table) {
            return Err(StorageError::Unavailable {
                reason: format!("table `{table}` offline"),
            });
        }
        Ok(())
    }
}

impl Storage for FlakyStorage {
    fn read(&self, table: &TableName) -> Result<Vec<Record>, StorageError> {
        self.check_online(table)?;
        self.inner.read(table)
    }

    fn read_one(&self, table: &TableName, id: RecordId) -> Result<Record, StorageError> {
        self.check_online(table)?;
        self.inner.read_one(table, id)
    }

    fn write_checksum(
        &self,
        table: &TableName,
        id: RecordId,
        checksum: Checksum,
    ) -> Result<(), StorageError> {
        if self.checksum_writes_fail.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "checksum column offline".to_owned(),
            });
        }
        self.check_online(table)?;
        self.inner.write_checksum(table, id, checksum)
    }
}

pub type FlakyEngine = IntegrityEngine<FlakyStorage, MemoryRegistry, MemoryAuditLog, ManualClock>;

/// Engine over three tracked tables, reading through a [`FlakyStorage`].
pub struct FlakyHarness {
    pub storage: MemoryStorage,
    pub flaky: FlakyStorage,
    pub registry: MemoryRegistry,
    pub audit: MemoryAuditLog,
    pub clock: ManualClock,
    pub engine: Arc<FlakyEngine>,
    pub starters: TableName,
    pub mains: TableName,
    pub desserts: TableName,
}

pub fn flaky_harness() -> FlakyHarness {
    let config: CatalogConfig = serde_json::from_str(
        r#"{
            "tables": [
                { "name": "starters", "fields": ["title"] },
                { "name": "mains", "fields": ["title"] },
                { "name": "desserts", "fields": ["title"] }
            ]
        }"#,
    )
    .expect("catalog config parses");
    let catalog = SchemaCatalog::from_config(config).expect("catalog builds");

    let storage = MemoryStorage::new();
    for table in ["starters", "mains", "desserts"] {
        storage.create_table(table);
    }
    let flaky = FlakyStorage::new(storage.clone());
    let registry = MemoryRegistry::new();
    let audit = MemoryAuditLog::new();
    let clock = ManualClock::new(1_000);
    let engine = Arc::new(IntegrityEngine::with_clock(
        catalog,
        flaky.clone(),
        registry.clone(),
        audit.clone(),
        clock.clone(),
    ));
    storage.subscribe(engine.clone());

    FlakyHarness {
        storage,
        flaky,
        registry,
        audit,
        clock,
        engine,
        starters: TableName::from("starters"),
        mains: TableName::from("mains"),
        desserts: TableName::from("desserts"),
    }
}

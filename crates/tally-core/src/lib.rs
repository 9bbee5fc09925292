// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Record/table checksum model and collaborator ports for Tally.
//!
//! Tally keeps a tamper-indicator per stored row (the *record checksum*) and
//! an aggregate per table (the *table aggregate*, the plain sum of all stored
//! record checksums). `tally-core` is the pure layer: the value model, the
//! digest itself, the tracked-table catalog, the typed mutation events the
//! storage collaborator emits, and the port traits the engine is wired
//! against. The services that keep checksums synchronized live in
//! `tally-engine`; in-memory adapters for the ports live in
//! `tally-store-mem`.
//!
//! # Digest Policy
//!
//! The record checksum is the sum of the Unicode code points of a canonical
//! concatenation of the record's schema-listed fields, reduced modulo a
//! small deployment-fixed constant (see [`record_checksum`]). It is a weak,
//! collision-prone arithmetic digest by contract: a cheap indicator that a
//! row was modified out of band, **not** a cryptographic integrity control.
//! Strengthening it would change every stored checksum and is therefore a
//! breaking change to deployed data, not a drop-in improvement.
//!
//! # Determinism Invariant
//!
//! Digest input order comes from the table schema's explicit field list,
//! never from the in-memory representation of a record. Two records with
//! identical semantic field values digest identically regardless of map
//! insertion order, untracked metadata, or which process computed them.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod audit;
mod digest;
mod event;
mod ident;
mod port;
mod record;
mod registry;
mod schema;
mod value;

pub use audit::{AuditEvent, AuditKind, Severity};
pub use digest::{canonical_payload, record_checksum, Checksum, DigestModulus, InvalidModulus};
pub use event::{MutationEvent, MutationKind, MutationObserver, RemovedRecord};
pub use ident::{RecordId, TableName};
pub use port::{
    AuditQuery, AuditQueryError, AuditSink, Clock, RegistryError, RegistryStore, Storage,
    StorageError, SystemClock,
};
pub use record::Record;
pub use registry::{TableAggregate, TableState};
pub use schema::{CatalogConfig, SchemaCatalog, SchemaError, TableConfig, TableSchema};
pub use value::{FieldValue, Timestamp};

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Integrity engine over tracked tables.
//!
//! One service object, [`IntegrityEngine`], wires four injected
//! collaborators together: row access ([`Storage`](tally_core::Storage)),
//! the per-table aggregate registry ([`RegistryStore`](tally_core::RegistryStore)),
//! the incident log ([`AuditSink`](tally_core::AuditSink)), and a
//! [`Clock`](tally_core::Clock). On top of them it runs the four integrity
//! roles:
//!
//! - **maintenance** — as a [`MutationObserver`](tally_core::MutationObserver)
//!   it keeps per-record checksums and the table aggregate current on every
//!   announced mutation, absorbing its own failures;
//! - **aggregate verification** — recompute-and-compare of the stored
//!   aggregate row ([`AggregateCheck`]);
//! - **record verification** — per-row recompute-and-compare, the tamper
//!   detector ([`RecordVerification`]);
//! - **repair** — full recalculation of one table or all of them, the only
//!   path that returns a degraded table to `Reconciled` ([`TableRepair`],
//!   [`RepairRun`]).
//!
//! Reporting surfaces for embedders are [`StatusReport`],
//! [`IntegrityDetail`], [`SweepReport`], and the recent-violations query.
//!
//! The engine holds no mutable state of its own; every durable fact lives
//! behind a port. That is what makes concurrent use safe: any interleaving
//! of maintenance, verification, and repair settles on a state derivable
//! from current storage, because each registry write is a single atomic
//! upsert derived from a fresh scan or a known baseline.

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
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::option_if_let_else,
    clippy::use_self
)]

mod engine;
mod maintain;
mod repair;
mod status;
mod verify;

pub use engine::{EngineError, IntegrityEngine};
pub use repair::{FailedRepair, RepairRun, TableRepair};
pub use status::{
    IntegrityDetail, StatusReport, StatusTotals, TableStatus, DEFAULT_VIOLATION_PAGE,
    MAX_VIOLATION_PAGE,
};
pub use verify::{AggregateCheck, RecordVerification, SweepEntry, SweepReport, VerificationFinding};

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory adapters for every Tally port.
//!
//! [`MemoryStorage`] plays the storage collaborator: it owns tables of
//! records, announces mutations to subscribed observers, and exposes the
//! out-of-band overwrite hooks that integrity tests need to simulate
//! tampering. [`MemoryRegistry`] and [`MemoryAuditLog`] back the aggregate
//! registry and the incident log; [`ManualClock`] makes time an input.
//!
//! All adapters are cheap `Clone` handles over shared state, so a test can
//! keep one handle and give another to the engine. Everything synchronizes
//! internally — ports take `&self` by contract — and no lock is ever held
//! across observer dispatch, so observers may reenter the adapter freely.
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
    clippy::use_self
)]

mod audit;
mod clock;
mod registry;
mod storage;

pub use audit::MemoryAuditLog;
pub use clock::ManualClock;
pub use registry::MemoryRegistry;
pub use storage::MemoryStorage;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, adopting the inner state if a holder panicked.
///
/// The adapters guard plain data with no invariants that a panic could
/// half-apply, so the poisoned state is still the current state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

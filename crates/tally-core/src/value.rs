// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed field values and their canonical digest text.
//!
//! The digest concatenates one canonical string per schema field (see
//! [`canonical_payload`](crate::canonical_payload)). Canonical forms are part
//! of the deployed-data contract — changing any of them changes every stored
//! checksum:
//!
//! - `Null` (and absent fields) → the empty string
//! - `Text` → the text itself, unescaped
//! - `Integer` → decimal, `-` sign for negatives
//! - `Boolean` → `true` / `false`
//! - `Timestamp` → fixed-width UTC ISO-8601 with millisecond precision
//!   (`2024-05-01T12:00:00.000Z`)

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Wall-clock instant in unix milliseconds (UTC).
///
/// Used for registry `computed_at` stamps, audit event times, and timestamp
/// field values. Millisecond precision is deliberate: it matches what the
/// storage collaborator's drivers deliver, and the canonical ISO-8601 form is
/// fixed-width because of it.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Unix epoch (1970-01-01T00:00:00.000Z).
    pub const EPOCH: Self = Self(0);

    /// Construct from unix milliseconds.
    #[must_use]
    pub fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Unix milliseconds since the epoch.
    #[must_use]
    pub fn unix_millis(self) -> i64 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`, clamped at zero.
    #[must_use]
    pub fn saturating_millis_since(self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0).max(0)
    }

    /// Canonical fixed-width UTC ISO-8601 rendering with millisecond
    /// precision.
    ///
    /// Total: instants outside the representable datetime range (far beyond
    /// any plausible row timestamp) fall back to the raw millisecond count in
    /// decimal, keeping the rendering deterministic for every input.
    #[must_use]
    pub fn to_iso8601(self) -> String {
        let format = time::macros::format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        );
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0) * 1_000_000)
            .ok()
            .and_then(|dt| dt.format(&format).ok())
            .unwrap_or_else(|| self.0.to_string())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// A single semantic field value as the digest sees it.
///
/// This is the vocabulary of tracked content: anything the storage
/// collaborator hands over is normalized into one of these before digesting.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum FieldValue {
    /// SQL NULL / absent value. Digests as the empty string.
    Null,
    /// Free text, digested as-is.
    Text(String),
    /// Signed integer, digested in decimal.
    Integer(i64),
    /// Boolean, digested as `true` / `false`.
    Boolean(bool),
    /// Instant, digested in the fixed ISO-8601 form.
    Timestamp(Timestamp),
}

impl FieldValue {
    /// Append this value's canonical digest text to `out`.
    pub fn write_canonical(&self, out: &mut String) {
        match self {
            Self::Null => {}
            Self::Text(s) => out.push_str(s),
            Self::Integer(n) => {
                let _ = write!(out, "{n}");
            }
            Self::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Timestamp(ts) => out.push_str(&ts.to_iso8601()),
        }
    }

    /// Canonical digest text as an owned string.
    #[must_use]
    pub fn canonical_text(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(ts: Timestamp) -> Self {
        Self::Timestamp(ts)
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The record digest: canonical payload assembly and the modular checksum.
//!
//! The digest is deliberately weak (a modular sum of code points) — it
//! detects accidental corruption and casual tampering, not adversaries. See
//! the crate docs before "strengthening" it: every stored checksum in a
//! deployed table was produced by exactly this function.

use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::schema::TableSchema;

/// A computed or stored record checksum.
///
/// Always strictly less than the modulus of the schema that produced it.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(pub u32);

impl Checksum {
    /// Raw checksum value.
    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Divisor for the modular digest, validated to be at least 2.
///
/// A modulus of 0 would divide by zero and a modulus of 1 would collapse
/// every checksum to 0, so neither is representable.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DigestModulus(u32);

impl DigestModulus {
    /// The default divisor. Small on purpose: checksums stay single-digit
    /// and legible next to the rows they protect.
    pub const DEFAULT: Self = Self(7);

    /// Validate `value` as a digest modulus.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidModulus`] when `value` is 0 or 1.
    pub fn new(value: u32) -> Result<Self, InvalidModulus> {
        if value >= 2 {
            Ok(Self(value))
        } else {
            Err(InvalidModulus(value))
        }
    }

    /// The divisor.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for DigestModulus {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for DigestModulus {
    type Error = InvalidModulus;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DigestModulus> for u32 {
    fn from(m: DigestModulus) -> Self {
        m.0
    }
}

/// Rejected digest modulus (0 or 1).
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
#[error("digest modulus must be at least 2, got {0}")]
pub struct InvalidModulus(pub u32);

/// Concatenation of the canonical text of every digest field, in the order
/// the schema declares them.
///
/// Fields absent from the record contribute the empty string, exactly like
/// an explicit `Null`. Non-digest fields on the record are ignored, which is
/// what keeps identity and bookkeeping metadata out of the checksum.
#[must_use]
pub fn canonical_payload(record: &Record, schema: &TableSchema) -> String {
    let mut out = String::new();
    for name in schema.digest_fields() {
        if let Some(value) = record.field(name) {
            value.write_canonical(&mut out);
        }
    }
    out
}

/// Checksum of `record` under `schema`: the sum of the Unicode code points
/// of the canonical payload, reduced modulo the schema's divisor.
///
/// Total and deterministic — same record and schema, same checksum, on every
/// platform.
#[must_use]
pub fn record_checksum(record: &Record, schema: &TableSchema) -> Checksum {
    let modulus = u64::from(schema.modulus().get());
    let mut acc: u64 = 0;
    for ch in canonical_payload(record, schema).chars() {
        acc = (acc + u64::from(u32::from(ch))) % modulus;
    }
    // The remainder is strictly below the u32 modulus.
    Checksum(u32::try_from(acc).unwrap_or(u32::MAX))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ident::RecordId;
    use crate::value::{FieldValue, Timestamp};

    fn schema(fields: &[&str]) -> TableSchema {
        TableSchema::new("recipes", fields.iter().copied()).unwrap()
    }

    // ── 1. worked example: "SoupStir" mod 7 ─────────────────────────────

    #[test]
    fn known_payload_checksum() {
        let rec = Record::new(RecordId(1))
            .with("title", "Soup")
            .with("body", "Stir");
        let schema = schema(&["title", "body"]);
        assert_eq!(canonical_payload(&rec, &schema), "SoupStir");
        // Code points of "SoupStir" sum to 841; 841 mod 7 = 1.
        assert_eq!(record_checksum(&rec, &schema), Checksum(1));
    }

    // ── 2. null and absent fields digest identically ────────────────────

    #[test]
    fn null_and_absent_are_equivalent() {
        let schema = schema(&["title", "note"]);
        let with_null = Record::new(RecordId(1))
            .with("title", "Soup")
            .with("note", FieldValue::Null);
        let without = Record::new(RecordId(2)).with("title", "Soup");
        assert_eq!(
            canonical_payload(&with_null, &schema),
            canonical_payload(&without, &schema)
        );
        assert_eq!(
            record_checksum(&with_null, &schema),
            record_checksum(&without, &schema)
        );
    }

    // ── 3. non-digest fields never influence the checksum ───────────────

    #[test]
    fn extra_fields_are_ignored() {
        let schema = schema(&["title"]);
        let plain = Record::new(RecordId(1)).with("title", "Soup");
        let decorated = Record::new(RecordId(1))
            .with("title", "Soup")
            .with("updated_at", Timestamp::from_unix_millis(123))
            .with("audit_note", "edited twice");
        assert_eq!(
            record_checksum(&plain, &schema),
            record_checksum(&decorated, &schema)
        );
    }

    // ── 4. payload order follows the schema, not the record ─────────────

    #[test]
    fn schema_declaration_order_governs() {
        let rec = Record::new(RecordId(1)).with("a", "x").with("b", "y");
        let forward = schema(&["a", "b"]);
        let reverse = schema(&["b", "a"]);
        assert_eq!(canonical_payload(&rec, &forward), "xy");
        assert_eq!(canonical_payload(&rec, &reverse), "yx");
    }

    // ── 5. non-ASCII text sums code points, not bytes or code units ─────

    #[test]
    fn unicode_sums_code_points() {
        let rec = Record::new(RecordId(1)).with("title", "é");
        // U+00E9 is 233; 233 mod 7 = 2. A byte-based sum over the two-byte
        // UTF-8 encoding would disagree.
        assert_eq!(record_checksum(&rec, &schema(&["title"])), Checksum(2));

        // Supplementary plane: U+1F35C is one code point, 127836; mod 7 = 2.
        // A UTF-16 code-unit sum would see a surrogate pair instead.
        let rec = Record::new(RecordId(2)).with("title", "🍜");
        assert_eq!(record_checksum(&rec, &schema(&["title"])), Checksum(2));
    }

    // ── 6. checksum is always below the modulus ─────────────────────────

    #[test]
    fn checksum_stays_below_modulus() {
        let schema = schema(&["title", "body"]);
        for text in ["", "a", "Pancakes", "a much longer description of steps"] {
            let rec = Record::new(RecordId(1)).with("title", text).with("body", text);
            assert!(record_checksum(&rec, &schema).value() < schema.modulus().get());
        }
    }

    // ── 7. modulus validation ───────────────────────────────────────────

    #[test]
    fn modulus_rejects_degenerate_divisors() {
        assert_eq!(DigestModulus::new(0), Err(InvalidModulus(0)));
        assert_eq!(DigestModulus::new(1), Err(InvalidModulus(1)));
        assert_eq!(DigestModulus::new(2).unwrap().get(), 2);
        assert_eq!(DigestModulus::default(), DigestModulus::DEFAULT);
    }

    // ── 8. empty payload digests to zero ────────────────────────────────

    #[test]
    fn empty_payload_is_zero() {
        let rec = Record::new(RecordId(1));
        let schema = schema(&["title", "body"]);
        assert_eq!(canonical_payload(&rec, &schema), "");
        assert_eq!(record_checksum(&rec, &schema), Checksum(0));
    }
}

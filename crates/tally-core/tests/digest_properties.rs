// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use proptest::prelude::*;

use tally_core::{
    canonical_payload, record_checksum, DigestModulus, FieldValue, Record, RecordId, TableSchema,
    Timestamp,
};

// 9999-12-31T23:59:59.999Z, the last instant that renders with a 4-digit year.
const MAX_RENDERABLE_MILLIS: i64 = 253_402_300_799_999;

fn field_value() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        Just(FieldValue::Null),
        any::<String>().prop_map(FieldValue::Text),
        any::<i64>().prop_map(FieldValue::Integer),
        any::<bool>().prop_map(FieldValue::Boolean),
        (0..=MAX_RENDERABLE_MILLIS)
            .prop_map(|ms| FieldValue::Timestamp(Timestamp::from_unix_millis(ms))),
    ]
}

fn schema_for(field_count: usize, modulus: u32) -> TableSchema {
    let fields = (0..field_count.max(1)).map(|i| format!("f{i}"));
    TableSchema::new("props", fields)
        .unwrap()
        .with_modulus(DigestModulus::new(modulus).unwrap())
}

fn record_for(values: &[FieldValue]) -> Record {
    let mut rec = Record::new(RecordId(1));
    for (i, value) in values.iter().enumerate() {
        rec.set(format!("f{i}"), value.clone());
    }
    rec
}

proptest! {
    // Same record, same schema, same checksum, every time.
    #[test]
    fn checksum_is_deterministic(
        values in prop::collection::vec(field_value(), 0..6),
        modulus in 2u32..10_000,
    ) {
        let schema = schema_for(values.len(), modulus);
        let rec = record_for(&values);
        prop_assert_eq!(record_checksum(&rec, &schema), record_checksum(&rec, &schema));
        prop_assert_eq!(
            canonical_payload(&rec, &schema),
            canonical_payload(&rec, &schema)
        );
    }

    // The checksum is a residue: always strictly below the modulus.
    #[test]
    fn checksum_stays_below_modulus(
        values in prop::collection::vec(field_value(), 0..6),
        modulus in 2u32..10_000,
    ) {
        let schema = schema_for(values.len(), modulus);
        let rec = record_for(&values);
        prop_assert!(record_checksum(&rec, &schema).value() < modulus);
    }

    // Fields outside the schema never reach the digest.
    #[test]
    fn untracked_fields_never_matter(
        values in prop::collection::vec(field_value(), 1..6),
        extra in any::<String>(),
    ) {
        let schema = schema_for(values.len(), 7);
        let plain = record_for(&values);
        let mut decorated = plain.clone();
        decorated.set("x_untracked", extra);
        decorated.set("x_updated_at", Timestamp::from_unix_millis(999));
        prop_assert_eq!(
            record_checksum(&plain, &schema),
            record_checksum(&decorated, &schema)
        );
    }

    // An explicit Null digests exactly like a missing field.
    #[test]
    fn null_equals_absent(values in prop::collection::vec(field_value(), 1..6)) {
        let schema = schema_for(values.len() + 1, 7);
        let without = record_for(&values);
        let mut with_null = without.clone();
        with_null.set(format!("f{}", values.len()), FieldValue::Null);
        prop_assert_eq!(
            canonical_payload(&without, &schema),
            canonical_payload(&with_null, &schema)
        );
        prop_assert_eq!(
            record_checksum(&without, &schema),
            record_checksum(&with_null, &schema)
        );
    }

    // The canonical payload is the in-order concatenation of per-field text.
    #[test]
    fn payload_concatenates_in_schema_order(
        values in prop::collection::vec(field_value(), 1..6),
    ) {
        let schema = schema_for(values.len(), 7);
        let rec = record_for(&values);
        let expected: String = values.iter().map(FieldValue::canonical_text).collect();
        prop_assert_eq!(canonical_payload(&rec, &schema), expected);
    }

    // Every renderable instant formats to the same 24-char UTC shape.
    #[test]
    fn timestamp_rendering_is_fixed_width(ms in 0..=MAX_RENDERABLE_MILLIS) {
        let rendered = Timestamp::from_unix_millis(ms).to_iso8601();
        prop_assert_eq!(rendered.len(), 24);
        prop_assert!(rendered.ends_with('Z'));
        prop_assert_eq!(&rendered[4..5], "-");
        prop_assert_eq!(&rendered[10..11], "T");
        prop_assert_eq!(&rendered[19..20], ".");
    }
}

/// Extended JSON bridge tests: canonical wrappers in both directions, relaxed
/// and legacy forms accepted on input, and precision guarantees.
use ejson_core::{
    decode_json, from_extended_json, to_extended_json, Binary, Decimal128, Document, Int64,
    ObjectId, Regex, ShellError, Timestamp, Value,
};
use serde_json::json;

fn from(json: serde_json::Value) -> Value {
    from_extended_json(&json).unwrap()
}

// ============================================================================
// Value → Extended JSON
// ============================================================================

#[test]
fn plain_scalars_stay_plain() {
    assert_eq!(to_extended_json(&Value::Null), json!(null));
    assert_eq!(to_extended_json(&Value::Bool(true)), json!(true));
    assert_eq!(to_extended_json(&Value::Number(10.0)), json!(10));
    assert_eq!(to_extended_json(&Value::Number(2.5)), json!(2.5));
    assert_eq!(to_extended_json(&Value::from("x")), json!("x"));
}

#[test]
fn absent_root_is_null() {
    assert_eq!(to_extended_json(&Value::Absent), json!(null));
}

#[test]
fn non_finite_number_uses_double_wrapper() {
    assert_eq!(
        to_extended_json(&Value::Number(f64::INFINITY)),
        json!({ "$numberDouble": "Infinity" })
    );
}

#[test]
fn typed_scalars_use_canonical_wrappers() {
    let oid = ObjectId::parse_str("5f0c4c7e2f8fb814b56fa181").unwrap();
    assert_eq!(
        to_extended_json(&Value::ObjectId(oid)),
        json!({ "$oid": "5f0c4c7e2f8fb814b56fa181" })
    );
    assert_eq!(
        to_extended_json(&Value::Int32(7)),
        json!({ "$numberInt": "7" })
    );
    assert_eq!(
        to_extended_json(&Value::Int64(Int64::from(-3))),
        json!({ "$numberLong": "-3" })
    );
    assert_eq!(
        to_extended_json(&Value::Decimal128(Decimal128::parse("0.10").unwrap())),
        json!({ "$numberDecimal": "0.10" })
    );
    assert_eq!(
        to_extended_json(&Value::Double(1.0)),
        json!({ "$numberDouble": "1" })
    );
    assert_eq!(
        to_extended_json(&Value::DateTime(1_577_836_800_000)),
        json!({ "$date": { "$numberLong": "1577836800000" } })
    );
    assert_eq!(
        to_extended_json(&Value::Timestamp(Timestamp { t: 5, i: 1 })),
        json!({ "$timestamp": { "t": 5, "i": 1 } })
    );
    assert_eq!(
        to_extended_json(&Value::Binary(Binary::from_bytes(0x80, &[1, 2, 3]))),
        json!({ "$binary": { "base64": "AQID", "subType": "80" } })
    );
    assert_eq!(
        to_extended_json(&Value::Regex(Regex::new("^a", "xi").unwrap())),
        json!({ "$regularExpression": { "pattern": "^a", "options": "ix" } })
    );
}

#[test]
fn absent_fields_are_dropped_and_array_slots_become_null() {
    let mut doc = Document::new();
    doc.insert("a", Value::Absent);
    doc.insert("b", Value::Array(vec![Value::Absent, Value::Number(1.0)]));
    assert_eq!(
        to_extended_json(&Value::Document(doc)),
        json!({ "b": [null, 1] })
    );
}

#[test]
fn serialize_via_serde() {
    let value = Value::Int64(Int64::from(9));
    assert_eq!(
        serde_json::to_string(&value).unwrap(),
        r#"{"$numberLong":"9"}"#
    );
}

// ============================================================================
// Extended JSON → Value
// ============================================================================

#[test]
fn canonical_wrappers_are_recognised() {
    assert_eq!(
        from(json!({ "$oid": "5f0c4c7e2f8fb814b56fa181" })),
        Value::ObjectId(ObjectId::parse_str("5f0c4c7e2f8fb814b56fa181").unwrap())
    );
    assert_eq!(from(json!({ "$numberInt": "42" })), Value::Int32(42));
    assert_eq!(
        from(json!({ "$numberLong": "9223372036854775807" })),
        Value::Int64(Int64::parse("9223372036854775807").unwrap())
    );
    assert_eq!(from(json!({ "$numberDouble": "-Infinity" })), Value::Double(f64::NEG_INFINITY));
    assert_eq!(
        from(json!({ "$timestamp": { "t": 1, "i": 2 } })),
        Value::Timestamp(Timestamp { t: 1, i: 2 })
    );
}

#[test]
fn date_forms() {
    assert_eq!(
        from(json!({ "$date": { "$numberLong": "-1" } })),
        Value::DateTime(-1)
    );
    assert_eq!(
        from(json!({ "$date": "2020-01-01T00:00:00Z" })),
        Value::DateTime(1_577_836_800_000)
    );
    assert_eq!(from(json!({ "$date": 86400000 })), Value::DateTime(86_400_000));
}

#[test]
fn binary_canonical_and_legacy_forms() {
    let expected = Value::Binary(Binary::new(4, "aGVsbG8=").unwrap());
    assert_eq!(
        from(json!({ "$binary": { "base64": "aGVsbG8=", "subType": "04" } })),
        expected
    );
    assert_eq!(from(json!({ "$binary": "aGVsbG8=", "$type": "04" })), expected);
}

#[test]
fn buffer_object_id_form() {
    let bytes: serde_json::Map<String, serde_json::Value> =
        (0..12).map(|i| (i.to_string(), json!(i * 10))).collect();
    let value = from(json!({ "id": bytes }));
    let expected: [u8; 12] = [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110];
    assert_eq!(value, Value::ObjectId(ObjectId::from_bytes(expected)));
}

#[test]
fn unknown_dollar_key_is_a_plain_document() {
    let value = from(json!({ "$gt": 5 }));
    let mut doc = Document::new();
    doc.insert("$gt", Value::Number(5.0));
    assert_eq!(value, Value::Document(doc));
}

#[test]
fn wrapper_with_extra_keys_is_a_plain_document() {
    let value = from(json!({ "$oid": "5f0c4c7e2f8fb814b56fa181", "x": 1 }));
    assert!(matches!(value, Value::Document(ref doc) if doc.len() == 2));
}

#[test]
fn field_order_is_preserved() {
    let value = decode_json(r#"{"z":1,"a":2,"m":3}"#).unwrap();
    let doc = value.as_document().unwrap();
    let keys: Vec<&String> = doc.keys().collect();
    assert_eq!(keys, ["z", "a", "m"]);
}

// ============================================================================
// Precision and errors
// ============================================================================

#[test]
fn unsafe_plain_integer_is_precision_loss() {
    assert!(matches!(
        decode_json("9007199254740993"),
        Err(ShellError::PrecisionLoss(_))
    ));
    assert!(matches!(
        decode_json("18446744073709551615"),
        Err(ShellError::PrecisionLoss(_))
    ));
}

#[test]
fn safe_plain_integer_is_accepted() {
    assert_eq!(decode_json("9007199254740992").unwrap(), Value::Number(9_007_199_254_740_992.0));
}

#[test]
fn out_of_range_number_long_is_precision_loss() {
    assert!(matches!(
        from_extended_json(&json!({ "$numberLong": "9223372036854775808" })),
        Err(ShellError::PrecisionLoss(_))
    ));
}

#[test]
fn oversized_decimal_is_precision_loss() {
    let digits = "9".repeat(35);
    assert!(matches!(
        from_extended_json(&json!({ "$numberDecimal": digits })),
        Err(ShellError::PrecisionLoss(_))
    ));
}

#[test]
fn malformed_wrappers_are_rejected() {
    for bad in [
        json!({ "$oid": "nothex" }),
        json!({ "$numberInt": "1.5" }),
        json!({ "$numberLong": "abc" }),
        json!({ "$binary": { "base64": "!!", "subType": "00" } }),
        json!({ "$regularExpression": { "pattern": "a", "options": "ii" } }),
        json!({ "$timestamp": { "t": -1, "i": 0 } }),
        json!({ "$regularExpression": { "pattern": "a", "options": "z" } }),
    ] {
        assert!(
            matches!(from_extended_json(&bad), Err(ShellError::ExtendedJson(_))),
            "expected rejection of {bad}"
        );
    }
}

#[test]
fn date_outside_script_range_is_rejected() {
    for ms in ["9223372036854775807", "-8640000000000001"] {
        let json = json!({ "$date": { "$numberLong": ms } });
        assert!(
            matches!(from_extended_json(&json), Err(ShellError::ExtendedJson(_))),
            "expected rejection of {json}"
        );
    }
    assert_eq!(
        from(json!({ "$date": { "$numberLong": "8640000000000000" } })),
        Value::DateTime(8_640_000_000_000_000)
    );
}

#[test]
fn regex_pattern_starting_with_star_is_rejected() {
    let json = json!({ "$regularExpression": { "pattern": "*a", "options": "" } });
    assert!(matches!(
        from_extended_json(&json),
        Err(ShellError::ExtendedJson(_))
    ));
    assert_eq!(
        from(json!({ "$regularExpression": { "pattern": "a*", "options": "" } })),
        Value::Regex(Regex::new("a*", "").unwrap())
    );
}

#[test]
fn invalid_json_text_is_json_error() {
    assert!(matches!(decode_json("{"), Err(ShellError::Json(_))));
}

#[test]
fn deserialize_via_serde() {
    let value: Value = serde_json::from_str(r#"{"n":{"$numberLong":"5"}}"#).unwrap();
    let doc = value.as_document().unwrap();
    assert_eq!(doc.get("n"), Some(&Value::Int64(Int64::from(5))));
}

#[test]
fn document_deserialize_via_serde() {
    let doc: Document =
        serde_json::from_str(r#"{"_id":{"$oid":"5f0c4c7e2f8fb814b56fa181"},"n":1}"#).unwrap();
    let keys: Vec<&String> = doc.keys().collect();
    assert_eq!(keys, ["_id", "n"]);
    assert_eq!(
        serde_json::to_string(&doc).unwrap(),
        r#"{"_id":{"$oid":"5f0c4c7e2f8fb814b56fa181"},"n":1}"#
    );
    assert!(serde_json::from_str::<Document>("[1, 2]").is_err());
}

use ejson_core::{decode, encode_json, EncodeOptions};

/// Assert that Extended JSON → shell text → Extended JSON is the identity.
fn assert_roundtrip(json: &str) {
    for options in [EncodeOptions::compact(), EncodeOptions::pretty(2)] {
        let shell = encode_json(json, options).expect("encode failed");
        let decoded = decode(&shell).expect("decode failed").to_extended_json();
        let original: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(
            original, decoded,
            "Roundtrip failed:\n  input JSON: {json}\n  shell:      {shell}\n  output JSON: {decoded}"
        );
    }
}

// ============================================================================
// Documents as a server returns them
// ============================================================================

#[test]
fn roundtrip_user_document() {
    assert_roundtrip(
        r#"{
            "_id": {"$oid": "5f0c4c7e2f8fb814b56fa181"},
            "name": "Alice",
            "age": 31,
            "score": 97.5,
            "active": true,
            "manager": null,
            "tags": ["admin", "on-call"],
            "joined": {"$date": {"$numberLong": "1577836800123"}}
        }"#,
    );
}

#[test]
fn roundtrip_precise_numerics() {
    assert_roundtrip(
        r#"{
            "big": {"$numberLong": "9223372036854775807"},
            "small": {"$numberLong": "-9223372036854775808"},
            "unsafe": {"$numberLong": "9007199254740993"},
            "money": {"$numberDecimal": "1234567890123456789012345678.90"},
            "nan": {"$numberDecimal": "NaN"}
        }"#,
    );
}

#[test]
fn roundtrip_binary_timestamp_regex() {
    assert_roundtrip(
        r#"{
            "uuid": {"$binary": {"base64": "3q2+7wAAAAAAAAAAAAAAAA==", "subType": "04"}},
            "ts": {"$timestamp": {"t": 1600000000, "i": 7}},
            "pattern": {"$regularExpression": {"pattern": "^ab+c$", "options": "im"}}
        }"#,
    );
}

#[test]
fn roundtrip_keys_needing_quotes() {
    assert_roundtrip(r#"{"a-b": 1, "a.b": 2, "1st": 3, "": 4, "ok_$": 5, "with space": 6}"#);
}

#[test]
fn roundtrip_query_operators() {
    assert_roundtrip(
        r#"{"$or": [{"age": {"$gte": 18, "$lt": 65}}, {"vip": {"$exists": true}}]}"#,
    );
}

#[test]
fn roundtrip_nested_empty_containers() {
    assert_roundtrip(r#"{"a": {}, "b": [], "c": [[], {}, [{}]]}"#);
}

#[test]
fn roundtrip_string_escapes() {
    assert_roundtrip(r#"{"s": "quote \" backslash \\ newline \n tab \t nul \u0000 é 😀"}"#);
}

#[test]
fn roundtrip_dates_at_the_edges() {
    assert_roundtrip(r#"{"epoch": {"$date": {"$numberLong": "0"}}}"#);
    assert_roundtrip(r#"{"before": {"$date": {"$numberLong": "-1"}}}"#);
    assert_roundtrip(r#"{"far": {"$date": {"$numberLong": "8640000000000000"}}}"#);
}

#[test]
fn roundtrip_large_and_fractional_numbers() {
    assert_roundtrip(r#"[0, -1, 9007199254740992, 0.1, 1e-7, 1.5e300, -2.5]"#);
}

// ============================================================================
// Shell text in, shell text out
// ============================================================================

#[test]
fn reencoding_decoded_text_is_stable() {
    let text = r#"{ _id: ObjectId("5f0c4c7e2f8fb814b56fa181"), n: NumberLong("7"), when: ISODate("2020-01-01T00:00:00.000Z"), re: /x/i }"#;
    let value = decode(text).unwrap();
    assert_eq!(ejson_core::encode(&value), text);
}

#[test]
fn hand_written_text_normalizes() {
    let value = decode("{'a-b': 0x10, c: new ISODate('2020-01-01'), d: [1,,2], e: undefined,}").unwrap();
    assert_eq!(
        ejson_core::encode(&value),
        r#"{ "a-b": 16, c: ISODate("2020-01-01T00:00:00.000Z"), d: [1, null, 2] }"#
    );
}

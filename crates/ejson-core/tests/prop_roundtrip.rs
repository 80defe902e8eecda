/// Property-based roundtrip tests for the shell codec.
///
/// Uses the `proptest` crate to generate random canonical values (every typed
/// scalar, nested documents and arrays) and verify that
/// `decode(encode(value))` is semantically equal to the input in both compact
/// and pretty layouts.
///
/// Excluded from generation:
/// - Non-finite plain numbers (they canonicalize to `null`)
/// - Regex patterns containing `/`, `\`, `[` or line breaks (escaping changes
///   the source text), patterns starting with `*` (they would open a
///   comment) and the empty pattern (it prints as `(?:)`)
use ejson_core::{
    decode, encode, encode_pretty, from_extended_json, parse_command, to_extended_json, Binary,
    Decimal128, Document, FailureKind, Int64, ObjectId, Regex, ShellError, Timestamp, Value,
};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Field names: bare identifiers plus ones that need quoting.
fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => prop::string::string_regex("[a-zA-Z_$][a-zA-Z0-9_$]{0,10}").unwrap(),
        1 => prop::string::string_regex("[a-z0-9 .\\-]{0,10}").unwrap(),
        1 => Just("héllo".to_string()),
    ]
}

fn arb_string() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,30}",
        any::<String>(),
        Just(String::new()),
        Just("say \"hi\"\\\n\t\u{1}".to_string()),
        Just("ObjectId(\"x\")".to_string()),
    ]
}

fn arb_finite() -> impl Strategy<Value = f64> {
    prop_oneof![
        any::<f64>().prop_filter("finite", |n| n.is_finite()),
        (-1_000_000i64..1_000_000i64).prop_map(|n| n as f64),
        Just(9_007_199_254_740_992.0),
        Just(1e21),
        Just(1e-7),
    ]
}

/// Milliseconds covering four-digit years (ISODate form) and beyond (Date form).
fn arb_millis() -> impl Strategy<Value = i64> {
    prop_oneof![
        3 => -62_135_596_800_000i64..253_402_300_799_999i64,
        1 => 253_402_300_800_000i64..8_640_000_000_000_000i64,
        1 => -8_640_000_000_000_000i64..-62_135_596_800_000i64,
    ]
}

fn arb_regex() -> impl Strategy<Value = Regex> {
    (
        "[a-z0-9^$.*+?()|{}]{1,12}",
        prop::sample::subsequence(vec!['g', 'i', 'm', 's', 'u', 'x'], 0..=6),
    )
        .prop_filter_map("valid regex", |(pattern, flags): (String, Vec<char>)| {
            if pattern.starts_with('*') {
                return None;
            }
            let flags: String = flags.into_iter().collect();
            Regex::new(pattern, &flags)
        })
}

fn arb_decimal() -> impl Strategy<Value = Decimal128> {
    "-?[0-9]{1,20}(\\.[0-9]{1,12})?(E[+-]?[0-9]{1,3})?"
        .prop_filter_map("valid decimal", |text| Decimal128::parse(&text).ok())
}

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        arb_finite().prop_map(Value::Number),
        arb_string().prop_map(Value::String),
        any::<[u8; 12]>().prop_map(|b| Value::ObjectId(ObjectId::from_bytes(b))),
        any::<i32>().prop_map(Value::Int32),
        any::<i64>().prop_map(|n| Value::Int64(Int64::from(n))),
        arb_decimal().prop_map(Value::Decimal128),
        arb_finite().prop_map(Value::Double),
        arb_millis().prop_map(Value::DateTime),
        arb_regex().prop_map(Value::Regex),
        (any::<u32>(), any::<u32>()).prop_map(|(t, i)| Value::Timestamp(Timestamp { t, i })),
        (any::<u8>(), prop::collection::vec(any::<u8>(), 0..24))
            .prop_map(|(subtype, bytes)| Value::Binary(Binary::from_bytes(subtype, &bytes))),
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(3, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec((arb_key(), inner), 0..6)
                .prop_map(|pairs| Value::Document(pairs.into_iter().collect::<Document>())),
        ]
    })
}

/// Identifiers the sandbox does not bind.
fn arb_foreign_ident() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9]{0,8}")
        .unwrap()
        .prop_filter("not a literal keyword", |name| {
            !matches!(name.as_str(), "db" | "null" | "true" | "false" | "new" | "undefined")
        })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Core roundtrip property: decode(encode(value)) ≈ value.
    #[test]
    fn roundtrip_compact(value in arb_value()) {
        let shell = encode(&value);
        let decoded = decode(&shell).unwrap();
        prop_assert!(
            decoded.semantic_eq(&value),
            "Roundtrip failed!\n  shell: {}\n  in:    {:?}\n  out:   {:?}",
            shell,
            value,
            decoded
        );
    }

    /// Pretty layout decodes to the same value as compact layout.
    #[test]
    fn roundtrip_pretty(value in arb_value(), indent in 1usize..5) {
        let shell = encode_pretty(&value, indent);
        let decoded = decode(&shell).unwrap();
        prop_assert!(decoded.semantic_eq(&value), "Pretty roundtrip failed:\n{}", shell);
    }

    /// Compact output is always one line.
    #[test]
    fn compact_is_single_line(value in arb_value()) {
        prop_assert!(!encode(&value).contains('\n'));
    }

    /// Extended JSON carries every typed value through unchanged.
    #[test]
    fn extended_json_bridge_preserves_value(value in arb_value()) {
        let json = to_extended_json(&value);
        let back = from_extended_json(&json).unwrap();
        prop_assert!(back.semantic_eq(&value), "bridge failed: {}", json);
    }

    /// Any 64-bit integer survives as NumberLong text.
    #[test]
    fn number_long_keeps_every_digit(n in any::<i64>()) {
        let decoded = decode(&format!("NumberLong(\"{n}\")")).unwrap();
        prop_assert_eq!(decoded, Value::Int64(Int64::from(n)));
    }

    /// Unbound identifiers fail closed, wherever they appear.
    #[test]
    fn unknown_identifiers_are_reference_errors(name in arb_foreign_ident()) {
        let err = decode(&format!("{{ a: [1, {name}] }}")).unwrap_err();
        prop_assert_eq!(err.failure_kind(), Some(FailureKind::Reference));
        let err = parse_command(&format!("{name}.users.find()")).unwrap_err();
        prop_assert!(matches!(
            err,
            ShellError::Parse(ref f) if f.kind == FailureKind::Reference
        ));
    }

    /// `limit(n)` after find always lands in the command.
    #[test]
    fn find_limit_is_recorded(n in 0u32..100_000) {
        let cmd = parse_command(&format!("db.items.find().limit({n})")).unwrap();
        prop_assert_eq!(cmd.get("limit"), Some(&Value::Number(f64::from(n))));
    }
}

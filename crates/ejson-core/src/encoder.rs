//! Shell-syntax encoder — renders canonical values as editable shell text.
//!
//! - **Typed wrappers**: `ObjectId("…")`, `NumberLong("…")`, `NumberDecimal("…")`,
//!   `ISODate("…")`, `Timestamp(t, i)`, `BinData(subtype, "…")`
//! - **Bare numerics**: plain numbers, `Int32` and `Double` print as literals
//! - **Regex literals**: `/pattern/options`
//! - **Layout**: compact single-line output, or pretty output with a
//!   caller-chosen indent per nesting level
//! - **Key quoting**: keys that are not bare identifiers are quoted
//!
//! # Example
//! ```
//! use ejson_core::{decode, encode, encode_pretty};
//! let value = decode(r#"{ _id: ObjectId("5f0c4c7e2f8fb814b56fa181"), n: NumberLong("7") }"#).unwrap();
//! assert_eq!(
//!     encode(&value),
//!     r#"{ _id: ObjectId("5f0c4c7e2f8fb814b56fa181"), n: NumberLong("7") }"#
//! );
//! assert_eq!(encode_pretty(&value, 2).lines().count(), 4);
//! ```

use chrono::{DateTime, Datelike};
use tracing::debug;

use crate::config::EncodeOptions;
use crate::error::Result;
use crate::extended_json::from_extended_json;
use crate::types::{Document, Value};

/// Encode a value as compact, single-line shell text.
pub fn encode(value: &Value) -> String {
    encode_with(value, EncodeOptions::compact())
}

/// Encode a value with `indent` spaces per nesting level.
pub fn encode_pretty(value: &Value, indent: usize) -> String {
    encode_with(value, EncodeOptions::pretty(indent))
}

/// Encode a value using explicit [`EncodeOptions`].
pub fn encode_with(value: &Value, options: EncodeOptions) -> String {
    let mut out = String::new();
    encode_value(value, options.indent, 0, &mut out);
    debug!(kind = value.type_name(), len = out.len(), "encoded value");
    out
}

/// Encode canonical Extended JSON text (as returned by the database transport)
/// into shell text.
pub fn encode_json(json: &str, options: EncodeOptions) -> Result<String> {
    let parsed: serde_json::Value = serde_json::from_str(json)?;
    let value = from_extended_json(&parsed)?;
    Ok(encode_with(&value, options))
}

fn encode_value(value: &Value, indent: usize, depth: usize, out: &mut String) {
    match value {
        Value::Absent => {}
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) | Value::Double(n) => out.push_str(&format_number(*n)),
        Value::Int32(n) => out.push_str(&n.to_string()),
        Value::String(s) => encode_string(s, out),
        Value::ObjectId(oid) => {
            out.push_str("ObjectId(\"");
            out.push_str(&oid.to_hex());
            out.push_str("\")");
        }
        Value::Int64(n) => {
            out.push_str("NumberLong(\"");
            out.push_str(n.as_str());
            out.push_str("\")");
        }
        Value::Decimal128(d) => {
            out.push_str("NumberDecimal(\"");
            out.push_str(d.as_str());
            out.push_str("\")");
        }
        Value::DateTime(ms) => encode_date(*ms, out),
        Value::Regex(regex) => {
            out.push('/');
            encode_regex_source(&regex.pattern, out);
            out.push('/');
            out.push_str(&regex.options);
        }
        Value::Timestamp(ts) => out.push_str(&format!("Timestamp({}, {})", ts.t, ts.i)),
        Value::Binary(bin) => {
            out.push_str(&format!("BinData({}, ", bin.subtype()));
            encode_string(bin.base64(), out);
            out.push(')');
        }
        Value::Array(items) => encode_array(items, indent, depth, out),
        Value::Document(doc) => encode_document(doc, indent, depth, out),
    }
}

/// `[]`, `[a, b]` in compact mode, or one element per line when pretty.
/// An `Absent` element renders as `undefined` so the slot survives.
fn encode_array(items: &[Value], indent: usize, depth: usize, out: &mut String) {
    if items.is_empty() {
        out.push_str("[]");
        return;
    }
    let encode_item = |item: &Value, out: &mut String| {
        if item.is_absent() {
            out.push_str("undefined");
        } else {
            encode_value(item, indent, depth + 1, out);
        }
    };
    if indent == 0 {
        out.push('[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            encode_item(item, out);
        }
        out.push(']');
        return;
    }
    out.push_str("[\n");
    let inner = make_indent(indent, depth + 1);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        out.push_str(&inner);
        encode_item(item, out);
    }
    out.push('\n');
    out.push_str(&make_indent(indent, depth));
    out.push(']');
}

/// `{}`, `{ k: v }` in compact mode, or one field per line when pretty.
/// `Absent` fields are omitted.
fn encode_document(doc: &Document, indent: usize, depth: usize, out: &mut String) {
    let fields: Vec<(&String, &Value)> = doc.iter().filter(|(_, v)| !v.is_absent()).collect();
    if fields.is_empty() {
        out.push_str("{}");
        return;
    }
    if indent == 0 {
        out.push_str("{ ");
        for (i, (key, value)) in fields.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            encode_key(key, out);
            out.push_str(": ");
            encode_value(value, indent, depth + 1, out);
        }
        out.push_str(" }");
        return;
    }
    out.push_str("{\n");
    let inner = make_indent(indent, depth + 1);
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        out.push_str(&inner);
        encode_key(key, out);
        out.push_str(": ");
        encode_value(value, indent, depth + 1, out);
    }
    out.push('\n');
    out.push_str(&make_indent(indent, depth));
    out.push('}');
}

/// Keys that are bare identifiers (`^[A-Za-z_$][A-Za-z0-9_$]*$`) are emitted
/// as-is; everything else (hyphens, dots, leading digits, spaces) is quoted.
fn encode_key(key: &str, out: &mut String) {
    if is_bare_key(key) {
        out.push_str(key);
    } else {
        encode_string(key, out);
    }
}

fn is_bare_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Double-quoted string with JSON escaping.
fn encode_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Regex source as it must appear between the slashes: an empty pattern is
/// `(?:)`, and bare `/` or line breaks are escaped.
fn encode_regex_source(pattern: &str, out: &mut String) {
    if pattern.is_empty() {
        out.push_str("(?:)");
        return;
    }
    let mut escaped = false;
    let mut in_class = false;
    for ch in pattern.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '/' if !escaped && !in_class => out.push_str("\\/"),
            c => {
                if !escaped {
                    match c {
                        '[' => in_class = true,
                        ']' => in_class = false,
                        _ => {}
                    }
                }
                out.push(c);
            }
        }
        escaped = !escaped && ch == '\\';
    }
}

/// `ISODate("YYYY-MM-DDTHH:MM:SS.mmmZ")`; instants outside four-digit years
/// fall back to `Date(<millis>)`, which decodes to the same value.
fn encode_date(ms: i64, out: &mut String) {
    match DateTime::from_timestamp_millis(ms).filter(|dt| (0..=9999).contains(&dt.year())) {
        Some(dt) => {
            out.push_str("ISODate(\"");
            out.push_str(&dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string());
            out.push_str("\")");
        }
        None => out.push_str(&format!("Date({ms})")),
    }
}

/// Format a number the way a script engine prints it: integers without a
/// fraction, shortest round-trip digits, exponent notation outside
/// `[1e-6, 1e21)`, and `NaN` / `Infinity` spelled out.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return format!("{n}");
    }
    let s = format!("{n:e}");
    match s.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => s,
    }
}

fn make_indent(indent: usize, depth: usize) -> String {
    " ".repeat(indent * depth)
}

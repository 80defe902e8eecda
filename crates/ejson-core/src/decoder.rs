//! Shell-syntax decoder — turns editable shell text back into a canonical value.
//!
//! Decoding happens in three steps:
//!
//! 1. **Parse** the whole text into an expression tree. Any syntax error is
//!    reported before evaluation starts.
//! 2. **Evaluate** the tree in a fresh [`Sandbox`], where only the whitelisted
//!    constructors (`ObjectId`, `Date`, `ISODate`, `NumberDecimal`,
//!    `NumberInt`, `NumberLong`, `Timestamp`, `BinData`) resolve. Regex
//!    literals become [`Value::Regex`].
//! 3. **Canonicalize** the result into plain data.
//!
//! # Example
//! ```
//! use ejson_core::{decode, Value};
//! let value = decode(r#"NumberLong("9223372036854775807")"#).unwrap();
//! match value {
//!     Value::Int64(n) => assert_eq!(n.as_str(), "9223372036854775807"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use tracing::debug;

use crate::config::ParseOptions;
use crate::error::Result;
use crate::parser::parse_program;
use crate::sandbox::Sandbox;
use crate::types::Value;

/// Decode shell text into a canonical value using default [`ParseOptions`].
///
/// Blank input decodes to [`Value::Absent`].
pub fn decode(text: &str) -> Result<Value> {
    decode_with(text, &ParseOptions::default())
}

/// Decode shell text with explicit [`ParseOptions`].
pub fn decode_with(text: &str, options: &ParseOptions) -> Result<Value> {
    let value = match parse_program(text, options.max_depth)? {
        Some(expr) => Sandbox::new().evaluate(&expr)?,
        None => Value::Absent,
    };
    debug!(len = text.len(), kind = value.type_name(), "decoded shell text");
    Ok(value)
}

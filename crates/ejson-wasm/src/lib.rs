//! WASM bindings for ejson-core.
//!
//! Exposes `encode`, `decode` and `toCommand` as `#[wasm_bindgen]` functions
//! for the browser console. Values cross the boundary as canonical Extended
//! JSON strings, so typed values (`$oid`, `$numberLong`, …) survive intact.
//!
//! ## Build process
//!
//! ```sh
//! cargo build -p ejson-wasm --target wasm32-unknown-unknown --release
//! wasm-bindgen --target web --out-dir pkg/ \
//!   target/wasm32-unknown-unknown/release/ejson_wasm.wasm
//! ```

use ejson_core::{EncodeOptions, ShellError};
use wasm_bindgen::prelude::*;

fn js_error(e: ShellError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Encode canonical Extended JSON as shell text with `indent` spaces per
/// level (0 for a single line).
///
/// Throws a JS error if the input is not valid Extended JSON.
#[wasm_bindgen]
pub fn encode(json: &str, indent: usize) -> std::result::Result<String, JsValue> {
    ejson_core::encode_json(json, EncodeOptions::pretty(indent)).map_err(js_error)
}

/// Decode shell text into a canonical Extended JSON string.
///
/// Throws a JS error carrying `SyntaxError: …`, `ReferenceError: …` or
/// `TypeError: …` when the text is rejected.
#[wasm_bindgen]
pub fn decode(text: &str) -> std::result::Result<String, JsValue> {
    let value = ejson_core::decode(text).map_err(js_error)?;
    Ok(value.to_extended_json().to_string())
}

/// Translate a `db.<collection>.<operation>(…)` chain into a database command,
/// returned as a canonical Extended JSON string.
#[wasm_bindgen(js_name = toCommand)]
pub fn to_command(text: &str) -> std::result::Result<String, JsValue> {
    let command = ejson_core::parse_command(text).map_err(js_error)?;
    Ok(command.to_extended_json().to_string())
}

//! # ejson-core
//!
//! Pure-Rust codec between MongoDB canonical Extended JSON and the editable
//! **shell syntax** people type into a database console, plus an interpreter
//! that turns shell command chains into database command documents.
//!
//! Shell text is never executed. It is tokenized and parsed in full, then
//! evaluated in an isolated sandbox where only the typed-value constructors
//! (`ObjectId`, `ISODate`, `NumberLong`, …) resolve. Anything else fails with
//! a `ReferenceError`.
//!
//! ## Quick start
//!
//! ```rust
//! use ejson_core::{decode, encode_json, parse_command, EncodeOptions, Value};
//!
//! // Extended JSON → shell text
//! let json = r#"{"_id":{"$oid":"5f0c4c7e2f8fb814b56fa181"},"n":{"$numberLong":"9007199254740993"}}"#;
//! let shell = encode_json(json, EncodeOptions::compact()).unwrap();
//! assert_eq!(
//!     shell,
//!     r#"{ _id: ObjectId("5f0c4c7e2f8fb814b56fa181"), n: NumberLong("9007199254740993") }"#
//! );
//!
//! // shell text → value (roundtrip)
//! let back = decode(&shell).unwrap();
//! assert_eq!(back.to_extended_json().to_string(), json);
//!
//! // shell chain → command document
//! let cmd = parse_command(r#"db.users.find({ name: "Alice" })"#).unwrap();
//! assert_eq!(cmd.get("limit"), Some(&Value::Number(10.0)));
//! ```
//!
//! ## Modules
//!
//! - [`encoder`] — value / Extended JSON → shell text
//! - [`decoder`] — shell text → value
//! - [`interpreter`] — `db.<collection>.<op>(…)` chains → command documents
//! - [`extended_json`] — value ⇄ canonical Extended JSON
//! - [`types`] — the [`Value`] model and its typed scalars
//! - [`config`] — encode and parse options
//! - [`error`] — failure types

mod ast;
mod lexer;
mod parser;
mod sandbox;

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod extended_json;
pub mod interpreter;
pub mod types;

pub use config::{EncodeOptions, ParseOptions};
pub use decoder::{decode, decode_with};
pub use encoder::{encode, encode_json, encode_pretty, encode_with};
pub use error::{FailureKind, ParseFailure, Result, ShellError};
pub use extended_json::{decode_json, from_extended_json, to_extended_json};
pub use interpreter::{parse_command, parse_command_with};
pub use types::{
    Binary, Decimal128, Document, Int64, NumericTextError, ObjectId, Regex, Timestamp, Value,
};

//! The canonical value tree shared by the codec and the interpreter.
//!
//! Every value that can appear in a MongoDB document is a variant of [`Value`].
//! Types that a plain numeric literal cannot carry without precision loss
//! (`NumberLong`, `NumberDecimal`) keep their exact digit text. Documents use an
//! insertion-ordered [`Document`] because field order is significant to the
//! server.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// A 12-byte MongoDB object identifier, as defined by the BSON crate.
pub use bson::oid::ObjectId;

/// A canonical value: the tagged union threaded through decode, encode and
/// command construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An omitted value (`undefined`). Encodes as empty text.
    Absent,
    Null,
    Bool(bool),
    /// A plain numeric literal.
    Number(f64),
    String(String),
    ObjectId(ObjectId),
    Int32(i32),
    Int64(Int64),
    Decimal128(Decimal128),
    /// An explicitly typed double (`$numberDouble`).
    Double(f64),
    /// Milliseconds since the Unix epoch, UTC.
    DateTime(i64),
    Regex(Regex),
    Timestamp(Timestamp),
    Binary(Binary),
    Array(Vec<Value>),
    Document(Document),
}

impl Value {
    /// A short name for the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Absent => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::ObjectId(_) => "ObjectId",
            Value::Int32(_) => "NumberInt",
            Value::Int64(_) => "NumberLong",
            Value::Decimal128(_) => "NumberDecimal",
            Value::Double(_) => "NumberDouble",
            Value::DateTime(_) => "ISODate",
            Value::Regex(_) => "RegExp",
            Value::Timestamp(_) => "Timestamp",
            Value::Binary(_) => "BinData",
            Value::Array(_) => "array",
            Value::Document(_) => "document",
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) | Value::Double(n) => Some(*n),
            Value::Int32(n) => Some(f64::from(*n)),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Structural equality that treats the bare-rendered numeric tags as the
    /// plain numbers they print as.
    ///
    /// `Int32` and `Double` encode without a wrapper, so decoding their text
    /// yields a [`Value::Number`] of the same magnitude. Everything else,
    /// including document key order and the digit text of `Int64` and
    /// `Decimal128`, must match exactly.
    pub fn semantic_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.semantic_eq(y))
            }
            (Value::Document(a), Value::Document(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.semantic_eq(vb))
            }
            (Value::Int32(_) | Value::Double(_) | Value::Number(_), _)
                if matches!(other, Value::Int32(_) | Value::Double(_) | Value::Number(_)) =>
            {
                match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a == b || (a.is_nan() && b.is_nan()),
                    _ => false,
                }
            }
            _ => self == other,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Document(doc)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// An insertion-ordered mapping from field name to value.
///
/// Re-inserting an existing key replaces its value in place, keeping the
/// original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert a field, returning the previous value if the key existed.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove a field, shifting later fields down to keep their order.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&str, &mut Value) -> bool) {
        self.entries.retain_mut(|(k, v)| keep(k, v));
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Why a numeric text was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericTextError {
    /// Not numeric syntax at all.
    Malformed,
    /// Valid syntax, but the value does not fit the type exactly.
    OutOfRange,
}

/// A 64-bit integer carried as its exact digit text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Int64(String);

impl Int64 {
    pub fn parse(text: &str) -> Result<Self, NumericTextError> {
        let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NumericTextError::Malformed);
        }
        text.parse::<i64>()
            .map_err(|_| NumericTextError::OutOfRange)?;
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> i64 {
        // Validated at construction.
        self.0.parse().unwrap_or_default()
    }
}

impl From<i64> for Int64 {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

/// Significant digits a 128-bit decimal can hold.
const DECIMAL128_DIGITS: usize = 34;

/// A 128-bit decimal carried as its exact text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal128(String);

impl Decimal128 {
    pub fn parse(text: &str) -> Result<Self, NumericTextError> {
        let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
        if matches!(unsigned, "NaN" | "Infinity" | "Inf") {
            return Ok(Self(text.to_string()));
        }
        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(pos) => (&unsigned[..pos], Some(&unsigned[pos + 1..])),
            None => (unsigned, None),
        };
        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa, ""),
        };
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if int_part.len() + frac_part.len() == 0 || !all_digits(int_part) || !all_digits(frac_part)
        {
            return Err(NumericTextError::Malformed);
        }
        if let Some(exp) = exponent {
            let exp_digits = exp.strip_prefix(['-', '+']).unwrap_or(exp);
            if exp_digits.is_empty() || !all_digits(exp_digits) {
                return Err(NumericTextError::Malformed);
            }
            if exp.parse::<i32>().is_err() {
                return Err(NumericTextError::OutOfRange);
            }
        }
        let significant = format!("{int_part}{frac_part}");
        let significant = significant.trim_start_matches('0');
        if significant.len() > DECIMAL128_DIGITS {
            return Err(NumericTextError::OutOfRange);
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Option letters a regex may carry: the script engine's flags plus Mongo's
/// extended mode `x`.
const REGEX_FLAGS: &str = "dgimsuvxy";

/// A regular expression: pattern source plus sorted option letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Regex {
    pub pattern: String,
    pub options: String,
}

impl Regex {
    /// Build a regex, sorting the option letters.
    ///
    /// Returns `None` if an option is not one of `dgimsuvxy` or appears twice,
    /// or if the pattern starts with `*` (it cannot be written as a literal:
    /// `/*` opens a comment).
    pub fn new(pattern: impl Into<String>, options: &str) -> Option<Self> {
        let pattern = pattern.into();
        if pattern.starts_with('*') {
            return None;
        }
        let mut letters: Vec<char> = options.chars().collect();
        if !letters.iter().all(|c| REGEX_FLAGS.contains(*c)) {
            return None;
        }
        letters.sort_unstable();
        if letters.windows(2).any(|w| w[0] == w[1]) {
            return None;
        }
        Some(Self {
            pattern,
            options: letters.into_iter().collect(),
        })
    }
}

/// An internal replication timestamp: seconds plus an ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub t: u32,
    pub i: u32,
}

/// Binary data: a base64 payload and a one-byte subtype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    subtype: u8,
    base64: String,
}

impl Binary {
    /// Returns `None` if `base64` is not valid standard base64.
    pub fn new(subtype: u8, base64: impl Into<String>) -> Option<Self> {
        let base64 = base64.into();
        BASE64.decode(base64.as_bytes()).ok()?;
        Some(Self { subtype, base64 })
    }

    pub fn from_bytes(subtype: u8, bytes: &[u8]) -> Self {
        Self {
            subtype,
            base64: BASE64.encode(bytes),
        }
    }

    pub fn subtype(&self) -> u8 {
        self.subtype
    }

    pub fn base64(&self) -> &str {
        &self.base64
    }

    pub fn bytes(&self) -> Vec<u8> {
        BASE64.decode(self.base64.as_bytes()).unwrap_or_default()
    }
}

//! Bridge between [`Value`] and MongoDB canonical Extended JSON.
//!
//! Extended JSON is the form the transport layer sends and receives: ordinary
//! JSON maps, arrays and scalars, with typed values spelled as single-key
//! `$`-wrappers such as `{"$oid": "…"}` or `{"$numberLong": "…"}`. Plain
//! numbers stay plain JSON numbers so that finished commands read naturally
//! (`{"find": "users", "limit": 10}`).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Number, Value as Json};

use crate::encoder::format_number;
use crate::error::{Result, ShellError};
use crate::sandbox::{parse_iso_date, MAX_SAFE_INTEGER, MAX_TIME_MS};
use crate::types::{
    Binary, Decimal128, Document, Int64, NumericTextError, ObjectId, Regex, Timestamp, Value,
};

/// Convert a value to canonical Extended JSON.
///
/// `Absent` fields are dropped and `Absent` array slots become `null`; an
/// `Absent` root becomes `null`.
pub fn to_extended_json(value: &Value) -> Json {
    match value {
        Value::Absent | Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => Json::String(s.clone()),
        Value::ObjectId(oid) => json!({ "$oid": oid.to_hex() }),
        Value::Int32(n) => json!({ "$numberInt": n.to_string() }),
        Value::Int64(n) => json!({ "$numberLong": n.as_str() }),
        Value::Decimal128(d) => json!({ "$numberDecimal": d.as_str() }),
        Value::Double(n) => json!({ "$numberDouble": format_number(*n) }),
        Value::DateTime(ms) => json!({ "$date": { "$numberLong": ms.to_string() } }),
        Value::Regex(regex) => json!({
            "$regularExpression": { "pattern": regex.pattern, "options": regex.options }
        }),
        Value::Timestamp(ts) => json!({ "$timestamp": { "t": ts.t, "i": ts.i } }),
        Value::Binary(bin) => json!({
            "$binary": { "base64": bin.base64(), "subType": format!("{:02x}", bin.subtype()) }
        }),
        Value::Array(items) => Json::Array(items.iter().map(to_extended_json).collect()),
        Value::Document(doc) => doc.to_extended_json(),
    }
}

/// Exact integers stay integers; non-finite numbers need the typed wrapper.
fn number_to_json(n: f64) -> Json {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Json::Number(Number::from(n as i64));
    }
    match Number::from_f64(n) {
        Some(num) => Json::Number(num),
        None => json!({ "$numberDouble": format_number(n) }),
    }
}

/// Convert Extended JSON (canonical or relaxed) into a value.
///
/// Plain JSON integers outside ±2^53 are rejected with
/// [`ShellError::PrecisionLoss`] rather than rounded; send them as
/// `{"$numberLong": "…"}` instead.
pub fn from_extended_json(json: &Json) -> Result<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => json_number(n)?,
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::Array(
            items
                .iter()
                .map(from_extended_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        Json::Object(map) => match wrapper(map)? {
            Some(value) => value,
            None => {
                let mut doc = Document::with_capacity(map.len());
                for (key, value) in map {
                    doc.insert(key.clone(), from_extended_json(value)?);
                }
                Value::Document(doc)
            }
        },
    })
}

fn json_number(n: &Number) -> Result<Value> {
    if let Some(i) = n.as_i64() {
        if i.unsigned_abs() > MAX_SAFE_INTEGER as u64 {
            return Err(ShellError::PrecisionLoss(format!(
                "integer {i} cannot be held exactly as a plain number; use {{\"$numberLong\": \"{i}\"}}"
            )));
        }
        return Ok(Value::Number(i as f64));
    }
    if let Some(u) = n.as_u64() {
        return Err(ShellError::PrecisionLoss(format!(
            "integer {u} cannot be held exactly as a plain number"
        )));
    }
    n.as_f64()
        .map(Value::Number)
        .ok_or_else(|| ShellError::ExtendedJson(format!("unsupported number {n}")))
}

fn bad(what: &str, json: &Json) -> ShellError {
    ShellError::ExtendedJson(format!("malformed {what}: {json}"))
}

fn str_field<'a>(json: &'a Json, key: &str, what: &str) -> Result<&'a str> {
    json.get(key)
        .and_then(Json::as_str)
        .ok_or_else(|| bad(what, json))
}

fn u32_field(json: &Json, key: &str, what: &str) -> Result<u32> {
    json.get(key)
        .and_then(Json::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| bad(what, json))
}

fn int64_text(text: &str, what: &str) -> Result<Int64> {
    Int64::parse(text).map_err(|e| match e {
        NumericTextError::OutOfRange => {
            ShellError::PrecisionLoss(format!("{what} \"{text}\" is outside the 64-bit range"))
        }
        NumericTextError::Malformed => {
            ShellError::ExtendedJson(format!("{what} \"{text}\" is not an integer"))
        }
    })
}

/// Recognise a typed `$`-wrapper. Returns `Ok(None)` for an ordinary document.
fn wrapper(map: &Map<String, Json>) -> Result<Option<Value>> {
    if map.len() == 2 {
        if let (Some(payload), Some(subtype)) = (map.get("$binary"), map.get("$type")) {
            let wrapped = json!({ "base64": payload, "subType": subtype });
            return binary(&wrapped).map(Some);
        }
    }
    if map.len() == 1 {
        if let Some(id) = map.get("id").and_then(buffer_object_id) {
            return Ok(Some(Value::ObjectId(id)));
        }
    }
    let Some((key, inner)) = map.iter().next().filter(|_| map.len() == 1) else {
        return Ok(None);
    };

    let value = match key.as_str() {
        "$oid" => inner
            .as_str()
            .and_then(|hex| ObjectId::parse_str(hex).ok())
            .map(Value::ObjectId)
            .ok_or_else(|| bad("$oid", inner))?,
        "$date" => Value::DateTime(date(inner)?),
        "$numberInt" => inner
            .as_str()
            .and_then(|s| s.parse::<i32>().ok())
            .map(Value::Int32)
            .ok_or_else(|| bad("$numberInt", inner))?,
        "$numberLong" => {
            let text = inner.as_str().ok_or_else(|| bad("$numberLong", inner))?;
            Value::Int64(int64_text(text, "$numberLong")?)
        }
        "$numberDouble" => {
            let text = inner.as_str().ok_or_else(|| bad("$numberDouble", inner))?;
            let n = match text {
                "Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                "NaN" => f64::NAN,
                other => other.parse().map_err(|_| bad("$numberDouble", inner))?,
            };
            Value::Double(n)
        }
        "$numberDecimal" => {
            let text = inner.as_str().ok_or_else(|| bad("$numberDecimal", inner))?;
            match Decimal128::parse(text) {
                Ok(d) => Value::Decimal128(d),
                Err(NumericTextError::OutOfRange) => {
                    return Err(ShellError::PrecisionLoss(format!(
                        "$numberDecimal \"{text}\" exceeds 128-bit decimal precision"
                    )))
                }
                Err(NumericTextError::Malformed) => return Err(bad("$numberDecimal", inner)),
            }
        }
        "$regularExpression" => regex(
            str_field(inner, "pattern", "$regularExpression")?,
            str_field(inner, "options", "$regularExpression")?,
        )?,
        "$timestamp" => Value::Timestamp(Timestamp {
            t: u32_field(inner, "t", "$timestamp")?,
            i: u32_field(inner, "i", "$timestamp")?,
        }),
        "$binary" => binary(inner)?,
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn regex(pattern: &str, options: &str) -> Result<Value> {
    Regex::new(pattern, options)
        .map(Value::Regex)
        .ok_or_else(|| {
            ShellError::ExtendedJson(format!("invalid regular expression /{pattern}/{options}"))
        })
}

fn binary(inner: &Json) -> Result<Value> {
    let payload = str_field(inner, "base64", "$binary")?;
    let subtype = str_field(inner, "subType", "$binary")?;
    let subtype = u8::from_str_radix(subtype, 16).map_err(|_| bad("$binary subType", inner))?;
    Binary::new(subtype, payload)
        .map(Value::Binary)
        .ok_or_else(|| bad("$binary base64", inner))
}

/// Milliseconds since the epoch, limited to the range a shell `Date` holds.
fn date(inner: &Json) -> Result<i64> {
    let ms = match inner {
        Json::Object(_) => {
            let text = str_field(inner, "$numberLong", "$date")?;
            int64_text(text, "$date")?.value()
        }
        Json::String(s) => parse_iso_date(s).ok_or_else(|| bad("$date", inner))?,
        Json::Number(n) => n.as_i64().ok_or_else(|| bad("$date", inner))?,
        _ => return Err(bad("$date", inner)),
    };
    if ms.unsigned_abs() > MAX_TIME_MS as u64 {
        return Err(ShellError::ExtendedJson(format!(
            "$date {ms} is outside the range of ±8640000000000000 ms"
        )));
    }
    Ok(ms)
}

/// The byte-buffer shape some drivers produce for an ObjectId:
/// `{"id": {"0": 95, "1": 12, …, "11": 129}}`.
fn buffer_object_id(json: &Json) -> Option<ObjectId> {
    let map = json.as_object()?;
    if map.len() != 12 {
        return None;
    }
    let mut bytes = [0u8; 12];
    for (i, byte) in bytes.iter_mut().enumerate() {
        let n = map.get(&i.to_string())?.as_u64()?;
        *byte = u8::try_from(n).ok()?;
    }
    Some(ObjectId::from_bytes(bytes))
}

/// Parse Extended JSON text into a value.
pub fn decode_json(json: &str) -> Result<Value> {
    let parsed: Json = serde_json::from_str(json)?;
    from_extended_json(&parsed)
}

impl Value {
    /// Shorthand for [`to_extended_json`].
    pub fn to_extended_json(&self) -> Json {
        to_extended_json(self)
    }
}

impl Document {
    /// Shorthand for [`to_extended_json`] on a document.
    pub fn to_extended_json(&self) -> Json {
        let mut map = Map::with_capacity(self.len());
        for (key, value) in self.iter() {
            if !value.is_absent() {
                map.insert(key.clone(), to_extended_json(value));
            }
        }
        Json::Object(map)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        to_extended_json(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        from_extended_json(&json).map_err(D::Error::custom)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_extended_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Document(doc) => Ok(doc),
            other => Err(D::Error::custom(format!(
                "expected a document, got {}",
                other.type_name()
            ))),
        }
    }
}

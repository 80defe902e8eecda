//! The isolated evaluation context for shell literal text.
//!
//! A [`Sandbox`] resolves exactly the whitelisted constructor names plus the
//! language value globals `undefined`, `NaN` and `Infinity`. Every other
//! identifier fails closed with a `ReferenceError`. Nothing here touches the
//! clock, the environment or any host resource: `Date()` and `ObjectId()`
//! without arguments are rejected instead of consulting the system.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::trace;

use crate::ast::{Expr, ExprKind, Property, UnaryOp};
use crate::error::{FailureKind, Result, ShellError};
use crate::types::{
    Binary, Decimal128, Document, Int64, NumericTextError, ObjectId, Regex, Timestamp, Value,
};

/// Largest magnitude an integer can have and still be exact in a double.
pub(crate) const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Largest millisecond offset a script date can hold.
pub(crate) const MAX_TIME_MS: f64 = 8.64e15;

/// The constructor bindings visible inside the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    ObjectId,
    Date,
    IsoDate,
    NumberDecimal,
    NumberInt,
    NumberLong,
    Timestamp,
    BinData,
}

const WHITELIST: &[(&str, Builtin)] = &[
    ("ObjectId", Builtin::ObjectId),
    ("Date", Builtin::Date),
    ("ISODate", Builtin::IsoDate),
    ("NumberDecimal", Builtin::NumberDecimal),
    ("NumberInt", Builtin::NumberInt),
    ("NumberLong", Builtin::NumberLong),
    ("Timestamp", Builtin::Timestamp),
    ("BinData", Builtin::BinData),
];

impl Builtin {
    fn lookup(name: &str) -> Option<Builtin> {
        WHITELIST
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, builtin)| *builtin)
    }

    fn name(self) -> &'static str {
        WHITELIST
            .iter()
            .find(|(_, b)| *b == self)
            .map(|(n, _)| *n)
            .unwrap_or("function")
    }
}

/// The result of evaluating one expression before canonicalization.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Evaluated {
    Data(Value),
    /// A bare reference to a constructor, e.g. `{ f: ObjectId }`.
    Function(Builtin),
}

/// A single-use evaluation context. Build a new one for every call.
#[derive(Debug, Default)]
pub(crate) struct Sandbox {
    _private: (),
}

impl Sandbox {
    pub(crate) fn new() -> Self {
        trace!("creating sandbox");
        Self::default()
    }

    /// Whether `name` resolves inside the sandbox.
    pub(crate) fn is_bound(name: &str) -> bool {
        Builtin::lookup(name).is_some() || matches!(name, "undefined" | "NaN" | "Infinity")
    }

    /// Evaluate `expr` and canonicalize the result into plain data.
    pub(crate) fn evaluate(&self, expr: &Expr) -> Result<Value> {
        let value = match self.eval(expr)? {
            Evaluated::Data(value) => value,
            Evaluated::Function(_) => Value::Absent,
        };
        Ok(canonicalize(value))
    }

    fn eval(&self, expr: &Expr) -> Result<Evaluated> {
        let value = match &expr.kind {
            ExprKind::Null => Value::Null,
            ExprKind::Bool(b) => Value::Bool(*b),
            ExprKind::Number { value, .. } => Value::Number(*value),
            ExprKind::String(s) => Value::String(s.clone()),
            ExprKind::Regex { pattern, flags } => {
                let regex = Regex::new(pattern.as_str(), flags).ok_or_else(|| {
                    ShellError::failure(
                        FailureKind::Syntax,
                        format!("Invalid regular expression flags '{flags}'"),
                        expr.pos(),
                    )
                })?;
                Value::Regex(regex)
            }
            ExprKind::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(match item {
                        Some(item) => self.eval_data(item)?,
                        None => Value::Absent,
                    });
                }
                Value::Array(out)
            }
            ExprKind::Object(fields) => {
                let mut doc = Document::with_capacity(fields.len());
                for (key, value) in fields {
                    doc.insert(key.clone(), self.eval_data(value)?);
                }
                Value::Document(doc)
            }
            ExprKind::Ident(name) => return self.resolve(name, expr),
            ExprKind::Member { object, property } => {
                let target = self.eval(object)?;
                if let Property::Computed(index) = property {
                    self.eval(index)?;
                }
                let what = match target {
                    Evaluated::Data(value) => value.type_name(),
                    Evaluated::Function(builtin) => builtin.name(),
                };
                return Err(type_error(
                    format!("property access on {what} is not supported"),
                    expr,
                ));
            }
            ExprKind::Call { callee, args } | ExprKind::New { callee, args } => {
                let builtin = match self.eval(callee)? {
                    Evaluated::Function(builtin) => builtin,
                    Evaluated::Data(value) => {
                        return Err(type_error(
                            format!("{} is not a function", value.type_name()),
                            callee,
                        ))
                    }
                };
                self.construct(builtin, args, expr)?
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval_data(operand)?;
                let n = match value {
                    Value::Number(n) => n,
                    other => {
                        return Err(type_error(
                            format!("unary operator is not supported on {}", other.type_name()),
                            expr,
                        ))
                    }
                };
                Value::Number(match op {
                    UnaryOp::Neg => -n,
                    UnaryOp::Plus => n,
                })
            }
        };
        Ok(Evaluated::Data(value))
    }

    /// Evaluate to data; a bare function reference reads as `undefined` and is
    /// stripped by canonicalization.
    pub(crate) fn eval_data(&self, expr: &Expr) -> Result<Value> {
        Ok(match self.eval(expr)? {
            Evaluated::Data(value) => value,
            Evaluated::Function(_) => Value::Absent,
        })
    }

    fn resolve(&self, name: &str, expr: &Expr) -> Result<Evaluated> {
        if let Some(builtin) = Builtin::lookup(name) {
            return Ok(Evaluated::Function(builtin));
        }
        let value = match name {
            "undefined" => Value::Absent,
            "NaN" => Value::Number(f64::NAN),
            "Infinity" => Value::Number(f64::INFINITY),
            _ => {
                return Err(ShellError::failure(
                    FailureKind::Reference,
                    format!("{name} is not defined"),
                    expr.pos(),
                ))
            }
        };
        Ok(Evaluated::Data(value))
    }

    fn construct(&self, builtin: Builtin, args: &[Expr], call: &Expr) -> Result<Value> {
        let values = args
            .iter()
            .map(|arg| self.eval_data(arg))
            .collect::<Result<Vec<_>>>()?;
        let arg = |i: usize| values.get(i).cloned().unwrap_or(Value::Absent);
        let arg_expr = |i: usize| args.get(i).unwrap_or(call);

        match builtin {
            Builtin::ObjectId => match arg(0) {
                Value::String(hex) => ObjectId::parse_str(&hex).map(Value::ObjectId).map_err(
                    |_| {
                        type_error(
                            format!("ObjectId expects a 24-character hex string, got \"{hex}\""),
                            arg_expr(0),
                        )
                    },
                ),
                other => Err(type_error(
                    format!(
                        "ObjectId expects a 24-character hex string, got {}",
                        other.type_name()
                    ),
                    arg_expr(0),
                )),
            },
            Builtin::Date | Builtin::IsoDate => {
                date_millis(&arg(0), builtin, arg_expr(0)).map(Value::DateTime)
            }
            Builtin::NumberDecimal => {
                let text = match arg(0) {
                    Value::String(s) => s,
                    Value::Number(n) => arg_expr(0)
                        .numeric_text()
                        .filter(|t| Decimal128::parse(t).is_ok())
                        .unwrap_or_else(|| crate::encoder::format_number(n)),
                    other => {
                        return Err(type_error(
                            format!("NumberDecimal expects a string, got {}", other.type_name()),
                            arg_expr(0),
                        ))
                    }
                };
                match Decimal128::parse(&text) {
                    Ok(d) => Ok(Value::Decimal128(d)),
                    Err(NumericTextError::OutOfRange) => Err(ShellError::PrecisionLoss(format!(
                        "NumberDecimal(\"{text}\") does not fit in 128-bit decimal precision"
                    ))),
                    Err(NumericTextError::Malformed) => Err(type_error(
                        format!("NumberDecimal(\"{text}\") is not a decimal number"),
                        arg_expr(0),
                    )),
                }
            }
            Builtin::NumberInt => {
                let n = match arg(0) {
                    Value::String(s) => s.trim().parse::<i32>().ok(),
                    Value::Number(n)
                        if n.fract() == 0.0
                            && (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&n) =>
                    {
                        Some(n as i32)
                    }
                    _ => None,
                };
                n.map(Value::Int32).ok_or_else(|| {
                    type_error(
                        "NumberInt expects a 32-bit integer".to_string(),
                        arg_expr(0),
                    )
                })
            }
            Builtin::NumberLong => number_long(&arg(0), arg_expr(0)).map(Value::Int64),
            Builtin::Timestamp => {
                let t = u32_arg(&arg(0), "Timestamp seconds", arg_expr(0))?;
                let i = u32_arg(&arg(1), "Timestamp increment", arg_expr(1))?;
                Ok(Value::Timestamp(Timestamp { t, i }))
            }
            Builtin::BinData => {
                let subtype = match arg(0) {
                    Value::Number(n) if n.fract() == 0.0 && (0.0..=255.0).contains(&n) => n as u8,
                    _ => {
                        return Err(type_error(
                            "BinData subtype must be an integer between 0 and 255".to_string(),
                            arg_expr(0),
                        ))
                    }
                };
                match arg(1) {
                    Value::String(payload) => {
                        Binary::new(subtype, payload).map(Value::Binary).ok_or_else(|| {
                            type_error(
                                "BinData payload is not valid base64".to_string(),
                                arg_expr(1),
                            )
                        })
                    }
                    other => Err(type_error(
                        format!(
                            "BinData expects a base64 string, got {}",
                            other.type_name()
                        ),
                        arg_expr(1),
                    )),
                }
            }
        }
    }
}

fn type_error(message: String, at: &Expr) -> ShellError {
    ShellError::failure(FailureKind::Type, message, at.pos())
}

fn u32_arg(value: &Value, what: &str, at: &Expr) -> Result<u32> {
    match value {
        Value::Number(n) if n.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(n) => {
            Ok(*n as u32)
        }
        _ => Err(type_error(
            format!("{what} must be an unsigned 32-bit integer"),
            at,
        )),
    }
}

fn number_long(value: &Value, at: &Expr) -> Result<Int64> {
    match value {
        Value::String(s) => match Int64::parse(s) {
            Ok(n) => Ok(n),
            Err(NumericTextError::OutOfRange) => Err(ShellError::PrecisionLoss(format!(
                "NumberLong(\"{s}\") is outside the 64-bit integer range"
            ))),
            Err(NumericTextError::Malformed) => Err(type_error(
                format!("NumberLong(\"{s}\") is not an integer"),
                at,
            )),
        },
        Value::Number(n) => {
            if n.is_finite() && n.fract() != 0.0 {
                return Err(type_error(
                    format!("NumberLong({n}) is not an integer"),
                    at,
                ));
            }
            // A literal the double cannot hold exactly has already been rounded.
            let literal_differs = at
                .numeric_text()
                .and_then(|text| text.parse::<i128>().ok())
                .is_some_and(|exact| exact.unsigned_abs() > MAX_SAFE_INTEGER as u128);
            if !n.is_finite() || n.abs() > MAX_SAFE_INTEGER || literal_differs {
                return Err(ShellError::PrecisionLoss(format!(
                    "NumberLong({}) cannot be represented exactly; pass the digits as a string",
                    at.numeric_text()
                        .unwrap_or_else(|| crate::encoder::format_number(*n))
                )));
            }
            Ok(Int64::from(*n as i64))
        }
        Value::Int64(n) => Ok(n.clone()),
        other => Err(type_error(
            format!("NumberLong expects a string, got {}", other.type_name()),
            at,
        )),
    }
}

fn date_millis(value: &Value, builtin: Builtin, at: &Expr) -> Result<i64> {
    let ms = match value {
        Value::String(s) => parse_iso_date(s),
        Value::Number(n) if n.is_finite() && n.abs() <= MAX_TIME_MS => Some(n.trunc() as i64),
        Value::Int64(n) if (n.value() as f64).abs() <= MAX_TIME_MS => Some(n.value()),
        Value::DateTime(ms) => Some(*ms),
        Value::Absent => {
            return Err(type_error(
                format!("{} requires an argument", builtin.name()),
                at,
            ))
        }
        _ => None,
    };
    ms.ok_or_else(|| type_error(format!("{}: invalid time value", builtin.name()), at))
}

/// Parse the ISO-8601 forms a shell `Date` accepts. Text without an offset is
/// read as UTC.
pub(crate) fn parse_iso_date(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.timestamp_millis());
        }
    }
    let naive_text = text.strip_suffix('Z').unwrap_or(text);
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive_text, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    let date = match naive_text.len() {
        4 => NaiveDate::from_ymd_opt(naive_text.parse().ok()?, 1, 1),
        7 => {
            let (year, month) = naive_text.split_once('-')?;
            NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
        }
        _ => NaiveDate::parse_from_str(naive_text, "%Y-%m-%d").ok(),
    }?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

/// Force a value into plain data, as a schema-less JSON round trip would:
/// `undefined` fields are dropped, `undefined` array slots become `null`, and
/// non-finite plain numbers become `null`.
pub(crate) fn canonicalize(value: Value) -> Value {
    match value {
        Value::Number(n) if !n.is_finite() => Value::Null,
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| match canonicalize(item) {
                    Value::Absent => Value::Null,
                    other => other,
                })
                .collect(),
        ),
        Value::Document(mut doc) => {
            doc.retain(|_, v| {
                let taken = std::mem::replace(v, Value::Absent);
                *v = canonicalize(taken);
                !v.is_absent()
            });
            Value::Document(doc)
        }
        other => other,
    }
}

//! Shell command interpreter — turns `db.<collection>.<op>(…).<modifier>(…)`
//! chains into database command documents.
//!
//! The chain is recognised structurally rather than evaluated: the parsed
//! expression is flattened into property names and call argument lists, the
//! root must be `db`, and each call moves a small state machine forward.
//! Arguments are evaluated in a fresh [`Sandbox`], so they see the same
//! constructor whitelist as [`decode`](crate::decode) and nothing else (not
//! even `db`).
//!
//! | call | command |
//! |---|---|
//! | `find(filter?, projection?)` | `{find, filter, limit: 10}` |
//! | `findOne(filter?, projection?)` | `{find, filter, limit: 1}` |
//! | `insertOne(doc)` | `{insert, documents: [doc]}` |
//! | `insertMany(docs)` | `{insert, documents: docs}` |
//! | `updateOne(filter, update, {upsert?})` | `{update, updates: [{q, u, upsert, multi: false}]}` |
//! | `updateMany(filter, update, {upsert?})` | same with `multi: true` |
//! | `deleteOne(filter)` | `{delete, deletes: [{q, limit: 1}]}` |
//! | `deleteMany(filter)` | `{delete, deletes: [{q, limit: 0}]}` |
//! | `getIndexes()` | `{listIndexes}` |
//!
//! After `find`/`findOne`: `skip`, `limit`, `sort`, `hint`, `project` update the
//! command; `explain(verbosity?)` wraps it and `toArray()` returns it as is.
//! Both end the chain.
//!
//! # Example
//! ```
//! use ejson_core::{encode, parse_command, Value};
//! let cmd = parse_command("db.users.find({age: {$gt: 20}}).sort({age: 1}).limit(5)").unwrap();
//! assert_eq!(
//!     encode(&Value::Document(cmd)),
//!     r#"{ find: "users", filter: { age: { $gt: 20 } }, limit: 5, sort: { age: 1 } }"#
//! );
//! ```

use tracing::{debug, trace};

use crate::ast::{Expr, ExprKind, Property};
use crate::config::ParseOptions;
use crate::error::{FailureKind, Result, ShellError};
use crate::parser::parse_program;
use crate::sandbox::Sandbox;
use crate::types::{Document, Value};

const MODIFIERS: &[&str] = &["skip", "limit", "sort", "hint", "project"];
const TERMINALS: &[&str] = &["explain", "toArray"];
const EXPLAIN_VERBOSITY: &[&str] = &["queryPlanner", "executionStats", "allPlansExecution"];

/// Parse a shell chain into a command document using default [`ParseOptions`].
pub fn parse_command(text: &str) -> Result<Document> {
    parse_command_with(text, &ParseOptions::default())
}

/// Parse a shell chain into a command document with explicit [`ParseOptions`].
pub fn parse_command_with(text: &str, options: &ParseOptions) -> Result<Document> {
    let expr = parse_program(text, options.max_depth)?.ok_or_else(|| {
        ShellError::InvalidChainState("expected db.<collection>.<operation>(...)".to_string())
    })?;
    let sandbox = Sandbox::new();
    let segments = flatten(&expr, &sandbox)?;
    let command = Interpreter {
        sandbox,
        options: *options,
    }
    .run(&segments)?;
    debug!(
        len = text.len(),
        command = command.keys().next().map(String::as_str).unwrap_or(""),
        "parsed shell command"
    );
    Ok(command)
}

/// One link of a flattened chain.
enum Segment<'a> {
    Name(String),
    Call { args: &'a [Expr], at: &'a Expr },
}

/// Flatten `db.a.b.find(x).limit(1)` into
/// `[Name(a), Name(b), Name(find), Call(x), Name(limit), Call(1)]`,
/// checking that the root is `db`.
fn flatten<'a>(expr: &'a Expr, sandbox: &Sandbox) -> Result<Vec<Segment<'a>>> {
    let mut segments = Vec::new();
    let mut current = expr;
    loop {
        match &current.kind {
            ExprKind::Member { object, property } => {
                let name = match property {
                    Property::Named(name) => name.clone(),
                    Property::Computed(index) => match sandbox.evaluate(index)? {
                        Value::String(name) => name,
                        other => {
                            return Err(ShellError::failure(
                                FailureKind::Type,
                                format!("property name must be a string, got {}", other.type_name()),
                                index.pos(),
                            ))
                        }
                    },
                };
                segments.push(Segment::Name(name));
                current = object;
            }
            ExprKind::Call { callee, args } => {
                segments.push(Segment::Call { args, at: current });
                current = callee;
            }
            ExprKind::Ident(name) if name == "db" => break,
            ExprKind::Ident(name) if !Sandbox::is_bound(name) => {
                return Err(ShellError::failure(
                    FailureKind::Reference,
                    format!("{name} is not defined"),
                    current.pos(),
                ))
            }
            _ => {
                return Err(ShellError::InvalidChainState(
                    "expected db.<collection>.<operation>(...)".to_string(),
                ))
            }
        }
    }
    segments.reverse();
    Ok(segments)
}

/// Where the chain is: after `find`/`findOne` modifiers are allowed, after
/// any other operation nothing may follow, and `explain`/`toArray` end it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Cursor,
    Written(&'static str),
    Terminated(&'static str),
}

struct Interpreter {
    sandbox: Sandbox,
    options: ParseOptions,
}

impl Interpreter {
    fn run(&self, segments: &[Segment<'_>]) -> Result<Document> {
        // Every name up to the one followed by a call is part of the
        // collection name, so `db.system.profile.find()` targets "system.profile".
        let op_index = segments
            .iter()
            .position(|s| matches!(s, Segment::Call { .. }))
            .ok_or_else(|| {
                ShellError::InvalidChainState(
                    "expected an operation call such as find()".to_string(),
                )
            })?;
        if op_index == 0 {
            return Err(ShellError::InvalidChainState(
                "db is not a function".to_string(),
            ));
        }
        let mut parts = Vec::new();
        for segment in &segments[..op_index - 1] {
            if let Segment::Name(name) = segment {
                parts.push(name.as_str());
            }
        }
        let Segment::Name(op) = &segments[op_index - 1] else {
            return Err(ShellError::InvalidChainState("unexpected call".to_string()));
        };
        let Segment::Call { args, at } = &segments[op_index] else {
            return Err(ShellError::InvalidChainState("unexpected call".to_string()));
        };
        if parts.is_empty() {
            return Err(ShellError::UnsupportedOperation {
                target: "db".to_string(),
                name: op.clone(),
            });
        }
        let collection = parts.join(".");

        let (mut command, mut stage) = self.base_operation(&collection, op, args, at)?;
        trace!(collection = %collection, operation = %op, "chain started");

        let mut rest = &segments[op_index + 1..];
        while let Some((first, tail)) = rest.split_first() {
            let Segment::Name(name) = first else {
                return Err(ShellError::InvalidChainState(
                    "unexpected call on a command result".to_string(),
                ));
            };
            let Some((Segment::Call { args, at }, tail)) = tail.split_first() else {
                return Err(ShellError::InvalidChainState(format!(
                    "{name} must be called as {name}()"
                )));
            };
            (command, stage) = self.chain_call(command, stage, &collection, name, args, at)?;
            trace!(method = %name, stage = ?stage, "chain transition");
            rest = tail;
        }
        Ok(command)
    }

    fn base_operation(
        &self,
        collection: &str,
        op: &str,
        args: &[Expr],
        at: &Expr,
    ) -> Result<(Document, Stage)> {
        let mut command = Document::new();
        let stage = match op {
            "find" | "findOne" => {
                let values = self.arguments(op, args, 2, at)?;
                command.insert("find", Value::from(collection));
                if let Some(filter) =
                    document_arg(op, "filter", &values[0], arg_at(args, 0, at), true)?
                {
                    command.insert("filter", Value::Document(filter));
                }
                let limit = if op == "find" {
                    self.options.default_find_limit
                } else {
                    1
                };
                command.insert("limit", Value::Number(limit as f64));
                if let Some(projection) =
                    document_arg(op, "projection", &values[1], arg_at(args, 1, at), true)?
                {
                    command.insert("projection", Value::Document(projection));
                }
                Stage::Cursor
            }
            "insertOne" => {
                let values = self.arguments(op, args, 1, at)?;
                let doc = required_document(op, "document", &values[0], arg_at(args, 0, at))?;
                command.insert("insert", Value::from(collection));
                command.insert("documents", Value::Array(vec![Value::Document(doc)]));
                Stage::Written("insertOne")
            }
            "insertMany" => {
                let values = self.arguments(op, args, 1, at)?;
                let docs = match &values[0] {
                    Value::Array(items) if items.iter().all(|v| v.as_document().is_some()) => {
                        items.clone()
                    }
                    other => {
                        return Err(type_error(
                            format!(
                                "insertMany expects an array of documents, got {}",
                                other.type_name()
                            ),
                            arg_at(args, 0, at),
                        ))
                    }
                };
                command.insert("insert", Value::from(collection));
                command.insert("documents", Value::Array(docs));
                Stage::Written("insertMany")
            }
            "updateOne" | "updateMany" => {
                let values = self.arguments(op, args, 3, at)?;
                let filter = required_document(op, "filter", &values[0], arg_at(args, 0, at))?;
                let update = match &values[1] {
                    Value::Document(_) | Value::Array(_) => values[1].clone(),
                    other => {
                        return Err(type_error(
                            format!(
                                "{op} expects an update document or pipeline, got {}",
                                other.type_name()
                            ),
                            arg_at(args, 1, at),
                        ))
                    }
                };
                let options = document_arg(op, "options", &values[2], arg_at(args, 2, at), true)?;
                let mut statement = Document::new();
                statement.insert("q", Value::Document(filter));
                statement.insert("u", update);
                if let Some(upsert) = options.as_ref().and_then(|o| o.get("upsert")) {
                    statement.insert("upsert", upsert.clone());
                }
                statement.insert("multi", Value::Bool(op == "updateMany"));
                command.insert("update", Value::from(collection));
                command.insert("updates", Value::Array(vec![Value::Document(statement)]));
                Stage::Written(if op == "updateOne" {
                    "updateOne"
                } else {
                    "updateMany"
                })
            }
            "deleteOne" | "deleteMany" => {
                let values = self.arguments(op, args, 1, at)?;
                let filter = required_document(op, "filter", &values[0], arg_at(args, 0, at))?;
                let mut statement = Document::new();
                statement.insert("q", Value::Document(filter));
                let limit = if op == "deleteOne" { 1.0 } else { 0.0 };
                statement.insert("limit", Value::Number(limit));
                command.insert("delete", Value::from(collection));
                command.insert("deletes", Value::Array(vec![Value::Document(statement)]));
                Stage::Written(if op == "deleteOne" {
                    "deleteOne"
                } else {
                    "deleteMany"
                })
            }
            "getIndexes" => {
                self.arguments(op, args, 0, at)?;
                command.insert("listIndexes", Value::from(collection));
                Stage::Written("getIndexes")
            }
            name if MODIFIERS.contains(&name) || TERMINALS.contains(&name) => {
                return Err(ShellError::InvalidChainState(format!(
                    "{name}() must follow find() or findOne()"
                )))
            }
            name => {
                return Err(ShellError::UnsupportedOperation {
                    target: collection.to_string(),
                    name: name.to_string(),
                })
            }
        };
        Ok((command, stage))
    }

    fn chain_call(
        &self,
        mut command: Document,
        stage: Stage,
        collection: &str,
        name: &str,
        args: &[Expr],
        at: &Expr,
    ) -> Result<(Document, Stage)> {
        let known = MODIFIERS.contains(&name) || TERMINALS.contains(&name);
        match stage {
            Stage::Cursor if known => {}
            Stage::Written(op) if known => {
                return Err(ShellError::InvalidChainState(format!(
                    "{name}() cannot follow {op}(); it is only valid after find() or findOne()"
                )))
            }
            Stage::Terminated(last) if known => {
                return Err(ShellError::InvalidChainState(format!(
                    "{name}() cannot follow {last}(), which ends the chain"
                )))
            }
            Stage::Cursor if is_base_operation(name) => {
                return Err(ShellError::InvalidChainState(format!(
                    "{name}() cannot be chained onto a find()"
                )))
            }
            _ => {
                return Err(ShellError::UnsupportedOperation {
                    target: format!("{collection} cursor"),
                    name: name.to_string(),
                })
            }
        }

        match name {
            "skip" | "limit" => {
                let values = self.arguments(name, args, 1, at)?;
                match &values[0] {
                    Value::Number(_) | Value::Int32(_) | Value::Int64(_) | Value::Double(_) => {
                        command.insert(name, values[0].clone());
                    }
                    other => {
                        return Err(type_error(
                            format!("{name} expects a number, got {}", other.type_name()),
                            arg_at(args, 0, at),
                        ))
                    }
                }
            }
            "sort" | "project" => {
                let values = self.arguments(name, args, 1, at)?;
                let doc = required_document(name, "specification", &values[0], arg_at(args, 0, at))?;
                let field = if name == "project" { "projection" } else { "sort" };
                command.insert(field, Value::Document(doc));
            }
            "hint" => {
                let values = self.arguments(name, args, 1, at)?;
                match &values[0] {
                    Value::Document(_) | Value::String(_) => {
                        command.insert("hint", values[0].clone());
                    }
                    other => {
                        return Err(type_error(
                            format!(
                                "hint expects an index document or name, got {}",
                                other.type_name()
                            ),
                            arg_at(args, 0, at),
                        ))
                    }
                }
            }
            "explain" => {
                let values = self.arguments(name, args, 1, at)?;
                let mut wrapped = Document::new();
                wrapped.insert("explain", Value::Document(command));
                match &values[0] {
                    Value::Absent => {}
                    Value::String(v) if EXPLAIN_VERBOSITY.contains(&v.as_str()) => {
                        wrapped.insert("verbosity", values[0].clone());
                    }
                    other => {
                        return Err(type_error(
                            format!(
                                "explain verbosity must be one of {}, got {}",
                                EXPLAIN_VERBOSITY.join(", "),
                                crate::encoder::encode(other)
                            ),
                            arg_at(args, 0, at),
                        ))
                    }
                }
                return Ok((wrapped, Stage::Terminated("explain")));
            }
            _ => {
                self.arguments(name, args, 0, at)?;
                return Ok((command, Stage::Terminated("toArray")));
            }
        }
        Ok((command, Stage::Cursor))
    }

    /// Evaluate call arguments, padding missing ones with `Absent`.
    fn arguments(&self, name: &str, args: &[Expr], max: usize, at: &Expr) -> Result<Vec<Value>> {
        if args.len() > max {
            return Err(type_error(
                format!("{name}() takes at most {max} argument(s), got {}", args.len()),
                at,
            ));
        }
        let mut values = args
            .iter()
            .map(|arg| self.sandbox.evaluate(arg))
            .collect::<Result<Vec<_>>>()?;
        values.resize(max.max(1), Value::Absent);
        Ok(values)
    }
}

fn is_base_operation(name: &str) -> bool {
    matches!(
        name,
        "find"
            | "findOne"
            | "insertOne"
            | "insertMany"
            | "updateOne"
            | "updateMany"
            | "deleteOne"
            | "deleteMany"
            | "getIndexes"
    )
}

fn arg_at<'a>(args: &'a [Expr], index: usize, call: &'a Expr) -> &'a Expr {
    args.get(index).unwrap_or(call)
}

fn type_error(message: String, at: &Expr) -> ShellError {
    ShellError::failure(FailureKind::Type, message, at.pos())
}

/// A document argument; `Absent` (and `null` when optional) yields `None`.
fn document_arg(
    op: &str,
    what: &str,
    value: &Value,
    at: &Expr,
    optional: bool,
) -> Result<Option<Document>> {
    match value {
        Value::Document(doc) => Ok(Some(doc.clone())),
        Value::Absent | Value::Null if optional => Ok(None),
        other => Err(type_error(
            format!("{op} expects a {what} document, got {}", other.type_name()),
            at,
        )),
    }
}

fn required_document(op: &str, what: &str, value: &Value, at: &Expr) -> Result<Document> {
    document_arg(op, what, value, at, false)?.ok_or_else(|| {
        type_error(format!("{op} expects a {what} document"), at)
    })
}

//! Expression tree produced by the parser.

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Expr {
    pub kind: ExprKind,
    pub line: usize,
    pub column: usize,
}

impl Expr {
    pub(crate) fn pos(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    /// The source text of a numeric literal, including a leading sign.
    pub(crate) fn numeric_text(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Number { text, .. } => Some(text.clone()),
            ExprKind::Unary { op, operand } => {
                let inner = operand.numeric_text()?;
                match op {
                    UnaryOp::Neg if inner.starts_with('-') => Some(inner[1..].to_string()),
                    UnaryOp::Neg => Some(format!("-{inner}")),
                    UnaryOp::Plus => Some(inner),
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExprKind {
    Null,
    Bool(bool),
    Number {
        value: f64,
        text: String,
    },
    String(String),
    Regex {
        pattern: String,
        flags: String,
    },
    /// `None` marks a hole (`[1, , 2]`).
    Array(Vec<Option<Expr>>),
    Object(Vec<(String, Expr)>),
    Ident(String),
    Member {
        object: Box<Expr>,
        property: Property,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Property {
    /// `.name`
    Named(String),
    /// `[expr]`
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Plus,
}

//! Recursive-descent parser for shell literals and call chains.
//!
//! The whole text is parsed before anything is evaluated, so a syntax error
//! anywhere in the input is reported even if an earlier part would have
//! failed evaluation.

use crate::ast::{Expr, ExprKind, Property, UnaryOp};
use crate::encoder::format_number;
use crate::error::{FailureKind, Result, ShellError};
use crate::lexer::{tokenize, NumLit, RegexLit, Token, TokenKind};

/// Parse `src` as a single optional expression followed by optional `;`.
///
/// Returns `Ok(None)` for input that holds no expression (blank or comments only).
pub(crate) fn parse_program(src: &str, max_depth: usize) -> Result<Option<Expr>> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
    };
    parser.skip_semicolons();
    if parser.at(&TokenKind::Eof) {
        return Ok(None);
    }
    let expr = parser.expression()?;
    parser.skip_semicolons();
    if !parser.at(&TokenKind::Eof) {
        return Err(parser.unexpected());
    }
    Ok(Some(expr))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token list always ends with Eof and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> ShellError {
        let token = self.peek();
        ShellError::failure(
            FailureKind::Syntax,
            format!("Unexpected {}", token.kind.describe()),
            token.pos(),
        )
    }

    fn skip_semicolons(&mut self) {
        while self.eat(&TokenKind::Semicolon) {}
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ShellError::failure(
                FailureKind::Syntax,
                format!("Maximum nesting depth of {} exceeded", self.max_depth),
                self.peek().pos(),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expression(&mut self) -> Result<Expr> {
        self.enter()?;
        let expr = self.unary();
        self.leave();
        expr
    }

    fn unary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        let op = match token.kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.expression()?;
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            line: token.line,
            column: token.column,
        })
    }

    /// Primary expression followed by any number of `.name`, `[expr]` and
    /// `(args)` suffixes. Each suffix nests the tree one level deeper, so each
    /// counts against the depth limit.
    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        let mut links = 0;
        loop {
            let token = self.peek().clone();
            if matches!(
                token.kind,
                TokenKind::Dot | TokenKind::LBracket | TokenKind::LParen
            ) {
                self.enter()?;
                links += 1;
            }
            let kind = match token.kind {
                TokenKind::Dot => {
                    self.advance();
                    ExprKind::Member {
                        object: Box::new(expr),
                        property: Property::Named(self.property_name()?),
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(&TokenKind::RBracket)?;
                    ExprKind::Member {
                        object: Box::new(expr),
                        property: Property::Computed(Box::new(index)),
                    }
                }
                TokenKind::LParen => {
                    let args = self.arguments()?;
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    }
                }
                _ => {
                    self.depth -= links;
                    return Ok(expr);
                }
            };
            expr = Expr {
                kind,
                line: token.line,
                column: token.column,
            };
        }
    }

    fn property_name(&mut self) -> Result<String> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.at(&TokenKind::RParen) {
            args.push(self.expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr> {
        if matches!(
            self.peek().kind,
            TokenKind::Eof
                | TokenKind::RBrace
                | TokenKind::RBracket
                | TokenKind::RParen
                | TokenKind::Comma
                | TokenKind::Colon
                | TokenKind::Dot
                | TokenKind::Semicolon
                | TokenKind::Plus
                | TokenKind::Minus
        ) {
            return Err(self.unexpected());
        }
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::Num(NumLit { value, text }) => ExprKind::Number { value, text },
            TokenKind::Str(s) => ExprKind::String(s),
            TokenKind::Regex(RegexLit { pattern, flags }) => ExprKind::Regex { pattern, flags },
            TokenKind::Ident(name) => match name.as_str() {
                "null" => ExprKind::Null,
                "true" => ExprKind::Bool(true),
                "false" => ExprKind::Bool(false),
                "new" => self.new_expression()?,
                _ => ExprKind::Ident(name),
            },
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => self.array()?,
            TokenKind::LBrace => self.object()?,
            // Rejected above.
            _ => return Err(self.unexpected()),
        };
        Ok(Expr {
            kind,
            line: token.line,
            column: token.column,
        })
    }

    /// `new Callee` or `new Callee(args)`; the callee may be a dotted path.
    fn new_expression(&mut self) -> Result<ExprKind> {
        let start = self.peek().clone();
        let name = self.property_name()?;
        let mut callee = Expr {
            kind: ExprKind::Ident(name),
            line: start.line,
            column: start.column,
        };
        let mut links = 0;
        while self.at(&TokenKind::Dot) {
            self.enter()?;
            links += 1;
            let dot = self.advance();
            callee = Expr {
                kind: ExprKind::Member {
                    object: Box::new(callee),
                    property: Property::Named(self.property_name()?),
                },
                line: dot.line,
                column: dot.column,
            };
        }
        let args = if self.at(&TokenKind::LParen) {
            self.arguments()?
        } else {
            Vec::new()
        };
        self.depth -= links;
        Ok(ExprKind::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn array(&mut self) -> Result<ExprKind> {
        self.enter()?;
        let mut items = Vec::new();
        loop {
            if self.eat(&TokenKind::RBracket) {
                break;
            }
            if self.eat(&TokenKind::Comma) {
                items.push(None);
                continue;
            }
            items.push(Some(self.expression()?));
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBracket)?;
                break;
            }
        }
        self.leave();
        Ok(ExprKind::Array(items))
    }

    fn object(&mut self) -> Result<ExprKind> {
        self.enter()?;
        let mut fields = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            if !matches!(
                self.peek().kind,
                TokenKind::Ident(_) | TokenKind::Str(_) | TokenKind::Num(_)
            ) {
                return Err(self.unexpected());
            }
            let token = self.advance();
            let key = match token.kind {
                TokenKind::Ident(name) => {
                    if !self.at(&TokenKind::Colon) {
                        // Shorthand `{ name }` reads the binding of the same name.
                        fields.push((
                            name.clone(),
                            Expr {
                                kind: ExprKind::Ident(name),
                                line: token.line,
                                column: token.column,
                            },
                        ));
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                        continue;
                    }
                    name
                }
                TokenKind::Str(s) => s,
                TokenKind::Num(num) => format_number(num.value),
                _ => return Err(self.unexpected()),
            };
            self.expect(&TokenKind::Colon)?;
            fields.push((key, self.expression()?));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        self.leave();
        Ok(ExprKind::Object(fields))
    }
}

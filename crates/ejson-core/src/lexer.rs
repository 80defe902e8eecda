//! Tokenizer for shell literal and chain text, built on the logos lexer
//! generator.
//!
//! The grammar has no division operator, so a `/` that does not open a
//! comment always starts a regular-expression literal.

use std::fmt;

use logos::{Lexer, Logos};

use crate::error::{FailureKind, Result, ShellError};

/// Lexer error types.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) enum LexError {
    #[default]
    UnexpectedCharacter,
    UnterminatedString,
    UnterminatedComment,
    UnterminatedRegex,
    InvalidHexEscape,
    InvalidUnicodeEscape,
    CodePointOutOfRange,
    LoneSurrogate,
    OctalEscape,
    LegacyOctal,
    InvalidNumber(String),
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnexpectedCharacter => write!(f, "Invalid or unexpected token"),
            LexError::UnterminatedString => write!(f, "Unterminated string literal"),
            LexError::UnterminatedComment => write!(f, "Unterminated comment"),
            LexError::UnterminatedRegex => write!(f, "Invalid regular expression: missing /"),
            LexError::InvalidHexEscape => write!(f, "Invalid hexadecimal escape sequence"),
            LexError::InvalidUnicodeEscape => write!(f, "Invalid Unicode escape sequence"),
            LexError::CodePointOutOfRange => write!(f, "Undefined Unicode code-point"),
            LexError::LoneSurrogate => write!(f, "Lone surrogate in string literal"),
            LexError::OctalEscape => write!(f, "Octal escape sequences are not allowed"),
            LexError::LegacyOctal => write!(f, "Octal literals are not allowed"),
            LexError::InvalidNumber(text) => write!(f, "Invalid number '{text}'"),
        }
    }
}

/// A numeric literal with its source text, kept for exact-digit types.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NumLit {
    pub value: f64,
    pub text: String,
}

/// A `/pattern/flags` literal; the pattern is the verbatim source between
/// the slashes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RegexLit {
    pub pattern: String,
    pub flags: String,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"\s+")]
pub(crate) enum TokenKind {
    // ═══════════════════════════════════════════════════════════════════
    // Punctuation
    // ═══════════════════════════════════════════════════════════════════
    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(",")]
    Comma,

    #[token(":")]
    Colon,

    #[token(".")]
    Dot,

    #[token(";")]
    Semicolon,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    // ═══════════════════════════════════════════════════════════════════
    // Literals
    // ═══════════════════════════════════════════════════════════════════
    /// Quoted string, either quote style; the value has escapes resolved.
    #[regex(r#""([^"\\\n]|\\(.|\n))*""#, lex_string)]
    #[regex(r#"'([^'\\\n]|\\(.|\n))*'"#, lex_string)]
    Str(String),

    /// Decimal, hex, octal or binary number.
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", lex_decimal, priority = 5)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", lex_decimal, priority = 5)]
    #[regex(r"0[xX][0-9a-fA-F]+", |lex| lex_radix(lex, 16), priority = 5)]
    #[regex(r"0[oO][0-7]+", |lex| lex_radix(lex, 8), priority = 5)]
    #[regex(r"0[bB][01]+", |lex| lex_radix(lex, 2), priority = 5)]
    Num(NumLit),

    /// `/pattern/flags`.
    #[token("/", lex_regex)]
    Regex(RegexLit),

    #[regex(r"[\p{L}_$][\p{L}\p{N}_$]*", |lex| lex.slice().to_string())]
    Ident(String),

    // ═══════════════════════════════════════════════════════════════════
    // Invalid patterns (matched so they report a precise error)
    // ═══════════════════════════════════════════════════════════════════
    /// A quote with no closing quote on the same line.
    #[regex(r#""([^"\\\n]|\\(.|\n))*"#, lex_unterminated_string, allow_greedy = true)]
    #[regex(r#"'([^'\\\n]|\\(.|\n))*"#, lex_unterminated_string, allow_greedy = true)]
    UnterminatedString,

    /// A number running straight into identifier characters (`12ab`, `0xZ`).
    #[regex(r"[0-9]+(\.[0-9]*)?[\p{L}_$][\p{L}\p{N}_$]*", lex_number_ident, priority = 2)]
    NumberIdent,

    // ═══════════════════════════════════════════════════════════════════
    // Trivia
    // ═══════════════════════════════════════════════════════════════════
    #[regex(r"//[^\n]*", allow_greedy = true)]
    #[token("/*", lex_block_comment)]
    Comment,

    /// Synthesized by [`tokenize`] after the last token; never lexed.
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Num(num) => format!("number {}", num.text),
            TokenKind::Regex(_) => "regular expression".to_string(),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::UnterminatedString | TokenKind::NumberIdent | TokenKind::Comment => {
                "token".to_string()
            }
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub(crate) fn pos(&self) -> (usize, usize) {
        (self.line, self.column)
    }
}

/// Split `src` into tokens, always ending with [`TokenKind::Eof`]. Comments
/// are dropped; the first lexical error is reported at the start of the
/// offending token.
pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut cursor = Cursor {
        src,
        offset: 0,
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();
    for (result, span) in TokenKind::lexer(src).spanned() {
        let (line, column) = cursor.advance_to(span.start);
        match result {
            Ok(TokenKind::Comment) => {}
            Ok(kind) => tokens.push(Token { kind, line, column }),
            Err(err) => {
                return Err(ShellError::failure(
                    FailureKind::Syntax,
                    err.to_string(),
                    (line, column),
                ))
            }
        }
    }
    let (line, column) = cursor.advance_to(src.len());
    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
        column,
    });
    Ok(tokens)
}

/// Converts monotonically increasing byte offsets into 1-based line and
/// column (in characters).
struct Cursor<'a> {
    src: &'a str,
    offset: usize,
    line: usize,
    column: usize,
}

impl Cursor<'_> {
    fn advance_to(&mut self, target: usize) -> (usize, usize) {
        if let Some(skipped) = self.src.get(self.offset..target) {
            for c in skipped.chars() {
                if c == '\n' {
                    self.line += 1;
                    self.column = 1;
                } else {
                    self.column += 1;
                }
            }
            self.offset = target;
        }
        (self.line, self.column)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Callbacks
// ═══════════════════════════════════════════════════════════════════════════

fn lex_string(lex: &mut Lexer<TokenKind>) -> std::result::Result<String, LexError> {
    let s = lex.slice();
    unescape(&s[1..s.len() - 1])
}

fn lex_unterminated_string(_lex: &mut Lexer<TokenKind>) -> std::result::Result<(), LexError> {
    Err(LexError::UnterminatedString)
}

fn lex_number_ident(lex: &mut Lexer<TokenKind>) -> std::result::Result<(), LexError> {
    Err(LexError::InvalidNumber(lex.slice().to_string()))
}

fn lex_decimal(lex: &mut Lexer<TokenKind>) -> std::result::Result<NumLit, LexError> {
    let text = lex.slice();
    let bytes = text.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' && bytes[1].is_ascii_digit() {
        return Err(LexError::LegacyOctal);
    }
    let value = text
        .parse::<f64>()
        .map_err(|_| LexError::InvalidNumber(text.to_string()))?;
    Ok(NumLit {
        value,
        text: text.to_string(),
    })
}

fn lex_radix(lex: &mut Lexer<TokenKind>, radix: u32) -> std::result::Result<NumLit, LexError> {
    let text = lex.slice();
    let value = text[2..]
        .chars()
        .try_fold(0f64, |acc, c| {
            c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
        })
        .ok_or_else(|| LexError::InvalidNumber(text.to_string()))?;
    Ok(NumLit {
        value,
        text: text.to_string(),
    })
}

/// Consume the body of a regex literal after its opening `/`: up to the
/// first unescaped `/` outside a character class, then any flag letters.
fn lex_regex(lex: &mut Lexer<TokenKind>) -> std::result::Result<RegexLit, LexError> {
    let rest = lex.remainder();
    let mut in_class = false;
    let mut chars = rest.char_indices();
    let close = loop {
        match chars.next() {
            None | Some((_, '\n')) => return Err(LexError::UnterminatedRegex),
            Some((_, '\\')) => {
                if matches!(chars.next(), None | Some((_, '\n'))) {
                    return Err(LexError::UnterminatedRegex);
                }
            }
            Some((_, '[')) => in_class = true,
            Some((_, ']')) => in_class = false,
            Some((i, '/')) if !in_class => break i,
            Some(_) => {}
        }
    };
    let after = &rest[close + 1..];
    let flags_len = after
        .find(|c: char| !is_ident_part(c))
        .unwrap_or(after.len());
    let literal = RegexLit {
        pattern: rest[..close].to_string(),
        flags: after[..flags_len].to_string(),
    };
    lex.bump(close + 1 + flags_len);
    Ok(literal)
}

fn lex_block_comment(lex: &mut Lexer<TokenKind>) -> std::result::Result<(), LexError> {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            Ok(())
        }
        None => Err(LexError::UnterminatedComment),
    }
}

fn is_ident_part(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

/// Resolve the escapes of a quoted string body.
fn unescape(body: &str) -> std::result::Result<String, LexError> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        // The lexer regex guarantees a character after every backslash.
        let Some(escaped) = chars.next() else {
            return Err(LexError::UnterminatedString);
        };
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !chars.peek().is_some_and(char::is_ascii_digit) => out.push('\0'),
            '\n' => {}
            'x' => {
                let code = hex_digits(&mut chars, 2).ok_or(LexError::InvalidHexEscape)?;
                out.push(char::from_u32(code).ok_or(LexError::InvalidHexEscape)?);
            }
            'u' => {
                let code = unicode_escape(&mut chars)?;
                if (0xD800..0xDC00).contains(&code) {
                    let mut lookahead = chars.clone();
                    if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
                        chars = lookahead;
                        let low = unicode_escape(&mut chars)?;
                        if !(0xDC00..0xE000).contains(&low) {
                            return Err(LexError::LoneSurrogate);
                        }
                        let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                        out.push(char::from_u32(combined).ok_or(LexError::LoneSurrogate)?);
                        continue;
                    }
                }
                out.push(char::from_u32(code).ok_or(LexError::LoneSurrogate)?);
            }
            d if d.is_ascii_digit() => return Err(LexError::OctalEscape),
            other => out.push(other),
        }
    }
    Ok(out)
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

/// `\uXXXX` or `\u{X…}`, with the `\u` already consumed.
fn unicode_escape(chars: &mut Chars<'_>) -> std::result::Result<u32, LexError> {
    if chars.peek() != Some(&'{') {
        return hex_digits(chars, 4).ok_or(LexError::InvalidUnicodeEscape);
    }
    chars.next();
    let mut code: u32 = 0;
    let mut any = false;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(16)) {
        code = code
            .checked_mul(16)
            .and_then(|c| c.checked_add(d))
            .filter(|c| *c <= 0x10FFFF)
            .ok_or(LexError::CodePointOutOfRange)?;
        any = true;
        chars.next();
    }
    if !any || chars.next() != Some('}') {
        return Err(LexError::InvalidUnicodeEscape);
    }
    Ok(code)
}

fn hex_digits(chars: &mut Chars<'_>, count: usize) -> Option<u32> {
    let mut code = 0;
    for _ in 0..count {
        let d = chars.peek()?.to_digit(16)?;
        code = code * 16 + d;
        chars.next();
    }
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn error(src: &str) -> String {
        tokenize(src).unwrap_err().to_string()
    }

    #[test]
    fn test_chain_tokens() {
        assert_eq!(
            kinds("db.users.find()"),
            vec![
                TokenKind::Ident("db".into()),
                TokenKind::Dot,
                TokenKind::Ident("users".into()),
                TokenKind::Dot,
                TokenKind::Ident("find".into()),
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_dropped() {
        assert_eq!(
            kinds("// lead\n1 /* mid */ , 2"),
            vec![
                TokenKind::Num(NumLit {
                    value: 1.0,
                    text: "1".into()
                }),
                TokenKind::Comma,
                TokenKind::Num(NumLit {
                    value: 2.0,
                    text: "2".into()
                }),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers_keep_source_text() {
        match &kinds("0x1F")[0] {
            TokenKind::Num(num) => {
                assert_eq!(num.value, 31.0);
                assert_eq!(num.text, "0x1F");
            }
            other => panic!("expected number, got {other:?}"),
        }
        match &kinds("1.50e2")[0] {
            TokenKind::Num(num) => assert_eq!(num.value, 150.0),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn test_number_running_into_identifier() {
        assert!(error("12ab").contains("Invalid number '12ab'"));
        assert!(error("0xZ").contains("Invalid number"));
        assert!(error("017").contains("Octal literals"));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "A\x42\u{1F600}""#)[..2],
            [
                TokenKind::Str("it's".into()),
                TokenKind::Str("AB😀".into())
            ]
        );
        assert_eq!(
            kinds(r#""😀""#)[0],
            TokenKind::Str("😀".into())
        );
    }

    #[test]
    fn test_bad_strings() {
        assert!(error("\"abc").contains("Unterminated string literal"));
        assert!(error("'a\nb'").contains("Unterminated string literal"));
        assert!(error(r#""\xZZ""#).contains("hexadecimal escape"));
        assert!(error(r#""\1""#).contains("Octal escape"));
        assert!(error(r#""\uDC00""#).contains("Lone surrogate"));
    }

    #[test]
    fn test_regex_literal() {
        assert_eq!(
            kinds(r"/a[/]\/b/gi, 1")[0],
            TokenKind::Regex(RegexLit {
                pattern: r"a[/]\/b".into(),
                flags: "gi".into()
            })
        );
        assert!(error("/abc").contains("missing /"));
    }

    #[test]
    fn test_unterminated_comment() {
        assert!(error("1 /* open").contains("Unterminated comment"));
    }

    #[test]
    fn test_positions_are_one_based_characters() {
        let tokens = tokenize("{\n  é: ]").unwrap();
        let close = tokens
            .iter()
            .find(|t| t.kind == TokenKind::RBracket)
            .unwrap();
        assert_eq!(close.pos(), (2, 6));
        let eof = tokens.last().unwrap();
        assert_eq!((eof.kind.clone(), eof.pos()), (TokenKind::Eof, (2, 7)));
    }

    #[test]
    fn test_error_reports_token_start() {
        match tokenize("[1,\n  @]") {
            Err(ShellError::Parse(failure)) => {
                assert_eq!((failure.line, failure.column), (2, 3));
            }
            other => panic!("expected lex error, got {other:?}"),
        }
    }
}

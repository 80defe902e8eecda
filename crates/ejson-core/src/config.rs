//! Options for encoding and parsing.

/// Controls the layout of [`encode_with`](crate::encoder::encode_with) output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Spaces per nesting level. `0` renders everything on one line.
    pub indent: usize,
}

impl EncodeOptions {
    pub fn compact() -> Self {
        Self { indent: 0 }
    }

    pub fn pretty(indent: usize) -> Self {
        Self { indent }
    }
}

/// Limits and defaults applied while parsing shell text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Page cap written into every `find` command.
    pub default_find_limit: i64,
    /// Deepest nesting accepted before the parser gives up. Brackets, braces,
    /// unary signs and every `.name`, `[expr]` or `(args)` link of a chain
    /// each add a level.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_find_limit: 10,
            max_depth: 256,
        }
    }
}

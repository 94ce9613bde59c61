use std::{fmt, ops::Range};

use serde::{Deserialize, Serialize};

use crate::lexer::CharStream;

pub const EOF: i32 = -1;
/// Pseudo token type used by lookahead sets for "can reach end of rule".
pub const EPSILON: i32 = -2;
pub const INVALID_TYPE: i32 = 0;
pub const MIN_USER_TOKEN_TYPE: i32 = 1;

pub const DEFAULT_CHANNEL: i32 = 0;
pub const HIDDEN_CHANNEL: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub ttype: i32,
    pub channel: i32,
    /// Code point offsets into the source; end is exclusive.
    pub span: Range<usize>,
    pub line: usize,
    pub column: usize,
    /// Position in the token stream; `None` until buffered, and for tokens
    /// conjured up by error recovery.
    pub index: Option<usize>,
    /// Eagerly copied or explicitly set text. When `None` the text is
    /// resolved through the token source.
    pub text: Option<String>,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        self.ttype == EOF
    }

    pub fn start(&self) -> usize {
        self.span.start
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match &self.text {
            Some(t) => escape_whitespace(t),
            None => "<no text>".to_string(),
        };
        write!(
            f,
            "[@{},{}:{}='{}',<{}>{},{}:{}]",
            self.index.map(|i| i as i64).unwrap_or(-1),
            self.span.start,
            self.span.end as i64 - 1,
            text,
            self.ttype,
            if self.channel > 0 {
                format!(",channel={}", self.channel)
            } else {
                String::new()
            },
            self.line,
            self.column
        )
    }
}

pub fn escape_whitespace(s: &str) -> String {
    s.replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Hook for constructing tokens out of matched spans.
pub trait TokenFactory {
    #[allow(clippy::too_many_arguments)]
    fn create(
        &self,
        input: &dyn CharStream,
        ttype: i32,
        text: Option<String>,
        channel: i32,
        span: Range<usize>,
        line: usize,
        column: usize,
    ) -> Token;
}

/// Default factory. With `copy_text` set the token text is copied out of
/// the stream when the token is made, for streams that cannot hand out
/// historical text later.
#[derive(Debug, Clone, Default)]
pub struct CommonTokenFactory {
    pub copy_text: bool,
}

impl CommonTokenFactory {
    pub fn new(copy_text: bool) -> Self {
        CommonTokenFactory { copy_text }
    }
}

impl TokenFactory for CommonTokenFactory {
    fn create(
        &self,
        input: &dyn CharStream,
        ttype: i32,
        text: Option<String>,
        channel: i32,
        span: Range<usize>,
        line: usize,
        column: usize,
    ) -> Token {
        let text = match text {
            Some(t) => Some(t),
            None if self.copy_text => input.text(span.clone()),
            None => None,
        };
        Token {
            ttype,
            channel,
            span,
            line,
            column,
            index: None,
            text,
        }
    }
}

use std::ops::Range;

use crate::{
    lexer::TokenSource,
    token::{self, Token},
};

/// Random-access view of a token sequence as seen by the parser.
pub trait TokenStream {
    /// Type of the token `i` positions ahead (`1` is the current token,
    /// `-1` the previous one).
    fn la(&mut self, i: isize) -> i32 {
        self.lt(i).map(|t| t.ttype).unwrap_or(token::INVALID_TYPE)
    }
    fn lt(&mut self, i: isize) -> Option<&Token>;
    fn get(&self, index: usize) -> Option<&Token>;
    fn index(&self) -> usize;
    fn seek(&mut self, index: usize);
    /// Moves past the current token; a no-op at EOF.
    fn consume(&mut self);
    fn size(&self) -> usize;
    /// Text of a token, resolving lazily held text through the source.
    fn token_text(&self, t: &Token) -> String;
    /// Text covered by the tokens `start..=stop`.
    fn text_between(&self, start: usize, stop: usize) -> String {
        let mut s = String::new();
        for i in start..=stop {
            match self.get(i) {
                Some(t) if t.is_eof() => break,
                Some(t) => s.push_str(&self.token_text(t)),
                None => break,
            }
        }
        s
    }
}

/// Buffers every token from a source and presents only those on one
/// channel; the others stay in the buffer and keep their indices.
pub struct CommonTokenStream<S: TokenSource> {
    source: S,
    tokens: Vec<Token>,
    /// Index into `tokens` of the current on-channel token.
    p: Option<usize>,
    channel: i32,
    fetched_eof: bool,
}

impl<S: TokenSource> CommonTokenStream<S> {
    pub fn new(source: S) -> Self {
        Self::with_channel(source, token::DEFAULT_CHANNEL)
    }

    pub fn with_channel(source: S, channel: i32) -> Self {
        CommonTokenStream {
            source,
            tokens: vec![],
            p: None,
            channel,
            fetched_eof: false,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Every token read so far, all channels included.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Reads the whole source.
    pub fn fill(&mut self) {
        self.lazy_init();
        while self.fetch(1000) == 1000 {}
    }

    pub fn text(&mut self) -> String {
        self.fill();
        if self.tokens.is_empty() {
            return String::new();
        }
        self.text_between(0, self.tokens.len() - 1)
    }

    fn lazy_init(&mut self) {
        if self.p.is_none() {
            self.sync(0);
            let p = self.next_token_on_channel(0);
            self.p = Some(p);
        }
    }

    /// Makes sure index `i` is buffered.
    fn sync(&mut self, i: usize) -> bool {
        if i + 1 > self.tokens.len() {
            let n = i + 1 - self.tokens.len();
            return self.fetch(n) >= n;
        }
        true
    }

    fn fetch(&mut self, n: usize) -> usize {
        if self.fetched_eof {
            return 0;
        }
        for i in 0..n {
            let mut t = self.source.next_token();
            t.index = Some(self.tokens.len());
            let eof = t.is_eof();
            self.tokens.push(t);
            if eof {
                self.fetched_eof = true;
                return i + 1;
            }
        }
        n
    }

    fn next_token_on_channel(&mut self, mut i: usize) -> usize {
        self.sync(i);
        if i >= self.tokens.len() {
            return self.tokens.len().saturating_sub(1);
        }
        loop {
            let t = &self.tokens[i];
            if t.channel == self.channel || t.is_eof() {
                return i;
            }
            i += 1;
            self.sync(i);
            if i >= self.tokens.len() {
                return self.tokens.len() - 1;
            }
        }
    }

    fn previous_token_on_channel(&self, i: usize) -> Option<usize> {
        let mut i = i as isize;
        while i >= 0 {
            let t = &self.tokens[i as usize];
            if t.is_eof() || t.channel == self.channel {
                return Some(i as usize);
            }
            i -= 1;
        }
        None
    }

    fn current(&mut self) -> usize {
        self.lazy_init();
        self.p.unwrap_or(0)
    }
}

impl<S: TokenSource> TokenStream for CommonTokenStream<S> {
    fn lt(&mut self, k: isize) -> Option<&Token> {
        let p = self.current();
        if k == 0 {
            return None;
        }
        if k < 0 {
            let mut i = p;
            for _ in 0..(-k) {
                if i == 0 {
                    return None;
                }
                i = self.previous_token_on_channel(i - 1)?;
            }
            return self.tokens.get(i);
        }
        let mut i = p;
        for _ in 1..k {
            if self.tokens.get(i).map(|t| t.is_eof()).unwrap_or(true) {
                break;
            }
            i = self.next_token_on_channel(i + 1);
        }
        self.tokens.get(i)
    }

    fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    fn index(&self) -> usize {
        self.p.unwrap_or(0)
    }

    fn seek(&mut self, index: usize) {
        self.lazy_init();
        let p = self.next_token_on_channel(index);
        self.p = Some(p);
    }

    fn consume(&mut self) {
        let p = self.current();
        if self.tokens.get(p).map(|t| t.is_eof()).unwrap_or(true) {
            return;
        }
        let next = self.next_token_on_channel(p + 1);
        self.p = Some(next);
    }

    fn size(&self) -> usize {
        self.tokens.len()
    }

    fn token_text(&self, t: &Token) -> String {
        match &t.text {
            Some(s) => s.clone(),
            None => self.source.text(t.span.clone()).unwrap_or_default(),
        }
    }
}

/// Replays a fixed list of tokens, then EOF forever.
pub struct ListTokenSource {
    tokens: Vec<Token>,
    pos: usize,
    text: Option<String>,
    name: String,
}

impl ListTokenSource {
    pub fn new(tokens: Vec<Token>) -> Self {
        ListTokenSource {
            tokens,
            pos: 0,
            text: None,
            name: "List".to_string(),
        }
    }

    /// Attaches the source text the token spans refer to.
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    fn make_eof(&self) -> Token {
        let (start, line, column) = match self.tokens.last() {
            Some(last) => (
                last.span.end,
                last.line,
                last.column + last.span.len(),
            ),
            None => (0, 1, 0),
        };
        Token {
            ttype: token::EOF,
            channel: token::DEFAULT_CHANNEL,
            span: start..start,
            line,
            column,
            index: None,
            text: Some("<EOF>".to_string()),
        }
    }
}

impl TokenSource for ListTokenSource {
    fn next_token(&mut self) -> Token {
        if self.pos < self.tokens.len() {
            let t = self.tokens[self.pos].clone();
            if !t.is_eof() {
                self.pos += 1;
            }
            return t;
        }
        self.make_eof()
    }

    fn line(&self) -> usize {
        match self.tokens.get(self.pos) {
            Some(t) => t.line,
            None => self.make_eof().line,
        }
    }

    fn column(&self) -> usize {
        match self.tokens.get(self.pos) {
            Some(t) => t.column,
            None => self.make_eof().column,
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn text(&self, span: Range<usize>) -> Option<String> {
        let text = self.text.as_ref()?;
        Some(text.chars().skip(span.start).take(span.len()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(ttype: i32, channel: i32, start: usize) -> Token {
        Token {
            ttype,
            channel,
            span: start..start + 1,
            line: 1,
            column: start,
            index: None,
            text: None,
        }
    }

    #[test]
    fn hides_off_channel_tokens() {
        let src = ListTokenSource::new(vec![
            tok(1, 0, 0),
            tok(2, 1, 1),
            tok(3, 0, 2),
            tok(2, 1, 3),
        ])
        .with_text("a b ");
        let mut ts = CommonTokenStream::new(src);
        assert_eq!(ts.la(1), 1);
        assert_eq!(ts.la(2), 3);
        assert_eq!(ts.la(3), token::EOF);
        assert_eq!(ts.la(9), token::EOF);
        ts.consume();
        assert_eq!(ts.index(), 2);
        assert_eq!(ts.la(-1), 1);
        ts.consume();
        assert_eq!(ts.la(1), token::EOF);
        ts.consume();
        assert_eq!(ts.la(1), token::EOF);
        assert_eq!(ts.tokens().len(), 5);
        assert_eq!(ts.text(), "a b ");
        ts.seek(1);
        assert_eq!(ts.index(), 2);
    }
}

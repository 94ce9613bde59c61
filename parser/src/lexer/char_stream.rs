use std::ops::Range;

use crate::token;

/// Random-access stream of code points.
pub trait CharStream {
    /// Code point at offset `i` from the current position (`1` is the next
    /// one to consume, `-1` the previous one); `token::EOF` past either end.
    fn la(&self, i: isize) -> i32;
    fn index(&self) -> usize;
    fn size(&self) -> usize;
    fn consume(&mut self);
    fn seek(&mut self, index: usize);
    /// Text of `span`, clamped to the stream; `None` if the stream no longer
    /// holds it.
    fn text(&self, span: Range<usize>) -> Option<String>;
    fn source_name(&self) -> &str {
        "<unknown>"
    }
}

/// In-memory stream over a whole string.
#[derive(Debug, Clone)]
pub struct InputStream {
    data: Vec<char>,
    pos: usize,
    name: String,
}

impl InputStream {
    pub fn new(input: &str) -> Self {
        InputStream {
            data: input.chars().collect(),
            pos: 0,
            name: "<unknown>".to_string(),
        }
    }

    pub fn with_name(input: &str, name: &str) -> Self {
        InputStream {
            name: name.to_string(),
            ..Self::new(input)
        }
    }
}

impl CharStream for InputStream {
    fn la(&self, i: isize) -> i32 {
        let idx = if i > 0 {
            self.pos as isize + i - 1
        } else if i < 0 {
            self.pos as isize + i
        } else {
            return 0;
        };
        if idx < 0 || idx as usize >= self.data.len() {
            token::EOF
        } else {
            self.data[idx as usize] as i32
        }
    }

    fn index(&self) -> usize {
        self.pos
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn consume(&mut self) {
        if self.pos < self.data.len() {
            self.pos += 1;
        }
    }

    fn seek(&mut self, index: usize) {
        self.pos = std::cmp::min(index, self.data.len());
    }

    fn text(&self, span: Range<usize>) -> Option<String> {
        let end = std::cmp::min(span.end, self.data.len());
        let start = std::cmp::min(span.start, end);
        Some(self.data[start..end].iter().collect())
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookahead_and_lookbehind() {
        let mut s = InputStream::new("a😀");
        assert_eq!(s.size(), 2);
        assert_eq!(s.la(1), 'a' as i32);
        assert_eq!(s.la(-1), token::EOF);
        s.consume();
        assert_eq!(s.la(1), 0x1F600);
        assert_eq!(s.la(-1), 'a' as i32);
        s.consume();
        s.consume();
        assert_eq!(s.index(), 2);
        assert_eq!(s.la(1), token::EOF);
        assert_eq!(s.text(0..5).as_deref(), Some("a😀"));
    }
}

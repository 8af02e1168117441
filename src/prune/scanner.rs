//! Raw tokenizer over configuration source bytes.
//!
//! Unlike the HCL parser this keeps exact byte offsets and never interprets
//! expressions: an address such as `module.foo["a b"]` or a quoted template
//! such as `"${local.a}-1"` comes back as one `Word` token whose text is the
//! source text verbatim.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    OpenBrace,
    CloseBrace,
    Equals,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a [u8],
    pub start: usize,
    pub end: usize,
}

impl Token<'_> {
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text == word.as_bytes()
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(self.text).into_owned()
    }
}

pub struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek(0) {
            match ch {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'#' => self.skip_line(),
                b'/' if self.peek(1) == Some(b'/') => self.skip_line(),
                b'/' if self.peek(1) == Some(b'*') => {
                    self.pos += 2;
                    while self.pos < self.src.len() && !self.src[self.pos..].starts_with(b"*/") {
                        self.pos += 1;
                    }
                    self.pos = (self.pos + 2).min(self.src.len());
                }
                _ => break,
            }
        }
    }

    // Stops on the newline so line-start detection still sees it.
    fn skip_line(&mut self) {
        while let Some(ch) = self.peek(0) {
            if ch == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn scan_word(&mut self) {
        while let Some(ch) = self.peek(0) {
            if ch == b'"' {
                self.pos = skip_string(self.src, self.pos);
            } else if is_word_byte(ch) && !self.src[self.pos..].starts_with(b"//") {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// `<<EOF` / `<<-EOF` up to and including the closing marker line.
    fn scan_heredoc(&mut self) -> bool {
        let mut cursor = self.pos + 2;
        if self.src.get(cursor) == Some(&b'-') {
            cursor += 1;
        }
        let marker_start = cursor;
        while self
            .src
            .get(cursor)
            .is_some_and(|ch| ch.is_ascii_alphanumeric() || *ch == b'_')
        {
            cursor += 1;
        }
        if cursor == marker_start {
            return false;
        }
        let marker = &self.src[marker_start..cursor];

        let mut line_start = match self.src[cursor..].iter().position(|ch| *ch == b'\n') {
            Some(newline) => cursor + newline + 1,
            None => return false,
        };
        while line_start < self.src.len() {
            let line_end = self.src[line_start..]
                .iter()
                .position(|ch| *ch == b'\n')
                .map_or(self.src.len(), |newline| line_start + newline);
            if self.src[line_start..line_end].trim_ascii() == marker {
                self.pos = line_end;
                return true;
            }
            line_start = line_end + 1;
        }
        self.pos = self.src.len();
        true
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        self.skip_trivia();
        let start = self.pos;
        let ch = self.peek(0)?;

        if ch == b'<' && self.peek(1) == Some(b'<') && self.scan_heredoc() {
            return Some(Token {
                kind: TokenKind::Other,
                text: &self.src[start..self.pos],
                start,
                end: self.pos,
            });
        }

        let kind = match ch {
            b'{' => {
                self.pos += 1;
                TokenKind::OpenBrace
            }
            b'}' => {
                self.pos += 1;
                TokenKind::CloseBrace
            }
            b'=' if !matches!(self.peek(1), Some(b'=' | b'>')) => {
                self.pos += 1;
                TokenKind::Equals
            }
            b'=' => {
                self.pos += 2;
                TokenKind::Other
            }
            ch if ch == b'"' || is_word_byte(ch) => {
                self.scan_word();
                TokenKind::Word
            }
            _ => {
                self.pos += 1;
                TokenKind::Other
            }
        };

        Some(Token {
            kind,
            text: &self.src[start..self.pos],
            start,
            end: self.pos,
        })
    }
}

fn is_word_byte(ch: u8) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(ch, b'-' | b'_' | b'.' | b'[' | b']' | b':' | b'$' | b'/')
        || !ch.is_ascii()
}

/// Returns the offset just past the string literal opening at `start`.
fn skip_string(src: &[u8], start: usize) -> usize {
    let mut pos = start + 1;
    while pos < src.len() {
        match src[pos] {
            b'\\' => pos += 2,
            b'"' => return pos + 1,
            b'$' | b'%' if src.get(pos + 1) == Some(&b'{') => {
                pos = skip_template(src, pos + 2);
            }
            _ => pos += 1,
        }
    }
    src.len()
}

// Inside `${ ... }`, nested strings may contain braces of their own.
fn skip_template(src: &[u8], start: usize) -> usize {
    let mut depth = 1;
    let mut pos = start;
    while pos < src.len() {
        match src[pos] {
            b'"' => {
                pos = skip_string(src, pos);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return pos + 1;
                }
            }
            _ => {}
        }
        pos += 1;
    }
    src.len()
}

//! PDF tokenizer.
//!
//! Scans an in-memory byte buffer into [`Token`]s. The cursor is a plain
//! byte offset, so lookahead is a matter of saving [`Lexer::position`] and
//! calling [`Lexer::seek`] to go back.

use crate::error::{PdfJoinError, Result};
use crate::object::StringFormat;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Real(f64),
    String(Vec<u8>, StringFormat),
    /// Name without the leading slash, `#xx` escapes decoded.
    Name(Vec<u8>),
    Boolean(bool),
    Null,
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    Obj,
    EndObj,
    Stream,
    EndStream,
    XRef,
    Trailer,
    StartXRef,
    /// The `R` of an indirect reference.
    R,
    /// Any other run of regular characters.
    Keyword(Vec<u8>),
    EndOfInput,
}

/// PDF whitespace characters (ISO 32000-1, table 1).
pub fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

/// PDF delimiter characters (ISO 32000-1, table 2).
pub fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(byte: u8) -> bool {
    !is_whitespace(byte) && !is_delimiter(byte)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Tokenizer over a byte slice.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a lexer positioned at `offset`.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            pos: offset.min(data.len()),
        }
    }

    /// The buffer being scanned.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor to `offset` (clamped to the end of the buffer).
    pub fn seek(&mut self, offset: usize) {
        self.pos = offset.min(self.data.len());
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.data.get(self.pos + ahead).copied()
    }

    /// Skip whitespace and comments.
    pub fn skip_whitespace(&mut self) {
        while let Some(byte) = self.peek() {
            if is_whitespace(byte) {
                self.pos += 1;
            } else if byte == b'%' {
                while let Some(byte) = self.peek() {
                    if byte == b'\r' || byte == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Skip the end-of-line marker that follows the `stream` keyword.
    ///
    /// CRLF and LF are the legal forms; a lone CR is accepted too.
    pub fn skip_stream_eol(&mut self) {
        match self.peek() {
            Some(b'\r') => {
                self.pos += 1;
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            Some(b'\n') => self.pos += 1,
            _ => {}
        }
    }

    /// Scan the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(byte) = self.peek() else {
            return Ok(Token::EndOfInput);
        };

        match byte {
            b'[' => {
                self.pos += 1;
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.pos += 1;
                Ok(Token::ArrayEnd)
            }
            b'<' if self.peek_at(1) == Some(b'<') => {
                self.pos += 2;
                Ok(Token::DictStart)
            }
            b'>' if self.peek_at(1) == Some(b'>') => {
                self.pos += 2;
                Ok(Token::DictEnd)
            }
            b'<' => self.read_hex_string(),
            b'>' => Err(PdfJoinError::malformed_syntax(start, "stray '>'")),
            b'(' => self.read_literal_string(),
            b')' => Err(PdfJoinError::malformed_syntax(start, "stray ')'")),
            b'/' => Ok(self.read_name()),
            b'{' | b'}' => Err(PdfJoinError::malformed_syntax(
                start,
                format!("unexpected delimiter '{}'", byte as char),
            )),
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number(),
            _ => Ok(self.read_keyword()),
        }
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut digits = 0;
        let mut dot = false;
        while let Some(byte) = self.peek() {
            match byte {
                b'0'..=b'9' => digits += 1,
                b'.' if !dot => dot = true,
                _ => break,
            }
            self.pos += 1;
        }
        if digits == 0 {
            return Err(PdfJoinError::malformed_syntax(start, "number without digits"));
        }

        let text = std::str::from_utf8(&self.data[start..self.pos])
            .map_err(|_| PdfJoinError::malformed_syntax(start, "invalid number"))?;
        if !dot {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(Token::Integer(value));
            }
        }
        let normalized = if text.ends_with('.') {
            format!("{text}0")
        } else {
            text.to_string()
        };
        normalized
            .parse::<f64>()
            .map(Token::Real)
            .map_err(|_| PdfJoinError::malformed_syntax(start, format!("invalid number '{text}'")))
    }

    fn read_literal_string(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let mut depth = 1usize;
        let mut out = Vec::new();

        loop {
            let Some(byte) = self.peek() else {
                return Err(PdfJoinError::malformed_syntax(start, "unterminated string"));
            };
            self.pos += 1;
            match byte {
                b'(' => {
                    depth += 1;
                    out.push(byte);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(byte);
                }
                b'\r' => {
                    if self.peek() == Some(b'\n') {
                        self.pos += 1;
                    }
                    out.push(b'\n');
                }
                b'\\' => self.read_escape(start, &mut out)?,
                _ => out.push(byte),
            }
        }

        Ok(Token::String(out, StringFormat::Literal))
    }

    fn read_escape(&mut self, start: usize, out: &mut Vec<u8>) -> Result<()> {
        let Some(byte) = self.peek() else {
            return Err(PdfJoinError::malformed_syntax(start, "unterminated string"));
        };
        self.pos += 1;
        match byte {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'(' | b')' | b'\\' => out.push(byte),
            b'\r' => {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            b'0'..=b'7' => {
                let mut value = u32::from(byte - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(digit @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(digit - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            // Unknown escapes drop the backslash.
            other => out.push(other),
        }
        Ok(())
    }

    fn read_hex_string(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        let mut high: Option<u8> = None;

        loop {
            let Some(byte) = self.peek() else {
                return Err(PdfJoinError::malformed_syntax(
                    start,
                    "unterminated hex string",
                ));
            };
            self.pos += 1;
            if byte == b'>' {
                break;
            }
            if is_whitespace(byte) {
                continue;
            }
            let Some(nibble) = hex_value(byte) else {
                return Err(PdfJoinError::malformed_syntax(
                    self.pos - 1,
                    format!("invalid hex digit '{}'", byte as char),
                ));
            };
            match high.take() {
                Some(h) => out.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }
        if let Some(h) = high {
            out.push(h << 4);
        }

        Ok(Token::String(out, StringFormat::Hexadecimal))
    }

    fn read_name(&mut self) -> Token {
        self.pos += 1;
        let mut out = Vec::new();
        while let Some(byte) = self.peek() {
            if !is_regular(byte) {
                break;
            }
            if byte == b'#' {
                let decoded = self
                    .peek_at(1)
                    .and_then(hex_value)
                    .zip(self.peek_at(2).and_then(hex_value));
                if let Some((h, l)) = decoded {
                    out.push((h << 4) | l);
                    self.pos += 3;
                    continue;
                }
            }
            out.push(byte);
            self.pos += 1;
        }
        Token::Name(out)
    }

    fn read_keyword(&mut self) -> Token {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if !is_regular(byte) {
                break;
            }
            self.pos += 1;
        }
        let word = &self.data[start..self.pos];
        match word {
            b"obj" => Token::Obj,
            b"endobj" => Token::EndObj,
            b"stream" => Token::Stream,
            b"endstream" => Token::EndStream,
            b"xref" => Token::XRef,
            b"trailer" => Token::Trailer,
            b"startxref" => Token::StartXRef,
            b"R" => Token::R,
            b"true" => Token::Boolean(true),
            b"false" => Token::Boolean(false),
            b"null" => Token::Null,
            _ => Token::Keyword(word.to_vec()),
        }
    }
}

//! Object parser.
//!
//! Builds [`PdfValue`] trees from tokens. Indirect references are found by
//! two-token lookahead after an integer, and a dictionary followed by the
//! `stream` keyword becomes a [`Stream`] whose payload is sliced straight out
//! of the buffer using `/Length`.

use tracing::warn;

use super::lexer::{Lexer, Token};
use crate::error::{PdfJoinError, Result};
use crate::object::{Dictionary, IndirectObject, ObjectId, PdfValue, Stream};

/// Resolves an indirect `/Length` to its integer value.
///
/// Returns `None` when the object is missing or not an integer.
pub type LengthResolver<'r> = &'r dyn Fn(ObjectId) -> Option<i64>;

/// Parser over a byte buffer.
pub struct ObjectParser<'a> {
    lexer: Lexer<'a>,
    max_depth: usize,
}

impl<'a> ObjectParser<'a> {
    /// Create a parser positioned at `offset`.
    pub fn at(data: &'a [u8], offset: usize, max_depth: usize) -> Self {
        Self {
            lexer: Lexer::at(data, offset),
            max_depth,
        }
    }

    /// Access the underlying lexer.
    pub fn lexer(&mut self) -> &mut Lexer<'a> {
        &mut self.lexer
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.lexer.position()
    }

    /// Parse one value at the cursor.
    ///
    /// A top-level dictionary followed by `stream` is read as a stream; an
    /// indirect `/Length` is resolved through `resolve_length`, and without a
    /// resolver such a stream is rejected.
    pub fn parse_object(&mut self, resolve_length: Option<LengthResolver<'_>>) -> Result<PdfValue> {
        let start = self.lexer.position();
        let token = self.lexer.next_token()?;
        let value = self.parse_value(token, start, 0)?;

        let PdfValue::Dictionary(dict) = value else {
            return Ok(value);
        };
        let saved = self.lexer.position();
        if matches!(self.lexer.next_token(), Ok(Token::Stream)) {
            let stream = self.parse_stream_body(dict, start, resolve_length)?;
            Ok(PdfValue::Stream(stream))
        } else {
            self.lexer.seek(saved);
            Ok(PdfValue::Dictionary(dict))
        }
    }

    /// Parse `N G obj … endobj` at the cursor.
    ///
    /// When `expected` is given, the header must name that object. A missing
    /// `endobj` is tolerated.
    pub fn parse_indirect_object(
        &mut self,
        expected: Option<ObjectId>,
        resolve_length: Option<LengthResolver<'_>>,
    ) -> Result<IndirectObject> {
        let start = self.lexer.position();
        let id = self.parse_object_header()?;
        if let Some(expected) = expected {
            if expected != id {
                return Err(PdfJoinError::malformed_object(
                    start,
                    format!("expected object {expected}, found {id}"),
                ));
            }
        }

        let value = self.parse_object(resolve_length)?;

        let saved = self.lexer.position();
        match self.lexer.next_token() {
            Ok(Token::EndObj) => {}
            _ => {
                warn!(object = %id, offset = start, "missing endobj");
                self.lexer.seek(saved);
            }
        }

        Ok(IndirectObject { id, value })
    }

    /// Parse `N G obj` and return the id.
    pub fn parse_object_header(&mut self) -> Result<ObjectId> {
        let start = self.lexer.position();
        let number = self.lexer.next_token()?;
        let generation = self.lexer.next_token()?;
        let keyword = self.lexer.next_token()?;
        match (number, generation, keyword) {
            (Token::Integer(n), Token::Integer(g), Token::Obj) => {
                let number = u32::try_from(n).map_err(|_| {
                    PdfJoinError::malformed_object(start, format!("invalid object number {n}"))
                })?;
                let generation = u16::try_from(g).map_err(|_| {
                    PdfJoinError::malformed_object(start, format!("invalid generation {g}"))
                })?;
                Ok(ObjectId::new(number, generation))
            }
            _ => Err(PdfJoinError::malformed_object(
                start,
                "expected object header 'N G obj'",
            )),
        }
    }

    fn parse_value(&mut self, token: Token, start: usize, depth: usize) -> Result<PdfValue> {
        match token {
            Token::Integer(value) => Ok(self.integer_or_reference(value)),
            Token::Real(value) => Ok(PdfValue::Real(value)),
            Token::String(bytes, format) => Ok(PdfValue::String(bytes, format)),
            Token::Name(name) => Ok(PdfValue::Name(name)),
            Token::Boolean(value) => Ok(PdfValue::Boolean(value)),
            Token::Null => Ok(PdfValue::Null),
            Token::ArrayStart => self.parse_array(start, depth + 1),
            Token::DictStart => self.parse_dictionary(start, depth + 1).map(PdfValue::Dictionary),
            Token::EndOfInput => Err(PdfJoinError::malformed_object(
                start,
                "unexpected end of input",
            )),
            other => Err(PdfJoinError::malformed_object(
                start,
                format!("unexpected token {other:?}"),
            )),
        }
    }

    fn integer_or_reference(&mut self, number: i64) -> PdfValue {
        let saved = self.lexer.position();
        if let (Ok(n), Ok(Token::Integer(g))) = (u32::try_from(number), self.lexer.next_token()) {
            if let (Ok(g), Ok(Token::R)) = (u16::try_from(g), self.lexer.next_token()) {
                return PdfValue::Reference(ObjectId::new(n, g));
            }
        }
        self.lexer.seek(saved);
        PdfValue::Integer(number)
    }

    fn check_depth(&self, start: usize, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            warn!(offset = start, depth, "nesting too deep");
            return Err(PdfJoinError::limit_exceeded(
                "max_nesting_depth",
                depth as u64,
                self.max_depth as u64,
            ));
        }
        Ok(())
    }

    fn parse_array(&mut self, start: usize, depth: usize) -> Result<PdfValue> {
        self.check_depth(start, depth)?;
        let mut items = Vec::new();
        loop {
            let item_start = self.lexer.position();
            match self.lexer.next_token()? {
                Token::ArrayEnd => return Ok(PdfValue::Array(items)),
                Token::EndOfInput => {
                    return Err(PdfJoinError::malformed_object(start, "unterminated array"));
                }
                token => items.push(self.parse_value(token, item_start, depth)?),
            }
        }
    }

    fn parse_dictionary(&mut self, start: usize, depth: usize) -> Result<Dictionary> {
        self.check_depth(start, depth)?;
        let mut dict = Dictionary::new();
        loop {
            let key_start = self.lexer.position();
            let key = match self.lexer.next_token()? {
                Token::DictEnd => return Ok(dict),
                Token::Name(key) => key,
                Token::EndOfInput => {
                    return Err(PdfJoinError::malformed_object(
                        start,
                        "unterminated dictionary",
                    ));
                }
                other => {
                    return Err(PdfJoinError::malformed_object(
                        key_start,
                        format!("dictionary key must be a name, found {other:?}"),
                    ));
                }
            };

            let value_start = self.lexer.position();
            match self.lexer.next_token()? {
                // `<< /Key >>`: the value is missing, treat as null.
                Token::DictEnd => {
                    dict.set(key, PdfValue::Null);
                    return Ok(dict);
                }
                token => {
                    let value = self.parse_value(token, value_start, depth)?;
                    dict.set(key, value);
                }
            }
        }
    }

    fn parse_stream_body(
        &mut self,
        dict: Dictionary,
        start: usize,
        resolve_length: Option<LengthResolver<'_>>,
    ) -> Result<Stream> {
        let length = match dict.get(b"Length") {
            Some(PdfValue::Integer(length)) => *length,
            Some(PdfValue::Reference(id)) => {
                let Some(resolve) = resolve_length else {
                    return Err(PdfJoinError::malformed_object(
                        start,
                        format!("stream /Length {id} must be a direct integer here"),
                    ));
                };
                resolve(*id).ok_or_else(|| {
                    PdfJoinError::malformed_object(start, format!("cannot resolve stream /Length {id}"))
                })?
            }
            Some(other) => {
                return Err(PdfJoinError::malformed_object(
                    start,
                    format!("stream /Length is a {}", other.kind()),
                ));
            }
            None => {
                return Err(PdfJoinError::malformed_object(start, "stream without /Length"));
            }
        };

        let length = usize::try_from(length).map_err(|_| {
            PdfJoinError::malformed_object(start, format!("negative stream /Length {length}"))
        })?;

        self.lexer.skip_stream_eol();
        let data_start = self.lexer.position();
        let data = self.lexer.data();
        let data_end = data_start
            .checked_add(length)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| {
                PdfJoinError::malformed_object(
                    start,
                    format!("stream /Length {length} runs past the end of the file"),
                )
            })?;
        let content = data[data_start..data_end].to_vec();

        self.lexer.seek(data_end);
        match self.lexer.next_token() {
            Ok(Token::EndStream) => Ok(Stream::new(dict, content)),
            _ => Err(PdfJoinError::malformed_object(
                data_end,
                "'endstream' does not follow the stream payload",
            )),
        }
    }
}

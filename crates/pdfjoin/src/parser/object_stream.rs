//! Object streams (`/Type /ObjStm`, PDF 1.5+).
//!
//! The decoded payload starts with `N` pairs of integers (object number,
//! offset relative to `/First`) followed by the objects themselves, which
//! are bare values without `obj`/`endobj` wrappers.

use super::filters::decode_stream;
use super::lexer::{Lexer, Token};
use super::objects::ObjectParser;
use crate::config::Limits;
use crate::error::{PdfJoinError, Result};
use crate::object::{PdfValue, Stream};

/// A decoded object stream.
#[derive(Debug, Clone)]
pub struct ObjectStream {
    data: Vec<u8>,
    first: usize,
    /// (object number, offset relative to `first`) per index.
    index: Vec<(u32, usize)>,
    max_depth: usize,
}

impl ObjectStream {
    /// Decode an object stream and read its header.
    pub fn parse(stream: &Stream, limits: &Limits) -> Result<Self> {
        let dict = &stream.dict;
        let count = dict
            .get(b"N")
            .and_then(PdfValue::as_i64)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| PdfJoinError::malformed_object(0, "object stream without a valid /N"))?;
        let first = dict
            .get(b"First")
            .and_then(PdfValue::as_i64)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                PdfJoinError::malformed_object(0, "object stream without a valid /First")
            })?;

        let data = decode_stream(stream, limits.max_decoded_bytes)?;
        let mut lexer = Lexer::new(&data[..first.min(data.len())]);
        let mut index = Vec::new();
        for _ in 0..count {
            let number = lexer.next_token()?;
            let offset = lexer.next_token()?;
            match (number, offset) {
                (Token::Integer(number), Token::Integer(offset)) => {
                    let (Ok(number), Ok(offset)) = (u32::try_from(number), usize::try_from(offset))
                    else {
                        return Err(PdfJoinError::malformed_object(
                            lexer.position(),
                            "negative entry in object stream header",
                        ));
                    };
                    index.push((number, offset));
                }
                _ => {
                    return Err(PdfJoinError::malformed_object(
                        lexer.position(),
                        "object stream header is shorter than /N",
                    ));
                }
            }
        }

        Ok(Self {
            data,
            first,
            index,
            max_depth: limits.max_nesting_depth,
        })
    }

    /// Number of objects in the stream.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the stream holds no objects.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Object numbers in index order.
    pub fn object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.index.iter().map(|(number, _)| *number)
    }

    /// Parse the object at `index`, checking it carries object `number`.
    ///
    /// Returns `Ok(None)` when the index is out of range or names a
    /// different object.
    pub fn get(&self, index: usize, number: u32) -> Result<Option<PdfValue>> {
        let Some(&(stored, offset)) = self.index.get(index) else {
            return Ok(None);
        };
        if stored != number {
            return Ok(None);
        }
        let mut parser = ObjectParser::at(&self.data, self.first + offset, self.max_depth);
        parser.parse_object(None).map(Some)
    }
}

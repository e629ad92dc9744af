//! Stream decoding for cross-reference and object streams.
//!
//! Only the filters those streams use in practice are supported:
//! `FlateDecode` (with PNG and TIFF predictors) and `ASCIIHexDecode`.
//! Page content is copied encoded and never passes through here.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::{PdfJoinError, Result};
use crate::object::{Dictionary, PdfValue, Stream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    Flate,
    AsciiHex,
}

impl Filter {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"FlateDecode" | b"Fl" => Some(Self::Flate),
            b"ASCIIHexDecode" | b"AHx" => Some(Self::AsciiHex),
            _ => None,
        }
    }
}

/// Predictor parameters from `/DecodeParms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Predictor {
    predictor: i64,
    colors: usize,
    bits_per_component: usize,
    columns: usize,
}

impl Predictor {
    fn from_params(params: Option<&Dictionary>) -> Result<Self> {
        let int = |key: &[u8], default: i64| {
            params
                .and_then(|p| p.get(key))
                .and_then(PdfValue::as_i64)
                .unwrap_or(default)
        };
        let positive = |key: &'static str, value: i64| {
            usize::try_from(value)
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| PdfJoinError::malformed_object(0, format!("invalid /{key} {value}")))
        };
        Ok(Self {
            predictor: int(b"Predictor", 1),
            colors: positive("Colors", int(b"Colors", 1))?,
            bits_per_component: positive("BitsPerComponent", int(b"BitsPerComponent", 8))?,
            columns: positive("Columns", int(b"Columns", 1))?,
        })
    }

    fn bits_per_pixel(&self) -> Result<usize> {
        self.colors
            .checked_mul(self.bits_per_component)
            .ok_or_else(|| PdfJoinError::malformed_object(0, "predictor pixel size overflows"))
    }

    fn bytes_per_pixel(&self) -> Result<usize> {
        Ok(self.bits_per_pixel()?.div_ceil(8))
    }

    fn row_len(&self) -> Result<usize> {
        self.bits_per_pixel()?
            .checked_mul(self.columns)
            .map(|bits| bits.div_ceil(8))
            .ok_or_else(|| PdfJoinError::malformed_object(0, "predictor row size overflows"))
    }

    fn apply(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        match self.predictor {
            1 => Ok(data),
            2 => self.undo_tiff(data),
            10..=15 => self.undo_png(&data),
            other => Err(PdfJoinError::malformed_object(
                0,
                format!("unsupported predictor {other}"),
            )),
        }
    }

    fn undo_tiff(&self, mut data: Vec<u8>) -> Result<Vec<u8>> {
        if self.bits_per_component != 8 {
            return Err(PdfJoinError::malformed_object(
                0,
                "TIFF predictor is only supported with 8 bits per component",
            ));
        }
        let bpp = self.bytes_per_pixel()?;
        for row in data.chunks_mut(self.row_len()?) {
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        Ok(data)
    }

    fn undo_png(&self, data: &[u8]) -> Result<Vec<u8>> {
        let bpp = self.bytes_per_pixel()?;
        let row_len = self.row_len()?;
        if data.is_empty() {
            return Ok(Vec::new());
        }
        if row_len > data.len() {
            return Err(PdfJoinError::malformed_object(
                0,
                format!(
                    "predictor row of {row_len} bytes exceeds the {} decoded bytes",
                    data.len()
                ),
            ));
        }
        let mut out = Vec::with_capacity(data.len());
        let mut previous = vec![0u8; row_len];

        for encoded in data.chunks(row_len + 1) {
            let (&kind, bytes) = encoded
                .split_first()
                .ok_or_else(|| PdfJoinError::malformed_object(0, "empty predictor row"))?;
            let mut row = bytes.to_vec();
            row.resize(row_len, 0);

            for i in 0..row_len {
                let left = if i >= bpp { row[i - bpp] } else { 0 };
                let up = previous[i];
                let upper_left = if i >= bpp { previous[i - bpp] } else { 0 };
                row[i] = match kind {
                    0 => row[i],
                    1 => row[i].wrapping_add(left),
                    2 => row[i].wrapping_add(up),
                    3 => row[i].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                    4 => row[i].wrapping_add(paeth(left, up, upper_left)),
                    other => {
                        return Err(PdfJoinError::malformed_object(
                            0,
                            format!("invalid PNG predictor row type {other}"),
                        ));
                    }
                };
            }

            out.extend_from_slice(&row);
            previous = row;
        }

        Ok(out)
    }
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Inflate at most `max_decoded` bytes; one byte more is a limit error.
fn decode_flate(data: &[u8], max_decoded: u64) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data).take(max_decoded.saturating_add(1));
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| PdfJoinError::malformed_object(0, format!("FlateDecode failed: {e}")))?;
    let len = out.len() as u64;
    if len > max_decoded {
        return Err(PdfJoinError::limit_exceeded("max_decoded_bytes", len, max_decoded));
    }
    Ok(out)
}

fn decode_ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;
    for &byte in data {
        if byte == b'>' {
            break;
        }
        if super::lexer::is_whitespace(byte) {
            continue;
        }
        let nibble = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ => {
                return Err(PdfJoinError::malformed_object(
                    0,
                    format!("invalid hex digit '{}' in ASCIIHexDecode data", byte as char),
                ));
            }
        };
        match high.take() {
            Some(h) => out.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    Ok(out)
}

/// Decode a stream's payload through its `/Filter` chain.
///
/// # Errors
///
/// `MalformedObject` for unsupported filters or corrupt data, and
/// `LimitExceeded` when inflating would produce more than `max_decoded`
/// bytes.
pub fn decode_stream(stream: &Stream, max_decoded: u64) -> Result<Vec<u8>> {
    let filters: Vec<&[u8]> = match stream.dict.get(b"Filter") {
        None | Some(PdfValue::Null) => return Ok(stream.content.clone()),
        Some(PdfValue::Name(name)) => vec![name.as_slice()],
        Some(PdfValue::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_name()
                    .ok_or_else(|| PdfJoinError::malformed_object(0, "invalid entry in /Filter array"))
            })
            .collect::<Result<_>>()?,
        Some(other) => {
            return Err(PdfJoinError::malformed_object(
                0,
                format!("/Filter is a {}", other.kind()),
            ));
        }
    };

    let params: Vec<Option<&Dictionary>> = match stream.dict.get(b"DecodeParms") {
        Some(PdfValue::Array(items)) => items.iter().map(PdfValue::as_dict).collect(),
        Some(value) => vec![value.as_dict()],
        None => Vec::new(),
    };

    let mut data = stream.content.clone();
    for (i, name) in filters.iter().enumerate() {
        let filter = Filter::from_name(name).ok_or_else(|| {
            PdfJoinError::malformed_object(
                0,
                format!("unsupported filter /{}", String::from_utf8_lossy(name)),
            )
        })?;
        data = match filter {
            Filter::Flate => {
                let predictor = Predictor::from_params(params.get(i).copied().flatten())?;
                predictor.apply(decode_flate(&data, max_decoded)?)?
            }
            Filter::AsciiHex => decode_ascii_hex(&data)?,
        };
    }
    Ok(data)
}

//! Low-level PDF parsing.
//!
//! Leaf-first:
//!
//! - [`lexer`]: bytes to tokens
//! - [`objects`]: tokens to values, streams and indirect objects
//! - [`filters`]: decoding for xref and object streams
//! - [`object_stream`]: compressed objects (`/ObjStm`)
//! - [`xref`]: cross-reference tables, streams, `/Prev` chains and recovery

pub mod filters;
pub mod lexer;
pub mod object_stream;
pub mod objects;
pub mod xref;

pub use lexer::{Lexer, Token};
pub use objects::{LengthResolver, ObjectParser};
pub use xref::{Location, XRefEntry, XRefTable};

/// Find the `%PDF-x.y` header within the first 1024 bytes.
///
/// Returns the header offset and the declared version.
pub fn find_header(data: &[u8]) -> Option<(usize, String)> {
    let window = &data[..data.len().min(1024)];
    let offset = window.windows(5).position(|w| w == b"%PDF-")?;
    let version: String = data[offset + 5..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .take(8)
        .map(|b| *b as char)
        .collect();
    Some((offset, version))
}

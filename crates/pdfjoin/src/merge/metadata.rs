//! Document information (`/Info`) for the merged output.
//!
//! The first input's information dictionary is carried over, explicit
//! [`Metadata`] fields override it, and the producer is always `pdfjoin`.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Metadata;
use crate::object::{Dictionary, PdfValue, StringFormat};

/// Value written to `/Producer`, and to `/Creator` when the source has none.
pub const PRODUCER: &str = "pdfjoin";

/// Manager for PDF metadata.
#[derive(Debug, Clone, Default)]
pub struct MetadataManager;

impl MetadataManager {
    /// Create a new metadata manager.
    pub fn new() -> Self {
        Self
    }

    /// Build the output information dictionary.
    ///
    /// Starts from `source` (already renumbered) when given, applies the
    /// non-empty fields of `metadata`, sets `/Producer`, keeps or sets
    /// `/Creator` and `/CreationDate`, and stamps `/ModDate` with the
    /// current time.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdfjoin::config::Metadata;
    /// use pdfjoin::merge::metadata::MetadataManager;
    ///
    /// let metadata = Metadata::new(Some("Report".to_string()), None, None, None);
    /// let info = MetadataManager::new().build_info(None, &metadata);
    /// assert!(info.has(b"Title"));
    /// assert!(info.has(b"Producer"));
    /// ```
    pub fn build_info(&self, source: Option<&Dictionary>, metadata: &Metadata) -> Dictionary {
        let mut info = source.cloned().unwrap_or_default();

        let fields = [
            ("Title", &metadata.title),
            ("Author", &metadata.author),
            ("Subject", &metadata.subject),
            ("Keywords", &metadata.keywords),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                info.set(key, pdf_text_string(value));
            }
        }

        let now = format_pdf_date(SystemTime::now());
        info.set("Producer", pdf_text_string(PRODUCER));
        if !info.has(b"Creator") {
            info.set("Creator", pdf_text_string(PRODUCER));
        }
        if !info.has(b"CreationDate") {
            info.set("CreationDate", PdfValue::string_literal(now.clone()));
        }
        info.set("ModDate", PdfValue::string_literal(now));
        info
    }

    /// Read the four descriptive fields from an information dictionary.
    pub fn read_metadata(&self, info: &Dictionary) -> Metadata {
        let field = |key: &[u8]| {
            info.get(key)
                .and_then(PdfValue::as_string)
                .and_then(decode_text_string)
        };
        Metadata::new(
            field(b"Title"),
            field(b"Author"),
            field(b"Subject"),
            field(b"Keywords"),
        )
    }
}

/// Encode text as a PDF text string.
///
/// ASCII stays a literal string; anything else is written as UTF-16BE with
/// a byte order mark.
pub fn pdf_text_string(text: &str) -> PdfValue {
    if text.is_ascii() {
        return PdfValue::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    PdfValue::String(bytes, StringFormat::Hexadecimal)
}

/// Decode a PDF text string (UTF-16BE with BOM, or byte-per-char).
pub fn decode_text_string(bytes: &[u8]) -> Option<String> {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).ok()
        }
        _ => Some(bytes.iter().map(|b| char::from(*b)).collect()),
    }
}

/// Format a SystemTime as a PDF date string in UTC.
///
/// PDF date format: D:YYYYMMDDHHmmSSZ
pub fn format_pdf_date(time: SystemTime) -> String {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let days = (secs / 86_400) as i64;
    let time_of_day = secs % 86_400;
    let (year, month, day) = civil_from_days(days);

    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}Z",
        year,
        month,
        day,
        time_of_day / 3_600,
        (time_of_day % 3_600) / 60,
        time_of_day % 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

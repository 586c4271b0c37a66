use crate::error::{ReconError, Result};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// A comma directly followed (modulo whitespace) by a closing brace or bracket
static TRAILING_COMMA_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r",(\s*[}\]])").unwrap()
});

/// Repair applied before a document parsed successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// A leading U+FEFF was removed
    ByteOrderMark,
    /// Trailing commas before `}` or `]` were removed
    TrailingCommas,
}

/// A decoded and parsed JSON file
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    /// Decoded text, kept for line-number lookups
    pub text: String,
    pub value: Value,
    pub encoding: &'static Encoding,
    pub repair: Option<Repair>,
}

/// Read, decode and parse a JSON file.
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<LoadedDocument> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ReconError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(path, &bytes)
}

/// Decode and parse raw bytes; `path` is only used for provenance.
pub fn parse_document(path: &Path, bytes: &[u8]) -> Result<LoadedDocument> {
    let (text, encoding) = decode_bytes(path, bytes)?;
    let (value, repair) = parse_text(path, &text)?;

    if let Some(repair) = repair {
        debug!(path = %path.display(), ?repair, "parsed after repair");
    }

    Ok(LoadedDocument {
        path: path.to_path_buf(),
        text,
        value,
        encoding,
        repair,
    })
}

/// Decodings tried when the file has no byte-order mark.
#[derive(Debug, Clone, Copy)]
enum Candidate {
    Utf8,
    /// UTF-16 without a mark, only when the byte pattern looks like it
    Utf16,
    /// Single-byte fallback; every byte sequence decodes
    Windows1252,
}

const CANDIDATES: [Candidate; 3] = [Candidate::Utf8, Candidate::Utf16, Candidate::Windows1252];

/// Decode raw bytes to text.
///
/// A byte-order mark is authoritative: a body that does not decode in the
/// announced encoding is an encoding error. Without a mark the candidates are
/// tried in order.
pub(crate) fn decode_bytes(path: &Path, bytes: &[u8]) -> Result<(String, &'static Encoding)> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return encoding
            .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
            .map(|text| (text.into_owned(), encoding))
            .ok_or_else(|| ReconError::Encoding {
                path: path.to_path_buf(),
            });
    }

    for candidate in CANDIDATES {
        let encoding = match candidate {
            Candidate::Utf8 => UTF_8,
            Candidate::Utf16 => match sniff_utf16(bytes) {
                Some(encoding) => encoding,
                None => continue,
            },
            Candidate::Windows1252 => WINDOWS_1252,
        };

        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            if !matches!(candidate, Candidate::Utf8) {
                debug!(path = %path.display(), encoding = encoding.name(), "decoded with fallback encoding");
            }
            return Ok((text.into_owned(), encoding));
        }
    }

    Err(ReconError::Encoding {
        path: path.to_path_buf(),
    })
}

/// Guess the byte order of unmarked UTF-16 from where the zero bytes fall.
///
/// JSON text is mostly ASCII, so one byte of nearly every code unit is zero.
fn sniff_utf16(bytes: &[u8]) -> Option<&'static Encoding> {
    if bytes.len() < 2 || bytes.len() % 2 != 0 {
        return None;
    }
    let sample = &bytes[..bytes.len().min(256)];
    let units = sample.len() / 2;
    let (mut even_zeros, mut odd_zeros) = (0, 0);
    for pair in sample.chunks_exact(2) {
        even_zeros += usize::from(pair[0] == 0);
        odd_zeros += usize::from(pair[1] == 0);
    }
    if odd_zeros * 2 > units && even_zeros == 0 {
        Some(UTF_16LE)
    } else if even_zeros * 2 > units && odd_zeros == 0 {
        Some(UTF_16BE)
    } else {
        None
    }
}

/// Parse JSON text, attempting bounded repairs when the first parse fails.
fn parse_text(path: &Path, text: &str) -> Result<(Value, Option<Repair>)> {
    if text.trim().is_empty() {
        return Err(ReconError::Parse {
            path: path.to_path_buf(),
            message: "document is empty".to_string(),
        });
    }

    // Fast path: SIMD parse on a scratch copy (simd-json parses in place)
    let mut scratch = text.as_bytes().to_vec();
    if let Ok(value) = simd_json::serde::from_slice::<Value>(&mut scratch) {
        return Ok((value, None));
    }

    let first_error = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok((value, None)),
        Err(e) => e,
    };
    warn!(path = %path.display(), error = %first_error, "JSON decode error, attempting repair");

    let mut content = Cow::Borrowed(text);
    if let Some(stripped) = text.strip_prefix('\u{feff}') {
        if let Ok(value) = serde_json::from_str::<Value>(stripped) {
            return Ok((value, Some(Repair::ByteOrderMark)));
        }
        content = Cow::Borrowed(stripped);
    }

    let fixed = TRAILING_COMMA_REGEX.replace_all(&content, "$1");
    if fixed != content {
        if let Ok(value) = serde_json::from_str::<Value>(&fixed) {
            return Ok((value, Some(Repair::TrailingCommas)));
        }
    }

    Err(ReconError::Parse {
        path: path.to_path_buf(),
        message: first_error.to_string(),
    })
}

//! Content-type lookup for served files.
//!
//! # Responsibilities
//! - Map a file path to a `Content-Type` string
//! - Strip precompression suffixes (`.gz`, `.br`) before lookup
//! - Report the transfer encoding implied by a precompression suffix
//!
//! # Design Decisions
//! - Backed by the `mime_guess` table; a small override table is
//!   consulted first for entries the table gets wrong for our purposes
//! - `text/html` always carries an explicit utf-8 charset

use std::path::Path;

/// Extension overrides checked before the `mime_guess` table.
const OVERRIDES: &[(&str, &str)] = &[("exe", "application/octet-stream")];

/// Transfer encoding implied by a file name suffix.
pub fn encoding_for_suffix(name: &str) -> Option<&'static str> {
    if name.ends_with(".br") {
        Some("br")
    } else if name.ends_with(".gz") {
        Some("gzip")
    } else {
        None
    }
}

/// Strip a trailing `.gz`/`.br` suffix, returning the inner file name.
pub fn strip_compression_suffix(name: &str) -> &str {
    name.strip_suffix(".gz")
        .or_else(|| name.strip_suffix(".br"))
        .unwrap_or(name)
}

/// Resolve the `Content-Type` for a file name.
///
/// Precompression suffixes are stripped first, so `app.js.gz` resolves the
/// same as `app.js`. Unknown extensions yield an empty content type, which
/// the caller omits from the response.
pub fn content_type_for(name: &str) -> Option<String> {
    let inner = strip_compression_suffix(name);
    let ext = Path::new(inner).extension()?.to_str()?.to_ascii_lowercase();

    let raw = OVERRIDES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, ct)| *ct)
        .or_else(|| mime_guess::from_ext(&ext).first_raw())?;

    if raw == "text/html" {
        Some(format!("{raw};charset=utf-8"))
    } else {
        Some(raw.to_string())
    }
}

//! Static asset serving subsystem.
//!
//! # Data Flow
//! ```text
//! request path
//!     → resolver.rs (percent-decode, candidate expansion, file lookup)
//!     → server.rs (conditional requests, ranges, response assembly)
//!     → Response, or fall-through to the next chain entry
//!
//! At startup (production):
//!     tree walk → FileMap (path → FileRecord, immutable)
//! Per request (development):
//!     live stat probes against the serving root
//! ```
//!
//! # Design Decisions
//! - Precompressed siblings (`.gz`/`.br`) are first-class candidates so
//!   serving them costs nothing extra at request time
//! - Base headers are computed once per record and cloned per request;
//!   the cached copies are never handed out mutably

pub mod mime;
pub mod resolver;
pub mod server;

pub use server::{StaticOptions, StaticServer};

use std::time::SystemTime;

use axum::http::{header, HeaderMap, HeaderValue};

/// Build the base response header set for a file.
///
/// `name` is the serving-relative file name (used for content-type and
/// encoding detection), `size`/`mtime` come from the stat snapshot.
pub fn headers_for(name: &str, size: u64, mtime: SystemTime, etag: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    if let Some(ctype) = mime::content_type_for(name) {
        if let Ok(value) = HeaderValue::from_str(&ctype) {
            headers.insert(header::CONTENT_TYPE, value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(mtime)) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    if let Some(enc) = mime::encoding_for_suffix(name) {
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(enc));
    }
    if etag {
        let tag = format!("W/\"{}-{}\"", size, resolver::mtime_millis(mtime));
        if let Ok(value) = HeaderValue::from_str(&tag) {
            headers.insert(header::ETAG, value);
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use std::time::UNIX_EPOCH;

    #[test]
    fn test_headers_for_basic() {
        let mtime = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        let headers = headers_for("page.html", 42, mtime, true);
        assert_eq!(headers[header::CONTENT_LENGTH], "42");
        assert_eq!(headers[header::CONTENT_TYPE], "text/html;charset=utf-8");
        assert_eq!(headers[header::ETAG], "W/\"42-1700000000123\"");
        assert!(headers.get(header::CONTENT_ENCODING).is_none());
    }

    #[test]
    fn test_headers_for_precompressed() {
        let mtime = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let headers = headers_for("page.html.gz", 10, mtime, false);
        assert_eq!(headers[header::CONTENT_ENCODING], "gzip");
        assert_eq!(headers[header::CONTENT_TYPE], "text/html;charset=utf-8");
        assert!(headers.get(header::ETAG).is_none());
    }
}

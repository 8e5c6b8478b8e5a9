//! Static file server.
//!
//! # Responsibilities
//! - Serve files from a root directory with caching headers
//! - Prefer precompressed variants when the client accepts them
//! - Honor conditional (`If-None-Match`) and byte-range requests
//! - Fall through (return `None`) when nothing matches
//!
//! # Design Decisions
//! - Response headers are cloned fresh per request so the cached base set
//!   is never mutated
//! - A header-customization hook runs last and may replace the header set
//! - Range math follows the resolver's stat snapshot, not a re-stat

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode};

use super::resolver::{self, FileMap, FileRecord};

/// Header-customization hook: receives the prepared headers, the decoded
/// request path and the file size, and returns the headers to use.
pub type HeaderHook = Arc<dyn Fn(HeaderMap, &str, u64) -> HeaderMap + Send + Sync>;

/// Options for a [`StaticServer`].
#[derive(Clone)]
pub struct StaticOptions {
    /// Emit weak ETags and honor `If-None-Match`.
    pub etag: bool,
    /// Probe for `.gz` siblings when the client accepts gzip.
    pub gzip: bool,
    /// Probe for `.br` siblings when the client accepts brotli.
    pub brotli: bool,
    /// `max-age` seconds for `Cache-Control` (production mode).
    pub max_age: Option<u64>,
    /// Append `immutable` to `Cache-Control`.
    pub immutable: bool,
    /// Serve dotfiles (default: skipped, `.well-known` excepted).
    pub dotfiles: bool,
    /// Extensions appended when the bare path misses.
    pub extensions: Vec<String>,
    /// Development mode: probe the live filesystem per request.
    pub dev: bool,
    /// Optional per-response header hook.
    pub set_headers: Option<HeaderHook>,
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self {
            etag: false,
            gzip: false,
            brotli: false,
            max_age: None,
            immutable: false,
            dotfiles: false,
            extensions: vec!["html".to_string(), "htm".to_string()],
            dev: false,
            set_headers: None,
        }
    }
}

impl StaticOptions {
    fn cache_control(&self) -> Option<String> {
        let max_age = self.max_age?;
        let mut cc = format!("public,max-age={max_age}");
        if self.immutable {
            cc.push_str(",immutable");
        } else if max_age == 0 {
            cc.push_str(",must-revalidate");
        }
        Some(cc)
    }
}

/// Serves prebuilt files from one root directory.
pub struct StaticServer {
    root: PathBuf,
    options: StaticOptions,
    files: FileMap,
}

impl StaticServer {
    /// Create a server for `root`. Returns `None` when the root does not
    /// exist, so chain construction can filter the entry out.
    pub fn new(root: impl Into<PathBuf>, options: StaticOptions) -> Option<Self> {
        let root: PathBuf = root.into();
        if !root.is_dir() {
            return None;
        }
        let files = if options.dev {
            FileMap::default()
        } else {
            let cc = options.cache_control();
            FileMap::build(&root, options.dotfiles, options.etag, cc.as_deref())
        };
        tracing::debug!(root = %root.display(), files = files.len(), dev = options.dev, "static root ready");
        Some(Self { root, options, files })
    }

    /// Try to produce a response for the request. `None` means no file
    /// matched and the caller should advance to the next handler.
    pub async fn respond(&self, parts: &Parts) -> Option<Response<Body>> {
        let pathname = resolver::decode_path(parts.uri.path());
        let accept_encoding = parts
            .headers
            .get(header::ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let extns = resolver::extension_list(
            accept_encoding,
            &self.options.extensions,
            self.options.gzip,
            self.options.brotli,
        );

        let record = if self.options.dev {
            resolver::lookup_live(&self.root, &pathname, &extns, self.options.etag)?
        } else {
            self.files.lookup(&pathname, &extns)?.clone()
        };

        if self.options.etag {
            let tag = record.headers.get(header::ETAG);
            if tag.is_some() && parts.headers.get(header::IF_NONE_MATCH) == tag {
                return Some(empty_response(StatusCode::NOT_MODIFIED, HeaderMap::new()));
            }
        }

        // Clone so the cached base set is never modified.
        let mut headers = record.headers.clone();
        if self.options.gzip || self.options.brotli {
            headers.append(header::VARY, HeaderValue::from_static("Accept-Encoding"));
        }
        if let Some(hook) = &self.options.set_headers {
            headers = hook(headers, &pathname, record.size);
        }

        Some(self.send(parts, &record, headers).await)
    }

    async fn send(
        &self,
        parts: &Parts,
        record: &FileRecord,
        mut headers: HeaderMap,
    ) -> Response<Body> {
        let range = parts
            .headers
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_range);

        let (start, end) = match range {
            Some((start, end)) => {
                let end = end.unwrap_or(record.size.saturating_sub(1));
                if start >= record.size || end >= record.size {
                    let content_range = format!("bytes */{}", record.size);
                    headers.remove(header::CONTENT_LENGTH);
                    headers.insert(
                        header::CONTENT_RANGE,
                        HeaderValue::from_str(&content_range).expect("range header"),
                    );
                    return empty_response(StatusCode::RANGE_NOT_SATISFIABLE, headers);
                }
                let content_range = format!("bytes {start}-{end}/{}", record.size);
                headers.insert(
                    header::CONTENT_RANGE,
                    HeaderValue::from_str(&content_range).expect("range header"),
                );
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(end - start + 1));
                headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
                (Some(start), Some(end))
            }
            None => (None, None),
        };

        let bytes = match tokio::fs::read(&record.abs).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(path = %record.abs.display(), error = %err, "failed to read static file");
                return empty_response(StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new());
            }
        };

        let (status, body) = match (start, end) {
            (Some(start), Some(end)) => {
                // The file may have changed since the stat snapshot (dev
                // mode); clamp rather than panic on a short read.
                let upper = bytes.len().min(end as usize + 1);
                let lower = (start as usize).min(upper);
                let slice = bytes[lower..upper].to_vec();
                (StatusCode::PARTIAL_CONTENT, Body::from(slice))
            }
            _ => (StatusCode::OK, Body::from(bytes)),
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// Parse a `Range: bytes=start-end` header. Missing or unparsable bounds
/// fall back to the start/end of the file; non-byte units are ignored.
fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start = start.trim().parse().unwrap_or(0);
    let end = end.trim().parse().ok();
    Some((start, end))
}

fn empty_response(status: StatusCode, headers: HeaderMap) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

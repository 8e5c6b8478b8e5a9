//! Request-path to file resolution.
//!
//! # Responsibilities
//! - Expand a request path into an ordered list of candidate file paths
//!   (bare, extension-appended, `index` variants, precompressed variants)
//! - Resolve candidates against a precomputed file map (production) or the
//!   live filesystem (development)
//! - Bound development-mode lookups to the serving root (path traversal)
//!
//! # Design Decisions
//! - Candidate order is deterministic and fixed by configuration: brotli
//!   variants first, then gzip, then the exact path, then plain extensions
//! - Production map is built once by a full tree walk and never mutated;
//!   a missing root yields an empty map so every request falls through
//! - Development probes stat the filesystem synchronously per request,
//!   trading throughput for freshness

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::HeaderMap;
use walkdir::WalkDir;

use super::headers_for;

/// A resolved file together with its precomputed response headers.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute path on disk.
    pub abs: PathBuf,
    /// File size in bytes at stat time.
    pub size: u64,
    /// Base header set (content-type, length, last-modified, etag, ...).
    pub headers: HeaderMap,
}

/// Milliseconds since the epoch for a filesystem timestamp.
pub fn mtime_millis(mtime: SystemTime) -> u128 {
    mtime
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Expand a request path into candidate file paths, in probe order.
///
/// For every extension entry (empty string means "as-is"), the bare path
/// comes before the `<path>/index` form. A trailing slash is stripped
/// first, so `/docs/` probes `/docs/index.html` like `/docs` does.
pub fn candidate_paths(uri_path: &str, extns: &[String]) -> Vec<String> {
    let trimmed = if uri_path.len() > 1 && uri_path.ends_with('/') {
        &uri_path[..uri_path.len() - 1]
    } else if uri_path == "/" {
        ""
    } else {
        uri_path
    };

    let index_base = format!("{trimmed}/index");
    let mut out = Vec::with_capacity(extns.len() * 2);
    for ext in extns {
        let suffix = if ext.is_empty() {
            String::new()
        } else {
            format!(".{ext}")
        };
        if !trimmed.is_empty() {
            out.push(format!("{trimmed}{suffix}"));
        }
        out.push(format!("{index_base}{suffix}"));
    }
    out
}

/// Build the per-request extension list from configuration and the
/// client's `Accept-Encoding` header.
///
/// Brotli variants end up ahead of gzip variants, both ahead of the exact
/// path; configured plain extensions come last.
pub fn extension_list(
    accept_encoding: &str,
    extensions: &[String],
    gzip: bool,
    brotli: bool,
) -> Vec<String> {
    let mut extns = vec![String::new()];

    if gzip && accept_encoding.contains("gzip") {
        let mut gz: Vec<String> = extensions.iter().map(|x| format!("{x}.gz")).collect();
        gz.push("gz".to_string());
        gz.append(&mut extns);
        extns = gz;
    }
    let ae = accept_encoding.to_ascii_lowercase();
    if brotli && (ae.contains("br") || ae.contains("brotli")) {
        let mut br: Vec<String> = extensions.iter().map(|x| format!("{x}.br")).collect();
        br.push("br".to_string());
        br.append(&mut extns);
        extns = br;
    }

    extns.extend(extensions.iter().cloned());
    extns
}

/// Percent-decode a request path, tolerating malformed sequences.
pub fn decode_path(path: &str) -> String {
    if !path.contains('%') {
        return path.to_string();
    }
    match percent_encoding::percent_decode_str(path).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => path.to_string(),
    }
}

/// Lexically normalize a path (no filesystem access): resolves `.` and
/// `..` components so the containment check cannot be sidestepped.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Precomputed file map for production serving.
///
/// Keys are request paths (`/sub/file.ext`, forward slashes). Built once;
/// read-only afterward.
#[derive(Debug, Default)]
pub struct FileMap {
    files: HashMap<String, FileRecord>,
}

impl FileMap {
    /// Walk `root` and precompute a record per regular file.
    ///
    /// Dotfiles are skipped unless `dotfiles` is set; `.well-known` is
    /// always kept. A missing root produces an empty map.
    pub fn build(
        root: &Path,
        dotfiles: bool,
        etag: bool,
        cache_control: Option<&str>,
    ) -> Self {
        let mut files = HashMap::new();
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let rel_name = rel.to_string_lossy().replace('\\', "/");
            let hidden = rel_name.split('/').any(|part| part.starts_with('.'));
            if hidden && !dotfiles && !rel_name.starts_with(".well-known/") {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            let mtime = meta.modified().unwrap_or(UNIX_EPOCH);
            let mut headers = headers_for(&rel_name, meta.len(), mtime, etag);
            if let Some(cc) = cache_control {
                if let Ok(value) = cc.parse() {
                    headers.insert(axum::http::header::CACHE_CONTROL, value);
                }
            }
            files.insert(
                format!("/{rel_name}"),
                FileRecord {
                    abs: entry.path().to_path_buf(),
                    size: meta.len(),
                    headers,
                },
            );
        }
        Self { files }
    }

    /// Look up the first matching candidate, if any.
    pub fn lookup(&self, uri_path: &str, extns: &[String]) -> Option<&FileRecord> {
        candidate_paths(uri_path, extns)
            .iter()
            .find_map(|candidate| self.files.get(candidate))
    }

    /// Number of files in the map.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when the walk found nothing (or the root was missing).
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Probe the live filesystem for the first matching candidate.
///
/// Directories are skipped. The normalized path must stay underneath
/// `root`; anything escaping the root is ignored. Stats are synchronous by
/// design (development mode favors freshness).
pub fn lookup_live(
    root: &Path,
    uri_path: &str,
    extns: &[String],
    etag: bool,
) -> Option<FileRecord> {
    for candidate in candidate_paths(uri_path, extns) {
        let abs = normalize(&root.join(candidate.trim_start_matches('/')));
        if !abs.starts_with(root) {
            continue;
        }
        let meta = match std::fs::metadata(&abs) {
            Ok(meta) => meta,
            Err(_) => continue,
        };
        if meta.is_dir() {
            continue;
        }
        let name = candidate.trim_start_matches('/').to_string();
        let mtime = meta.modified().unwrap_or(UNIX_EPOCH);
        let mut headers = headers_for(&name, meta.len(), mtime, etag);
        let cc = if etag { "no-cache" } else { "no-store" };
        headers.insert(
            axum::http::header::CACHE_CONTROL,
            cc.parse().expect("static header value"),
        );
        return Some(FileRecord {
            abs,
            size: meta.len(),
            headers,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_candidate_order_exact_before_index() {
        let candidates = candidate_paths("/about", &strs(&["", "html"]));
        assert_eq!(
            candidates,
            vec!["/about", "/about/index", "/about.html", "/about/index.html"]
        );
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let candidates = candidate_paths("/docs/", &strs(&["html"]));
        assert_eq!(candidates, vec!["/docs.html", "/docs/index.html"]);
    }

    #[test]
    fn test_root_path_probes_index_only() {
        let candidates = candidate_paths("/", &strs(&["", "html"]));
        assert_eq!(candidates, vec!["/index", "/index.html"]);
    }

    #[test]
    fn test_extension_list_precedence() {
        let exts = strs(&["html", "htm"]);
        let extns = extension_list("br, gzip", &exts, true, true);
        assert_eq!(
            extns,
            strs(&["html.br", "htm.br", "br", "html.gz", "htm.gz", "gz", "", "html", "htm"])
        );
    }

    #[test]
    fn test_extension_list_no_encoding() {
        let exts = strs(&["html"]);
        let extns = extension_list("", &exts, true, true);
        assert_eq!(extns, strs(&["", "html"]));
    }

    #[test]
    fn test_extension_list_gzip_only() {
        let exts = strs(&["html"]);
        let extns = extension_list("gzip", &exts, true, true);
        assert_eq!(extns, strs(&["html.gz", "gz", "", "html"]));
    }

    #[test]
    fn test_decode_path_tolerates_malformed() {
        assert_eq!(decode_path("/a%20b"), "/a b");
        assert_eq!(decode_path("/plain"), "/plain");
        // Truncated escape decodes to invalid utf-8; path is left as-is.
        assert_eq!(decode_path("/bad%ff%fe"), "/bad%ff%fe");
    }

    #[test]
    fn test_normalize_blocks_traversal() {
        let root = Path::new("/srv/static");
        let abs = normalize(&root.join("../../etc/passwd"));
        assert!(!abs.starts_with(root));
    }
}

//! Build-time precompression.
//!
//! # Responsibilities
//! - Walk a static tree and write `.gz`/`.br` siblings for files whose
//!   extension matches the configured set
//! - Leave sources untouched; never delete anything
//!
//! # Design Decisions
//! - Fan-out is bounded (the original had no cap, which was the flagged
//!   scalability gap); codec work runs on blocking threads
//! - Per-file failures are logged with context and abandon only that one
//!   artifact; siblings continue

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::StreamExt;
use walkdir::WalkDir;

use crate::config::CompressOptions;

/// Maximum concurrent compression jobs.
const CONCURRENCY: usize = 8;

/// Output format of one compression job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Gzip,
    Brotli,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Format::Gzip => "gz",
            Format::Brotli => "br",
        }
    }
}

/// Outcome of a precompression pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CompressReport {
    /// Sibling files written.
    pub written: usize,
    /// Jobs that failed (logged individually).
    pub failed: usize,
}

/// Compress matching files under `dir` per the options.
///
/// A missing directory is a no-op.
pub async fn compress_dir(dir: &Path, options: &CompressOptions) -> CompressReport {
    if !dir.is_dir() {
        return CompressReport::default();
    }
    if !options.gzip && !options.brotli {
        return CompressReport::default();
    }

    let mut jobs: Vec<(PathBuf, Format)> = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| options.files.iter().any(|f| f.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if !matches {
            continue;
        }
        if options.gzip {
            jobs.push((entry.path().to_path_buf(), Format::Gzip));
        }
        if options.brotli {
            jobs.push((entry.path().to_path_buf(), Format::Brotli));
        }
    }

    let written = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    futures_util::stream::iter(jobs)
        .for_each_concurrent(CONCURRENCY, |(path, format)| {
            let written = &written;
            let failed = &failed;
            async move {
                let job_path = path.clone();
                let result =
                    tokio::task::spawn_blocking(move || compress_file(&job_path, format)).await;
                match result {
                    Ok(Ok(())) => {
                        written.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Err(err)) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(path = %path.display(), format = format.extension(), error = %err, "compression failed");
                    }
                    Err(err) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(path = %path.display(), format = format.extension(), error = %err, "compression task panicked");
                    }
                }
            }
        })
        .await;

    let report = CompressReport {
        written: written.into_inner(),
        failed: failed.into_inner(),
    };
    tracing::debug!(dir = %dir.display(), written = report.written, failed = report.failed, "precompression done");
    report
}

/// Write `<file>.<ext>` next to `file`.
fn compress_file(file: &Path, format: Format) -> std::io::Result<()> {
    let mut input = std::fs::File::open(file)?;
    let out_path = sibling_path(file, format.extension());
    let output = std::fs::File::create(&out_path)?;

    match format {
        Format::Gzip => {
            let mut encoder = GzEncoder::new(output, Compression::best());
            std::io::copy(&mut input, &mut encoder)?;
            encoder.finish()?;
        }
        Format::Brotli => {
            let size_hint = input.metadata().map(|m| m.len()).unwrap_or(0);
            let mut params = brotli::enc::BrotliEncoderParams::default();
            params.quality = 11;
            params.mode = brotli::enc::backward_references::BrotliEncoderMode::BROTLI_MODE_TEXT;
            params.size_hint = size_hint as usize;
            let mut encoder = brotli::CompressorWriter::with_params(output, 4096, &params);
            std::io::copy(&mut input, &mut encoder)?;
            encoder.flush()?;
        }
    }
    Ok(())
}

fn sibling_path(file: &Path, ext: &str) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_writes_siblings_for_matching_extensions() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "index.html", b"<html>hello</html>");
        write_file(dir.path(), "nested/app.js", b"console.log(1)");
        write_file(dir.path(), "photo.png", b"not compressed");

        let report = compress_dir(dir.path(), &CompressOptions::default()).await;
        assert_eq!(report, CompressReport { written: 4, failed: 0 });

        assert!(dir.path().join("index.html.gz").is_file());
        assert!(dir.path().join("index.html.br").is_file());
        assert!(dir.path().join("nested/app.js.gz").is_file());
        assert!(!dir.path().join("photo.png.gz").exists());
        // Sources untouched.
        assert_eq!(
            std::fs::read(dir.path().join("index.html")).unwrap(),
            b"<html>hello</html>"
        );
    }

    #[tokio::test]
    async fn test_gzip_only() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "data.json", b"{}");

        let options = CompressOptions {
            brotli: false,
            ..CompressOptions::default()
        };
        let report = compress_dir(dir.path(), &options).await;
        assert_eq!(report.written, 1);
        assert!(dir.path().join("data.json.gz").is_file());
        assert!(!dir.path().join("data.json.br").exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_noop() {
        let report =
            compress_dir(Path::new("/definitely/missing"), &CompressOptions::default()).await;
        assert_eq!(report, CompressReport::default());
    }

    #[test]
    fn test_gzip_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "page.html", b"hello hello hello");
        compress_file(&path, Format::Gzip).unwrap();

        let compressed = std::fs::File::open(dir.path().join("page.html.gz")).unwrap();
        let mut decoder = flate2::read::GzDecoder::new(compressed);
        let mut out = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut out).unwrap();
        assert_eq!(out, b"hello hello hello");
    }
}

//! Site manifest generation.
//!
//! # Responsibilities
//! - Record what a build produced: the app directory name, the client
//!   asset list, and the set of prerendered paths
//! - Round-trip through `manifest.json` in the build output
//!
//! # Design Decisions
//! - Prerendered paths are derived from the prerendered tree: `.html`
//!   files map back to the request paths that produced them
//! - Loading is forgiving: a missing or corrupt manifest logs and yields
//!   defaults so a hand-assembled build directory still serves

use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// Default name of the hashed-assets directory inside the client tree.
pub const DEFAULT_APP_DIR: &str = "_app";

/// Serialized description of a packaged site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteManifest {
    /// Name of the hashed-assets directory (immutable caching applies
    /// under `/<app_dir>/immutable/`).
    pub app_dir: String,
    /// Client files, relative to the client root.
    pub assets: Vec<String>,
    /// Request paths with prerendered pages.
    pub prerendered: Vec<String>,
}

impl Default for SiteManifest {
    fn default() -> Self {
        Self {
            app_dir: DEFAULT_APP_DIR.to_string(),
            assets: Vec::new(),
            prerendered: Vec::new(),
        }
    }
}

impl SiteManifest {
    /// Derive a manifest from the copied trees.
    pub fn generate(client_dir: &Path, prerendered_dir: &Path, app_dir: &str) -> Self {
        let mut assets = walk_relative(client_dir);
        assets.sort();

        let mut prerendered: Vec<String> = walk_relative(prerendered_dir)
            .into_iter()
            .map(|rel| prerendered_path(&rel))
            .collect();
        prerendered.sort();
        prerendered.dedup();

        Self {
            app_dir: app_dir.to_string(),
            assets,
            prerendered,
        }
    }

    /// Write `manifest.json` (pretty-printed).
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Load a manifest, defaulting on any failure.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(manifest) => manifest,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "corrupt manifest, using defaults");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "no manifest, using defaults");
                Self::default()
            }
        }
    }
}

fn walk_relative(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        })
        .collect()
}

/// Map a prerendered file back to its request path:
/// `index.html` → `/`, `about.html` → `/about`,
/// `blog/post/index.html` → `/blog/post`.
fn prerendered_path(rel: &str) -> String {
    let without_ext = rel.strip_suffix(".html").unwrap_or(rel);
    let without_index = without_ext
        .strip_suffix("/index")
        .or_else(|| (without_ext == "index").then_some(""))
        .unwrap_or(without_ext);
    format!("/{without_index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prerendered_path_mapping() {
        assert_eq!(prerendered_path("index.html"), "/");
        assert_eq!(prerendered_path("about.html"), "/about");
        assert_eq!(prerendered_path("blog/post.html"), "/blog/post");
        assert_eq!(prerendered_path("blog/post/index.html"), "/blog/post");
        assert_eq!(prerendered_path("feed.xml"), "/feed.xml");
    }

    #[test]
    fn test_generate_and_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let client = dir.path().join("client");
        let prerendered = dir.path().join("prerendered");
        std::fs::create_dir_all(client.join("_app/immutable")).unwrap();
        std::fs::write(client.join("favicon.png"), b"png").unwrap();
        std::fs::write(client.join("_app/immutable/chunk.js"), b"js").unwrap();
        std::fs::create_dir_all(prerendered.join("blog")).unwrap();
        std::fs::write(prerendered.join("index.html"), b"home").unwrap();
        std::fs::write(prerendered.join("blog/post.html"), b"post").unwrap();

        let manifest = SiteManifest::generate(&client, &prerendered, DEFAULT_APP_DIR);
        assert_eq!(
            manifest.assets,
            vec!["_app/immutable/chunk.js".to_string(), "favicon.png".to_string()]
        );
        assert_eq!(
            manifest.prerendered,
            vec!["/".to_string(), "/blog/post".to_string()]
        );

        let path = dir.path().join("manifest.json");
        manifest.write(&path).unwrap();
        assert_eq!(SiteManifest::load(&path), manifest);
    }

    #[test]
    fn test_load_missing_defaults() {
        let manifest = SiteManifest::load(Path::new("/nope/manifest.json"));
        assert_eq!(manifest.app_dir, DEFAULT_APP_DIR);
        assert!(manifest.assets.is_empty());
    }
}

//! Package descriptor generation.
//!
//! # Responsibilities
//! - Produce the build output's `package.json`: the user's manifest
//!   deep-merged over a minimal default
//! - Guarantee the framework server's runtime dependencies survive the
//!   merge
//!
//! # Design Decisions
//! - A missing or unparsable user manifest is a resolution miss, not an
//!   error: it is logged and the default is used

use std::path::Path;

use serde_json::{json, Map, Value};

/// Minimal package descriptor for a packaged build.
pub fn default_package() -> Value {
    json!({
        "name": "standalone-app",
        "version": "0.0.0",
        "type": "module",
        "private": true,
        "main": "index.js",
        "scripts": {
            "start": "standalone-adapter ."
        },
        "dependencies": {
            "cookie": "latest",
            "devalue": "latest",
            "set-cookie-parser": "latest"
        }
    })
}

/// Deep-merge `source` into `target`: objects merge recursively, source
/// values win everywhere else.
pub fn merge_json(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_json(existing, value)
                    }
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

/// Build the output package descriptor from the user's manifest.
pub fn build_package_descriptor(user_package: Option<Value>) -> Value {
    let mut descriptor = default_package();
    let required = descriptor
        .get("dependencies")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    if let Some(user) = user_package {
        merge_json(&mut descriptor, &user);
    }

    // The framework server needs these at runtime regardless of what the
    // user's manifest says; missing entries are restored.
    let deps = descriptor
        .as_object_mut()
        .expect("descriptor is an object")
        .entry("dependencies")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(deps) = deps.as_object_mut() {
        for (name, version) in required {
            deps.entry(name).or_insert(version);
        }
    }

    descriptor
}

/// Read the user's `package.json` and write the merged descriptor.
pub fn write_package_descriptor(out_dir: &Path, project_root: &Path) -> std::io::Result<()> {
    let user = match std::fs::read_to_string(project_root.join("package.json")) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(error = %err, "parse package.json error, using defaults");
                None
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "no project package.json, using defaults");
            None
        }
    };

    let descriptor = build_package_descriptor(user);
    let json = serde_json::to_string_pretty(&descriptor)?;
    std::fs::write(out_dir.join("package.json"), json)
}

//! Prefix-aware environment variable access.
//!
//! # Responsibilities
//! - Read runtime settings through an optional name prefix
//! - Reject unexpected prefixed variables at startup (a prefix that
//!   collides with unrelated variables is a misconfiguration)
//!
//! # Design Decisions
//! - The process environment is snapshotted once; tests inject their own
//!   variable sets instead of mutating the real environment

use std::collections::HashMap;

/// Variables the runtime server recognizes (unprefixed names).
pub const EXPECTED_VARS: &[&str] = &[
    "HOST",
    "PORT",
    "ORIGIN",
    "XFF_DEPTH",
    "ADDRESS_HEADER",
    "PROTOCOL_HEADER",
    "HOST_HEADER",
    "SERVERDEV",
    "BODY_SIZE_LIMIT",
    "HTTPS_PORT",
];

/// Error raised when a prefixed variable is not in the recognized set.
#[derive(Debug, thiserror::Error)]
#[error(
    "change envPrefix ({prefix:?}) to avoid conflicts with existing environment variables — unexpectedly saw {name}"
)]
pub struct UnexpectedEnvVar {
    pub prefix: String,
    pub name: String,
}

/// Snapshot of the environment, read through a configurable prefix.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    prefix: String,
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Snapshot the process environment.
    pub fn from_env(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            vars: std::env::vars().collect(),
        }
    }

    /// Build from an explicit variable set (tests, embedding).
    pub fn from_vars<I>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            prefix: prefix.into(),
            vars: vars.into_iter().collect(),
        }
    }

    /// Look up `<prefix><name>`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(&format!("{}{}", self.prefix, name))
            .map(String::as_str)
    }

    /// Look up `<prefix><name>`, falling back to `fallback`.
    pub fn get_or<'a>(&'a self, name: &str, fallback: &'a str) -> &'a str {
        self.get(name).unwrap_or(fallback)
    }

    /// Fail when any prefixed variable falls outside the recognized set.
    ///
    /// Only meaningful with a non-empty prefix: without one, every
    /// variable in the environment would be "prefixed".
    pub fn check_unexpected(&self) -> Result<(), UnexpectedEnvVar> {
        if self.prefix.is_empty() {
            return Ok(());
        }
        for name in self.vars.keys() {
            if let Some(unprefixed) = name.strip_prefix(&self.prefix) {
                if !EXPECTED_VARS.contains(&unprefixed) {
                    return Err(UnexpectedEnvVar {
                        prefix: self.prefix.clone(),
                        name: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_prefixed_lookup() {
        let env = EnvSource::from_vars("MYAPP_", vars(&[("MYAPP_PORT", "8080"), ("PORT", "9")]));
        assert_eq!(env.get("PORT"), Some("8080"));
        assert_eq!(env.get_or("HOST", "0.0.0.0"), "0.0.0.0");
    }

    #[test]
    fn test_empty_prefix_reads_bare_names() {
        let env = EnvSource::from_vars("", vars(&[("PORT", "3000")]));
        assert_eq!(env.get("PORT"), Some("3000"));
        assert!(env.check_unexpected().is_ok());
    }

    #[test]
    fn test_unexpected_prefixed_var_rejected() {
        let env = EnvSource::from_vars("MYAPP_", vars(&[("MYAPP_DATABASE_URL", "x")]));
        let err = env.check_unexpected().unwrap_err();
        assert_eq!(err.name, "MYAPP_DATABASE_URL");
    }

    #[test]
    fn test_recognized_prefixed_vars_pass() {
        let env = EnvSource::from_vars(
            "MYAPP_",
            vars(&[("MYAPP_PORT", "80"), ("MYAPP_XFF_DEPTH", "2"), ("OTHER", "1")]),
        );
        assert!(env.check_unexpected().is_ok());
    }
}

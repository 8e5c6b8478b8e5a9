//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (xff depth >= 1, ports nonzero)
//! - Check TLS key material parses as PEM
//! - Reject malformed WebSocket specifiers early
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the config (plus reads of the
//!   referenced TLS files)
//! - Runs before a config is accepted into the system

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::config::schema::{AdapterConfig, TlsConfig, WsOption};

/// A single semantic validation failure.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("xff_depth must be a positive integer, got {0}")]
    XffDepth(u32),

    #[error("{field} must be nonzero")]
    ZeroPort { field: &'static str },

    #[error("out directory name must not be empty")]
    EmptyOutDir,

    #[error("ws specifier must not be empty")]
    EmptyWsSpecifier,

    #[error("TLS {kind} {path}: {reason}")]
    Tls {
        kind: &'static str,
        path: String,
        reason: String,
    },
}

/// Validate the build configuration, collecting every failure.
pub fn validate_config(config: &AdapterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.xff_depth < 1 {
        errors.push(ValidationError::XffDepth(config.xff_depth));
    }
    if config.port == 0 {
        errors.push(ValidationError::ZeroPort { field: "port" });
    }
    if config.https_port == 0 {
        errors.push(ValidationError::ZeroPort { field: "https_port" });
    }
    if config.out.trim().is_empty() {
        errors.push(ValidationError::EmptyOutDir);
    }
    if let Some(WsOption::Specifier(spec)) = &config.ws {
        if spec.trim().is_empty() {
            errors.push(ValidationError::EmptyWsSpecifier);
        }
    }
    if let Some(tls) = config.tls() {
        validate_tls(tls, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_tls(tls: &TlsConfig, errors: &mut Vec<ValidationError>) {
    match pem_cert_count(&tls.cert) {
        Ok(0) => errors.push(ValidationError::Tls {
            kind: "certificate",
            path: tls.cert.display().to_string(),
            reason: "no certificates found in PEM file".to_string(),
        }),
        Ok(_) => {}
        Err(err) => errors.push(ValidationError::Tls {
            kind: "certificate",
            path: tls.cert.display().to_string(),
            reason: err,
        }),
    }

    match pem_private_key(&tls.key) {
        Ok(true) => {}
        Ok(false) => errors.push(ValidationError::Tls {
            kind: "private key",
            path: tls.key.display().to_string(),
            reason: "no private key found in PEM file".to_string(),
        }),
        Err(err) => errors.push(ValidationError::Tls {
            kind: "private key",
            path: tls.key.display().to_string(),
            reason: err,
        }),
    }
}

fn pem_cert_count(path: &Path) -> Result<usize, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let mut reader = BufReader::new(file);
    let mut count = 0;
    for cert in rustls_pemfile::certs(&mut reader) {
        cert.map_err(|e| e.to_string())?;
        count += 1;
    }
    Ok(count)
}

fn pem_private_key(path: &Path) -> Result<bool, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let mut reader = BufReader::new(file);
    let key = rustls_pemfile::private_key(&mut reader).map_err(|e| e.to_string())?;
    Ok(key.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AdapterConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let config = AdapterConfig {
            xff_depth: 0,
            port: 0,
            out: "  ".to_string(),
            ..AdapterConfig::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_empty_ws_specifier_rejected() {
        let config = AdapterConfig {
            ws: Some(WsOption::Specifier(String::new())),
            ..AdapterConfig::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::EmptyWsSpecifier));
    }

    #[test]
    fn test_missing_tls_files_rejected() {
        let config = AdapterConfig {
            tls: Some(TlsConfig {
                cert: "/nope/cert.pem".into(),
                key: "/nope/key.pem".into(),
                ca: None,
            }),
            ..AdapterConfig::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}

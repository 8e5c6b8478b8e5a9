//! TLS configuration and certificate loading.

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

/// Load a rustls server config from the configured PEM files.
///
/// The `ca` entry is carried in the config for deployments that terminate
/// client certificates elsewhere; the listener itself only needs the
/// certificate chain and key.
pub async fn load_tls(tls: &TlsConfig) -> Result<RustlsConfig, std::io::Error> {
    if !tls.cert.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("certificate file not found: {}", tls.cert.display()),
        ));
    }
    if !tls.key.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("private key file not found: {}", tls.key.display()),
        ));
    }
    RustlsConfig::from_pem_file(&tls.cert, &tls.key).await
}

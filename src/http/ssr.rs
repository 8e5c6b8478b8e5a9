//! SSR fallthrough: forwarding to the framework server.
//!
//! # Responsibilities
//! - Forward requests the static handlers declined to the framework's
//!   SSR server (the adapter's only view of the framework contract)
//! - Rewrite requests to the configured origin when it differs from the
//!   origin derived from proxy headers
//! - Derive the client address from the configured header chain and pass
//!   it upstream
//!
//! # Design Decisions
//! - Invalid trusted-proxy depth is a configuration error, not a request
//!   error: it surfaces as a typed error for the process boundary to log
//! - Upstream connection failure maps to 502; nothing is retried

use axum::body::Body;
use axum::http::uri::{Authority, Scheme, Uri};
use axum::http::{header, HeaderMap, HeaderValue, Request, Response};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

/// Header used to hand the derived client address to the upstream.
pub const X_CLIENT_ADDRESS: &str = "x-client-address";

/// Configuration for the SSR upstream.
#[derive(Debug, Clone)]
pub struct SsrConfig {
    /// Upstream address (`host:port`) of the framework server.
    pub address: String,
    /// Trusted origin; requests with a different derived origin are
    /// rewritten to target it.
    pub origin: Option<String>,
    /// Header carrying the client address (lowercased), when configured.
    pub address_header: Option<String>,
    /// Header carrying the original protocol (lowercased).
    pub protocol_header: Option<String>,
    /// Header carrying the original host.
    pub host_header: String,
    /// Hops from the end of `x-forwarded-for` to the client address.
    pub xff_depth: u32,
}

impl Default for SsrConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            origin: None,
            address_header: None,
            protocol_header: None,
            host_header: "host".to_string(),
            xff_depth: 1,
        }
    }
}

/// Errors from the SSR forwarding path.
#[derive(Debug, thiserror::Error)]
pub enum SsrError {
    #[error("address header {0} was configured but is absent from the request")]
    MissingAddressHeader(String),

    #[error("XFF_DEPTH must be a positive integer")]
    XffDepthZero,

    #[error("XFF_DEPTH is {depth}, but only found {found} addresses")]
    XffDepthTooDeep { depth: u32, found: usize },

    #[error("invalid upstream address {0}")]
    BadUpstream(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),
}

/// Derive the client address from request headers.
///
/// Without a configured header the loopback address is reported. For the
/// standard proxy-chain header the configured depth picks an entry from
/// the end; a depth outside `1..=len` is a configuration error.
pub fn derive_client_address(
    headers: &HeaderMap,
    address_header: Option<&str>,
    xff_depth: u32,
) -> Result<String, SsrError> {
    let Some(name) = address_header else {
        return Ok("127.0.0.1".to_string());
    };
    let value = headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if name.eq_ignore_ascii_case("x-forwarded-for") {
        let addresses: Vec<&str> = value.split(',').collect();
        if xff_depth < 1 {
            return Err(SsrError::XffDepthZero);
        }
        if xff_depth as usize > addresses.len() {
            return Err(SsrError::XffDepthTooDeep {
                depth: xff_depth,
                found: addresses.len(),
            });
        }
        Ok(addresses[addresses.len() - xff_depth as usize].trim().to_string())
    } else {
        Ok(value.to_string())
    }
}

/// Forwards requests to the framework's SSR server.
pub struct SsrUpstream {
    config: SsrConfig,
    client: Client<HttpConnector, Body>,
}

impl SsrUpstream {
    /// Create an upstream with its own pooled HTTP client.
    pub fn new(config: SsrConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { config, client }
    }

    /// Origin as derived from the request headers: the configured
    /// protocol header (default `https`) plus the configured host header.
    pub fn derived_origin(&self, headers: &HeaderMap) -> String {
        let protocol = self
            .config
            .protocol_header
            .as_deref()
            .and_then(|name| headers.get(name))
            .and_then(|v| v.to_str().ok())
            .unwrap_or("https");
        let host = headers
            .get(self.config.host_header.as_str())
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        format!("{protocol}://{host}")
    }

    /// Forward the request and return the upstream response.
    pub async fn respond(&self, request: Request<Body>) -> Result<Response<Body>, SsrError> {
        if let Some(name) = &self.config.address_header {
            if !request.headers().contains_key(name.as_str()) {
                return Err(SsrError::MissingAddressHeader(name.clone()));
            }
        }
        let client_address = derive_client_address(
            request.headers(),
            self.config.address_header.as_deref(),
            self.config.xff_depth,
        )?;

        let (mut parts, body) = request.into_parts();

        // Rewrite to the trusted origin when the derived one differs.
        let mut host_override = None;
        if let Some(origin) = &self.config.origin {
            let derived = self.derived_origin(&parts.headers);
            if *origin != derived {
                host_override = origin
                    .split_once("://")
                    .map(|(_, rest)| rest.to_string())
                    .or_else(|| Some(origin.clone()));
            }
        }

        let authority: Authority = self
            .config
            .address
            .parse()
            .map_err(|_| SsrError::BadUpstream(self.config.address.clone()))?;
        let mut uri_parts = parts.uri.clone().into_parts();
        uri_parts.scheme = Some(Scheme::HTTP);
        uri_parts.authority = Some(authority);
        if uri_parts.path_and_query.is_none() {
            uri_parts.path_and_query = Some("/".parse().expect("static path"));
        }
        parts.uri = Uri::from_parts(uri_parts)
            .map_err(|_| SsrError::BadUpstream(self.config.address.clone()))?;

        if let Some(host) = host_override {
            if let Ok(value) = HeaderValue::from_str(&host) {
                parts.headers.insert(header::HOST, value);
            }
        }
        if let Ok(value) = HeaderValue::from_str(&client_address) {
            parts.headers.insert(X_CLIENT_ADDRESS, value);
        }

        let request = Request::from_parts(parts, body);
        match self.client.request(request).await {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Err(err) => Err(SsrError::Upstream(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xff_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", value.parse().unwrap());
        headers
    }

    #[test]
    fn test_no_header_configured_is_loopback() {
        let headers = HeaderMap::new();
        assert_eq!(
            derive_client_address(&headers, None, 1).unwrap(),
            "127.0.0.1"
        );
    }

    #[test]
    fn test_xff_depth_from_end() {
        let headers = xff_headers("1.1.1.1, 2.2.2.2, 3.3.3.3");
        assert_eq!(
            derive_client_address(&headers, Some("x-forwarded-for"), 2).unwrap(),
            "2.2.2.2"
        );
        assert_eq!(
            derive_client_address(&headers, Some("x-forwarded-for"), 1).unwrap(),
            "3.3.3.3"
        );
    }

    #[test]
    fn test_xff_depth_exceeding_addresses_errors() {
        let headers = xff_headers("1.1.1.1, 2.2.2.2");
        let err = derive_client_address(&headers, Some("x-forwarded-for"), 5).unwrap_err();
        assert!(matches!(
            err,
            SsrError::XffDepthTooDeep { depth: 5, found: 2 }
        ));
    }

    #[test]
    fn test_plain_address_header_used_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "9.9.9.9".parse().unwrap());
        assert_eq!(
            derive_client_address(&headers, Some("x-real-ip"), 1).unwrap(),
            "9.9.9.9"
        );
    }

    #[test]
    fn test_derived_origin() {
        let upstream = SsrUpstream::new(SsrConfig {
            protocol_header: Some("x-forwarded-proto".to_string()),
            ..SsrConfig::default()
        });
        let mut headers = HeaderMap::new();
        headers.insert("host", "example.com".parse().unwrap());
        headers.insert("x-forwarded-proto", "http".parse().unwrap());
        assert_eq!(upstream.derived_origin(&headers), "http://example.com");

        headers.remove("x-forwarded-proto");
        assert_eq!(upstream.derived_origin(&headers), "https://example.com");
    }
}

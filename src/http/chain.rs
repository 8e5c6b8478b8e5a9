//! Handler chain dispatch.
//!
//! # Responsibilities
//! - Try each handler in a fixed order: client assets, prerendered
//!   assets, then the SSR fallthrough
//! - Terminate an exhausted chain with the default 404
//! - Map SSR errors to the error taxonomy (502 upstream, 500 config)
//!
//! # Design Decisions
//! - Chain-of-responsibility without backtracking: once an entry
//!   produces a response, later entries never run
//! - Falsy entries (missing roots, disabled assets) are filtered at
//!   construction, not checked per request

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};

use crate::assets::{StaticOptions, StaticServer};
use crate::config::RuntimeOptions;

use super::ssr::{SsrConfig, SsrError, SsrUpstream};

/// A static handler plus the label used in logs and metrics.
struct ChainEntry {
    label: &'static str,
    server: StaticServer,
}

/// Ordered request handlers ending in the SSR fallthrough.
pub struct HandlerChain {
    entries: Vec<ChainEntry>,
    ssr: Option<SsrUpstream>,
}

impl HandlerChain {
    /// Start building a chain.
    pub fn builder() -> ChainBuilder {
        ChainBuilder::default()
    }

    /// Assemble the production chain for a build directory.
    ///
    /// Client assets get long-lived immutable caching for the app's
    /// hashed-asset subtree; prerendered pages are served like any other
    /// static tree. Both are skipped when assets are disabled.
    pub fn for_build_dir(
        build_dir: &Path,
        options: &RuntimeOptions,
        app_dir: &str,
        ssr: SsrConfig,
    ) -> Self {
        let mut builder = Self::builder();
        if options.assets {
            builder = builder
                .push_static(
                    "client",
                    StaticServer::new(
                        build_dir.join("client"),
                        client_options(app_dir, options.development),
                    ),
                )
                .push_static(
                    "prerendered",
                    StaticServer::new(
                        build_dir.join("prerendered"),
                        tree_options(options.development),
                    ),
                );
        }
        builder.ssr(SsrUpstream::new(ssr)).build()
    }

    /// Dispatch a request through the chain.
    pub async fn dispatch(&self, request: Request<Body>) -> Response<Body> {
        let (parts, body) = request.into_parts();

        for entry in &self.entries {
            if let Some(response) = entry.server.respond(&parts).await {
                tracing::debug!(source = entry.label, path = %parts.uri.path(), status = %response.status(), "served static");
                return response;
            }
        }

        let Some(ssr) = &self.ssr else {
            return not_found();
        };
        match ssr.respond(Request::from_parts(parts, body)).await {
            Ok(response) => response,
            Err(SsrError::Upstream(reason)) => {
                tracing::error!(error = %reason, "SSR upstream failed");
                fixed_body(StatusCode::BAD_GATEWAY, "Upstream request failed")
            }
            Err(err) => {
                // Configuration errors surface here per request; log and
                // degrade to the generic 500.
                tracing::error!(error = %err, "SSR invocation failed");
                fixed_body(StatusCode::INTERNAL_SERVER_ERROR, "Uh oh!!")
            }
        }
    }
}

/// Builder for [`HandlerChain`]. Entry order is significant and fixed at
/// construction.
#[derive(Default)]
pub struct ChainBuilder {
    entries: Vec<ChainEntry>,
    ssr: Option<SsrUpstream>,
}

impl ChainBuilder {
    /// Append a static handler; `None` entries are filtered out.
    pub fn push_static(mut self, label: &'static str, server: Option<StaticServer>) -> Self {
        match server {
            Some(server) => self.entries.push(ChainEntry { label, server }),
            None => tracing::debug!(label, "static root missing, entry skipped"),
        }
        self
    }

    /// Terminate the chain with the SSR fallthrough.
    pub fn ssr(mut self, upstream: SsrUpstream) -> Self {
        self.ssr = Some(upstream);
        self
    }

    pub fn build(self) -> HandlerChain {
        HandlerChain {
            entries: self.entries,
            ssr: self.ssr,
        }
    }
}

/// Options for the client asset tree: hashed assets under the app dir are
/// immutable for a year.
fn client_options(app_dir: &str, dev: bool) -> StaticOptions {
    let immutable_prefix = format!("/{app_dir}/immutable/");
    StaticOptions {
        etag: true,
        gzip: true,
        brotli: true,
        dev,
        set_headers: Some(Arc::new(move |mut headers, pathname: &str, _size| {
            if pathname.starts_with(&immutable_prefix) {
                headers.insert(
                    axum::http::header::CACHE_CONTROL,
                    axum::http::HeaderValue::from_static("public,max-age=31536000,immutable"),
                );
            }
            headers
        })),
        ..StaticOptions::default()
    }
}

fn tree_options(dev: bool) -> StaticOptions {
    StaticOptions {
        etag: true,
        gzip: true,
        brotli: true,
        dev,
        ..StaticOptions::default()
    }
}

fn not_found() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

fn fixed_body(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

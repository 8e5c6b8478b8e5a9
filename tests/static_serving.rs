//! Static serving properties: MIME types, conditional requests, ranges,
//! precompressed variants, and chain fall-through.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};

use standalone_adapter::assets::{StaticOptions, StaticServer};
use standalone_adapter::http::HandlerChain;

mod common;

fn serving_options() -> StaticOptions {
    StaticOptions {
        etag: true,
        gzip: true,
        brotli: true,
        ..StaticOptions::default()
    }
}

fn request(path: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn chain_for(root: &std::path::Path) -> HandlerChain {
    HandlerChain::builder()
        .push_static("client", StaticServer::new(root, serving_options()))
        .build()
}

async fn body_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, 1024 * 1024).await.unwrap().to_vec()
}

#[tokio::test]
async fn test_serves_files_with_mime_types() {
    let dir = tempfile::tempdir().unwrap();
    common::seed_static_tree(dir.path());
    let chain = chain_for(dir.path()).await;

    // Exact path.
    let response = chain.dispatch(request("/about.html", &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html;charset=utf-8"
    );

    // Extensionless resolves via the configured extensions.
    let response = chain.dispatch(request("/about", &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_bytes(response.into_body()).await,
        b"<html>about</html>"
    );

    // Trailing slash resolves the same file.
    let response = chain.dispatch(request("/about/", &[])).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Root resolves the index page.
    let response = chain.dispatch(request("/", &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response.into_body()).await, b"<html>home</html>");

    // Binary gets a length and no charset.
    let response = chain.dispatch(request("/data.bin", &[])).await;
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
}

#[tokio::test]
async fn test_byte_ranges() {
    let dir = tempfile::tempdir().unwrap();
    common::seed_static_tree(dir.path());
    let chain = chain_for(dir.path()).await;

    let response = chain
        .dispatch(request("/data.bin", &[("range", "bytes=0-4")]))
        .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-4/10");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(body_bytes(response.into_body()).await, b"01234");

    let response = chain
        .dispatch(request("/data.bin", &[("range", "bytes=20-30")]))
        .await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */10");
    assert!(body_bytes(response.into_body()).await.is_empty());
}

#[tokio::test]
async fn test_etag_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    common::seed_static_tree(dir.path());
    let chain = chain_for(dir.path()).await;

    let response = chain.dispatch(request("/data.bin", &[])).await;
    let etag = response.headers()[header::ETAG].to_str().unwrap().to_string();
    assert!(etag.starts_with("W/\""));

    let response = chain
        .dispatch(request("/data.bin", &[("if-none-match", &etag)]))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert!(body_bytes(response.into_body()).await.is_empty());
}

#[tokio::test]
async fn test_precompressed_variants() {
    let dir = tempfile::tempdir().unwrap();
    common::seed_static_tree(dir.path());
    let chain = chain_for(dir.path()).await;

    // No Accept-Encoding: the plain file.
    let response = chain.dispatch(request("/app.js", &[])).await;
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    assert_eq!(
        body_bytes(response.into_body()).await,
        b"console.log('plain')"
    );

    // gzip accepted: the .gz sibling, with Vary.
    let response = chain
        .dispatch(request("/app.js", &[("accept-encoding", "gzip")]))
        .await;
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    assert_eq!(response.headers()[header::VARY], "Accept-Encoding");
    assert_eq!(body_bytes(response.into_body()).await, b"gzipped!");

    // Both accepted: brotli wins.
    let response = chain
        .dispatch(request("/app.js", &[("accept-encoding", "br, gzip")]))
        .await;
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "br");
    assert_eq!(body_bytes(response.into_body()).await, b"brotlied!");
}

#[tokio::test]
async fn test_exhausted_chain_is_404() {
    let dir = tempfile::tempdir().unwrap();
    common::seed_static_tree(dir.path());
    let chain = chain_for(dir.path()).await;

    let response = chain.dispatch(request("/missing/page", &[])).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_development_mode_sees_new_files() {
    let dir = tempfile::tempdir().unwrap();
    common::seed_static_tree(dir.path());
    let chain = HandlerChain::builder()
        .push_static(
            "client",
            StaticServer::new(
                dir.path(),
                StaticOptions {
                    dev: true,
                    ..serving_options()
                },
            ),
        )
        .build();

    let response = chain.dispatch(request("/later.html", &[])).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    common::write_file(dir.path(), "later.html", b"fresh");
    let response = chain.dispatch(request("/later.html", &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response.into_body()).await, b"fresh");
}

#[tokio::test]
async fn test_dotfiles_hidden_in_production_walk() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(dir.path(), ".env", b"secret");
    common::write_file(dir.path(), ".well-known/assetlinks.json", b"[]");
    let chain = chain_for(dir.path()).await;

    let response = chain.dispatch(request("/.env", &[])).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = chain
        .dispatch(request("/.well-known/assetlinks.json", &[]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

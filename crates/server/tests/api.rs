//! End-to-end pipeline tests, driven through the router with tower.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sluice_server::config::ServerConfig;
use sluice_server::{app, build_state};
use tower::ServiceExt;

const BASE_CONFIG: &str = r#"
    [resources.R.providers.memory]
    settings = { mount = "m1" }

    [resources.R2.providers.memory]
    settings = { mount = "m2" }

    [resources.locked]
    token = "secret"

    [resources.locked.providers.memory]
    settings = { mount = "m3" }
"#;

async fn gateway(config: &str) -> Router {
    let config = ServerConfig::parse(config).unwrap();
    app(build_state(config).await.unwrap())
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes().to_vec();
    (parts.status, parts.headers, bytes)
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

fn request_with_body(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn upload(router: &Router, resource: &str, folder: &str, name: &str, data: &str) -> serde_json::Value {
    let name = name.replace(' ', "%20");
    let uri = format!("/v1/resources/{resource}/providers/memory{folder}?kind=file&name={name}");
    let (status, _, body) = send(router, request_with_body(Method::PUT, &uri, data)).await;
    assert_eq!(status, StatusCode::CREATED, "upload failed: {}", String::from_utf8_lossy(&body));
    serde_json::from_slice(&body).unwrap()
}

async fn mkdir(router: &Router, resource: &str, folder: &str, name: &str) {
    let uri = format!("/v1/resources/{resource}/providers/memory{folder}?kind=folder&name={name}");
    let (status, _, _) = send(router, request(Method::PUT, &uri)).await;
    assert_eq!(status, StatusCode::CREATED);
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

#[tokio::test]
async fn test_upload_then_download() {
    let router = gateway(BASE_CONFIG).await;

    let document = upload(&router, "R", "/", "a.txt", "hello").await;
    assert_eq!(document["data"]["type"], "files");
    assert_eq!(document["data"]["attributes"]["size"], 5);
    assert_eq!(document["data"]["attributes"]["hashes"]["sha256"], HELLO_SHA256);

    let (status, headers, body) = send(&router, request(Method::GET, "/v1/resources/R/providers/memory/a.txt")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"hello");
    let disposition = headers.get(header::CONTENT_DISPOSITION).unwrap().to_str().unwrap();
    assert!(disposition.contains("a.txt"), "got {disposition}");
    assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "5");
}

#[tokio::test]
async fn test_update_existing_file_is_200() {
    let router = gateway(BASE_CONFIG).await;
    upload(&router, "R", "/", "a.txt", "one").await;

    let uri = "/v1/resources/R/providers/memory/a.txt?kind=file";
    let (status, _, body) = send(&router, request_with_body(Method::PUT, uri, "two")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["data"]["attributes"]["size"], 3);
}

#[tokio::test]
async fn test_folder_listing_and_meta() {
    let router = gateway(BASE_CONFIG).await;
    upload(&router, "R", "/", "a.txt", "hello").await;
    mkdir(&router, "R", "/", "docs").await;

    let (status, _, body) = send(&router, request(Method::GET, "/v1/resources/R/providers/memory/")).await;
    assert_eq!(status, StatusCode::OK);
    let listing = json(&body);
    let names: Vec<&str> =
        listing["data"].as_array().unwrap().iter().map(|e| e["attributes"]["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["docs", "a.txt"]);

    let (status, _, body) =
        send(&router, request(Method::GET, "/v1/resources/R/providers/memory/a.txt?meta=")).await;
    assert_eq!(status, StatusCode::OK);
    let document = json(&body);
    assert_eq!(document["data"]["type"], "files");
    assert!(document["data"]["links"]["download"].as_str().unwrap().ends_with("/memory/a.txt"));
}

#[tokio::test]
async fn test_trailing_slash_kind_mismatch_is_404() {
    let router = gateway(BASE_CONFIG).await;
    upload(&router, "R", "/", "a.txt", "hello").await;

    let (status, _, body) = send(&router, request(Method::GET, "/v1/resources/R/providers/memory/a.txt/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["code"], "NotFound");

    mkdir(&router, "R", "/", "docs").await;
    let (status, _, _) = send(&router, request(Method::GET, "/v1/resources/R/providers/memory/docs")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_folder_zip_archive() {
    let router = gateway(BASE_CONFIG).await;
    mkdir(&router, "R", "/", "data").await;
    upload(&router, "R", "/data/", "a.txt", "x").await;
    mkdir(&router, "R", "/data/", "sub").await;
    upload(&router, "R", "/data/sub/", "b.txt", "y").await;

    let (status, headers, body) =
        send(&router, request(Method::GET, "/v1/resources/R/providers/memory/data/?zip=")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/zip");
    assert!(body.starts_with(b"PK\x03\x04"));
    let find = |needle: &[u8]| body.windows(needle.len()).position(|w| w == needle);
    let a = find(b"a.txt").expect("a.txt entry");
    let b = find(b"sub/b.txt").expect("sub/b.txt entry");
    assert!(a < b, "entries in lexical order");
}

#[tokio::test]
async fn test_cross_provider_copy_streams_bytes() {
    let router = gateway(BASE_CONFIG).await;
    let source = upload(&router, "R", "/", "a.txt", "hello").await;

    let body = r#"{"action": "copy", "resource": "R2", "provider": "memory", "path": "/"}"#;
    let (status, _, response) =
        send(&router, request_with_body(Method::POST, "/v1/resources/R/providers/memory/a.txt", body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", String::from_utf8_lossy(&response));
    let copied = json(&response);

    assert_eq!(
        copied["data"]["attributes"]["hashes"]["sha256"],
        source["data"]["attributes"]["hashes"]["sha256"],
    );
    let (status, _, bytes) = send(&router, request(Method::GET, "/v1/resources/R2/providers/memory/a.txt")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"hello");
    // Copies keep the source.
    let (status, _, _) = send(&router, request(Method::GET, "/v1/resources/R/providers/memory/a.txt")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_move_deletes_source() {
    let router = gateway(BASE_CONFIG).await;
    upload(&router, "R", "/", "a.txt", "hello").await;

    let body = r#"{"action": "move", "resource": "R2", "provider": "memory", "path": "/"}"#;
    let (status, _, _) =
        send(&router, request_with_body(Method::POST, "/v1/resources/R/providers/memory/a.txt", body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, _) = send(&router, request(Method::GET, "/v1/resources/R/providers/memory/a.txt")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, bytes) = send(&router, request(Method::GET, "/v1/resources/R2/providers/memory/a.txt")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"hello");
}

#[tokio::test]
async fn test_copy_conflict_keep_suffixes() {
    let router = gateway(BASE_CONFIG).await;
    upload(&router, "R2", "/", "report.txt", "new").await;
    upload(&router, "R", "/", "report.txt", "old").await;
    upload(&router, "R", "/", "report (1).txt", "older").await;

    let body = r#"{"action": "copy", "resource": "R", "provider": "memory", "path": "/", "conflict": "keep"}"#;
    let (status, _, response) =
        send(&router, request_with_body(Method::POST, "/v1/resources/R2/providers/memory/report.txt", body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json(&response)["data"]["attributes"]["name"], "report (2).txt");

    let (status, _, bytes) =
        send(&router, request(Method::GET, "/v1/resources/R/providers/memory/report%20(2).txt")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"new");
}

#[tokio::test]
async fn test_copy_conflict_default_warns() {
    let router = gateway(BASE_CONFIG).await;
    upload(&router, "R2", "/", "report.txt", "new").await;
    upload(&router, "R", "/", "report.txt", "old").await;

    let body = r#"{"action": "copy", "resource": "R", "provider": "memory", "path": "/"}"#;
    let (status, _, response) =
        send(&router, request_with_body(Method::POST, "/v1/resources/R2/providers/memory/report.txt", body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let error = json(&response);
    assert_eq!(error["code"], "NamingConflict");
    assert_eq!(error["data"]["conflicting_name"], "report.txt");
}

#[tokio::test]
async fn test_rename_action() {
    let router = gateway(BASE_CONFIG).await;
    upload(&router, "R", "/", "a.txt", "hello").await;

    let body = r#"{"action": "rename", "rename": "b.txt"}"#;
    let (status, _, response) =
        send(&router, request_with_body(Method::POST, "/v1/resources/R/providers/memory/a.txt", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&response)["data"]["attributes"]["name"], "b.txt");

    let (status, _, _) = send(&router, request(Method::GET, "/v1/resources/R/providers/memory/a.txt")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, bytes) = send(&router, request(Method::GET, "/v1/resources/R/providers/memory/b.txt")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"hello");
}

#[tokio::test]
async fn test_revisions_listing_and_versioned_download() {
    let router = gateway(BASE_CONFIG).await;
    upload(&router, "R", "/", "a.txt", "one").await;
    let uri = "/v1/resources/R/providers/memory/a.txt?kind=file";
    send(&router, request_with_body(Method::PUT, uri, "two")).await;

    let (status, _, body) =
        send(&router, request(Method::GET, "/v1/resources/R/providers/memory/a.txt?revisions=")).await;
    assert_eq!(status, StatusCode::OK);
    let listing = json(&body);
    let versions: Vec<&str> =
        listing["data"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(versions, vec!["2", "1"]);

    let (status, _, bytes) =
        send(&router, request(Method::GET, "/v1/resources/R/providers/memory/a.txt?version=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"one");
}

#[tokio::test]
async fn test_root_delete_requires_confirmation() {
    let router = gateway(BASE_CONFIG).await;
    upload(&router, "R", "/", "a.txt", "hello").await;

    let (status, _, body) = send(&router, request(Method::DELETE, "/v1/resources/R/providers/memory/")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["code"], "InvalidArgument");

    let (status, _, _) =
        send(&router, request(Method::DELETE, "/v1/resources/R/providers/memory/?confirm_delete=1")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, body) = send(&router, request(Method::GET, "/v1/resources/R/providers/memory/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_delete_file() {
    let router = gateway(BASE_CONFIG).await;
    upload(&router, "R", "/", "a.txt", "hello").await;
    let (status, _, _) = send(&router, request(Method::DELETE, "/v1/resources/R/providers/memory/a.txt")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, _) = send(&router, request(Method::GET, "/v1/resources/R/providers/memory/a.txt")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_locked_resource_requires_token() {
    let router = gateway(BASE_CONFIG).await;

    let (status, _, body) = send(&router, request(Method::GET, "/v1/resources/locked/providers/memory/")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["code"], "Unauthorized");

    let with_token = Request::builder()
        .method(Method::GET)
        .uri("/v1/resources/locked/providers/memory/")
        .header(header::AUTHORIZATION, "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&router, with_token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_resource_and_provider_are_404() {
    let router = gateway(BASE_CONFIG).await;
    let (status, _, _) = send(&router, request(Method::GET, "/v1/resources/nope/providers/memory/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = send(&router, request(Method::GET, "/v1/resources/R/providers/gopherdrive/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_put_validation_errors() {
    let router = gateway(BASE_CONFIG).await;

    // Unknown kind.
    let uri = "/v1/resources/R/providers/memory/?kind=link&name=a";
    let (status, _, _) = send(&router, request_with_body(Method::PUT, uri, "x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // File upload without Content-Length.
    let uri = "/v1/resources/R/providers/memory/?kind=file&name=a.txt";
    let no_length = Request::builder().method(Method::PUT).uri(uri).body(Body::from("x")).unwrap();
    let (status, _, _) = send(&router, no_length).await;
    assert_eq!(status, StatusCode::LENGTH_REQUIRED);

    // Folder creation with a body.
    let uri = "/v1/resources/R/providers/memory/?kind=folder&name=docs";
    let (status, _, _) = send(&router, request_with_body(Method::PUT, uri, "body")).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    // Missing name when the URL names a folder.
    let uri = "/v1/resources/R/providers/memory/?kind=file";
    let (status, _, _) = send(&router, request_with_body(Method::PUT, uri, "x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_folder_conflict_is_409() {
    let router = gateway(BASE_CONFIG).await;
    mkdir(&router, "R", "/", "docs").await;
    let uri = "/v1/resources/R/providers/memory/?kind=folder&name=docs";
    let (status, _, body) = send(&router, request(Method::PUT, uri)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["code"], "NamingConflict");
}

#[tokio::test]
async fn test_rate_limit_fixed_window() {
    let config = format!(
        r#"
        [rate_limiting]
        enabled = true
        limit = 2
        window_seconds = 60

        {BASE_CONFIG}
        "#
    );
    let router = gateway(&config).await;

    let authed = || {
        Request::builder()
            .method(Method::GET)
            .uri("/v1/resources/R/providers/memory/")
            .header(header::AUTHORIZATION, "Bearer throttled-token")
            .body(Body::empty())
            .unwrap()
    };

    let (status, _, _) = send(&router, authed()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&router, authed()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, headers, body) = send(&router, authed()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json(&body)["code"], "RateLimited");
    let retry_after: u64 = headers.get("Retry-After").unwrap().to_str().unwrap().parse().unwrap();
    assert!(retry_after > 0 && retry_after <= 60);
    assert_eq!(headers.get("X-RateLimit-Remaining").unwrap(), "0");
    assert_eq!(headers.get("X-RateLimit-Limit").unwrap(), "2");
    assert!(headers.contains_key("X-RateLimit-Reset"));

    // A different token gets its own window.
    let other = Request::builder()
        .method(Method::GET)
        .uri("/v1/resources/R/providers/memory/")
        .header(header::AUTHORIZATION, "Bearer other-token")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&router, other).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_head_file_metadata_headers() {
    let router = gateway(BASE_CONFIG).await;
    upload(&router, "R", "/", "a.txt", "hello").await;

    let (status, headers, body) = send(&router, request(Method::HEAD, "/v1/resources/R/providers/memory/a.txt")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "5");
    assert!(headers.contains_key("X-Sluice-Metadata"));

    let (status, _, _) = send(&router, request(Method::HEAD, "/v1/resources/R/providers/memory/")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_range_download() {
    let router = gateway(BASE_CONFIG).await;
    upload(&router, "R", "/", "a.txt", "0123456789").await;

    let ranged = Request::builder()
        .method(Method::GET)
        .uri("/v1/resources/R/providers/memory/a.txt")
        .header(header::RANGE, "bytes=2-4")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&router, ranged).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body, b"234");
    assert_eq!(headers.get(header::CONTENT_RANGE).unwrap(), "bytes 2-4/10");

    let unsatisfiable = Request::builder()
        .method(Method::GET)
        .uri("/v1/resources/R/providers/memory/a.txt")
        .header(header::RANGE, "bytes=99-")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&router, unsatisfiable).await;
    assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(headers.get(header::CONTENT_RANGE).unwrap(), "bytes */10");
}

#[tokio::test]
async fn test_status_endpoint() {
    let router = gateway(BASE_CONFIG).await;
    let (status, _, body) = send(&router, request(Method::GET, "/status")).await;
    assert_eq!(status, StatusCode::OK);
    let document = json(&body);
    assert_eq!(document["status"], "up");
    assert!(document["metrics"]["requests"].is_u64());
}

#[tokio::test]
async fn test_post_requires_valid_action() {
    let router = gateway(BASE_CONFIG).await;
    upload(&router, "R", "/", "a.txt", "x").await;

    let (status, _, body) = send(
        &router,
        request_with_body(Method::POST, "/v1/resources/R/providers/memory/a.txt", r#"{"action": "teleport"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["code"], "InvalidArgument");
}

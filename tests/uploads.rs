//! Upload endpoint integration tests

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use tower::ServiceExt;

mod common;
use common::{Part, TEST_TOKEN, build_test_app, multipart_body};

const BOUNDARY: &str = "------------------------test9f2c1b";

/// 1x1-ish JPEG header bytes, enough to look like an image
const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01];

/// PNG magic + filler
const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0, 0];

async fn send_multipart(app: &Router, uri: &str, parts: &[Part<'_>]) -> (StatusCode, serde_json::Value) {
    let body = multipart_body(BOUNDARY, parts);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// -- single-shot uploads --------------------------------------------------

#[tokio::test]
async fn upload_stores_image_and_returns_code() {
    let app = build_test_app();

    let (status, json) = send_multipart(
        &app.router,
        "/upload?instance=inst42",
        &[
            Part::Text("csrf_token", TEST_TOKEN),
            Part::File("asset_file", "photo.jpg", "image/jpeg", JPEG_BYTES),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["error"], false);

    let path = json["path"].as_str().unwrap();
    assert!(path.starts_with("IMG_inst42_"));
    assert!(path.ends_with(".jpg"));
    assert_eq!(json["code"].as_str().unwrap(), format!("IMG:{path}"));
    assert_eq!(
        json["url"].as_str().unwrap(),
        format!("http://localhost:18790/uploads/{path}")
    );

    let stored = std::fs::read(app.uploads_dir().join(path)).unwrap();
    assert_eq!(stored, JPEG_BYTES);
}

#[tokio::test]
async fn upload_rejects_missing_token_before_storing() {
    let app = build_test_app();

    let (status, json) = send_multipart(
        &app.router,
        "/upload",
        &[Part::File("asset_file", "photo.jpg", "image/jpeg", JPEG_BYTES)],
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], true);
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn upload_rejects_wrong_token_before_storing() {
    let app = build_test_app();

    let (status, json) = send_multipart(
        &app.router,
        "/upload",
        &[
            Part::Text("csrf_token", "wrong-token"),
            Part::File("asset_file", "photo.jpg", "image/jpeg", JPEG_BYTES),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], true);
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn upload_rejects_unsupported_type() {
    let app = build_test_app();

    let (status, json) = send_multipart(
        &app.router,
        "/upload",
        &[
            Part::Text("csrf_token", TEST_TOKEN),
            Part::File("asset_file", "notes.txt", "text/plain", b"hello"),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], true);
    assert!(
        json["message"]
            .as_str()
            .unwrap()
            .contains("unsupported file type")
    );
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn upload_rejects_missing_file_field() {
    let app = build_test_app();

    let (status, json) =
        send_multipart(&app.router, "/upload", &[Part::Text("csrf_token", TEST_TOKEN)]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], true);
}

#[tokio::test]
async fn identical_uploads_get_distinct_filenames() {
    let app = build_test_app();

    for _ in 0..2 {
        let (status, _) = send_multipart(
            &app.router,
            "/upload",
            &[
                Part::Text("csrf_token", TEST_TOKEN),
                Part::File("asset_file", "photo.jpg", "image/jpeg", JPEG_BYTES),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let files = app.stored_files();
    assert_eq!(files.len(), 2);
    assert_ne!(files[0], files[1]);
}

// -- chunked uploads ------------------------------------------------------

fn chunk_parts<'a>(
    index_str: &'a str,
    total_str: &'a str,
    data: &'a [u8],
    declared_type: Option<&'a str>,
) -> Vec<Part<'a>> {
    let mut parts = vec![
        Part::Text("csrf_token", TEST_TOKEN),
        Part::Text("upload_id", "transfer-1"),
        Part::Text("chunk_index", index_str),
        Part::Text("total_chunks", total_str),
        Part::Text("file_name", "clip.mp4"),
    ];
    if let Some(t) = declared_type {
        parts.push(Part::Text("file_type", t));
    }
    parts.push(Part::File("chunk", "blob", "application/octet-stream", data));
    parts
}

#[tokio::test]
async fn chunks_acknowledge_then_assemble_in_order() {
    let app = build_test_app();

    // chunks 0..N-2 are acknowledgement-only
    let (status, json) = send_multipart(
        &app.router,
        "/upload/chunk",
        &chunk_parts("0", "3", b"aaaa", Some("video/mp4")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["received"], 0);
    assert!(json.get("code").is_none());
    assert!(app.stored_files().is_empty());

    let (status, json) = send_multipart(
        &app.router,
        "/upload/chunk",
        &chunk_parts("1", "3", b"bb", Some("video/mp4")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["received"], 1);
    assert!(app.stored_files().is_empty());

    // final chunk triggers assembly
    let (status, json) = send_multipart(
        &app.router,
        "/upload/chunk",
        &chunk_parts("2", "3", b"c", Some("video/mp4")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);

    let path = json["path"].as_str().unwrap();
    assert!(path.starts_with("VIDEO_testinst_"));
    assert_eq!(json["code"].as_str().unwrap(), format!("VIDEO:{path}"));

    // byte-for-byte equal to the chunks in index order
    let assembled = std::fs::read(app.uploads_dir().join(path)).unwrap();
    assert_eq!(assembled, b"aaaabbc");

    // scratch directory removed after assembly
    assert!(!app.chunks_dir().join("transfer-1").exists());
}

#[tokio::test]
async fn final_chunk_fails_when_a_chunk_is_missing() {
    let app = build_test_app();

    let (status, _) = send_multipart(
        &app.router,
        "/upload/chunk",
        &chunk_parts("0", "3", b"aaaa", Some("video/mp4")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // skip chunk 1, send the final chunk
    let (status, json) = send_multipart(
        &app.router,
        "/upload/chunk",
        &chunk_parts("2", "3", b"c", Some("video/mp4")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["ok"], false);
    assert!(json["error"].as_str().unwrap().contains("missing chunk 1"));
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn chunk_rejects_bad_token_before_writing() {
    let app = build_test_app();

    let (status, json) = send_multipart(
        &app.router,
        "/upload/chunk",
        &[
            Part::Text("csrf_token", "nope"),
            Part::Text("upload_id", "transfer-2"),
            Part::Text("chunk_index", "0"),
            Part::Text("total_chunks", "2"),
            Part::File("chunk", "blob", "application/octet-stream", b"data"),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["ok"], false);
    assert!(!app.chunks_dir().join("transfer-2").exists());
}

#[tokio::test]
async fn chunk_validates_parameters() {
    let app = build_test_app();

    // missing upload_id
    let (status, _) = send_multipart(
        &app.router,
        "/upload/chunk",
        &[
            Part::Text("csrf_token", TEST_TOKEN),
            Part::Text("chunk_index", "0"),
            Part::Text("total_chunks", "2"),
            Part::File("chunk", "blob", "application/octet-stream", b"data"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // negative index fails to parse
    let (status, _) = send_multipart(
        &app.router,
        "/upload/chunk",
        &chunk_parts("-1", "2", b"data", Some("video/mp4")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // zero total
    let (status, _) = send_multipart(
        &app.router,
        "/upload/chunk",
        &chunk_parts("0", "0", b"data", Some("video/mp4")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // index beyond total
    let (status, _) = send_multipart(
        &app.router,
        "/upload/chunk",
        &chunk_parts("5", "2", b"data", Some("video/mp4")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn single_chunk_upload_sniffs_undeclared_type() {
    let app = build_test_app();

    let (status, json) = send_multipart(
        &app.router,
        "/upload/chunk",
        &chunk_parts("0", "1", PNG_BYTES, None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert!(json["code"].as_str().unwrap().starts_with("IMG:"));
}

#[tokio::test]
async fn unclassifiable_final_chunk_is_rejected() {
    let app = build_test_app();

    let (status, json) = send_multipart(
        &app.router,
        "/upload/chunk",
        &chunk_parts("0", "1", b"plain text, no magic bytes", None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["ok"], false);
    assert!(app.stored_files().is_empty());
    // scratch is cleaned up best-effort
    assert!(!app.chunks_dir().join("transfer-1").exists());
}

// -- service surface ------------------------------------------------------

#[tokio::test]
async fn health_endpoint_answers() {
    let app = build_test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn status_endpoint_reports_session_state() {
    let app = build_test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["instanceId"], "testinst");
    // session was never started: still in its initial state
    assert_eq!(json["connectionStatus"], "starting");
    assert_eq!(json["whatsappConnected"], false);
    assert_eq!(json["hasQR"], false);
}

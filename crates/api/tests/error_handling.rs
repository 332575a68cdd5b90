//! Integration tests for request validation and error responses.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_form, Form};

// ---------------------------------------------------------------------------
// Test: unknown job id on progress returns 404 "task not found"
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_for_unknown_id_returns_404() {
    let app = common::build_test_app();
    let response = get(&app.router, "/api/progress/doesnotexist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "task not found");
    assert_eq!(json["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Test: unknown job id on download returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_for_unknown_id_returns_404() {
    let app = common::build_test_app();
    let response = get(&app.router, "/api/download/doesnotexist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "task not found");
}

// ---------------------------------------------------------------------------
// Test: unknown job kind returns 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_kind_returns_400() {
    let app = common::build_test_app();
    let form = Form::new().file("a.pdf", b"x".to_vec());
    let response = post_form(&app.router, "/api/convert", form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Test: submission without files returns 400 and creates no job
// ---------------------------------------------------------------------------

#[tokio::test]
async fn merge_without_files_returns_400() {
    let app = common::build_test_app();
    let response = post_form(&app.router, "/api/merge", Form::new()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let health = body_json(get(&app.router, "/health").await).await;
    assert_eq!(health["jobs"], 0);
    assert!(common::entries(app.work_root()).is_empty());
}

#[tokio::test]
async fn only_hidden_files_counts_as_no_files() {
    let app = common::build_test_app();
    let form = Form::new()
        .file(".DS_Store", b"x".to_vec())
        .file("folder/Thumbs.db", b"x".to_vec());
    let response = post_form(&app.router, "/api/extract", form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: invalid parameters return 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_numeric_inv_ratio_returns_400() {
    let app = common::build_test_app();
    for bad in ["abc", "NaN", "inf"] {
        let form = Form::new()
            .file("a.pdf", b"x".to_vec())
            .text("inv_ratio", bad);
        let response = post_form(&app.router, "/api/merge", form).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "inv_ratio={bad}");
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("inv_ratio"));
    }
}

#[tokio::test]
async fn harvest_with_unregistered_category_returns_400() {
    let app = common::build_test_app();
    let form = Form::new().text("category", "999999");
    let response = post_form(&app.router, "/api/harvest", form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("999999"));
}

#[tokio::test]
async fn harvest_with_reversed_dates_returns_400() {
    let app = common::build_test_app();
    let form = Form::new()
        .text("start", "2025-02-01")
        .text("end", "2025-01-01");
    let response = post_form(&app.router, "/api/harvest", form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: upload names escaping the workspace return 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn path_traversal_upload_returns_400() {
    let app = common::build_test_app();
    let form = Form::new().file("../escape.pdf", b"x".to_vec());
    let response = post_form(&app.router, "/api/extract", form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!app.work_root().join("escape.pdf").exists());
}

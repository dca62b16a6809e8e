//! Direct scan endpoint behaviour: splitting, fan-out, configuration
//! resolution and error mapping.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::Engine as _;
use tower::ServiceExt;

use wfpd_core::ScriptedEngine;

mod common;
use common::{FIVE_RECORDS, body_json, body_string, multipart_request, test_app, test_app_with};

#[tokio::test]
async fn direct_scan_assembles_all_batches() {
    let app = test_app(ScriptedEngine::matching());
    let request = multipart_request("/api/scan/direct", &[], &[("file", FIVE_RECORDS)]);
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );

    let body = body_string(response).await;
    assert!(body.ends_with('\n'));
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed.as_object().unwrap().len(), 5);

    // Five records at a grouping of two means three engine invocations.
    let mut sizes: Vec<usize> = app
        .engine
        .calls()
        .iter()
        .map(|c| c.wfp.matches("file=").count())
        .collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 2, 2]);
}

#[tokio::test]
async fn request_id_is_echoed_back() {
    let app = test_app(ScriptedEngine::matching());
    let request = multipart_request(
        "/api/scan/direct",
        &[("x-request-id", "req-42")],
        &[("file", FIVE_RECORDS)],
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-response-id"], "req-42");
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let app = test_app(ScriptedEngine::matching());
    let request = multipart_request("/api/scan/direct", &[], &[("flags", "8")]);
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.engine.call_count(), 0);
}

#[tokio::test]
async fn contents_without_records_are_rejected() {
    let app = test_app(ScriptedEngine::matching());
    let request = multipart_request(
        "/api/scan/direct",
        &[],
        &[("file", "not a fingerprint at all")],
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn hpsm_content_is_forbidden_when_disabled() {
    let app = test_app_with(ScriptedEngine::matching(), |config| {
        config.scanning.hpsm_enabled = false;
    });
    let wfp = "file=11d4bfc1e4d3a1f599aa3a07a9bbdbcd,1024,a.c\nhpsm=a1b2\n1=1\n";
    let request = multipart_request("/api/scan/direct", &[], &[("file", wfp)]);
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.engine.call_count(), 0);
}

#[tokio::test]
async fn engine_failure_maps_to_internal_error() {
    let app = test_app(ScriptedEngine::failing());
    let request = multipart_request("/api/scan/direct", &[], &[("file", FIVE_RECORDS)]);
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn legacy_flags_and_db_name_reach_the_engine() {
    let app = test_app(ScriptedEngine::matching());
    let request = multipart_request(
        "/api/scan/direct",
        &[],
        &[("file", FIVE_RECORDS), ("flags", "16"), ("db_name", "oss")],
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    for call in app.engine.calls() {
        assert_eq!(call.config.flags, 16);
        assert_eq!(call.config.db_name, "oss");
    }
}

#[tokio::test]
async fn header_params_back_missing_form_fields() {
    let app = test_app(ScriptedEngine::matching());
    let request = multipart_request(
        "/api/scan/direct",
        &[("flags", "32")],
        &[("file", FIVE_RECORDS)],
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.engine.calls().iter().all(|c| c.config.flags == 32));
}

#[tokio::test]
async fn invalid_sbom_type_is_rejected() {
    let app = test_app(ScriptedEngine::matching());
    let request = multipart_request(
        "/api/scan/direct",
        &[],
        &[
            ("file", FIVE_RECORDS),
            ("type", "banana"),
            ("assets", "{\"components\": []}"),
        ],
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.engine.call_count(), 0);
}

#[tokio::test]
async fn sbom_upload_is_staged_for_the_engine() {
    let app = test_app(ScriptedEngine::matching());
    let request = multipart_request(
        "/api/scan/direct",
        &[],
        &[
            ("file", FIVE_RECORDS),
            ("type", "identify"),
            ("assets", "{\"components\": []}"),
        ],
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    for call in app.engine.calls() {
        assert_eq!(call.config.sbom_type, Some(wfpd_core::SbomType::Identify));
        let path = call.config.sbom_file_path.as_ref().unwrap();
        assert!(path.to_string_lossy().contains("sbom"));
    }
}

#[tokio::test]
async fn ranking_settings_are_ignored_without_authorization() {
    let app = test_app(ScriptedEngine::matching());
    let encoded = base64::engine::general_purpose::STANDARD
        .encode(r#"{"ranking_enabled":true,"ranking_threshold":5}"#);
    let request = multipart_request(
        "/api/scan/direct",
        &[("scanoss-scan-settings", encoded.as_str())],
        &[("file", FIVE_RECORDS)],
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.engine.calls().iter().all(|c| !c.config.ranking_enabled));
}

#[tokio::test]
async fn ranking_settings_apply_when_authorized() {
    let app = test_app_with(ScriptedEngine::matching(), |config| {
        config.scanning.ranking_allowed = true;
    });
    let encoded = base64::engine::general_purpose::STANDARD
        .encode(r#"{"ranking_enabled":true,"ranking_threshold":5}"#);
    let request = multipart_request(
        "/api/scan/direct",
        &[("scanoss-scan-settings", encoded.as_str())],
        &[("file", FIVE_RECORDS)],
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    for call in app.engine.calls() {
        assert!(call.config.ranking_enabled);
        assert_eq!(call.config.ranking_threshold, 5);
    }
}

#[tokio::test]
async fn match_config_settings_fail_without_authorization() {
    let app = test_app(ScriptedEngine::matching());
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(r#"{"min_snippet_hits":2}"#);
    let request = multipart_request(
        "/api/scan/direct",
        &[("scanoss-scan-settings", encoded.as_str())],
        &[("file", FIVE_RECORDS)],
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.engine.call_count(), 0);
}

#[tokio::test]
async fn bad_settings_header_is_rejected() {
    let app = test_app(ScriptedEngine::matching());
    let request = multipart_request(
        "/api/scan/direct",
        &[("scanoss-scan-settings", "!!not base64!!")],
        &[("file", FIVE_RECORDS)],
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_and_welcome_answer() {
    let app = test_app(ScriptedEngine::matching());
    for uri in ["/api/health", "/api/health-check"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "{\"alive\": true}\n");
    }
    let request = Request::builder().uri("/api/").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Hello from"));
}

#[tokio::test]
async fn metrics_count_scan_requests() {
    let app = test_app(ScriptedEngine::matching());
    for _ in 0..2 {
        let request = multipart_request("/api/scan/direct", &[], &[("file", FIVE_RECORDS)]);
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let request = Request::builder()
        .uri("/api/metrics/requests")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let metrics = body_json(response).await;
    assert_eq!(metrics["scan"], 2);

    let request = Request::builder()
        .uri("/api/metrics/nonsense")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn file_contents_lookup_returns_text_with_detected_charset() {
    let app = test_app(ScriptedEngine::matching());
    let request = Request::builder()
        .uri("/api/file_contents/11d4bfc1e4d3a1f599aa3a07a9bbdbcd")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain; charset="), "{content_type}");
    let charset = response.headers()["x-detected-charset"].to_str().unwrap();
    assert!(!charset.is_empty());
    let body = body_string(response).await;
    assert!(body.contains("11d4bfc1e4d3a1f599aa3a07a9bbdbcd"));
}

#[tokio::test]
async fn license_obligations_lookup_returns_json() {
    let app = test_app(ScriptedEngine::matching());
    let request = Request::builder()
        .uri("/api/license/obligations/MIT")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["license"], "MIT");
}

#[tokio::test]
async fn sbom_attribution_accepts_an_upload() {
    let app = test_app(ScriptedEngine::matching());
    let request = multipart_request(
        "/api/sbom/attribution",
        &[],
        &[("file", "{\"components\": []}")],
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("attribution for"));
}

//! Shared test harness: an in-process router backed by a scripted engine.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use tempfile::TempDir;

use wfpd_config::Config;
use wfpd_core::ScriptedEngine;
use wfpd_server::{AppState, routes};

pub const BOUNDARY: &str = "wfpd-test-boundary";

pub const FIVE_RECORDS: &str = "\
file=11d4bfc1e4d3a1f599aa3a07a9bbdbcd,1024,a.c\n1=1\n\
file=22e5cfd2f5e4b2a6aabb4b18baccedde,2048,b.c\n2=2\n\
file=33f6dae3a6f5c3b7bbcc5c29cbddfeef,4096,c.c\n3=3\n\
file=44a7ebf4b7a6d4c8ccdd6d3adceeffaa,512,d.c\n4=4\n\
file=55b8fca5c8b7e5d9ddee7e4bdffaabbc,256,e.c\n5=5\n";

// Code is used by test modules, but not in this scope
#[allow(unused)]
pub struct TestApp {
    pub router: Router,
    pub engine: Arc<ScriptedEngine>,
    pub state: AppState,
    pub tmp: TempDir,
}

#[allow(unused)]
pub fn test_app(engine: ScriptedEngine) -> TestApp {
    test_app_with(engine, |_| {})
}

/// Build an app over a temp scratch directory, with multi-worker scanning
/// enabled by default.
#[allow(unused)]
pub fn test_app_with(engine: ScriptedEngine, customize: impl FnOnce(&mut Config)) -> TestApp {
    let tmp = TempDir::new().expect("failed to create test scratch dir");
    let mut config = Config::default();
    config.scanning.workers = 3;
    config.scanning.grouping = 2;
    config.scanning.wfp_dir = Some(tmp.path().to_path_buf());
    config.scanning.session_dir = Some(tmp.path().join("sessions"));
    customize(&mut config);
    std::fs::create_dir_all(config.scanning.session_dir()).unwrap();

    let engine = Arc::new(engine);
    let state = AppState::new(
        Arc::new(config),
        Arc::clone(&engine) as Arc<dyn wfpd_core::EngineClient>,
    );
    let router = routes::create_router(state.clone());
    TestApp {
        router,
        engine,
        state,
        tmp,
    }
}

/// Assemble a multipart/form-data body from (name, value) pairs. The `file`
/// and `filename` fields carry a filename attribute like a real upload.
#[allow(unused)]
pub fn multipart_body(fields: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        if matches!(*name, "file" | "filename") {
            body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"fingers.wfp\"\r\n"
            ));
        } else {
            body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"\r\n"
            ));
        }
        body.push_str("\r\n");
        body.push_str(value);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

/// A POST multipart request with optional extra headers.
#[allow(unused)]
pub fn multipart_request(
    uri: &str,
    headers: &[(&str, &str)],
    fields: &[(&str, &str)],
) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
        .body(Body::from(multipart_body(fields)))
        .expect("failed to build test request")
}

#[allow(unused)]
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to collect response body");
    String::from_utf8(bytes.to_vec()).expect("non-utf8 response body")
}

#[allow(unused)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = body_string(response).await;
    serde_json::from_str(&body).expect("response body is not valid JSON")
}

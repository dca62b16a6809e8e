//! WFP scan endpoints: direct scans and chunked batch sessions.

use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use wfpd_core::{LegacyParams, SbomType, ScanConfig, ScanSettings, resolve};

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

/// Header carrying the base64-encoded JSON settings payload.
pub const SCAN_SETTINGS_HEADER: &str = "scanoss-scan-settings";
pub const SESSION_ID_HEADER: &str = "session-id";
pub const FINAL_CHUNK_HEADER: &str = "x-final-chunk";

/// Everything a scan request can carry besides the WFP blob itself. Each
/// knob arrives as a multipart form field, falling back to a header of the
/// same name.
#[derive(Debug, Default)]
struct ScanRequest {
    contents: Option<String>,
    flags: Option<String>,
    scan_type: Option<String>,
    assets: Option<String>,
    db_name: Option<String>,
}

impl ScanRequest {
    async fn read(headers: &HeaderMap, mut multipart: Multipart) -> AppResult<Self> {
        let mut request = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::bad_request(format!("malformed multipart request: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let text = field
                .text()
                .await
                .map_err(|e| AppError::bad_request(format!("failed to read field {name}: {e}")))?;
            match name.as_str() {
                "file" | "filename" => request.contents = Some(text),
                "flags" => request.flags = Some(text),
                "type" => request.scan_type = Some(text),
                "assets" => request.assets = Some(text),
                "db_name" => request.db_name = Some(text),
                other => debug!(field = other, "ignoring unknown multipart field"),
            }
        }
        // Headers back any knob the form left out.
        request.flags = request.flags.or_else(|| header_value(headers, "flags"));
        request.scan_type = request
            .scan_type
            .or_else(|| header_value(headers, "type"));
        request.assets = request.assets.or_else(|| header_value(headers, "assets"));
        request.db_name = request
            .db_name
            .or_else(|| header_value(headers, "db_name"));
        Ok(request)
    }

    fn contents(&self) -> AppResult<&str> {
        self.contents
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::bad_request("no WFP file supplied"))
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolve the effective configuration for one request, staging an SBOM
/// temp file when the request ships one. The returned guard keeps the SBOM
/// file alive for the duration of the scan.
async fn resolve_request_config(
    state: &AppState,
    headers: &HeaderMap,
    request: &ScanRequest,
) -> AppResult<(ScanConfig, Option<tempfile::NamedTempFile>)> {
    let settings = match header_value(headers, SCAN_SETTINGS_HEADER) {
        Some(encoded) => Some(ScanSettings::from_base64(&encoded)?),
        None => None,
    };

    let mut legacy = LegacyParams {
        flags: request.flags.clone(),
        db_name: request.db_name.clone(),
        ..LegacyParams::default()
    };

    // An SBOM only takes effect when both the assets and a valid type are
    // supplied.
    let mut sbom_guard = None;
    if let (Some(assets), Some(scan_type)) = (request.assets.as_deref(), request.scan_type.as_deref())
    {
        let sbom_type: SbomType = scan_type.parse().map_err(AppError::from)?;
        let sbom_file = stage_sbom(state, assets).await?;
        legacy.sbom_type = Some(sbom_type);
        legacy.sbom_file = Some(sbom_file.path().to_path_buf());
        if state.config.scanning.tmp_file_delete {
            sbom_guard = Some(sbom_file);
        } else if let Err(e) = sbom_file.keep() {
            warn!("failed to persist temporary SBOM file: {e}");
        }
    }

    let config = resolve(&state.base_scan_config, settings.as_ref(), &legacy)?;
    Ok((config, sbom_guard))
}

async fn stage_sbom(state: &AppState, assets: &str) -> AppResult<tempfile::NamedTempFile> {
    let dir = state
        .config
        .scanning
        .wfp_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    let tmp = tempfile::Builder::new()
        .prefix("sbom")
        .suffix(".json")
        .tempfile_in(dir)
        .map_err(|e| AppError::internal(format!("failed to create temporary SBOM file: {e}")))?;
    let mut file = tokio::fs::File::create(tmp.path())
        .await
        .map_err(|e| AppError::internal(format!("failed to open temporary SBOM file: {e}")))?;
    file.write_all(assets.as_bytes())
        .await
        .map_err(|e| AppError::internal(format!("failed to write temporary SBOM file: {e}")))?;
    file.write_all(b"\n")
        .await
        .map_err(|e| AppError::internal(format!("failed to write temporary SBOM file: {e}")))?;
    file.flush()
        .await
        .map_err(|e| AppError::internal(format!("failed to write temporary SBOM file: {e}")))?;
    debug!(file = %tmp.path().display(), "staged SBOM input");
    Ok(tmp)
}

fn json_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        format!("{body}\n"),
    )
        .into_response()
}

/// `POST /api/scan/direct` — scan a complete WFP upload in one request.
pub async fn scan_direct(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Response> {
    let request = ScanRequest::read(&headers, multipart).await?;
    let contents = request.contents()?;
    state.counters.inc("scan");
    let (config, _sbom_guard) = resolve_request_config(&state, &headers, &request).await?;
    let result = state.dispatcher.scan(contents, &config).await?;
    Ok(json_response(result))
}

/// `POST /api/scan/batch` — accumulate WFP chunks under a session id,
/// dispatching the assembled blob when the final chunk arrives.
pub async fn scan_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Response> {
    let session_id = header_value(&headers, SESSION_ID_HEADER)
        .ok_or_else(|| AppError::bad_request("no Session-Id header supplied"))?;
    let final_chunk = header_value(&headers, FINAL_CHUNK_HEADER)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));

    let request = ScanRequest::read(&headers, multipart).await?;
    let contents = request.contents()?;

    if !final_chunk {
        state.sessions.append_chunk(&session_id, contents).await?;
        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "message": format!("Chunk received for session {session_id}"),
            })),
        )
            .into_response());
    }

    info!(session = %session_id, "finalizing batch session");
    state.counters.inc("scan");
    // Resolve the configuration before finalizing: a bad settings header or
    // SBOM must not cost the client their accumulated session.
    let (config, _sbom_guard) = resolve_request_config(&state, &headers, &request).await?;
    let blob = state.sessions.finalize(&session_id, contents).await?;
    let result = state.dispatcher.scan(&blob, &config).await?;
    Ok(json_response(result))
}

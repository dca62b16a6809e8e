//! Engine lookup endpoints: file contents, SBOM attribution and license
//! obligations.

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

/// Response header echoing the charset detected for a file contents lookup.
const DETECTED_CHARSET_HEADER: HeaderName = HeaderName::from_static("x-detected-charset");

/// Detection results below this confidence fall back to UTF-8.
const CHARSET_MIN_CONFIDENCE: f32 = 0.8;

/// Only the head of a large file feeds the detector.
const CHARSET_SAMPLE_LIMIT: usize = 32 * 1024;

fn detect_charset(contents: &[u8]) -> String {
    let sample = &contents[..contents.len().min(CHARSET_SAMPLE_LIMIT)];
    let (charset, confidence, _) = chardet::detect(sample);
    if charset.is_empty() || confidence < CHARSET_MIN_CONFIDENCE {
        return "UTF-8".to_string();
    }
    charset
}

/// `GET /api/file_contents/{md5}` — fetch the stored source file for an MD5.
pub async fn file_contents(
    State(state): State<AppState>,
    Path(md5): Path<String>,
) -> AppResult<Response> {
    if md5.trim().is_empty() {
        return Err(AppError::bad_request("no md5 request variable submitted"));
    }
    state.counters.inc("file_contents");
    let contents = state.engine.file_contents(md5.trim()).await?;
    let charset = detect_charset(&contents);
    debug!(md5 = %md5, bytes = contents.len(), charset = %charset, "returning file contents");
    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                format!("text/plain; charset={charset}"),
            ),
            (DETECTED_CHARSET_HEADER, charset),
        ],
        contents,
    )
        .into_response())
}

/// `POST /api/sbom/attribution` — produce attribution notices for an
/// uploaded SBOM.
pub async fn sbom_attribution(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut sbom = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("malformed multipart request: {e}")))?
    {
        match field.name() {
            Some("file") | Some("filename") => {
                sbom = Some(field.text().await.map_err(|e| {
                    AppError::bad_request(format!("failed to read SBOM contents: {e}"))
                })?);
            }
            _ => {}
        }
    }
    let sbom = sbom
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("no SBOM file supplied"))?;

    state.counters.inc("attribution");
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
    file.write_all(sbom.as_bytes())
        .await
        .map_err(|e| AppError::internal(format!("failed to write temporary SBOM file: {e}")))?;
    file.flush()
        .await
        .map_err(|e| AppError::internal(format!("failed to write temporary SBOM file: {e}")))?;

    let attribution = state.engine.sbom_attribution(tmp.path()).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        format!("{attribution}\n"),
    )
        .into_response())
}

/// `GET /api/license/obligations/{license}` — obligation details for one
/// license identifier.
pub async fn license_obligations(
    State(state): State<AppState>,
    Path(license): Path<String>,
) -> AppResult<Response> {
    if license.trim().is_empty() {
        return Err(AppError::bad_request("no license request variable submitted"));
    }
    state.counters.inc("license_details");
    let obligations = state.engine.license_obligations(license.trim()).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        format!("{obligations}\n"),
    )
        .into_response())
}

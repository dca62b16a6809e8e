//! Scan configuration resolution.
//!
//! Every request starts from the server's default [`ScanConfig`] and is
//! resolved into a fresh effective configuration by [`resolve`]. The base
//! default is never mutated. Three input layers apply in order: the server
//! default, the optional settings payload (gated by per-field authorization
//! flags) and finally the legacy string parameters, which always win.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ScanError;

/// SBOM scanning mode: bias the engine toward or away from the listed
/// components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbomType {
    Identify,
    Blacklist,
}

impl FromStr for SbomType {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identify" => Ok(SbomType::Identify),
            "blacklist" => Ok(SbomType::Blacklist),
            other => Err(ScanError::validation(format!(
                "invalid SBOM 'type' supplied: {other}"
            ))),
        }
    }
}

impl fmt::Display for SbomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SbomType::Identify => write!(f, "identify"),
            SbomType::Blacklist => write!(f, "blacklist"),
        }
    }
}

/// Effective per-request scan configuration. Immutable once resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub flags: i64,
    pub db_name: String,
    pub sbom_type: Option<SbomType>,
    pub sbom_file_path: Option<PathBuf>,
    pub ranking_enabled: bool,
    pub ranking_threshold: i64,
    pub min_snippet_hits: i64,
    pub min_snippet_lines: i64,
    pub honour_file_exts: bool,
    // Server-side authorization bits; requests cannot change these.
    pub ranking_allowed: bool,
    pub match_config_allowed: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            flags: 0,
            db_name: String::new(),
            sbom_type: None,
            sbom_file_path: None,
            ranking_enabled: false,
            ranking_threshold: 0,
            min_snippet_hits: 0,
            min_snippet_lines: 0,
            honour_file_exts: true,
            ranking_allowed: false,
            match_config_allowed: false,
        }
    }
}

/// The per-request settings payload, usually received base64-encoded in the
/// `scanoss-scan-settings` header. All fields are optional; absent fields
/// leave the base configuration untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanSettings {
    pub ranking_enabled: Option<bool>,
    pub ranking_threshold: Option<i64>,
    pub min_snippet_hits: Option<i64>,
    pub min_snippet_lines: Option<i64>,
    pub honour_file_exts: Option<bool>,
}

impl ScanSettings {
    /// Decode a base64 header value into settings.
    pub fn from_base64(encoded: &str) -> Result<Self, ScanError> {
        let raw = BASE64.decode(encoded.trim()).map_err(|e| {
            ScanError::validation(format!("invalid base64 scan settings: {e}"))
        })?;
        Self::from_json(&raw)
    }

    /// Parse a raw JSON settings blob.
    pub fn from_json(raw: &[u8]) -> Result<Self, ScanError> {
        serde_json::from_slice(raw)
            .map_err(|e| ScanError::validation(format!("invalid scan settings JSON: {e}")))
    }

    fn requests_ranking(&self) -> bool {
        self.ranking_enabled.is_some() || self.ranking_threshold.is_some()
    }

    fn requests_match_config(&self) -> bool {
        self.min_snippet_hits.is_some()
            || self.min_snippet_lines.is_some()
            || self.honour_file_exts.is_some()
    }
}

/// Legacy string parameters. Pre-existing knobs that are not covered by the
/// settings-payload authorization and always apply last.
#[derive(Debug, Clone, Default)]
pub struct LegacyParams {
    pub flags: Option<String>,
    pub sbom_type: Option<SbomType>,
    pub sbom_file: Option<PathBuf>,
    pub db_name: Option<String>,
}

/// Resolve the effective configuration for one request.
///
/// Pure copy-then-override: the returned value is a fresh configuration and
/// `base` is never touched. Ranking fields requested without authorization
/// are dropped with a warning; match-config fields requested without
/// authorization fail the whole resolution. The asymmetry is intentional.
pub fn resolve(
    base: &ScanConfig,
    settings: Option<&ScanSettings>,
    legacy: &LegacyParams,
) -> Result<ScanConfig, ScanError> {
    let mut config = base.clone();

    if let Some(settings) = settings {
        if settings.requests_ranking() && !config.ranking_allowed {
            warn!("scan settings requested ranking but ranking is not allowed, ignoring");
        } else {
            if let Some(enabled) = settings.ranking_enabled {
                config.ranking_enabled = enabled;
                debug!(ranking_enabled = enabled, "updated ranking_enabled");
            }
            if let Some(threshold) = settings.ranking_threshold {
                config.ranking_threshold = threshold;
                debug!(ranking_threshold = threshold, "updated ranking_threshold");
            }
        }

        if settings.requests_match_config() {
            if !config.match_config_allowed {
                return Err(ScanError::validation(
                    "match configuration settings are not allowed on this server",
                ));
            }
            if let Some(hits) = settings.min_snippet_hits {
                config.min_snippet_hits = hits;
                debug!(min_snippet_hits = hits, "updated min_snippet_hits");
            }
            if let Some(lines) = settings.min_snippet_lines {
                config.min_snippet_lines = lines;
                debug!(min_snippet_lines = lines, "updated min_snippet_lines");
            }
            if let Some(honour) = settings.honour_file_exts {
                config.honour_file_exts = honour;
                debug!(honour_file_exts = honour, "updated honour_file_exts");
            }
        }
    }

    // Legacy parameters apply last and win over any default.
    if let Some(db_name) = legacy.db_name.as_deref().filter(|s| !s.is_empty()) {
        config.db_name = db_name.to_string();
        debug!(db_name, "updated db_name");
    }
    if let Some(flags) = legacy.flags.as_deref().filter(|s| !s.is_empty()) {
        match flags.parse::<i64>() {
            Ok(parsed) => {
                config.flags = parsed;
                debug!(flags = parsed, "updated flags");
            }
            Err(e) => warn!(flags, "ignoring malformed flags parameter: {e}"),
        }
    }
    if let Some(sbom_type) = legacy.sbom_type {
        config.sbom_type = Some(sbom_type);
        debug!(%sbom_type, "updated sbom_type");
    }
    if let Some(sbom_file) = legacy.sbom_file.as_ref() {
        config.sbom_file_path = Some(sbom_file.clone());
        debug!(sbom_file = %sbom_file.display(), "updated sbom_file_path");
    }

    Ok(config)
}

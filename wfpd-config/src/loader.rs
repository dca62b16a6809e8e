//! Environment-driven configuration loading.
//!
//! Every knob has a default; env vars override. A value that fails to parse
//! keeps its default and is reported in [`ConfigLoad::warnings`] so the
//! server can log it at startup instead of dying on a typo.

use std::env;
use std::path::PathBuf;

use crate::models::{Config, FilteringConfig};

/// A loaded configuration plus anything worth telling the operator about.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: Vec<String>,
    pub env_file_loaded: bool,
}

/// Load configuration from a `.env` file (if present) and the process
/// environment.
pub fn load() -> anyhow::Result<ConfigLoad> {
    let env_file_loaded = dotenvy::dotenv().is_ok();
    let mut warnings = Vec::new();
    let mut config = Config::default();

    {
        let app = &mut config.app;
        read_string("APP_ADDR", &mut app.addr);
        read_parsed("APP_PORT", &mut app.port, &mut warnings);
        read_bool("APP_DEBUG", &mut app.debug, &mut warnings);
        read_bool("APP_TRACE", &mut app.trace, &mut warnings);
    }

    {
        let scanning = &mut config.scanning;
        read_string("SCAN_BINARY", &mut scanning.binary);
        read_path("SCAN_WFP_TMP", &mut scanning.wfp_dir);
        read_parsed("SCAN_ENGINE_FLAGS", &mut scanning.flags, &mut warnings);
        read_parsed(
            "SCAN_ENGINE_TIMEOUT",
            &mut scanning.scan_timeout_secs,
            &mut warnings,
        );
        read_parsed("SCAN_WFP_GROUPING", &mut scanning.grouping, &mut warnings);
        read_parsed("SCAN_WORKERS", &mut scanning.workers, &mut warnings);
        read_bool("SCAN_TMP_DELETE", &mut scanning.tmp_file_delete, &mut warnings);
        read_bool(
            "SCAN_KEEP_FAILED_WFP",
            &mut scanning.keep_failed_wfps,
            &mut warnings,
        );
        read_string("SCAN_KB_NAME", &mut scanning.kb_name);
        read_bool("SCAN_HPSM_ENABLED", &mut scanning.hpsm_enabled, &mut warnings);
        read_bool(
            "SCAN_RANKING_ALLOWED",
            &mut scanning.ranking_allowed,
            &mut warnings,
        );
        read_bool(
            "SCAN_RANKING_ENABLED",
            &mut scanning.ranking_enabled,
            &mut warnings,
        );
        read_parsed(
            "SCAN_RANKING_THRESHOLD",
            &mut scanning.ranking_threshold,
            &mut warnings,
        );
        read_parsed(
            "SCAN_MIN_SNIPPET_HITS",
            &mut scanning.min_snippet_hits,
            &mut warnings,
        );
        read_parsed(
            "SCAN_MIN_SNIPPET_LINES",
            &mut scanning.min_snippet_lines,
            &mut warnings,
        );
        read_bool(
            "SCAN_HONOUR_FILE_EXTS",
            &mut scanning.honour_file_exts,
            &mut warnings,
        );
        read_bool(
            "SCAN_MATCH_CONFIG_ALLOWED",
            &mut scanning.match_config_allowed,
            &mut warnings,
        );
        read_path("SCAN_SESSION_DIR", &mut scanning.session_dir);

        if scanning.workers == 0 {
            warnings.push("SCAN_WORKERS is 0, using single-worker scanning".to_string());
            scanning.workers = 1;
        }
        if scanning.grouping == 0 {
            warnings.push("SCAN_WFP_GROUPING is 0, using a grouping of 1".to_string());
            scanning.grouping = 1;
        }
    }

    {
        let tls = &mut config.tls;
        read_path("SCAN_TLS_CERT", &mut tls.cert_file);
        read_path("SCAN_TLS_KEY", &mut tls.key_file);
        if tls.cert_file.is_some() != tls.key_file.is_some() {
            warnings.push(
                "only one of SCAN_TLS_CERT/SCAN_TLS_KEY is set, TLS stays disabled".to_string(),
            );
        }
    }

    config.filtering = load_filtering(&mut warnings)?;

    Ok(ConfigLoad {
        config,
        warnings,
        env_file_loaded,
    })
}

fn load_filtering(warnings: &mut Vec<String>) -> anyhow::Result<FilteringConfig> {
    let mut filtering = FilteringConfig::default();
    if let Some(file) = env_value("SCAN_ALLOW_LIST") {
        filtering.allow_list = load_list_file(&file)?;
    }
    if let Some(file) = env_value("SCAN_DENY_LIST") {
        filtering.deny_list = load_list_file(&file)?;
    }
    read_bool(
        "SCAN_BLOCK_BY_DEFAULT",
        &mut filtering.block_by_default,
        warnings,
    );
    read_bool("SCAN_TRUST_PROXY", &mut filtering.trust_proxy, warnings);
    if filtering.block_by_default && filtering.allow_list.is_empty() {
        warnings.push(
            "SCAN_BLOCK_BY_DEFAULT is set without an allow list, all requests will be rejected"
                .to_string(),
        );
    }
    Ok(filtering)
}

/// Read a list file: one entry per line, blank lines and `#` comments
/// skipped.
pub fn load_list_file(filename: &str) -> anyhow::Result<Vec<String>> {
    let contents = std::fs::read_to_string(filename)
        .map_err(|e| anyhow::anyhow!("failed to open list file {filename}: {e}"))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_string(name: &str, target: &mut String) {
    if let Some(value) = env_value(name) {
        *target = value;
    }
}

fn read_path(name: &str, target: &mut Option<PathBuf>) {
    if let Some(value) = env_value(name) {
        *target = Some(PathBuf::from(value));
    }
}

fn read_bool(name: &str, target: &mut bool, warnings: &mut Vec<String>) {
    if let Some(value) = env_value(name) {
        match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => *target = true,
            "false" | "0" | "no" => *target = false,
            other => warnings.push(format!("{name} has non-boolean value {other:?}, ignoring")),
        }
    }
}

fn read_parsed<T: std::str::FromStr>(name: &str, target: &mut T, warnings: &mut Vec<String>)
where
    T::Err: std::fmt::Display,
{
    if let Some(value) = env_value(name) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(e) => warnings.push(format!("{name} has invalid value {value:?}: {e}")),
        }
    }
}

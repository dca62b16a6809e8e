//! Typed configuration model.

use std::path::PathBuf;
use std::time::Duration;

use wfpd_core::ScanConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub scanning: ScanningConfig,
    pub tls: TlsConfig,
    pub filtering: FilteringConfig,
}

impl Config {
    /// The server default scan configuration every request resolves from.
    pub fn base_scan_config(&self) -> ScanConfig {
        ScanConfig {
            flags: self.scanning.flags,
            db_name: self.scanning.kb_name.clone(),
            sbom_type: None,
            sbom_file_path: None,
            ranking_enabled: self.scanning.ranking_enabled,
            ranking_threshold: self.scanning.ranking_threshold,
            min_snippet_hits: self.scanning.min_snippet_hits,
            min_snippet_lines: self.scanning.min_snippet_lines,
            honour_file_exts: self.scanning.honour_file_exts,
            ranking_allowed: self.scanning.ranking_allowed,
            match_config_allowed: self.scanning.match_config_allowed,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            scanning: ScanningConfig::default(),
            tls: TlsConfig::default(),
            filtering: FilteringConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub addr: String,
    pub port: u16,
    pub debug: bool,
    pub trace: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            port: 5443,
            debug: false,
            trace: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanningConfig {
    pub binary: String,
    /// Directory for temporary WFP/SBOM files; system temp dir when unset.
    pub wfp_dir: Option<PathBuf>,
    /// Server-enforced engine flags; override request flags when non-zero.
    pub flags: i64,
    pub scan_timeout_secs: u64,
    /// WFP records per engine invocation when scanning multi-worker.
    pub grouping: usize,
    /// Concurrent engine invocations per scan request.
    pub workers: usize,
    pub tmp_file_delete: bool,
    pub keep_failed_wfps: bool,
    pub kb_name: String,
    pub hpsm_enabled: bool,
    pub ranking_allowed: bool,
    pub ranking_enabled: bool,
    pub ranking_threshold: i64,
    pub min_snippet_hits: i64,
    pub min_snippet_lines: i64,
    pub honour_file_exts: bool,
    pub match_config_allowed: bool,
    /// Directory for batch-session accumulation files; wfp_dir or the
    /// system temp dir when unset.
    pub session_dir: Option<PathBuf>,
}

impl ScanningConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn session_dir(&self) -> PathBuf {
        self.session_dir
            .clone()
            .or_else(|| self.wfp_dir.clone())
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            binary: "scanoss".to_string(),
            wfp_dir: None,
            flags: 0,
            scan_timeout_secs: 120,
            grouping: 3,
            workers: 1,
            tmp_file_delete: true,
            keep_failed_wfps: false,
            kb_name: String::new(),
            hpsm_enabled: true,
            ranking_allowed: false,
            ranking_enabled: false,
            ranking_threshold: 0,
            min_snippet_hits: 0,
            min_snippet_lines: 0,
            honour_file_exts: true,
            match_config_allowed: false,
            session_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

impl TlsConfig {
    pub fn enabled(&self) -> bool {
        self.cert_file.is_some() && self.key_file.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilteringConfig {
    pub allow_list: Vec<String>,
    pub deny_list: Vec<String>,
    pub block_by_default: bool,
    pub trust_proxy: bool,
}

impl FilteringConfig {
    pub fn is_active(&self) -> bool {
        !self.allow_list.is_empty() || !self.deny_list.is_empty() || self.block_by_default
    }
}

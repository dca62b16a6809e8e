//! Subprocess-backed engine client.
//!
//! Each scan writes its batch to a uniquely named temporary WFP file,
//! assembles the engine CLI arguments from the effective [`ScanConfig`] and
//! runs the binary under a timeout. Temporary input files are removed after
//! the invocation unless configured to persist, and failed inputs can be
//! copied aside for post-mortem.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::settings::{SbomType, ScanConfig};

use super::EngineClient;

// Lookups (contents, attribution, license) run under a fixed timeout; the
// health probe gets the shortest one.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(60);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Spawn-and-capture client for the external scan engine binary.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    binary: String,
    wfp_dir: Option<PathBuf>,
    scan_timeout: Duration,
    debug_flag: bool,
    enforced_flags: i64,
    delete_tmp_files: bool,
    keep_failed_wfps: bool,
}

impl ProcessEngine {
    pub fn new(binary: impl Into<String>, scan_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            wfp_dir: None,
            scan_timeout,
            debug_flag: false,
            enforced_flags: 0,
            delete_tmp_files: true,
            keep_failed_wfps: false,
        }
    }

    /// Directory for temporary WFP/SBOM files; defaults to the system temp
    /// directory.
    pub fn with_wfp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.wfp_dir = dir;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug_flag = debug;
        self
    }

    /// Server-enforced scan flags. When non-zero these take precedence over
    /// any request-supplied flags.
    pub fn with_enforced_flags(mut self, flags: i64) -> Self {
        self.enforced_flags = flags;
        self
    }

    pub fn with_tmp_file_delete(mut self, delete: bool) -> Self {
        self.delete_tmp_files = delete;
        self
    }

    pub fn with_keep_failed_wfps(mut self, keep: bool) -> Self {
        self.keep_failed_wfps = keep;
        self
    }

    fn tmp_dir(&self) -> PathBuf {
        self.wfp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Build the engine CLI arguments for a scan of `wfp_file`.
    fn scan_args(&self, config: &ScanConfig, wfp_file: &Path) -> Vec<String> {
        let mut args = Vec::new();
        if self.debug_flag {
            args.push("-d".to_string());
        }
        if !config.db_name.is_empty() {
            args.push(format!("-n{}", config.db_name));
        }
        // Server-enforced flags win over request flags.
        if self.enforced_flags > 0 {
            args.push("-F".to_string());
            args.push(self.enforced_flags.to_string());
        } else if config.flags > 0 {
            args.push("-F".to_string());
            args.push(config.flags.to_string());
        }
        if let Some(sbom_file) = config.sbom_file_path.as_ref() {
            // Invalid types were rejected upstream; default to identify.
            match config.sbom_type.unwrap_or(SbomType::Identify) {
                SbomType::Identify => args.push("-s".to_string()),
                SbomType::Blacklist => args.push("-b".to_string()),
            }
            args.push(sbom_file.display().to_string());
        }
        if config.ranking_enabled {
            args.push(format!("-r{}", config.ranking_threshold));
        }
        if config.min_snippet_hits > 0 {
            args.push(format!("--min-snippet-hits={}", config.min_snippet_hits));
        }
        if config.min_snippet_lines > 0 {
            args.push(format!("--min-snippet-lines={}", config.min_snippet_lines));
        }
        if !config.honour_file_exts {
            args.push("--ignore-file-ext".to_string());
        }
        args.push("-w".to_string());
        args.push(wfp_file.display().to_string());
        args
    }

    fn base_args(&self) -> Vec<String> {
        if self.debug_flag {
            vec!["-d".to_string()]
        } else {
            Vec::new()
        }
    }

    /// Run the engine binary with the given arguments, bounded by `limit`.
    async fn run(&self, args: &[String], limit: Duration) -> Result<Vec<u8>, ScanError> {
        debug!(binary = %self.binary, args = ?args, "executing engine");
        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timeout drops the child mid-flight; make sure the engine
            // process dies with it instead of running on unsupervised.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ScanError::engine(format!("failed to spawn {}: {e}", self.binary)))?;
        let output = timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| {
                ScanError::engine(format!(
                    "{} timed out after {}s",
                    self.binary,
                    limit.as_secs()
                ))
            })?
            .map_err(|e| ScanError::engine(format!("failed to run {}: {e}", self.binary)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(ScanError::engine(format!(
                "{} exited with {}: {} {}",
                self.binary,
                output.status,
                stdout.trim(),
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    /// Write one WFP batch to a uniquely named temp file for engine input.
    async fn stage_wfp(&self, wfp: &str) -> Result<tempfile::NamedTempFile, ScanError> {
        let tmp = tempfile::Builder::new()
            .prefix("finger")
            .suffix(".wfp")
            .tempfile_in(self.tmp_dir())?;
        let mut file = tokio::fs::File::create(tmp.path()).await?;
        file.write_all(wfp.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        debug!(file = %tmp.path().display(), "staged WFP input");
        Ok(tmp)
    }

    /// Copy a failed scan input aside for later review.
    async fn back_up_failed_wfp(&self, wfp_file: &Path) {
        let backup = tempfile::Builder::new()
            .prefix("failed-finger")
            .suffix(".wfp")
            .tempfile_in(self.tmp_dir())
            .and_then(|f| f.keep().map_err(|e| e.error));
        match backup {
            Ok((_, path)) => {
                if let Err(e) = tokio::fs::copy(wfp_file, &path).await {
                    warn!(
                        "failed to back up WFP {} to {}: {e}",
                        wfp_file.display(),
                        path.display()
                    );
                } else {
                    warn!(backup = %path.display(), "backed up failed WFP input");
                }
            }
            Err(e) => warn!("failed to create failed-WFP backup file: {e}"),
        }
    }
}

#[async_trait]
impl EngineClient for ProcessEngine {
    async fn scan_wfp(&self, wfp: &str, config: &ScanConfig) -> Result<String, ScanError> {
        if wfp.trim().is_empty() {
            return Err(ScanError::engine("nothing in the scan request"));
        }
        let tmp = self.stage_wfp(wfp).await?;
        let args = self.scan_args(config, tmp.path());
        let result = self.run(&args, self.scan_timeout).await;
        let outcome = match result {
            Ok(stdout) => Ok(String::from_utf8_lossy(&stdout).into_owned()),
            Err(e) => {
                if self.keep_failed_wfps {
                    self.back_up_failed_wfp(tmp.path()).await;
                }
                Err(e)
            }
        };
        if !self.delete_tmp_files {
            // Persist the input for post-mortem; NamedTempFile would delete
            // it on drop otherwise.
            if let Err(e) = tmp.keep() {
                warn!("failed to persist temporary WFP file: {e}");
            }
        }
        outcome
    }

    async fn file_contents(&self, md5: &str) -> Result<Vec<u8>, ScanError> {
        let mut args = self.base_args();
        args.push("-k".to_string());
        args.push(md5.to_string());
        self.run(&args, LOOKUP_TIMEOUT).await
    }

    async fn sbom_attribution(&self, sbom_file: &Path) -> Result<String, ScanError> {
        let mut args = self.base_args();
        args.push("-a".to_string());
        args.push(sbom_file.display().to_string());
        let stdout = self.run(&args, LOOKUP_TIMEOUT).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn license_obligations(&self, license: &str) -> Result<String, ScanError> {
        let mut args = self.base_args();
        args.push("-l".to_string());
        args.push(license.to_string());
        let stdout = self.run(&args, LOOKUP_TIMEOUT).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn health(&self) -> Result<(), ScanError> {
        let args = vec!["-h".to_string()];
        self.run(&args, HEALTH_TIMEOUT).await.map(|_| ())
    }
}

//! Scan engine clients.
//!
//! Dispatch logic never talks to a subprocess directly; it goes through the
//! [`EngineClient`] capability so the real spawn-and-capture client and the
//! scripted test client are interchangeable.

use std::path::Path;

use async_trait::async_trait;

use crate::error::ScanError;
use crate::settings::ScanConfig;

pub mod process;
pub mod scripted;

pub use process::ProcessEngine;
pub use scripted::ScriptedEngine;

/// Capability boundary around the external scan engine.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Scan one WFP batch under the given effective configuration and
    /// return the engine's raw JSON output.
    async fn scan_wfp(&self, wfp: &str, config: &ScanConfig) -> Result<String, ScanError>;

    /// Retrieve the source contents stored under the given file MD5.
    async fn file_contents(&self, md5: &str) -> Result<Vec<u8>, ScanError>;

    /// Produce attribution notices for the SBOM stored at `sbom_file`.
    async fn sbom_attribution(&self, sbom_file: &Path) -> Result<String, ScanError>;

    /// Look up obligation details for the named license.
    async fn license_obligations(&self, license: &str) -> Result<String, ScanError>;

    /// Probe that the engine binary is present and answers.
    async fn health(&self) -> Result<(), ScanError>;
}

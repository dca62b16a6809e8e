//! Scripted engine client for tests.
//!
//! Mirrors the shell-script engine stand-in used against the real service:
//! it answers each scan from a canned reply function and records every
//! invocation so tests can assert on fan-out behaviour.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ScanError;
use crate::settings::ScanConfig;
use crate::wfp;

use super::EngineClient;

type Reply = dyn Fn(&str) -> Result<String, ScanError> + Send + Sync;

/// One recorded `scan_wfp` invocation.
#[derive(Debug, Clone)]
pub struct ScanCall {
    pub wfp: String,
    pub config: ScanConfig,
}

pub struct ScriptedEngine {
    reply: Box<Reply>,
    calls: Mutex<Vec<ScanCall>>,
}

impl std::fmt::Debug for ScriptedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEngine")
            .field("calls", &self.calls.lock().unwrap().len())
            .finish()
    }
}

impl ScriptedEngine {
    pub fn new(reply: impl Fn(&str) -> Result<String, ScanError> + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(reply),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Engine that answers every batch with one match object per record,
    /// keyed by the record's MD5.
    pub fn matching() -> Self {
        Self::new(|batch| {
            let records = wfp::split_wfp(batch, true)?;
            let fragments: Vec<String> = records
                .iter()
                .map(|r| {
                    let md5 = r.md5().unwrap_or("unknown");
                    format!(r#""{md5}": [{{"id": "none"}}]"#)
                })
                .collect();
            Ok(format!("{{{}}}", fragments.join(",")))
        })
    }

    /// Engine whose every invocation fails.
    pub fn failing() -> Self {
        Self::new(|_| Err(ScanError::engine("scripted failure")))
    }

    /// Engine that fails whenever the batch mentions any of `md5s`,
    /// matching everything else. Used to exercise partial degradation.
    pub fn failing_on(md5s: Vec<String>) -> Self {
        Self::new(move |batch| {
            if md5s.iter().any(|m| batch.contains(m.as_str())) {
                return Err(ScanError::engine("scripted failure"));
            }
            let records = wfp::split_wfp(batch, true)?;
            let fragments: Vec<String> = records
                .iter()
                .map(|r| {
                    let md5 = r.md5().unwrap_or("unknown");
                    format!(r#""{md5}": [{{"id": "none"}}]"#)
                })
                .collect();
            Ok(format!("{{{}}}", fragments.join(",")))
        })
    }

    /// Engine that answers with empty output (trims to nothing).
    pub fn silent() -> Self {
        Self::new(|_| Ok("  \n".to_string()))
    }

    pub fn calls(&self) -> Vec<ScanCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl EngineClient for ScriptedEngine {
    async fn scan_wfp(&self, wfp: &str, config: &ScanConfig) -> Result<String, ScanError> {
        self.calls.lock().unwrap().push(ScanCall {
            wfp: wfp.to_string(),
            config: config.clone(),
        });
        (self.reply)(wfp)
    }

    async fn file_contents(&self, md5: &str) -> Result<Vec<u8>, ScanError> {
        Ok(format!("contents of {md5}\n").into_bytes())
    }

    async fn sbom_attribution(&self, sbom_file: &Path) -> Result<String, ScanError> {
        Ok(format!("attribution for {}\n", sbom_file.display()))
    }

    async fn license_obligations(&self, license: &str) -> Result<String, ScanError> {
        Ok(format!(r#"{{"license": "{license}"}}"#))
    }

    async fn health(&self) -> Result<(), ScanError> {
        Ok(())
    }
}

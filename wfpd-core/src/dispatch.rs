//! Batch fan-out over the engine worker pool.
//!
//! One scan request becomes one engine invocation when a single worker is
//! configured, or a fixed set of batch jobs fanned out across a bounded
//! worker pool otherwise. Fragments come back in completion order; the
//! assembled response makes no ordering promise.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::engine::EngineClient;
use crate::error::ScanError;
use crate::settings::ScanConfig;
use crate::wfp::{self, WfpBatch};

/// Splits scan input into batches and drives them through the engine.
#[derive(Clone)]
pub struct Dispatcher {
    engine: Arc<dyn EngineClient>,
    workers: usize,
    grouping: usize,
    hpsm_enabled: bool,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("workers", &self.workers)
            .field("grouping", &self.grouping)
            .field("hpsm_enabled", &self.hpsm_enabled)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        engine: Arc<dyn EngineClient>,
        workers: usize,
        grouping: usize,
        hpsm_enabled: bool,
    ) -> Self {
        Self {
            engine,
            workers,
            grouping,
            hpsm_enabled,
        }
    }

    /// Scan one WFP blob and assemble the engine fragments into a single
    /// JSON object.
    ///
    /// With one configured worker the whole blob goes to the engine in a
    /// single invocation. With more, the blob is regrouped into batches and
    /// at most `min(workers, batches)` engine invocations run concurrently.
    /// A failed batch degrades the response rather than failing it; only
    /// zero surviving fragments is an error.
    pub async fn scan(&self, contents: &str, config: &ScanConfig) -> Result<String, ScanError> {
        let records = wfp::split_wfp(contents, self.hpsm_enabled)?;
        if self.workers <= 1 {
            return self.scan_single(contents, config).await;
        }
        let batches = wfp::group_records(records, self.grouping);
        self.scan_batches(batches, config).await
    }

    async fn scan_single(&self, contents: &str, config: &ScanConfig) -> Result<String, ScanError> {
        let result = self.engine.scan_wfp(contents.trim(), config).await?;
        let trimmed = result.trim();
        if trimmed.is_empty() {
            return Err(ScanError::engine("scan engine returned an empty response"));
        }
        Ok(trimmed.to_string())
    }

    async fn scan_batches(
        &self,
        batches: Vec<WfpBatch>,
        config: &ScanConfig,
    ) -> Result<String, ScanError> {
        let num_batches = batches.len();
        let num_workers = self.workers.min(num_batches).max(1);
        debug!(num_batches, num_workers, "dispatching scan batches");

        let (job_tx, job_rx) = mpsc::channel::<String>(num_workers);
        let (result_tx, mut result_rx) = mpsc::channel::<String>(num_batches);
        // mpsc receivers are single-consumer; the pool shares one behind a
        // lock so an idle worker picks up the next job.
        let job_rx = Arc::new(Mutex::new(job_rx));

        for worker_id in 0..num_workers {
            let engine = Arc::clone(&self.engine);
            let config = config.clone();
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            tokio::spawn(async move {
                loop {
                    let job = { job_rx.lock().await.recv().await };
                    let Some(wfp) = job else { break };
                    let fragment = match engine.scan_wfp(&wfp, &config).await {
                        Ok(output) => output,
                        Err(e) => {
                            warn!(worker_id, "batch scan failed: {e}");
                            String::new()
                        }
                    };
                    if result_tx.send(fragment).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        for batch in &batches {
            if job_tx.send(batch.to_text()).await.is_err() {
                return Err(ScanError::engine("scan worker pool shut down unexpectedly"));
            }
        }
        drop(job_tx);

        let mut fragments = Vec::with_capacity(num_batches);
        let mut failed = 0usize;
        for _ in 0..num_batches {
            match result_rx.recv().await {
                Some(fragment) => {
                    let body = strip_outer_braces(&fragment);
                    if body.is_empty() {
                        failed += 1;
                    } else {
                        fragments.push(body.to_string());
                    }
                }
                None => {
                    return Err(ScanError::engine("scan worker pool shut down unexpectedly"));
                }
            }
        }

        if fragments.is_empty() {
            return Err(ScanError::engine("no scan results returned by any batch"));
        }
        if failed > 0 {
            warn!(failed, num_batches, "some scan batches returned no results");
        }
        Ok(format!("{{{}}}", fragments.join(",")))
    }
}

/// Trim whitespace and remove one outer `{}` pair if present, yielding the
/// fragment body ready for reassembly.
fn strip_outer_braces(fragment: &str) -> &str {
    let trimmed = fragment.trim();
    trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .map(str::trim)
        .unwrap_or(trimmed)
}

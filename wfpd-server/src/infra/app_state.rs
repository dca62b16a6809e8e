//! Shared server state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use wfpd_config::Config;
use wfpd_core::{Dispatcher, EngineClient, ScanConfig, SessionRegistry};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<dyn EngineClient>,
    pub dispatcher: Dispatcher,
    pub sessions: Arc<SessionRegistry>,
    pub counters: Arc<RequestCounters>,
    /// Server defaults every request's effective configuration resolves from.
    pub base_scan_config: ScanConfig,
}

impl AppState {
    pub fn new(config: Arc<Config>, engine: Arc<dyn EngineClient>) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::clone(&engine),
            config.scanning.workers,
            config.scanning.grouping,
            config.scanning.hpsm_enabled,
        );
        let sessions = Arc::new(SessionRegistry::new(config.scanning.session_dir()));
        let base_scan_config = config.base_scan_config();
        Self {
            config,
            engine,
            dispatcher,
            sessions,
            counters: Arc::new(RequestCounters::default()),
            base_scan_config,
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

/// Per-category request counters exposed through the metrics endpoint.
#[derive(Debug, Default)]
pub struct RequestCounters {
    values: Mutex<BTreeMap<&'static str, u64>>,
}

impl RequestCounters {
    pub fn inc(&self, key: &'static str) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        *values.entry(key).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

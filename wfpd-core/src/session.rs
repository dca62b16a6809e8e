//! Chunked batch-scan sessions.
//!
//! Large WFP uploads arrive as a sequence of chunks under a client-chosen
//! session id. Chunks are appended to one accumulation file per session,
//! serialized by a per-session lock so interleaved chunks from concurrent
//! requests never corrupt each other. Finalization reads the accumulated
//! blob back and always removes the file and the session entry, whether or
//! not the subsequent scan succeeds.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ScanError;

/// Tracks open batch sessions and their accumulation files.
#[derive(Debug)]
pub struct SessionRegistry {
    dir: PathBuf,
    sessions: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionRegistry {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Session ids become file names; reject anything that could escape
    /// the session directory.
    fn validate_id(id: &str) -> Result<(), ScanError> {
        if id.trim().is_empty() {
            return Err(ScanError::validation("no session id supplied"));
        }
        if id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(ScanError::validation(format!(
                "invalid session id: {id}"
            )));
        }
        Ok(())
    }

    fn session_file(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.wfp"))
    }

    async fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        let mut sessions = self.sessions.lock().await;
        Arc::clone(
            sessions
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    async fn append(&self, id: &str, chunk: &str) -> Result<(), ScanError> {
        let path = self.session_file(id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(chunk.as_bytes()).await?;
        // Keep record boundaries intact across chunks.
        if !chunk.ends_with('\n') {
            file.write_all(b"\n").await?;
        }
        file.flush().await?;
        debug!(session = id, bytes = chunk.len(), "appended session chunk");
        Ok(())
    }

    /// Append one intermediate chunk to the session's accumulation file.
    pub async fn append_chunk(&self, id: &str, chunk: &str) -> Result<(), ScanError> {
        Self::validate_id(id)?;
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;
        self.append(id, chunk).await
    }

    /// Append the final chunk, read the accumulated blob back and tear the
    /// session down. The accumulation file and the session entry are gone by
    /// the time this returns, on the error path included.
    pub async fn finalize(&self, id: &str, chunk: &str) -> Result<String, ScanError> {
        Self::validate_id(id)?;
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let result = async {
            self.append(id, chunk).await?;
            Ok(tokio::fs::read_to_string(self.session_file(id)).await?)
        }
        .await;

        self.cleanup(id).await;
        result
    }

    async fn cleanup(&self, id: &str) {
        let path = self.session_file(id);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(session = id, "failed to remove session file {}: {e}", path.display());
            }
        }
        self.sessions.lock().await.remove(id);
        debug!(session = id, "session closed");
    }

    /// Number of sessions with an open accumulation entry.
    pub async fn open_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

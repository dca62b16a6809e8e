use thiserror::Error;

/// Error taxonomy for the scan pipeline.
///
/// `Validation` and `Policy` surface before any engine invocation is
/// attempted; `Engine` covers subprocess failures, timeouts and empty
/// aggregates. Partial batch failure is deliberately *not* an error.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Client-supplied input was unusable (empty WFP, bad SBOM type,
    /// malformed session id or settings payload, disallowed settings field).
    #[error("{0}")]
    Validation(String),

    /// The request asked for a capability the server policy forbids.
    #[error("{0}")]
    Policy(String),

    /// The scan engine failed to produce a usable result.
    #[error("engine scan failed: {0}")]
    Engine(String),

    /// Filesystem failure while staging WFP or session data.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy(msg.into())
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}

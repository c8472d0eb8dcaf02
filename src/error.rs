use std::path::PathBuf;

use thiserror::Error;

/// Failures a single conversion request can surface.
///
/// Configuration and missing-source problems are caller-contract violations
/// and are rejected before a rendering session is acquired. The remaining
/// variants carry the originating engine error for the stage that failed.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid page configuration: {0}")]
    Configuration(String),

    #[error("content source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("rendering session could not be started: {0}")]
    SessionAcquisition(anyhow::Error),

    #[error("content failed to load: {0}")]
    Load(anyhow::Error),

    #[error("page export failed: {0}")]
    Export(anyhow::Error),
}

impl ConvertError {
    /// Pipeline stage the failure originated in.
    pub fn stage(&self) -> &'static str {
        match self {
            ConvertError::Configuration(_) => "configuration",
            ConvertError::SourceNotFound(_) => "source",
            ConvertError::SessionAcquisition(_) => "session",
            ConvertError::Load(_) => "load",
            ConvertError::Export(_) => "export",
        }
    }

    /// True for failures caused by the request itself rather than the
    /// rendering environment.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ConvertError::Configuration(_) | ConvertError::SourceNotFound(_)
        )
    }
}

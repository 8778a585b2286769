//! Error taxonomy for chart generation
//!
//! Every failure mode carries a stable numeric code via
//! [`ChartError::error_code`] so callers can present or route errors
//! without matching on variants.

use std::path::PathBuf;

use chronochart_engine::EngineError;

use crate::collab::CollabError;

/// Errors raised during chart generation orchestration
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    /// A datapack reference failed its authorization check
    #[error("unauthorized datapack access: {0}")]
    Unauthorized(String),

    /// A datapack reference could not be resolved to a directory
    #[error("failed to resolve datapack: {0}")]
    Resolve(#[source] CollabError),

    /// Shared file-metadata bookkeeping could not be refreshed
    #[error("failed to update file metadata: {0}")]
    MetadataUpdate(#[source] CollabError),

    /// Filesystem failure in the generation working directories
    #[error("filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The generation queue is at capacity; not admitted
    #[error("queue is too busy")]
    QueueFull,

    /// The queued task waited or ran past the queue-level timeout
    #[error("queue timed out")]
    QueueTimeout,

    /// The renderer could not be launched or waited on
    #[error("failed to execute renderer command: {0}")]
    RendererFailed(#[source] EngineError),

    /// The renderer ran past its hard timeout and was killed
    #[error("renderer timed out")]
    RendererTimedOut,

    /// The renderer reported a generation failure
    #[error("{message}")]
    Generation { code: u16, message: String },

    /// The output file never became a complete SVG
    #[error("chart output did not finalize: {0}")]
    FinalizeTimeout(#[source] EngineError),

    /// A history entry identifier failed validation
    #[error("invalid history entry {0:?}")]
    InvalidHistoryEntry(String),

    /// The requested history entry does not exist
    #[error("history entry not found: {0}")]
    HistoryEntryNotFound(String),
}

impl ChartError {
    /// Stable numeric code for this error
    ///
    /// Known generation errors carry the classifier's code; everything
    /// else maps to a fixed per-variant code.
    #[must_use]
    pub fn error_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 403,
            Self::Resolve(_) => 500,
            Self::MetadataUpdate(_) => 100,
            Self::Io { .. } => 500,
            Self::QueueFull => 503,
            Self::QueueTimeout => 408,
            Self::RendererFailed(_) => 400,
            Self::RendererTimedOut => 408,
            Self::Generation { code, .. } => *code,
            Self::FinalizeTimeout(_) => 500,
            Self::InvalidHistoryEntry(_) => 400,
            Self::HistoryEntryNotFound(_) => 404,
        }
    }
}

pub(crate) fn io_error(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> ChartError {
    let path = path.into();
    move |source| ChartError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_carries_classifier_code() {
        let err = ChartError::Generation {
            code: 1003,
            message: "Out of Memory!".to_string(),
        };
        assert_eq!(err.error_code(), 1003);
        assert_eq!(err.to_string(), "Out of Memory!");
    }

    #[test]
    fn fixed_codes() {
        assert_eq!(ChartError::QueueFull.error_code(), 503);
        assert_eq!(ChartError::QueueTimeout.error_code(), 408);
        assert_eq!(ChartError::RendererTimedOut.error_code(), 408);
        assert_eq!(
            ChartError::RendererFailed(EngineError::TimedOut).error_code(),
            400
        );
    }
}

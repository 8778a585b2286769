//! Error types for renderer supervision

/// Errors raised while supervising the external renderer
///
/// Spawn failure, renderer timeout, and output finalization timeout are
/// distinct variants so callers can apply different handling to each.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The renderer executable could not be launched
    #[error("failed to spawn renderer process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Waiting on the renderer process failed at the OS level
    #[error("failed waiting on renderer process: {0}")]
    Process(#[source] std::io::Error),

    /// The renderer ran past its hard timeout and was killed
    #[error("renderer process timed out")]
    TimedOut,

    /// The output file never became a complete, parseable document
    #[error("chart output did not finalize in time")]
    FinalizeTimeout,
}

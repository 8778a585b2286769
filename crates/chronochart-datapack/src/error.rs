//! Error types for datapack parsing

/// Errors raised while parsing datapack text
///
/// In lenient mode these are logged and swallowed by the top-level parse;
/// in strict mode they propagate to the caller.
#[derive(Debug, thiserror::Error)]
pub enum DatapackError {
    /// A data line carried an age field that is not a number
    #[error("line {line}: age field {value:?} is not a valid number")]
    InvalidAge {
        /// 1-based line number in the concatenated input
        line: usize,
        /// The offending field text
        value: String,
    },

    /// No columns could be recovered from the input
    #[error("no columns found in datapack text")]
    NoColumns,
}

//! Error types for chat log conversion.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while converting chat exports.
///
/// Unmatched lines and one-sided turns are not errors; they are skipped and
/// show up only in [`ConversionStats`](crate::ConversionStats).
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Reading or writing a file failed.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input bytes are not valid UTF-8.
    #[error("{origin} is not valid UTF-8: {source}")]
    Decode {
        origin: String,
        #[source]
        source: std::str::Utf8Error,
    },

    /// A custom line pattern failed to compile.
    #[error("invalid line pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A custom line pattern is missing a required named capture group.
    #[error("line pattern is missing the named capture group `{0}`")]
    MissingCaptureGroup(&'static str),

    /// Serializing a record failed.
    #[error("failed to serialize record: {0}")]
    Json(#[from] serde_json::Error),

    /// The batch input directory contains no chat exports.
    #[error("no chat exports (*.txt) found under {0:?}")]
    NoChatFiles(PathBuf),
}

//! Core conversion logic for turning exported chat logs into fine-tuning data.
//!
//! A chat export is scanned line by line. Consecutive messages from the same
//! author are merged into one turn, prompt turns are paired with the
//! completion turn that follows them, and every complete pair becomes a
//! [`Record`]. Records can be cleaned of placeholder messages and written as
//! JSON lines.

mod cleaner;
mod error;
mod matcher;
pub mod pipeline;
mod turns;

pub use cleaner::clean;
pub use error::ConvertError;
pub use matcher::{ChatLine, LineFormat, LinePattern};
pub use pipeline::{
    convert_bytes, convert_directory, convert_file, discover_chat_files, write_jsonl,
    BatchResult, BatchSummary, FileResult,
};
pub use turns::{
    convert_text, Conversion, ConversionStats, ConverterConfig, Record, Role, Roles,
    TurnAggregator,
};

/// Appended to every prompt.
pub const PROMPT_END_MARKER: &str = "\n\n###\n\n";

/// Appended to every completion.
pub const COMPLETION_END_MARKER: &str = " ###";

/// Joins consecutive messages from the same author.
pub const MERGE_SEPARATOR: &str = ". ";

/// Placeholder substrings removed by the cleaner by default.
pub const DEFAULT_IGNORE_KEYWORDS: &[&str] = &["omitted", "Missed voice call"];

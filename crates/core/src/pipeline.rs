//! Pipeline for converting chat export files into JSONL records.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cleaner::clean;
use crate::error::ConvertError;
use crate::turns::{convert_text, Conversion, ConverterConfig, Record, Roles};

/// Result of converting a single chat export.
#[derive(Debug)]
pub struct FileResult {
    pub conversion: Conversion,
    pub source_path: PathBuf,
}

/// Result of converting every chat export in a directory.
#[derive(Debug)]
pub struct BatchResult {
    pub files: Vec<FileResult>,
    /// Concatenated records of all files, after cleaning.
    pub records: Vec<Record>,
    pub records_before_cleaning: usize,
}

/// Counts describing a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub lines_matched: usize,
    pub turns_opened: usize,
    pub orphan_completions: usize,
    pub incomplete_turns: usize,
    pub records_before_cleaning: usize,
    pub records_removed: usize,
    pub records: usize,
}

impl BatchResult {
    pub fn summary(&self) -> BatchSummary {
        let stats = self.files.iter().map(|f| &f.conversion.stats);
        BatchSummary {
            total_files: self.files.len(),
            lines_matched: stats.clone().map(|s| s.lines_matched).sum(),
            turns_opened: stats.clone().map(|s| s.turns_opened).sum(),
            orphan_completions: stats.clone().map(|s| s.orphan_completions).sum(),
            incomplete_turns: stats.map(|s| s.incomplete_turns).sum(),
            records_before_cleaning: self.records_before_cleaning,
            records_removed: self.records_before_cleaning - self.records.len(),
            records: self.records.len(),
        }
    }
}

/// Convert raw export bytes, which must be valid UTF-8.
pub fn convert_bytes(
    bytes: &[u8],
    roles: &Roles,
    config: &ConverterConfig,
) -> Result<Conversion, ConvertError> {
    let text = decode(bytes, "input")?;
    Ok(convert_text(text, roles, config))
}

fn decode<'a>(bytes: &'a [u8], origin: &str) -> Result<&'a str, ConvertError> {
    std::str::from_utf8(bytes).map_err(|source| ConvertError::Decode {
        origin: origin.to_string(),
        source,
    })
}

/// Read and convert a single chat export.
pub fn convert_file(
    path: &Path,
    roles: &Roles,
    config: &ConverterConfig,
) -> Result<Conversion, ConvertError> {
    let bytes = std::fs::read(path).map_err(|source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = decode(&bytes, &path.display().to_string())?;
    let conversion = convert_text(text, roles, config);

    if conversion.stats.lines_matched == 0 {
        warn!(path = %path.display(), "no lines matched the configured chat format");
    }
    debug!(
        path = %path.display(),
        lines = conversion.stats.lines_scanned,
        matched = conversion.stats.lines_matched,
        records = conversion.stats.records,
        "converted chat export"
    );

    Ok(conversion)
}

/// Discover all chat exports (`*.txt`) under a directory, sorted by path.
pub fn discover_chat_files(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "txt"))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

/// Convert every chat export under `root`, concatenate the records in
/// discovery order and clean them.
///
/// Files are converted in parallel with rayon. The first failing file aborts
/// the batch. A missing or non-directory `root` is an I/O error.
pub fn convert_directory(
    root: &Path,
    roles: &Roles,
    config: &ConverterConfig,
) -> Result<BatchResult, ConvertError> {
    let metadata = std::fs::metadata(root).map_err(|source| ConvertError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(ConvertError::Io {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
        });
    }

    let chat_files = discover_chat_files(root);

    if chat_files.is_empty() {
        return Err(ConvertError::NoChatFiles(root.to_path_buf()));
    }

    let total_files = chat_files.len();
    let processed_count = AtomicUsize::new(0);

    let files: Vec<FileResult> = chat_files
        .into_par_iter()
        .map(|path| -> Result<FileResult, ConvertError> {
            let conversion = convert_file(&path, roles, config)?;
            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            info!(
                "Preprocessed conversation {}/{}: {}",
                count,
                total_files,
                path.file_stem().unwrap_or_default().to_string_lossy()
            );
            Ok(FileResult {
                conversion,
                source_path: path,
            })
        })
        .collect::<Result<Vec<_>, ConvertError>>()?;

    let combined: Vec<Record> = files
        .iter()
        .flat_map(|f| f.conversion.records.iter().cloned())
        .collect();
    let records_before_cleaning = combined.len();
    let records = clean(combined, &config.ignore_keywords);

    Ok(BatchResult {
        files,
        records,
        records_before_cleaning,
    })
}

/// Write records as JSON lines, creating parent directories as needed.
///
/// Non-ASCII text is written literally. Returns the number of lines written.
pub fn write_jsonl(records: &[Record], path: &Path) -> Result<usize, ConvertError> {
    let io_error = |source: std::io::Error| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    let mut out = BufWriter::new(File::create(path).map_err(io_error)?);
    for record in records {
        let json_line = serde_json::to_string(record)?;
        writeln!(out, "{}", json_line).map_err(io_error)?;
    }
    out.flush().map_err(io_error)?;

    Ok(records.len())
}

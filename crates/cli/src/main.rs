//! CLI tool for converting exported chat logs into JSONL fine-tuning data.
//!
//! `convert` turns one chat export into prompt/completion pairs for a named
//! prompter and responder. `batch` converts every export in a directory,
//! treating everyone except the responder as a prompter, and cleans the
//! combined records of media placeholders.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use chatlog_sft_core::{
    clean, convert_directory, convert_file, write_jsonl, ConvertError, ConverterConfig,
    LineFormat, LinePattern, Roles,
};

/// Convert exported chat logs into prompt/completion JSONL.
#[derive(Parser, Debug)]
#[command(name = "chatlog-sft")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log filter, e.g. "debug" or "chatlog_sft_core=trace" (defaults to RUST_LOG, then "info")
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one chat export with an explicit prompter and responder
    Convert {
        /// Path to the chat export
        path: PathBuf,

        /// Name of the prompter
        prompter: String,

        /// Name of the responder
        responder: String,

        /// Destination name; output is written to output_<FILENAME>.jsonl (defaults to a timestamp)
        #[arg(long)]
        filename: Option<String>,

        /// Directory the output file is written to
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Drop records containing ignore keywords
        #[arg(long)]
        clean: bool,

        /// Keyword marking a record for removal (repeatable; defaults to placeholders)
        #[arg(long = "ignore")]
        ignore: Vec<String>,

        #[command(flatten)]
        format: FormatArgs,
    },

    /// Convert every chat export in a directory for a single responder
    Batch {
        /// Directory containing chat exports (*.txt)
        #[arg(long, default_value = "chats")]
        input_dir: PathBuf,

        /// Directory for output.jsonl and metadata.json
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,

        /// Name of the responder; every other author is a prompter
        #[arg(long)]
        responder: String,

        /// Keyword marking a record for removal (repeatable; defaults to placeholders)
        #[arg(long = "ignore")]
        ignore: Vec<String>,

        #[command(flatten)]
        format: FormatArgs,
    },
}

#[derive(Args, Debug)]
struct FormatArgs {
    /// Chat export line format
    #[arg(long, value_enum, default_value_t = FormatArg::Auto)]
    format: FormatArg,

    /// Custom line regex with named `author` and `message` groups (overrides --format)
    #[arg(long)]
    pattern: Option<String>,

    /// Parse the first line instead of treating it as a header
    #[arg(long)]
    no_skip_header: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Auto,
    Dash,
    Bracketed,
}

impl From<FormatArg> for LineFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Auto => LineFormat::Auto,
            FormatArg::Dash => LineFormat::Dash,
            FormatArg::Bracketed => LineFormat::Bracketed,
        }
    }
}

fn build_config(format: &FormatArgs, ignore: Vec<String>) -> Result<ConverterConfig, ConvertError> {
    let line_format = match &format.pattern {
        Some(pattern) => {
            let pattern = LinePattern::new(pattern)?;
            debug!(pattern = pattern.as_str(), "using custom line pattern");
            LineFormat::Custom(pattern)
        }
        None => format.format.into(),
    };

    let mut config = ConverterConfig {
        format: line_format,
        skip_header: !format.no_skip_header,
        ..Default::default()
    };
    if !ignore.is_empty() {
        config.ignore_keywords = ignore;
    }
    Ok(config)
}

fn init_logging(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_output_name() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

fn run_convert(
    path: &Path,
    prompter: String,
    responder: String,
    filename: Option<String>,
    output_dir: &Path,
    clean_records: bool,
    config: &ConverterConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let roles = Roles::explicit(prompter, responder);

    info!("Converting {:?}...", path);
    let conversion = convert_file(path, &roles, config)?;
    let stats = conversion.stats;

    let records = if clean_records {
        clean(conversion.records, &config.ignore_keywords)
    } else {
        conversion.records
    };

    let name = filename.unwrap_or_else(default_output_name);
    let output_path = output_dir.join(format!("output_{}.jsonl", name));
    let written = write_jsonl(&records, &output_path)?;

    println!("\n[summary]");
    println!("  Lines scanned: {}", stats.lines_scanned);
    println!("  Lines matched: {}", stats.lines_matched);
    println!("  Prompt turns: {}", stats.turns_opened);
    println!("  Incomplete turns dropped: {}", stats.incomplete_turns);
    println!("  Orphan completions dropped: {}", stats.orphan_completions);
    if clean_records {
        println!("  Removed by cleaner: {}", stats.records - written);
    }
    println!("  Records written: {}", written);
    println!("  Output: {:?}", output_path);

    Ok(())
}

fn run_batch(
    input_dir: &Path,
    output_dir: &Path,
    responder: String,
    config: &ConverterConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let roles = Roles::responder(responder.as_str());

    info!("Processing chat exports from {:?}...", input_dir);
    let result = convert_directory(input_dir, &roles, config)?;
    let summary = result.summary();

    let output_path = output_dir.join("output.jsonl");
    info!("Writing output to {:?}...", output_path);
    write_jsonl(&result.records, &output_path)?;

    let sources: Vec<serde_json::Value> = result
        .files
        .iter()
        .map(|f| {
            serde_json::json!({
                "path": f.source_path.to_string_lossy(),
                "stats": f.conversion.stats,
            })
        })
        .collect();

    let custom_pattern = match &config.format {
        LineFormat::Custom(pattern) => Some(pattern.as_str()),
        _ => None,
    };

    let metadata_path = output_dir.join("metadata.json");
    let metadata = serde_json::json!({
        "config": {
            "input_dir": input_dir.to_string_lossy(),
            "output_dir": output_dir.to_string_lossy(),
            "responder": responder,
            "pattern": custom_pattern,
            "skip_header": config.skip_header,
            "ignore_keywords": config.ignore_keywords,
        },
        "counts": summary,
        "sources": sources,
    });
    std::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;

    println!("\n[summary]");
    println!("  Chat exports processed: {}", summary.total_files);
    println!("  Lines matched: {}", summary.lines_matched);
    println!("  Prompt turns: {}", summary.turns_opened);
    println!("  Records before cleaning: {}", summary.records_before_cleaning);
    println!("  Removed by cleaner: {}", summary.records_removed);
    println!("  Records written: {}", summary.records);
    println!("  Output: {:?}", output_path);
    println!("  Metadata: {:?}", metadata_path);

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Command::Convert {
            path,
            prompter,
            responder,
            filename,
            output_dir,
            clean: clean_records,
            ignore,
            format,
        } => {
            let config = build_config(&format, ignore)?;
            run_convert(
                &path,
                prompter,
                responder,
                filename,
                &output_dir,
                clean_records,
                &config,
            )
        }
        Command::Batch {
            input_dir,
            output_dir,
            responder,
            ignore,
            format,
        } => {
            let config = build_config(&format, ignore)?;
            run_batch(&input_dir, &output_dir, responder, &config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from([
            "chatlog-sft",
            "convert",
            "chat.txt",
            "Alice",
            "Bob",
            "--filename",
            "run1",
            "--format",
            "dash",
        ])
        .unwrap();
        match cli.command {
            Command::Convert {
                path,
                prompter,
                responder,
                filename,
                format,
                clean,
                ..
            } => {
                assert_eq!(path, PathBuf::from("chat.txt"));
                assert_eq!(prompter, "Alice");
                assert_eq!(responder, "Bob");
                assert_eq!(filename.as_deref(), Some("run1"));
                assert_eq!(format.format, FormatArg::Dash);
                assert!(!clean);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_build_config_defaults_and_overrides() {
        let format = FormatArgs {
            format: FormatArg::Bracketed,
            pattern: None,
            no_skip_header: true,
        };
        let config = build_config(&format, Vec::new()).unwrap();
        assert!(!config.skip_header);
        assert!(matches!(config.format, LineFormat::Bracketed));
        assert_eq!(config.ignore_keywords, vec!["omitted", "Missed voice call"]);

        let format = FormatArgs {
            format: FormatArg::Auto,
            pattern: Some(r"(?P<author>\w+)> (?P<message>.*)".to_string()),
            no_skip_header: false,
        };
        let config = build_config(&format, vec!["sticker".to_string()]).unwrap();
        assert!(matches!(config.format, LineFormat::Custom(_)));
        assert_eq!(config.ignore_keywords, vec!["sticker"]);
    }
}

//! Turn aggregation: groups consecutive same-author messages into turns and
//! pairs prompt turns with completion turns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::matcher::LineFormat;
use crate::{COMPLETION_END_MARKER, DEFAULT_IGNORE_KEYWORDS, MERGE_SEPARATOR, PROMPT_END_MARKER};

/// Configuration for the converter.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub format: LineFormat,
    /// Skip the first line of every document (the export header).
    pub skip_header: bool,
    /// Joins consecutive messages of one turn.
    pub merge_separator: String,
    pub prompt_marker: String,
    pub completion_marker: String,
    /// Records containing any of these substrings are removed by [`clean`](crate::clean).
    pub ignore_keywords: Vec<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            format: LineFormat::default(),
            skip_header: true,
            merge_separator: MERGE_SEPARATOR.to_string(),
            prompt_marker: PROMPT_END_MARKER.to_string(),
            completion_marker: COMPLETION_END_MARKER.to_string(),
            ignore_keywords: DEFAULT_IGNORE_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

/// The role an author's turns play in the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Prompt,
    Completion,
}

/// Maps chat authors onto roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Roles {
    /// One named prompter and one named responder; everyone else is ignored.
    Explicit { prompter: String, responder: String },
    /// One named responder; every other author is a prompter.
    Responder(String),
}

impl Roles {
    pub fn explicit(prompter: impl Into<String>, responder: impl Into<String>) -> Self {
        Roles::Explicit {
            prompter: prompter.into(),
            responder: responder.into(),
        }
    }

    pub fn responder(responder: impl Into<String>) -> Self {
        Roles::Responder(responder.into())
    }

    pub fn classify(&self, author: &str) -> Option<Role> {
        match self {
            Roles::Explicit {
                prompter,
                responder,
            } => {
                if author == prompter {
                    Some(Role::Prompt)
                } else if author == responder {
                    Some(Role::Completion)
                } else {
                    None
                }
            }
            Roles::Responder(responder) => {
                if author == responder {
                    Some(Role::Completion)
                } else {
                    Some(Role::Prompt)
                }
            }
        }
    }
}

/// A prompt/completion pair, serialized as one JSONL line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub prompt: String,
    pub completion: String,
}

impl Record {
    pub fn contains_any<S: AsRef<str>>(&self, keywords: &[S]) -> bool {
        keywords.iter().any(|keyword| {
            let keyword: &str = keyword.as_ref();
            !keyword.is_empty()
                && (self.prompt.contains(keyword) || self.completion.contains(keyword))
        })
    }
}

/// Counters collected while converting one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub lines_scanned: usize,
    pub lines_matched: usize,
    pub turns_opened: usize,
    /// Completion messages seen before any prompt turn was opened.
    pub orphan_completions: usize,
    /// Turns dropped because one side was never populated.
    pub incomplete_turns: usize,
    pub records: usize,
}

/// Records produced from one document.
#[derive(Debug, Clone, Default)]
pub struct Conversion {
    pub records: Vec<Record>,
    pub stats: ConversionStats,
}

// Message parts are joined only when the record is emitted.
#[derive(Debug, Default)]
struct PendingTurn {
    prompt: Option<Vec<String>>,
    completion: Option<Vec<String>>,
}

/// Single-pass state machine over matched chat lines.
pub struct TurnAggregator<'a> {
    roles: &'a Roles,
    config: &'a ConverterConfig,
    turns: BTreeMap<usize, PendingTurn>,
    turn_count: usize,
    previous_author: Option<String>,
    stats: ConversionStats,
}

impl<'a> TurnAggregator<'a> {
    pub fn new(roles: &'a Roles, config: &'a ConverterConfig) -> Self {
        Self {
            roles,
            config,
            turns: BTreeMap::new(),
            turn_count: 0,
            previous_author: None,
            stats: ConversionStats::default(),
        }
    }

    /// Match one raw line and feed it to the aggregator. Unmatched lines are ignored.
    pub fn handle_line(&mut self, line: &str) {
        self.stats.lines_scanned += 1;
        let Some(chat_line) = self.config.format.match_line(line) else {
            return;
        };
        self.stats.lines_matched += 1;
        self.push_message(chat_line.author, chat_line.message);
    }

    /// Add one message from `author`.
    pub fn push_message(&mut self, author: &str, message: String) {
        let continues_run = self.previous_author.as_deref() == Some(author);

        match self.roles.classify(author) {
            Some(Role::Prompt) => {
                if continues_run {
                    if let Some(parts) = self.current_turn_mut().and_then(|t| t.prompt.as_mut()) {
                        parts.push(message);
                    }
                } else {
                    self.turn_count += 1;
                    self.stats.turns_opened += 1;
                    self.turns.insert(
                        self.turn_count,
                        PendingTurn {
                            prompt: Some(vec![message]),
                            completion: None,
                        },
                    );
                }
            }
            Some(Role::Completion) => {
                if self.turn_count == 0 {
                    // Nothing to pair with yet.
                    self.stats.orphan_completions += 1;
                    debug!(author, "dropping completion that precedes every prompt turn");
                } else if continues_run {
                    if let Some(parts) = self
                        .current_turn_mut()
                        .and_then(|t| t.completion.as_mut())
                    {
                        parts.push(message);
                    }
                } else {
                    // Replaces a completion already attached to this turn.
                    self.turns.entry(self.turn_count).or_default().completion =
                        Some(vec![message]);
                }
            }
            None => trace!(author, "author matches neither role"),
        }

        if !continues_run {
            self.previous_author = Some(author.to_string());
        }
    }

    fn current_turn_mut(&mut self) -> Option<&mut PendingTurn> {
        self.turns.get_mut(&self.turn_count)
    }

    /// Emit complete turns in index order.
    pub fn finish(self) -> Conversion {
        let Self {
            config,
            turns,
            mut stats,
            ..
        } = self;

        let mut records = Vec::with_capacity(turns.len());
        for (index, turn) in turns {
            match (turn.prompt, turn.completion) {
                (Some(prompt), Some(completion)) => records.push(Record {
                    prompt: finalize(&prompt, &config.merge_separator, &config.prompt_marker),
                    completion: finalize(
                        &completion,
                        &config.merge_separator,
                        &config.completion_marker,
                    ),
                }),
                _ => {
                    stats.incomplete_turns += 1;
                    trace!(index, "dropping turn with a missing side");
                }
            }
        }
        stats.records = records.len();

        Conversion { records, stats }
    }
}

fn finalize(parts: &[String], separator: &str, marker: &str) -> String {
    let mut text = parts.join(separator);
    text.push_str(marker);
    text
}

/// Convert a whole chat export into records.
pub fn convert_text(text: &str, roles: &Roles, config: &ConverterConfig) -> Conversion {
    let mut aggregator = TurnAggregator::new(roles, config);
    for line in text.lines().skip(usize::from(config.skip_header)) {
        aggregator.handle_line(line);
    }
    aggregator.finish()
}

//! Line matching for exported chat logs.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::ConvertError;

// `12/31/22, 21:15 - Alice: message`, optionally with seconds or an AM/PM suffix.
// Both patterns are anchored so a timestamp inside a line never yields an author.
static DASH_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"^\x{200E}?\d{1,2}/\d{1,2}/\d{2,4}, \d{1,2}:\d{2}(?::\d{2})?",
            r"(?:[\s\x{202F}]?[AaPp]\.?[Mm]\.?)?\s?-? (?P<author>.*?):\s?(?P<message>.*)",
        ),
    )
    .unwrap()
});

// `[1/2/23, 10:00:00 AM] Alice: message`
static BRACKETED_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"^\x{200E}?\[\d{1,2}/\d{1,2}/\d{2,4},? \d{1,2}:\d{2}(?::\d{2})?",
            r"(?:[\s\x{202F}][AaPp][Mm])?\] (?P<author>.*?): (?P<message>.*)",
        ),
    )
    .unwrap()
});

/// One matched chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine<'a> {
    pub author: &'a str,
    /// Message text with every `"` removed.
    pub message: String,
}

/// A user-supplied line pattern.
///
/// The regex must define the named groups `author` and `message`.
#[derive(Debug, Clone)]
pub struct LinePattern {
    regex: Regex,
}

impl LinePattern {
    pub fn new(pattern: &str) -> Result<Self, ConvertError> {
        let regex = Regex::new(pattern)?;
        for group in ["author", "message"] {
            if !regex.capture_names().flatten().any(|name| name == group) {
                return Err(ConvertError::MissingCaptureGroup(group));
            }
        }
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Which export line format to accept.
#[derive(Debug, Clone, Default)]
pub enum LineFormat {
    /// Try the bracketed format first, then the dash format.
    #[default]
    Auto,
    /// `<date>, <time> - <author>: <message>`
    Dash,
    /// `[<date>, <time AM/PM>] <author>: <message>`
    Bracketed,
    Custom(LinePattern),
}

impl LineFormat {
    /// Extract `(author, message)` from a line, or `None` when it does not match.
    ///
    /// Continuation lines, system messages and blank lines are expected to
    /// return `None`.
    pub fn match_line<'a>(&self, line: &'a str) -> Option<ChatLine<'a>> {
        match self {
            LineFormat::Auto => {
                extract(&BRACKETED_LINE_RE, line).or_else(|| extract(&DASH_LINE_RE, line))
            }
            LineFormat::Dash => extract(&DASH_LINE_RE, line),
            LineFormat::Bracketed => extract(&BRACKETED_LINE_RE, line),
            LineFormat::Custom(pattern) => extract(&pattern.regex, line),
        }
    }
}

fn extract<'a>(re: &Regex, line: &'a str) -> Option<ChatLine<'a>> {
    let caps = re.captures(line)?;
    let author = caps.name("author")?.as_str();
    let message = caps.name("message")?.as_str().replace('"', "");
    Some(ChatLine { author, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracketed_line() {
        let line = "[1/2/23, 10:00:00 AM] Alice: Hello";
        let matched = LineFormat::Bracketed.match_line(line).unwrap();
        assert_eq!(matched.author, "Alice");
        assert_eq!(matched.message, "Hello");
    }

    #[test]
    fn test_bracketed_line_with_narrow_nbsp() {
        let line = "[12/31/2023, 9:41:07\u{202F}PM] Bob Smith: see you";
        let matched = LineFormat::Bracketed.match_line(line).unwrap();
        assert_eq!(matched.author, "Bob Smith");
        assert_eq!(matched.message, "see you");
    }

    #[test]
    fn test_dash_line() {
        let matched = LineFormat::Dash
            .match_line("12/31/22, 21:15 - Alice: Happy new year")
            .unwrap();
        assert_eq!(matched.author, "Alice");
        assert_eq!(matched.message, "Happy new year");

        let matched = LineFormat::Dash
            .match_line("1/5/2021, 9:03:44 - Carol: ok")
            .unwrap();
        assert_eq!(matched.author, "Carol");
        assert_eq!(matched.message, "ok");
    }

    #[test]
    fn test_author_stops_at_first_colon() {
        let matched = LineFormat::Auto
            .match_line("[1/2/23, 10:00:00 AM] Alice: note: bring snacks")
            .unwrap();
        assert_eq!(matched.author, "Alice");
        assert_eq!(matched.message, "note: bring snacks");
    }

    #[test]
    fn test_quotes_removed() {
        let matched = LineFormat::Auto
            .match_line(r#"[1/2/23, 10:00:00 AM] Alice: she said "hi" twice"#)
            .unwrap();
        assert_eq!(matched.message, "she said hi twice");
    }

    #[test]
    fn test_non_matching_lines() {
        for line in [
            "",
            "continuation of a previous message",
            "Messages and calls are end-to-end encrypted.",
            "[not a date] Alice: hi",
        ] {
            assert!(LineFormat::Auto.match_line(line).is_none(), "{line:?}");
        }
    }

    #[test]
    fn test_auto_accepts_both_formats() {
        assert!(LineFormat::Auto
            .match_line("[1/2/23, 10:00:00 AM] Alice: Hello")
            .is_some());
        assert!(LineFormat::Auto
            .match_line("1/2/23, 10:00 - Alice: Hello")
            .is_some());
        assert!(LineFormat::Bracketed
            .match_line("1/2/23, 10:00 - Alice: Hello")
            .is_none());
    }

    #[test]
    fn test_auto_rejects_malformed_bracketed_lines() {
        for line in [
            "[1/2/23, 10:00:02 AM] Alice:",
            "[1/2/23, 10:00:02 AM] Bob:ok",
            "quoting 1/2/23, 10:00 - Alice: hi",
        ] {
            assert!(LineFormat::Auto.match_line(line).is_none(), "{line:?}");
        }
    }

    #[test]
    fn test_left_to_right_mark_prefix() {
        let matched = LineFormat::Auto
            .match_line("\u{200E}[1/2/23, 10:00:00 AM] Alice: hi")
            .unwrap();
        assert_eq!(matched.author, "Alice");
        assert_eq!(matched.message, "hi");
    }

    #[test]
    fn test_custom_pattern() {
        let pattern = LinePattern::new(r"^<(?P<author>[^>]+)> (?P<message>.*)$").unwrap();
        let format = LineFormat::Custom(pattern);
        let matched = format.match_line("<dave> hello there").unwrap();
        assert_eq!(matched.author, "dave");
        assert_eq!(matched.message, "hello there");
    }

    #[test]
    fn test_custom_pattern_requires_groups() {
        let err = LinePattern::new(r"^(?P<author>\w+): (.*)$").unwrap_err();
        assert!(matches!(err, ConvertError::MissingCaptureGroup("message")));

        let err = LinePattern::new(r"(unclosed").unwrap_err();
        assert!(matches!(err, ConvertError::InvalidPattern(_)));
    }
}

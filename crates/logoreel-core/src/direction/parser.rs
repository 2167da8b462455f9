//! Parses a model reply into a question plus lettered options.
//!
//! The grammar the clarification prompts ask for:
//!
//! ```text
//! What feeling should the animation leave viewers with?
//!
//! OPTIONS:
//! A. Calm and premium
//! B. Energetic and bold
//! C. Something else (describe it)
//! ```
//!
//! Parsing never fails: malformed input degrades to "everything is the
//! question".

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Token that introduces the option block. Must start a line.
pub const OPTIONS_MARKER: &str = "OPTIONS:";

/// Letters accepted as option labels. A sixth option (`F.`) is dropped.
pub const OPTION_LETTERS: RangeInclusive<char> = 'A'..='E';

/// Labels containing any of these (case-insensitive) invite free text.
pub const FREE_TEXT_PHRASES: &[&str] = &["other", "something else", "describe", "your own", "custom"];

static MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?m)^[ \t]*{}", regex::escape(OPTIONS_MARKER)))
        .expect("marker pattern is a valid regex")
});

static OPTION_LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^([{}-{}])\.\s+(.+)$",
        OPTION_LETTERS.start(),
        OPTION_LETTERS.end()
    ))
    .expect("option line pattern is a valid regex")
});

/// A lettered choice offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub letter: char,
    pub label: String,
    /// `true` when picking this option means the user types their own answer.
    pub free_text: bool,
}

impl ChoiceOption {
    pub fn new(letter: char, label: impl Into<String>) -> Self {
        let label = label.into();
        let free_text = is_free_text(&label);
        Self { letter, label, free_text }
    }
}

/// Structured view of one assistant reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub question: String,
    /// `None` when the reply had no option block at all.
    pub options: Option<Vec<ChoiceOption>>,
}

/// Split `raw` into the question and its options.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let Some(marker) = MARKER_PATTERN.find(raw) else {
        return ParsedResponse {
            question: raw.trim().to_owned(),
            options: None,
        };
    };

    let question = raw[..marker.start()].trim().to_owned();
    let options = raw[marker.end()..]
        .lines()
        .filter_map(|line| {
            let caps = OPTION_LINE_PATTERN.captures(line.trim())?;
            let letter = caps.get(1)?.as_str().chars().next()?;
            let label = caps.get(2)?.as_str().trim();
            Some(ChoiceOption::new(letter, label))
        })
        .collect();

    ParsedResponse {
        question,
        options: Some(options),
    }
}

/// Whether an option label is the "let me answer in my own words" escape hatch.
pub fn is_free_text(label: &str) -> bool {
    let lowered = label.to_lowercase();
    FREE_TEXT_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

//! `/poll "Question?" "Option 1" "Option 2"` argument parsing

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

pub const MIN_POLL_OPTIONS: usize = 2;
pub const MAX_POLL_OPTIONS: usize = 4;

/// Reply sent when the arguments cannot be parsed
pub const POLL_USAGE: &str = "❌ Usage: /poll \"Question?\" \"Option 1\" \"Option 2\"";

static QUOTED_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]*)""#).expect("Invalid quoted segment regex"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PollError {
    /// Question missing, or option count outside 2..=4
    #[error("expected a question and {MIN_POLL_OPTIONS}-{MAX_POLL_OPTIONS} options, got {options} option(s)")]
    InvalidArgumentCount { options: usize },

    #[error("unbalanced double quotes in poll arguments")]
    MalformedQuoting,
}

/// Validated poll creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollSpec {
    pub question: String,
    pub options: Vec<String>,
    pub count: usize,
}

impl PollSpec {
    /// Trims every part and drops blank options before checking the count
    pub fn new<I, S>(question: &str, options: I) -> Result<Self, PollError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let question = question.trim();
        let options: Vec<String> = options
            .into_iter()
            .map(|o| o.as_ref().trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        if question.is_empty() {
            return Err(PollError::InvalidArgumentCount { options: 0 });
        }
        if !(MIN_POLL_OPTIONS..=MAX_POLL_OPTIONS).contains(&options.len()) {
            return Err(PollError::InvalidArgumentCount {
                options: options.len(),
            });
        }

        Ok(Self {
            question: question.to_string(),
            count: options.len(),
            options,
        })
    }
}

/// Parse the text following `/poll`
///
/// Every double-quoted segment is an argument, in order; the first one is the
/// question. Blank segments are ignored. Text outside quotes is ignored.
pub fn parse_poll(raw_args: &str) -> Result<PollSpec, PollError> {
    if raw_args.matches('"').count() % 2 != 0 {
        return Err(PollError::MalformedQuoting);
    }

    let mut segments = QUOTED_SEGMENT
        .captures_iter(raw_args)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty());

    let Some(question) = segments.next() else {
        return Err(PollError::InvalidArgumentCount { options: 0 });
    };
    PollSpec::new(question, segments)
}

use std::borrow::Cow;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a search term is turned into a matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightMode {
    /// The term is used verbatim as a regex fragment, so `.` or `(` keep their
    /// regex meaning. Falls back to literal matching if the term does not compile.
    #[default]
    Pattern,
    /// Regex metacharacters in the term are escaped.
    Literal,
}

impl HighlightMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HighlightMode::Pattern => "pattern",
            HighlightMode::Literal => "literal",
        }
    }
}

/// A contiguous piece of highlighted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub matched: bool,
}

/// Case-insensitive matcher for one search term.
#[derive(Debug, Clone)]
pub struct Highlighter {
    regex: Option<Regex>,
}

impl Highlighter {
    #[must_use]
    pub fn new(term: &str, mode: HighlightMode) -> Self {
        if term.is_empty() {
            return Self { regex: None };
        }

        let source: Cow<'_, str> = match mode {
            HighlightMode::Pattern => Cow::Borrowed(term),
            HighlightMode::Literal => Cow::Owned(regex::escape(term)),
        };
        let regex = build(&source).or_else(|| {
            debug!(term, "search term is not a valid pattern; matching literally");
            build(&regex::escape(term))
        });
        Self { regex }
    }

    /// Whether any non-empty match exists in `text`.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex
            .as_ref()
            .is_some_and(|regex| regex.find_iter(text).any(|found| !found.is_empty()))
    }

    /// Split `text` into alternating unmatched and matched segments.
    ///
    /// Concatenating the segments always reproduces `text`. Empty segments are
    /// never produced, except a single unmatched segment for empty input.
    #[must_use]
    pub fn split<'a>(&self, text: &'a str) -> Vec<Segment<'a>> {
        let Some(regex) = &self.regex else {
            return vec![Segment {
                text,
                matched: false,
            }];
        };

        let mut segments = Vec::new();
        let mut cursor = 0;
        for found in regex.find_iter(text) {
            if found.is_empty() {
                continue;
            }
            if found.start() > cursor {
                segments.push(Segment {
                    text: &text[cursor..found.start()],
                    matched: false,
                });
            }
            segments.push(Segment {
                text: found.as_str(),
                matched: true,
            });
            cursor = found.end();
        }
        if cursor < text.len() || segments.is_empty() {
            segments.push(Segment {
                text: &text[cursor..],
                matched: false,
            });
        }
        segments
    }
}

fn build(source: &str) -> Option<Regex> {
    RegexBuilder::new(source).case_insensitive(true).build().ok()
}

/// Convenience wrapper for one-off splits.
#[must_use]
pub fn split<'a>(text: &'a str, term: &str, mode: HighlightMode) -> Vec<Segment<'a>> {
    Highlighter::new(term, mode).split(text)
}

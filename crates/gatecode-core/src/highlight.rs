//! Lexical highlighting for the editor overlay.
//!
//! [`highlight`] maps source text and a language id to classified spans, one
//! list per line. It is pure and total: partial or malformed code only ever
//! produces a less precise classification.
//!
//! Each line is processed in four steps:
//!
//! 1. The first comment marker outside a string literal splits the line into a
//!    scanned head and a trailing comment.
//! 2. The head is scanned independently for strings, numbers and keywords.
//! 3. Candidates are sorted by start offset and priority
//!    (string > number > keyword); a candidate starting inside an accepted
//!    span is dropped.
//! 4. Gaps are filled with plain spans and the comment is appended last.
//!
//! # Example
//!
//! ```
//! use gatecode_core::highlight::{highlight, TokenClass};
//!
//! let lines = highlight("x = \"for y in z\"  # note", "python");
//! let classes: Vec<TokenClass> = lines[0].iter().map(|s| s.class).collect();
//! assert_eq!(
//!     classes,
//!     vec![TokenClass::Plain, TokenClass::String, TokenClass::Plain, TokenClass::Comment]
//! );
//! ```

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::language::{self, LanguageProfile};

// ============================================================================
// Span Types
// ============================================================================

/// Classification of a span of source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
    /// A reserved word of the language.
    Keyword,
    /// A quoted string literal, quotes included.
    String,
    /// An integer or decimal literal.
    Number,
    /// A trailing single-line comment, marker included.
    Comment,
    /// Anything else.
    Plain,
}

impl TokenClass {
    /// Overlap priority; lower wins when two candidates start at the same offset.
    const fn priority(self) -> u8 {
        match self {
            Self::String => 0,
            Self::Number => 1,
            Self::Keyword => 2,
            Self::Comment | Self::Plain => 3,
        }
    }

    /// CSS-style class name used by overlay renderers.
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Keyword => "tok-keyword",
            Self::String => "tok-string",
            Self::Number => "tok-number",
            Self::Comment => "tok-comment",
            Self::Plain => "tok-plain",
        }
    }
}

impl std::fmt::Display for TokenClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyword => write!(f, "keyword"),
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Comment => write!(f, "comment"),
            Self::Plain => write!(f, "plain"),
        }
    }
}

/// A classified byte range of one line.
///
/// Offsets are byte offsets into the line and always fall on UTF-8 character
/// boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
    /// Classification of the covered text.
    pub class: TokenClass,
}

impl Span {
    /// Creates a new span.
    #[must_use]
    pub const fn new(start: usize, end: usize, class: TokenClass) -> Self {
        Self { start, end, class }
    }

    /// Length of the span in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` if the span covers no text.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Returns the text of `line` covered by this span.
    ///
    /// Returns an empty string if the span does not fit the line.
    #[must_use]
    pub fn text<'a>(&self, line: &'a str) -> &'a str {
        line.get(self.start..self.end).unwrap_or("")
    }
}

/// A line of source together with its spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightedLine {
    /// The line text, without its line terminator.
    pub text: String,
    /// Spans covering `text` exactly, in order.
    pub spans: Vec<Span>,
}

impl HighlightedLine {
    /// Iterates over `(class, text)` pairs in order.
    pub fn tokens(&self) -> impl Iterator<Item = (TokenClass, &str)> + '_ {
        self.spans.iter().map(|s| (s.class, s.text(&self.text)))
    }
}

// ============================================================================
// Patterns
// ============================================================================

/// Single- or double-quoted string, escape aware, closed by the same quote.
static STRING_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#).ok());

/// Integer or decimal literal that is not part of an identifier.
static NUMBER_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").ok());

/// One word-bounded alternation per language, keyed by language id.
static KEYWORD_PATTERNS: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    language::LANGUAGES
        .iter()
        .filter_map(|profile| keyword_pattern(profile).map(|re| (profile.id, re)))
        .collect()
});

fn keyword_pattern(profile: &LanguageProfile) -> Option<Regex> {
    if profile.keywords.is_empty() {
        return None;
    }
    let mut words: Vec<&str> = profile.keywords.to_vec();
    // Longest first so a keyword never shadows a longer one sharing its prefix.
    words.sort_by_key(|w| std::cmp::Reverse(w.len()));
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation})\b")).ok()
}

// ============================================================================
// Highlighting
// ============================================================================

/// Highlights `text` as `language_id`, returning spans for every line.
///
/// Lines are split on `\n`, so the result always has one entry more than the
/// number of newlines. Unknown language ids are highlighted without keywords
/// or comments.
#[must_use]
pub fn highlight(text: &str, language_id: &str) -> Vec<Vec<Span>> {
    let profile = language::profile_or_plain(language_id);
    text.split('\n')
        .map(|line| highlight_line(line, profile))
        .collect()
}

/// Like [`highlight`], but pairs every line with its text.
#[must_use]
pub fn highlight_lines(text: &str, language_id: &str) -> Vec<HighlightedLine> {
    let profile = language::profile_or_plain(language_id);
    text.split('\n')
        .map(|line| HighlightedLine {
            text: line.to_string(),
            spans: highlight_line(line, profile),
        })
        .collect()
}

/// Highlights a single line with the given profile.
///
/// The returned spans are contiguous, non-overlapping and cover `line`
/// exactly. An empty line yields no spans.
#[must_use]
pub fn highlight_line(line: &str, profile: &LanguageProfile) -> Vec<Span> {
    if line.is_empty() {
        return Vec::new();
    }

    let comment_start = profile
        .comment_marker
        .and_then(|marker| find_comment_start(line, marker));
    let head = comment_start.map_or(line, |start| &line[..start]);

    let accepted = resolve_overlaps(scan_candidates(head, profile));

    let mut spans = Vec::with_capacity(accepted.len() * 2 + 2);
    let mut cursor = 0;
    for span in accepted {
        if span.start > cursor {
            spans.push(Span::new(cursor, span.start, TokenClass::Plain));
        }
        cursor = span.end;
        spans.push(span);
    }
    if cursor < head.len() {
        spans.push(Span::new(cursor, head.len(), TokenClass::Plain));
    }
    if let Some(start) = comment_start {
        spans.push(Span::new(start, line.len(), TokenClass::Comment));
    }
    spans
}

/// Finds where a trailing comment starts.
///
/// Markers inside string literals are skipped. When a quote is still open at
/// the end of the line, the first marker after that quote is used instead.
fn find_comment_start(line: &str, marker: &str) -> Option<usize> {
    if marker.is_empty() {
        return None;
    }

    let mut open_quote: Option<char> = None;
    let mut escaped = false;
    let mut marker_in_open_quote: Option<usize> = None;

    for (idx, ch) in line.char_indices() {
        match open_quote {
            None => {
                if line[idx..].starts_with(marker) {
                    return Some(idx);
                }
                if ch == '"' || ch == '\'' {
                    open_quote = Some(ch);
                }
            }
            Some(quote) => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == quote {
                    open_quote = None;
                    marker_in_open_quote = None;
                } else if marker_in_open_quote.is_none() && line[idx..].starts_with(marker) {
                    marker_in_open_quote = Some(idx);
                }
            }
        }
    }

    open_quote.and(marker_in_open_quote)
}

/// Runs the string, number and keyword scans over `head`.
fn scan_candidates(head: &str, profile: &LanguageProfile) -> Vec<Span> {
    let mut candidates = Vec::new();

    let scans = [
        (STRING_PATTERN.as_ref(), TokenClass::String),
        (NUMBER_PATTERN.as_ref(), TokenClass::Number),
        (KEYWORD_PATTERNS.get(profile.id), TokenClass::Keyword),
    ];
    for (pattern, class) in scans {
        if let Some(re) = pattern {
            candidates.extend(
                re.find_iter(head)
                    .map(|m| Span::new(m.start(), m.end(), class)),
            );
        }
    }

    candidates
}

/// Orders candidates and drops every one that starts inside an accepted span.
pub(crate) fn resolve_overlaps(mut candidates: Vec<Span>) -> Vec<Span> {
    candidates.sort_by_key(|span| (span.start, span.class.priority()));

    let mut accepted: Vec<Span> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate.is_empty() {
            continue;
        }
        let free = accepted
            .last()
            .map_or(true, |last| candidate.start >= last.end);
        if free {
            accepted.push(candidate);
        }
    }
    accepted
}

// ============================================================================
// Tests
// ============================================================================

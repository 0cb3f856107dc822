//! Normalization, phrase-level substitutions, and tokenization.
//!
//! Every phrase runs through the same pipeline before parsing:
//!
//! ```text
//! raw text ── NFD + lowercase ── substitution rules (in order) ── word scan
//! ```
//!
//! The word scan accumulates runs of letters, combining marks, apostrophes and
//! hyphens; every other character separates words. Leading/trailing
//! apostrophes are trimmed per word so quoted words tokenize cleanly.

use crate::words::{WordId, WordRegistry, canonicalize};
use regex::Regex;
use unicode_normalization::char::is_combining_mark;

/// One compiled find/replace rule applied to phrase text before tokenizing.
///
/// A rule whose pattern fails to compile is kept, marked invalid, and never
/// matches; the compile error is surfaced as its message.
#[derive(Debug)]
pub struct SubstitutionRule {
    replacement: String,
    regex: Option<Regex>,
    error: Option<String>,
}

impl SubstitutionRule {
    pub fn compile(pattern: &str, replacement: &str, is_regex: bool, case_sensitive: bool) -> Self {
        let mut source = if is_regex { pattern.to_string() } else { regex::escape(pattern) };
        if !case_sensitive {
            source = format!("(?i){source}");
        }
        match Regex::new(&source) {
            Ok(regex) => {
                SubstitutionRule { replacement: replacement.to_string(), regex: Some(regex), error: None }
            }
            Err(e) => SubstitutionRule {
                replacement: replacement.to_string(),
                regex: None,
                error: Some(format!("invalid substitution pattern: {e}")),
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn apply(&self, text: &str) -> String {
        match &self.regex {
            Some(re) => re.replace_all(text, self.replacement.as_str()).into_owned(),
            None => text.to_string(),
        }
    }
}

/// Normalize `text`, run the substitution rules in order, and intern the
/// resulting words.
pub(crate) fn tokenize(registry: &mut WordRegistry, text: &str, substitutions: &[SubstitutionRule]) -> Vec<WordId> {
    let mut normalized = canonicalize(text);
    for rule in substitutions {
        normalized = rule.apply(&normalized);
    }
    scan(&normalized).into_iter().map(|w| registry.intern(w)).collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphabetic() || is_combining_mark(c) || c == '\'' || c == '-'
}

/// Split normalized text into words, discarding separators.
fn scan(text: &str) -> Vec<&str> {
    text.split(|c: char| !is_word_char(c))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .collect()
}

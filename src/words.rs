//! Word interning and inflectional equivalence.
//!
//! Every distinct token string is canonicalized to a single `WordId` so the
//! rest of the engine can compare words by id. The registry is owned by one
//! session (no process-wide statics), grows for the life of the session, and
//! never shrinks.
//!
//! Two words are *equivalent* when one has been recorded as an inflected form
//! of the other ("priests" for "priest", a stem discovered during parsing).
//! Equivalence is symmetric and reflexive-by-identity but deliberately not
//! transitive: it records observed substitutability, not word classes.

use crate::stem::stem;
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

/// Stable handle to an interned word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WordId(pub(crate) u32);

impl WordId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct WordEntry {
    text: String,
    /// Inflected forms that may substitute for this word during matching.
    equivalents: HashSet<WordId>,
}

/// Session-owned registry of canonical word tokens.
#[derive(Debug, Default)]
pub struct WordRegistry {
    entries: Vec<WordEntry>,
    by_text: HashMap<String, WordId>,
}

/// NFD-normalize and lowercase a token before lookup or creation.
pub(crate) fn canonicalize(text: &str) -> String {
    text.nfd().collect::<String>().to_lowercase()
}

impl WordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `text`, returning the id of its canonical word. Idempotent.
    pub fn intern(&mut self, text: &str) -> WordId {
        let canonical = canonicalize(text);
        if let Some(&id) = self.by_text.get(&canonical) {
            return id;
        }
        let id = WordId(self.entries.len() as u32);
        self.entries.push(WordEntry { text: canonical.clone(), equivalents: HashSet::new() });
        self.by_text.insert(canonical, id);
        id
    }

    /// Look up a word without creating it.
    pub fn get(&self, text: &str) -> Option<WordId> {
        self.by_text.get(&canonicalize(text)).copied()
    }

    /// Canonical text of `id`.
    pub fn text(&self, id: WordId) -> &str {
        &self.entries[id.index()].text
    }

    /// Record that `a` and `b` may substitute for each other.
    pub fn record_equivalence(&mut self, a: WordId, b: WordId) {
        if a == b {
            return;
        }
        self.entries[a.index()].equivalents.insert(b);
        self.entries[b.index()].equivalents.insert(a);
    }

    /// True when the words are identical or recorded as equivalent.
    pub fn are_equivalent(&self, a: WordId, b: WordId) -> bool {
        a == b || self.entries[a.index()].equivalents.contains(&b)
    }

    /// Equivalence-aware comparison with stemming fallback.
    ///
    /// When two distinct words share a stem, the equivalence is recorded so
    /// future comparisons and lookups hit without re-stemming.
    pub fn matches(&mut self, a: WordId, b: WordId) -> bool {
        if self.are_equivalent(a, b) {
            return true;
        }
        if stem(self.text(a)) == stem(self.text(b)) {
            self.record_equivalence(a, b);
            return true;
        }
        false
    }

    /// Number of interned words.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

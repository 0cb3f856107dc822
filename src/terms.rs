//! Key terms and the candidate builder.
//!
//! A key term arrives as free-form source-language text ("ask, or pray",
//! "(to) rejoice", "priest(s)", "sons of God or children of God") plus an
//! optional override rule. The builder expands that text into the complete set
//! of literal word sequences — `TermMatch`es — that the parser should recognize
//! as occurrences of the term:
//!
//! ```text
//! "sons of God or children of God"
//!        │ alternation split (", or " / "," / "=")
//!        ▼
//! phrasings ── inner " or " split (shared-boundary heuristic) ── recurse
//!        │
//!        ▼
//! meta-words ── "(to)"/"(word)" optional, "(pre)rest" and "a/b" multiplying,
//!               "word(sfx)" inflection
//!        │
//!        ▼
//! TermMatch sequences, deduplicated across all terms
//! ```
//!
//! Identical sequences produced by different terms coalesce into a single
//! `TermMatch` whose represented-terms set grows; renderings of such a match
//! are resolved by majority vote across the terms it represents.

use crate::words::{WordId, WordRegistry, canonicalize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Stable handle to an interned key-term match sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TermMatchId(pub(crate) u32);

impl TermMatchId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Rejected rendering operations. Synchronous and descriptive; nothing here is
/// recoverable state, the caller just reports it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderingError {
    #[error("rendering {0:?} already exists for this term")]
    Duplicate(String),
    #[error("rendering {0:?} is not known for this term")]
    NotFound(String),
    #[error("unknown key term {0:?}")]
    UnknownTerm(String),
    #[error("phrase has no key term #{0}")]
    NoSuchTerm(usize),
}

/// One word slot of a match sequence. `optional` is the engine's rendering of
/// the original "null = omitted word": a single match covers both the
/// with-word and without-word surface forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TermWord {
    pub word: WordId,
    pub optional: bool,
}

impl TermWord {
    fn required(word: WordId) -> Self {
        TermWord { word, optional: false }
    }

    fn optional(word: WordId) -> Self {
        TermWord { word, optional: true }
    }
}

/// One literal way a key term may appear in text.
#[derive(Debug, Clone)]
pub(crate) struct TermMatch {
    pub words: Vec<TermWord>,
    /// Normalized ids of every key term this sequence represents.
    pub term_ids: BTreeSet<String>,
    /// When set, the match applies only to phrases whose reference range
    /// contains one of these occurrences.
    pub occurrences: Option<Vec<u32>>,
    /// Explicitly selected rendering; otherwise majority vote across the
    /// represented terms' default renderings.
    pub explicit_rendering: Option<String>,
}

impl TermMatch {
    /// Smallest represented term id; the deterministic tie-break identity.
    pub fn primary_term(&self) -> &str {
        self.term_ids.iter().next().map(String::as_str).unwrap_or("")
    }

    pub fn source_text(&self, registry: &WordRegistry) -> String {
        let words: Vec<&str> =
            self.words.iter().filter(|tw| !tw.optional).map(|tw| registry.text(tw.word)).collect();
        words.join(" ")
    }

    pub fn applies_to(&self, reference: &crate::Reference) -> bool {
        match &self.occurrences {
            None => true,
            Some(occurrences) => occurrences.iter().any(|&o| reference.contains(o)),
        }
    }
}

/// A fully realized word sequence of one match (optionals expanded), as the
/// parser consumes it.
#[derive(Debug, Clone)]
pub(crate) struct Realization {
    pub match_id: TermMatchId,
    pub words: Vec<WordId>,
}

/// One key term with its target-language renderings.
#[derive(Debug, Clone)]
pub(crate) struct KeyTerm {
    pub text: String,
    pub renderings: Vec<String>,
    pub default_rendering: Option<usize>,
    pub occurrences: Vec<u32>,
}

impl KeyTerm {
    pub fn default_rendering(&self) -> Option<&str> {
        match self.default_rendering {
            Some(i) => self.renderings.get(i).map(String::as_str),
            None => self.renderings.first().map(String::as_str),
        }
    }
}

/// Override rule for one term, keyed by normalized term text.
#[derive(Debug, Clone, Default)]
pub(crate) struct TermRule {
    pub exclude: bool,
    pub match_for_ref_only: bool,
    pub alternates: Vec<String>,
}

/// All key terms, their interned match sequences, and the first-word lookup
/// index the parser scans against.
#[derive(Debug, Default)]
pub(crate) struct TermTable {
    terms: BTreeMap<String, KeyTerm>,
    matches: Vec<TermMatch>,
    by_sequence: HashMap<Vec<TermWord>, TermMatchId>,
    /// First realized word -> realizations starting with it.
    by_first_word: HashMap<WordId, Vec<Realization>>,
}

impl TermTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one key term: store it and expand its text (or its rule's
    /// alternates) into match sequences, coalescing duplicates across terms.
    pub fn ingest(
        &mut self,
        registry: &mut WordRegistry,
        text: &str,
        renderings: Vec<String>,
        occurrences: Vec<u32>,
        rule: Option<&TermRule>,
    ) {
        let id = canonicalize(text.trim());
        if id.is_empty() {
            return;
        }
        // Distinct source lemmas may canonicalize to the same term text; the
        // one entry keeps every lemma's renderings and occurrences.
        match self.terms.entry(id.clone()) {
            Entry::Occupied(entry) => {
                let term = entry.into_mut();
                for r in renderings {
                    if !term.renderings.contains(&r) {
                        term.renderings.push(r);
                    }
                }
                for &o in &occurrences {
                    if !term.occurrences.contains(&o) {
                        term.occurrences.push(o);
                    }
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(KeyTerm {
                    text: text.trim().to_string(),
                    renderings,
                    default_rendering: None,
                    occurrences: occurrences.clone(),
                });
            }
        }

        let excluded = rule.map(|r| r.exclude).unwrap_or(false);
        let alternates: &[String] = rule.map(|r| r.alternates.as_slice()).unwrap_or(&[]);
        if excluded && alternates.is_empty() {
            return;
        }

        let restricted = rule.map(|r| r.match_for_ref_only).unwrap_or(false);
        let restriction = if restricted { Some(occurrences) } else { None };

        let mut phrasings: Vec<String> = alternates.to_vec();
        if !excluded {
            // Split the default text on alternation delimiters into
            // independent phrasings.
            phrasings.extend(regex!(r",\s*or\s+|,|=").split(text).map(str::to_string));
        }

        for phrasing in phrasings {
            self.build_phrasing(registry, &phrasing, &id, &restriction);
        }
    }

    /// Process one phrasing: resolve inner " or " alternation recursively,
    /// then expand meta-words into candidate sequences.
    fn build_phrasing(&mut self, registry: &mut WordRegistry, phrasing: &str, term_id: &str, restriction: &Option<Vec<u32>>) {
        let metas: Vec<&str> = phrasing.split_whitespace().collect();
        if metas.is_empty() {
            return;
        }

        if let Some((left, right)) = split_on_or(&metas) {
            self.build_phrasing(registry, &left, term_id, restriction);
            self.build_phrasing(registry, &right, term_id, restriction);
            return;
        }

        for sequence in expand_meta_words(registry, &metas) {
            self.register(sequence, term_id, restriction);
        }
    }

    fn register(&mut self, words: Vec<TermWord>, term_id: &str, restriction: &Option<Vec<u32>>) {
        if words.is_empty() || words.iter().all(|tw| tw.optional) {
            return;
        }
        match self.by_sequence.get(&words) {
            Some(&id) => {
                let existing = &mut self.matches[id.index()];
                existing.term_ids.insert(term_id.to_string());
                // A restriction only holds while every represented term
                // carries it; a shared unrestricted term lifts it.
                if restriction.is_none() {
                    existing.occurrences = None;
                } else if let (Some(have), Some(add)) = (existing.occurrences.as_mut(), restriction.as_ref()) {
                    have.extend_from_slice(add);
                }
            }
            None => {
                let id = TermMatchId(self.matches.len() as u32);
                let mut term_ids = BTreeSet::new();
                term_ids.insert(term_id.to_string());
                self.matches.push(TermMatch {
                    words: words.clone(),
                    term_ids,
                    occurrences: restriction.clone(),
                    explicit_rendering: None,
                });
                self.by_sequence.insert(words, id);
            }
        }
    }

    /// Build the first-word realization index. Call once after all terms are
    /// ingested.
    pub fn build_index(&mut self) {
        self.by_first_word.clear();
        for (idx, m) in self.matches.iter().enumerate() {
            let match_id = TermMatchId(idx as u32);
            for words in realize(&m.words) {
                let first = words[0];
                self.by_first_word.entry(first).or_default().push(Realization { match_id, words });
            }
        }
        // Deterministic candidate order regardless of ingestion order.
        for bucket in self.by_first_word.values_mut() {
            bucket.sort_by(|a, b| {
                b.words
                    .len()
                    .cmp(&a.words.len())
                    .then_with(|| self.matches[a.match_id.index()].primary_term().cmp(self.matches[b.match_id.index()].primary_term()))
                    .then(a.match_id.cmp(&b.match_id))
            });
        }
    }

    pub fn candidates_for(&self, first_word: WordId) -> &[Realization] {
        self.by_first_word.get(&first_word).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_match(&self, id: TermMatchId) -> &TermMatch {
        &self.matches[id.index()]
    }

    pub fn get_match_mut(&mut self, id: TermMatchId) -> &mut TermMatch {
        &mut self.matches[id.index()]
    }

    pub fn matches_len(&self) -> usize {
        self.matches.len()
    }

    pub fn term(&self, term_id: &str) -> Option<&KeyTerm> {
        self.terms.get(term_id)
    }

    /// All renderings known for a match: the union across its represented
    /// terms, in deterministic order, longest first.
    pub fn known_renderings(&self, id: TermMatchId) -> Vec<String> {
        let m = self.get_match(id);
        let mut out: Vec<String> = Vec::new();
        for term_id in &m.term_ids {
            if let Some(term) = self.terms.get(term_id) {
                for r in &term.renderings {
                    if !out.contains(r) {
                        out.push(r.clone());
                    }
                }
            }
        }
        out.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
        out
    }

    /// Resolved rendering of a match: explicit if selected, else majority vote
    /// across the represented terms' default renderings (ties break toward the
    /// lexicographically smallest rendering).
    pub fn rendering(&self, id: TermMatchId) -> Option<String> {
        let m = self.get_match(id);
        if let Some(explicit) = &m.explicit_rendering {
            return Some(explicit.clone());
        }
        let mut votes: BTreeMap<&str, usize> = BTreeMap::new();
        for term_id in &m.term_ids {
            if let Some(r) = self.terms.get(term_id).and_then(|t| t.default_rendering()) {
                *votes.entry(r).or_insert(0) += 1;
            }
        }
        votes.into_iter().max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0))).map(|(r, _)| r.to_string())
    }

    pub fn renderings_of_term(&self, term_id: &str) -> Result<&[String], RenderingError> {
        self.terms
            .get(&canonicalize(term_id))
            .map(|t| t.renderings.as_slice())
            .ok_or_else(|| RenderingError::UnknownTerm(term_id.to_string()))
    }

    pub fn add_rendering(&mut self, term_id: &str, rendering: &str) -> Result<(), RenderingError> {
        let term = self
            .terms
            .get_mut(&canonicalize(term_id))
            .ok_or_else(|| RenderingError::UnknownTerm(term_id.to_string()))?;
        if term.renderings.iter().any(|r| r == rendering) {
            return Err(RenderingError::Duplicate(rendering.to_string()));
        }
        term.renderings.push(rendering.to_string());
        Ok(())
    }

    pub fn remove_rendering(&mut self, term_id: &str, rendering: &str) -> Result<(), RenderingError> {
        let term = self
            .terms
            .get_mut(&canonicalize(term_id))
            .ok_or_else(|| RenderingError::UnknownTerm(term_id.to_string()))?;
        let pos = term.renderings.iter().position(|r| r == rendering);
        debug_assert!(pos.is_some(), "removing a rendering that was never added: {rendering:?}");
        let pos = pos.ok_or_else(|| RenderingError::NotFound(rendering.to_string()))?;
        term.renderings.remove(pos);
        match term.default_rendering {
            Some(d) if d == pos => term.default_rendering = None,
            Some(d) if d > pos => term.default_rendering = Some(d - 1),
            _ => {}
        }
        Ok(())
    }

    pub fn set_default_rendering(&mut self, term_id: &str, rendering: &str) -> Result<(), RenderingError> {
        let term = self
            .terms
            .get_mut(&canonicalize(term_id))
            .ok_or_else(|| RenderingError::UnknownTerm(term_id.to_string()))?;
        match term.renderings.iter().position(|r| r == rendering) {
            Some(pos) => {
                term.default_rendering = Some(pos);
                Ok(())
            }
            None => Err(RenderingError::NotFound(rendering.to_string())),
        }
    }
}

/// Expand optional words into every realized sequence.
fn realize(words: &[TermWord]) -> Vec<Vec<WordId>> {
    let mut realized: Vec<Vec<WordId>> = vec![Vec::new()];
    for tw in words {
        if tw.optional {
            let mut with: Vec<Vec<WordId>> = realized.clone();
            for seq in &mut with {
                seq.push(tw.word);
            }
            realized.extend(with);
        } else {
            for seq in &mut realized {
                seq.push(tw.word);
            }
        }
    }
    realized.retain(|seq| !seq.is_empty());
    realized.sort();
    realized.dedup();
    realized
}

/// Split a phrasing at a standalone "or", pairing each side's distinguishing
/// core with the boundary words the sides share:
///
/// ```text
/// sons of God or children of God
/// └L──────────┘  └R─────────────┘
/// shared suffix "of God"; variants: "sons of God", "children of God"
/// ```
fn split_on_or(metas: &[&str]) -> Option<(String, String)> {
    let pos = metas.iter().position(|&w| w.eq_ignore_ascii_case("or"))?;
    if pos == 0 || pos == metas.len() - 1 {
        return None;
    }
    let left = &metas[..pos];
    let right = &metas[pos + 1..];

    // Walk inward word by word to find the minimal non-shared span.
    let mut prefix = 0;
    while prefix < left.len().min(right.len()) && left[prefix].eq_ignore_ascii_case(right[prefix]) {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < (left.len() - prefix).min(right.len() - prefix)
        && left[left.len() - 1 - suffix].eq_ignore_ascii_case(right[right.len() - 1 - suffix])
    {
        suffix += 1;
    }

    let variant = |core: &[&str]| -> String {
        let mut words: Vec<&str> = Vec::new();
        words.extend_from_slice(&left[..prefix]);
        words.extend_from_slice(core);
        words.extend_from_slice(&left[left.len() - suffix..]);
        words.join(" ")
    };

    Some((variant(&left[prefix..left.len() - suffix]), variant(&right[prefix..right.len() - suffix])))
}

/// Expand one phrasing's meta-words into candidate sequences.
///
/// - `(word)` standalone, and a leading literal "to", become optional slots;
/// - `(pre)rest` doubles the in-progress set ("prerest" / "rest");
/// - `word(sfx)` records "wordsfx" as an inflectional equivalent of "word";
/// - `a/b` multiplies the in-progress set by its slash alternatives.
fn expand_meta_words(registry: &mut WordRegistry, metas: &[&str]) -> Vec<Vec<TermWord>> {
    let mut sequences: Vec<Vec<TermWord>> = vec![Vec::new()];

    for (i, raw) in metas.iter().enumerate() {
        let meta = clean_meta_word(raw);
        if meta.is_empty() {
            continue;
        }

        if meta.contains('/') {
            let variants: Vec<WordId> =
                meta.split('/').filter(|v| !v.is_empty()).map(|v| registry.intern(v)).collect();
            if variants.is_empty() {
                continue;
            }
            let base = std::mem::take(&mut sequences);
            for seq in base {
                for &word in &variants {
                    let mut with = seq.clone();
                    with.push(TermWord::required(word));
                    sequences.push(with);
                }
            }
        } else if let Some(inner) = meta.strip_prefix('(').and_then(|m| m.strip_suffix(')')) {
            // Fully parenthesized word: optional slot.
            if inner.is_empty() {
                continue;
            }
            let word = registry.intern(inner);
            for seq in &mut sequences {
                seq.push(TermWord::optional(word));
            }
        } else if let Some(close) = meta.find(')').filter(|_| meta.starts_with('(')) {
            // Leading parenthesized prefix: two genuinely different words.
            let prefix = &meta[1..close];
            let rest = &meta[close + 1..];
            if rest.is_empty() {
                continue;
            }
            let with = registry.intern(&format!("{prefix}{rest}"));
            let without = registry.intern(rest);
            let mut doubled = sequences.clone();
            for seq in &mut sequences {
                seq.push(TermWord::required(with));
            }
            for seq in &mut doubled {
                seq.push(TermWord::required(without));
            }
            sequences.extend(doubled);
        } else if let Some(open) = meta.find('(') {
            // Trailing parenthesized suffix: an inflection, not a variant.
            let base = &meta[..open];
            let suffix = meta[open + 1..].trim_end_matches(')');
            if base.is_empty() {
                continue;
            }
            let word = registry.intern(base);
            if !suffix.is_empty() {
                let inflected = registry.intern(&format!("{base}{suffix}"));
                registry.record_equivalence(word, inflected);
            }
            for seq in &mut sequences {
                seq.push(TermWord::required(word));
            }
        } else if i == 0 && meta.eq_ignore_ascii_case("to") {
            // Leading infinitive marker may be omitted in running text.
            let word = registry.intern(&meta);
            for seq in &mut sequences {
                seq.push(TermWord::optional(word));
            }
        } else {
            let word = registry.intern(&meta);
            for seq in &mut sequences {
                seq.push(TermWord::required(word));
            }
        }
    }

    sequences
}

/// Strip stray punctuation a phrasing may carry, keeping letters, hyphens,
/// apostrophes, parentheses and slash alternatives.
fn clean_meta_word(raw: &str) -> String {
    raw.chars().filter(|&c| c.is_alphabetic() || matches!(c, '\'' | '-' | '(' | ')' | '/')).collect()
}

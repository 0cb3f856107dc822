extern crate self as phrasal;

#[macro_use]
mod macros;
mod api;
mod engine;
mod selection;
mod stem;
mod terms;
mod words;

pub use api::{
    ChangeKind, KeyTermSpec, PhraseSpec, PhraseView, RenderingError, Session, SubstitutionSpec, TermRuleSpec,
    TranslationChange,
};
pub use engine::{FilterFlags, KeyTermFilter, SortCriterion};
pub use selection::RenderingSelectionRule;
pub use words::{WordId, WordRegistry};

use std::collections::BTreeSet;

// --- Core data model ---------------------------------------------------------

/// Stable handle to a phrase. Survives sorting; never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhraseId(pub(crate) u32);

impl PhraseId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable handle into the part arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct PartId(pub(crate) u32);

impl PartId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One element of a parsed phrase: a reusable ordinary-text run or a key-term
/// occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PhraseElement {
    Part(PartId),
    Term(crate::terms::TermMatchId),
}

/// An interned, ordered word sequence that is not a key term.
///
/// Parts are shared: every phrase containing the identical word sequence owns
/// the same `Part`, which is what lets one user translation inform many
/// phrases. The owners set is the inverse index from the part arena back into
/// the phrase list.
#[derive(Debug, Clone)]
pub(crate) struct Part {
    pub words: Vec<WordId>,
    /// Current best translation of this word run (possibly empty).
    pub translation: String,
    pub owners: BTreeSet<PhraseId>,
}

impl Part {
    pub fn new(words: Vec<WordId>) -> Self {
        Part { words, translation: String::new(), owners: BTreeSet::new() }
    }

    /// Render the source-language text of this part.
    pub fn source_text(&self, registry: &WordRegistry) -> String {
        let words: Vec<&str> = self.words.iter().map(|&w| registry.text(w)).collect();
        words.join(" ")
    }
}

/// Translation state of one phrase.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) enum TranslationState {
    /// Nothing known; the display translation is reconstructed from elements.
    #[default]
    None,
    /// Provisional template propagated from a structurally identical phrase.
    /// Placeholders (`{0}`, `{1}`, ...) stand for this phrase's key terms.
    Inferred(String),
    /// Exactly what the user typed.
    User(String),
}

/// Syntactic kind, derived from the source text's final punctuation. Used to
/// key the learned leading/trailing punctuation convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum PhraseKind {
    Question,
    Statement,
}

impl PhraseKind {
    pub fn of(source: &str) -> Self {
        if source.trim_end().ends_with('?') { PhraseKind::Question } else { PhraseKind::Statement }
    }
}

/// Scripture reference of a phrase: display string plus a numeric range used
/// for occurrence-restricted key terms and reference filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub text: String,
    pub start: u32,
    pub end: u32,
}

impl Reference {
    pub fn contains(&self, point: u32) -> bool {
        self.start <= point && point <= self.end
    }
}

/// Ordering key compared lexicographically. Loaded phrases carry a single
/// segment; the multi-segment form is reserved for splicing a phrase between
/// neighbors without renumbering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SequenceKey(pub Vec<u32>);

impl SequenceKey {
    pub fn from_integer(n: u32) -> Self {
        SequenceKey(vec![n])
    }
}

/// One checking question. Identity (source text, category, reference,
/// sequence key) is immutable; the element list and translation state are
/// maintained by the repository.
#[derive(Debug, Clone)]
pub(crate) struct TranslatablePhrase {
    pub source: String,
    pub category: String,
    pub reference: Reference,
    pub seq: SequenceKey,
    pub kind: PhraseKind,
    pub elements: Vec<PhraseElement>,
    pub translation: TranslationState,
    /// Set when every key term of the phrase was located in the user's
    /// translation while building the template.
    pub all_terms_matched: bool,
}

impl TranslatablePhrase {
    pub fn has_user_translation(&self) -> bool {
        matches!(self.translation, TranslationState::User(_))
    }

    /// Part elements only, in order. Key terms are not "translatable": their
    /// renderings are managed per term, not per phrase.
    pub fn part_ids(&self) -> impl Iterator<Item = PartId> + '_ {
        self.elements.iter().filter_map(|el| match el {
            PhraseElement::Part(id) => Some(*id),
            PhraseElement::Term(_) => None,
        })
    }
}

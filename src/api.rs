use crate::engine::{FilterFlags, KeyTermFilter, Repository, SortCriterion, SubstitutionRule};
use crate::selection::RenderingSelectionRule;
use crate::terms::{TermMatchId, TermRule, TermTable};
use crate::words::{WordRegistry, canonicalize};
use crate::{PhraseElement, PhraseId, Reference};
use std::collections::HashMap;

pub use crate::engine::{ChangeKind, TranslationChange};
pub use crate::terms::RenderingError;

/// One checking question to load.
#[derive(Debug, Clone)]
pub struct PhraseSpec {
    pub text: String,
    /// Grouping category, e.g. `"Overview"` or `"Details"`.
    pub category: String,
    /// Display reference, e.g. `"GEN 1:1-5"`.
    pub reference: String,
    /// Numeric bounds of the reference range (BBBCCCVVV style).
    pub start_ref: u32,
    pub end_ref: u32,
    /// Position within the category; drives the default sort.
    pub seq: u32,
}

/// One key term to load.
#[derive(Debug, Clone)]
pub struct KeyTermSpec {
    /// Free-form source text; may carry alternation ("ask, or pray") and
    /// parenthesized meta-words ("(to) rejoice", "priest(s)").
    pub text: String,
    /// Known target-language renderings.
    pub renderings: Vec<String>,
    /// Numeric references where this term occurs.
    pub occurrences: Vec<u32>,
}

/// Per-term override of how the term text expands into match sequences.
#[derive(Debug, Clone, Default)]
pub struct TermRuleSpec {
    /// The term this rule applies to (matched case-insensitively).
    pub term: String,
    /// Drop the term's own text (alternates, if any, still apply).
    pub exclude: bool,
    /// Match only in phrases whose reference contains an occurrence.
    pub match_for_ref_only: bool,
    /// Additional phrasings to recognize.
    pub alternates: Vec<String>,
}

/// One phrase-text find/replace applied before tokenization.
#[derive(Debug, Clone)]
pub struct SubstitutionSpec {
    pub pattern: String,
    pub replacement: String,
    pub is_regex: bool,
    pub case_sensitive: bool,
}

/// Read-only snapshot of one phrase, as a front end would show it.
#[derive(Debug, Clone)]
pub struct PhraseView {
    pub id: PhraseId,
    pub text: String,
    pub category: String,
    pub reference: String,
    /// The best translation to display (user's, inferred, or reconstructed;
    /// possibly empty).
    pub translation: String,
    pub has_user_translation: bool,
    /// Every key term of this phrase was located when the user's translation
    /// was processed.
    pub all_terms_matched: bool,
    /// Source text of each key-term occurrence, in phrase order.
    pub key_terms: Vec<String>,
}

type Observer = Box<dyn Fn(&TranslationChange)>;

/// One loaded project: key terms, substitutions, selection rules, and
/// phrases, with everything learned from the user's translations.
///
/// # Example
/// ```
/// use phrasal::{KeyTermSpec, PhraseSpec, Session};
///
/// let terms = vec![KeyTermSpec {
///     text: "jesus".into(),
///     renderings: vec!["Jesús".into()],
///     occurrences: vec![],
/// }];
/// let phrases = vec![
///     PhraseSpec {
///         text: "What did Jesus say?".into(),
///         category: "Details".into(),
///         reference: "MAT 1:1".into(),
///         start_ref: 40001001,
///         end_ref: 40001001,
///         seq: 0,
///     },
/// ];
/// let mut session = Session::new(terms, vec![], vec![], vec![], phrases);
///
/// let phrase = session.phrases().remove(0);
/// assert_eq!(phrase.key_terms, ["jesus"]);
/// session.set_translation(phrase.id, "¿Qué dijo Jesús?");
/// ```
pub struct Session {
    repo: Repository,
    observers: Vec<Observer>,
}

impl Session {
    pub fn new(
        terms: Vec<KeyTermSpec>,
        rules: Vec<TermRuleSpec>,
        substitutions: Vec<SubstitutionSpec>,
        selection_rules: Vec<RenderingSelectionRule>,
        phrases: Vec<PhraseSpec>,
    ) -> Self {
        let mut registry = WordRegistry::new();
        let mut table = TermTable::new();

        let rules_by_term: HashMap<String, TermRule> = rules
            .into_iter()
            .map(|r| {
                let key = canonicalize(r.term.trim());
                (key, TermRule { exclude: r.exclude, match_for_ref_only: r.match_for_ref_only, alternates: r.alternates })
            })
            .collect();

        for spec in terms {
            let rule = rules_by_term.get(&canonicalize(spec.text.trim()));
            table.ingest(&mut registry, &spec.text, spec.renderings, spec.occurrences, rule);
        }
        table.build_index();

        let substitutions: Vec<SubstitutionRule> = substitutions
            .iter()
            .map(|s| SubstitutionRule::compile(&s.pattern, &s.replacement, s.is_regex, s.case_sensitive))
            .collect();

        let mut repo = Repository::new(registry, table, substitutions, selection_rules);
        for spec in phrases {
            let reference = Reference { text: spec.reference, start: spec.start_ref, end: spec.end_ref };
            repo.add_phrase(&spec.text, &spec.category, reference, spec.seq);
        }
        repo.absorb_sub_phrases();

        Session { repo, observers: Vec::new() }
    }

    /// Register a callback fired for every translation change, including
    /// edits of other phrases caused by propagation.
    pub fn on_translation_changed(&mut self, observer: impl Fn(&TranslationChange) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn notify(&self, changes: &[TranslationChange]) {
        for change in changes {
            for observer in &self.observers {
                observer(change);
            }
        }
    }

    /// All phrases, in the current display order.
    pub fn phrases(&self) -> Vec<PhraseView> {
        self.repo.order.clone().into_iter().map(|id| self.view(id)).collect()
    }

    /// Find one phrase by source text, optionally pinned to a reference.
    pub fn get_phrase(&self, reference: Option<&str>, text: &str) -> Option<PhraseView> {
        self.repo.get_phrase(reference, text).map(|id| self.view(id))
    }

    /// Matching subset of the phrase list; the canonical list is untouched.
    pub fn filter(
        &self,
        text_pattern: Option<&str>,
        flags: FilterFlags,
        key_terms: KeyTermFilter,
        reference_predicate: Option<&dyn Fn(&Reference) -> bool>,
    ) -> Vec<PhraseView> {
        self.repo.filter(text_pattern, flags, key_terms, reference_predicate).into_iter().map(|id| self.view(id)).collect()
    }

    /// Re-order the display list.
    pub fn sort(&mut self, criterion: SortCriterion, ascending: bool) {
        self.repo.sort(criterion, ascending);
    }

    pub fn set_translation(&mut self, id: PhraseId, text: &str) {
        let changes = self.repo.set_translation(id, text);
        self.notify(&changes);
    }

    pub fn clear_translation(&mut self, id: PhraseId) {
        let changes = self.repo.clear_translation(id);
        self.notify(&changes);
    }

    // --- Rendering management -------------------------------------------

    /// Known renderings of one key term.
    pub fn renderings(&self, term: &str) -> Result<&[String], RenderingError> {
        self.repo.terms.renderings_of_term(term)
    }

    /// Renderings translate key terms, so every rendering mutation is a
    /// translation change for the phrases displaying that term.
    pub fn add_rendering(&mut self, term: &str, rendering: &str) -> Result<(), RenderingError> {
        self.repo.terms.add_rendering(term, rendering)?;
        self.notify(&self.rendering_changes(term));
        Ok(())
    }

    pub fn remove_rendering(&mut self, term: &str, rendering: &str) -> Result<(), RenderingError> {
        self.repo.terms.remove_rendering(term, rendering)?;
        self.notify(&self.rendering_changes(term));
        Ok(())
    }

    pub fn set_default_rendering(&mut self, term: &str, rendering: &str) -> Result<(), RenderingError> {
        self.repo.terms.set_default_rendering(term, rendering)?;
        self.notify(&self.rendering_changes(term));
        Ok(())
    }

    /// Pin one rendering for the `term_index`-th key term of a phrase, or
    /// revert to the resolved default with `None`. The pick belongs to the
    /// match sequence, so every phrase sharing it follows.
    pub fn pick_rendering(
        &mut self,
        id: PhraseId,
        term_index: usize,
        rendering: Option<&str>,
    ) -> Result<(), RenderingError> {
        let m = self
            .term_matches(id)
            .into_iter()
            .nth(term_index)
            .ok_or(RenderingError::NoSuchTerm(term_index))?;
        if let Some(r) = rendering {
            if !self.repo.terms.known_renderings(m).iter().any(|k| k == r) {
                return Err(RenderingError::NotFound(r.to_string()));
            }
        }
        self.repo.terms.get_match_mut(m).explicit_rendering = rendering.map(str::to_string);
        let changes: Vec<TranslationChange> = self
            .repo
            .phrases
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.has_user_translation())
            .filter(|(_, p)| p.elements.iter().any(|el| matches!(el, PhraseElement::Term(o) if *o == m)))
            .map(|(i, _)| TranslationChange { phrase: PhraseId(i as u32), kind: ChangeKind::Inferred })
            .collect();
        self.notify(&changes);
        Ok(())
    }

    /// Phrases whose displayed translation may shift with a term's
    /// renderings: every phrase showing a match of the term, except those
    /// pinned by a user translation.
    fn rendering_changes(&self, term: &str) -> Vec<TranslationChange> {
        let key = canonicalize(term.trim());
        self.repo
            .phrases
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.has_user_translation())
            .filter(|(_, p)| {
                p.elements.iter().any(|el| match el {
                    PhraseElement::Term(m) => self.repo.terms.get_match(*m).term_ids.contains(&key),
                    PhraseElement::Part(_) => false,
                })
            })
            .map(|(i, _)| TranslationChange { phrase: PhraseId(i as u32), kind: ChangeKind::Inferred })
            .collect()
    }

    /// The rendering that would be used for the `term_index`-th key term of a
    /// phrase: the first matching selection rule's pick, else the term's
    /// default.
    pub fn select_rendering(&self, id: PhraseId, term_index: usize) -> Option<String> {
        let m = self.term_matches(id).into_iter().nth(term_index)?;
        self.repo.term_rendering(id, m)
    }

    fn term_matches(&self, id: PhraseId) -> Vec<TermMatchId> {
        self.repo
            .phrase(id)
            .elements
            .iter()
            .filter_map(|el| match el {
                PhraseElement::Term(m) => Some(*m),
                PhraseElement::Part(_) => None,
            })
            .collect()
    }

    fn view(&self, id: PhraseId) -> PhraseView {
        let phrase = self.repo.phrase(id);
        PhraseView {
            id,
            text: phrase.source.clone(),
            category: phrase.category.clone(),
            reference: phrase.reference.text.clone(),
            translation: self.repo.display_translation(id),
            has_user_translation: phrase.has_user_translation(),
            all_terms_matched: phrase.all_terms_matched,
            key_terms: self
                .term_matches(id)
                .into_iter()
                .map(|m| self.repo.terms.get_match(m).source_text(&self.repo.registry))
                .collect(),
        }
    }
}

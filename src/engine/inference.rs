//! Statistical translation inference.
//!
//! Everything learned from a user translation flows through here:
//!
//! ```text
//! user types a translation
//!   ├─ punctuation convention learned per phrase kind
//!   ├─ template built: each key term's rendering becomes {n}
//!   ├─ template propagated to pattern-identical untranslated phrases
//!   └─ shared Parts recomputed from masked comparison strings
//! ```
//!
//! A Part's translation is whatever its owning phrases' translations agree on
//! once every *other* element's known text is masked out: the longest common
//! substring across all strings when it is long enough to trust, otherwise a
//! frequency-weighted vote over pairwise common substrings. Degenerate input
//! (no translated owners, nothing in common) yields an empty translation,
//! never a fault.

use super::repository::{Punctuation, Repository};
use crate::terms::TermMatchId;
use crate::{PartId, PhraseElement, PhraseId, TranslationState};
use std::collections::{HashMap, HashSet};

/// Stands in for a masked-out element inside a comparison string. Common
/// substrings never cross it.
const MASK: char = '\u{fffc}';

/// Minimum length (chars) before a common substring shared by *all*
/// comparison strings is adopted outright instead of being put to a vote.
const MIN_COMMON_LEN: usize = 6;

/// One observer notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationChange {
    pub phrase: PhraseId,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The user typed or edited this phrase's translation.
    UserEdited,
    /// The user discarded this phrase's translation.
    Cleared,
    /// This phrase's displayed translation may have changed through
    /// propagation or part recomputation.
    Inferred,
}

impl Repository {
    /// Record a user translation and learn everything it can teach.
    pub fn set_translation(&mut self, id: PhraseId, text: &str) -> Vec<TranslationChange> {
        let mut changes = vec![TranslationChange { phrase: id, kind: ChangeKind::UserEdited }];
        let (leading, body, trailing) = split_punctuation(text);
        let kind = self.phrases[id.index()].kind;
        self.punctuation.insert(kind, Punctuation { leading, trailing });
        self.phrases[id.index()].translation = TranslationState::User(text.to_string());

        // A phrase with exactly one Part (terms aside) teaches it the
        // translation directly, minus the terms' renderings; there is
        // nothing to infer.
        let part_elems: Vec<PartId> = self.phrases[id.index()].part_ids().collect();
        if let [part_id] = part_elems[..] {
            let (_, all_matched) = self.build_template(id, &body);
            self.phrases[id.index()].all_terms_matched = all_matched;
            let direct = strip_masks(&self.mask_other_elements(id, part_id, &body));
            if self.part(part_id).translation != direct {
                self.part_mut(part_id).translation = direct;
                self.push_owner_changes(part_id, &mut changes);
            }
            return dedup(changes);
        }

        let (template, all_matched) = self.build_template(id, &body);
        self.phrases[id.index()].all_terms_matched = all_matched;

        // Propagate only when every key term was located; otherwise the
        // template still carries this phrase's own wording where a slot
        // should be.
        if all_matched {
            let pattern = self.pattern_key(id);
            for i in 0..self.phrases.len() {
                let other = PhraseId(i as u32);
                if other == id || self.phrases[i].has_user_translation() {
                    continue;
                }
                if self.pattern_key(other) == pattern {
                    self.phrases[i].translation = TranslationState::Inferred(template.clone());
                    changes.push(TranslationChange { phrase: other, kind: ChangeKind::Inferred });
                }
            }
        }

        let shared: Vec<PartId> = {
            let mut seen = HashSet::new();
            self.phrases[id.index()]
                .part_ids()
                .filter(|&p| seen.insert(p))
                .filter(|&p| self.part(p).owners.len() > 1)
                .collect()
        };
        let mut visited = HashSet::new();
        for p in shared {
            self.recompute_part(p, &mut visited, &mut changes);
        }
        dedup(changes)
    }

    /// Discard a user translation and retract whatever it taught.
    pub fn clear_translation(&mut self, id: PhraseId) -> Vec<TranslationChange> {
        let mut changes = vec![TranslationChange { phrase: id, kind: ChangeKind::Cleared }];
        self.phrases[id.index()].translation = TranslationState::None;
        self.phrases[id.index()].all_terms_matched = false;

        // A template propagated into this pattern must not outlive its
        // source: re-derive it from a remaining user translation, or revert.
        let pattern = self.pattern_key(id);
        let mut replacement: Option<String> = None;
        for i in 0..self.phrases.len() {
            let other = PhraseId(i as u32);
            if other == id || !self.phrases[i].all_terms_matched {
                continue;
            }
            if let TranslationState::User(text) = &self.phrases[i].translation {
                if self.pattern_key(other) == pattern {
                    let (_, body, _) = split_punctuation(text);
                    replacement = Some(self.build_template(other, &body).0);
                    break;
                }
            }
        }
        for i in 0..self.phrases.len() {
            let other = PhraseId(i as u32);
            if other == id
                || !matches!(self.phrases[i].translation, TranslationState::Inferred(_))
                || self.pattern_key(other) != pattern
            {
                continue;
            }
            self.phrases[i].translation = match &replacement {
                Some(template) => TranslationState::Inferred(template.clone()),
                None => TranslationState::None,
            };
            changes.push(TranslationChange { phrase: other, kind: ChangeKind::Inferred });
        }

        let parts: Vec<PartId> = {
            let mut seen = HashSet::new();
            self.phrases[id.index()].part_ids().filter(|&p| seen.insert(p)).collect()
        };
        let mut visited = HashSet::new();
        for p in parts {
            self.recompute_part(p, &mut visited, &mut changes);
        }
        dedup(changes)
    }

    /// The translation to show for a phrase, in order of confidence: the
    /// user's own text, a propagated template with this phrase's renderings
    /// filled in, or a reconstruction from element translations.
    pub fn display_translation(&self, id: PhraseId) -> String {
        let phrase = &self.phrases[id.index()];
        match &phrase.translation {
            TranslationState::User(text) => text.clone(),
            TranslationState::Inferred(template) => {
                let body = self.fill_template(id, template);
                self.apply_punctuation(id, &body)
            }
            TranslationState::None => {
                let body = self.reconstruct(id);
                if body.is_empty() { String::new() } else { self.apply_punctuation(id, &body) }
            }
        }
    }

    /// Replace each key term's first located rendering with `{n}` in slot
    /// order. Returns the template and whether every term was located.
    fn build_template(&self, id: PhraseId, body: &str) -> (String, bool) {
        let mut template = body.to_string();
        let mut all_matched = true;
        let mut slot = 0;
        for el in &self.phrases[id.index()].elements {
            if let PhraseElement::Term(m) = el {
                let mut found = false;
                // Longest renderings first so "Cristo Jesús" wins over "Jesús".
                for rendering in self.terms.known_renderings(*m) {
                    if let Some(pos) = template.find(&rendering) {
                        template.replace_range(pos..pos + rendering.len(), &format!("{{{slot}}}"));
                        found = true;
                        break;
                    }
                }
                all_matched &= found;
                slot += 1;
            }
        }
        (template, all_matched)
    }

    fn fill_template(&self, id: PhraseId, template: &str) -> String {
        let mut out = template.to_string();
        let mut slot = 0;
        for el in &self.phrases[id.index()].elements {
            if let PhraseElement::Term(m) = el {
                let rendering = self.term_rendering(id, *m).unwrap_or_default();
                out = out.replace(&format!("{{{slot}}}"), &rendering);
                slot += 1;
            }
        }
        collapse_spaces(&out)
    }

    /// Element translations in phrase order, joined.
    fn reconstruct(&self, id: PhraseId) -> String {
        let pieces: Vec<String> = self.phrases[id.index()]
            .elements
            .iter()
            .filter_map(|el| match el {
                PhraseElement::Part(p) => {
                    let t = &self.part(*p).translation;
                    (!t.is_empty()).then(|| t.clone())
                }
                PhraseElement::Term(m) => self.term_rendering(id, *m),
            })
            .collect();
        pieces.join(" ")
    }

    /// The rendering to use for one term occurrence: selection rules first
    /// (matched against the source question), then the term's resolved
    /// default.
    pub(crate) fn term_rendering(&self, id: PhraseId, m: TermMatchId) -> Option<String> {
        let renderings = self.terms.known_renderings(m);
        let term_text = self.terms.get_match(m).source_text(&self.registry);
        if let Some(selected) =
            crate::selection::select(&self.selection_rules, &term_text, &self.phrases[id.index()].source, &renderings)
        {
            return Some(selected.to_string());
        }
        self.terms.rendering(m)
    }

    fn apply_punctuation(&self, id: PhraseId, body: &str) -> String {
        match self.punctuation.get(&self.phrases[id.index()].kind) {
            Some(p) => format!("{}{}{}", p.leading, body, p.trailing),
            None => body.to_string(),
        }
    }

    fn push_owner_changes(&self, part_id: PartId, changes: &mut Vec<TranslationChange>) {
        for &owner in &self.part(part_id).owners {
            if !self.phrases[owner.index()].has_user_translation() {
                changes.push(TranslationChange { phrase: owner, kind: ChangeKind::Inferred });
            }
        }
    }

    /// Re-derive one Part's translation from its translated owners. A shrink
    /// (or emptying) frees text that may now belong to a sibling Part, so the
    /// recomputation cascades; the visited set bounds it.
    fn recompute_part(&mut self, part_id: PartId, visited: &mut HashSet<PartId>, changes: &mut Vec<TranslationChange>) {
        if !visited.insert(part_id) {
            return;
        }
        let owners: Vec<PhraseId> = self.part(part_id).owners.iter().copied().collect();

        let mut comparisons: Vec<String> = Vec::new();
        for &owner in &owners {
            let text = match &self.phrases[owner.index()].translation {
                TranslationState::User(t) => t.clone(),
                _ => continue,
            };
            let (_, body, _) = split_punctuation(&text);
            comparisons.push(self.mask_other_elements(owner, part_id, &body));
        }

        let old = self.part(part_id).translation.clone();
        let new = infer_translation(&comparisons);
        if new == old {
            return;
        }
        let shrank = new.chars().count() < old.chars().count();
        self.part_mut(part_id).translation = new;
        self.push_owner_changes(part_id, changes);

        if shrank {
            let siblings: Vec<PartId> = owners
                .iter()
                .flat_map(|&o| self.phrases[o.index()].part_ids().collect::<Vec<_>>())
                .filter(|&p| p != part_id)
                .collect();
            for sibling in siblings {
                self.recompute_part(sibling, visited, changes);
            }
        }
    }

    /// One owner's translation with every element *except* `part_id` blotted
    /// out: other parts' current translations and every known rendering of
    /// each key term (longest first).
    fn mask_other_elements(&self, owner: PhraseId, part_id: PartId, body: &str) -> String {
        let mut masked = body.to_string();
        for el in &self.phrases[owner.index()].elements {
            match el {
                PhraseElement::Part(p) if *p != part_id => {
                    let t = self.part(*p).translation.clone();
                    if !t.is_empty() && masked.contains(&t) {
                        masked = masked.replace(&t, &MASK.to_string());
                    }
                }
                PhraseElement::Term(m) => {
                    for rendering in self.terms.known_renderings(*m) {
                        if masked.contains(&rendering) {
                            masked = masked.replace(&rendering, &MASK.to_string());
                        }
                    }
                }
                _ => {}
            }
        }
        masked
    }
}

/// What the comparison strings agree the part means. Zero strings: nothing.
/// One string: its unmasked remainder. Several: the longest common substring
/// when long enough to trust (whole-word runs preferred), else a vote.
fn infer_translation(comparisons: &[String]) -> String {
    let strings: Vec<&str> = comparisons.iter().map(String::as_str).collect();
    match strings.len() {
        0 => String::new(),
        1 => strip_masks(strings[0]),
        _ => {
            if let Some(common) = common_to_all(&strings, true) {
                if common.chars().count() >= MIN_COMMON_LEN {
                    return common;
                }
            }
            if let Some(common) = common_to_all(&strings, false) {
                if common.chars().count() >= MIN_COMMON_LEN {
                    return common.trim().to_string();
                }
            }
            vote(&strings)
        }
    }
}

/// Longest substring of `strings[0]` contained in every other string, not
/// crossing a mask. `whole_words` restricts candidates to word-boundary runs.
/// Longest first, then leftmost.
fn common_to_all(strings: &[&str], whole_words: bool) -> Option<String> {
    let first: Vec<char> = strings[0].chars().collect();
    let n = first.len();
    for len in (1..=n).rev() {
        for start in 0..=(n - len) {
            let window = &first[start..start + len];
            if window.contains(&MASK) || window[0].is_whitespace() || window[len - 1].is_whitespace() {
                continue;
            }
            if whole_words {
                let starts_word = start == 0 || first[start - 1].is_whitespace();
                let ends_word = start + len == n || first[start + len].is_whitespace();
                if !starts_word || !ends_word {
                    continue;
                }
            }
            let candidate: String = window.iter().collect();
            if strings[1..].iter().all(|s| s.contains(&candidate)) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Frequency-weighted vote over pairwise common substrings. Each pair
/// contributes its longest common substring with weight √length; whole-word
/// candidates dominate partial ones outright.
fn vote(strings: &[&str]) -> String {
    let mut whole: HashMap<String, f64> = HashMap::new();
    let mut partial: HashMap<String, f64> = HashMap::new();

    for i in 0..strings.len() {
        for j in (i + 1)..strings.len() {
            let pair = [strings[i], strings[j]];
            let (candidate, aligned) = match common_to_all(&pair, true) {
                Some(c) => (c, true),
                None => match common_to_all(&pair, false) {
                    Some(c) => (c.trim().to_string(), false),
                    None => continue,
                },
            };
            let len = candidate.chars().count();
            if len < 2 {
                continue;
            }
            let bucket = if aligned { &mut whole } else { &mut partial };
            *bucket.entry(candidate).or_insert(0.0) += (len as f64).sqrt();
        }
    }

    let winner = |scores: HashMap<String, f64>| -> Option<String> {
        let mut ranked: Vec<(String, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1).then_with(|| b.0.chars().count().cmp(&a.0.chars().count())).then_with(|| a.0.cmp(&b.0))
        });
        ranked.into_iter().next().map(|(c, _)| c)
    };

    if !whole.is_empty() { winner(whole).unwrap_or_default() } else { winner(partial).unwrap_or_default() }
}

/// Split a translation into leading punctuation, body, and trailing
/// punctuation. Interior punctuation stays in the body.
fn split_punctuation(text: &str) -> (String, String, String) {
    let trimmed = text.trim();
    let Some(start) = trimmed.find(|c: char| c.is_alphanumeric()) else {
        return (trimmed.to_string(), String::new(), String::new());
    };
    let last = trimmed.rfind(|c: char| c.is_alphanumeric()).unwrap_or(start);
    let end = last + trimmed[last..].chars().next().map_or(1, char::len_utf8);
    (trimmed[..start].trim().to_string(), trimmed[start..end].to_string(), trimmed[end..].trim().to_string())
}

fn strip_masks(text: &str) -> String {
    collapse_spaces(&text.replace(MASK, " "))
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn dedup(changes: Vec<TranslationChange>) -> Vec<TranslationChange> {
    let mut seen = HashSet::new();
    changes.into_iter().filter(|c| seen.insert((c.phrase, c.kind))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reference;
    use crate::terms::TermTable;
    use crate::words::WordRegistry;

    fn build(term_defs: &[(&str, &[&str])], phrase_texts: &[&str]) -> Repository {
        let mut registry = WordRegistry::new();
        let mut terms = TermTable::new();
        for (text, renderings) in term_defs {
            let renderings = renderings.iter().map(|s| s.to_string()).collect();
            terms.ingest(&mut registry, text, renderings, Vec::new(), None);
        }
        terms.build_index();

        let mut repo = Repository::new(registry, terms, Vec::new(), Vec::new());
        for (i, text) in phrase_texts.iter().enumerate() {
            let reference =
                Reference { text: format!("GEN 1:{}", i + 1), start: 1001001 + i as u32, end: 1001001 + i as u32 };
            repo.add_phrase(text, "Details", reference, i as u32);
        }
        repo.absorb_sub_phrases();
        repo
    }

    fn part_translation(repo: &Repository, source: &str) -> String {
        repo.live_parts()
            .find(|(_, p)| p.source_text(&repo.registry) == source)
            .map(|(_, p)| p.translation.clone())
            .unwrap_or_else(|| panic!("no part {source:?}"))
    }

    #[test]
    fn whole_phrase_part_learns_directly_and_propagates() {
        let mut repo = build(&[], &["It was so.", "It was so."]);
        let changes = repo.set_translation(PhraseId(0), "Así fue.");

        assert_eq!(part_translation(&repo, "it was so"), "Así fue");
        assert!(changes.contains(&TranslationChange { phrase: PhraseId(0), kind: ChangeKind::UserEdited }));
        assert!(changes.contains(&TranslationChange { phrase: PhraseId(1), kind: ChangeKind::Inferred }));

        // The identical untranslated phrase shows the same text, with the
        // learned statement punctuation.
        assert_eq!(repo.display_translation(PhraseId(1)), "Así fue.");
        assert!(!repo.phrase(PhraseId(1)).has_user_translation());
    }

    #[test]
    fn template_propagates_and_elements_reconstruct() {
        let mut repo = build(
            &[("jesus", &["Jesús"]), ("moses", &["Moisés"]), ("david", &["David"])],
            &["What did Jesus say?", "What did Moses say?", "What did David say?", "What did David say today?"],
        );

        repo.set_translation(PhraseId(0), "¿Qué dijo Jesús?");
        assert!(repo.phrase(PhraseId(0)).all_terms_matched);
        repo.set_translation(PhraseId(1), "¿Qué dijo Moisés?");

        // Two agreeing translations pin the shared leading part.
        assert_eq!(part_translation(&repo, "what did"), "Qué dijo");

        // Same pattern, no user translation: filled template.
        assert!(matches!(repo.phrase(PhraseId(2)).translation, TranslationState::Inferred(_)));
        assert_eq!(repo.display_translation(PhraseId(2)), "¿Qué dijo David?");

        // Different pattern: reconstruction from element translations.
        assert!(matches!(repo.phrase(PhraseId(3)).translation, TranslationState::None));
        assert_eq!(repo.display_translation(PhraseId(3)), "¿Qué dijo David?");

        // Confirming the reconstructed text reproduces the same part
        // boundaries instead of disturbing them.
        let reconstructed = repo.display_translation(PhraseId(3));
        repo.set_translation(PhraseId(3), &reconstructed);
        assert!(repo.phrase(PhraseId(3)).all_terms_matched);
        assert_eq!(part_translation(&repo, "what did"), "Qué dijo");
    }

    #[test]
    fn single_part_phrase_with_term_strips_the_rendering() {
        let mut repo = build(&[("jesus", &["Jesús"])], &["Who was Jesus?"]);
        repo.set_translation(PhraseId(0), "¿Quién fue Jesús?");
        assert!(repo.phrase(PhraseId(0)).all_terms_matched);
        assert_eq!(part_translation(&repo, "who was"), "Quién fue");
    }

    #[test]
    fn disagreeing_owners_converge_by_voting_and_cascade() {
        let mut repo = build(
            &[("jesus", &["Jesús"]), ("moses", &["Moisés"])],
            &["What did Jesus say?", "What did Moses do?"],
        );

        repo.set_translation(PhraseId(0), "¿Qué dijo Jesús?");
        repo.set_translation(PhraseId(1), "¿Qué hizo Moisés?");

        // "dijo"/"hizo" disagree, so only the voted common word survives on
        // the shared part; the freed words cascade to the siblings.
        assert_eq!(part_translation(&repo, "what did"), "Qué");
        assert_eq!(part_translation(&repo, "say"), "dijo");
        assert_eq!(part_translation(&repo, "do"), "hizo");
    }

    #[test]
    fn unlocated_renderings_block_propagation() {
        let mut repo = build(&[("jesus", &[]), ("moses", &[])], &["What did Jesus say?", "What did Moses say?"]);

        let changes = repo.set_translation(PhraseId(0), "¿Qué dijo Jesús?");
        assert!(!repo.phrase(PhraseId(0)).all_terms_matched);
        assert!(matches!(repo.phrase(PhraseId(1)).translation, TranslationState::None));
        assert!(!changes.contains(&TranslationChange { phrase: PhraseId(1), kind: ChangeKind::Inferred }));
    }

    #[test]
    fn clearing_retracts_what_the_translation_taught() {
        let mut repo = build(
            &[("jesus", &["Jesús"]), ("moses", &["Moisés"])],
            &["What did Jesus say?", "What did Moses do?"],
        );
        repo.set_translation(PhraseId(0), "¿Qué dijo Jesús?");
        repo.set_translation(PhraseId(1), "¿Qué hizo Moisés?");
        assert_eq!(part_translation(&repo, "do"), "hizo");

        let changes = repo.clear_translation(PhraseId(1));
        assert!(changes.contains(&TranslationChange { phrase: PhraseId(1), kind: ChangeKind::Cleared }));
        assert!(matches!(repo.phrase(PhraseId(1)).translation, TranslationState::None));
        // "hizo" came only from the cleared phrase.
        assert_eq!(part_translation(&repo, "do"), "");
    }

    #[test]
    fn clearing_retracts_propagated_templates() {
        let mut repo = build(
            &[("jesus", &["Jesús"]), ("moses", &["Moisés"]), ("david", &["David"])],
            &["What did Jesus say?", "What did Moses say?", "What did David say?"],
        );
        repo.set_translation(PhraseId(0), "¿Qué dijo Jesús?");
        repo.set_translation(PhraseId(1), "¿Qué dijo Moisés?");
        assert!(matches!(repo.phrase(PhraseId(2)).translation, TranslationState::Inferred(_)));

        // Another user translation of the same shape keeps the template alive.
        let changes = repo.clear_translation(PhraseId(0));
        assert!(matches!(repo.phrase(PhraseId(2)).translation, TranslationState::Inferred(_)));
        assert_eq!(repo.display_translation(PhraseId(2)), "¿Qué dijo David?");
        assert!(changes.contains(&TranslationChange { phrase: PhraseId(2), kind: ChangeKind::Inferred }));

        // Clearing the last source takes the template with it.
        repo.clear_translation(PhraseId(1));
        assert!(matches!(repo.phrase(PhraseId(2)).translation, TranslationState::None));
        assert!(!repo.display_translation(PhraseId(2)).contains("dijo"));
    }

    #[test]
    fn clearing_with_no_other_knowledge_empties_the_parts() {
        let mut repo = build(&[], &["It was so."]);
        repo.set_translation(PhraseId(0), "Así fue.");
        repo.clear_translation(PhraseId(0));
        assert_eq!(part_translation(&repo, "it was so"), "");
        assert_eq!(repo.display_translation(PhraseId(0)), "");
    }

    #[test]
    fn infer_translation_degenerate_inputs() {
        assert_eq!(infer_translation(&[]), "");
        assert_eq!(infer_translation(&["solo \u{fffc} texto".to_string()]), "solo texto");
        // Nothing in common at all.
        assert_eq!(infer_translation(&["abc def".to_string(), "xyz uvw".to_string()]), "");
    }

    #[test]
    fn common_substrings_never_cross_a_mask() {
        let a = format!("antes {MASK} después");
        let b = format!("antes {MASK} después");
        // "antes" and "después" are common, but not the masked middle.
        let common = common_to_all(&[a.as_str(), b.as_str()], true).unwrap();
        assert_eq!(common, "después");
    }

    #[test]
    fn punctuation_split_keeps_interior_marks() {
        assert_eq!(
            split_punctuation("¿Qué dijo, según Juan?"),
            ("¿".to_string(), "Qué dijo, según Juan".to_string(), "?".to_string())
        );
        assert_eq!(split_punctuation("Así fue."), ("".to_string(), "Así fue".to_string(), ".".to_string()));
        assert_eq!(split_punctuation("..."), ("...".to_string(), "".to_string(), "".to_string()));
    }
}

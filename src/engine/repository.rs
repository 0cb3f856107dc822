//! The part/phrase repository.
//!
//! Owns every piece of shared mutable state: the word registry, the key-term
//! table, the part arena with its `(word count, first word)` interning index,
//! and the phrase list. Parsing registers each ordinary-text run here; runs
//! with an identical word sequence collapse onto one `Part`, which is how a
//! translation of "what did he" reaches every question that starts that way.
//!
//! After all phrases are parsed, the sub-phrase absorption pass hunts for
//! reusable wordings that only became visible once the whole collection was
//! seen: a Part owned by a single phrase is split around a shorter Part (or a
//! common word run shared with another Part) so the shared middle becomes one
//! multi-owner Part.
//!
//! Set `PHRASAL_DEBUG=1` to trace part splits.

use crate::engine::parser::{ParsedElement, parse};
use crate::engine::tokenize::{SubstitutionRule, tokenize};
use crate::selection::RenderingSelectionRule;
use crate::terms::TermTable;
use crate::words::{WordId, WordRegistry, canonicalize};
use crate::{
    Part, PartId, PhraseElement, PhraseId, PhraseKind, Reference, SequenceKey, TranslatablePhrase, TranslationState,
};
use bitflags::bitflags;
use std::collections::HashMap;

bitflags! {
    /// Options for [`Repository::filter`] text matching.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FilterFlags: u8 {
        const WHOLE_WORD = 1;
        const CASE_SENSITIVE = 1 << 1;
    }
}

/// Key-term facet of [`Repository::filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyTermFilter {
    #[default]
    All,
    /// Phrases whose key terms all have at least one known rendering.
    WithRenderings,
    /// Phrases with at least one key term lacking renderings.
    WithoutRenderings,
}

/// Sort keys for the phrase display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCriterion {
    /// Category, then sequence key.
    Default,
    Reference,
    SourceText,
    Translation,
    /// User-translated phrases first.
    Status,
}

/// Learned leading/trailing punctuation for one phrase kind.
#[derive(Debug, Clone, Default)]
pub(crate) struct Punctuation {
    pub leading: String,
    pub trailing: String,
}

pub(crate) struct Repository {
    pub registry: WordRegistry,
    pub terms: TermTable,
    pub selection_rules: Vec<RenderingSelectionRule>,
    substitutions: Vec<SubstitutionRule>,
    parts: Vec<Option<Part>>,
    parts_index: HashMap<(usize, WordId), Vec<PartId>>,
    pub phrases: Vec<TranslatablePhrase>,
    /// Display order; sorting permutes this, never the arena.
    pub order: Vec<PhraseId>,
    max_part_len: usize,
    pub(crate) punctuation: HashMap<PhraseKind, Punctuation>,
}

impl Repository {
    pub fn new(
        registry: WordRegistry,
        terms: TermTable,
        substitutions: Vec<SubstitutionRule>,
        selection_rules: Vec<RenderingSelectionRule>,
    ) -> Self {
        Repository {
            registry,
            terms,
            selection_rules,
            substitutions,
            parts: Vec::new(),
            parts_index: HashMap::new(),
            phrases: Vec::new(),
            order: Vec::new(),
            max_part_len: 0,
            punctuation: HashMap::new(),
        }
    }

    /// Parse one phrase and register its parts.
    pub fn add_phrase(&mut self, source: &str, category: &str, reference: Reference, seq: u32) -> PhraseId {
        let id = PhraseId(self.phrases.len() as u32);
        let words = tokenize(&mut self.registry, source, &self.substitutions);
        let parsed = parse(&mut self.registry, &self.terms, &words, &reference);

        let elements = parsed
            .into_iter()
            .map(|el| match el {
                ParsedElement::Words(run) => PhraseElement::Part(self.intern_part(run, id)),
                ParsedElement::Term(m) => PhraseElement::Term(m),
            })
            .collect();

        self.phrases.push(TranslatablePhrase {
            kind: PhraseKind::of(source),
            source: source.to_string(),
            category: category.to_string(),
            reference,
            seq: SequenceKey::from_integer(seq),
            elements,
            translation: TranslationState::None,
            all_terms_matched: false,
        });
        self.order.push(id);
        id
    }

    // --- Part arena -----------------------------------------------------

    pub fn part(&self, id: PartId) -> &Part {
        self.parts[id.index()].as_ref().expect("part was absorbed")
    }

    pub fn part_mut(&mut self, id: PartId) -> &mut Part {
        self.parts[id.index()].as_mut().expect("part was absorbed")
    }

    /// Live parts, in arena order.
    pub fn live_parts(&self) -> impl Iterator<Item = (PartId, &Part)> {
        self.parts.iter().enumerate().filter_map(|(i, p)| p.as_ref().map(|p| (PartId(i as u32), p)))
    }

    fn intern_part(&mut self, words: Vec<WordId>, owner: PhraseId) -> PartId {
        let id = self.get_or_create_part(&words);
        self.part_mut(id).owners.insert(owner);
        id
    }

    /// Reuse the Part holding exactly `words`, or create it (ownerless).
    fn get_or_create_part(&mut self, words: &[WordId]) -> PartId {
        debug_assert!(!words.is_empty());
        let key = (words.len(), words[0]);
        if let Some(bucket) = self.parts_index.get(&key) {
            for &candidate in bucket {
                if self.part(candidate).words == words {
                    return candidate;
                }
            }
        }
        let id = PartId(self.parts.len() as u32);
        self.parts.push(Some(Part::new(words.to_vec())));
        self.parts_index.entry(key).or_default().push(id);
        self.max_part_len = self.max_part_len.max(words.len());
        id
    }

    fn remove_from_index(&mut self, id: PartId, part: &Part) {
        let key = (part.words.len(), part.words[0]);
        if let Some(bucket) = self.parts_index.get_mut(&key) {
            bucket.retain(|&p| p != id);
        }
    }

    // --- Sub-phrase absorption -------------------------------------------

    /// Split single-owner Parts around shared sub-wordings. Runs once after
    /// all phrases are parsed, longest parts first, so a split's remainders
    /// are revisited when the loop reaches their length.
    pub fn absorb_sub_phrases(&mut self) {
        let debug = std::env::var_os("PHRASAL_DEBUG").is_some();
        for n in (2..=self.max_part_len).rev() {
            let candidates: Vec<PartId> = self
                .live_parts()
                .filter(|(_, p)| p.words.len() == n && p.owners.len() == 1)
                .map(|(id, _)| id)
                .collect();

            for part_id in candidates {
                // A split earlier in this round may have reused or absorbed it.
                let still_eligible = self.parts[part_id.index()]
                    .as_ref()
                    .is_some_and(|p| p.words.len() == n && p.owners.len() == 1);
                if !still_eligible {
                    continue;
                }

                let found = match self.find_existing_sub(part_id) {
                    Some((offset, sub)) => Some((offset, sub)),
                    None => self
                        .find_common_run(part_id)
                        .map(|(offset, run)| (offset, self.get_or_create_part(&run))),
                };

                if let Some((offset, sub_id)) = found {
                    if debug {
                        eprintln!(
                            "[absorb:split] part={:?} offset={} sub={:?}",
                            self.part(part_id).source_text(&self.registry),
                            offset,
                            self.part(sub_id).source_text(&self.registry),
                        );
                    }
                    self.split_part(part_id, offset, sub_id);
                }
            }
        }
    }

    /// An existing shorter Part whose sequence is literally contained in
    /// `part_id`'s words. Longest sub-length first, then earliest offset.
    fn find_existing_sub(&self, part_id: PartId) -> Option<(usize, PartId)> {
        let part = self.part(part_id);
        let len = part.words.len();
        for sub_len in (2..len).rev() {
            for offset in 0..=(len - sub_len) {
                let key = (sub_len, part.words[offset]);
                let Some(bucket) = self.parts_index.get(&key) else { continue };
                for &q in bucket {
                    if self.part(q).words == part.words[offset..offset + sub_len] {
                        return Some((offset, q));
                    }
                }
            }
        }
        None
    }

    /// Longest common contiguous word run (>= 2 words, shorter than the part)
    /// shared with another single-owner Part. Lets two overlapping wordings
    /// discover their shared middle even though no Part holds it yet; the
    /// other Part is then absorbed by the containment rule above.
    fn find_common_run(&self, part_id: PartId) -> Option<(usize, Vec<WordId>)> {
        let part = self.part(part_id);
        let words = &part.words;
        // (run length, offset, other part id) — longest, then earliest, then
        // smallest id.
        let mut best: Option<(usize, usize, PartId)> = None;

        for (qid, q) in self.live_parts() {
            if qid == part_id || q.owners.len() != 1 {
                continue;
            }
            for i in 0..words.len() {
                for j in 0..q.words.len() {
                    let mut l = 0;
                    while i + l < words.len() && j + l < q.words.len() && words[i + l] == q.words[j + l] {
                        l += 1;
                    }
                    if l >= 2 && l < words.len() {
                        let candidate = (l, i, qid);
                        let better = match best {
                            None => true,
                            Some((bl, bi, bq)) => l > bl || (l == bl && (i < bi || (i == bi && qid < bq))),
                        };
                        if better {
                            best = Some(candidate);
                        }
                    }
                }
            }
        }

        best.map(|(l, offset, _)| (offset, words[offset..offset + l].to_vec()))
    }

    /// Replace `part_id` in its sole owner with lead + `sub_id` + trail and
    /// drop it from the repository.
    fn split_part(&mut self, part_id: PartId, offset: usize, sub_id: PartId) {
        let part = self.parts[part_id.index()].take().expect("splitting a live part");
        self.remove_from_index(part_id, &part);
        let owner = *part.owners.iter().next().expect("split part has one owner");
        let sub_len = self.part(sub_id).words.len();

        let lead = (offset > 0).then(|| self.get_or_create_part(&part.words[..offset]));
        let trail =
            (offset + sub_len < part.words.len()).then(|| self.get_or_create_part(&part.words[offset + sub_len..]));

        for id in [lead, Some(sub_id), trail].into_iter().flatten() {
            self.part_mut(id).owners.insert(owner);
        }

        let mut elements = Vec::with_capacity(self.phrases[owner.index()].elements.len() + 2);
        for el in &self.phrases[owner.index()].elements {
            if *el == PhraseElement::Part(part_id) {
                elements.extend(lead.map(PhraseElement::Part));
                elements.push(PhraseElement::Part(sub_id));
                elements.extend(trail.map(PhraseElement::Part));
            } else {
                elements.push(*el);
            }
        }
        self.phrases[owner.index()].elements = elements;
    }

    // --- Queries -----------------------------------------------------------

    pub fn phrase(&self, id: PhraseId) -> &TranslatablePhrase {
        &self.phrases[id.index()]
    }

    /// The structural pattern of a phrase: its ordered Part identities with
    /// key terms as interchangeable slots.
    pub fn pattern_key(&self, id: PhraseId) -> Vec<Option<PartId>> {
        self.phrases[id.index()]
            .elements
            .iter()
            .map(|el| match el {
                PhraseElement::Part(p) => Some(*p),
                PhraseElement::Term(_) => None,
            })
            .collect()
    }

    /// Find a phrase by source text, optionally pinned to a reference.
    pub fn get_phrase(&self, reference: Option<&str>, text: &str) -> Option<PhraseId> {
        let needle = canonicalize(text.trim());
        self.order.iter().copied().find(|&id| {
            let p = &self.phrases[id.index()];
            reference.is_none_or(|r| p.reference.text == r) && canonicalize(p.source.trim()) == needle
        })
    }

    /// Matching subset of the phrase list, in display order. Never mutates
    /// the canonical list.
    pub fn filter(
        &self,
        text_pattern: Option<&str>,
        flags: FilterFlags,
        key_terms: KeyTermFilter,
        reference_predicate: Option<&dyn Fn(&Reference) -> bool>,
    ) -> Vec<PhraseId> {
        let text_regex = text_pattern.map(|pattern| {
            let mut source = regex::escape(pattern);
            if flags.contains(FilterFlags::WHOLE_WORD) {
                source = format!(r"\b{source}\b");
            }
            if !flags.contains(FilterFlags::CASE_SENSITIVE) {
                source = format!("(?i){source}");
            }
            regex::Regex::new(&source).expect("escaped pattern always compiles")
        });

        self.order
            .iter()
            .copied()
            .filter(|&id| {
                let p = &self.phrases[id.index()];
                if let Some(re) = &text_regex {
                    if !re.is_match(&p.source) {
                        return false;
                    }
                }
                if let Some(pred) = reference_predicate {
                    if !pred(&p.reference) {
                        return false;
                    }
                }
                match key_terms {
                    KeyTermFilter::All => true,
                    KeyTermFilter::WithRenderings => self.term_ids_of(id).iter().all(|&m| !self.terms.known_renderings(m).is_empty()),
                    KeyTermFilter::WithoutRenderings => {
                        self.term_ids_of(id).iter().any(|&m| self.terms.known_renderings(m).is_empty())
                    }
                }
            })
            .collect()
    }

    fn term_ids_of(&self, id: PhraseId) -> Vec<crate::terms::TermMatchId> {
        self.phrases[id.index()]
            .elements
            .iter()
            .filter_map(|el| match el {
                PhraseElement::Term(m) => Some(*m),
                PhraseElement::Part(_) => None,
            })
            .collect()
    }

    /// Re-order the display list. Stable with respect to the previous order.
    pub fn sort(&mut self, criterion: SortCriterion, ascending: bool) {
        let mut order = std::mem::take(&mut self.order);
        order.sort_by(|&a, &b| {
            let ord = self.compare(criterion, a, b);
            if ascending { ord } else { ord.reverse() }
        });
        self.order = order;
    }

    fn compare(&self, criterion: SortCriterion, a: PhraseId, b: PhraseId) -> std::cmp::Ordering {
        let (pa, pb) = (&self.phrases[a.index()], &self.phrases[b.index()]);
        match criterion {
            SortCriterion::Default => pa.category.cmp(&pb.category).then_with(|| pa.seq.cmp(&pb.seq)),
            SortCriterion::Reference => {
                (pa.reference.start, pa.reference.end, &pa.seq).cmp(&(pb.reference.start, pb.reference.end, &pb.seq))
            }
            SortCriterion::SourceText => pa.source.to_lowercase().cmp(&pb.source.to_lowercase()),
            SortCriterion::Translation => self.display_translation(a).cmp(&self.display_translation(b)),
            SortCriterion::Status => {
                pb.has_user_translation().cmp(&pa.has_user_translation()).then_with(|| pa.seq.cmp(&pb.seq))
            }
        }
        .then(a.cmp(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(term_texts: &[&str], phrase_texts: &[&str]) -> Repository {
        let mut registry = WordRegistry::new();
        let mut terms = TermTable::new();
        for text in term_texts {
            terms.ingest(&mut registry, text, Vec::new(), Vec::new(), None);
        }
        terms.build_index();

        let mut repo = Repository::new(registry, terms, Vec::new(), Vec::new());
        for (i, text) in phrase_texts.iter().enumerate() {
            let reference = Reference { text: format!("GEN 1:{}", i + 1), start: 1001001 + i as u32, end: 1001001 + i as u32 };
            repo.add_phrase(text, "Details", reference, i as u32);
        }
        repo.absorb_sub_phrases();
        repo
    }

    fn part_texts(repo: &Repository, id: PhraseId) -> Vec<String> {
        repo.phrase(id)
            .elements
            .iter()
            .filter_map(|el| match el {
                PhraseElement::Part(p) => Some(repo.part(*p).source_text(&repo.registry)),
                PhraseElement::Term(_) => None,
            })
            .collect()
    }

    #[test]
    fn identical_runs_share_one_part() {
        let repo = build(&["jesus"], &["What did Jesus say?", "What did Jesus do?"]);
        let p0 = repo.pattern_key(PhraseId(0));
        let p1 = repo.pattern_key(PhraseId(1));
        // "what did" precedes the term in both; the leading part is shared.
        assert_eq!(p0[0], p1[0]);
        let shared = p0[0].unwrap();
        assert_eq!(repo.part(shared).owners.len(), 2);
    }

    #[test]
    fn interning_invariant_no_duplicate_sequences() {
        let repo = build(
            &["god", "jesus"],
            &[
                "What did Jesus say about God?",
                "What did Jesus do?",
                "Who created the heavens?",
                "Who created the earth and the heavens?",
            ],
        );
        let live: Vec<&Part> = repo.live_parts().map(|(_, p)| p).collect();
        for (i, a) in live.iter().enumerate() {
            for b in live.iter().skip(i + 1) {
                assert_ne!(a.words, b.words, "two live parts share a word sequence");
            }
        }
    }

    #[test]
    fn absorption_discovers_shared_middle() {
        let repo = build(&[], &["the elders of the city", "elders of the city met"]);

        assert_eq!(part_texts(&repo, PhraseId(0)), ["the", "elders of the city"]);
        assert_eq!(part_texts(&repo, PhraseId(1)), ["elders of the city", "met"]);

        // One shared Part owns both phrases.
        let shared = repo
            .live_parts()
            .find(|(_, p)| p.source_text(&repo.registry) == "elders of the city")
            .map(|(id, _)| id)
            .expect("shared part exists");
        assert_eq!(repo.part(shared).owners.len(), 2);
    }

    #[test]
    fn absorption_reuses_contained_existing_part() {
        let repo = build(&[], &["who was the man", "who was the man who went to the store"]);
        let shared = repo
            .live_parts()
            .find(|(_, p)| p.source_text(&repo.registry) == "who was the man")
            .map(|(id, _)| id)
            .expect("shared part exists");
        assert_eq!(repo.part(shared).owners.len(), 2);
        assert_eq!(part_texts(&repo, PhraseId(1)), ["who was the man", "who went to the store"]);
    }

    #[test]
    fn multi_owner_parts_are_not_split() {
        // "in the beginning" is shared by two phrases; a third phrase reusing
        // only "the beginning" must not tear the shared part apart.
        let repo = build(
            &[],
            &["in the beginning was light", "in the beginning was darkness", "the beginning had come"],
        );
        let shared = repo
            .live_parts()
            .find(|(_, p)| p.source_text(&repo.registry).starts_with("in the beginning"))
            .expect("shared part exists");
        assert_eq!(shared.1.owners.len(), 2);
    }

    #[test]
    fn get_phrase_by_text_and_reference() {
        let repo = build(&[], &["What happened next?", "Where did they go?"]);
        assert_eq!(repo.get_phrase(None, "what happened next?"), Some(PhraseId(0)));
        assert_eq!(repo.get_phrase(Some("GEN 1:2"), "Where did they go?"), Some(PhraseId(1)));
        assert_eq!(repo.get_phrase(Some("GEN 1:1"), "Where did they go?"), None);
        assert_eq!(repo.get_phrase(None, "no such question"), None);
    }

    #[test]
    fn filter_by_text_whole_word_and_reference() {
        let repo = build(&[], &["Who was the king?", "What is a kingdom?", "Where did the king go?"]);

        let loose = repo.filter(Some("king"), FilterFlags::empty(), KeyTermFilter::All, None);
        assert_eq!(loose.len(), 3);

        let whole = repo.filter(Some("king"), FilterFlags::WHOLE_WORD, KeyTermFilter::All, None);
        assert_eq!(whole, vec![PhraseId(0), PhraseId(2)]);

        let pred = |r: &Reference| r.start >= 1001003;
        let by_ref = repo.filter(None, FilterFlags::empty(), KeyTermFilter::All, Some(&pred));
        assert_eq!(by_ref, vec![PhraseId(2)]);
    }

    #[test]
    fn filter_by_key_term_renderings() {
        let mut registry = WordRegistry::new();
        let mut terms = TermTable::new();
        terms.ingest(&mut registry, "jesus", vec!["Jesús".into()], Vec::new(), None);
        terms.ingest(&mut registry, "moses", Vec::new(), Vec::new(), None);
        terms.build_index();
        let mut repo = Repository::new(registry, terms, Vec::new(), Vec::new());
        let reference = Reference { text: "GEN 1:1".into(), start: 1001001, end: 1001001 };
        repo.add_phrase("What did Jesus say?", "Details", reference.clone(), 0);
        repo.add_phrase("What did Moses say?", "Details", reference, 1);
        repo.absorb_sub_phrases();

        let with = repo.filter(None, FilterFlags::empty(), KeyTermFilter::WithRenderings, None);
        assert_eq!(with, vec![PhraseId(0)]);
        let without = repo.filter(None, FilterFlags::empty(), KeyTermFilter::WithoutRenderings, None);
        assert_eq!(without, vec![PhraseId(1)]);
    }

    #[test]
    fn sort_is_stable_and_reversible() {
        let mut repo = build(&[], &["banana question", "apple question", "cherry question"]);
        repo.sort(SortCriterion::SourceText, true);
        assert_eq!(repo.order, vec![PhraseId(1), PhraseId(0), PhraseId(2)]);
        repo.sort(SortCriterion::SourceText, false);
        assert_eq!(repo.order, vec![PhraseId(2), PhraseId(0), PhraseId(1)]);
        repo.sort(SortCriterion::Default, true);
        assert_eq!(repo.order, vec![PhraseId(0), PhraseId(1), PhraseId(2)]);
    }
}

//! Greedy longest-match phrase parsing.
//!
//! The parser walks one tokenized phrase and carves it into key-term
//! occurrences and runs of ordinary words:
//!
//! ```text
//! did they go up the mountain
//! ├───────┤ ├───┤ ├──────────┤
//!  pending   term   pending        terms: {"go up", "go"}
//! ```
//!
//! At each position the candidate set is every realization whose first word
//! matches the current word (retrying with the word's stem on a miss, and
//! recording the discovered equivalence). The window then extends one word at
//! a time, narrowing the live set; candidates that complete are remembered as
//! the best-so-far, and the longest fully satisfied candidate is accepted the
//! moment no live candidate wants more words. A position with no acceptable
//! candidate feeds the pending ordinary-text run instead.
//!
//! Emitted word runs are *not* interned parts yet; interning is the
//! repository's job.
//!
//! Set `PHRASAL_DEBUG=1` to print per-position candidate traces.

use crate::Reference;
use crate::stem::stem;
use crate::terms::{Realization, TermMatchId, TermTable};
use crate::words::{WordId, WordRegistry};

/// One parsed element: a candidate part (un-interned word run) or a key-term
/// occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedElement {
    Words(Vec<WordId>),
    Term(TermMatchId),
}

/// Parse `words` against the key-term table.
pub(crate) fn parse(
    registry: &mut WordRegistry,
    terms: &TermTable,
    words: &[WordId],
    reference: &Reference,
) -> Vec<ParsedElement> {
    let debug = std::env::var_os("PHRASAL_DEBUG").is_some();
    let mut out: Vec<ParsedElement> = Vec::new();
    let mut pending: Vec<WordId> = Vec::new();
    let mut i = 0;

    while i < words.len() {
        let remaining = words.len() - i;
        let mut live: Vec<&Realization> = lookup(registry, terms, words[i])
            .into_iter()
            .filter(|r| r.words.len() <= remaining)
            .filter(|r| terms.get_match(r.match_id).applies_to(reference))
            .collect();

        if debug && !live.is_empty() {
            eprintln!("[parse:candidates] at={} word={:?} live={}", i, registry.text(words[i]), live.len());
        }

        // Longest fully satisfied candidate seen for this window.
        let mut best: Option<&Realization> = None;
        let mut k = 0;
        let accepted = loop {
            if live.is_empty() {
                break best;
            }
            if i + k == words.len() {
                // Nothing left to extend with; live candidates all want more.
                break best;
            }
            let w = words[i + k];
            k += 1;
            live.retain(|r| registry.matches(r.words[k - 1], w));
            let (complete, still_hungry): (Vec<&Realization>, Vec<&Realization>) =
                live.into_iter().partition(|r| r.words.len() == k);
            live = still_hungry;
            for r in complete {
                if best.is_none_or(|b| beats(terms, r, b)) {
                    best = Some(r);
                }
            }
        };

        match accepted {
            Some(r) => {
                if debug {
                    eprintln!(
                        "[parse:accept] at={} len={} term={:?}",
                        i,
                        r.words.len(),
                        terms.get_match(r.match_id).primary_term()
                    );
                }
                if !pending.is_empty() {
                    out.push(ParsedElement::Words(std::mem::take(&mut pending)));
                }
                out.push(ParsedElement::Term(r.match_id));
                i += r.words.len();
            }
            None => {
                pending.push(words[i]);
                i += 1;
            }
        }
    }

    if !pending.is_empty() {
        out.push(ParsedElement::Words(pending));
    }
    out
}

/// Candidates whose first word matches `word`, retrying with its stem.
fn lookup<'t>(registry: &mut WordRegistry, terms: &'t TermTable, word: WordId) -> &'t [Realization] {
    let direct = terms.candidates_for(word);
    if !direct.is_empty() {
        return direct;
    }
    let stemmed = stem(registry.text(word));
    if stemmed == registry.text(word) {
        return &[];
    }
    let stem_id = registry.intern(&stemmed);
    let via_stem = terms.candidates_for(stem_id);
    if !via_stem.is_empty() {
        // Future window comparisons and lookups hit without re-stemming.
        registry.record_equivalence(stem_id, word);
    }
    via_stem
}

/// Deterministic preference among fully satisfied candidates: longer wins;
/// equal lengths break on the smallest represented term id, then match id.
/// Never table order.
fn beats(terms: &TermTable, a: &Realization, b: &Realization) -> bool {
    a.words
        .len()
        .cmp(&b.words.len())
        .then_with(|| terms.get_match(b.match_id).primary_term().cmp(terms.get_match(a.match_id).primary_term()))
        .then(b.match_id.cmp(&a.match_id))
        .is_gt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tokenize::tokenize;

    fn setup(term_texts: &[&str]) -> (WordRegistry, TermTable) {
        let mut registry = WordRegistry::new();
        let mut terms = TermTable::new();
        for text in term_texts {
            terms.ingest(&mut registry, text, Vec::new(), Vec::new(), None);
        }
        terms.build_index();
        (registry, terms)
    }

    fn any_reference() -> Reference {
        Reference { text: "GEN 1:1".into(), start: 1001001, end: 1001001 }
    }

    /// Render parsed elements as readable strings for assertions.
    fn rendered(registry: &WordRegistry, terms: &TermTable, elements: &[ParsedElement]) -> Vec<String> {
        elements
            .iter()
            .map(|el| match el {
                ParsedElement::Words(words) => {
                    words.iter().map(|&w| registry.text(w)).collect::<Vec<_>>().join(" ")
                }
                ParsedElement::Term(id) => format!("[{}]", terms.get_match(*id).source_text(registry)),
            })
            .collect()
    }

    fn parse_text(registry: &mut WordRegistry, terms: &TermTable, text: &str) -> Vec<ParsedElement> {
        let words = tokenize(registry, text, &[]);
        parse(registry, terms, &words, &any_reference())
    }

    #[test]
    fn longest_match_wins_over_shorter_prefix() {
        let (mut registry, terms) = setup(&["go up", "go"]);
        let parsed = parse_text(&mut registry, &terms, "did they go up the mountain");
        assert_eq!(rendered(&registry, &terms, &parsed), ["did they", "[go up]", "the mountain"]);
    }

    #[test]
    fn failed_extension_falls_back_to_satisfied_prefix() {
        let (mut registry, terms) = setup(&["go up high", "go"]);
        let parsed = parse_text(&mut registry, &terms, "did they go up the mountain");
        // "go up high" dies at "the"; the fully satisfied "go" is accepted.
        assert_eq!(rendered(&registry, &terms, &parsed), ["did they", "[go]", "up the mountain"]);
    }

    #[test]
    fn optional_word_matches_both_surfaces_as_one_term() {
        let (mut registry, terms) = setup(&["(to) rejoice"]);
        let with = parse_text(&mut registry, &terms, "they want to rejoice today");
        let without = parse_text(&mut registry, &terms, "they rejoice today");

        let term_of = |elements: &[ParsedElement]| {
            elements
                .iter()
                .find_map(|el| match el {
                    ParsedElement::Term(id) => Some(*id),
                    _ => None,
                })
                .expect("term matched")
        };
        assert_eq!(term_of(&with), term_of(&without));
        assert_eq!(rendered(&registry, &terms, &with), ["they want", "[rejoice]", "today"]);
    }

    #[test]
    fn stem_fallback_matches_inflected_words() {
        let (mut registry, terms) = setup(&["rejoice"]);
        let parsed = parse_text(&mut registry, &terms, "the people rejoiced loudly");
        assert_eq!(rendered(&registry, &terms, &parsed), ["the people", "[rejoice]", "loudly"]);

        // The discovered equivalence is recorded for future lookups.
        let base = registry.get("rejoice").unwrap();
        let inflected = registry.get("rejoiced").unwrap();
        assert!(registry.are_equivalent(base, inflected));
    }

    #[test]
    fn stem_fallback_inside_the_window() {
        let (mut registry, terms) = setup(&["go up"]);
        let parsed = parse_text(&mut registry, &terms, "he goes up the hill");
        assert_eq!(rendered(&registry, &terms, &parsed), ["he", "[go up]", "the hill"]);
    }

    #[test]
    fn no_candidates_yields_one_part() {
        let (mut registry, terms) = setup(&["zebra"]);
        let parsed = parse_text(&mut registry, &terms, "what did he say");
        assert_eq!(rendered(&registry, &terms, &parsed), ["what did he say"]);
    }

    #[test]
    fn candidate_longer_than_remaining_text_is_ignored() {
        let (mut registry, terms) = setup(&["mountain of the lord"]);
        let parsed = parse_text(&mut registry, &terms, "they saw the mountain");
        assert_eq!(rendered(&registry, &terms, &parsed), ["they saw the mountain"]);
    }

    #[test]
    fn equal_length_tie_breaks_on_term_id() {
        // "holy spirits" satisfies both terms at the same window: "holy
        // spirits" exactly, "holy spirit" through the stem fallback. The
        // lexicographically smaller term id wins, regardless of ingestion
        // order.
        for order in [["holy spirit", "holy spirits"], ["holy spirits", "holy spirit"]] {
            let (mut registry, terms) = setup(&order);
            let parsed = parse_text(&mut registry, &terms, "the holy spirits came");
            let term = parsed
                .iter()
                .find_map(|el| match el {
                    ParsedElement::Term(id) => Some(*id),
                    _ => None,
                })
                .expect("term matched");
            assert_eq!(terms.get_match(term).primary_term(), "holy spirit");
        }
    }

    #[test]
    fn reference_restricted_candidates_are_skipped_elsewhere() {
        let mut registry = WordRegistry::new();
        let mut terms = TermTable::new();
        let rule = crate::terms::TermRule { match_for_ref_only: true, ..Default::default() };
        terms.ingest(&mut registry, "rock", Vec::new(), vec![2002010], Some(&rule));
        terms.build_index();

        let words = tokenize(&mut registry, "water from the rock", &[]);
        let near = Reference { text: "EXO 2:10".into(), start: 2002010, end: 2002010 };
        let far = Reference { text: "GEN 1:1".into(), start: 1001001, end: 1001001 };

        let here = parse(&mut registry, &terms, &words, &near);
        assert!(here.iter().any(|el| matches!(el, ParsedElement::Term(_))));

        let elsewhere = parse(&mut registry, &terms, &words, &far);
        assert!(elsewhere.iter().all(|el| matches!(el, ParsedElement::Words(_))));
    }
}

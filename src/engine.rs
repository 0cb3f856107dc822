//! Phrase decomposition and translation-inference engine.
//!
//! This module is the internal entry point behind [`crate::Session`]. The
//! engine is split into focused submodules under `src/engine/`, with the
//! repository as the shared hub.
//!
//! ## How the parts work together
//!
//! Loading a project is a pipeline per phrase:
//!
//! ```text
//! key terms ──┐
//!             │  TermTable::ingest + build_index   (../terms.rs)
//!             └──────────────┬─────────────────────
//!                            │
//! phrase ── tokenize ────────┼─ substitutions, word interning (tokenize.rs)
//!                            v
//!                   parse (parser.rs)
//!                     - greedy longest match against term realizations
//!                     - stemming fallback (../stem.rs)
//!                            │
//!                            v
//!                   Repository::add_phrase (repository.rs)
//!                     - intern ordinary-word runs as shared Parts
//!                            │
//!                            v  (once, after all phrases)
//!                   Repository::absorb_sub_phrases
//!                     - split single-owner Parts around shared wordings
//! ```
//!
//! From then on the session is interactive: `set_translation` /
//! `clear_translation` (inference.rs) learn punctuation conventions, build and
//! propagate templates, and recompute shared-Part translations;
//! `display_translation` assembles what to show for any phrase.
//!
//! ## Responsibilities by module
//!
//! - `tokenize.rs`: normalization, phrase substitutions, word scanning.
//! - `parser.rs`: carves a tokenized phrase into key-term occurrences and
//!   ordinary-word runs.
//! - `repository.rs`: the part arena with interning and sub-phrase
//!   absorption, the phrase list, filtering and sorting.
//! - `inference.rs`: everything learned from user translations, and the
//!   displayed translation of every phrase.
//!
//! ## Debugging
//!
//! Set `PHRASAL_DEBUG=1` to print parser candidate traces and part splits.

#[path = "engine/inference.rs"]
mod inference;
#[path = "engine/parser.rs"]
mod parser;
#[path = "engine/repository.rs"]
mod repository;
#[path = "engine/tokenize.rs"]
mod tokenize;

pub use inference::{ChangeKind, TranslationChange};
pub use repository::{FilterFlags, KeyTermFilter, SortCriterion};
pub(crate) use repository::Repository;
pub use tokenize::SubstitutionRule;

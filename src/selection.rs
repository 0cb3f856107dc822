//! Context-sensitive rendering selection.
//!
//! When a key term has more than one known rendering, an ordered list of
//! enabled rules decides which one fits the surrounding question. Each rule
//! pairs a question-matching regex template (with `{0}` standing for the term)
//! with a rendering-matching regex. The first rule whose question pattern
//! matches the phrase and whose rendering pattern matches some candidate wins;
//! with no winner the caller falls back to the term's default rendering.
//!
//! A malformed pattern is not a fault: the rule is marked invalid, carries the
//! compile error as its message, and simply never matches.

use regex::Regex;

/// Placeholder in a question template that stands for the key term.
const TERM_PLACEHOLDER: &str = "{0}";

#[derive(Debug)]
pub struct RenderingSelectionRule {
    name: String,
    question_template: String,
    rendering_pattern: String,
    enabled: bool,
    rendering_regex: Option<Regex>,
    error: Option<String>,
}

impl RenderingSelectionRule {
    pub fn new(name: impl Into<String>, question_template: impl Into<String>, rendering_pattern: impl Into<String>) -> Self {
        let question_template = question_template.into();
        let rendering_pattern = rendering_pattern.into();

        let mut error = None;
        let rendering_regex = match Regex::new(&rendering_pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                error = Some(format!("invalid rendering pattern: {e}"));
                None
            }
        };
        // Validate the question template eagerly with a dummy term so a bad
        // template surfaces at construction, not first use.
        if error.is_none() {
            if let Err(e) = Regex::new(&question_template.replace(TERM_PLACEHOLDER, "x")) {
                error = Some(format!("invalid question pattern: {e}"));
            }
        }

        RenderingSelectionRule { name: name.into(), question_template, rendering_pattern, enabled: true, rendering_regex, error }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Why the rule is invalid, if it is.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn question_matches(&self, term_text: &str, phrase_text: &str) -> bool {
        let pattern = self.question_template.replace(TERM_PLACEHOLDER, &regex::escape(term_text));
        match Regex::new(&pattern) {
            Ok(re) => re.is_match(phrase_text),
            // Template validated at construction; a term that still breaks it
            // just fails to match.
            Err(_) => false,
        }
    }

    fn pick<'a>(&self, renderings: &'a [String]) -> Option<&'a str> {
        let re = self.rendering_regex.as_ref()?;
        renderings.iter().find(|r| re.is_match(r)).map(String::as_str)
    }
}

/// Evaluate `rules` in order against one key-term occurrence. Returns the
/// first rule-selected rendering, or `None` when no enabled, valid rule
/// matches both sides.
pub(crate) fn select<'a>(
    rules: &[RenderingSelectionRule],
    term_text: &str,
    phrase_text: &str,
    renderings: &'a [String],
) -> Option<&'a str> {
    rules
        .iter()
        .filter(|rule| rule.enabled && rule.is_valid())
        .filter(|rule| rule.question_matches(term_text, phrase_text))
        .find_map(|rule| rule.pick(renderings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = vec![
            RenderingSelectionRule::new("follows 'who'", r"who .*\b{0}\b", "^señor"),
            RenderingSelectionRule::new("anywhere", r"\b{0}\b", "^amo"),
        ];
        let candidates = renderings(&["amo", "señor"]);

        // Both rules match the phrase; R1 is listed first and must win.
        let chosen = select(&rules, "lord", "who is the lord of the harvest?", &candidates);
        assert_eq!(chosen, Some("señor"));
    }

    #[test]
    fn falls_through_to_later_rules() {
        let rules = vec![
            RenderingSelectionRule::new("follows 'who'", r"who .*\b{0}\b", "^señor"),
            RenderingSelectionRule::new("anywhere", r"\b{0}\b", "^amo"),
        ];
        let candidates = renderings(&["amo", "señor"]);

        let chosen = select(&rules, "lord", "what did the lord say?", &candidates);
        assert_eq!(chosen, Some("amo"));
    }

    #[test]
    fn no_rule_matches_returns_none() {
        let rules = vec![RenderingSelectionRule::new("narrow", r"never {0}", ".*")];
        let candidates = renderings(&["amo"]);
        assert_eq!(select(&rules, "lord", "what did the lord say?", &candidates), None);
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let mut rule = RenderingSelectionRule::new("anywhere", r"\b{0}\b", "^amo");
        rule.set_enabled(false);
        let candidates = renderings(&["amo"]);
        assert_eq!(select(&[rule], "lord", "the lord spoke", &candidates), None);
    }

    #[test]
    fn invalid_patterns_mark_the_rule_and_never_match() {
        let rule = RenderingSelectionRule::new("broken", r"\b{0}\b", "(unclosed");
        assert!(!rule.is_valid());
        assert!(rule.error_message().unwrap().contains("rendering pattern"));

        let candidates = renderings(&["amo"]);
        assert_eq!(select(&[rule], "lord", "the lord spoke", &candidates), None);

        let rule = RenderingSelectionRule::new("broken question", r"(unclosed {0}", ".*");
        assert!(!rule.is_valid());
        assert!(rule.error_message().unwrap().contains("question pattern"));
    }

    #[test]
    fn term_text_is_escaped_into_the_template() {
        // A term containing regex metacharacters must be matched literally.
        let rules = vec![RenderingSelectionRule::new("literal", r"{0}", "^x")];
        let candidates = renderings(&["x"]);
        assert_eq!(select(&rules, "a.b", "the a.b term", &candidates), Some("x"));
        assert_eq!(select(&rules, "a.b", "the aXb term", &candidates), None);
    }
}

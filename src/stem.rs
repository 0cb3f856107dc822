//! Suffix-rule stemmer used as the matching fallback.
//!
//! When a phrase word fails to line up with a key-term word directly, the
//! parser compares stems instead. The rules below are deliberately small
//! detachment rules (plural, past, progressive) rather than a full Porter
//! implementation: both sides of every comparison run through the same
//! function, so self-consistency matters more than linguistic completeness.
//!
//! Comparative endings (`-er`, `-est`) are not detached; in this domain they
//! collide with too many base forms ("father", "priest").

/// Reduce `word` to a stem. Returns the input unchanged when no rule applies
/// or when detaching a suffix would leave too little behind.
pub(crate) fn stem(word: &str) -> String {
    if word.chars().count() < 4 {
        return word.to_string();
    }

    let mut s = strip_plural(word);
    s = strip_past_or_progressive(&s);

    // Silent final e is dropped so "rejoice"/"rejoiced" and "love"/"loving"
    // land on the same stem.
    if s.len() >= 4 && s.ends_with('e') && !s.ends_with("ee") {
        s.truncate(s.len() - 1);
    }

    s
}

fn strip_plural(word: &str) -> String {
    if let Some(base) = word.strip_suffix("ies") {
        if base.len() >= 2 {
            return format!("{base}y");
        }
    }
    if let Some(base) = word.strip_suffix("sses") {
        return format!("{base}ss");
    }
    if let Some(base) = word.strip_suffix("es") {
        if base.ends_with('s')
            || base.ends_with('x')
            || base.ends_with('z')
            || base.ends_with('o')
            || base.ends_with("ch")
            || base.ends_with("sh")
        {
            return base.to_string();
        }
    }
    if word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") && !word.ends_with("is") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

fn strip_past_or_progressive(word: &str) -> String {
    if let Some(base) = word.strip_suffix("ied") {
        if base.len() >= 2 {
            return format!("{base}y");
        }
    }
    if word.ends_with("eed") {
        return word[..word.len() - 1].to_string();
    }
    if let Some(base) = word.strip_suffix("ing") {
        if base.len() >= 2 {
            return undouble(base);
        }
    }
    if let Some(base) = word.strip_suffix("ed") {
        if base.len() >= 2 {
            return undouble(base);
        }
    }
    word.to_string()
}

/// Undo consonant doubling left behind by `-ed`/`-ing` detachment
/// ("stopped" -> "stopp" -> "stop"). Final l/s/z doublings are legitimate
/// spellings ("call", "bless") and are kept.
fn undouble(base: &str) -> String {
    let bytes = base.as_bytes();
    if bytes.len() >= 2 {
        let last = bytes[bytes.len() - 1];
        if last == bytes[bytes.len() - 2]
            && last.is_ascii_alphabetic()
            && !matches!(last, b'a' | b'e' | b'i' | b'o' | b'u' | b'l' | b's' | b'z')
        {
            return base[..base.len() - 1].to_string();
        }
    }
    base.to_string()
}

#[cfg(test)]
mod tests {
    use super::stem;

    #[test]
    fn suffix_detachment() {
        // Array of (input, expected_stem)
        let cases: Vec<(&str, &str)> = vec![
            ("go", "go"),
            ("the", "the"),
            ("was", "was"),
            ("sons", "son"),
            ("cities", "city"),
            ("carries", "carry"),
            ("carried", "carry"),
            ("blesses", "bless"),
            ("blessed", "bless"),
            ("boxes", "box"),
            ("churches", "church"),
            ("goes", "go"),
            ("going", "go"),
            ("running", "run"),
            ("stopped", "stop"),
            ("called", "call"),
            ("falling", "fall"),
            ("agreed", "agree"),
            ("jesus", "jesus"),
            ("walked", "walk"),
        ];
        for (input, expected) in cases {
            assert_eq!(stem(input), expected, "stem({input:?})");
        }
    }

    #[test]
    fn inflections_share_a_stem() {
        let pairs: Vec<(&str, &str)> = vec![
            ("rejoice", "rejoiced"),
            ("rejoice", "rejoices"),
            ("love", "loved"),
            ("love", "loving"),
            ("hope", "hoping"),
        ];
        for (a, b) in pairs {
            assert_eq!(stem(a), stem(b), "stem({a:?}) vs stem({b:?})");
        }
    }

    #[test]
    fn short_words_are_untouched() {
        for w in ["as", "is", "us", "ed", "s"] {
            assert_eq!(stem(w), w);
        }
    }
}

use phrasal::PhraseView;

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_session(phrases: &[PhraseView], color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  {} questions parsed", phrases.len()), ansi::CYAN)));

    let mut category: Option<&str> = None;
    for view in phrases {
        if category != Some(view.category.as_str()) {
            category = Some(view.category.as_str());
            println!("\n{}", palette.paint(format!("━━━ {} ━━━", view.category), ansi::GRAY));
        }
        println!(
            "  {} {}",
            palette.paint(format!("[{}]", view.reference), ansi::YELLOW),
            palette.bold(&view.text),
        );
        if !view.key_terms.is_empty() {
            println!(
                "      {} {}",
                palette.dim("terms:"),
                palette.paint(view.key_terms.join(", "), ansi::BLUE),
            );
        }
        if view.translation.is_empty() {
            println!("      {}", palette.dim("no translation"));
        } else {
            let origin = if view.has_user_translation { "translation:" } else { "inferred:" };
            println!("      {} {}", palette.dim(origin), palette.paint(&view.translation, ansi::GREEN));
        }
    }

    let with_terms = phrases.iter().filter(|v| !v.key_terms.is_empty()).count();
    println!("\n{}", palette.paint("━━━ Summary ━━━", ansi::GRAY));
    println!(
        "  Questions: {}  │  With key terms: {}  │  Translated: {}",
        palette.paint(phrases.len().to_string(), ansi::GREEN),
        palette.paint(with_terms.to_string(), ansi::CYAN),
        palette.dim(phrases.iter().filter(|v| v.has_user_translation).count().to_string()),
    );
    println!();
}

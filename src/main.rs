mod debug_report;

use phrasal::{KeyTermSpec, PhraseSpec, Session};
use std::io::{self, IsTerminal};

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let terms = match &config.terms_file {
        Some(path) => match load_terms(path) {
            Ok(terms) => terms,
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(1);
            }
        },
        None => Vec::new(),
    };

    let phrases = match load_questions(&config.questions_file) {
        Ok(phrases) => phrases,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let session = Session::new(terms, Vec::new(), Vec::new(), Vec::new(), phrases);
    debug_report::print_session(&session.phrases(), config.color);
}

struct CliConfig {
    questions_file: String,
    terms_file: Option<String>,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut questions_file: Option<String> = None;
    let mut terms_file: Option<String> = None;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("phrasal {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--questions" | "-q" => {
                let value = args.next().ok_or_else(|| "error: --questions expects a file".to_string())?;
                questions_file = Some(value);
            }
            "--terms" | "-t" => {
                let value = args.next().ok_or_else(|| "error: --terms expects a file".to_string())?;
                terms_file = Some(value);
            }
            _ if arg.starts_with("--questions=") => {
                questions_file = Some(arg.trim_start_matches("--questions=").to_string());
            }
            _ if arg.starts_with("--terms=") => {
                terms_file = Some(arg.trim_start_matches("--terms=").to_string());
            }
            _ => {
                return Err(format!("error: unknown argument '{arg}'"));
            }
        }
    }

    let questions_file =
        questions_file.ok_or_else(|| format!("error: no questions file provided\n\n{}", help_text()))?;
    Ok(CliConfig { questions_file, terms_file, color })
}

/// Questions file: one question per line,
/// `reference<TAB>start<TAB>end<TAB>category<TAB>question`.
fn load_questions(path: &str) -> Result<Vec<PhraseSpec>, String> {
    let content =
        std::fs::read_to_string(path).map_err(|err| format!("error: cannot read questions file '{path}': {err}"))?;
    let mut phrases = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let [reference, start, end, category, text] = fields[..] else {
            return Err(format!("error: {path}:{}: expected 5 tab-separated fields", i + 1));
        };
        let parse_ref = |v: &str| {
            v.trim().parse::<u32>().map_err(|_| format!("error: {path}:{}: invalid reference number '{v}'", i + 1))
        };
        phrases.push(PhraseSpec {
            text: text.trim().to_string(),
            category: category.trim().to_string(),
            reference: reference.trim().to_string(),
            start_ref: parse_ref(start)?,
            end_ref: parse_ref(end)?,
            seq: phrases.len() as u32,
        });
    }
    Ok(phrases)
}

/// Terms file: one term per line, `term<TAB>rendering|rendering|...` (the
/// renderings column is optional).
fn load_terms(path: &str) -> Result<Vec<KeyTermSpec>, String> {
    let content =
        std::fs::read_to_string(path).map_err(|err| format!("error: cannot read terms file '{path}': {err}"))?;
    let mut terms = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let (text, renderings) = match line.split_once('\t') {
            Some((text, rest)) => {
                (text, rest.split('|').map(str::trim).filter(|r| !r.is_empty()).map(str::to_string).collect())
            }
            None => (line, Vec::new()),
        };
        terms.push(KeyTermSpec { text: text.trim().to_string(), renderings, occurrences: Vec::new() });
    }
    Ok(terms)
}

fn help_text() -> String {
    format!(
        "phrasal {version}

Phrase decomposition and translation-inference engine CLI.

Reads a checking-question file (and optionally a key-term file), parses every
question into key terms and reusable parts, and prints the breakdown.

Usage:
  phrasal --questions <file> [--terms <file>] [OPTIONS]

Options:
  -q, --questions <file>   Questions, one per line:
                           reference<TAB>start<TAB>end<TAB>category<TAB>question
  -t, --terms <file>       Key terms, one per line: term<TAB>rendering|rendering
  --color                  Force ANSI color output.
  --no-color               Disable ANSI color output.
  -h, --help               Show this help message.
  -V, --version            Print version information.

Exit codes:
  0  Success.
  1  File could not be read or parsed.
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION")
    )
}

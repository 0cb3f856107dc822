/// Lazily compiled static regex.
///
/// Engine-internal patterns are literals known at compile time; compiling them
/// once and sharing the `Regex` keeps the hot paths allocation-free.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

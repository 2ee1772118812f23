//! Normalization applied to text typed into the inline editor.

use regex::Regex;
use std::sync::OnceLock;

const LIGATURES: [(char, &str); 5] = [
    ('\u{FB02}', "fl"),
    ('\u{FB01}', "fi"),
    ('\u{FB00}', "ff"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// Replace typographic ligatures with their ASCII letters.
pub fn replace_ligatures(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match LIGATURES.iter().find(|(lig, _)| *lig == c) {
            Some((_, plain)) => out.push_str(plain),
            None => out.push(c),
        }
    }
    out
}

struct QuoteRules {
    open_single: Regex,
    open_double: Regex,
    close_single: Regex,
    close_double: Regex,
    apostrophe: Regex,
}

impl QuoteRules {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            open_single: Regex::new(r"(^|[-–—])'")?,
            open_double: Regex::new(r#"(^|[-–—])""#)?,
            close_single: Regex::new(r"'($|[-–—])")?,
            close_double: Regex::new(r#""($|[-–—])"#)?,
            apostrophe: Regex::new(r"(?i)([a-z])'([a-z])$")?,
        })
    }
}

fn quote_rules() -> Option<&'static QuoteRules> {
    static RULES: OnceLock<Option<QuoteRules>> = OnceLock::new();
    RULES
        .get_or_init(|| match QuoteRules::new() {
            Ok(rules) => Some(rules),
            Err(e) => {
                log::warn!("smart quote rules unavailable: {}", e);
                None
            }
        })
        .as_ref()
}

/// Convert straight quotes to curly quotes.
///
/// Quotes at the start of the word (or after a dash) open, quotes at the end
/// (or before a dash) close, and a single quote between two letters at the
/// end of a word becomes an apostrophe. Each rule fires at most once.
pub fn replace_smart_quotes(text: &str) -> String {
    if !text.contains(['\'', '"']) {
        return text.to_string();
    }
    let Some(rules) = quote_rules() else {
        return text.to_string();
    };
    let text = rules.open_single.replace(text, "${1}\u{2018}");
    let text = rules.open_double.replace(&text, "${1}\u{201C}");
    let text = rules.close_single.replace(&text, "\u{2019}${1}");
    let text = rules.close_double.replace(&text, "\u{201D}${1}");
    let text = rules.apostrophe.replace(&text, "${1}\u{2019}${2}");
    text.into_owned()
}

/// Normalize committed editor text.
///
/// Returns `None` when nothing remains after trimming; words may not be empty.
pub fn normalize_edit(text: &str, smart_quotes: bool) -> Option<String> {
    let mut text = replace_ligatures(text).trim().to_string();
    if smart_quotes {
        text = replace_smart_quotes(&text);
    }
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_ligatures() {
        assert_eq!(replace_ligatures("\u{FB01}nd"), "find");
        assert_eq!(replace_ligatures("e\u{FB03}cient"), "efficient");
        assert_eq!(replace_ligatures("plain"), "plain");
    }

    #[test]
    fn test_smart_quotes_open_and_close() {
        assert_eq!(replace_smart_quotes("\"quoted\""), "\u{201C}quoted\u{201D}");
        assert_eq!(replace_smart_quotes("'tis"), "\u{2018}tis");
        assert_eq!(replace_smart_quotes("end'"), "end\u{2019}");
    }

    #[test]
    fn test_smart_quotes_apostrophe() {
        assert_eq!(replace_smart_quotes("don't"), "don\u{2019}t");
        assert_eq!(replace_smart_quotes("DON'T"), "DON\u{2019}T");
        // Apostrophe not near the end is left alone
        assert_eq!(replace_smart_quotes("o'clock"), "o'clock");
    }

    #[test]
    fn test_smart_quotes_around_dashes() {
        assert_eq!(replace_smart_quotes("word—'quote"), "word—\u{2018}quote");
        assert_eq!(replace_smart_quotes("said\"—"), "said\u{201D}—");
    }

    #[test]
    fn test_normalize_edit_rejects_empty() {
        assert_eq!(normalize_edit("   ", false), None);
        assert_eq!(normalize_edit(" \u{FB02}ag ", false), Some("flag".to_string()));
        assert_eq!(normalize_edit("it's", true), Some("it\u{2019}s".to_string()));
    }
}

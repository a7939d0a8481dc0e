//! Text normalization for titles, venues, and abstracts

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    /// LaTeX control sequences, e.g. `\textbf` or `\"` before a letter.
    static ref LATEX_COMMAND: Regex = Regex::new(r#"\\[a-zA-Z]+\s*|\\[`'"^~=.]"#).unwrap();
}

/// Normalize free text for comparison and storage.
///
/// - Removes LaTeX control sequences and braces
/// - Unicode NFKC, then casefold to lowercase
/// - Strips diacritics (NFD, combining marks dropped)
/// - Collapses internal whitespace to single spaces
/// - Strips leading/trailing punctuation
///
/// Idempotent: applying it to its own output is a no-op. Returns `None`
/// when nothing survives normalization.
pub fn normalize_text(input: &str) -> Option<String> {
    let without_latex = LATEX_COMMAND.replace_all(input, " ");
    let without_braces: String = without_latex
        .chars()
        .filter(|c| *c != '{' && *c != '}')
        .collect();

    // NFKC first so compatibility forms fold, then lowercase.
    let folded: String = without_braces.nfkc().collect::<String>().to_lowercase();

    // NFD separates combining marks; dropping them strips diacritics.
    let stripped: String = folded
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect();

    let collapsed = collapse_whitespace(&stripped);
    let trimmed = collapsed
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_string();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;

    for c in s.chars() {
        if c.is_whitespace() {
            if !prev_was_space && !result.is_empty() {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(c);
            prev_was_space = false;
        }
    }

    result.trim_end().to_string()
}

/// Whitespace-collapse only, for abstracts where punctuation is content.
pub fn normalize_abstract(input: &str) -> Option<String> {
    let collapsed = collapse_whitespace(input);
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_basic() {
        assert_eq!(
            normalize_text("  Deep   Learning for Images. "),
            Some("deep learning for images".to_string())
        );
    }

    #[test]
    fn test_normalize_text_diacritics() {
        assert_eq!(
            normalize_text("Études Françaises"),
            Some("etudes francaises".to_string())
        );
        assert_eq!(normalize_text("Naïve Bayes"), Some("naive bayes".to_string()));
    }

    #[test]
    fn test_normalize_text_latex() {
        assert_eq!(
            normalize_text(r"The {\textbf{Great}} Model"),
            Some("the great model".to_string())
        );
        assert_eq!(
            normalize_text("Schr\\\"odinger equations"),
            Some("schrodinger equations".to_string())
        );
    }

    #[test]
    fn test_normalize_text_idempotent() {
        let samples = [
            "Deep Learning: A Survey!",
            "M\\\"obius {strips} and $x$",
            "   spaced    out   ",
        ];
        for s in samples {
            let once = normalize_text(s);
            let twice = once.as_deref().and_then(normalize_text);
            assert_eq!(once, twice, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_normalize_text_empty() {
        assert_eq!(normalize_text("  {} ... "), None);
        assert_eq!(normalize_text(""), None);
    }

    #[test]
    fn test_normalize_abstract_keeps_punctuation() {
        assert_eq!(
            normalize_abstract("Results:\n  significant.\t(p < 0.05)"),
            Some("Results: significant. (p < 0.05)".to_string())
        );
    }
}

//! Author splitting and parsing

use crate::domain::Author;

use super::text::collapse_whitespace;
use unicode_normalization::UnicodeNormalization;

/// Split an author field into individual author strings.
///
/// Handles " and " (BibTeX), newlines (RIS `AU`/`A1` values joined by the
/// tokenizer), and semicolons (WoS `AU`).
pub fn split_authors(field: &str) -> Vec<String> {
    field
        .split(" and ")
        .flat_map(|s| s.split('\n'))
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse a single author string into a normalized [`Author`].
///
/// Accepts `Family, Given` and `Given Family`; the family name is
/// casefolded with diacritics stripped, and each given name is reduced
/// to its initial. Returns `None` when nothing parseable remains.
pub fn parse_author(input: &str) -> Option<Author> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (family_raw, given_raw) = if let Some(comma_pos) = trimmed.find(',') {
        (
            trimmed[..comma_pos].trim().to_string(),
            trimmed[comma_pos + 1..].trim().to_string(),
        )
    } else {
        // "Given Family" format: last word is the family name.
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        match parts.split_last() {
            Some((last, rest)) if !rest.is_empty() => (last.to_string(), rest.join(" ")),
            _ => (trimmed.to_string(), String::new()),
        }
    };

    let family = fold_name(&family_raw);
    if family.is_empty() {
        return None;
    }

    let given_initials: String = given_raw
        .split([' ', '.', '-'])
        .filter(|part| !part.is_empty())
        .filter_map(|part| fold_name(part).chars().next())
        .collect();

    Some(Author {
        family,
        given_initials,
    })
}

/// Parse an author field into a list of normalized authors, in order.
pub fn parse_author_list(field: &str) -> Vec<Author> {
    split_authors(field)
        .iter()
        .filter_map(|s| parse_author(s))
        .collect()
}

/// Casefold a name part and strip diacritics.
fn fold_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped: String = lowered
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '\'')
        .collect();
    collapse_whitespace(&stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_authors_bibtex() {
        assert_eq!(
            split_authors("Smith, John and Doe, Jane"),
            vec!["Smith, John", "Doe, Jane"]
        );
    }

    #[test]
    fn test_split_authors_wos_semicolons() {
        assert_eq!(
            split_authors("Smith, J.; Doe, J."),
            vec!["Smith, J.", "Doe, J."]
        );
    }

    #[test]
    fn test_split_authors_newlines() {
        assert_eq!(split_authors("Smith, J.\nDoe, J."), vec!["Smith, J.", "Doe, J."]);
    }

    #[test]
    fn test_parse_family_given() {
        let author = parse_author("Smith, John David").unwrap();
        assert_eq!(author.family, "smith");
        assert_eq!(author.given_initials, "jd");
    }

    #[test]
    fn test_parse_given_family() {
        let author = parse_author("John David Smith").unwrap();
        assert_eq!(author.family, "smith");
        assert_eq!(author.given_initials, "jd");
    }

    #[test]
    fn test_parse_initials_with_periods() {
        let author = parse_author("Smith, J. D.").unwrap();
        assert_eq!(author.given_initials, "jd");
    }

    #[test]
    fn test_parse_diacritics() {
        let author = parse_author("Müller, François").unwrap();
        assert_eq!(author.family, "muller");
        assert_eq!(author.given_initials, "f");
    }

    #[test]
    fn test_parse_single_name() {
        let author = parse_author("Aristotle").unwrap();
        assert_eq!(author.family, "aristotle");
        assert_eq!(author.given_initials, "");
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_author("   ").is_none());
        assert!(parse_author(", ").is_none());
    }
}

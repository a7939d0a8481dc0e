//! Identifier, year, page, and type normalization

use chrono::Datelike;
use lazy_static::lazy_static;
use regex::Regex;

use crate::domain::{RecordType, SourceFormat};

lazy_static! {
    static ref DOI_URL_PREFIX: Regex =
        Regex::new(r"(?i)^https?://(dx\.)?doi\.org/").unwrap();
    static ref DOI_PATTERN: Regex = Regex::new(r"^10\.[^/\s]+/\S+$").unwrap();
    static ref YEAR_GROUP: Regex = Regex::new(r"\b(\d{4})\b").unwrap();
}

/// Normalize a DOI: strip URL prefixes and the `doi:` scheme, lowercase,
/// and reject values not matching `10.<registrant>/<suffix>`.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let stripped = DOI_URL_PREFIX.replace(trimmed, "");
    let stripped = stripped
        .strip_prefix("doi:")
        .or_else(|| stripped.strip_prefix("DOI:"))
        .unwrap_or(&stripped);
    let lowered = stripped.trim().to_lowercase();

    if DOI_PATTERN.is_match(&lowered) {
        Some(lowered)
    } else {
        None
    }
}

/// Normalize a PMID: digits only, rejecting empty results.
pub fn normalize_pmid(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Upper bound for plausible publication years.
pub fn max_year() -> i32 {
    chrono::Utc::now().year() + 1
}

/// Extract the first 4-digit group in [1500, current_year + 1].
pub fn normalize_year(raw: &str) -> Option<i32> {
    let upper = max_year();
    for capture in YEAR_GROUP.captures_iter(raw) {
        if let Ok(year) = capture[1].parse::<i32>() {
            if (1500..=upper).contains(&year) {
                return Some(year);
            }
        }
    }
    None
}

/// Split a page range on `-`, `--`, or en-dash; when both halves are
/// numeric they are coerced through integers so `012` and `12` agree.
pub fn normalize_page_range(raw: &str) -> (Option<String>, Option<String>) {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return (None, None);
    }

    let parts: Vec<&str> = cleaned
        .split(['-', '\u{2013}'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    match parts.as_slice() {
        [] => (None, None),
        [single] => (Some(normalize_page(single)), None),
        [start, end, ..] => {
            let (start, end) = coerce_pages(start, end);
            (Some(start), Some(end))
        }
    }
}

fn normalize_page(page: &str) -> String {
    match page.parse::<u64>() {
        Ok(n) => n.to_string(),
        Err(_) => page.to_string(),
    }
}

fn coerce_pages(start: &str, end: &str) -> (String, String) {
    match (start.parse::<u64>(), end.parse::<u64>()) {
        (Ok(s), Ok(e)) => (s.to_string(), e.to_string()),
        _ => (start.to_string(), end.to_string()),
    }
}

/// Map a format-specific publication type code to [`RecordType`].
///
/// Unknown codes map to `Other`; normalization never rejects a record.
pub fn map_record_type(format: SourceFormat, code: &str) -> RecordType {
    let code = code.trim();
    match format {
        SourceFormat::Ris => match code {
            "JOUR" | "EJOUR" => RecordType::Journal,
            "CONF" | "CPAPER" => RecordType::Conference,
            "BOOK" | "EBOOK" => RecordType::Book,
            "CHAP" => RecordType::Chapter,
            "THES" => RecordType::Thesis,
            "UNPB" | "PREP" => RecordType::Preprint,
            _ => RecordType::Other,
        },
        SourceFormat::Nbib => match code {
            "Journal Article" | "Review" => RecordType::Journal,
            "Congress" => RecordType::Conference,
            "Preprint" => RecordType::Preprint,
            _ => RecordType::Other,
        },
        SourceFormat::Bibtex => match code.to_lowercase().as_str() {
            "article" => RecordType::Journal,
            "inproceedings" | "conference" | "proceedings" => RecordType::Conference,
            "book" => RecordType::Book,
            "inbook" | "incollection" => RecordType::Chapter,
            "phdthesis" | "mastersthesis" => RecordType::Thesis,
            "unpublished" | "preprint" => RecordType::Preprint,
            _ => RecordType::Other,
        },
        SourceFormat::Ciw => match code {
            "Article" | "Article; Early Access" | "Review" => RecordType::Journal,
            "Proceedings Paper" | "Article; Proceedings Paper" => RecordType::Conference,
            "Book" => RecordType::Book,
            "Book Chapter" | "Article; Book Chapter" => RecordType::Chapter,
            _ => RecordType::Other,
        },
        SourceFormat::Enw => match code {
            "Journal Article" => RecordType::Journal,
            "Conference Paper" | "Conference Proceedings" => RecordType::Conference,
            "Book" => RecordType::Book,
            "Book Section" => RecordType::Chapter,
            "Thesis" => RecordType::Thesis,
            _ => RecordType::Other,
        },
    }
}

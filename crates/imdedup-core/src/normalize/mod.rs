//! Stage 1: canonicalize raw records
//!
//! Normalization is a pure function of the raw record: the same input
//! always produces the same canonical record, and renormalizing a record's
//! own output changes nothing. Malformed fields become null; a record is
//! only dropped when it has no usable identity at all.

mod authors;
mod fields;
mod text;

pub use authors::{parse_author, parse_author_list, split_authors};
pub use fields::{
    map_record_type, max_year, normalize_doi, normalize_page_range, normalize_pmid,
    normalize_year,
};
pub use text::{collapse_whitespace, normalize_abstract, normalize_text};

use std::collections::BTreeSet;

use crate::audit::AnomalyCounters;
use crate::domain::{Author, CanonicalRecord, RawRecord, RecordType, SourceFormat};
use crate::error::EngineError;

/// Semantic slot a format-specific tag feeds into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Title,
    Authors,
    Year,
    Venue,
    Volume,
    Issue,
    Pages,
    PagesStart,
    PagesEnd,
    Doi,
    Pmid,
    Abstract,
    Type,
}

/// Fixed tag table per source format.
fn slot_for(format: SourceFormat, tag: &str) -> Option<Slot> {
    match format {
        SourceFormat::Ris => match tag {
            "TI" | "T1" => Some(Slot::Title),
            "AU" | "A1" => Some(Slot::Authors),
            "PY" | "Y1" => Some(Slot::Year),
            "JO" | "JF" | "T2" => Some(Slot::Venue),
            "VL" => Some(Slot::Volume),
            "IS" => Some(Slot::Issue),
            "SP" => Some(Slot::PagesStart),
            "EP" => Some(Slot::PagesEnd),
            "DO" => Some(Slot::Doi),
            "AB" | "N2" => Some(Slot::Abstract),
            "TY" => Some(Slot::Type),
            _ => None,
        },
        SourceFormat::Nbib => match tag {
            "TI" => Some(Slot::Title),
            "FAU" | "AU" => Some(Slot::Authors),
            "DP" => Some(Slot::Year),
            "JT" | "TA" => Some(Slot::Venue),
            "VI" => Some(Slot::Volume),
            "IP" => Some(Slot::Issue),
            "PG" => Some(Slot::Pages),
            "AID" | "LID" => Some(Slot::Doi),
            "PMID" => Some(Slot::Pmid),
            "AB" => Some(Slot::Abstract),
            "PT" => Some(Slot::Type),
            _ => None,
        },
        SourceFormat::Bibtex => match tag.to_lowercase().as_str() {
            "title" => Some(Slot::Title),
            "author" => Some(Slot::Authors),
            "year" => Some(Slot::Year),
            "journal" | "booktitle" => Some(Slot::Venue),
            "volume" => Some(Slot::Volume),
            "number" => Some(Slot::Issue),
            "pages" => Some(Slot::Pages),
            "doi" => Some(Slot::Doi),
            "pmid" => Some(Slot::Pmid),
            "abstract" => Some(Slot::Abstract),
            "entrytype" => Some(Slot::Type),
            _ => None,
        },
        SourceFormat::Ciw => match tag {
            "TI" => Some(Slot::Title),
            "AU" | "AF" => Some(Slot::Authors),
            "PY" => Some(Slot::Year),
            "SO" => Some(Slot::Venue),
            "VL" => Some(Slot::Volume),
            "IS" => Some(Slot::Issue),
            "BP" => Some(Slot::PagesStart),
            "EP" => Some(Slot::PagesEnd),
            "DI" => Some(Slot::Doi),
            "PM" => Some(Slot::Pmid),
            "AB" => Some(Slot::Abstract),
            "DT" => Some(Slot::Type),
            _ => None,
        },
        SourceFormat::Enw => match tag {
            "%T" => Some(Slot::Title),
            "%A" => Some(Slot::Authors),
            "%D" => Some(Slot::Year),
            "%J" | "%B" => Some(Slot::Venue),
            "%V" => Some(Slot::Volume),
            "%N" => Some(Slot::Issue),
            "%P" => Some(Slot::Pages),
            "%R" => Some(Slot::Doi),
            "%X" => Some(Slot::Abstract),
            "%0" => Some(Slot::Type),
            _ => None,
        },
    }
}

/// Raw field values pulled out of the tag list before normalization.
#[derive(Default)]
struct Extracted {
    title: Option<String>,
    authors: Vec<String>,
    year: Option<String>,
    venue: Option<String>,
    volume: Option<String>,
    issue: Option<String>,
    pages: Option<String>,
    pages_start: Option<String>,
    pages_end: Option<String>,
    doi: Option<String>,
    pmid: Option<String>,
    abstract_text: Option<String>,
    record_type: Option<String>,
}

fn first_wins(slot: &mut Option<String>, value: &str) {
    if slot.is_none() && !value.trim().is_empty() {
        *slot = Some(value.to_string());
    }
}

fn extract(raw: &RawRecord) -> Extracted {
    let mut out = Extracted::default();
    for (tag, value) in &raw.tags {
        let Some(slot) = slot_for(raw.format, tag) else {
            continue;
        };
        match slot {
            Slot::Title => first_wins(&mut out.title, value),
            Slot::Authors => {
                if !value.trim().is_empty() {
                    out.authors.push(value.clone());
                }
            }
            Slot::Year => first_wins(&mut out.year, value),
            Slot::Venue => first_wins(&mut out.venue, value),
            Slot::Volume => first_wins(&mut out.volume, value),
            Slot::Issue => first_wins(&mut out.issue, value),
            Slot::Pages => first_wins(&mut out.pages, value),
            Slot::PagesStart => first_wins(&mut out.pages_start, value),
            Slot::PagesEnd => first_wins(&mut out.pages_end, value),
            Slot::Doi => {
                // NBIB AID/LID carry several id kinds, marked by a suffix:
                // "10.1000/xyz [doi]" vs "S0140-6736 [pii]".
                let value = value.trim();
                if let Some(doi_part) = value.strip_suffix("[doi]") {
                    first_wins(&mut out.doi, doi_part.trim());
                } else if raw.format != SourceFormat::Nbib || !value.ends_with(']') {
                    first_wins(&mut out.doi, value);
                }
            }
            Slot::Pmid => first_wins(&mut out.pmid, value),
            Slot::Abstract => first_wins(&mut out.abstract_text, value),
            Slot::Type => first_wins(&mut out.record_type, value),
        }
    }
    out
}

/// Normalize one raw record into its canonical form.
///
/// Fails only with [`EngineError::Input`] when the record has neither an id
/// nor a `(file_path, byte_offset)` source identifier.
pub fn normalize_record(raw: &RawRecord) -> Result<CanonicalRecord, EngineError> {
    normalize_inner(raw).map(|(record, _)| record)
}

fn normalize_inner(raw: &RawRecord) -> Result<(CanonicalRecord, Extracted), EngineError> {
    let id = raw.stable_id().ok_or_else(|| {
        EngineError::Input("raw record lacks both id and source identifier".to_string())
    })?;

    let extracted = extract(raw);

    let authors: Vec<Author> = extracted
        .authors
        .iter()
        .flat_map(|value| parse_author_list(value))
        .collect();

    let (pages_start, pages_end) = match (&extracted.pages_start, &extracted.pages_end) {
        (Some(start), end) => {
            // Separate start/end tags (RIS SP/EP, CIW BP/EP). The start tag
            // sometimes carries a full range itself.
            let (range_start, range_end) = normalize_page_range(start);
            let end_value = end
                .as_deref()
                .and_then(|e| normalize_page_range(e).0)
                .or(range_end);
            (range_start, end_value)
        }
        (None, Some(end)) => (None, normalize_page_range(end).0),
        (None, None) => match &extracted.pages {
            Some(range) => normalize_page_range(range),
            None => (None, None),
        },
    };

    let record_type = extracted
        .record_type
        .as_deref()
        .map(|code| map_record_type(raw.format, code))
        .unwrap_or(RecordType::Other);

    let record = CanonicalRecord {
        id: id.clone(),
        title: extracted.title.as_deref().and_then(normalize_text),
        authors,
        year: extracted.year.as_deref().and_then(normalize_year),
        venue: extracted.venue.as_deref().and_then(normalize_text),
        volume: extracted.volume.as_deref().map(normalize_scalar),
        issue: extracted.issue.as_deref().map(normalize_scalar),
        pages_start,
        pages_end,
        doi: extracted.doi.as_deref().and_then(normalize_doi),
        pmid: extracted.pmid.as_deref().and_then(normalize_pmid),
        abstract_text: extracted.abstract_text.as_deref().and_then(normalize_abstract),
        record_type,
        raw_ref: id,
    };
    Ok((record, extracted))
}

fn normalize_scalar(value: &str) -> String {
    let collapsed = collapse_whitespace(value);
    match collapsed.parse::<u64>() {
        Ok(n) => n.to_string(),
        Err(_) => collapsed,
    }
}

/// Run stage 1 over the whole input, counting anomalies.
///
/// Output is sorted by record id; ids are unique (later collisions are
/// dropped and counted).
pub fn normalize_all(
    raws: &[RawRecord],
    counters: &mut AnomalyCounters,
) -> Vec<CanonicalRecord> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut records: Vec<CanonicalRecord> = Vec::with_capacity(raws.len());

    for raw in raws {
        let (record, extracted) = match normalize_inner(raw) {
            Ok(pair) => pair,
            Err(_) => {
                counters.records_missing_source += 1;
                continue;
            }
        };

        if !seen.insert(record.id.clone()) {
            counters.duplicate_record_ids += 1;
            continue;
        }

        if extracted.doi.is_some() && record.doi.is_none() {
            counters.rejected_dois += 1;
        }
        if extracted.pmid.is_some() && record.pmid.is_none() {
            counters.rejected_pmids += 1;
        }
        if extracted.year.is_some() && record.year.is_none() {
            counters.rejected_years += 1;
        }
        records.push(record);
    }

    records.sort_by(|a, b| a.id.cmp(&b.id));
    records
}

//! Raw and canonical record types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Citation formats the external tokenizers produce records from.
///
/// The format selects which tag table the normalize stage applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// RIS tagged format (`TI  - ...`).
    Ris,
    /// PubMed NBIB export.
    Nbib,
    /// BibTeX entries flattened to field/value pairs.
    Bibtex,
    /// Web of Science CIW export.
    Ciw,
    /// EndNote ENW export (`%T ...`).
    Enw,
}

/// A record as produced by an external format tokenizer.
///
/// An ordered list of `(tag, value)` pairs plus a source identifier.
/// The engine never opens files itself; `file_path` and `byte_offset`
/// only anchor provenance and id derivation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawRecord {
    /// Caller-assigned id, if any. When absent, the id is derived from
    /// `(file_path, byte_offset)`.
    pub id: Option<String>,
    pub file_path: Option<String>,
    pub byte_offset: Option<u64>,
    pub format: SourceFormat,
    /// Format-specific tag/value pairs in source order (e.g. `TI`, `AU`, `DO`).
    pub tags: Vec<(String, String)>,
}

impl RawRecord {
    /// Stable record id: the caller-assigned id when present, otherwise a
    /// UUIDv5 over the source identifier. Returns `None` when the record
    /// carries neither an id nor a source identifier.
    pub fn stable_id(&self) -> Option<String> {
        if let Some(id) = &self.id {
            if !id.is_empty() {
                return Some(id.clone());
            }
        }
        match (&self.file_path, self.byte_offset) {
            (Some(path), Some(offset)) => {
                let name = format!("{}:{}", path, offset);
                Some(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string())
            }
            _ => None,
        }
    }
}

/// Publication type after mapping format-specific codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Journal,
    Conference,
    Book,
    Chapter,
    Thesis,
    Preprint,
    Other,
}

/// A normalized author: casefolded family name plus given-name initials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub family: String,
    pub given_initials: String,
}

impl Author {
    /// Identity key used for author-set comparison and merge dedup.
    pub fn match_key(&self) -> (String, String) {
        let first_initial = self
            .given_initials
            .chars()
            .next()
            .map(|c| c.to_string())
            .unwrap_or_default();
        (self.family.clone(), first_initial)
    }
}

/// The normalized unit of deduplication, produced by stage 1.
///
/// All optional fields hold `None` when the source value was missing or
/// malformed; normalization never rejects a record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Unique within a run, derived from the source identifier.
    pub id: String,
    pub title: Option<String>,
    pub authors: Vec<Author>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages_start: Option<String>,
    pub pages_end: Option<String>,
    /// Lowercased, prefix-stripped DOI matching `10.<registrant>/<suffix>`.
    pub doi: Option<String>,
    /// Digits-only PubMed id.
    pub pmid: Option<String>,
    pub abstract_text: Option<String>,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Back-pointer to the raw record for provenance.
    pub raw_ref: String,
}

impl CanonicalRecord {
    /// Count of non-null scalar fields, used by survivor selection.
    pub fn non_null_field_count(&self) -> usize {
        let mut count = 0;
        if self.title.is_some() {
            count += 1;
        }
        if !self.authors.is_empty() {
            count += 1;
        }
        if self.year.is_some() {
            count += 1;
        }
        if self.venue.is_some() {
            count += 1;
        }
        if self.volume.is_some() {
            count += 1;
        }
        if self.issue.is_some() {
            count += 1;
        }
        if self.pages_start.is_some() {
            count += 1;
        }
        if self.pages_end.is_some() {
            count += 1;
        }
        if self.doi.is_some() {
            count += 1;
        }
        if self.pmid.is_some() {
            count += 1;
        }
        if self.abstract_text.is_some() {
            count += 1;
        }
        count
    }

    /// Author identity keys in list order.
    pub fn author_keys(&self) -> Vec<(String, String)> {
        self.authors.iter().map(Author::match_key).collect()
    }
}

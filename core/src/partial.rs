use crate::merge::Merge;
use crate::tf::DocumentTerms;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One (term, document) pair. Stored on disk as `[doc_id, raw_count, relative_frequency]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, u32, f64)", into = "(String, u32, f64)")]
pub struct Posting {
    pub doc_id: String,
    pub raw_count: u32,
    pub relative_frequency: f64,
}

impl From<(String, u32, f64)> for Posting {
    fn from((doc_id, raw_count, relative_frequency): (String, u32, f64)) -> Self {
        Self { doc_id, raw_count, relative_frequency }
    }
}

impl From<Posting> for (String, u32, f64) {
    fn from(p: Posting) -> Self {
        (p.doc_id, p.raw_count, p.relative_frequency)
    }
}

/// Term -> postings for the documents of one batch. Carries no IDF.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialIndex {
    entries: HashMap<String, Vec<Posting>>,
}

impl PartialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one posting per distinct term of the document.
    pub fn add_document(&mut self, doc_id: &str, terms: &DocumentTerms) {
        for (term, raw_count) in terms.iter() {
            let posting = Posting {
                doc_id: doc_id.to_string(),
                raw_count,
                relative_frequency: terms.relative_frequency(raw_count),
            };
            match self.entries.get_mut(term) {
                Some(docs) => docs.push(posting),
                None => {
                    self.entries.insert(term.to_string(), vec![posting]);
                }
            }
        }
    }

    pub fn postings(&self, term: &str) -> Option<&[Posting]> {
        self.entries.get(term).map(Vec::as_slice)
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn posting_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, Vec<Posting>)> {
        self.entries.into_iter()
    }
}

impl Merge for PartialIndex {
    fn merge(&mut self, other: Self) {
        for (term, docs) in other.entries {
            self.entries.entry(term).or_default().extend(docs);
        }
    }
}

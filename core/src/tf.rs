use crate::config::TfVariant;
use std::collections::BTreeMap;

/// Term histogram of a single document.
///
/// `length` is the number of terms left after term processing, so relative
/// frequency is measured against the filtered sequence, not the raw text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentTerms {
    counts: BTreeMap<String, u32>,
    length: usize,
}

impl DocumentTerms {
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut counts = BTreeMap::new();
        let mut length = 0;
        for term in terms {
            *counts.entry(term.into()).or_insert(0) += 1;
            length += 1;
        }
        Self { counts, length }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn raw_count(&self, term: &str) -> u32 {
        self.counts.get(term).copied().unwrap_or(0)
    }

    /// `(term, raw_count)` pairs in term order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.counts.iter().map(|(t, &c)| (t.as_str(), c))
    }

    pub fn relative_frequency(&self, raw_count: u32) -> f64 {
        if self.length == 0 {
            0.0
        } else {
            raw_count as f64 / self.length as f64
        }
    }

    pub fn tf(&self, raw_count: u32, variant: TfVariant) -> f64 {
        match variant {
            TfVariant::RawCount => raw_count as f64,
            TfVariant::Relative => self.relative_frequency(raw_count),
        }
    }
}

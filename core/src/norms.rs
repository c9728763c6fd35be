use crate::config::TfVariant;
use crate::error::{IndexError, Result};
use crate::idf::IdfTable;
use crate::tf::DocumentTerms;
use std::collections::BTreeMap;

/// What to do with a document term that has no IDF value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingIdf {
    Fail,
    /// Only for debug runs, where the IDF table covers other batches.
    Skip,
}

/// Euclidean length of a document's TF-IDF vector, plus the number of terms
/// skipped for lack of an IDF value. An empty document has norm 0.
pub fn document_norm(
    terms: &DocumentTerms,
    idf: &IdfTable,
    variant: TfVariant,
    missing: MissingIdf,
) -> Result<(f64, usize)> {
    let mut sum = 0.0;
    let mut skipped = 0;
    for (term, raw_count) in terms.iter() {
        let value = match (idf.get(term), missing) {
            (Some(value), _) => value,
            (None, MissingIdf::Skip) => {
                skipped += 1;
                continue;
            }
            (None, MissingIdf::Fail) => idf.require(term)?,
        };
        let weight = terms.tf(raw_count, variant) * value;
        sum += weight * weight;
    }
    Ok((sum.sqrt(), skipped))
}

/// doc id -> TF-IDF vector norm, used to normalize cosine scores at query time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentNorms {
    norms: BTreeMap<String, f64>,
}

impl DocumentNorms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc_id: String, norm: f64) -> Result<()> {
        if self.norms.contains_key(&doc_id) {
            return Err(IndexError::Consistency(format!("document '{doc_id}' was normed twice")));
        }
        self.norms.insert(doc_id, norm);
        Ok(())
    }

    /// Union of two disjoint mappings.
    pub fn try_merge(&mut self, other: DocumentNorms) -> Result<()> {
        for (doc_id, norm) in other.norms {
            self.insert(doc_id, norm)?;
        }
        Ok(())
    }

    pub fn get(&self, doc_id: &str) -> Option<f64> {
        self.norms.get(doc_id).copied()
    }

    pub fn len(&self) -> usize {
        self.norms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.norms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.norms.iter().map(|(d, &n)| (d.as_str(), n))
    }
}

use crate::counts::TermCounts;
use crate::df::DocumentFrequency;
use crate::error::{IndexError, Result};
use std::collections::HashMap;

pub fn idf(collection_size: u64, df: u64) -> f64 {
    (collection_size as f64 / df as f64).log10()
}

/// Term -> IDF lookup, keeping the order the table was produced in
/// (most frequent term first when built from document frequencies).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdfTable {
    values: HashMap<String, f64>,
    order: Vec<String>,
}

impl IdfTable {
    pub fn from_document_frequency(df: &DocumentFrequency, collection_size: u64) -> Result<Self> {
        if collection_size == 0 {
            return Err(IndexError::Configuration("collection size must be positive".into()));
        }
        let table = Self::from_records(
            df.most_common()
                .into_iter()
                .map(|(term, count)| {
                    let value = idf(collection_size, count);
                    (term, value)
                }),
        )?;
        if table.len() != df.len() {
            return Err(IndexError::Consistency(format!(
                "IDF table has {} terms but document frequencies have {}",
                table.len(),
                df.len()
            )));
        }
        Ok(table)
    }

    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut table = Self::default();
        for (term, value) in records {
            if !value.is_finite() {
                return Err(IndexError::Consistency(format!("non-finite IDF {value} for term '{term}'")));
            }
            if table.values.insert(term.clone(), value).is_some() {
                return Err(IndexError::Consistency(format!("term '{term}' listed twice in IDF table")));
            }
            table.order.push(term);
        }
        Ok(table)
    }

    pub fn get(&self, term: &str) -> Option<f64> {
        self.values.get(term).copied()
    }

    /// Lookup that refuses to default: a term without an IDF means the passes
    /// saw different vocabularies.
    pub fn require(&self, term: &str) -> Result<f64> {
        self.get(term)
            .ok_or_else(|| {
                IndexError::Consistency(format!("term '{term}' has no document frequency / IDF entry"))
            })
    }

    pub fn contains(&self, term: &str) -> bool {
        self.values.contains_key(term)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.order.iter().map(move |t| (t.as_str(), self.values[t]))
    }
}

/// Vocabulary size must agree between the raw count, DF and IDF tables.
pub fn verify_vocabulary(counts: &TermCounts, df: &DocumentFrequency, idf: &IdfTable) -> Result<()> {
    if counts.len() == df.len() && df.len() == idf.len() {
        return Ok(());
    }
    Err(IndexError::Consistency(format!(
        "vocabulary size mismatch: term counts {}, document frequencies {}, IDF {}",
        counts.len(),
        df.len(),
        idf.len()
    )))
}

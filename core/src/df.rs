use crate::counts::{add_counts, most_common};
use crate::merge::Merge;
use std::collections::{HashMap, HashSet};

/// Number of documents each term occurs in.
///
/// A document adds at most one to a term no matter how often the term repeats
/// inside it. Every stored count is at least one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFrequency {
    counts: HashMap<String, u64>,
}

impl DocumentFrequency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document<S: AsRef<str>>(&mut self, terms: &[S]) {
        let distinct: HashSet<&str> = terms.iter().map(AsRef::as_ref).collect();
        for term in distinct {
            match self.counts.get_mut(term) {
                Some(df) => *df += 1,
                None => {
                    self.counts.insert(term.to_string(), 1);
                }
            }
        }
    }

    pub fn get(&self, term: &str) -> Option<u64> {
        self.counts.get(term).copied()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.counts.contains_key(term)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.counts.iter().map(|(t, &df)| (t.as_str(), df))
    }

    /// Most frequent term first.
    pub fn most_common(&self) -> Vec<(String, u64)> {
        most_common(&self.counts)
    }
}

impl Merge for DocumentFrequency {
    fn merge(&mut self, other: Self) {
        add_counts(&mut self.counts, other.counts);
    }
}

impl FromIterator<(String, u64)> for DocumentFrequency {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self { counts: iter.into_iter().filter(|(_, df)| *df > 0).collect() }
    }
}

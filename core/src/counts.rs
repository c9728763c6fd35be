use crate::merge::Merge;
use std::collections::HashMap;

/// Total occurrences of each term over the processed documents.
///
/// Independent of document frequency; its key set is the reference vocabulary
/// the DF and IDF tables are checked against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermCounts {
    counts: HashMap<String, u64>,
}

impl TermCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_terms<S: AsRef<str>>(&mut self, terms: &[S]) {
        for term in terms {
            match self.counts.get_mut(term.as_ref()) {
                Some(count) => *count += 1,
                None => {
                    self.counts.insert(term.as_ref().to_string(), 1);
                }
            }
        }
    }

    pub fn get(&self, term: &str) -> u64 {
        self.counts.get(term).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn most_common(&self) -> Vec<(String, u64)> {
        most_common(&self.counts)
    }
}

impl Merge for TermCounts {
    fn merge(&mut self, other: Self) {
        add_counts(&mut self.counts, other.counts);
    }
}

impl FromIterator<(String, u64)> for TermCounts {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self { counts: iter.into_iter().collect() }
    }
}

pub(crate) fn add_counts(into: &mut HashMap<String, u64>, from: HashMap<String, u64>) {
    if into.len() < from.len() {
        let smaller = std::mem::replace(into, from);
        return add_counts(into, smaller);
    }
    for (term, count) in from {
        *into.entry(term).or_insert(0) += count;
    }
}

/// Highest count first; ties are ordered by term so output is stable across runs.
pub(crate) fn most_common(counts: &HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut out: Vec<(String, u64)> = counts.iter().map(|(t, &c)| (t.clone(), c)).collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

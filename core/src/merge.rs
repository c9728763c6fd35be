/// Combines per-batch results inside the coordinator.
///
/// Implementations are associative. Counting merges are also commutative;
/// posting-list merges are commutative up to the order of postings within a
/// term, which carries no meaning.
pub trait Merge: Default {
    fn merge(&mut self, other: Self);

    fn merge_all<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        parts.into_iter().fold(Self::default(), |mut acc, part| {
            acc.merge(part);
            acc
        })
    }
}

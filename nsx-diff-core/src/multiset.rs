use std::collections::BTreeMap;

/// Counted collection where order is ignored and cardinality is kept.
///
/// Two multisets are equal when every element occurs the same number of times
/// in both, so `[a, a]` differs from `[a]` while `[a, b]` equals `[b, a]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multiset<T: Ord> {
    counts: BTreeMap<T, usize>,
}

impl<T: Ord> Default for Multiset<T> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }
}

impl<T: Ord> Multiset<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: T) {
        *self.counts.entry(item).or_insert(0) += 1;
    }

    /// Number of occurrences of `item`.
    pub fn count(&self, item: &T) -> usize {
        self.counts.get(item).copied().unwrap_or(0)
    }

    /// Total number of elements, duplicates included.
    pub fn len(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Elements of `self` not matched by an occurrence in `other`, one entry per surplus occurrence.
    pub fn surplus_over<'a>(&'a self, other: &Multiset<T>) -> Vec<&'a T> {
        let mut out = Vec::new();
        for (item, count) in &self.counts {
            let extra = count.saturating_sub(other.count(item));
            out.extend(std::iter::repeat(item).take(extra));
        }
        out
    }
}

impl<T: Ord> FromIterator<T> for Multiset<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

//! Sorted-prefix index
//!
//! Answers "which entries contain this prefix" and "which entries are
//! contained in this prefix" without a linear scan. Canonical prefixes either
//! nest or are disjoint, so the two queries together give every overlap.
//!
//! Entries are identified by their position in the input sequence, and every
//! query returns positions in ascending order. Callers therefore keep the
//! ordering of whatever list they indexed.

use crate::cidr::Prefix;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PrefixIndex {
    // Sorted by (network, length, position)
    sorted: Vec<(Prefix, usize)>,
    exact: HashMap<Prefix, Vec<usize>>,
}

impl PrefixIndex {
    pub fn build<I>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = Prefix>,
    {
        let mut sorted: Vec<(Prefix, usize)> = prefixes
            .into_iter()
            .enumerate()
            .map(|(position, prefix)| (prefix, position))
            .collect();
        sorted.sort_unstable_by_key(|(prefix, position)| (prefix.first(), prefix.prefix_len(), *position));

        let mut exact: HashMap<Prefix, Vec<usize>> = HashMap::new();
        for (prefix, position) in &sorted {
            exact.entry(*prefix).or_default().push(*position);
        }

        Self { sorted, exact }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Positions of entries that contain `prefix` (equal prefixes included)
    pub fn containing(&self, prefix: &Prefix) -> Vec<usize> {
        // At most one candidate ancestor per length
        let mut found: Vec<usize> = (0..=prefix.prefix_len())
            .map(|len| Prefix::from_bits(prefix.first(), len))
            .filter_map(|ancestor| self.exact.get(&ancestor))
            .flatten()
            .copied()
            .collect();
        found.sort_unstable();
        found
    }

    /// Positions of entries contained in `prefix` (equal prefixes included)
    pub fn contained_in(&self, prefix: &Prefix) -> Vec<usize> {
        let start = self
            .sorted
            .partition_point(|(candidate, _)| candidate.first() < prefix.first());

        let mut found: Vec<usize> = self.sorted[start..]
            .iter()
            .take_while(|(candidate, _)| candidate.first() <= prefix.last())
            .filter(|(candidate, _)| prefix.contains(candidate))
            .map(|(_, position)| *position)
            .collect();
        found.sort_unstable();
        found
    }

    /// Positions of entries sharing at least one address with `prefix`
    pub fn overlapping(&self, prefix: &Prefix) -> Vec<usize> {
        let mut found = self.containing(prefix);
        found.extend(self.contained_in(prefix));
        found.sort_unstable();
        found.dedup();
        found
    }
}

//! Lazy enumeration of unordered index pairs.

/// Number of unordered pairs over `n` items: `n (n - 1) / 2`.
pub fn pair_count(n: usize) -> u64 {
    let n = n as u64;
    n * n.saturating_sub(1) / 2
}

/// All pairs `(i, j)` with `i < j < n`, in row-major order:
/// `(0,1), (0,2), ..., (0,n-1), (1,2), ...`.
///
/// Pairs are produced on demand; nothing proportional to the pair count is
/// ever allocated.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    i: usize,
    j: usize,
}

impl Combinations {
    pub fn new(n: usize) -> Self {
        Self { n, i: 0, j: 1 }
    }

    fn remaining(&self) -> u64 {
        if self.i + 1 >= self.n {
            return 0;
        }
        // Rest of the current row plus every later row.
        let row_rest = (self.n - self.j) as u64;
        row_rest + pair_count(self.n - self.i - 1)
    }
}

impl Iterator for Combinations {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.i + 1 >= self.n {
            return None;
        }
        let pair = (self.i, self.j);
        self.j += 1;
        if self.j == self.n {
            self.i += 1;
            self.j = self.i + 1;
        }
        Some(pair)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining()) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl std::iter::FusedIterator for Combinations {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_items_six_pairs() {
        let pairs: Vec<_> = Combinations::new(4).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn degenerate_sizes() {
        assert_eq!(Combinations::new(0).count(), 0);
        assert_eq!(Combinations::new(1).count(), 0);
        assert_eq!(Combinations::new(2).collect::<Vec<_>>(), vec![(0, 1)]);
        assert_eq!(pair_count(0), 0);
        assert_eq!(pair_count(1), 0);
    }

    #[test]
    fn size_hint_tracks_progress() {
        let mut c = Combinations::new(5);
        assert_eq!(c.size_hint(), (10, Some(10)));
        c.next();
        c.next();
        c.next();
        c.next();
        c.next();
        assert_eq!(c.size_hint(), (5, Some(5)));
        assert_eq!(c.by_ref().count(), 5);
        assert_eq!(c.size_hint(), (0, Some(0)));
        assert_eq!(c.next(), None);
    }

    #[test]
    fn large_counts_do_not_overflow() {
        assert_eq!(pair_count(20_000), 199_990_000);
        assert_eq!(pair_count(100_000), 4_999_950_000);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    proptest! {
        #[test]
        fn every_pair_exactly_once(n in 0usize..60) {
            let pairs: Vec<_> = Combinations::new(n).collect();
            prop_assert_eq!(pairs.len() as u64, pair_count(n));
            let unique: HashSet<_> = pairs.iter().copied().collect();
            prop_assert_eq!(unique.len(), pairs.len());
            prop_assert!(pairs.iter().all(|&(i, j)| i < j && j < n));
        }
    }
}

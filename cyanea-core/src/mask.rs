//! Presence masks for tables with missing values.
//!
//! [`ValidityMask`] records, one bit per position, whether a value is present.
//! Bits are packed into u64 blocks so that the positions two rows have in
//! common can be found with a block-wise AND and a popcount instead of a
//! per-element comparison.

use crate::{CyaneaError, Result};

/// A packed bit mask: bit `i` is set when position `i` holds a real value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidityMask {
    blocks: Vec<u64>,
    len: usize,
}

impl ValidityMask {
    /// A mask of `len` positions, all present.
    pub fn all_present(len: usize) -> Self {
        let mut blocks = vec![u64::MAX; len.div_ceil(64)];
        if let Some(last) = blocks.last_mut() {
            let tail = len % 64;
            if tail != 0 {
                *last = (1u64 << tail) - 1;
            }
        }
        Self { blocks, len }
    }

    /// A mask of `len` positions, all missing.
    pub fn all_missing(len: usize) -> Self {
        Self {
            blocks: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Build a mask from a slice of booleans (`true` = present).
    pub fn build(bits: &[bool]) -> Self {
        let mut blocks = vec![0u64; bits.len().div_ceil(64)];
        for (i, &b) in bits.iter().enumerate() {
            if b {
                blocks[i / 64] |= 1u64 << (i % 64);
            }
        }
        Self {
            blocks,
            len: bits.len(),
        }
    }

    /// Whether position `i` is present.
    ///
    /// # Panics
    ///
    /// Panics if `i >= len`.
    pub fn get(&self, i: usize) -> bool {
        assert!(i < self.len, "index out of bounds");
        (self.blocks[i / 64] >> (i % 64)) & 1 == 1
    }

    /// Mark position `i` as present or missing.
    pub fn set(&mut self, i: usize, present: bool) -> Result<()> {
        if i >= self.len {
            return Err(CyaneaError::InvalidInput(format!(
                "mask index {i} out of bounds (len={})",
                self.len
            )));
        }
        if present {
            self.blocks[i / 64] |= 1u64 << (i % 64);
        } else {
            self.blocks[i / 64] &= !(1u64 << (i % 64));
        }
        Ok(())
    }

    /// Positions present in both masks.
    ///
    /// # Errors
    ///
    /// Returns an error if the masks differ in length.
    pub fn and(&self, other: &ValidityMask) -> Result<ValidityMask> {
        self.check_len(other)?;
        Ok(ValidityMask {
            blocks: self
                .blocks
                .iter()
                .zip(&other.blocks)
                .map(|(a, b)| a & b)
                .collect(),
            len: self.len,
        })
    }

    /// Number of positions present in both masks, without allocating.
    pub fn count_common(&self, other: &ValidityMask) -> Result<usize> {
        self.check_len(other)?;
        Ok(self
            .blocks
            .iter()
            .zip(&other.blocks)
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum())
    }

    /// Iterate over the present positions in ascending order.
    pub fn iter_present(&self) -> impl Iterator<Item = usize> + Clone + '_ {
        self.blocks.iter().enumerate().flat_map(|(b, &block)| {
            let mut word = block;
            std::iter::from_fn(move || {
                if word == 0 {
                    return None;
                }
                let bit = word.trailing_zeros() as usize;
                word &= word - 1; // clear lowest set bit
                Some(b * 64 + bit)
            })
        })
    }

    /// Total number of positions.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mask has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of present positions.
    pub fn count_present(&self) -> usize {
        self.blocks.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Number of missing positions.
    pub fn count_missing(&self) -> usize {
        self.len - self.count_present()
    }

    fn check_len(&self, other: &ValidityMask) -> Result<()> {
        if self.len != other.len {
            return Err(CyaneaError::InvalidInput(format!(
                "mask length mismatch ({} vs {})",
                self.len, other.len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_present_respects_tail() {
        let m = ValidityMask::all_present(70);
        assert_eq!(m.count_present(), 70);
        assert_eq!(m.count_missing(), 0);
        assert!(m.get(69));
    }

    #[test]
    fn build_and_get() {
        let m = ValidityMask::build(&[true, false, true, true]);
        assert!(m.get(0));
        assert!(!m.get(1));
        assert_eq!(m.count_present(), 3);
    }

    #[test]
    fn set_out_of_bounds() {
        let mut m = ValidityMask::all_missing(3);
        assert!(m.set(3, true).is_err());
        m.set(2, true).unwrap();
        assert!(m.get(2));
        m.set(2, false).unwrap();
        assert!(!m.get(2));
    }

    #[test]
    fn and_keeps_common_positions() {
        let a = ValidityMask::build(&[true, true, false, true]);
        let b = ValidityMask::build(&[true, false, false, true]);
        let both = a.and(&b).unwrap();
        assert_eq!(both.iter_present().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(a.count_common(&b).unwrap(), 2);
    }

    #[test]
    fn length_mismatch() {
        let a = ValidityMask::all_present(3);
        let b = ValidityMask::all_present(4);
        assert!(a.and(&b).is_err());
        assert!(a.count_common(&b).is_err());
    }

    #[test]
    fn iter_present_across_blocks() {
        let mut bits = vec![false; 130];
        bits[0] = true;
        bits[64] = true;
        bits[129] = true;
        let m = ValidityMask::build(&bits);
        assert_eq!(m.iter_present().collect::<Vec<_>>(), vec![0, 64, 129]);
    }

    #[test]
    fn empty_mask() {
        let m = ValidityMask::all_present(0);
        assert!(m.is_empty());
        assert_eq!(m.iter_present().count(), 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn count_common_matches_elementwise(
            pairs in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..300)
        ) {
            let a: Vec<bool> = pairs.iter().map(|p| p.0).collect();
            let b: Vec<bool> = pairs.iter().map(|p| p.1).collect();
            let expected = pairs.iter().filter(|p| p.0 && p.1).count();
            let ma = ValidityMask::build(&a);
            let mb = ValidityMask::build(&b);
            prop_assert_eq!(ma.count_common(&mb).unwrap(), expected);
            prop_assert_eq!(ma.and(&mb).unwrap().iter_present().count(), expected);
        }
    }
}

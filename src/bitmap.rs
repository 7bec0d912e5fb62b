//! Compact integer set
//!
//! Tracks which positions of a fixed-size sequence are null, or which hold
//! `true`. Stored as a growable word bitmap and serialized in whichever of
//! two forms is shorter:
//!
//! ```text
//! sparse: 0x00 | count varint | first index varint | delta varint ...
//! dense:  0x01 | word count varint | u64 LE words ...
//! ```

use crate::decoder::Source;
use crate::encoder::Sink;
use crate::error::{Corruption, Result};
use crate::varint;

const WORD_BITS: u32 = 64;

const TAG_SPARSE: u8 = 0x00;
const TAG_DENSE: u8 = 0x01;

/// Set of non-negative indices
#[derive(Debug, Clone, Default)]
pub struct IntSet {
    words: Vec<u64>,
    len: usize,
}

impl IntSet {
    /// Create new empty set
    #[inline]
    pub const fn new() -> Self {
        Self {
            words: Vec::new(),
            len: 0,
        }
    }

    #[inline]
    fn locate(index: u32) -> (usize, u64) {
        ((index / WORD_BITS) as usize, 1u64 << (index % WORD_BITS))
    }

    /// Add an index; returns `false` if it was already present
    pub fn insert(&mut self, index: u32) -> bool {
        let (word, mask) = Self::locate(index);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let fresh = self.words[word] & mask == 0;
        if fresh {
            self.words[word] |= mask;
            self.len += 1;
        }
        fresh
    }

    /// Check if an index is present
    #[inline]
    pub fn contains(&self, index: u32) -> bool {
        let (word, mask) = Self::locate(index);
        self.words.get(word).is_some_and(|bits| bits & mask != 0)
    }

    /// Number of indices in the set
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the set is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Largest index in the set
    pub fn max(&self) -> Option<u32> {
        let (word, bits) = self
            .words
            .iter()
            .enumerate()
            .rev()
            .find(|(_, bits)| **bits != 0)?;
        Some(word as u32 * WORD_BITS + (WORD_BITS - 1 - bits.leading_zeros()))
    }

    /// Iterator over indices in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(word, &bits)| {
            let base = word as u32 * WORD_BITS;
            let mut rest = bits;
            core::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let offset = rest.trailing_zeros();
                rest &= rest - 1;
                Some(base + offset)
            })
        })
    }

    /// Words up to and including the last non-zero one
    fn trimmed_words(&self) -> &[u64] {
        let end = self
            .words
            .iter()
            .rposition(|bits| *bits != 0)
            .map_or(0, |last| last + 1);
        &self.words[..end]
    }

    fn sparse_size(&self) -> usize {
        let mut size = varint::encoded_len(self.len as u64);
        let mut prev = 0u32;
        for index in self.iter() {
            size += varint::encoded_len(u64::from(index - prev));
            prev = index;
        }
        size
    }

    fn dense_size(&self) -> usize {
        let words = self.trimmed_words().len();
        varint::encoded_len(words as u64) + words * 8
    }

    /// Encode the set into `sink`
    pub fn encode(&self, sink: &mut dyn Sink) -> Result<()> {
        if self.sparse_size() <= self.dense_size() {
            sink.put_u8(TAG_SPARSE)?;
            sink.put_varint_u64(self.len as u64)?;
            let mut prev = 0u32;
            for index in self.iter() {
                sink.put_varint_u64(u64::from(index - prev))?;
                prev = index;
            }
        } else {
            let words = self.trimmed_words();
            sink.put_u8(TAG_DENSE)?;
            sink.put_varint_u64(words.len() as u64)?;
            for &bits in words {
                sink.put_u64(bits)?;
            }
        }
        Ok(())
    }

    /// Decode a set previously written by [`IntSet::encode`]
    pub fn decode(source: &mut dyn Source) -> Result<Self> {
        Self::decode_bounded(source, 1 << 32)
    }

    /// Decode a set and check every index lies below `bound`
    pub(crate) fn decode_within(source: &mut dyn Source, bound: usize) -> Result<Self> {
        Self::decode_bounded(source, bound as u64)
    }

    fn decode_bounded(source: &mut dyn Source, bound: u64) -> Result<Self> {
        match source.get_u8()? {
            TAG_SPARSE => {
                let count = source.get_varint_u64()?;
                let mut set = Self::new();
                let mut prev = 0u64;
                for n in 0..count {
                    let delta = source.get_varint_u64()?;
                    if n > 0 && delta == 0 {
                        return Err(Corruption::InvalidIndexSet.into());
                    }
                    let index = prev
                        .checked_add(delta)
                        .filter(|index| *index < bound)
                        .ok_or(Corruption::InvalidIndexSet)?;
                    set.insert(index as u32);
                    prev = index;
                }
                Ok(set)
            }
            TAG_DENSE => {
                let count = source.get_varint_u64()?;
                if count > bound.div_ceil(u64::from(WORD_BITS)) {
                    return Err(Corruption::InvalidIndexSet.into());
                }
                let mut words = Vec::new();
                for _ in 0..count {
                    words.push(source.get_u64()?);
                }
                let len = words.iter().map(|bits| bits.count_ones() as usize).sum();
                let set = Self { words, len };
                match set.max() {
                    Some(max) if u64::from(max) >= bound => Err(Corruption::InvalidIndexSet.into()),
                    _ => Ok(set),
                }
            }
            _ => Err(Corruption::InvalidIndexSet.into()),
        }
    }
}

impl PartialEq for IntSet {
    fn eq(&self, other: &Self) -> bool {
        self.trimmed_words() == other.trimmed_words()
    }
}

impl Eq for IntSet {}

impl FromIterator<u32> for IntSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<u32> for IntSet {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, iter: I) {
        for index in iter {
            self.insert(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::ByteCursor;
    use crate::error::Error;
    use proptest::prelude::*;

    fn roundtrip(set: &IntSet) -> (IntSet, Vec<u8>) {
        let mut buf: Vec<u8> = Vec::new();
        set.encode(&mut buf).unwrap();
        let mut cursor = ByteCursor::new(&buf);
        let decoded = IntSet::decode(&mut cursor).unwrap();
        assert!(cursor.is_at_end());
        (decoded, buf)
    }

    #[test]
    fn test_set_basic_operations() {
        let mut set = IntSet::new();

        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert!(!set.contains(0));

        assert!(set.insert(0));
        assert!(set.insert(3));
        assert!(set.insert(700));
        assert!(!set.insert(3));

        assert_eq!(set.len(), 3);
        assert!(set.contains(0));
        assert!(set.contains(3));
        assert!(set.contains(700));
        assert!(!set.contains(1));
        assert!(!set.contains(100_000));
        assert_eq!(set.max(), Some(700));
    }

    #[test]
    fn test_set_iterator_sorted_from_unordered_input() {
        let set: IntSet = [64, 1, 130, 6, 1].into_iter().collect();
        let indices: Vec<u32> = set.iter().collect();
        assert_eq!(indices, vec![1, 6, 64, 130]);
    }

    #[test]
    fn test_empty_set_encoding() {
        let (decoded, buf) = roundtrip(&IntSet::new());
        assert_eq!(buf, [TAG_SPARSE, 0]);
        assert!(decoded.is_empty());
        assert_eq!(decoded.max(), None);
    }

    #[test]
    fn test_sparse_form_chosen_for_few_indices() {
        let set: IntSet = [0, 2].into_iter().collect();
        let (decoded, buf) = roundtrip(&set);
        assert_eq!(buf, [TAG_SPARSE, 2, 0, 2]);
        assert_eq!(decoded, set);
    }

    #[test]
    fn test_dense_form_chosen_for_many_indices() {
        let set: IntSet = (0..64).collect();
        let (decoded, buf) = roundtrip(&set);
        assert_eq!(buf[0], TAG_DENSE);
        assert_eq!(buf.len(), 1 + 1 + 8);
        assert_eq!(decoded.len(), 64);
        assert_eq!(decoded, set);
    }

    #[test]
    fn test_zero_tail_is_not_encoded() {
        let mut buf = vec![TAG_DENSE, 2];
        buf.extend(u64::MAX.to_le_bytes());
        buf.extend(0u64.to_le_bytes());
        let set = IntSet::decode(&mut ByteCursor::new(&buf)).unwrap();
        assert_eq!(set.len(), 64);
        assert_eq!(set, (0..64).collect::<IntSet>());

        let (decoded, buf) = roundtrip(&set);
        assert_eq!(buf.len(), 10);
        assert_eq!(decoded, set);
    }

    #[test]
    fn test_decode_rejects_duplicates_and_bad_tag() {
        let buf = [TAG_SPARSE, 2, 5, 0];
        let err = IntSet::decode(&mut ByteCursor::new(&buf)).unwrap_err();
        assert!(matches!(
            err,
            Error::StreamCorruption(Corruption::InvalidIndexSet)
        ));

        let buf = [7u8];
        assert!(IntSet::decode(&mut ByteCursor::new(&buf)).is_err());
    }

    #[test]
    fn test_decode_within_bound() {
        let set: IntSet = [1, 9].into_iter().collect();
        let mut buf: Vec<u8> = Vec::new();
        set.encode(&mut buf).unwrap();

        assert!(IntSet::decode_within(&mut ByteCursor::new(&buf), 10).is_ok());
        assert!(IntSet::decode_within(&mut ByteCursor::new(&buf), 9).is_err());
    }

    proptest! {
        #[test]
        fn prop_roundtrip(indices in proptest::collection::vec(0u32..5_000, 0..300)) {
            let set: IntSet = indices.iter().copied().collect();
            let (decoded, _) = roundtrip(&set);
            prop_assert_eq!(&decoded, &set);
            for index in indices {
                prop_assert!(decoded.contains(index));
            }
        }
    }
}

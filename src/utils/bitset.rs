//! A compact bit set over argument positions.
//!
//! Instrumented methods record which of their arguments can be captured as a bit set indexed
//! by argument position (the implicit `this` being position 0 for instance methods). The
//! probe consults it for every argument on the hot path, so the representation is a plain
//! word vector with no allocation after construction.
//!
//! # Example
//!
//! ```rust
//! use callscope::utils::BitSet;
//!
//! let mut supported = BitSet::new(3);
//! supported.insert(0);
//! supported.insert(2);
//!
//! assert!(supported.contains(2));
//! assert!(!supported.contains(1));
//! assert_eq!(supported.iter().collect::<Vec<_>>(), vec![0, 2]);
//! ```

const WORD_BITS: usize = u64::BITS as usize;

/// Word index and mask of a bit position
const fn locate(index: usize) -> (usize, u64) {
    (index / WORD_BITS, 1 << (index % WORD_BITS))
}

/// Argument positions packed into 64-bit words; the width is fixed at construction.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitSet {
    words: Vec<u64>,
    width: usize,
}

impl BitSet {
    /// All-clear set of `width` positions.
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            words: vec![0; width.div_ceil(WORD_BITS)],
            width,
        }
    }

    /// Set of `width` positions where position `i` is set iff `predicate(i)`.
    #[must_use]
    pub fn from_fn(width: usize, mut predicate: impl FnMut(usize) -> bool) -> Self {
        let mut set = Self::new(width);
        (0..width).filter(|&index| predicate(index)).for_each(|index| set.insert(index));
        set
    }

    /// Number of positions, set or not.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.width
    }

    /// Returns `true` when no position is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }

    /// Marks `index` as set.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`BitSet::len`].
    pub fn insert(&mut self, index: usize) {
        assert!(index < self.width, "bit {index} outside a set of {}", self.width);
        let (word, mask) = locate(index);
        self.words[word] |= mask;
    }

    /// Returns `true` if `index` is set. Positions past the width are never set.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        let (word, mask) = locate(index);
        index < self.width && self.words[word] & mask != 0
    }

    /// Number of set positions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Set positions in ascending order.
    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            words: &self.words,
            base: 0,
            pending: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl std::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Ascending iterator over the set positions of a [`BitSet`].
pub struct BitSetIter<'a> {
    words: &'a [u64],
    /// First position covered by `pending`
    base: usize,
    /// Bits of the current word not yet yielded
    pending: u64,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pending == 0 {
            self.base += WORD_BITS;
            self.pending = *self.words.get(self.base / WORD_BITS)?;
        }
        let offset = self.pending.trailing_zeros() as usize;
        self.pending &= self.pending - 1;
        Some(self.base + offset)
    }
}

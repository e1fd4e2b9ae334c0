//! A growable bit set with a canonical representation.
//!
//! Trailing zero words are always trimmed, so the derived `Eq` and `Hash`
//! only see membership. This makes `BitSet` usable directly inside hash keys
//! (node sets of NFA states, boundary slot sets).

use std::fmt;

use smallvec::SmallVec;

const WORD_BITS: usize = 64;

#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitSet {
    words: SmallVec<[u64; 2]>,
}

impl BitSet {
    #[inline]
    pub fn new() -> Self {
        BitSet {
            words: SmallVec::new(),
        }
    }

    /// Set containing exactly `bit`.
    pub fn singleton(bit: usize) -> Self {
        let mut set = BitSet::new();
        set.insert(bit);
        set
    }

    /// Inserts `bit`. Returns true if it was not present.
    pub fn insert(&mut self, bit: usize) -> bool {
        let (word, mask) = locate(bit);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let was_set = self.words[word] & mask != 0;
        self.words[word] |= mask;
        !was_set
    }

    /// Removes `bit`. Returns true if it was present.
    pub fn remove(&mut self, bit: usize) -> bool {
        let (word, mask) = locate(bit);
        if word >= self.words.len() || self.words[word] & mask == 0 {
            return false;
        }
        self.words[word] &= !mask;
        self.trim();
        true
    }

    #[inline]
    pub fn contains(&self, bit: usize) -> bool {
        let (word, mask) = locate(bit);
        word < self.words.len() && self.words[word] & mask != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn union_with(&mut self, other: &BitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= *b;
        }
    }

    pub fn difference_with(&mut self, other: &BitSet) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a &= !*b;
        }
        self.trim();
    }

    /// True if every member of `self` is in `other`.
    pub fn is_subset(&self, other: &BitSet) -> bool {
        self.words.iter().enumerate().all(|(i, w)| {
            let o = other.words.get(i).copied().unwrap_or(0);
            w & !o == 0
        })
    }

    pub fn is_disjoint(&self, other: &BitSet) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == 0)
    }

    /// Members in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            words: &self.words,
            index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

#[inline]
fn locate(bit: usize) -> (usize, u64) {
    (bit / WORD_BITS, 1u64 << (bit % WORD_BITS))
}

pub struct Iter<'a> {
    words: &'a [u64],
    index: usize,
    current: u64,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.index * WORD_BITS + bit);
            }
            self.index += 1;
            self.current = *self.words.get(self.index)?;
        }
    }
}

impl<'a> IntoIterator for &'a BitSet {
    type Item = usize;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = BitSet::new();
        for bit in iter {
            set.insert(bit);
        }
        set
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

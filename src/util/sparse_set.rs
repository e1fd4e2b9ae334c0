//! Sparse set for dense ids with O(1) insert, lookup and clear.
//!
//! Based on: https://research.swtch.com/sparse
//!
//! Used as the visited set of graph walks over states (liveness, reachability)
//! where ids are dense and bounded by the allocation counter.

#[derive(Clone, Debug)]
pub struct SparseSet {
    len: usize,
    /// Members in insertion order.
    dense: Vec<usize>,
    /// id -> position in `dense`. An id is present iff
    /// `sparse[id] < len && dense[sparse[id]] == id`.
    sparse: Vec<usize>,
}

impl SparseSet {
    /// Elements must be in range [0, capacity).
    pub fn new(capacity: usize) -> Self {
        SparseSet {
            len: 0,
            dense: vec![0; capacity],
            sparse: vec![0; capacity],
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.dense.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if the id was not already present.
    ///
    /// Panics if id >= capacity.
    #[inline]
    pub fn insert(&mut self, id: usize) -> bool {
        if self.contains(id) {
            return false;
        }
        debug_assert!(self.len < self.capacity());
        self.dense[self.len] = id;
        self.sparse[id] = self.len;
        self.len += 1;
        true
    }

    #[inline]
    pub fn contains(&self, id: usize) -> bool {
        let idx = self.sparse[id];
        idx < self.len && self.dense[idx] == id
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Members in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.dense[..self.len].iter().copied()
    }
}

//! Capture-group boundary bookkeeping.
//!
//! Capture group `g` owns two boundary slots: `2g` (start) and `2g + 1`
//! (end). Group 0 is the implicit group around the whole match.
//!
//! A [`GroupBoundaries`] descriptor records which slots a transition sets to
//! the current input position (`updates`) and which it resets (`clears`),
//! plus the highest capture group closed on the way. Descriptors are
//! immutable once built and are shared between transitions through `Arc`.
//!
//! [`BoundaryTracker`] is the mutable accumulator used while one transition
//! is being assembled from several merged AST transitions.

use std::fmt;

use crate::util::BitSet;

#[inline]
pub fn start_slot(group: u16) -> usize {
    group as usize * 2
}

#[inline]
pub fn end_slot(group: u16) -> usize {
    group as usize * 2 + 1
}

#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct GroupBoundaries {
    updates: BitSet,
    clears: BitSet,
    last_group: Option<u16>,
}

impl GroupBoundaries {
    pub fn new(updates: BitSet, clears: BitSet, last_group: Option<u16>) -> Self {
        GroupBoundaries {
            updates,
            clears,
            last_group,
        }
    }

    /// The descriptor with no boundary effects.
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn updates(&self) -> &BitSet {
        &self.updates
    }

    #[inline]
    pub fn clears(&self) -> &BitSet {
        &self.clears
    }

    /// Highest capture group (other than 0) whose end slot this transition
    /// updates.
    #[inline]
    pub fn last_group(&self) -> Option<u16> {
        self.last_group
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.clears.is_empty() && self.last_group.is_none()
    }

    /// True if group `g` is known to have matched after this transition.
    pub fn sets_group(&self, group: u16) -> bool {
        self.updates.contains(end_slot(group))
    }

    /// True if group `g` is known to be unset after this transition.
    pub fn resets_group(&self, group: u16) -> bool {
        self.clears.contains(end_slot(group))
    }
}

impl fmt::Debug for GroupBoundaries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upd{:?} clr{:?}", self.updates, self.clears)?;
        if let Some(g) = self.last_group {
            write!(f, " last={}", g)?;
        }
        Ok(())
    }
}

/// Accumulates the boundary effects of the AST transitions merged into a
/// single NFA transition.
#[derive(Default, Debug)]
pub struct BoundaryTracker {
    updates: BitSet,
    clears: BitSet,
    last_group: Option<u16>,
}

impl BoundaryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds in one AST transition. Look-behind threads contribute slots but
    /// never the last group.
    pub fn accumulate(&mut self, boundaries: &GroupBoundaries, lookbehind: bool) {
        self.updates.union_with(&boundaries.updates);
        self.clears.union_with(&boundaries.clears);
        if !lookbehind {
            self.last_group = self.last_group.max(boundaries.last_group);
        }
    }

    /// Snapshot of the accumulated effects.
    pub fn finish(&self) -> GroupBoundaries {
        GroupBoundaries {
            updates: self.updates.clone(),
            clears: self.clears.clone(),
            last_group: self.last_group,
        }
    }

    pub fn clear(&mut self) {
        self.updates.clear();
        self.clears.clear();
        self.last_group = None;
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.clears.is_empty() && self.last_group.is_none()
    }
}

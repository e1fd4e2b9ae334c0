//! Fixed-width 64-bit operation and constraint words.
//!
//! ```text
//!  63    60 59          44 43          28 27                     0
//! +--------+--------------+--------------+------------------------+
//! |  kind  |  source id   |  target id   |        payload         |
//! +--------+--------------+--------------+------------------------+
//! ```
//!
//! Source and target are the ids of the transition's endpoints, baked in
//! when the transition is created so a downstream consumer can interpret a
//! word without the transition at hand. The payload is a boundary slot or a
//! capture group number depending on the kind.

use std::fmt;

use super::StateId;

const KIND_SHIFT: u32 = 60;
const SOURCE_SHIFT: u32 = 44;
const TARGET_SHIFT: u32 = 28;
const ID_MASK: u64 = 0xFFFF;
const PAYLOAD_MASK: u64 = (1 << TARGET_SHIFT) - 1;

/// Largest state id a packed word can carry.
pub const MAX_PACKED_STATE: u32 = ID_MASK as u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpKind {
    /// Record the current position in a boundary slot.
    SetBoundary = 1,
    /// Reset a boundary slot to "unset".
    ClearBoundary = 2,
    /// Transition is only valid if the capture group has matched.
    GuardGroupMatched = 3,
    /// Transition is only valid if the capture group has not matched.
    GuardGroupUnmatched = 4,
}

impl OpKind {
    fn from_bits(bits: u64) -> Option<OpKind> {
        match bits {
            1 => Some(OpKind::SetBoundary),
            2 => Some(OpKind::ClearBoundary),
            3 => Some(OpKind::GuardGroupMatched),
            4 => Some(OpKind::GuardGroupUnmatched),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedOp(u64);

impl PackedOp {
    pub fn new(kind: OpKind, payload: u32) -> Self {
        debug_assert!(u64::from(payload) <= PAYLOAD_MASK);
        PackedOp(((kind as u64) << KIND_SHIFT) | (u64::from(payload) & PAYLOAD_MASK))
    }

    pub fn set_boundary(slot: usize) -> Self {
        Self::new(OpKind::SetBoundary, slot as u32)
    }

    pub fn clear_boundary(slot: usize) -> Self {
        Self::new(OpKind::ClearBoundary, slot as u32)
    }

    pub fn guard(group: u16, matched: bool) -> Self {
        let kind = if matched {
            OpKind::GuardGroupMatched
        } else {
            OpKind::GuardGroupUnmatched
        };
        Self::new(kind, u32::from(group))
    }

    #[inline]
    pub fn kind(self) -> Option<OpKind> {
        OpKind::from_bits(self.0 >> KIND_SHIFT)
    }

    #[inline]
    pub fn source(self) -> StateId {
        StateId(((self.0 >> SOURCE_SHIFT) & ID_MASK) as u32)
    }

    #[inline]
    pub fn target(self) -> StateId {
        StateId(((self.0 >> TARGET_SHIFT) & ID_MASK) as u32)
    }

    #[inline]
    pub fn payload(self) -> u32 {
        (self.0 & PAYLOAD_MASK) as u32
    }

    #[inline]
    pub fn with_source(self, id: StateId) -> Self {
        debug_assert!(id.0 <= MAX_PACKED_STATE);
        let cleared = self.0 & !(ID_MASK << SOURCE_SHIFT);
        PackedOp(cleared | ((u64::from(id.0) & ID_MASK) << SOURCE_SHIFT))
    }

    #[inline]
    pub fn with_target(self, id: StateId) -> Self {
        debug_assert!(id.0 <= MAX_PACKED_STATE);
        let cleared = self.0 & !(ID_MASK << TARGET_SHIFT);
        PackedOp(cleared | ((u64::from(id.0) & ID_MASK) << TARGET_SHIFT))
    }
}

impl fmt::Debug for PackedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(
                f,
                "{:?}({}) {}->{}",
                kind,
                self.payload(),
                self.source().index(),
                self.target().index()
            ),
            None => write!(f, "PackedOp({:#018x})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_independent() {
        let op = PackedOp::set_boundary(7)
            .with_source(StateId(12))
            .with_target(StateId(MAX_PACKED_STATE));
        assert_eq!(op.kind(), Some(OpKind::SetBoundary));
        assert_eq!(op.payload(), 7);
        assert_eq!(op.source(), StateId(12));
        assert_eq!(op.target(), StateId(MAX_PACKED_STATE));

        // Retargeting touches only the target field
        let moved = op.with_target(StateId(3));
        assert_eq!(moved.target(), StateId(3));
        assert_eq!(moved.source(), StateId(12));
        assert_eq!(moved.payload(), 7);
        assert_eq!(moved.kind(), Some(OpKind::SetBoundary));
    }

    #[test]
    fn test_guard_kinds() {
        assert_eq!(PackedOp::guard(2, true).kind(), Some(OpKind::GuardGroupMatched));
        assert_eq!(
            PackedOp::guard(2, false).kind(),
            Some(OpKind::GuardGroupUnmatched)
        );
        assert_eq!(PackedOp::guard(9, false).payload(), 9);
        assert_eq!(PackedOp::clear_boundary(4).kind(), Some(OpKind::ClearBoundary));
    }
}

//! The generated automaton.
//!
//! States and transitions live in arenas indexed by dense ids. Pruning
//! leaves holes (`None` slots) instead of renumbering, so ids handed out
//! during construction stay valid and the counters double as sizing hints
//! for a determinizer.
//!
//! Layout of a finished [`Nfa`]:
//!
//! ```text
//!              anchored entries          unanchored entries
//!   dummy ──┬──> A_P -> .. -> A_0    ┬──> U_P -> .. -> U_0 ⟲
//!           │                        │
//!           └── reverse entries <────┴── anchored final, final
//! ```
//!
//! - entries are chained by full-set loop-back transitions, offset `i` to
//!   offset `i - 1`
//! - `U_0` loops on itself so an unanchored match may start anywhere; under
//!   must-advance matching the loop goes through a separate advanced
//!   initial state instead (`U_0 -> advanced ⟲`)
//! - anchored entries alias the unanchored ones when no `^` is reachable
//! - the reverse entries (final -> dummy) are not listed among the finals'
//!   successors; they exist for reverse matching

mod generator;
mod ops;
mod registry;


use std::fmt;
use std::sync::Arc;

use crate::boundaries::GroupBoundaries;
use crate::charset::CodePointSet;
use crate::util::BitSet;

pub use generator::NfaGenerator;
pub use ops::{OpKind, PackedOp, MAX_PACKED_STATE};
pub use registry::{StateKey, StateRegistry};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct StateId(u32);

impl StateId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct TransitionId(u32);

impl TransitionId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

const ANCHORED_FINAL: u8 = 1 << 0;
const UNANCHORED_FINAL: u8 = 1 << 1;
const ANCHORED_INITIAL: u8 = 1 << 2;
const UNANCHORED_INITIAL: u8 = 1 << 3;
const HAS_PREFIX_STATES: u8 = 1 << 4;
const PREFIX: u8 = 1 << 5;

#[derive(Clone, Debug)]
pub struct NfaState {
    id: StateId,
    key: StateKey,
    successors: Vec<TransitionId>,
    predecessors: Vec<TransitionId>,
    flags: u8,
    /// Look-behinds completed by the nodes of this state.
    finished_lookbehinds: BitSet,
}

impl NfaState {
    fn new(id: StateId, key: StateKey) -> Self {
        NfaState {
            id,
            key,
            successors: Vec::new(),
            predecessors: Vec::new(),
            flags: 0,
            finished_lookbehinds: BitSet::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> StateId {
        self.id
    }

    #[inline]
    pub fn key(&self) -> &StateKey {
        &self.key
    }

    /// Syntax tree nodes this state stands for.
    #[inline]
    pub fn nodes(&self) -> &BitSet {
        &self.key.nodes
    }

    /// Outgoing transitions, highest priority first.
    #[inline]
    pub fn successors(&self) -> &[TransitionId] {
        &self.successors
    }

    #[inline]
    pub fn predecessors(&self) -> &[TransitionId] {
        &self.predecessors
    }

    #[inline]
    pub fn is_must_advance(&self) -> bool {
        self.key.must_advance
    }

    /// Matched tracked condition groups, if the pattern has conditionals.
    #[inline]
    pub fn conditions(&self) -> Option<u64> {
        self.key.conditions
    }

    #[inline]
    pub fn is_anchored_final(&self) -> bool {
        self.flags & ANCHORED_FINAL != 0
    }

    #[inline]
    pub fn is_unanchored_final(&self) -> bool {
        self.flags & UNANCHORED_FINAL != 0
    }

    #[inline]
    pub fn is_final(&self) -> bool {
        self.flags & (ANCHORED_FINAL | UNANCHORED_FINAL) != 0
    }

    #[inline]
    pub fn is_anchored_initial(&self) -> bool {
        self.flags & ANCHORED_INITIAL != 0
    }

    #[inline]
    pub fn is_unanchored_initial(&self) -> bool {
        self.flags & UNANCHORED_INITIAL != 0
    }

    /// Entry state for a start offset above zero.
    #[inline]
    pub fn has_prefix_states(&self) -> bool {
        self.flags & HAS_PREFIX_STATES != 0
    }

    /// Every node of this state is padding before the match start.
    #[inline]
    pub fn is_prefix(&self) -> bool {
        self.flags & PREFIX != 0
    }

    #[inline]
    pub fn finished_lookbehinds(&self) -> &BitSet {
        &self.finished_lookbehinds
    }

    fn set_flag(&mut self, flag: u8) {
        self.flags |= flag;
    }
}

#[derive(Clone, Debug)]
pub struct NfaTransition {
    id: TransitionId,
    source: StateId,
    target: StateId,
    code_points: CodePointSet,
    boundaries: Arc<GroupBoundaries>,
    constraints: Vec<PackedOp>,
    operations: Vec<PackedOp>,
    loop_back: bool,
}

impl NfaTransition {
    #[inline]
    pub fn id(&self) -> TransitionId {
        self.id
    }

    #[inline]
    pub fn source(&self) -> StateId {
        self.source
    }

    #[inline]
    pub fn target(&self) -> StateId {
        self.target
    }

    #[inline]
    pub fn code_points(&self) -> &CodePointSet {
        &self.code_points
    }

    #[inline]
    pub fn boundaries(&self) -> &Arc<GroupBoundaries> {
        &self.boundaries
    }

    /// Guards that must hold for the transition to be taken.
    #[inline]
    pub fn constraints(&self) -> &[PackedOp] {
        &self.constraints
    }

    /// Boundary operations performed when the transition is taken.
    #[inline]
    pub fn operations(&self) -> &[PackedOp] {
        &self.operations
    }

    /// Chains an entry state to the next lower start offset.
    #[inline]
    pub fn is_loop_back(&self) -> bool {
        self.loop_back
    }
}

/// A finished automaton.
#[derive(Clone, Debug)]
pub struct Nfa {
    states: Vec<Option<NfaState>>,
    transitions: Vec<Option<NfaTransition>>,
    dummy_initial: StateId,
    anchored_final: StateId,
    final_state: StateId,
    anchored_entries: Vec<Option<TransitionId>>,
    unanchored_entries: Vec<Option<TransitionId>>,
    anchored_reverse_entry: TransitionId,
    unanchored_reverse_entry: TransitionId,
    initial_loop_back: Option<TransitionId>,
    state_id_count: u32,
    transition_id_count: u32,
}

impl Nfa {
    pub fn state(&self, id: StateId) -> Option<&NfaState> {
        self.states.get(id.index()).and_then(Option::as_ref)
    }

    pub fn transition(&self, id: TransitionId) -> Option<&NfaTransition> {
        self.transitions.get(id.index()).and_then(Option::as_ref)
    }

    /// Live states in id order.
    pub fn states(&self) -> impl Iterator<Item = &NfaState> + '_ {
        self.states.iter().flatten()
    }

    /// Live transitions in id order.
    pub fn transitions(&self) -> impl Iterator<Item = &NfaTransition> + '_ {
        self.transitions.iter().flatten()
    }

    pub fn number_of_states(&self) -> usize {
        self.states().count()
    }

    pub fn number_of_transitions(&self) -> usize {
        self.transitions().count()
    }

    /// Ids handed out during construction, pruned ones included.
    #[inline]
    pub fn state_id_count(&self) -> u32 {
        self.state_id_count
    }

    #[inline]
    pub fn transition_id_count(&self) -> u32 {
        self.transition_id_count
    }

    #[inline]
    pub fn dummy_initial(&self) -> StateId {
        self.dummy_initial
    }

    #[inline]
    pub fn anchored_final(&self) -> StateId {
        self.anchored_final
    }

    #[inline]
    pub fn final_state(&self) -> StateId {
        self.final_state
    }

    /// Entry transitions by start offset; `None` where the entry state was
    /// pruned.
    #[inline]
    pub fn anchored_entries(&self) -> &[Option<TransitionId>] {
        &self.anchored_entries
    }

    #[inline]
    pub fn unanchored_entries(&self) -> &[Option<TransitionId>] {
        &self.unanchored_entries
    }

    #[inline]
    pub fn anchored_reverse_entry(&self) -> TransitionId {
        self.anchored_reverse_entry
    }

    #[inline]
    pub fn unanchored_reverse_entry(&self) -> TransitionId {
        self.unanchored_reverse_entry
    }

    /// Self-loop that restarts an unanchored search one character later: on
    /// entry 0, or on the advanced initial state under must-advance
    /// matching. Anchored and sticky searches skip it.
    #[inline]
    pub fn initial_loop_back(&self) -> Option<TransitionId> {
        self.initial_loop_back
    }

    /// True if anchored and unanchored searches share their entry states.
    pub fn has_shared_entries(&self) -> bool {
        self.anchored_entries == self.unanchored_entries
    }

    /// Entry state behind an entry transition.
    pub fn entry_state(&self, entry: Option<TransitionId>) -> Option<&NfaState> {
        let t = self.transition(entry?)?;
        self.state(t.target)
    }
}

impl fmt::Display for Nfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for state in self.states() {
            write!(f, "S{} {:?}", state.id.index(), state.key.nodes)?;
            let mut tags = Vec::new();
            if state.id == self.dummy_initial {
                tags.push("dummy");
            }
            if state.is_anchored_initial() {
                tags.push("anchored-initial");
            }
            if state.is_unanchored_initial() {
                tags.push("initial");
            }
            if state.is_anchored_final() {
                tags.push("anchored-final");
            }
            if state.is_unanchored_final() {
                tags.push("final");
            }
            if state.is_must_advance() {
                tags.push("must-advance");
            }
            if state.is_prefix() {
                tags.push("prefix");
            }
            if !tags.is_empty() {
                write!(f, " ({})", tags.join(", "))?;
            }
            writeln!(f)?;
            for &tid in &state.successors {
                if let Some(t) = self.transition(tid) {
                    write!(f, "  T{} -> S{} {}", tid.index(), t.target.index(), t.code_points)?;
                    if !t.boundaries.is_empty() {
                        write!(f, " {:?}", t.boundaries)?;
                    }
                    if !t.constraints.is_empty() {
                        write!(f, " if {:?}", t.constraints)?;
                    }
                    if t.loop_back {
                        write!(f, " loop-back")?;
                    }
                    writeln!(f)?;
                }
            }
        }
        Ok(())
    }
}

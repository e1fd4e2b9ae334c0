//! Deduplication of automaton states by structural identity.

use rustc_hash::FxHashMap;

use super::StateId;
use crate::util::{BitSet, ThresholdCounter};
use crate::Error;

/// Structural identity of an automaton state.
///
/// `conditions` is present only for patterns with conditionals; it holds
/// one bit per tracked condition group that has matched.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub nodes: BitSet,
    pub must_advance: bool,
    pub conditions: Option<u64>,
}

impl StateKey {
    pub fn new(nodes: BitSet, must_advance: bool, conditions: Option<u64>) -> Self {
        StateKey {
            nodes,
            must_advance,
            conditions,
        }
    }
}

/// Maps keys to state ids and holds the states still waiting for
/// expansion.
#[derive(Debug)]
pub struct StateRegistry {
    map: FxHashMap<StateKey, StateId>,
    worklist: Vec<StateId>,
    ids: ThresholdCounter,
}

impl StateRegistry {
    pub fn new(max_states: u32) -> Self {
        StateRegistry {
            map: FxHashMap::default(),
            worklist: Vec::new(),
            ids: ThresholdCounter::new(max_states, "states"),
        }
    }

    /// Looks `key` up, allocating a fresh id and queueing it for expansion
    /// if it is unknown. Returns the id and whether it is new.
    pub fn register_or_get(&mut self, key: &StateKey) -> Result<(StateId, bool), Error> {
        if let Some(&id) = self.map.get(key) {
            return Ok((id, false));
        }
        let id = self.insert(key.clone())?;
        self.worklist.push(id);
        Ok((id, true))
    }

    /// Allocates an id for a key that must not be registered yet, without
    /// queueing it.
    pub fn insert(&mut self, key: StateKey) -> Result<StateId, Error> {
        debug_assert!(!self.map.contains_key(&key));
        let id = StateId(self.ids.inc()?);
        self.map.insert(key, id);
        Ok(id)
    }

    pub fn push(&mut self, id: StateId) {
        self.worklist.push(id);
    }

    /// Next state to expand, most recently queued first.
    pub fn pop(&mut self) -> Option<StateId> {
        self.worklist.pop()
    }

    pub fn remove(&mut self, key: &StateKey) {
        self.map.remove(key);
    }

    /// Registered states.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Ids handed out so far, including those of removed states.
    pub fn id_count(&self) -> u32 {
        self.ids.count()
    }
}

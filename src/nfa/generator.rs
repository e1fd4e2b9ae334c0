//! Worklist-driven NFA construction.
//!
//! Phases, in order:
//! 1. special states: dummy root, anchored final, final, reverse entries
//! 2. entry states, one per start offset (anchored twins if needed), plus
//!    the advanced initial state under must-advance matching
//! 3. expansion: pop a state, step its node set, merge each successor by
//!    code point, register target states and emit transitions
//! 4. loop-back wiring between entry states
//! 5. reverse-edge linking into predecessor lists
//! 6. pruning of states that cannot reach a final state

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::{
    Nfa, NfaState, NfaTransition, PackedOp, StateId, StateKey, StateRegistry, TransitionId,
    ANCHORED_FINAL, ANCHORED_INITIAL, HAS_PREFIX_STATES, PREFIX, UNANCHORED_FINAL,
    UNANCHORED_INITIAL,
};
use crate::ast::{
    AstStepper, CompilationBuffer, NodeKind, RegexAst, StepSource, Successor,
    TransitionCanonicalizer, TransitionGroup,
};
use crate::boundaries::{BoundaryTracker, GroupBoundaries};
use crate::charset::CodePointSet;
use crate::config::NfaConfig;
use crate::util::{BitSet, SparseSet, ThresholdCounter};
use crate::Error;

/// The state being expanded.
struct Source {
    id: StateId,
    must_advance: bool,
    conditions: Option<u64>,
    /// A pure, unconstrained match may end the expansion early.
    may_short_circuit: bool,
}

/// Builds an [`Nfa`] from a [`RegexAst`]. Single use: `generate` consumes
/// the generator.
pub struct NfaGenerator<'a> {
    ast: &'a RegexAst,
    stepper: AstStepper<'a>,
    canonicalizer: TransitionCanonicalizer,
    buffer: CompilationBuffer,
    successors: Vec<Successor>,
    tracker: BoundaryTracker,
    registry: StateRegistry,
    states: Vec<Option<NfaState>>,
    transitions: Vec<Option<NfaTransition>>,
    transition_ids: ThresholdCounter,
    interned: FxHashMap<GroupBoundaries, Arc<GroupBoundaries>>,
    empty_boundaries: Arc<GroupBoundaries>,

    // Valid once `generate` has created the special states.
    dummy_initial: StateId,
    anchored_final: StateId,
    final_state: StateId,
    anchored_reverse_entry: TransitionId,
    unanchored_reverse_entry: TransitionId,

    initial_states: Vec<StateId>,
    anchored_initial_states: Vec<StateId>,
    unanchored_entries: Vec<Option<TransitionId>>,
    anchored_entries: Vec<Option<TransitionId>>,
    advanced_initial: Option<StateId>,
    initial_loop_back: Option<TransitionId>,
    prefix_states: Vec<StateId>,
}

impl<'a> NfaGenerator<'a> {
    pub fn new(ast: &'a RegexAst, config: &NfaConfig) -> Self {
        NfaGenerator {
            ast,
            stepper: AstStepper::new(ast, config.max_tracked_conditions()),
            canonicalizer: TransitionCanonicalizer::new(),
            buffer: CompilationBuffer::new(),
            successors: Vec::new(),
            tracker: BoundaryTracker::new(),
            registry: StateRegistry::new(config.max_states()),
            states: Vec::new(),
            transitions: Vec::new(),
            transition_ids: ThresholdCounter::new(config.max_transitions(), "transitions"),
            interned: FxHashMap::default(),
            empty_boundaries: Arc::new(GroupBoundaries::empty()),
            dummy_initial: StateId(0),
            anchored_final: StateId(0),
            final_state: StateId(0),
            anchored_reverse_entry: TransitionId(0),
            unanchored_reverse_entry: TransitionId(0),
            initial_states: Vec::new(),
            anchored_initial_states: Vec::new(),
            unanchored_entries: Vec::new(),
            anchored_entries: Vec::new(),
            advanced_initial: None,
            initial_loop_back: None,
            prefix_states: Vec::new(),
        }
    }

    pub fn generate(mut self) -> Result<Nfa, Error> {
        self.create_special_states()?;
        self.create_initial_states()?;

        let mut expanded = 0usize;
        while let Some(id) = self.registry.pop() {
            self.expand_state(id)?;
            expanded += 1;
        }
        log::debug!(
            "nfa: expanded {} states, {} transitions",
            expanded,
            self.transition_ids.count()
        );

        self.wire_loop_backs()?;
        self.link_predecessors();
        self.prune_dead_states();
        Ok(self.finish())
    }

    fn state(&self, id: StateId) -> Option<&NfaState> {
        self.states.get(id.index()).and_then(Option::as_ref)
    }

    fn state_mut(&mut self, id: StateId) -> Option<&mut NfaState> {
        self.states.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn transition_mut(&mut self, id: TransitionId) -> Option<&mut NfaTransition> {
        self.transitions.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn conditions_seed(&self) -> Option<u64> {
        self.ast.has_conditionals().then_some(0)
    }

    /// Allocates a state for a key the registry has not seen.
    fn add_state(&mut self, key: StateKey, flags: u8) -> Result<StateId, Error> {
        let id = self.registry.insert(key.clone())?;
        self.push_state(id, key, flags);
        Ok(id)
    }

    fn push_state(&mut self, id: StateId, key: StateKey, flags: u8) {
        debug_assert_eq!(self.states.len(), id.index());
        let mut state = NfaState::new(id, key);
        state.set_flag(flags);
        self.states.push(Some(state));
    }

    fn create_transition(
        &mut self,
        source: StateId,
        target: StateId,
        code_points: CodePointSet,
        boundaries: Arc<GroupBoundaries>,
        constraints: Vec<PackedOp>,
        operations: Vec<PackedOp>,
    ) -> Result<TransitionId, Error> {
        let id = TransitionId(self.transition_ids.inc()?);
        let bake = |op: PackedOp| op.with_source(source).with_target(target);
        debug_assert_eq!(self.transitions.len(), id.index());
        self.transitions.push(Some(NfaTransition {
            id,
            source,
            target,
            code_points,
            boundaries,
            constraints: constraints.into_iter().map(bake).collect(),
            operations: operations.into_iter().map(bake).collect(),
            loop_back: false,
        }));
        Ok(id)
    }

    /// Full-set transition without boundary effects.
    fn create_plain_transition(
        &mut self,
        source: StateId,
        target: StateId,
    ) -> Result<TransitionId, Error> {
        let empty = self.empty_boundaries.clone();
        self.create_transition(
            source,
            target,
            CodePointSet::full(),
            empty,
            Vec::new(),
            Vec::new(),
        )
    }

    fn create_special_states(&mut self) -> Result<(), Error> {
        let ast = self.ast;
        self.dummy_initial = self.add_state(
            StateKey::new(BitSet::singleton(ast.wrapped_root().index()), false, None),
            0,
        )?;
        self.anchored_final = self.add_state(
            StateKey::new(BitSet::singleton(ast.anchored_final().index()), false, None),
            ANCHORED_FINAL,
        )?;
        self.final_state = self.add_state(
            StateKey::new(BitSet::singleton(ast.match_found().index()), false, None),
            UNANCHORED_FINAL,
        )?;

        // Reverse entries are not listed among the finals' successors
        self.anchored_reverse_entry =
            self.create_plain_transition(self.anchored_final, self.dummy_initial)?;
        self.unanchored_reverse_entry =
            self.create_plain_transition(self.final_state, self.dummy_initial)?;
        let reverse = [self.anchored_reverse_entry, self.unanchored_reverse_entry];
        let dummy = self.dummy_initial;
        if let Some(state) = self.state_mut(dummy) {
            state.predecessors.extend(reverse);
        }
        Ok(())
    }

    fn create_initial_states(&mut self) -> Result<(), Error> {
        let ast = self.ast;
        let must_advance = ast.flags().must_advance;
        let conditions = self.conditions_seed();
        let separate_anchored = ast.has_reachable_carets();

        for offset in 0..=ast.prefix_length() {
            let mut flags = UNANCHORED_INITIAL;
            if !separate_anchored {
                flags |= ANCHORED_INITIAL;
            }
            if offset > 0 {
                flags |= HAS_PREFIX_STATES;
            }
            let key = StateKey::new(
                BitSet::singleton(ast.unanchored_initial(offset).index()),
                must_advance,
                conditions,
            );
            let id = self.add_state(key, flags)?;
            self.initial_states.push(id);
        }

        if separate_anchored {
            for offset in 0..=ast.prefix_length() {
                let mut flags = ANCHORED_INITIAL;
                if offset > 0 {
                    flags |= HAS_PREFIX_STATES;
                }
                let key = StateKey::new(
                    BitSet::singleton(ast.anchored_initial(offset).index()),
                    must_advance,
                    conditions,
                );
                let id = self.add_state(key, flags)?;
                self.anchored_initial_states.push(id);
            }
        } else {
            self.anchored_initial_states = self.initial_states.clone();
        }

        if must_advance {
            let key = StateKey::new(
                BitSet::singleton(ast.unanchored_initial(0).index()),
                false,
                conditions,
            );
            let id = self.add_state(key, 0)?;
            self.advanced_initial = Some(id);
            self.registry.push(id);
        }

        // Dummy root successors: anchored entries, then unanchored ones
        let dummy = self.dummy_initial;
        let mut dummy_successors = Vec::new();
        if separate_anchored {
            for s in self.anchored_initial_states.clone() {
                let t = self.create_plain_transition(dummy, s)?;
                self.anchored_entries.push(Some(t));
                dummy_successors.push(t);
            }
        }
        for s in self.initial_states.clone() {
            let t = self.create_plain_transition(dummy, s)?;
            self.unanchored_entries.push(Some(t));
            dummy_successors.push(t);
        }
        if !separate_anchored {
            self.anchored_entries = self.unanchored_entries.clone();
        }
        if let Some(state) = self.state_mut(dummy) {
            state.successors = dummy_successors;
        }

        for &id in self.initial_states.iter().chain(
            self.anchored_initial_states
                .iter()
                .filter(|_| separate_anchored),
        ) {
            self.registry.push(id);
        }
        log::debug!(
            "nfa: {} start offsets, anchored entries {}",
            self.initial_states.len(),
            if separate_anchored { "separate" } else { "shared" }
        );
        Ok(())
    }

    fn expand_state(&mut self, id: StateId) -> Result<(), Error> {
        let Some(state) = self.state(id) else {
            return Ok(());
        };
        let nodes = state.key.nodes.clone();
        let first_of_many = self.initial_states.len() > 1 && self.initial_states[0] == id;
        let source = Source {
            id,
            must_advance: state.key.must_advance,
            conditions: state.key.conditions,
            may_short_circuit: !state.is_prefix() && !first_of_many,
        };

        let mut successors = std::mem::take(&mut self.successors);
        let mut buffer = std::mem::take(&mut self.buffer);
        successors.clear();
        self.stepper.step(
            StepSource {
                nodes: &nodes,
                conditions: source.conditions.unwrap_or(0),
            },
            &mut successors,
        );
        let emitted = self.emit_successors(&source, &successors, &mut buffer);
        log::trace!(
            "nfa: S{} {:?}: {} successors",
            id.index(),
            nodes,
            successors.len()
        );
        self.successors = successors;
        self.buffer = buffer;

        let out = emitted?;
        if let Some(state) = self.state_mut(id) {
            state.successors = out;
        }
        Ok(())
    }

    fn emit_successors(
        &mut self,
        source: &Source,
        successors: &[Successor],
        buffer: &mut CompilationBuffer,
    ) -> Result<Vec<TransitionId>, Error> {
        let canonicalizer = self.canonicalizer;
        let mut out = Vec::new();
        for successor in successors {
            for group in canonicalizer.merge(successor, buffer) {
                let stop = self.emit_group(source, successor, group, &mut out);
                self.tracker.clear();
                if stop? {
                    return Ok(out);
                }
            }
        }
        Ok(out)
    }

    /// Emits the transitions for one merged group. Returns true if the
    /// expansion of the source state is complete.
    fn emit_group(
        &mut self,
        source: &Source,
        successor: &Successor,
        group: &TransitionGroup,
        out: &mut Vec<TransitionId>,
    ) -> Result<bool, Error> {
        let ast = self.ast;
        let transitions = successor.transitions();

        let mut targets = BitSet::new();
        let mut finished = BitSet::new();
        let mut position_assertion = false;
        let mut match_found = false;
        let mut only_prefix = true;
        let mut constraints = Vec::new();
        for &m in group.members() {
            let t = &transitions[m];
            match ast.kind(t.target) {
                NodeKind::CharClass(_) => {
                    targets.insert(t.target.index());
                    if let Some(lb) = ast.finishes_lookbehind(t.target) {
                        finished.insert(lb.index());
                    }
                    only_prefix &= ast.is_soft_prefix(t.target);
                }
                NodeKind::Dollar => position_assertion = true,
                NodeKind::MatchFound => match_found = true,
                _ => {}
            }
            self.tracker.accumulate(&t.boundaries, t.lookbehind);
            constraints.extend(t.guards.iter().map(|g| PackedOp::guard(g.group, g.matched)));
        }
        let raw = self.tracker.finish();
        let (boundaries, operations) = self.boundary_operations(&raw);
        let code_points = group.code_points().clone();

        // A must-advance state may not accept without consuming
        let may_accept = !source.must_advance;

        if position_assertion {
            if may_accept {
                out.push(self.create_transition(
                    source.id,
                    self.anchored_final,
                    code_points,
                    boundaries,
                    constraints,
                    operations,
                )?);
            }
            return Ok(false);
        }

        if targets.is_empty() {
            if match_found && may_accept {
                let stop = source.may_short_circuit
                    && constraints.is_empty()
                    && code_points.matches_everything();
                out.push(self.create_transition(
                    source.id,
                    self.final_state,
                    code_points,
                    boundaries,
                    constraints,
                    operations,
                )?);
                return Ok(stop);
            }
            return Ok(false);
        }

        if match_found && may_accept {
            out.push(self.create_transition(
                source.id,
                self.final_state,
                code_points.clone(),
                boundaries.clone(),
                constraints.clone(),
                operations.clone(),
            )?);
        }

        let key = StateKey::new(
            targets,
            source.must_advance && only_prefix,
            self.next_conditions(source.conditions, &raw),
        );
        let (target, is_new) = self.registry.register_or_get(&key)?;
        if is_new {
            let mut flags = 0;
            if key.nodes.is_subset(ast.soft_prefix()) {
                flags |= PREFIX;
                self.prefix_states.push(target);
            }
            self.push_state(target, key, flags);
            if let Some(state) = self.state_mut(target) {
                state.finished_lookbehinds = finished;
            }
        }
        out.push(self.create_transition(
            source.id,
            target,
            code_points,
            boundaries,
            constraints,
            operations,
        )?);
        Ok(false)
    }

    /// Interned descriptor and packed words for a boundary effect. Boolean
    /// matching drops both.
    fn boundary_operations(
        &mut self,
        raw: &GroupBoundaries,
    ) -> (Arc<GroupBoundaries>, Vec<PackedOp>) {
        if self.ast.flags().boolean_match || raw.is_empty() {
            return (self.empty_boundaries.clone(), Vec::new());
        }
        let operations = raw
            .clears()
            .iter()
            .map(PackedOp::clear_boundary)
            .chain(raw.updates().iter().map(PackedOp::set_boundary))
            .collect();
        let shared = self
            .interned
            .entry(raw.clone())
            .or_insert_with_key(|b| Arc::new(b.clone()))
            .clone();
        (shared, operations)
    }

    /// Condition mask of a target state: groups whose end boundary the
    /// transition sets become matched, cleared ones unmatched.
    fn next_conditions(&self, current: Option<u64>, raw: &GroupBoundaries) -> Option<u64> {
        let mut mask = current?;
        for (bit, &group) in self.stepper.tracked_conditions().iter().enumerate() {
            if raw.sets_group(group) {
                mask |= 1 << bit;
            } else if raw.resets_group(group) {
                mask &= !(1 << bit);
            }
        }
        Some(mask)
    }

    fn create_loop_back(&mut self, from: StateId, to: StateId) -> Result<TransitionId, Error> {
        let id = self.create_plain_transition(from, to)?;
        if let Some(t) = self.transition_mut(id) {
            t.loop_back = true;
        }
        if let Some(state) = self.state_mut(from) {
            state.successors.push(id);
        }
        Ok(id)
    }

    fn wire_loop_backs(&mut self) -> Result<(), Error> {
        let unanchored = self.initial_states.clone();
        for pair in unanchored.windows(2) {
            self.create_loop_back(pair[1], pair[0])?;
        }
        if self.ast.has_reachable_carets() {
            let anchored = self.anchored_initial_states.clone();
            for pair in anchored.windows(2) {
                self.create_loop_back(pair[1], pair[0])?;
            }
        }
        // Offset 0 loops so a match may start at any later position
        match (self.advanced_initial, unanchored.first()) {
            (Some(advanced), Some(&entry)) => {
                self.create_loop_back(entry, advanced)?;
                self.initial_loop_back = Some(self.create_loop_back(advanced, advanced)?);
            }
            (None, Some(&entry)) => {
                self.initial_loop_back = Some(self.create_loop_back(entry, entry)?);
            }
            _ => {}
        }
        Ok(())
    }

    /// Mirrors successor lists into predecessor lists. States made of hard
    /// prefix material only are skipped unless the search is sticky.
    fn link_predecessors(&mut self) {
        let ast = self.ast;
        let sticky = ast.flags().sticky;
        let mut links: Vec<(StateId, TransitionId)> = Vec::new();
        for state in self.states.iter().flatten() {
            if state.id == self.dummy_initial {
                continue;
            }
            if !sticky && state.key.nodes.is_subset(ast.hard_prefix()) {
                continue;
            }
            for &tid in &state.successors {
                if let Some(Some(t)) = self.transitions.get(tid.index()) {
                    links.push((t.target, tid));
                }
            }
        }
        for (target, tid) in links {
            if let Some(state) = self.state_mut(target) {
                state.predecessors.push(tid);
            }
        }
    }

    /// Removes every state that cannot reach a final state. Liveness is the
    /// backward closure from the finals, so unproductive cycles die too.
    fn prune_dead_states(&mut self) {
        let mut pruned = 0;
        loop {
            let dead = self.find_dead_states();
            if dead.is_empty() {
                break;
            }
            pruned += dead.len();
            self.remove_states(&dead);
        }
        log::debug!(
            "nfa: pruned {} dead states, {} states left",
            pruned,
            self.states.iter().flatten().count()
        );
    }

    fn find_dead_states(&self) -> Vec<StateId> {
        let n = self.states.len();
        let mut reverse: Vec<SmallVec<[StateId; 2]>> = vec![SmallVec::new(); n];
        for state in self.states.iter().flatten() {
            for &tid in &state.successors {
                if let Some(Some(t)) = self.transitions.get(tid.index()) {
                    reverse[t.target.index()].push(state.id);
                }
            }
        }

        let mut live = SparseSet::new(n);
        let mut stack = vec![self.anchored_final, self.final_state];
        live.insert(self.anchored_final.index());
        live.insert(self.final_state.index());
        while let Some(s) = stack.pop() {
            for &p in &reverse[s.index()] {
                if live.insert(p.index()) {
                    stack.push(p);
                }
            }
        }

        self.states
            .iter()
            .flatten()
            .filter(|s| s.id != self.dummy_initial && !live.contains(s.id.index()))
            .map(|s| s.id)
            .collect()
    }

    fn remove_states(&mut self, dead: &[StateId]) {
        let mut is_dead = SparseSet::new(self.states.len());
        for &d in dead {
            is_dead.insert(d.index());
            if let Some(state) = self.states[d.index()].take() {
                log::trace!("nfa: prune S{} {:?}", d.index(), state.key.nodes);
                self.registry.remove(&state.key);
            }
        }

        for slot in self.transitions.iter_mut() {
            let detached = slot.as_ref().map_or(false, |t| {
                is_dead.contains(t.source.index()) || is_dead.contains(t.target.index())
            });
            if detached {
                *slot = None;
            }
        }

        let transitions = &self.transitions;
        let alive = |t: &TransitionId| matches!(transitions.get(t.index()), Some(Some(_)));
        for state in self.states.iter_mut().flatten() {
            state.successors.retain(alive);
            state.predecessors.retain(alive);
        }
        for slot in self
            .unanchored_entries
            .iter_mut()
            .chain(self.anchored_entries.iter_mut())
        {
            if slot.map_or(false, |t| !alive(&t)) {
                *slot = None;
            }
        }
        if self.initial_loop_back.map_or(false, |t| !alive(&t)) {
            self.initial_loop_back = None;
        }

        let keep = |s: &StateId| !is_dead.contains(s.index());
        self.prefix_states.retain(keep);
        self.initial_states.retain(keep);
        self.anchored_initial_states.retain(keep);
        self.advanced_initial = self.advanced_initial.filter(keep);
    }

    fn finish(self) -> Nfa {
        log::debug!(
            "nfa: done, {} prefix states, {} state ids, {} transition ids",
            self.prefix_states.len(),
            self.registry.id_count(),
            self.transition_ids.count()
        );
        Nfa {
            states: self.states,
            transitions: self.transitions,
            dummy_initial: self.dummy_initial,
            anchored_final: self.anchored_final,
            final_state: self.final_state,
            anchored_entries: self.anchored_entries,
            unanchored_entries: self.unanchored_entries,
            anchored_reverse_entry: self.anchored_reverse_entry,
            unanchored_reverse_entry: self.unanchored_reverse_entry,
            initial_loop_back: self.initial_loop_back,
            state_id_count: self.registry.id_count(),
            transition_id_count: self.transition_ids.count(),
        }
    }
}

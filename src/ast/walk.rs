//! Zero-width path enumeration over the syntax tree.
//!
//! A walk starts at a position (the logical start, an entry offset, or right
//! after a consumed character class) and follows every path that consumes no
//! input until it hits something that does: a character class, or the end
//! of the pattern. Each such endpoint is reported as a [`PathEnd`] carrying
//! the capture boundaries, guards and assertions passed on the way.
//!
//! Walks come in two flavours:
//! - *explore* walks are optimistic: every caret, look-behind and
//!   conditional branch is passable. Static analysis uses them.
//! - *step* walks evaluate assertions against a concrete automaton state.
//!
//! Paths are produced in priority order: greedy alternatives first, lazy
//! quantifiers try the exit before another iteration.

use smallvec::SmallVec;

use super::{NodeId, NodeKind, RegexAst};
use crate::boundaries::{end_slot, start_slot, GroupBoundaries};
use crate::util::BitSet;

/// Runtime test on a capture group that could not be resolved statically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConditionGuard {
    pub group: u16,
    /// Whether the path requires the group to have matched.
    pub matched: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PathEndKind {
    CharClass,
    MatchFound,
    /// End of pattern reached after a `$`.
    PositionAssertion,
}

#[derive(Clone, Debug)]
pub(crate) struct PathEnd {
    /// The character class, the match-found node, or the `$` passed.
    pub target: NodeId,
    pub kind: PathEndKind,
    pub boundaries: GroupBoundaries,
    pub guards: SmallVec<[ConditionGuard; 1]>,
    pub lookbehinds: SmallVec<[NodeId; 2]>,
    pub carets: SmallVec<[NodeId; 1]>,
}

#[derive(Clone, Copy)]
struct BoundaryEvent {
    slot: usize,
    set: bool,
}

/// State a step walk is evaluated against.
pub(crate) struct StepContext<'s> {
    pub nodes: &'s BitSet,
    pub at_input_start: bool,
    pub conditions: u64,
    pub tracked: &'s [u16],
}

impl StepContext<'_> {
    fn tracked_status(&self, group: u16) -> Option<bool> {
        let bit = self.tracked.iter().position(|&g| g == group)?;
        Some(self.conditions & (1u64 << bit) != 0)
    }
}

pub(crate) struct Walker<'a, 's> {
    ast: &'a RegexAst,
    ctx: Option<StepContext<'s>>,
    events: Vec<BoundaryEvent>,
    guards: SmallVec<[ConditionGuard; 1]>,
    lookbehinds: SmallVec<[NodeId; 2]>,
    carets: SmallVec<[NodeId; 1]>,
    /// Groups entered on this path without consuming input.
    entered: SmallVec<[NodeId; 4]>,
    dollar: Option<NodeId>,
    out: Vec<PathEnd>,
}

impl<'a, 's> Walker<'a, 's> {
    pub fn explore(ast: &'a RegexAst) -> Self {
        Self::with_context(ast, None)
    }

    pub fn stepping(ast: &'a RegexAst, ctx: StepContext<'s>) -> Self {
        Self::with_context(ast, Some(ctx))
    }

    fn with_context(ast: &'a RegexAst, ctx: Option<StepContext<'s>>) -> Self {
        Walker {
            ast,
            ctx,
            events: Vec::new(),
            guards: SmallVec::new(),
            lookbehinds: SmallVec::new(),
            carets: SmallVec::new(),
            entered: SmallVec::new(),
            dollar: None,
            out: Vec::new(),
        }
    }

    /// Walks from the logical start of the pattern, skipping all padding.
    pub fn from_start(&mut self) {
        self.enter(self.ast.root());
    }

    /// Walks from `offset` padding characters before the logical start.
    pub fn from_entry(&mut self, offset: usize) {
        let ast = self.ast;
        if let NodeKind::Sequence(terms) = ast.kind(ast.wrapped_root()) {
            let first = ast.prefix_length() - offset;
            self.enter(terms[first]);
        }
    }

    /// Walks from right after `node` was consumed.
    pub fn after(&mut self, node: NodeId) {
        self.advance_after(node);
    }

    pub fn into_paths(self) -> Vec<PathEnd> {
        self.out
    }

    fn enter(&mut self, id: NodeId) {
        let ast = self.ast;
        match ast.kind(id) {
            NodeKind::CharClass(_) => {
                // Nothing can be consumed after `$`
                if self.dollar.is_none() {
                    self.emit(id, PathEndKind::CharClass);
                }
            }
            NodeKind::MatchFound => match self.dollar {
                Some(dollar) => self.emit(dollar, PathEndKind::PositionAssertion),
                None => self.emit(id, PathEndKind::MatchFound),
            },
            NodeKind::Caret => match self.ctx.as_ref().map(|ctx| ctx.at_input_start) {
                None => {
                    self.carets.push(id);
                    self.advance_after(id);
                    self.carets.pop();
                }
                Some(true) => self.advance_after(id),
                Some(false) => {}
            },
            NodeKind::Dollar => {
                let saved = self.dollar;
                if saved.is_none() {
                    self.dollar = Some(id);
                }
                self.advance_after(id);
                self.dollar = saved;
            }
            NodeKind::LookBehind { .. } => {
                let passable = match &self.ctx {
                    None => true,
                    Some(ctx) => ast
                        .lookbehind_terms(id)
                        .last()
                        .map_or(false, |last| ctx.nodes.contains(last.index())),
                };
                if passable {
                    self.lookbehinds.push(id);
                    self.advance_after(id);
                    self.lookbehinds.pop();
                }
            }
            NodeKind::Sequence(terms) => match terms.first() {
                Some(&first) => self.enter(first),
                None => self.advance_after(id),
            },
            NodeKind::Group {
                quantifier, greedy, ..
            } => {
                let skippable = quantifier.is_optional();
                if skippable && !greedy {
                    self.advance_after(id);
                }
                self.enter_alternatives(id);
                if skippable && *greedy {
                    self.advance_after(id);
                }
            }
            NodeKind::Conditional { group, yes, no } => {
                self.enter_conditional(*group, *yes, *no);
            }
            NodeKind::Entry { .. } | NodeKind::AnchoredFinal => {
                debug_assert!(false, "walk entered pseudo node {:?}", id);
            }
        }
    }

    fn enter_alternatives(&mut self, group: NodeId) {
        let ast = self.ast;
        let NodeKind::Group {
            alternatives,
            capture,
            quantifier,
            ..
        } = ast.kind(group)
        else {
            return;
        };
        let mark = self.events.len();
        if quantifier.is_loop() {
            for &c in ast.loop_captures(group) {
                self.events.push(BoundaryEvent {
                    slot: start_slot(c),
                    set: false,
                });
                self.events.push(BoundaryEvent {
                    slot: end_slot(c),
                    set: false,
                });
            }
        }
        if let Some(c) = capture {
            self.events.push(BoundaryEvent {
                slot: start_slot(*c),
                set: true,
            });
        }
        self.entered.push(group);
        for &alt in alternatives {
            self.enter(alt);
        }
        self.entered.pop();
        self.events.truncate(mark);
    }

    fn exit_group(&mut self, group: NodeId) {
        let ast = self.ast;
        let NodeKind::Group {
            capture,
            quantifier,
            greedy,
            ..
        } = ast.kind(group)
        else {
            return;
        };
        let mark = self.events.len();
        if let Some(c) = capture {
            self.events.push(BoundaryEvent {
                slot: end_slot(*c),
                set: true,
            });
        }
        // Another iteration only if this one consumed something
        if quantifier.is_loop() && !self.entered.contains(&group) {
            if *greedy {
                self.enter_alternatives(group);
                self.advance_after(group);
            } else {
                self.advance_after(group);
                self.enter_alternatives(group);
            }
        } else {
            self.advance_after(group);
        }
        self.events.truncate(mark);
    }

    fn enter_conditional(&mut self, group: u16, yes: NodeId, no: NodeId) {
        let known = match &self.ctx {
            None => None,
            Some(ctx) => self
                .path_status(group)
                .or_else(|| ctx.tracked_status(group)),
        };
        match known {
            Some(true) => self.enter(yes),
            Some(false) => self.enter(no),
            None if self.ctx.is_none() => {
                self.enter(yes);
                self.enter(no);
            }
            None => {
                for (branch, matched) in [(yes, true), (no, false)] {
                    self.guards.push(ConditionGuard { group, matched });
                    self.enter(branch);
                    self.guards.pop();
                }
            }
        }
    }

    /// Whether `group` matched, as far as this path alone decides it.
    fn path_status(&self, group: u16) -> Option<bool> {
        let slot = end_slot(group);
        self.events
            .iter()
            .rev()
            .find(|e| e.slot == slot)
            .map(|e| e.set)
    }

    fn advance_after(&mut self, id: NodeId) {
        let ast = self.ast;
        let node = ast.node(id);
        let Some(parent) = node.parent() else {
            return;
        };
        match ast.kind(parent) {
            NodeKind::Sequence(terms) => match terms.get(node.index_in_parent() + 1) {
                Some(&next) => self.enter(next),
                None => self.advance_after(parent),
            },
            NodeKind::Group { .. } => self.exit_group(parent),
            NodeKind::Conditional { .. } => self.advance_after(parent),
            _ => {}
        }
    }

    fn emit(&mut self, target: NodeId, kind: PathEndKind) {
        let mut updates = BitSet::new();
        let mut clears = BitSet::new();
        for e in &self.events {
            if e.set {
                updates.insert(e.slot);
                clears.remove(e.slot);
            } else {
                clears.insert(e.slot);
                updates.remove(e.slot);
            }
        }
        let last_group = updates
            .iter()
            .filter(|slot| slot % 2 == 1 && *slot > 1)
            .last()
            .map(|slot| (slot / 2) as u16);
        self.out.push(PathEnd {
            target,
            kind,
            boundaries: GroupBoundaries::new(updates, clears, last_group),
            guards: self.guards.clone(),
            lookbehinds: self.lookbehinds.clone(),
            carets: self.carets.clone(),
        });
    }
}

//! One-character stepping over sets of syntax tree positions.
//!
//! An automaton state is a set of nodes: at most one *main* position (an
//! entry pseudo node or a consumed character class) plus the content nodes
//! of look-behind threads running alongside it. Stepping produces one
//! [`Successor`] per zero-width path out of the main position. Each
//! successor's first transition is the main one; the rest advance or start
//! look-behind threads.

use smallvec::SmallVec;

use super::walk::{ConditionGuard, PathEndKind, StepContext, Walker};
use super::{NodeId, NodeKind, RegexAst};
use crate::boundaries::GroupBoundaries;
use crate::charset::CodePointSet;
use crate::util::BitSet;

#[derive(Clone, Debug)]
pub struct AstTransition {
    /// A character class, the match-found node, or the `$` that was passed.
    pub target: NodeId,
    pub code_points: CodePointSet,
    pub boundaries: GroupBoundaries,
    pub guards: SmallVec<[ConditionGuard; 1]>,
    /// Part of a look-behind thread rather than the main path.
    pub lookbehind: bool,
}

impl AstTransition {
    fn thread(ast: &RegexAst, target: NodeId) -> Self {
        AstTransition {
            target,
            code_points: ast.char_class(target).cloned().unwrap_or_default(),
            boundaries: GroupBoundaries::empty(),
            guards: SmallVec::new(),
            lookbehind: true,
        }
    }
}

/// The transitions that happen together when one path is taken.
#[derive(Clone, Debug, Default)]
pub struct Successor {
    transitions: SmallVec<[AstTransition; 2]>,
}

impl Successor {
    #[inline]
    pub fn transitions(&self) -> &[AstTransition] {
        &self.transitions
    }

    /// The main-path transition.
    #[inline]
    pub fn main(&self) -> &AstTransition {
        &self.transitions[0]
    }

    fn push_thread(&mut self, t: &AstTransition) {
        if !self.transitions.iter().any(|x| x.target == t.target) {
            self.transitions.push(t.clone());
        }
    }
}

/// The automaton state being stepped.
#[derive(Clone, Copy, Debug)]
pub struct StepSource<'s> {
    pub nodes: &'s BitSet,
    /// Bitmask over the tracked condition groups that have matched.
    pub conditions: u64,
}

pub struct AstStepper<'a> {
    ast: &'a RegexAst,
    tracked: Vec<u16>,
}

impl<'a> AstStepper<'a> {
    /// Condition groups beyond `max_tracked_conditions` are left to runtime
    /// guards.
    pub fn new(ast: &'a RegexAst, max_tracked_conditions: usize) -> Self {
        let groups = ast.condition_groups();
        let tracked = groups[..groups.len().min(max_tracked_conditions.min(64))].to_vec();
        AstStepper { ast, tracked }
    }

    /// Condition groups folded into state keys; bit `i` of a condition mask
    /// stands for `tracked_conditions()[i]`.
    #[inline]
    pub fn tracked_conditions(&self) -> &[u16] {
        &self.tracked
    }

    /// Appends the successors of `source` to `out`, highest priority first.
    pub fn step(&self, source: StepSource<'_>, out: &mut Vec<Successor>) {
        let ast = self.ast;

        let mut threads: SmallVec<[AstTransition; 2]> = SmallVec::new();
        for n in source.nodes.iter() {
            let id = NodeId::from_index(n);
            if let Some(next) = ast.next_in_lookbehind(id) {
                threads.push(AstTransition::thread(ast, next));
            }
        }

        for n in source.nodes.iter() {
            let id = NodeId::from_index(n);
            if ast.node(id).lookbehind().is_some() {
                continue;
            }
            let at_input_start = matches!(
                ast.kind(id),
                NodeKind::Entry {
                    offset: 0,
                    anchored: true
                }
            );
            let ctx = StepContext {
                nodes: source.nodes,
                at_input_start,
                conditions: source.conditions,
                tracked: &self.tracked,
            };
            let mut walker = Walker::stepping(ast, ctx);
            match ast.kind(id) {
                NodeKind::Entry { offset, .. } => walker.from_entry(*offset),
                NodeKind::CharClass(_) => walker.after(id),
                _ => continue,
            }

            for path in walker.into_paths() {
                let code_points = match path.kind {
                    PathEndKind::CharClass => {
                        ast.char_class(path.target).cloned().unwrap_or_default()
                    }
                    PathEndKind::MatchFound | PathEndKind::PositionAssertion => {
                        CodePointSet::full()
                    }
                };
                let mut successor = Successor::default();
                successor.transitions.push(AstTransition {
                    target: path.target,
                    code_points,
                    boundaries: path.boundaries,
                    guards: path.guards,
                    lookbehind: false,
                });
                for t in &threads {
                    successor.push_thread(t);
                }
                if path.kind == PathEndKind::CharClass {
                    for &lb in ast.lookbehind_starts(path.target) {
                        if let Some(&first) = ast.lookbehind_terms(lb).first() {
                            successor.push_thread(&AstTransition::thread(ast, first));
                        }
                    }
                }
                out.push(successor);
            }
        }
    }
}

//! Partitioning a successor's transitions by code point.
//!
//! The transitions of one [`Successor`] all fire on the same input
//! character, but each accepts a different set of characters. The
//! canonicalizer splits the main transition's set into disjoint pieces so
//! that each piece is accepted by a fixed subset of the transitions: one
//! [`TransitionGroup`] per piece, the main transition always first.

use smallvec::SmallVec;

use super::step::Successor;
use crate::charset::CodePointSet;

#[derive(Clone, Debug)]
pub struct TransitionGroup {
    code_points: CodePointSet,
    members: SmallVec<[usize; 4]>,
}

impl TransitionGroup {
    #[inline]
    pub fn code_points(&self) -> &CodePointSet {
        &self.code_points
    }

    /// Indices into the successor's transitions, ascending.
    #[inline]
    pub fn members(&self) -> &[usize] {
        &self.members
    }
}

/// Scratch space reused across merges.
#[derive(Debug, Default)]
pub struct CompilationBuffer {
    groups: Vec<TransitionGroup>,
    next: Vec<TransitionGroup>,
}

impl CompilationBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TransitionCanonicalizer;

impl TransitionCanonicalizer {
    pub fn new() -> Self {
        TransitionCanonicalizer
    }

    /// Splits `successor` into groups with pairwise disjoint code point sets
    /// whose union is the main transition's set. Groups live in `buffer`
    /// until the next merge.
    pub fn merge<'b>(
        &self,
        successor: &Successor,
        buffer: &'b mut CompilationBuffer,
    ) -> &'b [TransitionGroup] {
        buffer.groups.clear();
        let transitions = successor.transitions();
        let Some(main) = transitions.first() else {
            return &buffer.groups;
        };
        if !main.code_points.matches_something() {
            return &buffer.groups;
        }
        buffer.groups.push(TransitionGroup {
            code_points: main.code_points.clone(),
            members: smallvec::smallvec![0],
        });

        for (i, t) in transitions.iter().enumerate().skip(1) {
            buffer.next.clear();
            for group in buffer.groups.drain(..) {
                if !group.code_points.intersects(&t.code_points) {
                    buffer.next.push(group);
                    continue;
                }
                let inside = group.code_points.intersect(&t.code_points);
                let outside = group.code_points.subtract(&t.code_points);
                let mut members = group.members.clone();
                members.push(i);
                buffer.next.push(TransitionGroup {
                    code_points: inside,
                    members,
                });
                if outside.matches_something() {
                    buffer.next.push(TransitionGroup {
                        code_points: outside,
                        members: group.members,
                    });
                }
            }
            std::mem::swap(&mut buffer.groups, &mut buffer.next);
        }
        &buffer.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstFlags, AstStepper, Pattern, RegexAst, StepSource};
    use crate::util::BitSet;

    #[test]
    fn test_partition_with_lookbehind_thread() {
        // Entry 2 of (?<=ab)c: padding [any] merged with the thread's [a]
        let ast = RegexAst::new(
            &Pattern::concat([
                Pattern::look_behind(Pattern::literal("ab")),
                Pattern::literal("c"),
            ]),
            AstFlags::default(),
        )
        .unwrap();
        let stepper = AstStepper::new(&ast, 16);
        let nodes = BitSet::singleton(ast.unanchored_initial(2).index());
        let mut succ = Vec::new();
        stepper.step(
            StepSource {
                nodes: &nodes,
                conditions: 0,
            },
            &mut succ,
        );

        let mut buffer = CompilationBuffer::new();
        let groups = TransitionCanonicalizer::new().merge(&succ[0], &mut buffer);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members(), &[0, 1]);
        assert_eq!(groups[0].code_points(), &CodePointSet::from_char('a'));
        assert_eq!(groups[1].members(), &[0]);
        assert!(!groups[1].code_points().contains_char('a'));
        assert!(groups[1].code_points().contains_char('b'));

        // The pieces cover the main set exactly
        let union = groups[0].code_points().union(groups[1].code_points());
        assert!(union.matches_everything());
    }
}

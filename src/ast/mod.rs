//! Regex syntax trees in arena form.
//!
//! A [`Pattern`] (the programmatic regex tree) is lowered into a flat arena of
//! [`Node`]s addressed by dense [`NodeId`]s. Lowering also wraps the pattern
//! for automaton construction:
//!
//! ```text
//! wrapped root = Sequence[pre_P, .., pre_1, Group#0(pattern), MatchFound]
//! ```
//!
//! - `pre_k` are match-anything padding nodes. They let look-behinds that
//!   reach before the start of a match see the characters preceding it.
//! - `Group#0` is the implicit capture group around the whole match.
//! - one `Entry` pseudo node per start offset `0..=P` (plus anchored twins
//!   when a `^` is reachable at the start), and an `AnchoredFinal` pseudo
//!   node standing for "matched and then hit `$`".
//!
//! The tree is immutable once built and is `Send + Sync`.

mod analysis;
mod canonicalize;
mod pattern;
mod step;
mod walk;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::charset::CodePointSet;
use crate::util::BitSet;
use crate::Error;

pub use canonicalize::{CompilationBuffer, TransitionCanonicalizer, TransitionGroup};
pub use pattern::Pattern;
pub use step::{AstStepper, AstTransition, StepSource, Successor};
pub use walk::ConditionGuard;

/// Dense index of a node in the arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) fn from_index(index: usize) -> NodeId {
        NodeId(index as u32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quantifier {
    Once,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Quantifier {
    #[inline]
    pub fn is_optional(self) -> bool {
        matches!(self, Quantifier::ZeroOrOne | Quantifier::ZeroOrMore)
    }

    #[inline]
    pub fn is_loop(self) -> bool {
        matches!(self, Quantifier::ZeroOrMore | Quantifier::OneOrMore)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// Consumes one code point from the set.
    CharClass(CodePointSet),
    /// `^`: only passable at the very start of the input.
    Caret,
    /// `$`: after it, only the end of input may follow.
    Dollar,
    /// Positive look-behind over a fixed-length run of character classes.
    /// `body` is a `Sequence` of `CharClass` nodes.
    LookBehind { body: NodeId, length: usize },
    MatchFound,
    Sequence(Vec<NodeId>),
    /// Alternation of `Sequence` nodes, optionally capturing and quantified.
    Group {
        alternatives: Vec<NodeId>,
        capture: Option<u16>,
        quantifier: Quantifier,
        greedy: bool,
    },
    /// `(?(group)yes|no)`; both branches are `Sequence` nodes.
    Conditional { group: u16, yes: NodeId, no: NodeId },
    /// Start position pseudo node, `offset` padding characters before the
    /// logical start.
    Entry { offset: usize, anchored: bool },
    AnchoredFinal,
}

impl NodeKind {
    pub(crate) fn children(&self) -> SmallVec<[NodeId; 4]> {
        match self {
            NodeKind::Sequence(terms) => terms.iter().copied().collect(),
            NodeKind::Group { alternatives, .. } => alternatives.iter().copied().collect(),
            NodeKind::Conditional { yes, no, .. } => smallvec::smallvec![*yes, *no],
            NodeKind::LookBehind { body, .. } => smallvec::smallvec![*body],
            _ => SmallVec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    /// Position among the parent's children.
    index: u32,
    /// Look-behind this node is content of.
    lookbehind: Option<NodeId>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            parent: None,
            index: 0,
            lookbehind: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn index_in_parent(&self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn lookbehind(&self) -> Option<NodeId> {
        self.lookbehind
    }
}

/// Appends a node and adopts its children.
pub(crate) fn push_node(nodes: &mut Vec<Node>, kind: NodeKind) -> NodeId {
    let id = NodeId::from_index(nodes.len());
    let children = kind.children();
    nodes.push(Node::new(kind));
    for (i, child) in children.iter().enumerate() {
        let node = &mut nodes[child.index()];
        node.parent = Some(id);
        node.index = i as u32;
    }
    id
}

/// Flags steering automaton construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AstFlags {
    /// The empty match at the search start is not acceptable; at least one
    /// character must be consumed before a match at that position.
    pub must_advance: bool,
    /// Matches must start exactly at the search start.
    pub sticky: bool,
    /// Only match/no-match is needed; capture boundaries are dropped.
    pub boolean_match: bool,
    /// Ceiling on the padding a look-behind may require before a match.
    pub max_prefix_length: usize,
}

impl Default for AstFlags {
    fn default() -> Self {
        AstFlags {
            must_advance: false,
            sticky: false,
            boolean_match: false,
            max_prefix_length: 32,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RegexAst {
    nodes: Vec<Node>,
    flags: AstFlags,
    root: NodeId,
    wrapped_root: NodeId,
    match_found: NodeId,
    anchored_final: NodeId,
    /// `prefix_nodes[k - 1]` is `pre_k`.
    prefix_nodes: Vec<NodeId>,
    unanchored_initial: Vec<NodeId>,
    anchored_initial: Vec<NodeId>,
    capture_count: u16,
    condition_groups: Vec<u16>,
    loop_captures: FxHashMap<NodeId, SmallVec<[u16; 4]>>,
    mandatory_prefix: usize,
    soft_prefix: BitSet,
    hard_prefix: BitSet,
    reachable_carets: BitSet,
    lookbehind_starts: FxHashMap<NodeId, SmallVec<[NodeId; 2]>>,
}

impl RegexAst {
    /// Lowers `pattern` and runs the analyses automaton construction needs.
    pub fn new(pattern: &Pattern, flags: AstFlags) -> Result<RegexAst, Error> {
        let lowered = pattern::lower(pattern)?;
        let mut nodes = lowered.nodes;
        let root = lowered.root;
        let match_found = push_node(&mut nodes, NodeKind::MatchFound);
        let wrapped_root = push_node(&mut nodes, NodeKind::Sequence(vec![root, match_found]));

        let mut ast = RegexAst {
            nodes,
            flags,
            root,
            wrapped_root,
            match_found,
            anchored_final: match_found,
            prefix_nodes: Vec::new(),
            unanchored_initial: Vec::new(),
            anchored_initial: Vec::new(),
            capture_count: lowered.capture_count,
            condition_groups: Vec::new(),
            loop_captures: FxHashMap::default(),
            mandatory_prefix: 0,
            soft_prefix: BitSet::new(),
            hard_prefix: BitSet::new(),
            reachable_carets: BitSet::new(),
            lookbehind_starts: FxHashMap::default(),
        };
        ast.collect_group_facts()?;

        let reach = analysis::reachability(&ast);
        let prefix_length = reach.prefix_length(&ast);
        if prefix_length > flags.max_prefix_length {
            return Err(Error::UnsupportedPattern(format!(
                "look-behind needs {} characters before the match, at most {} allowed",
                prefix_length, flags.max_prefix_length
            )));
        }
        ast.reachable_carets = reach.carets.clone();
        ast.install_prefix(prefix_length);

        let prefix = analysis::prefix_sets(&ast, &reach);
        ast.mandatory_prefix = prefix.mandatory;
        ast.soft_prefix = prefix.soft;
        ast.hard_prefix = prefix.hard;
        ast.lookbehind_starts = analysis::lookbehind_starts(&ast);

        log::debug!(
            "ast: {} nodes, {} captures, prefix {} (mandatory {}), {} look-behind triggers",
            ast.nodes.len(),
            ast.capture_count,
            prefix_length,
            ast.mandatory_prefix,
            ast.lookbehind_starts.len()
        );
        Ok(ast)
    }

    /// Condition groups, their validity, and captures nested in loops.
    fn collect_group_facts(&mut self) -> Result<(), Error> {
        let mut conditions = Vec::new();
        for node in &self.nodes {
            if let NodeKind::Conditional { group, .. } = node.kind {
                if group >= self.capture_count {
                    return Err(Error::UnsupportedPattern(format!(
                        "conditional refers to undefined group {}",
                        group
                    )));
                }
                conditions.push(group);
            }
        }
        conditions.sort_unstable();
        conditions.dedup();
        self.condition_groups = conditions;

        for i in 0..self.nodes.len() {
            let id = NodeId::from_index(i);
            if let NodeKind::Group { quantifier, .. } = self.nodes[i].kind {
                if quantifier.is_loop() {
                    let mut captures = SmallVec::new();
                    self.nested_captures(id, &mut captures);
                    if !captures.is_empty() {
                        self.loop_captures.insert(id, captures);
                    }
                }
            }
        }
        Ok(())
    }

    fn nested_captures(&self, id: NodeId, out: &mut SmallVec<[u16; 4]>) {
        for child in self.nodes[id.index()].kind.children() {
            if let NodeKind::Group {
                capture: Some(c), ..
            } = self.nodes[child.index()].kind
            {
                out.push(c);
            }
            self.nested_captures(child, out);
        }
    }

    /// Adds the padding nodes, entry pseudo nodes and the anchored final
    /// node once the prefix length is known.
    fn install_prefix(&mut self, prefix_length: usize) {
        for _ in 0..prefix_length {
            let pre = push_node(&mut self.nodes, NodeKind::CharClass(CodePointSet::full()));
            self.prefix_nodes.push(pre);
        }
        let mut terms: Vec<NodeId> = self.prefix_nodes.iter().rev().copied().collect();
        terms.push(self.root);
        terms.push(self.match_found);
        for (i, term) in terms.iter().enumerate() {
            let node = &mut self.nodes[term.index()];
            node.parent = Some(self.wrapped_root);
            node.index = i as u32;
        }
        self.nodes[self.wrapped_root.index()].kind = NodeKind::Sequence(terms);

        for offset in 0..=prefix_length {
            let entry = push_node(
                &mut self.nodes,
                NodeKind::Entry {
                    offset,
                    anchored: false,
                },
            );
            self.unanchored_initial.push(entry);
        }
        if !self.reachable_carets.is_empty() {
            for offset in 0..=prefix_length {
                let entry = push_node(
                    &mut self.nodes,
                    NodeKind::Entry {
                        offset,
                        anchored: true,
                    },
                );
                self.anchored_initial.push(entry);
            }
        }
        self.anchored_final = push_node(&mut self.nodes, NodeKind::AnchoredFinal);
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn flags(&self) -> &AstFlags {
        &self.flags
    }

    /// The implicit capture group 0 around the pattern.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn wrapped_root(&self) -> NodeId {
        self.wrapped_root
    }

    #[inline]
    pub fn match_found(&self) -> NodeId {
        self.match_found
    }

    #[inline]
    pub fn anchored_final(&self) -> NodeId {
        self.anchored_final
    }

    /// Number of padding characters a match may need to look back over.
    #[inline]
    pub fn prefix_length(&self) -> usize {
        self.prefix_nodes.len()
    }

    /// Padding every match needs, whichever alternative it takes.
    #[inline]
    pub fn mandatory_prefix_length(&self) -> usize {
        self.mandatory_prefix
    }

    /// `pre_k`, for `1 <= k <= prefix_length()`.
    pub fn prefix_node(&self, k: usize) -> Option<NodeId> {
        k.checked_sub(1).and_then(|i| self.prefix_nodes.get(i).copied())
    }

    pub fn unanchored_initial(&self, offset: usize) -> NodeId {
        self.unanchored_initial[offset]
    }

    /// Anchored start node; the unanchored one when no `^` is reachable.
    pub fn anchored_initial(&self, offset: usize) -> NodeId {
        match self.anchored_initial.get(offset) {
            Some(&id) => id,
            None => self.unanchored_initial[offset],
        }
    }

    #[inline]
    pub fn has_reachable_carets(&self) -> bool {
        !self.reachable_carets.is_empty()
    }

    /// Carets passable without consuming input from the logical start.
    #[inline]
    pub fn reachable_carets(&self) -> &BitSet {
        &self.reachable_carets
    }

    /// Node set of padding material, including look-behind content that
    /// reaches before the match start.
    #[inline]
    pub fn soft_prefix(&self) -> &BitSet {
        &self.soft_prefix
    }

    /// Subset of the soft prefix every match has to go through.
    #[inline]
    pub fn hard_prefix(&self) -> &BitSet {
        &self.hard_prefix
    }

    #[inline]
    pub fn is_soft_prefix(&self, id: NodeId) -> bool {
        self.soft_prefix.contains(id.index())
    }

    /// Number of capture groups, including group 0.
    #[inline]
    pub fn capture_count(&self) -> u16 {
        self.capture_count
    }

    #[inline]
    pub fn has_conditionals(&self) -> bool {
        !self.condition_groups.is_empty()
    }

    /// Groups referenced by conditionals, ascending.
    #[inline]
    pub fn condition_groups(&self) -> &[u16] {
        &self.condition_groups
    }

    /// Captures nested inside loop group `group`; reset on each iteration.
    pub fn loop_captures(&self, group: NodeId) -> &[u16] {
        self.loop_captures
            .get(&group)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Look-behinds whose first content node is consumed together with
    /// `node`.
    pub fn lookbehind_starts(&self, node: NodeId) -> &[NodeId] {
        self.lookbehind_starts
            .get(&node)
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }

    pub fn lookbehind_terms(&self, lookbehind: NodeId) -> &[NodeId] {
        match self.kind(lookbehind) {
            NodeKind::LookBehind { body, .. } => match self.kind(*body) {
                NodeKind::Sequence(terms) => terms,
                _ => &[],
            },
            _ => &[],
        }
    }

    pub fn lookbehind_length(&self, lookbehind: NodeId) -> usize {
        match self.kind(lookbehind) {
            NodeKind::LookBehind { length, .. } => *length,
            _ => 0,
        }
    }

    /// The content node following `node` inside its look-behind.
    pub fn next_in_lookbehind(&self, node: NodeId) -> Option<NodeId> {
        let lb = self.node(node).lookbehind?;
        let terms = self.lookbehind_terms(lb);
        terms.get(self.node(node).index_in_parent() + 1).copied()
    }

    /// The look-behind `node` completes, if it is the last content node.
    pub fn finishes_lookbehind(&self, node: NodeId) -> Option<NodeId> {
        let lb = self.node(node).lookbehind?;
        (self.lookbehind_terms(lb).last() == Some(&node)).then_some(lb)
    }

    pub fn char_class(&self, id: NodeId) -> Option<&CodePointSet> {
        match self.kind(id) {
            NodeKind::CharClass(set) => Some(set),
            _ => None,
        }
    }

    pub(crate) fn lookbehinds(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n.kind, NodeKind::LookBehind { .. }))
            .map(|(i, _)| NodeId::from_index(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ast(p: Pattern) -> RegexAst {
        RegexAst::new(&p, AstFlags::default()).unwrap()
    }

    #[test]
    fn test_wrapped_root_layout() {
        let a = ast(Pattern::literal("ab"));
        assert_eq!(a.prefix_length(), 0);
        match a.kind(a.wrapped_root()) {
            NodeKind::Sequence(terms) => assert_eq!(terms, &vec![a.root(), a.match_found()]),
            other => panic!("unexpected wrapped root {:?}", other),
        }
        assert_eq!(a.capture_count(), 1);
        assert!(!a.has_reachable_carets());
        // Without carets the anchored entry aliases the unanchored one
        assert_eq!(a.anchored_initial(0), a.unanchored_initial(0));
    }

    #[test]
    fn test_lookbehind_prefix() {
        // (?<=ab)c needs two characters before the match
        let a = ast(Pattern::concat([
            Pattern::look_behind(Pattern::literal("ab")),
            Pattern::literal("c"),
        ]));
        assert_eq!(a.prefix_length(), 2);
        assert_eq!(a.mandatory_prefix_length(), 2);

        let pre1 = a.prefix_node(1).unwrap();
        let pre2 = a.prefix_node(2).unwrap();
        match a.kind(a.wrapped_root()) {
            NodeKind::Sequence(terms) => {
                assert_eq!(terms, &vec![pre2, pre1, a.root(), a.match_found()])
            }
            other => panic!("unexpected wrapped root {:?}", other),
        }
        assert!(a.is_soft_prefix(pre1));
        assert!(a.hard_prefix().contains(pre2.index()));

        // The look-behind starts with the second padding node
        let lb = a.lookbehinds().next().unwrap();
        let terms = a.lookbehind_terms(lb).to_vec();
        assert_eq!(terms.len(), 2);
        assert_eq!(a.lookbehind_starts(pre2), &[lb]);
        assert!(a.lookbehind_starts(pre1).is_empty());
        assert_eq!(a.next_in_lookbehind(terms[0]), Some(terms[1]));
        assert_eq!(a.finishes_lookbehind(terms[1]), Some(lb));
        assert_eq!(a.finishes_lookbehind(terms[0]), None);
    }

    #[test]
    fn test_optional_lookbehind_path_keeps_prefix_soft() {
        // (?<=ab)c|d: the `d` branch needs no padding
        let a = ast(Pattern::alt([
            Pattern::concat([
                Pattern::look_behind(Pattern::literal("ab")),
                Pattern::literal("c"),
            ]),
            Pattern::literal("d"),
        ]));
        assert_eq!(a.prefix_length(), 2);
        assert_eq!(a.mandatory_prefix_length(), 0);
        let pre1 = a.prefix_node(1).unwrap();
        assert!(a.is_soft_prefix(pre1));
        assert!(!a.hard_prefix().contains(pre1.index()));
    }

    #[test]
    fn test_lookbehind_inside_match_needs_no_prefix() {
        // a(?<=a)b: the look-behind only sees consumed characters
        let a = ast(Pattern::concat([
            Pattern::literal("a"),
            Pattern::look_behind(Pattern::literal("a")),
            Pattern::literal("b"),
        ]));
        assert_eq!(a.prefix_length(), 0);
        assert!(a.soft_prefix().is_empty());
    }

    #[test]
    fn test_reachable_carets() {
        let a = ast(Pattern::alt([
            Pattern::concat([Pattern::Caret, Pattern::literal("a")]),
            Pattern::literal("b"),
        ]));
        assert!(a.has_reachable_carets());
        assert_ne!(a.anchored_initial(0), a.unanchored_initial(0));

        // A caret after consumed input is never reachable from the start
        let b = ast(Pattern::concat([Pattern::literal("a"), Pattern::Caret]));
        assert!(!b.has_reachable_carets());
    }

    #[test]
    fn test_loop_captures() {
        // (?:(a)|(b))*
        let a = ast(Pattern::star(Pattern::alt([
            Pattern::capture(Pattern::literal("a")),
            Pattern::capture(Pattern::literal("b")),
        ])));
        assert_eq!(a.capture_count(), 3);
        let looped: Vec<_> = (0..a.node_count())
            .map(NodeId::from_index)
            .filter(|&id| !a.loop_captures(id).is_empty())
            .collect();
        assert_eq!(looped.len(), 1);
        assert_eq!(a.loop_captures(looped[0]), &[1, 2]);
    }

    #[test]
    fn test_prefix_limit() {
        let flags = AstFlags {
            max_prefix_length: 1,
            ..AstFlags::default()
        };
        let p = Pattern::concat([
            Pattern::look_behind(Pattern::literal("ab")),
            Pattern::literal("c"),
        ]);
        assert!(matches!(
            RegexAst::new(&p, flags),
            Err(Error::UnsupportedPattern(_))
        ));
    }

    #[test]
    fn test_undefined_condition_group() {
        let p = Pattern::conditional(3, Pattern::literal("a"), Pattern::Empty);
        assert!(matches!(
            RegexAst::new(&p, AstFlags::default()),
            Err(Error::UnsupportedPattern(_))
        ));
    }
}

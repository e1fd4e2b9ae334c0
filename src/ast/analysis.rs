//! Static facts about a lowered pattern.
//!
//! - **Reachability**: breadth-first over character classes from the logical
//!   start. Gives the minimal number of characters consumed before each
//!   look-behind, and the carets passable at the start.
//! - **Prefix sets**: a look-behind of length `L` first reached after `d`
//!   characters needs `L - d` characters before the match. The padding and
//!   the look-behind content living there form the *soft* prefix; the part
//!   every match must go through forms the *hard* prefix.
//! - **Look-behind starts**: a look-behind is tracked by a thread that
//!   consumes its first class together with the character `L - 1` steps
//!   before the assertion. This maps each character class to the threads it
//!   starts.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::walk::{PathEnd, PathEndKind, Walker};
use super::{NodeId, NodeKind, RegexAst};
use crate::util::BitSet;

pub(super) struct Reachability {
    /// Minimal characters consumed before each reachable look-behind.
    pub lookbehind_distance: FxHashMap<NodeId, usize>,
    pub carets: BitSet,
}

impl Reachability {
    pub fn prefix_length(&self, ast: &RegexAst) -> usize {
        self.lookbehind_distance
            .iter()
            .map(|(&lb, &d)| ast.lookbehind_length(lb).saturating_sub(d))
            .max()
            .unwrap_or(0)
    }

    fn reaches_before_start(&self, ast: &RegexAst, lb: NodeId) -> bool {
        self.lookbehind_distance
            .get(&lb)
            .map_or(false, |&d| ast.lookbehind_length(lb) > d)
    }
}

fn walk_from(ast: &RegexAst, position: Option<NodeId>) -> Vec<PathEnd> {
    let mut walker = Walker::explore(ast);
    match position {
        None => walker.from_start(),
        Some(node) => walker.after(node),
    }
    walker.into_paths()
}

pub(super) fn reachability(ast: &RegexAst) -> Reachability {
    let mut lookbehind_distance: FxHashMap<NodeId, usize> = FxHashMap::default();
    let mut carets = BitSet::new();
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut queue: VecDeque<(Option<NodeId>, usize)> = VecDeque::new();
    queue.push_back((None, 0));

    while let Some((position, distance)) = queue.pop_front() {
        for path in walk_from(ast, position) {
            for &lb in &path.lookbehinds {
                let d = lookbehind_distance.entry(lb).or_insert(distance);
                *d = (*d).min(distance);
            }
            if position.is_none() {
                for &c in &path.carets {
                    carets.insert(c.index());
                }
            }
            if path.kind == PathEndKind::CharClass && seen.insert(path.target) {
                queue.push_back((Some(path.target), distance + 1));
            }
        }
    }
    Reachability {
        lookbehind_distance,
        carets,
    }
}

pub(super) struct PrefixSets {
    pub mandatory: usize,
    pub soft: BitSet,
    pub hard: BitSet,
}

/// Computes the soft and hard prefix node sets. Must run after the padding
/// nodes are installed.
pub(super) fn prefix_sets(ast: &RegexAst, reach: &Reachability) -> PrefixSets {
    let prefix_length = ast.prefix_length();
    let mandatory = mandatory_prefix(ast, prefix_length);

    let mut soft = BitSet::new();
    let mut hard = BitSet::new();
    for k in 1..=prefix_length {
        if let Some(pre) = ast.prefix_node(k) {
            soft.insert(pre.index());
            if k <= mandatory {
                hard.insert(pre.index());
            }
        }
    }
    for lb in ast.lookbehinds() {
        if reach.reaches_before_start(ast, lb) {
            for &content in ast.lookbehind_terms(lb) {
                soft.insert(content.index());
                hard.insert(content.index());
            }
        }
    }
    PrefixSets {
        mandatory,
        soft,
        hard,
    }
}

/// Smallest padding any complete match needs: the minimum over match paths
/// of the largest look-behind overhang on that path.
fn mandatory_prefix(ast: &RegexAst, prefix_length: usize) -> usize {
    if prefix_length == 0 {
        return 0;
    }
    let mut best = usize::MAX;
    let mut seen: FxHashSet<(Option<NodeId>, usize, usize)> = FxHashSet::default();
    let mut stack = vec![(None, 0usize, 0usize)];
    while let Some(item) = stack.pop() {
        if !seen.insert(item) {
            continue;
        }
        let (position, distance, need) = item;
        for path in walk_from(ast, position) {
            let need = path.lookbehinds.iter().fold(need, |n, &lb| {
                n.max(ast.lookbehind_length(lb).saturating_sub(distance))
            });
            match path.kind {
                PathEndKind::CharClass => {
                    stack.push((Some(path.target), (distance + 1).min(prefix_length), need))
                }
                PathEndKind::MatchFound | PathEndKind::PositionAssertion => {
                    best = best.min(need)
                }
            }
        }
    }
    if best == usize::MAX {
        0
    } else {
        best
    }
}

/// Maps character classes to the look-behinds they start.
///
/// Class `c` starts look-behind `lb` of length `L` if `lb` is passable right
/// after consuming `c` and exactly `L - 1` further characters.
pub(super) fn lookbehind_starts(ast: &RegexAst) -> FxHashMap<NodeId, SmallVec<[NodeId; 2]>> {
    let mut starts: FxHashMap<NodeId, SmallVec<[NodeId; 2]>> = FxHashMap::default();
    let max_length = ast
        .lookbehinds()
        .map(|lb| ast.lookbehind_length(lb))
        .max()
        .unwrap_or(0);
    if max_length == 0 {
        return starts;
    }

    for i in 0..ast.node_count() {
        let id = NodeId::from_index(i);
        let node = ast.node(id);
        if node.lookbehind().is_some() || !matches!(node.kind(), NodeKind::CharClass(_)) {
            continue;
        }
        let mut found: SmallVec<[NodeId; 2]> = SmallVec::new();
        let mut frontier: FxHashSet<NodeId> = FxHashSet::default();
        frontier.insert(id);
        for consumed in 0..max_length {
            let mut next: FxHashSet<NodeId> = FxHashSet::default();
            let mut ordered: Vec<NodeId> = frontier.iter().copied().collect();
            ordered.sort_unstable();
            for position in ordered {
                for path in walk_from(ast, Some(position)) {
                    for &lb in &path.lookbehinds {
                        if ast.lookbehind_length(lb) == consumed + 1 && !found.contains(&lb) {
                            found.push(lb);
                        }
                    }
                    if path.kind == PathEndKind::CharClass {
                        next.insert(path.target);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        if !found.is_empty() {
            found.sort_unstable();
            starts.insert(id, found);
        }
    }
    starts
}

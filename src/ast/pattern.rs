//! Programmatic regex trees and their lowering into the node arena.
//!
//! There is no text parser: callers (a front end, or tests) build
//! [`Pattern`] values with the constructors below.
//!
//! Lowering rules:
//! - capture groups are numbered in pre-order (by opening parenthesis),
//!   starting at 1; group 0 wraps the whole pattern
//! - `x{min,max}` is unrolled into `min` mandatory copies followed by
//!   nested optional copies (`x{1,3}` = `x(?:x(?:x)?)?`); every copy keeps
//!   the capture numbers of the original
//! - look-behind bodies must flatten to a fixed-length run of character
//!   classes

use crate::ast::{push_node, Node, NodeId, NodeKind, Quantifier};
use crate::charset::CodePointSet;
use crate::Error;

/// Largest bound accepted in counted repetition.
pub const MAX_REPEAT: u32 = 100;

#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    /// Matches the empty string.
    Empty,
    Class(CodePointSet),
    Caret,
    Dollar,
    /// Positive look-behind.
    LookBehind(Box<Pattern>),
    Concat(Vec<Pattern>),
    Alternation(Vec<Pattern>),
    Group {
        capture: bool,
        body: Box<Pattern>,
    },
    Repeat {
        body: Box<Pattern>,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    },
    /// `(?(group)yes|no)`
    Conditional {
        group: u16,
        yes: Box<Pattern>,
        no: Box<Pattern>,
    },
}

impl Pattern {
    /// One character class per character of `text`.
    pub fn literal(text: &str) -> Pattern {
        let mut items: Vec<Pattern> = text
            .chars()
            .map(|c| Pattern::Class(CodePointSet::from_char(c)))
            .collect();
        match items.len() {
            0 => Pattern::Empty,
            1 => items.remove(0),
            _ => Pattern::Concat(items),
        }
    }

    pub fn class(set: CodePointSet) -> Pattern {
        Pattern::Class(set)
    }

    /// `[lo-hi]`
    pub fn range(lo: char, hi: char) -> Pattern {
        Pattern::Class(CodePointSet::from_range(lo, hi))
    }

    /// `.` in dot-all mode.
    pub fn any() -> Pattern {
        Pattern::Class(CodePointSet::full())
    }

    pub fn concat<I: IntoIterator<Item = Pattern>>(items: I) -> Pattern {
        Pattern::Concat(items.into_iter().collect())
    }

    pub fn alt<I: IntoIterator<Item = Pattern>>(items: I) -> Pattern {
        Pattern::Alternation(items.into_iter().collect())
    }

    pub fn capture(body: Pattern) -> Pattern {
        Pattern::Group {
            capture: true,
            body: Box::new(body),
        }
    }

    pub fn group(body: Pattern) -> Pattern {
        Pattern::Group {
            capture: false,
            body: Box::new(body),
        }
    }

    pub fn repeat(body: Pattern, min: u32, max: Option<u32>) -> Pattern {
        Pattern::Repeat {
            body: Box::new(body),
            min,
            max,
            greedy: true,
        }
    }

    pub fn star(body: Pattern) -> Pattern {
        Self::repeat(body, 0, None)
    }

    pub fn plus(body: Pattern) -> Pattern {
        Self::repeat(body, 1, None)
    }

    pub fn optional(body: Pattern) -> Pattern {
        Self::repeat(body, 0, Some(1))
    }

    /// Makes a repetition lazy. Other patterns are returned unchanged.
    pub fn lazy(self) -> Pattern {
        match self {
            Pattern::Repeat { body, min, max, .. } => Pattern::Repeat {
                body,
                min,
                max,
                greedy: false,
            },
            other => other,
        }
    }

    pub fn look_behind(body: Pattern) -> Pattern {
        Pattern::LookBehind(Box::new(body))
    }

    pub fn conditional(group: u16, yes: Pattern, no: Pattern) -> Pattern {
        Pattern::Conditional {
            group,
            yes: Box::new(yes),
            no: Box::new(no),
        }
    }

    /// Capture groups opened textually inside this pattern.
    pub fn capture_count(&self) -> u16 {
        match self {
            Pattern::Concat(items) | Pattern::Alternation(items) => {
                items.iter().map(Pattern::capture_count).sum()
            }
            Pattern::Group { capture, body } => u16::from(*capture) + body.capture_count(),
            Pattern::Repeat { body, .. } => body.capture_count(),
            Pattern::Conditional { yes, no, .. } => yes.capture_count() + no.capture_count(),
            _ => 0,
        }
    }
}

pub(super) struct Lowered {
    pub nodes: Vec<Node>,
    /// Group 0.
    pub root: NodeId,
    pub capture_count: u16,
}

pub(super) fn lower(pattern: &Pattern) -> Result<Lowered, Error> {
    let mut lowering = Lowering {
        nodes: Vec::new(),
        next_capture: 1,
    };
    let alternatives = lowering.alternatives(pattern)?;
    let root = lowering.push(NodeKind::Group {
        alternatives,
        capture: Some(0),
        quantifier: Quantifier::Once,
        greedy: true,
    });
    Ok(Lowered {
        nodes: lowering.nodes,
        root,
        capture_count: lowering.next_capture,
    })
}

struct Lowering {
    nodes: Vec<Node>,
    next_capture: u16,
}

impl Lowering {
    fn push(&mut self, kind: NodeKind) -> NodeId {
        push_node(&mut self.nodes, kind)
    }

    fn alternatives(&mut self, pattern: &Pattern) -> Result<Vec<NodeId>, Error> {
        match pattern {
            Pattern::Alternation(items) => items.iter().map(|p| self.sequence(p)).collect(),
            other => Ok(vec![self.sequence(other)?]),
        }
    }

    fn sequence(&mut self, pattern: &Pattern) -> Result<NodeId, Error> {
        let mut terms = Vec::new();
        self.append_terms(pattern, &mut terms)?;
        Ok(self.push(NodeKind::Sequence(terms)))
    }

    fn append_terms(&mut self, pattern: &Pattern, terms: &mut Vec<NodeId>) -> Result<(), Error> {
        match pattern {
            Pattern::Empty => {}
            Pattern::Class(set) => terms.push(self.push(NodeKind::CharClass(set.clone()))),
            Pattern::Caret => terms.push(self.push(NodeKind::Caret)),
            Pattern::Dollar => terms.push(self.push(NodeKind::Dollar)),
            Pattern::LookBehind(body) => terms.push(self.look_behind(body)?),
            Pattern::Concat(items) => {
                for item in items {
                    self.append_terms(item, terms)?;
                }
            }
            Pattern::Alternation(_) => {
                let alternatives = self.alternatives(pattern)?;
                terms.push(self.push(NodeKind::Group {
                    alternatives,
                    capture: None,
                    quantifier: Quantifier::Once,
                    greedy: true,
                }));
            }
            Pattern::Group { .. } => terms.push(self.quantified(pattern, Quantifier::Once, true)?),
            Pattern::Repeat {
                body,
                min,
                max,
                greedy,
            } => self.repeat(body, *min, *max, *greedy, terms)?,
            Pattern::Conditional { group, yes, no } => {
                let yes = self.sequence(yes)?;
                let no = self.sequence(no)?;
                terms.push(self.push(NodeKind::Conditional {
                    group: *group,
                    yes,
                    no,
                }));
            }
        }
        Ok(())
    }

    /// A group node for `body` with the given quantifier. A group pattern
    /// becomes that group, anything else gets a non-capturing wrapper.
    fn quantified(
        &mut self,
        body: &Pattern,
        quantifier: Quantifier,
        greedy: bool,
    ) -> Result<NodeId, Error> {
        let (capture, inner) = match body {
            Pattern::Group { capture, body } => {
                let index = if *capture {
                    let index = self.next_capture;
                    self.next_capture += 1;
                    Some(index)
                } else {
                    None
                };
                (index, body.as_ref())
            }
            other => (None, other),
        };
        let alternatives = self.alternatives(inner)?;
        Ok(self.push(NodeKind::Group {
            alternatives,
            capture,
            quantifier,
            greedy,
        }))
    }

    fn repeat(
        &mut self,
        body: &Pattern,
        min: u32,
        max: Option<u32>,
        greedy: bool,
        terms: &mut Vec<NodeId>,
    ) -> Result<(), Error> {
        if let Some(max) = max {
            if max < min {
                return Err(Error::UnsupportedPattern(format!(
                    "repetition bounds out of order: {{{},{}}}",
                    min, max
                )));
            }
        }
        if min > MAX_REPEAT || max.map_or(false, |m| m > MAX_REPEAT) {
            return Err(Error::UnsupportedPattern(format!(
                "repetition bound above {}",
                MAX_REPEAT
            )));
        }

        let base = self.next_capture;
        match (min, max) {
            (_, Some(0)) => {}
            (0, Some(1)) => terms.push(self.copy(body, Quantifier::ZeroOrOne, greedy, base)?),
            (0, None) => terms.push(self.copy(body, Quantifier::ZeroOrMore, greedy, base)?),
            (min, None) => {
                for _ in 1..min {
                    self.append_copy(body, base, terms)?;
                }
                terms.push(self.copy(body, Quantifier::OneOrMore, greedy, base)?);
            }
            (min, Some(max)) => {
                for _ in 0..min {
                    self.append_copy(body, base, terms)?;
                }
                if max > min {
                    terms.push(self.optional_tail(body, max - min, greedy, base)?);
                }
            }
        }
        self.next_capture = base + body.capture_count();
        Ok(())
    }

    fn copy(
        &mut self,
        body: &Pattern,
        quantifier: Quantifier,
        greedy: bool,
        base: u16,
    ) -> Result<NodeId, Error> {
        self.next_capture = base;
        self.quantified(body, quantifier, greedy)
    }

    fn append_copy(
        &mut self,
        body: &Pattern,
        base: u16,
        terms: &mut Vec<NodeId>,
    ) -> Result<(), Error> {
        self.next_capture = base;
        self.append_terms(body, terms)
    }

    fn optional_tail(
        &mut self,
        body: &Pattern,
        count: u32,
        greedy: bool,
        base: u16,
    ) -> Result<NodeId, Error> {
        let mut terms = Vec::new();
        self.append_copy(body, base, &mut terms)?;
        if count > 1 {
            terms.push(self.optional_tail(body, count - 1, greedy, base)?);
        }
        let seq = self.push(NodeKind::Sequence(terms));
        Ok(self.push(NodeKind::Group {
            alternatives: vec![seq],
            capture: None,
            quantifier: Quantifier::ZeroOrOne,
            greedy,
        }))
    }

    fn look_behind(&mut self, body: &Pattern) -> Result<NodeId, Error> {
        let mut classes = Vec::new();
        flatten_look_behind(body, &mut classes)?;
        if classes.is_empty() {
            return Err(Error::UnsupportedPattern(
                "empty look-behind".to_string(),
            ));
        }
        let length = classes.len();
        let terms: Vec<NodeId> = classes
            .into_iter()
            .map(|set| self.push(NodeKind::CharClass(set)))
            .collect();
        let content = terms.clone();
        let body = self.push(NodeKind::Sequence(terms));
        let lb = self.push(NodeKind::LookBehind { body, length });
        for id in content {
            self.nodes[id.index()].lookbehind = Some(lb);
        }
        Ok(lb)
    }
}

fn flatten_look_behind(pattern: &Pattern, out: &mut Vec<CodePointSet>) -> Result<(), Error> {
    match pattern {
        Pattern::Empty => Ok(()),
        Pattern::Class(set) => {
            out.push(set.clone());
            Ok(())
        }
        Pattern::Concat(items) => items.iter().try_for_each(|p| flatten_look_behind(p, out)),
        Pattern::Group {
            capture: false,
            body,
        } => flatten_look_behind(body, out),
        Pattern::Repeat { body, min, max, .. } if Some(*min) == *max && *min <= MAX_REPEAT => {
            for _ in 0..*min {
                flatten_look_behind(body, out)?;
            }
            Ok(())
        }
        Pattern::LookBehind(_) => Err(Error::UnsupportedPattern(
            "look-behind nested in look-behind".to_string(),
        )),
        other => Err(Error::UnsupportedPattern(format!(
            "look-behind must be a fixed run of character classes, found {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(lowered: &Lowered) -> Vec<&NodeKind> {
        lowered.nodes.iter().map(|n| &n.kind).collect()
    }

    fn group_captures(lowered: &Lowered) -> Vec<u16> {
        lowered
            .nodes
            .iter()
            .filter_map(|n| match n.kind {
                NodeKind::Group { capture, .. } => capture,
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_capture_numbering() {
        // (a(b))(c)
        let p = Pattern::concat([
            Pattern::capture(Pattern::concat([
                Pattern::literal("a"),
                Pattern::capture(Pattern::literal("b")),
            ])),
            Pattern::capture(Pattern::literal("c")),
        ]);
        let lowered = lower(&p).unwrap();
        assert_eq!(lowered.capture_count, 4);
        let mut caps = group_captures(&lowered);
        caps.sort_unstable();
        assert_eq!(caps, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_counted_repeat_keeps_capture_numbers() {
        // (a){2,3}(b)
        let p = Pattern::concat([
            Pattern::repeat(Pattern::capture(Pattern::literal("a")), 2, Some(3)),
            Pattern::capture(Pattern::literal("b")),
        ]);
        let lowered = lower(&p).unwrap();
        assert_eq!(lowered.capture_count, 3);
        let caps = group_captures(&lowered);
        // Three copies of group 1, then group 2, then group 0
        assert_eq!(caps.iter().filter(|&&c| c == 1).count(), 3);
        assert_eq!(caps.iter().filter(|&&c| c == 2).count(), 1);
    }

    #[test]
    fn test_zero_repeat_still_numbers_groups() {
        // (a){0}(b): b is still group 2
        let p = Pattern::concat([
            Pattern::repeat(Pattern::capture(Pattern::literal("a")), 0, Some(0)),
            Pattern::capture(Pattern::literal("b")),
        ]);
        let lowered = lower(&p).unwrap();
        assert_eq!(lowered.capture_count, 3);
        assert!(group_captures(&lowered).contains(&2));
        assert!(!group_captures(&lowered).contains(&1));
    }

    #[test]
    fn test_quantifier_shapes() {
        let lowered = lower(&Pattern::plus(Pattern::literal("ab")).lazy()).unwrap();
        let loops: Vec<_> = kinds(&lowered)
            .into_iter()
            .filter_map(|k| match k {
                NodeKind::Group {
                    quantifier, greedy, ..
                } if *quantifier != Quantifier::Once => Some((*quantifier, *greedy)),
                _ => None,
            })
            .collect();
        assert_eq!(loops, vec![(Quantifier::OneOrMore, false)]);
    }

    #[test]
    fn test_look_behind_lowering() {
        let p = Pattern::look_behind(Pattern::concat([
            Pattern::range('a', 'z'),
            Pattern::repeat(Pattern::literal("x"), 2, Some(2)),
        ]));
        let lowered = lower(&p).unwrap();
        let lb = lowered
            .nodes
            .iter()
            .position(|n| matches!(n.kind, NodeKind::LookBehind { .. }))
            .unwrap();
        assert!(matches!(
            lowered.nodes[lb].kind,
            NodeKind::LookBehind { length: 3, .. }
        ));
        let members = lowered
            .nodes
            .iter()
            .filter(|n| n.lookbehind == Some(NodeId::from_index(lb)))
            .count();
        assert_eq!(members, 3);
    }

    #[test]
    fn test_rejected_patterns() {
        let variable = Pattern::look_behind(Pattern::star(Pattern::literal("a")));
        assert!(matches!(lower(&variable), Err(Error::UnsupportedPattern(_))));

        let nested = Pattern::look_behind(Pattern::look_behind(Pattern::literal("a")));
        assert!(matches!(lower(&nested), Err(Error::UnsupportedPattern(_))));

        let backwards = Pattern::repeat(Pattern::literal("a"), 3, Some(2));
        assert!(matches!(lower(&backwards), Err(Error::UnsupportedPattern(_))));

        let huge = Pattern::repeat(Pattern::literal("a"), 0, Some(MAX_REPEAT + 1));
        assert!(matches!(lower(&huge), Err(Error::UnsupportedPattern(_))));
    }
}

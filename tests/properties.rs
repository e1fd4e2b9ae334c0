//! Structural properties of generated automata over random patterns.

use std::collections::HashSet;

use quickcheck::{Arbitrary, Gen, QuickCheck};
use regex_nfa::{compile, AstFlags, Error, Nfa, NfaConfig, Pattern, RegexAst, StateId};

#[derive(Clone, Debug)]
struct ArbPattern(Pattern);

impl Arbitrary for ArbPattern {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut captures = 0;
        ArbPattern(gen_pattern(g, 3, &mut captures))
    }
}

fn pick(g: &mut Gen, n: u8) -> u8 {
    u8::arbitrary(g) % n
}

fn gen_literal(g: &mut Gen, max_len: u8) -> Pattern {
    let len = 1 + pick(g, max_len) as usize;
    let text: String = (0..len).map(|_| (b'a' + pick(g, 3)) as char).collect();
    Pattern::literal(&text)
}

fn gen_pattern(g: &mut Gen, depth: u32, captures: &mut u16) -> Pattern {
    let leaf = depth == 0 || pick(g, 3) == 0;
    if leaf {
        return match pick(g, 8) {
            0 => Pattern::any(),
            1 => Pattern::range('a', 'b'),
            2 => Pattern::Caret,
            3 => Pattern::Dollar,
            4 => Pattern::look_behind(gen_literal(g, 3)),
            5 => Pattern::Empty,
            _ => gen_literal(g, 2),
        };
    }
    match pick(g, 8) {
        0 | 1 => {
            let n = 2 + pick(g, 2);
            Pattern::concat((0..n).map(|_| gen_pattern(g, depth - 1, captures)).collect::<Vec<_>>())
        }
        2 => {
            let n = 2 + pick(g, 2);
            Pattern::alt((0..n).map(|_| gen_pattern(g, depth - 1, captures)).collect::<Vec<_>>())
        }
        3 => {
            *captures += 1;
            Pattern::capture(gen_pattern(g, depth - 1, captures))
        }
        4 => {
            let body = gen_pattern(g, depth - 1, captures);
            let p = match pick(g, 3) {
                0 => Pattern::star(body),
                1 => Pattern::plus(body),
                _ => Pattern::optional(body),
            };
            if bool::arbitrary(g) {
                p.lazy()
            } else {
                p
            }
        }
        5 => {
            let min = u32::from(pick(g, 2));
            let max = min + u32::from(pick(g, 2));
            Pattern::repeat(gen_pattern(g, depth - 1, captures), min, Some(max))
        }
        6 => {
            let group = 1 + u16::from(pick(g, 2));
            let yes = gen_pattern(g, depth - 1, captures);
            let no = gen_pattern(g, depth - 1, captures);
            Pattern::conditional(group, yes, no)
        }
        _ => Pattern::group(gen_pattern(g, depth - 1, captures)),
    }
}

fn forward(nfa: &Nfa, from: StateId) -> HashSet<StateId> {
    let mut seen = HashSet::new();
    let mut stack = vec![from];
    while let Some(s) = stack.pop() {
        if !seen.insert(s) {
            continue;
        }
        for &tid in nfa.state(s).unwrap().successors() {
            stack.push(nfa.transition(tid).unwrap().target());
        }
    }
    seen
}

fn consistent(ast: &RegexAst, nfa: &Nfa) -> bool {
    let dummy = nfa.dummy_initial();
    let sticky = ast.flags().sticky;

    let dangling = nfa
        .transitions()
        .any(|t| nfa.state(t.source()).is_none() || nfa.state(t.target()).is_none());
    if dangling {
        return false;
    }

    for s in nfa.states() {
        let linked = s.id() != dummy && (sticky || !s.nodes().is_subset(ast.hard_prefix()));
        for &tid in s.successors() {
            let Some(t) = nfa.transition(tid) else {
                return false;
            };
            if t.source() != s.id() {
                return false;
            }
            if linked {
                let target = nfa.state(t.target()).unwrap();
                if target.predecessors().iter().filter(|&&p| p == tid).count() != 1 {
                    return false;
                }
            }
        }
        for &tid in s.predecessors() {
            match nfa.transition(tid) {
                Some(t) if t.target() == s.id() => {}
                _ => return false,
            }
        }
        if s.id() != dummy && !forward(nfa, s.id()).iter().any(|&r| nfa.state(r).unwrap().is_final()) {
            return false;
        }
    }

    if let Some(tid) = nfa.initial_loop_back() {
        match nfa.transition(tid) {
            Some(t) if t.source() == t.target() && t.is_loop_back() => {}
            _ => return false,
        }
    }

    let reachable = forward(nfa, dummy);
    nfa.states().all(|s| s.is_final() || reachable.contains(&s.id()))
}

fn prop_consistent(pattern: ArbPattern, must_advance: bool, sticky: bool) -> bool {
    let flags = AstFlags {
        must_advance,
        sticky,
        ..AstFlags::default()
    };
    let ast = match RegexAst::new(&pattern.0, flags) {
        Ok(ast) => ast,
        Err(Error::UnsupportedPattern(_)) => return true,
        Err(_) => return false,
    };
    let config = NfaConfig::default();
    match (compile(&ast, &config), compile(&ast, &config)) {
        (Ok(first), Ok(second)) => {
            consistent(&ast, &first) && first.to_string() == second.to_string()
        }
        (Err(Error::AutomatonTooLarge { .. }), Err(Error::AutomatonTooLarge { .. })) => true,
        _ => false,
    }
}

#[test]
fn test_random_patterns_are_consistent() {
    let _ = env_logger::builder().is_test(true).try_init();
    QuickCheck::new()
        .tests(300)
        .gen(Gen::new(20))
        .quickcheck(prop_consistent as fn(ArbPattern, bool, bool) -> bool);
}

#[test]
fn test_boolean_match_has_no_operations() {
    fn prop(pattern: ArbPattern) -> bool {
        let flags = AstFlags {
            boolean_match: true,
            ..AstFlags::default()
        };
        let Ok(ast) = RegexAst::new(&pattern.0, flags) else {
            return true;
        };
        match compile(&ast, &NfaConfig::default()) {
            Ok(nfa) => nfa
                .transitions()
                .all(|t| t.operations().is_empty() && t.boundaries().is_empty()),
            Err(_) => true,
        }
    }
    QuickCheck::new()
        .tests(200)
        .quickcheck(prop as fn(ArbPattern) -> bool);
}

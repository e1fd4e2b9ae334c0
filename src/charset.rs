//! Immutable sets of Unicode code points.
//!
//! A [`CodePointSet`] is a sorted list of disjoint, non-adjacent inclusive
//! ranges over `0..=0x10FFFF`. Every constructor normalizes its input, so two
//! sets with the same members always compare equal and hash identically.
//!
//! The set operations are linear merges over the range lists:
//! - `union` sorts the concatenation and coalesces adjacent ranges
//! - `intersect` walks both lists with two cursors
//! - `invert` emits the gaps between ranges
//! - `subtract` is `intersect` with the inverted right-hand side

use std::fmt;

use smallvec::SmallVec;

/// Largest Unicode code point.
pub const MAX_CODE_POINT: u32 = 0x10FFFF;

/// An inclusive range of code points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodePointRange {
    pub lo: u32,
    pub hi: u32,
}

impl CodePointRange {
    #[inline]
    pub fn new(lo: u32, hi: u32) -> Self {
        debug_assert!(lo <= hi && hi <= MAX_CODE_POINT);
        CodePointRange { lo, hi }
    }

    #[inline]
    pub fn contains(self, cp: u32) -> bool {
        self.lo <= cp && cp <= self.hi
    }
}

type Ranges = SmallVec<[CodePointRange; 2]>;

/// A normalized set of code points.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct CodePointSet {
    ranges: Ranges,
}

impl CodePointSet {
    /// The set matching nothing.
    #[inline]
    pub fn empty() -> Self {
        CodePointSet {
            ranges: SmallVec::new(),
        }
    }

    /// The set matching every code point.
    pub fn full() -> Self {
        let mut ranges = SmallVec::new();
        ranges.push(CodePointRange::new(0, MAX_CODE_POINT));
        CodePointSet { ranges }
    }

    pub fn from_char(c: char) -> Self {
        Self::from_range(c, c)
    }

    /// The set `lo..=hi`. Reversed bounds are swapped.
    pub fn from_range(lo: char, hi: char) -> Self {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let mut ranges = SmallVec::new();
        ranges.push(CodePointRange::new(lo as u32, hi as u32));
        CodePointSet { ranges }
    }

    /// Builds a set from arbitrary, possibly overlapping, ranges.
    ///
    /// Bounds above [`MAX_CODE_POINT`] are clamped and reversed pairs are
    /// swapped.
    pub fn from_ranges<I>(ranges: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let raw: Ranges = ranges
            .into_iter()
            .filter_map(|(a, b)| {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                if lo > MAX_CODE_POINT {
                    return None;
                }
                Some(CodePointRange::new(lo, hi.min(MAX_CODE_POINT)))
            })
            .collect();
        CodePointSet {
            ranges: simplify(raw),
        }
    }

    /// Set of every character of `chars`.
    pub fn from_chars(chars: &str) -> Self {
        Self::from_ranges(chars.chars().map(|c| (c as u32, c as u32)))
    }

    #[inline]
    pub fn ranges(&self) -> &[CodePointRange] {
        &self.ranges
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    #[inline]
    pub fn matches_something(&self) -> bool {
        !self.ranges.is_empty()
    }

    pub fn matches_everything(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0] == CodePointRange::new(0, MAX_CODE_POINT)
    }

    /// Membership test by binary search over the ranges.
    pub fn contains(&self, cp: u32) -> bool {
        self.ranges
            .binary_search_by(|r| {
                if r.hi < cp {
                    std::cmp::Ordering::Less
                } else if r.lo > cp {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    #[inline]
    pub fn contains_char(&self, c: char) -> bool {
        self.contains(c as u32)
    }

    /// Number of code points in the set.
    pub fn size(&self) -> u32 {
        self.ranges.iter().map(|r| r.hi - r.lo + 1).sum()
    }

    pub fn union(&self, other: &CodePointSet) -> CodePointSet {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let raw: Ranges = self
            .ranges
            .iter()
            .chain(other.ranges.iter())
            .copied()
            .collect();
        CodePointSet {
            ranges: simplify(raw),
        }
    }

    pub fn intersect(&self, other: &CodePointSet) -> CodePointSet {
        let mut out = Ranges::new();
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            let lo = a.lo.max(b.lo);
            let hi = a.hi.min(b.hi);
            if lo <= hi {
                out.push(CodePointRange::new(lo, hi));
            }
            if a.hi < b.hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        CodePointSet { ranges: out }
    }

    /// Every code point not in `self`.
    pub fn invert(&self) -> CodePointSet {
        let mut out = Ranges::new();
        let mut point: u32 = 0;
        for r in &self.ranges {
            if r.lo > point {
                out.push(CodePointRange::new(point, r.lo - 1));
            }
            point = r.hi + 1;
        }
        if point <= MAX_CODE_POINT {
            out.push(CodePointRange::new(point, MAX_CODE_POINT));
        }
        CodePointSet { ranges: out }
    }

    pub fn subtract(&self, other: &CodePointSet) -> CodePointSet {
        if self.is_empty() || other.is_empty() {
            return self.clone();
        }
        self.intersect(&other.invert())
    }

    pub fn intersects(&self, other: &CodePointSet) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            if a.lo.max(b.lo) <= a.hi.min(b.hi) {
                return true;
            }
            if a.hi < b.hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }
}

/// Sort then coalesce overlapping and adjacent ranges.
fn simplify(mut ranges: Ranges) -> Ranges {
    if ranges.len() < 2 {
        return ranges;
    }
    ranges.sort_unstable();

    let mut out = Ranges::new();
    let mut current = ranges[0];
    for next in ranges.iter().skip(1).copied() {
        if next.lo > current.hi.saturating_add(1) {
            out.push(current);
            current = next;
            continue;
        }
        if next.hi > current.hi {
            current.hi = next.hi;
        }
    }
    out.push(current);
    out
}

fn write_code_point(f: &mut fmt::Formatter<'_>, cp: u32) -> fmt::Result {
    match char::from_u32(cp) {
        Some(c) if c.is_ascii_graphic() => write!(f, "{}", c),
        _ => write!(f, "\\u{{{:x}}}", cp),
    }
}

impl fmt::Display for CodePointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matches_everything() {
            return write!(f, "[any]");
        }
        write!(f, "[")?;
        for r in &self.ranges {
            write_code_point(f, r.lo)?;
            if r.hi != r.lo {
                write!(f, "-")?;
                write_code_point(f, r.hi)?;
            }
        }
        write!(f, "]")
    }
}

impl fmt::Debug for CodePointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

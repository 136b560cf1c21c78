// src/atn/interval_set.rs
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{EOF, EPSILON};

/// Closed interval `a..=b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub a: i32,
    pub b: i32,
}

impl Interval {
    pub fn new(a: i32, b: i32) -> Self {
        Self { a, b }
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.b < self.a {
            0
        } else {
            (self.b as i64 - self.a as i64 + 1) as usize
        }
    }
}

/// Sorted, disjoint, non-adjacent intervals of symbol values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(v: i32) -> Self {
        Self::of_range(v, v)
    }

    pub fn of_range(a: i32, b: i32) -> Self {
        let mut s = Self::new();
        s.add_range(a, b);
        s
    }

    pub fn add(&mut self, v: i32) {
        self.add_range(v, v);
    }

    pub fn add_range(&mut self, a: i32, b: i32) {
        if b < a {
            return;
        }
        let mut merged = Interval::new(a, b);
        let mut out = Vec::with_capacity(self.intervals.len() + 1);
        let mut placed = false;
        for iv in self.intervals.drain(..) {
            if (iv.b as i64) < merged.a as i64 - 1 {
                out.push(iv);
            } else if (merged.b as i64) < iv.a as i64 - 1 {
                if !placed {
                    out.push(merged);
                    placed = true;
                }
                out.push(iv);
            } else {
                merged.a = merged.a.min(iv.a);
                merged.b = merged.b.max(iv.b);
            }
        }
        if !placed {
            out.push(merged);
        }
        self.intervals = out;
    }

    pub fn add_set(&mut self, other: &IntervalSet) {
        for iv in &other.intervals {
            self.add_range(iv.a, iv.b);
        }
    }

    pub fn contains(&self, v: i32) -> bool {
        self.intervals
            .binary_search_by(|iv| {
                if iv.b < v {
                    std::cmp::Ordering::Less
                } else if iv.a > v {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of elements (not intervals).
    pub fn len(&self) -> usize {
        self.intervals.iter().map(Interval::len).sum()
    }

    #[inline]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Elements of `lo..=hi` that are not in `self`.
    pub fn complement(&self, lo: i32, hi: i32) -> IntervalSet {
        let mut out = IntervalSet::new();
        let mut next = lo as i64;
        for iv in &self.intervals {
            if (iv.b as i64) < next {
                continue;
            }
            if iv.a as i64 > hi as i64 {
                break;
            }
            if (iv.a as i64) > next {
                out.add_range(next as i32, (iv.a as i64 - 1) as i32);
            }
            next = iv.b as i64 + 1;
        }
        if next <= hi as i64 {
            out.add_range(next as i32, hi);
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.intervals.iter().flat_map(|iv| iv.a..=iv.b)
    }

    /// Element-wise rendering through a symbol namer; EOF and EPSILON keep
    /// their fixed spellings.
    pub fn to_string_with(&self, name: impl Fn(i32) -> String) -> String {
        if self.is_empty() {
            return "{}".to_string();
        }
        let element = |v: i32| match v {
            EOF => "<EOF>".to_string(),
            EPSILON => "<EPSILON>".to_string(),
            _ => name(v),
        };
        let items: Vec<String> = self.iter().map(element).collect();
        if items.len() > 1 {
            format!("{{{}}}", items.join(", "))
        } else {
            items.join(", ")
        }
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        let braces = self.len() > 1;
        if braces {
            f.write_str("{")?;
        }
        for (i, iv) in self.intervals.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if iv.a == iv.b {
                if iv.a == EOF {
                    f.write_str("<EOF>")?;
                } else {
                    write!(f, "{}", iv.a)?;
                }
            } else {
                write!(f, "{}..{}", iv.a, iv.b)?;
            }
        }
        if braces {
            f.write_str("}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_adjacent_and_overlapping() {
        let mut s = IntervalSet::new();
        s.add_range(10, 20);
        s.add_range(21, 25);
        s.add_range(5, 11);
        s.add(40);
        assert_eq!(s.intervals(), &[Interval::new(5, 25), Interval::new(40, 40)]);
        assert_eq!(s.len(), 22);
        assert!(s.contains(5) && s.contains(25) && s.contains(40));
        assert!(!s.contains(26));
    }

    #[test]
    fn insert_between_existing_intervals() {
        let mut s = IntervalSet::of_range(1, 2);
        s.add_range(10, 12);
        s.add(5);
        assert_eq!(
            s.intervals(),
            &[Interval::new(1, 2), Interval::new(5, 5), Interval::new(10, 12)]
        );
    }

    #[test]
    fn complement_within_bounds() {
        let mut s = IntervalSet::of(3);
        s.add_range(6, 7);
        let c = s.complement(1, 8);
        assert_eq!(c.to_string(), "{1..2, 4..5, 8}");
    }

    #[test]
    fn display_braces_follow_element_count() {
        assert_eq!(IntervalSet::of(43981).to_string(), "43981");
        assert_eq!(IntervalSet::of_range(97, 99).to_string(), "{97..99}");
        assert_eq!(IntervalSet::of(EOF).to_string(), "<EOF>");
    }
}

use std::fmt::{self, Debug, Display};

/// Sorted set of disjoint, non-adjacent inclusive intervals of symbols.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct IntervalSet {
    intervals: Vec<(i32, i32)>,
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

    pub fn from_ranges(ranges: &[(i32, i32)]) -> Self {
        let mut s = Self::new();
        for &(a, b) in ranges {
            s.add_range(a, b);
        }
        s
    }

    pub fn add(&mut self, v: i32) {
        self.add_range(v, v);
    }

    pub fn add_range(&mut self, a: i32, b: i32) {
        if b < a {
            return;
        }
        let (mut lo, mut hi) = (a as i64, b as i64);
        let mut out = Vec::with_capacity(self.intervals.len() + 1);
        let mut inserted = false;
        for &(s, e) in &self.intervals {
            let (s64, e64) = (s as i64, e as i64);
            if e64 + 1 < lo {
                out.push((s, e));
            } else if s64 > hi + 1 {
                if !inserted {
                    out.push((lo as i32, hi as i32));
                    inserted = true;
                }
                out.push((s, e));
            } else {
                lo = lo.min(s64);
                hi = hi.max(e64);
            }
        }
        if !inserted {
            out.push((lo as i32, hi as i32));
        }
        self.intervals = out;
    }

    pub fn add_set(&mut self, other: &IntervalSet) {
        for &(a, b) in &other.intervals {
            self.add_range(a, b);
        }
    }

    pub fn remove(&mut self, v: i32) {
        let mut out = Vec::with_capacity(self.intervals.len() + 1);
        for &(s, e) in &self.intervals {
            if v < s || v > e {
                out.push((s, e));
                continue;
            }
            if s < v {
                out.push((s, v - 1));
            }
            if v < e {
                out.push((v + 1, e));
            }
        }
        self.intervals = out;
    }

    pub fn contains(&self, v: i32) -> bool {
        let idx = self.intervals.partition_point(|&(_, e)| e < v);
        idx < self.intervals.len() && self.intervals[idx].0 <= v
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of symbols in the set.
    pub fn size(&self) -> usize {
        self.intervals
            .iter()
            .map(|&(a, b)| (b as i64 - a as i64 + 1) as usize)
            .sum()
    }

    pub fn min_element(&self) -> Option<i32> {
        self.intervals.first().map(|&(a, _)| a)
    }

    pub fn max_element(&self) -> Option<i32> {
        self.intervals.last().map(|&(_, b)| b)
    }

    pub fn intervals(&self) -> &[(i32, i32)] {
        &self.intervals
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.intervals.iter().flat_map(|&(a, b)| a..=b)
    }

    /// Everything in `[min, max]` that is not in this set.
    pub fn complement(&self, min: i32, max: i32) -> IntervalSet {
        let mut out = IntervalSet::new();
        let mut next = min as i64;
        for &(a, b) in &self.intervals {
            if (b as i64) < next {
                continue;
            }
            if (a as i64) > max as i64 {
                break;
            }
            if (a as i64) > next {
                out.intervals.push((next as i32, a - 1));
            }
            next = b as i64 + 1;
        }
        if next <= max as i64 {
            out.intervals.push((next as i32, max));
        }
        out
    }

    pub fn subtract(&self, other: &IntervalSet) -> IntervalSet {
        let mut out = self.clone();
        for &(a, b) in &other.intervals {
            let mut next = Vec::with_capacity(out.intervals.len() + 1);
            for &(s, e) in &out.intervals {
                if e < a || s > b {
                    next.push((s, e));
                    continue;
                }
                if s < a {
                    next.push((s, a - 1));
                }
                if e > b {
                    next.push((b + 1, e));
                }
            }
            out.intervals = next;
        }
        out
    }

    /// Renders the set with `name` mapping symbols to display names.
    pub fn to_string_with(&self, name: impl Fn(i32) -> String) -> String {
        let elts: Vec<String> = self.iter().take(64).map(name).collect();
        if elts.len() == 1 {
            elts[0].clone()
        } else {
            format!("{{{}}}", elts.join(", "))
        }
    }
}

impl Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .intervals
            .iter()
            .map(|&(a, b)| {
                if a == b {
                    format!("{}", a)
                } else {
                    format!("{}..{}", a, b)
                }
            })
            .collect();
        if parts.len() == 1 {
            write!(f, "{}", parts[0])
        } else {
            write!(f, "{{{}}}", parts.join(", "))
        }
    }
}

impl Debug for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_adjacent() {
        let mut s = IntervalSet::new();
        s.add_range(5, 7);
        s.add(1);
        s.add_range(2, 4);
        s.add(10);
        assert_eq!(s.intervals(), &[(1, 7), (10, 10)]);
        assert!(s.contains(4));
        assert!(!s.contains(8));
        assert!(s.contains(10));
        assert_eq!(s.size(), 8);
        assert_eq!(s.to_string(), "{1..7, 10}");
    }

    #[test]
    fn complement_and_subtract() {
        let s = IntervalSet::from_ranges(&[(-1, -1), (3, 4), (8, 9)]);
        let c = s.complement(1, 10);
        assert_eq!(c.intervals(), &[(1, 2), (5, 7), (10, 10)]);
        let d = IntervalSet::of_range(1, 10).subtract(&s);
        assert_eq!(d, c);
        let mut r = s.clone();
        r.remove(-1);
        r.remove(3);
        assert_eq!(r.intervals(), &[(4, 4), (8, 9)]);
    }
}

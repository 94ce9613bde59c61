//! Prediction contexts, semantic contexts and configuration sets: the data
//! the simulators thread through closure computation.

mod config;
mod prediction;
mod semantic;

use std::{
    fmt::{self, Debug},
    hash::{Hash, Hasher},
};

use toktrie::SimpleVob;

pub use config::{AtnConfig, ConfigSet};
pub use prediction::{ContextCache, MergeCache, PredictionContext, EMPTY_RETURN_STATE};
pub use semantic::{PredicateEvaluator, SemanticContext};

/// Alternative number that never occurs in an automaton.
pub const INVALID_ALT: usize = 0;

/// Set of alternative numbers (or rule indices), backed by a bit vector that
/// grows on demand.
#[derive(Clone)]
pub struct AltSet {
    bits: SimpleVob,
}

impl AltSet {
    pub fn new() -> Self {
        AltSet {
            bits: SimpleVob::alloc(64),
        }
    }

    pub fn with_capacity(n: usize) -> Self {
        AltSet {
            bits: SimpleVob::alloc(std::cmp::max(n, 1)),
        }
    }

    pub fn of(alt: usize) -> Self {
        let mut s = Self::new();
        s.insert(alt);
        s
    }

    pub fn insert(&mut self, alt: usize) {
        if alt >= self.bits.len() {
            let mut grown = SimpleVob::alloc(std::cmp::max(alt + 1, self.bits.len() * 2));
            for idx in self.bits.iter() {
                grown.set(idx as usize, true);
            }
            self.bits = grown;
        }
        self.bits.set(alt, true);
    }

    pub fn remove(&mut self, alt: usize) {
        if alt < self.bits.len() {
            self.bits.set(alt, false);
        }
    }

    pub fn contains(&self, alt: usize) -> bool {
        alt < self.bits.len() && self.bits.get(alt)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter().map(|idx| idx as usize)
    }

    /// Lowest member, if any.
    pub fn min(&self) -> Option<usize> {
        self.iter().next()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_zero()
    }

    pub fn union_with(&mut self, other: &AltSet) {
        for alt in other.iter() {
            self.insert(alt);
        }
    }
}

impl Default for AltSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for AltSet {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for AltSet {}

impl Hash for AltSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for alt in self.iter() {
            alt.hash(state);
        }
    }
}

impl FromIterator<usize> for AltSet {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut s = AltSet::new();
        for alt in iter {
            s.insert(alt);
        }
        s
    }
}

impl Debug for AltSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, alt) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", alt)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alt_set_grows() {
        let mut s = AltSet::with_capacity(2);
        s.insert(1);
        s.insert(130);
        assert!(s.contains(1));
        assert!(s.contains(130));
        assert!(!s.contains(2));
        assert_eq!(s.len(), 2);
        assert_eq!(s.min(), Some(1));
        assert_eq!(s, [130, 1].into_iter().collect::<AltSet>());
        s.remove(1);
        assert_eq!(s.min(), Some(130));
    }
}

use std::sync::Arc;

use super::IntervalSet;
use crate::token;

pub const EPSILON: u16 = 1;
pub const RANGE: u16 = 2;
pub const RULE: u16 = 3;
pub const PREDICATE: u16 = 4;
pub const ATOM: u16 = 5;
pub const ACTION: u16 = 6;
pub const SET: u16 = 7;
pub const NOT_SET: u16 = 8;
pub const WILDCARD: u16 = 9;
pub const PRECEDENCE: u16 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionKind {
    Epsilon {
        /// Set on rule-stop return edges leaving a left-recursive rule that
        /// was entered at precedence 0; holds that rule's index.
        outermost_precedence_return: Option<usize>,
    },
    Range {
        from: i32,
        to: i32,
    },
    Rule {
        rule_index: usize,
        precedence: i32,
        follow_state: usize,
    },
    Predicate {
        rule_index: usize,
        pred_index: usize,
        ctx_dependent: bool,
    },
    Atom {
        label: i32,
    },
    Action {
        rule_index: usize,
        action_index: Option<usize>,
        ctx_dependent: bool,
    },
    Set(Arc<IntervalSet>),
    NotSet(Arc<IntervalSet>),
    Wildcard,
    Precedence {
        precedence: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub target: usize,
    pub kind: TransitionKind,
}

impl Transition {
    pub fn new(target: usize, kind: TransitionKind) -> Self {
        Transition { target, kind }
    }

    pub fn epsilon(target: usize) -> Self {
        Self::new(
            target,
            TransitionKind::Epsilon {
                outermost_precedence_return: None,
            },
        )
    }

    /// True for transitions that do not consume input.
    pub fn is_epsilon(&self) -> bool {
        matches!(
            self.kind,
            TransitionKind::Epsilon { .. }
                | TransitionKind::Rule { .. }
                | TransitionKind::Predicate { .. }
                | TransitionKind::Action { .. }
                | TransitionKind::Precedence { .. }
        )
    }

    /// Does `symbol` follow this edge? Inverted sets and wildcards are
    /// evaluated over `[min, max]`.
    pub fn matches(&self, symbol: i32, min: i32, max: i32) -> bool {
        match &self.kind {
            TransitionKind::Atom { label } => *label == symbol,
            TransitionKind::Range { from, to } => *from <= symbol && symbol <= *to,
            TransitionKind::Set(set) => set.contains(symbol),
            TransitionKind::NotSet(set) => {
                symbol >= min && symbol <= max && !set.contains(symbol)
            }
            TransitionKind::Wildcard => symbol >= min && symbol <= max,
            _ => false,
        }
    }

    /// Symbols this edge consumes, for consuming transitions other than
    /// wildcard.
    pub fn label(&self) -> Option<IntervalSet> {
        match &self.kind {
            TransitionKind::Atom { label } => Some(IntervalSet::of(*label)),
            TransitionKind::Range { from, to } => Some(IntervalSet::of_range(*from, *to)),
            TransitionKind::Set(set) | TransitionKind::NotSet(set) => Some((**set).clone()),
            _ => None,
        }
    }

    pub fn serialization_type(&self) -> u16 {
        match self.kind {
            TransitionKind::Epsilon { .. } => EPSILON,
            TransitionKind::Range { .. } => RANGE,
            TransitionKind::Rule { .. } => RULE,
            TransitionKind::Predicate { .. } => PREDICATE,
            TransitionKind::Atom { .. } => ATOM,
            TransitionKind::Action { .. } => ACTION,
            TransitionKind::Set(_) => SET,
            TransitionKind::NotSet(_) => NOT_SET,
            TransitionKind::Wildcard => WILDCARD,
            TransitionKind::Precedence { .. } => PRECEDENCE,
        }
    }

    pub fn is_eof_label(&self) -> bool {
        match self.kind {
            TransitionKind::Atom { label } => label == token::EOF,
            TransitionKind::Range { from, .. } => from == token::EOF,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_set_respects_vocabulary() {
        let t = Transition::new(
            1,
            TransitionKind::NotSet(Arc::new(IntervalSet::of_range(3, 4))),
        );
        assert!(t.matches(2, 1, 10));
        assert!(!t.matches(3, 1, 10));
        assert!(!t.matches(11, 1, 10));
        assert!(!t.matches(token::EOF, 1, 10));
        assert!(!t.is_epsilon());
        assert!(Transition::epsilon(2).is_epsilon());
    }
}

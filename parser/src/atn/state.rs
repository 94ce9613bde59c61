use std::sync::OnceLock;

use super::{IntervalSet, Transition};

pub const INVALID: u16 = 0;
pub const BASIC: u16 = 1;
pub const RULE_START: u16 = 2;
pub const BLOCK_START: u16 = 3;
pub const PLUS_BLOCK_START: u16 = 4;
pub const STAR_BLOCK_START: u16 = 5;
pub const TOKEN_START: u16 = 6;
pub const RULE_STOP: u16 = 7;
pub const BLOCK_END: u16 = 8;
pub const STAR_LOOP_BACK: u16 = 9;
pub const STAR_LOOP_ENTRY: u16 = 10;
pub const PLUS_LOOP_BACK: u16 = 11;
pub const LOOP_END: u16 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Basic,
    Plus,
    Star,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateKind {
    /// Placeholder for a state number the encoding left unused.
    Invalid,
    Basic,
    RuleStart {
        stop_state: usize,
        left_recursive: bool,
    },
    BlockStart {
        block: BlockKind,
        end_state: usize,
    },
    BlockEnd {
        start_state: usize,
    },
    /// Lexer mode entry; one alternative per token rule of the mode.
    TokenStart,
    RuleStop,
    StarLoopBack,
    StarLoopEntry {
        loop_back_state: usize,
        /// Loop of a left-recursive rule whose exit leads straight to the
        /// rule stop state.
        precedence_decision: bool,
    },
    PlusLoopBack,
    LoopEnd {
        loop_back_state: usize,
    },
}

impl StateKind {
    pub fn serialization_type(&self) -> u16 {
        match self {
            StateKind::Invalid => INVALID,
            StateKind::Basic => BASIC,
            StateKind::RuleStart { .. } => RULE_START,
            StateKind::BlockStart { block, .. } => match block {
                BlockKind::Basic => BLOCK_START,
                BlockKind::Plus => PLUS_BLOCK_START,
                BlockKind::Star => STAR_BLOCK_START,
            },
            StateKind::BlockEnd { .. } => BLOCK_END,
            StateKind::TokenStart => TOKEN_START,
            StateKind::RuleStop => RULE_STOP,
            StateKind::StarLoopBack => STAR_LOOP_BACK,
            StateKind::StarLoopEntry { .. } => STAR_LOOP_ENTRY,
            StateKind::PlusLoopBack => PLUS_LOOP_BACK,
            StateKind::LoopEnd { .. } => LOOP_END,
        }
    }

    /// Kinds that may own a decision number.
    pub fn is_decision_kind(&self) -> bool {
        matches!(
            self,
            StateKind::BlockStart { .. }
                | StateKind::StarLoopEntry { .. }
                | StateKind::PlusLoopBack
                | StateKind::TokenStart
        )
    }
}

#[derive(Debug)]
pub struct AtnState {
    pub state_number: usize,
    pub rule_index: Option<usize>,
    pub kind: StateKind,
    pub transitions: Vec<Transition>,
    /// Every outgoing edge is non-consuming. False for a state with no
    /// edges at all.
    pub epsilon_only_transitions: bool,
    pub decision: Option<usize>,
    pub non_greedy: bool,
    pub(crate) next_tokens_within_rule: OnceLock<IntervalSet>,
}

impl AtnState {
    pub fn new(state_number: usize, rule_index: Option<usize>, kind: StateKind) -> Self {
        AtnState {
            state_number,
            rule_index,
            kind,
            transitions: vec![],
            epsilon_only_transitions: false,
            decision: None,
            non_greedy: false,
            next_tokens_within_rule: OnceLock::new(),
        }
    }

    pub fn add_transition(&mut self, t: Transition) {
        self.transitions.push(t);
        self.update_epsilon_only();
    }

    pub fn insert_transition(&mut self, idx: usize, t: Transition) {
        self.transitions.insert(idx, t);
        self.update_epsilon_only();
    }

    pub(crate) fn update_epsilon_only(&mut self) {
        self.epsilon_only_transitions =
            !self.transitions.is_empty() && self.transitions.iter().all(|t| t.is_epsilon());
    }

    pub fn is_rule_stop(&self) -> bool {
        matches!(self.kind, StateKind::RuleStop)
    }

    pub fn is_decision_state(&self) -> bool {
        self.kind.is_decision_kind()
    }

    pub fn is_left_recursive_rule_start(&self) -> bool {
        matches!(
            self.kind,
            StateKind::RuleStart {
                left_recursive: true,
                ..
            }
        )
    }
}

impl Clone for AtnState {
    fn clone(&self) -> Self {
        AtnState {
            state_number: self.state_number,
            rule_index: self.rule_index,
            kind: self.kind.clone(),
            transitions: self.transitions.clone(),
            epsilon_only_transitions: self.epsilon_only_transitions,
            decision: self.decision,
            non_greedy: self.non_greedy,
            next_tokens_within_rule: OnceLock::new(),
        }
    }
}

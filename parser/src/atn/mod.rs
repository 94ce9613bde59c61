//! The automaton model: an immutable graph of states and transitions
//! compiled from a grammar, plus its encoding.

pub mod builder;
pub mod deserializer;
mod interval_set;
mod ll1;
pub mod serializer;
mod state;
mod transition;

use std::sync::Arc;

pub use crate::api::GrammarType;
pub use interval_set::IntervalSet;
pub use state::{AtnState, BlockKind, StateKind};
pub use transition::{Transition, TransitionKind};

pub mod state_types {
    pub use super::state::{
        BASIC, BLOCK_END, BLOCK_START, INVALID, LOOP_END, PLUS_BLOCK_START, PLUS_LOOP_BACK,
        RULE_START, RULE_STOP, STAR_BLOCK_START, STAR_LOOP_BACK, STAR_LOOP_ENTRY, TOKEN_START,
    };
}

pub mod transition_types {
    pub use super::transition::{
        ACTION, ATOM, EPSILON, NOT_SET, PRECEDENCE, PREDICATE, RANGE, RULE, SET, WILDCARD,
    };
}

use crate::{lexer::LexerAction, token};

/// A fully linked automaton. Read-only once built and safe to share
/// between recognizers on any thread.
#[derive(Debug, Clone)]
pub struct Atn {
    pub grammar_type: GrammarType,
    pub max_token_type: i32,
    pub states: Vec<AtnState>,
    pub decision_to_state: Vec<usize>,
    pub rule_to_start_state: Vec<usize>,
    pub rule_to_stop_state: Vec<usize>,
    /// Lexer only: token type produced by each rule.
    pub rule_to_token_type: Vec<i32>,
    pub mode_to_start_state: Vec<usize>,
    pub lexer_actions: Vec<LexerAction>,
    /// Set literals shared by the set and not-set transitions that use them.
    pub sets: Vec<Arc<IntervalSet>>,
}

impl Atn {
    pub fn new(grammar_type: GrammarType, max_token_type: i32) -> Self {
        Atn {
            grammar_type,
            max_token_type,
            states: vec![],
            decision_to_state: vec![],
            rule_to_start_state: vec![],
            rule_to_stop_state: vec![],
            rule_to_token_type: vec![],
            mode_to_start_state: vec![],
            lexer_actions: vec![],
            sets: vec![],
        }
    }

    /// Decodes a serialized automaton with structural verification on.
    pub fn deserialize(data: &[u16]) -> anyhow::Result<Atn> {
        deserializer::AtnDeserializer::new().deserialize(data)
    }

    pub fn add_state(&mut self, rule_index: Option<usize>, kind: StateKind) -> usize {
        let n = self.states.len();
        self.states.push(AtnState::new(n, rule_index, kind));
        n
    }

    /// Assigns the next decision number to `state`.
    pub fn define_decision_state(&mut self, state: usize) -> usize {
        let d = self.decision_to_state.len();
        self.decision_to_state.push(state);
        self.states[state].decision = Some(d);
        d
    }

    pub fn state(&self, n: usize) -> &AtnState {
        &self.states[n]
    }

    pub fn decision_state(&self, decision: usize) -> &AtnState {
        &self.states[self.decision_to_state[decision]]
    }

    pub fn num_decisions(&self) -> usize {
        self.decision_to_state.len()
    }

    pub fn num_rules(&self) -> usize {
        self.rule_to_start_state.len()
    }

    pub fn is_lexer(&self) -> bool {
        self.grammar_type == GrammarType::Lexer
    }

    /// Tokens that can follow `state` without leaving its rule; contains
    /// `token::EPSILON` when the end of the rule is reachable. Computed
    /// once per state.
    pub fn next_tokens(&self, state: usize) -> &IntervalSet {
        self.states[state]
            .next_tokens_within_rule
            .get_or_init(|| ll1::look(self, state, None, None))
    }

    /// Tokens that can follow `state` given the exact call stack (invoking
    /// states, outermost first). Reaching the bottom of the stack adds EOF.
    pub fn next_tokens_in_context(&self, state: usize, call_stack: &[usize]) -> IntervalSet {
        ll1::look(self, state, None, Some(self.follow_states(call_stack)))
    }

    /// Tokens the parser could accept at `state`, following invoking states
    /// outward while the end of the current rule is reachable.
    pub fn expected_tokens(&self, state: usize, call_stack: &[usize]) -> IntervalSet {
        let mut following = self.next_tokens(state).clone();
        if !following.contains(token::EPSILON) {
            return following;
        }
        let mut expected = following.clone();
        expected.remove(token::EPSILON);
        for &invoking in call_stack.iter().rev() {
            if !following.contains(token::EPSILON) {
                break;
            }
            let follow_state = match self.follow_state_of(invoking) {
                Some(s) => s,
                None => break,
            };
            following = self.next_tokens(follow_state).clone();
            expected.add_set(&following);
            expected.remove(token::EPSILON);
        }
        if following.contains(token::EPSILON) {
            expected.add(token::EOF);
        }
        expected
    }

    /// Follow state of the rule transition leaving `invoking_state`.
    pub fn follow_state_of(&self, invoking_state: usize) -> Option<usize> {
        match self.states[invoking_state].transitions.first().map(|t| &t.kind) {
            Some(TransitionKind::Rule { follow_state, .. }) => Some(*follow_state),
            _ => None,
        }
    }

    fn follow_states(&self, call_stack: &[usize]) -> Vec<usize> {
        call_stack
            .iter()
            .filter_map(|&s| self.follow_state_of(s))
            .collect()
    }
}

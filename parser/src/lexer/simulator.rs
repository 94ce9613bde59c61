use std::sync::Arc;

use super::{CharStream, LexerActionExecutor, LexerHooks};
use crate::{
    api::SimulatorStats,
    atn::{Atn, Transition, TransitionKind},
    context::{AtnConfig, ConfigSet, PredictionContext, EMPTY_RETURN_STATE, INVALID_ALT},
    dfa::{DfaCache, DfaState, Edge, LEXER_DFA_EDGES},
    error::RecognitionError,
    token, trace,
};

pub const MIN_CHAR_VALUE: i32 = 0;
pub const MAX_CHAR_VALUE: i32 = 0x10FFFF;

/// The token a successful match produced, together with the actions of the
/// rule that matched it, still to be run.
#[derive(Debug, Clone)]
pub struct LexerMatch {
    pub ttype: i32,
    pub executor: Option<Arc<LexerActionExecutor>>,
}

/// Last accept state seen while scanning, with the input position just
/// past it.
struct SimState {
    index: usize,
    line: usize,
    column: usize,
    dfa_state: Arc<DfaState>,
}

/// Finds the longest token at the current input position, preferring the
/// rule declared first on ties.
pub struct LexerAtnSimulator {
    atn: Arc<Atn>,
    cache: Arc<DfaCache>,
    start_index: usize,
    line: usize,
    column: usize,
    mode: usize,
    prev_accept: Option<SimState>,
    stats: SimulatorStats,
}

impl LexerAtnSimulator {
    pub fn new(atn: Arc<Atn>, cache: Arc<DfaCache>) -> Self {
        LexerAtnSimulator {
            atn,
            cache,
            start_index: 0,
            line: 1,
            column: 0,
            mode: 0,
            prev_accept: None,
            stats: SimulatorStats::default(),
        }
    }

    pub fn atn(&self) -> &Arc<Atn> {
        &self.atn
    }

    /// Line of the next character, starting at 1.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Column of the next character, starting at 0.
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn set_position(&mut self, line: usize, column: usize) {
        self.line = line;
        self.column = column;
    }

    /// Where the most recent match began.
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn stats(&self) -> &SimulatorStats {
        &self.stats
    }

    pub fn reset(&mut self) {
        self.prev_accept = None;
        self.start_index = 0;
        self.line = 1;
        self.column = 0;
        self.mode = 0;
    }

    /// Matches one token in `mode`. On success the input sits right after
    /// the token; on failure it sits where no rule could continue.
    pub fn match_token(
        &mut self,
        input: &mut dyn CharStream,
        mode: usize,
        hooks: &mut dyn LexerHooks,
    ) -> Result<LexerMatch, RecognitionError> {
        self.mode = mode;
        self.start_index = input.index();
        self.prev_accept = None;
        self.stats.tokens += 1;
        let cache = self.cache.clone();
        let dfa = cache.dfa(mode);
        let s0 = match dfa.s0() {
            Some(s0) => s0,
            None => {
                let start_state = self.atn.mode_to_start_state[mode];
                let s0_closure = self.compute_start_state(input, start_state, hooks);
                let suppress_edge = s0_closure.has_semantic_context;
                let next = self.add_dfa_state(s0_closure);
                if suppress_edge {
                    next
                } else {
                    dfa.set_s0(next)
                }
            }
        };
        trace!("lexer mode {} start at {}: s0={:?}", mode, self.start_index, s0);
        self.exec_atn(input, s0, hooks)
    }

    fn exec_atn(
        &mut self,
        input: &mut dyn CharStream,
        ds0: Arc<DfaState>,
        hooks: &mut dyn LexerHooks,
    ) -> Result<LexerMatch, RecognitionError> {
        if ds0.is_accept_state {
            self.capture_sim_state(input, &ds0);
        }
        let mut t = input.la(1);
        let mut s = ds0;
        loop {
            let target = match self.existing_target_state(&s, t) {
                Some(e) => {
                    self.stats.dfa_hits += 1;
                    e
                }
                None => {
                    self.stats.atn_fallbacks += 1;
                    self.compute_target_state(input, &s, t, hooks)
                }
            };
            let target = match target {
                Edge::Error => break,
                Edge::Target(target) => target,
            };
            // consume before capturing so the accept position is past the symbol
            if t != token::EOF {
                self.consume(input);
            }
            if target.is_accept_state {
                self.capture_sim_state(input, &target);
                if t == token::EOF {
                    break;
                }
            }
            t = input.la(1);
            s = target;
        }
        self.fail_or_accept(input, t)
    }

    fn existing_target_state(&self, s: &DfaState, t: i32) -> Option<Edge> {
        if !(0..LEXER_DFA_EDGES as i32).contains(&t) {
            return None;
        }
        s.edge(t as usize)
    }

    fn compute_target_state(
        &mut self,
        input: &mut dyn CharStream,
        s: &Arc<DfaState>,
        t: i32,
        hooks: &mut dyn LexerHooks,
    ) -> Edge {
        let mut reach = ConfigSet::new_ordered();
        self.get_reachable_config_set(input, &s.configs, &mut reach, t, hooks);
        if reach.is_empty() {
            if !reach.has_semantic_context {
                self.add_dfa_edge(s, t, Edge::Error);
            }
            return Edge::Error;
        }
        let suppress_edge = reach.has_semantic_context;
        reach.has_semantic_context = false;
        let to = Edge::Target(self.add_dfa_state(reach));
        if !suppress_edge {
            self.add_dfa_edge(s, t, to.clone());
        }
        to
    }

    fn add_dfa_edge(&self, from: &DfaState, t: i32, to: Edge) {
        if (0..LEXER_DFA_EDGES as i32).contains(&t) {
            trace!("EDGE {} upon {}", from.state_number, t);
            from.set_edge(t as usize, &to);
        }
    }

    /// Freezes `configs` into a DFA state. The first config sitting in a
    /// rule stop state decides the token, which is how the earliest
    /// declared rule wins ties.
    fn add_dfa_state(&self, configs: ConfigSet) -> Arc<DfaState> {
        let accept = configs
            .iter()
            .find(|c| self.atn.states[c.state].is_rule_stop())
            .map(|c| {
                let rule = self.atn.states[c.state].rule_index.unwrap_or(0);
                (
                    self.atn.rule_to_token_type[rule],
                    c.lexer_action_executor.clone(),
                )
            });
        let mut proposed = DfaState::new(configs, LEXER_DFA_EDGES);
        if let Some((ttype, executor)) = accept {
            proposed.is_accept_state = true;
            proposed.prediction = ttype;
            proposed.lexer_action_executor = executor;
        }
        self.cache
            .dfa(self.mode)
            .add_state(proposed, self.cache.contexts())
    }

    fn get_reachable_config_set(
        &mut self,
        input: &mut dyn CharStream,
        closure: &ConfigSet,
        reach: &mut ConfigSet,
        t: i32,
        hooks: &mut dyn LexerHooks,
    ) {
        // once an alt has reached an accept state, later configs of that alt
        // that went through a non-greedy block are dropped
        let mut skip_alt = INVALID_ALT;
        let atn = self.atn.clone();
        for c in closure {
            let current_alt_reached_accept_state = c.alt == skip_alt;
            if current_alt_reached_accept_state && c.passed_through_non_greedy {
                continue;
            }
            for trans in &atn.states[c.state].transitions {
                if !trans.matches(t, MIN_CHAR_VALUE, MAX_CHAR_VALUE) {
                    continue;
                }
                let executor = c
                    .lexer_action_executor
                    .as_ref()
                    .map(|e| e.fix_offset_before_match(input.index() - self.start_index));
                let mut next = self.config_at(c, trans.target);
                next.lexer_action_executor = executor;
                let treat_eof_as_epsilon = t == token::EOF;
                if self.closure(
                    input,
                    next,
                    reach,
                    current_alt_reached_accept_state,
                    true,
                    treat_eof_as_epsilon,
                    hooks,
                ) {
                    skip_alt = c.alt;
                    break;
                }
            }
        }
    }

    fn compute_start_state(
        &mut self,
        input: &mut dyn CharStream,
        p: usize,
        hooks: &mut dyn LexerHooks,
    ) -> ConfigSet {
        let mut configs = ConfigSet::new_ordered();
        let atn = self.atn.clone();
        for (i, t) in atn.states[p].transitions.iter().enumerate() {
            let mut c = AtnConfig::new(t.target, i + 1, PredictionContext::empty());
            c.passed_through_non_greedy = self.is_non_greedy_decision(t.target);
            self.closure(input, c, &mut configs, false, false, false, hooks);
        }
        configs
    }

    fn is_non_greedy_decision(&self, state: usize) -> bool {
        let s = &self.atn.states[state];
        s.is_decision_state() && s.non_greedy
    }

    /// `c` moved to `state`, remembering whether it entered a non-greedy
    /// decision on the way.
    fn config_at(&self, c: &AtnConfig, state: usize) -> AtnConfig {
        let mut next = c.with_state(state);
        next.passed_through_non_greedy = c.passed_through_non_greedy || self.is_non_greedy_decision(state);
        next
    }

    /// Adds the epsilon closure of `config` to `configs`. Returns true once
    /// the config's alternative can accept.
    #[allow(clippy::too_many_arguments)]
    fn closure(
        &mut self,
        input: &mut dyn CharStream,
        config: AtnConfig,
        configs: &mut ConfigSet,
        mut current_alt_reached_accept_state: bool,
        speculative: bool,
        treat_eof_as_epsilon: bool,
        hooks: &mut dyn LexerHooks,
    ) -> bool {
        let atn = self.atn.clone();
        let state = &atn.states[config.state];
        if state.is_rule_stop() {
            if config.context.has_empty_path() {
                if config.context.is_empty() {
                    configs.add(config, None);
                    return true;
                }
                configs.add(config.with_context(config.state, PredictionContext::empty()), None);
                current_alt_reached_accept_state = true;
            }
            if !config.context.is_empty() {
                let ctx = config.context.clone();
                for i in 0..ctx.len() {
                    let return_state = ctx.return_state(i);
                    if return_state == EMPTY_RETURN_STATE {
                        continue;
                    }
                    let parent = ctx
                        .parent(i)
                        .cloned()
                        .unwrap_or_else(PredictionContext::empty);
                    let c = config.with_context(return_state, parent);
                    current_alt_reached_accept_state = self.closure(
                        input,
                        c,
                        configs,
                        current_alt_reached_accept_state,
                        speculative,
                        treat_eof_as_epsilon,
                        hooks,
                    );
                }
            }
            return current_alt_reached_accept_state;
        }

        if !state.epsilon_only_transitions
            && (!current_alt_reached_accept_state || !config.passed_through_non_greedy)
        {
            configs.add(config.clone(), None);
        }

        for t in &state.transitions {
            if let Some(c) = self.get_epsilon_target(
                input,
                &config,
                t,
                configs,
                speculative,
                treat_eof_as_epsilon,
                hooks,
            ) {
                current_alt_reached_accept_state = self.closure(
                    input,
                    c,
                    configs,
                    current_alt_reached_accept_state,
                    speculative,
                    treat_eof_as_epsilon,
                    hooks,
                );
            }
        }
        current_alt_reached_accept_state
    }

    #[allow(clippy::too_many_arguments)]
    fn get_epsilon_target(
        &mut self,
        input: &mut dyn CharStream,
        config: &AtnConfig,
        t: &Transition,
        configs: &mut ConfigSet,
        speculative: bool,
        treat_eof_as_epsilon: bool,
        hooks: &mut dyn LexerHooks,
    ) -> Option<AtnConfig> {
        match &t.kind {
            TransitionKind::Rule { follow_state, .. } => {
                let ctx = config.context.push(*follow_state);
                let mut c = config.with_context(t.target, ctx);
                c.passed_through_non_greedy =
                    config.passed_through_non_greedy || self.is_non_greedy_decision(t.target);
                Some(c)
            }
            // rejected when the automaton was loaded
            TransitionKind::Precedence { .. } => None,
            TransitionKind::Predicate {
                rule_index,
                pred_index,
                ..
            } => {
                configs.has_semantic_context = true;
                if self.evaluate_predicate(input, *rule_index, *pred_index, speculative, hooks) {
                    Some(self.config_at(config, t.target))
                } else {
                    None
                }
            }
            TransitionKind::Action { action_index, .. } => {
                // actions run only when the path returns to the token rule
                // itself, not from inside a fragment invoked elsewhere
                let action = action_index.and_then(|i| self.atn.lexer_actions.get(i));
                match action {
                    Some(action) if config.context.has_empty_path() => {
                        let executor = LexerActionExecutor::append(
                            config.lexer_action_executor.as_ref(),
                            action.clone(),
                        );
                        let mut c = self.config_at(config, t.target);
                        c.lexer_action_executor = Some(executor);
                        Some(c)
                    }
                    _ => Some(self.config_at(config, t.target)),
                }
            }
            TransitionKind::Epsilon { .. } => Some(self.config_at(config, t.target)),
            TransitionKind::Atom { .. } | TransitionKind::Range { .. } | TransitionKind::Set(_) => {
                if treat_eof_as_epsilon && t.matches(token::EOF, MIN_CHAR_VALUE, MAX_CHAR_VALUE) {
                    Some(self.config_at(config, t.target))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Predicates seen while looking ahead are evaluated as if the current
    /// symbol had already been consumed; position is restored afterwards.
    fn evaluate_predicate(
        &mut self,
        input: &mut dyn CharStream,
        rule_index: usize,
        pred_index: usize,
        speculative: bool,
        hooks: &mut dyn LexerHooks,
    ) -> bool {
        if !speculative {
            return hooks.sempred(input, rule_index, pred_index);
        }
        let saved_line = self.line;
        let saved_column = self.column;
        let index = input.index();
        self.consume(input);
        let r = hooks.sempred(input, rule_index, pred_index);
        self.line = saved_line;
        self.column = saved_column;
        input.seek(index);
        r
    }

    fn capture_sim_state(&mut self, input: &dyn CharStream, dfa_state: &Arc<DfaState>) {
        self.prev_accept = Some(SimState {
            index: input.index(),
            line: self.line,
            column: self.column,
            dfa_state: dfa_state.clone(),
        });
    }

    fn fail_or_accept(
        &mut self,
        input: &mut dyn CharStream,
        t: i32,
    ) -> Result<LexerMatch, RecognitionError> {
        if let Some(prev) = self.prev_accept.take() {
            input.seek(prev.index);
            self.line = prev.line;
            self.column = prev.column;
            return Ok(LexerMatch {
                ttype: prev.dfa_state.prediction,
                executor: prev.dfa_state.lexer_action_executor.clone(),
            });
        }
        if t == token::EOF && input.index() == self.start_index {
            return Ok(LexerMatch {
                ttype: token::EOF,
                executor: None,
            });
        }
        Err(RecognitionError::NoViableToken {
            start_index: self.start_index,
            index: input.index(),
        })
    }

    /// Consumes one code point, keeping line and column current.
    pub fn consume(&mut self, input: &mut dyn CharStream) {
        let c = input.la(1);
        if c == '\n' as i32 {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        input.consume();
    }
}

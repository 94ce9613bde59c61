//! Adaptive LL(*) prediction.
//!
//! A decision is first predicted with local context only (SLL), walking and
//! extending the decision's DFA. When SLL hits a conflict that local
//! context cannot settle, prediction is retried with the full call stack
//! (LL) and the outcome is reported to the error listener: a context
//! sensitivity when LL found a unique alternative, an ambiguity otherwise.
//! Ambiguities resolve to the lowest conflicting alternative.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::TokenStream;
use crate::{
    api::{PredictionMode, SimulatorStats},
    atn::{Atn, Transition, TransitionKind},
    context::{
        AltSet, AtnConfig, ConfigSet, MergeCache, PredicateEvaluator, PredictionContext,
        SemanticContext, EMPTY_RETURN_STATE, INVALID_ALT,
    },
    debug,
    dfa::{Dfa, DfaCache, DfaState, Edge, PredPrediction},
    error::{ErrorListener, RecognitionError},
    token,
};

pub struct ParserAtnSimulator {
    atn: Arc<Atn>,
    cache: Arc<DfaCache>,
    pub mode: PredictionMode,
    stats: SimulatorStats,
}

impl ParserAtnSimulator {
    pub fn new(atn: Arc<Atn>, cache: Arc<DfaCache>, mode: PredictionMode) -> Self {
        ParserAtnSimulator {
            atn,
            cache,
            mode,
            stats: SimulatorStats::default(),
        }
    }

    pub fn atn(&self) -> &Arc<Atn> {
        &self.atn
    }

    pub fn cache(&self) -> &Arc<DfaCache> {
        &self.cache
    }

    pub fn stats(&self) -> &SimulatorStats {
        &self.stats
    }

    /// Picks the alternative of `decision` to take at the current input
    /// position. `call_stack` lists the invoking states of the rules in
    /// progress, outermost first; `precedence` is the precedence of the
    /// innermost left-recursive rule invocation. The input is left where
    /// it was.
    #[allow(clippy::too_many_arguments)]
    pub fn adaptive_predict(
        &mut self,
        input: &mut dyn TokenStream,
        decision: usize,
        call_stack: &[usize],
        preds: &mut dyn PredicateEvaluator,
        precedence: i32,
        listener: &dyn ErrorListener,
    ) -> Result<usize, RecognitionError> {
        let t0 = instant::Instant::now();
        self.stats.predictions += 1;
        let atn = self.atn.clone();
        let cache = self.cache.clone();
        let start_index = input.index();
        let res = {
            let mut run = Prediction {
                atn: &atn,
                dfa: cache.dfa(decision),
                cache: &cache,
                input: &mut *input,
                preds,
                listener,
                stats: &mut self.stats,
                mode: self.mode,
                start_index,
                outer_context: PredictionContext::from_call_stack(&atn, call_stack),
                merge_cache: MergeCache::default(),
                precedence,
            };
            run.predict()
        };
        input.seek(start_index);
        self.stats.compute_time_us += t0.elapsed().as_micros() as u64;
        res
    }
}

/// State of a single `adaptive_predict` call.
struct Prediction<'a> {
    atn: &'a Atn,
    dfa: &'a Dfa,
    cache: &'a DfaCache,
    input: &'a mut dyn TokenStream,
    preds: &'a mut dyn PredicateEvaluator,
    listener: &'a dyn ErrorListener,
    stats: &'a mut SimulatorStats,
    mode: PredictionMode,
    start_index: usize,
    /// Exact stack of the rule invocations in progress, used by
    /// full-context prediction.
    outer_context: PredictionContext,
    merge_cache: MergeCache,
    precedence: i32,
}

impl Prediction<'_> {
    fn predict(&mut self) -> Result<usize, RecognitionError> {
        let existing = if self.dfa.is_precedence_dfa() {
            self.dfa.precedence_start_state(self.precedence)
        } else {
            self.dfa.s0()
        };
        let s0 = match existing {
            Some(s0) => s0,
            None => {
                let s0_closure =
                    self.compute_start_state(self.dfa.atn_start_state, &PredictionContext::empty(), false);
                if self.dfa.is_precedence_dfa() {
                    let filtered = self.apply_precedence_filter(&s0_closure);
                    let s0 = self.add_dfa_state(self.new_dfa_state(filtered));
                    self.dfa.set_precedence_start_state(self.precedence, s0)
                } else {
                    let s0 = self.add_dfa_state(self.new_dfa_state(s0_closure));
                    self.dfa.set_s0(s0)
                }
            }
        };
        let alt = self.exec_atn(s0)?;
        debug!(
            "predict decision {} at {} => {}",
            self.dfa.decision, self.start_index, alt
        );
        Ok(alt)
    }

    fn new_dfa_state(&self, configs: ConfigSet) -> DfaState {
        DfaState::new(configs, self.dfa.num_edges())
    }

    fn add_dfa_state(&self, d: DfaState) -> Arc<DfaState> {
        self.dfa.add_state(d, self.cache.contexts())
    }

    fn exec_atn(&mut self, s0: Arc<DfaState>) -> Result<usize, RecognitionError> {
        let mut previous = s0;
        let mut t = self.input.la(1);
        loop {
            let d = match self.existing_target_state(&previous, t) {
                Some(e) => {
                    self.stats.dfa_hits += 1;
                    e
                }
                None => {
                    self.stats.atn_fallbacks += 1;
                    self.compute_target_state(&previous, t)
                }
            };
            let d = match d {
                Edge::Error => {
                    let err = self.no_viable_alt_error();
                    self.input.seek(self.start_index);
                    let alt = self.syn_valid_or_sem_invalid_alt_that_finished_entry_rule(
                        &previous.configs,
                    );
                    if alt != INVALID_ALT {
                        return Ok(alt);
                    }
                    return Err(self.report_no_viable_alt(err));
                }
                Edge::Target(d) => d,
            };

            if d.requires_full_context && self.mode != PredictionMode::Sll {
                let mut conflicting_alts = d.configs.conflicting_alts.clone();
                if let Some(predicates) = &d.predicates {
                    let conflict_index = self.input.index();
                    if conflict_index != self.start_index {
                        self.input.seek(self.start_index);
                    }
                    let alts = self.eval_predicates(predicates, true);
                    if alts.len() == 1 {
                        return Ok(alts.min().unwrap_or(INVALID_ALT));
                    }
                    conflicting_alts = Some(alts);
                    if conflict_index != self.start_index {
                        self.input.seek(conflict_index);
                    }
                }
                let outer = self.outer_context.clone();
                let s0_closure = self.compute_start_state(self.dfa.atn_start_state, &outer, true);
                self.stats.full_context_fallbacks += 1;
                self.listener.report_attempting_full_context(
                    self.dfa.decision,
                    self.start_index,
                    self.input.index(),
                    conflicting_alts.as_ref(),
                );
                return self.exec_atn_with_full_context(s0_closure);
            }

            if d.is_accept_state {
                let predicates = match &d.predicates {
                    None => return Ok(d.prediction as usize),
                    Some(p) => p,
                };
                self.input.seek(self.start_index);
                let alts = self.eval_predicates(predicates, true);
                return match alts.min() {
                    Some(alt) => Ok(alt),
                    None => {
                        let err = self.no_viable_alt_error();
                        Err(self.report_no_viable_alt(err))
                    }
                };
            }

            previous = d;
            if t != token::EOF {
                self.input.consume();
                t = self.input.la(1);
            }
        }
    }

    fn existing_target_state(&self, previous: &DfaState, t: i32) -> Option<Edge> {
        if t < -1 || t > self.atn.max_token_type {
            return None;
        }
        previous.edge((t + 1) as usize)
    }

    fn compute_target_state(&mut self, previous: &Arc<DfaState>, t: i32) -> Edge {
        let reach = match self.compute_reach_set(&previous.configs, t, false) {
            Some(r) => r,
            None => {
                self.add_dfa_edge(previous, t, &Edge::Error);
                return Edge::Error;
            }
        };
        let mut d = self.new_dfa_state(reach);
        let predicted_alt = d.configs.unique_alt_of();
        if predicted_alt != INVALID_ALT {
            d.is_accept_state = true;
            d.configs.unique_alt = predicted_alt;
            d.prediction = predicted_alt as i32;
        } else if has_sll_conflict_terminating_prediction(self.atn, self.mode, &d.configs) {
            let conflicting = union_of(&conflicting_alt_subsets(&d.configs));
            d.requires_full_context = true;
            d.is_accept_state = true;
            d.prediction = conflicting.min().unwrap_or(INVALID_ALT) as i32;
            d.configs.conflicting_alts = Some(conflicting);
        }
        if d.is_accept_state && d.configs.has_semantic_context {
            self.predicate_dfa_state(&mut d);
            if d.predicates.is_some() {
                d.prediction = INVALID_ALT as i32;
            }
        }
        let d = self.add_dfa_state(d);
        let edge = Edge::Target(d);
        self.add_dfa_edge(previous, t, &edge);
        edge
    }

    fn add_dfa_edge(&self, from: &DfaState, t: i32, to: &Edge) {
        if t < -1 || t > self.atn.max_token_type {
            return;
        }
        from.set_edge((t + 1) as usize, to);
    }

    fn predicate_dfa_state(&mut self, d: &mut DfaState) {
        let decision_state = self.atn.decision_state(self.dfa.decision);
        let nalts = decision_state.transitions.len();
        let alts = if d.configs.unique_alt != INVALID_ALT {
            AltSet::of(d.configs.unique_alt)
        } else {
            d.configs.conflicting_alts.clone().unwrap_or_default()
        };
        match preds_for_ambig_alts(&alts, &d.configs, nalts) {
            Some(alt_to_pred) => {
                d.predicates = predicate_predictions(&alts, &alt_to_pred);
                d.prediction = INVALID_ALT as i32;
            }
            None => d.prediction = alts.min().unwrap_or(INVALID_ALT) as i32,
        }
    }

    /// Evaluates predicate/alternative pairs in order. Without `complete`
    /// evaluation stops at the first success.
    fn eval_predicates(&mut self, predicates: &[PredPrediction], complete: bool) -> AltSet {
        let mut predictions = AltSet::new();
        for pair in predicates {
            if pair.pred.is_none() || pair.pred.eval(&mut *self.preds) {
                predictions.insert(pair.alt);
                if !complete {
                    break;
                }
            }
        }
        predictions
    }

    fn exec_atn_with_full_context(&mut self, s0: ConfigSet) -> Result<usize, RecognitionError> {
        let mut found_exact_ambig = false;
        let mut previous = s0;
        self.input.seek(self.start_index);
        let mut t = self.input.la(1);
        let (reach, predicted_alt) = loop {
            let mut reach = match self.compute_reach_set(&previous, t, true) {
                Some(r) => r,
                None => {
                    let err = self.no_viable_alt_error();
                    self.input.seek(self.start_index);
                    let alt = self.syn_valid_or_sem_invalid_alt_that_finished_entry_rule(&previous);
                    if alt != INVALID_ALT {
                        return Ok(alt);
                    }
                    return Err(self.report_no_viable_alt(err));
                }
            };
            let alt_subsets = conflicting_alt_subsets(&reach);
            reach.unique_alt = reach.unique_alt_of();
            if reach.unique_alt != INVALID_ALT {
                let alt = reach.unique_alt;
                break (reach, alt);
            }
            if self.mode != PredictionMode::LlExactAmbigDetection {
                let alt = single_viable_alt(&alt_subsets);
                if alt != INVALID_ALT {
                    break (reach, alt);
                }
            } else if all_subsets_conflict(&alt_subsets) && all_subsets_equal(&alt_subsets) {
                found_exact_ambig = true;
                let alt = single_viable_alt(&alt_subsets);
                break (reach, alt);
            }
            previous = reach;
            if t != token::EOF {
                self.input.consume();
                t = self.input.la(1);
            }
        };

        let stop_index = self.input.index();
        if reach.unique_alt != INVALID_ALT {
            self.stats.context_sensitivities += 1;
            self.listener.report_context_sensitivity(
                self.dfa.decision,
                self.start_index,
                stop_index,
                predicted_alt,
            );
            return Ok(predicted_alt);
        }
        self.stats.ambiguities += 1;
        self.listener.report_ambiguity(
            self.dfa.decision,
            self.start_index,
            stop_index,
            found_exact_ambig,
            &reach.alts(),
        );
        Ok(predicted_alt)
    }

    fn compute_reach_set(&mut self, closure: &ConfigSet, t: i32, full_ctx: bool) -> Option<ConfigSet> {
        let mut intermediate = ConfigSet::new(full_ctx);
        let mut skipped_stop_states = vec![];
        for c in closure {
            let state = &self.atn.states[c.state];
            if state.is_rule_stop() {
                if full_ctx || t == token::EOF {
                    skipped_stop_states.push(c.clone());
                }
                continue;
            }
            for trans in &state.transitions {
                if trans.matches(t, 0, self.atn.max_token_type) {
                    intermediate.add(c.with_state(trans.target), Some(&mut self.merge_cache));
                }
            }
        }

        // skip closure when the intermediate set already decides
        let shortcut = skipped_stop_states.is_empty()
            && t != token::EOF
            && (intermediate.len() == 1 || intermediate.unique_alt_of() != INVALID_ALT);
        let (mut reach, reach_is_intermediate) = if shortcut {
            (intermediate, true)
        } else {
            let mut reach = ConfigSet::new(full_ctx);
            let mut busy = FxHashSet::default();
            let treat_eof_as_epsilon = t == token::EOF;
            for c in intermediate.iter() {
                self.closure(c.clone(), &mut reach, &mut busy, false, full_ctx, treat_eof_as_epsilon);
            }
            (reach, false)
        };

        if t == token::EOF {
            reach = self.remove_all_configs_not_in_rule_stop_state(reach, reach_is_intermediate);
        }

        if !skipped_stop_states.is_empty()
            && (!full_ctx || !has_config_in_rule_stop_state(self.atn, &reach))
        {
            for c in skipped_stop_states {
                reach.add(c, Some(&mut self.merge_cache));
            }
        }

        if reach.is_empty() {
            None
        } else {
            Some(reach)
        }
    }

    /// At EOF only configurations that finished their rule (or can finish
    /// it without consuming input, when `look_to_end_of_rule`) survive.
    fn remove_all_configs_not_in_rule_stop_state(
        &mut self,
        configs: ConfigSet,
        look_to_end_of_rule: bool,
    ) -> ConfigSet {
        if all_configs_in_rule_stop_states(self.atn, &configs) {
            return configs;
        }
        let mut result = ConfigSet::new(configs.full_ctx);
        for c in &configs {
            let state = &self.atn.states[c.state];
            if state.is_rule_stop() {
                result.add(c.clone(), Some(&mut self.merge_cache));
                continue;
            }
            if look_to_end_of_rule && state.epsilon_only_transitions {
                let next = self.atn.next_tokens(c.state);
                if next.contains(token::EPSILON) {
                    if let Some(rule) = state.rule_index {
                        let end = self.atn.rule_to_stop_state[rule];
                        result.add(c.with_state(end), Some(&mut self.merge_cache));
                    }
                }
            }
        }
        result
    }

    fn compute_start_state(&mut self, p: usize, ctx: &PredictionContext, full_ctx: bool) -> ConfigSet {
        let mut configs = ConfigSet::new(full_ctx);
        let atn = self.atn;
        for (i, t) in atn.states[p].transitions.iter().enumerate() {
            let c = AtnConfig::new(t.target, i + 1, ctx.clone());
            let mut busy = FxHashSet::default();
            self.closure(c, &mut configs, &mut busy, true, full_ctx, false);
        }
        configs
    }

    /// Removes alternatives other than 1 that merely repeat what alternative
    /// 1 does in the same state and context, after resolving precedence
    /// predicates against the current precedence. This is what makes a
    /// left-recursive loop stop iterating at a lower precedence level.
    fn apply_precedence_filter(&mut self, configs: &ConfigSet) -> ConfigSet {
        let mut states_from_alt1: FxHashMap<usize, PredictionContext> = FxHashMap::default();
        let mut result = ConfigSet::new(configs.full_ctx);
        for c in configs.iter().filter(|c| c.alt == 1) {
            let updated = match c.semantic_context.eval_precedence(&mut *self.preds) {
                Some(u) => u,
                None => continue,
            };
            states_from_alt1.insert(c.state, c.context.clone());
            if updated != c.semantic_context {
                result.add(c.with_semantic_context(c.state, updated), Some(&mut self.merge_cache));
            } else {
                result.add(c.clone(), Some(&mut self.merge_cache));
            }
        }
        for c in configs.iter().filter(|c| c.alt != 1) {
            if !c.precedence_filter_suppressed {
                if let Some(ctx) = states_from_alt1.get(&c.state) {
                    if *ctx == c.context {
                        continue;
                    }
                }
            }
            result.add(c.clone(), Some(&mut self.merge_cache));
        }
        result
    }

    fn closure(
        &mut self,
        config: AtnConfig,
        configs: &mut ConfigSet,
        busy: &mut FxHashSet<AtnConfig>,
        collect_predicates: bool,
        full_ctx: bool,
        treat_eof_as_epsilon: bool,
    ) {
        self.closure_checking_stop_state(
            config,
            configs,
            busy,
            collect_predicates,
            full_ctx,
            0,
            treat_eof_as_epsilon,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn closure_checking_stop_state(
        &mut self,
        config: AtnConfig,
        configs: &mut ConfigSet,
        busy: &mut FxHashSet<AtnConfig>,
        collect_predicates: bool,
        full_ctx: bool,
        depth: i32,
        treat_eof_as_epsilon: bool,
    ) {
        if self.atn.states[config.state].is_rule_stop() {
            if !config.context.is_empty() {
                let ctx = config.context.clone();
                for i in 0..ctx.len() {
                    let return_state = ctx.return_state(i);
                    if return_state == EMPTY_RETURN_STATE {
                        if full_ctx {
                            configs.add(
                                config.with_context(config.state, PredictionContext::empty()),
                                Some(&mut self.merge_cache),
                            );
                        } else {
                            // no context info: chase follow links
                            self.closure_inner(
                                config.clone(),
                                configs,
                                busy,
                                collect_predicates,
                                full_ctx,
                                depth,
                                treat_eof_as_epsilon,
                            );
                        }
                        continue;
                    }
                    let parent = ctx
                        .parent(i)
                        .cloned()
                        .unwrap_or_else(PredictionContext::empty);
                    let c = config.returning_to(return_state, parent);
                    self.closure_checking_stop_state(
                        c,
                        configs,
                        busy,
                        collect_predicates,
                        full_ctx,
                        depth - 1,
                        treat_eof_as_epsilon,
                    );
                }
                return;
            } else if full_ctx {
                configs.add(config, Some(&mut self.merge_cache));
                return;
            }
        }
        self.closure_inner(
            config,
            configs,
            busy,
            collect_predicates,
            full_ctx,
            depth,
            treat_eof_as_epsilon,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn closure_inner(
        &mut self,
        config: AtnConfig,
        configs: &mut ConfigSet,
        busy: &mut FxHashSet<AtnConfig>,
        collect_predicates: bool,
        full_ctx: bool,
        depth: i32,
        treat_eof_as_epsilon: bool,
    ) {
        let atn = self.atn;
        let p = &atn.states[config.state];
        if !p.epsilon_only_transitions {
            configs.add(config.clone(), Some(&mut self.merge_cache));
        }
        let decision_rule = atn.states[self.dfa.atn_start_state].rule_index;
        for t in &p.transitions {
            let continue_collecting =
                !matches!(t.kind, TransitionKind::Action { .. }) && collect_predicates;
            let c = match self.epsilon_target(
                &config,
                t,
                continue_collecting,
                depth == 0,
                full_ctx,
                treat_eof_as_epsilon,
            ) {
                Some(c) => c,
                None => continue,
            };
            let mut c = c;
            let mut new_depth = depth;
            if p.is_rule_stop() {
                // fell off the end of the decision rule into an unknown caller
                if self.dfa.is_precedence_dfa() {
                    if let TransitionKind::Epsilon {
                        outermost_precedence_return: Some(rule),
                    } = t.kind
                    {
                        if Some(rule) == decision_rule {
                            c.precedence_filter_suppressed = true;
                        }
                    }
                }
                c.reaches_into_outer_context += 1;
                if !busy.insert(c.clone()) {
                    continue;
                }
                configs.dips_into_outer_context = true;
                new_depth -= 1;
            } else {
                if !t.is_epsilon() && !busy.insert(c.clone()) {
                    // EOF* and EOF+
                    continue;
                }
                if matches!(t.kind, TransitionKind::Rule { .. }) && new_depth >= 0 {
                    new_depth += 1;
                }
            }
            self.closure_checking_stop_state(
                c,
                configs,
                busy,
                continue_collecting,
                full_ctx,
                new_depth,
                treat_eof_as_epsilon,
            );
        }
    }

    fn epsilon_target(
        &mut self,
        config: &AtnConfig,
        t: &Transition,
        collect_predicates: bool,
        in_context: bool,
        full_ctx: bool,
        treat_eof_as_epsilon: bool,
    ) -> Option<AtnConfig> {
        match &t.kind {
            TransitionKind::Rule { follow_state, .. } => {
                let ctx = config.context.push(*follow_state);
                Some(config.with_context(t.target, ctx))
            }
            TransitionKind::Precedence { precedence } => self.predicate_target(
                config,
                t.target,
                SemanticContext::Precedence(*precedence),
                collect_predicates && in_context,
                full_ctx,
            ),
            TransitionKind::Predicate {
                rule_index,
                pred_index,
                ctx_dependent,
            } => self.predicate_target(
                config,
                t.target,
                SemanticContext::Predicate {
                    rule_index: *rule_index,
                    pred_index: *pred_index,
                    ctx_dependent: *ctx_dependent,
                },
                collect_predicates && (!*ctx_dependent || in_context),
                full_ctx,
            ),
            TransitionKind::Action { .. } | TransitionKind::Epsilon { .. } => {
                Some(config.with_state(t.target))
            }
            TransitionKind::Atom { .. } | TransitionKind::Range { .. } | TransitionKind::Set(_) => {
                if treat_eof_as_epsilon && t.matches(token::EOF, 0, 1) {
                    Some(config.with_state(t.target))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Crossing a predicate: in full-context mode it is evaluated on the
    /// spot, otherwise it is attached to the configuration.
    fn predicate_target(
        &mut self,
        config: &AtnConfig,
        target: usize,
        pred: SemanticContext,
        collect: bool,
        full_ctx: bool,
    ) -> Option<AtnConfig> {
        if !collect {
            return Some(config.with_state(target));
        }
        if full_ctx {
            let current = self.input.index();
            self.input.seek(self.start_index);
            let ok = pred.eval(&mut *self.preds);
            self.input.seek(current);
            return if ok {
                Some(config.with_state(target))
            } else {
                None
            };
        }
        let sem = SemanticContext::and(&config.semantic_context, &pred);
        Some(config.with_semantic_context(target, sem))
    }

    fn no_viable_alt_error(&self) -> RecognitionError {
        RecognitionError::NoViableAlt {
            decision: self.dfa.decision,
            start_index: self.start_index,
            offending_index: self.input.index(),
        }
    }

    /// Listeners only hear about failures that are actually returned.
    fn report_no_viable_alt(&self, err: RecognitionError) -> RecognitionError {
        if let RecognitionError::NoViableAlt {
            decision,
            start_index,
            offending_index,
        } = err
        {
            self.listener
                .report_no_viable_alt(decision, start_index, offending_index);
        }
        err
    }

    /// When prediction fails, prefer an alternative that already finished
    /// the decision's rule, so the caller gets a chance to report the
    /// error in a more sensible place. Semantically valid alternatives win
    /// over ones whose predicates failed.
    fn syn_valid_or_sem_invalid_alt_that_finished_entry_rule(&mut self, configs: &ConfigSet) -> usize {
        let mut sem_valid = vec![];
        let mut sem_invalid = vec![];
        for c in configs {
            if c.semantic_context.is_none() || c.semantic_context.eval(&mut *self.preds) {
                sem_valid.push(c);
            } else {
                sem_invalid.push(c);
            }
        }
        let alt = self.alt_that_finished_entry_rule(&sem_valid);
        if alt != INVALID_ALT {
            return alt;
        }
        self.alt_that_finished_entry_rule(&sem_invalid)
    }

    fn alt_that_finished_entry_rule(&self, configs: &[&AtnConfig]) -> usize {
        configs
            .iter()
            .filter(|c| {
                c.reaches_into_outer_context > 0
                    || (self.atn.states[c.state].is_rule_stop() && c.context.has_empty_path())
            })
            .map(|c| c.alt)
            .min()
            .unwrap_or(INVALID_ALT)
    }
}

/// Alternatives grouped by (state, context): configurations that could
/// continue identically whichever of these alternatives is chosen.
fn conflicting_alt_subsets(configs: &ConfigSet) -> Vec<AltSet> {
    let mut map: FxHashMap<(usize, PredictionContext), usize> = FxHashMap::default();
    let mut subsets: Vec<AltSet> = vec![];
    for c in configs {
        let idx = *map
            .entry((c.state, c.context.clone()))
            .or_insert_with(|| {
                subsets.push(AltSet::new());
                subsets.len() - 1
            });
        subsets[idx].insert(c.alt);
    }
    subsets
}

fn union_of(subsets: &[AltSet]) -> AltSet {
    let mut all = AltSet::new();
    for s in subsets {
        all.union_with(s);
    }
    all
}

fn has_conflicting_alt_set(subsets: &[AltSet]) -> bool {
    subsets.iter().any(|s| s.len() > 1)
}

fn all_subsets_conflict(subsets: &[AltSet]) -> bool {
    subsets.iter().all(|s| s.len() > 1)
}

fn all_subsets_equal(subsets: &[AltSet]) -> bool {
    match subsets.first() {
        Some(first) => subsets.iter().all(|s| s == first),
        None => true,
    }
}

/// The minimum alternative of every subset, if they all agree.
fn single_viable_alt(subsets: &[AltSet]) -> usize {
    let mut viable = AltSet::new();
    for s in subsets {
        if let Some(min) = s.min() {
            viable.insert(min);
            if viable.len() > 1 {
                return INVALID_ALT;
            }
        }
    }
    viable.min().unwrap_or(INVALID_ALT)
}

fn has_state_associated_with_one_alt(configs: &ConfigSet) -> bool {
    let mut by_state: FxHashMap<usize, AltSet> = FxHashMap::default();
    for c in configs {
        by_state.entry(c.state).or_default().insert(c.alt);
    }
    by_state.values().any(|alts| alts.len() == 1)
}

fn all_configs_in_rule_stop_states(atn: &Atn, configs: &ConfigSet) -> bool {
    configs.iter().all(|c| atn.states[c.state].is_rule_stop())
}

fn has_config_in_rule_stop_state(atn: &Atn, configs: &ConfigSet) -> bool {
    configs.iter().any(|c| atn.states[c.state].is_rule_stop())
}

/// SLL stops when every configuration finished the decision rule, or when
/// some (state, context) group conflicts and no state is claimed by a
/// single alternative anymore. Pure SLL ignores predicates here.
fn has_sll_conflict_terminating_prediction(
    atn: &Atn,
    mode: PredictionMode,
    configs: &ConfigSet,
) -> bool {
    if all_configs_in_rule_stop_states(atn, configs) {
        return true;
    }
    let stripped;
    let configs = if mode == PredictionMode::Sll && configs.has_semantic_context {
        let mut dup = ConfigSet::new(configs.full_ctx);
        for c in configs {
            dup.add(c.with_semantic_context(c.state, SemanticContext::None), None);
        }
        stripped = dup;
        &stripped
    } else {
        configs
    };
    let subsets = conflicting_alt_subsets(configs);
    has_conflicting_alt_set(&subsets) && !has_state_associated_with_one_alt(configs)
}

/// Predicate for each alternative in `ambig_alts` (index = alt), or `None`
/// if none of them is actually guarded.
fn preds_for_ambig_alts(
    ambig_alts: &AltSet,
    configs: &ConfigSet,
    nalts: usize,
) -> Option<Vec<SemanticContext>> {
    let mut alt_to_pred: Vec<Option<SemanticContext>> = vec![None; nalts + 1];
    for c in configs {
        if c.alt <= nalts && ambig_alts.contains(c.alt) {
            alt_to_pred[c.alt] = Some(match &alt_to_pred[c.alt] {
                None => c.semantic_context.clone(),
                Some(prev) => SemanticContext::or(prev, &c.semantic_context),
            });
        }
    }
    let alt_to_pred: Vec<SemanticContext> = alt_to_pred
        .into_iter()
        .map(|p| p.unwrap_or_default())
        .collect();
    let npred_alts = alt_to_pred[1..].iter().filter(|p| !p.is_none()).count();
    if npred_alts == 0 {
        None
    } else {
        Some(alt_to_pred)
    }
}

fn predicate_predictions(
    ambig_alts: &AltSet,
    alt_to_pred: &[SemanticContext],
) -> Option<Vec<PredPrediction>> {
    let mut pairs = vec![];
    let mut contains_predicate = false;
    for (alt, pred) in alt_to_pred.iter().enumerate().skip(1) {
        if ambig_alts.contains(alt) {
            pairs.push(PredPrediction {
                pred: pred.clone(),
                alt,
            });
        }
        if !pred.is_none() {
            contains_predicate = true;
        }
    }
    if contains_predicate {
        Some(pairs)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alts(v: &[usize]) -> AltSet {
        v.iter().copied().collect()
    }

    #[test]
    fn viable_alt_needs_agreement() {
        assert_eq!(single_viable_alt(&[alts(&[1, 2]), alts(&[1, 3])]), 1);
        assert_eq!(single_viable_alt(&[alts(&[1, 2]), alts(&[2, 3])]), INVALID_ALT);
        assert!(all_subsets_conflict(&[alts(&[1, 2]), alts(&[1, 2])]));
        assert!(all_subsets_equal(&[alts(&[1, 2]), alts(&[1, 2])]));
        assert!(!all_subsets_conflict(&[alts(&[1, 2]), alts(&[3])]));
    }

    #[test]
    fn subsets_group_by_state_and_context() {
        let mut configs = ConfigSet::new(false);
        let empty = PredictionContext::empty();
        configs.add(AtnConfig::new(5, 1, empty.clone()), None);
        configs.add(AtnConfig::new(5, 2, empty.clone()), None);
        configs.add(AtnConfig::new(6, 2, empty.push(9)), None);
        let subsets = conflicting_alt_subsets(&configs);
        assert_eq!(subsets.len(), 2);
        assert!(subsets.contains(&alts(&[1, 2])));
        assert!(has_conflicting_alt_set(&subsets));
        assert!(has_state_associated_with_one_alt(&configs));
    }
}

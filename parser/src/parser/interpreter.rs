use std::sync::Arc;

use anyhow::{anyhow, bail, Result};

use super::{
    simulator::ParserAtnSimulator,
    tree::{NodeId, ParseTree},
    TokenStream,
};
use crate::{
    api::{GrammarInfo, PredictionMode, SimulatorOptions, SimulatorStats},
    atn::{Atn, IntervalSet, StateKind, TransitionKind},
    context::PredicateEvaluator,
    dfa::DfaCache,
    error::{ConsoleErrorListener, ErrorListener, ProxyErrorListener, RecognitionError},
    infoln,
    token::{self, escape_whitespace, Token},
    Logger,
};

/// User code embedded in a parser grammar.
pub trait ParserHooks {
    fn sempred(&mut self, _rule_index: usize, _pred_index: usize) -> bool {
        true
    }

    fn action(&mut self, _rule_index: usize, _action_index: usize) {}
}

pub struct NoParserHooks;

impl ParserHooks for NoParserHooks {}

/// Bridges prediction-time predicate evaluation to the hooks and the
/// precedence of the rule invocation in progress.
struct Evaluator<'a> {
    hooks: &'a mut dyn ParserHooks,
    precedence: i32,
}

impl PredicateEvaluator for Evaluator<'_> {
    fn sempred(&mut self, rule_index: usize, pred_index: usize) -> bool {
        self.hooks.sempred(rule_index, pred_index)
    }

    fn precpred(&mut self, precedence: i32) -> bool {
        precedence >= self.precedence
    }
}

#[derive(Default)]
struct ErrorRecovery {
    /// Set after an error is reported; suppresses further reports until a
    /// token is matched.
    in_recovery: bool,
    last_error_index: Option<usize>,
    last_error_states: Vec<usize>,
}

/// Parses a token stream by walking the parser automaton directly, using
/// adaptive prediction at every decision. Produces a [`ParseTree`] and
/// reports and recovers from syntax errors.
pub struct ParserInterpreter<S: TokenStream> {
    atn: Arc<Atn>,
    info: Arc<GrammarInfo>,
    interp: ParserAtnSimulator,
    input: S,
    hooks: Box<dyn ParserHooks + Send>,
    listeners: ProxyErrorListener,
    tree: ParseTree,
    ctx: NodeId,
    state: usize,
    precedence_stack: Vec<i32>,
    /// Caller context and invoking state of each left-recursive rule in
    /// progress.
    parent_context_stack: Vec<(Option<NodeId>, Option<usize>)>,
    recovery: ErrorRecovery,
    build_parse_trees: bool,
    syntax_errors: usize,
    matched_eof: bool,
    pub logger: Logger,
}

impl<S: TokenStream> ParserInterpreter<S> {
    pub fn new(
        atn: Arc<Atn>,
        cache: Arc<DfaCache>,
        info: Arc<GrammarInfo>,
        input: S,
        options: &SimulatorOptions,
    ) -> Self {
        let mut listeners = ProxyErrorListener::default();
        listeners.add(Arc::new(ConsoleErrorListener));
        ParserInterpreter {
            interp: ParserAtnSimulator::new(atn.clone(), cache, options.prediction_mode),
            atn,
            info,
            input,
            hooks: Box::new(NoParserHooks),
            listeners,
            tree: ParseTree::new(),
            ctx: 0,
            state: 0,
            precedence_stack: vec![0],
            parent_context_stack: vec![],
            recovery: ErrorRecovery::default(),
            build_parse_trees: options.build_parse_trees,
            syntax_errors: 0,
            matched_eof: false,
            logger: Logger::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Box<dyn ParserHooks + Send>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn add_error_listener(&mut self, listener: Arc<dyn ErrorListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_error_listeners(&mut self) {
        self.listeners.clear();
    }

    pub fn set_prediction_mode(&mut self, mode: PredictionMode) {
        self.interp.mode = mode;
    }

    pub fn prediction_mode(&self) -> PredictionMode {
        self.interp.mode
    }

    pub fn input(&self) -> &S {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut S {
        &mut self.input
    }

    pub fn tree(&self) -> &ParseTree {
        &self.tree
    }

    pub fn info(&self) -> &GrammarInfo {
        &self.info
    }

    pub fn num_syntax_errors(&self) -> usize {
        self.syntax_errors
    }

    /// True once EOF has been matched explicitly by the grammar.
    pub fn matched_eof(&self) -> bool {
        self.matched_eof
    }

    pub fn stats(&self) -> &SimulatorStats {
        self.interp.stats()
    }

    /// LISP-style rendering of the subtree at `node`.
    pub fn to_string_tree(&self, node: NodeId) -> String {
        let text = |t: &Token| {
            if t.is_eof() {
                "<EOF>".to_string()
            } else {
                self.input.token_text(t)
            }
        };
        self.tree.to_string_tree(node, &self.info.rule_names, &text)
    }

    pub fn parse_rule(&mut self, rule_name: &str) -> Result<NodeId> {
        let idx = self
            .info
            .rule_index(rule_name)
            .ok_or_else(|| anyhow!("unknown rule {:?}", rule_name))?;
        self.parse(idx)
    }

    /// Parses the input starting with `start_rule` and returns the root of
    /// the tree. Syntax errors are reported to the listeners and recovered
    /// from; only a malformed automaton makes this fail.
    pub fn parse(&mut self, start_rule: usize) -> Result<NodeId> {
        if start_rule >= self.atn.num_rules() {
            bail!("unknown rule index {}", start_rule);
        }
        self.tree = ParseTree::new();
        self.precedence_stack = vec![0];
        self.parent_context_stack.clear();
        self.recovery = ErrorRecovery::default();
        self.syntax_errors = 0;
        self.matched_eof = false;

        let atn = self.atn.clone();
        let start_state = atn.rule_to_start_state[start_rule];
        let left_recursive = atn.states[start_state].is_left_recursive_rule_start();
        let root = self.tree.add_rule(start_rule, None, None);
        if left_recursive {
            self.enter_recursion_rule(root, start_state, 0);
        } else {
            self.enter_rule(root, start_state);
        }

        loop {
            let p = self.state;
            if atn.states[p].is_rule_stop() {
                if self.tree.node(self.ctx).invoking_state.is_none() {
                    let result = if left_recursive {
                        let result = self.ctx;
                        let (parent, _) = self
                            .parent_context_stack
                            .pop()
                            .ok_or_else(|| anyhow!("recursion context stack underflow"))?;
                        self.unroll_recursion_contexts(parent);
                        result
                    } else {
                        self.exit_rule();
                        root
                    };
                    infoln!(
                        self,
                        "parsed {} with {} syntax errors; {:?}",
                        self.info.rule_name(start_rule),
                        self.syntax_errors,
                        self.interp.stats()
                    );
                    return Ok(result);
                }
                self.visit_rule_stop_state(p)?;
                continue;
            }

            if let Err(e) = self.visit_state(p) {
                let rule = atn.states[p].rule_index.unwrap_or(0);
                self.state = atn.rule_to_stop_state[rule];
                self.report_error(&e);
                self.recover(&e);
            }
        }
    }

    fn visit_state(&mut self, p: usize) -> Result<(), RecognitionError> {
        let atn = self.atn.clone();
        let state = &atn.states[p];
        let alt = if state.is_decision_state() {
            self.visit_decision_state(p)?
        } else {
            1
        };
        let t = match state.transitions.get(alt - 1) {
            Some(t) => t,
            None => {
                return Err(RecognitionError::NoViableAlt {
                    decision: state.decision.unwrap_or(0),
                    start_index: self.input.index(),
                    offending_index: self.input.index(),
                })
            }
        };

        match &t.kind {
            TransitionKind::Epsilon { .. } => {
                let enters_loop = matches!(
                    state.kind,
                    StateKind::StarLoopEntry {
                        precedence_decision: true,
                        ..
                    }
                ) && !matches!(atn.states[t.target].kind, StateKind::LoopEnd { .. });
                if enters_loop {
                    // another iteration of a left-recursive rule: the tree
                    // built so far becomes the first child of a new context
                    let (parent, invoking) = self
                        .parent_context_stack
                        .last()
                        .copied()
                        .unwrap_or((None, None));
                    let rule = self.tree.rule_index(self.ctx).unwrap_or(0);
                    let localctx = self.tree.add_rule(rule, parent, invoking);
                    let rule_start = atn.rule_to_start_state[state.rule_index.unwrap_or(rule)];
                    self.push_new_recursion_context(localctx, rule_start);
                }
            }
            TransitionKind::Atom { label } => self.match_token(*label)?,
            TransitionKind::Range { .. } | TransitionKind::Set(_) | TransitionKind::NotSet(_) => {
                let la = self.input.la(1);
                if t.matches(la, token::MIN_USER_TOKEN_TYPE, atn.max_token_type) {
                    self.report_match();
                    self.consume();
                } else {
                    self.recover_inline_into_tree()?;
                }
            }
            TransitionKind::Wildcard => self.match_wildcard()?,
            TransitionKind::Rule {
                rule_index,
                precedence,
                ..
            } => {
                let newctx = self.tree.add_rule(*rule_index, Some(self.ctx), Some(p));
                if atn.states[t.target].is_left_recursive_rule_start() {
                    self.enter_recursion_rule(newctx, t.target, *precedence);
                } else {
                    self.enter_rule(newctx, t.target);
                }
            }
            TransitionKind::Predicate {
                rule_index,
                pred_index,
                ..
            } => {
                if !self.hooks.sempred(*rule_index, *pred_index) {
                    return Err(RecognitionError::FailedPredicate {
                        rule_index: *rule_index,
                        predicate: format!("sempred({}, {})", rule_index, pred_index),
                    });
                }
            }
            TransitionKind::Action {
                rule_index,
                action_index,
                ..
            } => {
                if let Some(a) = action_index {
                    self.hooks.action(*rule_index, *a);
                }
            }
            TransitionKind::Precedence { precedence } => {
                if !self.precpred(*precedence) {
                    return Err(RecognitionError::FailedPredicate {
                        rule_index: state.rule_index.unwrap_or(0),
                        predicate: format!("precpred(_ctx, {})", precedence),
                    });
                }
            }
        }

        self.state = t.target;
        Ok(())
    }

    fn visit_decision_state(&mut self, p: usize) -> Result<usize, RecognitionError> {
        let state = &self.atn.states[p];
        if state.transitions.len() <= 1 {
            return Ok(1);
        }
        let decision = match state.decision {
            Some(d) => d,
            None => return Ok(1),
        };
        self.sync()?;
        let call_stack = self.call_stack();
        let precedence = self.precedence();
        let mut ev = Evaluator {
            hooks: &mut *self.hooks,
            precedence,
        };
        self.interp.adaptive_predict(
            &mut self.input,
            decision,
            &call_stack,
            &mut ev,
            precedence,
            &self.listeners,
        )
    }

    fn visit_rule_stop_state(&mut self, p: usize) -> Result<()> {
        let atn = self.atn.clone();
        let rule = atn.states[p]
            .rule_index
            .ok_or_else(|| anyhow!("rule stop state {} without a rule", p))?;
        let rule_start = atn.rule_to_start_state[rule];
        if atn.states[rule_start].is_left_recursive_rule_start() {
            let (parent, invoking) = self
                .parent_context_stack
                .pop()
                .ok_or_else(|| anyhow!("recursion context stack underflow"))?;
            self.unroll_recursion_contexts(parent);
            self.state = invoking.ok_or_else(|| anyhow!("left-recursive rule has no caller"))?;
        } else {
            self.exit_rule();
        }
        self.state = atn
            .follow_state_of(self.state)
            .ok_or_else(|| anyhow!("state {} does not invoke a rule", self.state))?;
        Ok(())
    }

    fn enter_rule(&mut self, node: NodeId, state: usize) {
        self.state = state;
        self.ctx = node;
        let start = self.token_index_at(1);
        self.tree.node_mut(node).start = start;
        if self.build_parse_trees {
            if let Some(parent) = self.tree.parent(node) {
                self.tree.add_child(parent, node);
            }
        }
    }

    fn exit_rule(&mut self) {
        let stop = self.token_index_at(-1);
        let node = self.tree.node_mut(self.ctx);
        node.stop = stop;
        let invoking = node.invoking_state;
        let parent = node.parent;
        if let Some(s) = invoking {
            self.state = s;
        }
        if let Some(p) = parent {
            self.ctx = p;
        }
    }

    fn enter_recursion_rule(&mut self, node: NodeId, state: usize, precedence: i32) {
        let n = self.tree.node(node);
        self.parent_context_stack.push((n.parent, n.invoking_state));
        self.state = state;
        self.precedence_stack.push(precedence);
        self.ctx = node;
        let start = self.token_index_at(1);
        self.tree.node_mut(node).start = start;
    }

    fn push_new_recursion_context(&mut self, localctx: NodeId, state: usize) {
        let previous = self.ctx;
        let stop = self.token_index_at(-1);
        let prev = self.tree.node_mut(previous);
        prev.parent = Some(localctx);
        prev.invoking_state = Some(state);
        prev.stop = stop;
        let start = prev.start;
        self.ctx = localctx;
        self.tree.node_mut(localctx).start = start;
        if self.build_parse_trees {
            self.tree.add_child(localctx, previous);
        }
    }

    fn unroll_recursion_contexts(&mut self, parent: Option<NodeId>) {
        self.precedence_stack.pop();
        let stop = self.token_index_at(-1);
        let retctx = self.ctx;
        self.tree.node_mut(retctx).stop = stop;
        self.tree.node_mut(retctx).parent = parent;
        if let Some(p) = parent {
            self.ctx = p;
            if self.build_parse_trees {
                self.tree.add_child(p, retctx);
            }
        }
    }

    fn precedence(&self) -> i32 {
        self.precedence_stack.last().copied().unwrap_or(-1)
    }

    fn precpred(&self, precedence: i32) -> bool {
        precedence >= self.precedence()
    }

    /// Invoking states of the rules in progress, outermost first.
    fn call_stack(&self) -> Vec<usize> {
        let mut stack = vec![];
        let mut node = self.ctx;
        while let Some(parent) = self.tree.parent(node) {
            if let Some(s) = self.tree.node(node).invoking_state {
                stack.push(s);
            }
            node = parent;
        }
        stack.reverse();
        stack
    }

    fn token_index_at(&mut self, k: isize) -> Option<usize> {
        self.input.lt(k).and_then(|t| t.index)
    }

    fn current_token(&mut self) -> Token {
        match self.input.lt(1) {
            Some(t) => t.clone(),
            None => Token {
                ttype: token::EOF,
                channel: token::DEFAULT_CHANNEL,
                span: 0..0,
                line: 0,
                column: 0,
                index: None,
                text: Some("<EOF>".to_string()),
            },
        }
    }

    fn consume(&mut self) {
        let o = self.current_token();
        if !o.is_eof() {
            self.input.consume();
        }
        if self.build_parse_trees {
            if self.recovery.in_recovery {
                self.tree.add_error(self.ctx, o);
            } else {
                self.tree.add_token(self.ctx, o);
            }
        }
    }

    fn match_token(&mut self, ttype: i32) -> Result<(), RecognitionError> {
        if self.input.la(1) == ttype {
            if ttype == token::EOF {
                self.matched_eof = true;
            }
            self.report_match();
            self.consume();
            Ok(())
        } else {
            self.recover_inline_into_tree()
        }
    }

    fn match_wildcard(&mut self) -> Result<(), RecognitionError> {
        if self.input.la(1) > 0 {
            self.report_match();
            self.consume();
            Ok(())
        } else {
            self.recover_inline_into_tree()
        }
    }

    fn recover_inline_into_tree(&mut self) -> Result<(), RecognitionError> {
        let t = self.recover_inline()?;
        if self.build_parse_trees && t.index.is_none() {
            self.tree.add_error(self.ctx, t);
        }
        Ok(())
    }

    // Error reporting and recovery

    fn expected_tokens(&self) -> IntervalSet {
        self.atn.expected_tokens(self.state, &self.call_stack())
    }

    fn expected_tokens_at(&self, state: usize) -> IntervalSet {
        self.atn.expected_tokens(state, &self.call_stack())
    }

    fn token_names(&self, set: &IntervalSet) -> String {
        set.to_string_with(|t| match t {
            token::EOF => "<EOF>".to_string(),
            token::EPSILON => "<EPSILON>".to_string(),
            t => self.info.display_name(t),
        })
    }

    fn token_error_display(&self, t: Option<&Token>) -> String {
        let t = match t {
            Some(t) => t,
            None => return "<no token>".to_string(),
        };
        let text = if t.is_eof() {
            "<EOF>".to_string()
        } else {
            match &t.text {
                Some(s) => s.clone(),
                None => self.input.token_text(t),
            }
        };
        format!("'{}'", escape_whitespace(&text))
    }

    fn begin_error_condition(&mut self) {
        self.recovery.in_recovery = true;
    }

    fn report_match(&mut self) {
        self.recovery.in_recovery = false;
        self.recovery.last_error_states.clear();
        self.recovery.last_error_index = None;
    }

    fn notify_error_listeners(
        &mut self,
        offending: Option<Token>,
        msg: &str,
        e: Option<&RecognitionError>,
    ) {
        self.syntax_errors += 1;
        let (line, column) = offending
            .as_ref()
            .map(|t| (t.line, t.column))
            .unwrap_or((0, 0));
        self.listeners
            .syntax_error(offending.as_ref(), line, column, msg, e);
    }

    fn report_error(&mut self, e: &RecognitionError) {
        if self.recovery.in_recovery {
            return;
        }
        self.begin_error_condition();
        let (offending, msg) = match e {
            RecognitionError::NoViableAlt {
                start_index,
                offending_index,
                ..
            } => {
                let starts_at_eof = self
                    .input
                    .get(*start_index)
                    .map(|t| t.is_eof())
                    .unwrap_or(true);
                let text = if starts_at_eof {
                    "<EOF>".to_string()
                } else {
                    self.input.text_between(*start_index, *offending_index)
                };
                (
                    self.input.get(*offending_index).cloned(),
                    format!(
                        "no viable alternative at input '{}'",
                        escape_whitespace(&text)
                    ),
                )
            }
            RecognitionError::InputMismatch {
                state,
                offending_index,
            } => {
                let offending = self.input.get(*offending_index).cloned();
                let expected = self.expected_tokens_at(*state);
                let msg = format!(
                    "mismatched input {} expecting {}",
                    self.token_error_display(offending.as_ref()),
                    self.token_names(&expected)
                );
                (offending, msg)
            }
            RecognitionError::FailedPredicate {
                rule_index,
                predicate,
            } => (
                Some(self.current_token()),
                format!(
                    "rule {} failed predicate: {{{}}}?",
                    self.info.rule_name(*rule_index),
                    predicate
                ),
            ),
            RecognitionError::NoViableToken { .. } => (Some(self.current_token()), e.message()),
        };
        self.notify_error_listeners(offending, &msg, Some(e));
    }

    /// Resynchronizes after `e` by skipping to a token that can follow one
    /// of the rules in progress. Adds an error node when nothing could be
    /// consumed.
    fn recover(&mut self, e: &RecognitionError) {
        let i = self.input.index();
        if self.recovery.last_error_index == Some(i)
            && self.recovery.last_error_states.contains(&self.state)
        {
            // same token, same state: we would loop forever without progress
            self.consume();
        }
        self.recovery.last_error_index = Some(self.input.index());
        self.recovery.last_error_states.push(self.state);
        let follow = self.error_recovery_set();
        self.consume_until(&follow);

        if self.input.index() == i && self.build_parse_trees {
            let tok = self.current_token();
            let ttype = match e {
                RecognitionError::InputMismatch { state, .. } => self
                    .expected_tokens_at(*state)
                    .min_element()
                    .unwrap_or(token::INVALID_TYPE),
                _ => token::INVALID_TYPE,
            };
            let err_token = Token {
                ttype,
                index: None,
                channel: token::DEFAULT_CHANNEL,
                ..tok
            };
            self.tree.add_error(self.ctx, err_token);
        }
    }

    /// Union of what can follow each rule invocation on the stack.
    fn error_recovery_set(&self) -> IntervalSet {
        let mut set = IntervalSet::new();
        for s in self.call_stack() {
            if let Some(follow) = self.atn.follow_state_of(s) {
                set.add_set(self.atn.next_tokens(follow));
            }
        }
        set.remove(token::EPSILON);
        set
    }

    fn consume_until(&mut self, set: &IntervalSet) {
        let mut ttype = self.input.la(1);
        while ttype != token::EOF && !set.contains(ttype) {
            self.consume();
            ttype = self.input.la(1);
        }
    }

    /// Called before predicting a decision: catches a bad token early by
    /// deleting it, or skips ahead at a loop back edge.
    fn sync(&mut self) -> Result<(), RecognitionError> {
        if self.recovery.in_recovery {
            return Ok(());
        }
        let atn = self.atn.clone();
        let la = self.input.la(1);
        let next = atn.next_tokens(self.state);
        if next.contains(la) || next.contains(token::EPSILON) {
            return Ok(());
        }
        match atn.states[self.state].kind {
            StateKind::BlockStart { .. } | StateKind::StarLoopEntry { .. } => {
                if self.single_token_deletion().is_some() {
                    return Ok(());
                }
                Err(RecognitionError::InputMismatch {
                    state: self.state,
                    offending_index: self.input.index(),
                })
            }
            StateKind::PlusLoopBack | StateKind::StarLoopBack => {
                self.report_unwanted_token();
                let mut follow = self.expected_tokens();
                follow.add_set(&self.error_recovery_set());
                self.consume_until(&follow);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Repairs a mismatched token in place: deletes one extraneous token or
    /// conjures up the missing one. Returns the token standing in for the
    /// expected one.
    fn recover_inline(&mut self) -> Result<Token, RecognitionError> {
        if let Some(matched) = self.single_token_deletion() {
            self.consume();
            return Ok(matched);
        }
        if self.single_token_insertion() {
            return Ok(self.missing_symbol());
        }
        Err(RecognitionError::InputMismatch {
            state: self.state,
            offending_index: self.input.index(),
        })
    }

    fn single_token_insertion(&mut self) -> bool {
        let current = self.input.la(1);
        let next = match self.atn.states[self.state].transitions.first() {
            Some(t) => t.target,
            None => return false,
        };
        let expecting = self.atn.next_tokens_in_context(next, &self.call_stack());
        if expecting.contains(current) {
            self.report_missing_token();
            return true;
        }
        false
    }

    fn single_token_deletion(&mut self) -> Option<Token> {
        let next_type = self.input.la(2);
        if self.expected_tokens().contains(next_type) {
            self.report_unwanted_token();
            self.consume();
            let matched = self.current_token();
            self.report_match();
            return Some(matched);
        }
        None
    }

    fn report_unwanted_token(&mut self) {
        if self.recovery.in_recovery {
            return;
        }
        self.begin_error_condition();
        let t = self.current_token();
        let msg = format!(
            "extraneous input {} expecting {}",
            self.token_error_display(Some(&t)),
            self.token_names(&self.expected_tokens())
        );
        self.notify_error_listeners(Some(t), &msg, None);
    }

    fn report_missing_token(&mut self) {
        if self.recovery.in_recovery {
            return;
        }
        self.begin_error_condition();
        let t = self.current_token();
        let msg = format!(
            "missing {} at {}",
            self.token_names(&self.expected_tokens()),
            self.token_error_display(Some(&t))
        );
        self.notify_error_listeners(Some(t), &msg, None);
    }

    fn missing_symbol(&mut self) -> Token {
        let expected = self
            .expected_tokens()
            .min_element()
            .unwrap_or(token::INVALID_TYPE);
        let text = if expected == token::EOF {
            "<missing EOF>".to_string()
        } else {
            format!("<missing {}>", self.info.display_name(expected))
        };
        let mut current = self.current_token();
        if current.is_eof() {
            if let Some(prev) = self.input.lt(-1) {
                current = prev.clone();
            }
        }
        Token {
            ttype: expected,
            channel: token::DEFAULT_CHANNEL,
            span: current.span.start..current.span.start,
            line: current.line,
            column: current.column,
            index: None,
            text: Some(text),
        }
    }
}

//! Turns a stream of code points into tokens by simulating the lexer
//! automaton, memoizing what it learns in the shared DFA cache.

mod actions;
mod char_stream;
mod simulator;

use std::{ops::Range, sync::Arc};

use anyhow::{bail, Result};

pub use actions::{LexerAction, LexerActionExecutor};
pub use char_stream::{CharStream, InputStream};
pub use simulator::{LexerAtnSimulator, LexerMatch, MAX_CHAR_VALUE, MIN_CHAR_VALUE};

use crate::{
    api::{GrammarInfo, SimulatorStats},
    atn::Atn,
    dfa::DfaCache,
    error::{ConsoleErrorListener, ErrorListener, ProxyErrorListener, RecognitionError},
    token::{self, escape_whitespace, CommonTokenFactory, Token, TokenFactory},
    warn, Logger,
};

/// Token type set by the `skip` command: drop the token and match again.
pub const SKIP: i32 = -3;
/// Token type set by the `more` command: keep the text and extend the token.
pub const MORE: i32 = -2;
pub const DEFAULT_MODE: usize = 0;

/// User code embedded in a lexer grammar.
pub trait LexerHooks {
    /// Evaluates predicate `pred_index` of `rule_index`. The input is
    /// positioned as if the current symbol had been consumed.
    fn sempred(&mut self, _input: &dyn CharStream, _rule_index: usize, _pred_index: usize) -> bool {
        true
    }

    /// Runs custom action `action_index` of `rule_index`, with the input
    /// positioned where the action appeared in the rule.
    fn action(
        &mut self,
        _state: &mut LexerState,
        _input: &dyn CharStream,
        _rule_index: usize,
        _action_index: usize,
    ) {
    }
}

/// Hooks for grammars without embedded code.
pub struct NoHooks;

impl LexerHooks for NoHooks {}

/// Mutable state of the token being built, visible to lexer actions.
#[derive(Debug, Clone)]
pub struct LexerState {
    pub ttype: i32,
    pub channel: i32,
    pub mode: usize,
    pub mode_stack: Vec<usize>,
    pub token_start_index: usize,
    pub token_start_line: usize,
    pub token_start_column: usize,
    /// Overrides the matched text when set.
    pub text: Option<String>,
}

impl Default for LexerState {
    fn default() -> Self {
        LexerState {
            ttype: token::INVALID_TYPE,
            channel: token::DEFAULT_CHANNEL,
            mode: DEFAULT_MODE,
            mode_stack: vec![],
            token_start_index: 0,
            token_start_line: 1,
            token_start_column: 0,
            text: None,
        }
    }
}

impl LexerState {
    pub fn skip(&mut self) {
        self.ttype = SKIP;
    }

    pub fn more(&mut self) {
        self.ttype = MORE;
    }

    pub fn set_type(&mut self, ttype: i32) {
        self.ttype = ttype;
    }

    pub fn set_channel(&mut self, channel: i32) {
        self.channel = channel;
    }

    pub fn set_mode(&mut self, mode: usize) {
        self.mode = mode;
    }

    pub fn push_mode(&mut self, mode: usize) {
        self.mode_stack.push(self.mode);
        self.mode = mode;
    }

    pub fn pop_mode(&mut self) -> Result<usize> {
        match self.mode_stack.pop() {
            Some(m) => {
                self.mode = m;
                Ok(m)
            }
            None => bail!("pop_mode with an empty mode stack"),
        }
    }
}

/// Anything that hands out tokens one at a time.
pub trait TokenSource {
    fn next_token(&mut self) -> Token;
    fn line(&self) -> usize;
    fn column(&self) -> usize;
    fn source_name(&self) -> &str;
    /// Source text of `span`, for tokens that do not carry their own text.
    fn text(&self, span: Range<usize>) -> Option<String>;
}

pub struct Lexer {
    interp: LexerAtnSimulator,
    input: Box<dyn CharStream + Send>,
    hooks: Box<dyn LexerHooks + Send>,
    factory: Box<dyn TokenFactory + Send>,
    listeners: ProxyErrorListener,
    state: LexerState,
    info: Arc<GrammarInfo>,
    hit_eof: bool,
    pub logger: Logger,
}

impl Lexer {
    pub fn new(
        atn: Arc<Atn>,
        cache: Arc<DfaCache>,
        info: Arc<GrammarInfo>,
        input: Box<dyn CharStream + Send>,
    ) -> Self {
        let mut listeners = ProxyErrorListener::default();
        listeners.add(Arc::new(ConsoleErrorListener));
        Lexer {
            interp: LexerAtnSimulator::new(atn, cache),
            input,
            hooks: Box::new(NoHooks),
            factory: Box::new(CommonTokenFactory::default()),
            listeners,
            state: LexerState::default(),
            info,
            hit_eof: false,
            logger: Logger::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Box<dyn LexerHooks + Send>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn set_token_factory(&mut self, factory: Box<dyn TokenFactory + Send>) {
        self.factory = factory;
    }

    pub fn add_error_listener(&mut self, listener: Arc<dyn ErrorListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_error_listeners(&mut self) {
        self.listeners.clear();
    }

    pub fn info(&self) -> &GrammarInfo {
        &self.info
    }

    pub fn state(&self) -> &LexerState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut LexerState {
        &mut self.state
    }

    pub fn stats(&self) -> &SimulatorStats {
        self.interp.stats()
    }

    /// Rewinds to the start of the input in the default mode.
    pub fn reset(&mut self) {
        self.input.seek(0);
        self.state = LexerState::default();
        self.hit_eof = false;
        self.interp.reset();
    }

    /// Produces the next token, skipping tokens dropped by `skip` and
    /// reporting (then stepping over) characters no rule matches. Returns
    /// an EOF token once the input is exhausted, and on every call after.
    pub fn next_token(&mut self) -> Token {
        'outer: loop {
            if self.hit_eof {
                return self.emit_eof();
            }
            self.state.channel = token::DEFAULT_CHANNEL;
            self.state.token_start_index = self.input.index();
            self.state.token_start_line = self.interp.line();
            self.state.token_start_column = self.interp.column();
            self.state.text = None;
            loop {
                self.state.ttype = token::INVALID_TYPE;
                let ttype = match self.interp.match_token(
                    &mut *self.input,
                    self.state.mode,
                    &mut *self.hooks,
                ) {
                    Ok(m) => {
                        if let Some(executor) = &m.executor {
                            let start = self.interp.start_index();
                            if let Err(e) = executor.execute(
                                &mut self.state,
                                &mut *self.hooks,
                                &mut *self.input,
                                start,
                            ) {
                                warn!(self, "lexer action failed: {}", e);
                            }
                        }
                        m.ttype
                    }
                    Err(e) => {
                        self.notify_listeners(&e);
                        self.recover();
                        SKIP
                    }
                };
                if self.input.la(1) == token::EOF {
                    self.hit_eof = true;
                }
                if self.state.ttype == token::INVALID_TYPE {
                    self.state.ttype = ttype;
                }
                if self.state.ttype == SKIP {
                    continue 'outer;
                }
                if self.state.ttype != MORE {
                    break;
                }
            }
            return self.emit();
        }
    }

    /// Every remaining token, EOF excluded.
    pub fn all_tokens(&mut self) -> Vec<Token> {
        let mut tokens = vec![];
        loop {
            let t = self.next_token();
            if t.is_eof() {
                break;
            }
            tokens.push(t);
        }
        tokens
    }

    /// Text matched so far for the current token, or the override set by
    /// an action.
    pub fn text(&self) -> String {
        match &self.state.text {
            Some(t) => t.clone(),
            None => self
                .input
                .text(self.state.token_start_index..self.input.index())
                .unwrap_or_default(),
        }
    }

    fn emit(&mut self) -> Token {
        let text = self.state.text.take();
        self.factory.create(
            &*self.input,
            self.state.ttype,
            text,
            self.state.channel,
            self.state.token_start_index..self.input.index(),
            self.state.token_start_line,
            self.state.token_start_column,
        )
    }

    fn emit_eof(&mut self) -> Token {
        let idx = self.input.index();
        self.factory.create(
            &*self.input,
            token::EOF,
            Some("<EOF>".to_string()),
            token::DEFAULT_CHANNEL,
            idx..idx,
            self.interp.line(),
            self.interp.column(),
        )
    }

    fn notify_listeners(&mut self, e: &RecognitionError) {
        let end = std::cmp::min(self.input.index() + 1, self.input.size());
        let text = self
            .input
            .text(self.state.token_start_index..end)
            .unwrap_or_default();
        let msg = format!("token recognition error at: '{}'", escape_whitespace(&text));
        self.listeners.syntax_error(
            None,
            self.state.token_start_line,
            self.state.token_start_column,
            &msg,
            Some(e),
        );
    }

    fn recover(&mut self) {
        if self.input.la(1) != token::EOF {
            self.interp.consume(&mut *self.input);
        }
    }
}

impl TokenSource for Lexer {
    fn next_token(&mut self) -> Token {
        Lexer::next_token(self)
    }

    fn line(&self) -> usize {
        self.interp.line()
    }

    fn column(&self) -> usize {
        self.interp.column()
    }

    fn source_name(&self) -> &str {
        self.input.source_name()
    }

    fn text(&self, span: Range<usize>) -> Option<String> {
        self.input.text(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_stack() {
        let mut s = LexerState::default();
        s.push_mode(2);
        s.push_mode(3);
        assert_eq!(s.mode, 3);
        assert_eq!(s.pop_mode().unwrap(), 2);
        assert_eq!(s.pop_mode().unwrap(), 0);
        assert!(s.pop_mode().is_err());
    }
}

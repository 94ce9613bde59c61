use std::sync::{Arc, Mutex};

use anyhow::{ensure, Result};

use crate::{
    api::{CompiledGrammar, GrammarInfo, SimulatorOptions},
    atn::{deserializer::AtnDeserializer, Atn},
    dfa::DfaCache,
    error::ErrorListener,
    lexer::{InputStream, Lexer, TokenSource},
    parser::{CommonTokenStream, ParserInterpreter, TokenStream},
    token::CommonTokenFactory,
    Logger,
};

/// Everything shared by the recognizers of one compiled grammar: the
/// decoded automaton, its metadata and the DFA cache every recognizer
/// created here contributes to.
pub struct RecognizerFactory {
    atn: Arc<Atn>,
    info: Arc<GrammarInfo>,
    cache: Mutex<Arc<DfaCache>>,
    options: SimulatorOptions,
    stderr_log_level: u32,
    buffer_log_level: u32,
    listeners: Vec<Arc<dyn ErrorListener>>,
}

impl RecognizerFactory {
    pub fn new(grammar: &CompiledGrammar) -> Result<Self> {
        Self::with_options(grammar, SimulatorOptions::default())
    }

    pub fn with_options(grammar: &CompiledGrammar, options: SimulatorOptions) -> Result<Self> {
        let atn = AtnDeserializer::with_verification(options.verify_atn)
            .deserialize(&grammar.serialized_atn)?;
        ensure!(
            atn.grammar_type == grammar.grammar_type,
            "grammar {} declares type {:?} but its automaton is {:?}",
            grammar.info.name,
            grammar.grammar_type,
            atn.grammar_type
        );
        let cache = Arc::new(DfaCache::new(&atn));
        Ok(RecognizerFactory {
            atn: Arc::new(atn),
            info: Arc::new(grammar.info.clone()),
            cache: Mutex::new(cache),
            options,
            stderr_log_level: 1,
            buffer_log_level: 0,
            listeners: vec![],
        })
    }

    pub fn atn(&self) -> &Arc<Atn> {
        &self.atn
    }

    pub fn info(&self) -> &Arc<GrammarInfo> {
        &self.info
    }

    pub fn options(&self) -> &SimulatorOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut SimulatorOptions {
        &mut self.options
    }

    pub fn quiet(&mut self) -> &mut Self {
        self.stderr_log_level = 0;
        self.buffer_log_level = 0;
        self
    }

    pub fn set_buffer_log_level(&mut self, level: u32) -> &mut Self {
        self.buffer_log_level = level;
        self
    }

    pub fn set_stderr_log_level(&mut self, level: u32) -> &mut Self {
        self.stderr_log_level = level;
        self
    }

    /// Listener attached to every recognizer created from now on, in
    /// addition to the console listener.
    pub fn add_error_listener(&mut self, listener: Arc<dyn ErrorListener>) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    pub fn dfa_cache(&self) -> Arc<DfaCache> {
        self.cache.lock().unwrap().clone()
    }

    /// Starts over with an empty DFA cache. Recognizers already created
    /// keep the cache they were given.
    pub fn clear_dfa(&self) {
        let fresh = Arc::new(DfaCache::new(&self.atn));
        *self.cache.lock().unwrap() = fresh;
    }

    fn logger(&self) -> Logger {
        Logger::new(self.buffer_log_level, self.stderr_log_level)
    }

    pub fn lexer(&self, input: &str) -> Result<Lexer> {
        ensure!(
            self.atn.is_lexer(),
            "{} is not a lexer grammar",
            self.info.name
        );
        let mut lexer = Lexer::new(
            self.atn.clone(),
            self.dfa_cache(),
            self.info.clone(),
            Box::new(InputStream::new(input)),
        );
        lexer.set_token_factory(Box::new(CommonTokenFactory::new(
            self.options.copy_token_text,
        )));
        if self.stderr_log_level == 0 {
            lexer.remove_error_listeners();
        }
        for l in &self.listeners {
            lexer.add_error_listener(l.clone());
        }
        lexer.logger = self.logger();
        Ok(lexer)
    }

    pub fn parser<S: TokenStream>(&self, input: S) -> Result<ParserInterpreter<S>> {
        ensure!(
            !self.atn.is_lexer(),
            "{} is not a parser grammar",
            self.info.name
        );
        let mut parser = ParserInterpreter::new(
            self.atn.clone(),
            self.dfa_cache(),
            self.info.clone(),
            input,
            &self.options,
        );
        if self.stderr_log_level == 0 {
            parser.remove_error_listeners();
        }
        for l in &self.listeners {
            parser.add_error_listener(l.clone());
        }
        parser.logger = self.logger();
        Ok(parser)
    }

    /// Parser over a buffered stream of the tokens `source` produces.
    pub fn parser_for<T: TokenSource>(
        &self,
        source: T,
    ) -> Result<ParserInterpreter<CommonTokenStream<T>>> {
        self.parser(CommonTokenStream::new(source))
    }
}

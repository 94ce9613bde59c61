use std::{
    fmt::{self, Display},
    sync::{Arc, Mutex},
};

use crate::{context::AltSet, token::Token};

/// Fatal problems with a compiled automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtnError {
    /// The encoding comes from an incompatible compiler generation.
    VersionMismatch { found: String, expected: String },
    /// Truncated or out-of-range data.
    Malformed(String),
}

impl Display for AtnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtnError::VersionMismatch { found, expected } => write!(
                f,
                "Could not deserialize ATN with {} (expected {}).",
                found, expected
            ),
            AtnError::Malformed(msg) => write!(f, "malformed ATN: {}", msg),
        }
    }
}

impl std::error::Error for AtnError {}

/// Recoverable recognition failures. The engine reports these and lets the
/// recognizer pick a recovery policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// No lexer rule matches at `start_index`; `index` is where the
    /// simulation gave up.
    NoViableToken { start_index: usize, index: usize },
    /// No alternative of `decision` survives the lookahead starting at
    /// token `start_index`.
    NoViableAlt {
        decision: usize,
        start_index: usize,
        offending_index: usize,
    },
    InputMismatch { state: usize, offending_index: usize },
    FailedPredicate {
        rule_index: usize,
        predicate: String,
    },
}

impl RecognitionError {
    pub fn message(&self) -> String {
        match self {
            RecognitionError::NoViableToken { start_index, index } => {
                format!("no viable token at {}..{}", start_index, index)
            }
            RecognitionError::NoViableAlt {
                decision,
                start_index,
                offending_index,
            } => format!(
                "no viable alternative for decision {} at tokens {}..{}",
                decision, start_index, offending_index
            ),
            RecognitionError::InputMismatch {
                state,
                offending_index,
            } => format!("mismatched input at token {} in state {}", offending_index, state),
            RecognitionError::FailedPredicate {
                rule_index,
                predicate,
            } => format!("failed predicate {} in rule {}", predicate, rule_index),
        }
    }
}

impl Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for RecognitionError {}

/// Receives syntax errors and prediction diagnostics. All methods default to
/// doing nothing. Token intervals are token stream indices, inclusive.
pub trait ErrorListener: Send + Sync {
    fn syntax_error(
        &self,
        _offending: Option<&Token>,
        _line: usize,
        _column: usize,
        _msg: &str,
        _error: Option<&RecognitionError>,
    ) {
    }

    fn report_ambiguity(
        &self,
        _decision: usize,
        _start_index: usize,
        _stop_index: usize,
        _exact: bool,
        _ambig_alts: &AltSet,
    ) {
    }

    fn report_attempting_full_context(
        &self,
        _decision: usize,
        _start_index: usize,
        _stop_index: usize,
        _conflicting_alts: Option<&AltSet>,
    ) {
    }

    fn report_context_sensitivity(
        &self,
        _decision: usize,
        _start_index: usize,
        _stop_index: usize,
        _prediction: usize,
    ) {
    }

    fn report_no_viable_alt(&self, _decision: usize, _start_index: usize, _stop_index: usize) {}
}

/// Forwards every notification to each registered listener, in
/// registration order.
#[derive(Clone, Default)]
pub struct ProxyErrorListener {
    delegates: Vec<Arc<dyn ErrorListener>>,
}

impl ProxyErrorListener {
    pub fn new(delegates: Vec<Arc<dyn ErrorListener>>) -> Self {
        ProxyErrorListener { delegates }
    }

    pub fn add(&mut self, listener: Arc<dyn ErrorListener>) {
        self.delegates.push(listener);
    }

    pub fn clear(&mut self) {
        self.delegates.clear();
    }

    pub fn len(&self) -> usize {
        self.delegates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }
}

impl ErrorListener for ProxyErrorListener {
    fn syntax_error(
        &self,
        offending: Option<&Token>,
        line: usize,
        column: usize,
        msg: &str,
        error: Option<&RecognitionError>,
    ) {
        for l in &self.delegates {
            l.syntax_error(offending, line, column, msg, error);
        }
    }

    fn report_ambiguity(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        ambig_alts: &AltSet,
    ) {
        for l in &self.delegates {
            l.report_ambiguity(decision, start_index, stop_index, exact, ambig_alts);
        }
    }

    fn report_attempting_full_context(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        conflicting_alts: Option<&AltSet>,
    ) {
        for l in &self.delegates {
            l.report_attempting_full_context(decision, start_index, stop_index, conflicting_alts);
        }
    }

    fn report_context_sensitivity(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        prediction: usize,
    ) {
        for l in &self.delegates {
            l.report_context_sensitivity(decision, start_index, stop_index, prediction);
        }
    }

    fn report_no_viable_alt(&self, decision: usize, start_index: usize, stop_index: usize) {
        for l in &self.delegates {
            l.report_no_viable_alt(decision, start_index, stop_index);
        }
    }
}

/// Prints syntax errors to stderr; ignores prediction diagnostics.
pub struct ConsoleErrorListener;

impl ErrorListener for ConsoleErrorListener {
    fn syntax_error(
        &self,
        _offending: Option<&Token>,
        line: usize,
        column: usize,
        msg: &str,
        _error: Option<&RecognitionError>,
    ) {
        eprintln!("line {}:{} {}", line, column, msg);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    SyntaxError {
        line: usize,
        column: usize,
        msg: String,
    },
    Ambiguity {
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        alts: Vec<usize>,
    },
    AttemptingFullContext {
        decision: usize,
        start_index: usize,
        stop_index: usize,
    },
    ContextSensitivity {
        decision: usize,
        start_index: usize,
        stop_index: usize,
        prediction: usize,
    },
    NoViableAlt {
        decision: usize,
        start_index: usize,
        stop_index: usize,
    },
}

/// Keeps every event it sees; used for diagnostics and in tests.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, ev: ListenerEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(ev);
        }
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn take_events(&self) -> Vec<ListenerEvent> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }

    pub fn ambiguities(&self) -> Vec<ListenerEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, ListenerEvent::Ambiguity { .. }))
            .collect()
    }

    pub fn syntax_errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ListenerEvent::SyntaxError { line, column, msg } => {
                    Some(format!("line {}:{} {}", line, column, msg))
                }
                _ => None,
            })
            .collect()
    }
}

impl ErrorListener for RecordingListener {
    fn syntax_error(
        &self,
        _offending: Option<&Token>,
        line: usize,
        column: usize,
        msg: &str,
        _error: Option<&RecognitionError>,
    ) {
        self.push(ListenerEvent::SyntaxError {
            line,
            column,
            msg: msg.to_string(),
        });
    }

    fn report_ambiguity(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        ambig_alts: &AltSet,
    ) {
        self.push(ListenerEvent::Ambiguity {
            decision,
            start_index,
            stop_index,
            exact,
            alts: ambig_alts.iter().collect(),
        });
    }

    fn report_attempting_full_context(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        _conflicting_alts: Option<&AltSet>,
    ) {
        self.push(ListenerEvent::AttemptingFullContext {
            decision,
            start_index,
            stop_index,
        });
    }

    fn report_context_sensitivity(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        prediction: usize,
    ) {
        self.push(ListenerEvent::ContextSensitivity {
            decision,
            start_index,
            stop_index,
            prediction,
        });
    }

    fn report_no_viable_alt(&self, decision: usize, start_index: usize, stop_index: usize) {
        self.push(ListenerEvent::NoViableAlt {
            decision,
            start_index,
            stop_index,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_preserves_registration_order() {
        struct Tagged(&'static str, Arc<Mutex<Vec<&'static str>>>);
        impl ErrorListener for Tagged {
            fn report_no_viable_alt(&self, _d: usize, _s: usize, _e: usize) {
                self.1.lock().unwrap().push(self.0);
            }
        }

        let log = Arc::new(Mutex::new(vec![]));
        let mut proxy = ProxyErrorListener::default();
        proxy.add(Arc::new(Tagged("a", log.clone())));
        proxy.add(Arc::new(Tagged("b", log.clone())));
        proxy.add(Arc::new(Tagged("c", log.clone())));
        proxy.report_no_viable_alt(0, 1, 2);
        proxy.report_no_viable_alt(0, 1, 2);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn atn_error_downcasts() {
        let err: anyhow::Error = AtnError::Malformed("x".to_string()).into();
        assert!(matches!(
            err.downcast_ref::<AtnError>(),
            Some(AtnError::Malformed(_))
        ));
    }
}

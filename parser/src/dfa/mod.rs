//! Memoized prediction results, shared by every recognizer built from the
//! same automaton.
//!
//! Each decision (or lexer mode) owns a [`Dfa`] whose states are frozen
//! configuration sets. States are canonical: the first thread to register a
//! given set wins, and later threads adopt its state. Edges are set at most
//! once. Readers never block writers of unrelated entries.

use std::{
    fmt::{self, Write as _},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, OnceLock, Weak,
    },
};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{
    atn::{Atn, StateKind},
    context::{AtnConfig, ConfigSet, ContextCache, SemanticContext},
    lexer::LexerActionExecutor,
};

/// Lexer DFA edges exist only for code points below this bound; others
/// always go through the automaton.
pub const LEXER_DFA_EDGES: usize = 128;

/// A predicate guarding one alternative of an accept state that needs
/// semantic resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredPrediction {
    pub pred: SemanticContext,
    pub alt: usize,
}

enum StoredEdge {
    Error,
    Target(Weak<DfaState>),
}

/// Outcome of following a recorded edge.
#[derive(Clone)]
pub enum Edge {
    /// The symbol is known to lead nowhere.
    Error,
    Target(Arc<DfaState>),
}

pub struct DfaState {
    pub state_number: usize,
    pub configs: ConfigSet,
    edges: Box<[OnceLock<StoredEdge>]>,
    pub is_accept_state: bool,
    /// Alternative for parser decisions, token type for the lexer.
    pub prediction: i32,
    pub lexer_action_executor: Option<Arc<LexerActionExecutor>>,
    /// SLL found a conflict here; the parser must retry with full context.
    pub requires_full_context: bool,
    /// Alternatives guarded by predicates, evaluated at prediction time.
    pub predicates: Option<Vec<PredPrediction>>,
}

impl DfaState {
    pub fn new(configs: ConfigSet, num_edges: usize) -> Self {
        DfaState {
            state_number: usize::MAX,
            configs,
            edges: (0..num_edges).map(|_| OnceLock::new()).collect(),
            is_accept_state: false,
            prediction: 0,
            lexer_action_executor: None,
            requires_full_context: false,
            predicates: None,
        }
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// The recorded edge at `idx`, or `None` if it was never computed.
    pub fn edge(&self, idx: usize) -> Option<Edge> {
        match self.edges.get(idx)?.get()? {
            StoredEdge::Error => Some(Edge::Error),
            StoredEdge::Target(w) => w.upgrade().map(Edge::Target),
        }
    }

    /// Records an edge. An edge already set by another thread is kept.
    pub fn set_edge(&self, idx: usize, edge: &Edge) {
        if let Some(slot) = self.edges.get(idx) {
            let stored = match edge {
                Edge::Error => StoredEdge::Error,
                Edge::Target(t) => StoredEdge::Target(Arc::downgrade(t)),
            };
            let _ = slot.set(stored);
        }
    }

    fn recorded_edges(&self) -> impl Iterator<Item = (usize, Arc<DfaState>)> + '_ {
        self.edges.iter().enumerate().filter_map(|(i, e)| match e.get() {
            Some(StoredEdge::Target(w)) => w.upgrade().map(|t| (i, t)),
            _ => None,
        })
    }
}

impl fmt::Debug for DfaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.state_number, self.configs)?;
        if self.is_accept_state {
            write!(f, "=>")?;
            match &self.predicates {
                Some(p) => write!(f, "{:?}", p)?,
                None => write!(f, "{}", self.prediction)?,
            }
        }
        Ok(())
    }
}

pub struct Dfa {
    pub decision: usize,
    pub atn_start_state: usize,
    precedence_dfa: bool,
    num_edges: usize,
    states: DashMap<Vec<AtnConfig>, Arc<DfaState>>,
    next_state_number: AtomicUsize,
    s0: OnceLock<Arc<DfaState>>,
    precedence_s0: DashMap<i32, Arc<DfaState>>,
}

impl Dfa {
    pub fn new(decision: usize, atn_start_state: usize, num_edges: usize, precedence_dfa: bool) -> Self {
        Dfa {
            decision,
            atn_start_state,
            precedence_dfa,
            num_edges,
            states: DashMap::new(),
            next_state_number: AtomicUsize::new(0),
            s0: OnceLock::new(),
            precedence_s0: DashMap::new(),
        }
    }

    /// Decisions at the loop of a left-recursive rule keep one start state
    /// per precedence level.
    pub fn is_precedence_dfa(&self) -> bool {
        self.precedence_dfa
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn s0(&self) -> Option<Arc<DfaState>> {
        self.s0.get().cloned()
    }

    pub fn set_s0(&self, s: Arc<DfaState>) -> Arc<DfaState> {
        self.s0.get_or_init(|| s).clone()
    }

    pub fn precedence_start_state(&self, precedence: i32) -> Option<Arc<DfaState>> {
        self.precedence_s0.get(&precedence).map(|s| s.clone())
    }

    pub fn set_precedence_start_state(&self, precedence: i32, s: Arc<DfaState>) -> Arc<DfaState> {
        self.precedence_s0.entry(precedence).or_insert(s).clone()
    }

    /// Returns the canonical state for `candidate`'s configurations,
    /// registering `candidate` if no equal state exists yet.
    pub fn add_state(&self, mut candidate: DfaState, contexts: &ContextCache) -> Arc<DfaState> {
        if let Some(existing) = self.states.get(&candidate.configs.key()) {
            return existing.clone();
        }
        candidate.configs.optimize(contexts);
        match self.states.entry(candidate.configs.key()) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                candidate.state_number = self.next_state_number.fetch_add(1, Ordering::Relaxed);
                let s = Arc::new(candidate);
                e.insert(s.clone());
                s
            }
        }
    }

    /// All registered states, by state number.
    pub fn states(&self) -> Vec<Arc<DfaState>> {
        let mut v: Vec<_> = self.states.iter().map(|e| e.value().clone()).collect();
        v.sort_by_key(|s| s.state_number);
        v
    }

    /// One line per recorded edge, `s0-label->:s1=>2`; `label` renders the
    /// symbol of an edge index.
    pub fn to_string_with(&self, label: impl Fn(usize) -> String) -> String {
        let mut out = String::new();
        for s in self.states() {
            for (i, t) in s.recorded_edges() {
                let _ = write!(out, "{}-{}->", state_name(&s), label(i));
                let _ = writeln!(out, "{}", state_name(&t));
            }
        }
        out
    }
}

fn state_name(s: &DfaState) -> String {
    let base = if s.is_accept_state { ":s" } else { "s" };
    let mut name = format!("{}{}", base, s.state_number);
    if s.is_accept_state {
        match &s.predicates {
            Some(p) => name.push_str(&format!("=>{:?}", p)),
            None => name.push_str(&format!("=>{}", s.prediction)),
        }
    }
    if s.requires_full_context {
        name.push('^');
    }
    name
}

/// The DFAs of one automaton: one per lexer mode or per parser decision,
/// plus the context interning table their states share.
pub struct DfaCache {
    dfas: Vec<Dfa>,
    contexts: ContextCache,
}

impl DfaCache {
    pub fn new(atn: &Atn) -> Self {
        if atn.is_lexer() {
            Self::for_lexer(atn)
        } else {
            Self::for_parser(atn)
        }
    }

    pub fn for_lexer(atn: &Atn) -> Self {
        let dfas = atn
            .mode_to_start_state
            .iter()
            .enumerate()
            .map(|(mode, &s)| Dfa::new(mode, s, LEXER_DFA_EDGES, false))
            .collect();
        DfaCache {
            dfas,
            contexts: ContextCache::new(),
        }
    }

    pub fn for_parser(atn: &Atn) -> Self {
        let num_edges = (atn.max_token_type + 2) as usize;
        let dfas = atn
            .decision_to_state
            .iter()
            .enumerate()
            .map(|(d, &s)| {
                let precedence = matches!(
                    atn.states[s].kind,
                    StateKind::StarLoopEntry {
                        precedence_decision: true,
                        ..
                    }
                );
                Dfa::new(d, s, num_edges, precedence)
            })
            .collect();
        DfaCache {
            dfas,
            contexts: ContextCache::new(),
        }
    }

    pub fn dfa(&self, idx: usize) -> &Dfa {
        &self.dfas[idx]
    }

    pub fn len(&self) -> usize {
        self.dfas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dfas.is_empty()
    }

    pub fn contexts(&self) -> &ContextCache {
        &self.contexts
    }

    pub fn total_states(&self) -> usize {
        self.dfas.iter().map(|d| d.num_states()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PredictionContext;

    fn set_of(states: &[usize]) -> ConfigSet {
        let mut s = ConfigSet::new(false);
        for &st in states {
            s.add(AtnConfig::new(st, 1, PredictionContext::empty()), None);
        }
        s
    }

    #[test]
    fn equal_sets_share_one_state() {
        let dfa = Dfa::new(0, 0, 4, false);
        let contexts = ContextCache::new();
        let a = dfa.add_state(DfaState::new(set_of(&[1, 2]), 4), &contexts);
        let b = dfa.add_state(DfaState::new(set_of(&[2, 1]), 4), &contexts);
        let c = dfa.add_state(DfaState::new(set_of(&[3]), 4), &contexts);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.state_number, 0);
        assert_eq!(c.state_number, 1);
        assert_eq!(dfa.num_states(), 2);
    }

    #[test]
    fn first_edge_wins() {
        let dfa = Dfa::new(0, 0, 4, false);
        let contexts = ContextCache::new();
        let a = dfa.add_state(DfaState::new(set_of(&[1]), 4), &contexts);
        let b = dfa.add_state(DfaState::new(set_of(&[2]), 4), &contexts);
        assert!(a.edge(1).is_none());
        a.set_edge(1, &Edge::Target(b.clone()));
        a.set_edge(1, &Edge::Error);
        assert!(matches!(a.edge(1), Some(Edge::Target(t)) if Arc::ptr_eq(&t, &b)));
        a.set_edge(2, &Edge::Error);
        assert!(matches!(a.edge(2), Some(Edge::Error)));
        assert!(a.edge(17).is_none());
        assert_eq!(dfa.to_string_with(|i| i.to_string()), "s0-1->s1\n");
    }

    #[test]
    fn concurrent_registration_is_deduplicated() {
        let dfa = Arc::new(Dfa::new(0, 0, 4, false));
        let contexts = Arc::new(ContextCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dfa = dfa.clone();
                let contexts = contexts.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| dfa.add_state(DfaState::new(set_of(&[i % 10]), 4), &contexts))
                        .map(|s| s.state_number)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<Vec<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(dfa.num_states(), 10);
        for r in &results[1..] {
            assert_eq!(r, &results[0]);
        }
    }
}

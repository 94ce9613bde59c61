use std::{
    fmt::{self, Debug},
    hash::{Hash, Hasher},
    sync::Arc,
};

use rustc_hash::{FxHashMap, FxHashSet};

use super::{AltSet, ContextCache, MergeCache, PredictionContext, SemanticContext, INVALID_ALT};
use crate::lexer::LexerActionExecutor;

/// One thread of the non-deterministic simulation.
#[derive(Clone)]
pub struct AtnConfig {
    pub state: usize,
    pub alt: usize,
    pub context: PredictionContext,
    pub semantic_context: SemanticContext,
    /// How many times closure fell off the end of the decision rule into
    /// the caller's context.
    pub reaches_into_outer_context: usize,
    pub precedence_filter_suppressed: bool,
    // lexer only
    pub lexer_action_executor: Option<Arc<LexerActionExecutor>>,
    pub passed_through_non_greedy: bool,
}

impl AtnConfig {
    pub fn new(state: usize, alt: usize, context: PredictionContext) -> Self {
        AtnConfig {
            state,
            alt,
            context,
            semantic_context: SemanticContext::None,
            reaches_into_outer_context: 0,
            precedence_filter_suppressed: false,
            lexer_action_executor: None,
            passed_through_non_greedy: false,
        }
    }

    pub fn with_state(&self, state: usize) -> Self {
        AtnConfig {
            state,
            ..self.clone()
        }
    }

    pub fn with_context(&self, state: usize, context: PredictionContext) -> Self {
        AtnConfig {
            state,
            context,
            ..self.clone()
        }
    }

    /// The configuration continuing in the caller at `return_state`. Only
    /// the alternative, predicate and outer-context depth carry over.
    pub fn returning_to(&self, return_state: usize, context: PredictionContext) -> Self {
        AtnConfig {
            state: return_state,
            context,
            precedence_filter_suppressed: false,
            ..self.clone()
        }
    }

    pub fn with_semantic_context(&self, state: usize, semantic_context: SemanticContext) -> Self {
        AtnConfig {
            state,
            semantic_context,
            ..self.clone()
        }
    }

    pub fn outer_context_depth(&self) -> usize {
        self.reaches_into_outer_context
    }
}

impl PartialEq for AtnConfig {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.alt == other.alt
            && self.precedence_filter_suppressed == other.precedence_filter_suppressed
            && self.passed_through_non_greedy == other.passed_through_non_greedy
            && self.semantic_context == other.semantic_context
            && self.lexer_action_executor == other.lexer_action_executor
            && self.context == other.context
    }
}

impl Eq for AtnConfig {}

impl Hash for AtnConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state.hash(state);
        self.alt.hash(state);
        self.context.hash(state);
        self.semantic_context.hash(state);
        self.passed_through_non_greedy.hash(state);
        self.lexer_action_executor.hash(state);
    }
}

impl Debug for AtnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{:?}", self.state, self.alt, self.context)?;
        if !self.semantic_context.is_none() {
            write!(f, ",{:?}", self.semantic_context)?;
        }
        if self.reaches_into_outer_context > 0 {
            write!(f, ",up={}", self.reaches_into_outer_context)?;
        }
        write!(f, ")")
    }
}

enum Lookup {
    /// Parser sets: one config per (state, alt, predicate), contexts merged.
    Merged(FxHashMap<(usize, usize, SemanticContext), usize>),
    /// Lexer sets: insertion ordered, exact duplicates dropped.
    Exact(FxHashSet<AtnConfig>),
}

/// A set of configurations reached at one point of the simulation.
pub struct ConfigSet {
    configs: Vec<AtnConfig>,
    lookup: Lookup,
    pub full_ctx: bool,
    pub unique_alt: usize,
    pub conflicting_alts: Option<AltSet>,
    pub has_semantic_context: bool,
    pub dips_into_outer_context: bool,
}

impl ConfigSet {
    pub fn new(full_ctx: bool) -> Self {
        ConfigSet {
            configs: vec![],
            lookup: Lookup::Merged(FxHashMap::default()),
            full_ctx,
            unique_alt: INVALID_ALT,
            conflicting_alts: None,
            has_semantic_context: false,
            dips_into_outer_context: false,
        }
    }

    /// Ordered set used by the lexer, where config order encodes rule
    /// priority.
    pub fn new_ordered() -> Self {
        ConfigSet {
            lookup: Lookup::Exact(FxHashSet::default()),
            ..Self::new(false)
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self.lookup, Lookup::Exact(_))
    }

    /// Adds `config`, merging its context into an existing config with the
    /// same state, alternative and predicate.
    pub fn add(&mut self, config: AtnConfig, cache: Option<&mut MergeCache>) -> bool {
        if !config.semantic_context.is_none() {
            self.has_semantic_context = true;
        }
        if config.reaches_into_outer_context > 0 {
            self.dips_into_outer_context = true;
        }
        match &mut self.lookup {
            Lookup::Merged(map) => {
                let key = (config.state, config.alt, config.semantic_context.clone());
                if let Some(&idx) = map.get(&key) {
                    let root_is_wildcard = !self.full_ctx;
                    let existing = &mut self.configs[idx];
                    let merged = PredictionContext::merge(
                        &existing.context,
                        &config.context,
                        root_is_wildcard,
                        cache,
                    );
                    existing.reaches_into_outer_context = std::cmp::max(
                        existing.reaches_into_outer_context,
                        config.reaches_into_outer_context,
                    );
                    if config.precedence_filter_suppressed {
                        existing.precedence_filter_suppressed = true;
                    }
                    existing.context = merged;
                    return true;
                }
                map.insert(key, self.configs.len());
            }
            Lookup::Exact(set) => {
                if !set.insert(config.clone()) {
                    return true;
                }
            }
        }
        self.configs.push(config);
        true
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtnConfig> {
        self.configs.iter()
    }

    pub fn configs(&self) -> &[AtnConfig] {
        &self.configs
    }

    pub fn alts(&self) -> AltSet {
        self.configs.iter().map(|c| c.alt).collect()
    }

    /// Single alternative shared by every config, or `INVALID_ALT`.
    pub fn unique_alt_of(&self) -> usize {
        let mut alt = INVALID_ALT;
        for c in &self.configs {
            if alt == INVALID_ALT {
                alt = c.alt;
            } else if c.alt != alt {
                return INVALID_ALT;
            }
        }
        alt
    }

    /// Replaces every context with its interned twin. Called once, right
    /// before the set is frozen into a DFA state.
    pub fn optimize(&mut self, cache: &ContextCache) {
        for c in self.configs.iter_mut() {
            c.context = cache.intern(&c.context);
        }
    }

    /// Canonical identity of the set: order-insensitive for parser sets,
    /// ordered for lexer sets.
    pub fn key(&self) -> Vec<AtnConfig> {
        let mut key = self.configs.clone();
        if !self.is_ordered() {
            key.sort_by(|a, b| {
                (a.state, a.alt, &a.semantic_context, a.context.hash_value()).cmp(&(
                    b.state,
                    b.alt,
                    &b.semantic_context,
                    b.context.hash_value(),
                ))
            });
        }
        key
    }
}

impl<'a> IntoIterator for &'a ConfigSet {
    type Item = &'a AtnConfig;
    type IntoIter = std::slice::Iter<'a, AtnConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.configs.iter()
    }
}

impl Debug for ConfigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.configs)?;
        if self.has_semantic_context {
            write!(f, ",hasSemanticContext")?;
        }
        if self.unique_alt != INVALID_ALT {
            write!(f, ",uniqueAlt={}", self.unique_alt)?;
        }
        if let Some(c) = &self.conflicting_alts {
            write!(f, ",conflictingAlts={:?}", c)?;
        }
        if self.dips_into_outer_context {
            write!(f, ",dipsIntoOuterContext")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_set_merges_contexts() {
        let e = PredictionContext::empty();
        let mut set = ConfigSet::new(false);
        set.add(AtnConfig::new(3, 1, e.push(10)), None);
        set.add(AtnConfig::new(3, 1, e.push(11)), None);
        set.add(AtnConfig::new(3, 2, e.push(11)), None);
        assert_eq!(set.len(), 2);
        assert_eq!(set.configs()[0].context.len(), 2);
        assert_eq!(set.unique_alt_of(), INVALID_ALT);
        assert_eq!(set.alts(), [1, 2].into_iter().collect::<AltSet>());
    }

    #[test]
    fn returning_clears_precedence_suppression() {
        let e = PredictionContext::empty();
        let mut c = AtnConfig::new(3, 2, e.push(10));
        c.precedence_filter_suppressed = true;
        c.reaches_into_outer_context = 1;
        let r = c.returning_to(10, e.clone());
        assert_eq!((r.state, r.alt), (10, 2));
        assert!(r.context.is_empty());
        assert_eq!(r.reaches_into_outer_context, 1);
        assert!(!r.precedence_filter_suppressed);
        assert!(c.with_context(4, e).precedence_filter_suppressed);
    }

    #[test]
    fn keys_ignore_parser_order() {
        let e = PredictionContext::empty();
        let mut a = ConfigSet::new(false);
        a.add(AtnConfig::new(3, 1, e.clone()), None);
        a.add(AtnConfig::new(4, 2, e.clone()), None);
        let mut b = ConfigSet::new(false);
        b.add(AtnConfig::new(4, 2, e.clone()), None);
        b.add(AtnConfig::new(3, 1, e.clone()), None);
        assert_eq!(a.key(), b.key());

        let mut c = ConfigSet::new_ordered();
        c.add(AtnConfig::new(4, 2, e.clone()), None);
        c.add(AtnConfig::new(3, 1, e.clone()), None);
        c.add(AtnConfig::new(3, 1, e), None);
        assert_eq!(c.len(), 2);
        assert_ne!(a.key(), c.key());
    }
}

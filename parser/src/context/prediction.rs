use std::{
    fmt::{self, Debug},
    hash::{Hash, Hasher},
    sync::Arc,
};

use dashmap::DashMap;
use lazy_static::lazy_static;
use rustc_hash::{FxHashMap, FxHasher};

use crate::atn::{Atn, TransitionKind};

/// Return state marking the bottom of the virtual call stack. Sorts after
/// every real state number.
pub const EMPTY_RETURN_STATE: usize = usize::MAX;

/// Memo table for a single prediction's worth of merges.
pub type MergeCache = FxHashMap<(PredictionContext, PredictionContext), PredictionContext>;

struct ContextNode {
    hash: u64,
    // Sorted ascending; a parent is None only next to EMPTY_RETURN_STATE.
    return_states: Box<[usize]>,
    parents: Box<[Option<PredictionContext>]>,
}

/// An immutable, structurally shared graph of return states. Each entry
/// says "return to this state, then continue as the parent context".
#[derive(Clone)]
pub struct PredictionContext(Arc<ContextNode>);

lazy_static! {
    static ref EMPTY: PredictionContext =
        PredictionContext::new(vec![None], vec![EMPTY_RETURN_STATE]);
}

impl PredictionContext {
    fn new(parents: Vec<Option<PredictionContext>>, return_states: Vec<usize>) -> Self {
        debug_assert_eq!(parents.len(), return_states.len());
        let mut h = FxHasher::default();
        for (p, rs) in parents.iter().zip(return_states.iter()) {
            rs.hash(&mut h);
            p.as_ref().map(|p| p.0.hash).hash(&mut h);
        }
        PredictionContext(Arc::new(ContextNode {
            hash: h.finish(),
            return_states: return_states.into_boxed_slice(),
            parents: parents.into_boxed_slice(),
        }))
    }

    /// The canonical zero-depth context.
    pub fn empty() -> Self {
        EMPTY.clone()
    }

    pub fn singleton(parent: Option<PredictionContext>, return_state: usize) -> Self {
        if return_state == EMPTY_RETURN_STATE && parent.is_none() {
            return Self::empty();
        }
        Self::new(vec![parent], vec![return_state])
    }

    /// "Return to `return_state`, then behave as `self`."
    pub fn push(&self, return_state: usize) -> Self {
        Self::singleton(Some(self.clone()), return_state)
    }

    /// Builds the exact context for a call stack given as invoking states,
    /// outermost first.
    pub fn from_call_stack(atn: &Atn, call_stack: &[usize]) -> Self {
        let mut ctx = Self::empty();
        for &invoking in call_stack {
            if let Some(TransitionKind::Rule { follow_state, .. }) =
                atn.states[invoking].transitions.first().map(|t| &t.kind)
            {
                ctx = ctx.push(*follow_state);
            }
        }
        ctx
    }

    pub fn len(&self) -> usize {
        self.0.return_states.len()
    }

    pub fn return_state(&self, idx: usize) -> usize {
        self.0.return_states[idx]
    }

    pub fn parent(&self, idx: usize) -> Option<&PredictionContext> {
        self.0.parents[idx].as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 1 && self.0.return_states[0] == EMPTY_RETURN_STATE
    }

    pub fn has_empty_path(&self) -> bool {
        self.0.return_states.last() == Some(&EMPTY_RETURN_STATE)
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn hash_value(&self) -> u64 {
        self.0.hash
    }

    /// Union of the stacks `a` and `b` represent. With `root_is_wildcard`
    /// (local-context prediction) the empty context absorbs everything.
    pub fn merge(
        a: &Self,
        b: &Self,
        root_is_wildcard: bool,
        mut cache: Option<&mut MergeCache>,
    ) -> Self {
        if a == b {
            return a.clone();
        }
        if a.len() == 1 && b.len() == 1 {
            return Self::merge_singletons(a, b, root_is_wildcard, cache.as_deref_mut());
        }
        if root_is_wildcard {
            if a.is_empty() {
                return a.clone();
            }
            if b.is_empty() {
                return b.clone();
            }
        }
        Self::merge_arrays(a, b, root_is_wildcard, cache)
    }

    fn lookup(cache: &Option<&mut MergeCache>, a: &Self, b: &Self) -> Option<Self> {
        let cache = cache.as_ref()?;
        cache
            .get(&(a.clone(), b.clone()))
            .or_else(|| cache.get(&(b.clone(), a.clone())))
            .cloned()
    }

    fn store(cache: &mut Option<&mut MergeCache>, a: &Self, b: &Self, r: &Self) {
        if let Some(cache) = cache.as_mut() {
            cache.insert((a.clone(), b.clone()), r.clone());
        }
    }

    fn merge_singletons(
        a: &Self,
        b: &Self,
        root_is_wildcard: bool,
        mut cache: Option<&mut MergeCache>,
    ) -> Self {
        if let Some(prev) = Self::lookup(&cache, a, b) {
            return prev;
        }
        if let Some(root) = Self::merge_root(a, b, root_is_wildcard) {
            Self::store(&mut cache, a, b, &root);
            return root;
        }

        // neither side is empty here, so both parents are present
        let (ars, brs) = (a.return_state(0), b.return_state(0));
        let (ap, bp) = (a.parent(0).cloned(), b.parent(0).cloned());
        let result = if ars == brs {
            let parent = match (&ap, &bp) {
                (Some(x), Some(y)) => {
                    Some(Self::merge(x, y, root_is_wildcard, cache.as_deref_mut()))
                }
                _ => ap.clone().or(bp.clone()),
            };
            if parent == ap {
                return a.clone();
            }
            if parent == bp {
                return b.clone();
            }
            Self::singleton(parent, ars)
        } else if ap == bp {
            let (lo, hi) = if ars < brs { (ars, brs) } else { (brs, ars) };
            Self::new(vec![ap.clone(), ap], vec![lo, hi])
        } else if ars < brs {
            Self::new(vec![ap, bp], vec![ars, brs])
        } else {
            Self::new(vec![bp, ap], vec![brs, ars])
        };
        Self::store(&mut cache, a, b, &result);
        result
    }

    fn merge_root(a: &Self, b: &Self, root_is_wildcard: bool) -> Option<Self> {
        if root_is_wildcard {
            if a.is_empty() || b.is_empty() {
                return Some(Self::empty());
            }
        } else {
            if a.is_empty() && b.is_empty() {
                return Some(Self::empty());
            }
            if a.is_empty() {
                return Some(Self::new(
                    vec![b.parent(0).cloned(), None],
                    vec![b.return_state(0), EMPTY_RETURN_STATE],
                ));
            }
            if b.is_empty() {
                return Some(Self::new(
                    vec![a.parent(0).cloned(), None],
                    vec![a.return_state(0), EMPTY_RETURN_STATE],
                ));
            }
        }
        None
    }

    fn merge_arrays(
        a: &Self,
        b: &Self,
        root_is_wildcard: bool,
        mut cache: Option<&mut MergeCache>,
    ) -> Self {
        if let Some(prev) = Self::lookup(&cache, a, b) {
            return prev;
        }

        let mut parents = Vec::with_capacity(a.len() + b.len());
        let mut return_states = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            let (ap, bp) = (a.parent(i), b.parent(j));
            let (ars, brs) = (a.return_state(i), b.return_state(j));
            if ars == brs {
                let parent = match (ap, bp) {
                    (Some(x), Some(y)) if x == y => Some(x.clone()),
                    (Some(x), Some(y)) => {
                        Some(Self::merge(x, y, root_is_wildcard, cache.as_deref_mut()))
                    }
                    (x, y) => x.or(y).cloned(),
                };
                parents.push(parent);
                return_states.push(ars);
                i += 1;
                j += 1;
            } else if ars < brs {
                parents.push(ap.cloned());
                return_states.push(ars);
                i += 1;
            } else {
                parents.push(bp.cloned());
                return_states.push(brs);
                j += 1;
            }
        }
        for k in i..a.len() {
            parents.push(a.parent(k).cloned());
            return_states.push(a.return_state(k));
        }
        for k in j..b.len() {
            parents.push(b.parent(k).cloned());
            return_states.push(b.return_state(k));
        }

        let result = if return_states.len() == 1 {
            Self::singleton(parents.pop().flatten(), return_states[0])
        } else {
            let merged = Self::new(parents, return_states);
            if merged == *a {
                a.clone()
            } else if merged == *b {
                b.clone()
            } else {
                merged
            }
        };
        Self::store(&mut cache, a, b, &result);
        result
    }
}

impl PartialEq for PredictionContext {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        self.0.hash == other.0.hash
            && self.0.return_states == other.0.return_states
            && self.0.parents == other.0.parents
    }
}

impl Eq for PredictionContext {}

impl Hash for PredictionContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl Debug for PredictionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "$");
        }
        write!(f, "[")?;
        for i in 0..self.len() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match (self.return_state(i), self.parent(i)) {
                (EMPTY_RETURN_STATE, _) => write!(f, "$")?,
                (rs, Some(p)) if p.is_empty() => write!(f, "{}", rs)?,
                (rs, Some(p)) => write!(f, "{} {:?}", rs, p)?,
                (rs, None) => write!(f, "{} null", rs)?,
            }
        }
        write!(f, "]")
    }
}

/// Interns contexts reachable from DFA states so equal sub-graphs share one
/// allocation. Lives as long as the DFA cache that owns it.
#[derive(Default)]
pub struct ContextCache {
    map: DashMap<PredictionContext, PredictionContext>,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn intern(&self, ctx: &PredictionContext) -> PredictionContext {
        if ctx.is_empty() {
            return PredictionContext::empty();
        }
        if let Some(existing) = self.map.get(ctx) {
            return existing.value().clone();
        }

        let parents: Vec<Option<PredictionContext>> = ctx
            .0
            .parents
            .iter()
            .map(|p| p.as_ref().map(|p| self.intern(p)))
            .collect();
        let changed = parents
            .iter()
            .zip(ctx.0.parents.iter())
            .any(|(n, o)| match (n, o) {
                (Some(n), Some(o)) => !PredictionContext::ptr_eq(n, o),
                _ => false,
            });
        let updated = if changed {
            PredictionContext::new(parents, ctx.0.return_states.to_vec())
        } else {
            ctx.clone()
        };
        let interned = self.map.entry(updated.clone()).or_insert(updated);
        interned.value().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;

    fn ctx(stack: &[usize]) -> PredictionContext {
        stack
            .iter()
            .fold(PredictionContext::empty(), |c, &rs| c.push(rs))
    }

    #[test]
    fn empty_is_canonical() {
        let e = PredictionContext::empty();
        assert!(e.is_empty());
        assert!(e.has_empty_path());
        assert!(PredictionContext::ptr_eq(
            &e,
            &PredictionContext::singleton(None, EMPTY_RETURN_STATE)
        ));
    }

    #[test]
    fn merge_shares_suffix() {
        let a = ctx(&[1, 2, 5]);
        let b = ctx(&[1, 2, 7]);
        let m = PredictionContext::merge(&a, &b, true, None);
        assert_eq!(m.len(), 2);
        assert_eq!(m.return_state(0), 5);
        assert_eq!(m.return_state(1), 7);
        assert_eq!(m.parent(0), m.parent(1));
        assert_eq!(format!("{:?}", m), "[5 [2 [1]], 7 [2 [1]]]");
    }

    #[test]
    fn merge_with_empty() {
        let a = ctx(&[3]);
        let e = PredictionContext::empty();
        assert!(PredictionContext::merge(&a, &e, true, None).is_empty());

        let full = PredictionContext::merge(&a, &e, false, None);
        assert_eq!(full.len(), 2);
        assert_eq!(full.return_state(0), 3);
        assert!(full.has_empty_path());
        assert_eq!(full, PredictionContext::merge(&e, &a, false, None));
    }

    #[test]
    fn merge_same_return_state_merges_parents() {
        let a = ctx(&[1, 9]);
        let b = ctx(&[2, 9]);
        let mut cache = MergeCache::default();
        let m = PredictionContext::merge(&a, &b, false, Some(&mut cache));
        assert_eq!(m.len(), 1);
        assert_eq!(m.return_state(0), 9);
        assert_eq!(m.parent(0).map(|p| p.len()), Some(2));
        let again = PredictionContext::merge(&a, &b, false, Some(&mut cache));
        assert!(PredictionContext::ptr_eq(&m, &again));
    }

    #[test]
    fn interning_shares_nodes() {
        let cache = ContextCache::new();
        let a = cache.intern(&ctx(&[1, 2]));
        let b = cache.intern(&ctx(&[1, 2]));
        assert!(PredictionContext::ptr_eq(&a, &b));
        let c = cache.intern(&ctx(&[1, 3]));
        assert!(PredictionContext::ptr_eq(
            a.parent(0).unwrap(),
            c.parent(0).unwrap()
        ));
    }

    /// Every call stack `c` stands for, innermost return state first.
    fn stacks(c: &PredictionContext) -> BTreeSet<Vec<usize>> {
        let mut out = BTreeSet::new();
        for i in 0..c.len() {
            let rs = c.return_state(i);
            if rs == EMPTY_RETURN_STATE {
                out.insert(vec![]);
                continue;
            }
            match c.parent(i) {
                Some(p) => {
                    for mut s in stacks(p) {
                        s.insert(0, rs);
                        out.insert(s);
                    }
                }
                None => {
                    out.insert(vec![rs]);
                }
            }
        }
        out
    }

    fn graph(paths: &[Vec<usize>]) -> PredictionContext {
        paths
            .iter()
            .map(|p| ctx(p))
            .reduce(|a, b| PredictionContext::merge(&a, &b, false, None))
            .unwrap_or_else(PredictionContext::empty)
    }

    fn paths() -> impl Strategy<Value = Vec<Vec<usize>>> {
        prop::collection::vec(prop::collection::vec(1usize..6, 0..4), 1..4)
    }

    proptest! {
        #[test]
        fn merge_is_commutative(a in paths(), b in paths(), wildcard in any::<bool>()) {
            let (a, b) = (graph(&a), graph(&b));
            prop_assert_eq!(
                PredictionContext::merge(&a, &b, wildcard, None),
                PredictionContext::merge(&b, &a, wildcard, None)
            );
        }

        #[test]
        fn merge_is_idempotent(a in paths(), wildcard in any::<bool>()) {
            let a = graph(&a);
            prop_assert_eq!(PredictionContext::merge(&a, &a, wildcard, None), a);
        }

        #[test]
        fn full_context_merge_is_exact_union(a in paths(), b in paths()) {
            let (ga, gb) = (graph(&a), graph(&b));
            let merged = PredictionContext::merge(&ga, &gb, false, None);
            let expected: BTreeSet<Vec<usize>> = a
                .iter()
                .chain(b.iter())
                .map(|p| p.iter().rev().copied().collect())
                .collect();
            prop_assert_eq!(stacks(&merged), expected);
        }

        #[test]
        fn cached_merge_matches_uncached(a in paths(), b in paths(), wildcard in any::<bool>()) {
            let (a, b) = (graph(&a), graph(&b));
            let mut cache = MergeCache::default();
            prop_assert_eq!(
                PredictionContext::merge(&a, &b, wildcard, Some(&mut cache)),
                PredictionContext::merge(&a, &b, wildcard, None)
            );
        }
    }
}

use std::fmt::{self, Debug};

/// Callbacks used to evaluate semantic contexts. Implemented by the
/// recognizer that owns the prediction.
pub trait PredicateEvaluator {
    fn sempred(&mut self, rule_index: usize, pred_index: usize) -> bool;
    /// True when `precedence` is at least the precedence of the rule
    /// invocation in progress.
    fn precpred(&mut self, precedence: i32) -> bool;
}

/// A tree of predicates attached to a configuration that could not be
/// evaluated during closure.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SemanticContext {
    /// Always true.
    None,
    Predicate {
        rule_index: usize,
        pred_index: usize,
        ctx_dependent: bool,
    },
    Precedence(i32),
    And(Vec<SemanticContext>),
    Or(Vec<SemanticContext>),
}

impl Default for SemanticContext {
    fn default() -> Self {
        SemanticContext::None
    }
}

impl SemanticContext {
    pub fn is_none(&self) -> bool {
        matches!(self, SemanticContext::None)
    }

    pub fn and(a: &SemanticContext, b: &SemanticContext) -> SemanticContext {
        if a.is_none() {
            return b.clone();
        }
        if b.is_none() {
            return a.clone();
        }
        let mut operands = vec![];
        for ctx in [a, b] {
            match ctx {
                SemanticContext::And(ops) => operands.extend(ops.iter().cloned()),
                other => operands.push(other.clone()),
            }
        }
        // of several precedence predicates only the weakest one matters
        if let Some(min) = precedence_bound(&operands, true) {
            operands.retain(|o| !matches!(o, SemanticContext::Precedence(_)));
            operands.push(SemanticContext::Precedence(min));
        }
        operands.sort();
        operands.dedup();
        if operands.len() == 1 {
            return operands.pop().unwrap_or_default();
        }
        SemanticContext::And(operands)
    }

    pub fn or(a: &SemanticContext, b: &SemanticContext) -> SemanticContext {
        if a.is_none() || b.is_none() {
            return SemanticContext::None;
        }
        let mut operands = vec![];
        for ctx in [a, b] {
            match ctx {
                SemanticContext::Or(ops) => operands.extend(ops.iter().cloned()),
                other => operands.push(other.clone()),
            }
        }
        if let Some(max) = precedence_bound(&operands, false) {
            operands.retain(|o| !matches!(o, SemanticContext::Precedence(_)));
            operands.push(SemanticContext::Precedence(max));
        }
        operands.sort();
        operands.dedup();
        if operands.len() == 1 {
            return operands.pop().unwrap_or_default();
        }
        SemanticContext::Or(operands)
    }

    pub fn eval(&self, ev: &mut dyn PredicateEvaluator) -> bool {
        match self {
            SemanticContext::None => true,
            SemanticContext::Predicate {
                rule_index,
                pred_index,
                ..
            } => ev.sempred(*rule_index, *pred_index),
            SemanticContext::Precedence(p) => ev.precpred(*p),
            SemanticContext::And(ops) => ops.iter().all(|o| o.eval(ev)),
            SemanticContext::Or(ops) => ops.iter().any(|o| o.eval(ev)),
        }
    }

    /// Resolves the precedence predicates in this context against the
    /// current precedence. Returns `None` when the result is false, and
    /// `Some(SemanticContext::None)` when it is unconditionally true.
    pub fn eval_precedence(&self, ev: &mut dyn PredicateEvaluator) -> Option<SemanticContext> {
        match self {
            SemanticContext::None | SemanticContext::Predicate { .. } => Some(self.clone()),
            SemanticContext::Precedence(p) => {
                if ev.precpred(*p) {
                    Some(SemanticContext::None)
                } else {
                    None
                }
            }
            SemanticContext::And(ops) => {
                let mut differs = false;
                let mut operands = vec![];
                for ctx in ops {
                    let evaluated = ctx.eval_precedence(ev)?;
                    differs |= evaluated != *ctx;
                    if !evaluated.is_none() {
                        operands.push(evaluated);
                    }
                }
                if !differs {
                    return Some(self.clone());
                }
                Some(
                    operands
                        .iter()
                        .fold(SemanticContext::None, |acc, o| SemanticContext::and(&acc, o)),
                )
            }
            SemanticContext::Or(ops) => {
                let mut differs = false;
                let mut operands = vec![];
                for ctx in ops {
                    match ctx.eval_precedence(ev) {
                        None => differs = true,
                        Some(SemanticContext::None) => return Some(SemanticContext::None),
                        Some(evaluated) => {
                            differs |= evaluated != *ctx;
                            operands.push(evaluated);
                        }
                    }
                }
                if !differs {
                    return Some(self.clone());
                }
                let mut iter = operands.into_iter();
                let first = iter.next()?;
                Some(iter.fold(first, |acc, o| SemanticContext::or(&acc, &o)))
            }
        }
    }
}

fn precedence_bound(operands: &[SemanticContext], lowest: bool) -> Option<i32> {
    let precs = operands.iter().filter_map(|o| match o {
        SemanticContext::Precedence(p) => Some(*p),
        _ => None,
    });
    if lowest {
        precs.min()
    } else {
        precs.max()
    }
}

impl Debug for SemanticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, ops: &[SemanticContext], sep: &str| {
            for (i, o) in ops.iter().enumerate() {
                if i > 0 {
                    write!(f, "{}", sep)?;
                }
                write!(f, "{:?}", o)?;
            }
            Ok(())
        };
        match self {
            SemanticContext::None => write!(f, "true"),
            SemanticContext::Predicate {
                rule_index,
                pred_index,
                ..
            } => write!(f, "{{{}:{}}}?", rule_index, pred_index),
            SemanticContext::Precedence(p) => write!(f, "{{{}>=prec}}?", p),
            SemanticContext::And(ops) => join(f, ops, "&&"),
            SemanticContext::Or(ops) => join(f, ops, "||"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        precedence: i32,
        preds: Vec<bool>,
    }

    impl PredicateEvaluator for Fixed {
        fn sempred(&mut self, _rule_index: usize, pred_index: usize) -> bool {
            self.preds[pred_index]
        }
        fn precpred(&mut self, precedence: i32) -> bool {
            precedence >= self.precedence
        }
    }

    fn pred(i: usize) -> SemanticContext {
        SemanticContext::Predicate {
            rule_index: 0,
            pred_index: i,
            ctx_dependent: false,
        }
    }

    #[test]
    fn combinators_simplify() {
        let none = SemanticContext::None;
        assert_eq!(SemanticContext::and(&none, &pred(1)), pred(1));
        assert_eq!(SemanticContext::or(&none, &pred(1)), none);
        assert_eq!(SemanticContext::and(&pred(1), &pred(1)), pred(1));
        assert_eq!(
            SemanticContext::and(&pred(2), &pred(1)),
            SemanticContext::and(&pred(1), &pred(2))
        );
        assert_eq!(
            SemanticContext::and(
                &SemanticContext::Precedence(3),
                &SemanticContext::Precedence(1)
            ),
            SemanticContext::Precedence(1)
        );
        assert_eq!(
            SemanticContext::or(
                &SemanticContext::Precedence(3),
                &SemanticContext::Precedence(1)
            ),
            SemanticContext::Precedence(3)
        );
    }

    #[test]
    fn evaluates() {
        let mut ev = Fixed {
            precedence: 2,
            preds: vec![true, false],
        };
        let both = SemanticContext::and(&pred(0), &pred(1));
        let either = SemanticContext::or(&pred(0), &pred(1));
        assert!(!both.eval(&mut ev));
        assert!(either.eval(&mut ev));

        let p = SemanticContext::and(&pred(0), &SemanticContext::Precedence(3));
        assert_eq!(p.eval_precedence(&mut ev), Some(pred(0)));
        let q = SemanticContext::and(&pred(0), &SemanticContext::Precedence(1));
        assert_eq!(q.eval_precedence(&mut ev), None);
        assert_eq!(
            SemanticContext::Precedence(2).eval_precedence(&mut ev),
            Some(SemanticContext::None)
        );
    }
}

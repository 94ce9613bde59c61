use rustc_hash::FxHashSet;
use toktrie::SimpleVob;

use super::{Atn, IntervalSet, TransitionKind};
use crate::token;

/// Call stack used while computing lookahead. When not `exact` we do not
/// know who invoked the rule and running off the bottom yields EPSILON;
/// when `exact` it yields EOF.
struct LookStack {
    follow: Vec<usize>,
    exact: bool,
}

struct Look<'a> {
    atn: &'a Atn,
    stop_state: Option<usize>,
    busy: FxHashSet<(usize, Vec<usize>)>,
    called_rules: SimpleVob,
    result: IntervalSet,
}

/// Computes the set of tokens reachable from `state`. With
/// `follow_states` (outermost first) the stack is exact; otherwise the
/// walk stops at the end of the rule and adds `token::EPSILON`.
pub(super) fn look(
    atn: &Atn,
    state: usize,
    stop_state: Option<usize>,
    follow_states: Option<Vec<usize>>,
) -> IntervalSet {
    let mut stack = match follow_states {
        Some(follow) => LookStack {
            follow,
            exact: true,
        },
        None => LookStack {
            follow: vec![],
            exact: false,
        },
    };
    let mut l = Look {
        atn,
        stop_state,
        busy: FxHashSet::default(),
        called_rules: SimpleVob::alloc(std::cmp::max(atn.num_rules(), 1)),
        result: IntervalSet::new(),
    };
    l.walk(state, &mut stack);
    l.result
}

impl Look<'_> {
    fn walk(&mut self, s: usize, stack: &mut LookStack) {
        if !self.busy.insert((s, stack.follow.clone())) {
            return;
        }

        let at_bottom = stack.follow.is_empty();
        if Some(s) == self.stop_state && at_bottom {
            self.result.add(if stack.exact {
                token::EOF
            } else {
                token::EPSILON
            });
            return;
        }

        let state = &self.atn.states[s];
        if state.is_rule_stop() {
            if at_bottom {
                if !stack.exact {
                    self.result.add(token::EPSILON);
                } else {
                    self.result.add(token::EOF);
                }
                return;
            }
            let rule = state.rule_index.unwrap_or(0);
            let was_called = self.called_rules.get(rule);
            self.called_rules.set(rule, false);
            if let Some(ret) = stack.follow.pop() {
                self.walk(ret, stack);
                stack.follow.push(ret);
            }
            self.called_rules.set(rule, was_called);
            return;
        }

        for t in &state.transitions {
            match &t.kind {
                TransitionKind::Rule {
                    rule_index,
                    follow_state,
                    ..
                } => {
                    if self.called_rules.get(*rule_index) {
                        continue;
                    }
                    stack.follow.push(*follow_state);
                    self.called_rules.set(*rule_index, true);
                    self.walk(t.target, stack);
                    self.called_rules.set(*rule_index, false);
                    stack.follow.pop();
                }
                TransitionKind::Predicate { .. } | TransitionKind::Precedence { .. } => {
                    self.walk(t.target, stack);
                }
                TransitionKind::Epsilon { .. } | TransitionKind::Action { .. } => {
                    self.walk(t.target, stack);
                }
                TransitionKind::Wildcard => {
                    self.result
                        .add_range(token::MIN_USER_TOKEN_TYPE, self.atn.max_token_type);
                }
                TransitionKind::NotSet(set) => {
                    self.result.add_set(
                        &set.complement(token::MIN_USER_TOKEN_TYPE, self.atn.max_token_type),
                    );
                }
                _ => {
                    if let Some(label) = t.label() {
                        self.result.add_set(&label);
                    }
                }
            }
        }
    }
}

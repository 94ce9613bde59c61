//! Programmatic construction of lexer and parser automata.
//!
//! The builder lays out states the way a grammar compiler does (blocks,
//! loops, rule start/stop pairs, left-recursive rule rewriting) and emits a
//! [`CompiledGrammar`]; the automaton only becomes usable by going through
//! the deserializer, like any other compiled grammar.

use std::sync::Arc;

use anyhow::{bail, ensure, Result};

use super::{serializer, Atn, BlockKind, IntervalSet, StateKind, Transition, TransitionKind};
use crate::{
    api::{CompiledGrammar, GrammarInfo, GrammarType},
    lexer::LexerAction,
    token,
};

/// One piece of a rule body.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// A single symbol: a token type in parsers, a code point in lexers.
    Token(i32),
    /// Parser reference to a token by its symbolic name.
    TokenRef(String),
    /// Lexers match the characters; parsers look up the token whose literal
    /// name is the quoted string.
    Literal(String),
    Range(i32, i32),
    Set(IntervalSet),
    NotSet(IntervalSet),
    Wildcard,
    Eof,
    Rule {
        name: String,
        precedence: i32,
    },
    Predicate {
        pred_index: usize,
        ctx_dependent: bool,
    },
    Precedence(i32),
    /// Custom action `n` of the enclosing rule.
    Action(usize),
    LexerCmd(LexerAction),
    Seq(Vec<Element>),
    Alt(Vec<Element>),
    /// The flag is greediness.
    Optional(Box<Element>, bool),
    Star(Box<Element>, bool),
    Plus(Box<Element>, bool),
}

pub fn tok(name: &str) -> Element {
    Element::TokenRef(name.to_string())
}

pub fn lit(s: &str) -> Element {
    Element::Literal(s.to_string())
}

pub fn rule(name: &str) -> Element {
    Element::Rule {
        name: name.to_string(),
        precedence: 0,
    }
}

pub fn rule_prec(name: &str, precedence: i32) -> Element {
    Element::Rule {
        name: name.to_string(),
        precedence,
    }
}

pub fn range(a: char, b: char) -> Element {
    Element::Range(a as i32, b as i32)
}

/// Any one of the characters in `chars`.
pub fn one_of(chars: &str) -> Element {
    let mut s = IntervalSet::new();
    for c in chars.chars() {
        s.add(c as i32);
    }
    Element::Set(s)
}

/// Any character but those in `chars`.
pub fn none_of(chars: &str) -> Element {
    let mut s = IntervalSet::new();
    for c in chars.chars() {
        s.add(c as i32);
    }
    Element::NotSet(s)
}

pub fn seq(elements: Vec<Element>) -> Element {
    Element::Seq(elements)
}

pub fn alt(elements: Vec<Element>) -> Element {
    Element::Alt(elements)
}

pub fn opt(e: Element) -> Element {
    Element::Optional(Box::new(e), true)
}

pub fn star(e: Element) -> Element {
    Element::Star(Box::new(e), true)
}

pub fn plus(e: Element) -> Element {
    Element::Plus(Box::new(e), true)
}

pub fn pred(pred_index: usize) -> Element {
    Element::Predicate {
        pred_index,
        ctx_dependent: false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

/// Operator alternative of a left-recursive rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// `e op e`
    Binary(Element, Assoc),
    /// `e op`
    Suffix(Element),
}

struct RuleDef {
    name: String,
    body: Element,
    left_recursive: bool,
    fragment: bool,
    mode: usize,
    version: i32,
}

pub struct AtnBuilder {
    name: String,
    grammar_type: GrammarType,
    /// Token names a parser refers to, taken from its lexer.
    vocabulary: GrammarInfo,
    rules: Vec<RuleDef>,
    modes: Vec<String>,
}

#[derive(Clone, Copy)]
struct Handle {
    left: usize,
    right: usize,
}

impl AtnBuilder {
    pub fn lexer(name: &str) -> Self {
        AtnBuilder {
            name: name.to_string(),
            grammar_type: GrammarType::Lexer,
            vocabulary: GrammarInfo::default(),
            rules: vec![],
            modes: vec!["DEFAULT_MODE".to_string()],
        }
    }

    /// A parser over the tokens of `lexer`.
    pub fn parser(name: &str, lexer: &GrammarInfo) -> Self {
        AtnBuilder {
            name: name.to_string(),
            grammar_type: GrammarType::Parser,
            vocabulary: lexer.clone(),
            rules: vec![],
            modes: vec![],
        }
    }

    fn add_rule(&mut self, name: &str, body: Element, left_recursive: bool, fragment: bool) {
        let mode = self.modes.len().saturating_sub(1);
        self.rules.push(RuleDef {
            name: name.to_string(),
            body,
            left_recursive,
            fragment,
            mode,
            version: 0,
        });
    }

    /// Adds a rule. In lexers every non-fragment rule defines the next
    /// token type, in declaration order, within the current mode.
    pub fn rule(&mut self, name: &str, body: Element) -> &mut Self {
        self.add_rule(name, body, false, false);
        self
    }

    /// Lexer rule that only other rules can reference.
    pub fn fragment(&mut self, name: &str, body: Element) -> &mut Self {
        self.add_rule(name, body, false, true);
        self
    }

    /// Starts a new lexer mode; subsequent rules belong to it.
    pub fn mode(&mut self, name: &str) -> &mut Self {
        self.modes.push(name.to_string());
        self
    }

    pub fn set_version(&mut self, rule: &str, version: i32) -> &mut Self {
        if let Some(r) = self.rules.iter_mut().find(|r| r.name == rule) {
            r.version = version;
        }
        self
    }

    /// Adds a rule of the shape `e: e op e | e op | primary`, rewritten
    /// into a primary block followed by a precedence-guarded operator loop.
    /// Operators are listed from the tightest binding to the loosest.
    pub fn left_recursive_rule(
        &mut self,
        name: &str,
        primaries: Vec<Element>,
        ops: Vec<Operator>,
    ) -> &mut Self {
        let n = ops.len() as i32;
        let op_alts = ops
            .into_iter()
            .enumerate()
            .map(|(i, op)| {
                let prec = n - i as i32;
                match op {
                    Operator::Binary(op, assoc) => {
                        let next = match assoc {
                            Assoc::Left => prec + 1,
                            Assoc::Right => prec,
                        };
                        seq(vec![Element::Precedence(prec), op, rule_prec(name, next)])
                    }
                    Operator::Suffix(op) => seq(vec![Element::Precedence(prec), op]),
                }
            })
            .collect();
        let body = seq(vec![alt(primaries), star(alt(op_alts))]);
        self.add_rule(name, body, true, false);
        self
    }

    fn is_lexer(&self) -> bool {
        self.grammar_type == GrammarType::Lexer
    }

    fn rule_index(&self, name: &str) -> Result<usize> {
        match self.rules.iter().position(|r| r.name == name) {
            Some(i) => Ok(i),
            None => bail!("undefined rule {:?} in grammar {}", name, self.name),
        }
    }

    /// Token type of each lexer rule; fragments get 0.
    fn token_types(&self) -> Vec<i32> {
        let mut next = token::MIN_USER_TOKEN_TYPE;
        self.rules
            .iter()
            .map(|r| {
                if r.fragment {
                    token::INVALID_TYPE
                } else {
                    next += 1;
                    next - 1
                }
            })
            .collect()
    }

    fn info(&self) -> GrammarInfo {
        let mut info = GrammarInfo {
            name: self.name.clone(),
            rule_names: self.rules.iter().map(|r| r.name.clone()).collect(),
            rule_versions: self.rules.iter().map(|r| r.version).collect(),
            channel_names: vec!["DEFAULT_TOKEN_CHANNEL".to_string(), "HIDDEN".to_string()],
            ..GrammarInfo::default()
        };
        if self.is_lexer() {
            let types = self.token_types();
            let max = types.iter().copied().max().unwrap_or(0).max(0) as usize;
            info.literal_names = vec![None; max + 1];
            info.symbolic_names = vec![None; max + 1];
            for (r, &t) in self.rules.iter().zip(types.iter()) {
                if t <= 0 {
                    continue;
                }
                info.symbolic_names[t as usize] = Some(r.name.clone());
                if let Element::Literal(s) = &r.body {
                    info.literal_names[t as usize] = Some(format!("'{}'", s));
                }
            }
            info.mode_names = self.modes.clone();
        } else {
            info.literal_names = self.vocabulary.literal_names.clone();
            info.symbolic_names = self.vocabulary.symbolic_names.clone();
        }
        info
    }

    /// Rules that can match the empty input, by fixpoint.
    fn nullable_rules(&self) -> Result<Vec<bool>> {
        let mut nullable = vec![false; self.rules.len()];
        loop {
            let mut changed = false;
            for (i, r) in self.rules.iter().enumerate() {
                if !nullable[i] && self.nullable(&r.body, &nullable)? {
                    nullable[i] = true;
                    changed = true;
                }
            }
            if !changed {
                return Ok(nullable);
            }
        }
    }

    fn nullable(&self, e: &Element, rules: &[bool]) -> Result<bool> {
        Ok(match e {
            Element::Token(_)
            | Element::TokenRef(_)
            | Element::Range(..)
            | Element::Set(_)
            | Element::NotSet(_)
            | Element::Wildcard
            | Element::Eof => false,
            Element::Literal(s) => self.is_lexer() && s.is_empty(),
            Element::Rule { name, .. } => rules[self.rule_index(name)?],
            Element::Predicate { .. }
            | Element::Precedence(_)
            | Element::Action(_)
            | Element::LexerCmd(_) => true,
            Element::Seq(es) => {
                for e in es {
                    if !self.nullable(e, rules)? {
                        return Ok(false);
                    }
                }
                true
            }
            Element::Alt(es) => {
                for e in es {
                    if self.nullable(e, rules)? {
                        return Ok(true);
                    }
                }
                false
            }
            Element::Optional(..) | Element::Star(..) => true,
            Element::Plus(e, _) => self.nullable(e, rules)?,
        })
    }

    /// Loops over a body that can match nothing would never terminate.
    fn check_closures(&self, rule: &str, e: &Element, rules: &[bool]) -> Result<()> {
        match e {
            Element::Star(body, _) | Element::Plus(body, _) => {
                ensure!(
                    !self.nullable(body, rules)?,
                    "rule {} contains a closure with at least one alternative that can match an empty string",
                    rule
                );
                self.check_closures(rule, body, rules)
            }
            Element::Optional(body, _) => self.check_closures(rule, body, rules),
            Element::Seq(es) | Element::Alt(es) => {
                for e in es {
                    self.check_closures(rule, e, rules)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Lays out the automaton, encodes it and bundles it with the grammar
    /// metadata.
    pub fn build(&self) -> Result<CompiledGrammar> {
        ensure!(!self.rules.is_empty(), "grammar {} has no rules", self.name);
        let nullable = self.nullable_rules()?;
        for r in &self.rules {
            self.check_closures(&r.name, &r.body, &nullable)?;
        }

        let info = self.info();
        let atn = Layout::new(self, &info).run()?;
        for action in &atn.lexer_actions {
            if let LexerAction::Mode(m) | LexerAction::PushMode(m) = action {
                ensure!(
                    *m < self.modes.len(),
                    "grammar {}: {:?} names an unknown mode",
                    self.name,
                    action
                );
            }
        }
        Ok(CompiledGrammar {
            grammar_type: self.grammar_type,
            info,
            serialized_atn: serializer::serialize(&atn)?,
        })
    }
}

/// State layout for one grammar.
struct Layout<'a> {
    b: &'a AtnBuilder,
    info: &'a GrammarInfo,
    atn: Atn,
    rule: usize,
}

impl<'a> Layout<'a> {
    fn new(b: &'a AtnBuilder, info: &'a GrammarInfo) -> Self {
        let max_token_type = if b.is_lexer() {
            std::cmp::max(info.max_token_type(), 0)
        } else {
            std::cmp::max(b.vocabulary.max_token_type(), 0)
        };
        Layout {
            b,
            info,
            atn: Atn::new(b.grammar_type, max_token_type),
            rule: 0,
        }
    }

    fn run(mut self) -> Result<Atn> {
        let b = self.b;
        for (i, r) in b.rules.iter().enumerate() {
            let start = self.atn.add_state(
                Some(i),
                StateKind::RuleStart {
                    stop_state: usize::MAX,
                    left_recursive: r.left_recursive,
                },
            );
            let stop = self.atn.add_state(Some(i), StateKind::RuleStop);
            self.atn.states[start].kind = StateKind::RuleStart {
                stop_state: stop,
                left_recursive: r.left_recursive,
            };
            self.atn.rule_to_start_state.push(start);
            self.atn.rule_to_stop_state.push(stop);
        }

        if b.is_lexer() {
            self.atn.rule_to_token_type = b.token_types();
            for _ in &b.modes {
                let s = self.atn.add_state(None, StateKind::TokenStart);
                self.atn.mode_to_start_state.push(s);
                self.atn.define_decision_state(s);
            }
            for (i, r) in b.rules.iter().enumerate() {
                if !r.fragment {
                    let mode_start = self.atn.mode_to_start_state[r.mode];
                    let rule_start = self.atn.rule_to_start_state[i];
                    self.epsilon(mode_start, rule_start);
                }
            }
        }

        for (i, r) in b.rules.iter().enumerate() {
            self.rule = i;
            let h = self.element(&r.body)?;
            let start = self.atn.rule_to_start_state[i];
            let stop = self.atn.rule_to_stop_state[i];
            self.epsilon(start, h.left);
            self.epsilon(h.right, stop);
        }

        for s in &mut self.atn.states {
            s.update_epsilon_only();
        }
        Ok(self.atn)
    }

    fn new_state(&mut self, kind: StateKind) -> usize {
        self.atn.add_state(Some(self.rule), kind)
    }

    fn basic(&mut self) -> usize {
        self.new_state(StateKind::Basic)
    }

    fn epsilon(&mut self, from: usize, to: usize) {
        self.atn.states[from].transitions.push(Transition::epsilon(to));
    }

    fn edge(&mut self, kind: TransitionKind) -> Handle {
        let left = self.basic();
        let right = self.basic();
        self.atn.states[left]
            .transitions
            .push(Transition::new(right, kind));
        Handle { left, right }
    }

    fn set(&mut self, set: IntervalSet, negated: bool) -> Handle {
        let set = Arc::new(set);
        self.edge(if negated {
            TransitionKind::NotSet(set)
        } else {
            TransitionKind::Set(set)
        })
    }

    /// Symbols beyond the 16-bit range only fit in the encoding as sets.
    fn atom(&mut self, label: i32) -> Handle {
        if label > 0xFFFF {
            self.set(IntervalSet::of(label), false)
        } else {
            self.edge(TransitionKind::Atom { label })
        }
    }

    fn range(&mut self, from: i32, to: i32) -> Handle {
        if from == to {
            self.atom(from)
        } else if to > 0xFFFF {
            self.set(IntervalSet::of_range(from, to), false)
        } else {
            self.edge(TransitionKind::Range { from, to })
        }
    }

    fn token_type(&self, name: &str) -> Result<i32> {
        match self.b.vocabulary.token_type(name) {
            Some(t) => Ok(t),
            None => bail!(
                "rule {} refers to undefined token {:?}",
                self.info.rule_name(self.rule),
                name
            ),
        }
    }

    fn lexer_action(&mut self, action: LexerAction) -> Handle {
        let idx = match self.atn.lexer_actions.iter().position(|a| *a == action) {
            Some(i) => i,
            None => {
                self.atn.lexer_actions.push(action);
                self.atn.lexer_actions.len() - 1
            }
        };
        self.edge(TransitionKind::Action {
            rule_index: self.rule,
            action_index: Some(idx),
            ctx_dependent: false,
        })
    }

    fn element(&mut self, e: &Element) -> Result<Handle> {
        let lexer = self.b.is_lexer();
        Ok(match e {
            Element::Token(t) => self.atom(*t),
            Element::TokenRef(name) => {
                ensure!(!lexer, "token references are only valid in parsers");
                let t = self.token_type(name)?;
                self.atom(t)
            }
            Element::Literal(s) if lexer => {
                let left = self.basic();
                let mut prev = left;
                for c in s.chars() {
                    let h = self.atom(c as i32);
                    self.epsilon(prev, h.left);
                    prev = h.right;
                }
                Handle { left, right: prev }
            }
            Element::Literal(s) => {
                let t = self.token_type(&format!("'{}'", s))?;
                self.atom(t)
            }
            Element::Range(a, b) => {
                ensure!(a <= b, "empty range {}..{}", a, b);
                self.range(*a, *b)
            }
            Element::Set(s) => self.set(s.clone(), false),
            Element::NotSet(s) => self.set(s.clone(), true),
            Element::Wildcard => self.edge(TransitionKind::Wildcard),
            Element::Eof => self.atom(token::EOF),
            Element::Rule { name, precedence } => {
                let target_rule = self.b.rule_index(name)?;
                let left = self.basic();
                let right = self.basic();
                let target = self.atn.rule_to_start_state[target_rule];
                self.atn.states[left].transitions.push(Transition::new(
                    target,
                    TransitionKind::Rule {
                        rule_index: target_rule,
                        precedence: *precedence,
                        follow_state: right,
                    },
                ));
                Handle { left, right }
            }
            Element::Predicate {
                pred_index,
                ctx_dependent,
            } => self.edge(TransitionKind::Predicate {
                rule_index: self.rule,
                pred_index: *pred_index,
                ctx_dependent: *ctx_dependent,
            }),
            Element::Precedence(p) => {
                ensure!(!lexer, "precedence predicates are not supported in lexers");
                self.edge(TransitionKind::Precedence { precedence: *p })
            }
            Element::Action(idx) if lexer => self.lexer_action(LexerAction::Custom {
                rule_index: self.rule,
                action_index: *idx,
            }),
            Element::Action(idx) => self.edge(TransitionKind::Action {
                rule_index: self.rule,
                action_index: Some(*idx),
                ctx_dependent: false,
            }),
            Element::LexerCmd(a) => {
                ensure!(lexer, "lexer commands are only valid in lexers");
                self.lexer_action(a.clone())
            }
            Element::Seq(es) => {
                if es.is_empty() {
                    let left = self.basic();
                    let right = self.basic();
                    self.epsilon(left, right);
                    return Ok(Handle { left, right });
                }
                let mut handles = vec![];
                for e in es {
                    handles.push(self.element(e)?);
                }
                for w in handles.windows(2) {
                    self.epsilon(w[0].right, w[1].left);
                }
                Handle {
                    left: handles[0].left,
                    right: handles[handles.len() - 1].right,
                }
            }
            Element::Alt(es) => {
                let alts = self.alternatives(es)?;
                if alts.len() == 1 {
                    return Ok(alts[0]);
                }
                self.block(BlockKind::Basic, &alts)
            }
            Element::Optional(body, greedy) => {
                let alts = self.alternatives(block_alts(body))?;
                let h = self.block(BlockKind::Basic, &alts);
                if self.atn.states[h.left].decision.is_none() {
                    self.atn.define_decision_state(h.left);
                }
                self.atn.states[h.left].non_greedy = !greedy;
                let bypass = Transition::epsilon(h.right);
                if *greedy {
                    self.atn.states[h.left].transitions.push(bypass);
                } else {
                    self.atn.states[h.left].transitions.insert(0, bypass);
                }
                h
            }
            Element::Star(body, greedy) => {
                let alts = self.alternatives(block_alts(body))?;
                let blk = self.block(BlockKind::Star, &alts);
                let entry = self.new_state(StateKind::StarLoopEntry {
                    loop_back_state: usize::MAX,
                    precedence_decision: false,
                });
                self.atn.define_decision_state(entry);
                self.atn.states[entry].non_greedy = !greedy;
                let loop_back = self.new_state(StateKind::StarLoopBack);
                let end = self.new_state(StateKind::LoopEnd {
                    loop_back_state: loop_back,
                });
                self.atn.states[entry].kind = StateKind::StarLoopEntry {
                    loop_back_state: loop_back,
                    precedence_decision: false,
                };
                if *greedy {
                    self.epsilon(entry, blk.left);
                    self.epsilon(entry, end);
                } else {
                    self.epsilon(entry, end);
                    self.epsilon(entry, blk.left);
                }
                self.epsilon(blk.right, loop_back);
                self.epsilon(loop_back, entry);
                Handle { left: entry, right: end }
            }
            Element::Plus(body, greedy) => {
                let alts = self.alternatives(block_alts(body))?;
                let blk = self.block(BlockKind::Plus, &alts);
                let loop_back = self.new_state(StateKind::PlusLoopBack);
                self.atn.define_decision_state(loop_back);
                self.atn.states[loop_back].non_greedy = !greedy;
                let end = self.new_state(StateKind::LoopEnd {
                    loop_back_state: loop_back,
                });
                self.epsilon(blk.right, loop_back);
                if *greedy {
                    self.epsilon(loop_back, blk.left);
                    self.epsilon(loop_back, end);
                } else {
                    self.epsilon(loop_back, end);
                    self.epsilon(loop_back, blk.left);
                }
                Handle {
                    left: blk.left,
                    right: end,
                }
            }
        })
    }

    fn alternatives(&mut self, es: &[Element]) -> Result<Vec<Handle>> {
        ensure!(!es.is_empty(), "empty alternative list");
        let mut alts = vec![];
        for e in es {
            alts.push(self.element(e)?);
        }
        Ok(alts)
    }

    /// Block start and end around `alts`; a decision when there is a
    /// choice to make.
    fn block(&mut self, block: BlockKind, alts: &[Handle]) -> Handle {
        let start = self.new_state(StateKind::BlockStart {
            block,
            end_state: usize::MAX,
        });
        if alts.len() > 1 {
            self.atn.define_decision_state(start);
        }
        let end = self.new_state(StateKind::BlockEnd { start_state: start });
        self.atn.states[start].kind = StateKind::BlockStart {
            block,
            end_state: end,
        };
        for h in alts {
            self.epsilon(start, h.left);
            self.epsilon(h.right, end);
        }
        Handle { left: start, right: end }
    }
}

fn block_alts(e: &Element) -> &[Element] {
    match e {
        Element::Alt(es) => es,
        e => std::slice::from_ref(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{atn::deserializer::AtnDeserializer, lexer::LexerAction};

    fn lexer() -> CompiledGrammar {
        let mut b = AtnBuilder::lexer("L");
        b.rule("IF", lit("if"))
            .rule("ID", plus(range('a', 'z')))
            .rule("PLUS", lit("+"))
            .rule(
                "WS",
                seq(vec![plus(one_of(" \t\n")), Element::LexerCmd(LexerAction::Skip)]),
            );
        b.build().unwrap()
    }

    #[test]
    fn lexer_vocabulary() {
        let g = lexer();
        assert_eq!(g.info.token_type("ID"), Some(2));
        assert_eq!(g.info.display_name(1), "'if'");
        assert_eq!(g.info.display_name(2), "ID");
        assert_eq!(g.info.max_token_type(), 4);

        let atn = AtnDeserializer::new().deserialize(&g.serialized_atn).unwrap();
        assert!(atn.is_lexer());
        assert_eq!(atn.rule_to_token_type, vec![1, 2, 3, 4]);
        assert_eq!(atn.mode_to_start_state.len(), 1);
        assert_eq!(atn.lexer_actions, vec![LexerAction::Skip]);
        assert_eq!(atn.decision_state(0).kind, StateKind::TokenStart);
    }

    #[test]
    fn parser_round_trip() {
        let l = lexer();
        let mut b = AtnBuilder::parser("P", &l.info);
        b.rule("s", seq(vec![rule("e"), Element::Eof]))
            .left_recursive_rule(
                "e",
                vec![tok("ID")],
                vec![Operator::Binary(lit("+"), Assoc::Left)],
            );
        let g = b.build().unwrap();
        let atn = AtnDeserializer::new().deserialize(&g.serialized_atn).unwrap();
        assert_eq!(atn.num_rules(), 2);
        assert!(atn.states[atn.rule_to_start_state[1]].is_left_recursive_rule_start());
        let precedence_loops = atn
            .states
            .iter()
            .filter(|s| {
                matches!(
                    s.kind,
                    StateKind::StarLoopEntry {
                        precedence_decision: true,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(precedence_loops, 1);
        assert_eq!(serializer::serialize(&atn).unwrap(), g.serialized_atn);
    }

    #[test]
    fn rejects_nullable_closure() {
        let mut b = AtnBuilder::lexer("L");
        b.rule("A", star(opt(lit("a"))));
        let err = b.build().unwrap_err().to_string();
        assert!(err.contains("empty string"), "{}", err);
    }

    #[test]
    fn rejects_unknown_names() {
        let l = lexer();
        let mut b = AtnBuilder::parser("P", &l.info);
        b.rule("s", tok("NOPE"));
        assert!(b.build().is_err());
        let mut b = AtnBuilder::parser("P", &l.info);
        b.rule("s", rule("t"));
        assert!(b.build().is_err());
    }
}

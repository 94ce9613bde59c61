use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use super::{
    state_types as st, transition_types as tt, Atn, AtnState, BlockKind, GrammarType,
    IntervalSet, StateKind, Transition, TransitionKind,
};
use crate::{error::AtnError, lexer::LexerAction, token};

pub const SERIALIZED_VERSION: u16 = 3;

/// Feature generations of the encoding, oldest first. A feature is available
/// when the encoded UUID is at or after the UUID that introduced it.
pub const BASE_SERIALIZED_UUID: Uuid = Uuid::from_u128(0x33761B2D_78BB_4A43_8B0B_4F5BEE8AACF3);
pub const ADDED_PRECEDENCE_TRANSITIONS: Uuid =
    Uuid::from_u128(0x1DA0C57D_6C06_438A_9B27_10BCB3CE0F61);
pub const ADDED_LEXER_ACTIONS: Uuid = Uuid::from_u128(0xAADB8D7E_AEEF_4415_AD2B_8204D6CF042E);
pub const ADDED_UNICODE_SMP: Uuid = Uuid::from_u128(0x59627784_3BE5_417A_B9EB_8131A7286974);

pub const SUPPORTED_UUIDS: [Uuid; 4] = [
    BASE_SERIALIZED_UUID,
    ADDED_PRECEDENCE_TRANSITIONS,
    ADDED_LEXER_ACTIONS,
    ADDED_UNICODE_SMP,
];

/// UUID written by the serializer.
pub const SERIALIZED_UUID: Uuid = ADDED_UNICODE_SMP;

fn is_feature_supported(feature: &Uuid, actual: &Uuid) -> bool {
    let f = SUPPORTED_UUIDS.iter().position(|u| u == feature);
    let a = SUPPORTED_UUIDS.iter().position(|u| u == actual);
    match (f, a) {
        (Some(f), Some(a)) => a >= f,
        _ => false,
    }
}

fn malformed(msg: impl Into<String>) -> anyhow::Error {
    AtnError::Malformed(msg.into()).into()
}

macro_rules! check {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(malformed(format!($($arg)*)));
        }
    };
}

struct Reader<'a> {
    data: &'a [u16],
    pos: usize,
}

impl Reader<'_> {
    fn next(&mut self) -> Result<u16> {
        let v = *self
            .data
            .get(self.pos)
            .ok_or_else(|| malformed(format!("unexpected end of data at word {}", self.pos)))?;
        self.pos += 1;
        Ok(v)
    }

    fn next_usize(&mut self) -> Result<usize> {
        Ok(self.next()? as usize)
    }

    /// 0xFFFF stands for -1.
    fn next_signed(&mut self) -> Result<i32> {
        let v = self.next()?;
        Ok(if v == 0xFFFF { -1 } else { v as i32 })
    }

    fn next_u32(&mut self) -> Result<u32> {
        let lo = self.next()? as u32;
        let hi = self.next()? as u32;
        Ok(lo | (hi << 16))
    }

    fn next_uuid(&mut self) -> Result<Uuid> {
        let mut v: u128 = 0;
        for i in 0..8 {
            v |= (self.next()? as u128) << (16 * i);
        }
        Ok(Uuid::from_u128(v))
    }
}

/// Decodes the compact automaton encoding emitted by a grammar compiler.
#[derive(Debug, Clone)]
pub struct AtnDeserializer {
    verify: bool,
}

impl Default for AtnDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl AtnDeserializer {
    pub fn new() -> Self {
        AtnDeserializer { verify: true }
    }

    pub fn with_verification(verify: bool) -> Self {
        AtnDeserializer { verify }
    }

    /// Decodes words as embedded in generated code, where every word but
    /// the first is stored shifted by 2.
    pub fn deserialize_shifted(&self, data: &[u16]) -> Result<Atn> {
        let mut words = data.to_vec();
        for w in words.iter_mut().skip(1) {
            *w = w.wrapping_sub(2);
        }
        self.deserialize(&words)
    }

    pub fn deserialize(&self, data: &[u16]) -> Result<Atn> {
        let mut r = Reader { data, pos: 0 };

        let version = r.next()?;
        if version != SERIALIZED_VERSION {
            return Err(AtnError::VersionMismatch {
                found: format!("version {}", version),
                expected: format!("version {}", SERIALIZED_VERSION),
            }
            .into());
        }
        let uuid = r.next_uuid()?;
        if !SUPPORTED_UUIDS.contains(&uuid) {
            return Err(AtnError::VersionMismatch {
                found: format!("UUID {}", uuid),
                expected: format!("UUID {} or a legacy UUID", SERIALIZED_UUID),
            }
            .into());
        }
        let supports_precedence = is_feature_supported(&ADDED_PRECEDENCE_TRANSITIONS, &uuid);
        let supports_lexer_actions = is_feature_supported(&ADDED_LEXER_ACTIONS, &uuid);
        let supports_smp = is_feature_supported(&ADDED_UNICODE_SMP, &uuid);

        let grammar_type = GrammarType::from_serialized(r.next()?)
            .ok_or_else(|| malformed("unknown grammar type"))?;
        let max_token_type = r.next()? as i32;
        let mut atn = Atn::new(grammar_type, max_token_type);

        self.read_states(&mut r, &mut atn, supports_precedence)?;
        self.read_rules(&mut r, &mut atn, supports_lexer_actions)?;

        let nmodes = r.next_usize()?;
        for _ in 0..nmodes {
            let s = r.next_usize()?;
            check!(
                matches!(atn.states.get(s).map(|s| &s.kind), Some(StateKind::TokenStart)),
                "mode start {} is not a token start state",
                s
            );
            atn.mode_to_start_state.push(s);
        }

        let mut sets = vec![];
        read_sets(&mut r, &mut sets, |r| Ok(r.next()? as i32))?;
        if supports_smp {
            read_sets(&mut r, &mut sets, |r| Ok(r.next_u32()? as i32))?;
        }
        atn.sets = sets.into_iter().map(Arc::new).collect();

        self.read_edges(&mut r, &mut atn)?;
        self.derive_return_edges(&mut atn);
        self.link_blocks(&mut atn)?;

        let ndecisions = r.next_usize()?;
        for _ in 0..ndecisions {
            let s = r.next_usize()?;
            check!(
                s < atn.states.len() && atn.states[s].is_decision_state(),
                "decision state {} is not a decision state",
                s
            );
            atn.define_decision_state(s);
        }

        if atn.is_lexer() {
            if supports_lexer_actions {
                let nactions = r.next_usize()?;
                for _ in 0..nactions {
                    let ty = r.next()?;
                    let data1 = r.next_signed()?;
                    let data2 = r.next_signed()?;
                    atn.lexer_actions
                        .push(LexerAction::from_serialized(ty, data1, data2)?);
                }
            } else {
                convert_legacy_lexer_actions(&mut atn);
            }
            let nmodes = atn.mode_to_start_state.len();
            for action in &atn.lexer_actions {
                if let LexerAction::Mode(m) | LexerAction::PushMode(m) = action {
                    check!(*m < nmodes, "lexer action {:?} names unknown mode", action);
                }
            }
        }

        for s in atn.states.iter_mut() {
            s.update_epsilon_only();
        }
        mark_precedence_decisions(&mut atn);

        if r.pos != data.len() {
            return Err(malformed(format!(
                "{} trailing words after the automaton",
                data.len() - r.pos
            )));
        }

        if self.verify {
            verify_atn(&atn)?;
        }

        Ok(atn)
    }

    fn read_states(&self, r: &mut Reader, atn: &mut Atn, supports_precedence: bool) -> Result<()> {
        let nstates = r.next_usize()?;
        let mut loop_back_links = vec![];
        let mut end_links = vec![];
        for i in 0..nstates {
            let stype = r.next()?;
            if stype == st::INVALID {
                atn.states
                    .push(AtnState::new(i, None, StateKind::Invalid));
                continue;
            }
            let rule_index = match r.next()? {
                0xFFFF => None,
                v => Some(v as usize),
            };
            let kind = match stype {
                st::BASIC => StateKind::Basic,
                st::RULE_START => StateKind::RuleStart {
                    stop_state: usize::MAX,
                    left_recursive: false,
                },
                st::BLOCK_START | st::PLUS_BLOCK_START | st::STAR_BLOCK_START => {
                    end_links.push((i, r.next_usize()?));
                    StateKind::BlockStart {
                        block: match stype {
                            st::BLOCK_START => BlockKind::Basic,
                            st::PLUS_BLOCK_START => BlockKind::Plus,
                            _ => BlockKind::Star,
                        },
                        end_state: usize::MAX,
                    }
                }
                st::TOKEN_START => StateKind::TokenStart,
                st::RULE_STOP => StateKind::RuleStop,
                st::BLOCK_END => StateKind::BlockEnd {
                    start_state: usize::MAX,
                },
                st::STAR_LOOP_BACK => StateKind::StarLoopBack,
                st::STAR_LOOP_ENTRY => StateKind::StarLoopEntry {
                    loop_back_state: usize::MAX,
                    precedence_decision: false,
                },
                st::PLUS_LOOP_BACK => StateKind::PlusLoopBack,
                st::LOOP_END => {
                    loop_back_links.push((i, r.next_usize()?));
                    StateKind::LoopEnd {
                        loop_back_state: usize::MAX,
                    }
                }
                _ => return Err(malformed(format!("unknown state type {}", stype))),
            };
            atn.states.push(AtnState::new(i, rule_index, kind));
        }

        for (i, end) in end_links {
            check!(end < atn.states.len(), "block end {} out of range", end);
            if let StateKind::BlockStart { end_state, .. } = &mut atn.states[i].kind {
                *end_state = end;
            }
        }
        for (i, back) in loop_back_links {
            check!(back < atn.states.len(), "loop back {} out of range", back);
            if let StateKind::LoopEnd { loop_back_state } = &mut atn.states[i].kind {
                *loop_back_state = back;
            }
        }

        let n = r.next_usize()?;
        for _ in 0..n {
            let s = r.next_usize()?;
            check!(s < atn.states.len(), "non-greedy state {} out of range", s);
            atn.states[s].non_greedy = true;
        }

        if supports_precedence {
            let n = r.next_usize()?;
            for _ in 0..n {
                let s = r.next_usize()?;
                match atn.states.get_mut(s).map(|s| &mut s.kind) {
                    Some(StateKind::RuleStart { left_recursive, .. }) => *left_recursive = true,
                    _ => return Err(malformed(format!("precedence state {} is not a rule start", s))),
                }
            }
        }
        Ok(())
    }

    fn read_rules(&self, r: &mut Reader, atn: &mut Atn, supports_lexer_actions: bool) -> Result<()> {
        let nrules = r.next_usize()?;
        for _ in 0..nrules {
            let s = r.next_usize()?;
            check!(
                matches!(atn.states.get(s).map(|s| &s.kind), Some(StateKind::RuleStart { .. })),
                "rule start {} is not a rule start state",
                s
            );
            atn.rule_to_start_state.push(s);
            if atn.is_lexer() {
                let ttype = match r.next()? {
                    0xFFFF => token::EOF,
                    v => v as i32,
                };
                atn.rule_to_token_type.push(ttype);
                if !supports_lexer_actions {
                    // legacy action index, superseded by action transitions
                    r.next()?;
                }
            }
        }

        atn.rule_to_stop_state = vec![usize::MAX; nrules];
        for i in 0..atn.states.len() {
            if !atn.states[i].is_rule_stop() {
                continue;
            }
            let rule = atn.states[i]
                .rule_index
                .ok_or_else(|| malformed(format!("rule stop {} has no rule", i)))?;
            check!(rule < nrules, "rule stop {} names unknown rule {}", i, rule);
            atn.rule_to_stop_state[rule] = i;
            let start = atn.rule_to_start_state[rule];
            if let StateKind::RuleStart { stop_state, .. } = &mut atn.states[start].kind {
                *stop_state = i;
            }
        }
        Ok(())
    }

    fn read_edges(&self, r: &mut Reader, atn: &mut Atn) -> Result<()> {
        let nedges = r.next_usize()?;
        for _ in 0..nedges {
            let src = r.next_usize()?;
            let trg = r.next_usize()?;
            let ttype = r.next()?;
            let arg1 = r.next()?;
            let arg2 = r.next()?;
            let arg3 = r.next()?;
            check!(
                src < atn.states.len() && trg < atn.states.len(),
                "edge {} -> {} out of range",
                src,
                trg
            );
            let t = edge_factory(atn, trg, ttype, arg1, arg2, arg3)?;
            atn.states[src].transitions.push(t);
        }
        Ok(())
    }

    /// Adds the epsilon edges from each rule's stop state back to the
    /// follow states of its invocations.
    fn derive_return_edges(&self, atn: &mut Atn) {
        let mut returns = vec![];
        for s in &atn.states {
            for t in &s.transitions {
                if let TransitionKind::Rule {
                    rule_index,
                    precedence,
                    follow_state,
                } = t.kind
                {
                    let left_recursive = atn
                        .states
                        .get(atn.rule_to_start_state[rule_index])
                        .map(|s| s.is_left_recursive_rule_start())
                        .unwrap_or(false);
                    let outermost_precedence_return = if left_recursive && precedence == 0 {
                        Some(rule_index)
                    } else {
                        None
                    };
                    returns.push((
                        atn.rule_to_stop_state[rule_index],
                        Transition::new(
                            follow_state,
                            TransitionKind::Epsilon {
                                outermost_precedence_return,
                            },
                        ),
                    ));
                }
            }
        }
        for (stop, t) in returns {
            if stop < atn.states.len() {
                atn.states[stop].transitions.push(t);
            }
        }
    }

    fn link_blocks(&self, atn: &mut Atn) -> Result<()> {
        for i in 0..atn.states.len() {
            match atn.states[i].kind.clone() {
                StateKind::BlockStart { end_state, .. } => {
                    match &mut atn.states[end_state].kind {
                        StateKind::BlockEnd { start_state } => {
                            check!(
                                *start_state == usize::MAX,
                                "block end {} has two starts",
                                end_state
                            );
                            *start_state = i;
                        }
                        _ => return Err(malformed(format!("state {} is not a block end", end_state))),
                    }
                }
                StateKind::StarLoopBack => {
                    let targets: Vec<usize> =
                        atn.states[i].transitions.iter().map(|t| t.target).collect();
                    for target in targets {
                        if let StateKind::StarLoopEntry {
                            loop_back_state, ..
                        } = &mut atn.states[target].kind
                        {
                            *loop_back_state = i;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn read_sets(
    r: &mut Reader,
    sets: &mut Vec<IntervalSet>,
    read_value: impl Fn(&mut Reader) -> Result<i32>,
) -> Result<()> {
    let nsets = r.next_usize()?;
    for _ in 0..nsets {
        let nintervals = r.next_usize()?;
        let mut set = IntervalSet::new();
        if r.next()? != 0 {
            set.add(token::EOF);
        }
        for _ in 0..nintervals {
            let a = read_value(r)?;
            let b = read_value(r)?;
            set.add_range(a, b);
        }
        sets.push(set);
    }
    Ok(())
}

fn edge_factory(
    atn: &Atn,
    trg: usize,
    ttype: u16,
    arg1: u16,
    arg2: u16,
    arg3: u16,
) -> Result<Transition> {
    let kind = match ttype {
        tt::EPSILON => TransitionKind::Epsilon {
            outermost_precedence_return: None,
        },
        tt::RANGE => TransitionKind::Range {
            from: if arg3 != 0 { token::EOF } else { arg1 as i32 },
            to: arg2 as i32,
        },
        tt::RULE => {
            let start = arg1 as usize;
            check!(
                matches!(atn.states.get(start).map(|s| &s.kind), Some(StateKind::RuleStart { .. })),
                "rule transition target {} is not a rule start",
                start
            );
            check!(
                (arg2 as usize) < atn.rule_to_start_state.len(),
                "rule transition names unknown rule {}",
                arg2
            );
            return Ok(Transition::new(
                start,
                TransitionKind::Rule {
                    rule_index: arg2 as usize,
                    precedence: arg3 as i32,
                    follow_state: trg,
                },
            ));
        }
        tt::PREDICATE => TransitionKind::Predicate {
            rule_index: arg1 as usize,
            pred_index: arg2 as usize,
            ctx_dependent: arg3 != 0,
        },
        tt::PRECEDENCE => TransitionKind::Precedence {
            precedence: arg1 as i32,
        },
        tt::ATOM => TransitionKind::Atom {
            label: if arg3 != 0 { token::EOF } else { arg1 as i32 },
        },
        tt::ACTION => TransitionKind::Action {
            rule_index: arg1 as usize,
            action_index: if arg2 == 0xFFFF {
                None
            } else {
                Some(arg2 as usize)
            },
            ctx_dependent: arg3 != 0,
        },
        tt::SET | tt::NOT_SET => {
            let set = atn
                .sets
                .get(arg1 as usize)
                .cloned()
                .ok_or_else(|| malformed(format!("set {} out of range", arg1)))?;
            if ttype == tt::SET {
                TransitionKind::Set(set)
            } else {
                TransitionKind::NotSet(set)
            }
        }
        tt::WILDCARD => TransitionKind::Wildcard,
        _ => return Err(malformed(format!("unknown transition type {}", ttype))),
    };
    Ok(Transition::new(trg, kind))
}

/// Older encodings carry lexer actions as (rule, action) pairs on action
/// transitions; turn them into custom lexer actions.
fn convert_legacy_lexer_actions(atn: &mut Atn) {
    let mut actions = vec![];
    for s in atn.states.iter_mut() {
        for t in s.transitions.iter_mut() {
            if let TransitionKind::Action {
                rule_index,
                action_index,
                ..
            } = t.kind
            {
                actions.push(LexerAction::Custom {
                    rule_index,
                    action_index: action_index.unwrap_or(0),
                });
                t.kind = TransitionKind::Action {
                    rule_index,
                    action_index: Some(actions.len() - 1),
                    ctx_dependent: false,
                };
            }
        }
    }
    atn.lexer_actions = actions;
}

fn mark_precedence_decisions(atn: &mut Atn) {
    for i in 0..atn.states.len() {
        let rule = match (&atn.states[i].kind, atn.states[i].rule_index) {
            (StateKind::StarLoopEntry { .. }, Some(rule)) => rule,
            _ => continue,
        };
        let left_recursive = atn
            .rule_to_start_state
            .get(rule)
            .map(|&s| atn.states[s].is_left_recursive_rule_start())
            .unwrap_or(false);
        if !left_recursive {
            continue;
        }
        let loop_end = match atn.states[i].transitions.last() {
            Some(t) => &atn.states[t.target],
            None => continue,
        };
        let exits_rule = matches!(loop_end.kind, StateKind::LoopEnd { .. })
            && loop_end.epsilon_only_transitions
            && loop_end
                .transitions
                .first()
                .map(|t| atn.states[t.target].is_rule_stop())
                .unwrap_or(false);
        if exits_rule {
            if let StateKind::StarLoopEntry {
                precedence_decision,
                ..
            } = &mut atn.states[i].kind
            {
                *precedence_decision = true;
            }
        }
    }
}

fn verify_atn(atn: &Atn) -> Result<()> {
    for s in &atn.states {
        if matches!(s.kind, StateKind::Invalid) {
            continue;
        }
        check!(
            s.epsilon_only_transitions || s.transitions.len() <= 1,
            "state {} mixes consuming and non-consuming transitions",
            s.state_number
        );
        match &s.kind {
            StateKind::RuleStart { stop_state, .. } => {
                check!(
                    *stop_state != usize::MAX,
                    "rule start {} has no stop state",
                    s.state_number
                );
            }
            StateKind::BlockStart { end_state, .. } => {
                check!(
                    *end_state != usize::MAX,
                    "block start {} has no end state",
                    s.state_number
                );
            }
            StateKind::BlockEnd { start_state } => {
                check!(
                    *start_state != usize::MAX,
                    "block end {} has no start state",
                    s.state_number
                );
            }
            StateKind::StarLoopEntry {
                loop_back_state, ..
            } => {
                check!(
                    *loop_back_state != usize::MAX && s.transitions.len() == 2,
                    "star loop entry {} is not linked",
                    s.state_number
                );
            }
            StateKind::LoopEnd { loop_back_state } => {
                check!(
                    *loop_back_state != usize::MAX,
                    "loop end {} has no loop back",
                    s.state_number
                );
            }
            StateKind::StarLoopBack => {
                check!(
                    s.transitions.len() == 1
                        && matches!(
                            atn.states[s.transitions[0].target].kind,
                            StateKind::StarLoopEntry { .. }
                        ),
                    "star loop back {} must lead to its loop entry",
                    s.state_number
                );
            }
            StateKind::PlusLoopBack => {
                check!(
                    s.decision.is_some(),
                    "plus loop back {} is not a decision",
                    s.state_number
                );
            }
            StateKind::RuleStop => {}
            _ => {}
        }
        if s.is_decision_state() {
            check!(
                s.transitions.len() <= 1 || s.decision.is_some(),
                "state {} has several alternatives but no decision",
                s.state_number
            );
        } else {
            check!(
                s.transitions.len() <= 1 || s.is_rule_stop(),
                "non-decision state {} has several transitions",
                s.state_number
            );
        }
        if atn.is_lexer() {
            check!(
                !s.transitions
                    .iter()
                    .any(|t| matches!(t.kind, TransitionKind::Precedence { .. })),
                "precedence predicates are not supported in lexers (state {})",
                s.state_number
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(uuid: Uuid) -> Vec<u16> {
        let mut v = vec![SERIALIZED_VERSION];
        let u = uuid.as_u128();
        for i in 0..8 {
            v.push((u >> (16 * i)) as u16);
        }
        v
    }

    #[test]
    fn rejects_unknown_version() {
        let mut data = header(SERIALIZED_UUID);
        data[0] = 4;
        let err = AtnDeserializer::new().deserialize(&data).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AtnError>(),
            Some(AtnError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn rejects_unknown_uuid() {
        let data = header(Uuid::from_u128(0x1234));
        let err = AtnDeserializer::new().deserialize(&data).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AtnError>(),
            Some(AtnError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn rejects_truncated_data() {
        let mut data = header(SERIALIZED_UUID);
        data.push(1); // parser
        data.push(3); // max token type
        data.push(5); // five states, none present
        let err = AtnDeserializer::new().deserialize(&data).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AtnError>(),
            Some(AtnError::Malformed(_))
        ));
    }

    #[test]
    fn feature_ordering() {
        assert!(is_feature_supported(&ADDED_LEXER_ACTIONS, &ADDED_UNICODE_SMP));
        assert!(!is_feature_supported(&ADDED_UNICODE_SMP, &ADDED_LEXER_ACTIONS));
        assert!(is_feature_supported(&BASE_SERIALIZED_UUID, &BASE_SERIALIZED_UUID));
    }

    #[test]
    fn minimal_parser_atn() {
        // rule 0: start(0) -atom 1-> basic(2) -eps-> stop(1)
        let mut data = header(SERIALIZED_UUID);
        data.extend_from_slice(&[
            1, 1, // parser, max token type
            3, // states
            st::RULE_START, 0, st::RULE_STOP, 0, st::BASIC, 0, //
            0, // non-greedy
            0, // precedence
            1, 0, // rules
            0, // modes
            0, 0, // sets
            2, // edges
            0, 2, tt::ATOM, 1, 0, 0, //
            2, 1, tt::EPSILON, 0, 0, 0, //
            0, // decisions
        ]);
        let atn = AtnDeserializer::new().deserialize(&data).unwrap();
        assert_eq!(atn.states.len(), 3);
        assert_eq!(atn.rule_to_stop_state, vec![1]);
        assert_eq!(
            atn.states[0].kind,
            StateKind::RuleStart {
                stop_state: 1,
                left_recursive: false
            }
        );
        assert!(!atn.states[0].epsilon_only_transitions);
        assert!(atn.states[2].epsilon_only_transitions);
        assert_eq!(atn.next_tokens(0), &IntervalSet::of(1));
        assert!(atn.next_tokens(2).contains(token::EPSILON));

        let shifted: Vec<u16> = data
            .iter()
            .enumerate()
            .map(|(i, &w)| if i == 0 { w } else { w.wrapping_add(2) })
            .collect();
        let again = AtnDeserializer::new().deserialize_shifted(&shifted).unwrap();
        assert_eq!(again.states.len(), 3);
    }
}

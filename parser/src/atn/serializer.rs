use std::sync::Arc;

use anyhow::{bail, Result};

use super::{
    deserializer::{SERIALIZED_UUID, SERIALIZED_VERSION},
    Atn, IntervalSet, StateKind, TransitionKind,
};
use crate::token;

/// Encodes `atn` in the current format, the inverse of
/// [`super::deserializer::AtnDeserializer::deserialize`].
pub fn serialize(atn: &Atn) -> Result<Vec<u16>> {
    let mut w = Writer { data: vec![] };
    w.push(SERIALIZED_VERSION);
    let uuid = SERIALIZED_UUID.as_u128();
    for i in 0..8 {
        w.push((uuid >> (16 * i)) as u16);
    }
    w.push(atn.grammar_type.serialized());
    w.word(atn.max_token_type as i64)?;

    w.word(atn.states.len() as i64)?;
    for s in &atn.states {
        w.push(s.kind.serialization_type());
        if matches!(s.kind, StateKind::Invalid) {
            continue;
        }
        w.opt(s.rule_index)?;
        match s.kind {
            StateKind::LoopEnd { loop_back_state } => w.word(loop_back_state as i64)?,
            StateKind::BlockStart { end_state, .. } => w.word(end_state as i64)?,
            _ => {}
        }
    }

    let non_greedy: Vec<usize> = atn
        .states
        .iter()
        .filter(|s| s.non_greedy)
        .map(|s| s.state_number)
        .collect();
    w.list(&non_greedy)?;

    let precedence: Vec<usize> = atn
        .states
        .iter()
        .filter(|s| s.is_left_recursive_rule_start())
        .map(|s| s.state_number)
        .collect();
    w.list(&precedence)?;

    w.word(atn.rule_to_start_state.len() as i64)?;
    for (rule, &start) in atn.rule_to_start_state.iter().enumerate() {
        w.word(start as i64)?;
        if atn.is_lexer() {
            let ttype = atn.rule_to_token_type.get(rule).copied().unwrap_or(0);
            if ttype == token::EOF {
                w.push(0xFFFF);
            } else {
                w.word(ttype as i64)?;
            }
        }
    }

    w.list(&atn.mode_to_start_state)?;

    let sets = SetTable::collect(atn);
    w.word(sets.bmp.len() as i64)?;
    for set in &sets.bmp {
        w.set(set, false)?;
    }
    w.word(sets.smp.len() as i64)?;
    for set in &sets.smp {
        w.set(set, true)?;
    }

    let nedges: usize = atn
        .states
        .iter()
        .filter(|s| !s.is_rule_stop())
        .map(|s| s.transitions.len())
        .sum();
    w.word(nedges as i64)?;
    for s in atn.states.iter().filter(|s| !s.is_rule_stop()) {
        for t in &s.transitions {
            let (trg, a1, a2, a3): (usize, i64, i64, i64) = match &t.kind {
                TransitionKind::Epsilon { .. } => (t.target, 0, 0, 0),
                TransitionKind::Range { from, to } => {
                    if *from == token::EOF {
                        (t.target, 0, *to as i64, 1)
                    } else {
                        (t.target, *from as i64, *to as i64, 0)
                    }
                }
                TransitionKind::Rule {
                    rule_index,
                    precedence,
                    follow_state,
                } => (
                    *follow_state,
                    t.target as i64,
                    *rule_index as i64,
                    *precedence as i64,
                ),
                TransitionKind::Predicate {
                    rule_index,
                    pred_index,
                    ctx_dependent,
                } => (
                    t.target,
                    *rule_index as i64,
                    *pred_index as i64,
                    *ctx_dependent as i64,
                ),
                TransitionKind::Atom { label } => {
                    if *label == token::EOF {
                        (t.target, 0, 0, 1)
                    } else {
                        (t.target, *label as i64, 0, 0)
                    }
                }
                TransitionKind::Action {
                    rule_index,
                    action_index,
                    ctx_dependent,
                } => (
                    t.target,
                    *rule_index as i64,
                    action_index.map(|a| a as i64).unwrap_or(0xFFFF),
                    *ctx_dependent as i64,
                ),
                TransitionKind::Set(set) | TransitionKind::NotSet(set) => {
                    (t.target, sets.index_of(set)? as i64, 0, 0)
                }
                TransitionKind::Wildcard => (t.target, 0, 0, 0),
                TransitionKind::Precedence { precedence } => {
                    (t.target, *precedence as i64, 0, 0)
                }
            };
            w.word(s.state_number as i64)?;
            w.word(trg as i64)?;
            w.push(t.serialization_type());
            w.word(a1)?;
            w.word(a2)?;
            w.word(a3)?;
        }
    }

    w.list(&atn.decision_to_state)?;

    if atn.is_lexer() {
        w.word(atn.lexer_actions.len() as i64)?;
        for action in &atn.lexer_actions {
            let (ty, d1, d2) = action.serialized()?;
            w.push(ty);
            w.signed(d1)?;
            w.signed(d2)?;
        }
    }

    Ok(w.data)
}

/// Applies the +2 shift used when embedding an encoding in generated
/// source; every word but the first is shifted.
pub fn shift(data: &[u16]) -> Vec<u16> {
    data.iter()
        .enumerate()
        .map(|(i, &v)| if i == 0 { v } else { v.wrapping_add(2) })
        .collect()
}

struct Writer {
    data: Vec<u16>,
}

impl Writer {
    fn push(&mut self, v: u16) {
        self.data.push(v);
    }

    fn word(&mut self, v: i64) -> Result<()> {
        if !(0..0xFFFF).contains(&v) {
            bail!("value {} does not fit in a serialized word", v);
        }
        self.data.push(v as u16);
        Ok(())
    }

    fn signed(&mut self, v: i32) -> Result<()> {
        if v == -1 {
            self.push(0xFFFF);
            Ok(())
        } else {
            self.word(v as i64)
        }
    }

    fn opt(&mut self, v: Option<usize>) -> Result<()> {
        match v {
            Some(v) => self.word(v as i64),
            None => {
                self.push(0xFFFF);
                Ok(())
            }
        }
    }

    fn list(&mut self, items: &[usize]) -> Result<()> {
        self.word(items.len() as i64)?;
        for &i in items {
            self.word(i as i64)?;
        }
        Ok(())
    }

    fn value(&mut self, v: i32, smp: bool) -> Result<()> {
        if smp {
            let v = v as u32;
            self.push(v as u16);
            self.push((v >> 16) as u16);
            Ok(())
        } else {
            self.word(v as i64)
        }
    }

    fn set(&mut self, set: &IntervalSet, smp: bool) -> Result<()> {
        let intervals = set.intervals();
        let contains_eof = set.contains(token::EOF);
        let skip_first = contains_eof && intervals.first() == Some(&(token::EOF, token::EOF));
        let body = if skip_first {
            &intervals[1..]
        } else {
            intervals
        };
        self.word(body.len() as i64)?;
        self.push(contains_eof as u16);
        for &(a, b) in body {
            self.value(if a == token::EOF { 0 } else { a }, smp)?;
            self.value(b, smp)?;
        }
        Ok(())
    }
}

/// Distinct sets referenced by set transitions, split by whether every
/// value fits in one word. Indices run over the BMP sets first.
struct SetTable {
    bmp: Vec<IntervalSet>,
    smp: Vec<IntervalSet>,
}

impl SetTable {
    fn collect(atn: &Atn) -> Self {
        let mut table = SetTable {
            bmp: vec![],
            smp: vec![],
        };
        let referenced = atn.states.iter().flat_map(|s| {
            s.transitions.iter().filter_map(|t| match &t.kind {
                TransitionKind::Set(set) | TransitionKind::NotSet(set) => Some(set),
                _ => None,
            })
        });
        for set in referenced {
            let is_smp = set.max_element().unwrap_or(0) > 0xFFFF;
            let bucket = if is_smp {
                &mut table.smp
            } else {
                &mut table.bmp
            };
            if !bucket.iter().any(|s| s == &**set) {
                bucket.push((**set).clone());
            }
        }
        table
    }

    fn index_of(&self, set: &Arc<IntervalSet>) -> Result<usize> {
        if let Some(i) = self.bmp.iter().position(|s| s == &**set) {
            return Ok(i);
        }
        if let Some(i) = self.smp.iter().position(|s| s == &**set) {
            return Ok(self.bmp.len() + i);
        }
        bail!("set {} was not collected", set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_sets_use_the_flag() {
        let mut w = Writer { data: vec![] };
        let mut set = IntervalSet::of_range(3, 5);
        set.add(token::EOF);
        w.set(&set, false).unwrap();
        assert_eq!(w.data, vec![1, 1, 3, 5]);

        let mut w = Writer { data: vec![] };
        w.set(&IntervalSet::of_range(0x1F600, 0x1F64F), true).unwrap();
        assert_eq!(w.data, vec![1, 0, 0xF600, 1, 0xF64F, 1]);
    }

    #[test]
    fn shift_leaves_version_alone() {
        assert_eq!(shift(&[3, 0, 0xFFFF]), vec![3, 2, 1]);
    }

    #[test]
    fn oversized_words_are_rejected() {
        let mut w = Writer { data: vec![] };
        assert!(w.word(0x1_0000).is_err());
        assert!(w.word(-3).is_err());
    }
}

use std::{
    hash::{Hash, Hasher},
    sync::Arc,
};

use anyhow::{bail, Result};
use rustc_hash::FxHasher;

use super::{CharStream, LexerHooks, LexerState};
use crate::error::AtnError;

pub const CHANNEL: u16 = 0;
pub const CUSTOM: u16 = 1;
pub const MODE: u16 = 2;
pub const MORE: u16 = 3;
pub const POP_MODE: u16 = 4;
pub const PUSH_MODE: u16 = 5;
pub const SKIP: u16 = 6;
pub const TYPE: u16 = 7;

/// Commands a lexer rule runs once its token has been matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LexerAction {
    Channel(i32),
    /// Calls back into user code; the position in the input matters.
    Custom {
        rule_index: usize,
        action_index: usize,
    },
    Mode(usize),
    More,
    PopMode,
    PushMode(usize),
    Skip,
    Type(i32),
    /// A position-dependent action pinned to `offset` code points past the
    /// token start. Only created at runtime, never serialized.
    Indexed {
        offset: usize,
        action: Box<LexerAction>,
    },
}

impl LexerAction {
    pub fn from_serialized(ty: u16, data1: i32, data2: i32) -> Result<Self> {
        let as_index = |v: i32| -> Result<usize> {
            if v < 0 {
                bail!(AtnError::Malformed(format!(
                    "negative operand {} for lexer action {}",
                    v, ty
                )));
            }
            Ok(v as usize)
        };
        Ok(match ty {
            CHANNEL => LexerAction::Channel(data1),
            CUSTOM => LexerAction::Custom {
                rule_index: as_index(data1)?,
                action_index: as_index(data2)?,
            },
            MODE => LexerAction::Mode(as_index(data1)?),
            MORE => LexerAction::More,
            POP_MODE => LexerAction::PopMode,
            PUSH_MODE => LexerAction::PushMode(as_index(data1)?),
            SKIP => LexerAction::Skip,
            TYPE => LexerAction::Type(data1),
            _ => bail!(AtnError::Malformed(format!("unknown lexer action type {}", ty))),
        })
    }

    /// (type, data1, data2) as stored in the encoding.
    pub fn serialized(&self) -> Result<(u16, i32, i32)> {
        Ok(match self {
            LexerAction::Channel(c) => (CHANNEL, *c, 0),
            LexerAction::Custom {
                rule_index,
                action_index,
            } => (CUSTOM, *rule_index as i32, *action_index as i32),
            LexerAction::Mode(m) => (MODE, *m as i32, 0),
            LexerAction::More => (MORE, 0, 0),
            LexerAction::PopMode => (POP_MODE, 0, 0),
            LexerAction::PushMode(m) => (PUSH_MODE, *m as i32, 0),
            LexerAction::Skip => (SKIP, 0, 0),
            LexerAction::Type(t) => (TYPE, *t, 0),
            LexerAction::Indexed { .. } => bail!("indexed lexer actions are not serializable"),
        })
    }

    pub fn action_type(&self) -> u16 {
        match self {
            LexerAction::Channel(_) => CHANNEL,
            LexerAction::Custom { .. } => CUSTOM,
            LexerAction::Mode(_) => MODE,
            LexerAction::More => MORE,
            LexerAction::PopMode => POP_MODE,
            LexerAction::PushMode(_) => PUSH_MODE,
            LexerAction::Skip => SKIP,
            LexerAction::Type(_) => TYPE,
            LexerAction::Indexed { action, .. } => action.action_type(),
        }
    }

    /// Must the input sit where the action appeared in the rule when it runs?
    pub fn is_position_dependent(&self) -> bool {
        matches!(
            self,
            LexerAction::Custom { .. } | LexerAction::Indexed { .. }
        )
    }

    pub fn execute(
        &self,
        state: &mut LexerState,
        hooks: &mut dyn LexerHooks,
        input: &dyn CharStream,
    ) -> Result<()> {
        match self {
            LexerAction::Channel(c) => state.set_channel(*c),
            LexerAction::Custom {
                rule_index,
                action_index,
            } => hooks.action(state, input, *rule_index, *action_index),
            LexerAction::Mode(m) => state.set_mode(*m),
            LexerAction::More => state.more(),
            LexerAction::PopMode => {
                state.pop_mode()?;
            }
            LexerAction::PushMode(m) => state.push_mode(*m),
            LexerAction::Skip => state.skip(),
            LexerAction::Type(t) => state.set_type(*t),
            LexerAction::Indexed { action, .. } => action.execute(state, hooks, input)?,
        }
        Ok(())
    }
}

/// The actions collected along one path to an accept state, run in order
/// when that path wins.
#[derive(Debug)]
pub struct LexerActionExecutor {
    actions: Vec<LexerAction>,
    hash: u64,
}

impl LexerActionExecutor {
    pub fn new(actions: Vec<LexerAction>) -> Self {
        let mut h = FxHasher::default();
        actions.hash(&mut h);
        LexerActionExecutor {
            actions,
            hash: h.finish(),
        }
    }

    pub fn actions(&self) -> &[LexerAction] {
        &self.actions
    }

    pub fn append(executor: Option<&Arc<Self>>, action: LexerAction) -> Arc<Self> {
        let mut actions = executor.map(|e| e.actions.clone()).unwrap_or_default();
        actions.push(action);
        Arc::new(Self::new(actions))
    }

    /// Pins every position-dependent action to `offset` so that later
    /// input consumption does not move it. Returns `self` when nothing
    /// needed pinning.
    pub fn fix_offset_before_match(self: &Arc<Self>, offset: usize) -> Arc<Self> {
        if !self
            .actions
            .iter()
            .any(|a| matches!(a, LexerAction::Custom { .. }))
        {
            return self.clone();
        }
        let actions = self
            .actions
            .iter()
            .map(|a| match a {
                LexerAction::Custom { .. } => LexerAction::Indexed {
                    offset,
                    action: Box::new(a.clone()),
                },
                _ => a.clone(),
            })
            .collect();
        Arc::new(Self::new(actions))
    }

    /// Runs the actions for a token spanning `start_index..input.index()`.
    /// The input is left at the end of the token.
    pub fn execute(
        &self,
        state: &mut LexerState,
        hooks: &mut dyn LexerHooks,
        input: &mut dyn CharStream,
        start_index: usize,
    ) -> Result<()> {
        let stop_index = input.index();
        let mut requires_seek = false;
        let mut res = Ok(());
        for action in &self.actions {
            match action {
                LexerAction::Indexed { offset, .. } => {
                    let pos = start_index + offset;
                    input.seek(pos);
                    requires_seek = pos != stop_index;
                }
                a if a.is_position_dependent() => {
                    input.seek(stop_index);
                    requires_seek = false;
                }
                _ => {}
            }
            res = action.execute(state, hooks, input);
            if res.is_err() {
                break;
            }
        }
        if requires_seek || res.is_err() {
            input.seek(stop_index);
        }
        res
    }
}

impl PartialEq for LexerActionExecutor {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.actions == other.actions
    }
}

impl Eq for LexerActionExecutor {}

impl Hash for LexerActionExecutor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_custom_actions_get_pinned() {
        let e = LexerActionExecutor::append(None, LexerAction::Skip);
        let same = e.fix_offset_before_match(3);
        assert!(Arc::ptr_eq(&e, &same));

        let e = LexerActionExecutor::append(
            Some(&e),
            LexerAction::Custom {
                rule_index: 0,
                action_index: 1,
            },
        );
        let pinned = e.fix_offset_before_match(2);
        assert_eq!(pinned.actions()[0], LexerAction::Skip);
        assert!(matches!(
            pinned.actions()[1],
            LexerAction::Indexed { offset: 2, .. }
        ));
        // already pinned actions are left alone
        let again = pinned.fix_offset_before_match(5);
        assert!(Arc::ptr_eq(&pinned, &again));
    }

    #[test]
    fn serialized_form() {
        for a in [
            LexerAction::Channel(2),
            LexerAction::PushMode(1),
            LexerAction::Type(7),
            LexerAction::More,
        ] {
            let (ty, d1, d2) = a.serialized().unwrap();
            assert_eq!(LexerAction::from_serialized(ty, d1, d2).unwrap(), a);
        }
        assert!(LexerAction::from_serialized(9, 0, 0).is_err());
    }
}

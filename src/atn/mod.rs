// src/atn/mod.rs
//! The automaton model: an arena of states whose transition lists keep
//! insertion order, plus the rule, mode and decision tables.

pub mod describe;
pub mod interval_set;
pub mod io;
pub mod lexer_action;
pub mod printer;
pub mod serialize;
pub mod state;
pub mod transition;

use std::{
    fmt,
    ops::{Index, IndexMut},
    str::FromStr,
};

pub use interval_set::{Interval, IntervalSet};
pub use lexer_action::LexerAction;
use serde::{Deserialize, Serialize};
pub use state::{State, StateId, StateKind};
pub use transition::{Transition, TransitionKind};

use crate::tool::errors::AtnError;

pub const EOF: i32 = -1;
pub const EPSILON: i32 = -2;
pub const INVALID_TYPE: i32 = 0;
pub const MIN_USER_TOKEN_TYPE: i32 = 1;
pub const MIN_CHAR_VALUE: i32 = 0;
pub const MAX_CHAR_VALUE: i32 = 0x10FFFF;
pub const SERIALIZED_VERSION: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrammarType {
    Lexer,
    Parser,
}

impl GrammarType {
    pub fn code(self) -> i32 {
        match self {
            GrammarType::Lexer => 0,
            GrammarType::Parser => 1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(GrammarType::Lexer),
            1 => Some(GrammarType::Parser),
            _ => None,
        }
    }
}

impl fmt::Display for GrammarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GrammarType::Lexer => "lexer",
            GrammarType::Parser => "parser",
        })
    }
}

impl FromStr for GrammarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lexer" => Ok(GrammarType::Lexer),
            "parser" => Ok(GrammarType::Parser),
            other => Err(format!("unknown grammar type '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Atn {
    pub grammar_type: GrammarType,
    pub max_token_type: i32,
    states: Vec<Option<State>>,
    pub decision_to_state: Vec<StateId>,
    pub rule_to_start_state: Vec<StateId>,
    pub rule_to_stop_state: Vec<StateId>,
    /// Lexer only; 0 for fragments.
    pub rule_to_token_type: Vec<i32>,
    pub mode_to_start_state: Vec<StateId>,
    pub lexer_actions: Vec<LexerAction>,
}

impl Atn {
    pub fn new(grammar_type: GrammarType, max_token_type: i32) -> Self {
        Self {
            grammar_type,
            max_token_type,
            states: Vec::new(),
            decision_to_state: Vec::new(),
            rule_to_start_state: Vec::new(),
            rule_to_stop_state: Vec::new(),
            rule_to_token_type: Vec::new(),
            mode_to_start_state: Vec::new(),
            lexer_actions: Vec::new(),
        }
    }

    pub fn add_state(&mut self, kind: StateKind, rule_index: i32) -> StateId {
        let id = StateId(self.states.len());
        self.states.push(Some(State::new(id, kind, rule_index)));
        id
    }

    /// Empties the slot; ids of other states are untouched.
    pub fn remove_state(&mut self, id: StateId) {
        if let Some(slot) = self.states.get_mut(id.index()) {
            *slot = None;
        }
    }

    #[inline]
    pub fn get(&self, id: StateId) -> Option<&State> {
        self.states.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, id: StateId) -> Option<&mut State> {
        self.states.get_mut(id.index()).and_then(Option::as_mut)
    }

    #[inline]
    pub fn contains(&self, id: StateId) -> bool {
        self.get(id).is_some()
    }

    /// All slots, including holes left by removed states.
    #[inline]
    pub fn slots(&self) -> &[Option<State>] {
        &self.states
    }

    pub fn states(&self) -> impl Iterator<Item = &State> + '_ {
        self.states.iter().flatten()
    }

    pub fn num_states(&self) -> usize {
        self.states.iter().filter(|s| s.is_some()).count()
    }

    /// Appends unless an equivalent edge to the same target exists: equal
    /// labels, or both epsilon-like.
    pub fn add_transition(&mut self, from: StateId, t: Transition) {
        let end = self[from].transitions.len();
        self.insert_transition(from, end, t);
    }

    /// Same duplicate rule as `add_transition`.
    pub fn insert_transition(&mut self, from: StateId, index: usize, t: Transition) {
        let state = &mut self[from];
        let present = state.transitions.iter().any(|existing| {
            existing.target == t.target
                && match (existing.label(), t.label()) {
                    (Some(a), Some(b)) => a == b,
                    _ => existing.is_epsilon() && t.is_epsilon(),
                }
        });
        if !present {
            let index = index.min(state.transitions.len());
            state.transitions.insert(index, t);
        }
    }

    pub fn set_transition(&mut self, from: StateId, index: usize, t: Transition) {
        self[from].transitions[index] = t;
    }

    pub fn remove_transition(&mut self, from: StateId, index: usize) -> Transition {
        self[from].transitions.remove(index)
    }

    /// Registers `id` as the next decision and returns its number.
    pub fn define_decision_state(&mut self, id: StateId) -> i32 {
        let decision = self.decision_to_state.len() as i32;
        self.decision_to_state.push(id);
        self[id].decision = decision;
        decision
    }

    pub fn is_left_recursive_rule(&self, rule_index: usize) -> bool {
        self.rule_to_start_state
            .get(rule_index)
            .and_then(|&s| self.get(s))
            .is_some_and(|s| s.left_recursive)
    }

    /// Drops removed slots and renumbers survivors in creation order.
    /// Returns the old-index to new-id map.
    pub fn compact(&mut self) -> Result<Vec<Option<StateId>>, AtnError> {
        let mut remap = Vec::with_capacity(self.states.len());
        let mut next = 0usize;
        for slot in &self.states {
            if slot.is_some() {
                remap.push(Some(StateId(next)));
                next += 1;
            } else {
                remap.push(None);
            }
        }
        let map = |id: StateId| remap.get(id.index()).copied().flatten();
        let lookup = |id: StateId, what: &str| {
            map(id).ok_or_else(|| AtnError::Internal(format!("{what} refers to removed state {id}")))
        };

        let old = std::mem::take(&mut self.states);
        let mut compacted = Vec::with_capacity(next);
        for mut state in old.into_iter().flatten() {
            let from = state.id;
            state.id = lookup(from, "state")?;
            for t in &mut state.transitions {
                let target = t.target;
                t.remap(&map).ok_or_else(|| {
                    AtnError::Internal(format!("edge {from}->{target} targets a removed state"))
                })?;
            }
            state.end_state = state.end_state.and_then(map);
            state.start_state = state.start_state.and_then(map);
            state.loop_back = state.loop_back.and_then(map);
            state.stop_state = state.stop_state.and_then(map);
            compacted.push(Some(state));
        }
        self.states = compacted;

        for s in self.decision_to_state.iter_mut() {
            *s = lookup(*s, "decision")?;
        }
        for s in self.rule_to_start_state.iter_mut() {
            *s = lookup(*s, "rule start")?;
        }
        for s in self.rule_to_stop_state.iter_mut() {
            *s = lookup(*s, "rule stop")?;
        }
        for s in self.mode_to_start_state.iter_mut() {
            *s = lookup(*s, "mode start")?;
        }
        Ok(remap)
    }
}

impl Index<StateId> for Atn {
    type Output = State;

    fn index(&self, id: StateId) -> &State {
        match self.get(id) {
            Some(s) => s,
            None => panic!("state {id} was removed"),
        }
    }
}

impl IndexMut<StateId> for Atn {
    fn index_mut(&mut self, id: StateId) -> &mut State {
        match self.get_mut(id) {
            Some(s) => s,
            None => panic!("state {id} was removed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_epsilon_edges_are_suppressed() {
        let mut atn = Atn::new(GrammarType::Parser, 1);
        let a = atn.add_state(StateKind::Basic, 0);
        let b = atn.add_state(StateKind::Basic, 0);
        atn.add_transition(a, Transition::epsilon(b));
        atn.add_transition(a, Transition::epsilon(b));
        atn.add_transition(a, Transition::atom(b, 1));
        atn.add_transition(a, Transition::atom(b, 1));
        assert_eq!(atn[a].num_transitions(), 2);
    }

    #[test]
    fn compact_renumbers_survivors() {
        let mut atn = Atn::new(GrammarType::Parser, 1);
        let a = atn.add_state(StateKind::Basic, 0);
        let gone = atn.add_state(StateKind::Basic, 0);
        let c = atn.add_state(StateKind::Basic, 0);
        atn.add_transition(a, Transition::epsilon(c));
        atn.remove_state(gone);
        let remap = atn.compact().expect("compact");
        assert_eq!(remap, vec![Some(StateId(0)), None, Some(StateId(1))]);
        assert_eq!(atn[StateId(0)].transition(0).target, StateId(1));
        assert_eq!(atn.num_states(), 2);
    }

    #[test]
    fn compact_rejects_dangling_edges() {
        let mut atn = Atn::new(GrammarType::Parser, 1);
        let a = atn.add_state(StateKind::Basic, 0);
        let b = atn.add_state(StateKind::Basic, 0);
        atn.add_transition(a, Transition::epsilon(b));
        atn.remove_state(b);
        assert!(atn.compact().is_err());
    }
}

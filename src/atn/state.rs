// src/atn/state.rs
use std::fmt;

use super::transition::Transition;

/// Index of a state inside its owning `Atn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub usize);

impl StateId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    Basic,
    RuleStart,
    BlockStart,
    PlusBlockStart,
    StarBlockStart,
    TokenStart,
    RuleStop,
    BlockEnd,
    StarLoopBack,
    StarLoopEntry,
    PlusLoopBack,
    LoopEnd,
}

/// Serialized code of a removed slot.
pub const INVALID_STATE_CODE: i32 = 0;

impl StateKind {
    pub fn code(self) -> i32 {
        match self {
            StateKind::Basic => 1,
            StateKind::RuleStart => 2,
            StateKind::BlockStart => 3,
            StateKind::PlusBlockStart => 4,
            StateKind::StarBlockStart => 5,
            StateKind::TokenStart => 6,
            StateKind::RuleStop => 7,
            StateKind::BlockEnd => 8,
            StateKind::StarLoopBack => 9,
            StateKind::StarLoopEntry => 10,
            StateKind::PlusLoopBack => 11,
            StateKind::LoopEnd => 12,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            1 => StateKind::Basic,
            2 => StateKind::RuleStart,
            3 => StateKind::BlockStart,
            4 => StateKind::PlusBlockStart,
            5 => StateKind::StarBlockStart,
            6 => StateKind::TokenStart,
            7 => StateKind::RuleStop,
            8 => StateKind::BlockEnd,
            9 => StateKind::StarLoopBack,
            10 => StateKind::StarLoopEntry,
            11 => StateKind::PlusLoopBack,
            12 => StateKind::LoopEnd,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            StateKind::Basic => "BASIC",
            StateKind::RuleStart => "RULE_START",
            StateKind::BlockStart => "BLOCK_START",
            StateKind::PlusBlockStart => "PLUS_BLOCK_START",
            StateKind::StarBlockStart => "STAR_BLOCK_START",
            StateKind::TokenStart => "TOKEN_START",
            StateKind::RuleStop => "RULE_STOP",
            StateKind::BlockEnd => "BLOCK_END",
            StateKind::StarLoopBack => "STAR_LOOP_BACK",
            StateKind::StarLoopEntry => "STAR_LOOP_ENTRY",
            StateKind::PlusLoopBack => "PLUS_LOOP_BACK",
            StateKind::LoopEnd => "LOOP_END",
        }
    }

    #[inline]
    pub fn is_block_start(self) -> bool {
        matches!(
            self,
            StateKind::BlockStart | StateKind::PlusBlockStart | StateKind::StarBlockStart
        )
    }

    /// Kinds that may carry a decision number.
    #[inline]
    pub fn is_decision(self) -> bool {
        self.is_block_start()
            || matches!(
                self,
                StateKind::TokenStart | StateKind::StarLoopEntry | StateKind::PlusLoopBack
            )
    }
}

#[derive(Debug, Clone)]
pub struct State {
    pub id: StateId,
    pub kind: StateKind,
    /// Owning rule, or -1.
    pub rule_index: i32,
    pub transitions: Vec<Transition>,
    pub non_greedy: bool,
    /// Decision number, or -1.
    pub decision: i32,
    // block starts
    pub end_state: Option<StateId>,
    // block ends
    pub start_state: Option<StateId>,
    // plus block starts, star loop entries, loop backs, loop ends
    pub loop_back: Option<StateId>,
    // rule starts
    pub stop_state: Option<StateId>,
    pub left_recursive: bool,
    // star loop entries
    pub precedence_decision: bool,
}

impl State {
    pub fn new(id: StateId, kind: StateKind, rule_index: i32) -> Self {
        Self {
            id,
            kind,
            rule_index,
            transitions: Vec::new(),
            non_greedy: false,
            decision: -1,
            end_state: None,
            start_state: None,
            loop_back: None,
            stop_state: None,
            left_recursive: false,
            precedence_decision: false,
        }
    }

    #[inline]
    pub fn transition(&self, i: usize) -> &Transition {
        &self.transitions[i]
    }

    #[inline]
    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    pub fn only_epsilon_transitions(&self) -> bool {
        self.transitions.iter().all(|t| t.is_epsilon())
    }
}

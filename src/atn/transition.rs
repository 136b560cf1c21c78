// src/atn/transition.rs
use std::fmt;

use super::{interval_set::IntervalSet, state::StateId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionKind {
    /// `outermost_precedence_return` is the rule index for return edges out
    /// of a left-recursive rule invoked at precedence 0, else -1.
    Epsilon { outermost_precedence_return: i32 },
    Range { from: i32, to: i32 },
    /// Target is the invoked rule's start state.
    Rule { rule_index: usize, precedence: i32, follow: StateId },
    Predicate { rule_index: i32, pred_index: i32, ctx_dependent: bool },
    Atom(i32),
    Action { rule_index: i32, action_index: i32, ctx_dependent: bool },
    Set(IntervalSet),
    NotSet(IntervalSet),
    Wildcard,
    Precedence(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub target: StateId,
    pub kind: TransitionKind,
}

impl Transition {
    pub fn new(target: StateId, kind: TransitionKind) -> Self {
        Self { target, kind }
    }

    pub fn epsilon(target: StateId) -> Self {
        Self::new(target, TransitionKind::Epsilon { outermost_precedence_return: -1 })
    }

    pub fn atom(target: StateId, label: i32) -> Self {
        Self::new(target, TransitionKind::Atom(label))
    }

    /// Single code point, or a range when `from != to`.
    pub fn code_point_range(target: StateId, from: i32, to: i32) -> Self {
        if from == to {
            Self::atom(target, from)
        } else {
            Self::new(target, TransitionKind::Range { from, to })
        }
    }

    pub fn code(&self) -> i32 {
        match self.kind {
            TransitionKind::Epsilon { .. } => 1,
            TransitionKind::Range { .. } => 2,
            TransitionKind::Rule { .. } => 3,
            TransitionKind::Predicate { .. } => 4,
            TransitionKind::Atom(_) => 5,
            TransitionKind::Action { .. } => 6,
            TransitionKind::Set(_) => 7,
            TransitionKind::NotSet(_) => 8,
            TransitionKind::Wildcard => 9,
            TransitionKind::Precedence(_) => 10,
        }
    }

    pub fn code_name(code: i32) -> &'static str {
        match code {
            1 => "EPSILON",
            2 => "RANGE",
            3 => "RULE",
            4 => "PREDICATE",
            5 => "ATOM",
            6 => "ACTION",
            7 => "SET",
            8 => "NOT_SET",
            9 => "WILDCARD",
            10 => "PRECEDENCE",
            _ => "INVALID",
        }
    }

    /// Epsilon-like edges consume no input.
    pub fn is_epsilon(&self) -> bool {
        matches!(
            self.kind,
            TransitionKind::Epsilon { .. }
                | TransitionKind::Rule { .. }
                | TransitionKind::Predicate { .. }
                | TransitionKind::Action { .. }
                | TransitionKind::Precedence(_)
        )
    }

    pub fn label(&self) -> Option<IntervalSet> {
        match &self.kind {
            TransitionKind::Atom(v) => Some(IntervalSet::of(*v)),
            TransitionKind::Range { from, to } => Some(IntervalSet::of_range(*from, *to)),
            TransitionKind::Set(s) | TransitionKind::NotSet(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Follow state of a rule invocation.
    pub fn follow(&self) -> Option<StateId> {
        match self.kind {
            TransitionKind::Rule { follow, .. } => Some(follow),
            _ => None,
        }
    }

    pub(crate) fn remap(&mut self, map: &impl Fn(StateId) -> Option<StateId>) -> Option<()> {
        self.target = map(self.target)?;
        if let TransitionKind::Rule { follow, .. } = &mut self.kind {
            *follow = map(*follow)?;
        }
        Some(())
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TransitionKind::Epsilon { .. } => f.write_str("epsilon"),
            TransitionKind::Range { from, to } => {
                let c = |v: i32| char::from_u32(v as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
                write!(f, "'{}'..'{}'", c(*from), c(*to))
            }
            TransitionKind::Rule { rule_index, .. } => write!(f, "rule_{rule_index}"),
            TransitionKind::Predicate { rule_index, pred_index, .. } => {
                write!(f, "pred_{rule_index}:{pred_index}")
            }
            TransitionKind::Atom(v) => write!(f, "{v}"),
            TransitionKind::Action { rule_index, action_index, .. } => {
                write!(f, "action_{rule_index}:{action_index}")
            }
            TransitionKind::Set(s) => write!(f, "{s}"),
            TransitionKind::NotSet(s) => write!(f, "~{s}"),
            TransitionKind::Wildcard => f.write_str("."),
            TransitionKind::Precedence(p) => write!(f, "{p} >= _p"),
        }
    }
}

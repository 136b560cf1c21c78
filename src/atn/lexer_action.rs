// src/atn/lexer_action.rs
use serde::{Deserialize, Serialize};

/// Actions attached to lexer rules, either from `-> command` or `{...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LexerAction {
    Channel { channel: i32 },
    Custom { rule_index: i32, action_index: i32 },
    Mode { mode: i32 },
    More,
    PopMode,
    PushMode { mode: i32 },
    Skip,
    Type { token_type: i32 },
}

impl LexerAction {
    pub fn code(&self) -> i32 {
        match self {
            LexerAction::Channel { .. } => 0,
            LexerAction::Custom { .. } => 1,
            LexerAction::Mode { .. } => 2,
            LexerAction::More => 3,
            LexerAction::PopMode => 4,
            LexerAction::PushMode { .. } => 5,
            LexerAction::Skip => 6,
            LexerAction::Type { .. } => 7,
        }
    }

    /// `(data1, data2)` as written by the serializer.
    pub fn data(&self) -> (i32, i32) {
        match *self {
            LexerAction::Channel { channel } => (channel, 0),
            LexerAction::Custom { rule_index, action_index } => (rule_index, action_index),
            LexerAction::Mode { mode } | LexerAction::PushMode { mode } => (mode, 0),
            LexerAction::Type { token_type } => (token_type, 0),
            LexerAction::More | LexerAction::PopMode | LexerAction::Skip => (0, 0),
        }
    }

    pub fn from_parts(code: i32, data1: i32, data2: i32) -> Option<Self> {
        Some(match code {
            0 => LexerAction::Channel { channel: data1 },
            1 => LexerAction::Custom { rule_index: data1, action_index: data2 },
            2 => LexerAction::Mode { mode: data1 },
            3 => LexerAction::More,
            4 => LexerAction::PopMode,
            5 => LexerAction::PushMode { mode: data1 },
            6 => LexerAction::Skip,
            7 => LexerAction::Type { token_type: data1 },
            _ => return None,
        })
    }
}

// src/tool/errors.rs
use std::fmt;

use log::{error, warn};

use crate::grammar::ast::SourcePos;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UndefinedRuleRef,
    ExpectedNonGreedyWildcardBlock,
    InvalidLiteralInLexerSet,
    EpsilonLrFollow,
    InvalidLexerCommand,
    MissingLexerCommandArgument,
    UnwantedLexerCommandArgument,
    EpsilonClosure,
    EpsilonOptional,
    InvalidEscapeSequence,
    TokenConflictsWithCommonConstants,
    ChannelConflictsWithCommonConstants,
    ModeConflictsWithCommonConstants,
    EmptyStringsAndSetsNotAllowed,
    ConstantValueIsNotARecognizedModeName,
    ConstantValueIsNotARecognizedTokenName,
    ConstantValueIsNotARecognizedChannelName,
    DuplicatedCommand,
    IncompatibleCommands,
    CharactersCollisionInSet,
    TokenRangeInParser,
    UnicodePropertyNotAllowedInRange,
    UnsupportedReferenceInLexerSet,
    EofClosure,
}

impl ErrorKind {
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::UndefinedRuleRef => 56,
            ErrorKind::ExpectedNonGreedyWildcardBlock => 131,
            ErrorKind::InvalidLiteralInLexerSet => 144,
            ErrorKind::EpsilonLrFollow => 148,
            ErrorKind::InvalidLexerCommand => 149,
            ErrorKind::MissingLexerCommandArgument => 150,
            ErrorKind::UnwantedLexerCommandArgument => 151,
            ErrorKind::EpsilonClosure => 153,
            ErrorKind::EpsilonOptional => 154,
            ErrorKind::InvalidEscapeSequence => 156,
            ErrorKind::TokenConflictsWithCommonConstants => 171,
            ErrorKind::ChannelConflictsWithCommonConstants => 172,
            ErrorKind::ModeConflictsWithCommonConstants => 173,
            ErrorKind::EmptyStringsAndSetsNotAllowed => 174,
            ErrorKind::ConstantValueIsNotARecognizedModeName => 175,
            ErrorKind::ConstantValueIsNotARecognizedTokenName => 176,
            ErrorKind::ConstantValueIsNotARecognizedChannelName => 177,
            ErrorKind::DuplicatedCommand => 178,
            ErrorKind::IncompatibleCommands => 179,
            ErrorKind::CharactersCollisionInSet => 180,
            ErrorKind::TokenRangeInParser => 181,
            ErrorKind::UnicodePropertyNotAllowedInRange => 182,
            ErrorKind::UnsupportedReferenceInLexerSet => 183,
            ErrorKind::EofClosure => 186,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            ErrorKind::ExpectedNonGreedyWildcardBlock
            | ErrorKind::EpsilonOptional
            | ErrorKind::DuplicatedCommand
            | ErrorKind::IncompatibleCommands
            | ErrorKind::CharactersCollisionInSet => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Message template; `<0>`, `<1>` are replaced by the diagnostic args.
    fn template(self) -> &'static str {
        match self {
            ErrorKind::UndefinedRuleRef => "reference to undefined rule: <0>",
            ErrorKind::ExpectedNonGreedyWildcardBlock => {
                "greedy block ()<0> contains wildcard; the non-greedy syntax ()<0>? may be preferred"
            }
            ErrorKind::InvalidLiteralInLexerSet => {
                "multi-character literals are not allowed in lexer sets: <0>"
            }
            ErrorKind::EpsilonLrFollow => {
                "rule <0> contains a closure with at least one alternative that can match an empty string"
            }
            ErrorKind::InvalidLexerCommand => "lexer command <0> does not exist or is not supported",
            ErrorKind::MissingLexerCommandArgument => "missing argument for lexer command <0>",
            ErrorKind::UnwantedLexerCommandArgument => "lexer command <0> does not take any arguments",
            ErrorKind::EpsilonClosure => {
                "rule <0> contains a closure with at least one alternative that can match an empty string"
            }
            ErrorKind::EpsilonOptional => {
                "rule <0> contains an optional block with at least one alternative that can match an empty string"
            }
            ErrorKind::InvalidEscapeSequence => "invalid escape sequence <0>",
            ErrorKind::TokenConflictsWithCommonConstants => {
                "cannot use or declare token with reserved name <0>"
            }
            ErrorKind::ChannelConflictsWithCommonConstants => {
                "cannot use or declare channel with reserved name <0>"
            }
            ErrorKind::ModeConflictsWithCommonConstants => {
                "cannot use or declare mode with reserved name <0>"
            }
            ErrorKind::EmptyStringsAndSetsNotAllowed => {
                "string literals and sets cannot be empty: <0>"
            }
            ErrorKind::ConstantValueIsNotARecognizedModeName => {
                "<0> is not a recognized mode name"
            }
            ErrorKind::ConstantValueIsNotARecognizedTokenName => {
                "<0> is not a recognized token name"
            }
            ErrorKind::ConstantValueIsNotARecognizedChannelName => {
                "<0> is not a recognized channel name"
            }
            ErrorKind::DuplicatedCommand => "duplicated command <0>",
            ErrorKind::IncompatibleCommands => "incompatible commands <0> and <1>",
            ErrorKind::CharactersCollisionInSet => "chars <0> used multiple times in set <1>",
            ErrorKind::TokenRangeInParser => "token ranges not allowed in parser: <0>..<1>",
            ErrorKind::UnicodePropertyNotAllowedInRange => {
                "unicode property escapes not allowed in lexer charset range: <0>"
            }
            ErrorKind::UnsupportedReferenceInLexerSet => {
                "reference to token <0> is not supported in a lexer set"
            }
            ErrorKind::EofClosure => "rule <0> contains a closure with at least one alternative that can match EOF",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub file_name: String,
    pub pos: Option<SourcePos>,
    pub args: Vec<String>,
}

impl Diagnostic {
    pub fn message(&self) -> String {
        let mut msg = self.kind.template().to_string();
        for (i, arg) in self.args.iter().enumerate() {
            msg = msg.replace(&format!("<{i}>"), arg);
        }
        msg
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.kind.severity() {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level}({}): {}", self.kind.code(), self.file_name)?;
        if let Some(pos) = self.pos {
            write!(f, ":{}:{}", pos.line, pos.column)?;
        }
        write!(f, ": {}", self.message())
    }
}

/// Receiver of every user-facing report made while building an ATN.
pub trait ErrorSink {
    fn report(&mut self, diagnostic: Diagnostic);

    fn grammar_error(
        &mut self,
        kind: ErrorKind,
        file_name: &str,
        pos: Option<SourcePos>,
        args: &[&str],
    ) {
        self.report(Diagnostic {
            kind,
            file_name: file_name.to_string(),
            pos,
            args: args.iter().map(|a| a.to_string()).collect(),
        });
    }
}

/// Collects diagnostics in report order and mirrors them to `log`.
#[derive(Debug, Default)]
pub struct ErrorManager {
    pub diagnostics: Vec<Diagnostic>,
    pub errors: usize,
    pub warnings: usize,
}

impl ErrorManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.diagnostics.iter().map(|d| d.kind).collect()
    }
}

impl ErrorSink for ErrorManager {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.kind.severity() {
            Severity::Warning => {
                self.warnings += 1;
                warn!("{diagnostic}");
            }
            Severity::Error => {
                self.errors += 1;
                error!("{diagnostic}");
            }
        }
        self.diagnostics.push(diagnostic);
    }
}

/// Failures that stop a compilation instead of being reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtnError {
    /// A construction invariant broke; indicates a bug, not a grammar problem.
    Internal(String),
    Serialization(String),
    Syntax { line: usize, column: usize, message: String },
}

impl fmt::Display for AtnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtnError::Internal(m) => write!(f, "internal error: {m}"),
            AtnError::Serialization(m) => write!(f, "serialization error: {m}"),
            AtnError::Syntax { line, column, message } => {
                write!(f, "syntax error at {line}:{column}: {message}")
            }
        }
    }
}

impl std::error::Error for AtnError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_counts_by_severity() {
        let mut em = ErrorManager::new();
        em.grammar_error(ErrorKind::EpsilonClosure, "T.g4", None, &["y"]);
        em.grammar_error(ErrorKind::EpsilonOptional, "T.g4", None, &["a"]);
        assert_eq!((em.errors, em.warnings), (1, 1));
        assert_eq!(
            em.diagnostics[0].message(),
            "rule y contains a closure with at least one alternative that can match an empty string"
        );
    }
}

// src/automata/mod.rs
//! Grammar to ATN construction. `builder` walks rule bodies and calls into an
//! `ElementFactory`; the parser and lexer factories share `FactoryCore` for
//! the combinators and differ in how they build terminal elements.

pub mod builder;
pub mod factory;
pub mod lexer_factory;
pub mod optimizer;
pub mod parser_factory;
pub mod tail_epsilon;

use hashbrown::HashMap;

pub use self::factory::FactoryCore;
use crate::{
    atn::{Atn, StateId},
    grammar::{Grammar, ast::NodeId},
    tool::{
        errors::{AtnError, ErrorSink},
        options::ToolOptions,
    },
};

/// Entry and exit of a constructed sub-automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    pub left: StateId,
    pub right: StateId,
}

impl Handle {
    pub fn new(left: StateId, right: StateId) -> Self {
        Self { left, right }
    }
}

/// A block queued for an emptiness check once the ATN is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCheck {
    pub rule: usize,
    pub entry: StateId,
    pub exit: StateId,
}

#[derive(Debug, Clone)]
pub struct BuiltAtn {
    pub atn: Atn,
    /// State produced for each rule block, element and quantifier node.
    pub node_states: HashMap<NodeId, StateId>,
    /// Rules that nobody invokes; always 0 for lexers.
    pub entry_rules: usize,
}

/// Element constructors whose meaning depends on the grammar kind.
pub trait ElementFactory<'a> {
    fn core(&mut self) -> &mut FactoryCore<'a>;

    fn token_ref(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError>;

    fn string_literal(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError>;

    fn range(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError>;

    /// `node` is a `Set`; `invert` when it sits under `~`.
    fn set(&mut self, node: NodeId, invert: bool) -> Result<Option<Handle>, AtnError>;

    fn char_set_literal(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError>;

    fn action(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError>;

    fn lexer_command(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError> {
        Err(AtnError::Internal(format!("lexer command {} outside a lexer grammar", node.0)))
    }

    /// Appends the command handles after `alt`.
    fn lexer_alt_commands(
        &mut self,
        alt: Handle,
        commands: Option<Handle>,
    ) -> Result<Handle, AtnError> {
        let _ = commands;
        Err(AtnError::Internal(format!(
            "lexer commands after state {} outside a lexer grammar",
            alt.right
        )))
    }

    fn begin_rule(&mut self, rule: usize) {
        self.core().current_rule = Some(rule);
    }
}

pub fn create_atn(g: &Grammar, sink: &mut dyn ErrorSink) -> Result<BuiltAtn, AtnError> {
    create_atn_with_options(g, sink, &ToolOptions::default())
}

pub fn create_atn_with_options(
    g: &Grammar,
    sink: &mut dyn ErrorSink,
    options: &ToolOptions,
) -> Result<BuiltAtn, AtnError> {
    if g.is_lexer() {
        lexer_factory::LexerAtnFactory::new(g, sink).create_atn()
    } else {
        parser_factory::ParserAtnFactory::new(g, sink).create_atn(options)
    }
}

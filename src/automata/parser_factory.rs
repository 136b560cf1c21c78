// src/automata/parser_factory.rs
//! Parser ATN construction: token references become atoms, sets become set
//! edges over token types, and the finished ATN gets follow links, EOF
//! edges and the closure/optional emptiness checks.

use log::info;

use super::{BuiltAtn, ElementFactory, FactoryCore, Handle, builder, optimizer};
use crate::{
    analysis::closure::{check_epsilon_closure, check_optional_blocks},
    atn::{GrammarType, IntervalSet, TransitionKind},
    grammar::{
        Grammar,
        ast::{NodeId, NodeKind},
    },
    tool::{
        errors::{AtnError, ErrorKind, ErrorSink},
        options::ToolOptions,
    },
};

pub struct ParserAtnFactory<'a> {
    core: FactoryCore<'a>,
}

impl<'a> ParserAtnFactory<'a> {
    pub fn new(g: &'a Grammar, sink: &'a mut dyn ErrorSink) -> Self {
        Self { core: FactoryCore::new(g, sink, GrammarType::Parser) }
    }

    pub fn create_atn(mut self, options: &ToolOptions) -> Result<BuiltAtn, AtnError> {
        self.core.create_rule_start_and_stop_states();
        builder::build_rules(&mut self)?;
        let core = &mut self.core;
        core.add_rule_follow_links();
        let entry_rules = core.add_eof_transition_to_start_rules();

        let remap = optimizer::optimize(core.g, &mut core.atn, &mut *core.sink)?;
        core.apply_remap(&remap);

        check_epsilon_closure(core.g, &core.atn, &core.closure_checks, &mut *core.sink);
        if options.check_optional_blocks {
            check_optional_blocks(core.g, &core.atn, &core.optional_checks, &mut *core.sink)?;
        }
        info!(
            "[atn] parser {}: {} rules, {} entry rules",
            core.g.name,
            core.g.rules.len(),
            entry_rules
        );
        Ok(self.core.finish(entry_rules))
    }

    fn text_token_type(&self, node: NodeId) -> i32 {
        let g = self.core.g;
        g.token_type(&g.ast.text(node))
    }
}

impl<'a> ElementFactory<'a> for ParserAtnFactory<'a> {
    fn core(&mut self) -> &mut FactoryCore<'a> {
        &mut self.core
    }

    fn token_ref(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError> {
        let ttype = self.text_token_type(node);
        Ok(Some(self.core.token_atom(node, ttype)))
    }

    /// Literals in parser rules stand for the token the lexer defines.
    fn string_literal(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError> {
        self.token_ref(node)
    }

    /// `'a'..'z'` in a parser: reported, then treated as `'a'`.
    fn range(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError> {
        let g = self.core.g;
        let [a, b] = g.ast.children(node) else {
            return Err(AtnError::Internal(format!("range {} needs two bounds", node.0)));
        };
        let (a_text, b_text) = (g.ast.text(*a), g.ast.text(*b));
        self.core.error(ErrorKind::TokenRangeInParser, Some(node), &[&a_text, &b_text]);
        self.token_ref(*a)
    }

    fn set(&mut self, node: NodeId, invert: bool) -> Result<Option<Handle>, AtnError> {
        let g = self.core.g;
        let mut set = IntervalSet::new();
        for &element in g.ast.children(node) {
            set.add(self.text_token_type(element));
        }
        let kind = if invert { TransitionKind::NotSet(set) } else { TransitionKind::Set(set) };
        Ok(Some(self.core.single_edge(node, kind)))
    }

    /// `[a-z]` in a parser: reported with its outer bounds, then dropped.
    fn char_set_literal(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError> {
        let text = self.core.g.ast.text(node);
        let body = text.trim_start_matches('[').trim_end_matches(']');
        let quote = |c: Option<char>| c.map_or_else(String::new, |c| format!("'{c}'"));
        let (lo, hi) = (quote(body.chars().next()), quote(body.chars().last()));
        self.core.error(ErrorKind::TokenRangeInParser, Some(node), &[&lo, &hi]);
        Ok(None)
    }

    fn action(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError> {
        match self.core.g.ast.kind(node) {
            NodeKind::Action { .. } => self.core.parser_action(node).map(Some),
            other => Err(AtnError::Internal(format!("expected an action, found {other:?}"))),
        }
    }
}

// src/automata/builder.rs
// Tree walk over rule bodies. Children are built before their parents, so
// the states of an alternative always precede its block's start and end.

use log::debug;

use super::{ElementFactory, Handle, factory::Quantifier};
use crate::{
    grammar::{
        Grammar,
        ast::{NodeId, NodeKind},
    },
    tool::errors::AtnError,
};

/// Builds every rule body in rule order and wires it to its start/stop.
pub fn build_rules<'a, F: ElementFactory<'a>>(f: &mut F) -> Result<(), AtnError> {
    let g: &'a Grammar = f.core().g;
    for r in &g.rules {
        f.begin_rule(r.index);
        let body = rule_block(f, r.block)?;
        f.core().rule(r.index, r.block, body)?;
        debug!("[atn] built rule {} ({})", r.name, r.index);
    }
    Ok(())
}

pub fn rule_block<'a, F: ElementFactory<'a>>(f: &mut F, block: NodeId) -> Result<Handle, AtnError> {
    build_block(f, block, None)
}

fn build_block<'a, F: ElementFactory<'a>>(
    f: &mut F,
    block: NodeId,
    quantifier: Option<Quantifier>,
) -> Result<Handle, AtnError> {
    let g: &'a Grammar = f.core().g;
    let mut alts = Vec::with_capacity(g.ast.children(block).len());
    for &alt in g.ast.children(block) {
        alts.push(alternative(f, alt)?);
    }
    f.core().block(block, quantifier, &alts)
}

fn alternative<'a, F: ElementFactory<'a>>(f: &mut F, alt: NodeId) -> Result<Handle, AtnError> {
    let g: &'a Grammar = f.core().g;
    match g.ast.kind(alt) {
        NodeKind::LexerAltAction => {
            let [inner, commands @ ..] = g.ast.children(alt) else {
                return Err(AtnError::Internal(format!("empty lexer alternative {}", alt.0)));
            };
            let h = alternative(f, *inner)?;
            let mut cmds = Vec::with_capacity(commands.len());
            for &c in commands {
                cmds.push(f.lexer_command(c)?);
            }
            let cmds = if cmds.iter().any(Option::is_some) {
                Some(f.core().elem_list(alt, &cmds))
            } else {
                None
            };
            f.lexer_alt_commands(h, cmds)
        }
        NodeKind::Alt { .. } => {
            let elements = g.ast.children(alt);
            if elements.is_empty() {
                return Ok(f.core().epsilon(alt));
            }
            let mut els = Vec::with_capacity(elements.len());
            for &e in elements {
                els.push(element(f, e)?);
            }
            Ok(f.core().elem_list(alt, &els))
        }
        other => Err(AtnError::Internal(format!("expected an alternative, found {other:?}"))),
    }
}

fn element<'a, F: ElementFactory<'a>>(f: &mut F, e: NodeId) -> Result<Option<Handle>, AtnError> {
    let g: &'a Grammar = f.core().g;
    let only_child = || {
        g.ast
            .children(e)
            .first()
            .copied()
            .ok_or_else(|| AtnError::Internal(format!("node {} has no child", e.0)))
    };
    match g.ast.kind(e) {
        NodeKind::Labeled { .. } => element(f, only_child()?),
        NodeKind::Ebnf { op, greedy } => {
            let q = Quantifier { node: e, op: *op, greedy: *greedy };
            build_block(f, only_child()?, Some(q)).map(Some)
        }
        NodeKind::Block => build_block(f, e, None).map(Some),
        NodeKind::Not => f.set(only_child()?, true),
        NodeKind::Set => f.set(e, false),
        NodeKind::TokenRef { .. } => f.token_ref(e),
        NodeKind::StringLiteral { .. } => f.string_literal(e),
        NodeKind::RuleRef { name, precedence } => f.core().rule_ref(e, name, *precedence),
        NodeKind::Range => f.range(e),
        NodeKind::CharSet { .. } => f.char_set_literal(e),
        NodeKind::Wildcard => Ok(Some(f.core().wildcard(e))),
        NodeKind::Action { .. } => f.action(e),
        NodeKind::Sempred { .. } => f.core().sempred(e).map(Some),
        other => Err(AtnError::Internal(format!("unexpected element {other:?}"))),
    }
}

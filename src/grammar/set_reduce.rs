// src/grammar/set_reduce.rs
// Collapses blocks whose alternatives are all single set elements
// (`A | B`, `'a' | 'b'..'z'`) into one SET node so the factories emit a
// single set edge instead of a decision.

use super::{
    ast::{Ast, NodeId, NodeKind},
    char_support::char_value_from_literal,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Context {
    RuleBlock,
    EbnfBlock,
    Nested,
}

fn is_set_element(ast: &Ast, id: NodeId, in_lexer: bool) -> bool {
    match ast.kind(id) {
        NodeKind::StringLiteral { text } => !in_lexer || char_value_from_literal(text) != -1,
        NodeKind::TokenRef { .. } => !in_lexer,
        NodeKind::Range => {
            in_lexer
                && ast.children(id).iter().all(|&c| match ast.kind(c) {
                    NodeKind::StringLiteral { text } => char_value_from_literal(text) != -1,
                    _ => false,
                })
        }
        _ => false,
    }
}

/// The single set element of every alternative, if the block qualifies.
fn set_elements(ast: &Ast, block: NodeId, in_lexer: bool) -> Option<Vec<NodeId>> {
    let alts = ast.children(block);
    if alts.len() < 2 {
        return None;
    }
    if let NodeKind::Alt { label: Some(_) } = ast.kind(alts[0]) {
        return None;
    }
    let mut elements = Vec::with_capacity(alts.len());
    for &alt in alts {
        if !matches!(ast.kind(alt), NodeKind::Alt { .. }) {
            return None;
        }
        match ast.children(alt) {
            [e] if is_set_element(ast, *e, in_lexer) => elements.push(*e),
            _ => return None,
        }
    }
    Some(elements)
}

fn transform(ast: &mut Ast, id: NodeId, ctx: Context, in_lexer: bool) -> NodeId {
    let kind = ast.kind(id).clone();
    match kind {
        NodeKind::Block => {
            if let Some(elements) = set_elements(ast, id, in_lexer) {
                let pos = ast.pos(id);
                let set = ast.add(NodeKind::Set, pos, elements);
                return match ctx {
                    Context::Nested => set,
                    Context::RuleBlock | Context::EbnfBlock => {
                        let alt = ast.add(NodeKind::Alt { label: None }, pos, vec![set]);
                        ast.add(NodeKind::Block, pos, vec![alt])
                    }
                };
            }
            transform_children(ast, id, in_lexer);
            id
        }
        NodeKind::Ebnf { .. } => {
            let old = ast.children(id).to_vec();
            let children: Vec<NodeId> =
                old.into_iter().map(|c| transform(ast, c, Context::EbnfBlock, in_lexer)).collect();
            ast.set_children(id, children);
            id
        }
        NodeKind::Alt { .. } | NodeKind::LexerAltAction | NodeKind::Labeled { .. } => {
            transform_children(ast, id, in_lexer);
            id
        }
        _ => id,
    }
}

fn transform_children(ast: &mut Ast, id: NodeId, in_lexer: bool) {
    let old = ast.children(id).to_vec();
    let children: Vec<NodeId> =
        old.into_iter().map(|c| transform(ast, c, Context::Nested, in_lexer)).collect();
    ast.set_children(id, children);
}

/// Rewrites a rule body; returns the (possibly new) top-level block.
pub fn reduce_rule_block(ast: &mut Ast, block: NodeId, in_lexer: bool) -> NodeId {
    transform(ast, block, Context::RuleBlock, in_lexer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse::parse_grammar;

    #[test]
    fn top_level_alternatives_become_one_set() {
        let mut f = parse_grammar("parser grammar P;\na : A | B ;").expect("parse");
        let block = reduce_rule_block(&mut f.ast, f.rules[0].block, false);
        let alt = f.ast.children(block)[0];
        let set = f.ast.children(alt)[0];
        assert_eq!(f.ast.kind(set), &NodeKind::Set);
        assert_eq!(f.ast.children(set).len(), 2);
    }

    #[test]
    fn actions_and_labels_block_the_rewrite() {
        let mut f = parse_grammar("parser grammar P;\na : A | B {x} ;\nb : A # one | B # two ;")
            .expect("parse");
        let a = reduce_rule_block(&mut f.ast, f.rules[0].block, false);
        assert_eq!(f.ast.children(a).len(), 2);
        let b = reduce_rule_block(&mut f.ast, f.rules[1].block, false);
        assert_eq!(f.ast.children(b).len(), 2);
    }

    #[test]
    fn lexer_char_sets_are_not_set_elements() {
        let mut f = parse_grammar("lexer grammar L;\nA : ([a-z] | 'x')* ;").expect("parse");
        let top = reduce_rule_block(&mut f.ast, f.rules[0].block, true);
        let alt = f.ast.children(top)[0];
        let ebnf = f.ast.children(alt)[0];
        let inner = f.ast.children(ebnf)[0];
        assert_eq!(f.ast.children(inner).len(), 2);
    }
}

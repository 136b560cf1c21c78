// src/grammar/mod.rs
//! Grammar model handed to the ATN factories: ordered rules over an `Ast`,
//! the token vocabulary, modes, channels and the predicate/action tables.

pub mod ast;
pub mod bnf_import;
pub mod char_support;
pub mod parse;
pub mod set_reduce;

use hashbrown::{HashMap, HashSet};
use log::debug;

use self::{
    ast::{Ast, NodeId, NodeKind, SourcePos},
    char_support::char_literal,
    parse::{DEFAULT_MODE_NAME, GrammarFile, RuleDecl, is_token_name, parse_grammar},
};
use crate::{
    atn::{EOF, INVALID_TYPE, MAX_CHAR_VALUE, MIN_CHAR_VALUE, MIN_USER_TOKEN_TYPE},
    tool::errors::AtnError,
};

pub const INVALID_TOKEN_NAME: &str = "<INVALID>";
/// First user channel; 0 and 1 are the default and hidden channels.
pub const MIN_USER_CHANNEL_VALUE: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarKind {
    Lexer,
    Parser,
    Combined,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub index: usize,
    /// Index into `Grammar::modes`; 0 outside lexers.
    pub mode: usize,
    pub fragment: bool,
    pub block: NodeId,
    pub left_recursive: bool,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub struct Grammar {
    pub kind: GrammarKind,
    pub name: String,
    pub file_name: String,
    pub ast: Ast,
    pub rules: Vec<Rule>,
    pub modes: Vec<String>,
    rule_by_name: HashMap<String, usize>,
    token_name_to_type: HashMap<String, i32>,
    literal_to_type: HashMap<String, i32>,
    type_to_token_name: Vec<Option<String>>,
    type_to_literal: Vec<Option<String>>,
    max_token_type: i32,
    channels: HashMap<String, i32>,
    sempreds: HashMap<NodeId, usize>,
    lexer_actions: HashMap<NodeId, usize>,
    implicit_lexer: Option<Box<Grammar>>,
}

impl Grammar {
    pub fn new(src: &str) -> Result<Self, AtnError> {
        Self::with_file_name(src, "<string>")
    }

    pub fn with_file_name(src: &str, file_name: &str) -> Result<Self, AtnError> {
        let file = parse_grammar(src)?;
        let g = match file.kind {
            GrammarKind::Lexer | GrammarKind::Parser => {
                let kind = file.kind;
                let GrammarFile { name, ast, rules, tokens, channels, modes, .. } = file;
                Self::build(kind, name, file_name, ast, rules, &tokens, &channels, modes, None)
            }
            GrammarKind::Combined => Self::build_combined(file, file_name),
        }?;
        debug!(
            "[grammar] {} {:?}: {} rules, max token type {}",
            g.name,
            g.kind,
            g.rules.len(),
            g.max_token_type
        );
        Ok(g)
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        kind: GrammarKind,
        name: String,
        file_name: &str,
        mut ast: Ast,
        decls: Vec<RuleDecl>,
        tokens: &[String],
        channels: &[String],
        modes: Vec<String>,
        vocab: Option<&Grammar>,
    ) -> Result<Self, AtnError> {
        let mut g = Grammar {
            kind,
            name,
            file_name: file_name.to_string(),
            ast: Ast::new(),
            rules: Vec::with_capacity(decls.len()),
            modes,
            rule_by_name: HashMap::new(),
            token_name_to_type: HashMap::new(),
            literal_to_type: HashMap::new(),
            type_to_token_name: vec![None],
            type_to_literal: vec![None],
            max_token_type: INVALID_TYPE,
            channels: HashMap::new(),
            sempreds: HashMap::new(),
            lexer_actions: HashMap::new(),
            implicit_lexer: None,
        };

        for decl in decls {
            if g.rule_by_name.contains_key(&decl.name) {
                return Err(AtnError::Syntax {
                    line: decl.pos.line,
                    column: decl.pos.column,
                    message: format!("rule {} redefinition", decl.name),
                });
            }
            let index = g.rules.len();
            let in_lexer = is_token_name(&decl.name);
            let block = set_reduce::reduce_rule_block(&mut ast, decl.block, in_lexer);
            let mode = g.modes.iter().position(|m| *m == decl.mode).unwrap_or(0);
            g.rule_by_name.insert(decl.name.clone(), index);
            g.rules.push(Rule {
                name: decl.name,
                index,
                mode,
                fragment: decl.fragment,
                block,
                left_recursive: false,
                pos: decl.pos,
            });
        }
        g.ast = ast;

        for (i, ch) in channels.iter().enumerate() {
            g.channels.insert(ch.clone(), MIN_USER_CHANNEL_VALUE + i as i32);
        }

        if let Some(v) = vocab {
            g.import_vocab(v);
        }
        for t in tokens {
            if is_token_name(t) {
                g.define_token_name(t);
            }
        }
        match kind {
            GrammarKind::Lexer => g.assign_lexer_token_types(),
            GrammarKind::Parser | GrammarKind::Combined => g.assign_parser_token_types(),
        }
        g.collect_predicates_and_actions();
        Ok(g)
    }

    fn build_combined(file: GrammarFile, file_name: &str) -> Result<Self, AtnError> {
        let GrammarFile { name, mut ast, rules, tokens, channels, .. } = file;
        let (lexer_decls, parser_decls): (Vec<RuleDecl>, Vec<RuleDecl>) =
            rules.into_iter().partition(|r| is_token_name(&r.name));

        // Literals the parser uses that no lexer rule already spells out
        // become leading T__n rules of the implicit lexer.
        let aliased: HashSet<String> = lexer_decls
            .iter()
            .filter(|d| !d.fragment)
            .filter_map(|d| literal_alias(&ast, d.block))
            .collect();
        let mut seen = HashSet::new();
        let mut implicit = Vec::new();
        for d in &parser_decls {
            for id in ast.descendants(d.block) {
                if let NodeKind::StringLiteral { text } = ast.kind(id) {
                    if !aliased.contains(text) && seen.insert(text.clone()) {
                        implicit.push((text.clone(), ast.pos(id)));
                    }
                }
            }
        }
        let mut lexer_rules = Vec::with_capacity(implicit.len() + lexer_decls.len());
        for (n, (text, pos)) in implicit.into_iter().enumerate() {
            let lit = ast.add(NodeKind::StringLiteral { text }, pos, Vec::new());
            let alt = ast.add(NodeKind::Alt { label: None }, pos, vec![lit]);
            let block = ast.add(NodeKind::Block, pos, vec![alt]);
            lexer_rules.push(RuleDecl {
                name: format!("T__{n}"),
                pos,
                fragment: false,
                mode: DEFAULT_MODE_NAME.to_string(),
                block,
            });
        }
        lexer_rules.extend(lexer_decls);

        let lexer = Self::build(
            GrammarKind::Lexer,
            format!("{name}Lexer"),
            file_name,
            ast.clone(),
            lexer_rules,
            &[],
            &channels,
            vec![DEFAULT_MODE_NAME.to_string()],
            None,
        )?;
        let mut parser = Self::build(
            GrammarKind::Combined,
            name,
            file_name,
            ast,
            parser_decls,
            &tokens,
            &channels,
            vec![DEFAULT_MODE_NAME.to_string()],
            Some(&lexer),
        )?;
        parser.implicit_lexer = Some(Box::new(lexer));
        Ok(parser)
    }

    fn import_vocab(&mut self, v: &Grammar) {
        self.token_name_to_type = v.token_name_to_type.clone();
        self.literal_to_type = v.literal_to_type.clone();
        self.type_to_token_name = v.type_to_token_name.clone();
        self.type_to_literal = v.type_to_literal.clone();
        self.max_token_type = v.max_token_type;
    }

    fn grow_vocab(&mut self, ttype: i32) {
        let need = ttype as usize + 1;
        if self.type_to_token_name.len() < need {
            self.type_to_token_name.resize(need, None);
            self.type_to_literal.resize(need, None);
        }
        self.max_token_type = self.max_token_type.max(ttype);
    }

    fn next_token_type(&self) -> i32 {
        (self.max_token_type + 1).max(MIN_USER_TOKEN_TYPE)
    }

    /// Returns the existing or newly assigned type of `name`.
    pub fn define_token_name(&mut self, name: &str) -> i32 {
        if let Some(&t) = self.token_name_to_type.get(name) {
            return t;
        }
        let t = self.next_token_type();
        self.grow_vocab(t);
        self.token_name_to_type.insert(name.to_string(), t);
        self.type_to_token_name[t as usize] = Some(name.to_string());
        t
    }

    fn define_literal(&mut self, literal: &str) -> i32 {
        if let Some(&t) = self.literal_to_type.get(literal) {
            return t;
        }
        let t = self.next_token_type();
        self.grow_vocab(t);
        self.literal_to_type.insert(literal.to_string(), t);
        self.type_to_literal[t as usize] = Some(literal.to_string());
        t
    }

    fn define_token_alias(&mut self, name: &str, literal: &str) {
        let t = self.define_token_name(name);
        self.literal_to_type.insert(literal.to_string(), t);
        self.type_to_literal[t as usize] = Some(literal.to_string());
    }

    fn assign_lexer_token_types(&mut self) {
        let typed: Vec<String> = self
            .rules
            .iter()
            .filter(|r| !r.fragment && !has_type_or_more_command(&self.ast, r.block))
            .map(|r| r.name.clone())
            .collect();
        for name in &typed {
            self.define_token_name(name);
        }

        let aliases: Vec<(String, String)> = self
            .rules
            .iter()
            .filter(|r| !r.fragment)
            .filter_map(|r| literal_alias(&self.ast, r.block).map(|lit| (r.name.clone(), lit)))
            .collect();
        let mut conflicting = HashSet::new();
        for (name, lit) in &aliases {
            if self.literal_to_type.contains_key(lit) {
                conflicting.insert(lit.clone());
            } else if self.token_name_to_type.contains_key(name) {
                self.define_token_alias(name, lit);
            }
        }
        // A literal claimed by two rules is nobody's alias.
        for lit in conflicting {
            if let Some(t) = self.literal_to_type.remove(&lit) {
                if let Some(slot) = self.type_to_literal.get_mut(t as usize) {
                    if slot.as_deref() == Some(lit.as_str()) {
                        *slot = None;
                    }
                }
            }
        }
    }

    fn assign_parser_token_types(&mut self) {
        let mut refs = Vec::new();
        let mut literals = Vec::new();
        for r in &self.rules {
            for id in self.ast.descendants(r.block) {
                match self.ast.kind(id) {
                    NodeKind::TokenRef { name } => refs.push(name.clone()),
                    NodeKind::StringLiteral { text } => literals.push(text.clone()),
                    _ => {}
                }
            }
        }
        for name in refs {
            if name != "EOF" && self.token_type(&name) == INVALID_TYPE {
                self.define_token_name(&name);
            }
        }
        for lit in literals {
            if self.token_type(&lit) == INVALID_TYPE {
                self.define_literal(&lit);
            }
        }
    }

    fn collect_predicates_and_actions(&mut self) {
        let mut sempreds = HashMap::new();
        let mut lexer_actions = HashMap::new();
        let mut left_recursive = vec![false; self.rules.len()];
        for r in &self.rules {
            let in_lexer = is_token_name(&r.name);
            for id in self.ast.descendants(r.block) {
                match self.ast.kind(id) {
                    NodeKind::Sempred { text, precedence } => {
                        let n = sempreds.len();
                        sempreds.insert(id, n);
                        if precedence.is_some() || text.trim_start().starts_with("precpred(") {
                            left_recursive[r.index] = true;
                        }
                    }
                    NodeKind::Action { .. } if in_lexer => {
                        let n = lexer_actions.len();
                        lexer_actions.insert(id, n);
                    }
                    _ => {}
                }
            }
        }
        for (r, lr) in self.rules.iter_mut().zip(left_recursive) {
            r.left_recursive = lr;
        }
        self.sempreds = sempreds;
        self.lexer_actions = lexer_actions;
    }

    #[inline]
    pub fn is_lexer(&self) -> bool {
        self.kind == GrammarKind::Lexer
    }

    #[inline]
    pub fn is_parser(&self) -> bool {
        !self.is_lexer()
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rule_by_name.get(name).map(|&i| &self.rules[i])
    }

    pub fn rule_by_index(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn set_left_recursive(&mut self, rule: &str, value: bool) -> bool {
        match self.rule_by_name.get(rule) {
            Some(&i) => {
                self.rules[i].left_recursive = value;
                true
            }
            None => false,
        }
    }

    /// Type of a token name or quoted literal; `INVALID_TYPE` if unknown.
    pub fn token_type(&self, text: &str) -> i32 {
        if text == "EOF" {
            return EOF;
        }
        let map = if text.starts_with('\'') { &self.literal_to_type } else { &self.token_name_to_type };
        map.get(text).copied().unwrap_or(INVALID_TYPE)
    }

    #[inline]
    pub fn max_token_type(&self) -> i32 {
        self.max_token_type
    }

    /// Name used in printed ATNs: char literals in lexers, else the
    /// literal, then the symbolic name, then the number.
    pub fn token_display_name(&self, ttype: i32) -> String {
        if self.is_lexer() && (MIN_CHAR_VALUE..=MAX_CHAR_VALUE).contains(&ttype) {
            return char_literal(ttype);
        }
        if ttype == EOF {
            return "EOF".to_string();
        }
        if ttype == INVALID_TYPE {
            return INVALID_TOKEN_NAME.to_string();
        }
        let idx = ttype as usize;
        if let Some(Some(lit)) = self.type_to_literal.get(idx) {
            return lit.clone();
        }
        if let Some(Some(name)) = self.type_to_token_name.get(idx) {
            return name.clone();
        }
        ttype.to_string()
    }

    /// Vocabulary display name: literal, then symbolic name, then number.
    pub fn vocabulary_display_name(&self, ttype: i32) -> String {
        if ttype > 0 {
            let idx = ttype as usize;
            if let Some(Some(lit)) = self.type_to_literal.get(idx) {
                return lit.clone();
            }
            if let Some(Some(name)) = self.type_to_token_name.get(idx) {
                return name.clone();
            }
        }
        ttype.to_string()
    }

    /// Symbolic names indexed by token type, for the describer.
    pub fn token_names(&self) -> Vec<String> {
        (0..=self.max_token_type.max(0) as usize)
            .map(|t| {
                self.type_to_token_name
                    .get(t)
                    .cloned()
                    .flatten()
                    .or_else(|| self.type_to_literal.get(t).cloned().flatten())
                    .unwrap_or_else(|| INVALID_TOKEN_NAME.to_string())
            })
            .collect()
    }

    pub fn literal_name(&self, ttype: i32) -> Option<&str> {
        let idx = usize::try_from(ttype).ok()?;
        self.type_to_literal.get(idx)?.as_deref()
    }

    pub fn symbolic_name(&self, ttype: i32) -> Option<&str> {
        let idx = usize::try_from(ttype).ok()?;
        self.type_to_token_name.get(idx)?.as_deref()
    }

    /// User channel value, or `None` if `name` was never declared.
    pub fn channel_value(&self, name: &str) -> Option<i32> {
        self.channels.get(name).copied()
    }

    pub fn mode_index(&self, name: &str) -> Option<usize> {
        self.modes.iter().position(|m| m == name)
    }

    pub fn rules_in_mode(&self, mode: usize) -> impl Iterator<Item = &Rule> + '_ {
        self.rules.iter().filter(move |r| r.mode == mode)
    }

    pub fn sempred_index(&self, node: NodeId) -> Option<usize> {
        self.sempreds.get(&node).copied()
    }

    pub fn lexer_action_index(&self, node: NodeId) -> Option<usize> {
        self.lexer_actions.get(&node).copied()
    }

    pub fn implicit_lexer(&self) -> Option<&Grammar> {
        self.implicit_lexer.as_deref()
    }

    /// Literals with an assigned type, in type order.
    pub fn literals(&self) -> Vec<(String, i32)> {
        let mut out: Vec<(String, i32)> =
            self.literal_to_type.iter().map(|(k, &v)| (k.clone(), v)).collect();
        out.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        out
    }
}

/// `X : 'lit' ;` (optionally followed by one action, predicate or command
/// list) aliases the literal to `X`.
fn literal_alias(ast: &Ast, block: NodeId) -> Option<String> {
    let [alt] = ast.children(block) else {
        return None;
    };
    let alt = match ast.kind(*alt) {
        NodeKind::Alt { .. } => *alt,
        NodeKind::LexerAltAction => *ast.children(*alt).first()?,
        _ => return None,
    };
    let elements = ast.children(alt);
    let lit = match elements {
        [lit] => lit,
        [lit, extra] if matches!(ast.kind(*extra), NodeKind::Action { .. } | NodeKind::Sempred { .. }) => lit,
        _ => return None,
    };
    match ast.kind(*lit) {
        NodeKind::StringLiteral { text } => Some(text.clone()),
        _ => None,
    }
}

fn has_type_or_more_command(ast: &Ast, block: NodeId) -> bool {
    ast.descendants(block).into_iter().any(|id| {
        matches!(ast.kind(id), NodeKind::LexerCommand { name, .. } if name == "type" || name == "more")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_grammar_extracts_literals_first() {
        let g = Grammar::new("grammar P;\na : A | 'b' ;").expect("grammar");
        let lexer = g.implicit_lexer().expect("implicit lexer");
        assert_eq!(lexer.rules[0].name, "T__0");
        assert_eq!(g.token_type("'b'"), 1);
        assert_eq!(g.token_type("A"), 2);
        assert_eq!(g.vocabulary_display_name(1), "'b'");
        assert_eq!(g.vocabulary_display_name(2), "A");
    }

    #[test]
    fn lexer_rules_alias_literals() {
        let g = Grammar::new("lexer grammar L;\nA : 'a' ;\nB : 'b' -> more ;\nfragment D : '0' ;")
            .expect("grammar");
        assert_eq!(g.token_type("A"), 1);
        assert_eq!(g.token_type("'a'"), 1);
        assert_eq!(g.token_type("B"), INVALID_TYPE);
        assert_eq!(g.token_type("D"), INVALID_TYPE);
        assert_eq!(g.max_token_type(), 1);
    }

    #[test]
    fn combined_lexer_rule_aliases_suppress_implicit_tokens() {
        let g = Grammar::new("grammar T;\ns : ID '=' ID ;\nID : 'a'..'z'+ ;\nEQ : '=' ;").expect("grammar");
        let lexer = g.implicit_lexer().expect("implicit lexer");
        let names: Vec<&str> = lexer.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["ID", "EQ"]);
        assert_eq!(g.token_type("'='"), g.token_type("EQ"));
    }

    #[test]
    fn precedence_predicates_mark_left_recursion() {
        let g = Grammar::new("parser grammar P;\ne : A ({precpred(_ctx, 1)}? '+' e)* ;\nf : A ;")
            .expect("grammar");
        assert!(g.rule("e").is_some_and(|r| r.left_recursive));
        assert!(!g.rule("f").is_some_and(|r| r.left_recursive));
    }
}

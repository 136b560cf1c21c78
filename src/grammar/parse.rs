// src/grammar/parse.rs
// Small recursive-descent front-end for grammar text. It accepts the
// subset of the usual `.g4` notation the ATN builder understands and
// produces an `Ast` plus the declarations around the rules.

use super::{
    GrammarKind,
    ast::{Ast, EbnfOp, NodeId, NodeKind, SourcePos},
};
use crate::tool::errors::AtnError;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    CharSet(String),
    Action(String),
    Int(i64),
    Colon,
    ColonColon,
    Semi,
    Pipe,
    LParen,
    RParen,
    Question,
    Star,
    Plus,
    Tilde,
    Dot,
    DotDot,
    Arrow,
    Comma,
    Pound,
    Assign,
    PlusAssign,
    Lt,
    Gt,
    At,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    pos: SourcePos,
}

fn syntax(pos: SourcePos, message: impl Into<String>) -> AtnError {
    AtnError::Syntax { line: pos.line, column: pos.column, message: message.into() }
}

fn tokenize(src: &str) -> Result<Vec<Token>, AtnError> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let (mut i, mut line, mut col) = (0usize, 1usize, 0usize);

    // Advances over chars[i..j], keeping line/column in sync.
    let advance = |i: &mut usize, line: &mut usize, col: &mut usize, j: usize| {
        while *i < j {
            if chars[*i] == '\n' {
                *line += 1;
                *col = 0;
            } else {
                *col += 1;
            }
            *i += 1;
        }
    };

    while i < chars.len() {
        let c = chars[i];
        let pos = SourcePos { line, column: col };
        if c.is_whitespace() {
            let to = i + 1;
            advance(&mut i, &mut line, &mut col, to);
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            let mut j = i;
            while j < chars.len() && chars[j] != '\n' {
                j += 1;
            }
            advance(&mut i, &mut line, &mut col, j);
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let mut j = i + 2;
            while j + 1 < chars.len() && !(chars[j] == '*' && chars[j + 1] == '/') {
                j += 1;
            }
            if j + 1 >= chars.len() {
                return Err(syntax(pos, "unterminated comment"));
            }
            advance(&mut i, &mut line, &mut col, j + 2);
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let mut j = i;
            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            out.push(Token { tok: Tok::Ident(chars[i..j].iter().collect()), pos });
            advance(&mut i, &mut line, &mut col, j);
            continue;
        }
        if c.is_ascii_digit() {
            let mut j = i;
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            let text: String = chars[i..j].iter().collect();
            let v = text.parse::<i64>().map_err(|_| syntax(pos, format!("bad integer {text}")))?;
            out.push(Token { tok: Tok::Int(v), pos });
            advance(&mut i, &mut line, &mut col, j);
            continue;
        }
        if c == '\'' || c == '[' {
            let close = if c == '\'' { '\'' } else { ']' };
            let mut j = i + 1;
            while j < chars.len() && chars[j] != close {
                if chars[j] == '\\' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == '\n' && c == '\'' {
                    return Err(syntax(pos, "newline in string literal"));
                }
                j += 1;
            }
            if j >= chars.len() {
                return Err(syntax(pos, "unterminated literal"));
            }
            let text: String = chars[i..=j].iter().collect();
            let tok = if c == '\'' { Tok::Str(text) } else { Tok::CharSet(text) };
            out.push(Token { tok, pos });
            advance(&mut i, &mut line, &mut col, j + 1);
            continue;
        }
        if c == '{' {
            let mut depth = 0usize;
            let mut j = i;
            let mut quote: Option<char> = None;
            loop {
                let Some(&d) = chars.get(j) else {
                    return Err(syntax(pos, "unterminated action"));
                };
                match quote {
                    Some(q) => {
                        if d == '\\' {
                            j += 1;
                        } else if d == q {
                            quote = None;
                        }
                    }
                    None => match d {
                        '\'' | '"' => quote = Some(d),
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    },
                }
                j += 1;
            }
            out.push(Token { tok: Tok::Action(chars[i + 1..j].iter().collect()), pos });
            advance(&mut i, &mut line, &mut col, j + 1);
            continue;
        }
        let next = chars.get(i + 1).copied();
        let (tok, len) = match (c, next) {
            (':', Some(':')) => (Tok::ColonColon, 2),
            (':', _) => (Tok::Colon, 1),
            (';', _) => (Tok::Semi, 1),
            ('|', _) => (Tok::Pipe, 1),
            ('(', _) => (Tok::LParen, 1),
            (')', _) => (Tok::RParen, 1),
            ('?', _) => (Tok::Question, 1),
            ('*', _) => (Tok::Star, 1),
            ('+', Some('=')) => (Tok::PlusAssign, 2),
            ('+', _) => (Tok::Plus, 1),
            ('~', _) => (Tok::Tilde, 1),
            ('.', Some('.')) => (Tok::DotDot, 2),
            ('.', _) => (Tok::Dot, 1),
            ('-', Some('>')) => (Tok::Arrow, 2),
            (',', _) => (Tok::Comma, 1),
            ('#', _) => (Tok::Pound, 1),
            ('=', _) => (Tok::Assign, 1),
            ('<', _) => (Tok::Lt, 1),
            ('>', _) => (Tok::Gt, 1),
            ('@', _) => (Tok::At, 1),
            _ => return Err(syntax(pos, format!("unexpected character '{c}'"))),
        };
        out.push(Token { tok, pos });
        let to = i + len;
        advance(&mut i, &mut line, &mut col, to);
    }
    out.push(Token { tok: Tok::Eof, pos: SourcePos { line, column: col } });
    Ok(out)
}

/// One rule as written, before the grammar assigns indices.
#[derive(Debug, Clone)]
pub struct RuleDecl {
    pub name: String,
    pub pos: SourcePos,
    pub fragment: bool,
    pub mode: String,
    pub block: NodeId,
}

#[derive(Debug, Clone)]
pub struct GrammarFile {
    pub kind: GrammarKind,
    pub name: String,
    pub ast: Ast,
    pub rules: Vec<RuleDecl>,
    pub tokens: Vec<String>,
    pub channels: Vec<String>,
    /// Declaration order, `DEFAULT_MODE` first.
    pub modes: Vec<String>,
}

pub const DEFAULT_MODE_NAME: &str = "DEFAULT_MODE";

#[inline]
pub fn is_token_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

struct Parser {
    toks: Vec<Token>,
    i: usize,
    ast: Ast,
}

type ElementOptions = Vec<(String, Option<String>)>;

fn precedence_of(options: &ElementOptions) -> Option<i32> {
    options
        .iter()
        .find(|(k, _)| k == "p")
        .and_then(|(_, v)| v.as_deref())
        .and_then(|v| v.parse().ok())
}

impl Parser {
    #[inline]
    fn peek(&self) -> &Tok {
        &self.toks[self.i].tok
    }

    #[inline]
    fn peek_at(&self, k: usize) -> &Tok {
        let idx = (self.i + k).min(self.toks.len() - 1);
        &self.toks[idx].tok
    }

    #[inline]
    fn pos(&self) -> SourcePos {
        self.toks[self.i].pos
    }

    fn bump(&mut self) -> Tok {
        let t = self.toks[self.i].tok.clone();
        if self.i + 1 < self.toks.len() {
            self.i += 1;
        }
        t
    }

    fn eat(&mut self, t: &Tok) -> bool {
        if self.peek() == t {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, t: &Tok, what: &str) -> Result<(), AtnError> {
        if self.eat(t) {
            Ok(())
        } else {
            Err(syntax(self.pos(), format!("expected {what}, found {:?}", self.peek())))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, AtnError> {
        match self.bump() {
            Tok::Ident(s) => Ok(s),
            other => {
                Err(syntax(self.toks[self.i.saturating_sub(1)].pos, format!("expected {what}, found {other:?}")))
            }
        }
    }

    fn peek_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Tok::Ident(s) if s == word)
    }

    fn file(&mut self) -> Result<GrammarFile, AtnError> {
        let kind = if self.peek_ident("lexer") {
            self.bump();
            GrammarKind::Lexer
        } else if self.peek_ident("parser") {
            self.bump();
            GrammarKind::Parser
        } else {
            GrammarKind::Combined
        };
        if !self.peek_ident("grammar") {
            return Err(syntax(self.pos(), "expected grammar header"));
        }
        self.bump();
        let name = self.ident("grammar name")?;
        self.expect(&Tok::Semi, "';'")?;

        let mut tokens = Vec::new();
        let mut channels = Vec::new();
        loop {
            if self.peek_ident("options") && matches!(self.peek_at(1), Tok::Action(_)) {
                self.bump();
                self.bump();
            } else if self.peek_ident("tokens") && matches!(self.peek_at(1), Tok::Action(_)) {
                self.bump();
                if let Tok::Action(body) = self.bump() {
                    tokens.extend(split_names(&body));
                }
            } else if self.peek_ident("channels") && matches!(self.peek_at(1), Tok::Action(_)) {
                self.bump();
                if let Tok::Action(body) = self.bump() {
                    channels.extend(split_names(&body));
                }
            } else if self.peek() == &Tok::At {
                self.bump();
                self.ident("action name")?;
                if self.eat(&Tok::ColonColon) {
                    self.ident("action name")?;
                }
                match self.bump() {
                    Tok::Action(_) => {}
                    _ => return Err(syntax(self.pos(), "expected named action body")),
                }
            } else if self.peek_ident("import") {
                return Err(syntax(self.pos(), "grammar imports are not supported"));
            } else {
                break;
            }
        }

        let mut modes = vec![DEFAULT_MODE_NAME.to_string()];
        let mut current_mode = DEFAULT_MODE_NAME.to_string();
        let mut rules = Vec::new();
        while self.peek() != &Tok::Eof {
            if self.peek_ident("mode") && matches!(self.peek_at(1), Tok::Ident(_)) {
                let pos = self.pos();
                if kind != GrammarKind::Lexer {
                    return Err(syntax(pos, "lexer modes are only allowed in lexer grammars"));
                }
                self.bump();
                current_mode = self.ident("mode name")?;
                self.expect(&Tok::Semi, "';'")?;
                if !modes.contains(&current_mode) {
                    modes.push(current_mode.clone());
                }
                continue;
            }
            let rule = self.rule(&current_mode)?;
            let lexer_rule = is_token_name(&rule.name);
            if kind == GrammarKind::Lexer && !lexer_rule {
                return Err(syntax(rule.pos, format!("parser rule {} not allowed in lexer", rule.name)));
            }
            if kind == GrammarKind::Parser && lexer_rule {
                return Err(syntax(rule.pos, format!("lexer rule {} not allowed in parser", rule.name)));
            }
            rules.push(rule);
        }

        Ok(GrammarFile {
            kind,
            name,
            ast: std::mem::take(&mut self.ast),
            rules,
            tokens,
            channels,
            modes,
        })
    }

    fn rule(&mut self, mode: &str) -> Result<RuleDecl, AtnError> {
        let fragment = if self.peek_ident("fragment") {
            self.bump();
            true
        } else {
            false
        };
        let pos = self.pos();
        let name = self.ident("rule name")?;
        if self.peek_ident("options") && matches!(self.peek_at(1), Tok::Action(_)) {
            self.bump();
            self.bump();
        }
        self.expect(&Tok::Colon, "':'")?;
        let lexer = is_token_name(&name);
        let block = self.alt_list(lexer)?;
        self.expect(&Tok::Semi, "';'")?;
        Ok(RuleDecl { name, pos, fragment, mode: mode.to_string(), block })
    }

    fn alt_list(&mut self, lexer: bool) -> Result<NodeId, AtnError> {
        let pos = self.pos();
        let mut alts = vec![self.alternative(lexer)?];
        while self.eat(&Tok::Pipe) {
            alts.push(self.alternative(lexer)?);
        }
        Ok(self.ast.add(NodeKind::Block, pos, alts))
    }

    fn alternative(&mut self, lexer: bool) -> Result<NodeId, AtnError> {
        let pos = self.pos();
        if self.peek() == &Tok::Lt {
            // `<assoc=right>` and similar alternative options
            self.element_options()?;
        }
        let mut elements = Vec::new();
        while !matches!(
            self.peek(),
            Tok::Pipe | Tok::RParen | Tok::Semi | Tok::Arrow | Tok::Pound | Tok::Eof
        ) {
            elements.push(self.element(lexer)?);
        }
        let mut commands = Vec::new();
        if self.eat(&Tok::Arrow) {
            if !lexer {
                return Err(syntax(pos, "lexer commands are only allowed in lexer rules"));
            }
            loop {
                let cpos = self.pos();
                let name = self.ident("lexer command")?;
                let arg = if self.eat(&Tok::LParen) {
                    let a = match self.bump() {
                        Tok::Ident(s) => s,
                        Tok::Int(v) => v.to_string(),
                        _ => return Err(syntax(cpos, "expected lexer command argument")),
                    };
                    self.expect(&Tok::RParen, "')'")?;
                    Some(a)
                } else {
                    None
                };
                commands.push(self.ast.add(NodeKind::LexerCommand { name, arg }, cpos, Vec::new()));
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
        }
        let label = if self.eat(&Tok::Pound) { Some(self.ident("alternative label")?) } else { None };
        let alt = self.ast.add(NodeKind::Alt { label }, pos, elements);
        if commands.is_empty() {
            return Ok(alt);
        }
        let mut children = vec![alt];
        children.extend(commands);
        Ok(self.ast.add(NodeKind::LexerAltAction, pos, children))
    }

    fn element(&mut self, lexer: bool) -> Result<NodeId, AtnError> {
        let pos = self.pos();
        if let Tok::Ident(label) = self.peek().clone() {
            if matches!(self.peek_at(1), Tok::Assign | Tok::PlusAssign) {
                self.bump();
                let list = self.bump() == Tok::PlusAssign;
                let inner = if self.peek() == &Tok::LParen {
                    self.bump();
                    let b = self.alt_list(lexer)?;
                    self.expect(&Tok::RParen, "')'")?;
                    b
                } else {
                    self.atom(lexer)?
                };
                let labeled = self.ast.add(NodeKind::Labeled { label, list }, pos, vec![inner]);
                return self.suffix(labeled, pos);
            }
        }
        match self.peek().clone() {
            Tok::Action(text) => {
                self.bump();
                if self.eat(&Tok::Question) {
                    let options = if self.peek() == &Tok::Lt { self.element_options()? } else { Vec::new() };
                    let precedence = precedence_of(&options);
                    return Ok(self.ast.add(NodeKind::Sempred { text, precedence }, pos, Vec::new()));
                }
                Ok(self.ast.add(NodeKind::Action { text }, pos, Vec::new()))
            }
            Tok::LParen => {
                self.bump();
                let block = self.alt_list(lexer)?;
                self.expect(&Tok::RParen, "')'")?;
                match self.ebnf_suffix() {
                    Some((op, greedy)) => Ok(self.ast.add(NodeKind::Ebnf { op, greedy }, pos, vec![block])),
                    None => Ok(block),
                }
            }
            _ => {
                let atom = self.atom(lexer)?;
                self.suffix(atom, pos)
            }
        }
    }

    /// `x?`, `x*` and `x+` wrap the element in a one-alternative block.
    fn suffix(&mut self, element: NodeId, pos: SourcePos) -> Result<NodeId, AtnError> {
        match self.ebnf_suffix() {
            Some((op, greedy)) => {
                let alt = self.ast.add(NodeKind::Alt { label: None }, pos, vec![element]);
                let block = self.ast.add(NodeKind::Block, pos, vec![alt]);
                Ok(self.ast.add(NodeKind::Ebnf { op, greedy }, pos, vec![block]))
            }
            None => Ok(element),
        }
    }

    fn ebnf_suffix(&mut self) -> Option<(EbnfOp, bool)> {
        let op = match self.peek() {
            Tok::Question => EbnfOp::Optional,
            Tok::Star => EbnfOp::Closure,
            Tok::Plus => EbnfOp::PositiveClosure,
            _ => return None,
        };
        self.bump();
        let greedy = !self.eat(&Tok::Question);
        Some((op, greedy))
    }

    fn atom(&mut self, lexer: bool) -> Result<NodeId, AtnError> {
        let pos = self.pos();
        match self.peek().clone() {
            Tok::Tilde => {
                self.bump();
                let set = if self.eat(&Tok::LParen) {
                    let mut elems = vec![self.set_element()?];
                    while self.eat(&Tok::Pipe) {
                        elems.push(self.set_element()?);
                    }
                    self.expect(&Tok::RParen, "')'")?;
                    self.ast.add(NodeKind::Set, pos, elems)
                } else {
                    let e = self.set_element()?;
                    self.ast.add(NodeKind::Set, pos, vec![e])
                };
                Ok(self.ast.add(NodeKind::Not, pos, vec![set]))
            }
            Tok::Dot => {
                self.bump();
                if self.peek() == &Tok::Lt {
                    self.element_options()?;
                }
                Ok(self.ast.add(NodeKind::Wildcard, pos, Vec::new()))
            }
            Tok::Str(_) | Tok::CharSet(_) => self.set_element(),
            Tok::Ident(name) => {
                self.bump();
                let options = if self.peek() == &Tok::Lt { self.element_options()? } else { Vec::new() };
                if is_token_name(&name) {
                    Ok(self.ast.add(NodeKind::TokenRef { name }, pos, Vec::new()))
                } else {
                    if lexer {
                        return Err(syntax(pos, format!("parser rule reference {name} in lexer rule")));
                    }
                    let precedence = precedence_of(&options);
                    Ok(self.ast.add(NodeKind::RuleRef { name, precedence }, pos, Vec::new()))
                }
            }
            other => Err(syntax(pos, format!("unexpected {other:?} in alternative"))),
        }
    }

    fn set_element(&mut self) -> Result<NodeId, AtnError> {
        let pos = self.pos();
        match self.bump() {
            Tok::Str(text) => {
                if self.peek() == &Tok::DotDot {
                    self.bump();
                    let bpos = self.pos();
                    let Tok::Str(b) = self.bump() else {
                        return Err(syntax(bpos, "expected string literal after '..'"));
                    };
                    let a = self.ast.add(NodeKind::StringLiteral { text }, pos, Vec::new());
                    let b = self.ast.add(NodeKind::StringLiteral { text: b }, bpos, Vec::new());
                    return Ok(self.ast.add(NodeKind::Range, pos, vec![a, b]));
                }
                if self.peek() == &Tok::Lt {
                    self.element_options()?;
                }
                Ok(self.ast.add(NodeKind::StringLiteral { text }, pos, Vec::new()))
            }
            Tok::CharSet(text) => Ok(self.ast.add(NodeKind::CharSet { text }, pos, Vec::new())),
            Tok::Ident(name) if is_token_name(&name) => {
                Ok(self.ast.add(NodeKind::TokenRef { name }, pos, Vec::new()))
            }
            other => Err(syntax(pos, format!("unexpected {other:?} in set"))),
        }
    }

    fn element_options(&mut self) -> Result<ElementOptions, AtnError> {
        self.expect(&Tok::Lt, "'<'")?;
        let mut options = Vec::new();
        loop {
            let key = self.ident("option name")?;
            let value = if self.eat(&Tok::Assign) {
                match self.bump() {
                    Tok::Ident(s) | Tok::Str(s) => Some(s),
                    Tok::Int(v) => Some(v.to_string()),
                    _ => return Err(syntax(self.pos(), "expected option value")),
                }
            } else {
                None
            };
            options.push((key, value));
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(&Tok::Gt, "'>'")?;
        Ok(options)
    }
}

fn split_names(body: &str) -> Vec<String> {
    body.split(|c| c == ',' || c == ';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_grammar(src: &str) -> Result<GrammarFile, AtnError> {
    let toks = tokenize(src)?;
    let mut p = Parser { toks, i: 0, ast: Ast::new() };
    p.file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_wraps_atom_in_block() {
        let f = parse_grammar("parser grammar P;\na : A* ;").expect("parse");
        let rule = &f.rules[0];
        let alt = f.ast.children(rule.block)[0];
        let ebnf = f.ast.children(alt)[0];
        assert_eq!(f.ast.kind(ebnf), &NodeKind::Ebnf { op: EbnfOp::Closure, greedy: true });
        let inner = f.ast.children(ebnf)[0];
        assert_eq!(f.ast.kind(inner), &NodeKind::Block);
    }

    #[test]
    fn lexer_commands_and_modes() {
        let f = parse_grammar(
            "lexer grammar L;\nWS : ' ' -> skip, channel(HIDDEN) ;\nmode M;\nB : 'b' -> popMode ;",
        )
        .expect("parse");
        assert_eq!(f.modes, vec!["DEFAULT_MODE".to_string(), "M".to_string()]);
        assert_eq!(f.rules[1].mode, "M");
        let alt = f.ast.children(f.rules[0].block)[0];
        assert_eq!(f.ast.kind(alt), &NodeKind::LexerAltAction);
        assert_eq!(f.ast.children(alt).len(), 3);
    }

    #[test]
    fn non_greedy_and_precedence_options() {
        let f = parse_grammar("parser grammar P;\na : .*? b<p=3> {x}?<p=2> ;\nb : B ;").expect("parse");
        let alt = f.ast.children(f.rules[0].block)[0];
        let kids = f.ast.children(alt);
        assert_eq!(f.ast.kind(kids[0]), &NodeKind::Ebnf { op: EbnfOp::Closure, greedy: false });
        assert_eq!(f.ast.kind(kids[1]), &NodeKind::RuleRef { name: "b".into(), precedence: Some(3) });
        assert_eq!(
            f.ast.kind(kids[2]),
            &NodeKind::Sempred { text: "x".into(), precedence: Some(2) }
        );
    }

    #[test]
    fn token_positions_track_lines_and_columns() {
        let toks = tokenize("a :\n  B ;").expect("tokenize");
        let at: Vec<(usize, usize)> = toks.iter().map(|t| (t.pos.line, t.pos.column)).collect();
        assert_eq!(at, [(1, 0), (1, 2), (2, 2), (2, 4), (2, 5)]);
        assert_eq!(toks[3].tok, Tok::Semi);
    }

    #[test]
    fn reports_position_of_syntax_errors() {
        let err = parse_grammar("parser grammar P;\na : A ) ;").unwrap_err();
        assert!(matches!(err, AtnError::Syntax { line: 2, .. }), "got {err:?}");
    }
}

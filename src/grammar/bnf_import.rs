// src/grammar/bnf_import.rs
// BNF text (`<expr> ::= <term> "+" <expr> | <term>`) to a combined grammar.
// Nonterminals become parser rules, terminals string literals and an empty
// terminal an epsilon alternative.

use bnf::Term;
use log::debug;

use super::Grammar;
use crate::tool::errors::AtnError;

/// Parser-rule name for a BNF nonterminal.
fn rule_name(nonterminal: &str) -> String {
    let mut name: String = nonterminal
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name.insert_str(0, "r_");
    }
    name
}

fn quote(terminal: &str) -> String {
    let mut out = String::with_capacity(terminal.len() + 2);
    out.push('\'');
    for c in terminal.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Renders the BNF as `.g4`-style combined grammar text.
pub fn bnf_to_grammar_text(name: &str, src: &str) -> Result<String, AtnError> {
    let bnf: bnf::Grammar = src.parse().map_err(|e: bnf::Error| AtnError::Syntax {
        line: 1,
        column: 0,
        message: format!("bnf: {e}"),
    })?;

    // Productions sharing a left-hand side merge into one rule.
    let mut rules: Vec<(String, Vec<String>)> = Vec::new();
    for prod in bnf.productions_iter() {
        let lhs = match &prod.lhs {
            Term::Nonterminal(n) => rule_name(n),
            Term::Terminal(t) => {
                return Err(AtnError::Syntax {
                    line: 1,
                    column: 0,
                    message: format!("bnf: terminal {t:?} on the left-hand side"),
                });
            }
        };
        let alts: Vec<String> = prod
            .rhs_iter()
            .map(|expr| {
                expr.terms_iter()
                    .filter_map(|term| match term {
                        Term::Terminal(t) if t.is_empty() => None,
                        Term::Terminal(t) => Some(quote(t)),
                        Term::Nonterminal(n) => Some(rule_name(n)),
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        match rules.iter_mut().find(|(n, _)| *n == lhs) {
            Some((_, existing)) => existing.extend(alts),
            None => rules.push((lhs, alts)),
        }
    }

    let mut text = format!("grammar {};\n", rule_name(name));
    for (lhs, alts) in &rules {
        text.push_str(&format!("{lhs} : {} ;\n", alts.join(" | ")));
    }
    debug!("[bnf] {} productions -> {} rules", bnf.productions_iter().count(), rules.len());
    Ok(text)
}

/// Imports a BNF grammar as a combined grammar named `name`.
pub fn import_bnf(name: &str, src: &str, file_name: &str) -> Result<Grammar, AtnError> {
    let text = bnf_to_grammar_text(name, src)?;
    Grammar::with_file_name(&text, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonterminal_names_are_sanitized() {
        assert_eq!(rule_name("Expr-List"), "expr_list");
        assert_eq!(rule_name("1st"), "r_1st");
    }

    #[test]
    fn terminals_become_literals_and_empty_becomes_epsilon() {
        let text = bnf_to_grammar_text("calc", "<sum> ::= <num> \"+\" <sum> | <num>\n<num> ::= \"1\" | \"\"")
            .expect("bnf");
        assert_eq!(text, "grammar calc;\nsum : num '+' sum | num ;\nnum : '1' |  ;\n");
    }

    #[test]
    fn imported_grammar_has_implicit_lexer() {
        let g = import_bnf("calc", "<sum> ::= <num> \"+\" <sum> | <num>\n<num> ::= \"1\"", "calc.bnf")
            .expect("import");
        assert_eq!(g.rules.len(), 2);
        let lexer = g.implicit_lexer().expect("implicit lexer");
        assert_eq!(lexer.rules.len(), 2);
        assert_eq!(g.token_type("'+'"), 1);
    }
}

// src/analysis/closure.rs
// Emptiness diagnostics for quantified and optional blocks, run once the
// ATN is complete.

use log::debug;
use rayon::prelude::*;

use super::lookahead::Ll1Analyzer;
use crate::{
    atn::{Atn, EOF, EPSILON},
    automata::PendingCheck,
    grammar::Grammar,
    tool::errors::{AtnError, ErrorKind, ErrorSink},
};

fn report(g: &Grammar, sink: &mut dyn ErrorSink, kind: ErrorKind, rule: usize) {
    if let Some(r) = g.rule_by_index(rule) {
        sink.grammar_error(kind, &g.file_name, Some(r.pos), &[&r.name]);
    }
}

/// Flags `(...)*` and `(...)+` bodies that can match nothing or EOF.
pub fn check_epsilon_closure(
    g: &Grammar,
    atn: &Atn,
    checks: &[PendingCheck],
    sink: &mut dyn ErrorSink,
) {
    let analyzer = Ll1Analyzer::new(atn);
    let looks: Vec<_> =
        checks.par_iter().map(|c| analyzer.look(c.entry, Some(c.exit))).collect();
    debug!("[closure] {}: {} loop bodies checked", g.name, checks.len());

    for (check, look) in checks.iter().zip(looks) {
        if look.contains(EPSILON) {
            let kind = if g.rule_by_index(check.rule).is_some_and(|r| r.left_recursive) {
                ErrorKind::EpsilonLrFollow
            } else {
                ErrorKind::EpsilonClosure
            };
            report(g, sink, kind, check.rule);
        }
        if look.contains(EOF) {
            report(g, sink, ErrorKind::EofClosure, check.rule);
        }
    }
}

/// Warns about `(...)?` blocks whose alternatives can already match nothing.
/// Each optional block must have exactly one bypass edge.
pub fn check_optional_blocks(
    g: &Grammar,
    atn: &Atn,
    checks: &[PendingCheck],
    sink: &mut dyn ErrorSink,
) -> Result<(), AtnError> {
    let analyzer = Ll1Analyzer::new(atn);
    'blocks: for check in checks {
        let mut bypasses = 0;
        for t in &atn[check.entry].transitions {
            if t.target == check.exit {
                bypasses += 1;
                continue;
            }
            if analyzer.look(t.target, Some(check.exit)).contains(EPSILON) {
                report(g, sink, ErrorKind::EpsilonOptional, check.rule);
                continue 'blocks;
            }
        }
        if bypasses != 1 {
            return Err(AtnError::Internal(format!(
                "optional block at state {} has {bypasses} bypass edges",
                check.entry
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        atn::{GrammarType, StateKind, Transition},
        tool::errors::ErrorManager,
    };

    #[test]
    fn optional_without_bypass_is_internal() {
        let g = Grammar::new("parser grammar T;\na : A ;").expect("grammar");
        let mut atn = Atn::new(GrammarType::Parser, 1);
        let entry = atn.add_state(StateKind::BlockStart, 0);
        let alt = atn.add_state(StateKind::Basic, 0);
        let exit = atn.add_state(StateKind::BlockEnd, 0);
        atn.add_transition(entry, Transition::epsilon(alt));
        atn.add_transition(alt, Transition::atom(exit, 1));
        let checks = [PendingCheck { rule: 0, entry, exit }];
        let mut em = ErrorManager::new();
        let err = check_optional_blocks(&g, &atn, &checks, &mut em);
        assert!(matches!(err, Err(AtnError::Internal(_))), "{err:?}");

        atn.add_transition(entry, Transition::epsilon(exit));
        assert_eq!(check_optional_blocks(&g, &atn, &checks, &mut em), Ok(()));
        assert!(em.diagnostics.is_empty());
    }
}

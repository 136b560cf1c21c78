// src/automata/optimizer.rs
// Post-construction rewrites: merging single-symbol lexer alternatives into
// one set edge, then dropping removed states.

use log::debug;

use crate::{
    atn::{Atn, IntervalSet, StateId, StateKind, Transition, TransitionKind},
    grammar::{
        Grammar,
        char_support::{char_literal, interval_set_escaped},
    },
    tool::errors::{AtnError, ErrorKind, ErrorSink},
};

/// Returns the old-index to new-id map of the compaction.
pub fn optimize(
    g: &Grammar,
    atn: &mut Atn,
    sink: &mut dyn ErrorSink,
) -> Result<Vec<Option<StateId>>, AtnError> {
    let before = atn.slots().len();
    let merged = optimize_sets(g, atn, sink);
    let remap = atn.compact()?;
    debug!(
        "[optimizer] {}: {} set alternatives merged, {} -> {} states",
        g.name,
        merged,
        before,
        atn.num_states()
    );
    Ok(remap)
}

/// Whether edge `i` of the decision enters an alternative made of one
/// atom/range/set edge straight into a block end.
fn is_set_alternative(atn: &Atn, decision: StateId, i: usize) -> bool {
    let eps = atn[decision].transition(i);
    if !matches!(eps.kind, TransitionKind::Epsilon { .. }) {
        return false;
    }
    let Some(alt) = atn.get(eps.target) else {
        return false;
    };
    if alt.num_transitions() != 1 {
        return false;
    }
    let t = alt.transition(0);
    if atn.get(t.target).is_none_or(|s| s.kind != StateKind::BlockEnd) {
        return false;
    }
    matches!(
        t.kind,
        TransitionKind::Atom(_) | TransitionKind::Range { .. } | TransitionKind::Set(_)
    )
}

fn optimize_sets(g: &Grammar, atn: &mut Atn, sink: &mut dyn ErrorSink) -> usize {
    // Parser code generation has no set edges between alternatives.
    if g.is_parser() {
        return 0;
    }
    let mut removed = 0;
    let decisions = atn.decision_to_state.clone();
    for decision in decisions {
        let rule_index = atn[decision].rule_index;
        if rule_index >= 0 {
            let lowercase = g
                .rule_by_index(rule_index as usize)
                .is_some_and(|r| r.name.starts_with(|c: char| c.is_lowercase()));
            if lowercase {
                continue;
            }
        }

        let mut candidates = IntervalSet::new();
        for i in 0..atn[decision].num_transitions() {
            if is_set_alternative(atn, decision, i) {
                candidates.add(i as i32);
            }
        }

        // Only runs of neighbouring alternatives merge; later runs first so
        // earlier indices stay valid.
        for run in candidates.intervals().iter().rev() {
            if run.len() <= 1 {
                continue;
            }
            let (a, b) = (run.a as usize, run.b as usize);
            let first_alt = atn[decision].transition(a).target;
            let block_end = atn[first_alt].transition(0).target;
            let mut match_set = IntervalSet::new();
            for j in a..=b {
                let alt = atn[decision].transition(j).target;
                let Some(label) = atn[alt].transition(0).label() else {
                    continue;
                };
                for iv in label.intervals() {
                    if iv.a != -1 && iv.b != -1 {
                        if let Some(v) = (iv.a..=iv.b).find(|&v| match_set.contains(v)) {
                            sink.grammar_error(
                                ErrorKind::CharactersCollisionInSet,
                                &g.file_name,
                                None,
                                &[&char_literal(v), &interval_set_escaped(&match_set)],
                            );
                        }
                    }
                    match_set.add_range(iv.a, iv.b);
                }
            }

            let merged = match match_set.intervals() {
                [only] => Transition::code_point_range(block_end, only.a, only.b),
                _ => Transition::new(block_end, TransitionKind::Set(match_set)),
            };
            atn.set_transition(first_alt, 0, merged);
            for _ in a + 1..=b {
                let gone = atn.remove_transition(decision, a + 1);
                atn.remove_state(gone.target);
                removed += 1;
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        atn::{GrammarType, Interval},
        tool::errors::ErrorManager,
    };

    fn alt_block(atn: &mut Atn, labels: &[TransitionKind]) -> (StateId, StateId) {
        let start = atn.add_state(StateKind::BlockStart, -1);
        let end = atn.add_state(StateKind::BlockEnd, -1);
        atn.define_decision_state(start);
        for kind in labels {
            let alt = atn.add_state(StateKind::Basic, -1);
            atn.add_transition(start, Transition::epsilon(alt));
            atn.add_transition(alt, Transition::new(end, kind.clone()));
        }
        (start, end)
    }

    #[test]
    fn neighbouring_char_alternatives_merge() {
        let g = Grammar::new("lexer grammar L;\nA : 'a' ;").expect("grammar");
        let mut atn = Atn::new(GrammarType::Lexer, 1);
        let (start, end) = alt_block(
            &mut atn,
            &[TransitionKind::Atom('a' as i32), TransitionKind::Range { from: 'b' as i32, to: 'd' as i32 }],
        );
        let mut em = ErrorManager::new();
        let merged = optimize_sets(&g, &mut atn, &mut em);
        assert_eq!(merged, 1);
        assert_eq!(atn[start].num_transitions(), 1);
        let alt = atn[start].transition(0).target;
        let t = atn[alt].transition(0);
        assert_eq!(t.target, end);
        assert_eq!(t.kind, TransitionKind::Range { from: 'a' as i32, to: 'd' as i32 });
        assert!(em.diagnostics.is_empty());
    }

    #[test]
    fn overlapping_alternatives_report_a_collision() {
        let g = Grammar::new("lexer grammar L;\nA : 'a' ;").expect("grammar");
        let mut atn = Atn::new(GrammarType::Lexer, 1);
        let (start, _) = alt_block(
            &mut atn,
            &[
                TransitionKind::Atom('a' as i32),
                TransitionKind::Atom('a' as i32),
                TransitionKind::Atom('z' as i32),
            ],
        );
        let mut em = ErrorManager::new();
        optimize_sets(&g, &mut atn, &mut em);
        assert_eq!(em.kinds(), [ErrorKind::CharactersCollisionInSet]);
        assert_eq!(em.diagnostics[0].args, ["'a'", "'a'"]);
        let alt = atn[start].transition(0).target;
        let label = atn[alt].transition(0).label().expect("label");
        assert_eq!(label.intervals(), &[Interval::new(97, 97), Interval::new(122, 122)]);
    }
}

//! Parser ATN construction, checked through the printer dump and the state
//! tables.

use atnc::{
    atn::{EOF, StateKind, TransitionKind, printer::AtnPrinter},
    automata::{BuiltAtn, create_atn},
    grammar::Grammar,
    tool::errors::{ErrorKind, ErrorManager},
};

fn build(src: &str) -> (Grammar, BuiltAtn, ErrorManager) {
    let g = Grammar::new(src).expect("grammar");
    let mut em = ErrorManager::new();
    let built = create_atn(&g, &mut em).expect("atn");
    (g, built, em)
}

fn dump(src: &str, rule: &str) -> String {
    let (g, built, em) = build(src);
    assert!(!em.has_errors(), "unexpected diagnostics: {:?}", em.diagnostics);
    let r = g.rule(rule).expect("rule").index;
    AtnPrinter::new(&g, &built.atn, built.atn.rule_to_start_state[r]).as_string()
}

#[test]
fn single_token_rule() {
    let expected = "RuleStart_a_0->s2\n\
                    s2-A->s3\n\
                    s3->RuleStop_a_1\n\
                    RuleStop_a_1-EOF->s4\n";
    assert_eq!(dump("parser grammar T;\na : A ;", "a"), expected);
}

#[test]
fn sequence_elides_inner_states() {
    let expected = "RuleStart_a_0->s2\n\
                    s2-A->s3\n\
                    s3-B->s4\n\
                    s4->RuleStop_a_1\n\
                    RuleStop_a_1-EOF->s5\n";
    assert_eq!(dump("parser grammar T;\na : A B ;", "a"), expected);
}

#[test]
fn token_alternatives_become_one_set() {
    let expected = "RuleStart_a_0->s2\n\
                    s2-{A, B}->s3\n\
                    s3->RuleStop_a_1\n\
                    RuleStop_a_1-EOF->s4\n";
    assert_eq!(dump("parser grammar T;\na : A | B ;", "a"), expected);
}

#[test]
fn plus_loop() {
    let expected = "RuleStart_a_0->PlusBlockStart_3\n\
                    PlusBlockStart_3->s2\n\
                    s2-A->BlockEnd_4\n\
                    BlockEnd_4->PlusLoopBack_5\n\
                    PlusLoopBack_5->PlusBlockStart_3\n\
                    PlusLoopBack_5->s6\n\
                    s6->RuleStop_a_1\n\
                    RuleStop_a_1-EOF->s7\n";
    assert_eq!(dump("parser grammar T;\na : A+ ;", "a"), expected);
}

#[test]
fn star_loop() {
    let expected = "RuleStart_a_0->StarLoopEntry_5\n\
                    StarLoopEntry_5->StarBlockStart_3\n\
                    StarLoopEntry_5->s6\n\
                    StarBlockStart_3->s2\n\
                    s6->RuleStop_a_1\n\
                    s2-A->BlockEnd_4\n\
                    RuleStop_a_1-EOF->s8\n\
                    BlockEnd_4->StarLoopBack_7\n\
                    StarLoopBack_7->StarLoopEntry_5\n";
    assert_eq!(dump("parser grammar T;\na : A* ;", "a"), expected);
}

#[test]
fn action_alternative_keeps_the_decision() {
    let (_, built, _) = build("parser grammar T;\na : A | B {x} ;");
    let atn = &built.atn;
    assert_eq!(atn.decision_to_state.len(), 1);
    let d = atn.decision_to_state[0];
    assert_eq!(atn[d].kind, StateKind::BlockStart);
    assert_eq!(atn[d].num_transitions(), 2);
}

#[test]
fn plus_loop_back_edge_order_follows_greediness() {
    for (src, greedy) in [("parser grammar T;\na : A+ ;", true), ("parser grammar T;\na : A+? ;", false)] {
        let (_, built, _) = build(src);
        let atn = &built.atn;
        let lb = atn.states().find(|s| s.kind == StateKind::PlusLoopBack).expect("loop back");
        let kinds: Vec<StateKind> = lb.transitions.iter().map(|t| atn[t.target].kind).collect();
        let expected = if greedy {
            [StateKind::PlusBlockStart, StateKind::LoopEnd]
        } else {
            [StateKind::LoopEnd, StateKind::PlusBlockStart]
        };
        assert_eq!(kinds, expected, "{src}");
        assert_eq!(lb.non_greedy, !greedy, "{src}");
    }
}

#[test]
fn star_entry_edge_order_follows_greediness() {
    for (src, greedy) in [("parser grammar T;\na : A* ;", true), ("parser grammar T;\na : A*? ;", false)] {
        let (_, built, _) = build(src);
        let atn = &built.atn;
        let entry = atn.states().find(|s| s.kind == StateKind::StarLoopEntry).expect("loop entry");
        let kinds: Vec<StateKind> = entry.transitions.iter().map(|t| atn[t.target].kind).collect();
        let expected = if greedy {
            [StateKind::StarBlockStart, StateKind::LoopEnd]
        } else {
            [StateKind::LoopEnd, StateKind::StarBlockStart]
        };
        assert_eq!(kinds, expected, "{src}");
        assert_eq!(entry.non_greedy, !greedy, "{src}");
    }
}

#[test]
fn optional_bypass_is_prepended_when_non_greedy() {
    for (src, greedy) in [("parser grammar T;\na : A? ;", true), ("parser grammar T;\na : A?? ;", false)] {
        let (_, built, em) = build(src);
        assert!(em.diagnostics.is_empty(), "{src}: {:?}", em.diagnostics);
        let atn = &built.atn;
        let start = atn.states().find(|s| s.kind == StateKind::BlockStart).expect("block start");
        let kinds: Vec<StateKind> = start.transitions.iter().map(|t| atn[t.target].kind).collect();
        let expected = if greedy {
            [StateKind::Basic, StateKind::BlockEnd]
        } else {
            [StateKind::BlockEnd, StateKind::Basic]
        };
        assert_eq!(kinds, expected, "{src}");
        assert_eq!(start.transitions.last().map(|t| t.target) == start.end_state, greedy, "{src}");
        assert_eq!(start.non_greedy, !greedy, "{src}");
    }
}

#[test]
fn every_call_site_gets_a_follow_link() {
    let (g, built, _) = build("parser grammar T;\na : b A ;\nb : B ;\nc : b C ;");
    let atn = &built.atn;
    let stop_b = atn.rule_to_stop_state[g.rule("b").expect("b").index];
    let returns = &atn[stop_b].transitions;
    assert_eq!(returns.len(), 2, "one return edge per call site");
    assert!(returns.iter().all(|t| matches!(t.kind, TransitionKind::Epsilon { .. })));
    // return edges follow call-site order: a's continuation, then c's
    let continuation = |rule: &str| {
        let r = g.rule(rule).expect("rule").index as i32;
        atn.states()
            .filter(|s| s.rule_index == r)
            .find_map(|s| s.transitions.first().and_then(|t| t.follow()))
            .expect("call site")
    };
    let targets: Vec<_> = returns.iter().map(|t| t.target).collect();
    assert_eq!(targets, [continuation("a"), continuation("c")]);

    // only rules nobody calls get EOF edges
    assert_eq!(built.entry_rules, 2);
    for name in ["a", "c"] {
        let stop = atn.rule_to_stop_state[g.rule(name).expect("rule").index];
        assert_eq!(atn[stop].transitions.len(), 1);
        assert_eq!(atn[stop].transition(0).kind, TransitionKind::Atom(EOF), "rule {name}");
    }
}

#[test]
fn undefined_rule_reference_is_reported_and_skipped() {
    let (_, built, em) = build("parser grammar T;\na : A undefined ;");
    assert_eq!(em.kinds(), [ErrorKind::UndefinedRuleRef]);
    assert_eq!(em.diagnostics[0].args, ["undefined"]);
    assert!(built.atn.states().all(|s| s.transitions.iter().all(|t| t.follow().is_none())));
}

#[test]
fn node_table_points_at_rule_starts() {
    let (g, built, _) = build("parser grammar T;\na : A ;\nb : a ;");
    for r in &g.rules {
        assert_eq!(built.node_states.get(&r.block), Some(&built.atn.rule_to_start_state[r.index]));
    }
}

#[test]
fn char_ranges_are_rejected_in_parsers() {
    let (_, _, em) = build("parser grammar T;\na : [a-z] B ;");
    assert_eq!(em.kinds(), [ErrorKind::TokenRangeInParser]);
    assert_eq!(em.diagnostics[0].args, ["'a'", "'z'"]);

    let (g, built, em) = build("parser grammar T;\na : 'a'..'z' ;");
    assert_eq!(em.kinds(), [ErrorKind::TokenRangeInParser]);
    let start = built.atn.rule_to_start_state[0];
    let dump = AtnPrinter::new(&g, &built.atn, start).as_string();
    assert!(dump.contains("-'a'->"), "range falls back to its first literal: {dump}");
}

//! Loop and optional-block emptiness diagnostics.

use atnc::{
    automata::create_atn,
    grammar::Grammar,
    tool::{
        Tool,
        errors::{ErrorKind, ErrorManager},
        options::ToolOptions,
    },
};

fn diagnose(g: &Grammar) -> ErrorManager {
    let mut em = ErrorManager::new();
    create_atn(g, &mut em).expect("atn");
    em
}

#[test]
fn loop_over_an_empty_rule() {
    let g = Grammar::new("parser grammar T;\nx : ;\ny : x* ;").expect("grammar");
    let em = diagnose(&g);
    assert_eq!(em.kinds(), [ErrorKind::EpsilonClosure]);
    assert_eq!(em.diagnostics[0].args, ["y"]);
}

#[test]
fn left_recursive_rules_report_the_follow_variant() {
    let mut g = Grammar::new("parser grammar T;\nx : ;\ny : x* ;").expect("grammar");
    assert!(g.set_left_recursive("y", true));
    assert_eq!(diagnose(&g).kinds(), [ErrorKind::EpsilonLrFollow]);
}

#[test]
fn precedence_predicates_mark_left_recursion() {
    let g = Grammar::new("parser grammar T;\ne : {true}?<p=2> INT ;\nf : INT ;").expect("grammar");
    assert!(g.rule("e").expect("rule").left_recursive);
    assert!(!g.rule("f").expect("rule").left_recursive);
}

#[test]
fn loop_bodies_that_consume_input_are_fine() {
    let g = Grammar::new("parser grammar T;\na : (A | b)+ ;\nb : B C? ;").expect("grammar");
    assert!(diagnose(&g).diagnostics.is_empty());
}

#[test]
fn optional_of_optional() {
    let g = Grammar::new("parser grammar T;\na : (B?)? ;").expect("grammar");
    let em = diagnose(&g);
    assert_eq!(em.kinds(), [ErrorKind::EpsilonOptional]);
    assert_eq!(em.diagnostics[0].args, ["a"]);
}

#[test]
fn optional_check_can_be_switched_off() {
    let g = Grammar::new("parser grammar T;\na : (B?)? ;").expect("grammar");
    let mut tool = Tool::new(ToolOptions { check_optional_blocks: false, ..ToolOptions::default() });
    tool.compile(&g).expect("compile");
    assert!(tool.errors.diagnostics.is_empty(), "{:?}", tool.errors.diagnostics);
}

#[test]
fn combined_grammar_literal_loop() {
    let g = Grammar::new("grammar T;\na : ('foo' | 'bar')* ;").expect("grammar");
    let mut tool = Tool::default();
    let atns = tool.compile(&g).expect("compile");
    assert_eq!(atns.len(), 2);
    assert!(tool.errors.diagnostics.is_empty(), "{:?}", tool.errors.diagnostics);
}

#[test]
fn greedy_wildcard_loops_warn() {
    let g = Grammar::new("parser grammar T;\na : .+ ;").expect("grammar");
    let em = diagnose(&g);
    assert_eq!(em.kinds(), [ErrorKind::ExpectedNonGreedyWildcardBlock]);
    assert!(!em.has_errors(), "wildcard loops only warn");

    let g = Grammar::new("parser grammar T;\na : .+? ;").expect("grammar");
    assert!(diagnose(&g).diagnostics.is_empty());
}

//! Lexer ATN construction: literal chains, sets, commands and modes.

use atnc::{
    atn::{LexerAction, StateKind, printer::AtnPrinter},
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

fn dump(src: &str) -> String {
    let (g, built, em) = build(src);
    assert!(em.diagnostics.is_empty(), "unexpected diagnostics: {:?}", em.diagnostics);
    AtnPrinter::new(&g, &built.atn, built.atn.mode_to_start_state[0]).as_string()
}

fn kinds(src: &str) -> Vec<ErrorKind> {
    build(src).2.kinds()
}

#[test]
fn literal_alternatives() {
    let expected = "s0->RuleStart_A_1\n\
                    RuleStart_A_1->BlockStart_7\n\
                    BlockStart_7->s3\n\
                    BlockStart_7->s5\n\
                    s3-'0'->s4\n\
                    s5-'0'->s6\n\
                    s4-'x'->BlockEnd_8\n\
                    s6-'X'->BlockEnd_8\n\
                    BlockEnd_8->RuleStop_A_2\n";
    assert_eq!(dump("lexer grammar L;\nA : ('0x' | '0X') ;"), expected);
}

#[test]
fn inverted_char() {
    let expected = "s0->RuleStart_A_1\n\
                    RuleStart_A_1->s3\n\
                    s3-~97->s4\n\
                    s4->RuleStop_A_2\n";
    assert_eq!(dump("lexer grammar L;\nA : ~'a' ;"), expected);
}

#[test]
fn mode_start_reaches_only_its_non_fragment_rules() {
    let (g, built, em) = build(
        "lexer grammar L;\nA : 'a' D -> pushMode(M) ;\nfragment D : '0'..'9' ;\nmode M;\nB : 'b' -> popMode ;",
    );
    assert!(em.diagnostics.is_empty(), "{:?}", em.diagnostics);
    let atn = &built.atn;
    assert_eq!(atn.mode_to_start_state.len(), 2);
    let start_of = |name: &str| atn.rule_to_start_state[g.rule(name).expect("rule").index];
    let targets = |m: usize| -> Vec<_> {
        atn[atn.mode_to_start_state[m]].transitions.iter().map(|t| t.target).collect()
    };
    assert_eq!(targets(0), [start_of("A")]);
    assert_eq!(targets(1), [start_of("B")]);
    assert_eq!(atn.rule_to_token_type, [1, 0, 2]);
    assert_eq!(atn.lexer_actions, [LexerAction::PushMode { mode: 1 }, LexerAction::PopMode]);
    assert!(built.atn.mode_to_start_state.iter().all(|&s| atn[s].kind == StateKind::TokenStart));
}

#[test]
fn commands_resolve_constants_and_share_indices() {
    let (_, built, em) = build(
        "lexer grammar L;\nWS : ' ' -> skip ;\nNL : '\\n' -> skip ;\nID : 'a' -> type(WS), channel(HIDDEN) ;",
    );
    assert!(em.diagnostics.is_empty(), "{:?}", em.diagnostics);
    assert_eq!(
        built.atn.lexer_actions,
        [LexerAction::Skip, LexerAction::Type { token_type: 1 }, LexerAction::Channel { channel: 1 }]
    );
}

#[test]
fn command_misuse_is_reported() {
    let cases = [
        ("A : 'a' -> skip, more ;", ErrorKind::IncompatibleCommands),
        ("A : 'a' -> skip, skip ;", ErrorKind::DuplicatedCommand),
        ("A : 'a' -> explode ;", ErrorKind::InvalidLexerCommand),
        ("A : 'a' -> mode ;", ErrorKind::MissingLexerCommandArgument),
        ("A : 'a' -> skip(X) ;", ErrorKind::UnwantedLexerCommandArgument),
        ("A : 'a' -> pushMode(NOPE) ;", ErrorKind::ConstantValueIsNotARecognizedModeName),
        ("A : 'a' -> type(NOPE) ;", ErrorKind::ConstantValueIsNotARecognizedTokenName),
        ("A : 'a' -> channel(NOPE) ;", ErrorKind::ConstantValueIsNotARecognizedChannelName),
        ("A : 'a' -> channel(SKIP) ;", ErrorKind::ChannelConflictsWithCommonConstants),
        ("A : 'a' -> type(MORE) ;", ErrorKind::TokenConflictsWithCommonConstants),
        ("A : 'a' -> mode(HIDDEN) ;", ErrorKind::ModeConflictsWithCommonConstants),
    ];
    for (rule, kind) in cases {
        let src = format!("lexer grammar L;\n{rule}");
        assert_eq!(kinds(&src), [kind], "{rule}");
    }
}

#[test]
fn numeric_command_arguments() {
    let (_, built, em) = build("lexer grammar L;\nA : 'a' -> channel(5), type(9) ;");
    assert!(em.diagnostics.is_empty(), "{:?}", em.diagnostics);
    assert_eq!(
        built.atn.lexer_actions,
        [LexerAction::Channel { channel: 5 }, LexerAction::Type { token_type: 9 }]
    );
}

#[test]
fn custom_actions_carry_rule_and_action_index() {
    let (_, built, _) = build("lexer grammar L;\nA : 'a' ;\nB : 'b' {go()} ;");
    assert_eq!(built.atn.lexer_actions.len(), 1);
    assert!(matches!(
        built.atn.lexer_actions[0],
        LexerAction::Custom { rule_index: 1, .. }
    ));
}

#[test]
fn literal_and_range_errors() {
    assert_eq!(kinds("lexer grammar L;\nA : '' ;"), [ErrorKind::EmptyStringsAndSetsNotAllowed]);
    assert_eq!(kinds("lexer grammar L;\nA : 'z'..'a' ;"), [ErrorKind::EmptyStringsAndSetsNotAllowed]);
    assert_eq!(kinds("lexer grammar L;\nA : 'ab'..'c' ;"), [ErrorKind::InvalidLiteralInLexerSet]);
    assert_eq!(
        kinds("lexer grammar L;\nA : ~('a' | B) ;\nB : 'b' ;"),
        [ErrorKind::UnsupportedReferenceInLexerSet]
    );
}

#[test]
fn repeated_chars_in_a_set_collide() {
    assert_eq!(kinds("lexer grammar L;\nA : ~('a' | 'a') ;"), [ErrorKind::CharactersCollisionInSet]);
    assert!(kinds("lexer grammar L;\nA : [a-z] [0-9_] ;").is_empty());
}

#[test]
fn eof_inside_a_loop_is_reported() {
    assert_eq!(kinds("lexer grammar L;\nA : ('a' | EOF)* ;"), [ErrorKind::EofClosure]);
}

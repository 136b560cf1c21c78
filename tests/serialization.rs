//! Serialized ATN form: describer dumps, round trips and word packing.

use atnc::{
    atn::{
        describe::describe,
        serialize::{decode_words, deserialize, encode_words, serialize},
    },
    automata::create_atn,
    grammar::Grammar,
    tool::{errors::ErrorManager, verify_round_trip},
};
use proptest::prelude::*;

fn serialized(src: &str) -> (Grammar, Vec<i32>) {
    let g = Grammar::new(src).expect("grammar");
    let mut em = ErrorManager::new();
    let built = create_atn(&g, &mut em).expect("atn");
    assert!(!em.has_errors(), "unexpected diagnostics: {:?}", em.diagnostics);
    let data = serialize(&built.atn).expect("serialize");
    (g, data)
}

fn dump(src: &str) -> String {
    let (g, data) = serialized(src);
    describe(&data, &g.token_names()).expect("describe")
}

#[test]
fn parser_sequence_dump() {
    let expected = "max type 2\n\
                    0:RULE_START 0\n\
                    1:RULE_STOP 0\n\
                    2:BASIC 0\n\
                    3:BASIC 0\n\
                    4:BASIC 0\n\
                    5:BASIC -1\n\
                    rule 0:0\n\
                    0->2 EPSILON 0,0,0\n\
                    2->3 ATOM 1,0,0\n\
                    3->4 ATOM 2,0,0\n\
                    4->1 EPSILON 0,0,0\n";
    assert_eq!(dump("parser grammar T;\na : A B ;"), expected);
}

#[test]
fn lexer_set_dump() {
    let expected = "max type 1\n\
                    0:TOKEN_START -1\n\
                    1:RULE_START 0\n\
                    2:RULE_STOP 0\n\
                    3:BASIC 0\n\
                    4:BASIC 0\n\
                    rule 0:1 1\n\
                    mode 0:0\n\
                    0:'a'..'c', 'x'..'x'\n\
                    0->1 EPSILON 0,0,0\n\
                    1->3 EPSILON 0,0,0\n\
                    3->4 SET 0,0,0\n\
                    4->2 EPSILON 0,0,0\n\
                    0:0\n";
    assert_eq!(dump("lexer grammar L;\nA : 'a'..'c' | 'x' ;"), expected);
}

#[test]
fn parser_grammars_round_trip() {
    let grammars = [
        "parser grammar T;\na : A b* C? ;\nb : B | D ;",
        "parser grammar T;\ns : e EOF ;\ne : INT ('+' INT)* | '(' e ')' ;",
        "parser grammar T;\na : (A | B)+? . ;",
        "parser grammar T;\na : {p}? A {act} | ~(A | B) ;",
    ];
    for src in grammars {
        let (_, data) = serialized(src);
        verify_round_trip(&data).unwrap_or_else(|e| panic!("{src}: {e}"));
    }
}

#[test]
fn lexer_grammars_round_trip() {
    let grammars = [
        "lexer grammar L;\nID : [a-zA-Z_] [a-zA-Z_0-9]* ;\nWS : [ \\t\\r\\n]+ -> skip ;",
        "lexer grammar L;\nA : 'a' -> pushMode(M) ;\nmode M;\nB : ~'b'+ -> popMode ;",
        "lexer grammar L;\nSTR : '\"' .*? '\"' ;\nNUM : '0'..'9'+ {count()} ;",
    ];
    for src in grammars {
        let (_, data) = serialized(src);
        verify_round_trip(&data).unwrap_or_else(|e| panic!("{src}: {e}"));
        let atn = deserialize(&data, true).expect("deserialize");
        assert_eq!(serialize(&atn).expect("reserialize"), data, "{src}");
    }
}

#[test]
fn packed_words_round_trip() {
    let (_, data) = serialized("lexer grammar L;\nU : '\\u{1F600}' | [\\u{10000}-\\u{10FFFF}] ;");
    assert!(data.iter().any(|&v| v > 0x7FFF), "expected a wide code point");
    let words = encode_words(&data).expect("encode");
    assert!(words.len() > data.len());
    assert_eq!(decode_words(&words).expect("decode"), data);
}

#[test]
fn truncated_stream_is_rejected() {
    let (_, data) = serialized("parser grammar T;\na : A ;");
    for cut in [1, 4, data.len() - 1] {
        assert!(deserialize(&data[..cut], true).is_err(), "accepted a stream cut at {cut}");
    }
}

#[test]
fn compiling_twice_gives_identical_output() {
    let sources = [
        "parser grammar T;\nx : ;\ny : x* ;\na : (A | b)+ ;\nb : B C? ;\nw : (B?)? ;\nz : .+ ;",
        "lexer grammar L;\nA : ('a' | EOF)* ;\nB : ~('b' | 'b') ;\nWS : ' ' -> skip ;\nC : 'c' {go()} ;",
    ];
    for src in sources {
        let run = || {
            let g = Grammar::new(src).expect("grammar");
            let mut em = ErrorManager::new();
            let built = create_atn(&g, &mut em).expect("atn");
            (serialize(&built.atn).expect("serialize"), em.diagnostics)
        };
        let (first, first_diags) = run();
        assert!(!first_diags.is_empty(), "{src} should report something");
        for _ in 0..4 {
            let (again, diags) = run();
            assert_eq!(again, first, "{src}");
            assert_eq!(diags, first_diags, "{src}");
        }
    }
}

proptest! {
    #[test]
    fn word_packing_is_lossless(values in prop::collection::vec(-1i32..0x7FFF_FFFF, 0..64)) {
        let words = encode_words(&values).expect("encode");
        prop_assert_eq!(decode_words(&words).expect("decode"), values);
    }
}

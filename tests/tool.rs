//! Tool driver: grammar loading, combined grammars and the output formats.

use std::path::PathBuf;

use atnc::{
    atn::{
        GrammarType,
        io::{InterpreterData, load_atn_bin_bytes, load_interp_json_bytes, save_atn_bin, save_interp_json},
    },
    tool::{Tool, options::ToolOptions},
};

const COMBINED: &str = "grammar Calc;\nexpr : INT ('+' INT)* ;\nINT : [0-9]+ ;\nWS : ' ' -> skip ;";

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("atnc-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

fn combined() -> atnc::grammar::Grammar {
    atnc::grammar::Grammar::new(COMBINED).expect("grammar")
}

#[test]
fn combined_grammar_compiles_lexer_then_parser() {
    let g = combined();
    let mut tool = Tool::default();
    let atns = tool.compile(&g).expect("compile");
    assert!(tool.errors.diagnostics.is_empty(), "{:?}", tool.errors.diagnostics);
    let kinds: Vec<_> = atns.iter().map(|c| c.built.atn.grammar_type).collect();
    assert_eq!(kinds, [GrammarType::Lexer, GrammarType::Parser]);
    assert_eq!(atns[0].grammar.name, "CalcLexer");
    // T__0 for '+', then INT and WS
    assert_eq!(atns[0].grammar.rules.len(), 3);
    assert_eq!(atns[1].grammar.token_type("'+'"), atns[0].grammar.token_type("'+'"));
}

#[test]
fn forced_kind_compiles_one_side() {
    let g = combined();
    let mut tool = Tool::new(ToolOptions { force_kind: Some(GrammarType::Parser), ..ToolOptions::default() });
    let atns = tool.compile(&g).expect("compile");
    assert_eq!(atns.len(), 1);
    assert_eq!(atns[0].built.atn.grammar_type, GrammarType::Parser);
}

#[test]
fn interpreter_json_round_trips() {
    let g = combined();
    let mut tool = Tool::default();
    let atns = tool.compile(&g).expect("compile");
    let dir = scratch_dir("json");
    for c in &atns {
        for words16 in [false, true] {
            let data = c.interpreter_data(words16).expect("interp data");
            let path = dir.join(format!("{}-{words16}.interp.json", c.grammar.name));
            save_interp_json(&path, &data).expect("save");
            let back: InterpreterData =
                load_interp_json_bytes(&std::fs::read(&path).expect("read")).expect("load");
            assert_eq!(back, data);
            assert_eq!(back.atn().expect("atn"), c.serialized);
        }
    }
    let lexer = atns[0].interpreter_data(false).expect("interp data");
    assert_eq!(lexer.mode_names, ["DEFAULT_MODE"]);
    assert_eq!(lexer.rule_names, ["T__0", "INT", "WS"]);
    assert_eq!(lexer.token_names()[1], "T__0");
    let parser = atns[1].interpreter_data(false).expect("interp data");
    assert!(parser.mode_names.is_empty());
    assert_eq!(parser.literal_names[1].as_deref(), Some("'+'"));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn binary_file_round_trips() {
    let g = combined();
    let mut tool = Tool::default();
    let atns = tool.compile(&g).expect("compile");
    let dir = scratch_dir("bin");
    let path = dir.join("CalcLexer.atn.bin");
    save_atn_bin(&path, &atns[0].serialized).expect("save");
    let back = load_atn_bin_bytes(&std::fs::read(&path).expect("read")).expect("load");
    assert_eq!(back, atns[0].serialized);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn bnf_files_load_as_combined_grammars() {
    let dir = scratch_dir("bnf");
    let path = dir.join("list.bnf");
    std::fs::write(&path, "<list> ::= <item> \",\" <list> | <item>\n<item> ::= \"x\" | \"y\"")
        .expect("write");
    let tool = Tool::default();
    let g = tool.load_grammar(&path).expect("load");
    assert_eq!(g.name, "list");
    assert_eq!(g.file_name, "list.bnf");
    assert_eq!(g.rules.len(), 2);
    assert_eq!(g.implicit_lexer().map(|l| l.rules.len()), Some(3));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn missing_grammar_file_is_an_error() {
    let tool = Tool::default();
    let err = tool.load_grammar(std::path::Path::new("/nonexistent/T.g4")).expect_err("missing file");
    assert!(format!("{err:#}").contains("reading grammar"), "{err:#}");
}

#[test]
fn options_file_is_read() {
    let dir = scratch_dir("opts");
    let path = dir.join("options.json");
    std::fs::write(&path, r#"{"verifyAtn":false,"outputDir":"out"}"#).expect("write");
    let opts = ToolOptions::load(&path).expect("options");
    assert!(!opts.verify_atn);
    assert_eq!(opts.output_dir, PathBuf::from("out"));
    assert!(ToolOptions::load(&dir.join("absent.json")).is_err());
    assert_eq!(ToolOptions::load_or_default(Some(path.as_path())).expect("options"), opts);
    assert_eq!(ToolOptions::load_or_default(None).expect("defaults"), ToolOptions::default());
    let _ = std::fs::remove_dir_all(dir);
}

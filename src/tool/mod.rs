// src/tool/mod.rs
//! Compilation driver: load a grammar, build and serialize its ATNs, and
//! optionally prove the serialized form round-trips.

pub mod errors;
pub mod options;

use std::path::Path;

use anyhow::Context;
use log::info;

use self::{
    errors::{AtnError, ErrorManager},
    options::ToolOptions,
};
use crate::{
    atn::{
        GrammarType, describe,
        io::InterpreterData,
        serialize::{deserialize, serialize},
    },
    automata::{BuiltAtn, create_atn_with_options},
    grammar::{Grammar, bnf_import::import_bnf},
};

/// One grammar's ATN together with its serialized stream.
#[derive(Debug)]
pub struct CompiledAtn<'g> {
    pub grammar: &'g Grammar,
    pub built: BuiltAtn,
    pub serialized: Vec<i32>,
}

impl CompiledAtn<'_> {
    pub fn describe(&self) -> Result<String, AtnError> {
        describe::describe(&self.serialized, &self.grammar.token_names())
    }

    pub fn interpreter_data(&self, words16: bool) -> Result<InterpreterData, AtnError> {
        InterpreterData::from_grammar(self.grammar, &self.serialized, words16)
    }
}

#[derive(Debug, Default)]
pub struct Tool {
    pub options: ToolOptions,
    pub errors: ErrorManager,
}

impl Tool {
    pub fn new(options: ToolOptions) -> Self {
        Self { options, errors: ErrorManager::new() }
    }

    /// Reads a `.g4`-style grammar, or a `.bnf` file through the BNF import.
    pub fn load_grammar(&self, path: &Path) -> anyhow::Result<Grammar> {
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("reading grammar {}", path.display()))?;
        let file_name = path.file_name().map_or_else(
            || path.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        let g = if path.extension().is_some_and(|e| e == "bnf") {
            let name = path.file_stem().map_or("Bnf".into(), |s| s.to_string_lossy());
            import_bnf(&name, &src, &file_name)
        } else {
            Grammar::with_file_name(&src, &file_name)
        };
        g.with_context(|| format!("loading grammar {}", path.display()))
    }

    /// A combined grammar yields its implicit lexer, then the parser.
    pub fn compile<'g>(&mut self, g: &'g Grammar) -> Result<Vec<CompiledAtn<'g>>, AtnError> {
        let force = self.options.force_kind;
        let wanted = |t: GrammarType| force.is_none_or(|k| k == t);
        let mut targets = Vec::new();
        match g.implicit_lexer() {
            Some(lexer) => {
                if wanted(GrammarType::Lexer) {
                    targets.push(lexer);
                }
                if wanted(GrammarType::Parser) {
                    targets.push(g);
                }
            }
            None => targets.push(g),
        }
        targets.into_iter().map(|target| self.compile_one(target)).collect()
    }

    fn compile_one<'g>(&mut self, g: &'g Grammar) -> Result<CompiledAtn<'g>, AtnError> {
        let built = create_atn_with_options(g, &mut self.errors, &self.options)?;
        let serialized = serialize(&built.atn)?;
        if self.options.verify_atn {
            verify_round_trip(&serialized)?;
        }
        info!(
            "[tool] {}: {} states, {} decisions, {} ints serialized",
            g.name,
            built.atn.num_states(),
            built.atn.decision_to_state.len(),
            serialized.len()
        );
        Ok(CompiledAtn { grammar: g, built, serialized })
    }
}

/// Deserializes with structural checks and requires an identical re-encoding.
pub fn verify_round_trip(serialized: &[i32]) -> Result<(), AtnError> {
    let atn = deserialize(serialized, true)?;
    let again = serialize(&atn)?;
    if again != serialized {
        let at = again.iter().zip(serialized).position(|(a, b)| a != b);
        return Err(AtnError::Internal(format!(
            "serialized ATN changed across a round trip (first difference at {})",
            at.unwrap_or(again.len().min(serialized.len()))
        )));
    }
    Ok(())
}

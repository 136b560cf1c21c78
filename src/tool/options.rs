// src/tool/options.rs
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::atn::GrammarType;

/// Compiler settings, read from a camelCase JSON file; missing keys keep
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolOptions {
    /// For combined grammars: compile only the lexer or only the parser.
    pub force_kind: Option<GrammarType>,
    /// Round-trip the serialized ATN and run the structural checks.
    pub verify_atn: bool,
    pub check_optional_blocks: bool,
    /// Write the serialized ATN as 16-bit words.
    pub words16: bool,
    pub output_dir: PathBuf,
}

impl Default for ToolOptions {
    fn default() -> Self {
        Self {
            force_kind: None,
            verify_atn: true,
            check_optional_blocks: true,
            words16: false,
            output_dir: PathBuf::from("atn"),
        }
    }
}

impl ToolOptions {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parsing options {}", path.display()))
    }

    /// Options from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}

// src/atn/io.rs
use std::{
    collections::BTreeMap,
    io::{BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use super::{
    GrammarType,
    serialize::{decode_words, encode_words},
};
use crate::{grammar::Grammar, tool::errors::AtnError};

// -------------------- JSON interpreter data --------------------

/// Everything an interpreter needs to run a grammar without generated code.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpreterData {
    pub grammar_name: String,
    pub grammar_type: GrammarType,
    pub rule_names: Vec<String>,
    /// Indexed by token type.
    pub literal_names: Vec<Option<String>>,
    pub symbolic_names: Vec<Option<String>>,
    #[serde(default)]
    pub mode_names: Vec<String>,
    #[serde_as(as = "Vec<(_, _)>")]
    #[serde(default)]
    pub literal_types: BTreeMap<String, i32>,
    /// `atn` holds 16-bit words instead of plain integers.
    #[serde(default)]
    pub words16: bool,
    pub atn: Vec<i32>,
}

impl InterpreterData {
    pub fn from_grammar(g: &Grammar, serialized: &[i32], words16: bool) -> Result<Self, AtnError> {
        let grammar_type = if g.is_lexer() { GrammarType::Lexer } else { GrammarType::Parser };
        let types = 0..=g.max_token_type().max(0);
        let atn = if words16 {
            encode_words(serialized)?.into_iter().map(i32::from).collect()
        } else {
            serialized.to_vec()
        };
        Ok(Self {
            grammar_name: g.name.clone(),
            grammar_type,
            rule_names: g.rules.iter().map(|r| r.name.clone()).collect(),
            literal_names: types.clone().map(|t| g.literal_name(t).map(String::from)).collect(),
            symbolic_names: types.map(|t| g.symbolic_name(t).map(String::from)).collect(),
            mode_names: if g.is_lexer() { g.modes.clone() } else { Vec::new() },
            literal_types: g.literals().into_iter().collect(),
            words16,
            atn,
        })
    }

    /// The serialized integer stream, unpacking 16-bit words if needed.
    pub fn atn(&self) -> Result<Vec<i32>, AtnError> {
        if !self.words16 {
            return Ok(self.atn.clone());
        }
        let words = self
            .atn
            .iter()
            .map(|&w| u16::try_from(w))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AtnError::Serialization(format!("word out of range: {e}")))?;
        decode_words(&words)
    }

    /// Vocabulary names for `describe`: symbolic, else literal, else the number.
    pub fn token_names(&self) -> Vec<String> {
        let n = self.literal_names.len().max(self.symbolic_names.len());
        (0..n)
            .map(|t| {
                let symbolic = self.symbolic_names.get(t).cloned().flatten();
                let literal = || self.literal_names.get(t).cloned().flatten();
                symbolic.or_else(literal).unwrap_or_else(|| t.to_string())
            })
            .collect()
    }
}

pub fn save_interp_json(path: &Path, data: &InterpreterData) -> std::io::Result<()> {
    let f = std::fs::File::create(path)?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, data)?;
    w.flush()
}

pub fn load_interp_json_bytes(data: &[u8]) -> Result<InterpreterData, String> {
    serde_json::from_slice::<InterpreterData>(data)
        .map_err(|e| format!("Failed to parse interpreter JSON: {e}"))
}

// -------------------- Compact binary (u16 packing) --------------------

const BIN_MAGIC: &[u8; 8] = b"ATNSER04";

/// Magic, u32 LE word count, then the 16-bit words of `serialized`.
pub fn save_atn_bin(path: &Path, serialized: &[i32]) -> std::io::Result<()> {
    let words = encode_words(serialized)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    let count = u32::try_from(words.len()).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "word count exceeds u32::MAX")
    })?;
    let f = std::fs::File::create(path)?;
    let mut w = BufWriter::new(f);
    w.write_all(BIN_MAGIC)?;
    w.write_all(&count.to_le_bytes())?;
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for word in &words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    w.write_all(&bytes)?;
    w.flush()
}

pub fn load_atn_bin_bytes(data: &[u8]) -> Result<Vec<i32>, String> {
    let rest = data
        .strip_prefix(BIN_MAGIC.as_slice())
        .ok_or_else(|| "bad magic in ATN binary".to_string())?;
    if rest.len() < 4 {
        return Err("ATN binary header truncated".into());
    }
    let (count, body) = rest.split_at(4);
    let count = u32::from_le_bytes([count[0], count[1], count[2], count[3]]) as usize;
    if body.len() != count * 2 {
        return Err(format!("expected {} bytes of words, found {}", count * 2, body.len()));
    }
    let words: Vec<u16> = body.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
    decode_words(&words).map_err(|e| e.to_string())
}

// src/atn/describe.rs
//! Text dump of a serialized ATN, one fact per line. Tests compare against
//! it, so the format is fixed: states, rules, modes, sets, edges, decisions.

use std::fmt::Write as _;

use super::{EOF, GrammarType, StateKind, Transition, state::INVALID_STATE_CODE};
use crate::{grammar::char_support::describer_char_name, tool::errors::AtnError};

struct Cursor<'d> {
    data: &'d [i32],
    p: usize,
}

impl Cursor<'_> {
    fn next(&mut self) -> Result<i32, AtnError> {
        let v = self.data.get(self.p).copied();
        self.p += 1;
        v.ok_or_else(|| AtnError::Serialization(format!("describe: truncated at {}", self.p - 1)))
    }

    fn count(&mut self) -> Result<usize, AtnError> {
        let v = self.next()?;
        usize::try_from(v).map_err(|_| AtnError::Serialization(format!("describe: count {v}")))
    }

    fn skip(&mut self, n: usize) {
        self.p += n;
    }
}

pub fn describe(data: &[i32], token_names: &[String]) -> Result<String, AtnError> {
    let mut c = Cursor { data, p: 0 };
    let mut buf = String::new();
    c.next()?; // version
    let grammar_type = GrammarType::from_code(c.next()?);
    let lexer = grammar_type == Some(GrammarType::Lexer);
    let name = |t: i32| {
        if t == EOF {
            return "EOF".to_string();
        }
        if lexer {
            if let Some(n) = describer_char_name(t) {
                return n;
            }
        }
        usize::try_from(t)
            .ok()
            .and_then(|i| token_names.get(i))
            .cloned()
            .unwrap_or_else(|| t.to_string())
    };

    let _ = writeln!(buf, "max type {}", c.next()?);
    for i in 0..c.count()? {
        let code = c.next()?;
        if code == INVALID_STATE_CODE {
            continue;
        }
        let rule = match c.next()? {
            0xFFFF => -1,
            r => r,
        };
        let kind = StateKind::from_code(code);
        let arg = match kind {
            Some(k) if k == StateKind::LoopEnd || k.is_block_start() => format!(" {}", c.next()?),
            _ => String::new(),
        };
        let kind_name = kind.map_or("INVALID", StateKind::name);
        let _ = writeln!(buf, "{i}:{kind_name} {rule}{arg}");
    }
    // non-greedy and precedence state lists
    for _ in 0..2 {
        let n = c.count()?;
        c.skip(n);
    }
    for i in 0..c.count()? {
        let s = c.next()?;
        if lexer {
            let _ = writeln!(buf, "rule {i}:{s} {}", c.next()?);
        } else {
            let _ = writeln!(buf, "rule {i}:{s}");
        }
    }
    for i in 0..c.count()? {
        let _ = writeln!(buf, "mode {i}:{}", c.next()?);
    }
    for i in 0..c.count()? {
        let nintervals = c.count()?;
        let _ = write!(buf, "{i}:");
        let has_eof = c.next()? != 0;
        if has_eof {
            buf.push_str(&name(EOF));
        }
        for j in 0..nintervals {
            if has_eof || j > 0 {
                buf.push_str(", ");
            }
            let (a, b) = (c.next()?, c.next()?);
            let _ = write!(buf, "{}..{}", name(a), name(b));
        }
        buf.push('\n');
    }
    for _ in 0..c.count()? {
        let (src, trg, ttype) = (c.next()?, c.next()?, c.next()?);
        let (a1, a2, a3) = (c.next()?, c.next()?, c.next()?);
        let _ = writeln!(buf, "{src}->{trg} {} {a1},{a2},{a3}", Transition::code_name(ttype));
    }
    for i in 0..c.count()? {
        let _ = writeln!(buf, "{i}:{}", c.next()?);
    }
    Ok(buf)
}

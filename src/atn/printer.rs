// src/atn/printer.rs
use std::{collections::VecDeque, fmt::Write as _};

use hashbrown::HashSet;

use super::{Atn, StateId, StateKind, TransitionKind};
use crate::grammar::Grammar;

/// Breadth-first edge listing from one state, with states named by kind:
/// `RuleStart_a_0->s2`, `s2-A->s3`, `BlockEnd_4->PlusLoopBack_5`.
pub struct AtnPrinter<'a> {
    g: &'a Grammar,
    atn: &'a Atn,
    start: StateId,
}

impl<'a> AtnPrinter<'a> {
    pub fn new(g: &'a Grammar, atn: &'a Atn, start: StateId) -> Self {
        Self { g, atn, start }
    }

    pub fn as_string(&self) -> String {
        let mut buf = String::new();
        let mut marked = HashSet::new();
        let mut work = VecDeque::from([self.start]);
        while let Some(id) = work.pop_front() {
            if !marked.insert(id) {
                continue;
            }
            let Some(s) = self.atn.get(id) else {
                continue;
            };
            for t in &s.transitions {
                // return edges are not followed
                if s.kind != StateKind::RuleStop {
                    work.push_back(t.follow().unwrap_or(t.target));
                }
                let from = self.state_name(id);
                let to = self.state_name(t.target);
                let _ = match &t.kind {
                    TransitionKind::Epsilon { .. } => writeln!(buf, "{from}->{to}"),
                    TransitionKind::Rule { rule_index, .. } => {
                        let rule = self.g.rule_by_index(*rule_index).map_or("?", |r| r.name.as_str());
                        writeln!(buf, "{from}-{rule}->{to}")
                    }
                    TransitionKind::Set(set) | TransitionKind::NotSet(set) => {
                        let not = if matches!(t.kind, TransitionKind::NotSet(_)) { "~" } else { "" };
                        let label = if self.g.is_lexer() {
                            set.to_string()
                        } else {
                            set.to_string_with(|v| self.g.vocabulary_display_name(v))
                        };
                        writeln!(buf, "{from}-{not}{label}->{to}")
                    }
                    TransitionKind::Atom(label) => {
                        writeln!(buf, "{from}-{}->{to}", self.g.token_display_name(*label))
                    }
                    _ => writeln!(buf, "{from}-{t}->{to}"),
                };
            }
        }
        buf
    }

    fn state_name(&self, id: StateId) -> String {
        let Some(s) = self.atn.get(id) else {
            return format!("s{id}");
        };
        let rule = || {
            usize::try_from(s.rule_index)
                .ok()
                .and_then(|r| self.g.rule_by_index(r))
                .map_or("?", |r| r.name.as_str())
        };
        match s.kind {
            StateKind::StarBlockStart => format!("StarBlockStart_{id}"),
            StateKind::PlusBlockStart => format!("PlusBlockStart_{id}"),
            StateKind::BlockStart => format!("BlockStart_{id}"),
            StateKind::BlockEnd => format!("BlockEnd_{id}"),
            StateKind::RuleStart => format!("RuleStart_{}_{id}", rule()),
            StateKind::RuleStop => format!("RuleStop_{}_{id}", rule()),
            StateKind::PlusLoopBack => format!("PlusLoopBack_{id}"),
            StateKind::StarLoopBack => format!("StarLoopBack_{id}"),
            StateKind::StarLoopEntry => format!("StarLoopEntry_{id}"),
            _ => format!("s{id}"),
        }
    }
}

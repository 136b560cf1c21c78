// src/analysis/lookahead.rs
use hashbrown::HashSet;

use crate::atn::{Atn, EPSILON, IntervalSet, MIN_USER_TOKEN_TYPE, StateId, StateKind, TransitionKind};

/// Call stack of follow states; empty means "no caller".
type Context = Vec<StateId>;

/// Computes the symbols that can follow a state, walking into invoked rules.
#[derive(Debug, Clone, Copy)]
pub struct Ll1Analyzer<'a> {
    atn: &'a Atn,
}

struct Walk {
    look: IntervalSet,
    busy: HashSet<(StateId, Context)>,
    called: Vec<bool>,
    ctx: Context,
}

impl<'a> Ll1Analyzer<'a> {
    pub fn new(atn: &'a Atn) -> Self {
        Self { atn }
    }

    /// Symbols reachable from `s` before `stop` (or before falling off the
    /// rule when `stop` is `None`). Reaching `stop` or a rule stop with no
    /// caller adds `EPSILON`; an `EOF` edge contributes `EOF`.
    pub fn look(&self, s: StateId, stop: Option<StateId>) -> IntervalSet {
        let mut walk = Walk {
            look: IntervalSet::new(),
            busy: HashSet::new(),
            called: vec![false; self.atn.rule_to_start_state.len()],
            ctx: Vec::new(),
        };
        self.visit(s, stop, &mut walk);
        walk.look
    }

    fn visit(&self, s: StateId, stop: Option<StateId>, walk: &mut Walk) {
        if !walk.busy.insert((s, walk.ctx.clone())) {
            return;
        }
        if stop == Some(s) && walk.ctx.is_empty() {
            walk.look.add(EPSILON);
            return;
        }
        let Some(state) = self.atn.get(s) else {
            return;
        };

        if state.kind == StateKind::RuleStop {
            let Some(ret) = walk.ctx.pop() else {
                walk.look.add(EPSILON);
                return;
            };
            // returning to the caller re-enables recursion into this rule
            let rule = usize::try_from(state.rule_index).ok();
            let was_called = rule.is_some_and(|r| std::mem::take(&mut walk.called[r]));
            self.visit(ret, stop, walk);
            if let Some(r) = rule {
                walk.called[r] = was_called;
            }
            walk.ctx.push(ret);
            return;
        }

        let max = self.atn.max_token_type;
        for t in &state.transitions {
            match &t.kind {
                TransitionKind::Rule { rule_index, follow, .. } => {
                    if walk.called[*rule_index] {
                        continue;
                    }
                    walk.ctx.push(*follow);
                    walk.called[*rule_index] = true;
                    self.visit(t.target, stop, walk);
                    walk.called[*rule_index] = false;
                    walk.ctx.pop();
                }
                _ if t.is_epsilon() => self.visit(t.target, stop, walk),
                TransitionKind::Wildcard => walk.look.add_range(MIN_USER_TOKEN_TYPE, max),
                TransitionKind::NotSet(set) => {
                    walk.look.add_set(&set.complement(MIN_USER_TOKEN_TYPE, max));
                }
                _ => {
                    if let Some(label) = t.label() {
                        walk.look.add_set(&label);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::{EOF, GrammarType, Transition};

    /// rule 0: start -A-> s -b()-> f -> stop; rule 1: start -> stop
    fn calls_empty_rule() -> (Atn, StateId, StateId) {
        let mut atn = Atn::new(GrammarType::Parser, 3);
        let start0 = atn.add_state(StateKind::RuleStart, 0);
        let stop0 = atn.add_state(StateKind::RuleStop, 0);
        let start1 = atn.add_state(StateKind::RuleStart, 1);
        let stop1 = atn.add_state(StateKind::RuleStop, 1);
        atn.rule_to_start_state = vec![start0, start1];
        atn.rule_to_stop_state = vec![stop0, stop1];
        let s = atn.add_state(StateKind::Basic, 0);
        let f = atn.add_state(StateKind::Basic, 0);
        let call = TransitionKind::Rule { rule_index: 1, precedence: 0, follow: f };
        atn.add_transition(s, Transition::new(start1, call));
        atn.add_transition(f, Transition::epsilon(stop0));
        atn.add_transition(start1, Transition::epsilon(stop1));
        atn.add_transition(stop1, Transition::epsilon(f));
        (atn, s, stop0)
    }

    #[test]
    fn epsilon_through_an_empty_rule() {
        let (atn, s, stop0) = calls_empty_rule();
        let look = Ll1Analyzer::new(&atn).look(s, Some(stop0));
        assert!(look.contains(EPSILON), "{look}");
        assert_eq!(look.len(), 1);
    }

    #[test]
    fn wildcard_and_not_set_cover_the_vocabulary() {
        let mut atn = Atn::new(GrammarType::Parser, 4);
        let a = atn.add_state(StateKind::Basic, 0);
        let b = atn.add_state(StateKind::Basic, 0);
        let c = atn.add_state(StateKind::Basic, 0);
        atn.add_transition(a, Transition::new(b, TransitionKind::NotSet(IntervalSet::of_range(2, 3))));
        atn.add_transition(a, Transition::atom(c, EOF));
        let look = Ll1Analyzer::new(&atn).look(a, None);
        assert_eq!(look.iter().collect::<Vec<_>>(), [EOF, 1, 4]);

        let mut atn = Atn::new(GrammarType::Parser, 3);
        let a = atn.add_state(StateKind::Basic, 0);
        let b = atn.add_state(StateKind::Basic, 0);
        atn.add_transition(a, Transition::new(b, TransitionKind::Wildcard));
        let look = Ll1Analyzer::new(&atn).look(a, None);
        assert_eq!(look.iter().collect::<Vec<_>>(), [1, 2, 3]);
    }
}

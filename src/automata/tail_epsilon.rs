// src/automata/tail_epsilon.rs
// Strips `p -x-> q -eps-> r` down to `p -x-> r` for the Basic states of a
// freshly linked alternative.

use hashbrown::HashSet;

use crate::atn::{Atn, StateId, StateKind, TransitionKind};

fn visit(atn: &mut Atn, p: StateId) {
    let state = &atn[p];
    if state.kind != StateKind::Basic || state.num_transitions() != 1 {
        return;
    }
    let edge = state.transition(0);
    let q = edge.follow().unwrap_or(edge.target);
    let Some(qs) = atn.get(q) else {
        return;
    };
    if qs.kind != StateKind::Basic || qs.num_transitions() != 1 {
        return;
    }
    let tail = qs.transition(0);
    if !matches!(tail.kind, TransitionKind::Epsilon { .. }) {
        return;
    }
    let r = tail.target;
    let t = &mut atn[p].transitions[0];
    match &mut t.kind {
        TransitionKind::Rule { follow, .. } => *follow = r,
        _ => t.target = r,
    }
    atn.remove_state(q);
}

/// Depth-first from `start`, following edge targets (rule edges lead into
/// the invoked rule).
pub fn remove_tail_epsilons(atn: &mut Atn, start: StateId) {
    let mut visited = HashSet::new();
    let mut stack = vec![start];
    while let Some(s) = stack.pop() {
        if !atn.contains(s) || !visited.insert(s) {
            continue;
        }
        visit(atn, s);
        stack.extend(atn[s].transitions.iter().rev().map(|t| t.target));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::{GrammarType, Transition};

    #[test]
    fn epsilon_tail_is_folded_into_the_edge() {
        let mut atn = Atn::new(GrammarType::Parser, 1);
        let p = atn.add_state(StateKind::Basic, 0);
        let q = atn.add_state(StateKind::Basic, 0);
        let end = atn.add_state(StateKind::BlockEnd, 0);
        atn.add_transition(p, Transition::atom(q, 1));
        atn.add_transition(q, Transition::epsilon(end));
        remove_tail_epsilons(&mut atn, p);
        assert!(!atn.contains(q));
        assert_eq!(atn[p].transition(0).target, end);
    }

    #[test]
    fn action_tails_are_kept() {
        let mut atn = Atn::new(GrammarType::Parser, 1);
        let p = atn.add_state(StateKind::Basic, 0);
        let q = atn.add_state(StateKind::Basic, 0);
        let r = atn.add_state(StateKind::Basic, 0);
        atn.add_transition(p, Transition::atom(q, 1));
        let action = TransitionKind::Action { rule_index: 0, action_index: -1, ctx_dependent: false };
        atn.add_transition(q, Transition::new(r, action));
        remove_tail_epsilons(&mut atn, p);
        assert!(atn.contains(q));
        assert_eq!(atn[p].transition(0).target, q);
    }
}

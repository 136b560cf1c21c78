// src/automata/factory.rs
// State allocation and the combinators shared by both factories.

use hashbrown::HashMap;
use log::debug;

use super::{BuiltAtn, Handle, PendingCheck, tail_epsilon::remove_tail_epsilons};
use crate::{
    atn::{Atn, EOF, GrammarType, StateId, StateKind, Transition, TransitionKind},
    grammar::{
        Grammar,
        ast::{EbnfOp, NodeId, NodeKind},
    },
    tool::errors::{AtnError, ErrorKind, ErrorSink},
};

/// The `?`, `*` or `+` node wrapping a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantifier {
    pub node: NodeId,
    pub op: EbnfOp,
    pub greedy: bool,
}

pub struct FactoryCore<'a> {
    pub g: &'a Grammar,
    pub atn: Atn,
    pub sink: &'a mut dyn ErrorSink,
    pub current_rule: Option<usize>,
    pub node_states: HashMap<NodeId, StateId>,
    pub closure_checks: Vec<PendingCheck>,
    pub optional_checks: Vec<PendingCheck>,
}

impl<'a> FactoryCore<'a> {
    pub fn new(g: &'a Grammar, sink: &'a mut dyn ErrorSink, grammar_type: GrammarType) -> Self {
        Self {
            g,
            atn: Atn::new(grammar_type, g.max_token_type()),
            sink,
            current_rule: None,
            node_states: HashMap::new(),
            closure_checks: Vec::new(),
            optional_checks: Vec::new(),
        }
    }

    pub fn error(&mut self, kind: ErrorKind, node: Option<NodeId>, args: &[&str]) {
        let pos = node.map(|n| self.g.ast.pos(n));
        self.sink.grammar_error(kind, &self.g.file_name, pos, args);
    }

    /// New state owned by the current rule (-1 outside one).
    pub fn new_state(&mut self, kind: StateKind) -> StateId {
        let rule_index = self.current_rule.map_or(-1, |r| r as i32);
        self.atn.add_state(kind, rule_index)
    }

    pub fn current_rule_index(&self) -> Result<usize, AtnError> {
        self.current_rule
            .ok_or_else(|| AtnError::Internal("element built outside a rule".into()))
    }

    /// `prepend` puts the edge ahead of existing ones.
    pub fn epsilon_edge(&mut self, from: StateId, to: StateId, prepend: bool) {
        if prepend {
            self.atn.insert_transition(from, 0, Transition::epsilon(to));
        } else {
            self.atn.add_transition(from, Transition::epsilon(to));
        }
    }

    pub fn epsilon(&mut self, node: NodeId) -> Handle {
        let left = self.new_state(StateKind::Basic);
        let right = self.new_state(StateKind::Basic);
        self.epsilon_edge(left, right, false);
        self.node_states.insert(node, left);
        Handle::new(left, right)
    }

    /// Single-edge element `left -t-> right`.
    pub fn single_edge(&mut self, node: NodeId, kind: TransitionKind) -> Handle {
        let left = self.new_state(StateKind::Basic);
        let right = self.new_state(StateKind::Basic);
        self.atn.add_transition(left, Transition::new(right, kind));
        self.node_states.insert(node, left);
        Handle::new(left, right)
    }

    /// Start and stop states of every rule, ahead of any rule body.
    pub fn create_rule_start_and_stop_states(&mut self) {
        for r in &self.g.rules {
            let start = self.atn.add_state(StateKind::RuleStart, r.index as i32);
            let stop = self.atn.add_state(StateKind::RuleStop, r.index as i32);
            self.atn[start].stop_state = Some(stop);
            self.atn[start].left_recursive = r.left_recursive;
            self.atn.rule_to_start_state.push(start);
            self.atn.rule_to_stop_state.push(stop);
        }
    }

    pub fn token_atom(&mut self, node: NodeId, ttype: i32) -> Handle {
        self.single_edge(node, TransitionKind::Atom(ttype))
    }

    /// `None` when `name` is not a rule of this grammar.
    pub fn rule_ref(
        &mut self,
        node: NodeId,
        name: &str,
        precedence: Option<i32>,
    ) -> Result<Option<Handle>, AtnError> {
        let Some(callee) = self.g.rule(name).map(|r| r.index) else {
            self.error(ErrorKind::UndefinedRuleRef, Some(node), &[name]);
            return Ok(None);
        };
        let start = self
            .atn
            .rule_to_start_state
            .get(callee)
            .copied()
            .ok_or_else(|| AtnError::Internal(format!("no start state for rule {name}")))?;
        let left = self.new_state(StateKind::Basic);
        let right = self.new_state(StateKind::Basic);
        let kind = TransitionKind::Rule {
            rule_index: callee,
            precedence: precedence.unwrap_or(0),
            follow: right,
        };
        self.atn.add_transition(left, Transition::new(start, kind));
        self.node_states.insert(node, left);
        Ok(Some(Handle::new(left, right)))
    }

    pub fn sempred(&mut self, node: NodeId) -> Result<Handle, AtnError> {
        let NodeKind::Sempred { text, precedence } = self.g.ast.kind(node) else {
            return Err(AtnError::Internal(format!("node {} is not a predicate", node.0)));
        };
        let kind = match precedence {
            Some(p) => TransitionKind::Precedence(*p),
            None => TransitionKind::Predicate {
                rule_index: self.current_rule_index()? as i32,
                pred_index: self.g.sempred_index(node).map_or(-1, |i| i as i32),
                ctx_dependent: text.contains('$'),
            },
        };
        Ok(self.single_edge(node, kind))
    }

    pub fn wildcard(&mut self, node: NodeId) -> Handle {
        self.single_edge(node, TransitionKind::Wildcard)
    }

    /// Parser actions are not executed during prediction; no index.
    pub fn parser_action(&mut self, node: NodeId) -> Result<Handle, AtnError> {
        let rule_index = self.current_rule_index()? as i32;
        Ok(self.single_edge(
            node,
            TransitionKind::Action { rule_index, action_index: -1, ctx_dependent: false },
        ))
    }

    /// Chains consecutive elements of one alternative. Missing elements are
    /// skipped; an alternative with none left matches the empty string.
    pub fn elem_list(&mut self, node: NodeId, els: &[Option<Handle>]) -> Handle {
        let els: Vec<Handle> = els.iter().flatten().copied().collect();
        let (Some(first), Some(last)) = (els.first().copied(), els.last().copied()) else {
            return self.epsilon(node);
        };
        for pair in els.windows(2) {
            let (el, next) = (pair[0], pair[1]);
            // o-x->o with both ends Basic: retarget x instead of adding an edge
            let left = &self.atn[el.left];
            let mergeable = left.kind == StateKind::Basic
                && self.atn[el.right].kind == StateKind::Basic
                && left.num_transitions() == 1
                && match left.transition(0) {
                    t if t.follow() == Some(el.right) => true,
                    t => t.target == el.right,
                };
            if mergeable && el.left != el.right {
                let t = &mut self.atn[el.left].transitions[0];
                match &mut t.kind {
                    TransitionKind::Rule { follow, .. } => *follow = next.left,
                    _ => t.target = next.left,
                }
                self.atn.remove_state(el.right);
            } else {
                self.epsilon_edge(el.right, next.left, false);
            }
        }
        Handle::new(first.left, last.right)
    }

    pub fn block(
        &mut self,
        node: NodeId,
        quantifier: Option<Quantifier>,
        alts: &[Handle],
    ) -> Result<Handle, AtnError> {
        if alts.is_empty() {
            return Err(AtnError::Internal(format!("block {} has no alternatives", node.0)));
        }
        let Some(q) = quantifier else {
            if let [only] = alts {
                self.node_states.insert(node, only.left);
                return Ok(*only);
            }
            let start = self.new_state(StateKind::BlockStart);
            self.atn.define_decision_state(start);
            return Ok(self.make_block(start, node, alts));
        };
        match q.op {
            EbnfOp::Optional => {
                let start = self.new_state(StateKind::BlockStart);
                self.atn.define_decision_state(start);
                let h = self.make_block(start, node, alts);
                self.optional(q, h)
            }
            EbnfOp::Closure => {
                let start = self.new_state(StateKind::StarBlockStart);
                if alts.len() > 1 {
                    self.atn.define_decision_state(start);
                }
                let h = self.make_block(start, node, alts);
                self.star(q, node, h)
            }
            EbnfOp::PositiveClosure => {
                let start = self.new_state(StateKind::PlusBlockStart);
                if alts.len() > 1 {
                    self.atn.define_decision_state(start);
                }
                let h = self.make_block(start, node, alts);
                self.plus(q, node, h)
            }
        }
    }

    fn make_block(&mut self, start: StateId, node: NodeId, alts: &[Handle]) -> Handle {
        let end = self.new_state(StateKind::BlockEnd);
        self.atn[start].end_state = Some(end);
        self.atn[end].start_state = Some(start);
        for alt in alts {
            self.epsilon_edge(start, alt.left, false);
            self.epsilon_edge(alt.right, end, false);
            remove_tail_epsilons(&mut self.atn, alt.left);
        }
        self.node_states.insert(node, start);
        Handle::new(start, end)
    }

    fn pending(&self, blk: Handle) -> Result<PendingCheck, AtnError> {
        Ok(PendingCheck { rule: self.current_rule_index()?, entry: blk.left, exit: blk.right })
    }

    /// `(...)?` is one more alternative: an epsilon edge around the block.
    fn optional(&mut self, q: Quantifier, blk: Handle) -> Result<Handle, AtnError> {
        let check = self.pending(blk)?;
        self.optional_checks.push(check);
        self.atn[blk.left].non_greedy = !q.greedy;
        self.epsilon_edge(blk.left, blk.right, !q.greedy);
        self.node_states.insert(q.node, blk.left);
        Ok(blk)
    }

    fn plus(&mut self, q: Quantifier, block: NodeId, blk: Handle) -> Result<Handle, AtnError> {
        let check = self.pending(blk)?;
        self.closure_checks.push(check);
        let loop_back = self.new_state(StateKind::PlusLoopBack);
        self.atn[loop_back].non_greedy = !q.greedy;
        self.atn.define_decision_state(loop_back);
        let end = self.new_state(StateKind::LoopEnd);
        self.atn[blk.left].loop_back = Some(loop_back);
        self.atn[end].loop_back = Some(loop_back);
        self.node_states.insert(q.node, loop_back);
        self.epsilon_edge(blk.right, loop_back, false);

        if q.greedy {
            self.warn_greedy_wildcard(q, block);
            self.epsilon_edge(loop_back, blk.left, false);
            self.epsilon_edge(loop_back, end, false);
        } else {
            self.epsilon_edge(loop_back, end, false);
            self.epsilon_edge(loop_back, blk.left, false);
        }
        Ok(Handle::new(blk.left, end))
    }

    fn star(&mut self, q: Quantifier, block: NodeId, blk: Handle) -> Result<Handle, AtnError> {
        let check = self.pending(blk)?;
        self.closure_checks.push(check);
        let entry = self.new_state(StateKind::StarLoopEntry);
        self.atn[entry].non_greedy = !q.greedy;
        self.atn.define_decision_state(entry);
        let end = self.new_state(StateKind::LoopEnd);
        let loop_back = self.new_state(StateKind::StarLoopBack);
        self.atn[entry].loop_back = Some(loop_back);
        self.atn[end].loop_back = Some(loop_back);

        if q.greedy {
            self.warn_greedy_wildcard(q, block);
            self.epsilon_edge(entry, blk.left, false);
            self.epsilon_edge(entry, end, false);
        } else {
            self.epsilon_edge(entry, end, false);
            self.epsilon_edge(entry, blk.left, false);
        }
        self.epsilon_edge(blk.right, loop_back, false);
        self.epsilon_edge(loop_back, entry, false);
        self.node_states.insert(q.node, entry);
        Ok(Handle::new(entry, end))
    }

    fn warn_greedy_wildcard(&mut self, q: Quantifier, block: NodeId) {
        let ast = &self.g.ast;
        let has_wildcard_alt = ast.children(block).iter().any(|&alt| {
            matches!(ast.kind(alt), NodeKind::Alt { .. })
                && matches!(ast.children(alt), [e] if *ast.kind(*e) == NodeKind::Wildcard)
        });
        if has_wildcard_alt {
            self.error(ErrorKind::ExpectedNonGreedyWildcardBlock, Some(q.node), &[q.op.suffix()]);
        }
    }

    /// Splices a rule body between the rule's start and stop states.
    pub fn rule(&mut self, rule: usize, block: NodeId, body: Handle) -> Result<Handle, AtnError> {
        let missing = || AtnError::Internal(format!("rule {rule} has no start/stop states"));
        let start = self.atn.rule_to_start_state.get(rule).copied().ok_or_else(missing)?;
        let stop = self.atn.rule_to_stop_state.get(rule).copied().ok_or_else(missing)?;
        self.epsilon_edge(start, body.left, false);
        self.epsilon_edge(body.right, stop, false);
        self.node_states.insert(block, start);
        Ok(Handle::new(start, stop))
    }

    /// Return edges from each invoked rule's stop state to every call site.
    pub fn add_rule_follow_links(&mut self) {
        let mut links = Vec::new();
        for s in self.atn.states() {
            if s.kind != StateKind::Basic || s.num_transitions() != 1 {
                continue;
            }
            if let TransitionKind::Rule { rule_index, follow, .. } = s.transition(0).kind {
                links.push((rule_index, follow));
            }
        }
        for (callee, follow) in links {
            let stop = self.atn.rule_to_stop_state[callee];
            self.epsilon_edge(stop, follow, false);
        }
    }

    /// EOF edges out of rules nobody calls; returns how many there are.
    pub fn add_eof_transition_to_start_rules(&mut self) -> usize {
        self.current_rule = None;
        let eof_target = self.new_state(StateKind::Basic);
        let mut n = 0;
        for i in 0..self.atn.rule_to_stop_state.len() {
            let stop = self.atn.rule_to_stop_state[i];
            if self.atn[stop].num_transitions() > 0 {
                continue;
            }
            n += 1;
            self.atn.add_transition(stop, Transition::atom(eof_target, EOF));
        }
        n
    }

    /// Carries the pending checks and the node table through compaction.
    pub fn apply_remap(&mut self, remap: &[Option<StateId>]) {
        let map = |id: StateId| remap.get(id.index()).copied().flatten();
        let remap_checks = |checks: &mut Vec<PendingCheck>| {
            checks.retain_mut(|c| match (map(c.entry), map(c.exit)) {
                (Some(entry), Some(exit)) => {
                    c.entry = entry;
                    c.exit = exit;
                    true
                }
                _ => false,
            });
        };
        remap_checks(&mut self.closure_checks);
        remap_checks(&mut self.optional_checks);
        self.node_states = self
            .node_states
            .iter()
            .filter_map(|(&node, &s)| map(s).map(|s| (node, s)))
            .collect();
    }

    pub fn finish(self, entry_rules: usize) -> BuiltAtn {
        debug!(
            "[atn] {}: {} states, {} decisions, {} entry rules",
            self.g.name,
            self.atn.num_states(),
            self.atn.decision_to_state.len(),
            entry_rules
        );
        BuiltAtn { atn: self.atn, node_states: self.node_states, entry_rules }
    }
}

// src/atn/serialize.rs
//! Integer-stream form of an ATN (version 4) and its 16-bit word packing.
//!
//! Layout: header, states, non-greedy and precedence state lists, rules,
//! modes, interval sets, edges, decisions and, for lexers, lexer actions.
//! Rule stop states carry no serialized edges; the deserializer rebuilds
//! their return edges from the rule invocations.

use hashbrown::HashMap;

use super::{
    Atn, EOF, GrammarType, IntervalSet, LexerAction, SERIALIZED_VERSION, StateId, StateKind,
    Transition, TransitionKind,
    state::INVALID_STATE_CODE,
};
use crate::tool::errors::AtnError;

/// Rule index written for states outside any rule.
const NO_RULE: i32 = 0xFFFF;

fn err(message: impl Into<String>) -> AtnError {
    AtnError::Serialization(message.into())
}

#[inline]
fn id(s: StateId) -> i32 {
    s.index() as i32
}

pub fn serialize(atn: &Atn) -> Result<Vec<i32>, AtnError> {
    let mut data = vec![SERIALIZED_VERSION, atn.grammar_type.code(), atn.max_token_type];

    let mut non_greedy = Vec::new();
    let mut precedence = Vec::new();
    let mut sets: Vec<&IntervalSet> = Vec::new();
    let mut set_index: HashMap<&IntervalSet, usize> = HashMap::new();

    data.push(atn.slots().len() as i32);
    for slot in atn.slots() {
        let Some(s) = slot else {
            data.push(INVALID_STATE_CODE);
            continue;
        };
        if s.kind.is_decision() && s.non_greedy {
            non_greedy.push(id(s.id));
        }
        if s.kind == StateKind::RuleStart && s.left_recursive {
            precedence.push(id(s.id));
        }
        data.push(s.kind.code());
        data.push(if s.rule_index == -1 { NO_RULE } else { s.rule_index });
        if s.kind == StateKind::LoopEnd {
            let lb = s.loop_back.ok_or_else(|| err(format!("loop end {} has no loop back", s.id)))?;
            data.push(id(lb));
        } else if s.kind.is_block_start() {
            let end = s.end_state.ok_or_else(|| err(format!("block start {} has no end", s.id)))?;
            data.push(id(end));
        }
        for t in &s.transitions {
            if let TransitionKind::Set(set) | TransitionKind::NotSet(set) = &t.kind {
                if !set_index.contains_key(set) {
                    set_index.insert(set, sets.len());
                    sets.push(set);
                }
            }
        }
    }

    data.push(non_greedy.len() as i32);
    data.extend(non_greedy);
    data.push(precedence.len() as i32);
    data.extend(precedence);

    data.push(atn.rule_to_start_state.len() as i32);
    for (r, &start) in atn.rule_to_start_state.iter().enumerate() {
        data.push(id(start));
        if atn.grammar_type == GrammarType::Lexer {
            let ttype = atn.rule_to_token_type.get(r).copied().unwrap_or_default();
            data.push(ttype);
        }
    }

    data.push(atn.mode_to_start_state.len() as i32);
    data.extend(atn.mode_to_start_state.iter().map(|&s| id(s)));

    data.push(sets.len() as i32);
    for set in &sets {
        serialize_set(&mut data, set);
    }

    let edge_sources = || atn.states().filter(|s| s.kind != StateKind::RuleStop);
    data.push(edge_sources().map(|s| s.num_transitions()).sum::<usize>() as i32);
    for s in edge_sources() {
        for t in &s.transitions {
            if !atn.contains(t.target) {
                return Err(err(format!("edge {}->{} targets a removed state", s.id, t.target)));
            }
            let (trg, a1, a2, a3) = edge_args(t, &set_index)?;
            data.extend([id(s.id), trg, t.code(), a1, a2, a3]);
        }
    }

    data.push(atn.decision_to_state.len() as i32);
    data.extend(atn.decision_to_state.iter().map(|&s| id(s)));

    if atn.grammar_type == GrammarType::Lexer {
        data.push(atn.lexer_actions.len() as i32);
        for action in &atn.lexer_actions {
            let (d1, d2) = action.data();
            data.extend([action.code(), d1, d2]);
        }
    }
    Ok(data)
}

/// EOF is carried by a flag; an interval starting at EOF is written from 0.
fn serialize_set(data: &mut Vec<i32>, set: &IntervalSet) {
    let has_eof = set.contains(EOF);
    let intervals = set.intervals();
    let leading_eof = has_eof && intervals.first().is_some_and(|iv| iv.b == EOF);
    data.push(intervals.len() as i32 - i32::from(leading_eof));
    data.push(i32::from(has_eof));
    for iv in intervals {
        if iv.a == EOF {
            if iv.b == EOF {
                continue;
            }
            data.push(0);
        } else {
            data.push(iv.a);
        }
        data.push(iv.b);
    }
}

fn edge_args(
    t: &Transition,
    set_index: &HashMap<&IntervalSet, usize>,
) -> Result<(i32, i32, i32, i32), AtnError> {
    let trg = id(t.target);
    let set_arg = |set: &IntervalSet| {
        set_index.get(set).map(|&i| i as i32).ok_or_else(|| err("set edge with unindexed set"))
    };
    Ok(match &t.kind {
        TransitionKind::Epsilon { .. } | TransitionKind::Wildcard => (trg, 0, 0, 0),
        TransitionKind::Rule { rule_index, precedence, follow } => {
            (id(*follow), trg, *rule_index as i32, *precedence)
        }
        TransitionKind::Precedence(p) => (trg, *p, 0, 0),
        TransitionKind::Predicate { rule_index, pred_index, ctx_dependent } => {
            (trg, *rule_index, *pred_index, i32::from(*ctx_dependent))
        }
        TransitionKind::Range { from, to } if *from == EOF => (trg, 0, *to, 1),
        TransitionKind::Range { from, to } => (trg, *from, *to, 0),
        TransitionKind::Atom(EOF) => (trg, 0, 0, 1),
        TransitionKind::Atom(label) => (trg, *label, 0, 0),
        TransitionKind::Action { rule_index, action_index, ctx_dependent } => {
            (trg, *rule_index, *action_index, i32::from(*ctx_dependent))
        }
        TransitionKind::Set(set) | TransitionKind::NotSet(set) => (trg, set_arg(set)?, 0, 0),
    })
}

// -------------------- 16-bit words --------------------

/// Packs each value into one or two 16-bit words.
pub fn encode_words(data: &[i32]) -> Result<Vec<u16>, AtnError> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 4);
    for &v in data {
        match v {
            -1 => out.extend([0xFFFF, 0xFFFF]),
            0..=0x7FFF => out.push(v as u16),
            v if v < -1 || v >= 0x7FFF_FFFF => {
                return Err(err(format!("value {v} does not fit the 16-bit encoding")));
            }
            v => out.extend([((v >> 16) as u16) | 0x8000, (v & 0xFFFF) as u16]),
        }
    }
    Ok(out)
}

pub fn decode_words(words: &[u16]) -> Result<Vec<i32>, AtnError> {
    let mut out = Vec::with_capacity(words.len());
    let mut it = words.iter().copied();
    while let Some(hi) = it.next() {
        if hi & 0x8000 == 0 {
            out.push(i32::from(hi));
            continue;
        }
        let lo = it.next().ok_or_else(|| err("truncated two-word value"))?;
        if hi == 0xFFFF && lo == 0xFFFF {
            out.push(-1);
        } else {
            out.push((i32::from(hi & 0x7FFF) << 16) | i32::from(lo));
        }
    }
    Ok(out)
}

// -------------------- Deserialization --------------------

struct Reader<'d> {
    data: &'d [i32],
    p: usize,
}

impl<'d> Reader<'d> {
    fn next(&mut self) -> Result<i32, AtnError> {
        let v = self.data.get(self.p).copied().ok_or_else(|| err(format!("truncated at {}", self.p)))?;
        self.p += 1;
        Ok(v)
    }

    fn count(&mut self) -> Result<usize, AtnError> {
        let v = self.next()?;
        usize::try_from(v).map_err(|_| err(format!("negative count {v} at {}", self.p - 1)))
    }

    fn state(&mut self, atn: &Atn) -> Result<StateId, AtnError> {
        let v = self.next()?;
        let s = usize::try_from(v).ok().map(StateId).filter(|&s| atn.contains(s));
        s.ok_or_else(|| err(format!("state {v} at {} does not exist", self.p - 1)))
    }
}

pub fn deserialize(data: &[i32], verify: bool) -> Result<Atn, AtnError> {
    let mut r = Reader { data, p: 0 };
    let version = r.next()?;
    if version != SERIALIZED_VERSION {
        return Err(err(format!("version {version} (expected {SERIALIZED_VERSION})")));
    }
    let code = r.next()?;
    let grammar_type = GrammarType::from_code(code).ok_or_else(|| err(format!("grammar type {code}")))?;
    let max_token_type = r.next()?;
    let mut atn = Atn::new(grammar_type, max_token_type);

    // back references resolve once every state exists
    let mut loop_backs = Vec::new();
    let mut ends = Vec::new();
    let nstates = r.count()?;
    for _ in 0..nstates {
        let code = r.next()?;
        if code == INVALID_STATE_CODE {
            let s = atn.add_state(StateKind::Basic, -1);
            atn.remove_state(s);
            continue;
        }
        let kind = StateKind::from_code(code).ok_or_else(|| err(format!("state type {code}")))?;
        let rule_index = match r.next()? {
            NO_RULE => -1,
            v => v,
        };
        let s = atn.add_state(kind, rule_index);
        if kind == StateKind::LoopEnd {
            loop_backs.push((s, r.next()?));
        } else if kind.is_block_start() {
            ends.push((s, r.next()?));
        }
    }
    let lookup = |atn: &Atn, v: i32| {
        usize::try_from(v)
            .ok()
            .map(StateId)
            .filter(|&s| atn.contains(s))
            .ok_or_else(|| err(format!("reference to missing state {v}")))
    };
    for (s, lb) in loop_backs {
        let lb = lookup(&atn, lb)?;
        atn[s].loop_back = Some(lb);
    }
    for (s, end) in ends {
        let end = lookup(&atn, end)?;
        atn[s].end_state = Some(end);
    }

    for _ in 0..r.count()? {
        let s = r.state(&atn)?;
        atn[s].non_greedy = true;
    }
    for _ in 0..r.count()? {
        let s = r.state(&atn)?;
        atn[s].left_recursive = true;
    }

    for _ in 0..r.count()? {
        let start = r.state(&atn)?;
        atn.rule_to_start_state.push(start);
        if grammar_type == GrammarType::Lexer {
            let ttype = r.next()?;
            atn.rule_to_token_type.push(ttype);
        }
    }
    let mut stops = vec![None; atn.rule_to_start_state.len()];
    let rule_stops: Vec<(usize, StateId)> = atn
        .states()
        .filter(|s| s.kind == StateKind::RuleStop)
        .filter_map(|s| usize::try_from(s.rule_index).ok().map(|r| (r, s.id)))
        .collect();
    for (rule, stop) in rule_stops {
        let slot = stops.get_mut(rule).ok_or_else(|| err(format!("rule stop for unknown rule {rule}")))?;
        *slot = Some(stop);
        let start = atn.rule_to_start_state[rule];
        atn[start].stop_state = Some(stop);
    }
    atn.rule_to_stop_state = stops
        .into_iter()
        .enumerate()
        .map(|(r, s)| s.ok_or_else(|| err(format!("rule {r} has no stop state"))))
        .collect::<Result<_, _>>()?;

    for _ in 0..r.count()? {
        let s = r.state(&atn)?;
        atn.mode_to_start_state.push(s);
    }

    let mut sets = Vec::new();
    for _ in 0..r.count()? {
        let nintervals = r.count()?;
        let mut set = IntervalSet::new();
        if r.next()? != 0 {
            set.add(EOF);
        }
        for _ in 0..nintervals {
            let a = r.next()?;
            let b = r.next()?;
            set.add_range(a, b);
        }
        sets.push(set);
    }

    for _ in 0..r.count()? {
        let src = r.state(&atn)?;
        let trg = r.state(&atn)?;
        let ttype = r.next()?;
        let (a1, a2, a3) = (r.next()?, r.next()?, r.next()?);
        let t = edge_from_parts(&atn, &sets, trg, ttype, a1, a2, a3)?;
        atn.add_transition(src, t);
    }

    add_return_edges(&mut atn);
    link_blocks(&mut atn)?;

    for decision in 0..r.count()? {
        let s = r.state(&atn)?;
        if !atn[s].kind.is_decision() {
            return Err(err(format!("decision {decision} names non-decision state {s}")));
        }
        atn.decision_to_state.push(s);
        atn[s].decision = decision as i32;
    }

    if grammar_type == GrammarType::Lexer {
        for _ in 0..r.count()? {
            let (code, d1, d2) = (r.next()?, r.next()?, r.next()?);
            let action = LexerAction::from_parts(code, d1, d2)
                .ok_or_else(|| err(format!("lexer action type {code}")))?;
            atn.lexer_actions.push(action);
        }
    }

    mark_precedence_decisions(&mut atn);
    if verify {
        verify_atn(&atn)?;
    }
    Ok(atn)
}

fn edge_from_parts(
    atn: &Atn,
    sets: &[IntervalSet],
    trg: StateId,
    ttype: i32,
    a1: i32,
    a2: i32,
    a3: i32,
) -> Result<Transition, AtnError> {
    let set = |i: i32| {
        usize::try_from(i)
            .ok()
            .and_then(|i| sets.get(i))
            .cloned()
            .ok_or_else(|| err(format!("set index {i}")))
    };
    let kind = match ttype {
        1 => TransitionKind::Epsilon { outermost_precedence_return: -1 },
        2 => TransitionKind::Range { from: if a3 != 0 { EOF } else { a1 }, to: a2 },
        3 => {
            let start = usize::try_from(a1).ok().map(StateId).filter(|&s| atn.contains(s));
            let start = start.ok_or_else(|| err(format!("rule edge to missing state {a1}")))?;
            let rule_index = usize::try_from(a2).map_err(|_| err(format!("rule index {a2}")))?;
            return Ok(Transition::new(
                start,
                TransitionKind::Rule { rule_index, precedence: a3, follow: trg },
            ));
        }
        4 => TransitionKind::Predicate { rule_index: a1, pred_index: a2, ctx_dependent: a3 != 0 },
        5 => TransitionKind::Atom(if a3 != 0 { EOF } else { a1 }),
        6 => TransitionKind::Action { rule_index: a1, action_index: a2, ctx_dependent: a3 != 0 },
        7 => TransitionKind::Set(set(a1)?),
        8 => TransitionKind::NotSet(set(a1)?),
        9 => TransitionKind::Wildcard,
        10 => TransitionKind::Precedence(a1),
        other => return Err(err(format!("edge type {other}"))),
    };
    Ok(Transition::new(trg, kind))
}

/// Every rule invocation gets an epsilon edge from the callee's stop state
/// back to the follow state.
fn add_return_edges(atn: &mut Atn) {
    let mut returns = Vec::new();
    for s in atn.states() {
        for t in &s.transitions {
            if let TransitionKind::Rule { rule_index, precedence, follow } = t.kind {
                let outermost = if atn.is_left_recursive_rule(rule_index) && precedence == 0 {
                    rule_index as i32
                } else {
                    -1
                };
                returns.push((rule_index, follow, outermost));
            }
        }
    }
    for (rule, follow, outermost) in returns {
        if let Some(&stop) = atn.rule_to_stop_state.get(rule) {
            let kind = TransitionKind::Epsilon { outermost_precedence_return: outermost };
            atn.add_transition(stop, Transition::new(follow, kind));
        }
    }
}

fn link_blocks(atn: &mut Atn) -> Result<(), AtnError> {
    let ids: Vec<StateId> = atn.states().map(|s| s.id).collect();
    for s in ids {
        let kind = atn[s].kind;
        if kind.is_block_start() {
            let end = atn[s].end_state.ok_or_else(|| err(format!("block start {s} has no end")))?;
            if atn[end].start_state.is_some() {
                return Err(err(format!("block end {end} claimed by two starts")));
            }
            atn[end].start_state = Some(s);
        }
        let wanted = match kind {
            StateKind::PlusLoopBack => StateKind::PlusBlockStart,
            StateKind::StarLoopBack => StateKind::StarLoopEntry,
            _ => continue,
        };
        let targets: Vec<StateId> = atn[s]
            .transitions
            .iter()
            .map(|t| t.target)
            .filter(|&t| atn[t].kind == wanted)
            .collect();
        for t in targets {
            atn[t].loop_back = Some(s);
        }
    }
    Ok(())
}

/// Flags the star loop entries that decide a left-recursive rule's
/// precedence loop: the exit branch runs straight into the rule stop.
pub fn mark_precedence_decisions(atn: &mut Atn) {
    let mut marked = Vec::new();
    for s in atn.states().filter(|s| s.kind == StateKind::StarLoopEntry) {
        let Ok(rule) = usize::try_from(s.rule_index) else {
            continue;
        };
        if !atn.is_left_recursive_rule(rule) {
            continue;
        }
        let Some(exit) = s.transitions.last().and_then(|t| atn.get(t.target)) else {
            continue;
        };
        let to_stop = exit.kind == StateKind::LoopEnd
            && exit.num_transitions() > 0
            && exit.only_epsilon_transitions()
            && atn.get(exit.transition(0).target).is_some_and(|t| t.kind == StateKind::RuleStop);
        if to_stop {
            marked.push(s.id);
        }
    }
    for s in marked {
        atn[s].precedence_decision = true;
    }
}

/// Structural checks on a deserialized ATN.
pub fn verify_atn(atn: &Atn) -> Result<(), AtnError> {
    for s in atn.states() {
        let check = |ok: bool, what: &str| {
            if ok { Ok(()) } else { Err(err(format!("state {}: {what}", s.id))) }
        };
        let target_kind = |i: usize| atn.get(s.transition(i).target).map(|t| t.kind);
        let n = s.num_transitions();

        check(s.only_epsilon_transitions() || n <= 1, "mixes epsilon and symbol edges")?;
        match s.kind {
            StateKind::PlusBlockStart => check(s.loop_back.is_some(), "no loop back")?,
            StateKind::StarLoopEntry => {
                check(s.loop_back.is_some(), "no loop back")?;
                check(n == 2, "star loop entry needs two edges")?;
                match (target_kind(0), target_kind(1)) {
                    (Some(StateKind::StarBlockStart), Some(StateKind::LoopEnd)) => {
                        check(!s.non_greedy, "greedy loop marked non-greedy")?;
                    }
                    (Some(StateKind::LoopEnd), Some(StateKind::StarBlockStart)) => {
                        check(s.non_greedy, "non-greedy loop not marked")?;
                    }
                    _ => check(false, "star loop entry edges out of shape")?,
                }
            }
            StateKind::StarLoopBack => {
                check(n == 1, "star loop back needs one edge")?;
                check(target_kind(0) == Some(StateKind::StarLoopEntry), "loop back must reenter")?;
            }
            StateKind::LoopEnd => check(s.loop_back.is_some(), "no loop back")?,
            StateKind::RuleStart => check(s.stop_state.is_some(), "no stop state")?,
            StateKind::BlockEnd => check(s.start_state.is_some(), "no block start")?,
            _ => {}
        }
        if s.kind.is_block_start() {
            check(s.end_state.is_some(), "no block end")?;
        }
        if s.kind.is_decision() {
            check(n <= 1 || s.decision >= 0, "unnumbered decision")?;
        } else {
            check(n <= 1 || s.kind == StateKind::RuleStop, "branches without a decision")?;
        }
    }
    Ok(())
}

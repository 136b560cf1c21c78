// src/automata/lexer_factory.rs
//! Lexer ATN construction. Terminals are code points: literals become atom
//! chains, ranges and `[...]` sets become range/set edges, and `-> cmd`
//! commands and `{...}` actions become indexed lexer actions. Every mode
//! gets a token start state that fans out to the mode's non-fragment rules.

use hashbrown::HashMap;
use log::info;

use super::{BuiltAtn, ElementFactory, FactoryCore, Handle, builder, optimizer};
use crate::{
    analysis::closure::check_epsilon_closure,
    atn::{EOF, GrammarType, IntervalSet, LexerAction, StateKind, Transition, TransitionKind},
    grammar::{
        Grammar, MIN_USER_CHANNEL_VALUE,
        ast::{NodeId, NodeKind},
        char_support::{
            Escape, char_value_from_literal, parse_escape, range_escaped, string_from_literal,
        },
        parse::DEFAULT_MODE_NAME,
    },
    tool::errors::{AtnError, ErrorKind, ErrorSink},
};

/// Names reserved by the runtime; not usable as token, mode or channel names.
pub const COMMON_CONSTANTS: [&str; 8] = [
    "HIDDEN",
    "DEFAULT_TOKEN_CHANNEL",
    "DEFAULT_MODE",
    "SKIP",
    "MORE",
    "EOF",
    "MAX_CHAR_VALUE",
    "MIN_CHAR_VALUE",
];

const HIDDEN_CHANNEL: i32 = 1;
const DEFAULT_TOKEN_CHANNEL: i32 = 0;
const DEFAULT_MODE: i32 = 0;

#[derive(Debug, Clone, Default)]
enum Prev {
    #[default]
    None,
    Error,
    CodePoint(i32),
    Property(IntervalSet),
}

/// Char-set body scanner state: what the last item was, and whether a `-`
/// is waiting for the upper bound.
#[derive(Debug, Clone, Default)]
struct CharSetState {
    prev: Prev,
    in_range: bool,
}

impl CharSetState {
    fn error() -> Self {
        Self { prev: Prev::Error, in_range: false }
    }
}

pub struct LexerAtnFactory<'a> {
    core: FactoryCore<'a>,
    /// Command names seen in the current rule.
    rule_commands: Vec<String>,
    actions: Vec<LexerAction>,
    action_index: HashMap<LexerAction, usize>,
}

impl<'a> LexerAtnFactory<'a> {
    pub fn new(g: &'a Grammar, sink: &'a mut dyn ErrorSink) -> Self {
        Self {
            core: FactoryCore::new(g, sink, GrammarType::Lexer),
            rule_commands: Vec::new(),
            actions: Vec::new(),
            action_index: HashMap::new(),
        }
    }

    pub fn create_atn(mut self) -> Result<BuiltAtn, AtnError> {
        let g = self.core.g;
        for _ in &g.modes {
            let start = self.core.new_state(StateKind::TokenStart);
            self.core.atn.mode_to_start_state.push(start);
            self.core.atn.define_decision_state(start);
        }
        self.core.atn.rule_to_token_type = g.rules.iter().map(|r| g.token_type(&r.name)).collect();

        self.core.create_rule_start_and_stop_states();
        builder::build_rules(&mut self)?;
        self.core.atn.lexer_actions = std::mem::take(&mut self.actions);

        let core = &mut self.core;
        for (mode, &start) in core.atn.mode_to_start_state.clone().iter().enumerate() {
            for r in g.rules_in_mode(mode).filter(|r| !r.fragment) {
                let rule_start = core.atn.rule_to_start_state[r.index];
                core.epsilon_edge(start, rule_start, false);
            }
        }

        let remap = optimizer::optimize(g, &mut core.atn, &mut *core.sink)?;
        core.apply_remap(&remap);
        check_epsilon_closure(g, &core.atn, &core.closure_checks, &mut *core.sink);
        info!(
            "[atn] lexer {}: {} rules, {} modes, {} lexer actions",
            g.name,
            g.rules.len(),
            g.modes.len(),
            core.atn.lexer_actions.len()
        );
        Ok(self.core.finish(0))
    }

    fn lexer_action_index(&mut self, action: LexerAction) -> usize {
        let next = self.actions.len();
        *self.action_index.entry(action).or_insert_with(|| {
            self.actions.push(action);
            next
        })
    }

    fn lexer_action(&mut self, node: NodeId, action: LexerAction) -> Result<Handle, AtnError> {
        let rule_index = self.core.current_rule_index()? as i32;
        let action_index = self.lexer_action_index(action) as i32;
        Ok(self.core.single_edge(
            node,
            TransitionKind::Action { rule_index, action_index, ctx_dependent: false },
        ))
    }

    /// Reports bad bounds; true when `a..b` describes a non-empty range.
    fn check_range(&mut self, range: NodeId, a: NodeId, b: NodeId, lo: i32, hi: i32) -> bool {
        let g = self.core.g;
        let mut ok = true;
        for (node, value) in [(a, lo), (b, hi)] {
            if value == -1 {
                ok = false;
                self.core.error(ErrorKind::InvalidLiteralInLexerSet, Some(node), &[&g.ast.text(node)]);
            }
        }
        if ok && hi < lo {
            self.core.error(ErrorKind::EmptyStringsAndSetsNotAllowed, Some(range), &[&g.ast.text(range)]);
            return false;
        }
        ok
    }

    /// Adds `lo..=hi`, warning once if any of it is already in `set`.
    fn add_checked(&mut self, set: &mut IntervalSet, lo: i32, hi: i32, node: NodeId, set_text: &str) {
        if (lo..=hi).any(|v| set.contains(v)) {
            let c = |v: i32| char::from_u32(v as u32).map_or_else(|| v.to_string(), String::from);
            let chars = if lo == hi { c(lo) } else { format!("{}-{}", c(lo), c(hi)) };
            self.core.error(ErrorKind::CharactersCollisionInSet, Some(node), &[&chars, set_text]);
        }
        set.add_range(lo, hi);
    }

    fn apply_prev(&mut self, set: &mut IntervalSet, prev: &Prev, node: NodeId, text: &str) {
        match prev {
            Prev::CodePoint(cp) => self.add_checked(set, *cp, *cp, node, text),
            Prev::Property(p) => set.add_set(p),
            Prev::None | Prev::Error => {}
        }
    }

    fn move_to_code_point(
        &mut self,
        set: &mut IntervalSet,
        state: CharSetState,
        cp: i32,
        node: NodeId,
        text: &str,
    ) -> CharSetState {
        if !state.in_range {
            self.apply_prev(set, &state.prev, node, text);
            return CharSetState { prev: Prev::CodePoint(cp), in_range: false };
        }
        let Prev::CodePoint(lo) = state.prev else {
            return CharSetState::error();
        };
        if lo > cp {
            self.core.error(ErrorKind::EmptyStringsAndSetsNotAllowed, Some(node), &[&range_escaped(lo, cp)]);
        }
        self.add_checked(set, lo, cp, node, text);
        CharSetState::default()
    }

    fn move_to_property(
        &mut self,
        set: &mut IntervalSet,
        state: CharSetState,
        property: IntervalSet,
        node: NodeId,
        text: &str,
    ) -> CharSetState {
        if state.in_range {
            self.core.error(ErrorKind::UnicodePropertyNotAllowedInRange, Some(node), &[text]);
            return CharSetState::error();
        }
        self.apply_prev(set, &state.prev, node, text);
        CharSetState { prev: Prev::Property(property), in_range: false }
    }

    /// Contents of a `[...]` literal; empty after any error.
    fn char_set(&mut self, node: NodeId) -> IntervalSet {
        let g = self.core.g;
        let NodeKind::CharSet { text } = g.ast.kind(node) else {
            return IntervalSet::new();
        };
        let body = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')).unwrap_or(text);
        let chars: Vec<char> = body.chars().collect();
        let n = chars.len();
        let mut set = IntervalSet::new();
        let mut state = CharSetState::default();
        let mut i = 0;
        while i < n {
            if matches!(state.prev, Prev::Error) {
                return IntervalSet::new();
            }
            let c = chars[i];
            let mut width = 1;
            if c == '\\' {
                let (escape, len) = parse_escape(&chars, i);
                state = match escape {
                    Escape::Invalid(bad) => {
                        self.core.error(ErrorKind::InvalidEscapeSequence, Some(node), &[&bad]);
                        CharSetState::error()
                    }
                    Escape::CodePoint(cp) => self.move_to_code_point(&mut set, state, cp, node, text),
                    Escape::Property(p) => self.move_to_property(&mut set, state, p, node, text),
                };
                width = len;
            } else if c == '-'
                && !state.in_range
                && i != 0
                && i != n - 1
                && !matches!(state.prev, Prev::None)
            {
                if matches!(state.prev, Prev::Property(_)) {
                    self.core.error(ErrorKind::UnicodePropertyNotAllowedInRange, Some(node), &[text]);
                    state = CharSetState::error();
                } else {
                    state.in_range = true;
                }
            } else {
                state = self.move_to_code_point(&mut set, state, c as i32, node, text);
            }
            i += width;
        }
        if matches!(state.prev, Prev::Error) {
            return IntervalSet::new();
        }
        // a dangling range start still counts as a single char
        self.apply_prev(&mut set, &state.prev, node, text);
        if set.is_empty() {
            self.core.error(ErrorKind::EmptyStringsAndSetsNotAllowed, Some(node), &["[]"]);
        }
        set
    }

    /// Rejects command combinations that contradict each other.
    fn check_commands(&mut self, node: NodeId, command: &str) {
        if command != "pushMode" && command != "popMode" {
            let seen = |c: &str| self.rule_commands.iter().any(|s| s == c);
            if seen(command) {
                self.core.error(ErrorKind::DuplicatedCommand, Some(node), &[command]);
            }
            let conflicts: &[&str] = match command {
                "skip" => &["more", "type", "channel"],
                "more" => &["skip", "type", "channel"],
                "type" | "channel" => &["more", "skip"],
                _ => &[],
            };
            if let Some(&first) = conflicts.iter().find(|&&c| seen(c)) {
                self.core.error(ErrorKind::IncompatibleCommands, Some(node), &[first, command]);
            }
        }
        self.rule_commands.push(command.to_string());
    }

    fn create_lexer_action(&mut self, node: NodeId, command: &str, arg: Option<&str>) -> Option<LexerAction> {
        self.check_commands(node, command);
        match (command, arg) {
            ("skip", None) => Some(LexerAction::Skip),
            ("more", None) => Some(LexerAction::More),
            ("popMode", None) => Some(LexerAction::PopMode),
            ("mode", Some(a)) => self.mode_constant(node, a).map(|mode| LexerAction::Mode { mode }),
            ("pushMode", Some(a)) => {
                self.mode_constant(node, a).map(|mode| LexerAction::PushMode { mode })
            }
            ("type", Some(a)) => {
                self.token_constant(node, a).map(|token_type| LexerAction::Type { token_type })
            }
            ("channel", Some(a)) => {
                self.channel_constant(node, a).map(|channel| LexerAction::Channel { channel })
            }
            _ => None,
        }
    }

    fn mode_constant(&mut self, node: NodeId, name: &str) -> Option<i32> {
        if name == DEFAULT_MODE_NAME {
            return Some(DEFAULT_MODE);
        }
        if COMMON_CONSTANTS.contains(&name) {
            self.core.error(ErrorKind::ModeConflictsWithCommonConstants, Some(node), &[name]);
            return None;
        }
        if let Some(mode) = self.core.g.mode_index(name) {
            return Some(mode as i32);
        }
        let value = name.parse::<i32>().ok();
        if value.is_none() {
            self.core.error(ErrorKind::ConstantValueIsNotARecognizedModeName, Some(node), &[name]);
        }
        value
    }

    fn token_constant(&mut self, node: NodeId, name: &str) -> Option<i32> {
        if name == "EOF" {
            return Some(EOF);
        }
        if COMMON_CONSTANTS.contains(&name) {
            self.core.error(ErrorKind::TokenConflictsWithCommonConstants, Some(node), &[name]);
            return None;
        }
        let ttype = self.core.g.token_type(name);
        if ttype != 0 {
            return Some(ttype);
        }
        let value = name.parse::<i32>().ok();
        if value.is_none() {
            self.core.error(ErrorKind::ConstantValueIsNotARecognizedTokenName, Some(node), &[name]);
        }
        value
    }

    fn channel_constant(&mut self, node: NodeId, name: &str) -> Option<i32> {
        match name {
            "HIDDEN" => return Some(HIDDEN_CHANNEL),
            "DEFAULT_TOKEN_CHANNEL" => return Some(DEFAULT_TOKEN_CHANNEL),
            _ => {}
        }
        if COMMON_CONSTANTS.contains(&name) {
            self.core.error(ErrorKind::ChannelConflictsWithCommonConstants, Some(node), &[name]);
            return None;
        }
        if let Some(channel) = self.core.g.channel_value(name).filter(|&c| c >= MIN_USER_CHANNEL_VALUE) {
            return Some(channel);
        }
        let value = name.parse::<i32>().ok();
        if value.is_none() {
            self.core.error(ErrorKind::ConstantValueIsNotARecognizedChannelName, Some(node), &[name]);
        }
        value
    }
}

impl<'a> ElementFactory<'a> for LexerAtnFactory<'a> {
    fn core(&mut self) -> &mut FactoryCore<'a> {
        &mut self.core
    }

    fn begin_rule(&mut self, rule: usize) {
        self.core.current_rule = Some(rule);
        self.rule_commands.clear();
    }

    /// `EOF` matches end of input; any other token name invokes that rule.
    fn token_ref(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError> {
        let g = self.core.g;
        let NodeKind::TokenRef { name } = g.ast.kind(node) else {
            return Err(AtnError::Internal(format!("node {} is not a token reference", node.0)));
        };
        if name == "EOF" {
            return Ok(Some(self.core.token_atom(node, EOF)));
        }
        self.core.rule_ref(node, name, None)
    }

    fn string_literal(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError> {
        let g = self.core.g;
        let NodeKind::StringLiteral { text } = g.ast.kind(node) else {
            return Err(AtnError::Internal(format!("node {} is not a literal", node.0)));
        };
        let left = self.core.new_state(StateKind::Basic);
        self.core.node_states.insert(node, left);
        let value = match string_from_literal(text) {
            Some(s) if s.is_empty() => {
                self.core.error(ErrorKind::EmptyStringsAndSetsNotAllowed, Some(node), &["''"]);
                return Ok(Some(Handle::new(left, left)));
            }
            Some(s) => s,
            None => {
                self.core.error(ErrorKind::InvalidEscapeSequence, Some(node), &[text]);
                return Ok(Some(Handle::new(left, left)));
            }
        };
        let mut prev = left;
        for c in value.chars() {
            let next = self.core.new_state(StateKind::Basic);
            self.core.atn.add_transition(prev, Transition::atom(next, c as i32));
            prev = next;
        }
        Ok(Some(Handle::new(left, prev)))
    }

    fn range(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError> {
        let g = self.core.g;
        let [a, b] = g.ast.children(node) else {
            return Err(AtnError::Internal(format!("range {} needs two bounds", node.0)));
        };
        let (a, b) = (*a, *b);
        let left = self.core.new_state(StateKind::Basic);
        let right = self.core.new_state(StateKind::Basic);
        let lo = char_value_from_literal(&g.ast.text(a));
        let hi = char_value_from_literal(&g.ast.text(b));
        if self.check_range(node, a, b, lo, hi) {
            self.core.atn.add_transition(left, Transition::code_point_range(right, lo, hi));
        }
        for n in [node, a, b] {
            self.core.node_states.insert(n, left);
        }
        Ok(Some(Handle::new(left, right)))
    }

    fn set(&mut self, node: NodeId, invert: bool) -> Result<Option<Handle>, AtnError> {
        let g = self.core.g;
        let set_text = g.ast.text(node);
        let left = self.core.new_state(StateKind::Basic);
        let right = self.core.new_state(StateKind::Basic);
        let mut set = IntervalSet::new();
        for &element in g.ast.children(node) {
            match g.ast.kind(element) {
                NodeKind::Range => {
                    let &[a, b] = g.ast.children(element) else {
                        continue;
                    };
                    let lo = char_value_from_literal(&g.ast.text(a));
                    let hi = char_value_from_literal(&g.ast.text(b));
                    if self.check_range(element, a, b, lo, hi) {
                        self.add_checked(&mut set, lo, hi, element, &set_text);
                    }
                }
                NodeKind::CharSet { .. } => {
                    let chars = self.char_set(element);
                    set.add_set(&chars);
                }
                NodeKind::StringLiteral { text } => match char_value_from_literal(text) {
                    -1 => self.core.error(ErrorKind::InvalidLiteralInLexerSet, Some(element), &[text]),
                    v => self.add_checked(&mut set, v, v, element, &set_text),
                },
                NodeKind::TokenRef { name } => {
                    self.core.error(ErrorKind::UnsupportedReferenceInLexerSet, Some(element), &[name]);
                }
                _ => {}
            }
        }
        let t = if invert {
            Transition::new(right, TransitionKind::NotSet(set))
        } else {
            match set.intervals() {
                [only] => Transition::code_point_range(right, only.a, only.b),
                _ => Transition::new(right, TransitionKind::Set(set)),
            }
        };
        self.core.atn.add_transition(left, t);
        self.core.node_states.insert(node, left);
        Ok(Some(Handle::new(left, right)))
    }

    fn char_set_literal(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError> {
        let left = self.core.new_state(StateKind::Basic);
        let right = self.core.new_state(StateKind::Basic);
        let set = self.char_set(node);
        self.core.atn.add_transition(left, Transition::new(right, TransitionKind::Set(set)));
        self.core.node_states.insert(node, left);
        Ok(Some(Handle::new(left, right)))
    }

    fn action(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError> {
        let rule_index = self.core.current_rule_index()? as i32;
        let action_index = self.core.g.lexer_action_index(node).map_or(-1, |i| i as i32);
        self.lexer_action(node, LexerAction::Custom { rule_index, action_index }).map(Some)
    }

    fn lexer_command(&mut self, node: NodeId) -> Result<Option<Handle>, AtnError> {
        let g = self.core.g;
        let NodeKind::LexerCommand { name, arg } = g.ast.kind(node) else {
            return Err(AtnError::Internal(format!("node {} is not a lexer command", node.0)));
        };
        if let Some(action) = self.create_lexer_action(node, name, arg.as_deref()) {
            return self.lexer_action(node, action).map(Some);
        }
        let takes_arg = match name.as_str() {
            "skip" | "more" | "popMode" => false,
            "mode" | "pushMode" | "type" | "channel" => true,
            _ => {
                self.core.error(ErrorKind::InvalidLexerCommand, Some(node), &[name]);
                return Ok(Some(self.core.epsilon(node)));
            }
        };
        match (takes_arg, arg.is_some()) {
            (false, true) => self.core.error(ErrorKind::UnwantedLexerCommandArgument, Some(node), &[name]),
            (true, false) => self.core.error(ErrorKind::MissingLexerCommandArgument, Some(node), &[name]),
            // argument present but unresolved; already reported
            _ => {}
        }
        Ok(Some(self.core.epsilon(node)))
    }

    fn lexer_alt_commands(&mut self, alt: Handle, commands: Option<Handle>) -> Result<Handle, AtnError> {
        let Some(cmds) = commands else {
            return Ok(alt);
        };
        self.core.epsilon_edge(alt.right, cmds.left, false);
        Ok(Handle::new(alt.left, cmds.right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{atn::Interval, tool::errors::ErrorManager};

    fn char_set_of(src: &str) -> (IntervalSet, ErrorManager) {
        let g = Grammar::new(&format!("lexer grammar L;\nA : {src} ;")).expect("grammar");
        let node = g.ast.descendants(g.rules[0].block).into_iter().find(|&n| {
            matches!(g.ast.kind(n), NodeKind::CharSet { .. })
        });
        let mut em = ErrorManager::new();
        let set = {
            let mut f = LexerAtnFactory::new(&g, &mut em);
            f.char_set(node.expect("char set node"))
        };
        (set, em)
    }

    #[test]
    fn char_set_ranges_and_escapes() {
        let (set, em) = char_set_of(r"[a-c\n_-]");
        assert!(em.diagnostics.is_empty(), "{:?}", em.diagnostics);
        assert_eq!(
            set.intervals(),
            &[Interval::new(10, 10), Interval::new(45, 45), Interval::new(95, 95), Interval::new(97, 99)]
        );
    }

    #[test]
    fn reversed_char_set_range_is_reported() {
        let (set, em) = char_set_of("[z-a]");
        assert_eq!(em.kinds(), [ErrorKind::EmptyStringsAndSetsNotAllowed, ErrorKind::EmptyStringsAndSetsNotAllowed]);
        assert_eq!(em.diagnostics[0].args, ["'z'..'a'"]);
        assert!(set.is_empty());
    }

    #[test]
    fn property_cannot_bound_a_range() {
        let (set, em) = char_set_of(r"[\p{ASCII}-z]");
        assert_eq!(em.kinds(), [ErrorKind::UnicodePropertyNotAllowedInRange]);
        assert!(set.is_empty());
    }

    #[test]
    fn duplicate_chars_warn_once() {
        let (set, em) = char_set_of("[aa-c]");
        assert_eq!(em.kinds(), [ErrorKind::CharactersCollisionInSet]);
        assert_eq!(em.diagnostics[0].args, ["a-c", "[aa-c]"]);
        assert_eq!(set.intervals(), &[Interval::new(97, 99)]);
    }

    #[test]
    fn invalid_escape_empties_the_set() {
        let (set, em) = char_set_of(r"[\qa]");
        assert_eq!(em.kinds(), [ErrorKind::InvalidEscapeSequence]);
        assert_eq!(em.diagnostics[0].args, [r"\q"]);
        assert!(set.is_empty());
    }
}

// src/grammar/ast.rs
//! Arena-allocated grammar syntax tree. Nodes are addressed by `NodeId`;
//! the ATN factories keep their own `NodeId -> StateId` side table.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct SourcePos {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EbnfOp {
    Optional,
    Closure,
    PositiveClosure,
}

impl EbnfOp {
    pub fn suffix(self) -> &'static str {
        match self {
            EbnfOp::Optional => "?",
            EbnfOp::Closure => "*",
            EbnfOp::PositiveClosure => "+",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Children are alternatives.
    Block,
    /// Children are elements; none means an epsilon alternative.
    Alt { label: Option<String> },
    /// Children: the alternative, then its lexer commands.
    LexerAltAction,
    LexerCommand { name: String, arg: Option<String> },
    /// Child: a `Block`.
    Ebnf { op: EbnfOp, greedy: bool },
    TokenRef { name: String },
    /// Raw text, quotes included.
    StringLiteral { text: String },
    RuleRef { name: String, precedence: Option<i32> },
    /// Children: two string literals.
    Range,
    /// Raw text, brackets included.
    CharSet { text: String },
    Wildcard,
    /// Child: a `Set`.
    Not,
    /// Children: set elements (literals, token refs, ranges, char sets).
    Set,
    Action { text: String },
    Sempred { text: String, precedence: Option<i32> },
    /// Child: the labeled element.
    Labeled { label: String, list: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub pos: SourcePos,
}

#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: NodeKind, pos: SourcePos, children: Vec<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { kind, children, pos });
        id
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    #[inline]
    pub fn pos(&self, id: NodeId) -> SourcePos {
        self.nodes[id.0].pos
    }

    pub fn set_children(&mut self, id: NodeId, children: Vec<NodeId>) {
        self.nodes[id.0].children = children;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order walk of the subtree rooted at `root`.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &c in self.children(id).iter().rev() {
                stack.push(c);
            }
        }
        out
    }

    /// Source-like text of a node, used in diagnostics.
    pub fn text(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::TokenRef { name } | NodeKind::RuleRef { name, .. } => name.clone(),
            NodeKind::StringLiteral { text } | NodeKind::CharSet { text } => text.clone(),
            NodeKind::Action { text } => format!("{{{text}}}"),
            NodeKind::Sempred { text, .. } => format!("{{{text}}}?"),
            NodeKind::Wildcard => ".".to_string(),
            NodeKind::LexerCommand { name, .. } => name.clone(),
            NodeKind::Range => {
                let c = self.children(id);
                match c {
                    [a, b] => format!("{}..{}", self.text(*a), self.text(*b)),
                    _ => "..".to_string(),
                }
            }
            NodeKind::Not => format!("~{}", self.children(id).first().map(|&c| self.text(c)).unwrap_or_default()),
            NodeKind::Set => self
                .children(id)
                .iter()
                .map(|&c| self.text(c))
                .collect::<Vec<_>>()
                .join(" | "),
            NodeKind::Labeled { label, list } => {
                let op = if *list { "+=" } else { "=" };
                let inner = self.children(id).first().map(|&c| self.text(c)).unwrap_or_default();
                format!("{label}{op}{inner}")
            }
            NodeKind::Block | NodeKind::Alt { .. } | NodeKind::LexerAltAction => "(...)".to_string(),
            NodeKind::Ebnf { op, .. } => format!("(...){}", op.suffix()),
        }
    }
}

//! Arena syntax tree built by the [`parser`](crate::parser).
//!
//! Nodes live in a flat vector and refer to each other by [`NodeId`]. Child
//! slots are positional: binary nodes keep `[left, right]`, calls and
//! indexers keep their target in slot 0 followed by arguments, a between
//! node keeps `[value, low_flag, low, high, high_flag]`.

use crate::expr::CompareOp;
use crate::scanner::needs_quoting;
use crate::token::{Literal, Position, Token, TokenKind};

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Constant,
    MemberAccess,
    Parameter,
    DefaultArgument,
    /// Placeholder left operand of unary minus, `!` and array literals.
    Empty,
    MethodName,
    /// Bracket of a between clause, the token literal says if it is inclusive.
    Flag,
    Dot,
    Add,
    Subtract,
    Multiply,
    Divide,
    Compare(CompareOp),
    Like,
    And,
    Or,
    Not,
    Range,
    Between,
    Method,
    Array,
    Object,
    Colon,
    Yield,
    Reduce,
    Compose,
    Export,
}

impl NodeKind {
    pub fn for_token(kind: TokenKind) -> Option<NodeKind> {
        let node = match kind {
            TokenKind::ConstantNumber
            | TokenKind::ConstantString
            | TokenKind::ConstantBoolean
            | TokenKind::ConstantNull => NodeKind::Constant,
            TokenKind::MemberAccess => NodeKind::MemberAccess,
            TokenKind::Parameter => NodeKind::Parameter,
            TokenKind::DefaultArgument => NodeKind::DefaultArgument,
            TokenKind::MethodCall => NodeKind::MethodName,
            TokenKind::BetweenStart | TokenKind::BetweenEnd => NodeKind::Flag,
            TokenKind::Dot => NodeKind::Dot,
            TokenKind::Add => NodeKind::Add,
            TokenKind::Subtract => NodeKind::Subtract,
            TokenKind::Multiply => NodeKind::Multiply,
            TokenKind::Divide => NodeKind::Divide,
            TokenKind::Equal => NodeKind::Compare(CompareOp::Equal),
            TokenKind::NotEqual => NodeKind::Compare(CompareOp::NotEqual),
            TokenKind::Greater => NodeKind::Compare(CompareOp::Greater),
            TokenKind::GreaterOrEqual => NodeKind::Compare(CompareOp::GreaterOrEqual),
            TokenKind::Less => NodeKind::Compare(CompareOp::Less),
            TokenKind::LessOrEqual => NodeKind::Compare(CompareOp::LessOrEqual),
            TokenKind::Like => NodeKind::Like,
            TokenKind::And => NodeKind::And,
            TokenKind::Or => NodeKind::Or,
            TokenKind::Not => NodeKind::Not,
            TokenKind::Range => NodeKind::Range,
            TokenKind::Between => NodeKind::Between,
            TokenKind::MethodStart => NodeKind::Method,
            TokenKind::ArrayIndexStart => NodeKind::Array,
            TokenKind::OpenBrace => NodeKind::Object,
            TokenKind::Colon => NodeKind::Colon,
            TokenKind::Yield => NodeKind::Yield,
            TokenKind::Reduce => NodeKind::Reduce,
            TokenKind::Compose => NodeKind::Compose,
            TokenKind::Export => NodeKind::Export,
            _ => return None,
        };
        Some(node)
    }

    /// Binding priority used when docking nodes. Larger binds looser.
    pub fn priority(self) -> i32 {
        match self {
            NodeKind::Dot => -2,
            NodeKind::Compare(_) | NodeKind::Like => 0,
            NodeKind::And | NodeKind::Or | NodeKind::Not => 1,
            NodeKind::Compose => 2,
            NodeKind::Yield => 3,
            NodeKind::Reduce => 4,
            NodeKind::Colon => 5,
            NodeKind::Export => 7,
            _ => -1,
        }
    }

    pub fn is_operator(self) -> bool {
        matches!(
            self,
            NodeKind::Add
                | NodeKind::Subtract
                | NodeKind::Multiply
                | NodeKind::Divide
                | NodeKind::Compose
        )
    }

    pub fn is_binary(self) -> bool {
        self.is_operator()
            || matches!(
                self,
                NodeKind::Compare(_)
                    | NodeKind::Like
                    | NodeKind::And
                    | NodeKind::Or
                    | NodeKind::Not
                    | NodeKind::Range
                    | NodeKind::Colon
                    | NodeKind::Yield
                    | NodeKind::Reduce
                    | NodeKind::Export
            )
    }

    /// Nodes that may be followed by `[...]`.
    pub fn is_indexable(self) -> bool {
        matches!(
            self,
            NodeKind::MemberAccess
                | NodeKind::Array
                | NodeKind::Dot
                | NodeKind::Method
                | NodeKind::Compose
                | NodeKind::Yield
                | NodeKind::DefaultArgument
        )
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub token: Token,
    children: Vec<Option<NodeId>>,
    parent: Option<NodeId>,
    immutable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new() -> Self {
        Tree { nodes: Vec::new() }
    }

    pub fn push(&mut self, kind: NodeKind, token: Token) -> NodeId {
        self.nodes.push(Node {
            kind,
            token,
            children: Vec::new(),
            parent: None,
            immutable: false,
        });
        self.nodes.len() - 1
    }

    pub fn empty(&mut self, position: Position) -> NodeId {
        self.push(
            NodeKind::Empty,
            Token::new(TokenKind::Variable, "", position),
        )
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id].kind
    }

    pub fn token(&self, id: NodeId) -> &Token {
        &self.nodes[id].token
    }

    pub fn text(&self, id: NodeId) -> &str {
        &self.nodes[id].token.text
    }

    pub fn children(&self, id: NodeId) -> &[Option<NodeId>] {
        &self.nodes[id].children
    }

    /// Occupied child slots starting at `from`.
    pub fn arguments(&self, id: NodeId, from: usize) -> Vec<NodeId> {
        self.nodes[id].children.iter().skip(from).flatten().copied().collect()
    }

    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].children.first().copied().flatten()
    }

    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].children.get(1).copied().flatten()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn is_immutable(&self, id: NodeId) -> bool {
        self.nodes[id].immutable
    }

    pub fn is_operator(&self, id: NodeId) -> bool {
        self.kind(id).is_operator()
    }

    pub fn is_binary(&self, id: NodeId) -> bool {
        self.kind(id).is_binary()
    }

    /// A subtraction whose left operand is the empty placeholder.
    pub fn is_negation(&self, id: NodeId) -> bool {
        self.kind(id) == NodeKind::Subtract
            && self.left(id).is_some_and(|l| self.kind(l) == NodeKind::Empty)
    }

    pub(crate) fn set_token(&mut self, id: NodeId, token: Token) {
        self.nodes[id].token = token;
    }

    pub(crate) fn set_immutable(&mut self, id: NodeId) {
        self.nodes[id].immutable = true;
    }

    /// Whether `ancestor` is `id` or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.nodes[node].parent;
        }
        false
    }

    /// Attaching an ancestor of `id` below it is refused and leaves the
    /// slot untouched.
    fn set_slot(&mut self, id: NodeId, slot: usize, child: NodeId) -> Option<NodeId> {
        if self.is_ancestor(child, id) {
            return None;
        }
        let children = &mut self.nodes[id].children;
        if children.len() <= slot {
            children.resize(slot + 1, None);
        }
        let replaced = children[slot].replace(child);
        self.nodes[child].parent = Some(id);
        replaced
    }

    /// Sets the left slot and returns the child it displaced.
    pub(crate) fn set_left(&mut self, id: NodeId, child: NodeId) -> Option<NodeId> {
        self.set_slot(id, 0, child)
    }

    /// Sets the right slot and returns the child it displaced.
    pub(crate) fn set_right(&mut self, id: NodeId, child: NodeId) -> Option<NodeId> {
        self.set_slot(id, 1, child)
    }

    pub(crate) fn add_child(&mut self, id: NodeId, child: NodeId) {
        if self.is_ancestor(child, id) {
            return;
        }
        self.nodes[id].children.push(Some(child));
        self.nodes[child].parent = Some(id);
    }

    pub(crate) fn replace_children(&mut self, id: NodeId, children: Vec<NodeId>) {
        for &child in &children {
            self.nodes[child].parent = Some(id);
        }
        self.nodes[id].children = children.into_iter().map(Some).collect();
    }

    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            current = parent;
        }
        current
    }

    /// Source-like rendering of the subtree at `id`.
    pub fn render(&self, id: NodeId) -> String {
        let node = &self.nodes[id];
        let slot = |index: usize| {
            node.children
                .get(index)
                .copied()
                .flatten()
                .map(|child| self.render(child))
                .unwrap_or_default()
        };
        let list = |from: usize| {
            self.arguments(id, from)
                .into_iter()
                .map(|child| self.render(child))
                .collect::<Vec<_>>()
                .join(",")
        };

        let rendered = match node.kind {
            NodeKind::Constant => match &node.token.literal {
                Some(Literal::Text(text)) => format!("'{}'", text.replace('\'', "\\'")),
                _ => node.token.text.clone(),
            },
            NodeKind::MemberAccess if needs_quoting(&node.token.text) => {
                format!("`{}`", node.token.text)
            }
            NodeKind::MemberAccess => node.token.text.clone(),
            NodeKind::Parameter
            | NodeKind::DefaultArgument
            | NodeKind::MethodName
            | NodeKind::Flag => node.token.text.clone(),
            NodeKind::Empty => String::new(),
            NodeKind::Dot => format!("{}.{}", slot(0), slot(1)),
            NodeKind::Method => format!("{}({})", slot(0), list(1)),
            NodeKind::Array => format!("{}[{}]", slot(0), list(1)),
            NodeKind::Object => format!("{{{}}}", list(0)),
            NodeKind::Between => format!(
                "{} {} {}{},{}{}",
                slot(0),
                node.token.text,
                slot(1),
                slot(2),
                slot(3),
                slot(4)
            ),
            _ if self.left(id).is_some_and(|l| self.kind(l) == NodeKind::Empty) => {
                format!("{}{}", node.token.text, slot(1))
            }
            _ => format!("{} {} {}", slot(0), node.token.text, slot(1)),
        };

        if node.immutable && node.kind.is_binary() {
            format!("({})", rendered)
        } else {
            rendered
        }
    }
}

#[test]
fn test_attaching_an_ancestor_is_refused() {
    let mut tree = Tree::new();
    let token = |kind: TokenKind, text: &str| Token::new(kind, text, Position::default());
    let between = tree.push(NodeKind::Between, token(TokenKind::Between, "between"));
    let multiply = tree.push(NodeKind::Multiply, token(TokenKind::Multiply, "*"));
    tree.set_left(multiply, between);

    assert_eq!(tree.set_right(between, multiply), None);
    assert_eq!(tree.right(between), None);
    assert_eq!(tree.root_of(between), multiply);
}

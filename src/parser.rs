//! Incremental tree construction.
//!
//! [`TreeBuilder`] receives one classified token at a time. Tight operators
//! (`.`, arithmetic, ranges) are assembled around a *current* node; looser
//! ones (comparers, logic, `=>`, `->`, `<-`) are merged into the active
//! [`BranchManager`](crate::branch::BranchManager) branch which docks them by
//! priority. Bracketed regions open branches of their own.
//!
//! ```text
//! Comments[LikedCount > 3] => { Author, n: LikedCount * 2 }
//!
//!                 =>
//!               /    \
//!           [ ]        { }
//!          /   \        |  \
//!   Comments   >      Author  :
//!             / \            / \
//!    LikedCount  3          n   *
//! ```

use tracing::trace;

use crate::branch::{BranchKind, BranchManager};
use crate::error::CompileError;
use crate::node::{NodeId, NodeKind, Tree};
use crate::token::{Token, TokenKind};

/// A finished syntax tree with its root.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    tree: Tree,
    root: NodeId,
}

impl SyntaxTree {
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_kind(&self) -> NodeKind {
        self.tree.kind(self.root)
    }

    pub fn render(&self) -> String {
        self.tree.render(self.root)
    }
}

/// Parse one statement.
pub fn parse(tokens: Vec<Token>) -> Result<SyntaxTree, CompileError> {
    let mut builder = TreeBuilder::new();
    for token in tokens {
        builder.append(token)?;
    }
    builder.finish()
}

#[derive(Debug, Default)]
pub struct TreeBuilder {
    tree: Tree,
    branches: BranchManager,
    current: Option<NodeId>,
    /// Operators waiting for a group or call as their right operand, one
    /// entry per open `(`.
    hosts: Vec<Option<NodeId>>,
    pending_host: Option<NodeId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder {
            tree: Tree::new(),
            branches: BranchManager::new(),
            current: None,
            hosts: Vec::new(),
            pending_host: None,
        }
    }

    pub fn append(&mut self, token: Token) -> Result<(), CompileError> {
        trace!(kind = ?token.kind, text = %token.text, "append token");
        if self.current.is_some_and(|current| self.awaits_interval(current))
            && token.kind != TokenKind::BetweenStart
        {
            return Err(CompileError::unsupported(&token));
        }
        match token.kind {
            TokenKind::Parameter
            | TokenKind::MemberAccess
            | TokenKind::DefaultArgument
            | TokenKind::ConstantNumber
            | TokenKind::ConstantString
            | TokenKind::ConstantBoolean
            | TokenKind::ConstantNull => self.append_operand(token),
            TokenKind::Dot => self.append_dot(token),
            TokenKind::Equal
            | TokenKind::NotEqual
            | TokenKind::Greater
            | TokenKind::GreaterOrEqual
            | TokenKind::Less
            | TokenKind::LessOrEqual
            | TokenKind::Like
            | TokenKind::And
            | TokenKind::Or
            | TokenKind::Yield
            | TokenKind::Reduce
            | TokenKind::Export => {
                let node = self.push(token)?;
                self.merge_current();
                self.branches.merge(&mut self.tree, Some(node));
                Ok(())
            }
            TokenKind::Not => {
                let position = token.position;
                let node = self.push(token)?;
                let empty = self.tree.empty(position);
                self.tree.set_left(node, empty);
                self.merge_current();
                self.branches.merge(&mut self.tree, Some(node));
                Ok(())
            }
            TokenKind::Add | TokenKind::Subtract => self.append_additive(token),
            TokenKind::Multiply | TokenKind::Divide => self.append_multiplicative(token),
            TokenKind::BlockStart => {
                let host = self.take_host();
                self.hosts.push(host);
                self.branches.open(BranchKind::Default, None);
                Ok(())
            }
            TokenKind::BlockEnd => {
                self.merge_current();
                let root = self.branches.root();
                if let Some(root) = root {
                    self.tree.set_immutable(root);
                }
                self.close(&token)?;
                self.current = root;
                self.dock_host();
                Ok(())
            }
            TokenKind::MethodCall => {
                let node = self.push(token)?;
                self.pending_host = self.take_host();
                self.current = Some(node);
                Ok(())
            }
            TokenKind::MethodStart => self.open_method(token),
            TokenKind::MethodEnd => {
                self.close_container(token, BranchKind::Method)?;
                self.dock_host();
                Ok(())
            }
            TokenKind::Comma => self.append_comma(token),
            TokenKind::ArrayIndexStart => self.open_array(token),
            TokenKind::ArrayIndexEnd => {
                self.close_container(token, BranchKind::Array)?;
                self.current = self.current.map(|array| self.tree.root_of(array));
                Ok(())
            }
            TokenKind::Range => {
                let position = token.position;
                let node = self.push(token)?;
                let left = match self.current {
                    Some(current) => current,
                    None => self.tree.empty(position),
                };
                self.tree.set_left(node, left);
                self.current = Some(node);
                Ok(())
            }
            TokenKind::Between => {
                let current = self.require_current(&token)?;
                let node = self.push(token)?;
                self.branches.open(BranchKind::Method, Some(node));
                self.tree.set_left(node, current);
                self.current = Some(node);
                Ok(())
            }
            TokenKind::BetweenStart => {
                let current = self.require_current(&token)?;
                let flag = self.push(token)?;
                self.tree.add_child(current, flag);
                self.branches.open(BranchKind::Default, None);
                self.current = None;
                Ok(())
            }
            TokenKind::BetweenEnd => self.close_between(token),
            TokenKind::OpenBrace => {
                let node = self.push(token)?;
                self.merge_current();
                self.branches.open(BranchKind::Object, Some(node));
                self.branches.open(BranchKind::Default, None);
                Ok(())
            }
            TokenKind::CloseBrace => self.close_container(token, BranchKind::Object),
            TokenKind::Colon => {
                let current = self.require_current(&token)?;
                if self.tree.kind(current) != NodeKind::MemberAccess {
                    return Err(CompileError::unsupported(self.tree.token(current)));
                }
                let node = self.push(token)?;
                self.tree.set_left(node, current);
                self.branches.open(BranchKind::Assignment, Some(node));
                self.current = None;
                Ok(())
            }
            TokenKind::Compose => {
                let current = self.require_current(&token)?;
                if !matches!(
                    self.tree.kind(current),
                    NodeKind::MemberAccess | NodeKind::Yield | NodeKind::Dot | NodeKind::Array
                ) {
                    return Err(CompileError::unsupported(&token));
                }
                let node = self.push(token)?;
                let left = self.tree.root_of(current);
                self.tree.set_left(node, left);
                self.current = Some(node);
                Ok(())
            }
            _ => Err(CompileError::unsupported(&token)),
        }
    }

    /// Completes the statement and returns its tree.
    pub fn finish(mut self) -> Result<SyntaxTree, CompileError> {
        if !self.branches.is_main() {
            return Err(CompileError::IncompleteExpression);
        }
        self.merge_current();
        let root = self.branches.root().ok_or(CompileError::EmptyExpression)?;
        Ok(SyntaxTree {
            tree: self.tree,
            root,
        })
    }

    fn push(&mut self, token: Token) -> Result<NodeId, CompileError> {
        let kind = NodeKind::for_token(token.kind).ok_or_else(|| CompileError::unsupported(&token))?;
        Ok(self.tree.push(kind, token))
    }

    /// A `between` that has its value but not yet its opening bracket.
    fn awaits_interval(&self, id: NodeId) -> bool {
        self.tree.kind(id) == NodeKind::Between && self.tree.children(id).len() == 1
    }

    fn require_current(&self, token: &Token) -> Result<NodeId, CompileError> {
        self.current.ok_or_else(|| CompileError::invalid_operator(token))
    }

    fn merge_current(&mut self) {
        let current = self.current.take();
        self.branches.merge(&mut self.tree, current);
    }

    fn close(&mut self, token: &Token) -> Result<(), CompileError> {
        self.branches
            .close()
            .map(|_| ())
            .ok_or_else(|| CompileError::unsupported(token))
    }

    /// Takes the current node out of play before a `(`. An arithmetic chain
    /// still missing its right operand is kept aside to receive the group;
    /// anything else is merged into the branch.
    fn take_host(&mut self) -> Option<NodeId> {
        match self.current {
            Some(current)
                if self.tree.is_operator(current)
                    && !self.tree.is_immutable(current)
                    && self.tree.right(self.open_operator(current)).is_none() =>
            {
                self.current = None;
                Some(current)
            }
            _ => {
                self.merge_current();
                None
            }
        }
    }

    /// Attaches the group just closed to the operator kept by `take_host`.
    fn dock_host(&mut self) {
        let Some(Some(host)) = self.hosts.pop() else {
            return;
        };
        let open = self.open_operator(host);
        if let Some(group) = self.current {
            self.tree.set_right(open, group);
        }
        self.current = Some(self.tree.root_of(host));
    }

    /// Walks down the right spine of an operator chain to the operator
    /// whose right operand is still open for extension.
    fn open_operator(&self, mut host: NodeId) -> NodeId {
        while let Some(right) = self.tree.right(host) {
            if self.tree.is_operator(right) && !self.tree.is_immutable(right) {
                host = right;
            } else {
                break;
            }
        }
        host
    }

    fn append_operand(&mut self, token: Token) -> Result<(), CompileError> {
        let is_parameter = token.kind == TokenKind::Parameter;
        let node = self.push(token)?;
        let Some(current) = self.current else {
            self.current = Some(node);
            return Ok(());
        };

        let kind = self.tree.kind(current);
        if kind == NodeKind::Dot {
            if is_parameter {
                return Err(CompileError::invalid_operator(self.tree.token(current)));
            }
            if self.tree.right(current).is_some() {
                return Err(CompileError::unsupported(self.tree.token(node)));
            }
            self.tree.set_right(current, node);
        } else if kind.is_operator() {
            let host = self.open_operator(current);
            match self.tree.right(host) {
                Some(right)
                    if self.tree.kind(right) == NodeKind::Dot && self.tree.right(right).is_none() =>
                {
                    if is_parameter {
                        return Err(CompileError::invalid_operator(self.tree.token(right)));
                    }
                    self.tree.set_right(right, node);
                }
                None => {
                    self.tree.set_right(host, node);
                    self.current = Some(self.tree.root_of(current));
                }
                Some(_) => return Err(CompileError::unsupported(self.tree.token(node))),
            }
        } else if kind.is_binary() && self.tree.right(current).is_none() {
            self.tree.set_right(current, node);
            self.current = Some(self.tree.root_of(current));
        } else {
            return Err(CompileError::unsupported(self.tree.token(node)));
        }
        Ok(())
    }

    fn append_dot(&mut self, token: Token) -> Result<(), CompileError> {
        let current = self.require_current(&token)?;
        let kind = self.tree.kind(current);
        if kind == NodeKind::Parameter {
            return Err(CompileError::invalid_operator(&token));
        }
        let dot = self.push(token)?;

        if kind.is_operator() && !self.tree.is_immutable(current) {
            let host = self.open_operator(current);
            let right = self
                .tree
                .right(host)
                .ok_or_else(|| CompileError::invalid_operator(self.tree.token(dot)))?;
            if !matches!(
                self.tree.kind(right),
                NodeKind::MemberAccess
                    | NodeKind::Dot
                    | NodeKind::Array
                    | NodeKind::Method
                    | NodeKind::DefaultArgument
            ) {
                return Err(CompileError::unsupported(self.tree.token(dot)));
            }
            self.tree.set_right(host, dot);
            self.tree.set_left(dot, right);
            self.current = Some(dot);
        } else {
            self.tree.set_left(dot, current);
            self.current = Some(dot);
        }
        Ok(())
    }

    fn append_additive(&mut self, token: Token) -> Result<(), CompileError> {
        let negation = token.kind == TokenKind::Subtract
            && match self.current {
                None => true,
                Some(current) => {
                    (self.tree.is_operator(current) && self.tree.right(current).is_none())
                        || (self.tree.kind(current) == NodeKind::Range
                            && self.tree.right(current).is_none())
                }
            };

        let position = token.position;
        if negation {
            let node = self.push(token)?;
            if let Some(current) = self.current {
                self.tree.set_right(current, node);
            }
            let empty = self.tree.empty(position);
            self.tree.set_left(node, empty);
            self.current = Some(node);
        } else {
            let current = self.require_current(&token)?;
            let node = self.push(token)?;
            self.tree.set_left(node, current);
            self.current = Some(node);
        }
        Ok(())
    }

    fn append_multiplicative(&mut self, token: Token) -> Result<(), CompileError> {
        let current = self.require_current(&token)?;
        let node = self.push(token)?;
        let additive = matches!(self.tree.kind(current), NodeKind::Add | NodeKind::Subtract);
        if additive && !self.tree.is_negation(current) && !self.tree.is_immutable(current) {
            let operand = self
                .tree
                .set_right(current, node)
                .ok_or_else(|| CompileError::invalid_operator(self.tree.token(node)))?;
            self.tree.set_left(node, operand);
        } else {
            self.tree.set_left(node, current);
        }
        self.current = Some(node);
        Ok(())
    }

    fn open_method(&mut self, token: Token) -> Result<(), CompileError> {
        let name = self.require_current(&token)?;
        if self.tree.kind(name) != NodeKind::MethodName {
            return Err(CompileError::unsupported(self.tree.token(name)));
        }
        let node = self.push(token)?;
        self.tree.set_left(node, name);
        self.hosts.push(self.pending_host.take());
        self.branches.open(BranchKind::Method, Some(node));
        self.branches.open(BranchKind::Default, None);
        self.current = None;
        Ok(())
    }

    fn open_array(&mut self, token: Token) -> Result<(), CompileError> {
        let position = token.position;
        let node = self.push(token)?;
        match self.current {
            None => {
                let empty = self.tree.empty(position);
                self.tree.set_left(node, empty);
            }
            Some(current) if self.tree.kind(current).is_indexable() => {
                self.tree.set_left(node, current);
            }
            Some(current)
                if self.tree.is_operator(current) && !self.tree.is_immutable(current) =>
            {
                let host = self.open_operator(current);
                match self.tree.right(host) {
                    None => {
                        let empty = self.tree.empty(position);
                        self.tree.set_left(node, empty);
                    }
                    Some(right) if self.tree.kind(right).is_indexable() => {
                        self.tree.set_left(node, right);
                    }
                    Some(_) => return Err(CompileError::unsupported(self.tree.token(node))),
                }
                self.tree.set_right(host, node);
            }
            Some(_) => return Err(CompileError::unsupported(self.tree.token(node))),
        }
        self.branches.open(BranchKind::Array, Some(node));
        self.branches.open(BranchKind::Default, None);
        self.current = None;
        Ok(())
    }

    fn append_comma(&mut self, token: Token) -> Result<(), CompileError> {
        self.merge_current();
        let parameter = self.branches.root();
        if self.branches.kind() == BranchKind::Assignment {
            self.close(&token)?;
        }
        self.close(&token)?;
        let parameter = parameter.ok_or_else(|| CompileError::invalid_operator(&token))?;
        if !matches!(
            self.branches.kind(),
            BranchKind::Method | BranchKind::Object | BranchKind::Array
        ) {
            return Err(CompileError::unsupported(&token));
        }
        let owner = self
            .branches
            .root()
            .ok_or_else(|| CompileError::unsupported(&token))?;
        self.tree.add_child(owner, parameter);
        self.branches.open(BranchKind::Default, None);
        Ok(())
    }

    /// Shared tail of `)`, `]` and `}` for calls, indexers and records.
    fn close_container(&mut self, token: Token, expected: BranchKind) -> Result<(), CompileError> {
        self.merge_current();
        let parameter = self.branches.root();
        if expected == BranchKind::Object && self.branches.kind() == BranchKind::Assignment {
            self.close(&token)?;
        }
        self.close(&token)?;
        if self.branches.kind() != expected {
            return Err(CompileError::unsupported(&token));
        }
        let container = self
            .branches
            .root()
            .ok_or_else(|| CompileError::unsupported(&token))?;
        if let Some(parameter) = parameter {
            self.tree.add_child(container, parameter);
        }
        self.tree.set_immutable(container);
        self.close(&token)?;
        self.current = Some(container);
        Ok(())
    }

    fn close_between(&mut self, token: Token) -> Result<(), CompileError> {
        self.merge_current();
        let parameter = self
            .branches
            .root()
            .ok_or_else(|| CompileError::invalid_operator(&token))?;
        self.close(&token)?;
        if self.branches.kind() != BranchKind::Method {
            return Err(CompileError::unsupported(&token));
        }
        let between = self
            .branches
            .root()
            .ok_or_else(|| CompileError::unsupported(&token))?;
        self.tree.add_child(between, parameter);
        self.tree.set_immutable(between);
        let flag = self.push(token)?;
        self.tree.add_child(between, flag);
        if self.tree.children(between).len() != 5 {
            return Err(CompileError::invalid_operand(
                self.tree.token(between),
                "expected a lower and an upper bound",
            ));
        }
        let between_token = self.tree.token(between).clone();
        self.close(&between_token)?;
        self.current = Some(between);
        Ok(())
    }
}

//! Stack of partial subtrees used while parsing.
//!
//! Every bracketed region (call arguments, index arguments, record fields,
//! grouping parentheses) parses into its own branch. A branch remembers its
//! root and the node most recently merged into it, which is where the next
//! node looks for a place to dock.

use crate::node::{NodeId, NodeKind, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Default,
    Method,
    Array,
    Object,
    Assignment,
}

#[derive(Debug, Clone)]
pub struct Branch {
    pub kind: BranchKind,
    pub root: Option<NodeId>,
    attachable: Option<NodeId>,
}

impl Branch {
    fn new(kind: BranchKind, root: Option<NodeId>) -> Self {
        Branch {
            kind,
            root,
            attachable: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BranchManager {
    branches: Vec<Branch>,
}

impl Default for BranchManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchManager {
    pub fn new() -> Self {
        BranchManager {
            branches: vec![Branch::new(BranchKind::Default, None)],
        }
    }

    fn current(&self) -> &Branch {
        // The main branch is never popped.
        &self.branches[self.branches.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Branch {
        let last = self.branches.len() - 1;
        &mut self.branches[last]
    }

    pub fn kind(&self) -> BranchKind {
        self.current().kind
    }

    pub fn root(&self) -> Option<NodeId> {
        self.current().root
    }

    pub fn depth(&self) -> usize {
        self.branches.len()
    }

    pub fn is_main(&self) -> bool {
        self.branches.len() == 1
    }

    pub fn open(&mut self, kind: BranchKind, root: Option<NodeId>) {
        self.branches.push(Branch::new(kind, root));
    }

    /// Pops the current branch. The main branch cannot be closed.
    pub fn close(&mut self) -> Option<Branch> {
        if self.is_main() {
            return None;
        }
        self.branches.pop()
    }

    /// Docks `node` into the current branch by priority.
    pub fn merge(&mut self, tree: &mut Tree, node: Option<NodeId>) {
        let Some(node) = node else {
            return;
        };
        let root = tree.root_of(node);
        let Some(current_root) = self.current().root else {
            let branch = self.current_mut();
            branch.root = Some(root);
            branch.attachable = Some(node);
            return;
        };

        let docking = match self.current().attachable {
            Some(attachable) => find_attachable(tree, attachable, tree.kind(node).priority()),
            None => Some(current_root),
        };

        match docking {
            Some(dock) => {
                if tree.right(dock).is_some() {
                    if let Some(displaced) = tree.set_right(dock, root) {
                        tree.set_left(node, displaced);
                    }
                } else {
                    tree.set_right(dock, root);
                }
            }
            None => {
                tree.set_left(root, current_root);
                self.current_mut().root = Some(root);
            }
        }
        self.current_mut().attachable = Some(node);
    }
}

/// Finds the node that should adopt a node of `priority`, starting from
/// the last merged node and walking up.
fn find_attachable(tree: &Tree, node: NodeId, priority: i32) -> Option<NodeId> {
    if tree.is_binary(node) && tree.right(node).is_none() {
        return Some(node);
    }
    let mut current = tree.parent(node);
    while let Some(parent) = current {
        let kind: NodeKind = tree.kind(parent);
        if kind.is_binary()
            && (tree.right(parent).is_none()
                || (priority < kind.priority() && !tree.is_immutable(parent)))
        {
            return Some(parent);
        }
        current = tree.parent(parent);
    }
    None
}

#[cfg(test)]
fn leaf(tree: &mut Tree, kind: crate::token::TokenKind, text: &str) -> NodeId {
    let token = crate::token::Token::new(kind, text, Default::default());
    let node_kind = NodeKind::for_token(kind).unwrap();
    tree.push(node_kind, token)
}

#[test]
fn test_first_merge_sets_root() {
    use crate::token::TokenKind;
    let mut tree = Tree::new();
    let mut branches = BranchManager::new();
    let a = leaf(&mut tree, TokenKind::MemberAccess, "a");
    branches.merge(&mut tree, Some(a));
    assert_eq!(branches.root(), Some(a));
    branches.merge(&mut tree, None);
    assert_eq!(branches.root(), Some(a));
}

#[test]
fn test_looser_operator_becomes_root() {
    use crate::token::TokenKind;
    // a = 1 and b = 2
    let mut tree = Tree::new();
    let mut branches = BranchManager::new();
    let a = leaf(&mut tree, TokenKind::MemberAccess, "a");
    let eq1 = leaf(&mut tree, TokenKind::Equal, "=");
    let one = leaf(&mut tree, TokenKind::ConstantNumber, "1");
    let and = leaf(&mut tree, TokenKind::And, "and");
    let b = leaf(&mut tree, TokenKind::MemberAccess, "b");
    let eq2 = leaf(&mut tree, TokenKind::Equal, "=");
    let two = leaf(&mut tree, TokenKind::ConstantNumber, "2");
    for node in [a, eq1, one, and, b, eq2, two] {
        branches.merge(&mut tree, Some(node));
    }
    assert_eq!(branches.root(), Some(and));
    assert_eq!(tree.left(and), Some(eq1));
    assert_eq!(tree.right(and), Some(eq2));
    assert_eq!(tree.left(eq2), Some(b));
    assert_eq!(tree.right(eq2), Some(two));
}

#[test]
fn test_tighter_operator_steals_right_operand() {
    use crate::token::TokenKind;
    // x or y = 1  docks as  x or (y = 1)
    let mut tree = Tree::new();
    let mut branches = BranchManager::new();
    let x = leaf(&mut tree, TokenKind::MemberAccess, "x");
    let or = leaf(&mut tree, TokenKind::Or, "or");
    let y = leaf(&mut tree, TokenKind::MemberAccess, "y");
    let eq = leaf(&mut tree, TokenKind::Equal, "=");
    let one = leaf(&mut tree, TokenKind::ConstantNumber, "1");
    for node in [x, or, y, eq, one] {
        branches.merge(&mut tree, Some(node));
    }
    assert_eq!(branches.root(), Some(or));
    assert_eq!(tree.right(or), Some(eq));
    assert_eq!(tree.left(eq), Some(y));
}

#[test]
fn test_main_branch_cannot_close() {
    let mut branches = BranchManager::new();
    assert!(branches.close().is_none());
    branches.open(BranchKind::Method, None);
    assert_eq!(branches.kind(), BranchKind::Method);
    assert!(branches.close().is_some());
    assert!(branches.is_main());
}

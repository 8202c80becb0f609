//! Pre-order and post-order traversal over a [`DocumentTree`].
//!
//! Two entry points:
//! - [`DocumentTree::traverse`] is a plain borrowing iterator, used for harvesting.
//! - [`DocumentTree::walk`] returns a [`Walker`] that only holds node handles, so
//!   the caller can rewrite the tree between steps (expression reduction).
//!
//! Both are lazy, finite and single-use. Dropping either mid-walk releases
//! everything; there is no background producer.

use tracing::instrument;

use crate::domain::document::{DocumentTree, NodeId, TreeNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Node before its children
    PreOrder,
    /// All children before their parent
    PostOrder,
}

/// A node handle emitted by a [`Walker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    pub id: NodeId,
    pub terminal: bool,
}

/// Traversal record emitted by [`Traverse`].
#[derive(Debug, Clone, Copy)]
pub struct NodeInfo<'t> {
    pub id: NodeId,
    pub path: &'t str,
    pub node: &'t TreeNode,
    pub terminal: bool,
}

/// Cursor-style traversal that does not borrow the tree between steps.
///
/// Children are read from the tree when their parent is first reached, so a
/// post-order consumer may replace a node after all of its children were
/// emitted without disturbing the remaining walk. Handles of nodes removed
/// in the meantime are skipped.
#[derive(Debug)]
pub struct Walker {
    order: Order,
    stack: Vec<(NodeId, bool)>,
}

impl Walker {
    pub fn new(root: Option<NodeId>, order: Order) -> Self {
        Self {
            order,
            stack: root.map(|id| vec![(id, false)]).unwrap_or_default(),
        }
    }

    #[instrument(level = "trace", skip_all)]
    pub fn next(&mut self, tree: &DocumentTree) -> Option<Visit> {
        match self.order {
            Order::PreOrder => self.next_preorder(tree),
            Order::PostOrder => self.next_postorder(tree),
        }
    }

    fn next_preorder(&mut self, tree: &DocumentTree) -> Option<Visit> {
        while let Some((current, _)) = self.stack.pop() {
            if let Some(node) = tree.get(current) {
                // Push children in reverse order for left-to-right traversal
                for child in node.children().into_iter().rev() {
                    self.stack.push((child, false));
                }
                return Some(Visit {
                    id: current,
                    terminal: node.is_terminal(),
                });
            }
        }
        None
    }

    fn next_postorder(&mut self, tree: &DocumentTree) -> Option<Visit> {
        while let Some((current, expanded)) = self.stack.pop() {
            if let Some(node) = tree.get(current) {
                if !expanded {
                    self.stack.push((current, true));
                    for child in node.children().into_iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some(Visit {
                        id: current,
                        terminal: node.is_terminal(),
                    });
                }
            }
        }
        None
    }
}

/// Borrowing iterator over [`NodeInfo`] records.
pub struct Traverse<'t> {
    tree: &'t DocumentTree,
    walker: Walker,
}

impl<'t> Iterator for Traverse<'t> {
    type Item = NodeInfo<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let visit = self.walker.next(tree)?;
        let node = tree.get(visit.id)?;
        Some(NodeInfo {
            id: visit.id,
            path: &node.path,
            node,
            terminal: visit.terminal,
        })
    }
}

impl DocumentTree {
    pub fn traverse(&self, order: Order) -> Traverse<'_> {
        Traverse {
            tree: self,
            walker: self.walk(order),
        }
    }

    pub fn walk(&self, order: Order) -> Walker {
        Walker::new(self.root(), order)
    }
}

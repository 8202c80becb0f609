//! Render a [`DocumentTree`] as a `termtree` for terminal output.

use termtree::Tree;
use tracing::instrument;

use crate::domain::document::{Content, DocumentTree, NodeId};

pub trait ToTermTree {
    fn to_term_tree(&self) -> Tree<String>;
}

impl ToTermTree for DocumentTree {
    #[instrument(level = "debug", skip(self))]
    fn to_term_tree(&self) -> Tree<String> {
        match self.root() {
            Some(root) => {
                let mut tree = Tree::new(label(self, root, None));
                build_tree(self, root, &mut tree);
                tree
            }
            None => Tree::new("Empty tree".to_string()),
        }
    }
}

fn build_tree(doc: &DocumentTree, id: NodeId, parent_tree: &mut Tree<String>) {
    let Some(node) = doc.get(id) else {
        return;
    };
    let children: Vec<(Option<&str>, NodeId)> = match &node.content {
        Content::Mapping(entries) => entries.iter().map(|(k, c)| (Some(k.as_str()), *c)).collect(),
        Content::Sequence(items) => items.iter().map(|c| (None, *c)).collect(),
        Content::Scalar(_) => Vec::new(),
    };
    for (key, child) in children {
        let mut child_tree = Tree::new(label(doc, child, key));
        build_tree(doc, child, &mut child_tree);
        parent_tree.push(child_tree);
    }
}

fn label(doc: &DocumentTree, id: NodeId, key: Option<&str>) -> String {
    let Some(node) = doc.get(id) else {
        return "<stale>".to_string();
    };
    let name = match key {
        Some(key) => key.to_string(),
        None if node.path.is_empty() => ".".to_string(),
        None => "-".to_string(),
    };
    match node.as_scalar() {
        Some(scalar) => format!("{name}: {scalar}"),
        None => name,
    }
}

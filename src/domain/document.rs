//! Arena-backed document tree.
//!
//! Mirrors a decoded structured-text document: mappings keep insertion order,
//! sequences keep index order, scalars keep their literal text plus a tag.
//! Every node carries its dotted path (`.docker_compose.files[0]`), with the
//! root at the empty path.

use std::collections::HashSet;
use std::fmt;

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::error::{DocumentError, DocumentResult};

/// Handle of a node inside a [`DocumentTree`].
pub type NodeId = Index;

/// Implementation tag of a scalar, used for coercions and re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarTag {
    Str,
    Bool,
    Int,
    Float,
    Null,
}

/// Literal leaf value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    pub value: String,
    pub tag: ScalarTag,
}

impl Scalar {
    pub fn new(value: impl Into<String>, tag: ScalarTag) -> Self {
        Self {
            value: value.into(),
            tag,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(value, ScalarTag::Str)
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(value.to_string(), ScalarTag::Bool)
    }

    pub fn null() -> Self {
        Self::new("null", ScalarTag::Null)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Mapping,
    Sequence,
    Scalar,
}

/// Shape of a node being inserted. Containers always start empty and are
/// filled through [`DocumentTree::insert_child`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Mapping,
    Sequence,
    Scalar(Scalar),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Mapping(Vec<(String, NodeId)>),
    Sequence(Vec<NodeId>),
    Scalar(Scalar),
}

impl From<Shape> for Content {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Mapping => Content::Mapping(Vec::new()),
            Shape::Sequence => Content::Sequence(Vec::new()),
            Shape::Scalar(scalar) => Content::Scalar(scalar),
        }
    }
}

/// Tree node stored in the arena.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Dotted address of this node relative to the tree root
    pub path: String,
    /// Index of parent node in the arena, None for the root
    pub parent: Option<NodeId>,
    pub content: Content,
}

impl TreeNode {
    pub fn kind(&self) -> NodeKind {
        match self.content {
            Content::Mapping(_) => NodeKind::Mapping,
            Content::Sequence(_) => NodeKind::Sequence,
            Content::Scalar(_) => NodeKind::Scalar,
        }
    }

    /// Leaf scalar values are terminal, containers never are (even empty ones).
    pub fn is_terminal(&self) -> bool {
        matches!(self.content, Content::Scalar(_))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.content {
            Content::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&[(String, NodeId)]> {
        match &self.content {
            Content::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Children in document order.
    pub fn children(&self) -> Vec<NodeId> {
        match &self.content {
            Content::Mapping(entries) => entries.iter().map(|(_, id)| *id).collect(),
            Content::Sequence(items) => items.clone(),
            Content::Scalar(_) => Vec::new(),
        }
    }

    fn shape(&self) -> Shape {
        match &self.content {
            Content::Mapping(_) => Shape::Mapping,
            Content::Sequence(_) => Shape::Sequence,
            Content::Scalar(scalar) => Shape::Scalar(scalar.clone()),
        }
    }
}

/// One step of a dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    pub fn append_to(&self, parent_path: &str) -> String {
        match self {
            Segment::Key(key) => format!("{parent_path}.{key}"),
            Segment::Index(index) => format!("{parent_path}[{index}]"),
        }
    }
}

/// Split `a.b[0].c` (leading dot optional) into segments.
///
/// Returns None for malformed input such as `a..b` or `a[x]`. Keys that
/// themselves contain `.` or `[` cannot be addressed.
pub fn parse_path(path: &str) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = path;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']')?;
            let index = after[..close].parse().ok()?;
            segments.push(Segment::Index(index));
            rest = &after[close + 1..];
        } else {
            let body = rest.strip_prefix('.').unwrap_or(rest);
            let end = body.find(|c: char| c == '.' || c == '[').unwrap_or(body.len());
            if end == 0 {
                return None;
            }
            segments.push(Segment::Key(body[..end].to_string()));
            rest = &body[end..];
        }
    }
    Some(segments)
}

/// Arena-based document tree.
///
/// Uses a generational arena so that node handles held by a traversal stay
/// safe while expression nodes are rewritten and their operands dropped.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    arena: Arena<TreeNode>,
    root: Option<NodeId>,
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    /// Discard any content and start over with a single root node.
    pub fn insert_root(&mut self, shape: Shape) -> NodeId {
        self.arena.clear();
        let root = self.arena.insert(TreeNode {
            path: String::new(),
            parent: None,
            content: shape.into(),
        });
        self.root = Some(root);
        root
    }

    /// Append a child to a mapping (`key` required) or a sequence (`key` ignored).
    #[instrument(level = "trace", skip(self, shape))]
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        key: Option<&str>,
        shape: Shape,
    ) -> DocumentResult<NodeId> {
        let parent_node = self.arena.get(parent).ok_or(DocumentError::StaleNode)?;
        let path = match (&parent_node.content, key) {
            (Content::Mapping(entries), Some(key)) => {
                if entries.iter().any(|(existing, _)| existing == key) {
                    return Err(DocumentError::DuplicateKey {
                        path: parent_node.path.clone(),
                        key: key.to_string(),
                    });
                }
                Segment::Key(key.to_string()).append_to(&parent_node.path)
            }
            (Content::Mapping(_), None) => {
                return Err(DocumentError::MissingKey(parent_node.path.clone()))
            }
            (Content::Sequence(items), _) => {
                Segment::Index(items.len()).append_to(&parent_node.path)
            }
            (Content::Scalar(_), _) => {
                return Err(DocumentError::NotAContainer(parent_node.path.clone()))
            }
        };

        let id = self.arena.insert(TreeNode {
            path,
            parent: Some(parent),
            content: shape.into(),
        });
        match self.arena.get_mut(parent).map(|node| &mut node.content) {
            Some(Content::Mapping(entries)) => {
                entries.push((key.unwrap_or_default().to_string(), id))
            }
            Some(Content::Sequence(items)) => items.push(id),
            _ => {}
        }
        Ok(id)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.arena.get(id)
    }

    pub fn node(&self, id: NodeId) -> DocumentResult<&TreeNode> {
        self.arena.get(id).ok_or(DocumentError::StaleNode)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Locate a node by dotted path relative to the root.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root?;
        for segment in parse_path(path)? {
            let node = self.arena.get(current)?;
            current = match (&node.content, segment) {
                (Content::Mapping(entries), Segment::Key(key)) => entries
                    .iter()
                    .find(|(existing, _)| *existing == key)
                    .map(|(_, id)| *id)?,
                (Content::Sequence(items), Segment::Index(index)) => *items.get(index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Scalar stored at `path`, if the node exists and is terminal.
    pub fn scalar_at(&self, path: &str) -> Option<&Scalar> {
        self.find(path)
            .and_then(|id| self.arena.get(id))
            .and_then(TreeNode::as_scalar)
    }

    /// All strict descendants of `id`, parents before children.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = self
            .arena
            .get(id)
            .map(TreeNode::children)
            .unwrap_or_default();
        stack.reverse();
        while let Some(current) = stack.pop() {
            if let Some(node) = self.arena.get(current) {
                found.push(current);
                for child in node.children().into_iter().rev() {
                    stack.push(child);
                }
            }
        }
        found
    }

    /// Replace the content of `id` with a scalar, dropping its former subtree.
    #[instrument(level = "trace", skip(self))]
    pub fn replace_with_scalar(&mut self, id: NodeId, scalar: Scalar) -> DocumentResult<()> {
        let doomed = self.descendants(id);
        let node = self.arena.get_mut(id).ok_or(DocumentError::StaleNode)?;
        node.content = Content::Scalar(scalar);
        for stale in doomed {
            self.arena.remove(stale);
        }
        Ok(())
    }

    /// Move the content of `source`, a strict descendant of `target`, into
    /// `target`. Everything else below `target` is dropped and the moved
    /// subtree is re-addressed under the path of `target`.
    #[instrument(level = "trace", skip(self))]
    pub fn graft(&mut self, target: NodeId, source: NodeId) -> DocumentResult<()> {
        let below_target = self.descendants(target);
        if !below_target.contains(&source) {
            return Err(DocumentError::Unsupported {
                path: self.node(target)?.path.clone(),
                reason: "graft source is not below the target".to_string(),
            });
        }
        let kept: HashSet<NodeId> = self.descendants(source).into_iter().collect();
        let content = self.node(source)?.content.clone();

        let moved_children = self.node(source)?.children();
        for child in moved_children {
            if let Some(node) = self.arena.get_mut(child) {
                node.parent = Some(target);
            }
        }
        self.arena
            .get_mut(target)
            .ok_or(DocumentError::StaleNode)?
            .content = content;

        for stale in below_target.into_iter().filter(|id| !kept.contains(id)) {
            self.arena.remove(stale);
        }
        self.repath(target);
        Ok(())
    }

    /// Deep copy of the subtree at `id`, re-rooted at the empty path.
    pub fn subtree(&self, id: NodeId) -> DocumentResult<DocumentTree> {
        let mut copy = DocumentTree::new();
        let root = copy.insert_root(self.node(id)?.shape());
        let mut pending = vec![(id, root)];
        while let Some((source, target)) = pending.pop() {
            match &self.node(source)?.content {
                Content::Mapping(entries) => {
                    for (key, child) in entries {
                        let copied = copy.insert_child(target, Some(key), self.node(*child)?.shape())?;
                        pending.push((*child, copied));
                    }
                }
                Content::Sequence(items) => {
                    for child in items {
                        let copied = copy.insert_child(target, None, self.node(*child)?.shape())?;
                        pending.push((*child, copied));
                    }
                }
                Content::Scalar(_) => {}
            }
        }
        Ok(copy)
    }

    /// Deep copy of the subtree found at `path`, if any.
    pub fn section(&self, path: &str) -> DocumentResult<Option<DocumentTree>> {
        self.find(path).map(|id| self.subtree(id)).transpose()
    }

    fn repath(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(node) = self.arena.get(current) else {
                continue;
            };
            let base = node.path.clone();
            let updates: Vec<(NodeId, String)> = match &node.content {
                Content::Mapping(entries) => entries
                    .iter()
                    .map(|(key, child)| (*child, Segment::Key(key.clone()).append_to(&base)))
                    .collect(),
                Content::Sequence(items) => items
                    .iter()
                    .enumerate()
                    .map(|(index, child)| (*child, Segment::Index(index).append_to(&base)))
                    .collect(),
                Content::Scalar(_) => Vec::new(),
            };
            for (child, path) in updates {
                if let Some(node) = self.arena.get_mut(child) {
                    node.path = path;
                }
                pending.push(child);
            }
        }
    }
}

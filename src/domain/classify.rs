//! Node classification: recognise expression forms by shape.
//!
//! A special form is a mapping whose keys are all reserved (`$`-prefixed):
//!
//! ```yaml
//! name: { $sub: ["svc-", { $var: arguments.project_prefix }] }
//! flag: { $eq: [{ $var: arguments.env }, prod] }
//! chosen: { $if: [{ $var: let.flag }, A, B] }
//! ```
//!
//! Classification is a pure function of the node's current content.

use crate::domain::document::{Content, DocumentTree, NodeId};
use crate::domain::error::{EvalError, EvalResult};

/// Prefix shared by all reserved keys.
pub const RESERVED_PREFIX: char = '$';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Variable,
    Substitution,
    Join,
    Key,
    If,
    Equals,
}

impl FormKind {
    /// Classification priority, earliest wins.
    pub const PRIORITY: [FormKind; 6] = [
        FormKind::Variable,
        FormKind::Substitution,
        FormKind::Join,
        FormKind::Key,
        FormKind::If,
        FormKind::Equals,
    ];

    /// Bare name, used both as YAML tag (`!var`) and reserved key (`$var`).
    pub fn name(self) -> &'static str {
        match self {
            FormKind::Variable => "var",
            FormKind::Substitution => "sub",
            FormKind::Join => "join",
            FormKind::Key => "key",
            FormKind::If => "if",
            FormKind::Equals => "eq",
        }
    }

    pub fn reserved_key(self) -> String {
        format!("{RESERVED_PREFIX}{}", self.name())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::PRIORITY.into_iter().find(|kind| kind.name() == name)
    }
}

/// Handle plus path of a classified node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub id: NodeId,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableNode {
    pub node: NodeRef,
    /// Dotted path being referenced, e.g. `arguments.env`
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstitutionBody {
    /// `"svc-${arguments.project_prefix}"`
    Template(String),
    /// `["svc-", { $var: ... }]`
    Fragments(Vec<NodeId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionNode {
    pub node: NodeRef,
    pub body: SubstitutionBody,
}

/// Join and Key forms: recognised, operand kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedNode {
    pub node: NodeRef,
    pub operand: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfNode {
    pub node: NodeRef,
    pub condition: NodeId,
    pub then_branch: NodeId,
    pub else_branch: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualsNode {
    pub node: NodeRef,
    pub lhs: NodeId,
    pub rhs: NodeId,
}

/// Semantic classification of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Scalar(NodeRef),
    Mapping(NodeRef),
    Sequence(NodeRef),
    Variable(VariableNode),
    Substitution(SubstitutionNode),
    Join(ReservedNode),
    Key(ReservedNode),
    If(IfNode),
    Equals(EqualsNode),
}

impl Classified {
    pub fn node(&self) -> &NodeRef {
        match self {
            Classified::Scalar(node) | Classified::Mapping(node) | Classified::Sequence(node) => node,
            Classified::Variable(v) => &v.node,
            Classified::Substitution(s) => &s.node,
            Classified::Join(r) | Classified::Key(r) => &r.node,
            Classified::If(i) => &i.node,
            Classified::Equals(e) => &e.node,
        }
    }

    pub fn form(&self) -> Option<FormKind> {
        match self {
            Classified::Scalar(_) | Classified::Mapping(_) | Classified::Sequence(_) => None,
            Classified::Variable(_) => Some(FormKind::Variable),
            Classified::Substitution(_) => Some(FormKind::Substitution),
            Classified::Join(_) => Some(FormKind::Join),
            Classified::Key(_) => Some(FormKind::Key),
            Classified::If(_) => Some(FormKind::If),
            Classified::Equals(_) => Some(FormKind::Equals),
        }
    }
}

/// Classify the node `id`.
///
/// Fails with `UnclassifiableNode` for mappings that mix reserved and plain
/// keys, carry only unknown reserved keys, or hold a recognised form whose
/// operand has the wrong shape.
pub fn classify(tree: &DocumentTree, id: NodeId) -> EvalResult<Classified> {
    let node = tree.node(id)?;
    let node_ref = NodeRef {
        id,
        path: node.path.clone(),
    };

    let entries = match &node.content {
        Content::Scalar(_) => return Ok(Classified::Scalar(node_ref)),
        Content::Sequence(_) => return Ok(Classified::Sequence(node_ref)),
        Content::Mapping(entries) => entries,
    };

    let reserved = entries
        .iter()
        .filter(|(key, _)| key.starts_with(RESERVED_PREFIX))
        .count();
    if reserved == 0 {
        return Ok(Classified::Mapping(node_ref));
    }
    if reserved != entries.len() {
        return Err(EvalError::unclassifiable(
            &node_ref.path,
            "mapping mixes reserved and plain keys",
        ));
    }

    for kind in FormKind::PRIORITY {
        let key = kind.reserved_key();
        if let Some((_, operand)) = entries.iter().find(|(existing, _)| *existing == key) {
            return build_form(tree, kind, node_ref, *operand);
        }
    }

    let keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
    Err(EvalError::unclassifiable(
        &node_ref.path,
        format!("unknown reserved key(s): {}", keys.join(", ")),
    ))
}

fn build_form(
    tree: &DocumentTree,
    kind: FormKind,
    node: NodeRef,
    operand: NodeId,
) -> EvalResult<Classified> {
    let content = &tree.node(operand)?.content;
    let key = kind.reserved_key();

    match kind {
        FormKind::Variable => match content {
            Content::Scalar(scalar) if !scalar.value.trim().is_empty() => {
                Ok(Classified::Variable(VariableNode {
                    node,
                    reference: scalar.value.trim().to_string(),
                }))
            }
            _ => Err(EvalError::unclassifiable(
                &node.path,
                format!("{key} expects a non-empty path"),
            )),
        },
        FormKind::Substitution => match content {
            Content::Scalar(scalar) => Ok(Classified::Substitution(SubstitutionNode {
                node,
                body: SubstitutionBody::Template(scalar.value.clone()),
            })),
            Content::Sequence(items) => Ok(Classified::Substitution(SubstitutionNode {
                node,
                body: SubstitutionBody::Fragments(items.clone()),
            })),
            Content::Mapping(_) => Err(EvalError::unclassifiable(
                &node.path,
                format!("{key} expects a template string or a list of fragments"),
            )),
        },
        FormKind::Join => Ok(Classified::Join(ReservedNode { node, operand })),
        FormKind::Key => Ok(Classified::Key(ReservedNode { node, operand })),
        FormKind::If => match content {
            Content::Sequence(items) if items.len() == 3 => Ok(Classified::If(IfNode {
                node,
                condition: items[0],
                then_branch: items[1],
                else_branch: items[2],
            })),
            _ => Err(EvalError::unclassifiable(
                &node.path,
                format!("{key} expects [condition, then, else]"),
            )),
        },
        FormKind::Equals => match content {
            Content::Sequence(items) if items.len() == 2 => Ok(Classified::Equals(EqualsNode {
                node,
                lhs: items[0],
                rhs: items[1],
            })),
            _ => Err(EvalError::unclassifiable(
                &node.path,
                format!("{key} expects [lhs, rhs]"),
            )),
        },
    }
}

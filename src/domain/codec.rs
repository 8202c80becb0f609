//! Conversion between `serde_yaml` / `serde_json` values and [`DocumentTree`].
//!
//! YAML tags naming an expression form (`!var`, `!sub`, `!join`, `!key`, `!if`,
//! `!eq`) are rewritten into the reserved-key form on the way in, so
//! `!var arguments.env` and `{ $var: arguments.env }` decode identically.

use serde_yaml::Value as Yaml;

use crate::domain::classify::FormKind;
use crate::domain::document::{Content, DocumentTree, NodeId, Scalar, ScalarTag, Shape};
use crate::domain::error::{DocumentError, DocumentResult};

pub fn from_yaml_str(content: &str) -> DocumentResult<DocumentTree> {
    let value: Yaml =
        serde_yaml::from_str(content).map_err(|e| DocumentError::Parse(e.to_string()))?;
    from_yaml(&value)
}

pub fn from_yaml(value: &Yaml) -> DocumentResult<DocumentTree> {
    let mut tree = DocumentTree::new();
    let (shape, children) = decompose(value, "")?;
    let root = tree.insert_root(shape);
    let mut pending = vec![(root, children)];
    while let Some((parent, children)) = pending.pop() {
        for (key, child) in children {
            let parent_path = tree.node(parent)?.path.clone();
            let (shape, grandchildren) = decompose(child, &parent_path)?;
            let id = tree.insert_child(parent, key.as_deref(), shape)?;
            if !grandchildren.is_empty() {
                pending.push((id, grandchildren));
            }
        }
    }
    Ok(tree)
}

type Children<'v> = Vec<(Option<String>, &'v Yaml)>;

/// Split a YAML value into its own shape and its ordered children.
fn decompose<'v>(value: &'v Yaml, path: &str) -> DocumentResult<(Shape, Children<'v>)> {
    let decomposed = match value {
        Yaml::Null => (Shape::Scalar(Scalar::null()), Vec::new()),
        Yaml::Bool(b) => (Shape::Scalar(Scalar::boolean(*b)), Vec::new()),
        Yaml::Number(n) => {
            let tag = if n.is_f64() {
                ScalarTag::Float
            } else {
                ScalarTag::Int
            };
            (Shape::Scalar(Scalar::new(n.to_string(), tag)), Vec::new())
        }
        Yaml::String(s) => (Shape::Scalar(Scalar::string(s.as_str())), Vec::new()),
        Yaml::Sequence(items) => (Shape::Sequence, items.iter().map(|item| (None, item)).collect()),
        Yaml::Mapping(mapping) => {
            let mut children = Vec::with_capacity(mapping.len());
            for (key, child) in mapping {
                children.push((Some(mapping_key(key, path)?), child));
            }
            (Shape::Mapping, children)
        }
        Yaml::Tagged(tagged) => {
            let name = tagged.tag.to_string();
            let name = name.trim_start_matches('!');
            let kind = FormKind::from_name(name).ok_or_else(|| DocumentError::Unsupported {
                path: path.to_string(),
                reason: format!("unknown tag !{name}"),
            })?;
            (Shape::Mapping, vec![(Some(kind.reserved_key()), &tagged.value)])
        }
    };
    Ok(decomposed)
}

fn mapping_key(key: &Yaml, path: &str) -> DocumentResult<String> {
    match key {
        Yaml::String(s) => Ok(s.clone()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        _ => Err(DocumentError::Unsupported {
            path: path.to_string(),
            reason: "mapping keys must be scalars".to_string(),
        }),
    }
}

pub fn to_yaml(tree: &DocumentTree) -> Yaml {
    tree.root()
        .map(|root| node_to_yaml(tree, root))
        .unwrap_or(Yaml::Null)
}

fn node_to_yaml(tree: &DocumentTree, id: NodeId) -> Yaml {
    let Some(node) = tree.get(id) else {
        return Yaml::Null;
    };
    match &node.content {
        Content::Mapping(entries) => Yaml::Mapping(
            entries
                .iter()
                .map(|(key, child)| (Yaml::String(key.clone()), node_to_yaml(tree, *child)))
                .collect(),
        ),
        Content::Sequence(items) => {
            Yaml::Sequence(items.iter().map(|child| node_to_yaml(tree, *child)).collect())
        }
        Content::Scalar(scalar) => scalar_to_yaml(scalar),
    }
}

fn scalar_to_yaml(scalar: &Scalar) -> Yaml {
    match scalar.tag {
        ScalarTag::Null => Yaml::Null,
        ScalarTag::Bool => Yaml::Bool(scalar.value == "true"),
        ScalarTag::Int | ScalarTag::Float => serde_yaml::from_str::<serde_yaml::Number>(&scalar.value)
            .map(Yaml::Number)
            .unwrap_or_else(|_| Yaml::String(scalar.value.clone())),
        ScalarTag::Str => Yaml::String(scalar.value.clone()),
    }
}

pub fn to_json(tree: &DocumentTree) -> serde_json::Value {
    tree.root()
        .map(|root| node_to_json(tree, root))
        .unwrap_or(serde_json::Value::Null)
}

fn node_to_json(tree: &DocumentTree, id: NodeId) -> serde_json::Value {
    use serde_json::Value as Json;

    let Some(node) = tree.get(id) else {
        return Json::Null;
    };
    match &node.content {
        Content::Mapping(entries) => Json::Object(
            entries
                .iter()
                .map(|(key, child)| (key.clone(), node_to_json(tree, *child)))
                .collect(),
        ),
        Content::Sequence(items) => {
            Json::Array(items.iter().map(|child| node_to_json(tree, *child)).collect())
        }
        Content::Scalar(scalar) => match scalar.tag {
            ScalarTag::Null => Json::Null,
            ScalarTag::Bool => Json::Bool(scalar.value == "true"),
            ScalarTag::Int | ScalarTag::Float => serde_json::from_str::<serde_json::Number>(&scalar.value)
                .map(Json::Number)
                .unwrap_or_else(|_| Json::String(scalar.value.clone())),
            ScalarTag::Str => Json::String(scalar.value.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::NodeKind;

    #[test]
    fn given_yaml_when_decoding_then_key_order_and_tags_preserved() {
        let tree = from_yaml_str("zeta: 1\nalpha: true\nmid: ~\nlist: [x, 2.5]\n").unwrap();
        let root = tree.node(tree.root().unwrap()).unwrap();
        let keys: Vec<_> = root.entries().unwrap().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid", "list"]);

        assert_eq!(tree.scalar_at("zeta").unwrap(), &Scalar::new("1", ScalarTag::Int));
        assert_eq!(tree.scalar_at("alpha").unwrap(), &Scalar::boolean(true));
        assert_eq!(tree.scalar_at("mid").unwrap(), &Scalar::null());
        assert_eq!(tree.scalar_at("list[1]").unwrap().tag, ScalarTag::Float);
    }

    #[test]
    fn given_form_tag_when_decoding_then_reserved_key_mapping() {
        let tagged = from_yaml_str("name: !sub [a, !var arguments.x]").unwrap();
        let keyed = from_yaml_str("name: { $sub: [a, { $var: arguments.x }] }").unwrap();
        assert_eq!(to_yaml(&tagged), to_yaml(&keyed));
        let id = tagged.find("name.$sub[1].$var").unwrap();
        assert_eq!(tagged.node(id).unwrap().kind(), NodeKind::Scalar);
    }

    #[test]
    fn given_unknown_tag_when_decoding_then_unsupported() {
        let result = from_yaml_str("name: !frobnicate x");
        assert!(matches!(result, Err(DocumentError::Unsupported { .. })));
    }

    #[test]
    fn given_invalid_yaml_when_decoding_then_parse_error() {
        assert!(matches!(from_yaml_str("a: [1, 2"), Err(DocumentError::Parse(_))));
    }

    #[test]
    fn given_tree_when_encoding_json_then_types_restored() {
        let tree = from_yaml_str("name: app\nport: 8080\nflag: false\nnone: null\n").unwrap();
        assert_eq!(
            to_json(&tree),
            serde_json::json!({ "name": "app", "port": 8080, "flag": false, "none": null })
        );
    }
}

//! Evaluator transforms, one per expression form.
//!
//! Each transform is pure: it reads the (already reduced) operands from the
//! tree and looks names up through a [`Scope`], then returns a [`Reduction`]
//! describing what the expression node should become. Applying it is left to
//! the caller.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace, warn};

use crate::domain::bindings::BindingMap;
use crate::domain::classify::{
    classify, Classified, EqualsNode, IfNode, SubstitutionBody, SubstitutionNode, VariableNode,
};
use crate::domain::document::{DocumentTree, NodeId, Scalar, ScalarTag};
use crate::domain::error::{DocumentError, EvalError, EvalResult};

/// Replacement for an evaluated expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    /// Node becomes this scalar
    Scalar(Scalar),
    /// Node takes over the content of this descendant (selected If branch)
    Graft(NodeId),
}

impl Reduction {
    /// Apply to `id` in place.
    pub fn apply(self, tree: &mut DocumentTree, id: NodeId) -> Result<(), DocumentError> {
        match self {
            Reduction::Scalar(scalar) => tree.replace_with_scalar(id, scalar),
            Reduction::Graft(source) => tree.graft(id, source),
        }
    }
}

/// Convention used to read an If condition as a boolean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Truthiness {
    /// Only booleans and the strings `true` / `false`
    Strict,
    /// `true` and any other non-empty string is true, except `false`;
    /// empty and null are false
    #[default]
    Lenient,
}

impl Truthiness {
    /// Coerce a scalar, None when the scalar is not coercible.
    pub fn coerce(self, scalar: &Scalar) -> Option<bool> {
        match self {
            Truthiness::Strict => match scalar.value.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            Truthiness::Lenient => match scalar.tag {
                ScalarTag::Null => Some(false),
                _ => Some(!scalar.value.is_empty() && scalar.value != "false"),
            },
        }
    }
}

impl fmt::Display for Truthiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Truthiness::Strict => write!(f, "strict"),
            Truthiness::Lenient => write!(f, "lenient"),
        }
    }
}

impl FromStr for Truthiness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Truthiness::Strict),
            "lenient" => Ok(Truthiness::Lenient),
            other => Err(format!("unknown truthiness '{other}' (expected strict or lenient)")),
        }
    }
}

/// Read-only lookup context for variable references.
///
/// References under the local prefix (e.g. `let.*`) are answered from the
/// tree being reduced, and only once the referenced node is already a
/// scalar. Everything else comes from the binding map.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    bindings: &'a BindingMap,
    local: Option<(&'a str, &'a DocumentTree)>,
}

impl<'a> Scope<'a> {
    pub fn global(bindings: &'a BindingMap) -> Self {
        Self {
            bindings,
            local: None,
        }
    }

    pub fn with_local(bindings: &'a BindingMap, prefix: &'a str, tree: &'a DocumentTree) -> Self {
        Self {
            bindings,
            local: Some((prefix, tree)),
        }
    }

    pub fn lookup(&self, reference: &str) -> Option<&'a Scalar> {
        if let Some((prefix, tree)) = self.local {
            if let Some(rest) = reference.strip_prefix(prefix) {
                if rest.is_empty() || rest.starts_with('.') || rest.starts_with('[') {
                    return tree.scalar_at(rest);
                }
            }
        }
        self.bindings.get_scalar(reference)
    }
}

/// Classify `id` and run the matching transform.
///
/// Returns None for plain nodes and for Join/Key, which have no evaluator and
/// are left untouched.
#[instrument(level = "trace", skip(tree, scope))]
pub fn evaluate(
    tree: &DocumentTree,
    id: NodeId,
    scope: &Scope<'_>,
    truthiness: Truthiness,
) -> EvalResult<Option<Reduction>> {
    match classify(tree, id)? {
        Classified::Scalar(_) | Classified::Mapping(_) | Classified::Sequence(_) => Ok(None),
        Classified::Variable(node) => evaluate_variable(&node, scope).map(Some),
        Classified::Substitution(node) => evaluate_substitution(tree, &node, scope).map(Some),
        Classified::Equals(node) => evaluate_equals(tree, &node).map(Some),
        Classified::If(node) => evaluate_if(tree, &node, truthiness).map(Some),
        Classified::Join(reserved) | Classified::Key(reserved) => {
            warn!(
                "no evaluator for reserved form at '{}', left as is",
                reserved.node.path
            );
            Ok(None)
        }
    }
}

/// The result keeps the tag of the referenced scalar, so `8080` stays a number.
pub fn evaluate_variable(node: &VariableNode, scope: &Scope<'_>) -> EvalResult<Reduction> {
    let scalar = scope
        .lookup(&node.reference)
        .ok_or_else(|| EvalError::unbound(&node.node.path, &node.reference))?;
    trace!("{} -> {:?}", node.reference, scalar.value);
    Ok(Reduction::Scalar(scalar.clone()))
}

pub fn evaluate_substitution(
    tree: &DocumentTree,
    node: &SubstitutionNode,
    scope: &Scope<'_>,
) -> EvalResult<Reduction> {
    let text = match &node.body {
        SubstitutionBody::Template(template) => interpolate(&node.node.path, template, scope)?,
        SubstitutionBody::Fragments(fragments) => {
            let mut text = String::new();
            for fragment in fragments {
                let scalar = scalar_operand(
                    tree,
                    *fragment,
                    &node.node.path,
                    "substitution fragments must reduce to scalars",
                )?;
                text.push_str(&scalar.value);
            }
            text
        }
    };
    Ok(Reduction::Scalar(Scalar::string(text)))
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{([^{}]*)\}").expect("valid placeholder regex"))
}

/// Expand `${path}` placeholders in `template`.
fn interpolate(path: &str, template: &str, scope: &Scope<'_>) -> EvalResult<String> {
    let malformed = || EvalError::MalformedTemplate {
        path: path.to_string(),
        template: template.to_string(),
    };

    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for captures in placeholder().captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let literal = &template[last..whole.start()];
        if literal.contains("${") {
            return Err(malformed());
        }
        let reference = name.as_str().trim();
        if reference.is_empty() {
            return Err(malformed());
        }
        let value = scope
            .lookup(reference)
            .ok_or_else(|| EvalError::unbound(path, reference))?;
        out.push_str(literal);
        out.push_str(&value.value);
        last = whole.end();
    }

    let tail = &template[last..];
    if tail.contains("${") {
        return Err(malformed());
    }
    out.push_str(tail);
    Ok(out)
}

pub fn evaluate_equals(tree: &DocumentTree, node: &EqualsNode) -> EvalResult<Reduction> {
    let reason = "equality operands must be scalars";
    let lhs = scalar_operand(tree, node.lhs, &node.node.path, reason)?;
    let rhs = scalar_operand(tree, node.rhs, &node.node.path, reason)?;
    let equal = lhs.value == rhs.value;
    Ok(Reduction::Scalar(Scalar::boolean(equal)))
}

pub fn evaluate_if(
    tree: &DocumentTree,
    node: &IfNode,
    truthiness: Truthiness,
) -> EvalResult<Reduction> {
    let condition = scalar_operand(
        tree,
        node.condition,
        &node.node.path,
        "condition must reduce to a scalar",
    )?;
    let chosen = truthiness.coerce(condition).ok_or_else(|| {
        EvalError::type_mismatch(
            &node.node.path,
            format!(
                "condition '{}' is not a boolean under {} truthiness",
                condition.value, truthiness
            ),
        )
    })?;
    Ok(Reduction::Graft(if chosen {
        node.then_branch
    } else {
        node.else_branch
    }))
}

fn scalar_operand<'t>(
    tree: &'t DocumentTree,
    id: NodeId,
    path: &str,
    reason: &str,
) -> EvalResult<&'t Scalar> {
    tree.node(id)?
        .as_scalar()
        .ok_or_else(|| EvalError::type_mismatch(path, reason))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::codec::from_yaml_str;

    fn bindings() -> BindingMap {
        let mut bindings = BindingMap::new();
        bindings.insert("arguments.prefix", "foo").unwrap();
        bindings.insert("arguments.env", "prod").unwrap();
        bindings
    }

    fn eval_root(yaml: &str, truthiness: Truthiness) -> EvalResult<Option<Reduction>> {
        let tree = from_yaml_str(yaml).unwrap();
        let bindings = bindings();
        evaluate(&tree, tree.root().unwrap(), &Scope::global(&bindings), truthiness)
    }

    fn scalar(value: &str) -> Option<Reduction> {
        Some(Reduction::Scalar(Scalar::string(value)))
    }

    #[test]
    fn given_bound_variable_when_evaluating_then_value() {
        assert_eq!(
            eval_root("{ $var: arguments.prefix }", Truthiness::Strict).unwrap(),
            scalar("foo")
        );
    }

    #[test]
    fn given_unbound_variable_when_evaluating_then_unbound_error() {
        assert_eq!(
            eval_root("{ $var: arguments.missing }", Truthiness::Strict),
            Err(EvalError::UnboundVariable {
                path: String::new(),
                reference: "arguments.missing".to_string()
            })
        );
    }

    #[test]
    fn given_template_when_substituting_then_placeholders_expanded() {
        assert_eq!(
            eval_root("{ $sub: 'svc-${arguments.prefix}-${ arguments.env }' }", Truthiness::Strict)
                .unwrap(),
            scalar("svc-foo-prod")
        );
    }

    #[test]
    fn given_fragments_when_substituting_then_concatenated() {
        assert_eq!(
            eval_root("{ $sub: [a-, 1, -b] }", Truthiness::Strict).unwrap(),
            scalar("a-1-b")
        );
    }

    #[rstest]
    #[case("{ $sub: 'svc-${arguments.prefix' }")]
    #[case("{ $sub: 'svc-${}' }")]
    #[case("{ $sub: '${ ${arguments.prefix}' }")]
    fn given_malformed_template_when_substituting_then_malformed_error(#[case] yaml: &str) {
        assert!(matches!(
            eval_root(yaml, Truthiness::Strict),
            Err(EvalError::MalformedTemplate { .. })
        ));
    }

    #[test]
    fn given_nested_fragment_when_substituting_then_type_mismatch() {
        assert!(matches!(
            eval_root("{ $sub: [a, [b]] }", Truthiness::Strict),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[rstest]
    #[case("{ $eq: [a, a] }", "true")]
    #[case("{ $eq: [a, b] }", "false")]
    #[case("{ $eq: [b, a] }", "false")]
    #[case("{ $eq: [1, '1'] }", "true")]
    #[case("{ $eq: ['', ''] }", "true")]
    fn given_scalars_when_comparing_then_boolean(#[case] yaml: &str, #[case] expected: &str) {
        assert_eq!(
            eval_root(yaml, Truthiness::Strict).unwrap(),
            Some(Reduction::Scalar(Scalar::new(expected, ScalarTag::Bool)))
        );
    }

    #[rstest]
    #[case("1", "'1'")]
    #[case("true", "'true'")]
    #[case("~", "null")]
    #[case("1.0", "1")]
    #[case("a", "b")]
    #[case("''", "~")]
    fn given_mixed_operands_when_comparing_both_ways_then_same_result(
        #[case] lhs: &str,
        #[case] rhs: &str,
    ) {
        let forward = eval_root(&format!("{{ $eq: [{lhs}, {rhs}] }}"), Truthiness::default());
        let backward = eval_root(&format!("{{ $eq: [{rhs}, {lhs}] }}"), Truthiness::default());
        assert!(forward.is_ok());
        assert_eq!(forward, backward);
    }

    #[test]
    fn given_container_operand_when_comparing_then_type_mismatch() {
        assert!(matches!(
            eval_root("{ $eq: [a, { b: c }] }", Truthiness::Strict),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[rstest]
    #[case(Truthiness::Strict, "true", Some(true))]
    #[case(Truthiness::Strict, "false", Some(false))]
    #[case(Truthiness::Strict, "yes", None)]
    #[case(Truthiness::Strict, "", None)]
    #[case(Truthiness::Lenient, "yes", Some(true))]
    #[case(Truthiness::Lenient, "false", Some(false))]
    #[case(Truthiness::Lenient, "", Some(false))]
    fn given_scalar_when_coercing_then_convention_applies(
        #[case] truthiness: Truthiness,
        #[case] value: &str,
        #[case] expected: Option<bool>,
    ) {
        assert_eq!(truthiness.coerce(&Scalar::string(value)), expected);
    }

    #[test]
    fn given_default_truthiness_when_coercing_then_non_empty_is_true() {
        let truthiness = Truthiness::default();
        assert_eq!(truthiness, Truthiness::Lenient);
        assert_eq!(truthiness.coerce(&Scalar::string("yes_please")), Some(true));
        assert_eq!(truthiness.coerce(&Scalar::string("")), Some(false));
    }

    #[test]
    fn given_null_when_coercing_leniently_then_false() {
        assert_eq!(Truthiness::Lenient.coerce(&Scalar::null()), Some(false));
        assert_eq!(Truthiness::Strict.coerce(&Scalar::null()), None);
    }

    #[test]
    fn given_true_condition_when_evaluating_if_then_grafts_then_branch() {
        let tree = from_yaml_str("{ $if: [true, A, B] }").unwrap();
        let bindings = BindingMap::new();
        let then_branch = tree.find("$if[1]").unwrap();
        assert_eq!(
            evaluate(&tree, tree.root().unwrap(), &Scope::global(&bindings), Truthiness::Strict)
                .unwrap(),
            Some(Reduction::Graft(then_branch))
        );
    }

    #[test]
    fn given_uncoercible_condition_when_evaluating_if_then_type_mismatch() {
        assert!(matches!(
            eval_root("{ $if: [maybe, A, B] }", Truthiness::Strict),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert!(matches!(
            eval_root("{ $if: [[x], A, B] }", Truthiness::Lenient),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn given_join_when_evaluating_then_left_untouched() {
        assert_eq!(eval_root("{ $join: [a, b] }", Truthiness::Strict).unwrap(), None);
    }

    #[test]
    fn given_local_scope_when_looking_up_then_only_reduced_scalars_resolve() {
        let tree = from_yaml_str("{ flag: 'true', later: { $eq: [a, a] } }").unwrap();
        let bindings = bindings();
        let scope = Scope::with_local(&bindings, "let", &tree);
        let value = |reference: &str| scope.lookup(reference).map(|s| s.value.as_str());
        assert_eq!(value("let.flag"), Some("true"));
        assert_eq!(value("let.later"), None);
        assert_eq!(value("letter"), None);
        assert_eq!(value("arguments.env"), Some("prod"));
    }
}

//! Variable binding and evaluation pipeline.
//!
//! Three phases, run strictly one after the other:
//! 1. harvest every terminal of the `arguments` tree (pre-order)
//! 2. reduce the `let` tree in place (post-order), so operands are always
//!    plain values by the time their enclosing expression is visited
//! 3. harvest every terminal of the reduced `let` tree (pre-order)

use tracing::{debug, instrument};

use crate::domain::bindings::BindingMap;
use crate::domain::document::{DocumentTree, ScalarTag, TreeNode};
use crate::domain::error::{EvalError, EvalResult};
use crate::domain::transforms::{evaluate, Scope, Truthiness};
use crate::domain::traverse::Order;

pub const ARGUMENTS_KEY: &str = "arguments";
pub const LET_KEY: &str = "let";

#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    truthiness: Truthiness,
}

impl Resolver {
    pub fn new(truthiness: Truthiness) -> Self {
        Self { truthiness }
    }

    /// Produce the binding map for a seed.
    ///
    /// The `let` tree is rewritten in place: on success every expression in
    /// it has been replaced by its value. On failure nothing is returned and
    /// the tree may be partially reduced.
    #[instrument(level = "debug", skip_all)]
    pub fn resolve(
        &self,
        arguments: Option<&DocumentTree>,
        let_tree: Option<&mut DocumentTree>,
    ) -> EvalResult<BindingMap> {
        let arguments =
            arguments.ok_or_else(|| EvalError::MissingSection(ARGUMENTS_KEY.to_string()))?;
        let let_tree = let_tree.ok_or_else(|| EvalError::MissingSection(LET_KEY.to_string()))?;

        let mut bindings = BindingMap::new();
        harvest(ARGUMENTS_KEY, arguments, &mut bindings)?;
        debug!("harvested {} argument(s)", bindings.len());

        let reduced = reduce(let_tree, &bindings, Some(LET_KEY), self.truthiness)
            .map_err(|e| e.within(LET_KEY))?;
        debug!("reduced {} expression(s) in {}", reduced, LET_KEY);

        harvest(LET_KEY, let_tree, &mut bindings)?;
        debug!("resolved {} binding(s)", bindings.len());
        Ok(bindings)
    }
}

/// Record `prefix + path -> value` for every terminal of `tree`.
///
/// A null section (`arguments: ~`) binds nothing; any other scalar at the
/// section root is a `TypeMismatch`.
#[instrument(level = "trace", skip(tree, bindings))]
pub fn harvest(prefix: &str, tree: &DocumentTree, bindings: &mut BindingMap) -> EvalResult<()> {
    let root = tree.root().and_then(|root| tree.get(root));
    if let Some(scalar) = root.and_then(TreeNode::as_scalar) {
        if scalar.tag == ScalarTag::Null {
            debug!("{} is null, nothing to bind", prefix);
            return Ok(());
        }
        return Err(EvalError::type_mismatch(
            prefix,
            format!("section must be a mapping or sequence, found '{}'", scalar.value),
        ));
    }
    for info in tree.traverse(Order::PreOrder).filter(|info| info.terminal) {
        if let Some(scalar) = info.node.as_scalar() {
            bindings.insert_scalar(format!("{prefix}{}", info.path), scalar.clone())?;
        }
    }
    Ok(())
}

/// Reduce every expression in `tree` bottom-up and return how many were
/// rewritten. With `local_prefix`, references under that prefix resolve
/// against the tree itself.
pub(crate) fn reduce(
    tree: &mut DocumentTree,
    bindings: &BindingMap,
    local_prefix: Option<&str>,
    truthiness: Truthiness,
) -> EvalResult<usize> {
    let mut walker = tree.walk(Order::PostOrder);
    let mut reduced = 0;
    while let Some(visit) = walker.next(tree) {
        if visit.terminal {
            continue;
        }
        let reduction = {
            let scope = match local_prefix {
                Some(prefix) => Scope::with_local(bindings, prefix, tree),
                None => Scope::global(bindings),
            };
            evaluate(tree, visit.id, &scope, truthiness)?
        };
        if let Some(reduction) = reduction {
            reduction.apply(tree, visit.id)?;
            reduced += 1;
        }
    }
    Ok(reduced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::codec::from_yaml_str;
    use crate::domain::document::Scalar;

    fn resolve(arguments: &str, let_yaml: &str) -> EvalResult<BindingMap> {
        let arguments = from_yaml_str(arguments).unwrap();
        let mut let_tree = from_yaml_str(let_yaml).unwrap();
        Resolver::default().resolve(Some(&arguments), Some(&mut let_tree))
    }

    #[test]
    fn given_literal_arguments_when_harvesting_then_one_binding_per_leaf() {
        let tree = from_yaml_str("docker_compose: { project_prefix: foo, files: [a, b] }").unwrap();
        let mut bindings = BindingMap::new();
        harvest(ARGUMENTS_KEY, &tree, &mut bindings).unwrap();

        let pairs: Vec<_> = bindings.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("arguments.docker_compose.files[0]", "a"),
                ("arguments.docker_compose.files[1]", "b"),
                ("arguments.docker_compose.project_prefix", "foo"),
            ]
        );
    }

    #[test]
    fn given_substitution_when_resolving_then_let_value_interpolated() {
        let bindings = resolve(
            "project_prefix: foo",
            "name: { $sub: [svc-, { $var: arguments.project_prefix }] }",
        )
        .unwrap();
        assert_eq!(bindings.get("let.name"), Some("svc-foo"));
        assert_eq!(bindings.get("arguments.project_prefix"), Some("foo"));
    }

    #[test]
    fn given_flag_then_conditional_when_resolving_then_later_sees_earlier() {
        let bindings = resolve(
            "env: prod",
            "flag: { $eq: [{ $var: arguments.env }, prod] }\nchosen: { $if: [{ $var: let.flag }, A, B] }",
        )
        .unwrap();
        assert_eq!(bindings.get("let.flag"), Some("true"));
        assert_eq!(bindings.get("let.chosen"), Some("A"));
    }

    #[test]
    fn given_selected_branch_is_container_when_resolving_then_its_leaves_are_bound() {
        let bindings = resolve(
            "env: dev",
            "ports: { $if: [{ $eq: [{ $var: arguments.env }, prod] }, [80], [8080, 9229]] }",
        )
        .unwrap();
        assert_eq!(bindings.get("let.ports[0]"), Some("8080"));
        assert_eq!(bindings.get("let.ports[1]"), Some("9229"));
        assert!(!bindings.contains("let.ports"));
    }

    #[test]
    fn given_unbound_reference_when_resolving_then_no_bindings() {
        let result = resolve("env: prod", "ok: plain\nnested: { deep: [{ $var: arguments.nope }] }");
        assert_eq!(
            result,
            Err(EvalError::UnboundVariable {
                path: "let.nested.deep[0]".to_string(),
                reference: "arguments.nope".to_string()
            })
        );
    }

    #[test]
    fn given_forward_let_reference_when_resolving_then_unbound() {
        let result = resolve(
            "env: prod",
            "first: { $var: let.second }\nsecond: { $var: arguments.env }",
        );
        assert!(matches!(result, Err(EvalError::UnboundVariable { .. })));
    }

    #[test]
    fn given_forward_reference_to_literal_when_resolving_then_visible() {
        let bindings = resolve("{}", "first: { $var: let.second }\nsecond: x").unwrap();
        assert_eq!(bindings.get("let.first"), Some("x"));
    }

    #[test]
    fn given_mixed_mapping_when_resolving_then_unclassifiable() {
        let result = resolve("{}", "bad: { $var: arguments.x, extra: 1 }");
        assert!(matches!(
            result,
            Err(EvalError::UnclassifiableNode { ref path, .. }) if path == "let.bad"
        ));
    }

    #[test]
    fn given_missing_section_when_resolving_then_missing_section() {
        let arguments = from_yaml_str("a: 1").unwrap();
        assert_eq!(
            Resolver::default().resolve(Some(&arguments), None),
            Err(EvalError::MissingSection("let".to_string()))
        );
        let mut let_tree = from_yaml_str("a: 1").unwrap();
        assert_eq!(
            Resolver::default().resolve(None, Some(&mut let_tree)),
            Err(EvalError::MissingSection("arguments".to_string()))
        );
    }

    #[test]
    fn given_null_arguments_section_when_resolving_then_nothing_bound_for_it() {
        let bindings = resolve("~", "n: 1").unwrap();
        assert_eq!(bindings.iter().collect::<Vec<_>>(), vec![("let.n", "1")]);
    }

    #[test]
    fn given_scalar_section_when_harvesting_then_type_mismatch() {
        let tree = from_yaml_str("just-text").unwrap();
        let mut bindings = BindingMap::new();
        assert!(matches!(
            harvest(ARGUMENTS_KEY, &tree, &mut bindings),
            Err(EvalError::TypeMismatch { ref path, .. }) if path == "arguments"
        ));
        assert!(bindings.is_empty());
    }

    #[test]
    fn given_numeric_argument_when_referenced_from_let_then_tag_kept() {
        let arguments = from_yaml_str("port: 8080").unwrap();
        let mut let_tree = from_yaml_str("port: { $var: arguments.port }
same: { $var: let.port }").unwrap();
        let bindings = Resolver::default()
            .resolve(Some(&arguments), Some(&mut let_tree))
            .unwrap();
        for path in ["let.port", "let.same"] {
            assert_eq!(
                bindings.get_scalar(path),
                Some(&Scalar::new("8080", ScalarTag::Int))
            );
        }
    }

    #[test]
    fn given_same_seed_when_resolving_twice_then_identical_bindings() {
        let arguments = "env: prod\nprefix: foo";
        let let_yaml = "name: { $sub: '${arguments.prefix}-${arguments.env}' }";
        assert_eq!(resolve(arguments, let_yaml), resolve(arguments, let_yaml));
    }
}

//! Configs expansion: evaluate a template tree against finished bindings.

use tracing::{debug, instrument};

use crate::domain::bindings::BindingMap;
use crate::domain::document::DocumentTree;
use crate::domain::error::EvalResult;
use crate::domain::pipeline::reduce;
use crate::domain::transforms::Truthiness;

/// Reduce every expression in `tree` using only `bindings` for lookups.
///
/// `section` names the tree in error paths, e.g. `configs.docker_compose`.
#[instrument(level = "debug", skip(tree, bindings))]
pub fn expand(
    section: &str,
    tree: &mut DocumentTree,
    bindings: &BindingMap,
    truthiness: Truthiness,
) -> EvalResult<()> {
    let reduced = reduce(tree, bindings, None, truthiness).map_err(|e| e.within(section))?;
    debug!("expanded {} expression(s) in {}", reduced, section);
    Ok(())
}

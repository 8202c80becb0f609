//! Domain layer: document model and template evaluation
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod bindings;
pub mod classify;
pub mod codec;
pub mod display;
pub mod document;
pub mod error;
pub mod expand;
pub mod pipeline;
pub mod transforms;
pub mod traverse;

pub use bindings::BindingMap;
pub use classify::{classify, Classified, FormKind};
pub use display::ToTermTree;
pub use document::{DocumentTree, NodeId, NodeKind, Scalar, ScalarTag, TreeNode};
pub use error::{DocumentError, EvalError};
pub use expand::expand;
pub use pipeline::{harvest, Resolver, ARGUMENTS_KEY, LET_KEY};
pub use transforms::{Reduction, Scope, Truthiness};
pub use traverse::{NodeInfo, Order, Walker};

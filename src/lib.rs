//! devseed: generate devcontainer configuration from a seed template.
//!
//! A seed holds literal `arguments`, a `let` block of derived values written
//! with `$var` / `$sub` / `$eq` / `$if` forms, and `configs` templates that
//! are expanded with the resolved values.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

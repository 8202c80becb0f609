//! Flat mapping from dotted path to resolved scalar value.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::domain::document::Scalar;
use crate::domain::error::{EvalError, EvalResult};

/// Resolved variables, e.g. `arguments.docker_compose.project_prefix -> foo`.
///
/// Keys are write-once: a second insert of an existing path fails. Values
/// keep the tag of the scalar they were harvested from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingMap {
    values: BTreeMap<String, Scalar>,
}

impl BindingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `path` to a plain string value.
    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<String>) -> EvalResult<()> {
        self.insert_scalar(path, Scalar::string(value))
    }

    pub fn insert_scalar(&mut self, path: impl Into<String>, scalar: Scalar) -> EvalResult<()> {
        match self.values.entry(path.into()) {
            btree_map::Entry::Occupied(entry) => Err(EvalError::DuplicateBinding(entry.key().clone())),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(scalar);
                Ok(())
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.get_scalar(path).map(|scalar| scalar.value.as_str())
    }

    pub fn get_scalar(&self, path: &str) -> Option<&Scalar> {
        self.values.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.values.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.value.as_str()))
    }
}

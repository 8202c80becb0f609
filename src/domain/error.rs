//! Domain-level errors

use thiserror::Error;

/// Errors raised while building or reshaping a document tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("duplicate key '{key}' in mapping at '{path}'")]
    DuplicateKey { path: String, key: String },

    #[error("node at '{0}' is not a container")]
    NotAContainer(String),

    #[error("mapping entry at '{0}' requires a key")]
    MissingKey(String),

    #[error("stale node reference")]
    StaleNode,

    #[error("unsupported document content at '{path}': {reason}")]
    Unsupported { path: String, reason: String },

    #[error("cannot parse document: {0}")]
    Parse(String),
}

/// Evaluation errors. Every variant carries the path of the offending node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("unclassifiable node at '{path}': {reason}")]
    UnclassifiableNode { path: String, reason: String },

    #[error("required section '{0}' is missing")]
    MissingSection(String),

    #[error("unbound variable '{reference}' referenced at '{path}'")]
    UnboundVariable { path: String, reference: String },

    #[error("type mismatch at '{path}': {reason}")]
    TypeMismatch { path: String, reason: String },

    #[error("malformed substitution template at '{path}': {template}")]
    MalformedTemplate { path: String, template: String },

    #[error("binding '{0}' is already defined")]
    DuplicateBinding(String),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl EvalError {
    pub(crate) fn unclassifiable(path: &str, reason: impl Into<String>) -> Self {
        Self::UnclassifiableNode {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn type_mismatch(path: &str, reason: impl Into<String>) -> Self {
        Self::TypeMismatch {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unbound(path: &str, reference: impl Into<String>) -> Self {
        Self::UnboundVariable {
            path: path.to_string(),
            reference: reference.into(),
        }
    }

    /// Re-anchor the node path of this error under a section name, so that
    /// `.name` inside the let tree is reported as `let.name`.
    pub fn within(self, section: &str) -> Self {
        let anchor = |path: String| format!("{section}{path}");
        match self {
            Self::UnclassifiableNode { path, reason } => Self::UnclassifiableNode {
                path: anchor(path),
                reason,
            },
            Self::UnboundVariable { path, reference } => Self::UnboundVariable {
                path: anchor(path),
                reference,
            },
            Self::TypeMismatch { path, reason } => Self::TypeMismatch {
                path: anchor(path),
                reason,
            },
            Self::MalformedTemplate { path, template } => Self::MalformedTemplate {
                path: anchor(path),
                template,
            },
            other => other,
        }
    }
}

/// Result type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Result type for evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

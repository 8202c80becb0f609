//! Seed document schema
//!
//! ```yaml
//! version: "1"
//! variables:
//!   arguments: { ... }   # literal inputs
//!   let: { ... }         # derived values
//! configs:
//!   vscode_devcontainer: { ... }
//!   docker_compose: { ... }
//! ```
//!
//! `!var` keeps the type of the value it references (`8080` stays a number);
//! `!sub` always produces a string.

use std::path::Path;

use tracing::{debug, instrument};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::codec::from_yaml_str;
use crate::domain::{DocumentTree, ARGUMENTS_KEY, LET_KEY};

pub const SEED_FILENAME: &str = "seed.yml";
pub const DEVCONTAINER_FILENAME: &str = "devcontainer.json";
pub const DOCKER_COMPOSE_FILENAME: &str = "docker-compose.yml";

pub const VARIABLES_KEY: &str = "variables";
pub const CONFIGS_KEY: &str = "configs";
pub const DEVCONTAINER_KEY: &str = "vscode_devcontainer";
pub const DOCKER_COMPOSE_KEY: &str = "docker_compose";

/// Sections of a decoded seed. Absent sections are `None`; whether that is
/// an error is up to the caller.
#[derive(Debug, Clone)]
pub struct Seed {
    pub version: Option<String>,
    pub arguments: Option<DocumentTree>,
    pub let_tree: Option<DocumentTree>,
    pub devcontainer: Option<DocumentTree>,
    pub docker_compose: Option<DocumentTree>,
}

impl Seed {
    #[instrument(level = "debug", skip(content))]
    pub fn parse(content: &str, path: &Path) -> ApplicationResult<Self> {
        let invalid = |message: String| ApplicationError::Seed {
            path: path.to_path_buf(),
            message,
        };

        let document = from_yaml_str(content).map_err(|e| invalid(e.to_string()))?;
        if document
            .root()
            .and_then(|root| document.get(root))
            .and_then(|node| node.entries())
            .is_none()
        {
            return Err(invalid("top level must be a mapping".to_string()));
        }

        let section = |key: String| {
            document
                .section(&key)
                .map_err(|e| invalid(format!("{key}: {e}")))
        };

        let seed = Self {
            version: document.scalar_at("version").map(|s| s.value.clone()),
            arguments: section(format!("{VARIABLES_KEY}.{ARGUMENTS_KEY}"))?,
            let_tree: section(format!("{VARIABLES_KEY}.{LET_KEY}"))?,
            devcontainer: section(format!("{CONFIGS_KEY}.{DEVCONTAINER_KEY}"))?,
            docker_compose: section(format!("{CONFIGS_KEY}.{DOCKER_COMPOSE_KEY}"))?,
        };
        debug!(
            "seed version={:?} arguments={} let={} devcontainer={} docker_compose={}",
            seed.version,
            seed.arguments.is_some(),
            seed.let_tree.is_some(),
            seed.devcontainer.is_some(),
            seed.docker_compose.is_some()
        );
        Ok(seed)
    }
}

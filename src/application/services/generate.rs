//! Seed generation service
//!
//! Loads `seed.yml`, resolves its variables, expands both configs templates
//! and writes `devcontainer.json` and `docker-compose.yml`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::application::seed::{
    Seed, CONFIGS_KEY, DEVCONTAINER_FILENAME, DEVCONTAINER_KEY, DOCKER_COMPOSE_FILENAME,
    DOCKER_COMPOSE_KEY,
};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::codec::{to_json, to_yaml};
use crate::domain::{expand, BindingMap, DocumentTree, EvalError, Resolver};
use crate::infrastructure::traits::FileSystem;
use crate::util::path::resolve_against;

/// Serialized output documents, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub devcontainer: String,
    pub docker_compose: String,
}

/// Result of a full generate run.
#[derive(Debug, Clone)]
pub struct GenerateOutput {
    pub bindings: BindingMap,
    /// Written files, devcontainer first
    pub files: Vec<PathBuf>,
}

/// Service turning a seed into devcontainer configuration files.
pub struct GenerateService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl GenerateService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    fn resolver(&self) -> Resolver {
        Resolver::new(self.settings.truthiness)
    }

    pub fn seed_path(&self, project_dir: &Path) -> PathBuf {
        resolve_against(project_dir, &self.settings.seed_file)
    }

    pub fn output_dir(&self, project_dir: &Path, output_dir: Option<&Path>) -> PathBuf {
        resolve_against(project_dir, output_dir.unwrap_or(&self.settings.output_dir))
    }

    /// Read and decode the seed of `project_dir`.
    #[instrument(level = "debug", skip(self))]
    pub fn load_seed(&self, project_dir: &Path) -> ApplicationResult<Seed> {
        let path = self.seed_path(project_dir);
        if !self.fs.exists(&path) {
            return Err(ApplicationError::SeedNotFound(path));
        }
        let content = self
            .fs
            .read_to_string(&path)
            .with_path_context("read seed", &path)?;
        Seed::parse(&content, &path)
    }

    /// Run the binding pipeline; reduces `seed.let_tree` in place.
    pub fn resolve(&self, seed: &mut Seed) -> ApplicationResult<BindingMap> {
        let bindings = self
            .resolver()
            .resolve(seed.arguments.as_ref(), seed.let_tree.as_mut())?;
        debug!("resolve: {} bindings", bindings.len());
        Ok(bindings)
    }

    /// Expand both configs templates and serialize them.
    #[instrument(level = "debug", skip_all)]
    pub fn render(&self, seed: &mut Seed, bindings: &BindingMap) -> ApplicationResult<Rendered> {
        let truthiness = self.settings.truthiness;

        let devcontainer = required(&mut seed.devcontainer, DEVCONTAINER_KEY)?;
        expand(
            &format!("{CONFIGS_KEY}.{DEVCONTAINER_KEY}"),
            devcontainer,
            bindings,
            truthiness,
        )?;
        let docker_compose = required(&mut seed.docker_compose, DOCKER_COMPOSE_KEY)?;
        expand(
            &format!("{CONFIGS_KEY}.{DOCKER_COMPOSE_KEY}"),
            docker_compose,
            bindings,
            truthiness,
        )?;

        Ok(Rendered {
            devcontainer: encode_json(devcontainer, self.settings.json_indent)?,
            docker_compose: encode_yaml(docker_compose)?,
        })
    }

    /// Load, resolve, render and write. Nothing is written unless every
    /// step before succeeded.
    #[instrument(level = "debug", skip(self))]
    pub fn generate(
        &self,
        project_dir: &Path,
        output_dir: Option<&Path>,
    ) -> ApplicationResult<GenerateOutput> {
        let mut seed = self.load_seed(project_dir)?;
        let bindings = self.resolve(&mut seed)?;
        let rendered = self.render(&mut seed, &bindings)?;

        let out_dir = self.output_dir(project_dir, output_dir);
        if !self.fs.is_dir(&out_dir) {
            self.fs
                .create_dir_all(&out_dir)
                .with_path_context("create output directory", &out_dir)?;
        }

        let mut files = Vec::with_capacity(2);
        for (name, content) in [
            (DEVCONTAINER_FILENAME, &rendered.devcontainer),
            (DOCKER_COMPOSE_FILENAME, &rendered.docker_compose),
        ] {
            let path = out_dir.join(name);
            self.fs
                .write(&path, content)
                .with_path_context("write", &path)?;
            info!("wrote {}", path.display());
            files.push(path);
        }

        Ok(GenerateOutput { bindings, files })
    }
}

fn required<'s>(
    section: &'s mut Option<DocumentTree>,
    key: &str,
) -> ApplicationResult<&'s mut DocumentTree> {
    section
        .as_mut()
        .ok_or_else(|| EvalError::MissingSection(format!("{CONFIGS_KEY}.{key}")).into())
}

fn encode_json(tree: &DocumentTree, indent: usize) -> ApplicationResult<String> {
    let indent = vec![b' '; indent];
    let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    to_json(tree)
        .serialize(&mut serializer)
        .map_err(|e| encode_err(DEVCONTAINER_FILENAME, e))?;
    let mut text = String::from_utf8(buf).map_err(|e| encode_err(DEVCONTAINER_FILENAME, e))?;
    text.push('\n');
    Ok(text)
}

fn encode_yaml(tree: &DocumentTree) -> ApplicationResult<String> {
    serde_yaml::to_string(&to_yaml(tree)).map_err(|e| encode_err(DOCKER_COMPOSE_FILENAME, e))
}

fn encode_err(name: &str, e: impl std::error::Error + Send + Sync + 'static) -> ApplicationError {
    ApplicationError::OperationFailed {
        context: format!("encode {name}"),
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::codec::from_yaml_str;

    #[test]
    fn given_indent_when_encoding_json_then_nested_lines_use_it() {
        let tree = from_yaml_str("a: { b: 1 }").unwrap();
        let json = encode_json(&tree, 4).unwrap();
        assert_eq!(json, "{\n    \"a\": {\n        \"b\": 1\n    }\n}\n");
    }

    #[test]
    fn given_missing_config_when_requiring_then_missing_section() {
        let mut section = None;
        let err = required(&mut section, DOCKER_COMPOSE_KEY).unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Eval(EvalError::MissingSection(ref name)) if name == "configs.docker_compose"
        ));
    }
}

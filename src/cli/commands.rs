//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use tracing::{debug, instrument};

use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, project_config_path, Settings};
use crate::domain::ToTermTree;
use crate::infrastructure::ServiceContainer;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Generate { dir, output }) => {
            let project = project_dir(cli, dir.as_deref())?;
            cmd_generate(&project, output.as_deref())
        }
        Some(Commands::Resolve { dir }) => cmd_resolve(&project_dir(cli, dir.as_deref())?),
        Some(Commands::Tree { dir }) => cmd_tree(&project_dir(cli, dir.as_deref())?),
        Some(Commands::Config { command }) => {
            let project = project_dir(cli, None)?;
            match command {
                ConfigCommands::Show => cmd_config_show(&project),
                ConfigCommands::Path => cmd_config_path(&project),
                ConfigCommands::Template => {
                    output::info(&Settings::template());
                    Ok(())
                }
            }
        }
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map_err(|e| CliError::Usage(e.to_string())),
    }
}

/// Positional DIR wins over `-C`, which wins over the working directory.
fn project_dir(cli: &Cli, dir: Option<&Path>) -> CliResult<PathBuf> {
    let dir = match dir.or(cli.project_dir.as_deref()) {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()
            .map_err(|e| CliError::Usage(format!("cannot determine working directory: {e}")))?,
    };
    if !dir.is_dir() {
        return Err(CliError::Usage(format!(
            "not a directory: {}",
            dir.display()
        )));
    }
    Ok(dir)
}

fn container(project: &Path) -> CliResult<ServiceContainer> {
    let settings = Settings::load(Some(project))?;
    debug!("settings: {:?}", settings);
    Ok(ServiceContainer::new(settings))
}

#[instrument]
fn cmd_generate(project: &Path, output_dir: Option<&Path>) -> CliResult<()> {
    let service = container(project)?.generate_service();
    let result = service.generate(project, output_dir)?;
    for file in &result.files {
        output::success(&file.display());
    }
    Ok(())
}

#[instrument]
fn cmd_resolve(project: &Path) -> CliResult<()> {
    let service = container(project)?.generate_service();
    let mut seed = service.load_seed(project)?;
    let bindings = service.resolve(&mut seed)?;
    for (key, value) in bindings.iter() {
        output::binding(key, value);
    }
    Ok(())
}

#[instrument]
fn cmd_tree(project: &Path) -> CliResult<()> {
    let service = container(project)?.generate_service();
    let mut seed = service.load_seed(project)?;
    service.resolve(&mut seed)?;
    if let Some(let_tree) = &seed.let_tree {
        output::info(&let_tree.to_term_tree());
    }
    Ok(())
}

fn cmd_config_show(project: &Path) -> CliResult<()> {
    let settings = Settings::load(Some(project))?;
    output::header(&"# effective configuration");
    output::info(&settings.to_toml()?);
    Ok(())
}

fn cmd_config_path(project: &Path) -> CliResult<()> {
    let describe = |path: &Path| {
        let state = if path.exists() { "exists" } else { "not found" };
        format!("{} ({state})", path.display())
    };
    output::header(&"Global:");
    match global_config_path() {
        Some(path) => output::detail(&describe(&path)),
        None => output::detail(&"unavailable (no home directory)"),
    }
    output::header(&"Project:");
    output::detail(&describe(&project_config_path(project)));
    Ok(())
}

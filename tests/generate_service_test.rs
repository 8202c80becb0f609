//! Tests for GenerateService

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use devseed::application::services::GenerateService;
use devseed::application::ApplicationError;
use devseed::config::Settings;
use devseed::domain::EvalError;
use devseed::infrastructure::traits::RealFileSystem;
use devseed::util::testing;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/resources/seeds")
        .join(name)
        .join("seed.yml")
}

/// Helper to create a project directory holding `seed`
fn project_with_seed(seed: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("seed.yml"), seed).expect("write seed");
    temp
}

fn service(settings: Settings) -> GenerateService {
    testing::init_test_setup();
    GenerateService::new(Arc::new(RealFileSystem), Arc::new(settings))
}

#[test]
fn given_basic_seed_when_generating_then_both_files_written() {
    // Arrange
    let seed = std::fs::read_to_string(fixture("basic")).unwrap();
    let project = project_with_seed(&seed);
    let service = service(Settings::default());

    // Act
    let result = service.generate(project.path(), None).unwrap();

    // Assert
    let out = project.path().join(".devcontainer");
    assert_eq!(
        result.files,
        vec![out.join("devcontainer.json"), out.join("docker-compose.yml")]
    );

    let json_text = std::fs::read_to_string(out.join("devcontainer.json")).unwrap();
    assert!(json_text.contains("\n    \"name\": \"svc-foo (prod)\""));
    let json: serde_json::Value = serde_json::from_str(&json_text).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "name": "svc-foo (prod)",
            "dockerComposeFile": "docker-compose.yml",
            "service": "svc-foo",
            "workspaceFolder": "/workspace",
            "shutdownAction": "stopCompose"
        })
    );

    let compose: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(out.join("docker-compose.yml")).unwrap())
            .unwrap();
    assert_eq!(compose["version"], serde_yaml::Value::from("3.8"));
    assert_eq!(compose["services"]["app"]["image"], serde_yaml::Value::from("app:stable"));
    assert_eq!(
        compose["services"]["app"]["container_name"],
        serde_yaml::Value::from("svc-foo-app")
    );
    assert_eq!(compose["services"]["app"]["ports"][0], serde_yaml::Value::from(8080));
}

#[test]
fn given_basic_seed_when_resolving_then_let_bindings_available() {
    let project = project_with_seed(&std::fs::read_to_string(fixture("basic")).unwrap());
    let service = service(Settings::default());

    let mut seed = service.load_seed(project.path()).unwrap();
    let bindings = service.resolve(&mut seed).unwrap();

    assert_eq!(bindings.get("let.name"), Some("svc-foo"));
    assert_eq!(bindings.get("let.is_prod"), Some("true"));
    assert_eq!(bindings.get("let.image"), Some("app:stable"));
    assert_eq!(bindings.get("let.title"), Some("svc-foo (prod)"));
    assert_eq!(
        bindings.get("arguments.docker_compose.files[0]"),
        Some("docker-compose.yml")
    );
}

#[test]
fn given_custom_settings_when_generating_then_output_dir_and_indent_applied() {
    let project = project_with_seed(&std::fs::read_to_string(fixture("basic")).unwrap());
    let settings = Settings {
        output_dir: PathBuf::from("generated"),
        json_indent: 2,
        ..Default::default()
    };
    let service = service(settings);

    service.generate(project.path(), None).unwrap();

    let json_text =
        std::fs::read_to_string(project.path().join("generated/devcontainer.json")).unwrap();
    assert!(json_text.starts_with("{\n  \"name\""));
}

#[test]
fn given_explicit_output_dir_when_generating_then_it_wins() {
    let project = project_with_seed(&std::fs::read_to_string(fixture("basic")).unwrap());
    let target = TempDir::new().unwrap();
    let service = service(Settings::default());

    service.generate(project.path(), Some(target.path())).unwrap();

    assert!(target.path().join("devcontainer.json").is_file());
    assert!(!project.path().join(".devcontainer").exists());
}

#[test]
fn given_unbound_variable_when_generating_then_nothing_written() {
    let project = project_with_seed(
        r#"
variables:
  arguments: { env: prod }
  let:
    name: !var arguments.nope
configs:
  vscode_devcontainer: { name: !var let.name }
  docker_compose: { services: {} }
"#,
    );
    let service = service(Settings::default());

    let err = service.generate(project.path(), None).unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Eval(EvalError::UnboundVariable { ref path, .. }) if path == "let.name"
    ));
    assert!(!project.path().join(".devcontainer").exists());
}

#[test]
fn given_config_referencing_unknown_binding_when_generating_then_section_in_path() {
    let project = project_with_seed(
        r#"
variables:
  arguments: {}
  let: {}
configs:
  vscode_devcontainer: { name: plain }
  docker_compose: { services: { app: { image: !var let.image } } }
"#,
    );
    let service = service(Settings::default());

    let err = service.generate(project.path(), None).unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Eval(EvalError::UnboundVariable { ref path, .. })
            if path == "configs.docker_compose.services.app.image"
    ));
}

#[test]
fn given_missing_docker_compose_when_generating_then_missing_section() {
    let project = project_with_seed(
        r#"
variables:
  arguments: {}
  let: {}
configs:
  vscode_devcontainer: { name: plain }
"#,
    );
    let service = service(Settings::default());

    let err = service.generate(project.path(), None).unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Eval(EvalError::MissingSection(ref name)) if name == "configs.docker_compose"
    ));
}

#[test]
fn given_no_seed_when_loading_then_seed_not_found() {
    let project = TempDir::new().unwrap();
    let service = service(Settings::default());

    let err = service.load_seed(project.path()).unwrap_err();

    assert!(matches!(err, ApplicationError::SeedNotFound(ref p) if p.ends_with("seed.yml")));
}

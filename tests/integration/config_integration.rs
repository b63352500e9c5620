//! Integration tests for layered configuration loading

use pubsub_client::config::{ClientConfig, ConfigLoader};
use pubsub_client::transport::ScriptedTransportFactory;
use pubsub_client::types::DEFAULT_ORIGIN;
use pubsub_client::{ContextOptions, TransactionResult};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use crate::integration::with_xdg_env;

fn write(path: &std::path::Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_defaults_without_any_file() {
    let test_dir = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let config = ConfigLoader::load(project.path()).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.origin, DEFAULT_ORIGIN);
    });
}

#[test]
fn test_project_file_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        write(
            &test_dir.path().join("pubsub").join("config.toml"),
            r#"
origin = "global.example.com"
auth = "global-auth"

[keys]
subscribe_key = "sub-global"
publish_key = "pub-global"
"#,
        );
        write(
            &project.path().join("config").join("pubsub.toml"),
            r#"
origin = "project.example.com"

[keys]
subscribe_key = "sub-project"
"#,
        );

        let config = ConfigLoader::load(project.path()).unwrap();
        assert_eq!(config.origin, "project.example.com");
        assert_eq!(config.keys.subscribe_key, "sub-project");
        assert_eq!(config.keys.publish_key, "pub-global");
        assert_eq!(config.auth.as_deref(), Some("global-auth"));
    });
}

#[test]
fn test_environment_file_layers_on_project_file() {
    let test_dir = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        write(
            &project.path().join("config").join("pubsub.toml"),
            "[heartbeat]\nperiod_sec = 120\n",
        );
        write(
            &project.path().join("config").join("staging.toml"),
            "[heartbeat]\nenabled = true\n",
        );
        std::env::set_var("PUBSUB_ENV", "staging");

        let config = ConfigLoader::load(project.path()).unwrap();
        assert!(config.heartbeat.enabled);
        assert_eq!(config.heartbeat.period_sec, 120);
    });
}

#[test]
fn test_environment_variables_win() {
    let test_dir = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        write(
            &project.path().join("config").join("pubsub.toml"),
            "[timeouts]\nconnect_ms = 6000\n",
        );
        std::env::set_var("PUBSUB__TIMEOUTS__CONNECT_MS", "7000");
        let config = ConfigLoader::load(project.path());
        std::env::remove_var("PUBSUB__TIMEOUTS__CONNECT_MS");

        assert_eq!(config.unwrap().timeouts.connect_ms, 7000);
    });
}

#[test]
fn test_missing_file_is_an_error() {
    let test_dir = TempDir::new().unwrap();
    assert!(ConfigLoader::load_from_file(&test_dir.path().join("absent.toml")).is_err());
}

#[test]
fn test_built_context_uses_configured_identity() {
    let test_dir = TempDir::new().unwrap();
    let path = test_dir.path().join("client.toml");
    write(
        &path,
        r#"
uuid = "configured"
origin = "localhost:8090"

[keys]
subscribe_key = "sub-c"

[timeouts]
transaction_ms = 30000
"#,
    );
    let config = with_xdg_env(&test_dir, || ConfigLoader::load_from_file(&path).unwrap());
    assert!(config.validate().is_ok());

    let factory = ScriptedTransportFactory::new();
    factory.reply("/time/0", 200, "[1]");
    let ctx = config
        .build_context(ContextOptions::default().with_transport(Arc::new(factory.clone())));
    assert_eq!(ctx.uuid(), "configured");
    assert_eq!(ctx.origin(), "localhost:8090");
    assert_eq!(ctx.transaction_timeout(), 30_000);
    assert_eq!(ctx.time(), TransactionResult::Ok);
    assert_eq!(factory.requests()[0].origin, "localhost:8090");
    assert_eq!(
        factory.requests()[0].request.query_value("uuid"),
        Some("configured")
    );
}

#[test]
fn test_config_round_trips_through_toml() {
    let mut config = ClientConfig::default();
    config.keys.subscribe_key = "sub-c".to_string();
    config.heartbeat.enabled = true;
    let text = ConfigLoader::to_toml(&config).unwrap();

    let test_dir = TempDir::new().unwrap();
    let path = test_dir.path().join("dump.toml");
    fs::write(&path, text).unwrap();
    let loaded = with_xdg_env(&test_dir, || ConfigLoader::load_from_file(&path).unwrap());
    assert_eq!(loaded, config);
}

//! Shared test utilities for integration tests
//!
//! Provides scripted-transport contexts, polling helpers and isolation of the XDG
//! environment variables the config loader reads.

use pubsub_client::transport::ScriptedTransportFactory;
use pubsub_client::{Context, ContextOptions, ContextSettings, DriveMode};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static XDG_ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Environment variable state to restore after test
struct EnvState {
    home: Option<String>,
    xdg_config_home: Option<String>,
    pubsub_env: Option<String>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            home: std::env::var("HOME").ok(),
            xdg_config_home: std::env::var("XDG_CONFIG_HOME").ok(),
            pubsub_env: std::env::var("PUBSUB_ENV").ok(),
        }
    }

    fn restore(self) {
        restore_var("HOME", self.home);
        restore_var("XDG_CONFIG_HOME", self.xdg_config_home);
        restore_var("PUBSUB_ENV", self.pubsub_env);
    }
}

fn restore_var(name: &str, value: Option<String>) {
    match value {
        Some(orig) => std::env::set_var(name, orig),
        None => std::env::remove_var(name),
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointing into `test_dir`
///
/// The global config file lives at `<test_dir>/pubsub/config.toml`. The original
/// environment is restored afterwards.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = XDG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();

    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path());
    std::env::remove_var("PUBSUB_ENV");

    let result = f();

    env_state.restore();

    result
}

/// Context over the scripted transport with uuid `tester`
pub fn context_with(factory: &ScriptedTransportFactory, mode: DriveMode) -> Context {
    Context::with_options(
        ContextSettings::new("pub-key", "sub-key").with_uuid("tester"),
        ContextOptions::default()
            .with_transport(Arc::new(factory.clone()))
            .with_mode(mode),
    )
}

/// Poll `condition` until it holds or five seconds pass
pub fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

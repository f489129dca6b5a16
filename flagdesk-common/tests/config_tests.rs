//! Configuration loading and secret resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate FLAGDESK_* variables are marked with #[serial].

use flagdesk_common::config::{
    require_secret, resolve_secret, StoreBackend, TomlConfig, CONFIG_ENV_VAR,
    GEMINI_API_KEY_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::io::Write;

#[test]
#[serial]
fn test_env_secret_overrides_toml() {
    env::set_var(GEMINI_API_KEY_ENV_VAR, "env-key");

    let resolved = resolve_secret(GEMINI_API_KEY_ENV_VAR, Some("toml-key"));
    assert_eq!(resolved.as_deref(), Some("env-key"));

    env::remove_var(GEMINI_API_KEY_ENV_VAR);
}

#[test]
#[serial]
fn test_toml_secret_used_when_env_missing() {
    env::remove_var(GEMINI_API_KEY_ENV_VAR);

    let resolved = resolve_secret(GEMINI_API_KEY_ENV_VAR, Some("toml-key"));
    assert_eq!(resolved.as_deref(), Some("toml-key"));
}

#[test]
#[serial]
fn test_whitespace_secret_is_ignored() {
    env::set_var(GEMINI_API_KEY_ENV_VAR, "   ");

    assert_eq!(resolve_secret(GEMINI_API_KEY_ENV_VAR, Some("  ")), None);
    assert!(require_secret(GEMINI_API_KEY_ENV_VAR, "api_key", None).is_err());

    env::remove_var(GEMINI_API_KEY_ENV_VAR);
}

#[test]
#[serial]
fn test_load_from_env_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "bind_addr = \"0.0.0.0:9000\"\n[store]\nbackend = \"sqlite\"\npath = \"/tmp/fd-test.db\""
    )
    .unwrap();

    env::set_var(CONFIG_ENV_VAR, file.path());
    let config = TomlConfig::load(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.bind_addr, "0.0.0.0:9000");
    assert_eq!(
        config.store.backend,
        StoreBackend::Sqlite {
            path: "/tmp/fd-test.db".into()
        }
    );
}

#[test]
#[serial]
fn test_explicit_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(TomlConfig::load(Some(&missing)).is_err());
}

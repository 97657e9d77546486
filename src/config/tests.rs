use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::settings::PartialSettings;
use super::*;

fn write_config(dir: &TempDir, toml: &str) -> String {
    let path = dir.path().join("default.toml");
    fs::write(&path, toml).expect("write config file");
    dir.path().join("default").to_string_lossy().into_owned()
}

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.server.max_connections, 1000);
    assert_eq!(settings.protocol.max_payload_len, 1_048_576 + 512);
    assert_eq!(settings.session.identity_cache_capacity, 1000);
    assert_eq!(settings.scheduler.tick_millis, 1000);
    assert_eq!(settings.auth.users.get("admin").map(String::as_str), Some("password"));
    assert_eq!(settings.logging.level, "info");
    assert_eq!(settings.bind_addr(), "127.0.0.1:8080");
}

#[test]
fn test_empty_partial_merges_to_defaults() {
    assert_eq!(PartialSettings::default().merge_over(Settings::default()), Settings::default());
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("absent").to_string_lossy().into_owned();
    let settings = load_config_from(&path).expect("load_config_from failed");
    assert_eq!(settings, Settings::default());
}

#[test]
#[serial]
fn test_load_config_from_file_overrides_defaults() {
    let dir = TempDir::new().expect("create tempdir");
    let path = write_config(
        &dir,
        r#"
            [server]
            host = "0.0.0.0"
            port = 9000
            max_connections = 10

            [session]
            identity_cache_capacity = 5

            [auth.users]
            alice = "hunter2"
        "#,
    );

    let settings = load_config_from(&path).expect("load_config_from failed");
    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 9000);
    assert_eq!(settings.server.max_connections, 10);
    assert_eq!(settings.session.identity_cache_capacity, 5);
    assert_eq!(settings.auth.users.len(), 1);
    assert_eq!(settings.auth.users.get("alice").map(String::as_str), Some("hunter2"));
    // untouched sections keep their defaults
    assert_eq!(settings.scheduler.tick_millis, 1000);
    assert_eq!(settings.logging.level, "info");
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let dir = TempDir::new().expect("create tempdir");
    let path = write_config(
        &dir,
        r#"
            [server]
            port = 9000

            [logging]
            level = "warn"
        "#,
    );

    temp_env::with_vars(
        [("CHATWIRE_SERVER__PORT", Some("9100")), ("CHATWIRE_LOGGING__LEVEL", Some("debug"))],
        || {
            let settings = load_config_from(&path).expect("load_config_from failed");
            assert_eq!(settings.server.port, 9100);
            assert_eq!(settings.logging.level, "debug");
        },
    );
}

#[test]
#[serial]
fn test_environment_overrides_underscored_keys() {
    let dir = TempDir::new().expect("create tempdir");
    let path = write_config(&dir, "");

    temp_env::with_vars(
        [
            ("CHATWIRE_SERVER__MAX_CONNECTIONS", Some("50")),
            ("CHATWIRE_SCHEDULER__TICK_MILLIS", Some("250")),
            ("CHATWIRE_SESSION__IDENTITY_CACHE_CAPACITY", Some("8")),
        ],
        || {
            let settings = load_config_from(&path).expect("load_config_from failed");
            assert_eq!(settings.server.max_connections, 50);
            assert_eq!(settings.scheduler.tick_millis, 250);
            assert_eq!(settings.session.identity_cache_capacity, 8);
            assert_eq!(settings.server.port, Settings::default().server.port);
        },
    );
}

#[test]
#[serial]
fn test_invalid_value_is_an_error() {
    let dir = TempDir::new().expect("create tempdir");
    let path = write_config(
        &dir,
        r#"
            [server]
            port = "not a port"
        "#,
    );
    assert!(load_config_from(&path).is_err());
}

//! Integration tests for config loading and the startup credential read.

use deepseek_chat_client::config::{self, CONFIG_ENV_VAR};
use deepseek_chat_client::{Config, CredentialError, StartupError};

#[test]
fn load_existing_yaml_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        r#"
api:
  base_url: "https://api.example.com/v1"
  model: "deepseek-chat"
  api_key_file: "keys/deepseek.txt"
ui:
  title: "Chat"
  width: 800
  height: 600
"#,
    )
    .unwrap();

    let cfg = config::load(&config_path).expect("load should succeed");
    assert_eq!(cfg.api.base_url(), "https://api.example.com/v1");
    assert_eq!(cfg.api.model(), "deepseek-chat");
    assert_eq!(cfg.api.api_key_file.as_deref(), Some("keys/deepseek.txt"));
    assert_eq!(cfg.ui.title(), "Chat");
    assert_eq!(cfg.ui.size(), (800, 600));
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "api:\n  model: deepseek-chat\n").unwrap();

    let cfg = config::load(&config_path).unwrap();
    assert_eq!(cfg.api.base_url(), config::DEFAULT_BASE_URL);
    assert_eq!(cfg.api.model(), "deepseek-chat");
    assert_eq!(cfg.ui.title(), "DeepSeek Chat");
    assert_eq!(cfg.ui.size(), (600, 400));
}

#[test]
fn invalid_yaml_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "api: [unterminated").unwrap();

    let err = config::load(&config_path).unwrap_err();
    assert!(matches!(err, config::ConfigError::Parse { .. }));
}

#[test]
fn load_or_default_tolerates_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config::load_or_default(&dir.path().join("nope.yaml")).unwrap();
    assert_eq!(cfg, Config::default());
}

#[test]
fn api_key_is_trimmed() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("api_key.txt");
    std::fs::write(&key_path, "  sk-abc123\n").unwrap();

    let key = config::load_api_key(&key_path).unwrap();
    assert_eq!(key.expose(), "sk-abc123");
}

#[test]
fn missing_or_empty_api_key_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let missing = config::load_api_key(&dir.path().join("api_key.txt")).unwrap_err();
    assert!(matches!(missing, CredentialError::Missing { .. }));
    assert!(missing.to_string().contains("not found"));

    let empty_path = dir.path().join("empty.txt");
    std::fs::write(&empty_path, "\n\n").unwrap();
    let empty = config::load_api_key(&empty_path).unwrap_err();
    assert!(matches!(empty, CredentialError::Empty { .. }));

    let unreadable = config::load_api_key(dir.path()).unwrap_err();
    assert!(matches!(unreadable, CredentialError::Unreadable { .. }));
}

#[test]
fn startup_reads_key_next_to_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "api:\n  api_key_file: secret.txt\n").unwrap();
    std::fs::write(dir.path().join("secret.txt"), "sk-from-file\n").unwrap();

    let startup = config::load_startup(Some(&config_path)).expect("startup should succeed");
    assert_eq!(startup.api_key.expose(), "sk-from-file");
    assert_eq!(startup.config_path, config_path);
    assert_eq!(startup.config.api.model(), "deepseek-reasoner");
}

#[test]
fn startup_with_explicit_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = config::load_startup(Some(&dir.path().join("absent.yaml"))).unwrap_err();
    assert!(matches!(err, StartupError::Config(_)));
}

#[test]
fn startup_without_key_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "ui:\n  title: x\n").unwrap();

    let err = config::load_startup(Some(&config_path)).unwrap_err();
    assert!(matches!(
        err,
        StartupError::Credential(CredentialError::Missing { .. })
    ));
    assert!(err.to_string().contains("api_key.txt"));
}

/// Config path resolves to `~/.deepseek-chat/config.yaml` using the current platform's home dir.
/// We override the HOME env var to a temp dir to verify the resolution.
#[test]
fn default_config_path_uses_home_directory() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().to_str().unwrap().to_string();

    // Override HOME (Unix) / USERPROFILE (Windows) temporarily.
    let key = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    let original = std::env::var(key).ok();

    std::env::set_var(key, &home);
    let path = config::default_config_path();
    // Restore.
    match original {
        Some(v) => std::env::set_var(key, v),
        None => std::env::remove_var(key),
    }

    let path = path.expect("should resolve a config path");
    let expected = dir.path().join(".deepseek-chat").join("config.yaml");
    assert_eq!(path, expected);
}

#[test]
fn explicit_path_wins_over_env_and_default() {
    let explicit = std::path::Path::new("/tmp/explicit.yaml");
    assert_eq!(
        config::resolve_config_path(Some(explicit)).as_deref(),
        Some(explicit)
    );
    assert_eq!(CONFIG_ENV_VAR, "DEEPSEEK_CHAT_CONFIG");
}

//! Client config loading for `~/.deepseek-chat/config.yaml`, plus the
//! one-shot API key read performed at startup.

use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-reasoner";
pub const DEFAULT_API_KEY_FILE: &str = "api_key.txt";
pub const DEFAULT_TITLE: &str = "DeepSeek Chat";
pub const DEFAULT_WIDTH: u32 = 600;
pub const DEFAULT_HEIGHT: u32 = 400;

/// Env var consulted when no `--config` flag is given.
pub const CONFIG_ENV_VAR: &str = "DEEPSEEK_CHAT_CONFIG";

/// API section (base_url, model, api_key_file).
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct ApiSection {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key_file: Option<String>,
}

impl ApiSection {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Where the key file lives. Relative paths are taken against `config_dir`
    /// when a config file was loaded, else against the working directory.
    pub fn resolve_key_path(&self, config_dir: Option<&Path>) -> PathBuf {
        let file = PathBuf::from(self.api_key_file.as_deref().unwrap_or(DEFAULT_API_KEY_FILE));
        match config_dir {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file,
        }
    }
}

/// Window section (title, width, height). Only the desktop shell reads it.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct UiSection {
    pub title: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl UiSection {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    pub fn size(&self) -> (u32, u32) {
        (
            self.width.unwrap_or(DEFAULT_WIDTH),
            self.height.unwrap_or(DEFAULT_HEIGHT),
        )
    }
}

/// Full config file.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub ui: UiSection,
}

/// Returns the default config file path: `~/.deepseek-chat/config.yaml` (platform-specific).
pub fn default_config_path() -> Option<PathBuf> {
    let home = home_dir()?;
    Some(home.join(".deepseek-chat").join("config.yaml"))
}

#[cfg(unix)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(windows)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE").map(PathBuf::from)
}

#[cfg(not(any(unix, windows)))]
fn home_dir() -> Option<PathBuf> {
    None
}

/// Resolve the config path from an explicit override, the env var, or the default.
pub fn resolve_config_path(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = override_path {
        return Some(p.to_path_buf());
    }
    if let Some(val) = std::env::var_os(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(val));
    }
    default_config_path()
}

/// Load config from a YAML file.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`load`], but a missing file yields the built-in defaults.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    load(path)
}

/// Config load error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// API key read from the credential file. `Debug` never shows the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Credential file problems. Any of these aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("API key file '{}' not found", path.display())]
    Missing { path: PathBuf },
    #[error("could not read API key file '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("API key file '{}' is empty", path.display())]
    Empty { path: PathBuf },
}

/// Read the API key once. Surrounding whitespace is dropped.
pub fn load_api_key(path: &Path) -> Result<ApiKey, CredentialError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            CredentialError::Missing {
                path: path.to_path_buf(),
            }
        } else {
            CredentialError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let key = contents.trim();
    if key.is_empty() {
        return Err(CredentialError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(ApiKey::new(key))
}

/// Everything the front ends need before a transport can be built.
#[derive(Debug)]
pub struct Startup {
    pub config_path: PathBuf,
    pub config: Config,
    pub api_key: ApiKey,
}

/// Fatal startup problem; the program reports it and exits.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("unable to determine config path (set --config or DEEPSEEK_CHAT_CONFIG)")]
    NoConfigPath,
    #[error("failed to load config: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Resolve and load the config, then read the API key it points at.
///
/// An explicitly named config (flag or env var) must exist; the default one
/// may be absent, in which case built-in defaults apply.
pub fn load_startup(override_path: Option<&Path>) -> Result<Startup, StartupError> {
    let explicit = override_path.is_some() || std::env::var_os(CONFIG_ENV_VAR).is_some();
    let config_path = resolve_config_path(override_path).ok_or(StartupError::NoConfigPath)?;
    let config = if explicit {
        load(&config_path)?
    } else {
        load_or_default(&config_path)?
    };

    let config_dir = config_path
        .exists()
        .then(|| config_path.parent())
        .flatten();
    let key_path = config.api.resolve_key_path(config_dir);
    tracing::debug!(
        config = %config_path.display(),
        key = %key_path.display(),
        "loading credentials"
    );
    let api_key = load_api_key(&key_path)?;

    Ok(Startup {
        config_path,
        config,
        api_key,
    })
}

//! Configuration loading, parsing, and API key persistence for becwatch.
//!
//! The config file (`~/.becwatch/config.toml`) is the synchronized namespace:
//! it holds the Gemini API key and the tunables of every pipeline stage.
//! Every section is optional; absent values fall back to built-in defaults.
//!
//! ```toml
//! [api_keys]
//! google = "${GEMINI_API_KEY}"
//!
//! [classifier]
//! model = "gemini-2.5-flash"
//! max_attempts = 3
//!
//! [detector]
//! debounce_ms = 1000
//! overlap = "replace_pending"
//! ```

use std::path::{Path, PathBuf};
use std::{env, fs};

use becwatch_types::{ApiKey, OverlapPolicy};
use becwatch_utils::atomic_write;
use serde::Deserialize;
use thiserror::Error;

/// Directory under `$HOME` holding config, state, and logs.
pub const APP_DIR: &str = ".becwatch";
/// Environment variable consulted when the config file names no key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 2000;
pub const DEFAULT_SUBJECT_SELECTOR: &str = "h2.hP";
pub const DEFAULT_BODY_SELECTOR: &str = ".a3s.aiL";
/// Element holding the open conversation; mutations elsewhere are ignored.
pub const DEFAULT_CONTAINER_SELECTOR: &str = "[role=\"tabpanel\"]";

#[derive(Debug, Default, Deserialize)]
pub struct BecwatchConfig {
    pub api_keys: Option<ApiKeys>,
    pub classifier: Option<ClassifierConfig>,
    pub detector: Option<DetectorConfig>,
    pub alerts: Option<AlertsConfig>,
    pub storage: Option<StorageConfig>,
    pub ui: Option<UiConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config at {} is not editable TOML: {source}", path.display())]
    Edit {
        path: PathBuf,
        #[source]
        source: toml_edit::TomlError,
    },
    #[error("`{key}` in config at {} is not a table", path.display())]
    NotATable { path: PathBuf, key: &'static str },
    #[error("failed to write config at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine home directory")]
    NoHome,
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. }
            | Self::Parse { path, .. }
            | Self::Edit { path, .. }
            | Self::NotATable { path, .. }
            | Self::Write { path, .. } => Some(path),
            Self::NoHome => None,
        }
    }
}

#[derive(Default, Deserialize)]
pub struct ApiKeys {
    pub google: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let google = if self.google.is_some() {
            "[REDACTED]"
        } else {
            "None"
        };
        f.debug_struct("ApiKeys").field("google", &google).finish()
    }
}

/// Remote classifier settings.
#[derive(Debug, Default, Deserialize)]
pub struct ClassifierConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Total attempts, initial request included.
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_jitter_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

/// Change detector and extractor settings.
#[derive(Debug, Default, Deserialize)]
pub struct DetectorConfig {
    pub debounce_ms: Option<u64>,
    pub initial_delay_ms: Option<u64>,
    #[serde(default)]
    pub overlap: OverlapPolicy,
    pub subject_selector: Option<String>,
    pub body_selector: Option<String>,
    pub container_selector: Option<String>,
}

impl DetectorConfig {
    #[must_use]
    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)
    }

    #[must_use]
    pub fn initial_delay_ms(&self) -> u64 {
        self.initial_delay_ms.unwrap_or(DEFAULT_INITIAL_DELAY_MS)
    }

    #[must_use]
    pub fn subject_selector(&self) -> &str {
        self.subject_selector
            .as_deref()
            .unwrap_or(DEFAULT_SUBJECT_SELECTOR)
    }

    #[must_use]
    pub fn body_selector(&self) -> &str {
        self.body_selector.as_deref().unwrap_or(DEFAULT_BODY_SELECTOR)
    }

    #[must_use]
    pub fn container_selector(&self) -> &str {
        self.container_selector
            .as_deref()
            .unwrap_or(DEFAULT_CONTAINER_SELECTOR)
    }
}

/// High-risk alert settings.
#[derive(Debug, Deserialize)]
pub struct AlertsConfig {
    /// Post desktop notifications via `notify-send`. When false, alerts are only logged.
    #[serde(default = "default_true")]
    pub desktop: bool,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self { desktop: true }
    }
}

const fn default_true() -> bool {
    true
}

/// Terminal popup settings.
#[derive(Debug, Default, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub high_contrast: bool,
}

/// Local namespace settings.
#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// Override for the persisted state file. `${VAR}` references are expanded.
    pub state_path: Option<String>,
}

/// Replace every `${VAR}` with the variable's value (empty when unset).
///
/// An unclosed `${` is kept verbatim.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else { break };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl BecwatchConfig {
    /// Load from `~/.becwatch/config.toml`. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!(path = %path.display(), "Failed to read config: {source}");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map(Some).map_err(|source| {
            tracing::warn!(path = %path.display(), "Failed to parse config: {source}");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// API key: `[api_keys] google` (env-expanded), else `$GEMINI_API_KEY`.
    #[must_use]
    pub fn google_api_key(&self) -> Option<ApiKey> {
        self.google_api_key_with(|name| env::var(name).ok())
    }

    fn google_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<ApiKey> {
        let configured = self
            .api_keys
            .as_ref()
            .and_then(|keys| keys.google.as_deref())
            .map(expand_env_vars)
            .and_then(|raw| ApiKey::new(raw).ok());

        configured.or_else(|| lookup(API_KEY_ENV).and_then(|raw| ApiKey::new(raw).ok()))
    }

    #[must_use]
    pub fn detector(&self) -> &DetectorConfig {
        static DEFAULT: DetectorConfig = DetectorConfig {
            debounce_ms: None,
            initial_delay_ms: None,
            overlap: OverlapPolicy::Drop,
            subject_selector: None,
            body_selector: None,
            container_selector: None,
        };
        self.detector.as_ref().unwrap_or(&DEFAULT)
    }

    #[must_use]
    pub fn high_contrast(&self) -> bool {
        self.ui.as_ref().is_some_and(|ui| ui.high_contrast)
    }

    #[must_use]
    pub fn desktop_alerts(&self) -> bool {
        self.alerts.as_ref().is_none_or(|a| a.desktop)
    }

    /// Persisted state file: `[storage] state_path` or `~/.becwatch/state.json`.
    #[must_use]
    pub fn state_path(&self) -> Option<PathBuf> {
        self.storage
            .as_ref()
            .and_then(|s| s.state_path.as_deref())
            .map(|raw| PathBuf::from(expand_env_vars(raw)))
            .or_else(|| app_dir().map(|dir| dir.join("state.json")))
    }

    /// Relayed runtime messages, kept beside the state file.
    #[must_use]
    pub fn message_log_path(&self) -> Option<PathBuf> {
        self.state_path().map(|state| state.with_file_name("messages.jsonl"))
    }

    /// Write the API key to `~/.becwatch/config.toml`.
    pub fn persist_api_key(key: &ApiKey) -> Result<PathBuf, ConfigError> {
        let path = config_path().ok_or(ConfigError::NoHome)?;
        persist_api_key_to(&path, key)?;
        Ok(path)
    }
}

/// Set `[api_keys] google` in the config at `path`.
///
/// Uses `toml_edit` so comments and unrelated settings survive. The file and
/// its directory are restricted to the owner.
pub fn persist_api_key_to(path: &Path, key: &ApiKey) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(write_err)?;
        restrict_to_owner(parent, 0o700).map_err(write_err)?;
    }

    let content = if path.exists() {
        fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        String::new()
    };

    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|source| ConfigError::Edit {
            path: path.to_path_buf(),
            source,
        })?;

    let api_keys = doc
        .entry("api_keys")
        .or_insert(toml_edit::Item::Table(toml_edit::Table::new()))
        .as_table_like_mut()
        .ok_or_else(|| ConfigError::NotATable {
            path: path.to_path_buf(),
            key: "api_keys",
        })?;
    api_keys.insert("google", toml_edit::value(key.expose_secret()));

    atomic_write(path, doc.to_string().as_bytes()).map_err(write_err)?;

    tracing::info!(path = %path.display(), "Saved API key");
    Ok(())
}

/// Tighten `path` to `mode` if it is ours and group/other can access it.
#[cfg(unix)]
fn restrict_to_owner(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    let metadata = fs::metadata(path)?;
    // SAFETY: getuid has no preconditions and cannot fail.
    let our_uid = unsafe { libc::getuid() };
    if metadata.uid() == our_uid && metadata.permissions().mode() & 0o077 != 0 {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[must_use]
pub fn app_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DIR))
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    app_dir().map(|dir| dir.join("config.toml"))
}

//! Configuration loading
//!
//! Bootstrap configuration comes from one TOML file. Resolution order for
//! the file itself:
//! 1. Command-line argument (highest priority)
//! 2. `FLAGDESK_CONFIG` environment variable
//! 3. `~/.config/flagdesk/flagdesk.toml`
//! 4. `/etc/flagdesk/flagdesk.toml` (Linux only)
//!
//! A missing file is not fatal: built-in defaults are used and a warning is
//! logged. Secrets (API key, admin password, sheets token) resolve
//! environment first, then TOML; see [`resolve_secret`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

pub const CONFIG_ENV_VAR: &str = "FLAGDESK_CONFIG";
pub const GEMINI_API_KEY_ENV_VAR: &str = "FLAGDESK_GEMINI_API_KEY";
pub const ADMIN_PASSWORD_ENV_VAR: &str = "FLAGDESK_ADMIN_PASSWORD";
pub const SHEETS_TOKEN_ENV_VAR: &str = "FLAGDESK_SHEETS_ACCESS_TOKEN";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Admin credential (prefer the environment variable)
    #[serde(default)]
    pub admin_password: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            admin_password: None,
            logging: LoggingConfig::default(),
            store: StoreConfig::default(),
            extractor: ExtractorConfig::default(),
            ingest: IngestConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Persistent table settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(flatten)]
    pub backend: StoreBackend,

    /// Write the derived `OrderNumber` column alongside the canonical ones
    #[serde(default)]
    pub persist_order_number: bool,

    /// Pass the read version back on write; requires a versioned backend
    #[serde(default)]
    pub optimistic_concurrency: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            persist_order_number: false,
            optimistic_concurrency: false,
        }
    }
}

/// Which table implementation backs the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local SQLite file
    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
    /// Google Sheets worksheet
    Sheets {
        spreadsheet_id: String,
        #[serde(default = "default_worksheet")]
        worksheet: String,
        /// OAuth bearer token; `FLAGDESK_SHEETS_ACCESS_TOKEN` takes priority
        #[serde(default)]
        access_token: Option<String>,
    },
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

/// AI extractor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Generative Language API key; `FLAGDESK_GEMINI_API_KEY` takes priority
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_extractor_base_url")]
    pub base_url: String,

    /// Minimum interval between successive extraction calls
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Longest image side submitted to the extractor, in pixels
    #[serde(default = "default_max_image_dim")]
    pub max_image_dim: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_extractor_base_url(),
            pacing_ms: default_pacing_ms(),
            max_image_dim: default_max_image_dim(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// What an extraction failure does to the rest of the batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionFailurePolicy {
    /// Count the failed page and continue with the next one
    #[default]
    Skip,
    /// Stop the batch; rows collected so far are still merged
    Abort,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub on_extraction_failure: ExtractionFailurePolicy,
}

/// Per-session UI state settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_keypad_max_digits")]
    pub keypad_max_digits: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            keypad_max_digits: default_keypad_max_digits(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:5740".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sqlite_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("flagdesk").join("flagdesk.db"))
        .unwrap_or_else(|| PathBuf::from("./flagdesk_data/flagdesk.db"))
}

fn default_worksheet() -> String {
    "Sheet1".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_extractor_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_pacing_ms() -> u64 {
    4000 // 15 requests per minute
}

fn default_max_image_dim() -> u32 {
    1600
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_idle_timeout_secs() -> u64 {
    1800
}

fn default_keypad_max_digits() -> usize {
    12
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Resolve the config file and load it, falling back to defaults
    ///
    /// An explicitly requested file (argument or environment) that cannot
    /// be read is an error; a missing default-location file is not.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            info!("Loading configuration from {}", path.display());
            return Self::load_from(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            info!("Loading configuration from {} ({})", path.display(), CONFIG_ENV_VAR);
            return Self::load_from(&path);
        }

        match default_config_path() {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load_from(&path)
            }
            None => {
                warn!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}

/// First existing default-location config file
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("flagdesk").join("flagdesk.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/flagdesk/flagdesk.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Validate a secret (non-empty, non-whitespace)
pub fn is_valid_secret(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Resolve a secret from the environment, then TOML
///
/// Warns when both sources are set since the TOML value is then ignored.
pub fn resolve_secret(env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_secret(v));
    let toml_value = toml_value.filter(|v| is_valid_secret(v));

    match (env_value, toml_value) {
        (Some(env), Some(_)) => {
            warn!("{} set in both environment and TOML, using environment", env_var);
            Some(env)
        }
        (Some(env), None) => {
            info!("{} loaded from environment variable", env_var);
            Some(env)
        }
        (None, Some(toml)) => {
            info!("{} loaded from TOML config", env_var);
            Some(toml.to_string())
        }
        (None, None) => None,
    }
}

/// Resolve a required secret or fail with a configuration hint
pub fn require_secret(env_var: &str, toml_key: &str, toml_value: Option<&str>) -> Result<String> {
    resolve_secret(env_var, toml_value).ok_or_else(|| {
        Error::Config(format!(
            "{} not configured. Set one of:\n\
             1. Environment: {}=...\n\
             2. TOML config: {} = \"...\"",
            toml_key, env_var, toml_key
        ))
    })
}

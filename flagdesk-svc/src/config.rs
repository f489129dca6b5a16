//! Resolved service configuration
//!
//! `TomlConfig` is the file format; `ServiceConfig` is what constructors
//! receive, with secrets resolved (environment → TOML) and durations typed.
//! Nothing below the entry points reads the environment.

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use flagdesk_common::config::{
    require_secret, resolve_secret, ExtractionFailurePolicy, StoreBackend, TomlConfig,
    ADMIN_PASSWORD_ENV_VAR, GEMINI_API_KEY_ENV_VAR, SHEETS_TOKEN_ENV_VAR,
};
use flagdesk_common::{Error, Result};

/// Store backend with its credential resolved
#[derive(Debug, Clone)]
pub enum StoreTarget {
    Sqlite {
        path: PathBuf,
    },
    Sheets {
        spreadsheet_id: String,
        worksheet: String,
        access_token: String,
    },
}

/// Write behavior of the store adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// Also write the derived `OrderNumber` column
    pub persist_order_number: bool,
    /// Carry the read version into the write (compare-and-swap)
    pub optimistic_concurrency: bool,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub target: StoreTarget,
    pub options: StoreOptions,
}

#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    /// None disables image/PDF ingestion; spreadsheets still work
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub pacing: Duration,
    pub max_image_dim: u32,
    pub on_extraction_failure: ExtractionFailurePolicy,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub idle_timeout: Duration,
    pub keypad_max_digits: usize,
}

/// Everything the service needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub log_level: String,
    pub admin_password: Option<String>,
    pub store: StoreSettings,
    pub extractor: ExtractorSettings,
    pub ingest: IngestSettings,
    pub session: SessionSettings,
}

impl ServiceConfig {
    /// Resolve secrets and validate option combinations
    pub fn resolve(toml: &TomlConfig) -> Result<Self> {
        let store = resolve_store(toml)?;

        let admin_password = resolve_secret(ADMIN_PASSWORD_ENV_VAR, toml.admin_password.as_deref());
        if admin_password.is_none() {
            warn!("No admin password configured; admin login is disabled");
        }

        let api_key = resolve_secret(GEMINI_API_KEY_ENV_VAR, toml.extractor.api_key.as_deref());
        if api_key.is_none() {
            warn!("No extractor API key configured; image and PDF ingestion is disabled");
        }

        if toml.session.keypad_max_digits == 0 {
            return Err(Error::Config("session.keypad_max_digits must be at least 1".to_string()));
        }

        Ok(Self {
            bind_addr: toml.bind_addr.clone(),
            log_level: toml.logging.level.clone(),
            admin_password,
            store,
            extractor: ExtractorSettings {
                api_key,
                model: toml.extractor.model.clone(),
                base_url: toml.extractor.base_url.trim_end_matches('/').to_string(),
                timeout: Duration::from_secs(toml.extractor.timeout_secs),
            },
            ingest: IngestSettings {
                pacing: Duration::from_millis(toml.extractor.pacing_ms),
                max_image_dim: toml.extractor.max_image_dim,
                on_extraction_failure: toml.ingest.on_extraction_failure,
            },
            session: SessionSettings {
                idle_timeout: Duration::from_secs(toml.session.idle_timeout_secs),
                keypad_max_digits: toml.session.keypad_max_digits,
            },
        })
    }
}

fn resolve_store(toml: &TomlConfig) -> Result<StoreSettings> {
    let target = match &toml.store.backend {
        StoreBackend::Sqlite { path } => StoreTarget::Sqlite { path: path.clone() },
        StoreBackend::Sheets {
            spreadsheet_id,
            worksheet,
            access_token,
        } => {
            if toml.store.optimistic_concurrency {
                return Err(Error::Config(
                    "store.optimistic_concurrency requires a versioned backend (sqlite)".to_string(),
                ));
            }
            StoreTarget::Sheets {
                spreadsheet_id: spreadsheet_id.clone(),
                worksheet: worksheet.clone(),
                access_token: require_secret(
                    SHEETS_TOKEN_ENV_VAR,
                    "store.access_token",
                    access_token.as_deref(),
                )?,
            }
        }
    };

    Ok(StoreSettings {
        target,
        options: StoreOptions {
            persist_order_number: toml.store.persist_order_number,
            optimistic_concurrency: toml.store.optimistic_concurrency,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn resolve(toml: &str) -> Result<ServiceConfig> {
        ServiceConfig::resolve(&TomlConfig::from_toml_str(toml)?)
    }

    #[test]
    #[serial]
    fn test_defaults() {
        std::env::remove_var(ADMIN_PASSWORD_ENV_VAR);
        std::env::remove_var(GEMINI_API_KEY_ENV_VAR);

        let config = resolve("").unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:5740");
        assert!(config.admin_password.is_none());
        assert!(config.extractor.api_key.is_none());
        assert_eq!(config.ingest.pacing, Duration::from_millis(4000));
        assert_eq!(config.ingest.max_image_dim, 1600);
        assert_eq!(config.session.idle_timeout, Duration::from_secs(1800));
        assert!(matches!(config.store.target, StoreTarget::Sqlite { .. }));
        assert!(!config.store.options.optimistic_concurrency);
    }

    #[test]
    #[serial]
    fn test_admin_password_env_overrides_toml() {
        std::env::set_var(ADMIN_PASSWORD_ENV_VAR, "from-env");
        let config = resolve("admin_password = \"from-toml\"").unwrap();
        std::env::remove_var(ADMIN_PASSWORD_ENV_VAR);

        assert_eq!(config.admin_password.as_deref(), Some("from-env"));
    }

    #[test]
    #[serial]
    fn test_sheets_backend_requires_token() {
        std::env::remove_var(SHEETS_TOKEN_ENV_VAR);
        let toml = r#"
            [store]
            backend = "sheets"
            spreadsheet_id = "abc"
        "#;
        assert!(matches!(resolve(toml), Err(Error::Config(_))));

        std::env::set_var(SHEETS_TOKEN_ENV_VAR, "ya29.token");
        let config = resolve(toml).unwrap();
        std::env::remove_var(SHEETS_TOKEN_ENV_VAR);

        match config.store.target {
            StoreTarget::Sheets {
                spreadsheet_id,
                worksheet,
                access_token,
            } => {
                assert_eq!(spreadsheet_id, "abc");
                assert_eq!(worksheet, "Sheet1");
                assert_eq!(access_token, "ya29.token");
            }
            other => panic!("expected sheets target, got {:?}", other),
        }
    }

    #[test]
    fn test_sheets_with_optimistic_concurrency_rejected() {
        let toml = r#"
            [store]
            backend = "sheets"
            spreadsheet_id = "abc"
            access_token = "t"
            optimistic_concurrency = true
        "#;
        assert!(matches!(resolve(toml), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_keypad_digits_rejected() {
        let toml = "[session]\nkeypad_max_digits = 0\n";
        assert!(matches!(resolve(toml), Err(Error::Config(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = resolve("[extractor]\nbase_url = \"http://localhost:9000/v1beta/\"\n").unwrap();
        assert_eq!(config.extractor.base_url, "http://localhost:9000/v1beta");
    }
}

//! Layered application configuration.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. `{config_dir}/default.toml`
//! 3. `{config_dir}/{RUN_ENV}.toml` (`RUN_ENV` defaults to `development`)
//! 4. `STOCKLEDGER__*` environment variables, `__` separating sections
//!    (`STOCKLEDGER__SERVER__PORT=9000`, `STOCKLEDGER__STORAGE__BACKEND=postgres`)
//!
//! `config_dir` is `STOCKLEDGER_CONFIG_DIR`, or `config` relative to the
//! working directory. Missing files are skipped.

use std::env;
use std::net::SocketAddr;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use stockledger_infra::WorkflowConfig;
use stockledger_observability::LoggingConfig;

const ENV_PREFIX: &str = "STOCKLEDGER";
const DEFAULT_CONFIG_DIR: &str = "config";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local event store; everything is lost on exit.
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(default)]
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl AppConfig {
    /// Load from files and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "development".to_string());
        let dir = env::var("STOCKLEDGER_CONFIG_DIR").unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());

        let builder = defaults()?
            .add_source(File::with_name(&format!("{dir}/default")).required(false))
            .add_source(File::with_name(&format!("{dir}/{run_env}")).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        let config = finish(builder)?;
        tracing::debug!(run_env = %run_env, backend = ?config.storage.backend, "configuration loaded");
        Ok(config)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server address: {e}")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Postgres
            && self.storage.database_url.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "storage.database_url is required for the postgres backend".to_string(),
            ));
        }
        if self.storage.max_connections == 0 {
            return Err(ConfigError::Invalid("storage.max_connections must be positive".to_string()));
        }
        if self.workflow.payment_no_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "workflow.payment_no_max_attempts must be positive".to_string(),
            ));
        }
        self.listen_addr().map(|_| ())
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let workflow = WorkflowConfig::default();
    let logging = LoggingConfig::default();
    Ok(Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("storage.backend", "memory")?
        .set_default("storage.max_connections", 10)?
        .set_default("workflow.max_retries", i64::from(workflow.max_retries))?
        .set_default("workflow.payment_no_max_attempts", i64::from(workflow.payment_no_max_attempts))?
        .set_default("workflow.min_reason_length", workflow.min_reason_length as i64)?
        .set_default("logging.level", logging.level)?
        .set_default("logging.format", "json")?)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = builder.build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_observability::LogFormat;

    #[test]
    fn defaults_describe_an_in_memory_server() {
        let config = finish(defaults().unwrap()).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.listen_addr().unwrap().port(), 8080);
        assert_eq!(config.workflow.max_retries, 3);
        assert_eq!(config.workflow.min_reason_length, 3);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn overrides_replace_defaults() {
        let builder = defaults()
            .unwrap()
            .set_override("server.port", 9100)
            .unwrap()
            .set_override("workflow.max_retries", 7)
            .unwrap()
            .set_override("logging.format", "pretty")
            .unwrap();
        let config = finish(builder).unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.workflow.max_retries, 7);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn postgres_without_a_database_url_is_rejected() {
        let builder = defaults().unwrap().set_override("storage.backend", "postgres").unwrap();

        let err = finish(builder).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("database_url")));
    }

    #[test]
    fn unknown_backend_fails_to_deserialize() {
        let builder = defaults().unwrap().set_override("storage.backend", "sqlite").unwrap();

        assert!(matches!(finish(builder), Err(ConfigError::Source(_))));
    }
}

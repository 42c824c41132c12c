use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use folio_db::ConnectOptions;
use serde::Deserialize;

const DEFAULT_ENV: &str = "development";
const ENV_VAR_NAME: &str = "FOLIO_ENV";
const CONFIG_DIR_ENV: &str = "FOLIO_CONFIG_DIR";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected development/production",
                other
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// Plain variables honoured on top of the layered configuration, matching
/// the names deployment tooling already sets.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_uri: Option<String>,
    pub port: Option<String>,
    pub api_prefix: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            database_uri: std::env::var("DATABASE_URI").ok(),
            port: std::env::var("PORT").ok(),
            api_prefix: std::env::var("API_PREFIX").ok(),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// `FOLIO__*` variables and the plain overrides.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment, Overrides::from_env())
    }

    /// Build settings from an explicit config directory and environment name.
    pub fn load_from(
        config_dir: &Path,
        environment: &str,
        overrides: Overrides,
    ) -> anyhow::Result<Self> {
        let parsed_environment = Environment::parse(environment)?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(config::Environment::with_prefix("FOLIO").prefix_separator("__").separator("__"))
            .set_override_option("database.uri", overrides.database_uri)
            .context("invalid DATABASE_URI override")?
            .set_override_option("server.port", overrides.port)
            .context("invalid PORT override")?
            .set_override_option("server.api_prefix", overrides.api_prefix)
            .context("invalid API_PREFIX override")?;

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = parsed_environment;
        settings.server.api_prefix = settings.server.api_prefix.trim_matches('/').to_string();

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    /// Path segment every route is mounted under, without slashes.
    #[serde(default = "ServerSettings::default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        1234
    }

    fn default_api_prefix() -> String {
        "api".to_string()
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            api_prefix: Self::default_api_prefix(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_uri")]
    pub uri: String,
    #[serde(default = "DatabaseSettings::default_namespace")]
    pub namespace: String,
    #[serde(default = "DatabaseSettings::default_database")]
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl DatabaseSettings {
    fn default_uri() -> String {
        "mem://".to_string()
    }

    fn default_namespace() -> String {
        "folio".to_string()
    }

    fn default_database() -> String {
        "library".to_string()
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            uri: self.uri.clone(),
            namespace: self.namespace.clone(),
            database: self.database.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: Self::default_uri(),
            namespace: Self::default_namespace(),
            database: Self::default_database(),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// Fallback filter directive when `RUST_LOG` is unset.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("folio-settings-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn default_environment_is_development() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Development);
        assert_eq!(settings.server.port, 1234);
        assert_eq!(settings.server.api_prefix, "api");
    }

    #[test]
    fn default_database_is_in_memory() {
        let settings = Settings::default();
        let options = settings.database.connect_options();
        assert_eq!(options.uri, "mem://");
        assert_eq!(options.namespace, "folio");
        assert!(options.username.is_none());
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let dir = scratch_dir("unknown");
        let err = Settings::load_from(&dir, "staging", Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("staging"));
    }

    #[test]
    fn environment_file_layers_over_base() {
        let dir = scratch_dir("layers");
        std::fs::write(
            dir.join("base.toml"),
            "[server]\nport = 4000\napi_prefix = \"v1\"\n\n[database]\nnamespace = \"shelf\"\n",
        )
        .unwrap();
        std::fs::write(dir.join("production.toml"), "[server]\nport = 5000\n").unwrap();

        let settings = Settings::load_from(&dir, "production", Overrides::default()).unwrap();
        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.server.api_prefix, "v1");
        assert_eq!(settings.database.namespace, "shelf");
    }

    #[test]
    fn plain_overrides_win() {
        let dir = scratch_dir("overrides");
        std::fs::write(dir.join("base.toml"), "[server]\nport = 4000\n").unwrap();

        let overrides = Overrides {
            database_uri: Some("ws://db:8000".to_string()),
            port: Some("9090".to_string()),
            api_prefix: Some("/library/".to_string()),
        };
        let settings = Settings::load_from(&dir, "development", overrides).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.api_prefix, "library");
        assert_eq!(settings.database.uri, "ws://db:8000");
    }
}

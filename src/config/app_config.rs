use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs, io};

use reqwest::Client;
use thiserror::Error;
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use tracing::info;

use super::model::{Config, ProbeSettings};

const DEFAULT_CONFIG_FILE: &str = "config.yml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid YAML in {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Load the application configuration from a YAML file and environment variables.
/// The file is named by `CONFIG_FILE` and defaults to `config.yml`; a missing
/// default file means built-in defaults. `INPUT_CSV`, `INPUT_COLUMN`,
/// `OUTPUT_DIR` and `REGISTRY_URL` override the matching keys.
pub fn load_config() -> Result<Config, ConfigError> {
    let explicit = env::var("CONFIG_FILE").ok();
    let path = explicit
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    let mut config = match fs::read_to_string(&path) {
        Ok(contents) => serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?,
        Err(e) if explicit.is_none() && e.kind() == io::ErrorKind::NotFound => {
            info!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
            Config::default()
        }
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    apply_overrides(&mut config, |key| env::var(key).ok())?;
    validate(&config)?;

    info!(
        input = %config.input.path.display(),
        column = config.input.column,
        registry = %config.registry.base_url,
        "configuration loaded"
    );
    Ok(config)
}

/// Applies environment overrides read through `lookup`.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup("INPUT_CSV") {
        config.input.path = PathBuf::from(path);
    }
    if let Some(column) = lookup("INPUT_COLUMN") {
        config.input.column = column
            .trim()
            .parse()
            .map_err(|_| invalid("INPUT_COLUMN", format!("'{column}' is not a column index")))?;
    }
    if let Some(directory) = lookup("OUTPUT_DIR") {
        config.output.directory = PathBuf::from(directory);
    }
    if let Some(url) = lookup("REGISTRY_URL") {
        config.registry.base_url = url;
    }
    Ok(())
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.probe.max_attempts == 0 {
        return Err(invalid("probe.max_attempts", "must be at least 1"));
    }
    if config.probe.concurrency == 0 {
        return Err(invalid("probe.concurrency", "must be at least 1"));
    }
    Ok(())
}

/// Setup a TLS connector that accepts any certificate chain and host name.
/// Validity is judged from the certificate dates alone.
pub fn setup_tls_connector() -> Result<TokioTlsConnector, native_tls::Error> {
    let mut builder = native_tls::TlsConnector::builder();
    builder.danger_accept_invalid_certs(true);
    builder.danger_accept_invalid_hostnames(true);
    let connector = builder.build()?;
    Ok(TokioTlsConnector::from(connector))
}

/// Setup the HTTP client used for latency probes and page fetches.
pub fn setup_http_client(settings: &ProbeSettings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .user_agent(settings.user_agent.as_str())
        .build()
}

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// The siteprobe configuration file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub probe: ProbeSettings,
    pub registry: RegistrySettings,
}

/// Where the list of targets comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputConfig {
    /// CSV file without a header row.
    #[serde(default = "default_input_path")]
    pub path: PathBuf,

    /// Zero-based column holding the targets.
    #[serde(default)]
    pub column: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: default_input_path(),
            column: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutputConfig {
    /// Directory that receives the timestamped result file.
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

/// Request, retry and TLS settings shared by every target.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProbeSettings {
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts per request, the first one included. Only timeouts are retried.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub tls_timeout_secs: u64,

    /// Targets probed at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            tls_timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

/// The end-of-life registry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegistrySettings {
    #[serde(default = "default_registry_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Keep each product table for the whole run instead of fetching it per
    /// lookup.
    #[serde(default)]
    pub cache: bool,

    /// Server names as they appear in headers, mapped to registry product
    /// names. Replaces the built-in table when given.
    #[serde(default = "default_aliases")]
    pub aliases: HashMap<String, String>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            base_url: default_registry_url(),
            timeout_secs: default_timeout_secs(),
            cache: false,
            aliases: default_aliases(),
        }
    }
}

fn default_input_path() -> PathBuf {
    PathBuf::from("sites.csv")
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> usize {
    5
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_concurrency() -> usize {
    1
}

fn default_user_agent() -> String {
    "siteprobe/1.0".to_string()
}

fn default_registry_url() -> String {
    crate::registry::client::DEFAULT_BASE_URL.to_string()
}

fn default_aliases() -> HashMap<String, String> {
    HashMap::from([
        ("apache".to_string(), "apache-http-server".to_string()),
        ("microsoft-iis".to_string(), "iis".to_string()),
    ])
}

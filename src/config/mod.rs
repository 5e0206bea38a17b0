pub mod app_config;
pub mod model;

pub use app_config::{ConfigError, load_config, setup_http_client, setup_tls_connector};
pub use model::Config;

use thiserror::Error;

/// Errors raised while probing a single target.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The request did not produce a response within the request timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Any other HTTP transport failure (DNS, refused connection, body read).
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// The leaf certificate's not-after date lies in the past.
    #[error("certificate for {host} is expired")]
    CertificateExpired { host: String },

    #[error("TLS check for {host} failed: {reason}")]
    Certificate { host: String, reason: String },

    #[error("version registry lookup for '{product}' failed: {reason}")]
    Registry { product: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl ProbeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout { .. })
    }

    /// Maps a reqwest failure onto the timeout/transport split.
    pub fn from_request(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ProbeError::Timeout {
                url: url.to_string(),
            }
        } else {
            ProbeError::Transport {
                url: url.to_string(),
                source,
            }
        }
    }

    pub(crate) fn certificate(host: &str, reason: impl ToString) -> Self {
        ProbeError::Certificate {
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;

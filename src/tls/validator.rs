use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;
use x509_parser::parse_x509_certificate;

use crate::error::{ProbeError, Result};
use crate::http_probe::probe::with_default_scheme;
use crate::orchestrator::CertificateCheck;

const HTTPS_PORT: u16 = 443;

/// Where the current time falls relative to a certificate's validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateWindow {
    Valid,
    /// Not yet valid, or exactly on one of the bounds.
    Invalid,
    Expired,
}

/// Valid only strictly inside `(not_before, not_after)`.
pub fn assess_validity(
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    now: DateTime<Utc>,
) -> CertificateWindow {
    if now > not_after {
        CertificateWindow::Expired
    } else if now > not_before && now < not_after {
        CertificateWindow::Valid
    } else {
        CertificateWindow::Invalid
    }
}

/// Checks the leaf certificate's dates over a raw TLS connection.
///
/// The connector is expected to accept any chain and hostname; only the
/// validity window is judged here.
#[derive(Clone)]
pub struct TlsValidator {
    connector: TokioTlsConnector,
    timeout: Duration,
    port: u16,
    cancel: CancellationToken,
}

impl TlsValidator {
    pub fn new(connector: TokioTlsConnector, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            connector,
            timeout,
            port: HTTPS_PORT,
            cancel,
        }
    }

    /// Connects to `port` instead of 443.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `Ok(true)` for a currently valid leaf certificate, `Ok(false)` for one
    /// that is not yet valid, and `CertificateExpired` for an expired one.
    #[instrument(skip(self))]
    pub async fn validate(&self, target: &str) -> Result<bool> {
        let host = tls_host(target)?;

        let stream = self
            .bounded(&host, "TCP connect", TcpStream::connect((host.as_str(), self.port)))
            .await?;
        let tls_stream = self
            .bounded(&host, "TLS handshake", self.connector.connect(&host, stream))
            .await?;

        // Extract certificate in blocking context
        let cert_der = tokio::task::spawn_blocking(
            move || -> std::result::Result<Option<Vec<u8>>, native_tls::Error> {
                let cert = tls_stream.get_ref().peer_certificate()?;
                cert.map(|c| c.to_der()).transpose()
            },
        )
        .await
        .map_err(|e| ProbeError::certificate(&host, e))?
        .map_err(|e| ProbeError::certificate(&host, e))?
        .ok_or_else(|| ProbeError::certificate(&host, "no peer certificate presented"))?;

        let (_, parsed) =
            parse_x509_certificate(&cert_der).map_err(|e| ProbeError::certificate(&host, e))?;
        let validity = parsed.validity();
        let not_before = to_utc(&host, validity.not_before.timestamp())?;
        let not_after = to_utc(&host, validity.not_after.timestamp())?;

        debug!(%host, %not_before, %not_after, "leaf certificate parsed");

        match assess_validity(not_before, not_after, Utc::now()) {
            CertificateWindow::Valid => Ok(true),
            CertificateWindow::Invalid => Ok(false),
            CertificateWindow::Expired => Err(ProbeError::CertificateExpired { host }),
        }
    }

    /// Applies the timeout and the cancellation token to one network step.
    async fn bounded<T, E, F>(&self, host: &str, step: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ProbeError::Cancelled),
            res = tokio::time::timeout(self.timeout, fut) => match res {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(ProbeError::certificate(host, format!("{step} failed: {e}"))),
                Err(_) => Err(ProbeError::certificate(host, format!("{step} timed out"))),
            },
        }
    }
}

#[async_trait]
impl CertificateCheck for TlsValidator {
    async fn validate(&self, target: &str) -> Result<bool> {
        TlsValidator::validate(self, target).await
    }
}

/// Host part of a target, defaulting the scheme to https.
fn tls_host(target: &str) -> Result<String> {
    let url = Url::parse(&with_default_scheme(target, "https")).map_err(|e| {
        ProbeError::InvalidTarget {
            target: target.to_string(),
            reason: e.to_string(),
        }
    })?;

    url.host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
        .ok_or_else(|| ProbeError::InvalidTarget {
            target: target.to_string(),
            reason: "no host".to_string(),
        })
}

fn to_utc(host: &str, timestamp: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| ProbeError::certificate(host, "certificate date out of range"))
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use super::prelude::*;
use crate::orchestrator::SiteFetcher;

/// Prefixes `default_scheme` unless the target already names http or https.
pub fn with_default_scheme(target: &str, default_scheme: &str) -> String {
    let target = target.trim();
    let lower = target.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        target.to_string()
    } else {
        format!("{default_scheme}://{target}")
    }
}

/// Normalizes a target for fetching. Bare hosts default to plain http.
pub fn normalize_http_url(target: &str) -> Result<Url> {
    let candidate = with_default_scheme(target, "http");
    Url::parse(&candidate).map_err(|e| ProbeError::InvalidTarget {
        target: target.to_string(),
        reason: e.to_string(),
    })
}

/// Issues timed GET requests, retrying the ones that time out.
#[derive(Clone)]
pub struct LatencyProber {
    client: reqwest::Client,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
}

impl LatencyProber {
    /// `client` carries the request timeout.
    pub fn new(client: reqwest::Client, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            client,
            policy,
            sleeper: Arc::new(TokioSleeper),
            cancel,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Fetches `target` once, retrying on timeout per the policy.
    #[instrument(skip(self))]
    pub async fn probe(&self, target: &str) -> Result<TimedResponse> {
        let url = normalize_http_url(target)?;
        self.policy
            .run(
                url.as_str(),
                self.sleeper.as_ref(),
                &self.cancel,
                ProbeError::is_timeout,
                || self.fetch_once(&url),
            )
            .await
    }

    async fn fetch_once(&self, url: &Url) -> Result<TimedResponse> {
        let start = Instant::now();
        // reqwest resolves `send` once the response head has been read.
        let sent = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ProbeError::Cancelled),
            sent = self.client.get(url.clone()).send() => sent,
        };
        let ttfb = start.elapsed();

        let response = sent.map_err(|e| ProbeError::from_request(url.as_str(), e))?;
        debug!(
            url = %url,
            status = response.status().as_u16(),
            ttfb_ms = ttfb.as_secs_f64() * 1000.0,
            "response head received"
        );

        Ok(TimedResponse { response, ttfb })
    }
}

#[async_trait]
impl SiteFetcher for LatencyProber {
    async fn measure(&self, target: &str) -> Result<Duration> {
        Ok(self.probe(target).await?.ttfb)
    }

    async fn fetch_page(&self, target: &str) -> Result<FetchedPage> {
        let timed = self.probe(target).await?;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ProbeError::Cancelled),
            page = timed.into_page() => page,
        }
    }
}

//! Per-target probing pipeline: latency samples, metadata fetch, TLS check
//! and support classification, folded into one record per target.

pub mod result;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use unicode_truncate::{Alignment, UnicodeTruncateStr};

use crate::classify::Classifier;
use crate::error::{ProbeError, Result};
use crate::http_probe::prelude::FetchedPage;
use crate::http_probe::report;
use crate::metadata::{extract, extract_wordpress_version};

pub use result::{LATENCY_SAMPLES, LatencySamples, ProbeResult, SslValidity, millis};

/// Timed fetches of a target.
#[async_trait]
pub trait SiteFetcher: Send + Sync {
    /// Time-to-first-byte of one fetch.
    async fn measure(&self, target: &str) -> Result<Duration>;

    /// One fetch including headers and body.
    async fn fetch_page(&self, target: &str) -> Result<FetchedPage>;
}

#[async_trait]
pub trait CertificateCheck: Send + Sync {
    async fn validate(&self, target: &str) -> Result<bool>;
}

/// Last stage a target completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStage {
    NotStarted,
    LatencyMeasured,
    MetadataFetched,
    SslChecked,
    Classified,
    Done,
}

impl fmt::Display for ProbeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeStage::NotStarted => "not-started",
            ProbeStage::LatencyMeasured => "latency-measured",
            ProbeStage::MetadataFetched => "metadata-fetched",
            ProbeStage::SslChecked => "ssl-checked",
            ProbeStage::Classified => "classified",
            ProbeStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A target that was aborted. No record is emitted for it.
#[derive(Error, Debug)]
#[error("probe of {target} aborted after stage {stage}")]
pub struct TargetFailure {
    pub target: String,
    pub stage: ProbeStage,
    #[source]
    pub source: ProbeError,
}

/// Columns `input` occupies on a terminal, in the measure `to_fixed_width` pads by.
fn display_width(input: &str) -> usize {
    input.unicode_truncate(usize::MAX).1
}

fn to_fixed_width(input: &str, width: usize) -> String {
    input.unicode_pad(width, Alignment::Left, true).into_owned()
}

pub struct ProbeOrchestrator {
    fetcher: Arc<dyn SiteFetcher>,
    tls: Arc<dyn CertificateCheck>,
    classifier: Classifier,
    concurrency: usize,
    cancel: CancellationToken,
}

impl ProbeOrchestrator {
    pub fn new(
        fetcher: Arc<dyn SiteFetcher>,
        tls: Arc<dyn CertificateCheck>,
        classifier: Classifier,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            tls,
            classifier,
            concurrency: 1,
            cancel,
        }
    }

    /// Number of targets probed at once. Output order follows input order
    /// regardless.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Probes every target and returns the records of those that completed,
    /// in input order. Failed targets are logged and left out.
    pub async fn probe_all(&self, targets: &[String]) -> Vec<ProbeResult> {
        let width = targets
            .iter()
            .map(|t| display_width(t))
            .max()
            .unwrap_or(10);

        let results: Vec<ProbeResult> = stream::iter(targets)
            .map(|target| self.probe_target(target, width))
            .buffered(self.concurrency)
            .filter_map(|outcome| async move {
                match outcome {
                    Ok(result) => Some(result),
                    Err(failure) if matches!(failure.source, ProbeError::Cancelled) => {
                        debug!(site = %failure.target, "skipped after cancellation");
                        None
                    }
                    Err(failure) => {
                        warn!(
                            site = %failure.target,
                            stage = %failure.stage,
                            "Error fetching site info: {}",
                            report(&failure)
                        );
                        None
                    }
                }
            })
            .collect()
            .await;

        if self.cancel.is_cancelled() {
            warn!(
                completed = results.len(),
                total = targets.len(),
                "probing cancelled, remaining targets skipped"
            );
        }
        results
    }

    /// Runs the pipeline for one target. `width` aligns the target in log
    /// lines.
    pub async fn probe_target(
        &self,
        target: &str,
        width: usize,
    ) -> std::result::Result<ProbeResult, TargetFailure> {
        let fail = |stage: ProbeStage, source: ProbeError| TargetFailure {
            target: target.to_string(),
            stage,
            source,
        };

        if self.cancel.is_cancelled() {
            return Err(fail(ProbeStage::NotStarted, ProbeError::Cancelled));
        }

        let mut raw = [Duration::ZERO; LATENCY_SAMPLES];
        for sample in raw.iter_mut() {
            *sample = self
                .fetcher
                .measure(target)
                .await
                .map_err(|e| fail(ProbeStage::NotStarted, e))?;
        }
        let latency = LatencySamples::from_raw(raw);
        let [longest, middle, shortest] = *latency.samples();
        info!(
            "[{}] TTFB1: {:.3}ms, TTFB2: {:.3}ms, TTFB3: {:.3}ms, Average TTFB: {:.3}ms",
            to_fixed_width(target, width),
            millis(longest),
            millis(middle),
            millis(shortest),
            millis(latency.average())
        );
        self.advance(target, ProbeStage::LatencyMeasured);

        let page = self
            .fetcher
            .fetch_page(target)
            .await
            .map_err(|e| fail(ProbeStage::LatencyMeasured, e))?;
        let metadata = extract(&page.headers);
        let wordpress_version = extract_wordpress_version(&page.body);
        self.advance(target, ProbeStage::MetadataFetched);

        let ssl_valid = match self.tls.validate(target).await {
            Ok(valid) => SslValidity::from(valid),
            Err(ProbeError::CertificateExpired { host }) => {
                info!(site = target, %host, "certificate expired, emitting expiry-only record");
                self.advance(target, ProbeStage::Done);
                return Ok(ProbeResult::expired(target));
            }
            Err(e) => return Err(fail(ProbeStage::MetadataFetched, e)),
        };
        self.advance(target, ProbeStage::SslChecked);

        let support = self
            .classifier
            .classify_site(&metadata, wordpress_version.as_deref())
            .await;
        if self.cancel.is_cancelled() {
            return Err(fail(ProbeStage::SslChecked, ProbeError::Cancelled));
        }
        self.advance(target, ProbeStage::Classified);

        let result = ProbeResult {
            target: target.to_string(),
            metadata,
            wordpress_version,
            ssl_valid,
            latency: Some(latency),
            support: Some(support),
        };
        self.advance(target, ProbeStage::Done);
        Ok(result)
    }

    fn advance(&self, target: &str, stage: ProbeStage) {
        debug!(site = target, %stage, "stage reached");
    }
}

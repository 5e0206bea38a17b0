use std::fmt;
use std::time::Duration;

use crate::classify::SupportReport;
use crate::metadata::SiteMetadata;

pub const LATENCY_SAMPLES: usize = 3;

/// Fractional milliseconds, as latencies are reported.
pub fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Three time-to-first-byte samples, longest first, and their mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySamples {
    samples: [Duration; LATENCY_SAMPLES],
    average: Duration,
}

impl LatencySamples {
    /// The mean is taken over the samples in measurement order, before they
    /// are sorted.
    pub fn from_raw(raw: [Duration; LATENCY_SAMPLES]) -> Self {
        let total: Duration = raw.iter().sum();
        let average = total / LATENCY_SAMPLES as u32;

        let mut samples = raw;
        samples.sort_by(|a, b| b.cmp(a));

        Self { samples, average }
    }

    pub fn samples(&self) -> &[Duration; LATENCY_SAMPLES] {
        &self.samples
    }

    pub fn average(&self) -> Duration {
        self.average
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslValidity {
    Valid,
    Invalid,
    Expired,
    #[default]
    Unknown,
}

impl From<bool> for SslValidity {
    fn from(valid: bool) -> Self {
        if valid {
            SslValidity::Valid
        } else {
            SslValidity::Invalid
        }
    }
}

impl fmt::Display for SslValidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SslValidity::Valid => "true",
            SslValidity::Invalid => "false",
            SslValidity::Expired => "Expired",
            SslValidity::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Everything learned about one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    /// The target exactly as it was supplied.
    pub target: String,
    pub metadata: SiteMetadata,
    pub wordpress_version: Option<String>,
    pub ssl_valid: SslValidity,
    pub latency: Option<LatencySamples>,
    pub support: Option<SupportReport>,
}

impl ProbeResult {
    /// The record emitted for a target whose certificate has expired. It
    /// carries nothing but the target and the expiry.
    pub fn expired(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ssl_valid: SslValidity::Expired,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_samples_sorted_longest_first() {
        let latency = LatencySamples::from_raw([ms(120), ms(300), ms(200)]);
        assert_eq!(latency.samples(), &[ms(300), ms(200), ms(120)]);
    }

    #[test]
    fn test_average_ignores_sort_order() {
        let a = LatencySamples::from_raw([ms(10), ms(20), ms(60)]);
        let b = LatencySamples::from_raw([ms(60), ms(10), ms(20)]);
        assert_eq!(a.average(), ms(30));
        assert_eq!(a, b);
    }

    #[test]
    fn test_average_truncates_to_nanoseconds() {
        let latency = LatencySamples::from_raw([ms(100), ms(100), ms(101)]);
        assert_eq!(latency.average(), Duration::from_nanos(100_333_333));
    }

    #[test]
    fn test_ssl_labels() {
        assert_eq!(SslValidity::from(true).to_string(), "true");
        assert_eq!(SslValidity::from(false).to_string(), "false");
        assert_eq!(SslValidity::Expired.to_string(), "Expired");
        assert_eq!(SslValidity::default().to_string(), "Unknown");
    }

    #[test]
    fn test_expired_record_is_otherwise_empty() {
        let result = ProbeResult::expired("example.com");
        assert_eq!(result.target, "example.com");
        assert_eq!(result.ssl_valid, SslValidity::Expired);
        assert_eq!(result.metadata, SiteMetadata::default());
        assert_eq!(result.wordpress_version, None);
        assert_eq!(result.latency, None);
        assert_eq!(result.support, None);
    }
}

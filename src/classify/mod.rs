//! Support-status classification of detected software versions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::http_probe::report;
use crate::metadata::SiteMetadata;
use crate::registry::{EolMarker, VersionRecord, VersionRegistry};

pub const PHP: &str = "php";
pub const MYSQL: &str = "mysql";
pub const WORDPRESS: &str = "wordpress";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SupportStatus {
    Supported,
    Outdated,
    #[default]
    Unknown,
}

impl fmt::Display for SupportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SupportStatus::Supported => "Supported",
            SupportStatus::Outdated => "Outdated",
            SupportStatus::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Status of every product tracked for a site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupportReport {
    pub php: SupportStatus,
    pub mysql: SupportStatus,
    pub web_server: SupportStatus,
    pub wordpress: SupportStatus,
}

/// Supported when any cycle that prefixes `version` is still live: its
/// end-of-life is `false` or a date whose midnight (UTC) lies after `now`.
pub fn is_supported(version: &str, records: &[VersionRecord], now: DateTime<Utc>) -> bool {
    records.iter().any(|r| {
        !r.cycle.is_empty() && version.starts_with(r.cycle.as_str()) && is_live(r.eol, now)
    })
}

fn is_live(eol: EolMarker, now: DateTime<Utc>) -> bool {
    match eol {
        EolMarker::Flag(expired) => !expired,
        EolMarker::Date(date) => date.and_time(NaiveTime::MIN).and_utc() > now,
    }
}

pub struct Classifier {
    registry: Arc<dyn VersionRegistry>,
    aliases: HashMap<String, String>,
    cancel: CancellationToken,
}

impl Classifier {
    pub fn new(registry: Arc<dyn VersionRegistry>, cancel: CancellationToken) -> Self {
        Self {
            registry,
            aliases: HashMap::new(),
            cancel,
        }
    }

    /// Maps lower-cased product names onto registry slugs.
    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = aliases
            .into_iter()
            .map(|(name, slug)| (name.to_lowercase(), slug))
            .collect();
        self
    }

    pub fn slug(&self, product: &str) -> String {
        let name = product.trim().to_lowercase();
        self.aliases.get(&name).cloned().unwrap_or(name)
    }

    /// Unknown when there is no version to judge or the registry cannot be
    /// reached; never Outdated for lack of data.
    pub async fn classify(&self, product: &str, version: &str) -> SupportStatus {
        if version.is_empty() {
            return SupportStatus::Unknown;
        }

        let slug = self.slug(product);
        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return SupportStatus::Unknown,
            fetched = self.registry.fetch(&slug) => fetched,
        };

        match fetched {
            Ok(records) => {
                let status = if is_supported(version, &records, Utc::now()) {
                    SupportStatus::Supported
                } else {
                    SupportStatus::Outdated
                };
                debug!(product = %slug, version, %status, "classified");
                status
            }
            Err(e) => {
                warn!(product = %slug, version, error = %report(&e), "support status unknown");
                SupportStatus::Unknown
            }
        }
    }

    /// Classifies PHP, MySQL, WordPress and the web server independently.
    /// The web server is only looked up when both its name and version are
    /// known.
    pub async fn classify_site(
        &self,
        meta: &SiteMetadata,
        wordpress_version: Option<&str>,
    ) -> SupportReport {
        let web_server = async {
            match (&meta.web_server, &meta.web_server_version) {
                (Some(name), Some(version)) => self.classify(name, version).await,
                _ => SupportStatus::Unknown,
            }
        };

        let (php, mysql, wordpress, web_server) = tokio::join!(
            self.classify(PHP, meta.php_version.as_deref().unwrap_or_default()),
            self.classify(MYSQL, meta.mysql_version.as_deref().unwrap_or_default()),
            self.classify(WORDPRESS, wordpress_version.unwrap_or_default()),
            web_server,
        );

        SupportReport {
            php,
            mysql,
            web_server,
            wordpress,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{ProbeError, Result};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    /// Serves fixed tables and records which slugs were requested.
    #[derive(Default)]
    pub(crate) struct StaticRegistry {
        pub tables: HashMap<String, Vec<VersionRecord>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl StaticRegistry {
        pub fn with(mut self, product: &str, records: Vec<VersionRecord>) -> Self {
            self.tables.insert(product.to_string(), records);
            self
        }
    }

    #[async_trait]
    impl VersionRegistry for StaticRegistry {
        async fn fetch(&self, product: &str) -> Result<Vec<VersionRecord>> {
            self.requests.lock().unwrap().push(product.to_string());
            self.tables
                .get(product)
                .cloned()
                .ok_or_else(|| ProbeError::Registry {
                    product: product.to_string(),
                    reason: "unavailable".to_string(),
                })
        }
    }

    fn date(y: i32, m: u32, d: u32) -> EolMarker {
        EolMarker::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_future_eol_is_supported() {
        let records = vec![VersionRecord::new("8.1", date(2099, 1, 1))];
        assert!(is_supported("8.1", &records, now()));
    }

    #[test]
    fn test_past_eol_is_outdated() {
        let records = vec![VersionRecord::new("8.1", date(2020, 1, 1))];
        assert!(!is_supported("8.1", &records, now()));
    }

    #[test]
    fn test_eol_false_never_expires() {
        let records = vec![VersionRecord::new("1.18", EolMarker::Flag(false))];
        assert!(is_supported("1.18.0", &records, now()));
    }

    #[test]
    fn test_eol_true_is_outdated() {
        let records = vec![VersionRecord::new("5.6", EolMarker::Flag(true))];
        assert!(!is_supported("5.6.40", &records, now()));
    }

    #[test]
    fn test_eol_on_the_same_day_is_outdated() {
        let records = vec![VersionRecord::new("7.4", date(2024, 6, 1))];
        assert!(!is_supported("7.4.33", &records, now()));
    }

    #[test]
    fn test_any_live_matching_cycle_is_supported() {
        let records = vec![
            VersionRecord::new("8", date(2020, 1, 1)),
            VersionRecord::new("8.1", EolMarker::Flag(false)),
        ];
        assert!(is_supported("8.1.2", &records, now()));
    }

    #[test]
    fn test_all_matching_cycles_expired_is_outdated() {
        let records = vec![
            VersionRecord::new("8", date(2020, 1, 1)),
            VersionRecord::new("8.1", EolMarker::Flag(true)),
            VersionRecord::new("9", EolMarker::Flag(false)),
        ];
        assert!(!is_supported("8.1.2", &records, now()));
    }

    #[test]
    fn test_no_matching_cycle_is_outdated() {
        let records = vec![VersionRecord::new("8.3", date(2099, 1, 1))];
        assert!(!is_supported("5.4.1", &records, now()));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(SupportStatus::Supported.to_string(), "Supported");
        assert_eq!(SupportStatus::Outdated.to_string(), "Outdated");
        assert_eq!(SupportStatus::default().to_string(), "Unknown");
    }

    fn classifier(registry: Arc<StaticRegistry>) -> Classifier {
        Classifier::new(registry, CancellationToken::new()).with_aliases(HashMap::from([(
            "Apache".to_string(),
            "apache-http-server".to_string(),
        )]))
    }

    #[tokio::test]
    async fn test_empty_version_is_unknown_without_lookup() {
        let registry = Arc::new(
            StaticRegistry::default()
                .with(PHP, vec![VersionRecord::new("8.1", EolMarker::Flag(false))]),
        );
        let classifier = classifier(registry.clone());

        assert_eq!(classifier.classify(PHP, "").await, SupportStatus::Unknown);
        assert!(registry.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_registry_failure_is_unknown() {
        let classifier = classifier(Arc::new(StaticRegistry::default()));
        assert_eq!(
            classifier.classify(PHP, "8.1.2").await,
            SupportStatus::Unknown
        );
    }

    #[tokio::test]
    async fn test_classify_uses_slugs() {
        let registry = Arc::new(
            StaticRegistry::default()
                .with(PHP, vec![VersionRecord::new("8.1", date(2099, 1, 1))])
                .with(
                    "apache-http-server",
                    vec![VersionRecord::new("2.2", date(2017, 7, 11))],
                ),
        );
        let classifier = classifier(registry.clone());

        assert_eq!(
            classifier.classify("PHP", "8.1.2").await,
            SupportStatus::Supported
        );
        assert_eq!(
            classifier.classify("Apache", "2.2.34").await,
            SupportStatus::Outdated
        );
        assert_eq!(
            *registry.requests.lock().unwrap(),
            vec!["php".to_string(), "apache-http-server".to_string()]
        );
    }

    #[tokio::test]
    async fn test_classify_site() {
        let registry = Arc::new(
            StaticRegistry::default()
                .with(PHP, vec![VersionRecord::new("7.4", date(2022, 11, 28))])
                .with(WORDPRESS, vec![VersionRecord::new("6.2", EolMarker::Flag(false))])
                .with("nginx", vec![VersionRecord::new("1.18", EolMarker::Flag(false))]),
        );
        let classifier = classifier(registry.clone());
        let meta = SiteMetadata {
            php_version: Some("7.4.33".to_string()),
            web_server: Some("nginx".to_string()),
            web_server_version: Some("1.18.0".to_string()),
            ..SiteMetadata::default()
        };

        let report = classifier.classify_site(&meta, Some("6.2.1")).await;

        assert_eq!(
            report,
            SupportReport {
                php: SupportStatus::Outdated,
                mysql: SupportStatus::Unknown,
                web_server: SupportStatus::Supported,
                wordpress: SupportStatus::Supported,
            }
        );
        assert!(!registry.requests.lock().unwrap().contains(&MYSQL.to_string()));
    }

    #[tokio::test]
    async fn test_server_without_version_is_not_looked_up() {
        let registry = Arc::new(StaticRegistry::default());
        let classifier = classifier(registry.clone());
        let meta = SiteMetadata {
            web_server: Some("cloudflare".to_string()),
            ..SiteMetadata::default()
        };

        let report = classifier.classify_site(&meta, None).await;

        assert_eq!(report, SupportReport::default());
        assert!(registry.requests.lock().unwrap().is_empty());
    }
}

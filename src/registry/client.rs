use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::{VersionRecord, VersionRegistry, parse_records};
use crate::error::{ProbeError, Result};

pub const DEFAULT_BASE_URL: &str = "https://endoflife.date/api";

/// HTTP client for the endoflife.date JSON API.
#[derive(Debug, Clone)]
pub struct EndOfLifeClient {
    client: Client,
    base_url: String,
}

impl EndOfLifeClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Builds a dedicated client bounded by `timeout`.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self::new(client, base_url))
    }

    fn product_url(&self, product: &str) -> String {
        format!("{}/{}.json", self.base_url, product)
    }
}

#[async_trait]
impl VersionRegistry for EndOfLifeClient {
    #[instrument(skip(self))]
    async fn fetch(&self, product: &str) -> Result<Vec<VersionRecord>> {
        let registry_error = |reason: String| ProbeError::Registry {
            product: product.to_string(),
            reason,
        };

        let response = self
            .client
            .get(self.product_url(product))
            .send()
            .await
            .map_err(|e| registry_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(registry_error(format!("unexpected status {status}")));
        }

        let entries: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| registry_error(e.to_string()))?;

        let records = parse_records(entries);
        debug!(product, cycles = records.len(), "registry table fetched");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EolMarker;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> EndOfLifeClient {
        EndOfLifeClient::with_timeout(
            format!("{}/api/", server.uri()),
            Duration::from_secs(5),
            "siteprobe-test",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_product_table() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/php.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"cycle": "8.3", "eol": "2027-12-31"},
                {"cycle": "7.4", "eol": "2022-11-28"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let records = client(&server).fetch("php").await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cycle, "8.3");
        assert!(matches!(records[1].eol, EolMarker::Date(_)));
    }

    #[tokio::test]
    async fn test_not_found_is_registry_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).fetch("nosuchproduct").await.unwrap_err();
        assert!(matches!(err, ProbeError::Registry { .. }));
    }

    #[tokio::test]
    async fn test_non_array_body_is_registry_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "nope"})))
            .mount(&server)
            .await;

        let err = client(&server).fetch("php").await.unwrap_err();
        assert!(matches!(err, ProbeError::Registry { .. }));
    }
}

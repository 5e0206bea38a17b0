use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::error::{ProbeError, Result};

/// A response whose head has arrived, with the time it took to get there.
#[derive(Debug)]
pub struct TimedResponse {
    pub response: reqwest::Response,
    pub ttfb: Duration,
}

impl TimedResponse {
    /// Downloads the body and keeps what the metadata extractor needs.
    pub async fn into_page(self) -> Result<FetchedPage> {
        let url = self.response.url().to_string();
        let headers = self.response.headers().clone();
        let body = self
            .response
            .text()
            .await
            .map_err(|e| ProbeError::from_request(&url, e))?;

        Ok(FetchedPage { headers, body })
    }
}

/// Headers and body of the metadata-bearing fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub headers: HeaderMap,
    pub body: String,
}

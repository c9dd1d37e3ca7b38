//! New Relic Metric API.

use std::time::Duration;

use http::{HeaderMap, HeaderValue, header::CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};

use crate::{core::batch::MetricBatch, error::Error, prelude::*};

pub const DEFAULT_URL: &str = "https://metric-api.newrelic.com/metric/v1";

pub struct Api {
    client: Client,
    url: Url,
}

impl Api {
    pub fn new(url: Url, api_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.append(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.append("Api-Key", HeaderValue::from_str(api_key)?);
        let client = Client::builder()
            .user_agent(concat!("pwmon/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .default_headers(headers)
            .build()?;
        Ok(Self { client, url })
    }

    /// Submit the batch once, without retrying.
    #[instrument(skip_all, fields(n_metrics = batch.metrics.len()))]
    pub async fn publish(&self, batch: &MetricBatch) -> Result {
        let body = batch.to_request_body().context("failed to serialize the batch")?;
        let response = self
            .client
            .post(self.url.clone())
            .body(body)
            .send()
            .await
            .map_err(|source| Error::Unreachable { service: "metric API", source })?;
        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Publish { status, body }.into());
        }
        info!(%status, "published");
        Ok(())
    }
}

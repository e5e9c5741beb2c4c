//! reqwest-backed metric endpoint client
//!
//! Issues instant queries against the Prometheus HTTP API and reload
//! requests against the server's `/-/reload` endpoint.

use crate::client::{MetricQuerier, Sample};
use crate::{CfError, CfResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the metric server (Prometheus/Thanos)
pub struct PromClient {
    http: reqwest::Client,
    base_url: String,
}

impl PromClient {
    pub fn new(base_url: impl Into<String>) -> CfResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
}

#[derive(Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Vec<VectorSample>,
}

#[derive(Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: HashMap<String, String>,
    /// `[ <unix time>, "<value>" ]`
    value: (f64, String),
}

#[async_trait]
impl MetricQuerier for PromClient {
    async fn query_vector(&self, query: &str) -> CfResult<Vec<Sample>> {
        debug!(query, "running instant query");
        let url = format!("{}/api/v1/query", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CfError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let response: QueryResponse = resp.json().await?;
        if response.status != "success" {
            return Err(CfError::decode(format!(
                "query status was {:?}",
                response.status
            )));
        }
        let data = response
            .data
            .ok_or_else(|| CfError::decode("query response carried no data"))?;
        if data.result_type != "vector" {
            return Err(CfError::decode(format!(
                "expected vector result, got {}",
                data.result_type
            )));
        }
        data.result
            .into_iter()
            .map(|sample| {
                let value = sample
                    .value
                    .1
                    .parse::<f64>()
                    .map_err(|e| CfError::decode(format!("sample value: {}", e)))?;
                Ok(Sample {
                    metric: sample.metric,
                    value,
                })
            })
            .collect()
    }

    async fn reload(&self) -> CfResult<u16> {
        let url = format!("{}/-/reload", self.base_url);
        let resp = self.http.post(&url).send().await?;
        Ok(resp.status().as_u16())
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! OpenTSDB HTTP client
//!
//! Covers the three read-side endpoints needed to walk an OpenTSDB
//! installation: metric name suggestion, series lookup and the downsampled
//! query API. Results are normalized into Prometheus-compatible names
//! before they are returned.

pub mod normalize;
pub mod types;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;

pub use types::{Meta, Metric, RetentionMeta};

use types::{LookupResponse, QuerySeries};

/// Default OpenTSDB address
pub const DEFAULT_ADDR: &str = "http://localhost:4242";

/// Default per-request timeout in seconds
///
/// Downsampled queries over long windows can be slow on a busy TSD.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// OpenTSDB client errors
#[derive(Debug, Error)]
pub enum OpenTsdbError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("query returned {0} series, expected at most one")]
    MultipleSeries(usize),

    #[error("query aggregated tags {0:?} into a single series")]
    AggregateTags(Vec<String>),

    #[error("invalid OpenTSDB address {0:?}")]
    InvalidAddress(String),
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the TSD, e.g. `http://localhost:4242`
    pub addr: String,
    /// Lowercase metric names, tag keys and tag values
    pub normalize: bool,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            normalize: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

pub struct OpenTsdbClient {
    client: Client,
    addr: String,
    normalize: bool,
}

impl OpenTsdbClient {
    /// Create a new client
    pub fn new(config: Config) -> Result<Self, OpenTsdbError> {
        let addr = config.addr.trim_end_matches('/').to_string();
        if !(addr.starts_with("http://") || addr.starts_with("https://")) {
            return Err(OpenTsdbError::InvalidAddress(config.addr));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            addr,
            normalize: config.normalize,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// List metric names starting with `filter`
    ///
    /// `limit` is passed to the TSD as `max`; a limit smaller than the real
    /// number of metrics silently truncates the result.
    pub async fn find_metrics(
        &self,
        filter: &str,
        limit: usize,
    ) -> Result<Vec<String>, OpenTsdbError> {
        let url = format!("{}/api/suggest", self.addr);
        let max = limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[("type", "metrics"), ("q", filter), ("max", max.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OpenTsdbError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let metrics: Vec<String> = response.json().await?;
        tracing::debug!(filter, count = metrics.len(), "Found metrics");
        Ok(metrics)
    }

    /// List every tag combination stored for `metric`
    pub async fn find_series(
        &self,
        metric: &str,
        limit: usize,
    ) -> Result<Vec<Meta>, OpenTsdbError> {
        let url = format!("{}/api/search/lookup", self.addr);
        let limit = limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[("m", metric), ("limit", limit.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OpenTsdbError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let lookup: LookupResponse = response.json().await?;
        tracing::debug!(metric, count = lookup.results.len(), "Found series");
        Ok(lookup.results)
    }

    /// Fetch one series between `start` and `end`, both unix seconds
    ///
    /// An empty [`Metric`] is
    /// returned, not an error, when the TSD rejects the query with a client
    /// error, sends a body that does not decode, or has no data.
    pub async fn get_data(
        &self,
        series: &Meta,
        retention: &RetentionMeta,
        start: i64,
        end: i64,
        msecs: bool,
    ) -> Result<Metric, OpenTsdbError> {
        let url = format!("{}/api/query", self.addr);
        let query = format!("{}:{}", retention.query_aggregation(), series.selector());

        let mut request = self.client.get(&url).query(&[
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("m", query.clone()),
        ]);
        if msecs {
            request = request.query(&[("ms", "true")]);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_server_error() {
            return Err(OpenTsdbError::Status {
                status: status.as_u16(),
                url,
            });
        }
        if status != StatusCode::OK {
            tracing::warn!(%status, query = %query, start, end, "Skipping query rejected by OpenTSDB");
            return Ok(Metric::default());
        }

        let body = response.bytes().await?;
        let output: Vec<QuerySeries> = match serde_json::from_slice(&body) {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = %e, query = %query, "Skipping undecodable query response");
                return Ok(Metric::default());
            }
        };

        if output.len() > 1 {
            return Err(OpenTsdbError::MultipleSeries(output.len()));
        }
        let Some(data) = output.into_iter().next() else {
            return Ok(Metric::default());
        };
        if !data.aggregate_tags.is_empty() {
            return Err(OpenTsdbError::AggregateTags(data.aggregate_tags));
        }

        let mut points: Vec<(i64, f64)> = data
            .dps
            .into_iter()
            .filter_map(|(raw, value)| {
                let millis = raw
                    .parse::<i64>()
                    .ok()
                    .and_then(|ts| if msecs { Some(ts) } else { ts.checked_mul(1000) });
                if millis.is_none() {
                    tracing::debug!(timestamp = %raw, "Dropping datapoint with bad timestamp");
                }
                millis.map(|ts| (ts, value))
            })
            .collect();
        points.sort_unstable_by_key(|(ts, _)| *ts);

        let (timestamps, values): (Vec<i64>, Vec<f64>) = points.into_iter().unzip();

        Ok(normalize::modify_data(
            Metric {
                metric: data.metric,
                tags: data.tags,
                timestamps,
                values,
            },
            self.normalize,
        ))
    }
}

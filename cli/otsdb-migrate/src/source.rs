// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Where series are read from

use async_trait::async_trait;
use opentsdb_client::{Meta, Metric, OpenTsdbClient, OpenTsdbError, RetentionMeta};

/// Read side of a migration
///
/// Implemented by [`OpenTsdbClient`]; tests substitute in-memory fakes.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    /// Metric names matching a prefix filter
    async fn find_metrics(&self, filter: &str, limit: usize) -> Result<Vec<String>, OpenTsdbError>;

    /// Every tag combination of a metric
    async fn find_series(&self, metric: &str, limit: usize) -> Result<Vec<Meta>, OpenTsdbError>;

    /// Datapoints of one series between two unix timestamps (seconds)
    async fn get_data(
        &self,
        series: &Meta,
        retention: &RetentionMeta,
        start: i64,
        end: i64,
        msecs: bool,
    ) -> Result<Metric, OpenTsdbError>;
}

#[async_trait]
impl SeriesSource for OpenTsdbClient {
    async fn find_metrics(&self, filter: &str, limit: usize) -> Result<Vec<String>, OpenTsdbError> {
        OpenTsdbClient::find_metrics(self, filter, limit).await
    }

    async fn find_series(&self, metric: &str, limit: usize) -> Result<Vec<Meta>, OpenTsdbError> {
        OpenTsdbClient::find_series(self, metric, limit).await
    }

    async fn get_data(
        &self,
        series: &Meta,
        retention: &RetentionMeta,
        start: i64,
        end: i64,
        msecs: bool,
    ) -> Result<Metric, OpenTsdbError> {
        OpenTsdbClient::get_data(self, series, retention, start, end, msecs).await
    }
}

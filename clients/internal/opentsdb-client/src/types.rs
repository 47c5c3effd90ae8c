// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Types exchanged with the OpenTSDB HTTP API

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A concrete series: a metric name plus one tag-set combination
///
/// Tags are kept in a `BTreeMap` so that rendered selectors (and the labels
/// derived from them) come out in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub metric: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Meta {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            tags: BTreeMap::new(),
        }
    }

    /// Builder-style helper used mostly by tests and fakes
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Render the series as an OpenTSDB metric selector, e.g. `cpu{host=a,dc=x}`
    pub fn selector(&self) -> String {
        if self.tags.is_empty() {
            return self.metric.clone();
        }
        let tags: Vec<String> = self
            .tags
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}{{{}}}", self.metric, tags.join(","))
    }
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector())
    }
}

/// Aggregation descriptor of a retention rule
///
/// `agg_time` is kept exactly as configured (e.g. `1m`) because OpenTSDB
/// parses it itself as part of the downsampling clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionMeta {
    pub first_order: String,
    pub agg_time: String,
    pub second_order: String,
}

impl RetentionMeta {
    /// The aggregation prefix of a query `m` parameter: `sum:1m-avg-none`
    pub fn query_aggregation(&self) -> String {
        format!(
            "{}:{}-{}-none",
            self.first_order, self.agg_time, self.second_order
        )
    }
}

impl fmt::Display for RetentionMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.first_order, self.agg_time, self.second_order
        )
    }
}

/// Datapoints returned for one series and one query window
///
/// Timestamps are always milliseconds. An empty result is normal for
/// sparse series and is not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metric {
    pub metric: String,
    pub tags: BTreeMap<String, String>,
    pub timestamps: Vec<i64>,
    pub values: Vec<f64>,
}

impl Metric {
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty() || self.values.is_empty()
    }
}

/// Body of `/api/search/lookup`
#[derive(Debug, Deserialize)]
pub(crate) struct LookupResponse {
    #[serde(default)]
    pub results: Vec<Meta>,
}

/// One element of the `/api/query` response array
#[derive(Debug, Deserialize)]
pub(crate) struct QuerySeries {
    pub metric: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, rename = "aggregateTags")]
    pub aggregate_tags: Vec<String>,
    #[serde(default)]
    pub dps: BTreeMap<String, f64>,
}

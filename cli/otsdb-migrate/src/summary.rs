// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Per-metric and per-run job accounting

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Job counters shared by the fetch workers of one metric
#[derive(Debug, Default)]
pub(crate) struct JobCounters {
    submitted: AtomicU64,
    empty: AtomicU64,
}

impl JobCounters {
    pub fn submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn empty(&self) {
        self.empty.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summarize(&self, metric: &str, series: usize) -> MetricSummary {
        let submitted = self.submitted.load(Ordering::Relaxed);
        let empty = self.empty.load(Ordering::Relaxed);
        MetricSummary {
            metric: metric.to_string(),
            series,
            jobs: submitted + empty,
            submitted,
            empty,
        }
    }
}

/// What happened to one metric
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricSummary {
    pub metric: String,
    pub series: usize,
    /// Jobs processed, whether or not they produced data
    pub jobs: u64,
    pub submitted: u64,
    pub empty: u64,
}

impl fmt::Display for MetricSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} series, {} jobs ({} submitted, {} empty)",
            self.metric, self.series, self.jobs, self.submitted, self.empty
        )
    }
}

/// Totals over a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub metrics: usize,
    pub series: usize,
    pub jobs: u64,
    pub submitted: u64,
    pub empty: u64,
}

impl MigrationSummary {
    pub fn record(&mut self, metric: &MetricSummary) {
        self.metrics += 1;
        self.series += metric.series;
        self.jobs += metric.jobs;
        self.submitted += metric.submitted;
        self.empty += metric.empty;
    }
}

impl fmt::Display for MigrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} metrics, {} series, {} jobs ({} submitted, {} empty)",
            self.metrics, self.series, self.jobs, self.submitted, self.empty
        )
    }
}

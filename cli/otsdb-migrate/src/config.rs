// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Migration configuration

use chrono::Utc;

use crate::retention::Retention;

/// Default result limit for metric and series discovery
///
/// OpenTSDB's own defaults are in the tens of results, far below the size
/// of a real installation.
pub const DEFAULT_QUERY_LIMIT: usize = 100_000_000;

/// Default number of concurrent fetches per metric
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Single-letter prefixes that together match every metric name
pub fn default_filters() -> Vec<String> {
    ('a'..='z').map(String::from).collect()
}

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Metric name prefixes to discover
    pub filters: Vec<String>,
    pub query_limit: usize,
    pub retentions: Vec<Retention>,
    /// Fetch workers per metric; values below 1 are treated as 1
    pub concurrency: usize,
    /// Fixed reference timestamp in unix seconds; 0 means now
    pub hard_ts_start: i64,
    /// The source stores millisecond timestamps
    pub msecs_time: bool,
    /// Skip the confirmation prompt
    pub silent: bool,
    pub verbose: bool,
    pub show_progress: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            filters: default_filters(),
            query_limit: DEFAULT_QUERY_LIMIT,
            retentions: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            hard_ts_start: 0,
            msecs_time: false,
            silent: false,
            verbose: false,
            show_progress: true,
        }
    }
}

impl MigrationConfig {
    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Number of query windows each series is fetched over
    pub fn windows_per_series(&self) -> usize {
        self.retentions.iter().map(|r| r.query_ranges.len()).sum()
    }

    pub fn reference_timestamp(&self) -> i64 {
        if self.hard_ts_start != 0 {
            self.hard_ts_start
        } else {
            Utc::now().timestamp()
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Retention rule parsing
//!
//! A retention rule such as `sum-1m-avg:1h:3d` names the downsampling to
//! apply (`sum` across series, `1m` buckets averaged with `avg`), the HBase
//! row size that bounds a single query (`1h`) and how far back to go
//! (`3d`). Each rule expands into `span / row` query windows.

use std::fmt;
use std::sync::LazyLock;

use opentsdb_client::RetentionMeta;
use regex::Regex;
use thiserror::Error;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Aggregators accepted by OpenTSDB in both positions of a rule
pub const KNOWN_AGGREGATORS: &[&str] = &[
    "avg", "count", "dev", "first", "last", "max", "min", "mimmin", "mimmax", "mult", "none",
    "sum", "zimsum", "squareSum", "p50", "p75", "p90", "p95", "p99", "p999", "ep50r3", "ep50r7",
    "ep75r3", "ep75r7", "ep90r3", "ep90r7", "ep95r3", "ep95r7", "ep99r3", "ep99r7", "ep999r3",
    "ep999r7",
];

// The pattern is a constant; failing to compile it is a programming error.
#[allow(clippy::expect_used)]
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)([smhdwny])$").expect("valid duration regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetentionError {
    #[error("invalid retention {spec:?}: expected <agg>-<bucket>-<agg>:<row size>:<span>")]
    InvalidFormat { spec: String },

    #[error("invalid retention {spec:?}: unknown aggregation {aggregation:?}")]
    InvalidAggregation { spec: String, aggregation: String },

    #[error("invalid retention {spec:?}: cannot parse duration {duration:?}")]
    InvalidDuration { spec: String, duration: String },

    #[error("invalid retention {spec:?}: span of {span}s is not a multiple of row size {row}s")]
    SpanNotMultiple { spec: String, span: i64, row: i64 },

    #[error("invalid offset of {0} days: must be zero or positive and fit in a timestamp")]
    InvalidOffset(i64),

    #[error("invalid retention {spec:?}: span shifted back by {offset_secs}s does not fit in a timestamp")]
    OutOfRange { spec: String, offset_secs: i64 },

    #[error("at least one retention is required")]
    Empty,
}

/// One query window, as offsets in seconds back from the reference time
///
/// `start` is always further in the past than `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    /// Absolute `(start, end)` unix seconds for a reference timestamp
    pub fn absolute(&self, reference: i64) -> (i64, i64) {
        (reference - self.start, reference - self.end)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s-{}s", self.start, self.end)
    }
}

/// A parsed retention rule and its query windows, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retention {
    pub meta: RetentionMeta,
    pub query_ranges: Vec<TimeRange>,
}

/// Parse `<n><unit>` into seconds
///
/// `n` is 30 days and `y` is 365 days, matching OpenTSDB's own units.
pub fn parse_duration(s: &str) -> Option<i64> {
    let caps = DURATION_RE.captures(s)?;
    let value: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = match caps.get(2)?.as_str() {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => SECONDS_PER_DAY,
        "w" => 7 * SECONDS_PER_DAY,
        "n" => 30 * SECONDS_PER_DAY,
        "y" => 365 * SECONDS_PER_DAY,
        _ => return None,
    };
    if value == 0 {
        return None;
    }
    value.checked_mul(unit)
}

impl Retention {
    /// Parse a rule and expand its windows, shifted back by `offset_secs`
    pub fn parse(spec: &str, offset_secs: i64) -> Result<Self, RetentionError> {
        let invalid_format = || RetentionError::InvalidFormat {
            spec: spec.to_string(),
        };

        let parts: Vec<&str> = spec.trim().split(':').collect();
        let [aggregation, row, span] = parts.as_slice() else {
            return Err(invalid_format());
        };
        let agg_parts: Vec<&str> = aggregation.split('-').collect();
        let [first_order, agg_time, second_order] = agg_parts.as_slice() else {
            return Err(invalid_format());
        };

        for agg in [*first_order, *second_order] {
            if !KNOWN_AGGREGATORS.contains(&agg) {
                return Err(RetentionError::InvalidAggregation {
                    spec: spec.to_string(),
                    aggregation: agg.to_string(),
                });
            }
        }

        let duration = |d: &str| {
            parse_duration(d).ok_or_else(|| RetentionError::InvalidDuration {
                spec: spec.to_string(),
                duration: d.to_string(),
            })
        };
        duration(*agg_time)?;
        let row = duration(*row)?;
        let span = duration(*span)?;

        if span % row != 0 {
            return Err(RetentionError::SpanNotMultiple {
                spec: spec.to_string(),
                span,
                row,
            });
        }

        // The oldest edge bounds every window.
        if offset_secs < 0 || offset_secs.checked_add(span).is_none() {
            return Err(RetentionError::OutOfRange {
                spec: spec.to_string(),
                offset_secs,
            });
        }

        let query_ranges = (0..span / row)
            .map(|k| TimeRange {
                start: offset_secs + (k + 1) * row,
                end: offset_secs + k * row,
            })
            .collect();

        Ok(Self {
            meta: RetentionMeta {
                first_order: first_order.to_string(),
                agg_time: agg_time.to_string(),
                second_order: second_order.to_string(),
            },
            query_ranges,
        })
    }
}

/// Parse every configured rule; `offset_days` shifts all windows back
pub fn parse_retentions(specs: &[String], offset_days: i64) -> Result<Vec<Retention>, RetentionError> {
    if specs.is_empty() {
        return Err(RetentionError::Empty);
    }
    let offset_secs = match offset_days.checked_mul(SECONDS_PER_DAY) {
        Some(secs) if secs >= 0 => secs,
        _ => return Err(RetentionError::InvalidOffset(offset_days)),
    };
    specs
        .iter()
        .map(|spec| Retention::parse(spec, offset_secs))
        .collect()
}

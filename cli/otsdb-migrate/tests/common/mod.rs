// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! In-memory source and sink used by the pipeline tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use opentsdb_client::{Meta, Metric, OpenTsdbError, RetentionMeta};
use otsdb_migrate::{SeriesSink, SeriesSource};
use tokio::sync::mpsc;
use vm_importer::{ImportError, ImporterError, Stats, TimeSeries};

pub fn server_error() -> OpenTsdbError {
    OpenTsdbError::Status {
        status: 500,
        url: "http://otsdb/api".to_string(),
    }
}

/// A recorded `get_data` call
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fetch {
    pub series: String,
    pub start: i64,
    pub end: i64,
}

#[derive(Default)]
pub struct FakeSource {
    /// filter -> metric names
    pub metrics: HashMap<String, Vec<String>>,
    /// metric -> series
    pub series: HashMap<String, Vec<Meta>>,
    pub fail_filter: Option<String>,
    pub fail_lookup: Option<String>,
    pub fail_fetch: Option<Meta>,
    pub empty_fetch: Option<Meta>,
    pub fetch_delay: Option<Duration>,

    pub lookups: Mutex<Vec<String>>,
    pub fetches: Mutex<Vec<Fetch>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeSource {
    /// One filter `s` yielding `metrics`, each with `series_per_metric`
    /// series distinguished by a `host` tag
    pub fn with_series(metrics: &[&str], series_per_metric: usize) -> Self {
        let mut source = FakeSource::default();
        source.metrics.insert(
            "s".to_string(),
            metrics.iter().map(|m| m.to_string()).collect(),
        );
        for metric in metrics {
            let series = (0..series_per_metric)
                .map(|i| Meta::new(*metric).with_tag("host", format!("h{}", i)))
                .collect();
            source.series.insert(metric.to_string(), series);
        }
        source
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }
}

#[async_trait]
impl SeriesSource for FakeSource {
    async fn find_metrics(&self, filter: &str, _limit: usize) -> Result<Vec<String>, OpenTsdbError> {
        if self.fail_filter.as_deref() == Some(filter) {
            return Err(server_error());
        }
        Ok(self.metrics.get(filter).cloned().unwrap_or_default())
    }

    async fn find_series(&self, metric: &str, _limit: usize) -> Result<Vec<Meta>, OpenTsdbError> {
        self.lookups.lock().unwrap().push(metric.to_string());
        if self.fail_lookup.as_deref() == Some(metric) {
            return Err(server_error());
        }
        Ok(self.series.get(metric).cloned().unwrap_or_default())
    }

    async fn get_data(
        &self,
        series: &Meta,
        _retention: &RetentionMeta,
        start: i64,
        end: i64,
        _msecs: bool,
    ) -> Result<Metric, OpenTsdbError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.fetches.lock().unwrap().push(Fetch {
            series: series.selector(),
            start,
            end,
        });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_fetch.as_ref() == Some(series) {
            return Err(server_error());
        }
        if self.empty_fetch.as_ref() == Some(series) {
            return Ok(Metric::default());
        }
        Ok(Metric {
            metric: series.metric.clone(),
            tags: series.tags.clone(),
            timestamps: vec![start * 1000, end * 1000],
            values: vec![1.0, 2.0],
        })
    }
}

/// Records submissions; can inject asynchronous failures
pub struct FakeSink {
    pub submitted: Mutex<Vec<TimeSeries>>,
    errors: Mutex<Option<mpsc::Sender<ImportError>>>,
    /// Report an async error after this many submissions
    pub fail_after: Option<usize>,
    pub fail_on_close: bool,
    /// Refuse every submission synchronously
    pub reject_submit: bool,
    pub closed: AtomicBool,
    pub resets: AtomicUsize,
}

impl FakeSink {
    pub fn new() -> (Self, mpsc::Receiver<ImportError>) {
        Self::failing(None, false)
    }

    pub fn failing(
        fail_after: Option<usize>,
        fail_on_close: bool,
    ) -> (Self, mpsc::Receiver<ImportError>) {
        let (tx, rx) = mpsc::channel(8);
        (
            Self {
                submitted: Mutex::new(Vec::new()),
                errors: Mutex::new(Some(tx)),
                fail_after,
                fail_on_close,
                reject_submit: false,
                closed: AtomicBool::new(false),
                resets: AtomicUsize::new(0),
            },
            rx,
        )
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    fn report(&self, batch: Vec<TimeSeries>) {
        if let Some(tx) = self.errors.lock().unwrap().as_ref() {
            let _ = tx.try_send(ImportError {
                batch,
                source: ImporterError::Status {
                    status: 400,
                    url: "http://vm/api/v1/import".to_string(),
                    body: "cannot parse".to_string(),
                },
            });
        }
    }
}

#[async_trait]
impl SeriesSink for FakeSink {
    async fn submit(&self, series: TimeSeries) -> Result<(), ImporterError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ImporterError::Closed);
        }
        if self.reject_submit {
            return Err(ImporterError::Status {
                status: 503,
                url: "http://vm/api/v1/import".to_string(),
                body: "overloaded".to_string(),
            });
        }
        let count = {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(series.clone());
            submitted.len()
        };
        if self.fail_after == Some(count) {
            self.report(vec![series]);
        }
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.fail_on_close {
            self.report(Vec::new());
        }
        self.errors.lock().unwrap().take();
    }

    fn reset_stats(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn stats(&self) -> Stats {
        Stats {
            samples: self
                .submitted
                .lock()
                .unwrap()
                .iter()
                .map(|ts| ts.values.len() as u64)
                .sum(),
            ..Stats::default()
        }
    }
}

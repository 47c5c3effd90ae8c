// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Import counters shared by all importer workers

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Snapshot of importer activity since the last reset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Samples successfully written
    pub samples: u64,
    /// Request body bytes sent, after compression
    pub bytes: u64,
    /// Import requests that succeeded
    pub requests: u64,
    /// Attempts that were retried
    pub retries: u64,
    /// Time spent inside import requests, summed over workers
    pub import_duration: Duration,
    /// Time workers spent waiting for input
    pub idle_duration: Duration,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.import_duration.as_secs_f64();
        let rate = if secs > 0.0 {
            self.samples as f64 / secs
        } else {
            0.0
        };
        write!(
            f,
            "samples: {}; bytes: {}; requests: {}; retries: {}; \
             import duration: {:.3}s ({:.0} samples/s); idle duration: {:.3}s",
            self.samples,
            self.bytes,
            self.requests,
            self.retries,
            secs,
            rate,
            self.idle_duration.as_secs_f64(),
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    samples: AtomicU64,
    bytes: AtomicU64,
    requests: AtomicU64,
    retries: AtomicU64,
    import_nanos: AtomicU64,
    idle_nanos: AtomicU64,
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl StatsCollector {
    pub fn record_request(&self, samples: u64, bytes: u64, took: Duration) {
        self.samples.fetch_add(samples, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.import_nanos.fetch_add(nanos(took), Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle(&self, idle: Duration) {
        self.idle_nanos.fetch_add(nanos(idle), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            samples: self.samples.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            import_duration: Duration::from_nanos(self.import_nanos.load(Ordering::Relaxed)),
            idle_duration: Duration::from_nanos(self.idle_nanos.load(Ordering::Relaxed)),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.samples,
            &self.bytes,
            &self.requests,
            &self.retries,
            &self.import_nanos,
            &self.idle_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

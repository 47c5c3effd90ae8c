// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Migration errors

use std::fmt::Write;

use chrono::{DateTime, SecondsFormat};
use opentsdb_client::OpenTsdbError;
use thiserror::Error;
use vm_importer::ImportError;

use crate::job::{JobError, JobFailure};

/// Errors that abort a migration run
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("metric discovery failed for filter {filter:?}: {source}")]
    Discovery {
        filter: String,
        #[source]
        source: OpenTsdbError,
    },

    #[error("found no timeseries to import with filters {0:?}")]
    NothingToImport(Vec<String>),

    #[error("couldn't retrieve series list for {metric}: {source}")]
    SeriesLookup {
        metric: String,
        #[source]
        source: OpenTsdbError,
    },

    #[error("opentsdb error: {0}")]
    Fetch(#[source] JobError),

    /// A job's datapoints were fetched but the importer refused them
    #[error("import process failed: {0}")]
    Submit(#[source] JobError),

    #[error("import process failed: {source}{details}")]
    Import {
        #[source]
        source: ImportError,
        details: String,
    },

    #[error("migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Classify a failed job by the side that failed
    pub fn job(err: JobError) -> Self {
        match err.cause {
            JobFailure::Fetch(_) => MigrateError::Fetch(err),
            JobFailure::Submit(_) => MigrateError::Submit(err),
        }
    }

    /// Wrap an asynchronous import failure, listing the failed series when
    /// `verbose` is set
    pub fn import(source: ImportError, verbose: bool) -> Self {
        let details = describe_batch(&source, verbose);
        MigrateError::Import { source, details }
    }
}

fn format_millis(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| ms.to_string())
}

fn describe_batch(err: &ImportError, verbose: bool) -> String {
    let mut min_ts: Option<i64> = None;
    let mut max_ts: Option<i64> = None;
    let mut series = String::new();

    for ts in &err.batch {
        let (Some(first), Some(last)) = (ts.timestamps.first(), ts.timestamps.last()) else {
            continue;
        };
        min_ts = Some(min_ts.map_or(*first, |m| m.min(*first)));
        max_ts = Some(max_ts.map_or(*last, |m| m.max(*last)));

        if verbose {
            let labels: Vec<String> = ts
                .label_pairs
                .iter()
                .filter(|l| !l.name.is_empty())
                .map(|l| format!("{}={:?}", l.name, l.value))
                .collect();
            let _ = writeln!(
                series,
                "{}{{{}}} for timestamps range {} - {}",
                ts.name,
                labels.join(","),
                format_millis(*first),
                format_millis(*last)
            );
        }
    }

    let (Some(min_ts), Some(max_ts)) = (min_ts, max_ts) else {
        return String::new();
    };
    let hint = if verbose {
        ""
    } else {
        " (enable --verbose output to get more details)"
    };
    format!(
        "\n\tImporting batch failed for timestamps range {} - {}{}\n{}",
        format_millis(min_ts),
        format_millis(max_ts),
        hint,
        series
    )
}

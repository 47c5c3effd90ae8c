// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! A single fetch-and-forward unit of work

use opentsdb_client::{Meta, OpenTsdbError, RetentionMeta};
use thiserror::Error;
use vm_importer::{ImporterError, LabelPair, TimeSeries};

use crate::retention::TimeRange;
use crate::sink::SeriesSink;
use crate::source::SeriesSource;

/// One series over one retention window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryJob {
    pub series: Meta,
    pub retention: RetentionMeta,
    pub range: TimeRange,
    /// Run-wide reference timestamp the range offsets are relative to
    pub reference: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The source had no datapoints in the window
    Empty,
    /// Datapoints were handed to the sink
    Submitted,
}

#[derive(Debug, Error)]
pub enum JobFailure {
    #[error(transparent)]
    Fetch(OpenTsdbError),

    #[error(transparent)]
    Submit(ImporterError),
}

/// A failed job with the context needed to find it again
#[derive(Debug, Error)]
#[error("failed to collect data for {series} in {retention}:{range}: {cause}")]
pub struct JobError {
    pub series: Meta,
    pub retention: RetentionMeta,
    pub range: TimeRange,
    #[source]
    pub cause: JobFailure,
}

impl QueryJob {
    pub async fn process<S, D>(
        self,
        source: &S,
        sink: &D,
        msecs: bool,
    ) -> Result<JobOutcome, JobError>
    where
        S: SeriesSource + ?Sized,
        D: SeriesSink + ?Sized,
    {
        let (start, end) = self.range.absolute(self.reference);

        let data = match source
            .get_data(&self.series, &self.retention, start, end, msecs)
            .await
        {
            Ok(data) => data,
            Err(e) => return Err(self.fail(JobFailure::Fetch(e))),
        };

        if data.is_empty() {
            tracing::trace!(series = %self.series, range = %self.range, "No datapoints in window");
            return Ok(JobOutcome::Empty);
        }

        let series = TimeSeries {
            name: data.metric,
            label_pairs: data
                .tags
                .into_iter()
                .map(|(name, value)| LabelPair { name, value })
                .collect(),
            timestamps: data.timestamps,
            values: data.values,
        };

        match sink.submit(series).await {
            Ok(()) => Ok(JobOutcome::Submitted),
            Err(e) => Err(self.fail(JobFailure::Submit(e))),
        }
    }

    fn fail(self, cause: JobFailure) -> JobError {
        JobError {
            series: self.series,
            retention: self.retention,
            range: self.range,
            cause,
        }
    }
}

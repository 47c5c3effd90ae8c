// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Migration driver
//!
//! Metrics are migrated one at a time. For each metric a bounded job queue
//! is filled with every (series, retention, window) combination while a
//! fixed set of fetch workers drains it. The dispatcher keeps watching
//! both the workers' error channel and the sink's asynchronous error
//! stream, so the first failure on either side stops the run.

use std::sync::Arc;

use indicatif::ProgressBar;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use vm_importer::ImportError;

use crate::config::MigrationConfig;
use crate::error::MigrateError;
use crate::job::{JobError, JobOutcome, QueryJob};
use crate::progress;
use crate::sink::SeriesSink;
use crate::source::SeriesSource;
use crate::summary::{JobCounters, MetricSummary, MigrationSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(MigrationSummary),
    /// The operator answered no at the confirmation prompt
    Declined,
}

pub struct Migrator<S, D> {
    source: Arc<S>,
    sink: Arc<D>,
    sink_errors: mpsc::Receiver<ImportError>,
    config: MigrationConfig,
    cancel: CancellationToken,
}

impl<S, D> Migrator<S, D>
where
    S: SeriesSource + 'static,
    D: SeriesSink + 'static,
{
    /// `sink_errors` is the asynchronous error stream belonging to `sink`;
    /// it must end once the sink is closed.
    pub fn new(
        source: Arc<S>,
        sink: Arc<D>,
        sink_errors: mpsc::Receiver<ImportError>,
        config: MigrationConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            sink,
            sink_errors,
            config,
            cancel,
        }
    }

    /// Run the whole migration
    ///
    /// `confirm` is asked once with the number of discovered metrics unless
    /// the config is silent. The sink is closed before this returns.
    pub async fn run<F>(mut self, confirm: F) -> Result<RunOutcome, MigrateError>
    where
        F: FnOnce(usize) -> bool,
    {
        let metrics = match self.discover_metrics().await {
            Ok(metrics) => metrics,
            Err(e) => {
                self.sink.close().await;
                return Err(e);
            }
        };

        if !self.config.silent && !confirm(metrics.len()) {
            tracing::info!("Migration declined");
            self.sink.close().await;
            return Ok(RunOutcome::Declined);
        }

        match self.migrate_all(&metrics).await {
            Ok(summary) => Ok(RunOutcome::Completed(summary)),
            Err(e) => {
                self.sink.close().await;
                Err(e)
            }
        }
    }

    async fn discover_metrics(&self) -> Result<Vec<String>, MigrateError> {
        tracing::info!(filters = ?self.config.filters, "Loading metrics from OpenTSDB");

        let mut metrics = Vec::new();
        for filter in &self.config.filters {
            let found = self
                .source
                .find_metrics(filter, self.config.query_limit)
                .await
                .map_err(|source| MigrateError::Discovery {
                    filter: filter.clone(),
                    source,
                })?;
            metrics.extend(found);
        }

        if metrics.is_empty() {
            return Err(MigrateError::NothingToImport(self.config.filters.clone()));
        }
        tracing::info!(count = metrics.len(), "Found metrics to import");
        Ok(metrics)
    }

    async fn migrate_all(&mut self, metrics: &[String]) -> Result<MigrationSummary, MigrateError> {
        self.sink.reset_stats();
        let reference = self.config.reference_timestamp();

        tracing::info!(
            reference,
            windows = self.config.windows_per_series(),
            concurrency = self.config.concurrency(),
            "Starting migration"
        );

        let mut summary = MigrationSummary::default();
        for metric in metrics {
            if self.cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }
            let done = self.migrate_metric(metric, reference).await?;
            tracing::info!(
                metric = %metric,
                series = done.series,
                jobs = done.jobs,
                submitted = done.submitted,
                empty = done.empty,
                stats = %self.sink.stats(),
                "Finished metric"
            );
            summary.record(&done);
        }

        self.sink.close().await;
        if let Some(err) = self.sink_errors.recv().await {
            return Err(MigrateError::import(err, self.config.verbose));
        }

        tracing::info!(summary = %summary, stats = %self.sink.stats(), "Import finished");
        Ok(summary)
    }

    async fn migrate_metric(
        &mut self,
        metric: &str,
        reference: i64,
    ) -> Result<MetricSummary, MigrateError> {
        tracing::info!(metric = %metric, "Starting work on metric");

        let series = self
            .source
            .find_series(metric, self.config.query_limit)
            .await
            .map_err(|source| MigrateError::SeriesLookup {
                metric: metric.to_string(),
                source,
            })?;

        let counters = Arc::new(JobCounters::default());
        if series.is_empty() {
            tracing::info!(metric = %metric, "No series found, skipping metric");
            return Ok(counters.summarize(metric, 0));
        }

        let concurrency = self.config.concurrency();
        let verbose = self.config.verbose;
        let total_jobs = (series.len() * self.config.windows_per_series()) as u64;
        let bar = progress::metric_bar(metric, total_jobs, self.config.show_progress);

        let (job_tx, job_rx) = mpsc::channel::<QueryJob>(concurrency);
        let job_rx = Arc::new(Mutex::new(job_rx));
        // Each worker reports at most one error, so reporting never blocks.
        let (err_tx, mut err_rx) = mpsc::channel::<JobError>(concurrency);
        let stop = self.cancel.child_token();

        let mut workers = JoinSet::new();
        for id in 0..concurrency {
            let worker = FetchWorker {
                id,
                source: Arc::clone(&self.source),
                sink: Arc::clone(&self.sink),
                queue: Arc::clone(&job_rx),
                errors: err_tx.clone(),
                stop: stop.clone(),
                counters: Arc::clone(&counters),
                bar: bar.clone(),
                msecs: self.config.msecs_time,
            };
            workers.spawn(worker.run());
        }
        drop(err_tx);

        let mut abort: Option<MigrateError> = None;

        'dispatch: for s in &series {
            for retention in &self.config.retentions {
                for range in &retention.query_ranges {
                    let job = QueryJob {
                        series: s.clone(),
                        retention: retention.meta.clone(),
                        range: *range,
                        reference,
                    };

                    tokio::select! {
                        biased;

                        Some(err) = err_rx.recv() => {
                            abort = Some(MigrateError::job(err));
                            break 'dispatch;
                        }
                        Some(err) = self.sink_errors.recv() => {
                            abort = Some(MigrateError::import(err, verbose));
                            break 'dispatch;
                        }
                        _ = self.cancel.cancelled() => {
                            abort = Some(MigrateError::Cancelled);
                            break 'dispatch;
                        }
                        sent = job_tx.send(job) => {
                            if sent.is_err() {
                                // Every worker is gone; their errors are collected below.
                                break 'dispatch;
                            }
                        }
                    }
                }
            }
        }

        // Close the queue; on abort also stop idle workers from taking jobs.
        drop(job_tx);
        if abort.is_some() {
            stop.cancel();
        }

        // Workers are never aborted and panics abort the process, so joining
        // only waits for them to drain.
        while workers.join_next().await.is_some() {}

        if abort.is_none() {
            if let Some(err) = err_rx.recv().await {
                abort = Some(MigrateError::job(err));
            } else if let Ok(err) = self.sink_errors.try_recv() {
                abort = Some(MigrateError::import(err, verbose));
            } else if stop.is_cancelled() {
                abort = Some(MigrateError::Cancelled);
            }
        }

        if let Some(err) = abort {
            bar.abandon();
            tracing::error!(metric = %metric, error = %err, "Aborting metric");
            return Err(err);
        }

        bar.finish();
        Ok(counters.summarize(metric, series.len()))
    }
}

/// Pulls jobs off a metric's queue until it is closed, the run is
/// stopped, or a job fails
struct FetchWorker<S, D> {
    id: usize,
    source: Arc<S>,
    sink: Arc<D>,
    queue: Arc<Mutex<mpsc::Receiver<QueryJob>>>,
    errors: mpsc::Sender<JobError>,
    stop: CancellationToken,
    counters: Arc<JobCounters>,
    bar: ProgressBar,
    msecs: bool,
}

impl<S, D> FetchWorker<S, D>
where
    S: SeriesSource,
    D: SeriesSink,
{
    async fn run(self) {
        loop {
            let job = tokio::select! {
                biased;

                _ = self.stop.cancelled() => break,
                job = async { self.queue.lock().await.recv().await } => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            match job
                .process(self.source.as_ref(), self.sink.as_ref(), self.msecs)
                .await
            {
                Ok(JobOutcome::Submitted) => self.counters.submitted(),
                Ok(JobOutcome::Empty) => self.counters.empty(),
                Err(e) => {
                    tracing::debug!(worker = self.id, error = %e, "Fetch worker stopping");
                    let _ = self.errors.send(e).await;
                    break;
                }
            }
            self.bar.inc(1);
        }
    }
}

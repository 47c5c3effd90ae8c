// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

// Allow expect/unwrap in tests - they provide clear panic messages on failure
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Migration pipeline tests against an in-memory source and sink.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use opentsdb_client::Meta;
use otsdb_migrate::job::JobFailure;
use otsdb_migrate::{MigrateError, MigrationConfig, Migrator, RunOutcome, parse_retentions};
use pretty_assertions::assert_eq;
use test_case::test_case;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vm_importer::ImportError;

use common::{FakeSink, FakeSource, Fetch};

// ============================================================================
// Test Infrastructure
// ============================================================================

const REFERENCE: i64 = 1_700_000_000;

fn config(retentions: &[&str], concurrency: usize) -> MigrationConfig {
    let specs: Vec<String> = retentions.iter().map(|s| s.to_string()).collect();
    MigrationConfig {
        filters: vec!["s".to_string()],
        retentions: parse_retentions(&specs, 0).unwrap(),
        concurrency,
        hard_ts_start: REFERENCE,
        silent: true,
        show_progress: false,
        ..MigrationConfig::default()
    }
}

fn migrator(
    source: &Arc<FakeSource>,
    sink: &Arc<FakeSink>,
    errors: mpsc::Receiver<ImportError>,
    config: MigrationConfig,
) -> Migrator<FakeSource, FakeSink> {
    Migrator::new(
        Arc::clone(source),
        Arc::clone(sink),
        errors,
        config,
        CancellationToken::new(),
    )
}

fn no_prompt(_: usize) -> bool {
    panic!("confirmation must not be asked in silent mode");
}

// ============================================================================
// Successful runs
// ============================================================================

#[tokio::test]
async fn three_series_two_windows_make_six_jobs() {
    let source = Arc::new(FakeSource::with_series(&["sys.cpu"], 3));
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let outcome = migrator(&source, &sink, errors, config(&["sum-1h-avg:2h:4h"], 2))
        .run(no_prompt)
        .await
        .unwrap();

    let RunOutcome::Completed(summary) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(summary.metrics, 1);
    assert_eq!(summary.series, 3);
    assert_eq!(summary.jobs, 6);
    assert_eq!(summary.submitted, 6);
    assert_eq!(summary.empty, 0);

    assert_eq!(sink.submitted_count(), 6);
    assert!(sink.closed.load(Ordering::SeqCst));
    assert_eq!(sink.resets.load(Ordering::SeqCst), 1);

    // Every (series, window) pair fetched exactly once, at absolute times
    let fetched: BTreeSet<Fetch> = source.fetches.lock().unwrap().iter().cloned().collect();
    assert_eq!(fetched.len(), 6);
    for host in ["h0", "h1", "h2"] {
        let series = format!("sys.cpu{{host={}}}", host);
        assert!(fetched.contains(&Fetch {
            series: series.clone(),
            start: REFERENCE - 7_200,
            end: REFERENCE,
        }));
        assert!(fetched.contains(&Fetch {
            series,
            start: REFERENCE - 14_400,
            end: REFERENCE - 7_200,
        }));
    }
}

#[tokio::test]
async fn submitted_series_carry_tags_as_labels() {
    let source = Arc::new(FakeSource::with_series(&["sys.cpu"], 1));
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    migrator(&source, &sink, errors, config(&["sum-1m-avg:1h:1h"], 1))
        .run(no_prompt)
        .await
        .unwrap();

    let submitted = sink.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].name, "sys.cpu");
    assert_eq!(submitted[0].label_pairs.len(), 1);
    assert_eq!(submitted[0].label_pairs[0].name, "host");
    assert_eq!(submitted[0].label_pairs[0].value, "h0");
    assert_eq!(
        submitted[0].timestamps,
        vec![(REFERENCE - 3_600) * 1000, REFERENCE * 1000]
    );
}

#[test_case(1, 1 ; "single series single worker")]
#[test_case(4, 3 ; "more series than workers")]
#[test_case(10, 8 ; "many series")]
#[test_case(2, 16 ; "more workers than jobs")]
#[test_case(5, 0 ; "zero concurrency runs one worker")]
#[tokio::test]
async fn every_job_processed_exactly_once(series: usize, concurrency: usize) {
    let source = Arc::new(FakeSource::with_series(&["a", "b"], series));
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let retentions = ["sum-1m-avg:1h:3h", "max-1h-max:1d:2d"];
    let outcome = migrator(&source, &sink, errors, config(&retentions, concurrency))
        .run(no_prompt)
        .await
        .unwrap();

    // 3 + 2 windows per series, two metrics
    let expected = 2 * series * 5;
    let RunOutcome::Completed(summary) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(summary.jobs as usize, expected);
    assert_eq!(source.fetch_count(), expected);
    assert_eq!(sink.submitted_count(), expected);

    let unique: BTreeSet<Fetch> = source.fetches.lock().unwrap().iter().cloned().collect();
    assert_eq!(unique.len(), expected);
}

#[tokio::test]
async fn in_flight_fetches_bounded_by_concurrency() {
    let mut source = FakeSource::with_series(&["sys.cpu"], 8);
    source.fetch_delay = Some(Duration::from_millis(5));
    let source = Arc::new(source);
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    migrator(&source, &sink, errors, config(&["sum-1m-avg:1h:4h"], 3))
        .run(no_prompt)
        .await
        .unwrap();

    assert_eq!(source.fetch_count(), 32);
    let max = source.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "saw {} concurrent fetches", max);
    assert!(max >= 1);
}

#[tokio::test]
async fn metric_without_series_is_skipped() {
    let mut source = FakeSource::with_series(&["empty", "full"], 2);
    source.series.insert("empty".to_string(), Vec::new());
    let source = Arc::new(source);
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let outcome = migrator(&source, &sink, errors, config(&["sum-1m-avg:1h:1h"], 2))
        .run(no_prompt)
        .await
        .unwrap();

    let RunOutcome::Completed(summary) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(summary.metrics, 2);
    assert_eq!(summary.jobs, 2);
    assert_eq!(source.lookup_count(), 2);
    assert!(
        source
            .fetches
            .lock()
            .unwrap()
            .iter()
            .all(|f| f.series.starts_with("full"))
    );
}

#[tokio::test]
async fn only_metric_without_series_does_nothing() {
    let source = Arc::new(FakeSource::with_series(&["empty"], 0));
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let outcome = migrator(&source, &sink, errors, config(&["sum-1m-avg:1h:1h"], 2))
        .run(no_prompt)
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Completed(ref s) if s.jobs == 0));
    assert_eq!(source.fetch_count(), 0);
    assert_eq!(sink.submitted_count(), 0);
}

#[tokio::test]
async fn empty_fetch_is_counted_but_not_submitted() {
    let mut source = FakeSource::with_series(&["sys.cpu"], 3);
    source.empty_fetch = Some(Meta::new("sys.cpu").with_tag("host", "h1"));
    let source = Arc::new(source);
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let outcome = migrator(&source, &sink, errors, config(&["sum-1h-avg:2h:4h"], 2))
        .run(no_prompt)
        .await
        .unwrap();

    let RunOutcome::Completed(summary) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(summary.jobs, 6);
    assert_eq!(summary.submitted, 4);
    assert_eq!(summary.empty, 2);
    assert_eq!(sink.submitted_count(), 4);
}

#[tokio::test]
async fn duplicate_metrics_across_filters_are_processed_twice() {
    let mut source = FakeSource::with_series(&["sys.cpu"], 1);
    source
        .metrics
        .insert("sy".to_string(), vec!["sys.cpu".to_string()]);
    let source = Arc::new(source);
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let mut cfg = config(&["sum-1m-avg:1h:1h"], 1);
    cfg.filters = vec!["s".to_string(), "sy".to_string()];

    migrator(&source, &sink, errors, cfg)
        .run(no_prompt)
        .await
        .unwrap();

    assert_eq!(source.lookup_count(), 2);
    assert_eq!(sink.submitted_count(), 2);
}

// ============================================================================
// Confirmation
// ============================================================================

#[tokio::test]
async fn declined_confirmation_stops_before_series_lookup() {
    let source = Arc::new(FakeSource::with_series(&["a", "b", "c"], 2));
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let mut cfg = config(&["sum-1m-avg:1h:1h"], 1);
    cfg.silent = false;

    let mut asked = None;
    let outcome = migrator(&source, &sink, errors, cfg)
        .run(|count| {
            asked = Some(count);
            false
        })
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Declined);
    assert_eq!(asked, Some(3));
    assert_eq!(source.lookup_count(), 0);
    assert_eq!(sink.resets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn accepted_confirmation_runs() {
    let source = Arc::new(FakeSource::with_series(&["a"], 1));
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let mut cfg = config(&["sum-1m-avg:1h:1h"], 1);
    cfg.silent = false;

    let outcome = migrator(&source, &sink, errors, cfg)
        .run(|_| true)
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert_eq!(sink.submitted_count(), 1);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn no_metrics_found() {
    let source = Arc::new(FakeSource::default());
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let err = migrator(&source, &sink, errors, config(&["sum-1m-avg:1h:1h"], 2))
        .run(no_prompt)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::NothingToImport(_)));
    assert!(
        err.to_string()
            .starts_with("found no timeseries to import with filters")
    );
    assert_eq!(source.lookup_count(), 0);
    assert_eq!(source.fetch_count(), 0);
}

#[tokio::test]
async fn discovery_failure_names_filter() {
    let mut source = FakeSource::with_series(&["a"], 1);
    source.fail_filter = Some("s".to_string());
    let source = Arc::new(source);
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let err = migrator(&source, &sink, errors, config(&["sum-1m-avg:1h:1h"], 1))
        .run(no_prompt)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::Discovery { ref filter, .. } if filter == "s"));
    assert_eq!(source.lookup_count(), 0);
}

#[tokio::test]
async fn series_lookup_failure_stops_run() {
    let mut source = FakeSource::with_series(&["a", "b", "c"], 1);
    source.fail_lookup = Some("b".to_string());
    let source = Arc::new(source);
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let err = migrator(&source, &sink, errors, config(&["sum-1m-avg:1h:1h"], 1))
        .run(no_prompt)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::SeriesLookup { ref metric, .. } if metric == "b"));
    assert_eq!(source.lookup_count(), 2);
    assert!(sink.closed.load(Ordering::SeqCst));
}

#[test_case(1 ; "one worker")]
#[test_case(4 ; "four workers")]
#[tokio::test]
async fn fetch_error_aborts_with_job_context(concurrency: usize) {
    let failing = Meta::new("first").with_tag("host", "h2");
    let mut source = FakeSource::with_series(&["first", "second"], 6);
    source.fail_fetch = Some(failing.clone());
    let source = Arc::new(source);
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let err = migrator(&source, &sink, errors, config(&["sum-1m-avg:1h:4h"], concurrency))
        .run(no_prompt)
        .await
        .unwrap_err();

    let MigrateError::Fetch(job) = err else {
        panic!("expected a fetch error");
    };
    assert_eq!(job.series, failing);
    assert_eq!(job.retention.to_string(), "sum-1m-avg");
    assert!(job.to_string().contains("first{host=h2}"));

    // The second metric is never started and the first never finishes
    assert_eq!(source.lookup_count(), 1);
    assert!(source.fetch_count() < 24);
    assert!(sink.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn fetch_error_on_last_job_is_reported() {
    let mut source = FakeSource::with_series(&["only"], 3);
    source.fail_fetch = Some(Meta::new("only").with_tag("host", "h2"));
    let source = Arc::new(source);
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let err = migrator(&source, &sink, errors, config(&["sum-1m-avg:1h:1h"], 1))
        .run(no_prompt)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::Fetch(_)));
    assert!(err.to_string().starts_with("opentsdb error: "));
}

#[tokio::test]
async fn submit_failure_aborts_with_job_context() {
    let source = Arc::new(FakeSource::with_series(&["a", "b"], 3));
    let (mut sink, errors) = FakeSink::new();
    sink.reject_submit = true;
    let sink = Arc::new(sink);

    let err = migrator(&source, &sink, errors, config(&["sum-1m-avg:1h:1h"], 1))
        .run(no_prompt)
        .await
        .unwrap_err();

    let MigrateError::Submit(job) = err else {
        panic!("expected a submit error");
    };
    assert_eq!(job.series, Meta::new("a").with_tag("host", "h0"));
    assert!(matches!(job.cause, JobFailure::Submit(_)));

    let msg = MigrateError::Submit(job).to_string();
    assert!(msg.starts_with("import process failed: failed to collect data for a{host=h0}"));
    assert_eq!(source.lookup_count(), 1);
    assert_eq!(sink.submitted_count(), 0);
    assert!(sink.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn sink_error_during_run_aborts() {
    let source = Arc::new(FakeSource::with_series(&["a", "b", "c"], 4));
    let (sink, errors) = FakeSink::failing(Some(1), false);
    let sink = Arc::new(sink);

    let err = migrator(&source, &sink, errors, config(&["sum-1m-avg:1h:2h"], 2))
        .run(no_prompt)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::Import { .. }));
    assert!(err.to_string().starts_with("import process failed: "));
    // The error is seen before the next metric starts
    assert_eq!(source.lookup_count(), 1);
}

#[tokio::test]
async fn sink_error_at_close_fails_run() {
    let source = Arc::new(FakeSource::with_series(&["a"], 2));
    let (sink, errors) = FakeSink::failing(None, true);
    let sink = Arc::new(sink);

    let err = migrator(&source, &sink, errors, config(&["sum-1m-avg:1h:1h"], 2))
        .run(no_prompt)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::Import { .. }));
    // All local work finished before the failure surfaced
    assert_eq!(sink.submitted_count(), 2);
}

#[tokio::test]
async fn cancelled_run_stops_before_next_metric() {
    let source = Arc::new(FakeSource::with_series(&["a", "b"], 2));
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let migrator = Migrator::new(
        Arc::clone(&source),
        Arc::clone(&sink),
        errors,
        config(&["sum-1m-avg:1h:1h"], 1),
        cancel,
    );

    let err = migrator.run(no_prompt).await.unwrap_err();
    assert!(matches!(err, MigrateError::Cancelled));
    assert_eq!(source.fetch_count(), 0);
    assert!(sink.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn cancel_mid_metric_stops_dispatch() {
    let mut source = FakeSource::with_series(&["a", "b"], 50);
    source.fetch_delay = Some(Duration::from_millis(5));
    let source = Arc::new(source);
    let (sink, errors) = FakeSink::new();
    let sink = Arc::new(sink);

    let cancel = CancellationToken::new();
    let migrator = Migrator::new(
        Arc::clone(&source),
        Arc::clone(&sink),
        errors,
        config(&["sum-1m-avg:1h:1h"], 2),
        cancel.clone(),
    );

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        cancel.cancel();
    });

    let err = migrator.run(no_prompt).await.unwrap_err();
    assert!(matches!(err, MigrateError::Cancelled));

    // Stopped inside the first metric: some of its 50 jobs ran, none of b's
    assert_eq!(source.lookup_count(), 1);
    let fetches = source.fetch_count();
    assert!(fetches > 0);
    assert!(fetches < 50, "fetches: {}", fetches);
    assert!(sink.closed.load(Ordering::SeqCst));
}

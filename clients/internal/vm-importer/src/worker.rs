// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Batching workers and the HTTP writer they share

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::{Mutex, mpsc};
use tokio::time::MissedTickBehavior;

use crate::series::{LabelPair, TimeSeries, encode_batch, gzip};
use crate::stats::StatsCollector;
use crate::{ImportError, ImporterError};

/// Upper bound for the backoff between retries
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Posts encoded batches to the import endpoint
pub(crate) struct Writer {
    pub client: Client,
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub compress: bool,
    pub extra_labels: Vec<LabelPair>,
    pub max_retries: u32,
    pub retry_min_delay: Duration,
    pub stats: Arc<StatsCollector>,
}

impl Writer {
    /// Write one batch, retrying server and transport failures with
    /// exponential backoff
    pub async fn write(&self, batch: &[TimeSeries]) -> Result<(), ImporterError> {
        let mut body = encode_batch(batch, &self.extra_labels)?;
        if self.compress {
            body = gzip(&body)?;
        }
        let samples: u64 = batch.iter().map(|ts| ts.samples() as u64).sum();

        let mut attempt = 0u32;
        let mut delay = self.retry_min_delay;

        loop {
            let started = Instant::now();
            match self.post(body.clone()).await {
                Ok(()) => {
                    self.stats
                        .record_request(samples, body.len() as u64, started.elapsed());
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    if !e.is_retriable() || attempt > self.max_retries {
                        return Err(e);
                    }
                    self.stats.record_retry();
                    tracing::warn!(
                        attempt,
                        error = %e,
                        delay = ?delay,
                        "Import request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, MAX_RETRY_DELAY);
                }
            }
        }
    }

    async fn post(&self, body: Vec<u8>) -> Result<(), ImporterError> {
        let mut request = self.client.post(&self.url).body(body);
        if self.compress {
            request = request.header(reqwest::header::CONTENT_ENCODING, "gzip");
        }
        if let Some(ref user) = self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImporterError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
                body,
            });
        }
        Ok(())
    }
}

/// One batching worker
///
/// Workers share the input receiver; each keeps its own batch and flushes
/// it when `batch_size` samples are buffered, when `flush_interval`
/// elapses, or when the input is closed.
pub(crate) struct Worker {
    pub id: usize,
    pub input: Arc<Mutex<mpsc::Receiver<TimeSeries>>>,
    pub writer: Arc<Writer>,
    pub errors: mpsc::Sender<ImportError>,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Worker {
    pub async fn run(self) {
        let mut batch: Vec<TimeSeries> = Vec::new();
        let mut samples = 0usize;

        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        tracing::debug!(worker = self.id, "Importer worker started");

        loop {
            let waiting = Instant::now();
            let received = tokio::select! {
                ts = async { self.input.lock().await.recv().await } => ts,
                _ = ticker.tick() => {
                    self.writer.stats.record_idle(waiting.elapsed());
                    self.flush(&mut batch, &mut samples).await;
                    continue;
                }
            };
            self.writer.stats.record_idle(waiting.elapsed());

            match received {
                Some(ts) => {
                    samples += ts.samples();
                    batch.push(ts);
                    if samples >= self.batch_size {
                        self.flush(&mut batch, &mut samples).await;
                    }
                }
                None => {
                    self.flush(&mut batch, &mut samples).await;
                    break;
                }
            }
        }

        tracing::debug!(worker = self.id, "Importer worker stopped");
    }

    async fn flush(&self, batch: &mut Vec<TimeSeries>, samples: &mut usize) {
        if batch.is_empty() {
            return;
        }
        let pending = std::mem::take(batch);
        *samples = 0;

        if let Err(source) = self.writer.write(&pending).await {
            tracing::error!(
                worker = self.id,
                series = pending.len(),
                error = %source,
                "Failed to import batch"
            );
            // One queued error is enough to fail the caller; never block here
            // since the caller may be waiting for workers to exit.
            if let Err(mpsc::error::TrySendError::Full(dropped)) =
                self.errors.try_send(ImportError {
                    batch: pending,
                    source,
                })
            {
                tracing::warn!(error = %dropped, "Import error stream full, dropping error");
            }
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! VictoriaMetrics importer
//!
//! Accepts series through [`Importer::input`], batches them in a pool of
//! workers and writes them to `/api/v1/import` as JSON lines. Write
//! failures that survive retries are reported asynchronously on the error
//! stream returned by [`Importer::new`].

mod series;
mod stats;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

pub use series::{LabelPair, TimeSeries};
pub use stats::Stats;

use stats::StatsCollector;
use worker::{Worker, Writer};

/// Default VictoriaMetrics address
pub const DEFAULT_ADDR: &str = "http://localhost:8428";

/// Default number of import workers
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Default number of samples per import request
pub const DEFAULT_BATCH_SIZE: usize = 200_000;

/// Default interval after which a partial batch is flushed
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default number of retries for a failed import request
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default delay before the first retry
pub const DEFAULT_RETRY_MIN_DELAY: Duration = Duration::from_secs(1);

/// Importer errors
#[derive(Debug, Error)]
pub enum ImporterError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to compress batch: {0}")]
    Compress(#[from] std::io::Error),

    #[error("importer is closed")]
    Closed,

    #[error("invalid importer config: {0}")]
    Config(String),
}

impl ImporterError {
    /// Whether repeating the request may succeed
    pub fn is_retriable(&self) -> bool {
        match self {
            ImporterError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ImporterError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A batch that could not be written
#[derive(Debug, Error)]
#[error("failed to import {} series: {source}", .batch.len())]
pub struct ImportError {
    pub batch: Vec<TimeSeries>,
    pub source: ImporterError,
}

impl ImportError {
    pub fn samples(&self) -> usize {
        self.batch.iter().map(TimeSeries::samples).sum()
    }
}

/// Importer configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of VictoriaMetrics (single node or vminsert)
    pub addr: String,
    /// Number of import workers
    pub concurrency: usize,
    /// Samples buffered per worker before a request is sent
    pub batch_size: usize,
    pub flush_interval: Duration,
    /// Gzip request bodies
    pub compress: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Tenant for cluster installations; selects the vminsert URL layout
    pub account_id: Option<String>,
    /// Labels added to every written series
    pub extra_labels: Vec<LabelPair>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_min_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            compress: true,
            user: None,
            password: None,
            account_id: None,
            extra_labels: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_min_delay: DEFAULT_RETRY_MIN_DELAY,
        }
    }
}

impl Config {
    fn base(&self) -> &str {
        self.addr.trim_end_matches('/')
    }

    pub fn import_url(&self) -> String {
        match self.account_id {
            Some(ref id) => format!("{}/insert/{}/prometheus/api/v1/import", self.base(), id),
            None => format!("{}/api/v1/import", self.base()),
        }
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.base())
    }

    fn validate(&self) -> Result<(), ImporterError> {
        let base = self.base();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ImporterError::Config(format!(
                "address {:?} must start with http:// or https://",
                self.addr
            )));
        }
        if self.batch_size == 0 {
            return Err(ImporterError::Config("batch size must be positive".into()));
        }
        if self.flush_interval.is_zero() {
            return Err(ImporterError::Config(
                "flush interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Batching VictoriaMetrics writer
pub struct Importer {
    client: Client,
    health_url: String,
    user: Option<String>,
    password: Option<String>,
    input: Mutex<Option<mpsc::Sender<TimeSeries>>>,
    workers: Mutex<JoinSet<()>>,
    stats: Arc<StatsCollector>,
}

impl Importer {
    /// Create an importer and start its workers
    ///
    /// Must be called from within a tokio runtime. The returned receiver is
    /// the asynchronous error stream; it ends once [`Importer::close`] has
    /// stopped every worker.
    pub fn new(config: Config) -> Result<(Self, mpsc::Receiver<ImportError>), ImporterError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let concurrency = config.concurrency.max(1);
        let stats = Arc::new(StatsCollector::default());

        let writer = Arc::new(Writer {
            client: client.clone(),
            url: config.import_url(),
            user: config.user.clone(),
            password: config.password.clone(),
            compress: config.compress,
            extra_labels: config.extra_labels.clone(),
            max_retries: config.max_retries,
            retry_min_delay: config.retry_min_delay,
            stats: Arc::clone(&stats),
        });

        let (input_tx, input_rx) = mpsc::channel::<TimeSeries>(concurrency);
        let (error_tx, error_rx) = mpsc::channel::<ImportError>(concurrency);
        let input_rx = Arc::new(Mutex::new(input_rx));

        let mut workers = JoinSet::new();
        for id in 0..concurrency {
            let worker = Worker {
                id,
                input: Arc::clone(&input_rx),
                writer: Arc::clone(&writer),
                errors: error_tx.clone(),
                batch_size: config.batch_size,
                flush_interval: config.flush_interval,
            };
            workers.spawn(worker.run());
        }

        tracing::info!(
            url = %writer.url,
            concurrency,
            batch_size = config.batch_size,
            compress = config.compress,
            "Started VictoriaMetrics importer"
        );

        Ok((
            Self {
                client,
                health_url: config.health_url(),
                user: config.user,
                password: config.password,
                input: Mutex::new(Some(input_tx)),
                workers: Mutex::new(workers),
                stats,
            },
            error_rx,
        ))
    }

    /// Check that the destination answers its health endpoint
    pub async fn ping(&self) -> Result<(), ImporterError> {
        let mut request = self.client.get(&self.health_url);
        if let Some(ref user) = self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImporterError::Status {
                status: status.as_u16(),
                url: self.health_url.clone(),
                body,
            });
        }
        Ok(())
    }

    /// Queue a series for import
    ///
    /// Waits while the workers are saturated. Fails with
    /// [`ImporterError::Closed`] once the importer has been closed.
    pub async fn input(&self, ts: TimeSeries) -> Result<(), ImporterError> {
        let sender = self
            .input
            .lock()
            .await
            .clone()
            .ok_or(ImporterError::Closed)?;
        sender.send(ts).await.map_err(|_| ImporterError::Closed)
    }

    /// Stop accepting input, flush pending batches and wait for the workers
    pub async fn close(&self) {
        drop(self.input.lock().await.take());

        let mut workers = self.workers.lock().await;
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Importer worker failed");
            }
        }
        tracing::debug!("Importer closed");
    }

    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

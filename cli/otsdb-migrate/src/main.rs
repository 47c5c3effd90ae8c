// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! otsdb-migrate - copy historical OpenTSDB data into VictoriaMetrics

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use dialoguer::Confirm;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use opentsdb_client::OpenTsdbClient;
use otsdb_migrate::config::{DEFAULT_CONCURRENCY, DEFAULT_QUERY_LIMIT, default_filters};
use otsdb_migrate::{Migrator, MigrationConfig, RunOutcome, parse_retentions};
use vm_importer::{Importer, LabelPair};

const DEFAULT_LOG_FILTER: &str = "otsdb_migrate=info,opentsdb_client=info,vm_importer=info";
const VERBOSE_LOG_FILTER: &str = "otsdb_migrate=debug,opentsdb_client=debug,vm_importer=debug";

#[derive(Parser, Debug)]
#[command(
    name = "otsdb-migrate",
    version,
    about = "Migrate historical data from OpenTSDB into VictoriaMetrics"
)]
struct Cli {
    /// OpenTSDB server address
    #[arg(long, env = "OTSDB_ADDR", default_value = opentsdb_client::DEFAULT_ADDR)]
    otsdb_addr: String,

    /// Number of concurrently running fetch queries to OpenTSDB per metric
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    otsdb_concurrency: usize,

    /// Result limit on metric name and series lookups; should exceed your
    /// largest series count
    #[arg(long, default_value_t = DEFAULT_QUERY_LIMIT)]
    otsdb_query_limit: usize,

    /// Days to shift the starting point of collection back by
    #[arg(long, default_value_t = 0)]
    otsdb_offset_days: i64,

    /// Fixed unix timestamp to start from instead of now
    #[arg(long, default_value_t = 0)]
    otsdb_hard_ts_start: i64,

    /// Retention patterns to collect, e.g. sum-1m-avg:1h:3d. The span must
    /// be a multiple of the row size so that every query lands on whole
    /// HBase rows.
    #[arg(long, required = true, value_delimiter = ',')]
    otsdb_retentions: Vec<String>,

    /// Metric name prefixes to discover (default: a through z)
    #[arg(long, value_delimiter = ',')]
    otsdb_filters: Vec<String>,

    /// Lowercase all names and tag values before writing
    #[arg(long)]
    otsdb_normalize: bool,

    /// OpenTSDB stores millisecond timestamps
    #[arg(long)]
    otsdb_msecstime: bool,

    /// VictoriaMetrics address (single node or vminsert)
    #[arg(long, env = "VM_ADDR", default_value = vm_importer::DEFAULT_ADDR)]
    vm_addr: String,

    /// Number of import workers
    #[arg(long, default_value_t = vm_importer::DEFAULT_CONCURRENCY)]
    vm_concurrency: usize,

    /// Samples per import request
    #[arg(long, default_value_t = vm_importer::DEFAULT_BATCH_SIZE)]
    vm_batch_size: usize,

    /// Gzip import requests
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    vm_compress: bool,

    /// Basic auth user for VictoriaMetrics
    #[arg(long, env = "VM_USERNAME")]
    vm_user: Option<String>,

    /// Basic auth password for VictoriaMetrics
    #[arg(long, env = "VM_PASSWORD", hide_env_values = true)]
    vm_password: Option<String>,

    /// Tenant for cluster installations, e.g. 42 or 42:1
    #[arg(long)]
    vm_account_id: Option<String>,

    /// Extra label added to every series, as name=value (repeatable)
    #[arg(long = "vm-extra-label", value_parser = parse_label)]
    vm_extra_labels: Vec<LabelPair>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    silent: bool,

    /// Disable the per-metric progress bar
    #[arg(long)]
    disable_progress_bar: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_label(s: &str) -> Result<LabelPair, String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok(LabelPair::new(name, value)),
        _ => Err(format!("expected name=value, got {:?}", s)),
    }
}

fn confirm(metrics: usize) -> bool {
    let prompt = format!("Found {} metrics to import. Continue?", metrics);
    let answer = tokio::task::block_in_place(|| {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
    });
    match answer {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!(error = %e, "Confirmation prompt failed");
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string()),
        ))
        .with_writer(std::io::stderr)
        .init();

    // Retentions are validated before anything touches the network.
    let retentions = parse_retentions(&cli.otsdb_retentions, cli.otsdb_offset_days)
        .context("Invalid --otsdb-retentions")?;

    // Must happen before any client is built.
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let source = OpenTsdbClient::new(opentsdb_client::Config {
        addr: cli.otsdb_addr.clone(),
        normalize: cli.otsdb_normalize,
        ..opentsdb_client::Config::default()
    })
    .context("Failed to create OpenTSDB client")?;

    let (importer, import_errors) = Importer::new(vm_importer::Config {
        addr: cli.vm_addr.clone(),
        concurrency: cli.vm_concurrency,
        batch_size: cli.vm_batch_size,
        compress: cli.vm_compress,
        user: cli.vm_user.clone(),
        password: cli.vm_password.clone(),
        account_id: cli.vm_account_id.clone(),
        extra_labels: cli.vm_extra_labels.clone(),
        ..vm_importer::Config::default()
    })
    .context("Failed to create VictoriaMetrics importer")?;

    importer
        .ping()
        .await
        .with_context(|| format!("VictoriaMetrics at {} is not reachable", cli.vm_addr))?;

    tracing::info!(
        source = %source.addr(),
        destination = %cli.vm_addr,
        "OpenTSDB import mode"
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping migration");
                cancel.cancel();
            }
        }
    });

    let filters = if cli.otsdb_filters.is_empty() {
        default_filters()
    } else {
        cli.otsdb_filters.clone()
    };

    let config = MigrationConfig {
        filters,
        query_limit: cli.otsdb_query_limit,
        retentions,
        concurrency: cli.otsdb_concurrency,
        hard_ts_start: cli.otsdb_hard_ts_start,
        msecs_time: cli.otsdb_msecstime,
        silent: cli.silent,
        verbose: cli.verbose,
        show_progress: !cli.disable_progress_bar,
    };

    let migrator = Migrator::new(
        Arc::new(source),
        Arc::new(importer),
        import_errors,
        config,
        cancel,
    );

    match migrator.run(confirm).await.context("Migration failed")? {
        RunOutcome::Completed(summary) => {
            println!("Import finished: {}", summary);
        }
        RunOutcome::Declined => {
            println!("Nothing imported");
        }
    }

    Ok(())
}

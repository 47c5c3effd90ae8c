// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! OpenTSDB to VictoriaMetrics migration
//!
//! Discovers metrics and their series in OpenTSDB, replays each series over
//! the configured retention windows and forwards the datapoints to a
//! VictoriaMetrics importer.

pub mod config;
pub mod error;
pub mod job;
pub mod processor;
pub mod progress;
pub mod retention;
pub mod sink;
pub mod source;
pub mod summary;

pub use config::MigrationConfig;
pub use error::MigrateError;
pub use processor::{Migrator, RunOutcome};
pub use retention::{Retention, RetentionError, TimeRange, parse_retentions};
pub use sink::SeriesSink;
pub use source::SeriesSource;
pub use summary::{MetricSummary, MigrationSummary};

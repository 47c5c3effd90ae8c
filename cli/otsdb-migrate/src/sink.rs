// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Where series are written to

use async_trait::async_trait;
use vm_importer::{Importer, ImporterError, Stats, TimeSeries};

/// Write side of a migration
///
/// `submit` only queues a series. Write failures surface later on the
/// error stream handed to the migrator alongside the sink.
#[async_trait]
pub trait SeriesSink: Send + Sync {
    async fn submit(&self, series: TimeSeries) -> Result<(), ImporterError>;

    /// Flush everything queued and stop; the error stream ends afterwards
    async fn close(&self);

    fn reset_stats(&self);

    fn stats(&self) -> Stats;
}

#[async_trait]
impl SeriesSink for Importer {
    async fn submit(&self, series: TimeSeries) -> Result<(), ImporterError> {
        self.input(series).await
    }

    async fn close(&self) {
        Importer::close(self).await
    }

    fn reset_stats(&self) {
        Importer::reset_stats(self)
    }

    fn stats(&self) -> Stats {
        Importer::stats(self)
    }
}

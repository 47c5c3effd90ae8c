// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str =
    "{spinner:.cyan} {prefix} [{bar:40.cyan/blue}] {pos}/{len} jobs ({percent:>3}%) {elapsed_precise} eta {eta}";

/// Progress bar over the jobs of one metric
///
/// Hidden when disabled or when stderr is not a terminal, so workers can
/// always call `inc` on it.
pub fn metric_bar(metric: &str, jobs: u64, enabled: bool) -> ProgressBar {
    if !enabled || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(jobs);
    let style = ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.set_prefix(metric.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

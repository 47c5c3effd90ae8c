// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Name cleanup applied to query results before they leave the client
//!
//! OpenTSDB allows characters in metric names and tag keys that the
//! Prometheus data model does not. Offending characters are replaced with
//! `_`; with `normalize` enabled everything is lowercased as well.

use std::collections::BTreeMap;

use crate::types::Metric;

fn is_metric_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.')
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub fn sanitize_metric_name(name: &str) -> String {
    name.chars()
        .map(|c| if is_metric_char(c) { c } else { '_' })
        .collect()
}

pub fn sanitize_label_name(name: &str) -> String {
    name.chars()
        .map(|c| if is_label_char(c) { c } else { '_' })
        .collect()
}

/// Clean up the metric name and tags of a query result
pub fn modify_data(data: Metric, normalize: bool) -> Metric {
    let name = if normalize {
        data.metric.to_lowercase()
    } else {
        data.metric
    };

    let tags: BTreeMap<String, String> = data
        .tags
        .into_iter()
        .map(|(key, value)| {
            if normalize {
                (sanitize_label_name(&key.to_lowercase()), value.to_lowercase())
            } else {
                (sanitize_label_name(&key), value)
            }
        })
        .collect();

    Metric {
        metric: sanitize_metric_name(&name),
        tags,
        timestamps: data.timestamps,
        values: data.values,
    }
}

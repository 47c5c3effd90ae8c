// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Series representation and the JSON line encoding used by
//! `/api/v1/import`

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

/// A single `name="value"` label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPair {
    pub name: String,
    pub value: String,
}

impl LabelPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A series ready to be written to VictoriaMetrics
///
/// `timestamps` are unix milliseconds and line up one-to-one with `values`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub name: String,
    pub label_pairs: Vec<LabelPair>,
    pub timestamps: Vec<i64>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn samples(&self) -> usize {
        self.values.len()
    }
}

struct Labels<'a> {
    name: &'a str,
    pairs: &'a [LabelPair],
    extra: &'a [LabelPair],
}

impl Serialize for Labels<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("__name__", self.name)?;
        // Labels without a name cannot be represented and are skipped.
        for pair in self.pairs.iter().chain(self.extra) {
            if pair.name.is_empty() {
                continue;
            }
            map.serialize_entry(&pair.name, &pair.value)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct ImportLine<'a> {
    metric: Labels<'a>,
    values: &'a [f64],
    timestamps: &'a [i64],
}

/// Serialize a batch as newline-delimited JSON
pub(crate) fn encode_batch(
    batch: &[TimeSeries],
    extra_labels: &[LabelPair],
) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    for ts in batch {
        let line = ImportLine {
            metric: Labels {
                name: &ts.name,
                pairs: &ts.label_pairs,
                extra: extra_labels,
            },
            values: &ts.values,
            timestamps: &ts.timestamps,
        };
        serde_json::to_writer(&mut out, &line)?;
        out.push(b'\n');
    }
    Ok(out)
}

pub(crate) fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 4), Compression::fast());
    encoder.write_all(data)?;
    encoder.finish()
}

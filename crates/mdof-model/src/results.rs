//! Analysis result containers.
//!
//! - [`Trajectory`]: in-memory response history of one transient run
//! - [`PushoverCurve`]: capacity curve of one static pushover
//! - [`IdaTable`]: one [`IdaResultRow`] per (record, intensity) task

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Response snapshot at one converged time step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    pub time: f64,
    /// Story deformation, story 1 first [m]
    pub drift: Vec<f64>,
    /// Story shear force [N]
    pub force: Vec<f64>,
    /// Floor absolute acceleration [m/s²]
    pub abs_accel: Vec<f64>,
    /// Floor acceleration relative to the ground [m/s²]
    pub rel_accel: Vec<f64>,
}

/// Response history owned by a single model instance
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Trajectory {
    story_count: usize,
    samples: Vec<TrajectorySample>,
}

impl Trajectory {
    pub fn new(story_count: usize) -> Self {
        Self {
            story_count,
            samples: Vec::new(),
        }
    }

    pub fn story_count(&self) -> usize {
        self.story_count
    }

    pub fn push(&mut self, sample: TrajectorySample) {
        debug_assert_eq!(sample.drift.len(), self.story_count);
        self.samples.push(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    pub fn last_time(&self) -> Option<f64> {
        self.samples.last().map(|s| s.time)
    }

    /// Max |drift| per story over the whole run
    pub fn max_drift(&self) -> Vec<f64> {
        self.envelope(|s| &s.drift)
    }

    /// Max |absolute acceleration| per floor
    pub fn max_abs_accel(&self) -> Vec<f64> {
        self.envelope(|s| &s.abs_accel)
    }

    /// Max |relative acceleration| per floor
    pub fn max_rel_accel(&self) -> Vec<f64> {
        self.envelope(|s| &s.rel_accel)
    }

    /// Max |drift| over stories at the final recorded sample
    pub fn residual_drift(&self) -> f64 {
        self.samples
            .last()
            .map(|s| s.drift.iter().fold(0.0_f64, |acc, d| acc.max(d.abs())))
            .unwrap_or(0.0)
    }

    /// `(time, drift, force)` history of story `story` (0-based)
    pub fn story_history(&self, story: usize) -> Vec<(f64, f64, f64)> {
        self.samples
            .iter()
            .filter_map(|s| Some((s.time, *s.drift.get(story)?, *s.force.get(story)?)))
            .collect()
    }

    fn envelope<F>(&self, field: F) -> Vec<f64>
    where
        F: Fn(&TrajectorySample) -> &Vec<f64>,
    {
        let mut peaks = vec![0.0_f64; self.story_count];
        for sample in &self.samples {
            for (peak, value) in peaks.iter_mut().zip(field(sample)) {
                *peak = peak.max(value.abs());
            }
        }
        peaks
    }
}

/// One converged displacement-control increment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushoverSample {
    /// Displacement of the control floor [m]
    pub control_disp: f64,
    /// First-story shear [N]
    pub base_shear: f64,
    pub drift: Vec<f64>,
    pub force: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PushoverCurve {
    pub samples: Vec<PushoverSample>,
    /// All targets were reached
    pub finished: bool,
    /// Number of targets reached before a halt
    pub targets_reached: usize,
}

impl PushoverCurve {
    pub fn peak_base_shear(&self) -> f64 {
        self.samples
            .iter()
            .fold(0.0_f64, |acc, s| acc.max(s.base_shear.abs()))
    }
}

/// Identity of an IDA row: record identifier and exact intensity value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub record: String,
    intensity_bits: u64,
}

impl RowKey {
    pub fn new(record: impl Into<String>, intensity: f64) -> Self {
        Self {
            record: record.into(),
            intensity_bits: intensity.to_bits(),
        }
    }

    pub fn intensity(&self) -> f64 {
        f64::from_bits(self.intensity_bits)
    }
}

/// Outcome of one (record, intensity) analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdaResultRow {
    /// Target spectral acceleration [g]
    pub intensity: f64,
    pub record: String,
    pub scale_factor: f64,
    pub max_drift: Vec<f64>,
    pub max_abs_accel: Vec<f64>,
    pub max_rel_accel: Vec<f64>,
    pub residual_drift: f64,
    pub finished: bool,
    pub reached_time: f64,
    pub total_time: f64,
    /// Task-local failure, if the analysis could not run
    #[serde(default)]
    pub error: Option<String>,
}

impl IdaResultRow {
    /// Row for a task that never produced a response
    pub fn failed(
        intensity: f64,
        record: impl Into<String>,
        story_count: usize,
        total_time: f64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            intensity,
            record: record.into(),
            scale_factor: 0.0,
            max_drift: vec![0.0; story_count],
            max_abs_accel: vec![0.0; story_count],
            max_rel_accel: vec![0.0; story_count],
            residual_drift: 0.0,
            finished: false,
            reached_time: 0.0,
            total_time,
            error: Some(error.into()),
        }
    }

    pub fn key(&self) -> RowKey {
        RowKey::new(self.record.clone(), self.intensity)
    }

    /// Largest story drift of the row
    pub fn peak_drift(&self) -> f64 {
        self.max_drift.iter().fold(0.0_f64, |acc, d| acc.max(*d))
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Result table keyed by (record, intensity)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdaTable {
    rows: Vec<IdaResultRow>,
    keys: BTreeSet<RowKey>,
}

impl IdaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = IdaResultRow>) -> Result<Self, ModelError> {
        let mut table = Self::new();
        for row in rows {
            table.insert(row)?;
        }
        Ok(table)
    }

    /// Append a row; fails if its key is already present
    pub fn insert(&mut self, row: IdaResultRow) -> Result<(), ModelError> {
        if !self.keys.insert(row.key()) {
            return Err(ModelError::DuplicateRow {
                record: row.record,
                intensity: row.intensity,
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[IdaResultRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<IdaResultRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &RowKey> {
        self.keys.iter()
    }

    pub fn get(&self, record: &str, intensity: f64) -> Option<&IdaResultRow> {
        self.rows
            .iter()
            .find(|r| r.record == record && r.intensity.to_bits() == intensity.to_bits())
    }

    /// Rows of one record in insertion order
    pub fn rows_for_record<'a>(&'a self, record: &'a str) -> impl Iterator<Item = &'a IdaResultRow> {
        self.rows.iter().filter(move |r| r.record == record)
    }

    pub fn finished_count(&self) -> usize {
        self.rows.iter().filter(|r| r.finished).count()
    }

    pub fn failed_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_failed()).count()
    }

    /// Sort rows by record identifier, then intensity
    pub fn sort(&mut self) {
        self.rows.sort_by(|a, b| {
            a.record
                .cmp(&b.record)
                .then(a.intensity.total_cmp(&b.intensity))
        });
    }
}

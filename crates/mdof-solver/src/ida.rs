//! Incremental dynamic analysis batch.
//!
//! Every (record, intensity) pair is one [`AnalysisTask`]: the record is
//! scaled to the intensity at the building's fundamental period, a fresh
//! [`MdofModel`] runs the transient analysis from rest, and the task yields
//! exactly one [`IdaResultRow`].
//!
//! # Scheduling
//!
//! - Work is partitioned by record; one worker runs all intensities of a
//!   record in the configured order
//! - Records run in parallel on a rayon pool of `pool_size` threads
//!   (`pool_size == 1` runs on the calling thread)
//! - Task errors and panics become failed rows; only batch validation can
//!   fail the whole run

use crate::dynamic_solver::TimeStep;
use crate::error::{Result, SolverError};
use crate::ladder::LadderConfig;
use crate::model::MdofModel;
use crate::scaling::{DEFAULT_SPECTRAL_DAMPING, RecordScaler};
use log::{debug, info, warn};
use mdof_model::{GroundMotionRecord, IdaResultRow, IdaTable, StructuralParameters};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

/// IDA batch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdaConfig {
    /// Target spectral accelerations [g], run in this order per record
    pub intensities: Vec<f64>,
    /// Period of the intensity measure; the model's T1 when absent [s]
    pub period: Option<f64>,
    pub time_step: TimeStep,
    /// Worker threads
    pub pool_size: usize,
    /// Damping ratio of the intensity measure
    pub spectral_damping: f64,
}

impl Default for IdaConfig {
    fn default() -> Self {
        Self {
            intensities: Vec::new(),
            period: None,
            time_step: TimeStep::AsInRecord,
            pool_size: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            spectral_damping: DEFAULT_SPECTRAL_DAMPING,
        }
    }
}

impl IdaConfig {
    pub fn new(intensities: Vec<f64>) -> Self {
        Self {
            intensities,
            ..Self::default()
        }
    }

    pub fn with_period(mut self, period: f64) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_time_step(mut self, time_step: TimeStep) -> Self {
        self.time_step = time_step;
        self
    }

    /// `count` evenly spaced values from `start` to `stop` inclusive
    pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
        match count {
            0 => Vec::new(),
            1 => vec![start],
            _ => {
                let step = (stop - start) / (count - 1) as f64;
                (0..count)
                    .map(|i| {
                        if i == count - 1 {
                            stop
                        } else {
                            start + step * i as f64
                        }
                    })
                    .collect()
            }
        }
    }
}

/// One (record, intensity) unit of work
#[derive(Debug, Clone, Copy)]
pub struct AnalysisTask<'a> {
    pub record: &'a GroundMotionRecord,
    pub intensity: f64,
    pub scale_factor: f64,
}

/// Runs an IDA batch over shared, immutable structural parameters
pub struct IdaRunner<'a> {
    parameters: &'a StructuralParameters,
    config: IdaConfig,
    ladder: LadderConfig,
}

impl<'a> IdaRunner<'a> {
    pub fn new(parameters: &'a StructuralParameters, config: IdaConfig) -> Self {
        Self {
            parameters,
            config,
            ladder: LadderConfig::default(),
        }
    }

    /// Solution-strategy ladder handed to every task's model
    pub fn with_ladder(mut self, ladder: LadderConfig) -> Self {
        self.ladder = ladder;
        self
    }

    pub fn config(&self) -> &IdaConfig {
        &self.config
    }

    /// Run every (record, intensity) task and collect one row per task
    pub fn run(&self, records: &[GroundMotionRecord]) -> Result<IdaTable> {
        self.run_with(records, |task| self.run_task(task))
    }

    fn run_with<F>(&self, records: &[GroundMotionRecord], task_fn: F) -> Result<IdaTable>
    where
        F: Fn(AnalysisTask<'_>) -> Result<IdaResultRow> + Sync,
    {
        self.validate(records)?;
        let period = self.resolve_period()?;
        let started = Instant::now();

        info!(
            "IDA: {} records x {} intensities on {} worker(s), T = {period:.4} s",
            records.len(),
            self.config.intensities.len(),
            self.config.pool_size
        );

        let per_record: Vec<Vec<IdaResultRow>> = if self.config.pool_size == 1 {
            records
                .iter()
                .map(|record| self.run_record(record, period, &task_fn))
                .collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.pool_size)
                .build()
                .map_err(|e| SolverError::ThreadPool(e.to_string()))?;
            pool.install(|| {
                records
                    .par_iter()
                    .map(|record| self.run_record(record, period, &task_fn))
                    .collect()
            })
        };

        let table = IdaTable::from_rows(per_record.into_iter().flatten())?;
        info!(
            "IDA complete in {:.2?}: {} rows, {} finished, {} failed",
            started.elapsed(),
            table.len(),
            table.finished_count(),
            table.failed_count()
        );
        Ok(table)
    }

    fn validate(&self, records: &[GroundMotionRecord]) -> Result<()> {
        let config = &self.config;
        if records.is_empty() {
            return Err(SolverError::InvalidBatch("no ground-motion records".to_string()));
        }
        if config.intensities.is_empty() {
            return Err(SolverError::InvalidBatch("no intensity levels".to_string()));
        }
        if config.pool_size == 0 {
            return Err(SolverError::InvalidBatch("pool size must be at least 1".to_string()));
        }
        if let Some(im) = config
            .intensities
            .iter()
            .find(|im| !(im.is_finite() && **im > 0.0))
        {
            return Err(SolverError::InvalidBatch(format!(
                "intensity {im} is not positive"
            )));
        }
        let mut seen = HashSet::new();
        if let Some(im) = config
            .intensities
            .iter()
            .find(|im| !seen.insert(im.to_bits()))
        {
            return Err(SolverError::InvalidBatch(format!("duplicate intensity {im}")));
        }
        let mut ids = HashSet::new();
        if let Some(record) = records.iter().find(|r| !ids.insert(r.id())) {
            return Err(SolverError::InvalidBatch(format!(
                "duplicate record identifier '{}'",
                record.id()
            )));
        }
        if let Some(period) = config.period
            && !(period.is_finite() && period > 0.0)
        {
            return Err(SolverError::InvalidBatch(format!(
                "intensity period must be positive, got {period}"
            )));
        }
        Ok(())
    }

    fn resolve_period(&self) -> Result<f64> {
        match self.config.period {
            Some(period) => Ok(period),
            None => Ok(MdofModel::new(self.parameters)?.fundamental_period()),
        }
    }

    /// All intensities of one record, in order. The spectral ordinate is
    /// computed once per record.
    fn run_record<F>(
        &self,
        record: &GroundMotionRecord,
        period: f64,
        task_fn: &F,
    ) -> Vec<IdaResultRow>
    where
        F: Fn(AnalysisTask<'_>) -> Result<IdaResultRow> + Sync,
    {
        let scaler = RecordScaler::new(period).with_damping(self.config.spectral_damping);
        let sa = scaler.spectral_acceleration(record);
        debug!("record '{}': SA({period:.4} s) = {sa:.5} g", record.id());

        self.config
            .intensities
            .iter()
            .map(|&intensity| {
                let attempt = catch_unwind(AssertUnwindSafe(|| {
                    let scale_factor = scaler.scale_from_ordinate(record.id(), sa, intensity)?;
                    task_fn(AnalysisTask {
                        record,
                        intensity,
                        scale_factor,
                    })
                }));
                let error = match attempt {
                    Ok(Ok(row)) => return row,
                    Ok(Err(e)) => e.to_string(),
                    Err(payload) => format!("analysis panicked: {}", panic_message(&*payload)),
                };
                warn!(
                    "record '{}' at {intensity} g failed: {error}",
                    record.id()
                );
                IdaResultRow::failed(
                    intensity,
                    record.id(),
                    self.parameters.story_count,
                    record.duration(),
                    error,
                )
            })
            .collect()
    }

    fn run_task(&self, task: AnalysisTask<'_>) -> Result<IdaResultRow> {
        let mut model = MdofModel::new(self.parameters)?.with_ladder(self.ladder.clone());
        let outcome = model.run_dynamic(task.record, task.scale_factor, self.config.time_step)?;

        debug!(
            "record '{}' at {} g (x{:.4}): finished = {}",
            task.record.id(),
            task.intensity,
            task.scale_factor,
            outcome.finished
        );

        Ok(IdaResultRow {
            intensity: task.intensity,
            record: task.record.id().to_string(),
            scale_factor: task.scale_factor,
            max_drift: model.max_drift(),
            max_abs_accel: model.max_abs_accel(),
            max_rel_accel: model.max_rel_accel(),
            residual_drift: model.residual_drift(),
            finished: outcome.finished,
            reached_time: outcome.reached_time,
            total_time: outcome.total_time,
            error: None,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

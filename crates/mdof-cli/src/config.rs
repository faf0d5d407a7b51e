//! JSON job file.
//!
//! ```json
//! {
//!   "structure": {
//!     "story_count": 3,
//!     "masses": [1000, 1000, 1000],
//!     "stiffnesses": [1.0e6, 1.0e6, 1.0e6],
//!     "damping_ratio": 0.05,
//!     "hysteretic_curve": "Elastic"
//!   },
//!   "catalog": "records/MetaData.txt",
//!   "intensities": { "start": 0.1, "stop": 2.0, "count": 10 },
//!   "time_step": { "fixed": 0.01 },
//!   "pool_size": 4,
//!   "output": "IDA_results.csv"
//! }
//! ```
//!
//! Relative paths are taken from the job file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use mdof_io::{RecordCatalog, load_record};
use mdof_model::{GroundMotionRecord, StructuralParameters};
use mdof_solver::{IdaConfig, LadderConfig, TimeStep};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordSource {
    pub path: PathBuf,
    /// Sample step; required for flat series
    #[serde(default)]
    pub dt: Option<f64>,
}

/// Explicit intensity list or an evenly spaced range
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Intensities {
    List(Vec<f64>),
    Linspace { start: f64, stop: f64, count: usize },
}

impl Default for Intensities {
    fn default() -> Self {
        Intensities::List(Vec::new())
    }
}

impl Intensities {
    pub fn values(&self) -> Vec<f64> {
        match self {
            Intensities::List(values) => values.clone(),
            Intensities::Linspace { start, stop, count } => {
                IdaConfig::linspace(*start, *stop, *count)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobFile {
    pub structure: StructuralParameters,
    #[serde(default)]
    pub records: Vec<RecordSource>,
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    #[serde(default)]
    pub intensities: Intensities,
    /// Intensity-measure period; the model's T1 when absent
    #[serde(default)]
    pub period: Option<f64>,
    #[serde(default)]
    pub time_step: TimeStep,
    #[serde(default)]
    pub pool_size: Option<usize>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub ladder: Option<LadderConfig>,

    /// Directory of the job file
    #[serde(skip)]
    base_dir: PathBuf,
}

impl JobFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading job file {}", path.display()))?;
        let mut job: JobFile = serde_json::from_str(&text)
            .with_context(|| format!("parsing job file {}", path.display()))?;
        job.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(job)
    }

    /// `path` relative to the job file
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn ladder(&self) -> LadderConfig {
        self.ladder.clone().unwrap_or_default()
    }

    pub fn ida_config(&self) -> IdaConfig {
        let mut config = IdaConfig::new(self.intensities.values()).with_time_step(self.time_step);
        config.period = self.period;
        if let Some(pool_size) = self.pool_size {
            config.pool_size = pool_size;
        }
        config
    }

    /// Catalog records first, then the explicit list
    pub fn load_records(&self) -> Result<Vec<GroundMotionRecord>> {
        let mut records = Vec::new();
        if let Some(catalog) = &self.catalog {
            let path = self.resolve(catalog);
            let catalog = RecordCatalog::read(&path)
                .with_context(|| format!("reading catalog {}", path.display()))?;
            records.extend(catalog.load_records()?);
        }
        for source in &self.records {
            let path = self.resolve(&source.path);
            let record = load_record(&path, source.dt)
                .with_context(|| format!("reading record {}", path.display()))?;
            records.push(record);
        }
        if records.is_empty() {
            bail!("job lists no ground-motion records");
        }
        Ok(records)
    }
}

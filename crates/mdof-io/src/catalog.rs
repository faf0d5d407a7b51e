//! Record catalogs.
//!
//! A catalog is comma-separated text with a header row. The `AccelXfile`
//! column names each record file relative to the catalog; an optional `dt`
//! column gives the step of flat series. Other columns are ignored.
//!
//! ```text
//! ID,EQID,AccelXfile,dt
//! 1,12011,RSN953_NORTHR_MUL009.txt,
//! 2,12012,flat_record.dat,0.01
//! ```
//!
//! A listed file that does not exist is looked up again with an `.AT2`
//! (then `.at2`) extension, so catalogs naming converted text files still
//! resolve to the PEER originals.

use std::path::{Path, PathBuf};

use log::debug;
use mdof_model::GroundMotionRecord;

use crate::error::{IoError, Result};
use crate::record::{load_record, read_text};

pub const FILE_COLUMN: &str = "AccelXfile";
pub const DT_COLUMN: &str = "dt";

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Record file relative to the catalog directory
    pub file: PathBuf,
    pub dt: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordCatalog {
    root: PathBuf,
    entries: Vec<CatalogEntry>,
}

impl RecordCatalog {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_text(path)?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::parse(&text, root)
    }

    /// Parse catalog text whose record paths are relative to `root`
    pub fn parse(text: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| IoError::Catalog("empty catalog".to_string()))?;
        let columns = split_row(header);
        let file_col = columns
            .iter()
            .position(|c| c == FILE_COLUMN)
            .ok_or_else(|| IoError::Catalog(format!("missing '{FILE_COLUMN}' column")))?;
        let dt_col = columns.iter().position(|c| c.eq_ignore_ascii_case(DT_COLUMN));

        let mut entries = Vec::new();
        for (row, line) in lines.enumerate() {
            let cells = split_row(line);
            let file = cells
                .get(file_col)
                .filter(|f| !f.is_empty())
                .ok_or_else(|| IoError::Catalog(format!("row {} has no record file", row + 1)))?;
            let dt = match dt_col.and_then(|i| cells.get(i)).filter(|s| !s.is_empty()) {
                Some(s) => Some(s.parse::<f64>().map_err(|_| {
                    IoError::Catalog(format!("row {} has invalid dt '{s}'", row + 1))
                })?),
                None => None,
            };
            entries.push(CatalogEntry {
                file: PathBuf::from(file),
                dt,
            });
        }

        Ok(Self {
            root: root.into(),
            entries,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Existing file for `entry`, trying PEER extensions as a fallback
    pub fn resolve(&self, entry: &CatalogEntry) -> Result<PathBuf> {
        let listed = self.root.join(&entry.file);
        if listed.is_file() {
            return Ok(listed);
        }
        ["AT2", "at2"]
            .iter()
            .map(|ext| listed.with_extension(ext))
            .find(|p| p.is_file())
            .ok_or_else(|| IoError::FileNotFound(listed.display().to_string()))
    }

    /// Load every listed record, in catalog order
    pub fn load_records(&self) -> Result<Vec<GroundMotionRecord>> {
        self.entries
            .iter()
            .map(|entry| {
                let path = self.resolve(entry)?;
                debug!("loading record {}", path.display());
                load_record(&path, entry.dt)
            })
            .collect()
    }
}

fn split_row(line: &str) -> Vec<String> {
    line.split(',')
        .map(|cell| cell.trim().trim_matches('"').to_string())
        .collect()
}

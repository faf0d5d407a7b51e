//! Ground-motion record files.
//!
//! Two layouts are read, both in units of g:
//!
//! - **Flat**: whitespace- or line-delimited samples at a uniform `dt`
//!   supplied by the caller; `#` starts a comment line
//! - **PEER NGA `.AT2`**: four header lines, the fourth carrying the sample
//!   count and step (`NPTS=  5590, DT=   .0050 SEC` or the older
//!   `5590  0.0050  NPTS, DT`), followed by the samples
//!
//! The record identifier is the file stem.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use mdof_model::GroundMotionRecord;

use crate::error::{IoError, Result};

const AT2_HEADER_LINES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Flat,
    PeerAt2,
}

impl RecordFormat {
    /// `.at2` in any case is PEER, everything else flat
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("at2") => RecordFormat::PeerAt2,
            _ => RecordFormat::Flat,
        }
    }
}

/// Identifier for a record read from `path`
pub fn record_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read a record, dispatching on the file extension. Flat files need `dt`;
/// for AT2 files a given `dt` must agree with the header.
pub fn load_record(path: impl AsRef<Path>, dt: Option<f64>) -> Result<GroundMotionRecord> {
    let path = path.as_ref();
    match RecordFormat::from_path(path) {
        RecordFormat::PeerAt2 => {
            let record = read_at2_record(path)?;
            if let Some(dt) = dt
                && (dt - record.dt()).abs() > 1e-9 * dt.abs().max(1.0)
            {
                return Err(IoError::parse(
                    path,
                    format!("header DT = {} disagrees with dt = {dt}", record.dt()),
                ));
            }
            Ok(record)
        }
        RecordFormat::Flat => {
            let dt = dt.ok_or_else(|| {
                IoError::parse(path, "flat acceleration series needs an explicit dt")
            })?;
            read_flat_record(path, dt)
        }
    }
}

pub fn read_flat_record(path: impl AsRef<Path>, dt: f64) -> Result<GroundMotionRecord> {
    let path = path.as_ref();
    let text = read_text(path)?;
    parse_flat(&text, record_id(path), dt, path)
}

pub fn read_at2_record(path: impl AsRef<Path>) -> Result<GroundMotionRecord> {
    let path = path.as_ref();
    let text = read_text(path)?;
    parse_at2(&text, record_id(path), path)
}

/// Parse a flat series; `origin` only labels errors
pub fn parse_flat(
    text: &str,
    id: impl Into<String>,
    dt: f64,
    origin: impl AsRef<Path>,
) -> Result<GroundMotionRecord> {
    let lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));
    let accel = parse_samples(lines, origin.as_ref())?;
    Ok(GroundMotionRecord::new(id, dt, accel)?)
}

/// Parse a PEER NGA `.AT2` file; `origin` only labels errors
pub fn parse_at2(
    text: &str,
    id: impl Into<String>,
    origin: impl AsRef<Path>,
) -> Result<GroundMotionRecord> {
    let origin = origin.as_ref();
    let mut lines = text.lines();
    let header: Vec<&str> = lines.by_ref().take(AT2_HEADER_LINES).collect();
    if header.len() < AT2_HEADER_LINES {
        return Err(IoError::parse(origin, "truncated AT2 header"));
    }
    let (npts, dt) = parse_at2_counts(header[AT2_HEADER_LINES - 1])
        .ok_or_else(|| IoError::parse(origin, "AT2 header lacks NPTS and DT"))?;

    let mut accel = parse_samples(lines.map(str::trim).filter(|l| !l.is_empty()), origin)?;
    if accel.len() < npts {
        return Err(IoError::parse(
            origin,
            format!("header declares {npts} samples, found {}", accel.len()),
        ));
    }
    accel.truncate(npts);
    Ok(GroundMotionRecord::new(id, dt, accel)?)
}

/// `(npts, dt)` from the fourth header line
fn parse_at2_counts(line: &str) -> Option<(usize, f64)> {
    let cleaned = line.to_ascii_uppercase().replace([',', '='], " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();

    let after = |key: &str| {
        tokens
            .iter()
            .position(|t| *t == key)
            .and_then(|i| tokens.get(i + 1))
            .and_then(|t| t.parse::<f64>().ok())
    };
    if let (Some(npts), Some(dt)) = (after("NPTS"), after("DT")) {
        return Some((npts as usize, dt));
    }

    // Older layout: the two numbers precede the labels
    let mut numbers = tokens.iter().filter_map(|t| t.parse::<f64>().ok());
    let npts = numbers.next()?;
    let dt = numbers.next()?;
    Some((npts as usize, dt))
}

fn parse_samples<'a>(lines: impl Iterator<Item = &'a str>, origin: &Path) -> Result<Vec<f64>> {
    let mut samples = Vec::new();
    for (index, line) in lines.enumerate() {
        for token in line.split(|c: char| c.is_whitespace() || c == ',') {
            if token.is_empty() {
                continue;
            }
            let value = token.parse::<f64>().map_err(|_| {
                IoError::parse(origin, format!("bad sample '{token}' on data line {}", index + 1))
            })?;
            samples.push(value);
        }
    }
    Ok(samples)
}

/// Missing files map to [`IoError::FileNotFound`], other failures pass through
pub(crate) fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => IoError::FileNotFound(path.display().to_string()),
        _ => IoError::Io(err),
    })
}

/// Write the samples one per line
pub fn write_flat_record(path: impl AsRef<Path>, record: &GroundMotionRecord) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(fs::File::create(path)?);
    for a in record.accel() {
        writeln!(out, "{a:e}")?;
    }
    out.flush()?;
    Ok(())
}

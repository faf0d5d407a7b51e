//! Result table writers.
//!
//! The IDA table CSV is the hand-off to loss estimation; its column order is
//! fixed by [`IDA_CSV_HEADER`]. Per-story columns are written as a quoted
//! bracketed list, e.g. `"[0.0123, 0.0101, 0.0054]"`.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use mdof_model::{IdaResultRow, IdaTable, PushoverCurve, Trajectory};

use crate::error::Result;

pub const IDA_CSV_HEADER: &str = "intensity,record,scale_factor,max_drift,max_abs_accel,max_rel_accel,residual_drift,finished,reached_time,total_time,error";

/// Write one CSV line per row, header first
pub fn write_ida_csv_to<W: Write>(mut out: W, table: &IdaTable) -> Result<()> {
    writeln!(out, "{IDA_CSV_HEADER}")?;
    for row in table.rows() {
        writeln!(out, "{}", ida_csv_line(row))?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_ida_csv(path: impl AsRef<Path>, table: &IdaTable) -> Result<()> {
    let file = create(path.as_ref())?;
    write_ida_csv_to(BufWriter::new(file), table)
}

fn ida_csv_line(row: &IdaResultRow) -> String {
    [
        row.intensity.to_string(),
        csv_text(&row.record),
        row.scale_factor.to_string(),
        csv_list(&row.max_drift),
        csv_list(&row.max_abs_accel),
        csv_list(&row.max_rel_accel),
        row.residual_drift.to_string(),
        row.finished.to_string(),
        row.reached_time.to_string(),
        row.total_time.to_string(),
        row.error.as_deref().map(csv_text).unwrap_or_default(),
    ]
    .join(",")
}

/// Rows as a pretty JSON array
pub fn write_ida_json(path: impl AsRef<Path>, table: &IdaTable) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(table.rows())?;
    let mut file = create(path.as_ref())?;
    file.write_all(&bytes)?;
    Ok(())
}

pub fn read_ida_json(path: impl AsRef<Path>) -> Result<IdaTable> {
    let bytes = fs::read(path)?;
    let rows: Vec<IdaResultRow> = serde_json::from_slice(&bytes)?;
    Ok(IdaTable::from_rows(rows)?)
}

/// `time, drift_i.., force_i.., abs_accel_i.., rel_accel_i..`
pub fn write_trajectory_csv(path: impl AsRef<Path>, trajectory: &Trajectory) -> Result<()> {
    let mut out = BufWriter::new(create(path.as_ref())?);
    let n = trajectory.story_count();
    let mut header = vec!["time".to_string()];
    for name in ["drift", "force", "abs_accel", "rel_accel"] {
        header.extend((1..=n).map(|i| format!("{name}_{i}")));
    }
    writeln!(out, "{}", header.join(","))?;

    for sample in trajectory.samples() {
        let fields: Vec<String> = std::iter::once(sample.time)
            .chain(sample.drift.iter().copied())
            .chain(sample.force.iter().copied())
            .chain(sample.abs_accel.iter().copied())
            .chain(sample.rel_accel.iter().copied())
            .map(|v| v.to_string())
            .collect();
        writeln!(out, "{}", fields.join(","))?;
    }
    out.flush()?;
    Ok(())
}

/// `control_disp, base_shear, drift_i.., force_i..`
pub fn write_pushover_csv(path: impl AsRef<Path>, curve: &PushoverCurve) -> Result<()> {
    let mut out = BufWriter::new(create(path.as_ref())?);
    let n = curve.samples.first().map(|s| s.drift.len()).unwrap_or(0);
    let mut header = vec!["control_disp".to_string(), "base_shear".to_string()];
    for name in ["drift", "force"] {
        header.extend((1..=n).map(|i| format!("{name}_{i}")));
    }
    writeln!(out, "{}", header.join(","))?;

    for sample in &curve.samples {
        let fields: Vec<String> = [sample.control_disp, sample.base_shear]
            .into_iter()
            .chain(sample.drift.iter().copied())
            .chain(sample.force.iter().copied())
            .map(|v| v.to_string())
            .collect();
        writeln!(out, "{}", fields.join(","))?;
    }
    out.flush()?;
    Ok(())
}

fn create(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(fs::File::create(path)?)
}

fn csv_list(values: &[f64]) -> String {
    let items: Vec<String> = values.iter().map(f64::to_string).collect();
    format!("\"[{}]\"", items.join(", "))
}

/// Quote text holding separators or quotes
fn csv_text(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(record: &str, intensity: f64) -> IdaResultRow {
        IdaResultRow {
            intensity,
            record: record.to_string(),
            scale_factor: 2.5,
            max_drift: vec![0.01, 0.02],
            max_abs_accel: vec![3.0, 4.5],
            max_rel_accel: vec![1.0, 2.0],
            residual_drift: 0.001,
            finished: true,
            reached_time: 10.0,
            total_time: 10.0,
            error: None,
        }
    }

    #[test]
    fn csv_line_quotes_lists() {
        assert_eq!(
            ida_csv_line(&row("R1", 0.5)),
            "0.5,R1,2.5,\"[0.01, 0.02]\",\"[3, 4.5]\",\"[1, 2]\",0.001,true,10,10,"
        );
    }

    #[test]
    fn csv_line_escapes_error_text() {
        let failed = IdaResultRow::failed(0.2, "R2", 1, 8.0, "bad \"thing\", really");
        let line = ida_csv_line(&failed);
        assert!(line.ends_with(",false,0,8,\"bad \"\"thing\"\", really\""));
    }

    #[test]
    fn writes_header_then_rows() {
        let table = IdaTable::from_rows(vec![row("R1", 0.5), row("R1", 1.0)]).unwrap();
        let mut buffer = Vec::new();
        write_ida_csv_to(&mut buffer, &table).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], IDA_CSV_HEADER);
        assert!(lines[2].starts_with("1,R1,"));
    }
}

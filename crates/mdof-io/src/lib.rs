//! File interchange for shear-building seismic analysis.
//!
//! This crate provides:
//! - **Record readers** for flat acceleration series and PEER NGA `.AT2` files
//! - **Record catalogs** listing the records of an IDA batch
//! - **Table writers** for IDA results (CSV/JSON), response histories and
//!   pushover curves

pub mod catalog;
pub mod error;
pub mod record;
pub mod tables;

pub use catalog::{CatalogEntry, RecordCatalog};
pub use error::{IoError, Result};
pub use record::{
    RecordFormat, load_record, parse_at2, parse_flat, read_at2_record, read_flat_record,
    record_id, write_flat_record,
};
pub use tables::{
    IDA_CSV_HEADER, read_ida_json, write_ida_csv, write_ida_csv_to, write_ida_json,
    write_pushover_csv, write_trajectory_csv,
};

//! Immutable data model for MDOF lumped-mass building analyses.
//!
//! This crate holds the types shared by the I/O layer and the solver:
//! - **Structural parameters** of a shear-building archetype and its
//!   hysteretic backbone curves
//! - **Ground-motion records** (uniformly sampled acceleration series in g)
//! - **Result types**: trajectory samples, pushover samples and the IDA
//!   result table consumed by the loss-estimation stage

pub mod error;
pub mod record;
pub mod results;
pub mod structure;

pub use error::ModelError;
pub use record::GroundMotionRecord;
pub use results::{
    IdaResultRow, IdaTable, PushoverCurve, PushoverSample, RowKey, Trajectory, TrajectorySample,
};
pub use structure::{
    BackboneParameters, HystereticCurveType, StoryBackbone, StructuralParameters,
};

/// Gravitational acceleration used to convert record units (g) to m/s².
pub const GRAVITY: f64 = 9.8;

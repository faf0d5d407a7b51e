//! Intensity scaling of ground-motion records.
//!
//! `scale = IM / SA(T)` where `SA(T)` is the record's pseudo-acceleration
//! at the target period, so the scaled record has spectral intensity `IM`
//! (both in g).

use crate::error::{Result, SolverError};
use crate::spectrum::spectral_acceleration;
use mdof_model::GroundMotionRecord;

/// Damping ratio of the intensity measure
pub const DEFAULT_SPECTRAL_DAMPING: f64 = 0.05;

/// Scales records to a target spectral acceleration at a fixed period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordScaler {
    pub period: f64,
    pub damping: f64,
}

impl RecordScaler {
    pub fn new(period: f64) -> Self {
        Self {
            period,
            damping: DEFAULT_SPECTRAL_DAMPING,
        }
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// SA of `record` at the scaler's period; ordinates cached on the record
    /// take precedence over integration
    pub fn spectral_acceleration(&self, record: &GroundMotionRecord) -> f64 {
        record.cached_ordinate(self.period).unwrap_or_else(|| {
            spectral_acceleration(record.accel(), record.dt(), self.period, self.damping)
        })
    }

    /// Factor bringing `record` to `intensity`
    pub fn scale_factor(&self, record: &GroundMotionRecord, intensity: f64) -> Result<f64> {
        let sa = self.spectral_acceleration(record);
        self.scale_from_ordinate(record.id(), sa, intensity)
    }

    /// Factor from an already computed ordinate `sa`
    pub fn scale_from_ordinate(&self, record_id: &str, sa: f64, intensity: f64) -> Result<f64> {
        if !(intensity.is_finite() && intensity > 0.0) {
            return Err(SolverError::InvalidInput(format!(
                "intensity must be positive, got {intensity}"
            )));
        }
        if !(sa.is_finite() && sa > 0.0) {
            return Err(SolverError::DegenerateSpectrum {
                record: record_id.to_string(),
                period: self.period,
            });
        }
        let scale = intensity / sa;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(SolverError::DegenerateSpectrum {
                record: record_id.to_string(),
                period: self.period,
            });
        }
        Ok(scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record() -> GroundMotionRecord {
        let accel = (0..500)
            .map(|i| 0.2 * (i as f64 * 0.07).sin())
            .collect();
        GroundMotionRecord::new("sine", 0.01, accel).unwrap()
    }

    #[test]
    fn scaled_record_hits_target_intensity() {
        let scaler = RecordScaler::new(0.6);
        let record = record();
        let scale = scaler.scale_factor(&record, 0.8).unwrap();
        let sa = scaler.spectral_acceleration(&record.scaled(scale));
        assert_relative_eq!(sa, 0.8, max_relative = 1e-9);
    }

    #[test]
    fn uses_cached_ordinate() {
        let record = record().with_spectral_ordinates(vec![(0.6, 0.4)]);
        let scale = RecordScaler::new(0.6).scale_factor(&record, 1.0).unwrap();
        assert_relative_eq!(scale, 2.5, epsilon = 1e-12);
    }

    #[test]
    fn zero_period_is_degenerate() {
        let err = RecordScaler::new(0.0).scale_factor(&record(), 0.5).unwrap_err();
        assert_eq!(
            err,
            SolverError::DegenerateSpectrum {
                record: "sine".to_string(),
                period: 0.0
            }
        );
    }

    #[test]
    fn silent_record_is_degenerate() {
        let silent = GroundMotionRecord::new("quiet", 0.01, vec![0.0; 100]).unwrap();
        assert!(matches!(
            RecordScaler::new(0.5).scale_factor(&silent, 0.3),
            Err(SolverError::DegenerateSpectrum { .. })
        ));
    }
}

//! Ground-motion acceleration records.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Uniformly sampled ground acceleration history in units of g.
///
/// Sample `i` is the acceleration at time `i * dt`. The record is immutable
/// once built; spectral ordinates computed elsewhere can be attached with
/// [`GroundMotionRecord::with_spectral_ordinates`] and are then served from the
/// cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundMotionRecord {
    id: String,
    dt: f64,
    accel: Vec<f64>,
    #[serde(default)]
    spectral_ordinates: Vec<(f64, f64)>,
}

impl GroundMotionRecord {
    pub fn new(id: impl Into<String>, dt: f64, accel: Vec<f64>) -> Result<Self, ModelError> {
        let id = id.into();
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ModelError::InvalidRecord {
                id,
                reason: format!("sample interval must be positive, got {dt}"),
            });
        }
        if accel.is_empty() {
            return Err(ModelError::InvalidRecord {
                id,
                reason: "record has no samples".to_string(),
            });
        }
        if let Some(i) = accel.iter().position(|a| !a.is_finite()) {
            return Err(ModelError::InvalidRecord {
                id,
                reason: format!("sample {i} is not finite"),
            });
        }
        Ok(Self {
            id,
            dt,
            accel,
            spectral_ordinates: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn sample_count(&self) -> usize {
        self.accel.len()
    }

    pub fn accel(&self) -> &[f64] {
        &self.accel
    }

    /// Analysis end time, `sample_count * dt`
    pub fn duration(&self) -> f64 {
        self.accel.len() as f64 * self.dt
    }

    pub fn peak_acceleration(&self) -> f64 {
        self.accel.iter().fold(0.0_f64, |acc, a| acc.max(a.abs()))
    }

    /// Ground acceleration at time `t` with linear interpolation between
    /// samples. Zero before the start and past the last sample.
    pub fn acceleration_at(&self, t: f64) -> f64 {
        if t < 0.0 {
            return 0.0;
        }
        let position = t / self.dt;
        let index = position.floor() as usize;
        if index >= self.accel.len() {
            return 0.0;
        }
        let frac = position - index as f64;
        let current = self.accel[index];
        let next = self.accel.get(index + 1).copied().unwrap_or(0.0);
        current + frac * (next - current)
    }

    /// Copy of the record with every sample multiplied by `factor`.
    /// Cached spectral ordinates are scaled along with the samples.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            id: self.id.clone(),
            dt: self.dt,
            accel: self.accel.iter().map(|a| a * factor).collect(),
            spectral_ordinates: self
                .spectral_ordinates
                .iter()
                .map(|&(period, sa)| (period, sa * factor.abs()))
                .collect(),
        }
    }

    /// Attach precomputed `(period, SA)` pairs
    pub fn with_spectral_ordinates(mut self, ordinates: Vec<(f64, f64)>) -> Self {
        self.spectral_ordinates = ordinates;
        self
    }

    pub fn spectral_ordinates(&self) -> &[(f64, f64)] {
        &self.spectral_ordinates
    }

    pub fn cached_ordinate(&self, period: f64) -> Option<f64> {
        self.spectral_ordinates
            .iter()
            .find(|(p, _)| (p - period).abs() <= 1e-12 * period.abs().max(1.0))
            .map(|&(_, sa)| sa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_non_positive_dt() {
        let err = GroundMotionRecord::new("rec", 0.0, vec![0.1]).unwrap_err();
        assert!(matches!(err, ModelError::InvalidRecord { .. }));
    }

    #[test]
    fn rejects_empty_series() {
        assert!(GroundMotionRecord::new("rec", 0.01, Vec::new()).is_err());
    }

    #[test]
    fn duration_is_sample_count_times_dt() {
        let record = GroundMotionRecord::new("rec", 0.02, vec![0.0; 50]).unwrap();
        assert_relative_eq!(record.duration(), 1.0, epsilon = 1e-12);
        assert_eq!(record.sample_count(), 50);
    }

    #[test]
    fn interpolates_between_samples() {
        let record = GroundMotionRecord::new("rec", 0.1, vec![0.0, 1.0, -1.0]).unwrap();
        assert_relative_eq!(record.acceleration_at(0.05), 0.5, epsilon = 1e-12);
        assert_relative_eq!(record.acceleration_at(0.15), 0.0, epsilon = 1e-12);
        assert_relative_eq!(record.acceleration_at(0.25), -0.5, epsilon = 1e-12);
        assert_eq!(record.acceleration_at(0.35), 0.0);
        assert_eq!(record.acceleration_at(-1.0), 0.0);
    }

    #[test]
    fn scaling_multiplies_samples_and_cache() {
        let record = GroundMotionRecord::new("rec", 0.1, vec![0.2, -0.4])
            .unwrap()
            .with_spectral_ordinates(vec![(0.5, 0.8)]);
        let scaled = record.scaled(2.0);
        assert_eq!(scaled.accel(), &[0.4, -0.8]);
        assert_eq!(scaled.cached_ordinate(0.5), Some(1.6));
        assert_eq!(scaled.peak_acceleration(), 0.8);
        assert_eq!(record.cached_ordinate(1.0), None);
    }
}

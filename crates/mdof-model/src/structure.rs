//! Structural parameters of a lumped-mass shear building.
//!
//! A building with `N` stories is idealized as `N` floor masses connected by
//! `N` story springs (story 1 connects the ground to floor 1). Each spring has
//! an elastic stiffness `k0` and, for non-elastic curve types, a trilinear
//! backbone:
//!
//! ```text
//!  V
//!  │        (d2,V2)────────────── (d3,V3=V2)
//!  │       ╱
//!  │  (d1,V1)          V1 = yield shear      d1 = V1 / k0
//!  │   ╱               V2 = β·V1             d2 = d1 + (V2 - V1) / (η·k0)
//!  │  ╱ k0             d3 = ultimate drift
//!  └──────────────────────────────────── d
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Hysteretic rule applied to every story spring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HystereticCurveType {
    /// Linear elastic
    Elastic,
    /// Peak-oriented (Clough) with elastic unloading
    ModifiedClough,
    /// Kinematic hardening with bounded strength
    KinematicHardening,
    /// Peak-oriented with a pinching point on the reloading branch
    Pinching,
}

impl HystereticCurveType {
    pub fn as_str(self) -> &'static str {
        match self {
            HystereticCurveType::Elastic => "Elastic",
            HystereticCurveType::ModifiedClough => "Modified-Clough",
            HystereticCurveType::KinematicHardening => "Kinematic hardening",
            HystereticCurveType::Pinching => "Pinching",
        }
    }

    /// Whether the curve needs backbone parameters
    pub fn is_nonlinear(self) -> bool {
        !matches!(self, HystereticCurveType::Elastic)
    }
}

impl fmt::Display for HystereticCurveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HystereticCurveType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "ELASTIC" => Ok(HystereticCurveType::Elastic),
            "MODIFIEDCLOUGH" | "CLOUGH" => Ok(HystereticCurveType::ModifiedClough),
            "KINEMATICHARDENING" | "KINEMATIC" => Ok(HystereticCurveType::KinematicHardening),
            "PINCHING" => Ok(HystereticCurveType::Pinching),
            _ => Err(ModelError::UnsupportedHystereticModel(s.to_string())),
        }
    }
}

/// Per-story backbone inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackboneParameters {
    /// Yield shear force per story [N]
    pub yield_shear: Vec<f64>,
    /// Ultimate-to-yield strength ratio per story [-]
    pub overstrength: Vec<f64>,
    /// Post-yield hardening ratio per story [-]
    pub hardening: Vec<f64>,
    /// Drift at the complete damage state per story [m]
    pub ultimate_drift: Vec<f64>,
    /// Pinching factor, only used by `Pinching` [-]
    #[serde(default)]
    pub pinching: f64,
}

/// Trilinear backbone of a single story spring, symmetric in tension and compression
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoryBackbone {
    /// Elastic stiffness [N/m]
    pub k0: f64,
    pub yield_force: f64,
    pub yield_disp: f64,
    pub peak_force: f64,
    pub peak_disp: f64,
    pub ultimate_disp: f64,
}

impl StoryBackbone {
    /// Backbone that never yields
    pub fn elastic(k0: f64) -> Self {
        Self {
            k0,
            yield_force: f64::INFINITY,
            yield_disp: f64::INFINITY,
            peak_force: f64::INFINITY,
            peak_disp: f64::INFINITY,
            ultimate_disp: f64::INFINITY,
        }
    }

    pub fn trilinear(
        k0: f64,
        yield_force: f64,
        overstrength: f64,
        hardening: f64,
        ultimate_disp: f64,
    ) -> Self {
        let yield_disp = yield_force / k0;
        let peak_force = yield_force * overstrength;
        let peak_disp = if peak_force > yield_force {
            yield_disp + (peak_force - yield_force) / (hardening * k0)
        } else {
            yield_disp
        };
        Self {
            k0,
            yield_force,
            yield_disp,
            peak_force,
            peak_disp,
            ultimate_disp: ultimate_disp.max(peak_disp),
        }
    }

    /// Slope of the hardening branch
    pub fn hardening_stiffness(&self) -> f64 {
        if self.peak_disp > self.yield_disp {
            (self.peak_force - self.yield_force) / (self.peak_disp - self.yield_disp)
        } else {
            0.0
        }
    }

    /// Backbone force and tangent at deformation `d`
    pub fn evaluate(&self, d: f64) -> (f64, f64) {
        let x = d.abs();
        let (f, k) = if x <= self.yield_disp {
            (self.k0 * x, self.k0)
        } else if x <= self.peak_disp {
            let k2 = self.hardening_stiffness();
            (self.yield_force + k2 * (x - self.yield_disp), k2)
        } else {
            // Beyond the peak the backbone extends with the plateau slope
            (self.peak_force, 0.0)
        };
        (f.copysign(d), k)
    }
}

/// Immutable inputs for constructing a structural model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralParameters {
    pub story_count: usize,
    /// Floor masses, floor 1 first [kg]
    pub masses: Vec<f64>,
    /// Story elastic stiffnesses, story 1 first [N/m]
    pub stiffnesses: Vec<f64>,
    pub damping_ratio: f64,
    /// Curve identifier, e.g. `Elastic`, `Modified-Clough`
    pub hysteretic_curve: String,
    #[serde(default)]
    pub backbone: Option<BackboneParameters>,
}

impl StructuralParameters {
    /// Elastic building with per-story masses and stiffnesses
    pub fn elastic(masses: Vec<f64>, stiffnesses: Vec<f64>, damping_ratio: f64) -> Self {
        Self {
            story_count: masses.len(),
            masses,
            stiffnesses,
            damping_ratio,
            hysteretic_curve: HystereticCurveType::Elastic.as_str().to_string(),
            backbone: None,
        }
    }

    /// Elastic building with identical stories
    pub fn uniform(story_count: usize, mass: f64, stiffness: f64, damping_ratio: f64) -> Self {
        Self::elastic(
            vec![mass; story_count],
            vec![stiffness; story_count],
            damping_ratio,
        )
    }

    /// Replace the hysteretic curve and its backbone
    pub fn with_backbone(mut self, curve: impl Into<String>, backbone: BackboneParameters) -> Self {
        self.hysteretic_curve = curve.into();
        self.backbone = Some(backbone);
        self
    }

    pub fn curve_type(&self) -> Result<HystereticCurveType, ModelError> {
        self.hysteretic_curve.parse()
    }

    /// Check dimensions and ranges; returns the parsed curve type
    pub fn validate(&self) -> Result<HystereticCurveType, ModelError> {
        let curve = self.curve_type()?;
        let n = self.story_count;

        if n == 0 {
            return Err(ModelError::InvalidParameters(
                "story count must be at least 1".to_string(),
            ));
        }
        check_len("masses", &self.masses, n)?;
        check_len("stiffnesses", &self.stiffnesses, n)?;
        check_positive("masses", &self.masses)?;
        check_positive("stiffnesses", &self.stiffnesses)?;

        if !(0.0..1.0).contains(&self.damping_ratio) {
            return Err(ModelError::InvalidParameters(format!(
                "damping ratio {} outside [0, 1)",
                self.damping_ratio
            )));
        }

        if curve.is_nonlinear() {
            let backbone = self
                .backbone
                .as_ref()
                .ok_or_else(|| ModelError::MissingBackbone(curve.to_string()))?;
            check_len("yield_shear", &backbone.yield_shear, n)?;
            check_len("overstrength", &backbone.overstrength, n)?;
            check_len("hardening", &backbone.hardening, n)?;
            check_len("ultimate_drift", &backbone.ultimate_drift, n)?;
            check_positive("yield_shear", &backbone.yield_shear)?;
            check_positive("ultimate_drift", &backbone.ultimate_drift)?;

            for (i, (&beta, &eta)) in backbone
                .overstrength
                .iter()
                .zip(&backbone.hardening)
                .enumerate()
            {
                if !beta.is_finite() || beta < 1.0 {
                    return Err(ModelError::InvalidParameters(format!(
                        "overstrength of story {} must be >= 1, got {beta}",
                        i + 1
                    )));
                }
                if beta > 1.0 && !(eta > 0.0 && eta < 1.0) {
                    return Err(ModelError::InvalidParameters(format!(
                        "hardening of story {} must be in (0, 1), got {eta}",
                        i + 1
                    )));
                }
            }

            if curve == HystereticCurveType::Pinching && !(0.0..=1.0).contains(&backbone.pinching)
            {
                return Err(ModelError::InvalidParameters(format!(
                    "pinching factor {} outside [0, 1]",
                    backbone.pinching
                )));
            }
        }

        Ok(curve)
    }

    /// Backbone of story `story` (0-based). Elastic curves never yield.
    pub fn story_backbone(&self, story: usize) -> StoryBackbone {
        let k0 = self.stiffnesses[story];
        match (&self.backbone, self.curve_type()) {
            (Some(bb), Ok(curve)) if curve.is_nonlinear() => StoryBackbone::trilinear(
                k0,
                bb.yield_shear[story],
                bb.overstrength[story],
                bb.hardening[story],
                bb.ultimate_drift[story],
            ),
            _ => StoryBackbone::elastic(k0),
        }
    }

    pub fn total_mass(&self) -> f64 {
        self.masses.iter().sum()
    }
}

fn check_len(name: &str, values: &[f64], expected: usize) -> Result<(), ModelError> {
    if values.len() != expected {
        return Err(ModelError::InvalidParameters(format!(
            "{name} has {} entries, expected {expected}",
            values.len()
        )));
    }
    Ok(())
}

fn check_positive(name: &str, values: &[f64]) -> Result<(), ModelError> {
    if let Some((i, v)) = values
        .iter()
        .enumerate()
        .find(|(_, v)| !(v.is_finite() && **v > 0.0))
    {
        return Err(ModelError::InvalidParameters(format!(
            "{name}[{i}] must be positive, got {v}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn backbone(n: usize) -> BackboneParameters {
        BackboneParameters {
            yield_shear: vec![1.0e5; n],
            overstrength: vec![1.5; n],
            hardening: vec![0.1; n],
            ultimate_drift: vec![0.2; n],
            pinching: 0.4,
        }
    }

    #[test]
    fn parses_curve_identifiers() {
        assert_eq!(
            "Modified-Clough".parse::<HystereticCurveType>().unwrap(),
            HystereticCurveType::ModifiedClough
        );
        assert_eq!(
            "Kinematic hardening".parse::<HystereticCurveType>().unwrap(),
            HystereticCurveType::KinematicHardening
        );
        assert_eq!(
            "elastic".parse::<HystereticCurveType>().unwrap(),
            HystereticCurveType::Elastic
        );
    }

    #[test]
    fn rejects_unknown_curve() {
        let err = "Bouc-Wen".parse::<HystereticCurveType>().unwrap_err();
        assert_eq!(
            err,
            ModelError::UnsupportedHystereticModel("Bouc-Wen".to_string())
        );
    }

    #[test]
    fn validates_uniform_elastic_building() {
        let params = StructuralParameters::uniform(3, 1000.0, 1.0e6, 0.05);
        assert_eq!(params.validate().unwrap(), HystereticCurveType::Elastic);
        assert_eq!(params.total_mass(), 3000.0);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let params = StructuralParameters {
            story_count: 3,
            ..StructuralParameters::uniform(2, 1000.0, 1.0e6, 0.05)
        };
        assert!(matches!(
            params.validate(),
            Err(ModelError::InvalidParameters(_))
        ));
    }

    #[test]
    fn nonlinear_curve_requires_backbone() {
        let mut params = StructuralParameters::uniform(2, 1000.0, 1.0e6, 0.05);
        params.hysteretic_curve = "Pinching".to_string();
        assert_eq!(
            params.validate().unwrap_err(),
            ModelError::MissingBackbone("Pinching".to_string())
        );

        let params = params.with_backbone("Pinching", backbone(2));
        assert_eq!(params.validate().unwrap(), HystereticCurveType::Pinching);
    }

    #[test]
    fn trilinear_backbone_points() {
        let params = StructuralParameters::uniform(1, 1000.0, 1.0e6, 0.05)
            .with_backbone("Modified-Clough", backbone(1));
        let bb = params.story_backbone(0);

        assert_relative_eq!(bb.yield_disp, 0.1, epsilon = 1e-12);
        assert_relative_eq!(bb.peak_force, 1.5e5, epsilon = 1e-6);
        // d2 = d1 + (V2 - V1) / (eta * k0) = 0.1 + 5e4 / 1e5
        assert_relative_eq!(bb.peak_disp, 0.6, epsilon = 1e-12);
        assert_relative_eq!(bb.hardening_stiffness(), 1.0e5, epsilon = 1e-6);

        let (f, k) = bb.evaluate(-0.05);
        assert_relative_eq!(f, -5.0e4, epsilon = 1e-6);
        assert_eq!(k, 1.0e6);

        let (f, k) = bb.evaluate(2.0);
        assert_eq!(f, 1.5e5);
        assert_eq!(k, 0.0);
    }

    #[test]
    fn elastic_backbone_is_linear() {
        let bb = StoryBackbone::elastic(2.0e6);
        let (f, k) = bb.evaluate(0.3);
        assert_relative_eq!(f, 6.0e5, epsilon = 1e-6);
        assert_eq!(k, 2.0e6);
    }
}

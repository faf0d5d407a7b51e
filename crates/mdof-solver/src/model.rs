//! Lumped-mass shear-building model.
//!
//! [`MdofModel`] owns all mutable analysis state of one building instance:
//! story springs, committed floor motion and the response trajectory. It is
//! built from immutable [`StructuralParameters`]; concurrent analyses each
//! construct their own instance.
//!
//! # Workflow
//! 1. Validate parameters, build one spring per story
//! 2. Assemble K0 and M, solve the eigenproblem
//! 3. Rayleigh damping from modes 1 and 2 (mode 1 twice for one story)
//! 4. Run a transient or pushover analysis, then query the response

use crate::assembly::GlobalSystem;
use crate::dynamic_solver::{
    DynamicState, NewmarkConfig, TimeStep, TransientAnalysis, TransientDriver, TransientOutcome,
};
use crate::error::{Result, SolverError};
use crate::ladder::LadderConfig;
use crate::materials::{HystereticRule, StorySpring};
use crate::modal_solver::{ModalResults, ModalSolver};
use crate::pushover::PushoverAnalysis;
use log::debug;
use mdof_model::{
    GroundMotionRecord, HystereticCurveType, PushoverCurve, StructuralParameters, Trajectory,
};

/// Shear-building model with nonlinear story springs
#[derive(Debug, Clone)]
pub struct MdofModel {
    parameters: StructuralParameters,
    curve: HystereticCurveType,
    modes: ModalResults,
    pub(crate) newmark: NewmarkConfig,
    pub(crate) ladder: LadderConfig,
    pub(crate) system: GlobalSystem,
    pub(crate) springs: Vec<StorySpring>,
    pub(crate) state: DynamicState,
    pub(crate) trajectory: Trajectory,
}

impl MdofModel {
    pub fn new(parameters: &StructuralParameters) -> Result<Self> {
        let curve = parameters.validate()?;
        let n = parameters.story_count;

        let pinching = parameters
            .backbone
            .as_ref()
            .map(|bb| bb.pinching)
            .unwrap_or(0.0);
        let rule = HystereticRule::for_curve(curve, pinching);
        let springs = (0..n)
            .map(|i| StorySpring::new(rule, parameters.story_backbone(i)))
            .collect();

        let mut system = GlobalSystem::assemble(parameters)?;
        let modes = ModalSolver::new(&system).solve(n)?;

        let omega1 = modes
            .angular_frequency(0)
            .ok_or_else(|| SolverError::Eigen("no fundamental mode".to_string()))?;
        let omega2 = modes.angular_frequency(1).unwrap_or(omega1);
        let newmark = NewmarkConfig::average_acceleration().from_modal_damping(
            parameters.damping_ratio,
            omega1,
            omega2,
        );
        system.apply_rayleigh_damping(newmark.alpha_damping, newmark.beta_damping);

        debug!(
            "built {n}-story {curve} model, T1 = {:.4} s",
            modes.periods[0]
        );

        Ok(Self {
            parameters: parameters.clone(),
            curve,
            modes,
            newmark,
            ladder: LadderConfig::default(),
            system,
            springs,
            state: DynamicState::at_rest(n),
            trajectory: Trajectory::new(n),
        })
    }

    /// Replace the solution-strategy ladder used by later analyses
    pub fn with_ladder(mut self, ladder: LadderConfig) -> Self {
        self.ladder = ladder;
        self
    }

    pub fn story_count(&self) -> usize {
        self.parameters.story_count
    }

    pub fn parameters(&self) -> &StructuralParameters {
        &self.parameters
    }

    pub fn curve_type(&self) -> HystereticCurveType {
        self.curve
    }

    pub fn system(&self) -> &GlobalSystem {
        &self.system
    }

    pub fn newmark(&self) -> &NewmarkConfig {
        &self.newmark
    }

    pub fn modal_results(&self) -> &ModalResults {
        &self.modes
    }

    /// Periods of the first `n_modes` modes in seconds, longest first
    pub fn eigen(&self, n_modes: usize) -> Result<Vec<f64>> {
        if n_modes == 0 {
            return Err(SolverError::InvalidInput(
                "number of modes must be at least 1".to_string(),
            ));
        }
        Ok(self.modes.periods.iter().take(n_modes).copied().collect())
    }

    pub fn fundamental_period(&self) -> f64 {
        self.modes.periods[0]
    }

    /// Back to a cold, unloaded state with an empty trajectory
    pub fn reset(&mut self) {
        for spring in &mut self.springs {
            spring.revert_to_start();
        }
        self.state = DynamicState::at_rest(self.story_count());
        self.trajectory.clear();
    }

    /// Time-history analysis under `record` multiplied by `scale`, from rest
    /// to the end of the record
    pub fn run_dynamic(
        &mut self,
        record: &GroundMotionRecord,
        scale: f64,
        time_step: TimeStep,
    ) -> Result<TransientOutcome> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(SolverError::InvalidInput(format!(
                "scale factor must be positive, got {scale}"
            )));
        }
        let dt = time_step.resolve(record);
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SolverError::InvalidInput(format!(
                "time step must be positive, got {dt}"
            )));
        }

        let driver = TransientDriver::new(self.ladder.clone());
        let total_time = record.duration();
        let mut analysis = TransientAnalysis::new(self, record, scale);
        let outcome = driver.run(&mut analysis, dt, total_time);

        debug!(
            "record '{}' x{scale:.4}: finished = {}, reached {:.3}/{:.3} s in {} steps ({} fallbacks)",
            record.id(),
            outcome.finished,
            outcome.reached_time,
            outcome.total_time,
            outcome.steps,
            outcome.fallbacks
        );
        Ok(outcome)
    }

    /// Displacement-controlled pushover of floor `control_floor` (1-based)
    /// through `targets`, in increments of at most `displacement_step`
    pub fn run_static_pushover(
        &mut self,
        targets: &[f64],
        displacement_step: f64,
        control_floor: usize,
    ) -> Result<PushoverCurve> {
        let n = self.story_count();
        if control_floor == 0 || control_floor > n {
            return Err(SolverError::InvalidInput(format!(
                "control floor {control_floor} outside 1..={n}"
            )));
        }
        if !(displacement_step.is_finite() && displacement_step > 0.0) {
            return Err(SolverError::InvalidInput(format!(
                "displacement step must be positive, got {displacement_step}"
            )));
        }
        if let Some(t) = targets.iter().find(|t| !t.is_finite()) {
            return Err(SolverError::InvalidInput(format!(
                "pushover target {t} is not finite"
            )));
        }

        let ladder = self.ladder.clone();
        let mut analysis = PushoverAnalysis::new(self, control_floor - 1);
        Ok(analysis.run(targets, displacement_step, &ladder))
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// Max |drift| per story over the last run
    pub fn max_drift(&self) -> Vec<f64> {
        self.trajectory.max_drift()
    }

    /// Max |absolute acceleration| per floor [m/s²]
    pub fn max_abs_accel(&self) -> Vec<f64> {
        self.trajectory.max_abs_accel()
    }

    /// Max |relative acceleration| per floor [m/s²]
    pub fn max_rel_accel(&self) -> Vec<f64> {
        self.trajectory.max_rel_accel()
    }

    /// Max |drift| over stories at the final recorded sample
    pub fn residual_drift(&self) -> f64 {
        self.trajectory.residual_drift()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mdof_model::{BackboneParameters, ModelError};
    use std::f64::consts::PI;

    fn backbone(n: usize) -> BackboneParameters {
        BackboneParameters {
            yield_shear: vec![2.0e4; n],
            overstrength: vec![1.3; n],
            hardening: vec![0.05; n],
            ultimate_drift: vec![0.3; n],
            pinching: 0.5,
        }
    }

    #[test]
    fn single_story_period_matches_closed_form() {
        let params = StructuralParameters::uniform(1, 1500.0, 6.0e5, 0.05);
        let model = MdofModel::new(&params).unwrap();
        let expected = 2.0 * PI * (1500.0_f64 / 6.0e5).sqrt();
        let periods = model.eigen(1).unwrap();
        assert_relative_eq!(periods[0], expected, max_relative = 1e-6);
    }

    #[test]
    fn periods_are_descending_and_capped() {
        let params = StructuralParameters::uniform(3, 1000.0, 1.0e6, 0.05);
        let model = MdofModel::new(&params).unwrap();
        let periods = model.eigen(10).unwrap();
        assert_eq!(periods.len(), 3);
        assert!(periods.windows(2).all(|w| w[0] > w[1]));
        assert!(model.eigen(0).is_err());
    }

    #[test]
    fn rayleigh_damping_hits_first_two_modes() {
        let params = StructuralParameters::uniform(3, 1000.0, 1.0e6, 0.05);
        let model = MdofModel::new(&params).unwrap();
        let NewmarkConfig {
            alpha_damping,
            beta_damping,
            ..
        } = *model.newmark();
        for mode in 0..2 {
            let omega = model.modal_results().angular_frequency(mode).unwrap();
            let xi = alpha_damping / (2.0 * omega) + beta_damping * omega / 2.0;
            assert_relative_eq!(xi, 0.05, epsilon = 1e-12);
        }
    }

    #[test]
    fn rejects_unknown_curve() {
        let mut params = StructuralParameters::uniform(2, 1000.0, 1.0e6, 0.05);
        params.hysteretic_curve = "Takeda".to_string();
        let err = MdofModel::new(&params).unwrap_err();
        assert_eq!(
            err,
            SolverError::Model(ModelError::UnsupportedHystereticModel("Takeda".to_string()))
        );
    }

    #[test]
    fn builds_every_nonlinear_curve() {
        for curve in ["Modified-Clough", "Kinematic hardening", "Pinching"] {
            let params =
                StructuralParameters::uniform(2, 1000.0, 1.0e6, 0.05).with_backbone(curve, backbone(2));
            let model = MdofModel::new(&params).unwrap();
            assert!(model.curve_type().is_nonlinear());
        }
    }

    #[test]
    fn free_vibration_under_short_pulse_decays() {
        let params = StructuralParameters::uniform(2, 1000.0, 1.0e6, 0.05);
        let mut model = MdofModel::new(&params).unwrap();
        let mut accel = vec![0.0; 400];
        accel[1] = 0.2;
        let record = GroundMotionRecord::new("pulse", 0.01, accel).unwrap();

        let outcome = model.run_dynamic(&record, 1.0, TimeStep::AsInRecord).unwrap();
        assert!(outcome.finished);
        assert_eq!(outcome.reached_time, record.duration());
        assert_eq!(model.trajectory().len(), 401);

        let peak = model.max_drift()[0];
        assert!(peak > 0.0);
        assert!(model.residual_drift() < peak);
    }

    #[test]
    fn run_dynamic_rejects_non_positive_scale() {
        let params = StructuralParameters::uniform(1, 1000.0, 1.0e6, 0.05);
        let mut model = MdofModel::new(&params).unwrap();
        let record = GroundMotionRecord::new("r", 0.01, vec![0.1; 10]).unwrap();
        assert!(matches!(
            model.run_dynamic(&record, 0.0, TimeStep::AsInRecord),
            Err(SolverError::InvalidInput(_))
        ));
    }
}

//! Transient analysis under ground acceleration using Newmark time integration.
//!
//! Solves the relative-motion equation of the shear building:
//! M*ü + C*u̇ + F_int(u) = -M*ι*a_g(t)
//!
//! where:
//! - M = lumped mass matrix
//! - C = Rayleigh damping matrix (C = αM + βK0)
//! - F_int = story spring resisting forces
//! - ι = influence vector, a_g = ground acceleration
//! - u, u̇, ü = floor displacements, velocities, accelerations relative to the ground
//!
//! # Newmark Method
//!
//! ```text
//! u_{n+1} = u_n + Δt*u̇_n + (Δt²/2)*[(1-2β)*ü_n + 2β*ü_{n+1}]
//! u̇_{n+1} = u̇_n + Δt*[(1-γ)*ü_n + γ*ü_{n+1}]
//! ```
//!
//! Each step is an equilibrium problem in `u_{n+1}` with iteration matrix
//! `K_eff = K_T + a0*M + a1*C`, `a0 = 1/(βΔt²)`, `a1 = γ/(βΔt)`, solved under
//! the strategy chosen by the [`SolverLadder`].

use crate::assembly::{self, GlobalSystem};
use crate::ladder::{IncrementalAnalysis, LadderConfig, SolverLadder, StepOutcome};
use crate::materials::StorySpring;
use crate::model::MdofModel;
use crate::modal_solver::rayleigh_coefficients;
use crate::nonlinear_solver::{EquilibriumProblem, NonlinearSolver, SolutionStrategy};
use mdof_model::{GRAVITY, GroundMotionRecord, TrajectorySample};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Relative tolerance on the remaining time below which a run counts as
/// complete
const END_TIME_TOLERANCE: f64 = 1e-6;

/// Newmark time integration parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewmarkConfig {
    /// Newmark β parameter (controls acceleration)
    pub beta: f64,
    /// Newmark γ parameter (controls velocity)
    pub gamma: f64,
    /// Rayleigh damping α (mass-proportional)
    pub alpha_damping: f64,
    /// Rayleigh damping β (initial-stiffness-proportional)
    pub beta_damping: f64,
}

impl NewmarkConfig {
    /// Average acceleration method (unconditionally stable, 2nd order accurate)
    ///
    /// γ = 1/2, β = 1/4
    pub fn average_acceleration() -> Self {
        Self {
            beta: 0.25,
            gamma: 0.5,
            alpha_damping: 0.0,
            beta_damping: 0.0,
        }
    }

    /// C = α*M + β*K0
    pub fn with_rayleigh_damping(mut self, alpha: f64, beta: f64) -> Self {
        self.alpha_damping = alpha;
        self.beta_damping = beta;
        self
    }

    /// Rayleigh damping giving ratio `zeta` at angular frequencies
    /// `omega1` and `omega2` (rad/s)
    pub fn from_modal_damping(self, zeta: f64, omega1: f64, omega2: f64) -> Self {
        let (alpha, beta) = rayleigh_coefficients(zeta, omega1, omega2);
        self.with_rayleigh_damping(alpha, beta)
    }
}

impl Default for NewmarkConfig {
    fn default() -> Self {
        Self::average_acceleration()
    }
}

/// Analysis time step selection
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeStep {
    /// Use the record's sample interval
    #[default]
    AsInRecord,
    /// Fixed step in seconds; the record is interpolated
    Fixed(f64),
}

impl TimeStep {
    pub fn resolve(self, record: &GroundMotionRecord) -> f64 {
        match self {
            TimeStep::AsInRecord => record.dt(),
            TimeStep::Fixed(dt) => dt,
        }
    }
}

/// Termination state of a transient run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransientOutcome {
    /// The run reached `total_time`
    pub finished: bool,
    pub reached_time: f64,
    pub total_time: f64,
    /// Converged steps
    pub steps: usize,
    /// Strategy fallbacks taken by the ladder
    pub fallbacks: usize,
}

/// Committed dynamic state of the floors
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicState {
    pub displacement: DVector<f64>,
    pub velocity: DVector<f64>,
    pub acceleration: DVector<f64>,
}

impl DynamicState {
    pub fn at_rest(num_dofs: usize) -> Self {
        Self {
            displacement: DVector::zeros(num_dofs),
            velocity: DVector::zeros(num_dofs),
            acceleration: DVector::zeros(num_dofs),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct NewmarkCoefficients {
    dt: f64,
    gamma: f64,
    a0: f64,
    a1: f64,
    a2: f64,
    a3: f64,
}

impl NewmarkCoefficients {
    fn new(config: &NewmarkConfig, dt: f64) -> Self {
        let beta = config.beta;
        Self {
            dt,
            gamma: config.gamma,
            a0: 1.0 / (beta * dt * dt),
            a1: config.gamma / (beta * dt),
            a2: 1.0 / (beta * dt),
            a3: 1.0 / (2.0 * beta) - 1.0,
        }
    }

    fn acceleration(&self, u: &DVector<f64>, state: &DynamicState) -> DVector<f64> {
        (u - &state.displacement) * self.a0 - &state.velocity * self.a2 - &state.acceleration * self.a3
    }

    fn velocity(&self, accel: &DVector<f64>, state: &DynamicState) -> DVector<f64> {
        &state.velocity
            + (&state.acceleration * (1.0 - self.gamma) + accel * self.gamma) * self.dt
    }
}

/// Equilibrium of one Newmark step in the unknown `u_{n+1}`
struct NewmarkIncrement<'a> {
    system: &'a GlobalSystem,
    springs: &'a mut [StorySpring],
    state: &'a DynamicState,
    load: DVector<f64>,
    coeffs: NewmarkCoefficients,
}

impl NewmarkIncrement<'_> {
    fn inertia_and_damping(&self) -> DMatrix<f64> {
        &self.system.mass * self.coeffs.a0 + &self.system.damping * self.coeffs.a1
    }
}

impl EquilibriumProblem for NewmarkIncrement<'_> {
    fn dimension(&self) -> usize {
        self.system.num_dofs
    }

    fn residual(&mut self, x: &DVector<f64>) -> DVector<f64> {
        assembly::set_trial_displacement(&mut *self.springs, x);
        let accel = self.coeffs.acceleration(x, self.state);
        let vel = self.coeffs.velocity(&accel, self.state);
        &self.load
            - &self.system.mass * accel
            - &self.system.damping * vel
            - assembly::internal_force(&*self.springs)
    }

    fn tangent(&self) -> DMatrix<f64> {
        assembly::tangent_stiffness(&*self.springs) + self.inertia_and_damping()
    }

    fn initial_tangent(&self) -> DMatrix<f64> {
        assembly::initial_stiffness(&*self.springs) + self.inertia_and_damping()
    }
}

/// A model subjected to a scaled ground-motion record, advanced one time
/// step per ladder attempt
pub struct TransientAnalysis<'a> {
    model: &'a mut MdofModel,
    record: &'a GroundMotionRecord,
    /// Factor applied to the record samples
    scale: f64,
    time: f64,
}

impl<'a> TransientAnalysis<'a> {
    /// Start from rest at `t = 0`; the model's response history is cleared
    pub fn new(model: &'a mut MdofModel, record: &'a GroundMotionRecord, scale: f64) -> Self {
        model.reset();
        let mut analysis = Self {
            model,
            record,
            scale,
            time: 0.0,
        };
        let ag = analysis.ground_acceleration(0.0);
        let ground = analysis.model.system.influence.clone() * ag;
        analysis.model.state.acceleration = -&ground;
        analysis.record_sample(&ground);
        analysis
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Ground acceleration at `t` in m/s²
    fn ground_acceleration(&self, t: f64) -> f64 {
        self.record.acceleration_at(t) * self.scale * GRAVITY
    }

    fn record_sample(&mut self, ground: &DVector<f64>) {
        let model = &mut *self.model;
        let rel = model.state.acceleration.clone();
        let abs = &rel + ground;
        let sample = TrajectorySample {
            time: self.time,
            drift: assembly::story_drifts(&model.state.displacement),
            force: model.springs.iter().map(StorySpring::committed_force).collect(),
            abs_accel: abs.iter().copied().collect(),
            rel_accel: rel.iter().copied().collect(),
        };
        model.trajectory.push(sample);
    }
}

impl IncrementalAnalysis for TransientAnalysis<'_> {
    fn attempt(&mut self, strategy: &SolutionStrategy, increment: f64) -> StepOutcome {
        let t_next = self.time + increment;
        let ag = self.ground_acceleration(t_next);
        let coeffs = NewmarkCoefficients::new(&self.model.newmark, increment);

        let model = &mut *self.model;
        let mut problem = NewmarkIncrement {
            system: &model.system,
            springs: &mut model.springs,
            state: &model.state,
            load: model.system.ground_load(ag),
            coeffs,
        };
        let result =
            NonlinearSolver::new(*strategy).solve(&mut problem, model.state.displacement.clone());

        if !result.converged() {
            for spring in &mut model.springs {
                spring.revert_to_last_commit();
            }
            return StepOutcome {
                converged: false,
                position: self.time,
            };
        }

        for spring in &mut model.springs {
            spring.commit();
        }
        let u = result.solution;
        let accel = coeffs.acceleration(&u, &model.state);
        let vel = coeffs.velocity(&accel, &model.state);
        model.state = DynamicState {
            displacement: u,
            velocity: vel,
            acceleration: accel,
        };
        self.time = t_next;

        let ground = self.model.system.influence.clone() * ag;
        self.record_sample(&ground);
        StepOutcome {
            converged: true,
            position: self.time,
        }
    }

    fn position(&self) -> f64 {
        self.time
    }
}

/// Integrates an analysis to its end time through a [`SolverLadder`]
#[derive(Debug, Clone, Default)]
pub struct TransientDriver {
    ladder: LadderConfig,
}

impl TransientDriver {
    pub fn new(ladder: LadderConfig) -> Self {
        Self { ladder }
    }

    /// Advance in steps of `time_step` (the last one shortened to land on
    /// `total_time`) until the end time or a permanent ladder halt
    pub fn run<A>(&self, analysis: &mut A, time_step: f64, total_time: f64) -> TransientOutcome
    where
        A: IncrementalAnalysis + ?Sized,
    {
        let mut ladder = SolverLadder::new(&self.ladder);
        let mut steps = 0;
        let slack = time_step * END_TIME_TOLERANCE;

        let finished = loop {
            let remaining = total_time - analysis.position();
            if remaining <= slack {
                break true;
            }
            let increment = if remaining <= time_step + slack {
                remaining
            } else {
                time_step
            };
            if !ladder.advance(analysis, increment).converged {
                break false;
            }
            steps += 1;
        };

        let reached_time = if finished {
            total_time
        } else {
            analysis.position()
        };
        TransientOutcome {
            finished,
            reached_time,
            total_time,
            steps,
            fallbacks: ladder.fallbacks(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonlinear_solver::ConvergenceTest;

    /// Converges until `fail_after`, then every strategy fails
    struct Stalling {
        time: f64,
        fail_after: f64,
        times: Vec<f64>,
    }

    impl IncrementalAnalysis for Stalling {
        fn attempt(&mut self, _: &SolutionStrategy, increment: f64) -> StepOutcome {
            if self.time + increment > self.fail_after {
                return StepOutcome {
                    converged: false,
                    position: self.time,
                };
            }
            self.time += increment;
            self.times.push(self.time);
            StepOutcome {
                converged: true,
                position: self.time,
            }
        }

        fn position(&self) -> f64 {
            self.time
        }
    }

    #[test]
    fn newmark_config_average_acceleration() {
        let config = NewmarkConfig::average_acceleration();
        assert_eq!(config.beta, 0.25);
        assert_eq!(config.gamma, 0.5);
        assert_eq!(config, NewmarkConfig::default());
    }

    #[test]
    fn time_step_deserializes_snake_case() {
        let fixed: TimeStep = serde_json::from_str(r#"{"fixed": 0.005}"#).unwrap();
        assert_eq!(fixed, TimeStep::Fixed(0.005));
        let own: TimeStep = serde_json::from_str(r#""as_in_record""#).unwrap();
        assert_eq!(own, TimeStep::AsInRecord);
    }

    #[test]
    fn driver_lands_on_end_time() {
        let mut analysis = Stalling {
            time: 0.0,
            fail_after: f64::INFINITY,
            times: Vec::new(),
        };
        let outcome = TransientDriver::default().run(&mut analysis, 0.3, 1.0);
        assert!(outcome.finished);
        assert_eq!(outcome.reached_time, 1.0);
        assert_eq!(outcome.steps, 4);
        assert!((analysis.times[3] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn driver_stops_on_permanent_halt() {
        let mut analysis = Stalling {
            time: 0.0,
            fail_after: 0.55,
            times: Vec::new(),
        };
        let ladder = LadderConfig {
            tests: vec![ConvergenceTest::NormUnbalance],
            ..LadderConfig::default()
        };
        let outcome = TransientDriver::new(ladder).run(&mut analysis, 0.1, 2.0);

        assert!(!outcome.finished);
        assert!(outcome.reached_time < outcome.total_time);
        assert!((outcome.reached_time - 0.5).abs() < 1e-9);
        assert_eq!(outcome.fallbacks, 8);
        assert!(analysis.times.windows(2).all(|w| w[0] <= w[1]));
    }
}

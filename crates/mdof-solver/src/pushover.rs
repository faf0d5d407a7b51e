//! Static pushover under displacement control.
//!
//! The lateral pattern `P` (floor mass × floor index, normalized to unit sum)
//! is scaled by a load factor `λ` while the control floor displacement is
//! prescribed. Each increment solves the bordered system in `x = [u; λ]`:
//!
//! ```text
//! R(x) = [ λP - F_int(u)  ]      J = [ K_T   -P ]
//!        [ u_target - u_c ]          [ e_cᵀ   0 ]
//! ```
//!
//! With a unit-sum pattern `λ` equals the base shear.

use crate::assembly;
use crate::ladder::{IncrementalAnalysis, LadderConfig, SolverLadder, StepOutcome};
use crate::materials::StorySpring;
use crate::model::MdofModel;
use crate::nonlinear_solver::{EquilibriumProblem, NonlinearSolver, SolutionStrategy};
use log::{debug, warn};
use mdof_model::{PushoverCurve, PushoverSample};
use nalgebra::{DMatrix, DVector};

/// Remaining distance to a target below which it counts as reached,
/// relative to the displacement step
const TARGET_TOLERANCE: f64 = 1e-9;

/// Lateral load pattern `P_i ∝ m_i (i + 1)` with `ΣP = 1`
pub fn lateral_pattern(masses: &[f64]) -> DVector<f64> {
    let raw = DVector::from_fn(masses.len(), |i, _| masses[i] * (i + 1) as f64);
    let total = raw.sum();
    if total > 0.0 { raw / total } else { raw }
}

/// One displacement-control increment
struct ControlIncrement<'a> {
    springs: &'a mut [StorySpring],
    pattern: &'a DVector<f64>,
    control: usize,
    target: f64,
}

impl ControlIncrement<'_> {
    fn bordered(&self, k: DMatrix<f64>) -> DMatrix<f64> {
        let n = self.pattern.len();
        let mut j = DMatrix::zeros(n + 1, n + 1);
        j.view_mut((0, 0), (n, n)).copy_from(&k);
        for i in 0..n {
            j[(i, n)] = -self.pattern[i];
        }
        j[(n, self.control)] = 1.0;
        j
    }
}

impl EquilibriumProblem for ControlIncrement<'_> {
    fn dimension(&self) -> usize {
        self.pattern.len() + 1
    }

    fn residual(&mut self, x: &DVector<f64>) -> DVector<f64> {
        let n = self.pattern.len();
        let u = x.rows(0, n).into_owned();
        let lambda = x[n];
        assembly::set_trial_displacement(&mut *self.springs, &u);
        let unbalance = self.pattern * lambda - assembly::internal_force(&*self.springs);

        let mut r = DVector::zeros(n + 1);
        r.rows_mut(0, n).copy_from(&unbalance);
        r[n] = self.target - u[self.control];
        r
    }

    fn tangent(&self) -> DMatrix<f64> {
        self.bordered(assembly::tangent_stiffness(&*self.springs))
    }

    fn initial_tangent(&self) -> DMatrix<f64> {
        self.bordered(assembly::initial_stiffness(&*self.springs))
    }

    /// Displacement part only; the load factor is not a displacement
    fn increment_norm(&self, dx: &DVector<f64>) -> f64 {
        dx.rows(0, self.pattern.len()).norm()
    }
}

/// Pushover of a model about a control floor (0-based)
pub struct PushoverAnalysis<'a> {
    model: &'a mut MdofModel,
    pattern: DVector<f64>,
    control: usize,
    displacement: DVector<f64>,
    load_factor: f64,
    samples: Vec<PushoverSample>,
}

impl<'a> PushoverAnalysis<'a> {
    /// Start from an unloaded, undeformed model
    pub fn new(model: &'a mut MdofModel, control: usize) -> Self {
        model.reset();
        let n = model.story_count();
        let pattern = lateral_pattern(&model.parameters().masses);
        let mut analysis = Self {
            model,
            pattern,
            control,
            displacement: DVector::zeros(n),
            load_factor: 0.0,
            samples: Vec::new(),
        };
        analysis.record_sample();
        analysis
    }

    pub fn pattern(&self) -> &DVector<f64> {
        &self.pattern
    }

    fn record_sample(&mut self) {
        let springs = &self.model.springs;
        self.samples.push(PushoverSample {
            control_disp: self.displacement[self.control],
            base_shear: springs.first().map(StorySpring::committed_force).unwrap_or(0.0),
            drift: assembly::story_drifts(&self.displacement),
            force: springs.iter().map(StorySpring::committed_force).collect(),
        });
    }

    /// Visit each target in turn with a fresh ladder; a ladder halt ends
    /// the pushover
    pub fn run(&mut self, targets: &[f64], step: f64, ladder: &LadderConfig) -> PushoverCurve {
        let slack = step * TARGET_TOLERANCE;
        let mut targets_reached = 0;

        'targets: for &target in targets {
            let mut solver_ladder = SolverLadder::new(ladder);
            loop {
                let remaining = target - self.position();
                if remaining.abs() <= slack {
                    break;
                }
                let increment = remaining.signum() * remaining.abs().min(step);
                if !solver_ladder.advance(self, increment).converged {
                    warn!(
                        "pushover halted at {:.6} m on the way to {target} m",
                        self.position()
                    );
                    break 'targets;
                }
            }
            targets_reached += 1;
            debug!(
                "pushover reached {target} m, base shear {:.3}",
                self.load_factor
            );
        }

        PushoverCurve {
            samples: std::mem::take(&mut self.samples),
            finished: targets_reached == targets.len(),
            targets_reached,
        }
    }
}

impl IncrementalAnalysis for PushoverAnalysis<'_> {
    fn attempt(&mut self, strategy: &SolutionStrategy, increment: f64) -> StepOutcome {
        let n = self.pattern.len();
        let target = self.displacement[self.control] + increment;
        let mut x0 = DVector::zeros(n + 1);
        x0.rows_mut(0, n).copy_from(&self.displacement);
        x0[n] = self.load_factor;

        let mut problem = ControlIncrement {
            springs: &mut self.model.springs,
            pattern: &self.pattern,
            control: self.control,
            target,
        };
        let result = NonlinearSolver::new(*strategy).solve(&mut problem, x0);

        if !result.converged() {
            for spring in &mut self.model.springs {
                spring.revert_to_last_commit();
            }
            return StepOutcome {
                converged: false,
                position: self.position(),
            };
        }

        for spring in &mut self.model.springs {
            spring.commit();
        }
        self.displacement = result.solution.rows(0, n).into_owned();
        self.load_factor = result.solution[n];
        self.record_sample();
        StepOutcome {
            converged: true,
            position: self.position(),
        }
    }

    fn position(&self) -> f64 {
        self.displacement[self.control]
    }
}

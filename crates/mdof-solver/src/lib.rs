//! Seismic analysis of lumped-mass shear buildings.
//!
//! The model is a stack of floors joined by nonlinear story springs. On top
//! of it this crate provides modal analysis, transient analysis under a
//! scaled ground-motion record, displacement-controlled pushover and
//! parallel incremental dynamic analysis (IDA).
//!
//! Every equilibrium increment is solved under a [`SolverLadder`]: an
//! ordered list of (convergence test, algorithm) strategies that falls back
//! to the next pair when the current one fails and halts the run once all
//! are exhausted.

pub mod assembly;
pub mod dynamic_solver;
pub mod error;
pub mod ida;
pub mod ladder;
pub mod materials;
pub mod modal_solver;
pub mod model;
pub mod nonlinear_solver;
pub mod pushover;
pub mod scaling;
pub mod spectrum;

pub use assembly::GlobalSystem;
pub use dynamic_solver::{
    DynamicState, NewmarkConfig, TimeStep, TransientAnalysis, TransientDriver, TransientOutcome,
};
pub use error::{Result, SolverError};
pub use ida::{AnalysisTask, IdaConfig, IdaRunner};
pub use ladder::{IncrementalAnalysis, LadderConfig, SolverLadder, StepOutcome};
pub use materials::{HystereticRule, StorySpring};
pub use modal_solver::{ModalResults, ModalSolver, rayleigh_coefficients};
pub use model::MdofModel;
pub use nonlinear_solver::{
    Algorithm, ConvergenceStatus, ConvergenceTest, EquilibriumProblem, NonlinearResults,
    NonlinearSolver, SolutionStrategy,
};
pub use pushover::{PushoverAnalysis, lateral_pattern};
pub use scaling::{DEFAULT_SPECTRAL_DAMPING, RecordScaler};
pub use spectrum::{response_spectrum, spectral_acceleration};

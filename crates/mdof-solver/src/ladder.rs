//! Solution-strategy fallback ladder.
//!
//! The ladder owns the ordered list of (convergence test, algorithm) pairs
//! (test outer, algorithm inner) and a cursor pointing at the current sticky
//! strategy:
//!
//! ```text
//! cursor ──► [s0, s1, ..., s47]
//!
//! attempt(s[cursor]) converged  → stay on cursor
//! attempt(s[cursor]) failed     → cursor += 1, retry the same increment
//! cursor == len                 → halted for the rest of the run
//! ```
//!
//! A failed strategy is never revisited during the run, so scanning after a
//! failure resumes from the next pair rather than from the top.

use crate::nonlinear_solver::{Algorithm, ConvergenceTest, SolutionStrategy};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Ladder contents and iteration limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderConfig {
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Convergence tests, highest priority first
    pub tests: Vec<ConvergenceTest>,
    /// Algorithms, highest priority first
    pub algorithms: Vec<Algorithm>,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 10,
            tests: ConvergenceTest::PRIORITY.to_vec(),
            algorithms: Algorithm::PRIORITY.to_vec(),
        }
    }
}

impl LadderConfig {
    /// All pairs in nested priority order
    pub fn strategies(&self) -> Vec<SolutionStrategy> {
        self.tests
            .iter()
            .flat_map(|&test| {
                self.algorithms.iter().map(move |&algorithm| {
                    SolutionStrategy::new(test, algorithm, self.tolerance, self.max_iterations)
                })
            })
            .collect()
    }
}

/// Result of one attempted increment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub converged: bool,
    /// Analysis position (time or control displacement) after the attempt
    pub position: f64,
}

/// An analysis that advances in increments under a given strategy
pub trait IncrementalAnalysis {
    /// Try to advance by `increment`. A failed attempt must leave the
    /// analysis at its last committed state.
    fn attempt(&mut self, strategy: &SolutionStrategy, increment: f64) -> StepOutcome;

    /// Current committed position
    fn position(&self) -> f64;
}

/// Exhaustion-then-stick fallback over solution strategies
#[derive(Debug, Clone)]
pub struct SolverLadder {
    strategies: Vec<SolutionStrategy>,
    cursor: usize,
    halted: bool,
    fallbacks: usize,
}

impl SolverLadder {
    pub fn new(config: &LadderConfig) -> Self {
        Self::from_strategies(config.strategies())
    }

    pub fn from_strategies(strategies: Vec<SolutionStrategy>) -> Self {
        let halted = strategies.is_empty();
        Self {
            strategies,
            cursor: 0,
            halted,
            fallbacks: 0,
        }
    }

    /// Advance `analysis` by one increment, falling back through the
    /// remaining strategies on failure
    pub fn advance<A>(&mut self, analysis: &mut A, increment: f64) -> StepOutcome
    where
        A: IncrementalAnalysis + ?Sized,
    {
        if self.halted {
            return StepOutcome {
                converged: false,
                position: analysis.position(),
            };
        }

        while let Some(strategy) = self.strategies.get(self.cursor).copied() {
            let outcome = analysis.attempt(&strategy, increment);
            if outcome.converged {
                return outcome;
            }

            self.cursor += 1;
            self.fallbacks += 1;
            if let Some(next) = self.strategies.get(self.cursor) {
                debug!(
                    "{strategy} failed at {:.6}, falling back to {next}",
                    analysis.position()
                );
            }
        }

        self.halted = true;
        let position = analysis.position();
        warn!(
            "solver ladder exhausted {} strategies at {position:.6}",
            self.strategies.len()
        );
        StepOutcome {
            converged: false,
            position,
        }
    }

    /// Strategy the next increment starts with
    pub fn active_strategy(&self) -> Option<&SolutionStrategy> {
        if self.halted {
            return None;
        }
        self.strategies.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Number of failed attempts so far
    pub fn fallbacks(&self) -> usize {
        self.fallbacks
    }

    pub fn strategies(&self) -> &[SolutionStrategy] {
        &self.strategies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Analysis whose strategies converge according to a per-step rule,
    /// recording every attempt as a strategy index
    struct Scripted<F: Fn(usize, usize) -> bool> {
        strategies: Vec<SolutionStrategy>,
        converges: F,
        step: usize,
        position: f64,
        attempts: Vec<usize>,
    }

    impl<F: Fn(usize, usize) -> bool> Scripted<F> {
        fn new(converges: F) -> Self {
            Self {
                strategies: LadderConfig::default().strategies(),
                converges,
                step: 0,
                position: 0.0,
                attempts: Vec::new(),
            }
        }
    }

    impl<F: Fn(usize, usize) -> bool> IncrementalAnalysis for Scripted<F> {
        fn attempt(&mut self, strategy: &SolutionStrategy, increment: f64) -> StepOutcome {
            let index = self
                .strategies
                .iter()
                .position(|s| s == strategy)
                .unwrap();
            self.attempts.push(index);
            let converged = (self.converges)(self.step, index);
            if converged {
                self.step += 1;
                self.position += increment;
            }
            StepOutcome {
                converged,
                position: self.position,
            }
        }

        fn position(&self) -> f64 {
            self.position
        }
    }

    #[test]
    fn default_ladder_has_48_nested_pairs() {
        let strategies = LadderConfig::default().strategies();
        assert_eq!(strategies.len(), 48);
        assert_eq!(strategies[0].test, ConvergenceTest::NormDispIncr);
        assert_eq!(strategies[0].algorithm, Algorithm::KrylovNewton);
        assert_eq!(strategies[7].algorithm, Algorithm::NewtonLineSearch);
        assert_eq!(strategies[8].test, ConvergenceTest::RelativeEnergyIncr);
        assert_eq!(strategies[8].algorithm, Algorithm::KrylovNewton);
        assert!(strategies.iter().all(|s| s.tolerance == 1e-8 && s.max_iterations == 10));
        assert!(strategies[3].initial_stiffness);
        assert!(!strategies[4].initial_stiffness);
    }

    #[test]
    fn sticks_with_first_working_pair() {
        let mut analysis = Scripted::new(|_, index| index == 3);
        let mut ladder = SolverLadder::new(&LadderConfig::default());

        for _ in 0..4 {
            assert!(ladder.advance(&mut analysis, 0.1).converged);
        }
        assert_eq!(analysis.attempts, vec![0, 1, 2, 3, 3, 3, 3]);
        assert_eq!(ladder.cursor(), 3);
        assert_eq!(ladder.fallbacks(), 3);
        assert!((analysis.position - 0.4).abs() < 1e-12);
    }

    #[test]
    fn resumes_from_next_pair_after_failure() {
        // Pair 2 works for the first two steps only; pairs 0 and 1 always fail
        let mut analysis = Scripted::new(|step, index| match index {
            2 => step < 2,
            5 => true,
            _ => false,
        });
        let mut ladder = SolverLadder::new(&LadderConfig::default());

        for _ in 0..4 {
            assert!(ladder.advance(&mut analysis, 1.0).converged);
        }
        assert_eq!(analysis.attempts, vec![0, 1, 2, 2, 2, 3, 4, 5, 5]);
        assert_eq!(ladder.active_strategy(), Some(&ladder.strategies()[5]));
    }

    #[test]
    fn halts_permanently_after_exhaustion() {
        let mut analysis = Scripted::new(|step, _| step == 0);
        let mut ladder = SolverLadder::new(&LadderConfig::default());

        assert!(ladder.advance(&mut analysis, 0.5).converged);
        let outcome = ladder.advance(&mut analysis, 0.5);
        assert!(!outcome.converged);
        assert_eq!(outcome.position, 0.5);
        assert!(ladder.is_halted());
        assert_eq!(ladder.active_strategy(), None);
        assert_eq!(analysis.attempts.len(), 1 + 48);

        // No further attempts once halted
        let outcome = ladder.advance(&mut analysis, 0.5);
        assert!(!outcome.converged);
        assert_eq!(analysis.attempts.len(), 1 + 48);
    }

    #[test]
    fn empty_ladder_is_halted() {
        let ladder = SolverLadder::from_strategies(Vec::new());
        assert!(ladder.is_halted());
    }
}

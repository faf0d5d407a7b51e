//! Global matrix assembly for the lumped-mass shear building.
//!
//! Floor `i` carries one horizontal DOF `u_i`; story `i` links floor `i-1`
//! (the ground for `i = 0`) to floor `i`:
//!
//! ```text
//! d_i = u_i - u_{i-1}            story drift
//! F_i = V_i - V_{i+1}            floor internal force (V_N = 0)
//! ```
//!
//! - K: tridiagonal, from story stiffnesses
//! - M: diagonal lumped mass
//! - C: Rayleigh, `C = αM + βK0` with the initial stiffness
//!
//! The ground DOF is fixed and never appears in the system.

use crate::error::{Result, SolverError};
use crate::materials::StorySpring;
use mdof_model::StructuralParameters;
use nalgebra::{DMatrix, DVector};

/// Global matrices of the shear building
#[derive(Debug, Clone)]
pub struct GlobalSystem {
    /// Initial (elastic) stiffness matrix
    pub stiffness: DMatrix<f64>,
    /// Lumped mass matrix
    pub mass: DMatrix<f64>,
    /// Rayleigh damping matrix (zero until damping is applied)
    pub damping: DMatrix<f64>,
    /// Ground-motion influence vector (all ones for a shear building)
    pub influence: DVector<f64>,
    /// Number of floors
    pub num_dofs: usize,
}

impl GlobalSystem {
    pub fn new(num_dofs: usize) -> Self {
        Self {
            stiffness: DMatrix::zeros(num_dofs, num_dofs),
            mass: DMatrix::zeros(num_dofs, num_dofs),
            damping: DMatrix::zeros(num_dofs, num_dofs),
            influence: DVector::from_element(num_dofs, 1.0),
            num_dofs,
        }
    }

    /// Assemble K0 and M from validated structural parameters
    pub fn assemble(params: &StructuralParameters) -> Result<Self> {
        let n = params.story_count;
        if n == 0 || params.masses.len() != n || params.stiffnesses.len() != n {
            return Err(SolverError::InvalidInput(format!(
                "inconsistent shear building: {} stories, {} masses, {} stiffnesses",
                n,
                params.masses.len(),
                params.stiffnesses.len()
            )));
        }

        let mut system = Self::new(n);
        for (i, &m) in params.masses.iter().enumerate() {
            system.mass[(i, i)] = m;
        }
        system.stiffness = story_matrix(params.stiffnesses.iter().copied(), n);
        Ok(system)
    }

    /// Set `C = αM + βK0`
    pub fn apply_rayleigh_damping(&mut self, alpha: f64, beta: f64) {
        self.damping = &self.mass * alpha + &self.stiffness * beta;
    }

    /// Effective earthquake load `-M ι a_g`
    pub fn ground_load(&self, ground_accel: f64) -> DVector<f64> {
        -(&self.mass * &self.influence) * ground_accel
    }

    pub fn total_mass(&self) -> f64 {
        self.mass.diagonal().sum()
    }
}

/// Story drifts `d_i = u_i - u_{i-1}` from floor displacements
pub fn story_drifts(u: &DVector<f64>) -> Vec<f64> {
    (0..u.len())
        .map(|i| if i == 0 { u[0] } else { u[i] - u[i - 1] })
        .collect()
}

/// Floor forces from story shears
pub fn floor_forces(story_shears: &[f64]) -> DVector<f64> {
    let n = story_shears.len();
    DVector::from_fn(n, |i, _| {
        story_shears[i] - story_shears.get(i + 1).copied().unwrap_or(0.0)
    })
}

/// Push trial deformations from `u` into the springs
pub fn set_trial_displacement(springs: &mut [StorySpring], u: &DVector<f64>) {
    for (spring, d) in springs.iter_mut().zip(story_drifts(u)) {
        spring.set_trial_deformation(d);
    }
}

/// Internal resisting force vector at the current trial state
pub fn internal_force(springs: &[StorySpring]) -> DVector<f64> {
    let shears: Vec<f64> = springs.iter().map(StorySpring::trial_force).collect();
    floor_forces(&shears)
}

/// Tangent stiffness at the current trial state
pub fn tangent_stiffness(springs: &[StorySpring]) -> DMatrix<f64> {
    story_matrix(springs.iter().map(StorySpring::trial_tangent), springs.len())
}

/// Initial stiffness of the springs
pub fn initial_stiffness(springs: &[StorySpring]) -> DMatrix<f64> {
    story_matrix(springs.iter().map(StorySpring::initial_tangent), springs.len())
}

fn story_matrix(story_stiffness: impl Iterator<Item = f64>, n: usize) -> DMatrix<f64> {
    let mut k = DMatrix::zeros(n, n);
    for (i, ki) in story_stiffness.enumerate() {
        k[(i, i)] += ki;
        if i > 0 {
            k[(i - 1, i - 1)] += ki;
            k[(i, i - 1)] -= ki;
            k[(i - 1, i)] -= ki;
        }
    }
    k
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_tridiagonal_stiffness() {
        let params = StructuralParameters::elastic(
            vec![1.0, 2.0, 3.0],
            vec![10.0, 20.0, 30.0],
            0.05,
        );
        let system = GlobalSystem::assemble(&params).unwrap();

        let expected = DMatrix::from_row_slice(
            3,
            3,
            &[30.0, -20.0, 0.0, -20.0, 50.0, -30.0, 0.0, -30.0, 30.0],
        );
        assert_eq!(system.stiffness, expected);
        assert_eq!(system.mass.diagonal(), DVector::from_vec(vec![1.0, 2.0, 3.0]));
        assert_eq!(system.total_mass(), 6.0);
    }

    #[test]
    fn drifts_and_floor_forces() {
        let u = DVector::from_vec(vec![0.1, 0.3, 0.2]);
        let drifts = story_drifts(&u);
        assert!((drifts[0] - 0.1).abs() < 1e-15);
        assert!((drifts[1] - 0.2).abs() < 1e-15);
        assert!((drifts[2] + 0.1).abs() < 1e-15);

        let f = floor_forces(&[5.0, 3.0, 1.0]);
        assert_eq!(f, DVector::from_vec(vec![2.0, 2.0, 1.0]));
    }

    #[test]
    fn rayleigh_damping_combines_mass_and_stiffness() {
        let params = StructuralParameters::uniform(2, 1.0, 10.0, 0.05);
        let mut system = GlobalSystem::assemble(&params).unwrap();
        system.apply_rayleigh_damping(0.5, 0.1);
        assert_eq!(system.damping[(0, 0)], 0.5 + 2.0);
        assert_eq!(system.damping[(0, 1)], -1.0);
    }

    #[test]
    fn ground_load_is_inertial() {
        let params = StructuralParameters::elastic(vec![2.0, 4.0], vec![1.0, 1.0], 0.0);
        let system = GlobalSystem::assemble(&params).unwrap();
        assert_eq!(system.ground_load(0.5), DVector::from_vec(vec![-1.0, -2.0]));
    }
}

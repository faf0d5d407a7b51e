//! Modal analysis of the shear building.
//!
//! Solves the undamped free-vibration problem
//! (K - λM)φ = 0
//!
//! where:
//! - K = initial story stiffness matrix
//! - M = lumped mass matrix
//! - λ = ω² (squared angular frequency)
//! - φ = mode shape
//!
//! Periods follow from `T = 2π / √λ`.
//!
//! # Example
//! ```
//! use mdof_model::StructuralParameters;
//! use mdof_solver::{GlobalSystem, ModalSolver};
//!
//! let params = StructuralParameters::uniform(1, 1000.0, 1.0e6, 0.05);
//! let system = GlobalSystem::assemble(&params).unwrap();
//! let modes = ModalSolver::new(&system).solve(1).unwrap();
//! let expected = 2.0 * std::f64::consts::PI * (1000.0_f64 / 1.0e6).sqrt();
//! assert!((modes.periods[0] - expected).abs() < 1e-9);
//! ```

use crate::assembly::GlobalSystem;
use crate::error::{Result, SolverError};
use nalgebra::linalg::{Cholesky, SymmetricEigen};
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

/// Results from modal analysis, modes in ascending frequency
#[derive(Debug, Clone)]
pub struct ModalResults {
    /// Eigenvalues (λ = ω²)
    pub eigenvalues: Vec<f64>,
    /// Natural periods [s]
    pub periods: Vec<f64>,
    /// Mode shapes, one column per mode, mass normalized
    pub mode_shapes: DMatrix<f64>,
    pub num_modes: usize,
}

impl ModalResults {
    pub fn mode_shape(&self, mode_index: usize) -> Option<DVector<f64>> {
        if mode_index >= self.num_modes {
            return None;
        }
        Some(self.mode_shapes.column(mode_index).into_owned())
    }

    /// Angular frequency (rad/s) of a mode
    pub fn angular_frequency(&self, mode_index: usize) -> Option<f64> {
        self.eigenvalues.get(mode_index).map(|&lambda| lambda.sqrt())
    }

    pub fn fundamental_period(&self) -> Option<f64> {
        self.periods.first().copied()
    }
}

/// Eigen solver over assembled K0 and M
pub struct ModalSolver<'a> {
    system: &'a GlobalSystem,
}

impl<'a> ModalSolver<'a> {
    pub fn new(system: &'a GlobalSystem) -> Self {
        Self { system }
    }

    /// Compute the first `num_modes` modes (capped at the number of floors)
    pub fn solve(&self, num_modes: usize) -> Result<ModalResults> {
        let n = self.system.num_dofs;
        if n == 0 {
            return Err(SolverError::Eigen(
                "cannot solve eigenvalue problem for 0×0 matrices".to_string(),
            ));
        }
        if num_modes == 0 {
            return Err(SolverError::Eigen("requested zero modes".to_string()));
        }

        // M = L Lᵀ, K* = L⁻¹ K L⁻ᵀ, φ = L⁻ᵀ ψ
        let chol = Cholesky::new(self.system.mass.clone()).ok_or_else(|| {
            SolverError::Eigen("mass matrix is not positive definite".to_string())
        })?;
        let l_inv = chol
            .l()
            .try_inverse()
            .ok_or_else(|| SolverError::Eigen("failed to invert Cholesky factor".to_string()))?;
        let k_star = &l_inv * &self.system.stiffness * l_inv.transpose();

        let eigen = SymmetricEigen::new(k_star);
        let l_inv_t = l_inv.transpose();

        let mut pairs: Vec<(f64, DVector<f64>)> = (0..n)
            .filter(|&i| eigen.eigenvalues[i] > 1e-12)
            .map(|i| {
                let psi: DVector<f64> = eigen.eigenvectors.column(i).into_owned();
                (eigen.eigenvalues[i], &l_inv_t * psi)
            })
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let count = pairs.len().min(num_modes);
        if count == 0 {
            return Err(SolverError::Eigen(
                "no positive eigenvalues found".to_string(),
            ));
        }

        let eigenvalues: Vec<f64> = pairs[..count].iter().map(|(lambda, _)| *lambda).collect();
        let periods = eigenvalues.iter().map(|&lambda| 2.0 * PI / lambda.sqrt()).collect();
        let mut mode_shapes = DMatrix::zeros(n, count);
        for (i, (_, phi)) in pairs[..count].iter().enumerate() {
            mode_shapes.set_column(i, phi);
        }

        Ok(ModalResults {
            eigenvalues,
            periods,
            mode_shapes,
            num_modes: count,
        })
    }
}

/// Rayleigh coefficients `(α, β)` giving damping ratio `xi` at `omega_i`
/// and `omega_j`:
///
/// ```text
/// α = ξ · 2 ωi ωj / (ωi + ωj)
/// β = 2 ξ / (ωi + ωj)
/// ```
pub fn rayleigh_coefficients(xi: f64, omega_i: f64, omega_j: f64) -> (f64, f64) {
    let sum = omega_i + omega_j;
    (xi * 2.0 * omega_i * omega_j / sum, 2.0 * xi / sum)
}

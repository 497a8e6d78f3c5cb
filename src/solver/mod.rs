//! Eigensolver interfaces.

use crate::config::{EigParams, EigType};
use crate::core::traits::{LinearOperator, VectorSpace, VectorStore};
use crate::error::EigError;
use crate::utils::convergence::EigStats;

pub mod arrow;
pub mod base;
pub mod dense;
pub mod svd;
pub mod trlm;

pub use arrow::{ArrowMatrix, RitzDecomposition};
pub use base::EigenSolverCore;
pub use dense::DenseEigSolver;
pub use svd::SvdTriplets;
pub use trlm::{StepOutcome, Trlm, TrlmPhase};

/// Eigenpairs returned by a solve, ordered by the requested spectrum.
#[derive(Debug, Clone)]
pub struct EigResult<V> {
    pub evecs: Vec<V>,
    pub evals: Vec<f64>,
    /// ‖Op·v − λ·v‖ for each returned pair.
    pub residua: Vec<f64>,
    pub num_converged: usize,
    /// False when the solve ran out of restarts or Krylov space before `n_conv` pairs
    /// converged; the pairs that did converge are still returned.
    pub converged: bool,
    pub stats: EigStats,
    /// Singular triplets when `compute_svd` is set.
    pub svd: Option<SvdTriplets<V>>,
}

/// Common interface for the eigensolver back-ends.
pub trait EigenSolver<V> {
    /// Solve from the starting space `kspace` (its first vector is the initial guess).
    fn solve(&mut self, kspace: Vec<V>) -> Result<EigResult<V>, EigError>;
}

/// Build the back-end selected by `params.eig_type`.
pub fn create<'a, S, O>(
    params: EigParams,
    op: &'a O,
    space: &'a S,
    store: Option<&'a mut dyn VectorStore<S::Vector>>,
) -> Result<Box<dyn EigenSolver<S::Vector> + 'a>, EigError>
where
    S: VectorSpace + 'a,
    O: LinearOperator<S::Vector> + ?Sized + 'a,
{
    let solver: Box<dyn EigenSolver<S::Vector> + 'a> = match params.eig_type {
        EigType::Trlm => {
            let solver = Trlm::new(params, op, space)?;
            Box::new(match store {
                Some(store) => solver.with_store(store),
                None => solver,
            })
        }
        EigType::Dense => {
            let solver = DenseEigSolver::new(params, op, space)?;
            Box::new(match store {
                Some(store) => solver.with_store(store),
                None => solver,
            })
        }
    };
    Ok(solver)
}

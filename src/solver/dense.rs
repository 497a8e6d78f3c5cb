//! Dense eigensolver backend.
//!
//! Materialises the operator form column by column and hands it to faer's
//! self-adjoint eigen-decomposition. Meant for small problems and for cross-checking
//! the iterative solver; it only runs on a single process.

use std::time::Instant;

use faer::{Mat, Side};
use log::info;

use crate::config::EigParams;
use crate::core::traits::{LinearOperator, VectorSpace, VectorStore};
use crate::error::EigError;
use crate::solver::base::EigenSolverCore;
use crate::solver::svd::compute_svd;
use crate::solver::{EigResult, EigenSolver};
use crate::utils::convergence::EigStats;

pub struct DenseEigSolver<'a, S, O>
where
    S: VectorSpace,
    O: LinearOperator<S::Vector> + ?Sized,
{
    core: EigenSolverCore<'a, S, O>,
    store: Option<&'a mut dyn VectorStore<S::Vector>>,
}

impl<'a, S, O> DenseEigSolver<'a, S, O>
where
    S: VectorSpace,
    O: LinearOperator<S::Vector> + ?Sized,
{
    pub fn new(params: EigParams, op: &'a O, space: &'a S) -> Result<Self, EigError> {
        Ok(Self { core: EigenSolverCore::new(params, op, space)?, store: None })
    }

    pub fn with_store(mut self, store: &'a mut dyn VectorStore<S::Vector>) -> Self {
        self.store = Some(store);
        self
    }

    /// Dense matrix of the operator form, one application per column.
    fn materialise(&self) -> Mat<f64> {
        let space = self.core.space();
        let n = space.local_len();
        let mut a = Mat::<f64>::zeros(n, n);
        let mut e = space.create();
        let mut col = space.create();
        for j in 0..n {
            e.as_mut()[j] = 1.0;
            self.core.apply_operator(&mut col, &e);
            e.as_mut()[j] = 0.0;
            for (i, &x) in col.as_ref().iter().enumerate() {
                a[(i, j)] = x;
            }
        }
        a
    }
}

impl<S, O> EigenSolver<S::Vector> for DenseEigSolver<'_, S, O>
where
    S: VectorSpace,
    O: LinearOperator<S::Vector> + ?Sized,
{
    /// The starting space is not used.
    fn solve(&mut self, _kspace: Vec<S::Vector>) -> Result<EigResult<S::Vector>, EigError> {
        let space = self.core.space();
        if space.size() > 1 {
            return Err(EigError::Unsupported("the dense eigensolver runs on a single process"));
        }
        let params = self.core.params.clone();
        let n = space.local_len();
        if params.n_conv > n {
            return Err(EigError::Config(format!(
                "n_conv = {} exceeds the problem dimension {n}",
                params.n_conv
            )));
        }

        let a = self.materialise();
        let start = Instant::now();
        let evd = a
            .as_ref()
            .self_adjoint_eigen(Side::Lower)
            .map_err(|e| EigError::Eigensolve(format!("{e:?}")))?;
        let s = evd.S();
        let u = evd.U();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&i, &j| params.spectrum.compare(s[i], s[j]));
        self.core.profile_mut().time_eigen += start.elapsed();

        let evecs: Vec<S::Vector> = order[..params.n_conv]
            .iter()
            .map(|&k| {
                let mut v = space.create();
                for (i, x) in v.as_mut().iter_mut().enumerate() {
                    *x = u[(i, k)];
                }
                v
            })
            .collect();
        let mut evals = Vec::with_capacity(params.n_conv);
        let residua = self.core.compute_evals(&evecs, &mut evals, params.n_conv)?;
        let svd = if params.compute_svd {
            Some(compute_svd(&self.core, &evecs, &evals)?)
        } else {
            None
        };
        if let (Some(id), Some(store)) = (params.vec_outfile.as_deref(), self.store.as_deref_mut()) {
            self.core.save_vectors(store, &evecs, id)?;
        }
        let stats = EigStats {
            iterations: n,
            restarts: 0,
            num_converged: evecs.len(),
            converged: true,
            profile: self.core.profile(),
        };
        info!("dense eigensolver: {} eigenpairs of an order {n} operator", evecs.len());
        Ok(EigResult {
            num_converged: evecs.len(),
            evecs,
            evals,
            residua,
            converged: true,
            stats,
            svd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Spectrum;
    use crate::core::wrappers::VecSpace;
    use crate::matrix::DiagonalOperator;
    use approx::assert_abs_diff_eq;

    #[test]
    fn largest_of_a_diagonal() {
        let op = DiagonalOperator::new(vec![4.0, -1.0, 7.0, 2.0]);
        let space = VecSpace::serial(4);
        let params = EigParams::new(1, 3, 2, 1e-10).with_spectrum(Spectrum::LargestReal);
        let mut solver = DenseEigSolver::new(params, &op, &space).unwrap();
        let result = solver.solve(Vec::new()).unwrap();
        assert_abs_diff_eq!(result.evals[0], 7.0, epsilon = 1e-12);
        assert_abs_diff_eq!(result.evals[1], 4.0, epsilon = 1e-12);
        assert!(result.residua.iter().all(|&r| r < 1e-12));
        assert_eq!(result.stats.profile.n_matvec, 4 + 2);
    }

    #[test]
    fn n_conv_larger_than_problem() {
        let op = DiagonalOperator::ladder(3);
        let space = VecSpace::serial(3);
        let mut solver =
            DenseEigSolver::new(EigParams::new(2, 6, 5, 1e-10), &op, &space).unwrap();
        assert!(matches!(solver.solve(Vec::new()), Err(EigError::Config(_))));
    }
}

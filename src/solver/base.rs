//! Operations shared by every eigensolver strategy.
//!
//! `EigenSolverCore` owns the validated parameters, borrows the operator and the vector
//! space, and provides operator application (plain, adjoint, normal and
//! Chebyshev-filtered), Gram-Schmidt orthogonalisation, deflation, eigenvalue/residual
//! evaluation and checkpoint delegation. Temporaries come from a scratch pool and every
//! kernel is accounted in a [`SolveProfile`].
//!
//! All reductions go through [`VectorSpace`]; every control decision in this module is
//! taken on reduced values, so all processes issue the same sequence of collectives.

use std::cell::{RefCell, RefMut};
use std::time::Instant;

use log::{debug, warn};
use rand::Rng;

use crate::config::{EigParams, OpForm};
use crate::core::traits::{LinearOperator, VectorSpace, VectorStore};
use crate::error::EigError;
use crate::utils::profile::SolveProfile;
use crate::utils::scratch::{Scratch, ScratchPool};

/// Re-orthogonalise when a Gram-Schmidt pass shrinks the vector below this fraction
/// of its previous norm (Daniel-Gragg-Kaufman-Stewart criterion).
const REORTH_ETA: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Eigenpairs loaded and re-validated from a checkpoint.
pub struct LoadedPairs<V> {
    pub evecs: Vec<V>,
    pub evals: Vec<f64>,
    pub residua: Vec<f64>,
}

pub struct EigenSolverCore<'a, S, O>
where
    S: VectorSpace,
    O: LinearOperator<S::Vector> + ?Sized,
{
    pub params: EigParams,
    space: &'a S,
    op: &'a O,
    poly_bounds: Option<(f64, f64)>,
    pool: ScratchPool<S::Vector>,
    profile: RefCell<SolveProfile>,
}

impl<'a, S, O> EigenSolverCore<'a, S, O>
where
    S: VectorSpace,
    O: LinearOperator<S::Vector> + ?Sized,
{
    /// Validate `params` against the operator and build the core.
    pub fn new(params: EigParams, op: &'a O, space: &'a S) -> Result<Self, EigError> {
        params.validate()?;
        if !params.op_form.contains(OpForm::NORMAL) && !op.is_hermitian() {
            return Err(EigError::Config(
                "a non-Hermitian operator needs a normal form (M†M or MM†)".into(),
            ));
        }
        let poly_bounds = if params.use_poly_acc {
            let (a, b) = params.poly_bounds.or(op.spectral_bounds()).ok_or_else(|| {
                EigError::Config("polynomial acceleration needs spectral bounds".into())
            })?;
            if !(a.is_finite() && b.is_finite() && a < b) {
                return Err(EigError::Config(format!(
                    "operator spectral bounds [{a}, {b}] are not a valid interval"
                )));
            }
            Some((a, b))
        } else {
            None
        };
        Ok(Self {
            params,
            space,
            op,
            poly_bounds,
            pool: ScratchPool::new(),
            profile: RefCell::new(SolveProfile::default()),
        })
    }

    pub fn space(&self) -> &'a S {
        self.space
    }

    pub fn op(&self) -> &'a O {
        self.op
    }

    /// Snapshot of the accumulated timings and counters.
    pub fn profile(&self) -> SolveProfile {
        self.profile.borrow().clone()
    }

    /// A pooled temporary; contents are unspecified.
    pub fn scratch(&self) -> Scratch<'_, S::Vector> {
        self.pool.acquire(|| self.space.create())
    }

    /// Fill `v` with uniform entries in [-1, 1).
    pub fn randomize(&self, rng: &mut impl Rng, v: &mut S::Vector) {
        for x in v.as_mut() {
            *x = rng.gen_range(-1.0..1.0);
        }
    }

    pub(crate) fn profile_mut(&self) -> RefMut<'_, SolveProfile> {
        self.profile.borrow_mut()
    }

    pub(crate) fn add_blas_time(&self, start: Instant) {
        self.profile.borrow_mut().time_blas += start.elapsed();
    }

    /// Apply the operator form selected by `op_form`.
    pub fn apply_operator(&self, out: &mut S::Vector, input: &S::Vector) {
        self.apply_form(self.params.op_form, out, input);
    }

    /// Apply an explicit form: M, M†, M†M (`NORMAL`) or MM† (`NORMAL | DAGGER`).
    pub fn apply_form(&self, form: OpForm, out: &mut S::Vector, input: &S::Vector) {
        let start = Instant::now();
        let applications = if form.contains(OpForm::NORMAL) {
            let mut tmp = self.scratch();
            if form.contains(OpForm::DAGGER) {
                self.op.apply_adjoint(input, &mut tmp);
                self.op.apply(&tmp, out);
            } else {
                self.op.apply(input, &mut tmp);
                self.op.apply_adjoint(&tmp, out);
            }
            2
        } else if form.contains(OpForm::DAGGER) {
            self.op.apply_adjoint(input, out);
            1
        } else {
            self.op.apply(input, out);
            1
        };
        let mut profile = self.profile.borrow_mut();
        profile.time_mv += start.elapsed();
        profile.n_matvec += applications;
        profile.flops += applications * self.op.flops_per_apply();
    }

    /// out = T_d(L)·input with L = (2·Op − (a+b)·I)/(b−a).
    ///
    /// `[a, b]` is mapped onto [-1, 1], where |T_d| ≤ 1; eigenvalues outside it are
    /// amplified.
    pub fn chebyshev_accelerate(
        &self,
        out: &mut S::Vector,
        input: &S::Vector,
    ) -> Result<(), EigError> {
        let (a, b) = self.poly_bounds.ok_or_else(|| {
            EigError::Config("Chebyshev acceleration is not configured".into())
        })?;
        let degree = self.params.poly_deg;
        let space = self.space;
        if degree == 0 {
            space.copy(input, out);
            return Ok(());
        }
        let delta = (b - a) / 2.0;
        let theta = (b + a) / 2.0;

        let mut t_prev = self.scratch();
        let mut t_curr = self.scratch();
        let mut t_next = self.scratch();
        space.copy(input, &mut t_prev);
        // T_1 = L·in
        self.apply_operator(&mut t_curr, input);
        let start = Instant::now();
        space.axpy(-theta, input, &mut t_curr);
        space.scale(1.0 / delta, &mut t_curr);
        self.add_blas_time(start);
        for _k in 2..=degree {
            // T_k = 2·L·T_{k-1} − T_{k-2}
            self.apply_operator(&mut t_next, &t_curr);
            let start = Instant::now();
            space.axpy(-theta, &t_curr, &mut t_next);
            space.scale(2.0 / delta, &mut t_next);
            space.axpy(-1.0, &t_prev, &mut t_next);
            self.add_blas_time(start);
            std::mem::swap(&mut t_prev, &mut t_curr);
            std::mem::swap(&mut t_curr, &mut t_next);
        }
        space.copy(&t_curr, out);
        Ok(())
    }

    /// Operator used to build the Krylov space: filtered when acceleration is on.
    pub fn apply_krylov_operator(
        &self,
        out: &mut S::Vector,
        input: &S::Vector,
    ) -> Result<(), EigError> {
        if self.params.use_poly_acc {
            self.chebyshev_accelerate(out, input)
        } else {
            self.apply_operator(out, input);
            Ok(())
        }
    }

    /// Remove from `r` its projection on `vecs[..count]`, one reduction per vector
    /// (modified Gram-Schmidt). Returns the sum of first-pass inner products.
    pub fn orthogonalise(&self, vecs: &[S::Vector], r: &mut S::Vector, count: usize) -> f64 {
        let start = Instant::now();
        let space = self.space;
        let mut norm_before = space.norm(r);
        let mut sum = 0.0;
        for pass in 0..2 {
            for v in &vecs[..count] {
                let c = space.dot(v, r);
                space.axpy(-c, v, r);
                if pass == 0 {
                    sum += c;
                }
            }
            let norm_after = space.norm(r);
            if norm_after > REORTH_ETA * norm_before {
                break;
            }
            norm_before = norm_after;
        }
        self.add_blas_time(start);
        sum
    }

    /// Same contract as [`orthogonalise`](Self::orthogonalise), with all projections of
    /// a pass taken from one block reduction.
    pub fn block_orthogonalise(
        &self,
        vecs: &[S::Vector],
        r: &mut S::Vector,
        count: usize,
    ) -> f64 {
        let start = Instant::now();
        let space = self.space;
        let basis = &vecs[..count];
        let mut norm_before = space.norm(r);
        let mut sum = 0.0;
        for pass in 0..2 {
            let mut coeffs = space.block_dot(basis, r);
            if pass == 0 {
                sum = coeffs.iter().sum();
            }
            coeffs.iter_mut().for_each(|c| *c = -*c);
            space.lincomb(&coeffs, basis, r);
            let norm_after = space.norm(r);
            if norm_after > REORTH_ETA * norm_before {
                break;
            }
            norm_before = norm_after;
        }
        self.add_blas_time(start);
        sum
    }

    /// Weight 1/λ of one deflation component.
    fn deflation_weight(index: usize, value: f64, scale: f64) -> Result<f64, EigError> {
        if value.abs() <= f64::EPSILON * scale || value == 0.0 {
            return Err(EigError::Domain { index, value });
        }
        Ok(1.0 / value)
    }

    /// out_k = Σ_i ⟨v_i, in_k⟩/λ_i · v_i.
    ///
    /// Components with a near-zero eigenvalue are skipped; their indices are returned.
    pub fn deflate(
        &self,
        out: &mut [S::Vector],
        input: &[S::Vector],
        evecs: &[S::Vector],
        evals: &[f64],
    ) -> Result<Vec<usize>, EigError> {
        if evecs.len() != evals.len() {
            return Err(EigError::DimensionMismatch { expected: evecs.len(), found: evals.len() });
        }
        if out.len() != input.len() {
            return Err(EigError::DimensionMismatch { expected: input.len(), found: out.len() });
        }
        let scale = evals.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        let mut skipped = Vec::new();
        let weights: Vec<f64> = evals
            .iter()
            .enumerate()
            .map(|(i, &v)| match Self::deflation_weight(i, v, scale) {
                Ok(w) => w,
                Err(err) => {
                    warn!("deflation: skipping component ({err})");
                    skipped.push(i);
                    0.0
                }
            })
            .collect();

        let start = Instant::now();
        let space = self.space;
        for (o, x) in out.iter_mut().zip(input) {
            let proj = space.block_dot(evecs, x);
            let coeffs: Vec<f64> = proj.iter().zip(&weights).map(|(p, w)| p * w).collect();
            space.zero(o);
            space.lincomb(&coeffs, evecs, o);
        }
        self.add_blas_time(start);
        Ok(skipped)
    }

    /// Rayleigh quotients and residual norms ‖Op·v − λv‖ of `vecs[..k]`.
    ///
    /// `evals` is overwritten with the eigenvalues; the residuals are returned.
    pub fn compute_evals(
        &self,
        vecs: &[S::Vector],
        evals: &mut Vec<f64>,
        k: usize,
    ) -> Result<Vec<f64>, EigError> {
        if k > vecs.len() {
            return Err(EigError::DimensionMismatch { expected: k, found: vecs.len() });
        }
        let space = self.space;
        evals.clear();
        let mut residua = Vec::with_capacity(k);
        let mut w = self.scratch();
        for (i, v) in vecs[..k].iter().enumerate() {
            self.apply_operator(&mut w, v);
            let start = Instant::now();
            let lambda = space.dot(v, &w) / space.dot(v, v);
            space.axpy(-lambda, v, &mut w);
            let residual = space.norm(&w);
            self.add_blas_time(start);
            debug!("eval[{i:04}] = {lambda:+.16e} residual = {residual:.6e}");
            evals.push(lambda);
            residua.push(residual);
        }
        Ok(residua)
    }

    /// Load up to `count` vectors stored under `id`.
    pub fn load_vectors(
        &self,
        store: &mut dyn VectorStore<S::Vector>,
        id: &str,
        count: usize,
    ) -> Result<Vec<S::Vector>, EigError> {
        let vecs = store.load(id, count)?;
        let expected = self.space.local_len();
        if let Some(bad) = vecs.iter().find(|v| v.as_ref().len() != expected) {
            return Err(EigError::DimensionMismatch { expected, found: bad.as_ref().len() });
        }
        Ok(vecs)
    }

    pub fn save_vectors(
        &self,
        store: &mut dyn VectorStore<S::Vector>,
        vecs: &[S::Vector],
        id: &str,
    ) -> Result<(), EigError> {
        debug!("saving {} vectors to '{id}'", vecs.len());
        store.save(id, vecs)
    }

    /// Load `count` eigenvectors from `vec_infile` and re-validate them.
    ///
    /// A pair whose residual exceeds `tol · max(1, max|λ|)` fails validation. Failures
    /// are fatal under `strict_load`; otherwise they are logged and `None` is returned
    /// so the caller starts from a fresh vector.
    pub fn load_from_file(
        &self,
        store: &mut dyn VectorStore<S::Vector>,
        count: usize,
    ) -> Result<Option<LoadedPairs<S::Vector>>, EigError> {
        let Some(id) = self.params.vec_infile.as_deref() else {
            return Err(EigError::Config("no checkpoint to load (vec_infile unset)".into()));
        };
        match self.load_and_validate(store, id, count) {
            Ok(pairs) => Ok(Some(pairs)),
            Err(err) if !self.params.strict_load => {
                warn!("checkpoint '{id}' rejected ({err}); starting from a fresh vector");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn load_and_validate(
        &self,
        store: &mut dyn VectorStore<S::Vector>,
        id: &str,
        count: usize,
    ) -> Result<LoadedPairs<S::Vector>, EigError> {
        let evecs = self.load_vectors(store, id, count)?;
        if evecs.len() < count {
            return Err(EigError::Store(format!(
                "'{id}' holds {} vectors, {count} requested",
                evecs.len()
            )));
        }
        let mut evals = Vec::with_capacity(count);
        let residua = self.compute_evals(&evecs, &mut evals, count)?;
        let scale = evals.iter().fold(1.0f64, |m, v| m.max(v.abs()));
        let tol = self.params.tol;
        if let Some((index, &residual)) = residua
            .iter()
            .enumerate()
            .find(|(_, r)| !(**r <= tol * scale))
        {
            return Err(EigError::Validation { index, residual, tol });
        }
        Ok(LoadedPairs { evecs, evals, residua })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::wrappers::VecSpace;
    use crate::matrix::DiagonalOperator;
    use approx::assert_abs_diff_eq;

    fn unit(n: usize, i: usize) -> Vec<f64> {
        let mut v = vec![0.0; n];
        v[i] = 1.0;
        v
    }

    #[test]
    fn rejects_non_hermitian_plain_form() {
        let a = faer::Mat::from_fn(3, 3, |i, j| if j == i + 1 { 1.0 } else { 0.0 });
        let space = VecSpace::serial(3);
        let err = EigenSolverCore::new(EigParams::new(1, 3, 1, 1e-8), &a, &space);
        assert!(matches!(err, Err(EigError::Config(_))));
        let params = EigParams::new(1, 3, 1, 1e-8).with_op_form(OpForm::NORMAL);
        assert!(EigenSolverCore::new(params, &a, &space).is_ok());
    }

    #[test]
    fn normal_forms_compose_adjoint() {
        // M = [[1, 2], [0, 3]]
        let a = faer::Mat::from_fn(2, 2, |i, j| [[1.0, 2.0], [0.0, 3.0]][i][j]);
        let space = VecSpace::serial(2);
        let params = EigParams::new(1, 2, 1, 1e-8).with_op_form(OpForm::NORMAL);
        let core = EigenSolverCore::new(params, &a, &space).unwrap();
        let mut y = vec![0.0; 2];
        // M†M = [[1, 2], [2, 13]]
        core.apply_operator(&mut y, &vec![1.0, 1.0]);
        assert_eq!(y, vec![3.0, 15.0]);
        // MM† = [[5, 6], [6, 9]]
        core.apply_form(OpForm::NORMAL | OpForm::DAGGER, &mut y, &vec![1.0, 1.0]);
        assert_eq!(y, vec![11.0, 15.0]);
        assert_eq!(core.profile().n_matvec, 4);
    }

    #[test]
    fn chebyshev_matches_scalar_recurrence() {
        let op = DiagonalOperator::new(vec![0.5, 3.0, 6.0]);
        let space = VecSpace::serial(3);
        let params = EigParams::new(1, 2, 1, 1e-8).with_poly_acc(4, 2.0, 8.0);
        let core = EigenSolverCore::new(params, &op, &space).unwrap();
        let mut y = vec![0.0; 3];
        core.chebyshev_accelerate(&mut y, &vec![1.0, 1.0, 1.0]).unwrap();
        let t4 = |x: f64| 8.0 * x.powi(4) - 8.0 * x * x + 1.0;
        for (yi, d) in y.iter().zip([0.5, 3.0, 6.0]) {
            assert_abs_diff_eq!(*yi, t4((2.0 * d - 10.0) / 6.0), epsilon = 1e-12);
        }
        // suppressed interval stays bounded, the wanted end is amplified
        assert!(y[1].abs() <= 1.0 && y[2].abs() <= 1.0);
        assert!(y[0] > 1.0);
    }

    #[test]
    fn block_and_sequential_orthogonalisation_agree() {
        let op = DiagonalOperator::ladder(4);
        let space = VecSpace::serial(4);
        let core = EigenSolverCore::new(EigParams::new(1, 2, 1, 1e-8), &op, &space).unwrap();
        let s = 0.5f64.sqrt();
        let basis = vec![vec![s, s, 0.0, 0.0], vec![0.0, 0.0, 1.0, 0.0]];
        let mut r1 = vec![1.0, 2.0, 3.0, 4.0];
        let mut r2 = r1.clone();
        let sum1 = core.orthogonalise(&basis, &mut r1, 2);
        let sum2 = core.block_orthogonalise(&basis, &mut r2, 2);
        assert_abs_diff_eq!(sum1, 3.0 * s + 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sum2, sum1, epsilon = 1e-12);
        for (a, b) in r1.iter().zip(&r2) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
        for v in &basis {
            assert_abs_diff_eq!(space.dot(v, &r1), 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn deflation_skips_near_zero_eigenvalues() {
        let op = DiagonalOperator::new(vec![0.0, 2.0, 4.0]);
        let space = VecSpace::serial(3);
        let core = EigenSolverCore::new(EigParams::new(1, 2, 1, 1e-8), &op, &space).unwrap();
        let evecs = vec![unit(3, 0), unit(3, 1), unit(3, 2)];
        let evals = vec![0.0, 2.0, 4.0];
        let input = vec![vec![1.0, 1.0, 1.0]];
        let mut out = vec![space.create()];
        let skipped = core.deflate(&mut out, &input, &evecs, &evals).unwrap();
        assert_eq!(skipped, vec![0]);
        assert_eq!(out[0], vec![0.0, 0.5, 0.25]);
    }

    #[test]
    fn compute_evals_reports_rayleigh_quotient_and_residual() {
        let op = DiagonalOperator::ladder(3);
        let space = VecSpace::serial(3);
        let core = EigenSolverCore::new(EigParams::new(1, 2, 1, 1e-8), &op, &space).unwrap();
        let s = 0.5f64.sqrt();
        let vecs = vec![unit(3, 1), vec![s, s, 0.0]];
        let mut evals = Vec::new();
        let residua = core.compute_evals(&vecs, &mut evals, 2).unwrap();
        assert_abs_diff_eq!(evals[0], 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(residua[0], 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(evals[1], 1.5, epsilon = 1e-14);
        assert_abs_diff_eq!(residua[1], 0.5, epsilon = 1e-14);
        assert!(core.compute_evals(&vecs, &mut evals, 3).is_err());
    }
}

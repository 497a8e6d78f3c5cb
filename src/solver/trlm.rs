//! Thick-restart Lanczos method (TRLM) for Hermitian eigenproblems.
//!
//! The solver grows an orthonormal Krylov basis `v[0..n_kr]` with the Lanczos
//! recurrence, eigen-decomposes the projected arrow matrix, and restarts by keeping a
//! rotated set of Ritz vectors. Pairs whose residual falls below machine precision are
//! locked and never touched again; the solve stops once `n_conv` leading pairs meet the
//! tolerance or `max_restarts` is reached.
//!
//! # Phases
//! `Initializing → (Extending → Restarting)* → Converged | Exhausted`
//!
//! # References
//! - Wu & Simon, "Thick-restart Lanczos method for large symmetric eigenvalue
//!   problems", SIAM J. Matrix Anal. Appl. 22 (2000).

use std::time::Instant;

use log::{debug, info, trace, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::EigParams;
use crate::core::traits::{LinearOperator, VectorSpace, VectorStore};
use crate::error::EigError;
use crate::solver::arrow::{ArrowMatrix, RitzDecomposition};
use crate::solver::base::{EigenSolverCore, LoadedPairs};
use crate::solver::svd::{SvdTriplets, compute_svd};
use crate::solver::{EigResult, EigenSolver};
use crate::utils::convergence::{ConvergenceState, EigStats};
use crate::utils::profile::SolveProfile;

/// β below this fraction of the local operator scale ends the recurrence.
const BREAKDOWN_TOL: f64 = 1e-12;
/// A fresh random direction keeping less than this fraction of its norm after
/// orthogonalisation means the basis spans the whole space.
const RESEED_TOL: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrlmPhase {
    Initializing,
    Extending,
    Restarting,
    Converged,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// `v[j+1]` holds the next normalised Lanczos vector.
    Extended,
    /// β vanished: `v[0..=j]` spans an invariant subspace.
    Breakdown,
}

pub struct Trlm<'a, S, O>
where
    S: VectorSpace,
    O: LinearOperator<S::Vector> + ?Sized,
{
    core: EigenSolverCore<'a, S, O>,
    store: Option<&'a mut dyn VectorStore<S::Vector>>,
    kspace: Vec<S::Vector>,
    arrow: ArrowMatrix,
    residua: Vec<f64>,
    state: ConvergenceState,
    phase: TrlmPhase,
    rng: StdRng,
    breakdown: bool,
}

impl<'a, S, O> Trlm<'a, S, O>
where
    S: VectorSpace,
    O: LinearOperator<S::Vector> + ?Sized,
{
    pub fn new(params: EigParams, op: &'a O, space: &'a S) -> Result<Self, EigError> {
        let core = EigenSolverCore::new(params, op, space)?;
        let n_kr = core.params.n_kr;
        let rng = StdRng::seed_from_u64(core.params.seed.wrapping_add(space.rank() as u64));
        Ok(Self {
            core,
            store: None,
            kspace: Vec::new(),
            arrow: ArrowMatrix::new(n_kr),
            residua: vec![0.0; n_kr],
            state: ConvergenceState::default(),
            phase: TrlmPhase::Initializing,
            rng,
            breakdown: false,
        })
    }

    /// Attach the store used for `vec_infile` / `vec_outfile`.
    pub fn with_store(mut self, store: &'a mut dyn VectorStore<S::Vector>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn params(&self) -> &EigParams {
        &self.core.params
    }

    pub fn phase(&self) -> TrlmPhase {
        self.phase
    }

    pub fn state(&self) -> &ConvergenceState {
        &self.state
    }

    pub fn arrow(&self) -> &ArrowMatrix {
        &self.arrow
    }

    pub fn kspace(&self) -> &[S::Vector] {
        &self.kspace
    }

    /// Residual estimates of the Ritz pairs, indexed like the Krylov basis.
    pub fn residua(&self) -> &[f64] {
        &self.residua
    }

    pub fn profile(&self) -> SolveProfile {
        self.core.profile()
    }

    /// Reset the solver around the caller's starting space.
    ///
    /// `kspace[0]` is the initial guess; a zero (or missing) guess is replaced by a
    /// random vector seeded from `seed + rank`.
    pub fn initialize(&mut self, mut kspace: Vec<S::Vector>) -> Result<(), EigError> {
        let space = self.core.space();
        let n = space.local_len();
        if let Some(bad) = kspace.iter().find(|v| v.as_ref().len() != n) {
            return Err(EigError::DimensionMismatch { expected: n, found: bad.as_ref().len() });
        }
        let n_kr = self.core.params.n_kr;
        kspace.truncate(n_kr + 1);
        kspace.resize_with(n_kr + 1, || space.create());
        self.kspace = kspace;

        let mut norm = space.norm(&self.kspace[0]);
        if !(norm > 0.0 && norm.is_finite()) {
            debug!("TRLM: no usable initial guess, starting from a random vector");
            self.core.randomize(&mut self.rng, &mut self.kspace[0]);
            norm = space.norm(&self.kspace[0]);
        }
        space.scale(1.0 / norm, &mut self.kspace[0]);

        self.arrow.set_len(0);
        self.residua.fill(0.0);
        self.state = ConvergenceState::default();
        self.breakdown = false;
        self.phase = TrlmPhase::Initializing;
        Ok(())
    }

    /// One Lanczos step from `v[j]`: fills `alpha[j]`, `beta[j]` and `v[j+1]`.
    ///
    /// Right after a restart (`j == num_keep`) the couplings to every kept vector are
    /// removed; otherwise only the three-term recurrence is applied. The result is
    /// then fully re-orthogonalised against `v[0..=j]`.
    pub fn lanczos_step(&mut self, j: usize) -> Result<StepOutcome, EigError> {
        let space = self.core.space();
        let num_keep = self.state.num_keep;
        let num_locked = self.state.num_locked;
        let (head, tail) = self.kspace.split_at_mut(j + 1);

        let mut r = self.core.scratch();
        self.core.apply_krylov_operator(&mut r, &head[j])?;

        let start = Instant::now();
        let alpha = space.dot(&head[j], &r);
        space.axpy(-alpha, &head[j], &mut r);
        let first = if j > num_keep { j - 1 } else { num_locked };
        if first < j {
            let coeffs: Vec<f64> = self.arrow.beta()[first..j].iter().map(|b| -b).collect();
            space.lincomb(&coeffs, &head[first..j], &mut r);
        }
        self.core.add_blas_time(start);

        let overlap = if self.core.params.block_ortho {
            self.core.block_orthogonalise(head, &mut r, j + 1)
        } else {
            self.core.orthogonalise(head, &mut r, j + 1)
        };
        let beta = space.norm(&r);
        trace!("lanczos[{j:03}]: alpha = {alpha:+.12e} beta = {beta:.6e} overlap = {overlap:.3e}");

        let prev = if j > 0 { self.arrow.beta()[j - 1] } else { 0.0 };
        self.arrow.alpha_mut()[j] = alpha;
        if beta <= BREAKDOWN_TOL * alpha.abs().max(prev) {
            self.arrow.beta_mut()[j] = 0.0;
            space.zero(&mut tail[0]);
            return Ok(StepOutcome::Breakdown);
        }
        self.arrow.beta_mut()[j] = beta;
        space.copy(&r, &mut tail[0]);
        space.scale(1.0 / beta, &mut tail[0]);
        Ok(StepOutcome::Extended)
    }

    /// Run Lanczos steps from `num_keep` until the basis is full, the recurrence breaks
    /// down, or an intermediate check finds enough converged pairs.
    fn extend(&mut self) -> Result<(), EigError> {
        let n_kr = self.core.params.n_kr;
        let check_interval = self.core.params.check_interval;
        let mut j = self.state.num_keep;
        let mut since_check = 0;
        while j < n_kr {
            let outcome = self.lanczos_step(j)?;
            j += 1;
            since_check += 1;
            self.state.iter += 1;
            self.arrow.set_len(j);
            if outcome == StepOutcome::Breakdown {
                warn!("TRLM: Lanczos breakdown, invariant subspace of dimension {j}");
                self.breakdown = true;
                break;
            }
            if check_interval > 0 && j < n_kr && since_check >= check_interval {
                since_check = 0;
                if self.enough_converged()? {
                    debug!("TRLM: intermediate check passed at basis size {j}");
                    break;
                }
            }
        }
        Ok(())
    }

    fn enough_converged(&self) -> Result<bool, EigError> {
        let ritz = self.eigensolve_from_arrow_mat()?;
        let beta_last = self.arrow.beta()[self.arrow.len() - 1];
        let threshold = self.core.params.tol * ritz_norm(&ritz);
        let count = (0..ritz.dim())
            .take_while(|&i| (beta_last * ritz.last_component(i)).abs() <= threshold)
            .count();
        Ok(self.state.num_locked + count >= self.core.params.n_conv)
    }

    /// Ritz pairs of the active (unlocked) block, ordered by the Ritz target.
    pub fn eigensolve_from_arrow_mat(&self) -> Result<RitzDecomposition, EigError> {
        let num_locked = self.state.num_locked;
        let arrow_pos = self.state.num_keep - num_locked;
        let start = Instant::now();
        let ritz = self.arrow.eigensolve(num_locked, arrow_pos, self.core.params.ritz_target());
        self.core.profile_mut().time_eigen += start.elapsed();
        ritz
    }

    /// Classify the Ritz pairs of the current basis and restart.
    pub fn restart(&mut self) -> Result<(), EigError> {
        let (n_ev, n_kr, n_conv, tol) = {
            let p = &self.core.params;
            (p.n_ev, p.n_kr, p.n_conv, p.tol)
        };
        let len = self.arrow.len();
        let nl = self.state.num_locked;
        let dim = len - nl;
        let ritz = self.eigensolve_from_arrow_mat()?;
        let beta_last = self.arrow.beta()[len - 1];
        let mat_norm = ritz_norm(&ritz);

        for i in 0..dim {
            self.residua[nl + i] = (beta_last * ritz.last_component(i)).abs();
        }
        let active = &self.residua[nl..len];
        let lock_tol = f64::EPSILON.min(tol);
        let iter_locked = active
            .iter()
            .take_while(|&&r| r <= lock_tol * mat_norm)
            .count();
        let iter_converged = iter_locked
            + active[iter_locked..]
                .iter()
                .take_while(|&&r| r <= tol * mat_norm)
                .count();
        let num_converged = nl + iter_converged;

        // v[len] must survive unless the block is final or the recurrence broke down.
        let cap = if num_converged >= n_conv || self.breakdown || iter_converged == dim {
            dim
        } else {
            dim - 1
        };
        let wanted = (iter_converged + (len - num_converged) / 2).max(n_ev.saturating_sub(nl));
        let iter_keep = wanted.clamp(iter_converged.min(cap), cap);

        self.compute_kept_ritz(&ritz, iter_keep);

        let s = &mut self.state;
        s.iter_locked = iter_locked;
        s.iter_converged = iter_converged;
        s.iter_keep = iter_keep;
        s.num_converged = num_converged;
        s.num_locked = nl + iter_locked;
        s.num_keep = nl + iter_keep;
        s.restart_iter += 1;
        debug_assert!(s.is_consistent(n_kr));
        debug!(
            "TRLM restart {}: {} converged, {} locked, {} kept (|T| = {mat_norm:.3e})",
            s.restart_iter, s.num_converged, s.num_locked, s.num_keep
        );
        Ok(())
    }

    /// Rotate `v[num_locked..len]` onto the first `iter_keep` Ritz vectors and move
    /// the residual vector `v[len]` right after them.
    ///
    /// The projected matrix becomes diagonal on the kept block with couplings
    /// `beta[len-1] · U[last, i]` to the residual vector.
    pub fn compute_kept_ritz(&mut self, ritz: &RitzDecomposition, iter_keep: usize) {
        let space = self.core.space();
        let nl = self.state.num_locked;
        let len = self.arrow.len();
        let dim = len - nl;
        let beta_last = self.arrow.beta()[len - 1];

        let start = Instant::now();
        let mut rotated = Vec::with_capacity(iter_keep);
        for i in 0..iter_keep {
            let mut y = self.core.scratch();
            space.zero(&mut y);
            let coeffs: Vec<f64> = (0..dim).map(|r| ritz.vectors[(r, i)]).collect();
            space.lincomb(&coeffs, &self.kspace[nl..len], &mut y);
            rotated.push(y);
        }
        for (i, y) in rotated.iter_mut().enumerate() {
            std::mem::swap(&mut self.kspace[nl + i], &mut **y);
        }
        drop(rotated);
        if nl + iter_keep != len {
            self.kspace.swap(nl + iter_keep, len);
        }
        self.core.add_blas_time(start);

        for i in 0..iter_keep {
            self.arrow.alpha_mut()[nl + i] = ritz.values[i];
            self.arrow.beta_mut()[nl + i] = beta_last * ritz.last_component(i);
        }
        self.arrow.set_len(nl + iter_keep);
    }

    /// Replace the dead residual vector after a breakdown with a random direction
    /// orthogonal to the kept basis. Returns `false` when none exists.
    fn reseed(&mut self) -> Result<bool, EigError> {
        let space = self.core.space();
        let k = self.state.num_keep;
        let (head, tail) = self.kspace.split_at_mut(k);
        let v = &mut tail[0];
        self.core.randomize(&mut self.rng, v);
        let before = space.norm(v);
        if self.core.params.block_ortho {
            self.core.block_orthogonalise(head, v, k);
        } else {
            self.core.orthogonalise(head, v, k);
        }
        let after = space.norm(v);
        if !(after > RESEED_TOL * before) {
            return Ok(false);
        }
        space.scale(1.0 / after, v);
        self.breakdown = false;
        Ok(true)
    }

    /// Stable sort of the first `count` pairs by the Ritz target. Idempotent.
    pub fn reorder(&mut self, count: usize) {
        let target = self.core.params.ritz_target();
        let alpha = self.arrow.alpha();
        let mut order: Vec<usize> = (0..count).collect();
        order.sort_by(|&a, &b| target.compare(alpha[a], alpha[b]));
        if order.iter().enumerate().all(|(i, &k)| i == k) {
            return;
        }
        let alphas: Vec<f64> = order.iter().map(|&k| alpha[k]).collect();
        let residua: Vec<f64> = order.iter().map(|&k| self.residua[k]).collect();
        let vecs: Vec<S::Vector> = order
            .iter()
            .map(|&k| std::mem::take(&mut self.kspace[k]))
            .collect();
        for (i, v) in vecs.into_iter().enumerate() {
            self.kspace[i] = v;
        }
        self.arrow.alpha_mut()[..count].copy_from_slice(&alphas);
        self.residua[..count].copy_from_slice(&residua);
    }

    pub fn compute_svd(
        &self,
        evecs: &[S::Vector],
        evals: &[f64],
    ) -> Result<SvdTriplets<S::Vector>, EigError> {
        compute_svd(&self.core, evecs, evals)
    }

    fn try_load(&mut self) -> Result<Option<LoadedPairs<S::Vector>>, EigError> {
        let n_conv = self.core.params.n_conv;
        match self.store.as_deref_mut() {
            Some(store) => self.core.load_from_file(store, n_conv),
            None if self.core.params.strict_load => Err(EigError::Config(
                "vec_infile is set but no vector store is attached".into(),
            )),
            None => {
                warn!("TRLM: vec_infile is set but no vector store is attached");
                Ok(None)
            }
        }
    }

    fn save(&mut self, id: &str, evecs: &[S::Vector]) -> Result<(), EigError> {
        let strict = self.core.params.strict_load;
        let Some(store) = self.store.as_deref_mut() else {
            warn!("TRLM: vec_outfile '{id}' is set but no vector store is attached");
            return Ok(());
        };
        match self.core.save_vectors(store, evecs, id) {
            Err(err) if !strict => {
                warn!("TRLM: could not save eigenvectors to '{id}': {err}");
                Ok(())
            }
            other => other,
        }
    }

    fn package(
        &mut self,
        evecs: Vec<S::Vector>,
        evals: Vec<f64>,
        residua: Vec<f64>,
        converged: bool,
    ) -> Result<EigResult<S::Vector>, EigError> {
        let params = self.core.params.clone();
        if !converged {
            warn!(
                "TRLM: {} of {} eigenpairs converged after {} restarts",
                evecs.len(),
                params.n_conv,
                self.state.restart_iter
            );
            if params.require_convergence {
                return Err(EigError::NotConverged {
                    converged: evecs.len(),
                    requested: params.n_conv,
                    restarts: self.state.restart_iter,
                });
            }
        }
        let svd = if params.compute_svd {
            Some(self.compute_svd(&evecs, &evals)?)
        } else {
            None
        };
        if let Some(id) = params.vec_outfile.as_deref() {
            self.save(id, &evecs)?;
        }
        let stats = EigStats {
            iterations: self.state.iter,
            restarts: self.state.restart_iter,
            num_converged: evecs.len(),
            converged,
            profile: self.core.profile(),
        };
        info!(
            "TRLM: {} eigenpairs in {} steps, {} restarts, {} matvecs ({:.3?})",
            evecs.len(),
            stats.iterations,
            stats.restarts,
            stats.profile.n_matvec,
            stats.profile.total()
        );
        Ok(EigResult {
            num_converged: evecs.len(),
            evecs,
            evals,
            residua,
            converged,
            stats,
            svd,
        })
    }

    fn finish(&mut self) -> Result<EigResult<S::Vector>, EigError> {
        let converged = self.phase == TrlmPhase::Converged;
        let n_conv = self.core.params.n_conv;
        let count = if converged { n_conv } else { self.state.num_converged.min(n_conv) };
        self.reorder(count);
        let mut evecs = std::mem::take(&mut self.kspace);
        evecs.truncate(count);
        let mut evals = Vec::with_capacity(count);
        let residua = self.core.compute_evals(&evecs, &mut evals, count)?;
        self.package(evecs, evals, residua, converged)
    }
}

fn ritz_norm(ritz: &RitzDecomposition) -> f64 {
    ritz.values.iter().fold(0.0f64, |m, v| m.max(v.abs()))
}

impl<S, O> EigenSolver<S::Vector> for Trlm<'_, S, O>
where
    S: VectorSpace,
    O: LinearOperator<S::Vector> + ?Sized,
{
    fn solve(&mut self, kspace: Vec<S::Vector>) -> Result<EigResult<S::Vector>, EigError> {
        let params = self.core.params.clone();
        info!(
            "TRLM: n_ev = {} n_kr = {} n_conv = {} tol = {:e} spectrum = {:?} poly = {}",
            params.n_ev,
            params.n_kr,
            params.n_conv,
            params.tol,
            params.spectrum,
            if params.use_poly_acc { params.poly_deg } else { 0 }
        );
        self.phase = TrlmPhase::Initializing;
        if params.vec_infile.is_some() {
            if let Some(loaded) = self.try_load()? {
                info!("TRLM: {} eigenpairs loaded and validated", loaded.evecs.len());
                self.state = ConvergenceState {
                    num_converged: loaded.evecs.len(),
                    ..Default::default()
                };
                self.phase = TrlmPhase::Converged;
                return self.package(loaded.evecs, loaded.evals, loaded.residua, true);
            }
        }

        self.initialize(kspace)?;
        loop {
            if self.state.num_keep >= params.n_kr {
                warn!("TRLM: no room left in the Krylov space");
                self.phase = TrlmPhase::Exhausted;
                break;
            }
            if self.breakdown && !self.reseed()? {
                warn!(
                    "TRLM: the basis of {} vectors spans the whole space",
                    self.state.num_keep
                );
                self.phase = TrlmPhase::Exhausted;
                break;
            }
            self.phase = TrlmPhase::Extending;
            self.extend()?;
            self.phase = TrlmPhase::Restarting;
            self.restart()?;
            if self.state.is_converged(params.n_conv) {
                if self.breakdown {
                    warn!(
                        "TRLM: converged inside an invariant subspace of dimension {}; \
                         the pairs are extremal only within the Krylov space of the start vector",
                        self.state.num_keep
                    );
                }
                self.phase = TrlmPhase::Converged;
                break;
            }
            if self.state.is_exhausted(params.max_restarts) {
                self.phase = TrlmPhase::Exhausted;
                break;
            }
        }
        self.finish()
    }
}

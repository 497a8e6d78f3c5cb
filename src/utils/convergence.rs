//! Convergence bookkeeping for restarted eigensolvers.

use crate::utils::profile::SolveProfile;

/// Iteration counters of a thick-restart solve.
///
/// `iter_*` count pairs found in the current restart cycle, `num_*` are running totals
/// over the Krylov space. `0 <= num_locked <= num_keep <= n_kr` holds at every restart
/// boundary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConvergenceState {
    /// Total Lanczos steps taken.
    pub iter: usize,
    pub iter_converged: usize,
    pub iter_locked: usize,
    pub iter_keep: usize,
    pub num_converged: usize,
    pub num_locked: usize,
    pub num_keep: usize,
    pub restart_iter: usize,
}

impl ConvergenceState {
    pub fn is_converged(&self, n_conv: usize) -> bool {
        self.num_converged >= n_conv
    }

    pub fn is_exhausted(&self, max_restarts: usize) -> bool {
        self.restart_iter >= max_restarts
    }

    /// Check the ordering invariant on the counters.
    pub fn is_consistent(&self, n_kr: usize) -> bool {
        self.num_locked <= self.num_keep
            && self.num_keep <= n_kr
            && self.num_locked <= self.num_converged
            && self.num_converged <= n_kr
    }
}

#[derive(Clone, Debug, Default)]
pub struct EigStats {
    /// Lanczos steps (or operator columns for the dense solver).
    pub iterations: usize,
    pub restarts: usize,
    pub num_converged: usize,
    pub converged: bool,
    pub profile: SolveProfile,
}

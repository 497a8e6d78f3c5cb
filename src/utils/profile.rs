//! Timing and operation counters for a solve.

use std::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct SolveProfile {
    /// Time applying the operator (including polynomial filtering).
    pub time_mv: Duration,
    /// Time in dense eigen-decompositions.
    pub time_eigen: Duration,
    /// Time in vector kernels and reductions.
    pub time_blas: Duration,
    /// Time deriving singular triplets.
    pub time_svd: Duration,
    /// Operator applications.
    pub n_matvec: u64,
    /// Floating-point operations reported by the operator.
    pub flops: u64,
}

impl SolveProfile {
    pub fn total(&self) -> Duration {
        self.time_mv + self.time_eigen + self.time_blas + self.time_svd
    }
}

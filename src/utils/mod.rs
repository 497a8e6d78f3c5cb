//! Convergence bookkeeping, profiling and scratch storage.

pub mod convergence;
pub mod profile;
pub mod scratch;

pub use convergence::{ConvergenceState, EigStats};
pub use profile::SolveProfile;
pub use scratch::{Scratch, ScratchPool};

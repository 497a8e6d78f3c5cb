//! kryeig: thick-restart Lanczos eigensolver over Faer
//!
//! This crate computes a few extremal eigenpairs (or singular triplets) of large Hermitian
//! operators that are only available through their action on vectors. Operators, vector
//! layouts and checkpoint storage are supplied through the traits in [`core`]; the same
//! solver runs single-process, on Rayon threads, or across MPI ranks.

pub mod parallel;

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod matrix;
pub mod solver;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use context::*;
pub use crate::core::*;
pub use error::*;
pub use matrix::*;
pub use solver::*;
pub use utils::*;

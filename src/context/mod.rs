//! Context types that configure and run eigensolves.
//!
//! - [`eig_context`]: the `EigContext` factory over the eigensolver back-ends.

pub mod eig_context;
pub use eig_context::EigContext;

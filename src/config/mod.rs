//! Solver configuration.

pub mod options;
pub use options::{EigParams, EigType, OpForm, Spectrum};

//! Factory for eigensolver back-ends.
//!
//! `EigContext` holds the configuration of a solve and dispatches to the back-end
//! selected by [`EigType`](crate::config::EigType), in the same way for every operator
//! and vector layout.
//!
//! # Usage
//!
//! 1. Build [`EigParams`] and wrap them in an `EigContext`.
//! 2. Call [`EigContext::solve`] with the operator, its vector space and a starting
//!    space (possibly empty).

use log::debug;

use crate::config::EigParams;
use crate::core::traits::{LinearOperator, VectorSpace, VectorStore};
use crate::error::EigError;
use crate::solver::{self, EigResult};

/// Configuration and entry point of an eigensolve.
#[derive(Debug, Clone, Default)]
pub struct EigContext {
    pub params: EigParams,
}

impl EigContext {
    pub fn new(params: EigParams) -> Self {
        Self { params }
    }

    /// Validate the configuration, build the selected back-end and solve.
    pub fn solve<'a, S, O>(
        &self,
        op: &'a O,
        space: &'a S,
        kspace: Vec<S::Vector>,
        store: Option<&'a mut dyn VectorStore<S::Vector>>,
    ) -> Result<EigResult<S::Vector>, EigError>
    where
        S: VectorSpace + 'a,
        O: LinearOperator<S::Vector> + ?Sized + 'a,
    {
        debug!("EigContext: {:?} back-end", self.params.eig_type);
        let mut solver = solver::create(self.params.clone(), op, space, store)?;
        solver.solve(kspace)
    }
}

//! Projected matrix of the thick-restart Lanczos process.
//!
//! After a thick restart the projection of the operator on the Krylov basis is an
//! "arrow" matrix: a diagonal block of kept Ritz values, bordered by one row/column of
//! couplings to the first new Lanczos vector, followed by the usual tridiagonal tail.
//!
//! ```text
//!   θ0          b0
//!      θ1       b1
//!         θ2    b2
//!   b0 b1 b2 α3 β3
//!            β3 α4 β4
//!               β4 α5
//! ```

use faer::{Mat, Side};

use crate::config::Spectrum;
use crate::error::EigError;

/// Diagonal (`alpha`) and off-diagonal (`beta`) coefficients of the projected matrix.
///
/// `len` is the number of active Krylov vectors; `beta[len - 1]` couples the block to
/// the residual vector `v[len]`.
#[derive(Debug, Clone)]
pub struct ArrowMatrix {
    alpha: Box<[f64]>,
    beta: Box<[f64]>,
    len: usize,
}

/// Eigen-decomposition of an arrow block, with columns ordered by a [`Spectrum`].
#[derive(Debug, Clone)]
pub struct RitzDecomposition {
    pub values: Vec<f64>,
    pub vectors: Mat<f64>,
}

impl RitzDecomposition {
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Last component of Ritz vector `i`; scaled by the trailing beta it is the
    /// residual estimate of the pair.
    pub fn last_component(&self, i: usize) -> f64 {
        self.vectors[(self.dim() - 1, i)]
    }
}

impl ArrowMatrix {
    pub fn new(capacity: usize) -> Self {
        Self {
            alpha: vec![0.0; capacity].into_boxed_slice(),
            beta: vec![0.0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.alpha.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set_len(&mut self, len: usize) {
        assert!(len <= self.capacity(), "arrow length {len} exceeds capacity");
        self.len = len;
    }

    pub fn alpha(&self) -> &[f64] {
        &self.alpha
    }

    pub fn alpha_mut(&mut self) -> &mut [f64] {
        &mut self.alpha
    }

    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    pub fn beta_mut(&mut self) -> &mut [f64] {
        &mut self.beta
    }

    /// Dense symmetric block on rows/columns `offset..len`, with the arrow row at
    /// relative position `arrow_pos` (the number of kept, unlocked vectors).
    pub fn assemble(&self, offset: usize, arrow_pos: usize) -> Mat<f64> {
        let dim = self.len - offset;
        let mut t = Mat::<f64>::zeros(dim, dim);
        for i in 0..dim {
            t[(i, i)] = self.alpha[offset + i];
        }
        if arrow_pos < dim {
            for i in 0..arrow_pos {
                t[(i, arrow_pos)] = self.beta[offset + i];
                t[(arrow_pos, i)] = self.beta[offset + i];
            }
        }
        for i in arrow_pos..dim.saturating_sub(1) {
            t[(i, i + 1)] = self.beta[offset + i];
            t[(i + 1, i)] = self.beta[offset + i];
        }
        t
    }

    /// Eigen-decompose the active block and order the pairs by `target`.
    pub fn eigensolve(
        &self,
        offset: usize,
        arrow_pos: usize,
        target: Spectrum,
    ) -> Result<RitzDecomposition, EigError> {
        if offset >= self.len {
            return Err(EigError::DimensionMismatch { expected: offset + 1, found: self.len });
        }
        let t = self.assemble(offset, arrow_pos);
        let dim = t.nrows();
        let evd = t
            .as_ref()
            .self_adjoint_eigen(Side::Lower)
            .map_err(|e| EigError::Eigensolve(format!("{e:?}")))?;
        let s = evd.S();
        let u = evd.U();

        let mut order: Vec<usize> = (0..dim).collect();
        order.sort_by(|&i, &j| target.compare(s[i], s[j]));
        let values = order.iter().map(|&i| s[i]).collect();
        let vectors = Mat::from_fn(dim, dim, |r, c| u[(r, order[c])]);
        Ok(RitzDecomposition { values, vectors })
    }
}

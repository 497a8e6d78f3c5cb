//! Diagonal operator with a known spectrum.

use crate::core::traits::LinearOperator;

/// `y = diag(d) * x`, optionally carrying a suppression-interval hint for
/// polynomial acceleration.
#[derive(Debug, Clone)]
pub struct DiagonalOperator {
    diag: Vec<f64>,
    bounds: Option<(f64, f64)>,
}

impl DiagonalOperator {
    pub fn new(diag: Vec<f64>) -> Self {
        Self { diag, bounds: None }
    }

    /// diag(1, 2, ..., n)
    pub fn ladder(n: usize) -> Self {
        Self::new((1..=n).map(|i| i as f64).collect())
    }

    pub fn with_bounds(mut self, low: f64, high: f64) -> Self {
        self.bounds = Some((low, high));
        self
    }

    pub fn diag(&self) -> &[f64] {
        &self.diag
    }

    pub fn len(&self) -> usize {
        self.diag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diag.is_empty()
    }
}

impl<V: AsRef<[f64]> + AsMut<[f64]>> LinearOperator<V> for DiagonalOperator {
    fn apply(&self, x: &V, y: &mut V) {
        for ((yi, xi), di) in y.as_mut().iter_mut().zip(x.as_ref()).zip(&self.diag) {
            *yi = di * xi;
        }
    }

    fn apply_adjoint(&self, x: &V, y: &mut V) {
        self.apply(x, y);
    }

    fn is_hermitian(&self) -> bool {
        true
    }

    fn spectral_bounds(&self) -> Option<(f64, f64)> {
        self.bounds
    }

    fn flops_per_apply(&self) -> u64 {
        self.diag.len() as u64
    }
}

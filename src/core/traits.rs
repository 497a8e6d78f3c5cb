//! Core capability traits for kryeig.
//!
//! The eigensolvers never see concrete operators, vector layouts or storage back-ends;
//! they consume the three capabilities below.

use crate::error::EigError;

/// Linear operator: y ← M x and y ← M† x.
pub trait LinearOperator<V> {
    /// Compute y = M · x.
    fn apply(&self, x: &V, y: &mut V);
    /// Compute y = M† · x.
    fn apply_adjoint(&self, x: &V, y: &mut V);
    /// Whether M = M†.
    fn is_hermitian(&self) -> bool {
        false
    }
    /// Estimate `(low, high)` of the interval to suppress under polynomial acceleration.
    fn spectral_bounds(&self) -> Option<(f64, f64)> {
        None
    }
    /// Floating-point operations of one application, for profiling.
    fn flops_per_apply(&self) -> u64 {
        0
    }
}

/// A (possibly distributed) real vector space.
///
/// Each vector holds this process's local entries. Every method that returns a
/// reduced quantity (`dot`, `norm`, `block_dot`) is a collective: all processes must
/// call it in the same order.
pub trait VectorSpace {
    type Vector: AsRef<[f64]> + AsMut<[f64]> + Clone + Default;

    /// A zero vector with the local layout of this space.
    fn create(&self) -> Self::Vector;
    /// Number of locally stored entries.
    fn local_len(&self) -> usize;
    /// Sum `buf` elementwise over all processes, in place.
    fn all_reduce(&self, buf: &mut [f64]);
    /// Rank of this process.
    fn rank(&self) -> usize {
        0
    }
    /// Number of cooperating processes.
    fn size(&self) -> usize {
        1
    }

    /// Local part of an inner product.
    fn local_dot(&self, x: &[f64], y: &[f64]) -> f64 {
        x.iter().zip(y).map(|(a, b)| a * b).sum()
    }

    /// ⟨x, y⟩.
    fn dot(&self, x: &Self::Vector, y: &Self::Vector) -> f64 {
        let mut s = [self.local_dot(x.as_ref(), y.as_ref())];
        self.all_reduce(&mut s);
        s[0]
    }

    /// ‖x‖₂.
    fn norm(&self, x: &Self::Vector) -> f64 {
        self.dot(x, x).sqrt()
    }

    /// ⟨x_i, y⟩ for all `xs` with a single reduction.
    fn block_dot(&self, xs: &[Self::Vector], y: &Self::Vector) -> Vec<f64> {
        let mut s: Vec<f64> = xs
            .iter()
            .map(|x| self.local_dot(x.as_ref(), y.as_ref()))
            .collect();
        self.all_reduce(&mut s);
        s
    }

    /// y ← y + a·x.
    fn axpy(&self, a: f64, x: &Self::Vector, y: &mut Self::Vector) {
        for (yi, xi) in y.as_mut().iter_mut().zip(x.as_ref()) {
            *yi += a * xi;
        }
    }

    /// y ← y + Σ c_i·x_i.
    fn lincomb(&self, coeffs: &[f64], xs: &[Self::Vector], y: &mut Self::Vector) {
        for (c, x) in coeffs.iter().zip(xs) {
            self.axpy(*c, x, y);
        }
    }

    /// x ← a·x.
    fn scale(&self, a: f64, x: &mut Self::Vector) {
        for xi in x.as_mut() {
            *xi *= a;
        }
    }

    fn copy(&self, src: &Self::Vector, dst: &mut Self::Vector) {
        dst.as_mut().copy_from_slice(src.as_ref());
    }

    fn zero(&self, x: &mut Self::Vector) {
        x.as_mut().fill(0.0);
    }
}

/// Checkpoint storage for eigenvector sets.
///
/// Format and medium belong to the implementor.
pub trait VectorStore<V> {
    fn save(&mut self, id: &str, vecs: &[V]) -> Result<(), EigError>;
    /// Load up to `count` vectors stored under `id`.
    fn load(&mut self, id: &str, count: usize) -> Result<Vec<V>, EigError>;
}

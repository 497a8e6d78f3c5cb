//! Concrete operator and vector-space wrappers.
//!
//! This module implements the core capability traits for `faer::Mat<f64>` and for plain
//! `Vec<f64>` partitions, so dense matrices and Rust vectors can be handed directly to the
//! eigensolvers. Local vector kernels run on Rayon when the `rayon` feature is enabled;
//! reductions go through a [`Comm`] so the same space works single-process or under MPI.
//!
//! # References
//! - [faer crate documentation](https://docs.rs/faer)

use std::collections::HashMap;

use crate::core::traits::{LinearOperator, VectorSpace, VectorStore};
use crate::error::EigError;
use crate::parallel::{Comm, SerialComm};
use faer::Mat;

/// Dense operator `y = A * x` for `faer::Mat<f64>`.
impl LinearOperator<Vec<f64>> for Mat<f64> {
    fn apply(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
        assert_eq!(self.nrows(), y.len(), "Output vector y has incorrect length");
        assert_eq!(self.ncols(), x.len(), "Input vector x has incorrect length");
        for i in 0..self.nrows() {
            y[i] = 0.0;
            for j in 0..self.ncols() {
                y[i] += self[(i, j)] * x[j];
            }
        }
    }

    /// `y = A^T * x`.
    fn apply_adjoint(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
        assert_eq!(self.ncols(), y.len(), "Output vector y has incorrect length");
        assert_eq!(self.nrows(), x.len(), "Input vector x has incorrect length");
        for j in 0..self.ncols() {
            y[j] = 0.0;
            for i in 0..self.nrows() {
                y[j] += self[(i, j)] * x[i];
            }
        }
    }

    fn is_hermitian(&self) -> bool {
        if self.nrows() != self.ncols() {
            return false;
        }
        let n = self.nrows();
        (0..n).all(|i| (0..i).all(|j| self[(i, j)] == self[(j, i)]))
    }

    fn flops_per_apply(&self) -> u64 {
        2 * (self.nrows() * self.ncols()) as u64
    }
}

/// Vector space of `Vec<f64>` partitions with `n_local` entries per process.
#[derive(Debug, Clone)]
pub struct VecSpace<C: Comm = SerialComm> {
    comm: C,
    n_local: usize,
}

impl VecSpace<SerialComm> {
    /// Single-process space of dimension `n`.
    pub fn serial(n: usize) -> Self {
        Self { comm: SerialComm, n_local: n }
    }
}

impl<C: Comm> VecSpace<C> {
    pub fn new(comm: C, n_local: usize) -> Self {
        Self { comm, n_local }
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }
}

impl<C: Comm> VectorSpace for VecSpace<C> {
    type Vector = Vec<f64>;

    fn create(&self) -> Vec<f64> {
        vec![0.0; self.n_local]
    }

    fn local_len(&self) -> usize {
        self.n_local
    }

    fn all_reduce(&self, buf: &mut [f64]) {
        self.comm.all_reduce_slice(buf);
    }

    fn rank(&self) -> usize {
        self.comm.rank()
    }

    fn size(&self) -> usize {
        self.comm.size()
    }

    fn local_dot(&self, x: &[f64], y: &[f64]) -> f64 {
        assert_eq!(x.len(), y.len(), "Vectors must have the same length");
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            x.par_iter()
                .zip(y.par_iter())
                .map(|(xi, yi)| xi * yi)
                .sum()
        }
        #[cfg(not(feature = "rayon"))]
        {
            x.iter().zip(y).map(|(xi, yi)| xi * yi).sum()
        }
    }

    fn axpy(&self, a: f64, x: &Vec<f64>, y: &mut Vec<f64>) {
        assert_eq!(x.len(), y.len(), "Vectors must have the same length");
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            y.par_iter_mut()
                .zip(x.par_iter())
                .for_each(|(yi, xi)| *yi += a * xi);
        }
        #[cfg(not(feature = "rayon"))]
        {
            for (yi, xi) in y.iter_mut().zip(x) {
                *yi += a * xi;
            }
        }
    }

    fn lincomb(&self, coeffs: &[f64], xs: &[Vec<f64>], y: &mut Vec<f64>) {
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            y.par_iter_mut().enumerate().for_each(|(i, yi)| {
                *yi += coeffs.iter().zip(xs).map(|(c, x)| c * x[i]).sum::<f64>();
            });
        }
        #[cfg(not(feature = "rayon"))]
        {
            for (c, x) in coeffs.iter().zip(xs) {
                self.axpy(*c, x, y);
            }
        }
    }
}

/// In-memory [`VectorStore`] keyed by set id.
#[derive(Debug, Clone)]
pub struct MemoryStore<V> {
    sets: HashMap<String, Vec<V>>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self { sets: HashMap::new() }
    }

    pub fn get(&self, id: &str) -> Option<&[V]> {
        self.sets.get(id).map(Vec::as_slice)
    }

    pub fn insert(&mut self, id: impl Into<String>, vecs: Vec<V>) {
        self.sets.insert(id.into(), vecs);
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> VectorStore<V> for MemoryStore<V> {
    fn save(&mut self, id: &str, vecs: &[V]) -> Result<(), EigError> {
        self.sets.insert(id.to_string(), vecs.to_vec());
        Ok(())
    }

    fn load(&mut self, id: &str, count: usize) -> Result<Vec<V>, EigError> {
        let set = self
            .sets
            .get(id)
            .ok_or_else(|| EigError::Store(format!("no vector set '{id}'")))?;
        Ok(set.iter().take(count).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn dense_apply_and_adjoint() {
        let a = Mat::from_fn(2, 3, |i, j| (i * 3 + j) as f64);
        let mut y = vec![0.0; 2];
        a.apply(&vec![1.0, 1.0, 1.0], &mut y);
        assert_eq!(y, vec![3.0, 12.0]);
        let mut z = vec![0.0; 3];
        a.apply_adjoint(&vec![1.0, 1.0], &mut z);
        assert_eq!(z, vec![3.0, 5.0, 7.0]);
        assert!(!a.is_hermitian());
        assert!(Mat::<f64>::identity(3, 3).is_hermitian());
    }

    #[test]
    fn serial_space_kernels() {
        let space = VecSpace::serial(3);
        let x = vec![1.0, 2.0, 3.0];
        let mut y = vec![4.0, -5.0, 6.0];
        assert_abs_diff_eq!(space.dot(&x, &y), 12.0, epsilon = 1e-12);
        assert_abs_diff_eq!(space.norm(&x), 14f64.sqrt(), epsilon = 1e-12);
        space.axpy(2.0, &x, &mut y);
        assert_eq!(y, vec![6.0, -1.0, 12.0]);
        let dots = space.block_dot(&[x.clone(), y.clone()], &x);
        assert_abs_diff_eq!(dots[0], 14.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dots[1], 32.0, epsilon = 1e-12);
        let mut z = space.create();
        space.lincomb(&[1.0, -1.0], &[x.clone(), y.clone()], &mut z);
        assert_eq!(z, vec![-5.0, 3.0, -9.0]);
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new();
        store.save("evecs", &[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(store.load("evecs", 1).unwrap(), vec![vec![1.0, 0.0]]);
        assert!(matches!(store.load("missing", 1), Err(EigError::Store(_))));
    }
}

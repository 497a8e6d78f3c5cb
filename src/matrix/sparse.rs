// CSR sparse operator on top of faer's sparse storage

use std::collections::HashMap;

use faer::sparse::{SparseRowMat, SymbolicSparseRowMat};

use crate::core::traits::LinearOperator;

pub struct CsrMatrix {
    inner: SparseRowMat<usize, f64>,
    hermitian: bool,
}

impl CsrMatrix {
    /// Build a CSR from raw row‐ptr, col‐idx, and values.
    pub fn from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        let hermitian = nrows == ncols && is_symmetric(&row_ptr, &col_idx, &values);
        // `None`: rows are stored contiguously, no separate row_nnz
        let symbolic = SymbolicSparseRowMat::new_checked(nrows, ncols, row_ptr, None, col_idx);
        let inner = SparseRowMat::new(symbolic, values);
        Self { inner, hermitian }
    }

    /// Build from `(row, col, value)` triplets; duplicates are summed.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); nrows];
        for &(i, j, v) in triplets {
            match rows[i].iter_mut().find(|(c, _)| *c == j) {
                Some(entry) => entry.1 += v,
                None => rows[i].push((j, v)),
            }
        }
        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for mut row in rows {
            row.sort_by_key(|(c, _)| *c);
            for (c, v) in row {
                col_idx.push(c);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }
        Self::from_csr(nrows, ncols, row_ptr, col_idx, values)
    }

    pub fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    pub fn nnz(&self) -> usize {
        self.inner.as_ref().val().len()
    }

    fn for_each_entry(&self, mut f: impl FnMut(usize, usize, f64)) {
        let m = self.inner.as_ref();
        let row_ptr = m.symbolic().row_ptr();
        let col_idx = m.symbolic().col_idx();
        let val = m.val();
        for i in 0..self.nrows() {
            for k in row_ptr[i]..row_ptr[i + 1] {
                f(i, col_idx[k], val[k]);
            }
        }
    }
}

fn is_symmetric(row_ptr: &[usize], col_idx: &[usize], values: &[f64]) -> bool {
    let mut entries = HashMap::with_capacity(values.len());
    for i in 0..row_ptr.len().saturating_sub(1) {
        for k in row_ptr[i]..row_ptr[i + 1] {
            entries.insert((i, col_idx[k]), values[k]);
        }
    }
    entries
        .iter()
        .all(|(&(i, j), v)| entries.get(&(j, i)).is_some_and(|w| w == v))
}

impl LinearOperator<Vec<f64>> for CsrMatrix {
    fn apply(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
        assert_eq!(x.len(), self.ncols());
        assert_eq!(y.len(), self.nrows());
        y.fill(0.0);
        self.for_each_entry(|i, j, v| y[i] += v * x[j]);
    }

    fn apply_adjoint(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
        assert_eq!(x.len(), self.nrows());
        assert_eq!(y.len(), self.ncols());
        y.fill(0.0);
        self.for_each_entry(|i, j, v| y[j] += v * x[i]);
    }

    fn is_hermitian(&self) -> bool {
        self.hermitian
    }

    fn flops_per_apply(&self) -> u64 {
        2 * self.nnz() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_apply() {
        // 3×3 identity in CSR: row_ptr=[0,1,2,3], col_idx=[0,1,2], vals=[1,1,1]
        let m = CsrMatrix::from_csr(3, 3, vec![0,1,2,3], vec![0,1,2], vec![1.0,1.0,1.0]);
        let x = vec![2.0, 3.0, 5.0];
        let mut y = vec![0.0; 3];
        m.apply(&x, &mut y);
        assert_eq!(y, x);
        assert!(m.is_hermitian());
    }

    #[test]
    fn simple_pattern() {
        // 2×3 matrix [[1,2,0],[0,3,4]]
        let m = CsrMatrix::from_csr(
            2, 3,
            vec![0,2,4],
            vec![0,1,1,2],
            vec![1.0,2.0,3.0,4.0],
        );
        let mut y = vec![0.0; 2];
        m.apply(&vec![1.0, 1.0, 1.0], &mut y);
        assert_eq!(y, vec![3.0, 7.0]);
        let mut z = vec![0.0; 3];
        m.apply_adjoint(&vec![1.0, 1.0], &mut z);
        assert_eq!(z, vec![1.0, 5.0, 4.0]);
        assert!(!m.is_hermitian());
        assert_eq!(m.flops_per_apply(), 8);
    }

    #[test]
    fn triplets_sum_duplicates() {
        let m = CsrMatrix::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, 1.0), (0, 1, 0.0), (1, 1, 2.0)]);
        assert_eq!(m.nnz(), 3);
        assert!(m.is_hermitian());
    }
}

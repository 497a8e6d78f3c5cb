//! Eigenvector checkpoints and deflation.

use approx::assert_abs_diff_eq;
use kryeig::config::EigParams;
use kryeig::context::EigContext;
use kryeig::core::{LinearOperator, MemoryStore, VecSpace, VectorSpace, VectorStore};
use kryeig::error::EigError;
use kryeig::matrix::DiagonalOperator;
use kryeig::solver::EigenSolverCore;

fn solve_and_save(store: &mut MemoryStore<Vec<f64>>) -> Vec<f64> {
    let op = DiagonalOperator::ladder(60);
    let space = VecSpace::serial(60);
    let params = EigParams::new(6, 20, 3, 1e-12)
        .with_max_restarts(1000)
        .with_vec_outfile("ladder");
    let result = EigContext::new(params)
        .solve(&op, &space, Vec::new(), Some(store))
        .unwrap();
    assert!(result.converged);
    result.evals
}

#[test]
fn saved_eigenvectors_are_reloaded_without_iterating() {
    let mut store = MemoryStore::new();
    let evals = solve_and_save(&mut store);
    assert_eq!(store.get("ladder").map(<[_]>::len), Some(3));

    let op = DiagonalOperator::ladder(60);
    let space = VecSpace::serial(60);
    let params = EigParams::new(6, 20, 3, 1e-8).with_vec_infile("ladder");
    let loaded = EigContext::new(params)
        .solve(&op, &space, Vec::new(), Some(&mut store))
        .unwrap();
    assert!(loaded.converged);
    assert_eq!(loaded.stats.iterations, 0);
    for (a, b) in loaded.evals.iter().zip(&evals) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-10);
    }
}

#[test]
fn bad_checkpoint_fails_strict_load() {
    let op = DiagonalOperator::ladder(30);
    let space = VecSpace::serial(30);
    let mut store = MemoryStore::new();
    let mut v = vec![0.0; 30];
    v[0] = 1.0;
    v[1] = 1.0;
    store.insert("bad", vec![v.clone(), v.clone()]);
    let params = EigParams::new(4, 12, 2, 1e-8)
        .with_vec_infile("bad")
        .with_strict_load(true);
    let err = EigContext::new(params).solve(&op, &space, Vec::new(), Some(&mut store));
    assert!(matches!(err, Err(EigError::Validation { index: 0, .. })));
}

#[test]
fn bad_checkpoint_falls_back_to_a_fresh_solve() {
    let op = DiagonalOperator::ladder(30);
    let space = VecSpace::serial(30);
    let mut store = MemoryStore::new();
    let params = EigParams::new(4, 12, 2, 1e-10)
        .with_max_restarts(1000)
        .with_vec_infile("missing");
    let result = EigContext::new(params)
        .solve(&op, &space, Vec::new(), Some(&mut store))
        .unwrap();
    assert!(result.converged);
    assert!(result.stats.iterations > 0);
    assert_abs_diff_eq!(result.evals[0], 1.0, epsilon = 1e-8);
}

#[test]
fn short_checkpoint_is_a_store_error() {
    let op = DiagonalOperator::ladder(10);
    let space = VecSpace::serial(10);
    let mut store = MemoryStore::new();
    let mut e0 = vec![0.0; 10];
    e0[0] = 1.0;
    store.save("one", &[e0]).unwrap();
    let params = EigParams::new(2, 6, 2, 1e-8)
        .with_vec_infile("one")
        .with_strict_load(true);
    let err = EigContext::new(params).solve(&op, &space, Vec::new(), Some(&mut store));
    assert!(matches!(err, Err(EigError::Store(_))));
}

#[test]
fn deflation_inverts_on_the_eigenspace() {
    let op = DiagonalOperator::new(vec![2.0, 4.0, 8.0, 16.0, 32.0]);
    let space = VecSpace::serial(5);
    let core = EigenSolverCore::new(EigParams::new(1, 3, 1, 1e-8), &op, &space).unwrap();
    let evecs: Vec<Vec<f64>> = (0..3)
        .map(|i| {
            let mut e = vec![0.0; 5];
            e[i] = 1.0;
            e
        })
        .collect();
    let evals = [2.0, 4.0, 8.0];
    let input = vec![vec![1.0, 1.0, 1.0, 1.0, 1.0], vec![0.0, 2.0, 0.0, 5.0, 0.0]];
    let mut out = vec![space.create(), space.create()];
    let skipped = core.deflate(&mut out, &input, &evecs, &evals).unwrap();
    assert!(skipped.is_empty());
    // A·out is the projection of the input on the eigenspace
    for (o, x) in out.iter().zip(&input) {
        let mut ao = space.create();
        op.apply(o, &mut ao);
        for i in 0..5 {
            let projected = if i < 3 { x[i] } else { 0.0 };
            assert_abs_diff_eq!(ao[i], projected, epsilon = 1e-14);
        }
    }
}

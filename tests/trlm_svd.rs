//! Singular value mode: eigenpairs of M†M / MM† turned into singular triplets.

use approx::assert_abs_diff_eq;
use faer::{Mat, Side};
use kryeig::config::{EigParams, EigType, OpForm, Spectrum};
use kryeig::context::EigContext;
use kryeig::core::{LinearOperator, VecSpace, VectorSpace};
use kryeig::error::EigError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_square(n: usize, seed: u64) -> Mat<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f64> = (0..n * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Mat::from_fn(n, n, |i, j| data[j * n + i])
}

/// Eigenvalues of MᵀM in descending order.
fn gram_spectrum(m: &Mat<f64>) -> Vec<f64> {
    let gram = m.transpose() * m.as_ref();
    let evd = gram.as_ref().self_adjoint_eigen(Side::Lower).unwrap();
    let s = evd.S();
    let mut values: Vec<f64> = (0..m.ncols()).map(|i| s[i]).collect();
    values.sort_by(|a, b| b.total_cmp(a));
    values
}

#[test]
fn largest_singular_values_of_a_square_matrix() {
    let n = 30;
    let m = random_square(n, 11);
    let space = VecSpace::serial(n);
    let params = EigParams::new(6, 20, 3, 1e-10)
        .with_spectrum(Spectrum::LargestReal)
        .with_svd(OpForm::NORMAL)
        .with_max_restarts(500);
    let result = EigContext::new(params).solve(&m, &space, Vec::new(), None).unwrap();
    assert!(result.converged);
    let svd = result.svd.expect("singular triplets");
    let expected = gram_spectrum(&m);
    for k in 0..3 {
        // σ² matches the eigenvalue of the normal operator
        assert_abs_diff_eq!(svd.values[k] * svd.values[k], expected[k], epsilon = 1e-8);
        assert_abs_diff_eq!(svd.values[k] * svd.values[k], result.evals[k], epsilon = 1e-8);
        // M·v = σ·u with unit-norm u
        let mut mv = space.create();
        m.apply(&svd.right[k], &mut mv);
        space.axpy(-svd.values[k], &svd.left[k], &mut mv);
        assert!(space.norm(&mv) < 1e-6);
        assert_abs_diff_eq!(space.norm(&svd.left[k]), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn both_normal_forms_share_the_spectrum() {
    let n = 24;
    let m = random_square(n, 3);
    let space = VecSpace::serial(n);
    let base = EigParams::new(6, 16, 2, 1e-10)
        .with_spectrum(Spectrum::LargestReal)
        .with_max_restarts(500);
    let mtm = EigContext::new(base.clone().with_svd(OpForm::NORMAL))
        .solve(&m, &space, Vec::new(), None)
        .unwrap();
    let mmt = EigContext::new(base.with_svd(OpForm::NORMAL | OpForm::DAGGER))
        .solve(&m, &space, Vec::new(), None)
        .unwrap();
    let (a, b) = (mtm.svd.unwrap(), mmt.svd.unwrap());
    for k in 0..2 {
        assert_abs_diff_eq!(a.values[k], b.values[k], epsilon = 1e-8);
        // for MM† the eigenvectors are the left singular vectors
        let mut mtu = space.create();
        m.apply_adjoint(&b.left[k], &mut mtu);
        space.axpy(-b.values[k], &b.right[k], &mut mtu);
        assert!(space.norm(&mtu) < 1e-6);
    }
}

#[test]
fn dense_backend_computes_triplets() {
    let n = 12;
    let m = random_square(n, 5);
    let space = VecSpace::serial(n);
    let params = EigParams::new(2, 4, 2, 1e-10)
        .with_spectrum(Spectrum::LargestReal)
        .with_svd(OpForm::NORMAL)
        .with_eig_type(EigType::Dense);
    let result = EigContext::new(params).solve(&m, &space, Vec::new(), None).unwrap();
    let svd = result.svd.unwrap();
    let expected = gram_spectrum(&m);
    assert_abs_diff_eq!(svd.values[0], expected[0].sqrt(), epsilon = 1e-10);
    assert_abs_diff_eq!(svd.values[1], expected[1].sqrt(), epsilon = 1e-10);
}

#[test]
fn svd_needs_a_normal_form() {
    let m = random_square(8, 1);
    let space = VecSpace::serial(8);
    let mut params = EigParams::new(2, 4, 2, 1e-10).with_svd(OpForm::NORMAL);
    params.op_form = OpForm::empty();
    let err = EigContext::new(params).solve(&m, &space, Vec::new(), None);
    assert!(matches!(err, Err(EigError::Config(_))));
}

//! Singular triplets from eigenpairs of a normal operator.
//!
//! For M†M the eigenvectors are right singular vectors and the left ones follow from
//! u = M·v/σ; for MM† the roles swap and v = M†·u/σ. In both cases σ = √λ.

use std::time::Instant;

use log::warn;

use crate::config::OpForm;
use crate::core::traits::{LinearOperator, VectorSpace};
use crate::error::EigError;
use crate::solver::base::EigenSolverCore;

/// Singular values with their left and right singular vectors.
#[derive(Debug, Clone)]
pub struct SvdTriplets<V> {
    pub values: Vec<f64>,
    pub left: Vec<V>,
    pub right: Vec<V>,
}

pub fn compute_svd<S, O>(
    core: &EigenSolverCore<'_, S, O>,
    evecs: &[S::Vector],
    evals: &[f64],
) -> Result<SvdTriplets<S::Vector>, EigError>
where
    S: VectorSpace,
    O: LinearOperator<S::Vector> + ?Sized,
{
    let form = core.params.op_form;
    if !form.contains(OpForm::NORMAL) {
        return Err(EigError::Config(
            "singular triplets need eigenpairs of M†M or MM†".into(),
        ));
    }
    if evecs.len() != evals.len() {
        return Err(EigError::DimensionMismatch { expected: evecs.len(), found: evals.len() });
    }
    let start = Instant::now();
    let space = core.space();
    // M for M†M, M† for MM†
    let companion_form = form & OpForm::DAGGER;

    let mut values = Vec::with_capacity(evals.len());
    let mut companions = Vec::with_capacity(evecs.len());
    for (i, (v, &lambda)) in evecs.iter().zip(evals).enumerate() {
        if lambda < 0.0 {
            warn!("svd: eigenvalue {i} = {lambda:e} of a normal operator is negative; clamping");
        }
        values.push(lambda.max(0.0).sqrt());
        let mut w = space.create();
        core.apply_form(companion_form, &mut w, v);
        let norm = space.norm(&w);
        if norm > 0.0 {
            space.scale(1.0 / norm, &mut w);
        } else {
            warn!("svd: singular value {i} is zero; companion vector left at zero");
        }
        companions.push(w);
    }
    let primary = evecs.to_vec();
    let (left, right) = if form.contains(OpForm::DAGGER) {
        (primary, companions)
    } else {
        (companions, primary)
    };
    core.profile_mut().time_svd += start.elapsed();
    Ok(SvdTriplets { values, left, right })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EigParams;
    use crate::core::wrappers::VecSpace;
    use approx::assert_abs_diff_eq;
    use faer::Mat;

    // M = [[3, 0], [4, 5]]: M†M = [[25, 20], [20, 25]] with eigenpairs
    // 45 ↔ (1, 1)/√2 and 5 ↔ (1, -1)/√2
    fn op() -> Mat<f64> {
        Mat::from_fn(2, 2, |i, j| [[3.0, 0.0], [4.0, 5.0]][i][j])
    }

    #[test]
    fn normal_form_gives_right_vectors() {
        let m = op();
        let space = VecSpace::serial(2);
        let params = EigParams::new(1, 2, 1, 1e-8).with_svd(OpForm::NORMAL);
        let core = EigenSolverCore::new(params, &m, &space).unwrap();
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let evecs = vec![vec![s, s], vec![s, -s]];
        let svd = compute_svd(&core, &evecs, &[45.0, 5.0]).unwrap();
        assert_abs_diff_eq!(svd.values[0], 45f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(svd.values[1], 5f64.sqrt(), epsilon = 1e-12);
        assert_eq!(svd.right, evecs);
        // M·v = σ·u
        for k in 0..2 {
            let mut mv = vec![0.0; 2];
            m.apply(&svd.right[k], &mut mv);
            for i in 0..2 {
                assert_abs_diff_eq!(mv[i], svd.values[k] * svd.left[k][i], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn plain_form_is_rejected() {
        let m = Mat::<f64>::identity(2, 2);
        let space = VecSpace::serial(2);
        let core = EigenSolverCore::new(EigParams::new(1, 2, 1, 1e-8), &m, &space).unwrap();
        let err = compute_svd(&core, &[vec![1.0, 0.0]], &[1.0]);
        assert!(matches!(err, Err(EigError::Config(_))));
    }
}

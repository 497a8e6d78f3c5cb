use thiserror::Error;

// Unified error type for kryeig

#[derive(Error, Debug)]
pub enum EigError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("near-zero eigenvalue {value:e} at index {index}")]
    Domain { index: usize, value: f64 },
    #[error("loaded eigenpair {index} has residual {residual:e} above tolerance {tol:e}")]
    Validation { index: usize, residual: f64, tol: f64 },
    #[error("{converged} of {requested} eigenpairs converged after {restarts} restarts")]
    NotConverged {
        converged: usize,
        requested: usize,
        restarts: usize,
    },
    #[error("dense eigensolve failed: {0}")]
    Eigensolve(String),
    #[error("vector store error: {0}")]
    Store(String),
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message() {
        let err = EigError::Validation { index: 3, residual: 1e-3, tol: 1e-8 };
        assert_eq!(
            err.to_string(),
            "loaded eigenpair 3 has residual 1e-3 above tolerance 1e-8"
        );
    }

    #[test]
    fn not_converged_message() {
        let err = EigError::NotConverged { converged: 2, requested: 5, restarts: 1 };
        assert_eq!(err.to_string(), "2 of 5 eigenpairs converged after 1 restarts");
    }
}

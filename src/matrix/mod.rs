//! Operator adapters: sparse CSR and diagonal.

pub mod diagonal;
pub use diagonal::DiagonalOperator;
pub mod sparse;
pub use sparse::CsrMatrix;

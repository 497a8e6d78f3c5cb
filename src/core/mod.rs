//! Capability traits and their concrete wrappers.

pub mod traits;
pub mod wrappers;

pub use traits::{LinearOperator, VectorSpace, VectorStore};
pub use wrappers::{MemoryStore, VecSpace};

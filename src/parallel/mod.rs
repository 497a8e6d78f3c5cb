//! Collective communication back-ends.
//!
//! The eigensolver only needs sums of scalars and small dense blocks over all
//! cooperating processes. `Comm` abstracts that; every reduction is a collective
//! and must be reached by all ranks in the same order.

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);
    /// Sum of `x` over all processes.
    fn all_reduce(&self, x: f64) -> f64;
    /// Elementwise sum of `buf` over all processes, in place.
    fn all_reduce_slice(&self, buf: &mut [f64]) {
        for v in buf.iter_mut() {
            *v = self.all_reduce(*v);
        }
    }
}

/// Single process, no reduction.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Comm for SerialComm {
    fn rank(&self) -> usize { 0 }
    fn size(&self) -> usize { 1 }
    fn barrier(&self) {}
    fn all_reduce(&self, x: f64) -> f64 { x }
    fn all_reduce_slice(&self, _buf: &mut [f64]) {}
}

#[cfg(feature="mpi")]
pub mod mpi_comm;
#[cfg(feature="mpi")]
pub use mpi_comm::MpiComm;

#[cfg(feature="rayon")]
pub mod rayon_comm;
#[cfg(feature="rayon")]
pub use rayon_comm::RayonComm;

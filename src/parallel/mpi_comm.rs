/// MPI-based parallel communication module.
///
/// This module provides an implementation of the `Comm` trait using the MPI (Message Passing Interface)
/// backend for distributed-memory parallelism. Each process holds one partition of every Krylov
/// vector; the eigensolver reduces inner products and small projection blocks through
/// `all_reduce`/`all_reduce_slice`. The implementation is only available when the `mpi` feature
/// is enabled.
///
/// # Example
/// ```no_run
/// #[cfg(feature = "mpi")]
/// {
///     use kryeig::parallel::{Comm, MpiComm};
///     let comm = MpiComm::new();
///     println!("Rank: {} / {}", comm.rank(), comm.size());
///     comm.barrier();
/// }
/// ```

#[cfg(feature = "mpi")]
use mpi::collective::SystemOperation;
#[cfg(feature = "mpi")]
use mpi::environment::Universe;
#[cfg(feature = "mpi")]
use mpi::topology::SimpleCommunicator;
#[cfg(feature = "mpi")]
use mpi::traits::*;

/// MPI communicator wrapper for distributed parallelism.
///
/// Holds the MPI world communicator, the rank of the current process, and the total number of processes.
#[cfg(feature = "mpi")]
pub struct MpiComm {
    /// The MPI world communicator (all processes in the job).
    pub world: SimpleCommunicator,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
    // MPI is finalized when this drops.
    _universe: Universe,
}

#[cfg(feature = "mpi")]
impl MpiComm {
    /// Initializes MPI and constructs a new `MpiComm` instance.
    ///
    /// # Panics
    /// Panics if MPI was already initialized.
    pub fn new() -> Self {
        let universe = mpi::initialize().expect("MPI already initialized");
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiComm { world, rank, size, _universe: universe }
    }
}

#[cfg(feature = "mpi")]
impl super::Comm for MpiComm {
    /// Returns the rank (ID) of this process.
    fn rank(&self) -> usize { self.rank }
    /// Returns the total number of processes in the communicator.
    fn size(&self) -> usize { self.size }
    /// Synchronizes all processes at a barrier.
    fn barrier(&self) { self.world.barrier(); }

    /// Performs an all-reduce sum operation across all processes.
    fn all_reduce(&self, x: f64) -> f64 {
        let mut y = x;
        self.world.all_reduce_into(&x, &mut y, &SystemOperation::sum());
        y
    }

    /// Sums a block of values across all processes with a single collective.
    fn all_reduce_slice(&self, buf: &mut [f64]) {
        let local = buf.to_vec();
        self.world
            .all_reduce_into(&local[..], buf, &SystemOperation::sum());
    }
}

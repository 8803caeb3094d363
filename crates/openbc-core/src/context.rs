use crate::comm::Communicator;
use openbc_types::error::{OpenBcError, OpenBcResult};
use openbc_types::geometry::{Dimensionality, Geometry};

/// Per-worker view of the solve: who am I, how many of us, and which axes wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveContext {
    pub num_workers: usize,
    pub worker_id: usize,
    pub periodicity: [bool; 3],
    pub dim: Dimensionality,
}

impl SolveContext {
    pub fn new(num_workers: usize, worker_id: usize, geometry: &Geometry) -> OpenBcResult<Self> {
        if num_workers < 1 {
            return Err(OpenBcError::ConfigError(
                "solve context requires num_workers >= 1".to_string(),
            ));
        }
        if worker_id >= num_workers {
            return Err(OpenBcError::ConfigError(format!(
                "worker_id={worker_id} out of range for num_workers={num_workers}"
            )));
        }
        Ok(SolveContext {
            num_workers,
            worker_id,
            periodicity: geometry.periodicity(),
            dim: geometry.dimensionality(),
        })
    }

    pub fn from_comm(comm: &dyn Communicator, geometry: &Geometry) -> OpenBcResult<Self> {
        Self::new(comm.size(), comm.rank(), geometry)
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.periodicity[axis]
    }

    /// Log prefix identifying this worker.
    pub fn tag(&self) -> String {
        format!("[worker {}/{}]", self.worker_id, self.num_workers)
    }
}

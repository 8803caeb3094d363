// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — OpenBC Communicators
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Collective message passing between lockstep workers.
//!
//! Three backends share one trait:
//! - `SerialComm`: a single worker, every collective is the identity.
//! - `ThreadComm`: one OS thread per worker inside this process, one FIFO
//!   channel per ordered worker pair. Every message carries a per-worker
//!   sequence number and its collective kind, so a worker that drifts out of
//!   lockstep or enters a different collective is reported instead of
//!   silently consuming the wrong message.
//! - `MpiComm` (feature `mpi`): rsmpi collectives on a real communicator.
//!
//! Collectives block until every participant has arrived. There is no
//! timeout; a worker that stops responding stalls its peers, and a worker
//! that exits is reported as a disconnect by the next collective.

use openbc_types::error::{OpenBcError, OpenBcResult};
use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, Sender};

/// Collective operations required by the open-boundary pipeline.
pub trait Communicator {
    /// Id of the calling worker, `0..size()`.
    fn rank(&self) -> usize;

    /// Number of workers.
    fn size(&self) -> usize;

    /// Concatenation of every worker's `local` in ascending worker order.
    /// All workers must contribute the same number of integers.
    fn all_gather_i64(&self, local: &[i64]) -> OpenBcResult<Vec<i64>>;

    /// `outgoing[p]` is delivered to worker `p`; the result holds what each
    /// worker sent to the caller, indexed by sender.
    fn all_to_all_f64(&self, outgoing: Vec<Vec<f64>>) -> OpenBcResult<Vec<Vec<f64>>>;

    /// Returns once every worker has entered the barrier.
    fn barrier(&self) -> OpenBcResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather_i64(&self, local: &[i64]) -> OpenBcResult<Vec<i64>> {
        Ok(local.to_vec())
    }

    fn all_to_all_f64(&self, outgoing: Vec<Vec<f64>>) -> OpenBcResult<Vec<Vec<f64>>> {
        if outgoing.len() != 1 {
            return Err(OpenBcError::CollectiveMismatch {
                expected: 1,
                got: outgoing.len(),
            });
        }
        Ok(outgoing)
    }

    fn barrier(&self) -> OpenBcResult<()> {
        Ok(())
    }
}

#[derive(Debug)]
enum Payload {
    Ints(Vec<i64>),
    Reals(Vec<f64>),
    Barrier,
}

impl Payload {
    fn collective(&self) -> &'static str {
        match self {
            Payload::Ints(_) => "all-gather",
            Payload::Reals(_) => "all-to-all",
            Payload::Barrier => "barrier",
        }
    }
}

#[derive(Debug)]
struct Packet {
    sequence: u64,
    payload: Payload,
}

/// In-process worker endpoint. Create a full set with [`ThreadComm::world`]
/// and move one endpoint into each worker thread.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    senders: Vec<Sender<Packet>>,
    receivers: Vec<Receiver<Packet>>,
    sequence: Cell<u64>,
}

impl ThreadComm {
    pub fn world(size: usize) -> OpenBcResult<Vec<ThreadComm>> {
        if size < 1 {
            return Err(OpenBcError::ConfigError(
                "a worker group needs at least one worker".to_string(),
            ));
        }
        // senders[src][dst] feeds receivers[dst][src].
        let mut senders: Vec<Vec<Sender<Packet>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut receivers: Vec<Vec<Receiver<Packet>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        for src in 0..size {
            for dst in 0..size {
                let (tx, rx) = mpsc::channel();
                senders[src].push(tx);
                receivers[dst].push(rx);
            }
        }
        Ok(senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| ThreadComm {
                rank,
                size,
                senders,
                receivers,
                sequence: Cell::new(0),
            })
            .collect())
    }

    fn next_sequence(&self) -> u64 {
        let s = self.sequence.get();
        self.sequence.set(s + 1);
        s
    }

    fn comm_error(&self, message: String) -> OpenBcError {
        OpenBcError::CommError {
            worker: self.rank,
            message,
        }
    }

    fn send(&self, peer: usize, sequence: u64, payload: Payload) -> OpenBcResult<()> {
        self.senders[peer]
            .send(Packet { sequence, payload })
            .map_err(|_| self.comm_error(format!("worker {peer} left before collective #{sequence}")))
    }

    /// Next packet from `peer`; it must belong to the same collective call.
    fn recv(&self, peer: usize, sequence: u64, collective: &str) -> OpenBcResult<Payload> {
        let packet = self.receivers[peer]
            .recv()
            .map_err(|_| self.comm_error(format!("worker {peer} disconnected during collective #{sequence}")))?;
        if packet.sequence != sequence {
            return Err(self.comm_error(format!(
                "lockstep lost: expected collective #{sequence} from worker {peer}, got #{}",
                packet.sequence
            )));
        }
        if packet.payload.collective() != collective {
            return Err(self.comm_error(format!(
                "lockstep lost: worker {peer} entered a {} while this worker entered a {collective}",
                packet.payload.collective()
            )));
        }
        Ok(packet.payload)
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_gather_i64(&self, local: &[i64]) -> OpenBcResult<Vec<i64>> {
        let seq = self.next_sequence();
        for peer in (0..self.size).filter(|p| *p != self.rank) {
            self.send(peer, seq, Payload::Ints(local.to_vec()))?;
        }
        let mut out = Vec::with_capacity(local.len() * self.size);
        for peer in 0..self.size {
            if peer == self.rank {
                out.extend_from_slice(local);
                continue;
            }
            if let Payload::Ints(v) = self.recv(peer, seq, "all-gather")? {
                out.extend(v);
            }
        }
        Ok(out)
    }

    fn all_to_all_f64(&self, outgoing: Vec<Vec<f64>>) -> OpenBcResult<Vec<Vec<f64>>> {
        if outgoing.len() != self.size {
            return Err(OpenBcError::CollectiveMismatch {
                expected: self.size,
                got: outgoing.len(),
            });
        }
        let seq = self.next_sequence();
        let mut own = Vec::new();
        for (peer, buf) in outgoing.into_iter().enumerate() {
            if peer == self.rank {
                own = buf;
            } else {
                self.send(peer, seq, Payload::Reals(buf))?;
            }
        }
        let mut incoming = Vec::with_capacity(self.size);
        for peer in 0..self.size {
            if peer == self.rank {
                incoming.push(std::mem::take(&mut own));
                continue;
            }
            if let Payload::Reals(v) = self.recv(peer, seq, "all-to-all")? {
                incoming.push(v);
            }
        }
        Ok(incoming)
    }

    fn barrier(&self) -> OpenBcResult<()> {
        let seq = self.next_sequence();
        for peer in (0..self.size).filter(|p| *p != self.rank) {
            self.send(peer, seq, Payload::Barrier)?;
        }
        for peer in (0..self.size).filter(|p| *p != self.rank) {
            self.recv(peer, seq, "barrier")?;
        }
        Ok(())
    }
}

/// Run `f` on `size` in-process workers and collect their results in
/// worker order. The first failing worker's error is returned.
pub fn run_workers<R, F>(size: usize, f: F) -> OpenBcResult<Vec<R>>
where
    R: Send,
    F: Fn(ThreadComm) -> OpenBcResult<R> + Sync,
{
    let comms = ThreadComm::world(size)?;
    std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let f = &f;
                scope.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(worker, h)| {
                h.join()
                    .map_err(|_| OpenBcError::CommError {
                        worker,
                        message: "worker thread panicked".to_string(),
                    })
                    .and_then(|r| r)
            })
            .collect()
    })
}

#[cfg(feature = "mpi")]
mod mpi_backend {
    use super::Communicator;
    use mpi::collective::CommunicatorCollectives;
    use mpi::datatype::{Partition, PartitionMut};
    use mpi::topology::{Communicator as _, SimpleCommunicator};
    use mpi::Count;
    use openbc_types::error::{OpenBcError, OpenBcResult};

    pub struct MpiComm {
        world: SimpleCommunicator,
    }

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            MpiComm { world }
        }
    }

    fn displacements(counts: &[Count]) -> Vec<Count> {
        counts
            .iter()
            .scan(0 as Count, |acc, &c| {
                let d = *acc;
                *acc += c;
                Some(d)
            })
            .collect()
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.world.rank() as usize
        }

        fn size(&self) -> usize {
            self.world.size() as usize
        }

        fn all_gather_i64(&self, local: &[i64]) -> OpenBcResult<Vec<i64>> {
            let mut out = vec![0i64; local.len() * self.size()];
            self.world.all_gather_into(local, &mut out[..]);
            Ok(out)
        }

        fn all_to_all_f64(&self, outgoing: Vec<Vec<f64>>) -> OpenBcResult<Vec<Vec<f64>>> {
            let n = self.size();
            if outgoing.len() != n {
                return Err(OpenBcError::CollectiveMismatch {
                    expected: n,
                    got: outgoing.len(),
                });
            }
            let send_counts: Vec<Count> = outgoing.iter().map(|b| b.len() as Count).collect();
            let mut recv_counts = vec![0 as Count; n];
            self.world
                .all_to_all_into(&send_counts[..], &mut recv_counts[..]);
            let send_displs = displacements(&send_counts);
            let recv_displs = displacements(&recv_counts);
            let send_buf: Vec<f64> = outgoing.concat();
            let total: usize = recv_counts.iter().map(|c| *c as usize).sum();
            let mut recv_buf = vec![0.0f64; total];
            {
                let send = Partition::new(&send_buf[..], &send_counts[..], &send_displs[..]);
                let mut recv =
                    PartitionMut::new(&mut recv_buf[..], &recv_counts[..], &recv_displs[..]);
                self.world.all_to_all_varcount_into(&send, &mut recv);
            }
            Ok(recv_counts
                .iter()
                .zip(recv_displs.iter())
                .map(|(&c, &d)| recv_buf[d as usize..(d + c) as usize].to_vec())
                .collect())
        }

        fn barrier(&self) -> OpenBcResult<()> {
            self.world.barrier();
            Ok(())
        }
    }
}

#[cfg(feature = "mpi")]
pub use mpi_backend::MpiComm;

//! Thin façade over in-process (thread) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are pollable through [`Wait::test`] and waitable through
//! [`Wait::wait`]; the halo exchanger never trusts a receive buffer until one
//! of the two has reported completion.

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Base tag of one communication epoch; per-message tags are offsets from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn base(self) -> u16 {
        self.0
    }
    /// Tag `base + k` (wrapping).
    pub const fn offset(self, k: u16) -> u16 {
        self.0.wrapping_add(k)
    }
}

impl Default for CommTag {
    fn default() -> Self {
        Self(0x4A10)
    }
}

/// Non-blocking point-to-point communication interface (minimal by design).
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of at most `buf.len()` bytes. The payload is returned
    /// by [`Wait::wait`]; longer messages are truncated.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    /// Block until every rank of the group has entered the barrier.
    fn barrier(&self);
}

/// Anything that can be polled and waited on.
pub trait Wait {
    /// Non-blocking completion check. Once it returns `true` it keeps
    /// returning `true` and never re-consumes a message.
    fn test(&mut self) -> bool;
    /// Block until completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

// --- ThreadComm: ranks as threads of one process ---
type Key = (usize, usize, u16); // (src, dst, tag)

struct Envelope {
    payload: Bytes,
    matched: Arc<AtomicBool>,
}

struct BarrierState {
    arrived: usize,
    generation: u64,
}

/// Generation-counting barrier that can be released early on abort.
struct LocalBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl LocalBarrier {
    fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
            }),
            cvar: Condvar::new(),
        }
    }

    fn wait(&self, aborted: &AtomicBool) {
        let mut st = self.state.lock();
        let generation = st.generation;
        st.arrived += 1;
        if st.arrived == self.parties {
            st.arrived = 0;
            st.generation = st.generation.wrapping_add(1);
            self.cvar.notify_all();
            return;
        }
        while st.generation == generation && !aborted.load(Ordering::Acquire) {
            self.cvar.wait(&mut st);
        }
    }

    fn release_all(&self) {
        let _guard = self.state.lock();
        self.cvar.notify_all();
    }
}

/// Shared state of a group of in-process ranks: the mailbox and the barrier.
///
/// Messages are matched FIFO per `(src, dst, tag)`, so two messages on the
/// same key never overtake each other. A send completes once the receiver
/// has matched it.
pub struct LocalUniverse {
    size: usize,
    mailbox: DashMap<Key, VecDeque<Envelope>>,
    barrier: LocalBarrier,
    aborted: AtomicBool,
}

impl LocalUniverse {
    pub fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            size,
            mailbox: DashMap::new(),
            barrier: LocalBarrier::new(size),
            aborted: AtomicBool::new(false),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Communicator for `rank` within this universe.
    pub fn comm(self: &Arc<Self>, rank: usize) -> ThreadComm {
        debug_assert!(rank < self.size, "rank {rank} outside universe of {}", self.size);
        ThreadComm {
            rank,
            universe: Arc::clone(self),
        }
    }

    /// One communicator per rank, in rank order.
    pub fn comms(self: &Arc<Self>) -> Vec<ThreadComm> {
        (0..self.size).map(|r| self.comm(r)).collect()
    }

    /// Cancel all outstanding and future operations: pending receives report
    /// completion without data, sends complete, barriers release.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        self.barrier.release_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Number of sent-but-unmatched messages across all keys.
    pub fn pending_messages(&self) -> usize {
        self.mailbox.iter().map(|q| q.len()).sum()
    }

    fn post(&self, key: Key, payload: Bytes) -> Arc<AtomicBool> {
        let matched = Arc::new(AtomicBool::new(false));
        self.mailbox.entry(key).or_default().push_back(Envelope {
            payload,
            matched: Arc::clone(&matched),
        });
        matched
    }

    fn take(&self, key: &Key) -> Option<Envelope> {
        self.mailbox.get_mut(key).and_then(|mut q| q.pop_front())
    }
}

impl std::fmt::Debug for LocalUniverse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalUniverse")
            .field("size", &self.size)
            .field("pending", &self.pending_messages())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Communicator of one in-process rank.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    universe: Arc<LocalUniverse>,
}

pub struct LocalSendHandle {
    matched: Arc<AtomicBool>,
    universe: Arc<LocalUniverse>,
}

impl Wait for LocalSendHandle {
    fn test(&mut self) -> bool {
        self.matched.load(Ordering::Acquire) || self.universe.is_aborted()
    }

    fn wait(mut self) -> Option<Vec<u8>> {
        while !self.test() {
            std::thread::yield_now();
        }
        None
    }
}

pub struct LocalRecvHandle {
    universe: Arc<LocalUniverse>,
    key: Key,
    len: usize,
    data: Option<Vec<u8>>,
    cancelled: bool,
}

impl Wait for LocalRecvHandle {
    fn test(&mut self) -> bool {
        if self.data.is_some() || self.cancelled {
            return true;
        }
        if let Some(env) = self.universe.take(&self.key) {
            let n = self.len.min(env.payload.len());
            self.data = Some(env.payload[..n].to_vec());
            env.matched.store(true, Ordering::Release);
            return true;
        }
        if self.universe.is_aborted() {
            self.cancelled = true;
            return true;
        }
        false
    }

    fn wait(mut self) -> Option<Vec<u8>> {
        while !self.test() {
            std::thread::yield_now();
        }
        self.data
    }
}

impl Communicator for ThreadComm {
    type SendHandle = LocalSendHandle;
    type RecvHandle = LocalRecvHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let matched = self
            .universe
            .post((self.rank, peer, tag), Bytes::copy_from_slice(buf));
        LocalSendHandle {
            matched,
            universe: Arc::clone(&self.universe),
        }
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalRecvHandle {
            universe: Arc::clone(&self.universe),
            key: (peer, self.rank, tag),
            len: buf.len(),
            data: None,
            cancelled: false,
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.universe.size
    }

    fn barrier(&self) {
        self.universe.barrier.wait(&self.universe.aborted);
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::diffusion_error::DiffusionError;
    use mpi::environment::Universe;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as _, Destination as _, Source as _};
    use std::ptr::NonNull;

    pub struct MpiComm {
        pub world: SimpleCommunicator,
        rank: usize,
        size: usize,
        _universe: Universe,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, DiffusionError> {
            let universe = mpi::initialize().ok_or(DiffusionError::MpiInit)?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }
    }

    /// Request plus the heap buffer it reads from or writes into. The buffer
    /// is leaked for the request's lifetime and reclaimed on completion.
    pub struct MpiHandle {
        request: Option<Request<'static, [u8], StaticScope>>,
        buffer: Option<NonNull<[u8]>>,
        returns_data: bool,
    }

    impl MpiHandle {
        fn leak(bytes: Vec<u8>) -> NonNull<[u8]> {
            NonNull::from(Box::leak(bytes.into_boxed_slice()))
        }

        fn reclaim(&mut self) -> Option<Vec<u8>> {
            // SAFETY: the pointer came from `Box::leak` and the request that
            // borrowed it has completed.
            self.buffer
                .take()
                .map(|b| unsafe { Box::from_raw(b.as_ptr()) }.into_vec())
        }
    }

    impl Wait for MpiHandle {
        fn test(&mut self) -> bool {
            if let Some(req) = self.request.take() {
                if let Err(req) = req.test() {
                    self.request = Some(req);
                    return false;
                }
            }
            true
        }

        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(req) = self.request.take() {
                req.wait();
            }
            let data = self.reclaim();
            if self.returns_data { data } else { None }
        }
    }

    impl Drop for MpiHandle {
        fn drop(&mut self) {
            if let Some(req) = self.request.take() {
                req.wait();
            }
            let _ = self.reclaim();
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let ptr = MpiHandle::leak(buf.to_vec());
            // SAFETY: the leaked buffer outlives the request (see `MpiHandle`).
            let data: &'static [u8] = unsafe { &*ptr.as_ptr() };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, data, tag as i32);
            MpiHandle {
                request: Some(req),
                buffer: Some(ptr),
                returns_data: false,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let ptr = MpiHandle::leak(vec![0u8; buf.len()]);
            // SAFETY: as above; nothing else aliases the buffer until reclaim.
            let data: &'static mut [u8] = unsafe { &mut *ptr.as_ptr() };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, data, tag as i32);
            MpiHandle {
                request: Some(req),
                buffer: Some(ptr),
                returns_data: true,
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn barrier(&self) {
            self.world.barrier();
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiComm, MpiHandle};

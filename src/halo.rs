//! Halo exchange: one send and one receive per side, per step.
//!
//! Four requests are in flight after [`HaloExchanger::issue_exchange`]:
//! send-right, recv-right, send-left, recv-left. A side whose neighbour is
//! [`Neighbor::None`] gets a null request that is complete from the start,
//! so polling and waiting never need to special-case the domain ends.
//!
//! A receive's payload only reaches the field through
//! [`ExchangeRequests::deliver_ghosts`], after the request has been observed
//! complete.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WIRE_VALUE_LEN, decode_value, encode_value};
use crate::diffusion_error::DiffusionError;
use crate::field::LocalField;
use crate::partition::{Neighbor, Partition, Side};

/// Tag offset for values travelling towards higher ranks.
pub const TAG_TO_RIGHT: u16 = 0;
/// Tag offset for values travelling towards lower ranks.
pub const TAG_TO_LEFT: u16 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Send,
    Recv,
}

enum RequestState<H> {
    Null,
    InFlight(H),
    Complete(Option<f64>),
}

/// One outstanding halo operation.
pub struct HaloRequest<H> {
    kind: RequestKind,
    side: Side,
    peer: Neighbor,
    owner: usize,
    state: RequestState<H>,
}

impl<H: Wait> HaloRequest<H> {
    fn null(kind: RequestKind, side: Side, owner: usize) -> Self {
        Self {
            kind,
            side,
            peer: Neighbor::None,
            owner,
            state: RequestState::Null,
        }
    }

    fn in_flight(kind: RequestKind, side: Side, peer: usize, owner: usize, handle: H) -> Self {
        Self {
            kind,
            side,
            peer: Neighbor::Rank(peer),
            owner,
            state: RequestState::InFlight(handle),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_null(&self) -> bool {
        matches!(self.state, RequestState::Null)
    }

    /// Completion as of the last poll; does not touch the communicator.
    pub fn is_complete(&self) -> bool {
        !matches!(self.state, RequestState::InFlight(_))
    }

    /// Non-blocking completion check. Repeatable: once complete, later calls
    /// return `true` without touching the communicator again.
    pub fn poll(&mut self) -> Result<bool, DiffusionError> {
        match &mut self.state {
            RequestState::Null | RequestState::Complete(_) => Ok(true),
            RequestState::InFlight(handle) => {
                if !handle.test() {
                    return Ok(false);
                }
                self.finish()?;
                Ok(true)
            }
        }
    }

    /// Block until complete.
    pub fn complete(&mut self) -> Result<(), DiffusionError> {
        self.finish()
    }

    /// Block until complete and return the received value (receives only).
    pub fn wait(mut self) -> Result<Option<f64>, DiffusionError> {
        self.finish()?;
        Ok(self.value())
    }

    /// Received value once complete; `None` for sends and null requests.
    pub fn value(&self) -> Option<f64> {
        match self.state {
            RequestState::Complete(v) => v,
            _ => None,
        }
    }

    fn finish(&mut self) -> Result<(), DiffusionError> {
        match std::mem::replace(&mut self.state, RequestState::Complete(None)) {
            RequestState::InFlight(handle) => {
                let data = handle.wait();
                let value = match self.kind {
                    RequestKind::Send => None,
                    RequestKind::Recv => Some(self.decode(data)?),
                };
                self.state = RequestState::Complete(value);
            }
            other => self.state = other,
        }
        Ok(())
    }

    fn decode(&self, data: Option<Vec<u8>>) -> Result<f64, DiffusionError> {
        let neighbor = self.peer.rank().unwrap_or(self.owner);
        let bytes = data.ok_or(DiffusionError::Cancelled { rank: self.owner })?;
        decode_value(&bytes).map_err(|reason| DiffusionError::CommError { neighbor, reason })
    }
}

impl<H> std::fmt::Debug for HaloRequest<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            RequestState::Null => "null",
            RequestState::InFlight(_) => "in-flight",
            RequestState::Complete(_) => "complete",
        };
        f.debug_struct("HaloRequest")
            .field("kind", &self.kind)
            .field("side", &self.side)
            .field("peer", &self.peer)
            .field("state", &state)
            .finish()
    }
}

/// The four requests of one step.
pub struct ExchangeRequests<C: Communicator> {
    pub send_right: HaloRequest<C::SendHandle>,
    pub recv_right: HaloRequest<C::RecvHandle>,
    pub send_left: HaloRequest<C::SendHandle>,
    pub recv_left: HaloRequest<C::RecvHandle>,
}

impl<C: Communicator> ExchangeRequests<C> {
    pub fn recv_mut(&mut self, side: Side) -> &mut HaloRequest<C::RecvHandle> {
        match side {
            Side::Left => &mut self.recv_left,
            Side::Right => &mut self.recv_right,
        }
    }

    /// Poll both receives once each; `true` when both are complete.
    pub fn poll_receives(&mut self) -> Result<bool, DiffusionError> {
        let right = self.recv_right.poll()?;
        let left = self.recv_left.poll()?;
        Ok(right && left)
    }

    /// Block on both receives.
    pub fn wait_receives(&mut self) -> Result<(), DiffusionError> {
        self.recv_right.complete()?;
        self.recv_left.complete()
    }

    /// Block on both sends.
    pub fn wait_sends(&mut self) -> Result<(), DiffusionError> {
        self.send_right.complete()?;
        self.send_left.complete()
    }

    pub fn wait_all(&mut self) -> Result<(), DiffusionError> {
        self.wait_receives()?;
        self.wait_sends()
    }

    /// Copy every completed receive into its ghost slot. Null receives leave
    /// the ghost untouched.
    pub fn deliver_ghosts(&self, field: &mut LocalField) {
        for recv in [&self.recv_left, &self.recv_right] {
            if let Some(v) = recv.value() {
                field.set_ghost(recv.side(), v);
            }
        }
    }
}

/// Issues and completes halo traffic for one rank.
pub struct HaloExchanger<'c, C: Communicator> {
    comm: &'c C,
    part: Partition,
    tag: CommTag,
}

impl<'c, C: Communicator> HaloExchanger<'c, C> {
    pub fn new(comm: &'c C, part: Partition) -> Self {
        Self::with_tag(comm, part, CommTag::default())
    }

    pub fn with_tag(comm: &'c C, part: Partition, tag: CommTag) -> Self {
        Self { comm, part, tag }
    }

    /// Tag of the message we send towards `side`.
    fn send_tag(&self, side: Side) -> u16 {
        match side {
            Side::Right => self.tag.offset(TAG_TO_RIGHT),
            Side::Left => self.tag.offset(TAG_TO_LEFT),
        }
    }

    /// Tag of the message arriving from `side`.
    fn recv_tag(&self, side: Side) -> u16 {
        match side {
            Side::Right => self.tag.offset(TAG_TO_LEFT),
            Side::Left => self.tag.offset(TAG_TO_RIGHT),
        }
    }

    fn isend(&self, side: Side, value: f64) -> HaloRequest<C::SendHandle> {
        match self.part.neighbor(side) {
            Neighbor::None => HaloRequest::null(RequestKind::Send, side, self.part.rank),
            Neighbor::Rank(peer) => {
                let handle = self.comm.isend(peer, self.send_tag(side), &encode_value(value));
                HaloRequest::in_flight(RequestKind::Send, side, peer, self.part.rank, handle)
            }
        }
    }

    fn irecv(&self, side: Side) -> HaloRequest<C::RecvHandle> {
        match self.part.neighbor(side) {
            Neighbor::None => HaloRequest::null(RequestKind::Recv, side, self.part.rank),
            Neighbor::Rank(peer) => {
                let mut buf = [0u8; WIRE_VALUE_LEN];
                let handle = self.comm.irecv(peer, self.recv_tag(side), &mut buf);
                HaloRequest::in_flight(RequestKind::Recv, side, peer, self.part.rank, handle)
            }
        }
    }

    /// Post the four non-blocking operations against `field`.
    pub fn issue_exchange(&self, field: &LocalField) -> ExchangeRequests<C> {
        let send_right = self.isend(Side::Right, field[self.part.edge_index(Side::Right)]);
        let recv_right = self.irecv(Side::Right);
        let send_left = self.isend(Side::Left, field[self.part.edge_index(Side::Left)]);
        let recv_left = self.irecv(Side::Left);
        ExchangeRequests {
            send_right,
            recv_right,
            send_left,
            recv_left,
        }
    }

    pub fn poll<H: Wait>(&self, request: &mut HaloRequest<H>) -> Result<bool, DiffusionError> {
        request.poll()
    }

    pub fn wait<H: Wait>(&self, request: HaloRequest<H>) -> Result<Option<f64>, DiffusionError> {
        request.wait()
    }

    fn blocking_send(&self, side: Side, field: &LocalField) -> Result<(), DiffusionError> {
        let mut req = self.isend(side, field[self.part.edge_index(side)]);
        req.complete()
    }

    fn blocking_recv(&self, side: Side, field: &mut LocalField) -> Result<(), DiffusionError> {
        if let Some(v) = self.irecv(side).wait()? {
            field.set_ghost(side, v);
        }
        Ok(())
    }

    /// Baseline exchange with blocking operations only.
    ///
    /// Even ranks send before receiving on each side and odd ranks receive
    /// before sending, so paired neighbours never both block in a send.
    pub fn blocking_exchange(&self, field: &mut LocalField) -> Result<(), DiffusionError> {
        if self.part.rank % 2 == 0 {
            self.blocking_send(Side::Right, field)?;
            self.blocking_recv(Side::Right, field)?;
            self.blocking_send(Side::Left, field)?;
            self.blocking_recv(Side::Left, field)
        } else {
            self.blocking_recv(Side::Left, field)?;
            self.blocking_send(Side::Left, field)?;
            self.blocking_recv(Side::Right, field)?;
            self.blocking_send(Side::Right, field)
        }
    }
}

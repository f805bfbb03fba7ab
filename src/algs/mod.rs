//! Message-passing substrate: communicators and the halo wire format.

pub mod communicator;
pub mod wire;

pub use communicator::{CommTag, Communicator, LocalUniverse, ThreadComm, Wait};

//! Functional acknowledgment (997) generation.
//!
//! The reply is built while the interchange is still being read. Its outcome
//! (accept or reject) is unknown until the interchange ends, so segments that
//! depend on it are written to both continuations of a [`BranchingWriter`]
//! and the generator commits one when it finishes.

mod envelope;
mod generator;
mod writer;

pub use envelope::{EnvelopeHeader, EnvelopeLayout};
pub use generator::{
    ACK_FUNCTION_CODE, AckGenerator, AckPhase, AckState, GROUP_CONTROL_NUMBER, GroupHeader,
    InterchangeContext, TRANSACTION_CONTROL_NUMBER,
};
pub use writer::{BranchingWriter, WritePath};

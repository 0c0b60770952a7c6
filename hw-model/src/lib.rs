// Licensed under the Apache-2.0 license

use std::error::Error;

use hsm_api::message::she::SHE_ID_SIZE;
use hsm_api::{MessageFlavor, MsgId, MuParams, Transport};
use hsm_error::HsmError;

mod crypto;
mod engine;
pub mod memory;
mod model_emulated;

pub use engine::ServiceKind;
pub use model_emulated::ModelEmulated;

/// Secure-memory window granted to every session unless configured otherwise.
pub const DEFAULT_SHARED_BUF: (u16, u16) = (0x0400, 0x0C00);

#[derive(Clone, Debug)]
pub struct InitParams {
    // Header values the engine accepts and answers with
    pub mu: MuParams,

    // Firmware message layout generation
    pub flavor: MessageFlavor,

    // Seed for the engine's random number generator
    pub seed: u64,

    // Identity reported by SHE_GET_ID
    pub she_uid: [u8; SHE_ID_SIZE],

    // (offset, size) of the secure-memory window granted on SHARED_BUF
    pub shared_buf: (u16, u16),

    // Number of handles the engine can have open at once
    pub max_handles: usize,
}

impl Default for InitParams {
    fn default() -> Self {
        Self {
            mu: MuParams::default(),
            flavor: MessageFlavor::Legacy,
            seed: 0x5EED,
            she_uid: [0x5A; SHE_ID_SIZE],
            shared_buf: DEFAULT_SHARED_BUF,
            max_handles: 64,
        }
    }
}

/// Misbehavior the model can be told to exhibit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// The next exchange fails at the transport after a well-formed success
    /// response has been written to the response buffer.
    TransportFailure,
    /// The next checksum-protected response carries a corrupted checksum.
    CorruptResponseChecksum,
    /// The next request with this id is rejected with the given error
    /// without being executed.
    Reject(MsgId, HsmError),
}

// Represents an emulation of the secure engine, to be called from tests.
pub trait HwModel: Transport {
    fn init(params: InitParams) -> Result<Self, Box<dyn Error>>
    where
        Self: Sized;

    /// Queue a fault; queued faults fire in order as their trigger occurs.
    fn inject_fault(&mut self, fault: Fault);

    /// Number of sessions, key stores and services the engine has open.
    fn live_handles(&self) -> usize;

    /// Number of open services of `kind`.
    fn live_services(&self, kind: ServiceKind) -> usize;

    /// Command byte of every request received, in arrival order.
    fn command_log(&self) -> &[u8];

    /// Data buffers currently registered with the model.
    fn live_registrations(&self) -> usize;

    fn count_requests(&self, id: MsgId) -> usize {
        self.command_log().iter().filter(|c| **c == id.0).count()
    }
}

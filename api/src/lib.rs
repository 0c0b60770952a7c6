// Licensed under the Apache-2.0 license

mod checksum;
pub mod dispatch;
mod families;
pub mod message;
pub mod status;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use hsm_error as error;

pub use checksum::{calc_checksum, populate_checksum, verify_checksum, verify_trailing_checksum};
pub use dispatch::{DispatchTable, MsgHandler};
pub use families::ServiceFamilies;
pub use message::{MessageFlavor, MsgArgs, MsgId, MuHdr, MuParams};
pub use transport::{DataBufFlags, DataBufScope, Transport, TransportError};

use hsm_error::HsmError;
use log::{debug, error};
use zerocopy::{FromBytes, IntoBytes};

use message::{PrepareCtx, MAX_MSG_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HsmApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("response checksum mismatch: computed {expected:#010x}, carried {actual:#010x}")]
    IntegrityFailure { expected: u32, actual: u32 },
    #[error("unexpected response header: expected command {expected:#04x}, got {actual:#04x}")]
    UnexpectedResponse { expected: u8, actual: u8 },
    #[error("unknown handle")]
    UnknownHandle,
    #[error("message {0:#04x} is not supported by this client")]
    NotSupported(u8),
    #[error("invalid argument: {0}")]
    Validation(&'static str),
    #[error("no room to track another service")]
    OutOfHandles,
    #[error("engine reported {0}")]
    Hardware(HsmError),
}

impl HsmApiError {
    /// The error in the engine's closed code space.
    pub fn code(&self) -> HsmError {
        match self {
            Self::Hardware(err) => *err,
            Self::UnknownHandle => HsmError::UNKNOWN_HANDLE,
            Self::NotSupported(_) => HsmError::CMD_NOT_SUPPORTED,
            Self::Transport(_)
            | Self::IntegrityFailure { .. }
            | Self::UnexpectedResponse { .. }
            | Self::Validation(_)
            | Self::OutOfHandles => HsmError::GENERAL_ERROR,
        }
    }
}

impl From<HsmError> for HsmApiError {
    fn from(err: HsmError) -> Self {
        Self::Hardware(err)
    }
}

pub type HsmApiResult<T> = Result<T, HsmApiError>;

/// Runs request/response round trips for one session.
pub struct Executor<'a> {
    pub table: &'a DispatchTable,
    pub transport: &'a mut dyn Transport,
    pub mu: MuParams,
    pub flavor: MessageFlavor,
}

impl Executor<'_> {
    /// Prepare, send and process message `msg_id` addressed to `msg_hdl`.
    ///
    /// A transport failure is reported as such without looking at the
    /// response. Otherwise the engine status decides the outcome, and only
    /// a successful response has its output buffer copied back and its
    /// fields decoded into `args`.
    pub fn process(
        &mut self,
        msg_id: MsgId,
        msg_hdl: u32,
        args: &mut MsgArgs<'_>,
    ) -> HsmApiResult<()> {
        let handler = *self.table.get(msg_id);
        let mut cmd = [0u8; MAX_MSG_SIZE];
        let mut rsp = [0u8; MAX_MSG_SIZE];
        let mut bufs = DataBufScope::new(&mut *self.transport);

        let prepared = {
            let mut ctx = PrepareCtx {
                transport: &mut *bufs,
                msg_id,
                msg_hdl,
                flavor: self.flavor,
            };
            (handler.prepare)(&mut ctx, args, &mut cmd)?
        };
        if prepared.cmd_size % 4 != 0 || prepared.rsp_size > MAX_MSG_SIZE {
            return Err(HsmApiError::Validation("message not word aligned"));
        }

        let hdr = MuHdr {
            ver: self.mu.version,
            size: (prepared.cmd_size / 4) as u8,
            command: msg_id.0,
            tag: self.mu.cmd_tag,
        };
        cmd[..core::mem::size_of::<MuHdr>()].copy_from_slice(hdr.as_bytes());
        if prepared.crc {
            populate_checksum(&mut cmd[..prepared.cmd_size]);
        }

        debug!(
            "sending message {:#04x} ({} bytes) to handle {:#x}",
            msg_id.0, prepared.cmd_size, msg_hdl
        );
        if let Err(err) =
            bufs.send_and_receive(&cmd[..prepared.cmd_size], &mut rsp[..prepared.rsp_size])
        {
            error!("message {:#04x}: {err}", msg_id.0);
            return Err(err.into());
        }

        let rsp = &rsp[..prepared.rsp_size];
        let (rsp_hdr, rest) = MuHdr::read_from_prefix(rsp)
            .map_err(|_| HsmApiError::Validation("response shorter than its header"))?;
        if rsp_hdr.command != msg_id.0 || rsp_hdr.tag != self.mu.rsp_tag {
            return Err(HsmApiError::UnexpectedResponse {
                expected: msg_id.0,
                actual: rsp_hdr.command,
            });
        }
        let (rsp_code, _) = u32::read_from_prefix(rest)
            .map_err(|_| HsmApiError::Validation("response has no status"))?;
        status::rsp_code_to_result(rsp_code)?;

        if let Some(addr) = prepared.output {
            if let Some(out) = args.output_mut() {
                bufs.read_data_buf(addr, out)?;
            }
        }
        (handler.process_rsp)(rsp, args, self.flavor)
    }
}

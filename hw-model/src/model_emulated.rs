// Licensed under the Apache-2.0 license

use std::error::Error;

use hsm_api::{DataBufFlags, Transport, TransportError};
use log::{debug, error};

use crate::engine::{Engine, ServiceKind};
use crate::memory::{SharedMemory, SEC_RAM_SIZE};
use crate::{Fault, HwModel, InitParams};

/// Code reported for injected transport failures (EIO).
const TRANSPORT_FAULT_CODE: i32 = -5;

/// Software model of the secure engine and its message unit.
pub struct ModelEmulated {
    engine: Engine,
    memory: SharedMemory,
    faults: Vec<Fault>,
    command_log: Vec<u8>,
    closed: bool,
}

impl ModelEmulated {
    /// Remove and return the first queued fault `pred` accepts.
    fn take_fault(&mut self, pred: impl Fn(&Fault) -> bool) -> Option<Fault> {
        let idx = self.faults.iter().position(pred)?;
        Some(self.faults.remove(idx))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

fn copy_reply(bytes: &[u8], rsp: &mut [u8]) {
    let len = bytes.len().min(rsp.len());
    rsp[..len].copy_from_slice(&bytes[..len]);
}

impl Transport for ModelEmulated {
    fn send_and_receive(&mut self, cmd: &[u8], rsp: &mut [u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::new(TRANSPORT_FAULT_CODE));
        }
        let command = cmd.get(2).copied().unwrap_or(0);
        self.command_log.push(command);

        if self
            .take_fault(|f| *f == Fault::TransportFailure)
            .is_some()
        {
            // Leave a plausible answer behind; the caller must ignore it.
            rsp.fill(0x5A);
            copy_reply(&self.engine.bare_success(command).bytes, rsp);
            error!("[hsm-model] injected transport failure on message {command:#04x}");
            return Err(TransportError::new(TRANSPORT_FAULT_CODE));
        }
        if let Some(Fault::Reject(_, err)) =
            self.take_fault(|f| matches!(f, Fault::Reject(id, _) if id.0 == command))
        {
            debug!("[hsm-model] injected rejection of message {command:#04x}: {err}");
            copy_reply(&self.engine.failure(command, err).bytes, rsp);
            return Ok(());
        }

        let mut reply = self.engine.execute(cmd, &mut self.memory);
        if reply.crc
            && self
                .take_fault(|f| *f == Fault::CorruptResponseChecksum)
                .is_some()
        {
            if let Some(last) = reply.bytes.last_mut() {
                *last ^= 0xFF;
            }
        }
        copy_reply(&reply.bytes, rsp);
        Ok(())
    }

    fn data_buf(&mut self, data: &[u8], flags: DataBufFlags) -> Result<u64, TransportError> {
        self.memory
            .register(data, flags)
            .ok_or(TransportError::new(TRANSPORT_FAULT_CODE))
    }

    fn read_data_buf(&mut self, addr: u64, out: &mut [u8]) -> Result<(), TransportError> {
        if self.memory.read_back(addr, out) {
            Ok(())
        } else {
            Err(TransportError::new(TRANSPORT_FAULT_CODE))
        }
    }

    fn reset_data_bufs(&mut self) {
        self.memory.reset();
    }

    fn configure_shared_buf(&mut self, offset: u32, size: u32) -> Result<(), TransportError> {
        self.memory
            .set_window(offset, size)
            .map_err(|_| TransportError::new(TRANSPORT_FAULT_CODE))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

impl HwModel for ModelEmulated {
    fn init(params: InitParams) -> Result<Self, Box<dyn Error>>
    where
        Self: Sized,
    {
        let (offset, size) = params.shared_buf;
        if size == 0 || usize::from(offset) + usize::from(size) > SEC_RAM_SIZE {
            return Err(format!(
                "shared buffer {offset:#x}+{size:#x} does not fit in secure RAM"
            )
            .into());
        }
        if params.max_handles == 0 {
            return Err("max_handles must be non-zero".into());
        }
        Ok(Self {
            engine: Engine::new(&params),
            memory: SharedMemory::default(),
            faults: Vec::new(),
            command_log: Vec::new(),
            closed: false,
        })
    }

    fn inject_fault(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    fn live_handles(&self) -> usize {
        self.engine.live_handles()
    }

    fn live_services(&self, kind: ServiceKind) -> usize {
        self.engine.live_services(kind)
    }

    fn command_log(&self) -> &[u8] {
        &self.command_log
    }

    fn live_registrations(&self) -> usize {
        self.memory.live_registrations()
    }
}

// Licensed under the Apache-2.0 license

//! Transport double for unit tests: replays scripted responses and records
//! what was sent and registered.

use std::collections::VecDeque;

use crate::transport::{DataBufFlags, Transport, TransportError};

const DMA_BASE: u64 = 0x8000_0000;

enum Step {
    Reply(Vec<u8>),
    /// Fail after scribbling `Vec<u8>` into the response buffer
    Fail(Vec<u8>),
}

pub struct ScriptedTransport {
    steps: VecDeque<Step>,
    pub sent: Vec<Vec<u8>>,
    registrations: Vec<(u64, usize, DataBufFlags)>,
    flags_log: Vec<DataBufFlags>,
    pub resets: usize,
    dma_base: u64,
    next_dma: u64,
    sec_mem_base: u64,
    next_sec_mem: u64,
    /// Byte pattern the fake engine leaves in output buffers
    pub output_fill: u8,
    pub shared_buf: Option<(u32, u32)>,
    pub closed: bool,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::with_sec_mem_base(0x2000_0000)
    }
}

impl ScriptedTransport {
    pub fn with_sec_mem_base(base: u64) -> Self {
        Self {
            steps: VecDeque::new(),
            sent: Vec::new(),
            registrations: Vec::new(),
            flags_log: Vec::new(),
            resets: 0,
            dma_base: DMA_BASE,
            next_dma: DMA_BASE,
            sec_mem_base: base,
            next_sec_mem: base,
            output_fill: 0xA5,
            shared_buf: None,
            closed: false,
        }
    }

    /// Hand out non-secure buffers starting at `base`.
    pub fn with_dma_base(base: u64) -> Self {
        Self {
            dma_base: base,
            next_dma: base,
            ..Self::default()
        }
    }

    pub fn push_reply(&mut self, rsp: &[u8]) {
        self.steps.push_back(Step::Reply(rsp.to_vec()));
    }

    pub fn push_failure(&mut self, garbage: &[u8]) {
        self.steps.push_back(Step::Fail(garbage.to_vec()));
    }

    pub fn registration_flags(&self) -> Vec<DataBufFlags> {
        self.flags_log.clone()
    }

    pub fn live_registrations(&self) -> usize {
        self.registrations.len()
    }
}

impl Transport for ScriptedTransport {
    fn send_and_receive(&mut self, cmd: &[u8], rsp: &mut [u8]) -> Result<(), TransportError> {
        self.sent.push(cmd.to_vec());
        let (bytes, result) = match self.steps.pop_front() {
            Some(Step::Reply(bytes)) => (bytes, Ok(())),
            Some(Step::Fail(bytes)) => (bytes, Err(TransportError::new(-5))),
            None => (Vec::new(), Err(TransportError::new(-1))),
        };
        let len = bytes.len().min(rsp.len());
        rsp[..len].copy_from_slice(&bytes[..len]);
        result
    }

    fn data_buf(&mut self, data: &[u8], flags: DataBufFlags) -> Result<u64, TransportError> {
        let cursor = if flags.contains(DataBufFlags::USE_SEC_MEM) {
            &mut self.next_sec_mem
        } else {
            &mut self.next_dma
        };
        let addr = *cursor;
        *cursor += (data.len() as u64 + 3) & !3;
        self.registrations.push((addr, data.len(), flags));
        self.flags_log.push(flags);
        Ok(addr)
    }

    fn read_data_buf(&mut self, addr: u64, out: &mut [u8]) -> Result<(), TransportError> {
        let known = self
            .registrations
            .iter()
            .any(|(a, len, flags)| {
                *a == addr && *len == out.len() && flags.contains(DataBufFlags::IS_OUTPUT)
            });
        if !known {
            return Err(TransportError::new(-2));
        }
        out.fill(self.output_fill);
        Ok(())
    }

    fn reset_data_bufs(&mut self) {
        self.registrations.clear();
        self.next_dma = self.dma_base;
        self.next_sec_mem = self.sec_mem_base;
        self.resets += 1;
    }

    fn configure_shared_buf(&mut self, offset: u32, size: u32) -> Result<(), TransportError> {
        self.shared_buf = Some((offset, size));
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/*++

Licensed under the Apache-2.0 license.

File Name:

    memory.rs

Abstract:

    Memory the emulated engine shares with its client: a secure RAM whose
    window is granted per session, and a DMA area for everything else.
    Buffers are staged here by registration and the engine may only touch
    registered ranges.

--*/

use hsm_api::transport::SEC_MEM_SHORT_ADDR_MASK;
use hsm_api::DataBufFlags;
use hsm_error::{HsmError, HsmResult};

pub const SEC_RAM_BASE: u64 = 0x2000_0000;
pub const SEC_RAM_SIZE: usize = 0x1_0000;
pub const DMA_BASE: u64 = 0x8000_0000;
pub const DMA_SIZE: usize = 0x1_0000;

struct Region {
    base: u64,
    mem: Vec<u8>,
}

impl Region {
    fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            mem: vec![0; size],
        }
    }

    fn range(&self, addr: u64, len: usize) -> Option<core::ops::Range<usize>> {
        let start = usize::try_from(addr.checked_sub(self.base)?).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.mem.len()).then_some(start..end)
    }
}

#[derive(Clone, Copy, Debug)]
struct Registration {
    addr: u64,
    len: usize,
    flags: DataBufFlags,
}

impl Registration {
    fn covers(&self, addr: u64, len: usize) -> bool {
        addr >= self.addr && addr + len as u64 <= self.addr + self.len as u64
    }
}

pub struct SharedMemory {
    sec_ram: Region,
    dma: Region,
    /// Granted secure-memory window, as engine addresses
    window: Option<(u64, u64)>,
    sec_cursor: u64,
    dma_cursor: u64,
    registrations: Vec<Registration>,
}

impl Default for SharedMemory {
    fn default() -> Self {
        Self {
            sec_ram: Region::new(SEC_RAM_BASE, SEC_RAM_SIZE),
            dma: Region::new(DMA_BASE, DMA_SIZE),
            window: None,
            sec_cursor: 0,
            dma_cursor: DMA_BASE,
            registrations: Vec::new(),
        }
    }
}

fn align4(len: usize) -> u64 {
    ((len as u64) + 3) & !3
}

impl SharedMemory {
    /// Limit secure-memory staging to `size` bytes at `offset` into secure RAM.
    pub fn set_window(&mut self, offset: u32, size: u32) -> Result<(), ()> {
        let start = SEC_RAM_BASE + u64::from(offset);
        let end = start + u64::from(size);
        if size == 0 || self.sec_ram.range(start, size as usize).is_none() {
            return Err(());
        }
        self.window = Some((start, end));
        self.sec_cursor = start;
        Ok(())
    }

    /// Stage `data` and return the engine address it was placed at.
    pub fn register(&mut self, data: &[u8], flags: DataBufFlags) -> Option<u64> {
        let (cursor, limit, region) = if flags.contains(DataBufFlags::USE_SEC_MEM) {
            let (_, end) = self.window?;
            (&mut self.sec_cursor, end, &mut self.sec_ram)
        } else {
            (
                &mut self.dma_cursor,
                DMA_BASE + DMA_SIZE as u64,
                &mut self.dma,
            )
        };
        let addr = *cursor;
        if addr + align4(data.len()) > limit {
            return None;
        }
        if flags.contains(DataBufFlags::SHORT_ADDR)
            && addr & !SEC_MEM_SHORT_ADDR_MASK != SEC_RAM_BASE
        {
            return None;
        }
        let range = region.range(addr, data.len())?;
        region.mem[range].copy_from_slice(data);
        *cursor += align4(data.len());
        self.registrations.push(Registration {
            addr,
            len: data.len(),
            flags,
        });
        Some(addr)
    }

    /// Copy an output registration back to the client.
    pub fn read_back(&self, addr: u64, out: &mut [u8]) -> bool {
        let known = self.registrations.iter().any(|r| {
            r.addr == addr && r.len == out.len() && r.flags.contains(DataBufFlags::IS_OUTPUT)
        });
        if !known {
            return false;
        }
        match self.region(addr).and_then(|r| Some(&r.mem[r.range(addr, out.len())?])) {
            Some(bytes) => {
                out.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.registrations.clear();
        self.dma_cursor = DMA_BASE;
        if let Some((start, _)) = self.window {
            self.sec_cursor = start;
        }
    }

    pub fn live_registrations(&self) -> usize {
        self.registrations.len()
    }

    /// Engine read of `len` bytes at `addr`.
    pub fn load(&self, addr: u64, len: usize) -> HsmResult<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        if !self.registrations.iter().any(|r| r.covers(addr, len)) {
            return Err(HsmError::INVALID_ADDRESS);
        }
        let region = self.region(addr).ok_or(HsmError::INVALID_ADDRESS)?;
        let range = region
            .range(addr, len)
            .ok_or(HsmError::INVALID_ADDRESS)?;
        Ok(region.mem[range].to_vec())
    }

    /// Engine write of `data` at `addr`; the range must be a registered output.
    pub fn store(&mut self, addr: u64, data: &[u8]) -> HsmResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let writable = self
            .registrations
            .iter()
            .any(|r| r.flags.contains(DataBufFlags::IS_OUTPUT) && r.covers(addr, data.len()));
        if !writable {
            return Err(HsmError::INVALID_ADDRESS);
        }
        let region = self.region_mut(addr).ok_or(HsmError::INVALID_ADDRESS)?;
        let range = region
            .range(addr, data.len())
            .ok_or(HsmError::INVALID_ADDRESS)?;
        region.mem[range].copy_from_slice(data);
        Ok(())
    }

    fn region(&self, addr: u64) -> Option<&Region> {
        if addr >= DMA_BASE {
            Some(&self.dma)
        } else if addr >= SEC_RAM_BASE {
            Some(&self.sec_ram)
        } else {
            None
        }
    }

    fn region_mut(&mut self, addr: u64) -> Option<&mut Region> {
        if addr >= DMA_BASE {
            Some(&mut self.dma)
        } else if addr >= SEC_RAM_BASE {
            Some(&mut self.sec_ram)
        } else {
            None
        }
    }
}

/// Secure RAM address of a 16-bit short offset.
pub fn from_short_addr(offset: u16) -> u64 {
    SEC_RAM_BASE | u64::from(offset)
}

/// Engine address of a split (high, low) pair.
pub fn join_addr(high: u32, low: u32) -> u64 {
    (u64::from(high) << 32) | u64::from(low)
}

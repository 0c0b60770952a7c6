/*++

Licensed under the Apache-2.0 license.

File Name:

    transport.rs

Abstract:

    Boundary between the message layer and the message-unit driver: the
    request/response exchange and registration of data buffers the engine
    reads or writes.

--*/

use core::ops::{Deref, DerefMut};

/// Mask giving the 16-bit short form of a secure-memory address.
pub const SEC_MEM_SHORT_ADDR_MASK: u64 = 0xFFFF;

bitflags::bitflags! {
    #[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
    pub struct DataBufFlags : u8 {
        // The engine reads this buffer
        const IS_INPUT = 1 << 0;
        // The engine writes this buffer
        const IS_OUTPUT = 1 << 1;
        // Stage the buffer in the shared secure-memory window
        const USE_SEC_MEM = 1 << 2;
        // The message carries the address in its 16-bit short form
        const SHORT_ADDR = 1 << 3;
    }
}

/// Failure reported by the transport itself.
///
/// The message layer only distinguishes success from failure; the code is
/// carried for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport failure (code {code})")]
pub struct TransportError {
    pub code: i32,
}

impl TransportError {
    pub fn new(code: i32) -> Self {
        Self { code }
    }
}

pub trait Transport {
    /// Send one request and receive exactly one response.
    ///
    /// On error the contents of `rsp` are unspecified and must not be
    /// interpreted.
    fn send_and_receive(&mut self, cmd: &[u8], rsp: &mut [u8]) -> Result<(), TransportError>;

    /// Make `data` visible to the engine and return the address the engine
    /// should use for it.
    ///
    /// For output buffers the current contents are staged too; the engine's
    /// result is copied back with [`Transport::read_data_buf`].
    fn data_buf(&mut self, data: &[u8], flags: DataBufFlags) -> Result<u64, TransportError>;

    /// Copy `out.len()` bytes the engine wrote at `addr` back into `out`.
    fn read_data_buf(&mut self, addr: u64, out: &mut [u8]) -> Result<(), TransportError>;

    /// Drop every registration made since the previous reset.
    fn reset_data_bufs(&mut self);

    /// Configure the secure-memory window the engine granted to the session.
    fn configure_shared_buf(&mut self, offset: u32, size: u32) -> Result<(), TransportError>;

    /// Release the underlying channel. Called once, when the owning session
    /// is torn down.
    fn close(&mut self) {}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_and_receive(&mut self, cmd: &[u8], rsp: &mut [u8]) -> Result<(), TransportError> {
        (**self).send_and_receive(cmd, rsp)
    }
    fn data_buf(&mut self, data: &[u8], flags: DataBufFlags) -> Result<u64, TransportError> {
        (**self).data_buf(data, flags)
    }
    fn read_data_buf(&mut self, addr: u64, out: &mut [u8]) -> Result<(), TransportError> {
        (**self).read_data_buf(addr, out)
    }
    fn reset_data_bufs(&mut self) {
        (**self).reset_data_bufs()
    }
    fn configure_shared_buf(&mut self, offset: u32, size: u32) -> Result<(), TransportError> {
        (**self).configure_shared_buf(offset, size)
    }
    fn close(&mut self) {
        (**self).close()
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_and_receive(&mut self, cmd: &[u8], rsp: &mut [u8]) -> Result<(), TransportError> {
        (**self).send_and_receive(cmd, rsp)
    }
    fn data_buf(&mut self, data: &[u8], flags: DataBufFlags) -> Result<u64, TransportError> {
        (**self).data_buf(data, flags)
    }
    fn read_data_buf(&mut self, addr: u64, out: &mut [u8]) -> Result<(), TransportError> {
        (**self).read_data_buf(addr, out)
    }
    fn reset_data_bufs(&mut self) {
        (**self).reset_data_bufs()
    }
    fn configure_shared_buf(&mut self, offset: u32, size: u32) -> Result<(), TransportError> {
        (**self).configure_shared_buf(offset, size)
    }
    // A borrowed transport stays open; its owner closes it.
    fn close(&mut self) {}
}

/// Data buffer registrations valid for a single round trip.
///
/// Every registration made through the scope is dropped when the scope is,
/// whether the round trip succeeded or not.
pub struct DataBufScope<'t> {
    transport: &'t mut dyn Transport,
}

impl<'t> DataBufScope<'t> {
    pub fn new(transport: &'t mut dyn Transport) -> Self {
        Self { transport }
    }
}

impl<'t> Deref for DataBufScope<'t> {
    type Target = dyn Transport + 't;
    fn deref(&self) -> &Self::Target {
        &*self.transport
    }
}

impl<'t> DerefMut for DataBufScope<'t> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.transport
    }
}

impl Drop for DataBufScope<'_> {
    fn drop(&mut self) {
        self.transport.reset_data_bufs();
    }
}

/// Split a 64-bit engine address into its (high, low) message fields.
pub fn split_addr(addr: u64) -> (u32, u32) {
    ((addr >> 32) as u32, addr as u32)
}

/// 16-bit short form of a secure-memory address.
pub fn short_addr(addr: u64) -> u16 {
    (addr & SEC_MEM_SHORT_ADDR_MASK) as u16
}

/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    Message catalog: wire layouts, argument types, and the prepare/process
    pair for every request the client can send.

--*/

#[macro_use]
mod macros;

pub mod cipher;
pub mod hash;
pub mod key_mgmt;
pub mod key_store;
pub mod mac;
pub mod rng;
pub mod session;
pub mod she;
pub mod sign_gen;
pub mod verify_sign;

use core::mem::size_of;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::checksum::verify_trailing_checksum;
use crate::transport::{DataBufFlags, Transport};
use crate::{HsmApiError, HsmApiResult};

pub use cipher::CipherOneGoArgs;
pub use hash::HashOneGoArgs;
pub use key_mgmt::{DeleteKeyArgs, ImportKeyArgs, KeyGenerateArgs, ManageKeyArgs};
pub use key_store::KeyStoreOpenArgs;
pub use mac::MacOneGoArgs;
pub use rng::GetRandomArgs;
pub use session::{SessionOpenArgs, SharedBufArgs};
pub use she::{
    SheExtendSeedArgs, SheGenerateMacArgs, SheGetIdArgs, SheGetStatusArgs, SheRndArgs,
    SheVerifyMacArgs,
};
pub use sign_gen::{PrepareSignArgs, SignGenerateArgs, SignatureScheme};
pub use verify_sign::VerifySignArgs;

/// Largest request or response the catalog produces, in bytes.
pub const MAX_MSG_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MsgId(pub u8);

impl MsgId {
    pub const SESSION_OPEN: Self = Self(0x10);
    pub const SESSION_CLOSE: Self = Self(0x11);
    pub const SHARED_BUF: Self = Self(0x12);

    pub const KEY_STORE_OPEN: Self = Self(0x30);
    pub const KEY_STORE_CLOSE: Self = Self(0x31);

    pub const KEY_MANAGEMENT_OPEN: Self = Self(0x40);
    pub const KEY_MANAGEMENT_CLOSE: Self = Self(0x41);
    pub const KEY_GENERATE: Self = Self(0x42);
    pub const MANAGE_KEY: Self = Self(0x43);
    pub const IMPORT_KEY: Self = Self(0x44);
    pub const DELETE_KEY: Self = Self(0x45);
    pub const KEY_GENERATE_EXT: Self = Self(0x46);

    pub const MAC_OPEN: Self = Self(0x50);
    pub const MAC_CLOSE: Self = Self(0x51);
    pub const MAC_ONE_GO: Self = Self(0x52);

    pub const CIPHER_OPEN: Self = Self(0x60);
    pub const CIPHER_CLOSE: Self = Self(0x61);
    pub const CIPHER_ONE_GO: Self = Self(0x62);

    pub const SIGN_GEN_OPEN: Self = Self(0x70);
    pub const SIGN_GEN_CLOSE: Self = Self(0x71);
    pub const SIGN_GENERATE: Self = Self(0x72);
    pub const SIGN_PREPARE: Self = Self(0x73);

    pub const VERIFY_SIGN_OPEN: Self = Self(0x80);
    pub const VERIFY_SIGN_CLOSE: Self = Self(0x81);
    pub const VERIFY_SIGN: Self = Self(0x82);

    pub const HASH_OPEN: Self = Self(0xA0);
    pub const HASH_CLOSE: Self = Self(0xA1);
    pub const HASH_ONE_GO: Self = Self(0xA2);

    pub const GET_RANDOM: Self = Self(0xCD);

    pub const SHE_GENERATE_MAC: Self = Self(0xE0);
    pub const SHE_VERIFY_MAC: Self = Self(0xE1);
    pub const SHE_INIT_RNG: Self = Self(0xE2);
    pub const SHE_EXTEND_SEED: Self = Self(0xE3);
    pub const SHE_RND: Self = Self(0xE4);
    pub const SHE_GET_STATUS: Self = Self(0xE5);
    pub const SHE_GET_ID: Self = Self(0xE6);
}

impl From<MsgId> for u8 {
    fn from(id: MsgId) -> Self {
        id.0
    }
}

/// Message-unit header that starts every request and response.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct MuHdr {
    pub ver: u8,
    /// Message size in 32-bit words, header included
    pub size: u8,
    pub command: u8,
    pub tag: u8,
}

/// Header values a message unit expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuParams {
    pub version: u8,
    pub cmd_tag: u8,
    pub rsp_tag: u8,
}

impl Default for MuParams {
    fn default() -> Self {
        Self {
            version: 0x06,
            cmd_tag: 0x17,
            rsp_tag: 0xE1,
        }
    }
}

/// Firmware message layout generation.
///
/// Only a few requests differ between the two; see [`sign_gen`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MessageFlavor {
    #[default]
    Legacy,
    Psa,
}

/// Response carrying nothing but the response code.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct StatusRsp {
    pub hdr: MuHdr,
    pub rsp_code: u32,
}
impl Response for StatusRsp {}

pub trait Request: IntoBytes + FromBytes + Immutable + KnownLayout {
    const ID: MsgId;
    /// The trailing word is a checksum over the rest of the message
    const CRC: bool = false;
    type Resp: Response;
}

pub trait Response: IntoBytes + FromBytes + Immutable + KnownLayout
where
    Self: Sized,
{
    /// The engine protects this response with a trailing checksum
    const CRC: bool = false;
}

/// Result of preparing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prepared {
    pub cmd_size: usize,
    pub rsp_size: usize,
    /// Checksum must be populated before sending
    pub crc: bool,
    /// Engine address of the operation's output buffer
    pub output: Option<u64>,
}

impl Prepared {
    pub fn with_output(self, output: Option<u64>) -> Self {
        Self { output, ..self }
    }
}

/// What a prepare function can see besides its arguments.
pub struct PrepareCtx<'t> {
    pub transport: &'t mut dyn Transport,
    pub msg_id: MsgId,
    /// Handle of the session or service the request is addressed to
    pub msg_hdl: u32,
    pub flavor: MessageFlavor,
}

impl PrepareCtx<'_> {
    /// Register `buf` with the transport for this round trip.
    ///
    /// Empty buffers are never registered and yield `None`.
    pub fn register_buf(&mut self, buf: &[u8], flags: DataBufFlags) -> HsmApiResult<Option<u64>> {
        if buf.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.transport.data_buf(buf, flags)?))
    }

    /// Wire address of `buf`; empty buffers are addressed as 0.
    pub fn data_buf(&mut self, buf: &[u8], flags: DataBufFlags) -> HsmApiResult<u64> {
        Ok(self.register_buf(buf, flags)?.unwrap_or(0))
    }
}

pub type PrepareFn =
    fn(&mut PrepareCtx<'_>, &mut MsgArgs<'_>, &mut [u8]) -> HsmApiResult<Prepared>;
pub type ProcessRspFn = fn(&[u8], &mut MsgArgs<'_>, MessageFlavor) -> HsmApiResult<()>;

/// Arguments and results of one request.
///
/// Each variant belongs to one or more message ids; a prepare function given
/// a variant it does not handle fails validation.
#[derive(Debug)]
pub enum MsgArgs<'a> {
    SessionOpen(SessionOpenArgs),
    SharedBuf(SharedBufArgs),
    KeyStoreOpen(KeyStoreOpenArgs),
    /// Opening any service on a parent handle
    Open(OpenArgs),
    /// Closing the handle in the request context
    Close,
    KeyGenerate(KeyGenerateArgs<'a>),
    ImportKey(ImportKeyArgs<'a>),
    DeleteKey(DeleteKeyArgs),
    ManageKey(ManageKeyArgs<'a>),
    MacOneGo(MacOneGoArgs<'a>),
    CipherOneGo(CipherOneGoArgs<'a>),
    HashOneGo(HashOneGoArgs<'a>),
    SignGenerate(SignGenerateArgs<'a>),
    PrepareSign(PrepareSignArgs),
    VerifySign(VerifySignArgs<'a>),
    GetRandom(GetRandomArgs<'a>),
    SheGenerateMac(SheGenerateMacArgs<'a>),
    SheVerifyMac(SheVerifyMacArgs<'a>),
    SheInitRng,
    SheExtendSeed(SheExtendSeedArgs<'a>),
    SheRnd(SheRndArgs<'a>),
    SheGetStatus(SheGetStatusArgs),
    SheGetId(SheGetIdArgs<'a>),
}

impl MsgArgs<'_> {
    /// The buffer the engine writes results into, if the operation has one.
    pub fn output_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Self::KeyGenerate(a) => Some(&mut *a.out_key),
            Self::MacOneGo(a) => Some(&mut *a.mac),
            Self::CipherOneGo(a) => Some(&mut *a.output),
            Self::HashOneGo(a) => Some(&mut *a.output),
            Self::SignGenerate(a) => Some(&mut *a.signature),
            Self::GetRandom(a) => Some(&mut *a.output),
            Self::SheGenerateMac(a) => Some(&mut *a.mac),
            Self::SheRnd(a) => Some(&mut *a.rnd),
            Self::SheGetId(a) => Some(&mut *a.mac),
            _ => None,
        }
    }
}

/// Arguments shared by every service open request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OpenArgs {
    pub flags: u8,
    /// Engine handle of the opened service, set on success
    pub handle: u32,
}

pub(crate) fn arg_mismatch() -> HsmApiError {
    HsmApiError::Validation("arguments do not match message")
}

/// Serialize `req` into `cmd` and describe the exchange.
pub(crate) fn encode<R: Request>(cmd: &mut [u8], req: &R) -> HsmApiResult<Prepared> {
    req.write_to_prefix(cmd)
        .map_err(|_| HsmApiError::Validation("request does not fit message buffer"))?;
    Ok(Prepared {
        cmd_size: size_of::<R>(),
        rsp_size: size_of::<R::Resp>(),
        crc: R::CRC,
        output: None,
    })
}

/// Parse a response, checking its trailing checksum when it carries one.
pub(crate) fn decode<R: Response>(rsp: &[u8]) -> HsmApiResult<R> {
    let bytes = rsp
        .get(..size_of::<R>())
        .ok_or(HsmApiError::Validation("response shorter than its layout"))?;
    if R::CRC {
        verify_trailing_checksum(bytes)
            .map_err(|(expected, actual)| HsmApiError::IntegrityFailure { expected, actual })?;
    }
    R::read_from_bytes(bytes).map_err(|_| HsmApiError::Validation("response layout mismatch"))
}

pub(crate) fn len_u16(buf: &[u8], what: &'static str) -> HsmApiResult<u16> {
    u16::try_from(buf.len()).map_err(|_| HsmApiError::Validation(what))
}

pub(crate) fn len_u32(buf: &[u8], what: &'static str) -> HsmApiResult<u32> {
    u32::try_from(buf.len()).map_err(|_| HsmApiError::Validation(what))
}

/// Low 32 bits of an engine address, as embedded in most requests.
pub(crate) fn addr32(addr: u64) -> u32 {
    addr as u32
}

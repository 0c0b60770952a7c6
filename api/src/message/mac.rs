// Licensed under the Apache-2.0 license

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{
    addr32, arg_mismatch, decode, encode, len_u16, MessageFlavor, MsgArgs, MsgId, MuHdr,
    PrepareCtx, Prepared, Request, Response,
};
use crate::transport::DataBufFlags;
use crate::HsmApiResult;

define_service_messages! {
    open: MacOpenReq(MsgId::MAC_OPEN, key_store_handle) -> MacOpenRsp(mac_handle),
    close: MacCloseReq(MsgId::MAC_CLOSE),
}

pub const MAC_ONE_GO_FLAGS_VERIFICATION: u8 = 0x00;
pub const MAC_ONE_GO_FLAGS_GENERATION: u8 = 0x01;

/// Status the engine reports when a MAC verification succeeds.
pub const MAC_VERIFICATION_STATUS_SUCCESS: u32 = 0x6C1A_A1C6;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAlgorithm(pub u8);

impl MacAlgorithm {
    pub const AES_CMAC: Self = Self(0x01);
    pub const HMAC_SHA_224: Self = Self(0x05);
    pub const HMAC_SHA_256: Self = Self(0x06);
    pub const HMAC_SHA_384: Self = Self(0x07);
    pub const HMAC_SHA_512: Self = Self(0x08);
}

#[derive(Debug, Default)]
pub struct MacOneGoArgs<'a> {
    pub key_id: u32,
    pub payload: &'a [u8],
    /// Written on generation, read on verification
    pub mac: &'a mut [u8],
    pub flags: u8,
    pub algorithm: MacAlgorithm,
    /// Set on success
    pub verification_status: u32,
}

impl MacOneGoArgs<'_> {
    pub fn is_generation(&self) -> bool {
        self.flags & MAC_ONE_GO_FLAGS_GENERATION != 0
    }
}

// MAC_ONE_GO
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct MacOneGoReq {
    pub hdr: MuHdr,
    pub mac_handle: u32,
    pub key_id: u32,
    pub payload_address: u32,
    pub mac_address: u32,
    pub payload_size: u16,
    pub mac_size: u16,
    pub flags: u8,
    pub algorithm: u8,
    pub reserved: u16,
    pub crc: u32,
}
impl Request for MacOneGoReq {
    const ID: MsgId = MsgId::MAC_ONE_GO;
    const CRC: bool = true;
    type Resp = MacOneGoRsp;
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct MacOneGoRsp {
    pub hdr: MuHdr,
    pub rsp_code: u32,
    pub verification_status: u32,
}
impl Response for MacOneGoRsp {}

pub(crate) fn prepare_mac_one_go(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::MacOneGo(args) = args else {
        return Err(arg_mismatch());
    };
    let payload_size = len_u16(args.payload, "MAC payload too large")?;
    let mac_size = len_u16(args.mac, "MAC buffer too large")?;
    let generation = args.is_generation();

    let payload_address = ctx.data_buf(args.payload, DataBufFlags::IS_INPUT)?;
    let mac_flags = if generation {
        DataBufFlags::IS_OUTPUT
    } else {
        DataBufFlags::IS_INPUT
    };
    let mac = ctx.register_buf(args.mac, mac_flags)?;

    let prepared = encode(
        cmd,
        &MacOneGoReq {
            mac_handle: ctx.msg_hdl,
            key_id: args.key_id,
            payload_address: addr32(payload_address),
            mac_address: addr32(mac.unwrap_or(0)),
            payload_size,
            mac_size,
            flags: args.flags,
            algorithm: args.algorithm.0,
            ..Default::default()
        },
    )?;
    Ok(if generation {
        prepared.with_output(mac)
    } else {
        prepared
    })
}

pub(crate) fn proc_rsp_mac_one_go(
    rsp: &[u8],
    args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    let MsgArgs::MacOneGo(args) = args else {
        return Err(arg_mismatch());
    };
    args.verification_status = decode::<MacOneGoRsp>(rsp)?.verification_status;
    Ok(())
}

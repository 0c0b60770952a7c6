// Licensed under the Apache-2.0 license

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{
    arg_mismatch, decode, encode, MessageFlavor, MsgArgs, MsgId, MuHdr, PrepareCtx, Prepared,
    Request, Response, StatusRsp,
};
use crate::HsmApiResult;

/// Load an existing key store.
pub const KEY_STORE_FLAGS_LOAD: u8 = 0x00;
/// Create the key store if it does not exist.
pub const KEY_STORE_FLAGS_CREATE: u8 = 0x01;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeyStoreOpenArgs {
    pub key_store_id: u32,
    pub password: u32,
    pub flags: u8,
    /// Set on success
    pub key_store_handle: u32,
}

// KEY_STORE_OPEN
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct KeyStoreOpenReq {
    pub hdr: MuHdr,
    pub session_handle: u32,
    pub key_store_id: u32,
    pub password: u32,
    pub input_address_ext: u32,
    pub output_address_ext: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
    pub crc: u32,
}
impl Request for KeyStoreOpenReq {
    const ID: MsgId = MsgId::KEY_STORE_OPEN;
    const CRC: bool = true;
    type Resp = KeyStoreOpenRsp;
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct KeyStoreOpenRsp {
    pub hdr: MuHdr,
    pub rsp_code: u32,
    pub key_store_handle: u32,
}
impl Response for KeyStoreOpenRsp {}

// KEY_STORE_CLOSE
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct KeyStoreCloseReq {
    pub hdr: MuHdr,
    pub key_store_handle: u32,
}
impl Request for KeyStoreCloseReq {
    const ID: MsgId = MsgId::KEY_STORE_CLOSE;
    type Resp = StatusRsp;
}

pub(crate) fn prepare_key_store_open(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::KeyStoreOpen(args) = args else {
        return Err(arg_mismatch());
    };
    encode(
        cmd,
        &KeyStoreOpenReq {
            session_handle: ctx.msg_hdl,
            key_store_id: args.key_store_id,
            password: args.password,
            flags: args.flags,
            ..Default::default()
        },
    )
}

pub(crate) fn proc_rsp_key_store_open(
    rsp: &[u8],
    args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    let MsgArgs::KeyStoreOpen(args) = args else {
        return Err(arg_mismatch());
    };
    args.key_store_handle = decode::<KeyStoreOpenRsp>(rsp)?.key_store_handle;
    Ok(())
}

pub(crate) fn prepare_key_store_close(
    ctx: &mut PrepareCtx<'_>,
    _args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    encode(
        cmd,
        &KeyStoreCloseReq {
            key_store_handle: ctx.msg_hdl,
            ..Default::default()
        },
    )
}

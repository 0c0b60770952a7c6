// Licensed under the Apache-2.0 license

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{
    addr32, arg_mismatch, decode, encode, len_u16, len_u32, MessageFlavor, MsgArgs, MsgId, MuHdr,
    PrepareCtx, Prepared, Request, Response, SignatureScheme,
};
use crate::transport::DataBufFlags;
use crate::HsmApiResult;

define_service_messages! {
    open: VerifySignOpenReq(MsgId::VERIFY_SIGN_OPEN, session_handle) -> VerifySignOpenRsp(sig_ver_hdl),
    close: VerifySignCloseReq(MsgId::VERIFY_SIGN_CLOSE),
}

pub const VERIFY_SIGN_FLAGS_INPUT_DIGEST: u8 = 0x00;
pub const VERIFY_SIGN_FLAGS_INPUT_MESSAGE: u8 = 0x01;

/// Status the engine reports when a signature verifies.
pub const VERIFICATION_STATUS_SUCCESS: u32 = 0x5A3C_C3A5;

#[derive(Debug, Default)]
pub struct VerifySignArgs<'a> {
    /// Uncompressed public key, `x || y`
    pub key: &'a [u8],
    pub message: &'a [u8],
    pub signature: &'a [u8],
    pub scheme: SignatureScheme,
    pub flags: u8,
    /// Set on success
    pub verification_status: u32,
}

// VERIFY_SIGN
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct VerifySignReq {
    pub hdr: MuHdr,
    pub sig_ver_hdl: u32,
    pub key_address: u32,
    pub message_address: u32,
    pub signature_address: u32,
    pub key_size: u16,
    pub signature_size: u16,
    pub message_size: u32,
    pub scheme_id: u8,
    pub flags: u8,
    pub reserved: u16,
    pub crc: u32,
}
impl Request for VerifySignReq {
    const ID: MsgId = MsgId::VERIFY_SIGN;
    const CRC: bool = true;
    type Resp = VerifySignRsp;
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct VerifySignRsp {
    pub hdr: MuHdr,
    pub rsp_code: u32,
    pub verification_status: u32,
}
impl Response for VerifySignRsp {}

pub(crate) fn prepare_verify_sign(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::VerifySign(args) = args else {
        return Err(arg_mismatch());
    };
    let key_size = len_u16(args.key, "public key too large")?;
    let signature_size = len_u16(args.signature, "signature too large")?;
    let message_size = len_u32(args.message, "message too large")?;

    let key_address = ctx.data_buf(args.key, DataBufFlags::IS_INPUT)?;
    let message_address = ctx.data_buf(args.message, DataBufFlags::IS_INPUT)?;
    let signature_address = ctx.data_buf(args.signature, DataBufFlags::IS_INPUT)?;

    encode(
        cmd,
        &VerifySignReq {
            sig_ver_hdl: ctx.msg_hdl,
            key_address: addr32(key_address),
            message_address: addr32(message_address),
            signature_address: addr32(signature_address),
            key_size,
            signature_size,
            message_size,
            scheme_id: args.scheme.legacy_id(),
            flags: args.flags,
            ..Default::default()
        },
    )
}

pub(crate) fn proc_rsp_verify_sign(
    rsp: &[u8],
    args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    let MsgArgs::VerifySign(args) = args else {
        return Err(arg_mismatch());
    };
    args.verification_status = decode::<VerifySignRsp>(rsp)?.verification_status;
    Ok(())
}

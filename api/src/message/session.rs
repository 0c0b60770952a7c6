// Licensed under the Apache-2.0 license

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{
    arg_mismatch, decode, encode, MessageFlavor, MsgArgs, MsgId, MuHdr, PrepareCtx, Prepared,
    Request, Response, StatusRsp,
};
use crate::HsmApiResult;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionOpenArgs {
    pub mu_id: u8,
    pub interrupt_idx: u8,
    pub tz: u8,
    pub did: u8,
    pub priority: u8,
    pub operating_mode: u8,
    /// Set on success
    pub session_handle: u32,
}

/// Secure-memory window granted to the session, set on success.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SharedBufArgs {
    pub offset: u16,
    pub size: u16,
}

// SESSION_OPEN
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SessionOpenReq {
    pub hdr: MuHdr,
    pub mu_id: u8,
    pub interrupt_idx: u8,
    pub tz: u8,
    pub did: u8,
    pub priority: u8,
    pub operating_mode: u8,
    pub reserved: u16,
}
impl Request for SessionOpenReq {
    const ID: MsgId = MsgId::SESSION_OPEN;
    type Resp = SessionOpenRsp;
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SessionOpenRsp {
    pub hdr: MuHdr,
    pub rsp_code: u32,
    pub session_handle: u32,
}
impl Response for SessionOpenRsp {}

// SESSION_CLOSE
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SessionCloseReq {
    pub hdr: MuHdr,
    pub session_handle: u32,
}
impl Request for SessionCloseReq {
    const ID: MsgId = MsgId::SESSION_CLOSE;
    type Resp = StatusRsp;
}

// SHARED_BUF
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SharedBufReq {
    pub hdr: MuHdr,
    pub session_handle: u32,
}
impl Request for SharedBufReq {
    const ID: MsgId = MsgId::SHARED_BUF;
    type Resp = SharedBufRsp;
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SharedBufRsp {
    pub hdr: MuHdr,
    pub rsp_code: u32,
    pub shared_buf_offset: u16,
    pub shared_buf_size: u16,
}
impl Response for SharedBufRsp {}

pub(crate) fn prepare_session_open(
    _ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::SessionOpen(args) = args else {
        return Err(arg_mismatch());
    };
    encode(
        cmd,
        &SessionOpenReq {
            mu_id: args.mu_id,
            interrupt_idx: args.interrupt_idx,
            tz: args.tz,
            did: args.did,
            priority: args.priority,
            operating_mode: args.operating_mode,
            ..Default::default()
        },
    )
}

pub(crate) fn proc_rsp_session_open(
    rsp: &[u8],
    args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    let MsgArgs::SessionOpen(args) = args else {
        return Err(arg_mismatch());
    };
    args.session_handle = decode::<SessionOpenRsp>(rsp)?.session_handle;
    Ok(())
}

pub(crate) fn prepare_session_close(
    ctx: &mut PrepareCtx<'_>,
    _args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    encode(
        cmd,
        &SessionCloseReq {
            session_handle: ctx.msg_hdl,
            ..Default::default()
        },
    )
}

/// Response handler for requests whose response carries only a status.
pub(crate) fn proc_rsp_status_only(
    _rsp: &[u8],
    _args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    Ok(())
}

pub(crate) fn prepare_shared_buf(
    ctx: &mut PrepareCtx<'_>,
    _args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    encode(
        cmd,
        &SharedBufReq {
            session_handle: ctx.msg_hdl,
            ..Default::default()
        },
    )
}

pub(crate) fn proc_rsp_shared_buf(
    rsp: &[u8],
    args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    let MsgArgs::SharedBuf(args) = args else {
        return Err(arg_mismatch());
    };
    let rsp = decode::<SharedBufRsp>(rsp)?;
    args.offset = rsp.shared_buf_offset;
    args.size = rsp.shared_buf_size;
    Ok(())
}

// Licensed under the Apache-2.0 license

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{
    addr32, arg_mismatch, encode, len_u32, MsgArgs, MsgId, MuHdr, PrepareCtx, Prepared, Request,
    StatusRsp,
};
use crate::transport::DataBufFlags;
use crate::HsmApiResult;

#[derive(Debug, Default)]
pub struct GetRandomArgs<'a> {
    pub output: &'a mut [u8],
}

// GET_RANDOM
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct GetRandomReq {
    pub hdr: MuHdr,
    pub session_handle: u32,
    pub output_addr: u32,
    pub random_size: u32,
}
impl Request for GetRandomReq {
    const ID: MsgId = MsgId::GET_RANDOM;
    type Resp = StatusRsp;
}

pub(crate) fn prepare_get_random(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::GetRandom(args) = args else {
        return Err(arg_mismatch());
    };
    let random_size = len_u32(args.output, "random buffer too large")?;
    let output = ctx.register_buf(args.output, DataBufFlags::IS_OUTPUT)?;
    let prepared = encode(
        cmd,
        &GetRandomReq {
            session_handle: ctx.msg_hdl,
            output_addr: addr32(output.unwrap_or(0)),
            random_size,
            ..Default::default()
        },
    )?;
    Ok(prepared.with_output(output))
}

// Licensed under the Apache-2.0 license

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{
    addr32, arg_mismatch, encode, len_u32, MsgArgs, MsgId, MuHdr, PrepareCtx, Prepared, Request,
    StatusRsp,
};
use crate::transport::DataBufFlags;
use crate::HsmApiResult;

define_service_messages! {
    open: HashOpenReq(MsgId::HASH_OPEN, session_handle) -> HashOpenRsp(hash_hdl),
    close: HashCloseReq(MsgId::HASH_CLOSE),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashAlgo(pub u8);

impl HashAlgo {
    pub const SHA_224: Self = Self(0x00);
    pub const SHA_256: Self = Self(0x01);
    pub const SHA_384: Self = Self(0x02);
    pub const SHA_512: Self = Self(0x03);

    pub fn digest_size(&self) -> Option<usize> {
        match *self {
            Self::SHA_224 => Some(28),
            Self::SHA_256 => Some(32),
            Self::SHA_384 => Some(48),
            Self::SHA_512 => Some(64),
            _ => None,
        }
    }
}

pub const HASH_FLAGS_ONE_SHOT: u8 = 0x01;

#[derive(Debug, Default)]
pub struct HashOneGoArgs<'a> {
    pub input: &'a [u8],
    pub output: &'a mut [u8],
    pub algo: HashAlgo,
    pub flags: u8,
}

// HASH_ONE_GO
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct HashOneGoReq {
    pub hdr: MuHdr,
    pub hash_hdl: u32,
    pub input_addr: u32,
    pub output_addr: u32,
    pub input_size: u32,
    pub output_size: u32,
    pub algo: u8,
    pub flags: u8,
    pub reserved: u16,
    pub crc: u32,
}
impl Request for HashOneGoReq {
    const ID: MsgId = MsgId::HASH_ONE_GO;
    const CRC: bool = true;
    type Resp = StatusRsp;
}

pub(crate) fn prepare_hash_one_go(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::HashOneGo(args) = args else {
        return Err(arg_mismatch());
    };
    let input_size = len_u32(args.input, "hash input too large")?;
    let output_size = len_u32(args.output, "hash output too large")?;
    let input_addr = ctx.data_buf(args.input, DataBufFlags::IS_INPUT)?;
    let output = ctx.register_buf(args.output, DataBufFlags::IS_OUTPUT)?;

    let prepared = encode(
        cmd,
        &HashOneGoReq {
            hash_hdl: ctx.msg_hdl,
            input_addr: addr32(input_addr),
            output_addr: addr32(output.unwrap_or(0)),
            input_size,
            output_size,
            algo: args.algo.0,
            flags: args.flags,
            ..Default::default()
        },
    )?;
    Ok(prepared.with_output(output))
}

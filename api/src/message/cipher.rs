// Licensed under the Apache-2.0 license

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{
    addr32, arg_mismatch, decode, encode, len_u16, len_u32, MessageFlavor, MsgArgs, MsgId, MuHdr,
    PrepareCtx, Prepared, Request, Response,
};
use crate::transport::DataBufFlags;
use crate::HsmApiResult;

define_service_messages! {
    open: CipherOpenReq(MsgId::CIPHER_OPEN, key_store_handle) -> CipherOpenRsp(cipher_handle),
    close: CipherCloseReq(MsgId::CIPHER_CLOSE),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherAlgo(pub u8);

impl CipherAlgo {
    pub const AES_ECB: Self = Self(0x00);
    pub const AES_CBC: Self = Self(0x01);
}

pub const CIPHER_ONE_GO_FLAGS_DECRYPT: u8 = 0x00;
pub const CIPHER_ONE_GO_FLAGS_ENCRYPT: u8 = 0x01;

#[derive(Debug, Default)]
pub struct CipherOneGoArgs<'a> {
    pub key_id: u32,
    /// Empty for modes without an IV
    pub iv: &'a [u8],
    pub input: &'a [u8],
    pub output: &'a mut [u8],
    pub algo: CipherAlgo,
    pub flags: u8,
    /// Stage every buffer in the session's secure-memory window
    pub sec_mem: bool,
    /// Bytes the engine wrote, set on success
    pub output_size: u32,
}

// CIPHER_ONE_GO
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct CipherOneGoReq {
    pub hdr: MuHdr,
    pub cipher_handle: u32,
    pub key_id: u32,
    pub iv_address: u32,
    pub iv_size: u16,
    pub algo: u8,
    pub flags: u8,
    pub input_address: u32,
    pub output_address: u32,
    pub input_size: u32,
    pub output_size: u32,
    pub crc: u32,
}
impl Request for CipherOneGoReq {
    const ID: MsgId = MsgId::CIPHER_ONE_GO;
    const CRC: bool = true;
    type Resp = CipherOneGoRsp;
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct CipherOneGoRsp {
    pub hdr: MuHdr,
    pub rsp_code: u32,
    pub output_size: u32,
}
impl Response for CipherOneGoRsp {}

pub(crate) fn prepare_cipher_one_go(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::CipherOneGo(args) = args else {
        return Err(arg_mismatch());
    };
    let iv_size = len_u16(args.iv, "IV too large")?;
    let input_size = len_u32(args.input, "cipher input too large")?;
    let output_size = len_u32(args.output, "cipher output too large")?;

    let placement = if args.sec_mem {
        DataBufFlags::USE_SEC_MEM
    } else {
        DataBufFlags::empty()
    };
    let iv_address = ctx.data_buf(args.iv, DataBufFlags::IS_INPUT | placement)?;
    let input_address = ctx.data_buf(args.input, DataBufFlags::IS_INPUT | placement)?;
    let output = ctx.register_buf(args.output, DataBufFlags::IS_OUTPUT | placement)?;

    let prepared = encode(
        cmd,
        &CipherOneGoReq {
            cipher_handle: ctx.msg_hdl,
            key_id: args.key_id,
            iv_address: addr32(iv_address),
            iv_size,
            algo: args.algo.0,
            flags: args.flags,
            input_address: addr32(input_address),
            output_address: addr32(output.unwrap_or(0)),
            input_size,
            output_size,
            ..Default::default()
        },
    )?;
    Ok(prepared.with_output(output))
}

pub(crate) fn proc_rsp_cipher_one_go(
    rsp: &[u8],
    args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    let MsgArgs::CipherOneGo(args) = args else {
        return Err(arg_mismatch());
    };
    args.output_size = decode::<CipherOneGoRsp>(rsp)?.output_size;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts() {
        assert_eq!(core::mem::size_of::<CipherOpenReq>(), 24);
        assert_eq!(core::mem::size_of::<CipherCloseReq>(), 8);
        assert_eq!(core::mem::size_of::<CipherOneGoReq>(), 40);
    }
}

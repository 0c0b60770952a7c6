/*++

Licensed under the Apache-2.0 license.

File Name:

    she.rs

Abstract:

    Secure Hardware Extension command set. MAC requests address their
    buffers with 16-bit offsets into the session's secure-memory window;
    seed and random requests use split 64-bit addresses.

--*/

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{
    addr32, arg_mismatch, decode, encode, len_u16, len_u32, MessageFlavor, MsgArgs, MsgId, MuHdr,
    PrepareCtx, Prepared, Request, Response, StatusRsp,
};
use crate::transport::{short_addr, split_addr, DataBufFlags};
use crate::{HsmApiError, HsmApiResult};

pub const SHE_MAC_SIZE: usize = 16;
pub const SHE_CHALLENGE_SIZE: usize = 16;
pub const SHE_ID_SIZE: usize = 15;
pub const SHE_ENTROPY_SIZE: usize = 16;
pub const SHE_RND_SIZE: usize = 16;

/// Verification status the engine reports for a matching MAC.
pub const SHE_MAC_VERIFICATION_SUCCESS: u32 = 0;

/// Combine a key bank selector with a key slot.
pub fn she_key_id(key_ext: u8, key_id: u8) -> u16 {
    u16::from(key_ext) | u16::from(key_id)
}

#[derive(Debug, Default)]
pub struct SheGenerateMacArgs<'a> {
    pub key_ext: u8,
    pub key_id: u8,
    pub message: &'a [u8],
    pub mac: &'a mut [u8],
}

#[derive(Debug, Default)]
pub struct SheVerifyMacArgs<'a> {
    pub key_ext: u8,
    pub key_id: u8,
    pub message: &'a [u8],
    pub mac: &'a [u8],
    /// Number of MAC bytes to compare
    pub mac_length: u8,
    /// Set on success
    pub verification_status: u32,
}

#[derive(Debug, Default)]
pub struct SheExtendSeedArgs<'a> {
    pub entropy: &'a [u8],
}

#[derive(Debug, Default)]
pub struct SheRndArgs<'a> {
    pub rnd: &'a mut [u8],
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SheGetStatusArgs {
    /// Status register, set on success
    pub sreg: u8,
}

#[derive(Debug, Default)]
pub struct SheGetIdArgs<'a> {
    pub challenge: [u8; SHE_CHALLENGE_SIZE],
    /// Set on success
    pub id: [u8; SHE_ID_SIZE],
    /// Set on success
    pub sreg: u8,
    pub mac: &'a mut [u8],
}

// SHE_GENERATE_MAC
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SheGenerateMacReq {
    pub hdr: MuHdr,
    pub key_id: u16,
    pub data_length: u16,
    pub data_offset: u16,
    pub mac_offset: u16,
}
impl Request for SheGenerateMacReq {
    const ID: MsgId = MsgId::SHE_GENERATE_MAC;
    type Resp = StatusRsp;
}

// SHE_VERIFY_MAC
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SheVerifyMacReq {
    pub hdr: MuHdr,
    pub key_id: u16,
    pub data_length: u16,
    pub data_offset: u16,
    pub mac_offset: u16,
    pub mac_length: u8,
    pub reserved: [u8; 3],
}
impl Request for SheVerifyMacReq {
    const ID: MsgId = MsgId::SHE_VERIFY_MAC;
    type Resp = SheVerifyMacRsp;
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SheVerifyMacRsp {
    pub hdr: MuHdr,
    pub rsp_code: u32,
    pub verification_status: u32,
}
impl Response for SheVerifyMacRsp {}

// SHE_INIT_RNG
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SheInitRngReq {
    pub hdr: MuHdr,
}
impl Request for SheInitRngReq {
    const ID: MsgId = MsgId::SHE_INIT_RNG;
    type Resp = StatusRsp;
}

// SHE_EXTEND_SEED
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SheExtendSeedReq {
    pub hdr: MuHdr,
    pub entropy_addr_ext: u32,
    pub entropy_addr: u32,
    pub entropy_size: u32,
}
impl Request for SheExtendSeedReq {
    const ID: MsgId = MsgId::SHE_EXTEND_SEED;
    type Resp = StatusRsp;
}

// SHE_RND
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SheRndReq {
    pub hdr: MuHdr,
    pub rnd_addr_ext: u32,
    pub rnd_addr: u32,
    pub rnd_size: u32,
}
impl Request for SheRndReq {
    const ID: MsgId = MsgId::SHE_RND;
    type Resp = StatusRsp;
}

// SHE_GET_STATUS
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SheGetStatusReq {
    pub hdr: MuHdr,
}
impl Request for SheGetStatusReq {
    const ID: MsgId = MsgId::SHE_GET_STATUS;
    type Resp = SheGetStatusRsp;
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SheGetStatusRsp {
    pub hdr: MuHdr,
    pub rsp_code: u32,
    pub sreg: u8,
    pub reserved: [u8; 3],
}
impl Response for SheGetStatusRsp {}

// SHE_GET_ID
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SheGetIdReq {
    pub hdr: MuHdr,
    pub challenge: [u8; SHE_CHALLENGE_SIZE],
    pub outputs_address_ext: u32,
    pub mac_addr: u32,
    pub crc: u32,
}
impl Request for SheGetIdReq {
    const ID: MsgId = MsgId::SHE_GET_ID;
    const CRC: bool = true;
    type Resp = SheGetIdRsp;
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SheGetIdRsp {
    pub hdr: MuHdr,
    pub rsp_code: u32,
    pub id: [u8; SHE_ID_SIZE],
    pub sreg: u8,
    pub crc: u32,
}
impl Response for SheGetIdRsp {
    const CRC: bool = true;
}

fn short_offset(ctx: &mut PrepareCtx<'_>, buf: &[u8], flags: DataBufFlags) -> HsmApiResult<u16> {
    let addr = ctx.data_buf(
        buf,
        flags | DataBufFlags::USE_SEC_MEM | DataBufFlags::SHORT_ADDR,
    )?;
    Ok(short_addr(addr))
}

fn fixed_len(buf: &[u8], len: usize, what: &'static str) -> HsmApiResult<()> {
    if buf.len() == len {
        Ok(())
    } else {
        Err(HsmApiError::Validation(what))
    }
}

pub(crate) fn prepare_she_generate_mac(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::SheGenerateMac(args) = args else {
        return Err(arg_mismatch());
    };
    fixed_len(args.mac, SHE_MAC_SIZE, "SHE MAC buffer must be 16 bytes")?;
    let data_length = len_u16(args.message, "SHE message too large")?;
    let data_offset = short_offset(ctx, args.message, DataBufFlags::IS_INPUT)?;
    let mac = ctx.register_buf(
        args.mac,
        DataBufFlags::IS_OUTPUT | DataBufFlags::USE_SEC_MEM | DataBufFlags::SHORT_ADDR,
    )?;
    let prepared = encode(
        cmd,
        &SheGenerateMacReq {
            key_id: she_key_id(args.key_ext, args.key_id),
            data_length,
            data_offset,
            mac_offset: short_addr(mac.unwrap_or(0)),
            ..Default::default()
        },
    )?;
    Ok(prepared.with_output(mac))
}

pub(crate) fn prepare_she_verify_mac(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::SheVerifyMac(args) = args else {
        return Err(arg_mismatch());
    };
    fixed_len(args.mac, SHE_MAC_SIZE, "SHE MAC buffer must be 16 bytes")?;
    if usize::from(args.mac_length) > SHE_MAC_SIZE {
        return Err(HsmApiError::Validation("SHE MAC length exceeds MAC size"));
    }
    let data_length = len_u16(args.message, "SHE message too large")?;
    let data_offset = short_offset(ctx, args.message, DataBufFlags::IS_INPUT)?;
    let mac_offset = short_offset(ctx, args.mac, DataBufFlags::IS_INPUT)?;
    encode(
        cmd,
        &SheVerifyMacReq {
            key_id: she_key_id(args.key_ext, args.key_id),
            data_length,
            data_offset,
            mac_offset,
            mac_length: args.mac_length,
            ..Default::default()
        },
    )
}

pub(crate) fn proc_rsp_she_verify_mac(
    rsp: &[u8],
    args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    let MsgArgs::SheVerifyMac(args) = args else {
        return Err(arg_mismatch());
    };
    args.verification_status = decode::<SheVerifyMacRsp>(rsp)?.verification_status;
    Ok(())
}

pub(crate) fn prepare_she_init_rng(
    _ctx: &mut PrepareCtx<'_>,
    _args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    encode(cmd, &SheInitRngReq::default())
}

pub(crate) fn prepare_she_extend_seed(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::SheExtendSeed(args) = args else {
        return Err(arg_mismatch());
    };
    fixed_len(args.entropy, SHE_ENTROPY_SIZE, "SHE entropy must be 16 bytes")?;
    let addr = ctx.data_buf(
        args.entropy,
        DataBufFlags::IS_INPUT | DataBufFlags::USE_SEC_MEM,
    )?;
    let (entropy_addr_ext, entropy_addr) = split_addr(addr);
    encode(
        cmd,
        &SheExtendSeedReq {
            entropy_addr_ext,
            entropy_addr,
            entropy_size: len_u32(args.entropy, "SHE entropy too large")?,
            ..Default::default()
        },
    )
}

pub(crate) fn prepare_she_rnd(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::SheRnd(args) = args else {
        return Err(arg_mismatch());
    };
    fixed_len(args.rnd, SHE_RND_SIZE, "SHE random buffer must be 16 bytes")?;
    let rnd = ctx.register_buf(args.rnd, DataBufFlags::IS_OUTPUT | DataBufFlags::USE_SEC_MEM)?;
    let (rnd_addr_ext, rnd_addr) = split_addr(rnd.unwrap_or(0));
    let prepared = encode(
        cmd,
        &SheRndReq {
            rnd_addr_ext,
            rnd_addr,
            rnd_size: len_u32(args.rnd, "SHE random buffer too large")?,
            ..Default::default()
        },
    )?;
    Ok(prepared.with_output(rnd))
}

pub(crate) fn prepare_she_get_status(
    _ctx: &mut PrepareCtx<'_>,
    _args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    encode(cmd, &SheGetStatusReq::default())
}

pub(crate) fn proc_rsp_she_get_status(
    rsp: &[u8],
    args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    let MsgArgs::SheGetStatus(args) = args else {
        return Err(arg_mismatch());
    };
    args.sreg = decode::<SheGetStatusRsp>(rsp)?.sreg;
    Ok(())
}

pub(crate) fn prepare_she_get_id(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::SheGetId(args) = args else {
        return Err(arg_mismatch());
    };
    fixed_len(args.mac, SHE_MAC_SIZE, "SHE MAC buffer must be 16 bytes")?;
    let mac = ctx.register_buf(args.mac, DataBufFlags::IS_OUTPUT | DataBufFlags::USE_SEC_MEM)?;
    let (outputs_address_ext, mac_addr) = split_addr(mac.unwrap_or(0));
    let prepared = encode(
        cmd,
        &SheGetIdReq {
            challenge: args.challenge,
            outputs_address_ext,
            mac_addr,
            ..Default::default()
        },
    )?;
    Ok(prepared.with_output(mac))
}

pub(crate) fn proc_rsp_she_get_id(
    rsp: &[u8],
    args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    let MsgArgs::SheGetId(args) = args else {
        return Err(arg_mismatch());
    };
    let rsp = decode::<SheGetIdRsp>(rsp)?;
    args.id = rsp.id;
    args.sreg = rsp.sreg;
    Ok(())
}

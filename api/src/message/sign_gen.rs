/*++

Licensed under the Apache-2.0 license.

File Name:

    sign_gen.rs

Abstract:

    Signature generation service. SIGN_GENERATE exists in two firmware
    layouts: the legacy one carries an 8-bit scheme id, the PSA one a 32-bit
    scheme id and returns the produced signature size.

--*/

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{
    addr32, arg_mismatch, decode, encode, len_u16, len_u32, MessageFlavor, MsgArgs, MsgId, MuHdr,
    PrepareCtx, Prepared, Request, Response, StatusRsp,
};
use crate::transport::DataBufFlags;
use crate::HsmApiResult;

define_service_messages! {
    open: SignGenOpenReq(MsgId::SIGN_GEN_OPEN, key_store_hdl) -> SignGenOpenRsp(sig_gen_hdl),
    close: SignGenCloseReq(MsgId::SIGN_GEN_CLOSE),
}

pub const SIGN_GEN_FLAGS_INPUT_DIGEST: u8 = 0x00;
pub const SIGN_GEN_FLAGS_INPUT_MESSAGE: u8 = 0x01;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureScheme {
    #[default]
    EcdsaP256Sha256,
    EcdsaP384Sha384,
}

impl SignatureScheme {
    pub fn legacy_id(&self) -> u8 {
        match self {
            Self::EcdsaP256Sha256 => 0x02,
            Self::EcdsaP384Sha384 => 0x03,
        }
    }

    pub fn psa_id(&self) -> u32 {
        match self {
            Self::EcdsaP256Sha256 => 0x0600_0609,
            Self::EcdsaP384Sha384 => 0x0600_060A,
        }
    }

    pub fn from_legacy_id(id: u8) -> Option<Self> {
        [Self::EcdsaP256Sha256, Self::EcdsaP384Sha384]
            .into_iter()
            .find(|s| s.legacy_id() == id)
    }

    pub fn from_psa_id(id: u32) -> Option<Self> {
        [Self::EcdsaP256Sha256, Self::EcdsaP384Sha384]
            .into_iter()
            .find(|s| s.psa_id() == id)
    }

    /// Size of an `r || s` signature.
    pub fn signature_size(&self) -> usize {
        match self {
            Self::EcdsaP256Sha256 => 64,
            Self::EcdsaP384Sha384 => 96,
        }
    }
}

#[derive(Debug, Default)]
pub struct SignGenerateArgs<'a> {
    pub key_identifier: u32,
    pub message: &'a [u8],
    pub signature: &'a mut [u8],
    pub scheme: SignatureScheme,
    pub flags: u8,
    /// Bytes of signature produced, set on success
    pub signature_size: u16,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PrepareSignArgs {
    pub scheme: SignatureScheme,
    pub flags: u8,
}

// SIGN_GENERATE, legacy layout
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SignGenerateLegacyReq {
    pub hdr: MuHdr,
    pub sig_gen_hdl: u32,
    pub key_identifier: u32,
    pub message_addr: u32,
    pub signature_addr: u32,
    pub message_size: u32,
    pub signature_size: u16,
    pub scheme_id: u8,
    pub flags: u8,
    pub crc: u32,
}
impl Request for SignGenerateLegacyReq {
    const ID: MsgId = MsgId::SIGN_GENERATE;
    const CRC: bool = true;
    type Resp = StatusRsp;
}

// SIGN_GENERATE, PSA layout
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SignGeneratePsaReq {
    pub hdr: MuHdr,
    pub sig_gen_hdl: u32,
    pub key_identifier: u32,
    pub message_addr: u32,
    pub signature_addr: u32,
    pub message_size: u32,
    pub signature_size: u16,
    pub flags: u8,
    pub reserved: u8,
    pub scheme_id: u32,
    pub crc: u32,
}
impl Request for SignGeneratePsaReq {
    const ID: MsgId = MsgId::SIGN_GENERATE;
    const CRC: bool = true;
    type Resp = SignGeneratePsaRsp;
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct SignGeneratePsaRsp {
    pub hdr: MuHdr,
    pub rsp_code: u32,
    pub signature_size: u16,
    pub reserved: u16,
}
impl Response for SignGeneratePsaRsp {}

// SIGN_PREPARE
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct PrepareSignReq {
    pub hdr: MuHdr,
    pub sig_gen_hdl: u32,
    pub scheme_id: u8,
    pub flags: u8,
    pub reserved: u16,
}
impl Request for PrepareSignReq {
    const ID: MsgId = MsgId::SIGN_PREPARE;
    type Resp = StatusRsp;
}

pub(crate) fn prepare_sign_generate(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::SignGenerate(args) = args else {
        return Err(arg_mismatch());
    };
    let message_size = len_u32(args.message, "message too large")?;
    let signature_size = len_u16(args.signature, "signature buffer too large")?;
    let message_addr = addr32(ctx.data_buf(args.message, DataBufFlags::IS_INPUT)?);
    let signature = ctx.register_buf(args.signature, DataBufFlags::IS_OUTPUT)?;
    let signature_addr = signature.unwrap_or(0);

    let prepared = match ctx.flavor {
        MessageFlavor::Legacy => encode(
            cmd,
            &SignGenerateLegacyReq {
                sig_gen_hdl: ctx.msg_hdl,
                key_identifier: args.key_identifier,
                message_addr,
                signature_addr: addr32(signature_addr),
                message_size,
                signature_size,
                scheme_id: args.scheme.legacy_id(),
                flags: args.flags,
                ..Default::default()
            },
        )?,
        MessageFlavor::Psa => encode(
            cmd,
            &SignGeneratePsaReq {
                sig_gen_hdl: ctx.msg_hdl,
                key_identifier: args.key_identifier,
                message_addr,
                signature_addr: addr32(signature_addr),
                message_size,
                signature_size,
                flags: args.flags,
                scheme_id: args.scheme.psa_id(),
                ..Default::default()
            },
        )?,
    };
    Ok(prepared.with_output(signature))
}

pub(crate) fn proc_rsp_sign_generate(
    rsp: &[u8],
    args: &mut MsgArgs<'_>,
    flavor: MessageFlavor,
) -> HsmApiResult<()> {
    let MsgArgs::SignGenerate(args) = args else {
        return Err(arg_mismatch());
    };
    args.signature_size = match flavor {
        MessageFlavor::Psa => decode::<SignGeneratePsaRsp>(rsp)?.signature_size,
        // The legacy layout fills the whole buffer.
        MessageFlavor::Legacy => len_u16(args.signature, "signature buffer too large")?,
    };
    Ok(())
}

pub(crate) fn prepare_sign_prepare(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::PrepareSign(args) = args else {
        return Err(arg_mismatch());
    };
    encode(
        cmd,
        &PrepareSignReq {
            sig_gen_hdl: ctx.msg_hdl,
            scheme_id: args.scheme.legacy_id(),
            flags: args.flags,
            ..Default::default()
        },
    )
}

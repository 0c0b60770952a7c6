/*++

Licensed under the Apache-2.0 license.

File Name:

    key_mgmt.rs

Abstract:

    Key management service: generation, import, deletion and management of
    keys held in the engine key store.

--*/

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{
    addr32, arg_mismatch, decode, encode, len_u16, MessageFlavor, MsgArgs, MsgId, MuHdr,
    PrepareCtx, Prepared, Request, Response, StatusRsp,
};
use crate::transport::DataBufFlags;
use crate::HsmApiResult;

define_service_messages! {
    open: KeyMgmtOpenReq(MsgId::KEY_MANAGEMENT_OPEN, key_store_handle)
        -> KeyMgmtOpenRsp(key_management_handle),
    close: KeyMgmtCloseReq(MsgId::KEY_MANAGEMENT_CLOSE),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyType(pub u8);

impl KeyType {
    pub const ECDSA_NIST_P256: Self = Self(0x02);
    pub const ECDSA_NIST_P384: Self = Self(0x03);
    pub const AES_128: Self = Self(0x30);
    pub const AES_192: Self = Self(0x31);
    pub const AES_256: Self = Self(0x32);
    pub const HMAC_224: Self = Self(0x60);
    pub const HMAC_256: Self = Self(0x61);
    pub const HMAC_384: Self = Self(0x62);
    pub const HMAC_512: Self = Self(0x63);
    pub const SHE: Self = Self(0xF9);

    /// Size of the key material in bytes, for fixed-size key types.
    pub fn key_size(&self) -> Option<usize> {
        match *self {
            Self::ECDSA_NIST_P256 => Some(32),
            Self::ECDSA_NIST_P384 => Some(48),
            Self::AES_128 | Self::SHE => Some(16),
            Self::AES_192 => Some(24),
            Self::AES_256 => Some(32),
            Self::HMAC_224 => Some(28),
            Self::HMAC_256 => Some(32),
            Self::HMAC_384 => Some(48),
            Self::HMAC_512 => Some(64),
            _ => None,
        }
    }

    /// Size of the public key an asymmetric key generation returns.
    pub fn public_key_size(&self) -> Option<usize> {
        match *self {
            Self::ECDSA_NIST_P256 => Some(64),
            Self::ECDSA_NIST_P384 => Some(96),
            _ => None,
        }
    }
}

// Key generation / import flags
pub const KEY_GEN_FLAGS_UPDATE: u8 = 1 << 0;
pub const KEY_GEN_FLAGS_CREATE: u8 = 1 << 1;
pub const KEY_GEN_FLAGS_STRICT_OPERATION: u8 = 1 << 7;

// Key info bits
pub const KEY_INFO_PERMANENT: u16 = 1 << 0;
pub const KEY_INFO_TRANSIENT: u16 = 1 << 1;
pub const KEY_INFO_MASTER: u16 = 1 << 2;

pub const DELETE_KEY_FLAGS_STRICT_OPERATION: u8 = 1 << 7;

/// Arguments of KEY_GENERATE and KEY_GENERATE_EXT.
#[derive(Debug, Default)]
pub struct KeyGenerateArgs<'a> {
    /// Requested identifier when updating, engine-assigned one on success
    pub key_identifier: u32,
    /// Public key output; empty for symmetric keys
    pub out_key: &'a mut [u8],
    pub flags: u8,
    pub key_type: KeyType,
    pub key_group: u16,
    pub key_info: u16,
    /// Only sent by KEY_GENERATE_EXT
    pub min_mac_len: u8,
}

#[derive(Debug, Default)]
pub struct ImportKeyArgs<'a> {
    /// Set on success
    pub key_identifier: u32,
    pub input: &'a [u8],
    pub flags: u8,
    pub key_type: KeyType,
    pub key_group: u16,
    pub key_info: u16,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeleteKeyArgs {
    pub key_identifier: u32,
    pub flags: u8,
}

/// Arguments of MANAGE_KEY: inject a key wrapped under `kek_id`.
#[derive(Debug, Default)]
pub struct ManageKeyArgs<'a> {
    /// Destination identifier; engine-assigned one on success
    pub dest_key_identifier: u32,
    pub kek_id: u32,
    pub input_data: &'a [u8],
    pub flags: u8,
    pub key_type: KeyType,
    pub key_group: u16,
    pub key_info: u16,
}

// KEY_GENERATE
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct KeyGenerateReq {
    pub hdr: MuHdr,
    pub key_management_handle: u32,
    pub key_identifier: u32,
    pub out_size: u16,
    pub flags: u8,
    pub key_type: u8,
    pub key_group: u16,
    pub key_info: u16,
    pub out_key_addr: u32,
    pub crc: u32,
}
impl Request for KeyGenerateReq {
    const ID: MsgId = MsgId::KEY_GENERATE;
    const CRC: bool = true;
    type Resp = KeyIdRsp;
}

/// Response of every request that yields a key identifier.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct KeyIdRsp {
    pub hdr: MuHdr,
    pub rsp_code: u32,
    pub key_identifier: u32,
}
impl Response for KeyIdRsp {}

// KEY_GENERATE_EXT
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct KeyGenerateExtReq {
    pub hdr: MuHdr,
    pub key_management_handle: u32,
    pub key_identifier: u32,
    pub out_key_sz: u16,
    pub flags: u8,
    pub key_type: u8,
    pub key_group: u16,
    pub key_info: u16,
    pub out_key_addr: u32,
    pub min_mac_len: u8,
    pub reserved: [u8; 3],
    pub crc: u32,
}
impl Request for KeyGenerateExtReq {
    const ID: MsgId = MsgId::KEY_GENERATE_EXT;
    const CRC: bool = true;
    type Resp = KeyIdRsp;
}

// IMPORT_KEY
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct ImportKeyReq {
    pub hdr: MuHdr,
    pub key_management_handle: u32,
    pub key_identifier: u32,
    pub key_group: u16,
    pub flags: u8,
    pub key_type: u8,
    pub key_info: u16,
    pub input_size: u16,
    pub input_addr: u32,
    pub crc: u32,
}
impl Request for ImportKeyReq {
    const ID: MsgId = MsgId::IMPORT_KEY;
    const CRC: bool = true;
    type Resp = KeyIdRsp;
}

// DELETE_KEY
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct DeleteKeyReq {
    pub hdr: MuHdr,
    pub key_management_handle: u32,
    pub key_identifier: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}
impl Request for DeleteKeyReq {
    const ID: MsgId = MsgId::DELETE_KEY;
    type Resp = StatusRsp;
}

// MANAGE_KEY
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct ManageKeyReq {
    pub hdr: MuHdr,
    pub key_management_handle: u32,
    pub dest_key_identifier: u32,
    pub kek_id: u32,
    pub input_data_size: u16,
    pub flags: u8,
    pub key_type: u8,
    pub key_group: u16,
    pub key_info: u16,
    pub input_data_addr: u32,
    pub crc: u32,
}
impl Request for ManageKeyReq {
    const ID: MsgId = MsgId::MANAGE_KEY;
    const CRC: bool = true;
    type Resp = KeyIdRsp;
}

pub(crate) fn prepare_key_generate(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::KeyGenerate(args) = args else {
        return Err(arg_mismatch());
    };
    let out_size = len_u16(args.out_key, "public key buffer too large")?;
    let out_key = ctx.register_buf(args.out_key, DataBufFlags::IS_OUTPUT)?;
    let prepared = encode(
        cmd,
        &KeyGenerateReq {
            key_management_handle: ctx.msg_hdl,
            key_identifier: args.key_identifier,
            out_size,
            flags: args.flags,
            key_type: args.key_type.0,
            key_group: args.key_group,
            key_info: args.key_info,
            out_key_addr: addr32(out_key.unwrap_or(0)),
            ..Default::default()
        },
    )?;
    Ok(prepared.with_output(out_key))
}

pub(crate) fn prepare_key_generate_ext(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::KeyGenerate(args) = args else {
        return Err(arg_mismatch());
    };
    let out_key_sz = len_u16(args.out_key, "public key buffer too large")?;
    let out_key = ctx.register_buf(args.out_key, DataBufFlags::IS_OUTPUT)?;
    let prepared = encode(
        cmd,
        &KeyGenerateExtReq {
            key_management_handle: ctx.msg_hdl,
            key_identifier: args.key_identifier,
            out_key_sz,
            flags: args.flags,
            key_type: args.key_type.0,
            key_group: args.key_group,
            key_info: args.key_info,
            out_key_addr: addr32(out_key.unwrap_or(0)),
            min_mac_len: args.min_mac_len,
            ..Default::default()
        },
    )?;
    Ok(prepared.with_output(out_key))
}

pub(crate) fn proc_rsp_key_generate(
    rsp: &[u8],
    args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    let MsgArgs::KeyGenerate(args) = args else {
        return Err(arg_mismatch());
    };
    args.key_identifier = decode::<KeyIdRsp>(rsp)?.key_identifier;
    Ok(())
}

pub(crate) fn prepare_import_key(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::ImportKey(args) = args else {
        return Err(arg_mismatch());
    };
    let input_size = len_u16(args.input, "imported key too large")?;
    let input_addr = ctx.data_buf(args.input, DataBufFlags::IS_INPUT)?;
    encode(
        cmd,
        &ImportKeyReq {
            key_management_handle: ctx.msg_hdl,
            key_identifier: args.key_identifier,
            key_group: args.key_group,
            flags: args.flags,
            key_type: args.key_type.0,
            key_info: args.key_info,
            input_size,
            input_addr: addr32(input_addr),
            ..Default::default()
        },
    )
}

pub(crate) fn proc_rsp_import_key(
    rsp: &[u8],
    args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    let MsgArgs::ImportKey(args) = args else {
        return Err(arg_mismatch());
    };
    args.key_identifier = decode::<KeyIdRsp>(rsp)?.key_identifier;
    Ok(())
}

pub(crate) fn prepare_delete_key(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::DeleteKey(args) = args else {
        return Err(arg_mismatch());
    };
    encode(
        cmd,
        &DeleteKeyReq {
            key_management_handle: ctx.msg_hdl,
            key_identifier: args.key_identifier,
            flags: args.flags,
            ..Default::default()
        },
    )
}

pub(crate) fn prepare_manage_key(
    ctx: &mut PrepareCtx<'_>,
    args: &mut MsgArgs<'_>,
    cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    let MsgArgs::ManageKey(args) = args else {
        return Err(arg_mismatch());
    };
    let input_data_size = len_u16(args.input_data, "wrapped key too large")?;
    let input_data_addr = ctx.data_buf(args.input_data, DataBufFlags::IS_INPUT)?;
    encode(
        cmd,
        &ManageKeyReq {
            key_management_handle: ctx.msg_hdl,
            dest_key_identifier: args.dest_key_identifier,
            kek_id: args.kek_id,
            input_data_size,
            flags: args.flags,
            key_type: args.key_type.0,
            key_group: args.key_group,
            key_info: args.key_info,
            input_data_addr: addr32(input_data_addr),
            ..Default::default()
        },
    )
}

pub(crate) fn proc_rsp_manage_key(
    rsp: &[u8],
    args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    let MsgArgs::ManageKey(args) = args else {
        return Err(arg_mismatch());
    };
    args.dest_key_identifier = decode::<KeyIdRsp>(rsp)?.key_identifier;
    Ok(())
}

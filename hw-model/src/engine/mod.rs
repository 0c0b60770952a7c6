/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    Firmware side of the message protocol: request validation, the table
    of open engine objects and dispatch to the per-family handlers.

--*/

mod keys;
mod ops;
mod services;
mod she;

use std::collections::BTreeMap;
use std::mem::size_of;

use hsm_api::message::cipher::CipherCloseReq;
use hsm_api::message::hash::HashCloseReq;
use hsm_api::message::key_mgmt::KeyMgmtCloseReq;
use hsm_api::message::mac::MacCloseReq;
use hsm_api::message::sign_gen::SignGenCloseReq;
use hsm_api::message::verify_sign::VerifySignCloseReq;
use hsm_api::message::{Request, Response, StatusRsp};
use hsm_api::{populate_checksum, status, verify_trailing_checksum};
use hsm_api::{MessageFlavor, MsgId, MuHdr, MuParams};
use hsm_error::{HsmError, HsmResult};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use zerocopy::{FromBytes, IntoBytes};

use crate::memory::SharedMemory;
use crate::InitParams;

pub(crate) use keys::KeyStore;

/// Lowest value handed out as an engine handle.
const HANDLE_BASE: u32 = 0x100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    KeyManagement,
    Mac,
    Cipher,
    Hash,
    SignatureGeneration,
    SignatureVerification,
}

impl ServiceKind {
    /// Hash and verification services hang off the session; the others
    /// need a key store.
    fn opens_on_session(&self) -> bool {
        matches!(self, Self::Hash | Self::SignatureVerification)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Object {
    Session,
    KeyStore { session: u32, store_id: u32 },
    Service { kind: ServiceKind, parent: u32 },
}

impl Object {
    fn parent(&self) -> Option<u32> {
        match self {
            Self::Session => None,
            Self::KeyStore { session, .. } => Some(*session),
            Self::Service { parent, .. } => Some(*parent),
        }
    }
}

/// Encoded response; header and status are filled in on the way out.
pub(crate) struct Reply {
    pub bytes: Vec<u8>,
    /// The response ends in a checksum word
    pub crc: bool,
}

impl Reply {
    fn new<R: Response>(rsp: &R) -> Self {
        Self {
            bytes: rsp.as_bytes().to_vec(),
            crc: R::CRC,
        }
    }

    fn status() -> Self {
        Self::new(&StatusRsp::default())
    }
}

/// Parse a request, checking its size and, when it carries one, its checksum.
fn parse<R: Request>(cmd: &[u8]) -> HsmResult<R> {
    if cmd.len() != size_of::<R>() {
        return Err(HsmError::INVALID_MESSAGE);
    }
    if R::CRC && verify_trailing_checksum(cmd).is_err() {
        return Err(HsmError::CRC_CHECK_ERR);
    }
    R::read_from_bytes(cmd).map_err(|_| HsmError::INVALID_MESSAGE)
}

pub(crate) struct Engine {
    mu: MuParams,
    flavor: MessageFlavor,
    she_uid: [u8; hsm_api::message::she::SHE_ID_SIZE],
    shared_buf: (u16, u16),
    max_handles: usize,
    objects: BTreeMap<u32, Object>,
    key_stores: BTreeMap<u32, KeyStore>,
    rng: StdRng,
    she_rng_started: bool,
}

impl Engine {
    pub fn new(params: &InitParams) -> Self {
        Self {
            mu: params.mu,
            flavor: params.flavor,
            she_uid: params.she_uid,
            shared_buf: params.shared_buf,
            max_handles: params.max_handles,
            objects: BTreeMap::new(),
            key_stores: BTreeMap::new(),
            rng: StdRng::seed_from_u64(params.seed),
            she_rng_started: false,
        }
    }

    pub fn live_handles(&self) -> usize {
        self.objects.len()
    }

    pub fn live_services(&self, kind: ServiceKind) -> usize {
        self.objects
            .values()
            .filter(|o| matches!(o, Object::Service { kind: k, .. } if *k == kind))
            .count()
    }

    /// Encode a status-only response for `command` carrying `err`.
    pub fn failure(&self, command: u8, err: HsmError) -> Reply {
        let mut reply = Reply::status();
        self.seal(&mut reply, command, status::failure_rsp_code(err));
        reply
    }

    /// Encode a well-formed success header for `command` with no payload.
    pub fn bare_success(&self, command: u8) -> Reply {
        let mut reply = Reply::status();
        self.seal(&mut reply, command, status::success_rsp_code());
        reply
    }

    /// Run one request against the engine state and encode its response.
    pub fn execute(&mut self, cmd: &[u8], mem: &mut SharedMemory) -> Reply {
        let command = cmd.get(2).copied().unwrap_or(0);
        match self.handle(cmd, mem) {
            Ok(mut reply) => {
                self.seal(&mut reply, command, status::success_rsp_code());
                reply
            }
            Err(err) => {
                warn!("[hsm-model] message {command:#04x} failed: {err}");
                self.failure(command, err)
            }
        }
    }

    fn seal(&self, reply: &mut Reply, command: u8, rsp_code: u32) {
        let hdr = MuHdr {
            ver: self.mu.version,
            size: (reply.bytes.len() / 4) as u8,
            command,
            tag: self.mu.rsp_tag,
        };
        reply.bytes[..4].copy_from_slice(hdr.as_bytes());
        reply.bytes[4..8].copy_from_slice(&rsp_code.to_le_bytes());
        if reply.crc {
            populate_checksum(&mut reply.bytes);
        }
    }

    fn handle(&mut self, cmd: &[u8], mem: &mut SharedMemory) -> HsmResult<Reply> {
        let (hdr, _) = MuHdr::read_from_prefix(cmd).map_err(|_| HsmError::INVALID_MESSAGE)?;
        if hdr.ver != self.mu.version
            || hdr.tag != self.mu.cmd_tag
            || usize::from(hdr.size) * 4 != cmd.len()
        {
            return Err(HsmError::INVALID_MESSAGE);
        }
        debug!("[hsm-model] message {:#04x}, {} bytes", hdr.command, cmd.len());

        match MsgId(hdr.command) {
            MsgId::SESSION_OPEN => self.session_open(parse(cmd)?),
            MsgId::SESSION_CLOSE => self.session_close(parse(cmd)?),
            MsgId::SHARED_BUF => self.shared_buf(parse(cmd)?),

            MsgId::KEY_STORE_OPEN => self.key_store_open(parse(cmd)?),
            MsgId::KEY_STORE_CLOSE => self.key_store_close(parse(cmd)?),

            MsgId::KEY_MANAGEMENT_OPEN => self.key_mgmt_open(parse(cmd)?),
            MsgId::KEY_MANAGEMENT_CLOSE => self.close_service(
                ServiceKind::KeyManagement,
                parse::<KeyMgmtCloseReq>(cmd)?.key_management_handle,
            ),
            MsgId::KEY_GENERATE => self.key_generate(parse(cmd)?, mem),
            MsgId::KEY_GENERATE_EXT => self.key_generate_ext(parse(cmd)?, mem),
            MsgId::IMPORT_KEY => self.import_key(parse(cmd)?, mem),
            MsgId::DELETE_KEY => self.delete_key(parse(cmd)?),
            MsgId::MANAGE_KEY => self.manage_key(parse(cmd)?, mem),

            MsgId::MAC_OPEN => self.mac_open(parse(cmd)?),
            MsgId::MAC_CLOSE => {
                self.close_service(ServiceKind::Mac, parse::<MacCloseReq>(cmd)?.mac_handle)
            }
            MsgId::MAC_ONE_GO => self.mac_one_go(parse(cmd)?, mem),

            MsgId::CIPHER_OPEN => self.cipher_open(parse(cmd)?),
            MsgId::CIPHER_CLOSE => self.close_service(
                ServiceKind::Cipher,
                parse::<CipherCloseReq>(cmd)?.cipher_handle,
            ),
            MsgId::CIPHER_ONE_GO => self.cipher_one_go(parse(cmd)?, mem),

            MsgId::HASH_OPEN => self.hash_open(parse(cmd)?),
            MsgId::HASH_CLOSE => {
                self.close_service(ServiceKind::Hash, parse::<HashCloseReq>(cmd)?.hash_hdl)
            }
            MsgId::HASH_ONE_GO => self.hash_one_go(parse(cmd)?, mem),

            MsgId::SIGN_GEN_OPEN => self.sign_gen_open(parse(cmd)?),
            MsgId::SIGN_GEN_CLOSE => self.close_service(
                ServiceKind::SignatureGeneration,
                parse::<SignGenCloseReq>(cmd)?.sig_gen_hdl,
            ),
            MsgId::SIGN_GENERATE => match self.flavor {
                MessageFlavor::Legacy => self.sign_generate_legacy(parse(cmd)?, mem),
                MessageFlavor::Psa => self.sign_generate_psa(parse(cmd)?, mem),
            },
            MsgId::SIGN_PREPARE => self.sign_prepare(parse(cmd)?),

            MsgId::VERIFY_SIGN_OPEN => self.verify_sign_open(parse(cmd)?),
            MsgId::VERIFY_SIGN_CLOSE => self.close_service(
                ServiceKind::SignatureVerification,
                parse::<VerifySignCloseReq>(cmd)?.sig_ver_hdl,
            ),
            MsgId::VERIFY_SIGN => self.verify_sign(parse(cmd)?, mem),

            MsgId::GET_RANDOM => self.get_random(parse(cmd)?, mem),

            MsgId::SHE_GENERATE_MAC => self.she_generate_mac(parse(cmd)?, mem),
            MsgId::SHE_VERIFY_MAC => self.she_verify_mac(parse(cmd)?, mem),
            MsgId::SHE_INIT_RNG => self.she_init_rng(parse(cmd)?),
            MsgId::SHE_EXTEND_SEED => self.she_extend_seed(parse(cmd)?, mem),
            MsgId::SHE_RND => self.she_rnd(parse(cmd)?, mem),
            MsgId::SHE_GET_STATUS => self.she_get_status(parse(cmd)?),
            MsgId::SHE_GET_ID => self.she_get_id(parse(cmd)?, mem),

            _ => Err(HsmError::CMD_NOT_SUPPORTED),
        }
    }

    /// Record `object` under the smallest free handle.
    fn alloc_handle(&mut self, object: Object) -> HsmResult<u32> {
        if self.objects.len() >= self.max_handles {
            return Err(HsmError::OUT_OF_MEMORY);
        }
        let handle = (HANDLE_BASE..=u32::MAX)
            .find(|h| !self.objects.contains_key(h))
            .ok_or(HsmError::OUT_OF_MEMORY)?;
        self.objects.insert(handle, object);
        Ok(handle)
    }

    /// Remove `handle` and everything opened below it.
    fn remove_tree(&mut self, handle: u32) {
        let children: Vec<u32> = self
            .objects
            .iter()
            .filter(|(_, o)| o.parent() == Some(handle))
            .map(|(h, _)| *h)
            .collect();
        for child in children {
            self.remove_tree(child);
        }
        self.objects.remove(&handle);
    }

    fn check_session(&self, handle: u32) -> HsmResult<()> {
        match self.objects.get(&handle) {
            Some(Object::Session) => Ok(()),
            _ => Err(HsmError::UNKNOWN_HANDLE),
        }
    }

    /// Key store id behind an open key store handle.
    fn key_store_id(&self, handle: u32) -> HsmResult<u32> {
        match self.objects.get(&handle) {
            Some(Object::KeyStore { store_id, .. }) => Ok(*store_id),
            _ => Err(HsmError::UNKNOWN_HANDLE),
        }
    }

    /// Parent handle of an open service of `kind`.
    fn service_parent(&self, handle: u32, kind: ServiceKind) -> HsmResult<u32> {
        match self.objects.get(&handle) {
            Some(Object::Service { kind: k, parent }) if *k == kind => Ok(*parent),
            _ => Err(HsmError::UNKNOWN_HANDLE),
        }
    }

    /// Key store a key-store-scoped service operates on.
    fn service_key_store(&mut self, handle: u32, kind: ServiceKind) -> HsmResult<&mut KeyStore> {
        let parent = self.service_parent(handle, kind)?;
        let store_id = self.key_store_id(parent)?;
        self.key_stores
            .get_mut(&store_id)
            .ok_or(HsmError::UNKNOWN_KEY_STORE)
    }
}

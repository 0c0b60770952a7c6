/*++

Licensed under the Apache-2.0 license.

File Name:

    keys.rs

Abstract:

    Key stores held by the emulated engine and the key management
    handlers operating on them.

--*/

use std::collections::BTreeMap;

use hsm_api::message::key_mgmt::{
    DeleteKeyReq, ImportKeyReq, KeyGenerateExtReq, KeyGenerateReq, KeyIdRsp, KeyType,
    ManageKeyReq, KEY_GEN_FLAGS_CREATE, KEY_GEN_FLAGS_UPDATE, KEY_INFO_PERMANENT,
};
use hsm_error::{HsmError, HsmResult};
use log::debug;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{Engine, Reply, ServiceKind};
use crate::crypto::{aes_ecb, Curve, Direction};
use crate::memory::SharedMemory;

/// Keys one group may hold.
const MAX_KEYS_PER_GROUP: usize = 32;

#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct KeyEntry {
    #[zeroize(skip)]
    pub key_type: KeyType,
    #[zeroize(skip)]
    pub group: u16,
    #[zeroize(skip)]
    pub info: u16,
    #[zeroize(skip)]
    pub min_mac_len: u8,
    pub material: Vec<u8>,
}

impl KeyEntry {
    fn new(key_type: KeyType, group: u16, info: u16, material: &[u8]) -> Self {
        Self {
            key_type,
            group,
            info,
            min_mac_len: 0,
            material: material.to_vec(),
        }
    }
}

pub(crate) struct KeyStore {
    pub password: u32,
    keys: BTreeMap<u32, KeyEntry>,
}

impl KeyStore {
    pub fn new(password: u32) -> Self {
        Self {
            password,
            keys: BTreeMap::new(),
        }
    }

    pub fn get(&self, key_id: u32) -> HsmResult<&KeyEntry> {
        self.keys.get(&key_id).ok_or(HsmError::UNKNOWN_ID)
    }

    /// Store `entry` under `key_id` following the key generation flags.
    ///
    /// Creating with id 0 picks the smallest free id; updating requires the
    /// id to hold a key of the same type.
    fn insert(&mut self, key_id: u32, flags: u8, entry: KeyEntry) -> HsmResult<u32> {
        let key_id = if flags & KEY_GEN_FLAGS_CREATE != 0 {
            if key_id == 0 {
                (1..=u32::MAX)
                    .find(|id| !self.keys.contains_key(id))
                    .ok_or(HsmError::KEY_GROUP_FULL)?
            } else if self.keys.contains_key(&key_id) {
                return Err(HsmError::ID_CONFLICT);
            } else {
                key_id
            }
        } else if flags & KEY_GEN_FLAGS_UPDATE != 0 {
            let existing = self.get(key_id)?;
            if existing.key_type != entry.key_type {
                return Err(HsmError::KEY_NOT_SUPPORTED);
            }
            key_id
        } else {
            return Err(HsmError::INVALID_PARAM);
        };

        let in_group = self
            .keys
            .iter()
            .filter(|(id, k)| k.group == entry.group && **id != key_id)
            .count();
        if in_group >= MAX_KEYS_PER_GROUP {
            return Err(HsmError::KEY_GROUP_FULL);
        }
        self.keys.insert(key_id, entry);
        Ok(key_id)
    }

    fn remove(&mut self, key_id: u32) -> HsmResult<()> {
        if self.get(key_id)?.info & KEY_INFO_PERMANENT != 0 {
            return Err(HsmError::CANNOT_DELETE_PERMANENT_KEY);
        }
        self.keys.remove(&key_id);
        Ok(())
    }
}

/// Fields shared by both key generation layouts.
struct KeyGenRequest {
    handle: u32,
    key_identifier: u32,
    out_size: u16,
    out_key_addr: u32,
    flags: u8,
    key_type: KeyType,
    key_group: u16,
    key_info: u16,
    min_mac_len: u8,
}

impl Engine {
    fn generate(&mut self, req: KeyGenRequest, mem: &mut SharedMemory) -> HsmResult<Reply> {
        let size = req.key_type.key_size().ok_or(HsmError::KEY_NOT_SUPPORTED)?;
        let (material, public) = match Curve::from_key_type(req.key_type) {
            Some(curve) => curve.generate(&mut self.rng),
            None => {
                let mut secret = Zeroizing::new(vec![0u8; size]);
                self.rng.fill_bytes(&mut secret);
                (secret, Vec::new())
            }
        };
        if usize::from(req.out_size) < public.len() {
            return Err(HsmError::OUT_TOO_SMALL);
        }

        let mut entry = KeyEntry::new(req.key_type, req.key_group, req.key_info, &material);
        entry.min_mac_len = req.min_mac_len;
        let store = self.service_key_store(req.handle, ServiceKind::KeyManagement)?;
        let key_identifier = store.insert(req.key_identifier, req.flags, entry)?;
        mem.store(u64::from(req.out_key_addr), &public)?;
        debug!(
            "[hsm-model] generated key {key_identifier:#x} of type {:#04x}",
            req.key_type.0
        );
        Ok(Reply::new(&KeyIdRsp {
            key_identifier,
            ..Default::default()
        }))
    }

    pub(super) fn key_generate(
        &mut self,
        req: KeyGenerateReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        self.generate(
            KeyGenRequest {
                handle: req.key_management_handle,
                key_identifier: req.key_identifier,
                out_size: req.out_size,
                out_key_addr: req.out_key_addr,
                flags: req.flags,
                key_type: KeyType(req.key_type),
                key_group: req.key_group,
                key_info: req.key_info,
                min_mac_len: 0,
            },
            mem,
        )
    }

    pub(super) fn key_generate_ext(
        &mut self,
        req: KeyGenerateExtReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        self.generate(
            KeyGenRequest {
                handle: req.key_management_handle,
                key_identifier: req.key_identifier,
                out_size: req.out_key_sz,
                out_key_addr: req.out_key_addr,
                flags: req.flags,
                key_type: KeyType(req.key_type),
                key_group: req.key_group,
                key_info: req.key_info,
                min_mac_len: req.min_mac_len,
            },
            mem,
        )
    }

    pub(super) fn import_key(
        &mut self,
        req: ImportKeyReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        let key_type = KeyType(req.key_type);
        let material = Zeroizing::new(mem.load(u64::from(req.input_addr), req.input_size.into())?);
        check_material(key_type, &material)?;
        let entry = KeyEntry::new(key_type, req.key_group, req.key_info, &material);
        let store = self.service_key_store(req.key_management_handle, ServiceKind::KeyManagement)?;
        let key_identifier = store.insert(req.key_identifier, req.flags, entry)?;
        Ok(Reply::new(&KeyIdRsp {
            key_identifier,
            ..Default::default()
        }))
    }

    pub(super) fn delete_key(&mut self, req: DeleteKeyReq) -> HsmResult<Reply> {
        let store = self.service_key_store(req.key_management_handle, ServiceKind::KeyManagement)?;
        store.remove(req.key_identifier)?;
        Ok(Reply::status())
    }

    /// Install a key delivered wrapped under `kek_id` (AES-ECB), or in the
    /// clear when no key-encryption key is named.
    pub(super) fn manage_key(
        &mut self,
        req: ManageKeyReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        let key_type = KeyType(req.key_type);
        let mut material = Zeroizing::new(
            mem.load(u64::from(req.input_data_addr), req.input_data_size.into())?,
        );
        let store = self.service_key_store(req.key_management_handle, ServiceKind::KeyManagement)?;
        if req.kek_id != 0 {
            let kek = store.get(req.kek_id)?;
            if !is_aes(kek.key_type) {
                return Err(HsmError::KEY_NOT_SUPPORTED);
            }
            aes_ecb(&kek.material, &mut material, Direction::Decrypt)?;
        }
        check_material(key_type, &material)?;
        let entry = KeyEntry::new(key_type, req.key_group, req.key_info, &material);
        let key_identifier = store.insert(req.dest_key_identifier, req.flags, entry)?;
        Ok(Reply::new(&KeyIdRsp {
            key_identifier,
            ..Default::default()
        }))
    }
}

pub(crate) fn is_aes(key_type: KeyType) -> bool {
    matches!(
        key_type,
        KeyType::AES_128 | KeyType::AES_192 | KeyType::AES_256 | KeyType::SHE
    )
}

fn check_material(key_type: KeyType, material: &[u8]) -> HsmResult<()> {
    match key_type.key_size() {
        None => Err(HsmError::KEY_NOT_SUPPORTED),
        Some(size) if size != material.len() => Err(HsmError::INVALID_PARAM),
        Some(_) => Ok(()),
    }
}

// Licensed under the Apache-2.0 license

use hsm_api::message::cipher::{CipherOpenReq, CipherOpenRsp};
use hsm_api::message::hash::{HashOpenReq, HashOpenRsp};
use hsm_api::message::key_mgmt::{KeyMgmtOpenReq, KeyMgmtOpenRsp};
use hsm_api::message::key_store::{
    KeyStoreCloseReq, KeyStoreOpenReq, KeyStoreOpenRsp, KEY_STORE_FLAGS_CREATE,
};
use hsm_api::message::mac::{MacOpenReq, MacOpenRsp};
use hsm_api::message::rng::GetRandomReq;
use hsm_api::message::session::{
    SessionCloseReq, SessionOpenReq, SessionOpenRsp, SharedBufReq, SharedBufRsp,
};
use hsm_api::message::sign_gen::{SignGenOpenReq, SignGenOpenRsp};
use hsm_api::message::verify_sign::{VerifySignOpenReq, VerifySignOpenRsp};
use hsm_error::{HsmError, HsmResult};
use log::debug;
use rand::RngCore;

use super::{Engine, KeyStore, Object, Reply, ServiceKind};
use crate::memory::SharedMemory;

impl Engine {
    pub(super) fn session_open(&mut self, req: SessionOpenReq) -> HsmResult<Reply> {
        let session_handle = self.alloc_handle(Object::Session)?;
        debug!(
            "[hsm-model] session {session_handle:#x} opened for MU {} (priority {})",
            req.mu_id, req.priority
        );
        Ok(Reply::new(&SessionOpenRsp {
            session_handle,
            ..Default::default()
        }))
    }

    pub(super) fn session_close(&mut self, req: SessionCloseReq) -> HsmResult<Reply> {
        self.check_session(req.session_handle)?;
        self.remove_tree(req.session_handle);
        Ok(Reply::status())
    }

    pub(super) fn shared_buf(&mut self, req: SharedBufReq) -> HsmResult<Reply> {
        self.check_session(req.session_handle)?;
        let (shared_buf_offset, shared_buf_size) = self.shared_buf;
        Ok(Reply::new(&SharedBufRsp {
            shared_buf_offset,
            shared_buf_size,
            ..Default::default()
        }))
    }

    pub(super) fn key_store_open(&mut self, req: KeyStoreOpenReq) -> HsmResult<Reply> {
        self.check_session(req.session_handle)?;
        let in_use = self.objects.values().any(
            |o| matches!(o, Object::KeyStore { store_id, .. } if *store_id == req.key_store_id),
        );
        if in_use {
            return Err(HsmError::KEY_STORE_CONFLICT);
        }
        let password = self.key_stores.get(&req.key_store_id).map(|s| s.password);
        match password {
            Some(password) if password != req.password => return Err(HsmError::KEY_STORE_AUTH),
            Some(_) => {}
            None if req.flags & KEY_STORE_FLAGS_CREATE != 0 => {
                self.key_stores
                    .insert(req.key_store_id, KeyStore::new(req.password));
            }
            None => return Err(HsmError::UNKNOWN_KEY_STORE),
        }
        let key_store_handle = self.alloc_handle(Object::KeyStore {
            session: req.session_handle,
            store_id: req.key_store_id,
        })?;
        Ok(Reply::new(&KeyStoreOpenRsp {
            key_store_handle,
            ..Default::default()
        }))
    }

    pub(super) fn key_store_close(&mut self, req: KeyStoreCloseReq) -> HsmResult<Reply> {
        self.key_store_id(req.key_store_handle)?;
        self.remove_tree(req.key_store_handle);
        Ok(Reply::status())
    }

    fn open_service(&mut self, kind: ServiceKind, parent: u32) -> HsmResult<u32> {
        if kind.opens_on_session() {
            self.check_session(parent)?;
        } else {
            self.key_store_id(parent)?;
        }
        self.alloc_handle(Object::Service { kind, parent })
    }

    pub(super) fn close_service(&mut self, kind: ServiceKind, handle: u32) -> HsmResult<Reply> {
        self.service_parent(handle, kind)?;
        self.remove_tree(handle);
        Ok(Reply::status())
    }

    pub(super) fn key_mgmt_open(&mut self, req: KeyMgmtOpenReq) -> HsmResult<Reply> {
        let key_management_handle =
            self.open_service(ServiceKind::KeyManagement, req.key_store_handle)?;
        Ok(Reply::new(&KeyMgmtOpenRsp {
            key_management_handle,
            ..Default::default()
        }))
    }

    pub(super) fn mac_open(&mut self, req: MacOpenReq) -> HsmResult<Reply> {
        let mac_handle = self.open_service(ServiceKind::Mac, req.key_store_handle)?;
        Ok(Reply::new(&MacOpenRsp {
            mac_handle,
            ..Default::default()
        }))
    }

    pub(super) fn cipher_open(&mut self, req: CipherOpenReq) -> HsmResult<Reply> {
        let cipher_handle = self.open_service(ServiceKind::Cipher, req.key_store_handle)?;
        Ok(Reply::new(&CipherOpenRsp {
            cipher_handle,
            ..Default::default()
        }))
    }

    pub(super) fn hash_open(&mut self, req: HashOpenReq) -> HsmResult<Reply> {
        let hash_hdl = self.open_service(ServiceKind::Hash, req.session_handle)?;
        Ok(Reply::new(&HashOpenRsp {
            hash_hdl,
            ..Default::default()
        }))
    }

    pub(super) fn sign_gen_open(&mut self, req: SignGenOpenReq) -> HsmResult<Reply> {
        let sig_gen_hdl =
            self.open_service(ServiceKind::SignatureGeneration, req.key_store_hdl)?;
        Ok(Reply::new(&SignGenOpenRsp {
            sig_gen_hdl,
            ..Default::default()
        }))
    }

    pub(super) fn verify_sign_open(&mut self, req: VerifySignOpenReq) -> HsmResult<Reply> {
        let sig_ver_hdl =
            self.open_service(ServiceKind::SignatureVerification, req.session_handle)?;
        Ok(Reply::new(&VerifySignOpenRsp {
            sig_ver_hdl,
            ..Default::default()
        }))
    }

    pub(super) fn get_random(
        &mut self,
        req: GetRandomReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        self.check_session(req.session_handle)?;
        let mut random = vec![0u8; req.random_size as usize];
        self.rng.fill_bytes(&mut random);
        mem.store(u64::from(req.output_addr), &random)?;
        Ok(Reply::status())
    }
}

// Licensed under the Apache-2.0 license

use hsm_api::message::cipher::{
    CipherAlgo, CipherOneGoReq, CipherOneGoRsp, CIPHER_ONE_GO_FLAGS_DECRYPT,
    CIPHER_ONE_GO_FLAGS_ENCRYPT,
};
use hsm_api::message::hash::{HashAlgo, HashOneGoReq, HASH_FLAGS_ONE_SHOT};
use hsm_api::message::key_mgmt::KeyType;
use hsm_api::message::mac::{
    MacAlgorithm, MacOneGoReq, MacOneGoRsp, MAC_ONE_GO_FLAGS_GENERATION,
    MAC_VERIFICATION_STATUS_SUCCESS,
};
use hsm_api::message::sign_gen::{
    PrepareSignReq, SignGenerateLegacyReq, SignGeneratePsaReq, SignGeneratePsaRsp,
    SIGN_GEN_FLAGS_INPUT_MESSAGE,
};
use hsm_api::message::verify_sign::{
    VerifySignReq, VerifySignRsp, VERIFICATION_STATUS_SUCCESS, VERIFY_SIGN_FLAGS_INPUT_MESSAGE,
};
use hsm_api::message::SignatureScheme;
use hsm_error::{HsmError, HsmResult};

use super::keys::is_aes;
use super::{Engine, Reply, ServiceKind};
use crate::crypto::{aes_cbc, aes_ecb, digest, hmac, hmac_verify, Curve, Direction};
use crate::memory::SharedMemory;

const MAC_VERIFICATION_STATUS_FAILURE: u32 = 0;
const VERIFICATION_STATUS_FAILURE: u32 = 0;

fn is_hmac(key_type: KeyType) -> bool {
    matches!(
        key_type,
        KeyType::HMAC_224 | KeyType::HMAC_256 | KeyType::HMAC_384 | KeyType::HMAC_512
    )
}

/// Signature generation request with the layout differences removed.
struct SignRequest {
    handle: u32,
    key_identifier: u32,
    scheme: SignatureScheme,
    flags: u8,
    message_addr: u32,
    message_size: u32,
    signature_addr: u32,
    signature_size: u16,
}

impl Engine {
    pub(super) fn mac_one_go(
        &mut self,
        req: MacOneGoReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        let store = self.service_key_store(req.mac_handle, ServiceKind::Mac)?;
        let key = store.get(req.key_id)?;
        let algorithm = MacAlgorithm(req.algorithm);
        if algorithm != MacAlgorithm::AES_CMAC && !is_hmac(key.key_type) {
            return Err(HsmError::KEY_NOT_SUPPORTED);
        }
        let payload = mem.load(u64::from(req.payload_address), req.payload_size.into())?;
        let mac_size = usize::from(req.mac_size);
        let mac_address = u64::from(req.mac_address);

        let verification_status = if req.flags & MAC_ONE_GO_FLAGS_GENERATION != 0 {
            let mac = hmac(algorithm, &key.material, &payload)?;
            if mac_size == 0 || mac_size > mac.len() {
                return Err(HsmError::INVALID_PARAM);
            }
            mem.store(mac_address, &mac[..mac_size])?;
            0
        } else {
            if mac_size < usize::from(key.min_mac_len) {
                return Err(HsmError::INVALID_PARAM);
            }
            let tag = mem.load(mac_address, mac_size)?;
            if hmac_verify(algorithm, &key.material, &payload, &tag)? {
                MAC_VERIFICATION_STATUS_SUCCESS
            } else {
                MAC_VERIFICATION_STATUS_FAILURE
            }
        };
        Ok(Reply::new(&MacOneGoRsp {
            verification_status,
            ..Default::default()
        }))
    }

    pub(super) fn cipher_one_go(
        &mut self,
        req: CipherOneGoReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        let store = self.service_key_store(req.cipher_handle, ServiceKind::Cipher)?;
        let key = store.get(req.key_id)?;
        if !is_aes(key.key_type) {
            return Err(HsmError::KEY_NOT_SUPPORTED);
        }
        let dir = match req.flags {
            CIPHER_ONE_GO_FLAGS_ENCRYPT => Direction::Encrypt,
            CIPHER_ONE_GO_FLAGS_DECRYPT => Direction::Decrypt,
            _ => return Err(HsmError::INVALID_PARAM),
        };
        let input_size = req.input_size as usize;
        if (req.output_size as usize) < input_size {
            return Err(HsmError::OUT_TOO_SMALL);
        }

        let mut data = mem.load(u64::from(req.input_address), input_size)?;
        match CipherAlgo(req.algo) {
            CipherAlgo::AES_ECB => aes_ecb(&key.material, &mut data, dir)?,
            CipherAlgo::AES_CBC => {
                let iv = mem.load(u64::from(req.iv_address), req.iv_size.into())?;
                aes_cbc(&key.material, &iv, &mut data, dir)?
            }
            _ => return Err(HsmError::FEATURE_NOT_SUPPORTED),
        }
        mem.store(u64::from(req.output_address), &data)?;
        Ok(Reply::new(&CipherOneGoRsp {
            output_size: req.input_size,
            ..Default::default()
        }))
    }

    pub(super) fn hash_one_go(
        &mut self,
        req: HashOneGoReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        self.service_parent(req.hash_hdl, ServiceKind::Hash)?;
        // Streaming contexts are not modelled.
        if req.flags & HASH_FLAGS_ONE_SHOT == 0 {
            return Err(HsmError::FEATURE_NOT_SUPPORTED);
        }
        let input = mem.load(u64::from(req.input_addr), req.input_size as usize)?;
        let digest = digest(HashAlgo(req.algo), &input)?;
        if (req.output_size as usize) < digest.len() {
            return Err(HsmError::OUT_TOO_SMALL);
        }
        mem.store(u64::from(req.output_addr), &digest)?;
        Ok(Reply::status())
    }

    fn sign(&mut self, req: SignRequest, mem: &mut SharedMemory) -> HsmResult<u16> {
        let store = self.service_key_store(req.handle, ServiceKind::SignatureGeneration)?;
        let key = store.get(req.key_identifier)?;
        let curve = Curve::from_scheme(req.scheme);
        if Curve::from_key_type(key.key_type) != Some(curve) {
            return Err(HsmError::KEY_NOT_SUPPORTED);
        }
        if usize::from(req.signature_size) < req.scheme.signature_size() {
            return Err(HsmError::OUT_TOO_SMALL);
        }
        let message = mem.load(u64::from(req.message_addr), req.message_size as usize)?;
        let prehashed = req.flags & SIGN_GEN_FLAGS_INPUT_MESSAGE == 0;
        let signature = curve.sign(&key.material, &message, prehashed)?;
        mem.store(u64::from(req.signature_addr), &signature)?;
        Ok(signature.len() as u16)
    }

    pub(super) fn sign_generate_legacy(
        &mut self,
        req: SignGenerateLegacyReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        let scheme =
            SignatureScheme::from_legacy_id(req.scheme_id).ok_or(HsmError::INVALID_PARAM)?;
        self.sign(
            SignRequest {
                handle: req.sig_gen_hdl,
                key_identifier: req.key_identifier,
                scheme,
                flags: req.flags,
                message_addr: req.message_addr,
                message_size: req.message_size,
                signature_addr: req.signature_addr,
                signature_size: req.signature_size,
            },
            mem,
        )?;
        Ok(Reply::status())
    }

    pub(super) fn sign_generate_psa(
        &mut self,
        req: SignGeneratePsaReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        let scheme = SignatureScheme::from_psa_id(req.scheme_id).ok_or(HsmError::INVALID_PARAM)?;
        let signature_size = self.sign(
            SignRequest {
                handle: req.sig_gen_hdl,
                key_identifier: req.key_identifier,
                scheme,
                flags: req.flags,
                message_addr: req.message_addr,
                message_size: req.message_size,
                signature_addr: req.signature_addr,
                signature_size: req.signature_size,
            },
            mem,
        )?;
        Ok(Reply::new(&SignGeneratePsaRsp {
            signature_size,
            ..Default::default()
        }))
    }

    pub(super) fn sign_prepare(&mut self, req: PrepareSignReq) -> HsmResult<Reply> {
        self.service_parent(req.sig_gen_hdl, ServiceKind::SignatureGeneration)?;
        SignatureScheme::from_legacy_id(req.scheme_id).ok_or(HsmError::INVALID_PARAM)?;
        Ok(Reply::status())
    }

    pub(super) fn verify_sign(
        &mut self,
        req: VerifySignReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        self.service_parent(req.sig_ver_hdl, ServiceKind::SignatureVerification)?;
        let scheme =
            SignatureScheme::from_legacy_id(req.scheme_id).ok_or(HsmError::INVALID_PARAM)?;
        let key = mem.load(u64::from(req.key_address), req.key_size.into())?;
        let message = mem.load(u64::from(req.message_address), req.message_size as usize)?;
        let signature = mem.load(u64::from(req.signature_address), req.signature_size.into())?;
        let prehashed = req.flags & VERIFY_SIGN_FLAGS_INPUT_MESSAGE == 0;
        let verified =
            Curve::from_scheme(scheme).verify(&key, &message, &signature, prehashed)?;
        Ok(Reply::new(&VerifySignRsp {
            verification_status: if verified {
                VERIFICATION_STATUS_SUCCESS
            } else {
                VERIFICATION_STATUS_FAILURE
            },
            ..Default::default()
        }))
    }
}

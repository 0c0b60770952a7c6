// Licensed under the Apache-2.0 license

use hsm_api::message::she::{
    SheExtendSeedReq, SheGenerateMacReq, SheGetIdReq, SheGetIdRsp, SheGetStatusReq,
    SheGetStatusRsp, SheInitRngReq, SheRndReq, SheVerifyMacReq, SheVerifyMacRsp,
    SHE_CHALLENGE_SIZE, SHE_ENTROPY_SIZE, SHE_ID_SIZE, SHE_MAC_SIZE,
    SHE_MAC_VERIFICATION_SUCCESS, SHE_RND_SIZE,
};
use hsm_error::{HsmError, HsmResult};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};

use super::keys::{is_aes, KeyEntry};
use super::{Engine, Object, Reply};
use crate::crypto::{she_mac, she_mac_verify};
use crate::memory::{from_short_addr, join_addr, SharedMemory};

/// SREG bit set once the random number generator has been initialised.
const SREG_RND_INIT: u8 = 0x20;

/// Slot whose key authenticates SHE_GET_ID answers.
const MASTER_ECU_KEY_ID: u32 = 0x01;

const SHE_MAC_VERIFICATION_FAILURE: u32 = 1;

impl Engine {
    /// SHE key slots live in whichever key store is currently open.
    fn she_key(&self, key_id: u32) -> HsmResult<&KeyEntry> {
        self.objects
            .values()
            .filter_map(|o| match o {
                Object::KeyStore { store_id, .. } => self.key_stores.get(store_id),
                _ => None,
            })
            .find_map(|store| store.get(key_id).ok())
            .filter(|key| is_aes(key.key_type))
            .ok_or(HsmError::UNKNOWN_ID)
    }

    fn sreg(&self) -> u8 {
        if self.she_rng_started {
            SREG_RND_INIT
        } else {
            0
        }
    }

    fn check_rng_started(&self) -> HsmResult<()> {
        if self.she_rng_started {
            Ok(())
        } else {
            Err(HsmError::RNG_NOT_STARTED)
        }
    }

    pub(super) fn she_generate_mac(
        &mut self,
        req: SheGenerateMacReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        let key = self.she_key(u32::from(req.key_id))?;
        let message = mem.load(from_short_addr(req.data_offset), req.data_length.into())?;
        let mac = she_mac(&key.material, &message)?;
        mem.store(from_short_addr(req.mac_offset), &mac)?;
        Ok(Reply::status())
    }

    pub(super) fn she_verify_mac(
        &mut self,
        req: SheVerifyMacReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        let key = self.she_key(u32::from(req.key_id))?;
        let message = mem.load(from_short_addr(req.data_offset), req.data_length.into())?;
        let tag = mem.load(from_short_addr(req.mac_offset), req.mac_length.into())?;
        let verification_status = if she_mac_verify(&key.material, &message, &tag)? {
            SHE_MAC_VERIFICATION_SUCCESS
        } else {
            SHE_MAC_VERIFICATION_FAILURE
        };
        Ok(Reply::new(&SheVerifyMacRsp {
            verification_status,
            ..Default::default()
        }))
    }

    pub(super) fn she_init_rng(&mut self, _req: SheInitRngReq) -> HsmResult<Reply> {
        self.she_rng_started = true;
        Ok(Reply::status())
    }

    /// Fold caller entropy into the generator state.
    pub(super) fn she_extend_seed(
        &mut self,
        req: SheExtendSeedReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        self.check_rng_started()?;
        if req.entropy_size as usize != SHE_ENTROPY_SIZE {
            return Err(HsmError::INVALID_PARAM);
        }
        let entropy = mem.load(
            join_addr(req.entropy_addr_ext, req.entropy_addr),
            SHE_ENTROPY_SIZE,
        )?;
        let mut state = [0u8; 32];
        self.rng.fill_bytes(&mut state);
        let seed: [u8; 32] = Sha256::new()
            .chain_update(state)
            .chain_update(&entropy)
            .finalize()
            .into();
        self.rng = StdRng::from_seed(seed);
        Ok(Reply::status())
    }

    pub(super) fn she_rnd(&mut self, req: SheRndReq, mem: &mut SharedMemory) -> HsmResult<Reply> {
        self.check_rng_started()?;
        if req.rnd_size as usize != SHE_RND_SIZE {
            return Err(HsmError::INVALID_PARAM);
        }
        let mut rnd = [0u8; SHE_RND_SIZE];
        self.rng.fill_bytes(&mut rnd);
        mem.store(join_addr(req.rnd_addr_ext, req.rnd_addr), &rnd)?;
        Ok(Reply::status())
    }

    pub(super) fn she_get_status(&mut self, _req: SheGetStatusReq) -> HsmResult<Reply> {
        Ok(Reply::new(&SheGetStatusRsp {
            sreg: self.sreg(),
            ..Default::default()
        }))
    }

    /// Report the UID and status register, authenticated over
    /// `challenge || uid || sreg` with the master ECU key when one is loaded.
    pub(super) fn she_get_id(
        &mut self,
        req: SheGetIdReq,
        mem: &mut SharedMemory,
    ) -> HsmResult<Reply> {
        let sreg = self.sreg();
        let mut input = Vec::with_capacity(SHE_CHALLENGE_SIZE + SHE_ID_SIZE + 1);
        input.extend_from_slice(&req.challenge);
        input.extend_from_slice(&self.she_uid);
        input.push(sreg);
        let mac = match self.she_key(MASTER_ECU_KEY_ID) {
            Ok(key) => she_mac(&key.material, &input)?,
            Err(_) => [0u8; SHE_MAC_SIZE],
        };
        mem.store(join_addr(req.outputs_address_ext, req.mac_addr), &mac)?;
        Ok(Reply::new(&SheGetIdRsp {
            id: self.she_uid,
            sreg,
            ..Default::default()
        }))
    }
}

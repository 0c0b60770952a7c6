/*++

Licensed under the Apache-2.0 license.

File Name:

    she.rs

Abstract:

    Secure Hardware Extension commands. MAC, seed and status requests go to
    the session; encryption runs through a short-lived cipher service on the
    key store, keyed by the SHE slot.

--*/

use hsm_api::message::cipher::{
    CipherAlgo, CIPHER_ONE_GO_FLAGS_DECRYPT, CIPHER_ONE_GO_FLAGS_ENCRYPT,
};
use hsm_api::message::she::{she_key_id, SHE_CHALLENGE_SIZE, SHE_ID_SIZE};
use hsm_api::message::{
    CipherOneGoArgs, SheExtendSeedArgs, SheGenerateMacArgs, SheGetIdArgs, SheGetStatusArgs,
    SheRndArgs, SheVerifyMacArgs,
};
use hsm_api::{HsmApiError, HsmApiResult, MsgArgs, MsgId, Transport};
use hsm_error::HsmError;
use log::warn;

use crate::session::{args_mismatch, Session};

const SHE_BLOCK_SIZE: usize = 16;

/// Identity the engine reports for SHE_GET_ID.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SheId {
    pub id: [u8; SHE_ID_SIZE],
    pub sreg: u8,
}

impl<T: Transport> Session<T> {
    /// MAC `message` with the key in SHE slot `key_ext | key_id`.
    pub fn she_generate_mac(
        &mut self,
        key_ext: u8,
        key_id: u8,
        message: &[u8],
        mac: &mut [u8],
    ) -> HsmApiResult<()> {
        let session = self.session_hw()?;
        self.process(
            MsgId::SHE_GENERATE_MAC,
            session,
            &mut MsgArgs::SheGenerateMac(SheGenerateMacArgs {
                key_ext,
                key_id,
                message,
                mac,
            }),
        )
    }

    /// Compare the first `mac_length` bytes of `mac` against the MAC of
    /// `message`.
    ///
    /// Returns the engine's verification status,
    /// [`SHE_MAC_VERIFICATION_SUCCESS`](hsm_api::message::she::SHE_MAC_VERIFICATION_SUCCESS)
    /// on a match. An error means the MAC did not verify.
    pub fn she_verify_mac(
        &mut self,
        key_ext: u8,
        key_id: u8,
        message: &[u8],
        mac: &[u8],
        mac_length: u8,
    ) -> HsmApiResult<u32> {
        if mac_length == 0 {
            return Err(HsmApiError::Validation("SHE MAC length must be non-zero"));
        }
        let session = self.session_hw()?;
        let mut args = MsgArgs::SheVerifyMac(SheVerifyMacArgs {
            key_ext,
            key_id,
            message,
            mac,
            mac_length,
            ..Default::default()
        });
        self.process(MsgId::SHE_VERIFY_MAC, session, &mut args)?;
        let MsgArgs::SheVerifyMac(out) = args else {
            return Err(args_mismatch());
        };
        Ok(out.verification_status)
    }

    pub fn she_enc_cbc(
        &mut self,
        key_ext: u8,
        key_id: u8,
        iv: &[u8],
        input: &[u8],
        output: &mut [u8],
    ) -> HsmApiResult<()> {
        self.she_cipher(
            key_ext,
            key_id,
            CipherAlgo::AES_CBC,
            CIPHER_ONE_GO_FLAGS_ENCRYPT,
            iv,
            input,
            output,
        )
    }

    pub fn she_dec_cbc(
        &mut self,
        key_ext: u8,
        key_id: u8,
        iv: &[u8],
        input: &[u8],
        output: &mut [u8],
    ) -> HsmApiResult<()> {
        self.she_cipher(
            key_ext,
            key_id,
            CipherAlgo::AES_CBC,
            CIPHER_ONE_GO_FLAGS_DECRYPT,
            iv,
            input,
            output,
        )
    }

    pub fn she_enc_ecb(
        &mut self,
        key_ext: u8,
        key_id: u8,
        input: &[u8],
        output: &mut [u8],
    ) -> HsmApiResult<()> {
        self.she_cipher(
            key_ext,
            key_id,
            CipherAlgo::AES_ECB,
            CIPHER_ONE_GO_FLAGS_ENCRYPT,
            &[],
            input,
            output,
        )
    }

    pub fn she_dec_ecb(
        &mut self,
        key_ext: u8,
        key_id: u8,
        input: &[u8],
        output: &mut [u8],
    ) -> HsmApiResult<()> {
        self.she_cipher(
            key_ext,
            key_id,
            CipherAlgo::AES_ECB,
            CIPHER_ONE_GO_FLAGS_DECRYPT,
            &[],
            input,
            output,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn she_cipher(
        &mut self,
        key_ext: u8,
        key_id: u8,
        algo: CipherAlgo,
        flags: u8,
        iv: &[u8],
        input: &[u8],
        output: &mut [u8],
    ) -> HsmApiResult<()> {
        if input.len() % SHE_BLOCK_SIZE != 0 {
            return Err(HsmApiError::Validation("SHE data must be whole AES blocks"));
        }
        if algo == CipherAlgo::AES_CBC && iv.len() != SHE_BLOCK_SIZE {
            return Err(HsmApiError::Validation("SHE IV must be 16 bytes"));
        }
        let cipher = self.open_cipher_service()?;
        let result = self.cipher_one_go(
            cipher,
            CipherOneGoArgs {
                key_id: u32::from(she_key_id(key_ext, key_id)),
                iv,
                input,
                output,
                algo,
                flags,
                ..Default::default()
            },
        );
        match self.close_cipher_service(cipher) {
            Ok(()) => result.map(|_| ()),
            Err(err) => {
                warn!("SHE cipher service did not close: {err}");
                Err(HsmApiError::Hardware(HsmError::GENERAL_ERROR))
            }
        }
    }

    /// Start the SHE random number generator.
    pub fn she_init_rng(&mut self) -> HsmApiResult<()> {
        let session = self.session_hw()?;
        self.process(MsgId::SHE_INIT_RNG, session, &mut MsgArgs::SheInitRng)
    }

    pub fn she_extend_seed(&mut self, entropy: &[u8]) -> HsmApiResult<()> {
        let session = self.session_hw()?;
        self.process(
            MsgId::SHE_EXTEND_SEED,
            session,
            &mut MsgArgs::SheExtendSeed(SheExtendSeedArgs { entropy }),
        )
    }

    /// Fill `rnd` with 16 random bytes; needs [`Self::she_init_rng`] first.
    pub fn she_rnd(&mut self, rnd: &mut [u8]) -> HsmApiResult<()> {
        let session = self.session_hw()?;
        self.process(MsgId::SHE_RND, session, &mut MsgArgs::SheRnd(SheRndArgs { rnd }))
    }

    /// Read the SHE status register.
    pub fn she_get_status(&mut self) -> HsmApiResult<u8> {
        let session = self.session_hw()?;
        let mut args = MsgArgs::SheGetStatus(SheGetStatusArgs::default());
        self.process(MsgId::SHE_GET_STATUS, session, &mut args)?;
        let MsgArgs::SheGetStatus(out) = args else {
            return Err(args_mismatch());
        };
        Ok(out.sreg)
    }

    /// Read the engine identity, authenticated over `challenge`.
    ///
    /// `mac` receives the MAC over challenge, identity and status register;
    /// it is zeroed when the request fails.
    pub fn she_get_id(
        &mut self,
        challenge: [u8; SHE_CHALLENGE_SIZE],
        mac: &mut [u8],
    ) -> HsmApiResult<SheId> {
        let result = self.get_id(challenge, mac);
        if result.is_err() {
            mac.fill(0);
        }
        result
    }

    fn get_id(
        &mut self,
        challenge: [u8; SHE_CHALLENGE_SIZE],
        mac: &mut [u8],
    ) -> HsmApiResult<SheId> {
        let session = self.session_hw()?;
        let mut args = MsgArgs::SheGetId(SheGetIdArgs {
            challenge,
            mac,
            ..Default::default()
        });
        self.process(MsgId::SHE_GET_ID, session, &mut args)?;
        let MsgArgs::SheGetId(out) = args else {
            return Err(args_mismatch());
        };
        Ok(SheId {
            id: out.id,
            sreg: out.sreg,
        })
    }
}

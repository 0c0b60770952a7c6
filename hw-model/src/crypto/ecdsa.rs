// Licensed under the Apache-2.0 license

use hsm_api::message::key_mgmt::KeyType;
use hsm_api::message::SignatureScheme;
use hsm_error::{HsmError, HsmResult};
use rand::rngs::StdRng;
use zeroize::Zeroizing;

macro_rules! curve_ops {
    ($name:ident, $curve:ident) => {
        mod $name {
            use super::*;
            use $curve::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
            use $curve::ecdsa::signature::{Signer, Verifier};
            use $curve::ecdsa::{Signature, SigningKey, VerifyingKey};

            fn encode_public(key: &VerifyingKey) -> Vec<u8> {
                // Drop the SEC1 uncompressed-point tag
                key.to_encoded_point(false).as_bytes()[1..].to_vec()
            }

            fn signing_key(secret: &[u8]) -> HsmResult<SigningKey> {
                SigningKey::from_slice(secret).map_err(|_| HsmError::INVALID_PARAM)
            }

            pub fn generate(rng: &mut StdRng) -> (Zeroizing<Vec<u8>>, Vec<u8>) {
                let key = SigningKey::random(rng);
                let public = encode_public(key.verifying_key());
                (Zeroizing::new(key.to_bytes().to_vec()), public)
            }

            pub fn public_key(secret: &[u8]) -> HsmResult<Vec<u8>> {
                Ok(encode_public(signing_key(secret)?.verifying_key()))
            }

            pub fn sign(secret: &[u8], input: &[u8], prehashed: bool) -> HsmResult<Vec<u8>> {
                let key = signing_key(secret)?;
                let signature: Signature = if prehashed {
                    key.sign_prehash(input)
                        .map_err(|_| HsmError::INVALID_PARAM)?
                } else {
                    key.sign(input)
                };
                Ok(signature.to_bytes().to_vec())
            }

            pub fn verify(
                public: &[u8],
                input: &[u8],
                signature: &[u8],
                prehashed: bool,
            ) -> HsmResult<bool> {
                let mut sec1 = Vec::with_capacity(public.len() + 1);
                sec1.push(0x04);
                sec1.extend_from_slice(public);
                let key =
                    VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| HsmError::INVALID_PARAM)?;
                let Ok(signature) = Signature::from_slice(signature) else {
                    return Ok(false);
                };
                let result = if prehashed {
                    key.verify_prehash(input, &signature)
                } else {
                    key.verify(input, &signature)
                };
                Ok(result.is_ok())
            }
        }
    };
}

curve_ops!(nist_p256, p256);
curve_ops!(nist_p384, p384);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Curve {
    P256,
    P384,
}

impl Curve {
    pub fn from_key_type(key_type: KeyType) -> Option<Self> {
        match key_type {
            KeyType::ECDSA_NIST_P256 => Some(Self::P256),
            KeyType::ECDSA_NIST_P384 => Some(Self::P384),
            _ => None,
        }
    }

    pub fn from_scheme(scheme: SignatureScheme) -> Self {
        match scheme {
            SignatureScheme::EcdsaP256Sha256 => Self::P256,
            SignatureScheme::EcdsaP384Sha384 => Self::P384,
        }
    }

    /// Generate a key pair; returns the private scalar and `x || y`.
    pub fn generate(&self, rng: &mut StdRng) -> (Zeroizing<Vec<u8>>, Vec<u8>) {
        match self {
            Self::P256 => nist_p256::generate(rng),
            Self::P384 => nist_p384::generate(rng),
        }
    }

    pub fn public_key(&self, secret: &[u8]) -> HsmResult<Vec<u8>> {
        match self {
            Self::P256 => nist_p256::public_key(secret),
            Self::P384 => nist_p384::public_key(secret),
        }
    }

    /// Sign `input`, hashing it first unless `prehashed`. Returns `r || s`.
    pub fn sign(&self, secret: &[u8], input: &[u8], prehashed: bool) -> HsmResult<Vec<u8>> {
        match self {
            Self::P256 => nist_p256::sign(secret, input, prehashed),
            Self::P384 => nist_p384::sign(secret, input, prehashed),
        }
    }

    pub fn verify(
        &self,
        public: &[u8],
        input: &[u8],
        signature: &[u8],
        prehashed: bool,
    ) -> HsmResult<bool> {
        match self {
            Self::P256 => nist_p256::verify(public, input, signature, prehashed),
            Self::P384 => nist_p384::verify(public, input, signature, prehashed),
        }
    }
}

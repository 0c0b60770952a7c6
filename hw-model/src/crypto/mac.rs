// Licensed under the Apache-2.0 license

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use hsm_api::message::mac::MacAlgorithm;
use hsm_api::message::she::SHE_MAC_SIZE;
use hsm_error::{HsmError, HsmResult};
use sha2::{Sha224, Sha256, Sha384, Sha512};

fn compute<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> HsmResult<Vec<u8>> {
    let mut mac = <M as Mac>::new_from_slice(key).map_err(|_| HsmError::INVALID_PARAM)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn verify<M: Mac + KeyInit>(key: &[u8], data: &[u8], tag: &[u8]) -> HsmResult<bool> {
    let mut mac = <M as Mac>::new_from_slice(key).map_err(|_| HsmError::INVALID_PARAM)?;
    mac.update(data);
    Ok(mac.verify_truncated_left(tag).is_ok())
}

pub fn hmac(algorithm: MacAlgorithm, key: &[u8], data: &[u8]) -> HsmResult<Vec<u8>> {
    match algorithm {
        MacAlgorithm::HMAC_SHA_224 => compute::<Hmac<Sha224>>(key, data),
        MacAlgorithm::HMAC_SHA_256 => compute::<Hmac<Sha256>>(key, data),
        MacAlgorithm::HMAC_SHA_384 => compute::<Hmac<Sha384>>(key, data),
        MacAlgorithm::HMAC_SHA_512 => compute::<Hmac<Sha512>>(key, data),
        _ => Err(HsmError::FEATURE_NOT_SUPPORTED),
    }
}

/// Check `tag` against the leftmost `tag.len()` bytes of the MAC.
pub fn hmac_verify(
    algorithm: MacAlgorithm,
    key: &[u8],
    data: &[u8],
    tag: &[u8],
) -> HsmResult<bool> {
    if tag.is_empty() {
        return Err(HsmError::INVALID_PARAM);
    }
    match algorithm {
        MacAlgorithm::HMAC_SHA_224 => verify::<Hmac<Sha224>>(key, data, tag),
        MacAlgorithm::HMAC_SHA_256 => verify::<Hmac<Sha256>>(key, data, tag),
        MacAlgorithm::HMAC_SHA_384 => verify::<Hmac<Sha384>>(key, data, tag),
        MacAlgorithm::HMAC_SHA_512 => verify::<Hmac<Sha512>>(key, data, tag),
        _ => Err(HsmError::FEATURE_NOT_SUPPORTED),
    }
}

/// MAC used for SHE keys.
///
/// The model has no CMAC; it uses HMAC-SHA-256 truncated to the SHE MAC size.
pub fn she_mac(key: &[u8], data: &[u8]) -> HsmResult<[u8; SHE_MAC_SIZE]> {
    let full = compute::<Hmac<Sha256>>(key, data)?;
    let mut mac = [0u8; SHE_MAC_SIZE];
    mac.copy_from_slice(&full[..SHE_MAC_SIZE]);
    Ok(mac)
}

/// Check `tag` against the leftmost bytes of the SHE MAC.
pub fn she_mac_verify(key: &[u8], data: &[u8], tag: &[u8]) -> HsmResult<bool> {
    if tag.is_empty() || tag.len() > SHE_MAC_SIZE {
        return Err(HsmError::INVALID_PARAM);
    }
    verify::<Hmac<Sha256>>(key, data, tag)
}

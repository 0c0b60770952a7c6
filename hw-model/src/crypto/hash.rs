// Licensed under the Apache-2.0 license

use hsm_api::message::hash::HashAlgo;
use hsm_error::{HsmError, HsmResult};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

pub fn digest(algo: HashAlgo, data: &[u8]) -> HsmResult<Vec<u8>> {
    let digest = match algo {
        HashAlgo::SHA_224 => Sha224::digest(data).to_vec(),
        HashAlgo::SHA_256 => Sha256::digest(data).to_vec(),
        HashAlgo::SHA_384 => Sha384::digest(data).to_vec(),
        HashAlgo::SHA_512 => Sha512::digest(data).to_vec(),
        _ => return Err(HsmError::INVALID_PARAM),
    };
    Ok(digest)
}

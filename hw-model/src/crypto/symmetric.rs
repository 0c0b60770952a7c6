// Licensed under the Apache-2.0 license

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{
    BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit,
};
use aes::{Aes128, Aes192, Aes256};
use hsm_error::{HsmError, HsmResult};

pub const AES_BLOCK_SIZE: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

macro_rules! ecb {
    ($cipher:ty, $key:expr, $data:expr, $dir:expr) => {{
        let cipher = <$cipher>::new_from_slice($key).map_err(|_| HsmError::KEY_NOT_SUPPORTED)?;
        for block in $data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(block);
            match $dir {
                Direction::Encrypt => cipher.encrypt_block(block),
                Direction::Decrypt => cipher.decrypt_block(block),
            }
        }
    }};
}

macro_rules! cbc {
    ($cipher:ty, $key:expr, $iv:expr, $data:expr, $dir:expr) => {{
        match $dir {
            Direction::Encrypt => {
                let mut mode = cbc::Encryptor::<$cipher>::new_from_slices($key, $iv)
                    .map_err(|_| HsmError::INVALID_PARAM)?;
                for block in $data.chunks_exact_mut(AES_BLOCK_SIZE) {
                    mode.encrypt_block_mut(GenericArray::from_mut_slice(block));
                }
            }
            Direction::Decrypt => {
                let mut mode = cbc::Decryptor::<$cipher>::new_from_slices($key, $iv)
                    .map_err(|_| HsmError::INVALID_PARAM)?;
                for block in $data.chunks_exact_mut(AES_BLOCK_SIZE) {
                    mode.decrypt_block_mut(GenericArray::from_mut_slice(block));
                }
            }
        }
    }};
}

fn check_blocks(data: &[u8]) -> HsmResult<()> {
    if data.len() % AES_BLOCK_SIZE != 0 {
        return Err(HsmError::INVALID_PARAM);
    }
    Ok(())
}

/// AES in ECB mode, in place. `data` must be a whole number of blocks.
pub fn aes_ecb(key: &[u8], data: &mut [u8], dir: Direction) -> HsmResult<()> {
    check_blocks(data)?;
    match key.len() {
        16 => ecb!(Aes128, key, data, dir),
        24 => ecb!(Aes192, key, data, dir),
        32 => ecb!(Aes256, key, data, dir),
        _ => return Err(HsmError::KEY_NOT_SUPPORTED),
    }
    Ok(())
}

/// AES in CBC mode without padding, in place.
pub fn aes_cbc(key: &[u8], iv: &[u8], data: &mut [u8], dir: Direction) -> HsmResult<()> {
    check_blocks(data)?;
    if iv.len() != AES_BLOCK_SIZE {
        return Err(HsmError::INVALID_PARAM);
    }
    match key.len() {
        16 => cbc!(Aes128, key, iv, data, dir),
        24 => cbc!(Aes192, key, iv, data, dir),
        32 => cbc!(Aes256, key, iv, data, dir),
        _ => return Err(HsmError::KEY_NOT_SUPPORTED),
    }
    Ok(())
}

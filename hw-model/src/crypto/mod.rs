// Licensed under the Apache-2.0 license

//! Software implementations of the engine's algorithms.

mod ecdsa;
mod hash;
mod mac;
mod symmetric;

pub use ecdsa::Curve;
pub use hash::digest;
pub use mac::{hmac, hmac_verify, she_mac, she_mac_verify};
pub use symmetric::{aes_cbc, aes_ecb, Direction, AES_BLOCK_SIZE};

// Licensed under the Apache-2.0 license

//! Response code layout.
//!
//! Every engine response carries a 32-bit `rsp_code` right after the header.
//! Bits 0..7 hold the status (success or failure) and bits 8..15 hold the
//! rating, which names the failure reason.

use hsm_error::{HsmError, HsmResult};

pub const SUCCESS_STATUS: u8 = 0xD6;
pub const FAILURE_STATUS: u8 = 0x29;

pub fn status_code(rsp_code: u32) -> u8 {
    (rsp_code & 0xFF) as u8
}

pub fn rating_code(rsp_code: u32) -> u8 {
    ((rsp_code >> 8) & 0xFF) as u8
}

/// Compose a response code; used by engine models.
pub const fn rsp_code(status: u8, rating: u8) -> u32 {
    (status as u32) | ((rating as u32) << 8)
}

pub const fn success_rsp_code() -> u32 {
    rsp_code(SUCCESS_STATUS, 0)
}

pub const fn failure_rsp_code(err: HsmError) -> u32 {
    // Catalogued codes are rating bytes.
    rsp_code(FAILURE_STATUS, (err.0.get() & 0xFF) as u8)
}

/// Translate a response code into a result.
///
/// Anything other than the success status is a failure whose reason is the
/// rating. Ratings the engine did not catalogue collapse to
/// [`HsmError::GENERAL_ERROR`].
pub fn rsp_code_to_result(rsp_code: u32) -> HsmResult<()> {
    if status_code(rsp_code) == SUCCESS_STATUS {
        Ok(())
    } else {
        Err(HsmError::from_rating(rating_code(rsp_code)))
    }
}

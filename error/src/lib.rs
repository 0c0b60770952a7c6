/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Closed error-code space reported by the secure engine, and the
    translation from engine response ratings into it.

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::fmt;
use core::num::{NonZeroU32, TryFromIntError};

/// Secure engine error type
/// Derives debug, copy, clone, eq, and partial eq
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct HsmError(pub NonZeroU32);

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, rating, doc) tuples and generates a
/// constant for each code, the rating lookup, and the name lookup. The value
/// of each constant is the rating byte the engine reports for it.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:literal, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: HsmError = HsmError::new_const($value);
        )*

        /// Translate an engine rating byte into an error code.
        ///
        /// Total over `u8`: ratings with no catalogued meaning (including 0,
        /// which is not a failure rating) map to [`HsmError::GENERAL_ERROR`].
        pub const fn from_rating(rating: u8) -> HsmError {
            match rating as u32 {
                $(
                    $value => Self::$name,
                )*
                _ => Self::GENERAL_ERROR,
            }
        }

        /// Symbolic name of a catalogued code.
        pub fn name(&self) -> Option<&'static str> {
            match self.0.get() {
                $(
                    $value => Some(stringify!($name)),
                )*
                _ => None,
            }
        }

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl HsmError {
    /// Create an engine error; intended to only be used from const contexts, as we don't want
    /// runtime panics if val is zero. The preferred way to get an HsmError from a u32 is to
    /// use `HsmError::try_from()` from the `TryFrom` trait impl.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("HsmError cannot be 0"),
        }
    }

    define_error_constants![
        (INVALID_MESSAGE, 0x01, "Invalid or unknown message"),
        (INVALID_ADDRESS, 0x02, "Invalid address"),
        (UNKNOWN_ID, 0x03, "Unknown identifier"),
        (INVALID_PARAM, 0x04, "Invalid parameter"),
        (NVM_ERROR, 0x05, "Non-volatile memory error"),
        (OUT_OF_MEMORY, 0x06, "Engine is out of memory"),
        (UNKNOWN_HANDLE, 0x07, "Unknown session or service handle"),
        (UNKNOWN_KEY_STORE, 0x08, "Key store identified by id is unknown"),
        (KEY_STORE_AUTH, 0x09, "Key store authentication failed"),
        (KEY_STORE_ERROR, 0x0A, "Key store creation or load failed"),
        (ID_CONFLICT, 0x0B, "Key identifier already in use"),
        (RNG_NOT_STARTED, 0x0C, "Random number generator not started"),
        (CMD_NOT_SUPPORTED, 0x0D, "Command not supported"),
        (INVALID_LIFECYCLE, 0x0E, "Invalid lifecycle for this request"),
        (KEY_STORE_CONFLICT, 0x0F, "Key store already opened by another session"),
        (KEY_STORE_COUNTER, 0x10, "Monotonic counter update failed"),
        (FEATURE_NOT_SUPPORTED, 0x11, "Feature not supported"),
        (SELF_TEST_FAILURE, 0x12, "Self test failed"),
        (NOT_READY, 0x13, "Engine not ready"),
        (FEATURE_DISABLED, 0x14, "Feature disabled"),
        (KEY_GROUP_FULL, 0x19, "No room left in the key group"),
        (CANNOT_RETRIEVE_KEY_GROUP, 0x1A, "Key group cannot be retrieved"),
        (KEY_NOT_SUPPORTED, 0x1B, "Key type not supported"),
        (CANNOT_DELETE_PERMANENT_KEY, 0x1C, "Permanent keys cannot be deleted"),
        (OUT_TOO_SMALL, 0x1D, "Output buffer too small"),
        (FATAL_FAILURE, 0x29, "Fatal failure"),
        (CRC_CHECK_ERR, 0xB9, "Request checksum mismatch"),
        (SERVICES_DISABLED, 0xF4, "Engine services disabled"),
        (UNKNOWN_WARNING, 0xFC, "Unknown warning"),
        (SIGNATURE_INVALID, 0xFD, "Signature is invalid"),
        (UNKNOWN_ERROR, 0xFE, "Unknown error"),
        (GENERAL_ERROR, 0xFF, "General error"),
    ];

    /// Rating byte the engine uses for this code.
    pub fn rating(&self) -> u8 {
        // Every catalogued code fits a byte; anything wider came from try_from.
        u8::try_from(self.0.get()).unwrap_or(0xFF)
    }
}

impl fmt::Display for HsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({:#04x})", self.0.get()),
            None => write!(f, "{:#x}", self.0.get()),
        }
    }
}

impl From<core::num::NonZeroU32> for crate::HsmError {
    fn from(val: core::num::NonZeroU32) -> Self {
        crate::HsmError(val)
    }
}

impl From<HsmError> for core::num::NonZeroU32 {
    fn from(val: HsmError) -> Self {
        val.0
    }
}

impl From<HsmError> for u32 {
    fn from(val: HsmError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for HsmError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(HsmError(val)),
            Err(err) => Err(err),
        }
    }
}

pub type HsmResult<T> = Result<T, HsmError>;

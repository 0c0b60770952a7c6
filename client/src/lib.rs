/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Client for the secure engine's message interface. A [`Session`] owns
    the transport and every service opened through it.

--*/

mod cipher;
pub mod config;
pub mod handle;
mod hash;
mod key_mgmt;
mod mac;
mod rng;
mod session;
mod she;
mod sign_gen;
mod verify_sign;

pub use config::{load_session_config, SessionConfig};
pub use handle::{ServiceContext, ServiceHandle, ServiceKind};
pub use hsm_api::{message, HsmApiError, HsmApiResult, MessageFlavor, ServiceFamilies, Transport};
pub use session::Session;
pub use she::SheId;

// Licensed under the Apache-2.0 license

use std::sync::Once;

use hsm_api::message::key_mgmt::{KeyType, KEY_GEN_FLAGS_CREATE};
use hsm_api::message::ImportKeyArgs;
use hsm_client::{Session, SessionConfig};
use hsm_hw_model::{HwModel, InitParams, ModelEmulated};

pub const AES_128_KEY: [u8; 16] = [
    0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f, 0x3c,
];

pub const AES_IV: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        // Another test binary in the same process may already own the logger.
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
    });
}

pub fn start_model() -> ModelEmulated {
    init_logger();
    ModelEmulated::init(InitParams::default()).unwrap()
}

pub fn open_session(model: &mut ModelEmulated) -> Session<&mut ModelEmulated> {
    open_session_with(model, &SessionConfig::default())
}

pub fn open_session_with<'a>(
    model: &'a mut ModelEmulated,
    config: &SessionConfig,
) -> Session<&'a mut ModelEmulated> {
    Session::open(model, config).unwrap()
}

/// Import `key` through a short-lived key management service.
pub fn import_key(
    session: &mut Session<&mut ModelEmulated>,
    key_identifier: u32,
    key_type: KeyType,
    key: &[u8],
) -> u32 {
    let key_mgmt = session.open_key_management_service().unwrap();
    let id = session
        .import_key(
            key_mgmt,
            ImportKeyArgs {
                key_identifier,
                input: key,
                flags: KEY_GEN_FLAGS_CREATE,
                key_type,
                ..Default::default()
            },
        )
        .unwrap();
    session.close_key_management_service(key_mgmt).unwrap();
    id
}

// Licensed under the Apache-2.0 license

use hmac::{Hmac, Mac};
use hsm_api::message::key_mgmt::{KeyType, KEY_GEN_FLAGS_CREATE};
use hsm_api::message::mac::{
    MacAlgorithm, MAC_ONE_GO_FLAGS_GENERATION, MAC_ONE_GO_FLAGS_VERIFICATION,
    MAC_VERIFICATION_STATUS_SUCCESS,
};
use hsm_api::message::{KeyGenerateArgs, MacOneGoArgs};
use hsm_api::MsgId;
use hsm_client::HsmApiError;
use hsm_error::HsmError;
use hsm_hw_model::HwModel;
use sha2::Sha256;

use crate::common::{import_key, open_session, start_model};

const KEY: [u8; 32] = [0x0b; 32];

fn reference_mac(data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(&KEY).unwrap();
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[test]
fn test_hmac_generate_and_verify() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let key_id = import_key(&mut session, 0, KeyType::HMAC_256, &KEY);
    let mac_service = session.open_mac_service().unwrap();

    let mut mac = [0u8; 32];
    session
        .mac_one_go(
            mac_service,
            MacOneGoArgs {
                key_id,
                payload: b"Hi There",
                mac: &mut mac,
                flags: MAC_ONE_GO_FLAGS_GENERATION,
                algorithm: MacAlgorithm::HMAC_SHA_256,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(mac.to_vec(), reference_mac(b"Hi There"));

    let status = session
        .mac_one_go(
            mac_service,
            MacOneGoArgs {
                key_id,
                payload: b"Hi There",
                mac: &mut mac,
                flags: MAC_ONE_GO_FLAGS_VERIFICATION,
                algorithm: MacAlgorithm::HMAC_SHA_256,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(status, MAC_VERIFICATION_STATUS_SUCCESS);

    mac[0] ^= 1;
    let status = session
        .mac_one_go(
            mac_service,
            MacOneGoArgs {
                key_id,
                payload: b"Hi There",
                mac: &mut mac,
                flags: MAC_ONE_GO_FLAGS_VERIFICATION,
                algorithm: MacAlgorithm::HMAC_SHA_256,
                ..Default::default()
            },
        )
        .unwrap();
    assert_ne!(status, MAC_VERIFICATION_STATUS_SUCCESS);
    session.close_mac_service(mac_service).unwrap();

    assert_eq!(
        session.close_mac_service(mac_service),
        Err(HsmApiError::UnknownHandle)
    );
    let sent = session.transport().count_requests(MsgId::MAC_ONE_GO);
    assert_eq!(
        session.mac_one_go(
            mac_service,
            MacOneGoArgs {
                key_id,
                payload: b"Hi There",
                mac: &mut mac,
                flags: MAC_ONE_GO_FLAGS_GENERATION,
                algorithm: MacAlgorithm::HMAC_SHA_256,
                ..Default::default()
            },
        ),
        Err(HsmApiError::UnknownHandle)
    );
    assert_eq!(session.transport().count_requests(MsgId::MAC_ONE_GO), sent);
}

#[test]
fn test_truncated_mac() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let key_id = import_key(&mut session, 0, KeyType::HMAC_256, &KEY);
    let mac_service = session.open_mac_service().unwrap();

    let mut mac = [0u8; 16];
    session
        .mac_one_go(
            mac_service,
            MacOneGoArgs {
                key_id,
                payload: b"",
                mac: &mut mac,
                flags: MAC_ONE_GO_FLAGS_GENERATION,
                algorithm: MacAlgorithm::HMAC_SHA_256,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(mac.to_vec(), reference_mac(b"")[..16].to_vec());
}

#[test]
fn test_min_mac_length_enforced() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let key_mgmt = session.open_key_management_service().unwrap();
    let key_id = session
        .generate_key_ext(
            key_mgmt,
            KeyGenerateArgs {
                flags: KEY_GEN_FLAGS_CREATE,
                key_type: KeyType::HMAC_256,
                min_mac_len: 32,
                ..Default::default()
            },
        )
        .unwrap();
    let mac_service = session.open_mac_service().unwrap();

    let mut mac = [0u8; 32];
    session
        .mac_one_go(
            mac_service,
            MacOneGoArgs {
                key_id,
                payload: b"payload",
                mac: &mut mac,
                flags: MAC_ONE_GO_FLAGS_GENERATION,
                algorithm: MacAlgorithm::HMAC_SHA_256,
                ..Default::default()
            },
        )
        .unwrap();
    let result = session.mac_one_go(
        mac_service,
        MacOneGoArgs {
            key_id,
            payload: b"payload",
            mac: &mut mac[..16],
            flags: MAC_ONE_GO_FLAGS_VERIFICATION,
            algorithm: MacAlgorithm::HMAC_SHA_256,
            ..Default::default()
        },
    );
    assert_eq!(result, Err(HsmApiError::Hardware(HsmError::INVALID_PARAM)));
}

#[test]
fn test_cmac_not_supported() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let key_id = import_key(&mut session, 0, KeyType::AES_128, &[0x11; 16]);
    let mac_service = session.open_mac_service().unwrap();
    let mut mac = [0u8; 16];
    let result = session.mac_one_go(
        mac_service,
        MacOneGoArgs {
            key_id,
            payload: b"payload",
            mac: &mut mac,
            flags: MAC_ONE_GO_FLAGS_GENERATION,
            algorithm: MacAlgorithm::AES_CMAC,
            ..Default::default()
        },
    );
    assert_eq!(
        result.map_err(|e| e.code()),
        Err(HsmError::FEATURE_NOT_SUPPORTED)
    );
    assert_eq!(mac, [0u8; 16]);
}

// Licensed under the Apache-2.0 license

use hsm_api::message::key_mgmt::KeyType;
use hsm_api::message::mac::{MacAlgorithm, MAC_ONE_GO_FLAGS_GENERATION};
use hsm_api::message::MacOneGoArgs;
use hsm_api::MsgId;
use hsm_client::{HsmApiError, Session, SessionConfig};
use hsm_error::HsmError;
use hsm_hw_model::{Fault, HwModel};

use crate::common::{import_key, open_session, start_model};

#[test]
fn test_transport_failure_ignores_response() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let key_id = import_key(&mut session, 0, KeyType::HMAC_256, &[0x0b; 32]);
    let mac_service = session.open_mac_service().unwrap();

    session.transport_mut().inject_fault(Fault::TransportFailure);
    let mut mac = [0u8; 32];
    let err = session
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
        .unwrap_err();
    assert!(matches!(err, HsmApiError::Transport(_)));
    assert_eq!(err.code(), HsmError::GENERAL_ERROR);
    assert_eq!(mac, [0u8; 32]);
    assert_eq!(session.transport().live_registrations(), 0);

    // The service is still usable afterwards.
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
    assert_ne!(mac, [0u8; 32]);
}

#[test]
fn test_transport_failure_on_open_frees_slot() {
    let mut model = start_model();
    let config = SessionConfig {
        max_services: 2,
        ..Default::default()
    };
    let mut session = Session::open(&mut model, &config).unwrap();
    session.transport_mut().inject_fault(Fault::TransportFailure);
    assert!(matches!(
        session.open_hash_service(),
        Err(HsmApiError::Transport(_))
    ));
    assert_eq!(session.open_services(), 1);
    // The reserved slot was handed back.
    session.open_hash_service().unwrap();
}

#[test]
fn test_engine_rejection_code() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    session
        .transport_mut()
        .inject_fault(Fault::Reject(MsgId::HASH_OPEN, HsmError::OUT_OF_MEMORY));
    let err = session.open_hash_service().unwrap_err();
    assert_eq!(err, HsmApiError::Hardware(HsmError::OUT_OF_MEMORY));
    assert_eq!(err.code(), HsmError::OUT_OF_MEMORY);
    assert_eq!(session.open_services(), 1);
}

#[test]
fn test_close_completes_despite_transport_failure() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    session.open_cipher_service().unwrap();
    session.transport_mut().inject_fault(Fault::TransportFailure);
    assert!(matches!(session.close(), Err(HsmApiError::Transport(_))));
    assert!(!session.is_open());
    assert_eq!(session.open_services(), 0);
    drop(session);
    // Only the cipher close was lost; the key store close took it down.
    assert_eq!(model.live_handles(), 0);
    assert_eq!(model.count_requests(MsgId::SESSION_CLOSE), 1);
}

#[test]
fn test_get_random() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let mut first = [0u8; 48];
    let mut second = [0u8; 48];
    session.get_random(&mut first).unwrap();
    session.get_random(&mut second).unwrap();
    assert_ne!(first, [0u8; 48]);
    assert_ne!(first, second);
    session.get_random(&mut []).unwrap();

    session.close().unwrap();
    assert_eq!(
        session.get_random(&mut first),
        Err(HsmApiError::UnknownHandle)
    );
}

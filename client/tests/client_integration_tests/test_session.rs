// Licensed under the Apache-2.0 license

use hsm_api::message::key_store::KEY_STORE_FLAGS_LOAD;
use hsm_api::{MsgId, ServiceFamilies};
use hsm_client::{HsmApiError, ServiceKind, Session, SessionConfig};
use hsm_error::HsmError;
use hsm_hw_model::{Fault, HwModel, ServiceKind as EngineService};

use crate::common::{open_session, open_session_with, start_model};

#[test]
fn test_open_and_close() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    assert!(session.is_open());
    assert_ne!(session.session_id(), 0);
    assert_eq!(session.shared_buf(), hsm_hw_model::DEFAULT_SHARED_BUF);
    let key_store = session.key_store().unwrap();
    assert_eq!(session.resolve(key_store).unwrap().kind, ServiceKind::KeyStore);
    // Session and key store
    assert_eq!(session.transport().live_handles(), 2);

    session.close().unwrap();
    assert!(!session.is_open());
    assert_eq!(session.session_id(), 0);
    assert_eq!(session.key_store(), None);
    assert_eq!(session.open_services(), 0);
    assert_eq!(session.transport().live_handles(), 0);

    // A second close is a no-op.
    session.close().unwrap();
    drop(session);
    assert_eq!(model.count_requests(MsgId::SESSION_CLOSE), 1);
    // The model was lent to the session, not handed over.
    assert!(!model.is_closed());
}

#[test]
fn test_bootstrap_sequence() {
    let mut model = start_model();
    drop(open_session(&mut model));
    assert_eq!(
        model.command_log(),
        &[
            MsgId::SESSION_OPEN.0,
            MsgId::SHARED_BUF.0,
            MsgId::KEY_STORE_OPEN.0,
            MsgId::KEY_STORE_CLOSE.0,
            MsgId::SESSION_CLOSE.0,
        ]
    );
}

#[test]
fn test_drop_closes_everything() {
    let mut model = start_model();
    {
        let mut session = open_session(&mut model);
        session.open_mac_service().unwrap();
        session.open_hash_service().unwrap();
        assert_eq!(session.transport().live_handles(), 4);
    }
    assert_eq!(model.live_handles(), 0);
    assert_eq!(model.live_registrations(), 0);
}

#[test]
fn test_close_tears_down_children_newest_first() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let mac = session.open_mac_service().unwrap();
    session.open_cipher_service().unwrap();
    session.open_signature_verification_service().unwrap();
    session.close().unwrap();
    assert_eq!(session.resolve(mac), Err(HsmApiError::UnknownHandle));
    drop(session);

    let closes: Vec<u8> = model
        .command_log()
        .iter()
        .copied()
        .filter(|c| {
            [
                MsgId::MAC_CLOSE.0,
                MsgId::CIPHER_CLOSE.0,
                MsgId::VERIFY_SIGN_CLOSE.0,
                MsgId::KEY_STORE_CLOSE.0,
                MsgId::SESSION_CLOSE.0,
            ]
            .contains(c)
        })
        .collect();
    assert_eq!(
        closes,
        vec![
            MsgId::VERIFY_SIGN_CLOSE.0,
            MsgId::CIPHER_CLOSE.0,
            MsgId::MAC_CLOSE.0,
            MsgId::KEY_STORE_CLOSE.0,
            MsgId::SESSION_CLOSE.0,
        ]
    );
    assert_eq!(model.live_handles(), 0);
}

#[test]
fn test_close_reports_first_error_and_completes() {
    let mut model = start_model();
    model.inject_fault(Fault::Reject(MsgId::MAC_CLOSE, HsmError::NOT_READY));
    let mut session = open_session(&mut model);
    session.open_mac_service().unwrap();
    assert_eq!(
        session.close(),
        Err(HsmApiError::Hardware(HsmError::NOT_READY))
    );
    assert!(!session.is_open());
    assert_eq!(session.open_services(), 0);
    // Closing the key store took the MAC service down with it.
    assert_eq!(session.transport().live_handles(), 0);
}

#[test]
fn test_service_lifecycle() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let mac = session.open_mac_service().unwrap();
    let ctx = session.resolve(mac).unwrap();
    assert_eq!(ctx.kind, ServiceKind::Mac);
    assert_eq!(ctx.parent, session.key_store());
    assert_eq!(session.transport().live_services(EngineService::Mac), 1);

    session.close_mac_service(mac).unwrap();
    assert_eq!(session.transport().live_services(EngineService::Mac), 0);
    assert_eq!(
        session.close_mac_service(mac),
        Err(HsmApiError::UnknownHandle)
    );

    let hash = session.open_hash_service().unwrap();
    assert_eq!(session.resolve(hash).unwrap().parent, None);
}

#[test]
fn test_stale_handle_never_reaches_engine() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let first = session.open_mac_service().unwrap();
    session.close_mac_service(first).unwrap();
    // The engine hands out the freed handle value again.
    let second = session.open_mac_service().unwrap();
    assert_eq!(
        session.resolve(first).map(|c| c.hw_handle),
        Err(HsmApiError::UnknownHandle)
    );
    assert_ne!(first, second);
    assert_eq!(
        session.close_mac_service(first),
        Err(HsmApiError::UnknownHandle)
    );
    assert_eq!(session.transport().live_services(EngineService::Mac), 1);
}

#[test]
fn test_handle_from_closed_session_rejected() {
    let mut model = start_model();
    let stale = {
        let mut first = open_session(&mut model);
        let mac = first.open_mac_service().unwrap();
        first.close().unwrap();
        mac
    };

    let mut second = open_session(&mut model);
    let fresh = second.open_mac_service().unwrap();
    assert_ne!(stale, fresh);
    assert_eq!(second.resolve(stale), Err(HsmApiError::UnknownHandle));
    assert_eq!(
        second.close_mac_service(stale),
        Err(HsmApiError::UnknownHandle)
    );
    assert!(second.resolve(fresh).is_ok());
    assert_eq!(second.transport().live_services(EngineService::Mac), 1);
    second.close_mac_service(fresh).unwrap();
}

#[test]
fn test_handle_of_other_kind_rejected() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let hash = session.open_hash_service().unwrap();
    assert_eq!(
        session.close_mac_service(hash),
        Err(HsmApiError::UnknownHandle)
    );
    session.close_hash_service(hash).unwrap();
}

#[test]
fn test_disabled_family_not_supported() {
    let mut model = start_model();
    let config = SessionConfig {
        families: vec!["mac".into()],
        ..Default::default()
    };
    let mut session = open_session_with(&mut model, &config);
    assert_eq!(
        session.dispatch_table().families(),
        ServiceFamilies::REQUIRED | ServiceFamilies::MAC
    );
    session.open_mac_service().unwrap();
    assert_eq!(
        session.open_cipher_service(),
        Err(HsmApiError::NotSupported(MsgId::CIPHER_OPEN.0))
    );
    assert_eq!(session.open_services(), 2);
    drop(session);
    assert_eq!(model.count_requests(MsgId::CIPHER_OPEN), 0);
}

#[test]
fn test_service_limit() {
    let mut model = start_model();
    let config = SessionConfig {
        max_services: 2,
        ..Default::default()
    };
    let mut session = open_session_with(&mut model, &config);
    let mac = session.open_mac_service().unwrap();
    assert_eq!(session.open_hash_service(), Err(HsmApiError::OutOfHandles));
    session.close_mac_service(mac).unwrap();
    session.open_hash_service().unwrap();
    drop(session);
    assert_eq!(model.count_requests(MsgId::HASH_OPEN), 1);
}

#[test]
fn test_failed_bootstrap_releases_session() {
    let mut model = start_model();
    model.inject_fault(Fault::Reject(MsgId::KEY_STORE_OPEN, HsmError::KEY_STORE_AUTH));
    assert!(matches!(
        Session::open(&mut model, &SessionConfig::default()),
        Err(HsmApiError::Hardware(HsmError::KEY_STORE_AUTH))
    ));
    assert_eq!(model.live_handles(), 0);
    assert_eq!(model.count_requests(MsgId::SESSION_CLOSE), 1);
}

#[test]
fn test_key_store_persists_across_sessions() {
    let mut model = start_model();
    let mut config = SessionConfig::from_toml_str(
        r#"
        [key_store]
        id = 0x77
        password = 0x1234
        "#,
    )
    .unwrap();
    drop(open_session_with(&mut model, &config));

    config.key_store.flags = KEY_STORE_FLAGS_LOAD;
    let mut session = open_session_with(&mut model, &config);
    session.close().unwrap();
    drop(session);

    config.key_store.password = 0x4321;
    assert!(matches!(
        Session::open(&mut model, &config),
        Err(HsmApiError::Hardware(HsmError::KEY_STORE_AUTH))
    ));

    config.key_store.id = 0x78;
    assert!(matches!(
        Session::open(&mut model, &config),
        Err(HsmApiError::Hardware(HsmError::UNKNOWN_KEY_STORE))
    ));
    assert_eq!(model.live_handles(), 0);
}

#[test]
fn test_owned_transport() {
    let model = start_model();
    let session = Session::open(model, &SessionConfig::default()).unwrap();
    assert!(!session.transport().is_closed());
    assert_eq!(session.transport().live_handles(), 2);
}

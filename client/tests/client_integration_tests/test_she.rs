// Licensed under the Apache-2.0 license

use hmac::{Hmac, Mac};
use hsm_api::message::key_mgmt::KeyType;
use hsm_api::message::she::{she_key_id, SHE_MAC_VERIFICATION_SUCCESS};
use hsm_api::MsgId;
use hsm_client::HsmApiError;
use hsm_error::HsmError;
use hsm_hw_model::{Fault, HwModel, InitParams, ServiceKind as EngineService};
use sha2::Sha256;

use crate::common::{import_key, open_session, start_model, AES_128_KEY, AES_IV};

const SHE_KEY: [u8; 16] = [0xA5; 16];

// Status register bit set once the SHE generator runs
const SREG_RND_INIT: u8 = 0x20;

#[test]
fn test_mac_generate_and_verify() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    import_key(
        &mut session,
        u32::from(she_key_id(0, 4)),
        KeyType::SHE,
        &SHE_KEY,
    );

    let mut mac = [0u8; 16];
    session
        .she_generate_mac(0, 4, b"brake controller", &mut mac)
        .unwrap();
    assert_ne!(mac, [0u8; 16]);

    assert_eq!(
        session.she_verify_mac(0, 4, b"brake controller", &mac, 16),
        Ok(SHE_MAC_VERIFICATION_SUCCESS)
    );
    // Only the leading bytes are compared.
    let mut partial = mac;
    partial[15] ^= 0xFF;
    assert_eq!(
        session.she_verify_mac(0, 4, b"brake controller", &partial, 8),
        Ok(SHE_MAC_VERIFICATION_SUCCESS)
    );
    assert_ne!(
        session.she_verify_mac(0, 4, b"steering controller", &mac, 16),
        Ok(SHE_MAC_VERIFICATION_SUCCESS)
    );
    assert_eq!(
        session.she_verify_mac(0, 9, b"brake controller", &mac, 16),
        Err(HsmApiError::Hardware(HsmError::UNKNOWN_ID))
    );
    assert!(matches!(
        session.she_verify_mac(0, 4, b"brake controller", &mac, 0),
        Err(HsmApiError::Validation(_))
    ));
}

#[test]
fn test_cbc_through_temporary_service() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    import_key(
        &mut session,
        u32::from(she_key_id(0, 5)),
        KeyType::SHE,
        &AES_128_KEY,
    );
    let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();

    let mut ciphertext = [0u8; 16];
    session
        .she_enc_cbc(0, 5, &AES_IV, &plaintext, &mut ciphertext)
        .unwrap();
    assert_eq!(
        hex::encode(ciphertext),
        "7649abac8119b246cee98e9b12e9197d"
    );
    let mut decrypted = [0u8; 16];
    session
        .she_dec_cbc(0, 5, &AES_IV, &ciphertext, &mut decrypted)
        .unwrap();
    assert_eq!(decrypted.to_vec(), plaintext);

    // Each call opened and closed its own cipher service.
    assert_eq!(session.transport().live_services(EngineService::Cipher), 0);
    assert_eq!(session.open_services(), 1);
    drop(session);
    assert_eq!(model.count_requests(MsgId::CIPHER_OPEN), 2);
    assert_eq!(model.count_requests(MsgId::CIPHER_CLOSE), 2);
}

#[test]
fn test_ecb_round_trip() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    import_key(
        &mut session,
        u32::from(she_key_id(0, 6)),
        KeyType::SHE,
        &AES_128_KEY,
    );
    let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
    let mut ciphertext = [0u8; 16];
    session
        .she_enc_ecb(0, 6, &plaintext, &mut ciphertext)
        .unwrap();
    assert_eq!(
        hex::encode(ciphertext),
        "3ad77bb40d7a3660a89ecaf32466ef97"
    );
    let mut decrypted = [0u8; 16];
    session
        .she_dec_ecb(0, 6, &ciphertext, &mut decrypted)
        .unwrap();
    assert_eq!(decrypted.to_vec(), plaintext);

    assert!(matches!(
        session.she_enc_ecb(0, 6, &plaintext[..10], &mut ciphertext),
        Err(HsmApiError::Validation(_))
    ));
}

#[test]
fn test_cipher_close_failure_is_general_error() {
    let mut model = start_model();
    model.inject_fault(Fault::Reject(MsgId::CIPHER_CLOSE, HsmError::NOT_READY));
    let mut session = open_session(&mut model);
    import_key(
        &mut session,
        u32::from(she_key_id(0, 5)),
        KeyType::SHE,
        &AES_128_KEY,
    );
    let mut output = [0u8; 16];
    assert_eq!(
        session.she_enc_ecb(0, 5, &[0u8; 16], &mut output),
        Err(HsmApiError::Hardware(HsmError::GENERAL_ERROR))
    );
    // The service is forgotten either way.
    assert_eq!(session.open_services(), 1);
}

#[test]
fn test_rng() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let mut rnd = [0u8; 16];
    assert_eq!(
        session.she_rnd(&mut rnd),
        Err(HsmApiError::Hardware(HsmError::RNG_NOT_STARTED))
    );
    assert_eq!(session.she_get_status().unwrap() & SREG_RND_INIT, 0);

    session.she_init_rng().unwrap();
    assert_eq!(
        session.she_get_status().unwrap() & SREG_RND_INIT,
        SREG_RND_INIT
    );
    session.she_extend_seed(&[0x33; 16]).unwrap();
    session.she_rnd(&mut rnd).unwrap();
    assert_ne!(rnd, [0u8; 16]);

    let mut next = [0u8; 16];
    session.she_rnd(&mut next).unwrap();
    assert_ne!(rnd, next);

    assert!(matches!(
        session.she_extend_seed(&[0x33; 8]),
        Err(HsmApiError::Validation(_))
    ));
    let mut short = [0u8; 8];
    assert!(matches!(
        session.she_rnd(&mut short),
        Err(HsmApiError::Validation(_))
    ));
}

#[test]
fn test_get_id() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let challenge = [0x11; 16];
    let mut mac = [0xFF; 16];

    // No master ECU key: the MAC is all zeros.
    let id = session.she_get_id(challenge, &mut mac).unwrap();
    assert_eq!(id.id, InitParams::default().she_uid);
    assert_eq!(id.sreg, 0);
    assert_eq!(mac, [0u8; 16]);

    import_key(&mut session, 1, KeyType::SHE, &SHE_KEY);
    let id = session.she_get_id(challenge, &mut mac).unwrap();

    let mut expected = Hmac::<Sha256>::new_from_slice(&SHE_KEY).unwrap();
    expected.update(&challenge);
    expected.update(&id.id);
    expected.update(&[id.sreg]);
    assert_eq!(mac[..], expected.finalize().into_bytes()[..16]);
}

#[test]
fn test_get_id_checksum_failure_zeroes_mac() {
    let mut model = start_model();
    model.inject_fault(Fault::CorruptResponseChecksum);
    let mut session = open_session(&mut model);
    let mut mac = [0xFF; 16];
    assert!(matches!(
        session.she_get_id([0; 16], &mut mac),
        Err(HsmApiError::IntegrityFailure { .. })
    ));
    assert_eq!(mac, [0u8; 16]);
}

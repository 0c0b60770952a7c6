// Licensed under the Apache-2.0 license

use hsm_api::message::cipher::{
    CipherAlgo, CIPHER_ONE_GO_FLAGS_DECRYPT, CIPHER_ONE_GO_FLAGS_ENCRYPT,
};
use hsm_api::message::key_mgmt::KeyType;
use hsm_api::message::CipherOneGoArgs;
use hsm_api::MsgId;
use hsm_client::HsmApiError;
use hsm_error::HsmError;
use hsm_hw_model::HwModel;

use crate::common::{import_key, open_session, start_model, AES_128_KEY, AES_IV};

const PLAINTEXT: &str = "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51";

#[test]
fn test_cbc_known_answer_and_round_trip() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let key_id = import_key(&mut session, 0, KeyType::AES_128, &AES_128_KEY);
    let cipher = session.open_cipher_service().unwrap();
    let plaintext = hex::decode(PLAINTEXT).unwrap();

    let mut ciphertext = [0u8; 32];
    let written = session
        .cipher_one_go(
            cipher,
            CipherOneGoArgs {
                key_id,
                iv: &AES_IV,
                input: &plaintext,
                output: &mut ciphertext,
                algo: CipherAlgo::AES_CBC,
                flags: CIPHER_ONE_GO_FLAGS_ENCRYPT,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(written, 32);
    assert_eq!(
        hex::encode(&ciphertext[..16]),
        "7649abac8119b246cee98e9b12e9197d"
    );

    let mut decrypted = [0u8; 32];
    session
        .cipher_one_go(
            cipher,
            CipherOneGoArgs {
                key_id,
                iv: &AES_IV,
                input: &ciphertext,
                output: &mut decrypted,
                algo: CipherAlgo::AES_CBC,
                flags: CIPHER_ONE_GO_FLAGS_DECRYPT,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(decrypted.to_vec(), plaintext);
    session.close_cipher_service(cipher).unwrap();
}

#[test]
fn test_ecb_in_secure_memory() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let key_id = import_key(&mut session, 0, KeyType::AES_128, &AES_128_KEY);
    let cipher = session.open_cipher_service().unwrap();
    let plaintext = hex::decode(PLAINTEXT).unwrap();

    let mut ciphertext = [0u8; 16];
    session
        .cipher_one_go(
            cipher,
            CipherOneGoArgs {
                key_id,
                input: &plaintext[..16],
                output: &mut ciphertext,
                algo: CipherAlgo::AES_ECB,
                flags: CIPHER_ONE_GO_FLAGS_ENCRYPT,
                sec_mem: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(
        hex::encode(ciphertext),
        "3ad77bb40d7a3660a89ecaf32466ef97"
    );
    assert_eq!(session.transport().live_registrations(), 0);
}

#[test]
fn test_short_output_rejected_locally() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let key_id = import_key(&mut session, 0, KeyType::AES_128, &AES_128_KEY);
    let cipher = session.open_cipher_service().unwrap();
    let mut output = [0u8; 16];
    let result = session.cipher_one_go(
        cipher,
        CipherOneGoArgs {
            key_id,
            input: &[0u8; 32],
            output: &mut output,
            algo: CipherAlgo::AES_ECB,
            flags: CIPHER_ONE_GO_FLAGS_ENCRYPT,
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(HsmApiError::Validation(_))));
    drop(session);
    assert_eq!(model.count_requests(MsgId::CIPHER_ONE_GO), 0);
}

#[test]
fn test_unknown_key() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let cipher = session.open_cipher_service().unwrap();
    let mut output = [0u8; 16];
    let result = session.cipher_one_go(
        cipher,
        CipherOneGoArgs {
            key_id: 0x99,
            input: &[0u8; 16],
            output: &mut output,
            algo: CipherAlgo::AES_ECB,
            flags: CIPHER_ONE_GO_FLAGS_ENCRYPT,
            ..Default::default()
        },
    );
    assert_eq!(result, Err(HsmApiError::Hardware(HsmError::UNKNOWN_ID)));
}

// Licensed under the Apache-2.0 license

use hsm_api::message::cipher::{CipherAlgo, CIPHER_ONE_GO_FLAGS_ENCRYPT};
use hsm_api::message::key_mgmt::{
    KeyType, KEY_GEN_FLAGS_CREATE, KEY_GEN_FLAGS_UPDATE, KEY_INFO_PERMANENT,
};
use hsm_api::message::{
    CipherOneGoArgs, DeleteKeyArgs, ImportKeyArgs, KeyGenerateArgs, ManageKeyArgs,
};
use hsm_client::{HsmApiError, Session};
use hsm_error::HsmError;
use hsm_hw_model::ModelEmulated;

use crate::common::{import_key, open_session, start_model, AES_128_KEY};

fn ecb_encrypt(session: &mut Session<&mut ModelEmulated>, key_id: u32, input: &[u8]) -> Vec<u8> {
    let cipher = session.open_cipher_service().unwrap();
    let mut output = vec![0u8; input.len()];
    session
        .cipher_one_go(
            cipher,
            CipherOneGoArgs {
                key_id,
                input,
                output: &mut output,
                algo: CipherAlgo::AES_ECB,
                flags: CIPHER_ONE_GO_FLAGS_ENCRYPT,
                ..Default::default()
            },
        )
        .unwrap();
    session.close_cipher_service(cipher).unwrap();
    output
}

#[test]
fn test_import_and_delete() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let key_mgmt = session.open_key_management_service().unwrap();
    let key_id = session
        .import_key(
            key_mgmt,
            ImportKeyArgs {
                key_identifier: 0x20,
                input: &AES_128_KEY,
                flags: KEY_GEN_FLAGS_CREATE,
                key_type: KeyType::AES_128,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(key_id, 0x20);

    // The identifier is taken.
    assert_eq!(
        session.import_key(
            key_mgmt,
            ImportKeyArgs {
                key_identifier: 0x20,
                input: &AES_128_KEY,
                flags: KEY_GEN_FLAGS_CREATE,
                key_type: KeyType::AES_128,
                ..Default::default()
            },
        ),
        Err(HsmApiError::Hardware(HsmError::ID_CONFLICT))
    );

    let delete = DeleteKeyArgs {
        key_identifier: key_id,
        flags: 0,
    };
    session.delete_key(key_mgmt, delete).unwrap();
    assert_eq!(
        session.delete_key(key_mgmt, delete),
        Err(HsmApiError::Hardware(HsmError::UNKNOWN_ID))
    );
    session.close_key_management_service(key_mgmt).unwrap();
}

#[test]
fn test_permanent_key_survives_delete() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let key_mgmt = session.open_key_management_service().unwrap();
    let key_id = session
        .generate_key(
            key_mgmt,
            KeyGenerateArgs {
                flags: KEY_GEN_FLAGS_CREATE,
                key_type: KeyType::AES_256,
                key_info: KEY_INFO_PERMANENT,
                ..Default::default()
            },
        )
        .unwrap();
    assert_ne!(key_id, 0);
    assert_eq!(
        session.delete_key(
            key_mgmt,
            DeleteKeyArgs {
                key_identifier: key_id,
                flags: 0,
            }
        ),
        Err(HsmApiError::Hardware(HsmError::CANNOT_DELETE_PERMANENT_KEY))
    );
}

#[test]
fn test_update_replaces_material() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let key_id = import_key(&mut session, 0, KeyType::AES_128, &AES_128_KEY);
    let before = ecb_encrypt(&mut session, key_id, &[0u8; 16]);

    let key_mgmt = session.open_key_management_service().unwrap();
    let updated = session
        .generate_key(
            key_mgmt,
            KeyGenerateArgs {
                key_identifier: key_id,
                flags: KEY_GEN_FLAGS_UPDATE,
                key_type: KeyType::AES_128,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated, key_id);
    assert_eq!(
        session.generate_key(
            key_mgmt,
            KeyGenerateArgs {
                key_identifier: key_id,
                flags: KEY_GEN_FLAGS_UPDATE,
                key_type: KeyType::AES_256,
                ..Default::default()
            },
        ),
        Err(HsmApiError::Hardware(HsmError::KEY_NOT_SUPPORTED))
    );
    session.close_key_management_service(key_mgmt).unwrap();

    assert_ne!(ecb_encrypt(&mut session, key_id, &[0u8; 16]), before);
}

#[test]
fn test_manage_key_unwraps() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let kek = import_key(&mut session, 0, KeyType::AES_128, &[0x42; 16]);
    let wrapped = ecb_encrypt(&mut session, kek, &AES_128_KEY);

    let key_mgmt = session.open_key_management_service().unwrap();
    let key_id = session
        .manage_key(
            key_mgmt,
            ManageKeyArgs {
                kek_id: kek,
                input_data: &wrapped,
                flags: KEY_GEN_FLAGS_CREATE,
                key_type: KeyType::AES_128,
                ..Default::default()
            },
        )
        .unwrap();
    session.close_key_management_service(key_mgmt).unwrap();

    let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
    assert_eq!(
        hex::encode(ecb_encrypt(&mut session, key_id, &plaintext)),
        "3ad77bb40d7a3660a89ecaf32466ef97"
    );
}

#[test]
fn test_empty_import_rejected() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let key_mgmt = session.open_key_management_service().unwrap();
    assert!(matches!(
        session.import_key(key_mgmt, ImportKeyArgs::default()),
        Err(HsmApiError::Validation(_))
    ));
}

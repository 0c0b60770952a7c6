// Licensed under the Apache-2.0 license

use hsm_api::message::key_mgmt::{KeyType, KEY_GEN_FLAGS_CREATE};
use hsm_api::message::sign_gen::SIGN_GEN_FLAGS_INPUT_MESSAGE;
use hsm_api::message::verify_sign::{
    VERIFICATION_STATUS_SUCCESS, VERIFY_SIGN_FLAGS_INPUT_MESSAGE,
};
use hsm_api::message::{
    KeyGenerateArgs, PrepareSignArgs, SignGenerateArgs, SignatureScheme, VerifySignArgs,
};
use hsm_api::MessageFlavor;
use hsm_client::{HsmApiError, Session, SessionConfig};
use hsm_error::HsmError;
use hsm_hw_model::{HwModel, InitParams, ModelEmulated};

use crate::common::{init_logger, open_session, start_model};

const MESSAGE: &[u8] = b"attested payload";

fn generate_key_pair(
    session: &mut Session<&mut ModelEmulated>,
    key_type: KeyType,
    public_key: &mut [u8],
) -> u32 {
    let key_mgmt = session.open_key_management_service().unwrap();
    let key_id = session
        .generate_key(
            key_mgmt,
            KeyGenerateArgs {
                out_key: public_key,
                flags: KEY_GEN_FLAGS_CREATE,
                key_type,
                ..Default::default()
            },
        )
        .unwrap();
    session.close_key_management_service(key_mgmt).unwrap();
    key_id
}

fn verify(
    session: &mut Session<&mut ModelEmulated>,
    scheme: SignatureScheme,
    key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> u32 {
    let verifier = session.open_signature_verification_service().unwrap();
    let status = session
        .verify_signature(
            verifier,
            VerifySignArgs {
                key,
                message,
                signature,
                scheme,
                flags: VERIFY_SIGN_FLAGS_INPUT_MESSAGE,
                ..Default::default()
            },
        )
        .unwrap();
    session
        .close_signature_verification_service(verifier)
        .unwrap();
    status
}

#[test]
fn test_sign_and_verify_p256() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let mut public_key = [0u8; 64];
    let key_id = generate_key_pair(&mut session, KeyType::ECDSA_NIST_P256, &mut public_key);
    assert_ne!(public_key, [0u8; 64]);

    let signer = session.open_signature_generation_service().unwrap();
    session
        .prepare_signature(
            signer,
            PrepareSignArgs {
                scheme: SignatureScheme::EcdsaP256Sha256,
                flags: SIGN_GEN_FLAGS_INPUT_MESSAGE,
            },
        )
        .unwrap();
    let mut signature = [0u8; 64];
    let size = session
        .generate_signature(
            signer,
            SignGenerateArgs {
                key_identifier: key_id,
                message: MESSAGE,
                signature: &mut signature,
                scheme: SignatureScheme::EcdsaP256Sha256,
                flags: SIGN_GEN_FLAGS_INPUT_MESSAGE,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(size, 64);
    session.close_signature_generation_service(signer).unwrap();

    let scheme = SignatureScheme::EcdsaP256Sha256;
    assert_eq!(
        verify(&mut session, scheme, &public_key, MESSAGE, &signature),
        VERIFICATION_STATUS_SUCCESS
    );
    assert_ne!(
        verify(&mut session, scheme, &public_key, b"tampered payload", &signature),
        VERIFICATION_STATUS_SUCCESS
    );
}

#[test]
fn test_psa_layout_p384() {
    init_logger();
    let mut model = ModelEmulated::init(InitParams {
        flavor: MessageFlavor::Psa,
        ..Default::default()
    })
    .unwrap();
    let config = SessionConfig {
        psa_compliant: true,
        ..Default::default()
    };
    let mut session = Session::open(&mut model, &config).unwrap();
    assert_eq!(session.flavor(), MessageFlavor::Psa);

    let mut public_key = [0u8; 96];
    let key_id = generate_key_pair(&mut session, KeyType::ECDSA_NIST_P384, &mut public_key);
    let signer = session.open_signature_generation_service().unwrap();
    // Larger than needed: the engine reports what it wrote.
    let mut signature = [0u8; 128];
    let size = session
        .generate_signature(
            signer,
            SignGenerateArgs {
                key_identifier: key_id,
                message: MESSAGE,
                signature: &mut signature,
                scheme: SignatureScheme::EcdsaP384Sha384,
                flags: SIGN_GEN_FLAGS_INPUT_MESSAGE,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(size, 96);

    assert_eq!(
        verify(
            &mut session,
            SignatureScheme::EcdsaP384Sha384,
            &public_key,
            MESSAGE,
            &signature[..96]
        ),
        VERIFICATION_STATUS_SUCCESS
    );
}

#[test]
fn test_scheme_must_match_key() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let mut public_key = [0u8; 64];
    let key_id = generate_key_pair(&mut session, KeyType::ECDSA_NIST_P256, &mut public_key);
    let signer = session.open_signature_generation_service().unwrap();
    let mut signature = [0u8; 96];
    let result = session.generate_signature(
        signer,
        SignGenerateArgs {
            key_identifier: key_id,
            message: MESSAGE,
            signature: &mut signature,
            scheme: SignatureScheme::EcdsaP384Sha384,
            flags: SIGN_GEN_FLAGS_INPUT_MESSAGE,
            ..Default::default()
        },
    );
    assert_eq!(
        result,
        Err(HsmApiError::Hardware(HsmError::KEY_NOT_SUPPORTED))
    );
    assert_eq!(signature, [0u8; 96]);
}

#[test]
fn test_public_key_buffer_checked() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let key_mgmt = session.open_key_management_service().unwrap();
    let mut public_key = [0u8; 32];
    let result = session.generate_key(
        key_mgmt,
        KeyGenerateArgs {
            out_key: &mut public_key,
            flags: KEY_GEN_FLAGS_CREATE,
            key_type: KeyType::ECDSA_NIST_P256,
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(HsmApiError::Validation(_))));
    assert_eq!(session.transport().live_registrations(), 0);
}

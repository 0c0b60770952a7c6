// Licensed under the Apache-2.0 license

use hsm_api::message::hash::{HashAlgo, HASH_FLAGS_ONE_SHOT};
use hsm_api::message::HashOneGoArgs;
use hsm_client::HsmApiError;
use hsm_error::HsmError;

use crate::common::{open_session, start_model};

#[test]
fn test_sha256_and_sha384() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let hash = session.open_hash_service().unwrap();

    let mut digest = [0u8; 32];
    session
        .hash_one_go(
            hash,
            HashOneGoArgs {
                input: b"abc",
                output: &mut digest,
                algo: HashAlgo::SHA_256,
                flags: HASH_FLAGS_ONE_SHOT,
            },
        )
        .unwrap();
    assert_eq!(
        hex::encode(digest),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );

    let mut digest = [0u8; 48];
    session
        .hash_one_go(
            hash,
            HashOneGoArgs {
                input: b"abc",
                output: &mut digest,
                algo: HashAlgo::SHA_384,
                flags: HASH_FLAGS_ONE_SHOT,
            },
        )
        .unwrap();
    assert_eq!(
        hex::encode(digest),
        "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded1631a8b605a43ff5bed\
         8086072ba1e7cc2358baeca134c825a7"
    );
    session.close_hash_service(hash).unwrap();
}

#[test]
fn test_empty_input() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let hash = session.open_hash_service().unwrap();
    let mut digest = [0u8; 32];
    session
        .hash_one_go(
            hash,
            HashOneGoArgs {
                input: b"",
                output: &mut digest,
                algo: HashAlgo::SHA_256,
                flags: HASH_FLAGS_ONE_SHOT,
            },
        )
        .unwrap();
    assert_eq!(
        hex::encode(digest),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn test_streaming_not_supported() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let hash = session.open_hash_service().unwrap();
    let mut digest = [0u8; 32];
    let result = session.hash_one_go(
        hash,
        HashOneGoArgs {
            input: b"abc",
            output: &mut digest,
            algo: HashAlgo::SHA_256,
            flags: 0,
        },
    );
    assert_eq!(
        result,
        Err(HsmApiError::Hardware(HsmError::FEATURE_NOT_SUPPORTED))
    );
}

#[test]
fn test_small_digest_buffer() {
    let mut model = start_model();
    let mut session = open_session(&mut model);
    let hash = session.open_hash_service().unwrap();
    let mut digest = [0u8; 16];
    let result = session.hash_one_go(
        hash,
        HashOneGoArgs {
            input: b"abc",
            output: &mut digest,
            algo: HashAlgo::SHA_512,
            flags: HASH_FLAGS_ONE_SHOT,
        },
    );
    assert!(matches!(result, Err(HsmApiError::Validation(_))));
}

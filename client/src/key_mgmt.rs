/*++

Licensed under the Apache-2.0 license.

File Name:

    key_mgmt.rs

Abstract:

    Key management service: create, import, wrap-inject and delete keys in
    the session's key store.

--*/

use hsm_api::message::{DeleteKeyArgs, ImportKeyArgs, KeyGenerateArgs, ManageKeyArgs};
use hsm_api::{HsmApiError, HsmApiResult, MsgArgs, MsgId, Transport};

use crate::handle::{ServiceHandle, ServiceKind};
use crate::session::{args_mismatch, Session};

impl<T: Transport> Session<T> {
    pub fn open_key_management_service(&mut self) -> HsmApiResult<ServiceHandle> {
        self.open_service(ServiceKind::KeyManagement, 0)
    }

    pub fn close_key_management_service(&mut self, handle: ServiceHandle) -> HsmApiResult<()> {
        self.close_service(handle, ServiceKind::KeyManagement)
    }

    /// Generate a key and return its identifier.
    ///
    /// For asymmetric key types the public key is written to `out_key`.
    pub fn generate_key(
        &mut self,
        handle: ServiceHandle,
        args: KeyGenerateArgs<'_>,
    ) -> HsmApiResult<u32> {
        self.key_generate(handle, MsgId::KEY_GENERATE, args)
    }

    /// Like [`Self::generate_key`], additionally binding the minimum MAC
    /// length a verification with the key accepts.
    pub fn generate_key_ext(
        &mut self,
        handle: ServiceHandle,
        args: KeyGenerateArgs<'_>,
    ) -> HsmApiResult<u32> {
        self.key_generate(handle, MsgId::KEY_GENERATE_EXT, args)
    }

    fn key_generate(
        &mut self,
        handle: ServiceHandle,
        msg_id: MsgId,
        args: KeyGenerateArgs<'_>,
    ) -> HsmApiResult<u32> {
        if let Some(size) = args.key_type.public_key_size() {
            if args.out_key.len() < size {
                return Err(HsmApiError::Validation("public key buffer too small"));
            }
        }
        let mut args = MsgArgs::KeyGenerate(args);
        self.call(handle, ServiceKind::KeyManagement, msg_id, &mut args)?;
        let MsgArgs::KeyGenerate(out) = args else {
            return Err(args_mismatch());
        };
        Ok(out.key_identifier)
    }

    /// Import plaintext key material and return the assigned identifier.
    pub fn import_key(
        &mut self,
        handle: ServiceHandle,
        args: ImportKeyArgs<'_>,
    ) -> HsmApiResult<u32> {
        if args.input.is_empty() {
            return Err(HsmApiError::Validation("no key material"));
        }
        let mut args = MsgArgs::ImportKey(args);
        self.call(handle, ServiceKind::KeyManagement, MsgId::IMPORT_KEY, &mut args)?;
        let MsgArgs::ImportKey(out) = args else {
            return Err(args_mismatch());
        };
        Ok(out.key_identifier)
    }

    pub fn delete_key(&mut self, handle: ServiceHandle, args: DeleteKeyArgs) -> HsmApiResult<()> {
        self.call(
            handle,
            ServiceKind::KeyManagement,
            MsgId::DELETE_KEY,
            &mut MsgArgs::DeleteKey(args),
        )
    }

    /// Inject a key wrapped under `kek_id`; returns the destination
    /// identifier.
    pub fn manage_key(
        &mut self,
        handle: ServiceHandle,
        args: ManageKeyArgs<'_>,
    ) -> HsmApiResult<u32> {
        let mut args = MsgArgs::ManageKey(args);
        self.call(handle, ServiceKind::KeyManagement, MsgId::MANAGE_KEY, &mut args)?;
        let MsgArgs::ManageKey(out) = args else {
            return Err(args_mismatch());
        };
        Ok(out.dest_key_identifier)
    }
}

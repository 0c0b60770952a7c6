// Licensed under the Apache-2.0 license

use hsm_api::message::{PrepareSignArgs, SignGenerateArgs};
use hsm_api::{HsmApiError, HsmApiResult, MsgArgs, MsgId, Transport};

use crate::handle::{ServiceHandle, ServiceKind};
use crate::session::{args_mismatch, Session};

impl<T: Transport> Session<T> {
    pub fn open_signature_generation_service(&mut self) -> HsmApiResult<ServiceHandle> {
        self.open_service(ServiceKind::SignatureGeneration, 0)
    }

    pub fn close_signature_generation_service(
        &mut self,
        handle: ServiceHandle,
    ) -> HsmApiResult<()> {
        self.close_service(handle, ServiceKind::SignatureGeneration)
    }

    /// Sign `message` (or a digest of it, per `flags`) with a key from the
    /// key store. Returns the signature size.
    ///
    /// Legacy firmware does not report a size; the whole `signature` buffer
    /// counts as written.
    pub fn generate_signature(
        &mut self,
        handle: ServiceHandle,
        args: SignGenerateArgs<'_>,
    ) -> HsmApiResult<u16> {
        if args.signature.len() < args.scheme.signature_size() {
            return Err(HsmApiError::Validation("signature buffer too small"));
        }
        let mut args = MsgArgs::SignGenerate(args);
        self.call(
            handle,
            ServiceKind::SignatureGeneration,
            MsgId::SIGN_GENERATE,
            &mut args,
        )?;
        let MsgArgs::SignGenerate(out) = args else {
            return Err(args_mismatch());
        };
        Ok(out.signature_size)
    }

    pub fn prepare_signature(
        &mut self,
        handle: ServiceHandle,
        args: PrepareSignArgs,
    ) -> HsmApiResult<()> {
        self.call(
            handle,
            ServiceKind::SignatureGeneration,
            MsgId::SIGN_PREPARE,
            &mut MsgArgs::PrepareSign(args),
        )
    }
}

// Licensed under the Apache-2.0 license

use hsm_api::message::VerifySignArgs;
use hsm_api::{HsmApiError, HsmApiResult, MsgArgs, MsgId, Transport};

use crate::handle::{ServiceHandle, ServiceKind};
use crate::session::{args_mismatch, Session};

impl<T: Transport> Session<T> {
    pub fn open_signature_verification_service(&mut self) -> HsmApiResult<ServiceHandle> {
        self.open_service(ServiceKind::SignatureVerification, 0)
    }

    pub fn close_signature_verification_service(
        &mut self,
        handle: ServiceHandle,
    ) -> HsmApiResult<()> {
        self.close_service(handle, ServiceKind::SignatureVerification)
    }

    /// Verify a signature against an external public key.
    ///
    /// A signature that does not verify is not an error: the returned status
    /// differs from
    /// [`VERIFICATION_STATUS_SUCCESS`](hsm_api::message::verify_sign::VERIFICATION_STATUS_SUCCESS).
    pub fn verify_signature(
        &mut self,
        handle: ServiceHandle,
        args: VerifySignArgs<'_>,
    ) -> HsmApiResult<u32> {
        if args.key.is_empty() || args.signature.is_empty() {
            return Err(HsmApiError::Validation("missing key or signature"));
        }
        let mut args = MsgArgs::VerifySign(args);
        self.call(
            handle,
            ServiceKind::SignatureVerification,
            MsgId::VERIFY_SIGN,
            &mut args,
        )?;
        let MsgArgs::VerifySign(out) = args else {
            return Err(args_mismatch());
        };
        Ok(out.verification_status)
    }
}

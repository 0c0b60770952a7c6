// Licensed under the Apache-2.0 license

use hsm_api::message::CipherOneGoArgs;
use hsm_api::{HsmApiError, HsmApiResult, MsgArgs, MsgId, Transport};

use crate::handle::{ServiceHandle, ServiceKind};
use crate::session::{args_mismatch, Session};

impl<T: Transport> Session<T> {
    pub fn open_cipher_service(&mut self) -> HsmApiResult<ServiceHandle> {
        self.open_service(ServiceKind::Cipher, 0)
    }

    pub fn close_cipher_service(&mut self, handle: ServiceHandle) -> HsmApiResult<()> {
        self.close_service(handle, ServiceKind::Cipher)
    }

    /// Encrypt or decrypt `input` into `output`; returns the bytes written.
    pub fn cipher_one_go(
        &mut self,
        handle: ServiceHandle,
        args: CipherOneGoArgs<'_>,
    ) -> HsmApiResult<u32> {
        if args.output.len() < args.input.len() {
            return Err(HsmApiError::Validation("cipher output shorter than input"));
        }
        let mut args = MsgArgs::CipherOneGo(args);
        self.call(handle, ServiceKind::Cipher, MsgId::CIPHER_ONE_GO, &mut args)?;
        let MsgArgs::CipherOneGo(out) = args else {
            return Err(args_mismatch());
        };
        Ok(out.output_size)
    }
}

// Licensed under the Apache-2.0 license

use hsm_api::message::MacOneGoArgs;
use hsm_api::{HsmApiError, HsmApiResult, MsgArgs, MsgId, Transport};

use crate::handle::{ServiceHandle, ServiceKind};
use crate::session::{args_mismatch, Session};

impl<T: Transport> Session<T> {
    pub fn open_mac_service(&mut self) -> HsmApiResult<ServiceHandle> {
        self.open_service(ServiceKind::Mac, 0)
    }

    pub fn close_mac_service(&mut self, handle: ServiceHandle) -> HsmApiResult<()> {
        self.close_service(handle, ServiceKind::Mac)
    }

    /// Generate or verify a MAC in one request.
    ///
    /// Returns the verification status the engine reported; it is only
    /// meaningful for verification, where
    /// [`MAC_VERIFICATION_STATUS_SUCCESS`](hsm_api::message::mac::MAC_VERIFICATION_STATUS_SUCCESS)
    /// means the MAC matched.
    pub fn mac_one_go(
        &mut self,
        handle: ServiceHandle,
        args: MacOneGoArgs<'_>,
    ) -> HsmApiResult<u32> {
        if args.mac.is_empty() {
            return Err(HsmApiError::Validation("empty MAC buffer"));
        }
        let mut args = MsgArgs::MacOneGo(args);
        self.call(handle, ServiceKind::Mac, MsgId::MAC_ONE_GO, &mut args)?;
        let MsgArgs::MacOneGo(out) = args else {
            return Err(args_mismatch());
        };
        Ok(out.verification_status)
    }
}

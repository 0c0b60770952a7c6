// Licensed under the Apache-2.0 license

use hsm_api::message::HashOneGoArgs;
use hsm_api::{HsmApiError, HsmApiResult, MsgArgs, MsgId, Transport};

use crate::handle::{ServiceHandle, ServiceKind};
use crate::session::Session;

impl<T: Transport> Session<T> {
    /// Open a hash service. Hashing needs no key, so the service hangs off
    /// the session rather than the key store.
    pub fn open_hash_service(&mut self) -> HsmApiResult<ServiceHandle> {
        self.open_service(ServiceKind::Hash, 0)
    }

    pub fn close_hash_service(&mut self, handle: ServiceHandle) -> HsmApiResult<()> {
        self.close_service(handle, ServiceKind::Hash)
    }

    pub fn hash_one_go(
        &mut self,
        handle: ServiceHandle,
        args: HashOneGoArgs<'_>,
    ) -> HsmApiResult<()> {
        if let Some(size) = args.algo.digest_size() {
            if args.output.len() < size {
                return Err(HsmApiError::Validation("digest buffer too small"));
            }
        }
        self.call(
            handle,
            ServiceKind::Hash,
            MsgId::HASH_ONE_GO,
            &mut MsgArgs::HashOneGo(args),
        )
    }
}

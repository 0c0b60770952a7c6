// Licensed under the Apache-2.0 license

use hsm_api::message::GetRandomArgs;
use hsm_api::{HsmApiResult, MsgArgs, MsgId, Transport};

use crate::session::Session;

impl<T: Transport> Session<T> {
    /// Fill `output` with random bytes from the engine.
    pub fn get_random(&mut self, output: &mut [u8]) -> HsmApiResult<()> {
        if output.is_empty() {
            return Ok(());
        }
        let session = self.session_hw()?;
        self.process(
            MsgId::GET_RANDOM,
            session,
            &mut MsgArgs::GetRandom(GetRandomArgs { output }),
        )
    }
}

/*++

Licensed under the Apache-2.0 license.

File Name:

    dispatch.rs

Abstract:

    Table mapping every message id to its prepare/process pair. Ids whose
    family is not enabled resolve to a handler that rejects the request
    before anything is sent.

--*/

use crate::families::ServiceFamilies;
use crate::message::{
    cipher, hash, key_mgmt, key_store, mac, rng, session, she, sign_gen, verify_sign,
    MessageFlavor, MsgArgs, MsgId, PrepareCtx, PrepareFn, Prepared, ProcessRspFn,
};
use crate::{HsmApiError, HsmApiResult};

/// Number of entries; one per possible message id.
pub const MSG_ID_SPACE: usize = 256;

#[derive(Clone, Copy)]
pub struct MsgHandler {
    /// Family the handler was installed for; `None` for the not-supported
    /// handler
    pub family: Option<ServiceFamilies>,
    pub prepare: PrepareFn,
    pub process_rsp: ProcessRspFn,
}

impl core::fmt::Debug for MsgHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MsgHandler")
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

impl MsgHandler {
    pub fn new(family: ServiceFamilies, prepare: PrepareFn, process_rsp: ProcessRspFn) -> Self {
        Self {
            family: Some(family),
            prepare,
            process_rsp,
        }
    }

    pub const NOT_SUPPORTED: Self = Self {
        family: None,
        prepare: prepare_not_supported,
        process_rsp: proc_rsp_not_supported,
    };

    pub fn is_supported(&self) -> bool {
        self.family.is_some()
    }
}

fn prepare_not_supported(
    ctx: &mut PrepareCtx<'_>,
    _args: &mut MsgArgs<'_>,
    _cmd: &mut [u8],
) -> HsmApiResult<Prepared> {
    Err(HsmApiError::NotSupported(ctx.msg_id.0))
}

fn proc_rsp_not_supported(
    _rsp: &[u8],
    _args: &mut MsgArgs<'_>,
    _flavor: MessageFlavor,
) -> HsmApiResult<()> {
    Err(HsmApiError::NotSupported(0))
}

/// Handler compiled into the client for `id`, with the family it belongs to.
pub fn compiled_handler(id: MsgId) -> Option<MsgHandler> {
    use ServiceFamilies as F;
    let status_only: ProcessRspFn = session::proc_rsp_status_only;
    let h = MsgHandler::new;
    let handler = match id {
        MsgId::SESSION_OPEN => h(
            F::SESSION,
            session::prepare_session_open,
            session::proc_rsp_session_open,
        ),
        MsgId::SESSION_CLOSE => h(F::SESSION, session::prepare_session_close, status_only),
        MsgId::SHARED_BUF => h(
            F::SESSION,
            session::prepare_shared_buf,
            session::proc_rsp_shared_buf,
        ),

        MsgId::KEY_STORE_OPEN => h(
            F::KEY_STORE,
            key_store::prepare_key_store_open,
            key_store::proc_rsp_key_store_open,
        ),
        MsgId::KEY_STORE_CLOSE => h(F::KEY_STORE, key_store::prepare_key_store_close, status_only),

        MsgId::KEY_MANAGEMENT_OPEN => h(
            F::KEY_MANAGEMENT,
            key_mgmt::prepare_open,
            key_mgmt::proc_rsp_open,
        ),
        MsgId::KEY_MANAGEMENT_CLOSE => h(F::KEY_MANAGEMENT, key_mgmt::prepare_close, status_only),
        MsgId::KEY_GENERATE => h(
            F::KEY_MANAGEMENT,
            key_mgmt::prepare_key_generate,
            key_mgmt::proc_rsp_key_generate,
        ),
        MsgId::KEY_GENERATE_EXT => h(
            F::KEY_MANAGEMENT,
            key_mgmt::prepare_key_generate_ext,
            key_mgmt::proc_rsp_key_generate,
        ),
        MsgId::IMPORT_KEY => h(
            F::KEY_MANAGEMENT,
            key_mgmt::prepare_import_key,
            key_mgmt::proc_rsp_import_key,
        ),
        MsgId::DELETE_KEY => h(F::KEY_MANAGEMENT, key_mgmt::prepare_delete_key, status_only),
        MsgId::MANAGE_KEY => h(
            F::KEY_MANAGEMENT,
            key_mgmt::prepare_manage_key,
            key_mgmt::proc_rsp_manage_key,
        ),

        MsgId::MAC_OPEN => h(F::MAC, mac::prepare_open, mac::proc_rsp_open),
        MsgId::MAC_CLOSE => h(F::MAC, mac::prepare_close, status_only),
        MsgId::MAC_ONE_GO => h(F::MAC, mac::prepare_mac_one_go, mac::proc_rsp_mac_one_go),

        MsgId::CIPHER_OPEN => h(F::CIPHER, cipher::prepare_open, cipher::proc_rsp_open),
        MsgId::CIPHER_CLOSE => h(F::CIPHER, cipher::prepare_close, status_only),
        MsgId::CIPHER_ONE_GO => h(
            F::CIPHER,
            cipher::prepare_cipher_one_go,
            cipher::proc_rsp_cipher_one_go,
        ),

        MsgId::HASH_OPEN => h(F::HASH, hash::prepare_open, hash::proc_rsp_open),
        MsgId::HASH_CLOSE => h(F::HASH, hash::prepare_close, status_only),
        MsgId::HASH_ONE_GO => h(F::HASH, hash::prepare_hash_one_go, status_only),

        MsgId::SIGN_GEN_OPEN => h(F::SIGN_GEN, sign_gen::prepare_open, sign_gen::proc_rsp_open),
        MsgId::SIGN_GEN_CLOSE => h(F::SIGN_GEN, sign_gen::prepare_close, status_only),
        MsgId::SIGN_GENERATE => h(
            F::SIGN_GEN,
            sign_gen::prepare_sign_generate,
            sign_gen::proc_rsp_sign_generate,
        ),
        MsgId::SIGN_PREPARE => h(F::SIGN_GEN, sign_gen::prepare_sign_prepare, status_only),

        MsgId::VERIFY_SIGN_OPEN => h(
            F::VERIFY_SIGN,
            verify_sign::prepare_open,
            verify_sign::proc_rsp_open,
        ),
        MsgId::VERIFY_SIGN_CLOSE => h(F::VERIFY_SIGN, verify_sign::prepare_close, status_only),
        MsgId::VERIFY_SIGN => h(
            F::VERIFY_SIGN,
            verify_sign::prepare_verify_sign,
            verify_sign::proc_rsp_verify_sign,
        ),

        MsgId::GET_RANDOM => h(F::RNG, rng::prepare_get_random, status_only),

        MsgId::SHE_GENERATE_MAC => h(F::SHE, she::prepare_she_generate_mac, status_only),
        MsgId::SHE_VERIFY_MAC => h(
            F::SHE,
            she::prepare_she_verify_mac,
            she::proc_rsp_she_verify_mac,
        ),
        MsgId::SHE_INIT_RNG => h(F::SHE, she::prepare_she_init_rng, status_only),
        MsgId::SHE_EXTEND_SEED => h(F::SHE, she::prepare_she_extend_seed, status_only),
        MsgId::SHE_RND => h(F::SHE, she::prepare_she_rnd, status_only),
        MsgId::SHE_GET_STATUS => h(
            F::SHE,
            she::prepare_she_get_status,
            she::proc_rsp_she_get_status,
        ),
        MsgId::SHE_GET_ID => h(F::SHE, she::prepare_she_get_id, she::proc_rsp_she_get_id),

        _ => return None,
    };
    Some(handler)
}

/// Message id to handler mapping, total over the id space.
///
/// Built once and then only read; share it between sessions behind an `Arc`.
#[derive(Clone, Debug)]
pub struct DispatchTable {
    entries: [MsgHandler; MSG_ID_SPACE],
    families: ServiceFamilies,
}

impl DispatchTable {
    /// Build a table with every family in `families` enabled.
    pub fn new(families: ServiceFamilies) -> Self {
        let mut table = Self {
            entries: [MsgHandler::NOT_SUPPORTED; MSG_ID_SPACE],
            families: ServiceFamilies::empty(),
        };
        for family in families.iter() {
            table.enable(family);
        }
        table
    }

    /// Install the handlers of `family`, leaving every other entry untouched.
    pub fn enable(&mut self, family: ServiceFamilies) {
        for (id, entry) in self.entries.iter_mut().enumerate() {
            let Some(handler) = compiled_handler(MsgId(id as u8)) else {
                continue;
            };
            if handler.family.is_some_and(|f| family.contains(f)) {
                *entry = handler;
            }
        }
        self.families |= family;
    }

    pub fn get(&self, id: MsgId) -> &MsgHandler {
        &self.entries[usize::from(id.0)]
    }

    pub fn families(&self) -> ServiceFamilies {
        self.families
    }
}

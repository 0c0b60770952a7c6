/*++

Licensed under the Apache-2.0 license.

File Name:

    session.rs

Abstract:

    Session with the secure engine: bootstrap, teardown and the plumbing
    every service operation goes through.

--*/

use std::sync::Arc;

use hsm_api::message::{KeyStoreOpenArgs, OpenArgs, SharedBufArgs};
use hsm_api::{
    DispatchTable, Executor, HsmApiError, HsmApiResult, MessageFlavor, MsgArgs, MsgId, MuParams,
    Transport,
};
use log::{debug, warn};

use crate::config::SessionConfig;
use crate::handle::{HandleTable, ServiceContext, ServiceHandle, ServiceKind};

/// Arguments came back as another variant than the one sent.
pub(crate) fn args_mismatch() -> HsmApiError {
    HsmApiError::Validation("arguments do not match message")
}

pub struct Session<T: Transport> {
    transport: T,
    table: Arc<DispatchTable>,
    mu: MuParams,
    flavor: MessageFlavor,
    // Engine session handle; 0 once closed
    session_id: u32,
    key_store: Option<ServiceHandle>,
    shared_buf: (u16, u16),
    handles: HandleTable,
}

impl<T: Transport> Session<T> {
    /// Open a session with the families `config` enables.
    pub fn open(transport: T, config: &SessionConfig) -> HsmApiResult<Self> {
        let table = Arc::new(DispatchTable::new(config.service_families()?));
        Self::open_with_table(transport, config, table)
    }

    /// Open a session sharing an already built dispatch table.
    ///
    /// Opens the session, sets up the shared secure-memory window and opens
    /// the configured key store. Whatever was acquired before a failure is
    /// released again.
    pub fn open_with_table(
        transport: T,
        config: &SessionConfig,
        table: Arc<DispatchTable>,
    ) -> HsmApiResult<Self> {
        let mut session = Self {
            transport,
            table,
            mu: config.mu_params(),
            flavor: config.flavor(),
            session_id: 0,
            key_store: None,
            shared_buf: (0, 0),
            handles: HandleTable::new(config.max_services),
        };

        let mut args = MsgArgs::SessionOpen(config.session_open_args());
        session.process(MsgId::SESSION_OPEN, 0, &mut args)?;
        if let MsgArgs::SessionOpen(open) = args {
            session.session_id = open.session_handle;
        }
        if session.session_id == 0 {
            return Err(HsmApiError::Validation("engine returned a null session"));
        }
        debug!("session {:#x} opened", session.session_id);

        let mut args = MsgArgs::SharedBuf(SharedBufArgs::default());
        session.process(MsgId::SHARED_BUF, session.session_id, &mut args)?;
        if let MsgArgs::SharedBuf(buf) = args {
            session.shared_buf = (buf.offset, buf.size);
        }
        let (offset, size) = session.shared_buf;
        session
            .transport
            .configure_shared_buf(offset.into(), size.into())?;

        let key_store = session.open_key_store(
            config.key_store.id,
            config.key_store.password,
            config.key_store.flags,
        )?;
        session.key_store = Some(key_store);
        Ok(session)
    }

    fn open_key_store(&mut self, id: u32, password: u32, flags: u8) -> HsmApiResult<ServiceHandle> {
        let pending = self.handles.add_service(ServiceKind::KeyStore, None)?;
        let mut args = MsgArgs::KeyStoreOpen(KeyStoreOpenArgs {
            key_store_id: id,
            password,
            flags,
            ..Default::default()
        });
        match self.process(MsgId::KEY_STORE_OPEN, self.session_id, &mut args) {
            Ok(()) => {
                let hw_handle = match args {
                    MsgArgs::KeyStoreOpen(open) => open.key_store_handle,
                    _ => 0,
                };
                Ok(self.handles.activate(pending, hw_handle))
            }
            Err(err) => {
                self.handles.delete_pending(pending);
                Err(err)
            }
        }
    }

    /// Close every open service, the key store and the session.
    ///
    /// Teardown always runs to completion; the first failure is reported.
    /// Closing a closed session does nothing.
    pub fn close(&mut self) -> HsmApiResult<()> {
        if self.session_id == 0 {
            return Ok(());
        }
        let mut result = Ok(());
        // The key store was opened first, so it is closed last.
        for handle in self.handles.newest_first() {
            if let Err(err) = self.close_handle(handle) {
                result = result.and(Err(err));
            }
        }
        self.key_store = None;

        let closed = self.process(MsgId::SESSION_CLOSE, self.session_id, &mut MsgArgs::Close);
        debug!("session {:#x} closed", self.session_id);
        self.session_id = 0;
        result.and(closed)
    }

    pub fn is_open(&self) -> bool {
        self.session_id != 0
    }

    /// Engine handle of the session, 0 once closed.
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn key_store(&self) -> Option<ServiceHandle> {
        self.key_store
    }

    /// (offset, size) of the secure-memory window granted by the engine.
    pub fn shared_buf(&self) -> (u16, u16) {
        self.shared_buf
    }

    pub fn flavor(&self) -> MessageFlavor {
        self.flavor
    }

    pub fn dispatch_table(&self) -> &Arc<DispatchTable> {
        &self.table
    }

    /// Number of open services, key store included.
    pub fn open_services(&self) -> usize {
        self.handles.len()
    }

    pub fn resolve(&self, handle: ServiceHandle) -> HsmApiResult<ServiceContext> {
        self.handles.resolve(handle)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub(crate) fn process(
        &mut self,
        msg_id: MsgId,
        msg_hdl: u32,
        args: &mut MsgArgs<'_>,
    ) -> HsmApiResult<()> {
        let result = Executor {
            table: &self.table,
            transport: &mut self.transport,
            mu: self.mu,
            flavor: self.flavor,
        }
        .process(msg_id, msg_hdl, args);
        if let Err(HsmApiError::Hardware(err)) = &result {
            warn!("message {:#04x} rejected by engine: {err}", msg_id.0);
        }
        result
    }

    /// Engine handle requests without a service handle are addressed to.
    pub(crate) fn session_hw(&self) -> HsmApiResult<u32> {
        match self.session_id {
            0 => Err(HsmApiError::UnknownHandle),
            id => Ok(id),
        }
    }

    /// Open a service of `kind` on the session or on the key store.
    pub(crate) fn open_service(
        &mut self,
        kind: ServiceKind,
        flags: u8,
    ) -> HsmApiResult<ServiceHandle> {
        let (parent, parent_hw) = match kind {
            ServiceKind::Hash | ServiceKind::SignatureVerification => (None, self.session_hw()?),
            _ => {
                let key_store = self.key_store.ok_or(HsmApiError::UnknownHandle)?;
                let hw = self.handles.resolve_kind(key_store, ServiceKind::KeyStore)?;
                (Some(key_store), hw)
            }
        };
        let pending = self.handles.add_service(kind, parent)?;
        let mut args = MsgArgs::Open(OpenArgs { flags, handle: 0 });
        match self.process(kind.open_id(), parent_hw, &mut args) {
            Ok(()) => {
                let hw_handle = match args {
                    MsgArgs::Open(open) => open.handle,
                    _ => 0,
                };
                Ok(self.handles.activate(pending, hw_handle))
            }
            Err(err) => {
                self.handles.delete_pending(pending);
                Err(err)
            }
        }
    }

    /// Close `handle`, which must be an open service of `kind`.
    ///
    /// The handle is invalid afterwards whether or not the engine accepted
    /// the close.
    pub(crate) fn close_service(
        &mut self,
        handle: ServiceHandle,
        kind: ServiceKind,
    ) -> HsmApiResult<()> {
        self.handles.resolve_kind(handle, kind)?;
        self.close_handle(handle)
    }

    fn close_handle(&mut self, handle: ServiceHandle) -> HsmApiResult<()> {
        let ctx = self.handles.delete_service(handle)?;
        self.process(ctx.kind.close_id(), ctx.hw_handle, &mut MsgArgs::Close)
    }

    /// Run one operation on an open service of `kind`.
    pub(crate) fn call(
        &mut self,
        handle: ServiceHandle,
        kind: ServiceKind,
        msg_id: MsgId,
        args: &mut MsgArgs<'_>,
    ) -> HsmApiResult<()> {
        let hw_handle = self.handles.resolve_kind(handle, kind)?;
        self.process(msg_id, hw_handle, args)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("session teardown incomplete: {err}");
        }
        self.transport.close();
    }
}

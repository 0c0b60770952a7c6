/*++

Licensed under the Apache-2.0 license.

File Name:

    handle.rs

Abstract:

    Table of services a session has open. Callers hold tokens tagged with
    the issuing table and a slot generation; the engine's own handle values
    never leave this module's records, so a value the engine hands out
    again cannot alias a closed service, in this session or another.

--*/

use std::sync::atomic::{AtomicU32, Ordering};

use hsm_api::{HsmApiError, HsmApiResult, MsgId};

static NEXT_TABLE_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    KeyStore,
    KeyManagement,
    Mac,
    Cipher,
    Hash,
    SignatureGeneration,
    SignatureVerification,
}

impl ServiceKind {
    pub(crate) fn open_id(&self) -> MsgId {
        match self {
            Self::KeyStore => MsgId::KEY_STORE_OPEN,
            Self::KeyManagement => MsgId::KEY_MANAGEMENT_OPEN,
            Self::Mac => MsgId::MAC_OPEN,
            Self::Cipher => MsgId::CIPHER_OPEN,
            Self::Hash => MsgId::HASH_OPEN,
            Self::SignatureGeneration => MsgId::SIGN_GEN_OPEN,
            Self::SignatureVerification => MsgId::VERIFY_SIGN_OPEN,
        }
    }

    pub(crate) fn close_id(&self) -> MsgId {
        match self {
            Self::KeyStore => MsgId::KEY_STORE_CLOSE,
            Self::KeyManagement => MsgId::KEY_MANAGEMENT_CLOSE,
            Self::Mac => MsgId::MAC_CLOSE,
            Self::Cipher => MsgId::CIPHER_CLOSE,
            Self::Hash => MsgId::HASH_CLOSE,
            Self::SignatureGeneration => MsgId::SIGN_GEN_CLOSE,
            Self::SignatureVerification => MsgId::VERIFY_SIGN_CLOSE,
        }
    }
}

/// Opaque reference to an open service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ServiceHandle {
    table: u32,
    index: u16,
    generation: u32,
}

/// Slot reserved for a service whose open request is in flight.
///
/// Must be handed back through [`HandleTable::activate`] or
/// [`HandleTable::delete_pending`].
#[derive(Debug)]
#[must_use]
pub struct PendingService {
    handle: ServiceHandle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceContext {
    pub kind: ServiceKind,
    /// Handle the engine assigned
    pub hw_handle: u32,
    /// `None` for services opened directly on the session
    pub parent: Option<ServiceHandle>,
}

#[derive(Debug)]
enum SlotState {
    Vacant,
    Pending {
        kind: ServiceKind,
        parent: Option<ServiceHandle>,
    },
    Active { ctx: ServiceContext, opened: u64 },
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    state: SlotState,
}

#[derive(Debug)]
pub struct HandleTable {
    id: u32,
    slots: Vec<Slot>,
    capacity: usize,
    opened: u64,
}

impl HandleTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            slots: Vec::with_capacity(capacity),
            capacity,
            opened: 0,
        }
    }

    /// Reserve a slot for a service about to be opened.
    pub fn add_service(
        &mut self,
        kind: ServiceKind,
        parent: Option<ServiceHandle>,
    ) -> HsmApiResult<PendingService> {
        let index = match self
            .slots
            .iter()
            .position(|s| matches!(s.state, SlotState::Vacant))
        {
            Some(index) => index,
            None if self.slots.len() < self.capacity.min(usize::from(u16::MAX)) => {
                self.slots.push(Slot {
                    generation: 0,
                    state: SlotState::Vacant,
                });
                self.slots.len() - 1
            }
            None => return Err(HsmApiError::OutOfHandles),
        };
        let slot = &mut self.slots[index];
        slot.state = SlotState::Pending { kind, parent };
        Ok(PendingService {
            handle: ServiceHandle {
                table: self.id,
                index: index as u16,
                generation: slot.generation,
            },
        })
    }

    /// Record the engine handle of a service whose open succeeded.
    pub fn activate(&mut self, pending: PendingService, hw_handle: u32) -> ServiceHandle {
        let handle = pending.handle;
        self.opened += 1;
        let opened = self.opened;
        let slot = &mut self.slots[usize::from(handle.index)];
        if let SlotState::Pending { kind, parent } = slot.state {
            slot.state = SlotState::Active {
                ctx: ServiceContext {
                    kind,
                    hw_handle,
                    parent,
                },
                opened,
            };
        }
        handle
    }

    /// Release a slot whose open failed.
    pub fn delete_pending(&mut self, pending: PendingService) {
        self.free(pending.handle.index);
    }

    /// Forget an open service, returning what was recorded for it.
    pub fn delete_service(&mut self, handle: ServiceHandle) -> HsmApiResult<ServiceContext> {
        let ctx = self.resolve(handle)?;
        self.free(handle.index);
        Ok(ctx)
    }

    pub fn resolve(&self, handle: ServiceHandle) -> HsmApiResult<ServiceContext> {
        if handle.table != self.id {
            return Err(HsmApiError::UnknownHandle);
        }
        match self.slots.get(usize::from(handle.index)) {
            Some(Slot {
                generation,
                state: SlotState::Active { ctx, .. },
            }) if *generation == handle.generation => Ok(*ctx),
            _ => Err(HsmApiError::UnknownHandle),
        }
    }

    /// Engine handle of `handle`, which must be an open service of `kind`.
    pub fn resolve_kind(&self, handle: ServiceHandle, kind: ServiceKind) -> HsmApiResult<u32> {
        match self.resolve(handle)? {
            ctx if ctx.kind == kind => Ok(ctx.hw_handle),
            _ => Err(HsmApiError::UnknownHandle),
        }
    }

    /// Open services, most recently opened first.
    pub fn newest_first(&self) -> Vec<ServiceHandle> {
        let mut open: Vec<(u64, ServiceHandle)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot.state {
                SlotState::Active { opened, .. } => Some((
                    opened,
                    ServiceHandle {
                        table: self.id,
                        index: index as u16,
                        generation: slot.generation,
                    },
                )),
                _ => None,
            })
            .collect();
        open.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        open.into_iter().map(|(_, h)| h).collect()
    }

    /// Number of open services.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s.state, SlotState::Active { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn free(&mut self, index: u16) {
        let slot = &mut self.slots[usize::from(index)];
        slot.generation = slot.generation.wrapping_add(1);
        slot.state = SlotState::Vacant;
    }
}

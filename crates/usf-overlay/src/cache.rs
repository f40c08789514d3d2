//! Session cache: which override record belongs to which live session.
//!
//! Bindings are keyed strictly by [`SessionId`] in a sharded concurrent
//! map, so work on one session never blocks or touches another session's
//! entry. Records are shared as `Arc` snapshots of what the store
//! returned; the store stays the owner of the durable data.
//!
//! Each slot also carries an epoch that moves on every login start and
//! every logout. A login whose lookup finishes after the session already
//! logged out (or logged in again) carries a stale epoch and is dropped
//! instead of resurrecting a binding.

use std::sync::Arc;

use dashmap::DashMap;
use usf_core::models::identity::{Identity, SessionId};
use usf_core::models::record::OverrideRecord;

/// The override state of one logged-in session.
#[derive(Debug, Clone)]
pub struct SessionBinding {
    session: SessionId,
    identity: Identity,
    record: Option<Arc<OverrideRecord>>,
}

impl SessionBinding {
    pub fn new(session: SessionId, identity: Identity, record: Option<OverrideRecord>) -> Self {
        Self {
            session,
            identity,
            record: record.map(Arc::new),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// `None` when the account has no customization.
    pub fn record(&self) -> Option<&OverrideRecord> {
        self.record.as_deref()
    }
}

/// Proof that a login started at a given epoch of a session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginTicket {
    session: SessionId,
    epoch: u64,
}

impl LoginTicket {
    pub fn session(&self) -> SessionId {
        self.session
    }
}

#[derive(Debug, Default)]
struct Slot {
    epoch: u64,
    binding: Option<SessionBinding>,
}

#[derive(Debug, Default)]
pub struct SessionCache {
    slots: DashMap<SessionId, Slot>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a login on `session`, invalidating any login still pending
    /// on that slot.
    pub fn begin_login(&self, session: SessionId) -> LoginTicket {
        let mut slot = self.slots.entry(session).or_default();
        slot.epoch += 1;
        LoginTicket {
            session,
            epoch: slot.epoch,
        }
    }

    /// Finish a login started with [`begin_login`](Self::begin_login).
    ///
    /// Returns `Err(binding)` without storing anything when the ticket was
    /// superseded by a logout or a newer login. On success returns the
    /// binding it replaced, if any.
    pub fn complete_login(
        &self,
        ticket: LoginTicket,
        binding: SessionBinding,
    ) -> Result<Option<SessionBinding>, SessionBinding> {
        let mut slot = self.slots.entry(ticket.session).or_default();
        if slot.epoch != ticket.epoch {
            return Err(binding);
        }
        Ok(slot.binding.replace(binding))
    }

    /// Bind unconditionally, replacing whatever the session had.
    pub fn bind(&self, binding: SessionBinding) -> Option<SessionBinding> {
        let mut slot = self.slots.entry(binding.session).or_default();
        slot.epoch += 1;
        slot.binding.replace(binding)
    }

    /// Forget the session's binding. Pending logins on it become stale.
    pub fn unbind(&self, session: SessionId) -> Option<SessionBinding> {
        let mut slot = self.slots.get_mut(&session)?;
        slot.epoch += 1;
        slot.binding.take()
    }

    /// Snapshot of the session's binding.
    pub fn get(&self, session: SessionId) -> Option<SessionBinding> {
        self.with_binding(session, SessionBinding::clone)
    }

    /// Run `f` against the binding without cloning it.
    ///
    /// `f` runs while the slot's shard is read-locked; it must not call
    /// back into this cache.
    pub fn with_binding<R>(
        &self,
        session: SessionId,
        f: impl FnOnce(&SessionBinding) -> R,
    ) -> Option<R> {
        let slot = self.slots.get(&session)?;
        slot.binding.as_ref().map(f)
    }

    /// Replace the record of every live session bound to `identity`.
    /// Returns how many sessions were updated.
    pub fn refresh_identity(&self, identity: Identity, record: Option<OverrideRecord>) -> usize {
        let record = record.map(Arc::new);
        let mut updated = 0;
        for mut slot in self.slots.iter_mut() {
            if let Some(binding) = slot.binding.as_mut()
                && binding.identity == identity
            {
                binding.record = record.clone();
                updated += 1;
            }
        }
        updated
    }

    /// Number of bound sessions.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.binding.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

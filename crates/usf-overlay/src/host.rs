//! Interfaces to the host server runtime.
//!
//! The host owns connections, groups and packet broadcast. The overlay
//! only sees the narrow views defined here.

use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};
use usf_core::models::color::Rgb;
use usf_core::models::group::GroupDefaults;
use usf_core::models::identity::{Identity, SessionId};

use crate::chat::ChatOutcome;
use crate::error::BroadcastError;

/// Boxed future returned by object-safe async hook methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outgoing chat line the host is about to send.
pub trait MessageEnvelope {
    /// Drop every prefix collected so far, including the group's.
    fn clear_prefixes(&mut self);
    fn prefix(&mut self, prefix: &str);
    fn suffix(&mut self, suffix: &str);
    fn colorize(&mut self, color: Rgb);
}

/// Broadcast primitives used by above-heads mode.
pub trait ChatBroadcaster {
    /// Show `name` as the display name of `session` to everyone.
    fn broadcast_name(&self, session: SessionId, name: &str) -> Result<(), BroadcastError>;

    /// Send `text` in `color`, attributed to `session`'s slot.
    fn broadcast_chat(&self, session: SessionId, text: &str, color: Rgb)
    -> Result<(), BroadcastError>;
}

/// A chat line typed by a player.
#[derive(Debug, Clone)]
pub struct ChatEvent {
    /// `None` for lines that did not come from a connected player.
    pub session: Option<SessionId>,
    /// Current display name of the sender.
    pub player_name: String,
    pub raw_text: String,
    pub muted: bool,
}

/// A permission query raised by the host.
///
/// When the overlay has an explicit answer it sets `handled` and stores
/// the answer in `granted`; otherwise the host asks the group.
#[derive(Debug, Clone)]
pub struct PermissionCheck<'a> {
    pub session: Option<SessionId>,
    pub permission: &'a str,
    pub handled: bool,
    pub granted: bool,
}

impl<'a> PermissionCheck<'a> {
    pub fn new(session: Option<SessionId>, permission: &'a str) -> Self {
        Self {
            session,
            permission,
            handled: false,
            granted: false,
        }
    }
}

/// Host events the overlay listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    PostLogin,
    Logout,
    Permission,
    Chat,
}

/// Subscription handle issued by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u64);

/// Receiver of subscribed host events.
///
/// The host calls the method matching the [`Hook`] it subscribed the
/// handler to; the other methods are never invoked for that subscription.
pub trait HookHandler: Send + Sync {
    fn post_login(&self, session: SessionId, identity: Identity) -> BoxFuture<'_, ()>;

    fn logout(&self, session: SessionId);

    /// Effective answer; sets `check.handled` when the handler decided.
    fn permission(&self, check: &mut PermissionCheck<'_>, group: &dyn GroupDefaults) -> bool;

    fn chat(
        &self,
        event: &ChatEvent,
        envelope: &mut dyn MessageEnvelope,
        group: &dyn GroupDefaults,
        broadcaster: &dyn ChatBroadcaster,
    ) -> ChatOutcome;
}

/// Event subscription surface of the host.
pub trait HookHost {
    fn subscribe(&self, hook: Hook, handler: Arc<dyn HookHandler>) -> HookId;
    fn unsubscribe(&self, id: HookId);
}

/// Live set of hook subscriptions.
///
/// Every hook subscribed through a `Registration` is unsubscribed when it
/// is dropped, whichever way the owner goes out of scope.
#[must_use = "dropping a Registration unsubscribes its hooks"]
pub struct Registration<'h, H: HookHost + ?Sized> {
    host: &'h H,
    ids: Vec<(Hook, HookId)>,
}

impl<'h, H: HookHost + ?Sized> Registration<'h, H> {
    pub fn new(host: &'h H) -> Self {
        Self {
            host,
            ids: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, hook: Hook, handler: Arc<dyn HookHandler>) -> HookId {
        let id = self.host.subscribe(hook, handler);
        debug!(?hook, id = id.0, "Subscribed hook");
        self.ids.push((hook, id));
        id
    }

    pub fn hooks(&self) -> impl Iterator<Item = Hook> + '_ {
        self.ids.iter().map(|(hook, _)| *hook)
    }
}

impl<H: HookHost + ?Sized> Drop for Registration<'_, H> {
    fn drop(&mut self) {
        // Reverse order of subscription.
        while let Some((hook, id)) = self.ids.pop() {
            self.host.unsubscribe(id);
            debug!(?hook, id = id.0, "Unsubscribed hook");
        }
        info!("Overlay hooks unregistered");
    }
}

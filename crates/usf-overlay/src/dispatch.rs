//! In-process hook table.
//!
//! [`HookTable`] is the [`HookHost`] an embedding server drives: its
//! network layer calls `fire_*` as events arrive and every handler
//! subscribed to that hook runs, in subscription order. Handlers are
//! snapshotted before dispatch so no table lock is held while they run.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::trace;
use usf_core::models::group::GroupDefaults;
use usf_core::models::identity::{Identity, SessionId};

use crate::chat::ChatOutcome;
use crate::host::{
    ChatBroadcaster, ChatEvent, Hook, HookHandler, HookHost, HookId, MessageEnvelope,
    PermissionCheck,
};

struct Subscriber {
    hook: Hook,
    handler: Arc<dyn HookHandler>,
}

#[derive(Default)]
pub struct HookTable {
    next_id: AtomicU64,
    subscribers: DashMap<HookId, Subscriber>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions to `hook`.
    pub fn subscriber_count(&self, hook: Hook) -> usize {
        self.subscribers.iter().filter(|s| s.hook == hook).count()
    }

    fn snapshot(&self, hook: Hook) -> Vec<Arc<dyn HookHandler>> {
        let mut matching: Vec<(HookId, Arc<dyn HookHandler>)> = self
            .subscribers
            .iter()
            .filter(|entry| entry.hook == hook)
            .map(|entry| (*entry.key(), Arc::clone(&entry.handler)))
            .collect();
        matching.sort_by_key(|(id, _)| id.0);
        trace!(?hook, handlers = matching.len(), "Dispatching hook");
        matching.into_iter().map(|(_, handler)| handler).collect()
    }

    pub async fn fire_post_login(&self, session: SessionId, identity: Identity) {
        for handler in self.snapshot(Hook::PostLogin) {
            handler.post_login(session, identity).await;
        }
    }

    pub fn fire_logout(&self, session: SessionId) {
        for handler in self.snapshot(Hook::Logout) {
            handler.logout(session);
        }
    }

    /// First handler to mark the check handled decides; otherwise the
    /// group answers.
    pub fn fire_permission(&self, check: &mut PermissionCheck<'_>, group: &dyn GroupDefaults) -> bool {
        for handler in self.snapshot(Hook::Permission) {
            let granted = handler.permission(check, group);
            if check.handled {
                return granted;
            }
        }
        group.has_permission(check.permission)
    }

    /// Outcome reported by each chat handler, in subscription order.
    pub fn fire_chat(
        &self,
        event: &ChatEvent,
        envelope: &mut dyn MessageEnvelope,
        group: &dyn GroupDefaults,
        broadcaster: &dyn ChatBroadcaster,
    ) -> Vec<ChatOutcome> {
        self.snapshot(Hook::Chat)
            .into_iter()
            .map(|handler| handler.chat(event, &mut *envelope, group, broadcaster))
            .collect()
    }
}

impl HookHost for HookTable {
    fn subscribe(&self, hook: Hook, handler: Arc<dyn HookHandler>) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.subscribers.insert(id, Subscriber { hook, handler });
        id
    }

    fn unsubscribe(&self, id: HookId) {
        self.subscribers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use usf_core::models::group::Group;

    use super::*;
    use crate::chat::SkipReason;
    use crate::host::{BoxFuture, Registration};

    /// Records which hooks reached it and answers permission checks with a
    /// fixed decision.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        decides: Option<bool>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl HookHandler for Recorder {
        fn post_login(&self, session: SessionId, identity: Identity) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                self.seen
                    .lock()
                    .unwrap()
                    .push(format!("login {session} {identity}"));
            })
        }

        fn logout(&self, session: SessionId) {
            self.seen.lock().unwrap().push(format!("logout {session}"));
        }

        fn permission(&self, check: &mut PermissionCheck<'_>, _group: &dyn GroupDefaults) -> bool {
            self.seen
                .lock()
                .unwrap()
                .push(format!("permission {}", check.permission));
            if let Some(granted) = self.decides {
                check.handled = true;
                check.granted = granted;
            }
            check.granted
        }

        fn chat(
            &self,
            event: &ChatEvent,
            _envelope: &mut dyn MessageEnvelope,
            _group: &dyn GroupDefaults,
            _broadcaster: &dyn ChatBroadcaster,
        ) -> ChatOutcome {
            self.seen
                .lock()
                .unwrap()
                .push(format!("chat {}", event.raw_text));
            ChatOutcome::Skipped(SkipReason::Muted)
        }
    }

    #[tokio::test]
    async fn events_reach_only_matching_subscriptions() {
        let table = HookTable::new();
        let recorder = Arc::new(Recorder::default());
        let mut registration = Registration::new(&table);
        registration.subscribe(Hook::PostLogin, recorder.clone());
        registration.subscribe(Hook::Logout, recorder.clone());

        table.fire_post_login(SessionId(3), Identity(9)).await;
        table.fire_logout(SessionId(3));
        let mut check = PermissionCheck::new(Some(SessionId(3)), "tshock.ban");
        table.fire_permission(&mut check, &Group::new("g"));

        assert_eq!(recorder.seen(), vec!["login #3 9", "logout #3"]);
    }

    #[test]
    fn first_handled_permission_answer_wins() {
        let table = HookTable::new();
        let undecided = Arc::new(Recorder::default());
        let denies = Arc::new(Recorder {
            decides: Some(false),
            ..Default::default()
        });
        let late = Arc::new(Recorder {
            decides: Some(true),
            ..Default::default()
        });
        table.subscribe(Hook::Permission, undecided.clone());
        table.subscribe(Hook::Permission, denies.clone());
        table.subscribe(Hook::Permission, late.clone());

        let mut group = Group::new("g");
        group.permissions.insert("tshock.ban".into());
        let mut check = PermissionCheck::new(Some(SessionId(1)), "tshock.ban");

        assert!(!table.fire_permission(&mut check, &group));
        assert_eq!(undecided.seen().len(), 1);
        assert_eq!(denies.seen().len(), 1);
        assert!(late.seen().is_empty());
    }

    #[test]
    fn unhandled_permission_falls_back_to_group() {
        let table = HookTable::new();
        table.subscribe(Hook::Permission, Arc::new(Recorder::default()));

        let mut group = Group::new("g");
        group.permissions.insert("tshock.warp".into());
        let mut check = PermissionCheck::new(None, "tshock.warp");
        assert!(table.fire_permission(&mut check, &group));
        assert!(!check.handled);
    }

    #[test]
    fn dropping_registration_empties_table() {
        let table = HookTable::new();
        {
            let mut registration = Registration::new(&table);
            registration.subscribe(Hook::Chat, Arc::new(Recorder::default()));
            assert_eq!(table.subscriber_count(Hook::Chat), 1);
        }
        assert_eq!(table.subscriber_count(Hook::Chat), 0);
    }
}

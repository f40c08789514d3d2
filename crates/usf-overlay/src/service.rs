//! Overlay service — the lifecycle hooks the host drives.

use std::sync::Arc;

use tracing::{debug, info, warn};
use usf_core::error::UsfError;
use usf_core::models::group::GroupDefaults;
use usf_core::models::identity::{Identity, SessionId};
use usf_core::permission::PermissionDecision;
use usf_core::repository::OverrideRepository;

use crate::admin::OverrideAdmin;
use crate::cache::{SessionBinding, SessionCache};
use crate::chat::{ChatFormatter, ChatOutcome, SkipReason};
use crate::config::OverlayConfig;
use crate::host::{
    BoxFuture, ChatBroadcaster, ChatEvent, Hook, HookHandler, HookHost, MessageEnvelope,
    PermissionCheck, Registration,
};
use crate::resolver::{self, OverrideResolver};

/// Per-user overrides for one server process.
///
/// Generic over the record store so the overlay has no dependency on the
/// database crate. Constructed once by the composition root, wrapped in an
/// `Arc` and subscribed to the host through [`Overlay::register`].
pub struct Overlay<R: OverrideRepository> {
    repo: R,
    cache: SessionCache,
    formatter: ChatFormatter,
    config: OverlayConfig,
}

impl<R: OverrideRepository> Overlay<R> {
    pub fn new(repo: R, config: OverlayConfig) -> Self {
        Self {
            repo,
            cache: SessionCache::new(),
            formatter: ChatFormatter::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn resolver(&self) -> OverrideResolver<'_> {
        OverrideResolver::new(&self.cache)
    }

    pub fn admin(&self) -> OverrideAdmin<'_, R> {
        OverrideAdmin::new(&self.repo, &self.cache)
    }

    /// Subscribe this overlay to every hook it handles. Dropping the
    /// returned guard unsubscribes them.
    pub fn register<'h, H: HookHost + ?Sized>(self: &Arc<Self>, host: &'h H) -> Registration<'h, H>
    where
        R: 'static,
    {
        let handler: Arc<dyn HookHandler> = self.clone();
        let mut registration = Registration::new(host);
        for hook in [Hook::PostLogin, Hook::Logout, Hook::Permission, Hook::Chat] {
            registration.subscribe(hook, Arc::clone(&handler));
        }
        info!("Overlay hooks registered");
        registration
    }

    /// Load the account's record and bind it to `session`.
    ///
    /// Never fails: a store error or a lookup slower than the configured
    /// timeout binds the session without customization.
    pub async fn on_login(&self, session: SessionId, identity: Identity) -> Option<SessionBinding> {
        let ticket = self.cache.begin_login(session);

        let lookup = tokio::time::timeout(self.config.lookup_timeout(), self.repo.get(identity));
        let record = match lookup.await {
            Ok(result) => result,
            Err(_) => Err(UsfError::Timeout {
                operation: format!("override lookup ({} ms)", self.config.lookup_timeout_ms),
            }),
        }
        .unwrap_or_else(|err| {
            warn!(%session, %identity, error = %err, "Override lookup failed, using group defaults");
            None
        });

        let binding = SessionBinding::new(session, identity, record);
        match self.cache.complete_login(ticket, binding.clone()) {
            Ok(previous) => {
                if let Some(previous) = previous {
                    debug!(
                        %session,
                        previous = %previous.identity(),
                        "Replaced stale session binding"
                    );
                }
                debug!(
                    %session,
                    %identity,
                    customized = binding.record().is_some(),
                    "Session bound"
                );
                Some(binding)
            }
            Err(_) => {
                debug!(%session, %identity, "Login superseded before lookup finished");
                None
            }
        }
    }

    /// Drop the session's binding. Nothing is written to the store.
    pub fn on_logout(&self, session: SessionId) {
        if let Some(binding) = self.cache.unbind(session) {
            debug!(%session, identity = %binding.identity(), "Session unbound");
        }
    }

    /// Answer a host permission query.
    ///
    /// Marks the check handled when the user layer has an explicit answer
    /// and returns the effective result either way.
    pub fn on_permission_check<G>(&self, check: &mut PermissionCheck<'_>, group: &G) -> bool
    where
        G: GroupDefaults + ?Sized,
    {
        let decision = self.resolver().decide(check.session, check.permission);
        if !decision.is_explicit() {
            return group.has_permission(check.permission);
        }
        check.handled = true;
        check.granted = decision == PermissionDecision::Allow;
        check.granted
    }

    /// Format a chat line from a player.
    pub fn on_chat<G, E, B>(
        &self,
        event: &ChatEvent,
        envelope: &mut E,
        group: &G,
        broadcaster: &B,
    ) -> ChatOutcome
    where
        G: GroupDefaults + ?Sized,
        E: MessageEnvelope + ?Sized,
        B: ChatBroadcaster + ?Sized,
    {
        let Some(session) = event.session else {
            return ChatOutcome::Skipped(SkipReason::NoSession);
        };
        let binding = self.cache.get(session);

        let can_chat =
            resolver::has_permission(binding.as_ref(), group, &self.config.chat_permission);
        if let Some(reason) = self.formatter.gate(event, can_chat) {
            return ChatOutcome::Skipped(reason);
        }

        let fields = resolver::resolve_chat_fields(binding.as_ref(), group);
        self.formatter
            .format(session, event, &fields, group, envelope, broadcaster)
    }
}

impl<R: OverrideRepository + 'static> HookHandler for Overlay<R> {
    fn post_login(&self, session: SessionId, identity: Identity) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.on_login(session, identity).await;
        })
    }

    fn logout(&self, session: SessionId) {
        self.on_logout(session);
    }

    fn permission(&self, check: &mut PermissionCheck<'_>, group: &dyn GroupDefaults) -> bool {
        self.on_permission_check(check, group)
    }

    fn chat(
        &self,
        event: &ChatEvent,
        envelope: &mut dyn MessageEnvelope,
        group: &dyn GroupDefaults,
        broadcaster: &dyn ChatBroadcaster,
    ) -> ChatOutcome {
        self.on_chat(event, envelope, group, broadcaster)
    }
}

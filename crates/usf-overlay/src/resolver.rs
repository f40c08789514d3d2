//! Merging a session's override record with its group's defaults.

use tracing::debug;
use usf_core::models::color::Rgb;
use usf_core::models::group::GroupDefaults;
use usf_core::models::identity::SessionId;
use usf_core::permission::PermissionDecision;

use crate::cache::{SessionBinding, SessionCache};

/// Effective chat decoration of one sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatFields {
    pub prefix: String,
    pub suffix: String,
    pub color: Rgb,
    /// The record set its own prefix (possibly empty), so the host's
    /// inherited prefix chain has to go before anything is applied.
    pub clear_prefix_chain: bool,
}

/// The user layer's answer for `name`; `Defer` without a record.
pub fn decide_permission(binding: Option<&SessionBinding>, name: &str) -> PermissionDecision {
    binding
        .and_then(SessionBinding::record)
        .map_or(PermissionDecision::Defer, |record| {
            record.permissions.decide(name)
        })
}

/// Denials, then grants, then the group.
pub fn has_permission<G>(binding: Option<&SessionBinding>, group: &G, name: &str) -> bool
where
    G: GroupDefaults + ?Sized,
{
    decide_permission(binding, name).or_group(group, name)
}

/// Field-by-field merge of the record over the group.
pub fn resolve_chat_fields<G>(binding: Option<&SessionBinding>, group: &G) -> ChatFields
where
    G: GroupDefaults + ?Sized,
{
    let record = binding.and_then(SessionBinding::record);

    let (prefix, clear_prefix_chain) = match record.and_then(|r| r.prefix.as_deref()) {
        Some(prefix) => (prefix.to_string(), true),
        None => (group.prefix().to_string(), false),
    };

    let suffix = record
        .and_then(|r| r.suffix.clone())
        .unwrap_or_else(|| group.suffix().to_string());

    let color = match record.and_then(|r| r.color()) {
        Some(Ok(color)) => color,
        Some(Err(err)) => {
            if let Some(record) = record {
                debug!(
                    identity = %record.identity,
                    stored = ?record.color,
                    error = %err,
                    "Ignoring malformed stored chat color"
                );
            }
            group.chat_color()
        }
        None => group.chat_color(),
    };

    ChatFields {
        prefix,
        suffix,
        color,
        clear_prefix_chain,
    }
}

/// Session-keyed front end over the cache.
#[derive(Clone, Copy)]
pub struct OverrideResolver<'c> {
    cache: &'c SessionCache,
}

impl<'c> OverrideResolver<'c> {
    pub fn new(cache: &'c SessionCache) -> Self {
        Self { cache }
    }

    pub fn decide(&self, session: Option<SessionId>, name: &str) -> PermissionDecision {
        session
            .and_then(|s| self.cache.with_binding(s, |b| decide_permission(Some(b), name)))
            .unwrap_or(PermissionDecision::Defer)
    }

    pub fn has_permission<G>(&self, session: Option<SessionId>, group: &G, name: &str) -> bool
    where
        G: GroupDefaults + ?Sized,
    {
        self.decide(session, name).or_group(group, name)
    }

    pub fn resolve_chat_fields<G>(&self, session: Option<SessionId>, group: &G) -> ChatFields
    where
        G: GroupDefaults + ?Sized,
    {
        let binding = session.and_then(|s| self.cache.get(s));
        resolve_chat_fields(binding.as_ref(), group)
    }
}

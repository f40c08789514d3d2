//! Chat formatting in the two display modes.
//!
//! Inline mode decorates the outgoing envelope. Above-heads mode
//! additionally swaps the sender's display name for a decorated one while
//! its chat line is broadcast, then puts the original name back. The
//! restore is owned by [`NameRestore`], whose `Drop` runs it on every exit
//! path, and is retried a configured number of times.

use tracing::{error, warn};
use usf_core::models::group::GroupDefaults;
use usf_core::models::identity::SessionId;

use crate::config::OverlayConfig;
use crate::host::{ChatBroadcaster, ChatEvent, MessageEnvelope};
use crate::resolver::ChatFields;

/// Why a chat line was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The line does not belong to a connected player.
    NoSession,
    /// The sender lacks the chat permission.
    CannotChat,
    Muted,
    /// The line is a command.
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    Skipped(SkipReason),
    Inline,
    AboveHeads {
        chat_delivered: bool,
        name_restored: bool,
    },
}

/// Parsed above-heads name template.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NameTemplate {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Group,
    Prefix,
    Name,
    Suffix,
}

impl NameTemplate {
    fn parse(template: &str) -> Self {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let placeholder = after.find('}').and_then(|close| {
                let part = match &after[..close] {
                    "group" | "0" => Part::Group,
                    "prefix" | "1" => Part::Prefix,
                    "name" | "2" => Part::Name,
                    "suffix" | "3" => Part::Suffix,
                    _ => return None,
                };
                Some((part, close))
            });
            match placeholder {
                Some((part, close)) => {
                    if !literal.is_empty() {
                        parts.push(Part::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(part);
                    rest = &after[close + 1..];
                }
                None => {
                    // Not a placeholder, keep the brace as text.
                    literal.push('{');
                    rest = after;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }
        Self { parts }
    }

    fn render(&self, group: &str, prefix: &str, name: &str, suffix: &str) -> String {
        let mut out = String::new();
        for part in &self.parts {
            out.push_str(match part {
                Part::Literal(text) => text,
                Part::Group => group,
                Part::Prefix => prefix,
                Part::Name => name,
                Part::Suffix => suffix,
            });
        }
        out
    }
}

/// Restores a session's display name when dropped.
struct NameRestore<'b, B: ChatBroadcaster + ?Sized> {
    broadcaster: &'b B,
    session: SessionId,
    original: &'b str,
    attempts: u32,
    done: bool,
}

impl<'b, B: ChatBroadcaster + ?Sized> NameRestore<'b, B> {
    fn new(broadcaster: &'b B, session: SessionId, original: &'b str, attempts: u32) -> Self {
        Self {
            broadcaster,
            session,
            original,
            attempts: attempts.max(1),
            done: false,
        }
    }

    fn finish(mut self) -> bool {
        self.done = true;
        self.restore()
    }

    fn restore(&self) -> bool {
        for attempt in 1..=self.attempts {
            match self.broadcaster.broadcast_name(self.session, self.original) {
                Ok(()) => return true,
                Err(err) => warn!(
                    session = %self.session,
                    attempt,
                    error = %err,
                    "Display name restore failed"
                ),
            }
        }
        error!(
            session = %self.session,
            attempts = self.attempts,
            "Giving up restoring display name"
        );
        false
    }
}

impl<B: ChatBroadcaster + ?Sized> Drop for NameRestore<'_, B> {
    fn drop(&mut self) {
        if !self.done {
            self.done = true;
            self.restore();
        }
    }
}

/// Formats chat lines according to the configured display mode.
#[derive(Debug, Clone)]
pub struct ChatFormatter {
    above_heads: bool,
    template: NameTemplate,
    command_specifier: String,
    command_silent_specifier: String,
    restore_attempts: u32,
}

impl ChatFormatter {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            above_heads: config.chat_above_heads,
            template: NameTemplate::parse(&config.chat_above_heads_format),
            command_specifier: config.command_specifier.clone(),
            command_silent_specifier: config.command_silent_specifier.clone(),
            restore_attempts: config.restore_attempts,
        }
    }

    /// Reason to leave `event` unformatted, if any.
    pub fn gate(&self, event: &ChatEvent, can_chat: bool) -> Option<SkipReason> {
        if event.session.is_none() {
            Some(SkipReason::NoSession)
        } else if !can_chat {
            Some(SkipReason::CannotChat)
        } else if event.muted {
            Some(SkipReason::Muted)
        } else if event.raw_text.starts_with(self.command_specifier.as_str())
            || event.raw_text.starts_with(self.command_silent_specifier.as_str())
        {
            Some(SkipReason::Command)
        } else {
            None
        }
    }

    /// Decorated display name used in above-heads mode.
    pub fn above_heads_name<G>(&self, group: &G, fields: &ChatFields, player_name: &str) -> String
    where
        G: GroupDefaults + ?Sized,
    {
        self.template
            .render(group.name(), &fields.prefix, player_name, &fields.suffix)
    }

    /// Format a chat line that already passed [`gate`](Self::gate).
    pub fn format<G, E, B>(
        &self,
        session: SessionId,
        event: &ChatEvent,
        fields: &ChatFields,
        group: &G,
        envelope: &mut E,
        broadcaster: &B,
    ) -> ChatOutcome
    where
        G: GroupDefaults + ?Sized,
        E: MessageEnvelope + ?Sized,
        B: ChatBroadcaster + ?Sized,
    {
        if !self.above_heads {
            decorate(envelope, fields);
            return ChatOutcome::Inline;
        }

        let decorated = self.above_heads_name(group, fields, &event.player_name);
        // Armed before the swap: the mutation itself may unwind after the
        // decorated name went out.
        let restore = NameRestore::new(
            broadcaster,
            session,
            &event.player_name,
            self.restore_attempts,
        );
        if let Err(err) = broadcaster.broadcast_name(session, &decorated) {
            warn!(%session, error = %err, "Display name broadcast failed");
        }

        let chat_delivered = match broadcaster.broadcast_chat(session, &event.raw_text, fields.color)
        {
            Ok(()) => true,
            Err(err) => {
                warn!(%session, error = %err, "Above-heads chat broadcast failed");
                false
            }
        };

        let name_restored = restore.finish();
        decorate(envelope, fields);

        ChatOutcome::AboveHeads {
            chat_delivered,
            name_restored,
        }
    }
}

fn decorate<E: MessageEnvelope + ?Sized>(envelope: &mut E, fields: &ChatFields) {
    if fields.clear_prefix_chain || !fields.prefix.is_empty() {
        envelope.clear_prefixes();
    }
    if !fields.prefix.is_empty() {
        envelope.prefix(&fields.prefix);
    }
    envelope.suffix(&fields.suffix);
    envelope.colorize(fields.color);
}

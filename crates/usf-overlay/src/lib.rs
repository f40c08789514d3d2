//! USF Overlay — per-user chat and permission overrides on top of group
//! defaults.
//!
//! The [`Overlay`] service is the entry point: the host calls its
//! lifecycle hooks (login, logout, permission check, chat) and
//! administrative tooling edits records through [`Overlay::admin`].

pub mod admin;
pub mod cache;
pub mod chat;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod resolver;
pub mod service;

pub use admin::OverrideAdmin;
pub use cache::{SessionBinding, SessionCache};
pub use chat::{ChatFormatter, ChatOutcome, SkipReason};
pub use config::OverlayConfig;
pub use dispatch::HookTable;
pub use error::{BroadcastError, OverlayError};
pub use host::{HookHandler, Registration};
pub use resolver::{ChatFields, OverrideResolver};
pub use service::Overlay;

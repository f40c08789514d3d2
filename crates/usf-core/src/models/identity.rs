//! Account and session identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable key of a registered account.
///
/// Survives reconnects and is the key under which override records are
/// persisted. Never confuse it with [`SessionId`], which only lives as long
/// as a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub u64);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Identity {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Identity)
    }
}

/// Handle of a live connection: the host's player slot.
///
/// Slots are reused after a disconnect, so a `SessionId` says nothing about
/// which account is behind it until a login binds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u8);

impl SessionId {
    /// Slot index the host uses as the sender index of broadcasts.
    pub fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

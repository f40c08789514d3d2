//! Per-account override record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::color::{ColorParseError, Rgb};
use super::identity::Identity;
use crate::permission::PermissionSet;

/// Everything one account overrides on top of its group.
///
/// Every chat field is independently optional: `None` means "use the
/// group's value", which is not the same as `Some(String::new())`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub identity: Identity,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Raw `"r,g,b"` text as stored. Validity is checked when resolving,
    /// see [`OverrideRecord::color`].
    pub color: Option<String>,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OverrideRecord {
    /// The stored color, parsed. `None` when no color is stored.
    pub fn color(&self) -> Option<Result<Rgb, ColorParseError>> {
        self.color.as_deref().map(Rgb::parse)
    }

    /// The write payload that would store this record unchanged.
    pub fn to_upsert(&self) -> UpsertOverride {
        UpsertOverride {
            identity: self.identity,
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
            color: self.color.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

/// Full replacement of an account's record. Stores never merge fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertOverride {
    pub identity: Identity,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub color: Option<String>,
    pub permissions: PermissionSet,
}

impl UpsertOverride {
    /// A payload with nothing overridden.
    pub fn empty(identity: Identity) -> Self {
        Self {
            identity,
            prefix: None,
            suffix: None,
            color: None,
            permissions: PermissionSet::new(),
        }
    }

    /// True when storing this would override nothing at all.
    pub fn is_blank(&self) -> bool {
        self.prefix.is_none()
            && self.suffix.is_none()
            && self.color.is_none()
            && self.permissions.is_empty()
    }
}

//! Group defaults: the fallback for every field a user does not override.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::color::Rgb;

/// Read-only view of a group as provided by the host.
pub trait GroupDefaults {
    fn name(&self) -> &str;
    fn prefix(&self) -> &str;
    fn suffix(&self) -> &str;
    fn chat_color(&self) -> Rgb;
    fn has_permission(&self, name: &str) -> bool;
}

/// A plain group value for hosts that keep groups in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub prefix: String,
    pub suffix: String,
    pub chat_color: Rgb,
    pub permissions: HashSet<String>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: String::new(),
            suffix: String::new(),
            chat_color: Rgb::WHITE,
            permissions: HashSet::new(),
        }
    }
}

impl GroupDefaults for Group {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn suffix(&self) -> &str {
        &self.suffix
    }

    fn chat_color(&self) -> Rgb {
        self.chat_color
    }

    fn has_permission(&self, name: &str) -> bool {
        self.permissions.contains(name)
    }
}

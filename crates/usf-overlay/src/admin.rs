//! Administrative edits of override records.
//!
//! Every edit reads the current record, changes it and writes it back as a
//! whole through the store's atomic upsert. The result is pushed to live
//! sessions of the same account so they do not wait for the next login.

use tracing::info;
use usf_core::error::{UsfError, UsfResult};
use usf_core::models::color::Rgb;
use usf_core::models::identity::Identity;
use usf_core::models::record::{OverrideRecord, UpsertOverride};
use usf_core::repository::{OverrideRepository, PaginatedResult, Pagination};

use crate::cache::SessionCache;

pub struct OverrideAdmin<'a, R: OverrideRepository> {
    repo: &'a R,
    cache: &'a SessionCache,
}

impl<'a, R: OverrideRepository> OverrideAdmin<'a, R> {
    pub fn new(repo: &'a R, cache: &'a SessionCache) -> Self {
        Self { repo, cache }
    }

    pub async fn get(&self, identity: Identity) -> UsfResult<Option<OverrideRecord>> {
        self.repo.get(identity).await
    }

    pub async fn list(&self, pagination: Pagination) -> UsfResult<PaginatedResult<OverrideRecord>> {
        self.repo.list(pagination).await
    }

    /// `None` clears the prefix so the group's applies again.
    pub async fn set_prefix(
        &self,
        identity: Identity,
        prefix: Option<String>,
    ) -> UsfResult<Option<OverrideRecord>> {
        self.edit(identity, |draft| draft.prefix = prefix).await
    }

    pub async fn set_suffix(
        &self,
        identity: Identity,
        suffix: Option<String>,
    ) -> UsfResult<Option<OverrideRecord>> {
        self.edit(identity, |draft| draft.suffix = suffix).await
    }

    /// Store a color given as `"r,g,b"`. Invalid text is rejected before
    /// anything is written.
    pub async fn set_color(
        &self,
        identity: Identity,
        color: Option<&str>,
    ) -> UsfResult<Option<OverrideRecord>> {
        let color = color
            .map(|text| {
                Rgb::parse(text).map_err(|e| UsfError::Validation {
                    message: format!("invalid color {text:?}: {e}"),
                })
            })
            .transpose()?;
        self.edit(identity, |draft| draft.color = color.map(|c| c.to_string()))
            .await
    }

    pub async fn grant(&self, identity: Identity, name: &str) -> UsfResult<Option<OverrideRecord>> {
        validate_permission_name(name)?;
        self.edit(identity, |draft| {
            draft.permissions.grant(name);
        })
        .await
    }

    pub async fn deny(&self, identity: Identity, name: &str) -> UsfResult<Option<OverrideRecord>> {
        validate_permission_name(name)?;
        self.edit(identity, |draft| {
            draft.permissions.deny(name);
        })
        .await
    }

    /// Drop any grant or denial of `name`.
    pub async fn revoke(&self, identity: Identity, name: &str) -> UsfResult<Option<OverrideRecord>> {
        validate_permission_name(name)?;
        self.edit(identity, |draft| {
            draft.permissions.revoke(name);
        })
        .await
    }

    /// Delete the account's whole record.
    pub async fn remove(&self, identity: Identity) -> UsfResult<()> {
        self.repo.delete(identity).await?;
        let sessions = self.cache.refresh_identity(identity, None);
        info!(%identity, sessions, "Override record removed");
        Ok(())
    }

    /// Read-modify-write. A record left with nothing overridden is deleted.
    async fn edit(
        &self,
        identity: Identity,
        change: impl FnOnce(&mut UpsertOverride),
    ) -> UsfResult<Option<OverrideRecord>> {
        let mut draft = self
            .repo
            .get(identity)
            .await?
            .map(|record| record.to_upsert())
            .unwrap_or_else(|| UpsertOverride::empty(identity));
        change(&mut draft);

        if draft.is_blank() {
            self.remove(identity).await?;
            return Ok(None);
        }

        let record = self.repo.upsert(draft).await?;
        let sessions = self.cache.refresh_identity(identity, Some(record.clone()));
        info!(%identity, sessions, "Override record updated");
        Ok(Some(record))
    }
}

fn validate_permission_name(name: &str) -> UsfResult<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(UsfError::Validation {
            message: format!("invalid permission name {name:?}"),
        });
    }
    if name.starts_with(usf_core::permission::NEGATION_PREFIX) {
        return Err(UsfError::Validation {
            message: format!("permission name {name:?} must not start with '!'; use deny"),
        });
    }
    Ok(())
}

//! Grant management: upsert and removal of named grants

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::permissions::{same_id, usable, PermissionsDocument, Role, UserPermission};

use super::{now, SharingError};

/// A grant to add or update. Grants made this way are never owner grants.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGrant {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
}

impl NewGrant {
    pub fn for_username(username: &str, role: Role) -> Self {
        Self {
            user_id: None,
            username: Some(username.to_string()),
            email: None,
            role,
        }
    }

    fn has_identifier(&self) -> bool {
        usable(&self.user_id).is_some()
            || usable(&self.username).is_some()
            || usable(&self.email).is_some()
    }

    /// Same username, same email, or same userId
    fn matches(&self, existing: &UserPermission) -> bool {
        same_id(usable(&self.username), existing.username())
            || same_id(usable(&self.email), existing.email())
            || same_id(usable(&self.user_id), existing.user_id())
    }
}

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantOutcome {
    Added,
    Updated,
}

/// Add a grant, or update the role of the grant it matches.
///
/// Matching is by username, email or userId. Identifiers supplied on an
/// update fill in or replace the stored ones; the original `addedAt` is kept.
/// Fails with `OwnerProtected` if the added or updated grant would share any
/// identifier with an owner grant.
pub fn add_or_update_user_permission(
    doc: &mut PermissionsDocument,
    grant: NewGrant,
) -> Result<GrantOutcome, SharingError> {
    if !grant.has_identifier() {
        return Err(SharingError::MissingIdentifier);
    }

    let position = doc.user_permissions.iter().position(|g| grant.matches(g));
    let target = position.map(|i| &doc.user_permissions[i]);
    if let Some(owner) = owner_collision(doc, target, &grant) {
        warn!(username = owner.username(), "refusing to modify owner grant");
        return Err(SharingError::OwnerProtected);
    }

    let outcome = match position {
        Some(i) => {
            let existing = &mut doc.user_permissions[i];
            existing.role = Some(grant.role);
            if let Some(user_id) = usable(&grant.user_id) {
                existing.user_id = Some(user_id.to_string());
            }
            if let Some(username) = usable(&grant.username) {
                existing.username = Some(username.to_string());
            }
            if let Some(email) = usable(&grant.email) {
                existing.email = Some(email.to_string());
            }
            GrantOutcome::Updated
        }
        None => {
            doc.user_permissions.push(UserPermission {
                user_id: grant.user_id.filter(|s| !s.is_empty()),
                username: grant.username.filter(|s| !s.is_empty()),
                email: grant.email.filter(|s| !s.is_empty()),
                role: Some(grant.role),
                is_owner: false,
                added_at: Some(now()),
                ..Default::default()
            });
            GrantOutcome::Added
        }
    };

    doc.last_modified = Some(now());
    debug!(?outcome, grants = doc.user_permissions.len(), "grant upsert");
    Ok(outcome)
}

/// Owner grant sharing an identifier with `target` once `grant` is merged
/// into it, or with `grant` alone when it would be added
fn owner_collision<'a>(
    doc: &'a PermissionsDocument,
    target: Option<&UserPermission>,
    grant: &NewGrant,
) -> Option<&'a UserPermission> {
    let merged = [
        usable(&grant.user_id).or_else(|| target.and_then(|t| t.user_id())),
        usable(&grant.username).or_else(|| target.and_then(|t| t.username())),
        usable(&grant.email).or_else(|| target.and_then(|t| t.email())),
    ];
    doc.user_permissions
        .iter()
        .filter(|g| g.is_owner)
        .find(|owner| merged.into_iter().flatten().any(|id| owner.matches_identifier(id)))
}

/// Remove every grant whose username, email or userId equals `identifier`.
///
/// If the owner's grant matches, nothing is removed and the call fails.
/// Returns the number of grants removed.
pub fn remove_user_permission_by_username(
    doc: &mut PermissionsDocument,
    identifier: &str,
) -> Result<usize, SharingError> {
    if identifier.is_empty() {
        return Ok(0);
    }

    if doc
        .user_permissions
        .iter()
        .any(|g| g.is_owner && g.matches_identifier(identifier))
    {
        warn!(identifier, "refusing to remove owner grant");
        return Err(SharingError::OwnerProtected);
    }

    let before = doc.user_permissions.len();
    doc.user_permissions
        .retain(|g| !g.matches_identifier(identifier));
    let removed = before - doc.user_permissions.len();

    if removed > 0 {
        doc.last_modified = Some(now());
    }
    debug!(identifier, removed, "grant removal");
    Ok(removed)
}

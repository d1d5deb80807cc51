//! Fresh permissions documents for newly authored experiments

use serde_json::Value;

use crate::permissions::{PermissionsDocument, Principal, Role, UserPermission, Visibility};

use super::{now, RestrictedSettings, SharingError};

/// Builds the permissions document for a new experiment.
///
/// The result always holds exactly one grant, for the owner, at role admin.
#[derive(Debug, Clone)]
pub struct PermissionsBuilder<'a> {
    owner: &'a Principal,
    visibility: Visibility,
    settings: RestrictedSettings,
    timestamp: Option<String>,
}

impl<'a> PermissionsBuilder<'a> {
    /// Start a private document owned by `owner`
    pub fn new(owner: &'a Principal) -> Self {
        Self {
            owner,
            visibility: Visibility::Private,
            settings: RestrictedSettings::default(),
            timestamp: None,
        }
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Only used when the visibility is restricted
    pub fn restricted_settings(mut self, settings: RestrictedSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use a fixed creation time instead of now
    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn build(self) -> Result<PermissionsDocument, SharingError> {
        if !self.owner.is_identifiable() {
            return Err(SharingError::MissingIdentifier);
        }
        if let Visibility::Other(value) = &self.visibility {
            return Err(SharingError::UnknownVisibility(value.clone()));
        }

        let stamp = self.timestamp.map(Value::String).unwrap_or_else(now);
        let owner_grant = UserPermission {
            user_id: self.owner.user_id().map(str::to_string),
            username: self.owner.username().map(str::to_string),
            email: self.owner.email().map(str::to_string),
            role: Some(Role::Admin),
            is_owner: true,
            added_at: Some(stamp.clone()),
            ..Default::default()
        };

        let mut doc = PermissionsDocument {
            visibility: Some(self.visibility.clone()),
            user_permissions: vec![owner_grant],
            allow_link_sharing: Some(false),
            link_permission_level: Some(Value::from(Role::Viewer.as_str())),
            allow_duplication: Some(false),
            require_approval_for_access: Some(false),
            group_permissions: Some(Value::Array(Vec::new())),
            last_modified: Some(stamp),
            modified_by: self.owner.display_id().map(Value::from),
            ..Default::default()
        };

        match self.visibility {
            Visibility::Restricted => self.settings.apply(&mut doc),
            Visibility::Public => {
                doc.allow_edit = Some(true);
                doc.allow_export = Some(true);
                doc.allow_view_details = Some(true);
                doc.allow_version_control = Some(true);
                doc.allow_simplify = Some(true);
                doc.allow_link_sharing = Some(true);
            }
            Visibility::Private | Visibility::Other(_) => {}
        }

        Ok(doc)
    }
}

/// Permissions document for a new experiment owned by `owner`
pub fn default_permissions(
    owner: &Principal,
    visibility: &Visibility,
    settings: &RestrictedSettings,
) -> Result<PermissionsDocument, SharingError> {
    PermissionsBuilder::new(owner)
        .visibility(visibility.clone())
        .restricted_settings(*settings)
        .build()
}

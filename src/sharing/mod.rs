//! Sharing changes to a permissions document
//!
//! Everything in here mutates a caller-owned [`PermissionsDocument`]; the
//! evaluator in [`crate::permissions`] only reads. Callers wanting an
//! optimistic copy clone the document first and swap it in on success.
//!
//! These helpers keep the owner invariant: documents they build carry exactly
//! one owner grant, and the owner grant can't be edited or removed through
//! grant management.

mod builder;
mod grants;
mod visibility;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::permissions::{Feature, PermissionsDocument};

pub use builder::{default_permissions, PermissionsBuilder};
pub use grants::{add_or_update_user_permission, remove_user_permission_by_username, GrantOutcome, NewGrant};
pub use visibility::{make_private, make_public, make_restricted, update_visibility};

/// Errors from sharing changes
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharingError {
    #[error("the owner's grant cannot be modified or removed")]
    OwnerProtected,

    #[error("grant needs a username, email or userId")]
    MissingIdentifier,

    #[error("unknown visibility: {0}")]
    UnknownVisibility(String),
}

/// Per-feature choices for restricted visibility. Unset fields take the
/// feature's restricted default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictedSettings {
    pub allow_edit: Option<bool>,
    pub allow_export: Option<bool>,
    pub allow_view_details: Option<bool>,
    pub allow_version_control: Option<bool>,
    pub allow_simplify: Option<bool>,
}

impl RestrictedSettings {
    /// Write all five flags, resolving unset ones to their defaults
    fn apply(&self, doc: &mut PermissionsDocument) {
        let resolve = |value: Option<bool>, feature: Feature| {
            Some(value.unwrap_or_else(|| feature.restricted_default()))
        };

        doc.allow_edit = resolve(self.allow_edit, Feature::Edit);
        doc.allow_export = resolve(self.allow_export, Feature::Export);
        doc.allow_view_details = resolve(self.allow_view_details, Feature::ViewDetails);
        doc.allow_version_control = resolve(self.allow_version_control, Feature::VersionControl);
        doc.allow_simplify = resolve(self.allow_simplify, Feature::Simplify);
    }
}

/// Structural check for a document about to be stored.
///
/// Requires a known visibility and at least one owner grant. More than one
/// owner still passes.
pub fn validate_permissions(doc: &PermissionsDocument) -> bool {
    let visibility_ok = doc.visibility.as_ref().is_some_and(|v| v.is_known());
    visibility_ok && doc.owner_grant().is_some()
}

/// RFC 3339 stamp for `addedAt` and `lastModified`
fn now() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{Principal, Role, UserPermission, Visibility};

    fn owner_grant(username: &str) -> UserPermission {
        UserPermission {
            username: Some(username.to_string()),
            role: Some(Role::Admin),
            is_owner: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_restricted_settings_defaults() {
        let mut doc = PermissionsDocument::default();
        RestrictedSettings::default().apply(&mut doc);
        assert_eq!(doc.allow_view_details, Some(true));
        assert_eq!(doc.allow_export, Some(true));
        assert_eq!(doc.allow_simplify, Some(true));
        assert_eq!(doc.allow_edit, Some(false));
        assert_eq!(doc.allow_version_control, Some(false));
    }

    #[test]
    fn test_restricted_settings_explicit_values() {
        let settings: RestrictedSettings =
            serde_json::from_str(r#"{"allowEdit": true, "allowExport": false}"#).unwrap();
        let mut doc = PermissionsDocument::default();
        settings.apply(&mut doc);
        assert_eq!(doc.allow_edit, Some(true));
        assert_eq!(doc.allow_export, Some(false));
        assert_eq!(doc.allow_simplify, Some(true));
    }

    #[test]
    fn test_validate_permissions() {
        let mut doc = PermissionsDocument {
            visibility: Some(Visibility::Private),
            user_permissions: vec![owner_grant("alice")],
            ..Default::default()
        };
        assert!(validate_permissions(&doc));

        doc.visibility = None;
        assert!(!validate_permissions(&doc));

        doc.visibility = Some(Visibility::parse("weird"));
        assert!(!validate_permissions(&doc));

        doc.visibility = Some(Visibility::Public);
        doc.user_permissions[0].is_owner = false;
        assert!(!validate_permissions(&doc));

        doc.user_permissions.clear();
        assert!(!validate_permissions(&doc));
    }

    #[test]
    fn test_validate_permits_multiple_owners() {
        let doc = PermissionsDocument {
            visibility: Some(Visibility::Restricted),
            user_permissions: vec![owner_grant("alice"), owner_grant("bob")],
            ..Default::default()
        };
        assert!(validate_permissions(&doc));
    }

    #[test]
    fn test_default_restricted_document_validates() {
        let owner = Principal::from_username("alice");
        let settings = RestrictedSettings {
            allow_edit: Some(true),
            ..Default::default()
        };
        let doc = default_permissions(&owner, &Visibility::Restricted, &settings).unwrap();
        assert!(validate_permissions(&doc));
    }
}

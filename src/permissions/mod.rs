//! Experiment permission model and access evaluation
//!
//! An experiment carries an optional permissions document at
//! `content.permissions`. The document names a visibility tier, an ordered
//! list of user grants (exactly one of which should be the owner), and a set
//! of `allow*` flags that only matter under `restricted` visibility.
//!
//! Evaluation is pure and lives in [`evaluator`]. Anything that mutates a
//! document lives in [`crate::sharing`].
//!
//! Field names and enum strings match the stored JSON exactly so documents
//! written by other services deserialize unchanged. Fields this crate does
//! not model are carried in `extra` and written back verbatim.

pub mod evaluator;
pub mod roles;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub use evaluator::{
    can_access_restricted_feature, can_view_experiment, effective_role, find_user_grant, is_owner,
    summarize_access, AccessSummary,
};
pub use roles::{has_permission, Capability, Role};

/// Treat empty strings the same as missing identifiers
pub(crate) fn usable(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// `null` reads as the field's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Both sides present, non-empty and equal
pub(crate) fn same_id(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// Visibility tier of an experiment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Visibility {
    /// Only the owner
    Private,
    /// Owner plus named grantees, with per-feature flags
    Restricted,
    /// Everyone
    Public,
    /// Unrecognized value, evaluated fail-closed
    Other(String),
}

impl Visibility {
    pub fn parse(value: &str) -> Self {
        match value {
            "private" => Visibility::Private,
            "restricted" => Visibility::Restricted,
            "public" => Visibility::Public,
            other => Visibility::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Visibility::Private => "private",
            Visibility::Restricted => "restricted",
            Visibility::Public => "public",
            Visibility::Other(value) => value,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Visibility::Other(_))
    }
}

impl From<String> for Visibility {
    fn from(value: String) -> Self {
        match Visibility::parse(&value) {
            Visibility::Other(_) => Visibility::Other(value),
            known => known,
        }
    }
}

impl From<Visibility> for String {
    fn from(visibility: Visibility) -> Self {
        match visibility {
            Visibility::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Features that can be individually gated under restricted visibility
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Feature {
    ViewDetails,
    Export,
    VersionControl,
    Edit,
    Simplify,
    Delete,
    /// Feature name this crate does not know about
    Other(String),
}

impl Feature {
    /// Every feature the evaluator has an explicit rule for
    pub const KNOWN: [Feature; 6] = [
        Feature::ViewDetails,
        Feature::Export,
        Feature::VersionControl,
        Feature::Edit,
        Feature::Simplify,
        Feature::Delete,
    ];

    pub fn parse(name: &str) -> Self {
        match name {
            "viewDetails" => Feature::ViewDetails,
            "export" => Feature::Export,
            "versionControl" => Feature::VersionControl,
            "edit" => Feature::Edit,
            "simplify" => Feature::Simplify,
            "delete" => Feature::Delete,
            other => Feature::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Feature::ViewDetails => "viewDetails",
            Feature::Export => "export",
            Feature::VersionControl => "versionControl",
            Feature::Edit => "edit",
            Feature::Simplify => "simplify",
            Feature::Delete => "delete",
            Feature::Other(name) => name,
        }
    }

    /// Decision for a non-owner under restricted visibility when the
    /// feature's flag is unset.
    ///
    /// Read and export style features are opt-out; edit and version history
    /// are opt-in; delete is never granted through a flag.
    pub fn restricted_default(&self) -> bool {
        match self {
            Feature::ViewDetails | Feature::Export | Feature::Simplify => true,
            Feature::VersionControl | Feature::Edit | Feature::Delete => false,
            // TODO: confirm with product whether unknown feature names should be denied
            Feature::Other(_) => true,
        }
    }
}

impl From<String> for Feature {
    fn from(name: String) -> Self {
        match Feature::parse(&name) {
            Feature::Other(_) => Feature::Other(name),
            known => known,
        }
    }
}

impl From<Feature> for String {
    fn from(feature: Feature) -> Self {
        match feature {
            Feature::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The requesting user, as issued by the identity provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Subject id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Opaque id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Identity provider spelling, preferred over `username`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Principal {
    pub fn from_username(username: &str) -> Self {
        Self {
            preferred_username: Some(username.to_string()),
            ..Default::default()
        }
    }

    pub fn from_email(email: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    pub fn from_sub(sub: &str) -> Self {
        Self {
            sub: Some(sub.to_string()),
            ..Default::default()
        }
    }

    pub fn sub(&self) -> Option<&str> {
        usable(&self.sub)
    }

    pub fn id(&self) -> Option<&str> {
        usable(&self.id)
    }

    pub fn username(&self) -> Option<&str> {
        usable(&self.preferred_username).or_else(|| usable(&self.username))
    }

    pub fn email(&self) -> Option<&str> {
        usable(&self.email)
    }

    /// At least one identifier is present and non-empty
    pub fn is_identifiable(&self) -> bool {
        self.sub().is_some()
            || self.id().is_some()
            || self.username().is_some()
            || self.email().is_some()
    }

    /// Stable id for a grant's `userId`: subject id, falling back to opaque id
    pub fn user_id(&self) -> Option<&str> {
        self.sub().or_else(|| self.id())
    }

    /// Best human-readable identifier, for audit fields
    pub fn display_id(&self) -> Option<&str> {
        self.username()
            .or_else(|| self.email())
            .or_else(|| self.user_id())
    }

    /// Check whether any identifier equals `value`
    pub fn has_identifier(&self, value: &str) -> bool {
        [self.sub(), self.id(), self.username(), self.email()]
            .into_iter()
            .any(|id| same_id(id, Some(value)))
    }
}

/// One entry in `userPermissions`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_owner: bool,
    /// Usually an RFC 3339 string; kept as written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserPermission {
    pub fn user_id(&self) -> Option<&str> {
        usable(&self.user_id)
    }

    pub fn username(&self) -> Option<&str> {
        usable(&self.username)
    }

    pub fn email(&self) -> Option<&str> {
        usable(&self.email)
    }

    pub fn has_identifier(&self) -> bool {
        self.user_id().is_some() || self.username().is_some() || self.email().is_some()
    }

    /// Check whether `value` equals this grant's username, email or userId
    pub fn matches_identifier(&self, value: &str) -> bool {
        let value = Some(value);
        same_id(self.username(), value)
            || same_id(self.email(), value)
            || same_id(self.user_id(), value)
    }

    /// Named-grantee match: username to username, userId to subject or
    /// opaque id
    pub fn names_principal(&self, principal: &Principal) -> bool {
        same_id(self.username(), principal.username())
            || same_id(self.user_id(), principal.sub())
            || same_id(self.user_id(), principal.id())
    }

    /// Owner match, deliberately cross-field: a grant's username may hold an
    /// id and its userId may hold a username.
    pub fn identifies_owner(&self, principal: &Principal) -> bool {
        let username = self.username();
        let user_id = self.user_id();

        same_id(username, principal.username())
            || same_id(username, principal.id())
            || same_id(username, principal.sub())
            || same_id(user_id, principal.sub())
            || same_id(user_id, principal.id())
            || same_id(user_id, principal.username())
            || same_id(self.email(), principal.email())
    }
}

/// The permissions document embedded in an experiment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsDocument {
    /// Absent on documents written before visibility existed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_permissions: Vec<UserPermission>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_edit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_export: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_view_details: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_version_control: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_simplify: Option<bool>,
    /// Legacy flag, never evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_delete: Option<bool>,

    // Carried for other collaborators; not evaluated here. Fields without a
    // bool shape are held as raw JSON so any stored value survives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_link_sharing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_permission_level: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_expiry_days: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_duplication: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_approval_for_access: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_permissions: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PermissionsDocument {
    /// The grant flagged as owner. With several, the first one wins.
    pub fn owner_grant(&self) -> Option<&UserPermission> {
        self.user_permissions.iter().find(|g| g.is_owner)
    }

    /// Stored flag for a restricted feature, if it has one
    pub fn feature_flag(&self, feature: &Feature) -> Option<bool> {
        match feature {
            Feature::ViewDetails => self.allow_view_details,
            Feature::Export => self.allow_export,
            Feature::VersionControl => self.allow_version_control,
            Feature::Edit => self.allow_edit,
            Feature::Simplify => self.allow_simplify,
            Feature::Delete | Feature::Other(_) => None,
        }
    }
}

/// The `content` object of an experiment record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionsDocument>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An experiment record, as returned by the experiment REST API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ExperimentContent>,

    // Legacy owner fields, consulted only without an owner grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(
        default,
        rename = "createdBy",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_by_camel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Experiment {
    /// Experiment with an embedded permissions document
    pub fn with_permissions(permissions: PermissionsDocument) -> Self {
        Self {
            content: Some(ExperimentContent {
                permissions: Some(permissions),
                extra: Map::new(),
            }),
            ..Default::default()
        }
    }

    /// Experiment without a permissions document, owned via `created_by`
    pub fn legacy(created_by: &str) -> Self {
        Self {
            created_by: Some(created_by.to_string()),
            ..Default::default()
        }
    }

    pub fn permissions(&self) -> Option<&PermissionsDocument> {
        self.content.as_ref()?.permissions.as_ref()
    }

    pub fn permissions_mut(&mut self) -> Option<&mut PermissionsDocument> {
        self.content.as_mut()?.permissions.as_mut()
    }

    /// First present of `created_by`, `createdBy`, `owner_id`.
    ///
    /// An empty first field shadows the later ones, then reads as absent.
    pub fn legacy_owner(&self) -> Option<&str> {
        let field = self
            .created_by
            .as_ref()
            .or(self.created_by_camel.as_ref())
            .or(self.owner_id.as_ref());
        field.map(String::as_str).filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_visibility_parse_and_unknown() {
        assert_eq!(Visibility::parse("private"), Visibility::Private);
        assert_eq!(Visibility::parse("restricted"), Visibility::Restricted);
        assert_eq!(Visibility::parse("public"), Visibility::Public);
        assert_eq!(
            Visibility::parse("Public"),
            Visibility::Other("Public".to_string())
        );
        assert!(!Visibility::parse("weird").is_known());
    }

    #[test]
    fn test_principal_identifiers_ignore_empty_strings() {
        let principal = Principal {
            sub: Some(String::new()),
            id: Some(String::new()),
            preferred_username: Some(String::new()),
            username: Some(String::new()),
            email: None,
        };
        assert!(!principal.is_identifiable());
        assert_eq!(principal.display_id(), None);

        let principal = Principal {
            sub: Some(String::new()),
            id: Some("u-42".to_string()),
            ..Default::default()
        };
        assert_eq!(principal.user_id(), Some("u-42"));
        assert!(principal.has_identifier("u-42"));
        assert!(!principal.has_identifier(""));
    }

    #[test]
    fn test_principal_accepts_both_username_spellings() {
        let a: Principal = serde_json::from_value(json!({"preferred_username": "alice"})).unwrap();
        let b: Principal = serde_json::from_value(json!({"username": "alice"})).unwrap();
        assert_eq!(a.username(), Some("alice"));
        assert_eq!(b.username(), Some("alice"));
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            json!({"preferred_username": "alice"})
        );
        assert_eq!(serde_json::to_value(&b).unwrap(), json!({"username": "alice"}));
    }

    #[test]
    fn test_principal_with_both_username_keys() {
        let raw = json!({"sub": "kc-1", "preferred_username": "alice", "username": "alice"});
        let principal: Principal = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(principal.username(), Some("alice"));
        assert_eq!(serde_json::to_value(&principal).unwrap(), raw);

        let principal: Principal =
            serde_json::from_value(json!({"preferred_username": "", "username": "bob"})).unwrap();
        assert_eq!(principal.username(), Some("bob"));
        assert!(principal.has_identifier("bob"));

        let principal: Principal =
            serde_json::from_value(json!({"preferred_username": "alice", "username": "al"}))
                .unwrap();
        assert_eq!(principal.username(), Some("alice"));
    }

    #[test]
    fn test_document_field_names_round_trip() {
        let raw = json!({
            "visibility": "restricted",
            "userPermissions": [
                {"userId": "s-1", "username": "alice", "role": "admin", "isOwner": true,
                 "addedAt": "2024-03-01T10:00:00Z"}
            ],
            "allowEdit": true,
            "allowExport": false,
            "allowViewDetails": true,
            "allowVersionControl": false,
            "allowSimplify": true,
            "allowLinkSharing": false,
            "linkPermissionLevel": "viewer",
            "groupPermissions": [],
            "lastModified": "2024-03-02T10:00:00Z",
            "modifiedBy": "alice",
            "customFlag": {"nested": 1}
        });

        let doc: PermissionsDocument = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(doc.visibility, Some(Visibility::Restricted));
        assert_eq!(doc.allow_edit, Some(true));
        assert_eq!(doc.owner_grant().and_then(|g| g.username()), Some("alice"));
        assert_eq!(doc.extra.get("customFlag"), Some(&json!({"nested": 1})));

        assert_eq!(serde_json::to_value(&doc).unwrap(), raw);
    }

    #[test]
    fn test_loosely_typed_carried_fields_are_kept() {
        let raw = json!({
            "visibility": "restricted",
            "userPermissions": [
                {"username": "alice", "role": "admin", "isOwner": true, "addedAt": 1700000000000u64},
                {"username": "bob", "role": "viewer", "isOwner": null}
            ],
            "linkExpiryDays": "30",
            "linkPermissionLevel": {"level": "viewer"},
            "groupPermissions": {},
            "lastModified": 1700000000000u64,
            "modifiedBy": 42
        });
        let doc: PermissionsDocument = serde_json::from_value(raw).unwrap();
        assert_eq!(doc.link_expiry_days, Some(json!("30")));
        assert_eq!(doc.group_permissions, Some(json!({})));
        assert!(!doc.user_permissions[1].is_owner);

        let out = serde_json::to_value(&doc).unwrap();
        assert_eq!(out["linkExpiryDays"], "30");
        assert_eq!(out["lastModified"], 1700000000000u64);
        assert_eq!(out["userPermissions"][0]["addedAt"], 1700000000000u64);

        let doc: PermissionsDocument =
            serde_json::from_value(json!({"linkExpiryDays": -1, "userPermissions": null}))
                .unwrap();
        assert!(doc.user_permissions.is_empty());
        assert_eq!(doc.link_expiry_days, Some(json!(-1)));
    }

    #[test]
    fn test_unknown_visibility_is_preserved() {
        let doc: PermissionsDocument =
            serde_json::from_value(json!({"visibility": "weird", "userPermissions": []})).unwrap();
        assert_eq!(doc.visibility, Some(Visibility::Other("weird".to_string())));
        assert_eq!(serde_json::to_value(&doc).unwrap()["visibility"], "weird");
    }

    #[test]
    fn test_feature_flag_lookup() {
        let doc = PermissionsDocument {
            allow_edit: Some(true),
            allow_delete: Some(true),
            ..Default::default()
        };
        assert_eq!(doc.feature_flag(&Feature::Edit), Some(true));
        assert_eq!(doc.feature_flag(&Feature::Export), None);
        // allowDelete is never consulted
        assert_eq!(doc.feature_flag(&Feature::Delete), None);
    }

    #[test]
    fn test_experiment_legacy_owner_precedence() {
        let exp: Experiment = serde_json::from_value(json!({
            "createdBy": "camel",
            "owner_id": "owner"
        }))
        .unwrap();
        assert_eq!(exp.legacy_owner(), Some("camel"));

        let exp: Experiment = serde_json::from_value(json!({"owner_id": "owner"})).unwrap();
        assert_eq!(exp.legacy_owner(), Some("owner"));

        let exp: Experiment = serde_json::from_value(json!({
            "created_by": "",
            "owner_id": "owner"
        }))
        .unwrap();
        assert_eq!(exp.legacy_owner(), None);
    }

    #[test]
    fn test_experiment_extra_fields_survive() {
        let raw = json!({
            "id": 17,
            "title": "Titration",
            "content": {
                "steps": ["measure", "pour"],
                "permissions": {"visibility": "public", "userPermissions": []}
            },
            "created_by": "alice"
        });
        let exp: Experiment = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(
            exp.permissions().and_then(|p| p.visibility.clone()),
            Some(Visibility::Public)
        );
        assert_eq!(serde_json::to_value(&exp).unwrap(), raw);
    }
}

//! Role hierarchy for experiment grants
//!
//! Four roles, each a superset of the one below it:
//! - Viewer: view
//! - Commenter: view, comment
//! - Editor: view, comment, edit, duplicate
//! - Admin: view, comment, edit, delete, manage_permissions, duplicate
//!
//! Role strings outside this set are kept verbatim so stored documents
//! round-trip, but they carry no capabilities.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::UserPermission;

/// Capabilities a grant's role can confer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    View,
    Comment,
    Edit,
    Delete,
    ManagePermissions,
    Duplicate,
}

const VIEWER_CAPABILITIES: &[Capability] = &[Capability::View];

const COMMENTER_CAPABILITIES: &[Capability] = &[Capability::View, Capability::Comment];

const EDITOR_CAPABILITIES: &[Capability] = &[
    Capability::View,
    Capability::Comment,
    Capability::Edit,
    Capability::Duplicate,
];

const ADMIN_CAPABILITIES: &[Capability] = &[
    Capability::View,
    Capability::Comment,
    Capability::Edit,
    Capability::Delete,
    Capability::ManagePermissions,
    Capability::Duplicate,
];

/// Grant roles, lowest to highest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Viewer,
    Commenter,
    Editor,
    Admin,
    /// A role name this crate does not know about
    Other(String),
}

impl Role {
    /// Known roles in hierarchy order
    pub const HIERARCHY: [Role; 4] = [Role::Viewer, Role::Commenter, Role::Editor, Role::Admin];

    /// Parse a role name. Matching is exact; anything else becomes `Other`.
    pub fn parse(name: &str) -> Self {
        match name {
            "viewer" => Role::Viewer,
            "commenter" => Role::Commenter,
            "editor" => Role::Editor,
            "admin" => Role::Admin,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Viewer => "viewer",
            Role::Commenter => "commenter",
            Role::Editor => "editor",
            Role::Admin => "admin",
            Role::Other(name) => name,
        }
    }

    /// Capability set for this role
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Viewer => VIEWER_CAPABILITIES,
            Role::Commenter => COMMENTER_CAPABILITIES,
            Role::Editor => EDITOR_CAPABILITIES,
            Role::Admin => ADMIN_CAPABILITIES,
            Role::Other(_) => &[],
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        match Role::parse(&name) {
            Role::Other(_) => Role::Other(name),
            known => known,
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check whether a grant's role confers a capability.
///
/// Absent grants, grants without a role, and unknown roles confer nothing.
pub fn has_permission(grant: Option<&UserPermission>, capability: Capability) -> bool {
    grant
        .and_then(|g| g.role.as_ref())
        .is_some_and(|role| role.allows(capability))
}

//! Pure access decisions over an experiment and a principal
//!
//! Decision order for a restricted feature (first match wins):
//! 1. No permissions document → Allowed
//! 2. Owner → Allowed, for every feature
//! 3. Delete → Denied for everyone else
//! 4. No visibility or Public → Allowed; Private → Denied
//! 5. Restricted → the feature's `allow*` flag, or its default when unset
//! 6. Unknown visibility → Denied
//!
//! Nothing here fails. Missing or odd data falls open for viewing and
//! legacy records, and closed for ownership, delete and unknown tiers.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use super::{same_id, Experiment, Feature, PermissionsDocument, Principal, Role, UserPermission, Visibility};

/// Check whether `principal` owns `experiment`.
///
/// An owner grant in the permissions document is authoritative: once one
/// exists the legacy `created_by`/`createdBy`/`owner_id` fields are never
/// consulted, even if the grant does not match.
pub fn is_owner(experiment: Option<&Experiment>, principal: Option<&Principal>) -> bool {
    let (Some(experiment), Some(principal)) = (experiment, principal) else {
        return false;
    };
    if !principal.is_identifiable() {
        return false;
    }

    if let Some(owner) = experiment.permissions().and_then(|p| p.owner_grant()) {
        return owner.identifies_owner(principal);
    }

    match experiment.legacy_owner() {
        Some(owner) => principal.has_identifier(owner),
        None => false,
    }
}

/// Check whether `principal` may see `experiment` at all
pub fn can_view_experiment(experiment: &Experiment, principal: Option<&Principal>) -> bool {
    let Some(visibility) = visibility_of(experiment) else {
        return true;
    };

    let allowed = match visibility {
        Visibility::Public => true,
        Visibility::Private => is_owner(Some(experiment), principal),
        Visibility::Restricted => {
            is_owner(Some(experiment), principal)
                || experiment
                    .permissions()
                    .zip(principal)
                    .is_some_and(|(doc, p)| doc.user_permissions.iter().any(|g| g.names_principal(p)))
        }
        Visibility::Other(_) => false,
    };

    debug!(visibility = %visibility, allowed, "view decision");
    allowed
}

/// Check whether `principal` may use `feature` on `experiment`
pub fn can_access_restricted_feature(
    experiment: &Experiment,
    feature: &Feature,
    principal: Option<&Principal>,
) -> bool {
    let Some(doc) = experiment.permissions() else {
        return true;
    };

    if is_owner(Some(experiment), principal) {
        return true;
    }

    let allowed = match (doc.visibility.as_ref(), feature) {
        (_, Feature::Delete) => false,
        // documents written before visibility existed are open, like public
        (None, _) => true,
        (Some(Visibility::Private), _) => false,
        (Some(Visibility::Public), _) => true,
        (Some(Visibility::Restricted), feature) => restricted_flag(doc, feature),
        (Some(Visibility::Other(_)), _) => false,
    };

    debug!(
        visibility = doc.visibility.as_ref().map(Visibility::as_str),
        feature = %feature,
        allowed,
        "feature decision"
    );
    allowed
}

fn restricted_flag(doc: &PermissionsDocument, feature: &Feature) -> bool {
    doc.feature_flag(feature)
        .unwrap_or_else(|| feature.restricted_default())
}

fn visibility_of(experiment: &Experiment) -> Option<&Visibility> {
    experiment.permissions()?.visibility.as_ref()
}

/// First grant naming `principal` by username, userId or email
pub fn find_user_grant<'a>(
    doc: &'a PermissionsDocument,
    principal: &Principal,
) -> Option<&'a UserPermission> {
    doc.user_permissions
        .iter()
        .find(|g| g.names_principal(principal) || same_id(g.email(), principal.email()))
}

/// Role the principal holds on `experiment`: admin for the owner, otherwise
/// the role of its named grant.
pub fn effective_role(experiment: &Experiment, principal: &Principal) -> Option<Role> {
    if is_owner(Some(experiment), Some(principal)) {
        return Some(Role::Admin);
    }
    let doc = experiment.permissions()?;
    find_user_grant(doc, principal)?.role.clone()
}

/// Every decision a client needs to render an experiment's controls
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessSummary {
    pub is_owner: bool,
    pub can_view: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub features: BTreeMap<Feature, bool>,
}

pub fn summarize_access(experiment: &Experiment, principal: Option<&Principal>) -> AccessSummary {
    let features = Feature::KNOWN
        .into_iter()
        .map(|f| {
            let allowed = can_access_restricted_feature(experiment, &f, principal);
            (f, allowed)
        })
        .collect();

    AccessSummary {
        is_owner: is_owner(Some(experiment), principal),
        can_view: can_view_experiment(experiment, principal),
        role: principal.and_then(|p| effective_role(experiment, p)),
        features,
    }
}

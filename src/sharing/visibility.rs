//! Visibility transitions
//!
//! One function per target tier. Each rewrites the flags the tier owns and
//! stamps `lastModified`.

use tracing::debug;

use crate::permissions::{PermissionsDocument, Visibility};

use super::{now, RestrictedSettings, SharingError};

/// Owner plus named grantees, with per-feature flags from `settings`.
/// Link sharing is turned off.
pub fn make_restricted(doc: &mut PermissionsDocument, settings: &RestrictedSettings) {
    doc.visibility = Some(Visibility::Restricted);
    settings.apply(doc);
    doc.allow_link_sharing = Some(false);
    doc.last_modified = Some(now());
}

/// Open to everyone: all feature flags and link sharing on, legacy
/// `allowDelete` dropped.
pub fn make_public(doc: &mut PermissionsDocument) {
    doc.visibility = Some(Visibility::Public);
    doc.allow_edit = Some(true);
    doc.allow_export = Some(true);
    doc.allow_view_details = Some(true);
    doc.allow_version_control = Some(true);
    doc.allow_simplify = Some(true);
    doc.allow_delete = None;
    doc.allow_link_sharing = Some(true);
    doc.last_modified = Some(now());
}

/// Owner only: every `allow*` flag stripped, link sharing off
pub fn make_private(doc: &mut PermissionsDocument) {
    doc.visibility = Some(Visibility::Private);
    doc.allow_edit = None;
    doc.allow_export = None;
    doc.allow_view_details = None;
    doc.allow_version_control = None;
    doc.allow_simplify = None;
    doc.allow_delete = None;
    doc.allow_duplication = None;
    doc.allow_link_sharing = Some(false);
    doc.last_modified = Some(now());
}

/// Move `doc` to `visibility`. `settings` only matters for restricted.
pub fn update_visibility(
    doc: &mut PermissionsDocument,
    visibility: &Visibility,
    settings: &RestrictedSettings,
) -> Result<(), SharingError> {
    debug!(
        from = doc.visibility.as_ref().map(Visibility::as_str),
        to = %visibility,
        "visibility transition"
    );

    match visibility {
        Visibility::Private => make_private(doc),
        Visibility::Restricted => make_restricted(doc, settings),
        Visibility::Public => make_public(doc),
        Visibility::Other(value) => return Err(SharingError::UnknownVisibility(value.clone())),
    }
    Ok(())
}

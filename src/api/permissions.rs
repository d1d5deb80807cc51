//! Permission decision and sharing endpoints
//!
//! Every request carries the experiment (or bare permissions document) it is
//! about; nothing is stored between requests.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ErrorResponse;
use crate::permissions::{
    can_access_restricted_feature, can_view_experiment, is_owner, summarize_access, Experiment,
    Feature, PermissionsDocument, Principal, Visibility,
};
use crate::sharing::{
    add_or_update_user_permission, default_permissions, remove_user_permission_by_username,
    update_visibility, validate_permissions, GrantOutcome, NewGrant, RestrictedSettings,
    SharingError,
};

/// Build permissions router
pub fn router() -> Router {
    Router::new()
        .route("/permissions/owner", post(owner))
        .route("/permissions/view", post(view))
        .route("/permissions/feature", post(feature))
        .route("/permissions/summary", post(summary))
        .route("/permissions/default", post(create_default))
        .route("/permissions/visibility", post(change_visibility))
        .route("/permissions/grants", post(upsert_grant))
        .route("/permissions/grants/remove", post(remove_grant))
        .route("/permissions/validate", post(validate))
}

/// Experiment plus the user asking about it. A missing user is anonymous.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub experiment: Experiment,
    #[serde(default)]
    pub user: Option<Principal>,
}

#[derive(Debug, Deserialize)]
pub struct FeatureRequest {
    pub experiment: Experiment,
    #[serde(default)]
    pub user: Option<Principal>,
    pub feature: Feature,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub allowed: bool,
}

async fn owner(Json(req): Json<DecisionRequest>) -> impl IntoResponse {
    Json(DecisionResponse {
        allowed: is_owner(Some(&req.experiment), req.user.as_ref()),
    })
}

async fn view(Json(req): Json<DecisionRequest>) -> impl IntoResponse {
    Json(DecisionResponse {
        allowed: can_view_experiment(&req.experiment, req.user.as_ref()),
    })
}

async fn feature(Json(req): Json<FeatureRequest>) -> impl IntoResponse {
    Json(DecisionResponse {
        allowed: can_access_restricted_feature(&req.experiment, &req.feature, req.user.as_ref()),
    })
}

async fn summary(Json(req): Json<DecisionRequest>) -> impl IntoResponse {
    Json(summarize_access(&req.experiment, req.user.as_ref()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultRequest {
    pub owner: Principal,
    pub visibility: Visibility,
    #[serde(default)]
    pub restricted_settings: RestrictedSettings,
}

async fn create_default(Json(req): Json<DefaultRequest>) -> Response {
    match default_permissions(&req.owner, &req.visibility, &req.restricted_settings) {
        Ok(doc) => (StatusCode::CREATED, Json(doc)).into_response(),
        Err(e) => sharing_error(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRequest {
    pub permissions: PermissionsDocument,
    pub visibility: Visibility,
    #[serde(default)]
    pub restricted_settings: RestrictedSettings,
}

async fn change_visibility(Json(mut req): Json<VisibilityRequest>) -> Response {
    match update_visibility(
        &mut req.permissions,
        &req.visibility,
        &req.restricted_settings,
    ) {
        Ok(()) => (StatusCode::OK, Json(req.permissions)).into_response(),
        Err(e) => sharing_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub permissions: PermissionsDocument,
    pub grant: NewGrant,
}

#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub outcome: GrantOutcome,
    pub permissions: PermissionsDocument,
}

async fn upsert_grant(Json(mut req): Json<GrantRequest>) -> Response {
    match add_or_update_user_permission(&mut req.permissions, req.grant) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(GrantResponse {
                outcome,
                permissions: req.permissions,
            }),
        )
            .into_response(),
        Err(e) => sharing_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RemoveGrantRequest {
    pub permissions: PermissionsDocument,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct RemoveGrantResponse {
    pub removed: usize,
    pub permissions: PermissionsDocument,
}

async fn remove_grant(Json(mut req): Json<RemoveGrantRequest>) -> Response {
    match remove_user_permission_by_username(&mut req.permissions, &req.username) {
        Ok(removed) => (
            StatusCode::OK,
            Json(RemoveGrantResponse {
                removed,
                permissions: req.permissions,
            }),
        )
            .into_response(),
        Err(e) => sharing_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub permissions: PermissionsDocument,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

async fn validate(Json(req): Json<ValidateRequest>) -> impl IntoResponse {
    Json(ValidateResponse {
        valid: validate_permissions(&req.permissions),
    })
}

fn sharing_error(err: SharingError) -> Response {
    let status = match err {
        SharingError::OwnerProtected => StatusCode::CONFLICT,
        SharingError::MissingIdentifier | SharingError::UnknownVisibility(_) => {
            StatusCode::BAD_REQUEST
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

//! Admin API
//!
//! Administrator custom-claim management.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::common::{ApiResponse, SuccessResponse};
use crate::api::middleware::Authenticated;
use crate::error::PlatformError;
use crate::service::{ClaimService, UserClaimsView};

#[derive(Clone)]
pub struct AdminState {
    pub service: Arc<ClaimService>,
}

/// Grant the admin claim (admin)
#[utoipa::path(
    post,
    path = "/api/admin/set-admin/{uid}",
    tag = "admin",
    params(("uid" = String, Path, description = "Identity uid")),
    responses(
        (status = 200, description = "Admin claim granted", body = SuccessResponse),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_admin(
    State(state): State<AdminState>,
    auth: Authenticated,
    Path(uid): Path<String>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    state.service.set_admin(&auth.0, &uid).await?;
    Ok(SuccessResponse::with_message(format!("Admin claim set for user {}", uid)))
}

/// Revoke the admin claim (admin, not on oneself)
#[utoipa::path(
    post,
    path = "/api/admin/remove-admin/{uid}",
    tag = "admin",
    params(("uid" = String, Path, description = "Identity uid")),
    responses(
        (status = 200, description = "Admin claim removed", body = SuccessResponse),
        (status = 400, description = "Cannot remove own admin claim"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_admin(
    State(state): State<AdminState>,
    auth: Authenticated,
    Path(uid): Path<String>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    state.service.remove_admin(&auth.0, &uid).await?;
    Ok(SuccessResponse::with_message(format!("Admin claim removed for user {}", uid)))
}

/// Read an identity's custom claims (admin)
#[utoipa::path(
    get,
    path = "/api/admin/user-claims/{uid}",
    tag = "admin",
    params(("uid" = String, Path, description = "Identity uid")),
    responses(
        (status = 200, description = "Claims", body = UserClaimsView),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn user_claims(
    State(state): State<AdminState>,
    auth: Authenticated,
    Path(uid): Path<String>,
) -> Result<Json<ApiResponse<UserClaimsView>>, PlatformError> {
    let view = state.service.user_claims(&auth.0, &uid).await?;
    Ok(ApiResponse::ok(view))
}

pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/set-admin/:uid", post(set_admin))
        .route("/remove-admin/:uid", post(remove_admin))
        .route("/user-claims/:uid", get(user_claims))
        .with_state(state)
}

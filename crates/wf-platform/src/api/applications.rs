//! Applications API
//!
//! Submission and review of internship applications.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::common::ApiResponse;
use crate::api::middleware::{ApiJson, Authenticated};
use crate::domain::{ApplicantDetails, Application, ApplicationStatus};
use crate::error::PlatformError;
use crate::service::{ApplicationService, ApplicationUpdate};

/// Application response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResponse {
    pub id: String,
    pub uid: String,
    #[serde(flatten)]
    pub details: ApplicantDetails,
    pub status: ApplicationStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Application> for ApplicationResponse {
    fn from(a: Application) -> Self {
        Self {
            id: a.id,
            uid: a.uid,
            details: a.details,
            status: a.status,
            created_at: a.created_at.to_rfc3339(),
            updated_at: a.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedApplication {
    pub application_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// pending, shortlisted or rejected
    pub status: String,
}

#[derive(Clone)]
pub struct ApplicationsState {
    pub service: Arc<ApplicationService>,
}

/// Submit the caller's application
#[utoipa::path(
    post,
    path = "/api/applications",
    tag = "applications",
    request_body = ApplicantDetails,
    responses(
        (status = 201, description = "Application submitted", body = SubmittedApplication),
        (status = 400, description = "Validation error or already submitted")
    ),
    security(("bearer_auth" = []))
)]
pub async fn submit_application(
    State(state): State<ApplicationsState>,
    auth: Authenticated,
    ApiJson(req): ApiJson<ApplicantDetails>,
) -> Result<(StatusCode, Json<ApiResponse<SubmittedApplication>>), PlatformError> {
    let application = state.service.submit(&auth.0, req).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok_with_message(
            SubmittedApplication { application_id: application.id },
            "Application submitted successfully",
        ),
    ))
}

/// The caller's own application
#[utoipa::path(
    get,
    path = "/api/applications/my-application",
    tag = "applications",
    responses(
        (status = 200, description = "Application found", body = ApplicationResponse),
        (status = 404, description = "No application submitted")
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_application(
    State(state): State<ApplicationsState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<ApplicationResponse>>, PlatformError> {
    let application = state.service.my_application(&auth.0).await?;
    Ok(ApiResponse::ok(application.into()))
}

/// List all applications, newest first (admin)
#[utoipa::path(
    get,
    path = "/api/applications",
    tag = "applications",
    responses(
        (status = 200, description = "Applications", body = Vec<ApplicationResponse>),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_applications(
    State(state): State<ApplicationsState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<ApplicationResponse>>>, PlatformError> {
    let applications = state.service.list(&auth.0).await?;
    Ok(ApiResponse::ok(applications.into_iter().map(Into::into).collect()))
}

/// Get application by ID (owner or admin)
#[utoipa::path(
    get,
    path = "/api/applications/{id}",
    tag = "applications",
    params(("id" = String, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application found", body = ApplicationResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Application not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_application(
    State(state): State<ApplicationsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ApplicationResponse>>, PlatformError> {
    let application = state.service.get(&auth.0, &id).await?;
    Ok(ApiResponse::ok(application.into()))
}

/// Edit a pending application (owner)
#[utoipa::path(
    put,
    path = "/api/applications/{id}",
    tag = "applications",
    params(("id" = String, Path, description = "Application ID")),
    request_body = ApplicationUpdate,
    responses(
        (status = 200, description = "Application updated", body = ApplicationResponse),
        (status = 400, description = "Application can no longer be edited"),
        (status = 403, description = "Access denied")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_application(
    State(state): State<ApplicationsState>,
    auth: Authenticated,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ApplicationUpdate>,
) -> Result<Json<ApiResponse<ApplicationResponse>>, PlatformError> {
    let application = state.service.update_details(&auth.0, &id, req).await?;
    Ok(ApiResponse::ok_with_message(application.into(), "Application updated successfully"))
}

/// Shortlist or reject an application (admin)
///
/// Shortlisting derives the student record in the same write.
#[utoipa::path(
    put,
    path = "/api/applications/{id}/status",
    tag = "applications",
    params(("id" = String, Path, description = "Application ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApplicationResponse),
        (status = 400, description = "Invalid status or transition"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Application not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_application_status(
    State(state): State<ApplicationsState>,
    auth: Authenticated,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<ApplicationResponse>>, PlatformError> {
    let target = ApplicationStatus::parse(&req.status)?;
    let application = state.service.update_status(&auth.0, &id, target).await?;
    let message = format!("Application status updated to {}", application.status);
    Ok(ApiResponse::ok_with_message(application.into(), message))
}

pub fn applications_router(state: ApplicationsState) -> Router {
    Router::new()
        .route("/", post(submit_application).get(list_applications))
        .route("/my-application", get(my_application))
        .route("/:id", get(get_application).put(update_application))
        .route("/:id/status", put(update_application_status))
        .with_state(state)
}

//! Students API
//!
//! Self-service profile plus administrative progress tracking.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::common::{rfc3339, ApiResponse};
use crate::api::middleware::{ApiJson, Authenticated};
use crate::domain::{
    ApplicantDetails, InternshipStatus, ProgressSteps, Student, StudentPaymentStatus, StudentProfile,
    StudentStatus,
};
use crate::error::PlatformError;
use crate::service::{AdminStudentUpdate, ProfileUpdate, StudentService};

/// Student response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentResponse {
    pub uid: String,
    pub application_id: String,
    #[serde(flatten)]
    pub details: ApplicantDetails,
    #[serde(flatten)]
    pub profile: StudentProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_date: Option<String>,
    pub active_days: u32,
    pub projects_built: u32,
    pub progress_percentage: u8,
    pub internship_status: InternshipStatus,
    pub status: StudentStatus,
    pub payment_status: StudentPaymentStatus,
    pub progress_steps: ProgressSteps,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Student> for StudentResponse {
    fn from(s: Student) -> Self {
        Self {
            uid: s.uid,
            application_id: s.application_id,
            details: s.details,
            profile: s.profile,
            enrollment_date: rfc3339(s.enrollment_date),
            active_days: s.active_days,
            projects_built: s.projects_built,
            progress_percentage: s.progress_percentage,
            internship_status: s.internship_status,
            status: s.status,
            payment_status: s.payment_status,
            progress_steps: s.progress_steps,
            created_at: s.created_at.to_rfc3339(),
            updated_at: s.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StudentStatusRequest {
    /// shortlisted, active, completed or rejected
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusRequest {
    /// pending, failed or not_selected
    pub payment_status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub progress_percentage: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProgressStepRequest {
    /// Milestone name, e.g. `interviewCompleted`
    pub step: String,
    pub completed: bool,
}

#[derive(Clone)]
pub struct StudentsState {
    pub service: Arc<StudentService>,
}

type StudentResult = Result<Json<ApiResponse<StudentResponse>>, PlatformError>;

/// The caller's student record
#[utoipa::path(
    get,
    path = "/api/students/profile",
    tag = "students",
    responses(
        (status = 200, description = "Student record", body = StudentResponse),
        (status = 404, description = "No student record")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_profile(State(state): State<StudentsState>, auth: Authenticated) -> StudentResult {
    let student = state.service.profile(&auth.0).await?;
    Ok(ApiResponse::ok(student.into()))
}

/// Update the caller's editable profile fields
#[utoipa::path(
    put,
    path = "/api/students/profile",
    tag = "students",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = StudentResponse),
        (status = 404, description = "No student record")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    State(state): State<StudentsState>,
    auth: Authenticated,
    ApiJson(req): ApiJson<ProfileUpdate>,
) -> StudentResult {
    let student = state.service.update_profile(&auth.0, req).await?;
    Ok(ApiResponse::ok_with_message(student.into(), "Profile updated successfully"))
}

/// List students, newest first (admin)
#[utoipa::path(
    get,
    path = "/api/students",
    tag = "students",
    responses(
        (status = 200, description = "Students", body = Vec<StudentResponse>),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_students(
    State(state): State<StudentsState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<StudentResponse>>>, PlatformError> {
    let students = state.service.list(&auth.0).await?;
    Ok(ApiResponse::ok(students.into_iter().map(Into::into).collect()))
}

/// Get a student by uid (admin)
#[utoipa::path(
    get,
    path = "/api/students/{uid}",
    tag = "students",
    params(("uid" = String, Path, description = "Student uid")),
    responses(
        (status = 200, description = "Student record", body = StudentResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Student not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_student(
    State(state): State<StudentsState>,
    auth: Authenticated,
    Path(uid): Path<String>,
) -> StudentResult {
    let student = state.service.get(&auth.0, &uid).await?;
    Ok(ApiResponse::ok(student.into()))
}

/// Edit profile and activity fields (admin)
#[utoipa::path(
    put,
    path = "/api/students/{uid}",
    tag = "students",
    params(("uid" = String, Path, description = "Student uid")),
    request_body = AdminStudentUpdate,
    responses(
        (status = 200, description = "Student updated", body = StudentResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Student not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_student(
    State(state): State<StudentsState>,
    auth: Authenticated,
    Path(uid): Path<String>,
    ApiJson(req): ApiJson<AdminStudentUpdate>,
) -> StudentResult {
    let student = state.service.update(&auth.0, &uid, req).await?;
    Ok(ApiResponse::ok_with_message(student.into(), "Student updated successfully"))
}

/// Set the student status (admin)
#[utoipa::path(
    put,
    path = "/api/students/{uid}/status",
    tag = "students",
    params(("uid" = String, Path, description = "Student uid")),
    request_body = StudentStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = StudentResponse),
        (status = 400, description = "Invalid status")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_student_status(
    State(state): State<StudentsState>,
    auth: Authenticated,
    Path(uid): Path<String>,
    ApiJson(req): ApiJson<StudentStatusRequest>,
) -> StudentResult {
    let status = StudentStatus::parse(&req.status)?;
    let student = state.service.update_status(&auth.0, &uid, status).await?;
    Ok(ApiResponse::ok_with_message(student.into(), "Student status updated"))
}

/// Set the payment status (admin). `paid` is rejected.
#[utoipa::path(
    put,
    path = "/api/students/{uid}/payment-status",
    tag = "students",
    params(("uid" = String, Path, description = "Student uid")),
    request_body = PaymentStatusRequest,
    responses(
        (status = 200, description = "Payment status updated", body = StudentResponse),
        (status = 400, description = "Invalid or disallowed payment status")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_payment_status(
    State(state): State<StudentsState>,
    auth: Authenticated,
    Path(uid): Path<String>,
    ApiJson(req): ApiJson<PaymentStatusRequest>,
) -> StudentResult {
    let status = StudentPaymentStatus::parse(&req.payment_status)?;
    let student = state.service.update_payment_status(&auth.0, &uid, status).await?;
    Ok(ApiResponse::ok_with_message(student.into(), "Payment status updated"))
}

/// Set the progress percentage (admin)
#[utoipa::path(
    put,
    path = "/api/students/{uid}/progress",
    tag = "students",
    params(("uid" = String, Path, description = "Student uid")),
    request_body = ProgressRequest,
    responses(
        (status = 200, description = "Progress updated", body = StudentResponse),
        (status = 400, description = "Percentage out of range")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_progress(
    State(state): State<StudentsState>,
    auth: Authenticated,
    Path(uid): Path<String>,
    ApiJson(req): ApiJson<ProgressRequest>,
) -> StudentResult {
    let student = state.service.update_progress(&auth.0, &uid, req.progress_percentage).await?;
    Ok(ApiResponse::ok_with_message(student.into(), "Progress updated"))
}

/// Set or clear one milestone (admin)
#[utoipa::path(
    put,
    path = "/api/students/{uid}/progress-step",
    tag = "students",
    params(("uid" = String, Path, description = "Student uid")),
    request_body = ProgressStepRequest,
    responses(
        (status = 200, description = "Milestone updated", body = StudentResponse),
        (status = 400, description = "Unknown milestone")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_progress_step(
    State(state): State<StudentsState>,
    auth: Authenticated,
    Path(uid): Path<String>,
    ApiJson(req): ApiJson<ProgressStepRequest>,
) -> StudentResult {
    let student = state
        .service
        .update_progress_step(&auth.0, &uid, &req.step, req.completed)
        .await?;
    Ok(ApiResponse::ok_with_message(student.into(), "Progress step updated"))
}

pub fn students_router(state: StudentsState) -> Router {
    Router::new()
        .route("/", get(list_students))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/:uid", get(get_student).put(update_student))
        .route("/:uid/status", put(update_student_status))
        .route("/:uid/payment-status", put(update_payment_status))
        .route("/:uid/progress", put(update_progress))
        .route("/:uid/progress-step", put(update_progress_step))
        .with_state(state)
}

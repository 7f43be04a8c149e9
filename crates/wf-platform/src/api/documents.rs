//! Documents API
//!
//! Multipart upload of student documents, listing, visibility and deletion,
//! plus the authenticated file route that document URLs point at.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::common::{ApiResponse, SuccessResponse};
use crate::api::middleware::{ApiJson, Authenticated};
use crate::domain::{Document, DocumentCategory};
use crate::error::PlatformError;
use crate::service::{DocumentService, DocumentUpload};

/// Document response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: String,
    pub student_uid: String,
    pub document_type: DocumentCategory,
    pub file_name: String,
    pub file_url: String,
    pub file_size: u64,
    pub mime_type: String,
    pub uploaded_by: String,
    pub is_enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Document> for DocumentResponse {
    fn from(d: Document) -> Self {
        Self {
            id: d.id,
            student_uid: d.student_uid,
            document_type: d.category,
            file_name: d.file_name,
            file_url: d.file_url,
            file_size: d.file_size,
            mime_type: d.mime_type,
            uploaded_by: d.uploaded_by,
            is_enabled: d.is_enabled,
            created_at: d.created_at.to_rfc3339(),
            updated_at: d.updated_at.to_rfc3339(),
        }
    }
}

/// Multipart form accepted by the upload route
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// offer_letter, invoice, certificate or project_portfolio
    pub document_type: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

/// Room for multipart boundaries and the other form fields.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct DocumentsState {
    pub service: Arc<DocumentService>,
}

fn multipart_error(e: MultipartError) -> PlatformError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return PlatformError::validation("File exceeds the upload limit");
    }
    PlatformError::validation(e.body_text())
}

/// Reads the `file` and `documentType` parts.
async fn read_upload(mut multipart: Multipart) -> Result<DocumentUpload, PlatformError> {
    let mut file: Option<(String, String, Bytes)> = None;
    let mut document_type: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, mime_type, bytes));
            }
            Some("documentType") => {
                document_type = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let (file_name, mime_type, bytes) = file.ok_or_else(|| PlatformError::validation("No file uploaded"))?;
    let document_type = document_type.ok_or_else(|| PlatformError::validation("documentType is required"))?;

    Ok(DocumentUpload {
        category: DocumentCategory::parse(document_type.trim())?,
        file_name,
        mime_type,
        bytes,
    })
}

/// Upload a document for a student (admin)
#[utoipa::path(
    post,
    path = "/api/documents/upload/{studentUid}",
    tag = "documents",
    params(("studentUid" = String, Path, description = "Student uid")),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Document uploaded", body = DocumentResponse),
        (status = 400, description = "Missing, oversized or disallowed file"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Student not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_document(
    State(state): State<DocumentsState>,
    auth: Authenticated,
    Path(student_uid): Path<String>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<DocumentResponse>>, PlatformError> {
    let upload = read_upload(multipart).await?;
    let document = state.service.upload(&auth.0, &student_uid, upload).await?;
    Ok(ApiResponse::ok_with_message(document.into(), "Document uploaded successfully"))
}

/// The caller's enabled documents
#[utoipa::path(
    get,
    path = "/api/documents/my-documents",
    tag = "documents",
    responses(
        (status = 200, description = "Documents", body = Vec<DocumentResponse>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_documents(
    State(state): State<DocumentsState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<DocumentResponse>>>, PlatformError> {
    let documents = state.service.my_documents(&auth.0).await?;
    Ok(ApiResponse::ok(documents.into_iter().map(Into::into).collect()))
}

/// All documents of a student, including disabled ones (admin)
#[utoipa::path(
    get,
    path = "/api/documents/student/{studentUid}",
    tag = "documents",
    params(("studentUid" = String, Path, description = "Student uid")),
    responses(
        (status = 200, description = "Documents", body = Vec<DocumentResponse>),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn student_documents(
    State(state): State<DocumentsState>,
    auth: Authenticated,
    Path(student_uid): Path<String>,
) -> Result<Json<ApiResponse<Vec<DocumentResponse>>>, PlatformError> {
    let documents = state.service.student_documents(&auth.0, &student_uid).await?;
    Ok(ApiResponse::ok(documents.into_iter().map(Into::into).collect()))
}

/// Enable or disable a document (admin)
#[utoipa::path(
    put,
    path = "/api/documents/{id}",
    tag = "documents",
    params(("id" = String, Path, description = "Document ID")),
    request_body = SetEnabledRequest,
    responses(
        (status = 200, description = "Visibility updated", body = DocumentResponse),
        (status = 404, description = "Document not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_document_enabled(
    State(state): State<DocumentsState>,
    auth: Authenticated,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<SetEnabledRequest>,
) -> Result<Json<ApiResponse<DocumentResponse>>, PlatformError> {
    let document = state.service.set_enabled(&auth.0, &id, req.enabled).await?;
    let message = if req.enabled { "Document enabled" } else { "Document disabled" };
    Ok(ApiResponse::ok_with_message(document.into(), message))
}

/// Delete a document and its binary (admin)
#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    tag = "documents",
    params(("id" = String, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document deleted", body = SuccessResponse),
        (status = 404, description = "Document or file not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_document(
    State(state): State<DocumentsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    state.service.delete(&auth.0, &id).await?;
    Ok(SuccessResponse::with_message("Document deleted successfully"))
}

/// Download a stored file
#[utoipa::path(
    get,
    path = "/files/{key}",
    tag = "documents",
    params(("key" = String, Path, description = "Storage key")),
    responses(
        (status = 200, description = "File contents"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_file(
    State(state): State<DocumentsState>,
    auth: Authenticated,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, PlatformError> {
    let (document, bytes) = state.service.read_file(&auth.0, &key).await?;
    let disposition = format!("inline; filename=\"{}\"", document.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, document.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

pub fn documents_router(state: DocumentsState) -> Router {
    let upload_limit = state.service.max_upload_bytes() + MULTIPART_OVERHEAD_BYTES;
    Router::new()
        .route(
            "/upload/:student_uid",
            post(upload_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/my-documents", get(my_documents))
        .route("/student/:student_uid", get(student_documents))
        .route("/:id", put(set_document_enabled).delete(delete_document))
        .route("/:id/status", put(set_document_enabled))
        .with_state(state)
}

pub fn files_router(state: DocumentsState) -> Router {
    Router::new()
        .route("/*key", get(download_file))
        .with_state(state)
}

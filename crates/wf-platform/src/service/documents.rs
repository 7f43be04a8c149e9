//! Document lifecycle
//!
//! Binaries live in object storage under a deterministic key; metadata lives
//! in the store. Disabling hides a document from its owner, deleting removes
//! both halves.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::info;

use crate::domain::document::{is_allowed_mime_type, sanitize_file_name, storage_key};
use crate::domain::{Document, DocumentCategory};
use crate::error::{PlatformError, Result};
use crate::repository::{DocumentRepository, StudentRepository};
use crate::service::authorization::{checks, AuthContext};
use crate::service::storage::DocumentStorage;

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub category: DocumentCategory,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

pub struct DocumentService {
    documents: Arc<dyn DocumentRepository>,
    students: Arc<dyn StudentRepository>,
    storage: DocumentStorage,
    max_upload_bytes: usize,
}

impl DocumentService {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        students: Arc<dyn StudentRepository>,
        storage: DocumentStorage,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            documents,
            students,
            storage,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub async fn upload(&self, ctx: &AuthContext, student_uid: &str, upload: DocumentUpload) -> Result<Document> {
        checks::require_admin(ctx)?;

        if upload.bytes.is_empty() {
            return Err(PlatformError::validation("No file uploaded"));
        }
        if upload.bytes.len() > self.max_upload_bytes {
            return Err(PlatformError::validation(format!(
                "File exceeds the {} byte limit",
                self.max_upload_bytes
            )));
        }
        if !is_allowed_mime_type(&upload.mime_type) {
            return Err(PlatformError::validation(format!(
                "Unsupported file type: {}",
                upload.mime_type
            )));
        }
        if self.students.find_by_uid(student_uid).await?.is_none() {
            return Err(PlatformError::not_found("Student", student_uid));
        }

        let file_name = sanitize_file_name(&upload.file_name)?;
        let document = self
            .store(
                student_uid,
                upload.category,
                &file_name,
                &upload.mime_type,
                upload.bytes,
                &ctx.uid,
                None,
            )
            .await?;

        metrics::counter!("wf_documents_uploaded_total").increment(1);
        info!(
            document_id = %document.id,
            student_uid = %student_uid,
            category = %upload.category,
            "Document uploaded"
        );
        Ok(document)
    }

    /// Store a platform-generated document (`uploadedBy = system`) under a fixed id.
    pub async fn store_generated(
        &self,
        student_uid: &str,
        category: DocumentCategory,
        file_name: &str,
        mime_type: &str,
        bytes: Bytes,
        id: &str,
    ) -> Result<Document> {
        self.store(student_uid, category, file_name, mime_type, bytes, "system", Some(id))
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn store(
        &self,
        student_uid: &str,
        category: DocumentCategory,
        file_name: &str,
        mime_type: &str,
        bytes: Bytes,
        uploaded_by: &str,
        id: Option<&str>,
    ) -> Result<Document> {
        let key = storage_key(student_uid, category, file_name);
        let size = bytes.len() as u64;
        let url = self.storage.put(&key, bytes).await?;

        let mut document = Document::new(student_uid, category, file_name, &key, url, size, mime_type, uploaded_by);
        if let Some(id) = id {
            document = document.with_id(id);
        }

        // Same key means the binary was replaced; keep one metadata record for it
        if let Some(existing) = self.documents.find_by_storage_key(&key).await? {
            document.id = existing.id;
            document.created_at = existing.created_at;
        }

        self.documents.upsert(&document).await?;
        Ok(document)
    }

    pub async fn my_documents(&self, ctx: &AuthContext) -> Result<Vec<Document>> {
        self.documents.find_by_student(&ctx.uid, true).await
    }

    pub async fn student_documents(&self, ctx: &AuthContext, student_uid: &str) -> Result<Vec<Document>> {
        checks::require_admin(ctx)?;
        self.documents.find_by_student(student_uid, false).await
    }

    pub async fn set_enabled(&self, ctx: &AuthContext, id: &str, enabled: bool) -> Result<Document> {
        checks::require_admin(ctx)?;
        if !self.documents.set_enabled(id, enabled, Utc::now()).await? {
            return Err(PlatformError::not_found("Document", id));
        }

        info!(document_id = %id, enabled, admin = %ctx.uid, "Document visibility changed");
        self.find(id).await
    }

    /// Removes the binary, then the metadata. A missing binary is an error and
    /// leaves the metadata in place.
    pub async fn delete(&self, ctx: &AuthContext, id: &str) -> Result<()> {
        checks::require_admin(ctx)?;
        let document = self.find(id).await?;

        self.storage.delete(&document.storage_key).await?;
        if !self.documents.delete(id).await? {
            return Err(PlatformError::not_found("Document", id));
        }

        info!(document_id = %id, key = %document.storage_key, admin = %ctx.uid, "Document deleted");
        Ok(())
    }

    /// Binary behind a document URL. Owners only see enabled documents.
    pub async fn read_file(&self, ctx: &AuthContext, key: &str) -> Result<(Document, Bytes)> {
        let document = self
            .documents
            .find_by_storage_key(key)
            .await?
            .ok_or_else(|| PlatformError::not_found("File", key))?;

        let visible = ctx.is_admin || (ctx.is_owner(&document.student_uid) && document.is_enabled);
        if !visible {
            return Err(PlatformError::not_found("File", key));
        }

        let bytes = self.storage.get(key).await?;
        Ok((document, bytes))
    }

    async fn find(&self, id: &str) -> Result<Document> {
        self.documents
            .find_by_id(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Document", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApplicantDetails, Application, Student};
    use crate::repository::{MemoryStore, UnitOfWork};
    use wf_common::{NotificationKind, OutboxItem};

    fn admin() -> AuthContext {
        AuthContext {
            uid: "admin".to_string(),
            email: None,
            is_admin: true,
        }
    }

    fn owner() -> AuthContext {
        AuthContext {
            uid: "u1".to_string(),
            email: None,
            is_admin: false,
        }
    }

    fn pdf(name: &str) -> DocumentUpload {
        DocumentUpload {
            category: DocumentCategory::OfferLetter,
            file_name: name.to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: Bytes::from_static(b"%PDF-1.4"),
        }
    }

    async fn setup() -> (DocumentStorage, DocumentService) {
        let store = MemoryStore::new();
        let app = Application::new(
            "u1",
            ApplicantDetails {
                full_name: "Asha".to_string(),
                email: "a@x.com".to_string(),
                ..Default::default()
            },
        );
        let event = OutboxItem::new(NotificationKind::ApplicationShortlisted, &app.id, "a@x.com", serde_json::json!({}));
        store.submit_application(&app, &event).await.unwrap();
        let now = Utc::now();
        store
            .shortlist_application(&app.id, &Student::from_application(&app, now), &event, now)
            .await
            .unwrap();

        let storage = DocumentStorage::in_memory("http://files.local");
        let store = Arc::new(store);
        let svc = DocumentService::new(store.clone(), store, storage.clone(), 1024);
        (storage, svc)
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let (_, svc) = setup().await;

        let mut empty = pdf("a.pdf");
        empty.bytes = Bytes::new();
        assert!(matches!(svc.upload(&admin(), "u1", empty).await, Err(PlatformError::Validation { .. })));

        let mut big = pdf("a.pdf");
        big.bytes = Bytes::from(vec![0u8; 2048]);
        assert!(matches!(svc.upload(&admin(), "u1", big).await, Err(PlatformError::Validation { .. })));

        let mut exe = pdf("a.exe");
        exe.mime_type = "application/x-msdownload".to_string();
        assert!(matches!(svc.upload(&admin(), "u1", exe).await, Err(PlatformError::Validation { .. })));

        assert!(matches!(svc.upload(&admin(), "nobody", pdf("a.pdf")).await, Err(PlatformError::NotFound { .. })));
        assert!(matches!(svc.upload(&owner(), "u1", pdf("a.pdf")).await, Err(PlatformError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_disabled_documents_are_hidden_from_owner() {
        let (_, svc) = setup().await;
        let doc = svc.upload(&admin(), "u1", pdf("offer.pdf")).await.unwrap();
        assert_eq!(doc.storage_key, "documents/u1/offer_letter/offer.pdf");
        assert_eq!(svc.my_documents(&owner()).await.unwrap().len(), 1);

        svc.set_enabled(&admin(), &doc.id, false).await.unwrap();
        assert!(svc.my_documents(&owner()).await.unwrap().is_empty());
        assert_eq!(svc.student_documents(&admin(), "u1").await.unwrap().len(), 1);
        assert!(svc.read_file(&owner(), &doc.storage_key).await.is_err());
        assert!(svc.read_file(&admin(), &doc.storage_key).await.is_ok());
    }

    #[tokio::test]
    async fn test_reupload_replaces_in_place() {
        let (_, svc) = setup().await;
        let first = svc.upload(&admin(), "u1", pdf("offer.pdf")).await.unwrap();
        let second = svc.upload(&admin(), "u1", pdf("offer.pdf")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(svc.student_documents(&admin(), "u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_fails_loudly_when_binary_is_missing() {
        let (storage, svc) = setup().await;
        let doc = svc.upload(&admin(), "u1", pdf("offer.pdf")).await.unwrap();

        storage.delete(&doc.storage_key).await.unwrap();
        let err = svc.delete(&admin(), &doc.id).await.unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));
        assert_eq!(svc.student_documents(&admin(), "u1").await.unwrap().len(), 1);

        assert!(matches!(svc.delete(&admin(), "missing").await, Err(PlatformError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_removes_binary_and_metadata() {
        let (storage, svc) = setup().await;
        let doc = svc.upload(&admin(), "u1", pdf("offer.pdf")).await.unwrap();

        svc.delete(&admin(), &doc.id).await.unwrap();
        assert!(!storage.exists(&doc.storage_key).await.unwrap());
        assert!(svc.student_documents(&admin(), "u1").await.unwrap().is_empty());
    }
}

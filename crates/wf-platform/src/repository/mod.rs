//! Repository Layer
//!
//! Storage traits for every record type, with a MongoDB implementation and an
//! in-memory one for development and tests. Writes that must land together
//! with a notification go through [`UnitOfWork`].

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use wf_common::OutboxItem;

use crate::domain::{Application, Document, Payment, Student, UserClaims};
use crate::error::Result;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Application>>;
    async fn find_by_uid(&self, uid: &str) -> Result<Option<Application>>;
    /// Newest first
    async fn find_all(&self) -> Result<Vec<Application>>;
    /// Replace the record while it is still pending. Returns false if it is not.
    async fn update_pending(&self, application: &Application) -> Result<bool>;
    /// Delete up to `limit` rejected applications last updated before `cutoff`.
    async fn delete_rejected_before(&self, cutoff: DateTime<Utc>, limit: u32) -> Result<u64>;
}

#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn find_by_uid(&self, uid: &str) -> Result<Option<Student>>;
    async fn find_by_application_id(&self, application_id: &str) -> Result<Option<Student>>;
    /// Newest first
    async fn find_all(&self) -> Result<Vec<Student>>;
    async fn update(&self, student: &Student) -> Result<()>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: &Payment) -> Result<()>;
    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Payment>>;
    /// Newest first
    async fn find_by_uid(&self, uid: &str) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert or replace by id
    async fn upsert(&self, document: &Document) -> Result<()>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Document>>;
    async fn find_by_storage_key(&self, storage_key: &str) -> Result<Option<Document>>;
    /// Newest first
    async fn find_by_student(&self, student_uid: &str, enabled_only: bool) -> Result<Vec<Document>>;
    /// Returns false if no such document exists
    async fn set_enabled(&self, id: &str, enabled: bool, now: DateTime<Utc>) -> Result<bool>;
    async fn delete(&self, id: &str) -> Result<bool>;
}

#[async_trait]
pub trait ClaimRepository: Send + Sync {
    async fn find(&self, uid: &str) -> Result<Option<UserClaims>>;
    async fn upsert(&self, claims: &UserClaims) -> Result<()>;
    async fn count_admins(&self) -> Result<u64>;
}

/// Result of a shortlist write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortlistOutcome {
    /// The application moved from pending in this write
    pub transitioned: bool,
    /// A student record was inserted in this write
    pub student_created: bool,
}

/// Result of a capture write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured,
    /// The order was already paid with the same payment id
    AlreadyCaptured,
}

/// Multi-record writes that commit atomically with their outbox item.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Insert a pending application. Fails with a duplicate error when the
    /// identity already has one.
    async fn submit_application(&self, application: &Application, event: &OutboxItem) -> Result<()>;

    /// Move a pending application to shortlisted and derive its student record.
    /// Re-running against a shortlisted application only ensures the student
    /// exists. The event is written only when the status changed.
    async fn shortlist_application(
        &self,
        application_id: &str,
        student: &Student,
        event: &OutboxItem,
        now: DateTime<Utc>,
    ) -> Result<ShortlistOutcome>;

    /// Move a pending application to rejected. Returns false when it was
    /// already rejected.
    async fn reject_application(
        &self,
        application_id: &str,
        event: &OutboxItem,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Mark the payment paid and apply the activation fields to the stored
    /// student, leaving every other student field as stored.
    async fn capture_payment(
        &self,
        payment: &Payment,
        student_uid: &str,
        event: &OutboxItem,
        now: DateTime<Utc>,
    ) -> Result<CaptureOutcome>;
}

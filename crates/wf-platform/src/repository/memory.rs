//! In-memory store
//!
//! Implements every repository trait over a single lock, so each unit of
//! work is atomic. Used for local development (`WF_STORE=memory`) and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use wf_common::OutboxItem;

use crate::domain::{Application, ApplicationStatus, Document, Payment, PaymentStatus, Student, UserClaims};
use crate::error::{PlatformError, Result};
use crate::repository::{
    ApplicationRepository, CaptureOutcome, ClaimRepository, DocumentRepository, PaymentRepository,
    ShortlistOutcome, StudentRepository, UnitOfWork,
};

#[derive(Default)]
struct State {
    applications: HashMap<String, Application>,
    students: HashMap<String, Student>,
    payments: HashMap<String, Payment>,
    documents: HashMap<String, Document>,
    claims: HashMap<String, UserClaims>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    outbox: Arc<Mutex<Vec<OutboxItem>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outbox list shared with an in-process dispatcher.
    pub fn outbox_handle(&self) -> Arc<Mutex<Vec<OutboxItem>>> {
        self.outbox.clone()
    }

    pub fn outbox_items(&self) -> Vec<OutboxItem> {
        self.outbox.lock().clone()
    }

    pub fn student_count(&self) -> usize {
        self.state.lock().students.len()
    }

    pub fn application_count(&self) -> usize {
        self.state.lock().applications.len()
    }

    /// Test hook for aging records.
    pub fn set_application_updated_at(&self, id: &str, updated_at: DateTime<Utc>) {
        if let Some(app) = self.state.lock().applications.get_mut(id) {
            app.updated_at = updated_at;
        }
    }
}

fn newest_first<T>(mut items: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items
}

#[async_trait]
impl ApplicationRepository for MemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Application>> {
        Ok(self.state.lock().applications.get(id).cloned())
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<Application>> {
        Ok(self.state.lock().applications.values().find(|a| a.uid == uid).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Application>> {
        let all = self.state.lock().applications.values().cloned().collect();
        Ok(newest_first(all, |a: &Application| a.created_at))
    }

    async fn update_pending(&self, application: &Application) -> Result<bool> {
        let mut state = self.state.lock();
        match state.applications.get_mut(&application.id) {
            Some(existing) if existing.status == ApplicationStatus::Pending => {
                *existing = application.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_rejected_before(&self, cutoff: DateTime<Utc>, limit: u32) -> Result<u64> {
        let mut state = self.state.lock();
        let mut expired: Vec<(DateTime<Utc>, String)> = state
            .applications
            .values()
            .filter(|a| a.status == ApplicationStatus::Rejected && a.updated_at < cutoff)
            .map(|a| (a.updated_at, a.id.clone()))
            .collect();
        expired.sort();
        expired.truncate(limit as usize);

        for (_, id) in &expired {
            state.applications.remove(id);
        }
        Ok(expired.len() as u64)
    }
}

#[async_trait]
impl StudentRepository for MemoryStore {
    async fn find_by_uid(&self, uid: &str) -> Result<Option<Student>> {
        Ok(self.state.lock().students.get(uid).cloned())
    }

    async fn find_by_application_id(&self, application_id: &str) -> Result<Option<Student>> {
        Ok(self
            .state
            .lock()
            .students
            .values()
            .find(|s| s.application_id == application_id)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Student>> {
        let all = self.state.lock().students.values().cloned().collect();
        Ok(newest_first(all, |s: &Student| s.created_at))
    }

    async fn update(&self, student: &Student) -> Result<()> {
        let mut state = self.state.lock();
        match state.students.get_mut(&student.uid) {
            Some(existing) => {
                *existing = student.clone();
                Ok(())
            }
            None => Err(PlatformError::not_found("Student", &student.uid)),
        }
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn insert(&self, payment: &Payment) -> Result<()> {
        let mut state = self.state.lock();
        if state.payments.contains_key(&payment.order_id) {
            return Err(PlatformError::duplicate(format!("Payment order {} already exists", payment.order_id)));
        }
        state.payments.insert(payment.order_id.clone(), payment.clone());
        Ok(())
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Payment>> {
        Ok(self.state.lock().payments.get(order_id).cloned())
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Vec<Payment>> {
        let mine = self
            .state
            .lock()
            .payments
            .values()
            .filter(|p| p.uid == uid)
            .cloned()
            .collect();
        Ok(newest_first(mine, |p: &Payment| p.created_at))
    }
}

#[async_trait]
impl DocumentRepository for MemoryStore {
    async fn upsert(&self, document: &Document) -> Result<()> {
        self.state.lock().documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.state.lock().documents.get(id).cloned())
    }

    async fn find_by_storage_key(&self, storage_key: &str) -> Result<Option<Document>> {
        Ok(self
            .state
            .lock()
            .documents
            .values()
            .find(|d| d.storage_key == storage_key)
            .cloned())
    }

    async fn find_by_student(&self, student_uid: &str, enabled_only: bool) -> Result<Vec<Document>> {
        let docs = self
            .state
            .lock()
            .documents
            .values()
            .filter(|d| d.student_uid == student_uid && (!enabled_only || d.is_enabled))
            .cloned()
            .collect();
        Ok(newest_first(docs, |d: &Document| d.created_at))
    }

    async fn set_enabled(&self, id: &str, enabled: bool, now: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock();
        match state.documents.get_mut(id) {
            Some(doc) => {
                doc.is_enabled = enabled;
                doc.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.state.lock().documents.remove(id).is_some())
    }
}

#[async_trait]
impl ClaimRepository for MemoryStore {
    async fn find(&self, uid: &str) -> Result<Option<UserClaims>> {
        Ok(self.state.lock().claims.get(uid).cloned())
    }

    async fn upsert(&self, claims: &UserClaims) -> Result<()> {
        self.state.lock().claims.insert(claims.uid.clone(), claims.clone());
        Ok(())
    }

    async fn count_admins(&self) -> Result<u64> {
        Ok(self.state.lock().claims.values().filter(|c| c.admin).count() as u64)
    }
}

#[async_trait]
impl UnitOfWork for MemoryStore {
    async fn submit_application(&self, application: &Application, event: &OutboxItem) -> Result<()> {
        let mut state = self.state.lock();
        if state.applications.values().any(|a| a.uid == application.uid) {
            return Err(PlatformError::duplicate("Application already submitted"));
        }
        state.applications.insert(application.id.clone(), application.clone());
        self.outbox.lock().push(event.clone());
        Ok(())
    }

    async fn shortlist_application(
        &self,
        application_id: &str,
        student: &Student,
        event: &OutboxItem,
        now: DateTime<Utc>,
    ) -> Result<ShortlistOutcome> {
        let mut state = self.state.lock();

        let application = state
            .applications
            .get_mut(application_id)
            .ok_or_else(|| PlatformError::not_found("Application", application_id))?;

        let transitioned = match application.status {
            ApplicationStatus::Pending => {
                application.status = ApplicationStatus::Shortlisted;
                application.updated_at = now;
                true
            }
            ApplicationStatus::Shortlisted => false,
            ApplicationStatus::Rejected => {
                return Err(PlatformError::invalid_transition(
                    ApplicationStatus::Rejected,
                    ApplicationStatus::Shortlisted,
                ))
            }
        };

        let student_exists = state.students.values().any(|s| s.application_id == application_id);
        if !student_exists {
            state.students.insert(student.uid.clone(), student.clone());
        }

        if transitioned {
            self.outbox.lock().push(event.clone());
        }

        Ok(ShortlistOutcome {
            transitioned,
            student_created: !student_exists,
        })
    }

    async fn reject_application(
        &self,
        application_id: &str,
        event: &OutboxItem,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        let application = state
            .applications
            .get_mut(application_id)
            .ok_or_else(|| PlatformError::not_found("Application", application_id))?;

        match application.status {
            ApplicationStatus::Pending => {
                application.status = ApplicationStatus::Rejected;
                application.updated_at = now;
                self.outbox.lock().push(event.clone());
                Ok(true)
            }
            ApplicationStatus::Rejected => Ok(false),
            ApplicationStatus::Shortlisted => Err(PlatformError::invalid_transition(
                ApplicationStatus::Shortlisted,
                ApplicationStatus::Rejected,
            )),
        }
    }

    async fn capture_payment(
        &self,
        payment: &Payment,
        student_uid: &str,
        event: &OutboxItem,
        now: DateTime<Utc>,
    ) -> Result<CaptureOutcome> {
        let mut state = self.state.lock();

        let stored = state
            .payments
            .get(&payment.order_id)
            .ok_or_else(|| PlatformError::not_found("Payment", &payment.order_id))?;

        if stored.status == PaymentStatus::Paid {
            return if stored.payment_id == payment.payment_id {
                Ok(CaptureOutcome::AlreadyCaptured)
            } else {
                Err(PlatformError::validation("Payment has already been processed"))
            };
        }
        let student = state
            .students
            .get_mut(student_uid)
            .ok_or_else(|| PlatformError::not_found("Student", student_uid))?;
        student.activate_after_payment(now);

        state.payments.insert(payment.order_id.clone(), payment.clone());
        self.outbox.lock().push(event.clone());
        Ok(CaptureOutcome::Captured)
    }
}

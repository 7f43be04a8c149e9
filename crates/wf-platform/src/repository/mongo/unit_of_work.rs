use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, to_document, DateTime as BsonDateTime};
use mongodb::ClientSession;
use wf_common::OutboxItem;

use super::{is_duplicate_key, MongoStore};
use crate::domain::student::PAID_PROGRESS;
use crate::domain::{Application, ApplicationStatus, Payment, Student};
use crate::error::{PlatformError, Result};
use crate::repository::{CaptureOutcome, ShortlistOutcome, UnitOfWork};

impl MongoStore {
    async fn submit_in(
        &self,
        session: &mut ClientSession,
        application: &Application,
        event: &OutboxItem,
    ) -> Result<()> {
        if let Err(e) = self.applications.insert_one(application).session(&mut *session).await {
            if is_duplicate_key(&e) {
                return Err(PlatformError::duplicate("Application already submitted"));
            }
            return Err(e.into());
        }
        self.outbox.insert_one(event).session(&mut *session).await?;
        Ok(())
    }

    /// Current status of an application that a conditional update did not match.
    async fn status_of(&self, session: &mut ClientSession, application_id: &str) -> Result<ApplicationStatus> {
        self.applications
            .find_one(doc! { "_id": application_id })
            .session(&mut *session)
            .await?
            .map(|app| app.status)
            .ok_or_else(|| PlatformError::not_found("Application", application_id))
    }

    async fn shortlist_in(
        &self,
        session: &mut ClientSession,
        application_id: &str,
        student: &Student,
        event: &OutboxItem,
        now: DateTime<Utc>,
    ) -> Result<ShortlistOutcome> {
        let updated = self
            .applications
            .update_one(
                doc! { "_id": application_id, "status": "pending" },
                doc! { "$set": { "status": "shortlisted", "updatedAt": BsonDateTime::from_chrono(now) } },
            )
            .session(&mut *session)
            .await?;

        let transitioned = updated.modified_count > 0;
        if !transitioned {
            match self.status_of(session, application_id).await? {
                ApplicationStatus::Shortlisted => {}
                current => {
                    return Err(PlatformError::invalid_transition(
                        current,
                        ApplicationStatus::Shortlisted,
                    ))
                }
            }
        }

        let mut fields = to_document(student)?;
        fields.remove("applicationId");
        let upserted = self
            .students
            .update_one(
                doc! { "applicationId": application_id },
                doc! { "$setOnInsert": fields },
            )
            .upsert(true)
            .session(&mut *session)
            .await?;

        if transitioned {
            self.outbox.insert_one(event).session(&mut *session).await?;
        }

        Ok(ShortlistOutcome {
            transitioned,
            student_created: upserted.upserted_id.is_some(),
        })
    }

    async fn reject_in(
        &self,
        session: &mut ClientSession,
        application_id: &str,
        event: &OutboxItem,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let updated = self
            .applications
            .update_one(
                doc! { "_id": application_id, "status": "pending" },
                doc! { "$set": { "status": "rejected", "updatedAt": BsonDateTime::from_chrono(now) } },
            )
            .session(&mut *session)
            .await?;

        if updated.modified_count == 0 {
            return match self.status_of(session, application_id).await? {
                ApplicationStatus::Rejected => Ok(false),
                current => Err(PlatformError::invalid_transition(current, ApplicationStatus::Rejected)),
            };
        }

        self.outbox.insert_one(event).session(&mut *session).await?;
        Ok(true)
    }

    async fn capture_in(
        &self,
        session: &mut ClientSession,
        payment: &Payment,
        student_uid: &str,
        event: &OutboxItem,
        now: DateTime<Utc>,
    ) -> Result<CaptureOutcome> {
        let paid_at = payment.paid_at.unwrap_or(now);
        let updated = self
            .payments
            .update_one(
                doc! { "_id": &payment.order_id, "status": "created" },
                doc! { "$set": {
                    "status": "paid",
                    "paymentId": payment.payment_id.as_deref(),
                    "paidAt": BsonDateTime::from_chrono(paid_at),
                    "updatedAt": BsonDateTime::from_chrono(now),
                } },
            )
            .session(&mut *session)
            .await?;

        if updated.modified_count == 0 {
            let stored = self
                .payments
                .find_one(doc! { "_id": &payment.order_id })
                .session(&mut *session)
                .await?
                .ok_or_else(|| PlatformError::not_found("Payment", &payment.order_id))?;

            return if stored.is_paid() && stored.payment_id == payment.payment_id {
                Ok(CaptureOutcome::AlreadyCaptured)
            } else {
                Err(PlatformError::validation("Payment has already been processed"))
            };
        }

        // Only the activation fields; concurrent profile or progress edits survive.
        let at = BsonDateTime::from_chrono(now);
        let activated = self
            .students
            .update_one(
                doc! { "_id": student_uid },
                doc! {
                    "$set": {
                        "paymentStatus": "paid",
                        "internshipStatus": "active",
                        "status": "active",
                        "progressSteps.paymentProcess": true,
                        "progressSteps.internshipActive": true,
                        "updatedAt": at,
                    },
                    "$max": { "progressPercentage": i32::from(PAID_PROGRESS) },
                },
            )
            .session(&mut *session)
            .await?;
        if activated.matched_count == 0 {
            return Err(PlatformError::not_found("Student", student_uid));
        }

        self.students
            .update_one(
                doc! { "_id": student_uid, "enrollmentDate": { "$exists": false } },
                doc! { "$set": { "enrollmentDate": at } },
            )
            .session(&mut *session)
            .await?;

        self.outbox.insert_one(event).session(&mut *session).await?;
        Ok(CaptureOutcome::Captured)
    }
}

#[async_trait]
impl UnitOfWork for MongoStore {
    async fn submit_application(&self, application: &Application, event: &OutboxItem) -> Result<()> {
        in_transaction!(self, |session| self.submit_in(&mut session, application, event))
    }

    async fn shortlist_application(
        &self,
        application_id: &str,
        student: &Student,
        event: &OutboxItem,
        now: DateTime<Utc>,
    ) -> Result<ShortlistOutcome> {
        in_transaction!(self, |session| self.shortlist_in(
            &mut session,
            application_id,
            student,
            event,
            now
        ))
    }

    async fn reject_application(
        &self,
        application_id: &str,
        event: &OutboxItem,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        in_transaction!(self, |session| self.reject_in(&mut session, application_id, event, now))
    }

    async fn capture_payment(
        &self,
        payment: &Payment,
        student_uid: &str,
        event: &OutboxItem,
        now: DateTime<Utc>,
    ) -> Result<CaptureOutcome> {
        in_transaction!(self, |session| self.capture_in(&mut session, payment, student_uid, event, now))
    }
}

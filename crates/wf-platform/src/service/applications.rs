//! Application workflow
//!
//! Submission, owner edits while pending, and the admin status transitions.
//! Shortlisting derives the student record in the same write.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;
use wf_common::{NotificationKind, OutboxItem};

use crate::config::PricingConfig;
use crate::domain::{ApplicantDetails, Application, ApplicationStatus, StatusChange, Student};
use crate::error::{PlatformError, Result};
use crate::repository::{ApplicationRepository, UnitOfWork};
use crate::service::authorization::{checks, AuthContext};

/// Owner edit of a pending application. Status is not part of it.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_no: Option<String>,
    pub date_of_birth: Option<String>,
    pub location: Option<String>,
    pub college: Option<String>,
    pub degree: Option<String>,
    pub year_of_graduation: Option<i32>,
    pub skills: Option<Vec<String>>,
    pub interested_fields: Option<Vec<String>>,
    pub resume_file_url: Option<String>,
    pub resume_link: Option<String>,
    pub motivation: Option<String>,
    pub availability: Option<String>,
    pub source: Option<String>,
}

impl ApplicationUpdate {
    fn apply_to(self, details: &mut ApplicantDetails) {
        macro_rules! patch {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field { details.$field = value; })*
            };
        }
        patch!(
            full_name, email, phone_no, date_of_birth, location, college, degree,
            year_of_graduation, skills, interested_fields, motivation, availability, source
        );
        if self.resume_file_url.is_some() {
            details.resume_file_url = self.resume_file_url;
        }
        if self.resume_link.is_some() {
            details.resume_link = self.resume_link;
        }
    }
}

pub struct ApplicationService {
    applications: Arc<dyn ApplicationRepository>,
    unit_of_work: Arc<dyn UnitOfWork>,
    pricing: PricingConfig,
}

impl ApplicationService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        unit_of_work: Arc<dyn UnitOfWork>,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            applications,
            unit_of_work,
            pricing,
        }
    }

    pub async fn submit(&self, ctx: &AuthContext, details: ApplicantDetails) -> Result<Application> {
        details.validate()?;
        let details = details.normalized();

        if self.applications.find_by_uid(&ctx.uid).await?.is_some() {
            return Err(PlatformError::duplicate("Application already submitted"));
        }

        let application = Application::new(&ctx.uid, details);
        let event = OutboxItem::new(
            NotificationKind::ApplicationSubmitted,
            &application.id,
            &application.details.email,
            json!({
                "fullName": application.details.full_name,
                "college": application.details.college,
                "skills": application.details.skills,
            }),
        );

        self.unit_of_work.submit_application(&application, &event).await?;

        metrics::counter!("wf_applications_submitted_total").increment(1);
        info!(uid = %ctx.uid, application_id = %application.id, "Application submitted");
        Ok(application)
    }

    pub async fn my_application(&self, ctx: &AuthContext) -> Result<Application> {
        self.applications
            .find_by_uid(&ctx.uid)
            .await?
            .ok_or_else(|| PlatformError::not_found("Application", &ctx.uid))
    }

    pub async fn list(&self, ctx: &AuthContext) -> Result<Vec<Application>> {
        checks::require_admin(ctx)?;
        self.applications.find_all().await
    }

    pub async fn get(&self, ctx: &AuthContext, id: &str) -> Result<Application> {
        let application = self.find(id).await?;
        checks::require_owner_or_admin(ctx, &application.uid)?;
        Ok(application)
    }

    pub async fn update_details(
        &self,
        ctx: &AuthContext,
        id: &str,
        update: ApplicationUpdate,
    ) -> Result<Application> {
        let mut application = self.find(id).await?;
        if !application.is_owned_by(&ctx.uid) {
            return Err(PlatformError::forbidden("Access denied"));
        }
        if !application.is_editable() {
            return Err(PlatformError::validation(
                "Application can no longer be edited",
            ));
        }

        update.apply_to(&mut application.details);
        application.details.validate()?;
        application.details = application.details.normalized();
        application.updated_at = Utc::now();

        if !self.applications.update_pending(&application).await? {
            return Err(PlatformError::validation(
                "Application can no longer be edited",
            ));
        }
        Ok(application)
    }

    pub async fn update_status(
        &self,
        ctx: &AuthContext,
        id: &str,
        target: ApplicationStatus,
    ) -> Result<Application> {
        checks::require_admin(ctx)?;
        let application = self.find(id).await?;
        let now = Utc::now();

        match application.status.transition_to(target)? {
            StatusChange::Shortlist => self.shortlist(&application, now).await?,
            StatusChange::Reject => {
                let event = OutboxItem::new(
                    NotificationKind::ApplicationRejected,
                    &application.id,
                    &application.details.email,
                    json!({ "fullName": application.details.full_name }),
                );
                if self
                    .unit_of_work
                    .reject_application(&application.id, &event, now)
                    .await?
                {
                    info!(application_id = %application.id, admin = %ctx.uid, "Application rejected");
                }
            }
            // Re-shortlisting only repairs a missing student record
            StatusChange::Unchanged if target == ApplicationStatus::Shortlisted => {
                self.shortlist(&application, now).await?
            }
            StatusChange::Unchanged => {}
        }

        self.find(id).await
    }

    async fn shortlist(&self, application: &Application, now: chrono::DateTime<Utc>) -> Result<()> {
        let student = Student::from_application(application, now);
        let event = OutboxItem::new(
            NotificationKind::ApplicationShortlisted,
            &application.id,
            &application.details.email,
            json!({
                "fullName": application.details.full_name,
                "currency": self.pricing.currency,
                "coursePrice": self.pricing.course_price,
                "discountPrice": self.pricing.discount_price,
                "couponCode": self.pricing.coupon_code,
            }),
        );

        let outcome = self
            .unit_of_work
            .shortlist_application(&application.id, &student, &event, now)
            .await?;

        if outcome.student_created {
            metrics::counter!("wf_students_derived_total").increment(1);
            info!(
                application_id = %application.id,
                uid = %application.uid,
                "Student record derived from shortlisted application"
            );
        }
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Application> {
        self.applications
            .find_by_id(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Application", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryStore, StudentRepository};

    fn ctx(uid: &str, is_admin: bool) -> AuthContext {
        AuthContext {
            uid: uid.to_string(),
            email: None,
            is_admin,
        }
    }

    fn details() -> ApplicantDetails {
        ApplicantDetails {
            full_name: "Asha Rao".to_string(),
            email: "a@x.com".to_string(),
            phone_no: "9999999999".to_string(),
            college: "IIT Madras".to_string(),
            degree: "B.Tech".to_string(),
            year_of_graduation: 2026,
            skills: vec!["rust".to_string()],
            ..Default::default()
        }
    }

    fn service(store: &MemoryStore) -> ApplicationService {
        let store = Arc::new(store.clone());
        ApplicationService::new(store.clone(), store, PricingConfig::default())
    }

    #[tokio::test]
    async fn test_second_submission_is_rejected() {
        let store = MemoryStore::new();
        let svc = service(&store);

        svc.submit(&ctx("u1", false), details()).await.unwrap();
        let err = svc.submit(&ctx("u1", false), details()).await.unwrap_err();

        assert_eq!(err.to_string(), "Application already submitted");
        assert_eq!(store.application_count(), 1);
        assert_eq!(store.outbox_items().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_shortlist_derives_one_student() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let app = svc.submit(&ctx("u1", false), details()).await.unwrap();
        let admin = ctx("admin", true);

        let first = svc
            .update_status(&admin, &app.id, ApplicationStatus::Shortlisted)
            .await
            .unwrap();
        let second = svc
            .update_status(&admin, &app.id, ApplicationStatus::Shortlisted)
            .await
            .unwrap();

        assert_eq!(first.status, ApplicationStatus::Shortlisted);
        assert_eq!(second.status, ApplicationStatus::Shortlisted);
        assert_eq!(store.student_count(), 1);

        let student = StudentRepository::find_by_uid(&store, "u1").await.unwrap().unwrap();
        assert_eq!(student.application_id, app.id);

        let shortlisted_events = store
            .outbox_items()
            .iter()
            .filter(|item| item.kind == NotificationKind::ApplicationShortlisted)
            .count();
        assert_eq!(shortlisted_events, 1);
    }

    #[tokio::test]
    async fn test_rejected_application_cannot_be_shortlisted() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let app = svc.submit(&ctx("u1", false), details()).await.unwrap();
        let admin = ctx("admin", true);

        svc.update_status(&admin, &app.id, ApplicationStatus::Rejected)
            .await
            .unwrap();
        let err = svc
            .update_status(&admin, &app.id, ApplicationStatus::Shortlisted)
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::InvalidTransition { .. }));
        assert_eq!(store.student_count(), 0);
    }

    #[tokio::test]
    async fn test_owner_edits_only_while_pending() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let owner = ctx("u1", false);
        let app = svc.submit(&owner, details()).await.unwrap();

        let update = ApplicationUpdate {
            college: Some("NIT Trichy".to_string()),
            ..Default::default()
        };
        let edited = svc.update_details(&owner, &app.id, update).await.unwrap();
        assert_eq!(edited.details.college, "NIT Trichy");

        let stranger = svc
            .update_details(&ctx("u2", false), &app.id, ApplicationUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(stranger, PlatformError::Forbidden { .. }));

        svc.update_status(&ctx("admin", true), &app.id, ApplicationStatus::Shortlisted)
            .await
            .unwrap();
        let locked = svc
            .update_details(&owner, &app.id, ApplicationUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(locked, PlatformError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_status_change_requires_admin() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let app = svc.submit(&ctx("u1", false), details()).await.unwrap();

        let err = svc
            .update_status(&ctx("u1", false), &app.id, ApplicationStatus::Shortlisted)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Forbidden { .. }));
    }
}

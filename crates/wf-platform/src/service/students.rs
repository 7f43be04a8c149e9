//! Student records
//!
//! Students edit their own profile; everything else is administered.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::domain::{Student, StudentPaymentStatus, StudentProfile, StudentStatus};
use crate::error::{PlatformError, Result};
use crate::repository::StudentRepository;
use crate::service::authorization::{checks, AuthContext};

/// Fields a student may change on their own record.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub phone_no: Option<String>,
    pub location: Option<String>,
    pub skills: Option<Vec<String>>,
    pub interested_fields: Option<Vec<String>>,
    pub cover_image: Option<String>,
    pub profile_image: Option<String>,
    pub institute: Option<String>,
    pub course: Option<String>,
    pub branch: Option<String>,
    pub year: Option<String>,
    pub bio: Option<String>,
}

impl ProfileUpdate {
    fn apply_to(self, student: &mut Student) {
        if let Some(phone_no) = self.phone_no {
            student.details.phone_no = phone_no.trim().to_string();
        }
        if let Some(location) = self.location {
            student.details.location = location;
        }
        if let Some(skills) = self.skills {
            student.details.skills = skills;
        }
        if let Some(fields) = self.interested_fields {
            student.details.interested_fields = fields;
        }
        merge_profile(
            &mut student.profile,
            StudentProfile {
                cover_image: self.cover_image,
                profile_image: self.profile_image,
                institute: self.institute,
                course: self.course,
                branch: self.branch,
                year: self.year,
                bio: self.bio,
                batch_name: None,
            },
        );
    }
}

/// Administrative edit of a student record.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminStudentUpdate {
    #[serde(flatten)]
    pub profile: StudentProfile,
    pub active_days: Option<u32>,
    pub projects_built: Option<u32>,
}

fn merge_profile(target: &mut StudentProfile, patch: StudentProfile) {
    macro_rules! merge {
        ($($field:ident),*) => {
            $(if patch.$field.is_some() { target.$field = patch.$field; })*
        };
    }
    merge!(cover_image, profile_image, institute, course, branch, year, bio, batch_name);
}

pub struct StudentService {
    students: Arc<dyn StudentRepository>,
}

impl StudentService {
    pub fn new(students: Arc<dyn StudentRepository>) -> Self {
        Self { students }
    }

    pub async fn profile(&self, ctx: &AuthContext) -> Result<Student> {
        self.find(&ctx.uid).await
    }

    pub async fn update_profile(&self, ctx: &AuthContext, update: ProfileUpdate) -> Result<Student> {
        let mut student = self.find(&ctx.uid).await?;
        update.apply_to(&mut student);
        if student.details.phone_no.is_empty() {
            return Err(PlatformError::validation("phoneNo is required"));
        }
        student.updated_at = Utc::now();
        self.students.update(&student).await?;
        Ok(student)
    }

    pub async fn list(&self, ctx: &AuthContext) -> Result<Vec<Student>> {
        checks::require_admin(ctx)?;
        self.students.find_all().await
    }

    pub async fn get(&self, ctx: &AuthContext, uid: &str) -> Result<Student> {
        checks::require_admin(ctx)?;
        self.find(uid).await
    }

    pub async fn update(&self, ctx: &AuthContext, uid: &str, update: AdminStudentUpdate) -> Result<Student> {
        checks::require_admin(ctx)?;
        let mut student = self.find(uid).await?;

        merge_profile(&mut student.profile, update.profile);
        if let Some(days) = update.active_days {
            student.active_days = days;
        }
        if let Some(projects) = update.projects_built {
            student.projects_built = projects;
        }
        student.updated_at = Utc::now();

        self.students.update(&student).await?;
        Ok(student)
    }

    pub async fn update_status(&self, ctx: &AuthContext, uid: &str, status: StudentStatus) -> Result<Student> {
        checks::require_admin(ctx)?;
        let mut student = self.find(uid).await?;
        student.status = status;
        student.updated_at = Utc::now();
        self.students.update(&student).await?;

        info!(uid = %uid, status = %status, admin = %ctx.uid, "Student status updated");
        Ok(student)
    }

    pub async fn update_payment_status(
        &self,
        ctx: &AuthContext,
        uid: &str,
        status: StudentPaymentStatus,
    ) -> Result<Student> {
        checks::require_admin(ctx)?;
        let mut student = self.find(uid).await?;
        student.set_payment_status(status, Utc::now())?;
        self.students.update(&student).await?;

        info!(uid = %uid, payment_status = status.as_str(), admin = %ctx.uid, "Student payment status updated");
        Ok(student)
    }

    pub async fn update_progress(&self, ctx: &AuthContext, uid: &str, percentage: i64) -> Result<Student> {
        checks::require_admin(ctx)?;
        let mut student = self.find(uid).await?;
        student.set_progress(percentage, Utc::now())?;
        self.students.update(&student).await?;
        Ok(student)
    }

    pub async fn update_progress_step(
        &self,
        ctx: &AuthContext,
        uid: &str,
        step: &str,
        completed: bool,
    ) -> Result<Student> {
        checks::require_admin(ctx)?;
        let mut student = self.find(uid).await?;
        student.progress_steps.set(step, completed)?;
        student.updated_at = Utc::now();
        self.students.update(&student).await?;
        Ok(student)
    }

    async fn find(&self, uid: &str) -> Result<Student> {
        self.students
            .find_by_uid(uid)
            .await?
            .ok_or_else(|| PlatformError::not_found("Student", uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApplicantDetails, Application};
    use crate::repository::{MemoryStore, UnitOfWork};
    use wf_common::{NotificationKind, OutboxItem};

    async fn seeded() -> (MemoryStore, StudentService) {
        let store = MemoryStore::new();
        let app = Application::new(
            "u1",
            ApplicantDetails {
                full_name: "Asha Rao".to_string(),
                email: "a@x.com".to_string(),
                phone_no: "9999999999".to_string(),
                college: "IIT Madras".to_string(),
                degree: "B.Tech".to_string(),
                year_of_graduation: 2026,
                ..Default::default()
            },
        );
        let event = OutboxItem::new(NotificationKind::ApplicationSubmitted, &app.id, "a@x.com", serde_json::json!({}));
        store.submit_application(&app, &event).await.unwrap();
        let now = Utc::now();
        store
            .shortlist_application(&app.id, &Student::from_application(&app, now), &event, now)
            .await
            .unwrap();

        let svc = StudentService::new(Arc::new(store.clone()));
        (store, svc)
    }

    fn admin() -> AuthContext {
        AuthContext {
            uid: "admin".to_string(),
            email: None,
            is_admin: true,
        }
    }

    #[tokio::test]
    async fn test_paid_cannot_be_set_by_admin() {
        let (_, svc) = seeded().await;
        let err = svc
            .update_payment_status(&admin(), "u1", StudentPaymentStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation { .. }));

        let student = svc.get(&admin(), "u1").await.unwrap();
        assert_eq!(student.payment_status, StudentPaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_progress_bounds_and_steps() {
        let (_, svc) = seeded().await;

        assert!(svc.update_progress(&admin(), "u1", 101).await.is_err());
        assert!(svc.update_progress(&admin(), "u1", -1).await.is_err());
        let student = svc.update_progress(&admin(), "u1", 80).await.unwrap();
        assert_eq!(student.progress_percentage, 80);

        let student = svc
            .update_progress_step(&admin(), "u1", "interviewCompleted", true)
            .await
            .unwrap();
        assert!(student.progress_steps.interview_completed);
        assert!(svc
            .update_progress_step(&admin(), "u1", "graduated", true)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_profile_update_keeps_program_fields() {
        let (_, svc) = seeded().await;
        let owner = AuthContext {
            uid: "u1".to_string(),
            email: None,
            is_admin: false,
        };

        let update = ProfileUpdate {
            bio: Some("Rustacean".to_string()),
            ..Default::default()
        };
        let student = svc.update_profile(&owner, update).await.unwrap();

        assert_eq!(student.profile.bio.as_deref(), Some("Rustacean"));
        assert_eq!(student.status, StudentStatus::Shortlisted);
        assert_eq!(student.progress_percentage, 25);
        assert!(svc.list(&owner).await.is_err());
    }
}

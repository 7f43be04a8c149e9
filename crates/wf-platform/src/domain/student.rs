//! Student Entity
//!
//! Derived once from a shortlisted application; tracks program progress and payment.

use std::fmt;

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use wf_common::serde_helpers::optional_bson_datetime;

use crate::domain::application::{ApplicantDetails, Application};
use crate::error::{PlatformError, Result};

/// Progress recorded when a student record is derived.
pub const SHORTLISTED_PROGRESS: u8 = 25;

/// Minimum progress once payment has been captured.
pub const PAID_PROGRESS: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Shortlisted,
    Active,
    Completed,
    Rejected,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shortlisted => "shortlisted",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "shortlisted" => Ok(Self::Shortlisted),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            other => Err(PlatformError::validation(format!(
                "Invalid status: {}. Must be one of shortlisted, active, completed, rejected",
                other
            ))),
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InternshipStatus {
    Inactive,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StudentPaymentStatus {
    Pending,
    Paid,
    Failed,
    NotSelected,
}

impl StudentPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::NotSelected => "not_selected",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "not_selected" => Ok(Self::NotSelected),
            other => Err(PlatformError::validation(format!(
                "Invalid payment status: {}. Must be one of pending, paid, failed, not_selected",
                other
            ))),
        }
    }
}

/// The seven program milestones, in program order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSteps {
    pub application_submitted: bool,
    pub resume_shortlisted: bool,
    pub interview_completed: bool,
    pub payment_process: bool,
    pub internship_active: bool,
    pub final_showcase: bool,
    pub certificate_ready: bool,
}

impl ProgressSteps {
    pub const NAMES: [&'static str; 7] = [
        "applicationSubmitted",
        "resumeShortlisted",
        "interviewCompleted",
        "paymentProcess",
        "internshipActive",
        "finalShowcase",
        "certificateReady",
    ];

    /// Milestones set when an application is shortlisted.
    pub fn shortlisted() -> Self {
        Self {
            application_submitted: true,
            resume_shortlisted: true,
            ..Self::default()
        }
    }

    pub fn set(&mut self, step: &str, completed: bool) -> Result<()> {
        let slot = match step {
            "applicationSubmitted" => &mut self.application_submitted,
            "resumeShortlisted" => &mut self.resume_shortlisted,
            "interviewCompleted" => &mut self.interview_completed,
            "paymentProcess" => &mut self.payment_process,
            "internshipActive" => &mut self.internship_active,
            "finalShowcase" => &mut self.final_showcase,
            "certificateReady" => &mut self.certificate_ready,
            other => {
                return Err(PlatformError::validation(format!(
                    "Unknown progress step: {}. Must be one of {}",
                    other,
                    Self::NAMES.join(", ")
                )))
            }
        };
        *slot = completed;
        Ok(())
    }

    pub fn completed_count(&self) -> usize {
        [
            self.application_submitted,
            self.resume_shortlisted,
            self.interview_completed,
            self.payment_process,
            self.internship_active,
            self.final_showcase,
            self.certificate_ready,
        ]
        .iter()
        .filter(|done| **done)
        .count()
    }
}

/// Optional profile fields a student may edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_name: Option<String>,
}

/// Student record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Owner identity
    #[serde(rename = "_id")]
    pub uid: String,

    /// Application this record was derived from (unique)
    pub application_id: String,

    #[serde(flatten)]
    pub details: ApplicantDetails,

    #[serde(flatten)]
    pub profile: StudentProfile,

    #[serde(default, with = "optional_bson_datetime", skip_serializing_if = "Option::is_none")]
    pub enrollment_date: Option<DateTime<Utc>>,

    pub active_days: u32,
    pub projects_built: u32,
    pub progress_percentage: u8,
    pub internship_status: InternshipStatus,
    pub status: StudentStatus,
    pub payment_status: StudentPaymentStatus,
    pub progress_steps: ProgressSteps,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// Derive the student record for a shortlisted application.
    pub fn from_application(application: &Application, now: DateTime<Utc>) -> Self {
        Self {
            uid: application.uid.clone(),
            application_id: application.id.clone(),
            details: application.details.clone(),
            profile: StudentProfile::default(),
            enrollment_date: None,
            active_days: 0,
            projects_built: 0,
            progress_percentage: SHORTLISTED_PROGRESS,
            internship_status: InternshipStatus::Inactive,
            status: StudentStatus::Shortlisted,
            payment_status: StudentPaymentStatus::Pending,
            progress_steps: ProgressSteps::shortlisted(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_eligible_for_payment(&self) -> bool {
        self.status == StudentStatus::Shortlisted
            && self.payment_status != StudentPaymentStatus::Paid
    }

    /// The compound transition applied when a payment is captured.
    pub fn activate_after_payment(&mut self, now: DateTime<Utc>) {
        self.payment_status = StudentPaymentStatus::Paid;
        self.internship_status = InternshipStatus::Active;
        self.status = StudentStatus::Active;
        self.progress_steps.payment_process = true;
        self.progress_steps.internship_active = true;
        self.progress_percentage = self.progress_percentage.max(PAID_PROGRESS);
        self.enrollment_date.get_or_insert(now);
        self.updated_at = now;
    }

    /// Administrative payment status change. `paid` is only reachable through
    /// a verified payment.
    pub fn set_payment_status(&mut self, status: StudentPaymentStatus, now: DateTime<Utc>) -> Result<()> {
        if status == StudentPaymentStatus::Paid {
            return Err(PlatformError::validation(
                "Payment status 'paid' can only be set by a verified payment",
            ));
        }
        if self.payment_status == StudentPaymentStatus::Paid {
            return Err(PlatformError::validation(
                "Payment has been captured and can no longer be changed",
            ));
        }
        self.payment_status = status;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_progress(&mut self, percentage: i64, now: DateTime<Utc>) -> Result<()> {
        if !(0..=100).contains(&percentage) {
            return Err(PlatformError::validation("progressPercentage must be between 0 and 100"));
        }
        self.progress_percentage = percentage as u8;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application() -> Application {
        Application::new(
            "uid-1",
            ApplicantDetails {
                full_name: "Asha Rao".to_string(),
                email: "a@x.com".to_string(),
                phone_no: "9999999999".to_string(),
                college: "IIT Madras".to_string(),
                degree: "B.Tech".to_string(),
                year_of_graduation: 2026,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_derived_student_starts_with_two_milestones() {
        let app = application();
        let student = Student::from_application(&app, Utc::now());

        assert_eq!(student.uid, "uid-1");
        assert_eq!(student.application_id, app.id);
        assert_eq!(student.details, app.details);
        assert_eq!(student.progress_steps, ProgressSteps::shortlisted());
        assert_eq!(student.progress_steps.completed_count(), 2);
        assert_eq!(student.progress_percentage, 25);
        assert_eq!(student.status, StudentStatus::Shortlisted);
        assert_eq!(student.payment_status, StudentPaymentStatus::Pending);
        assert_eq!(student.internship_status, InternshipStatus::Inactive);
        assert!(student.is_eligible_for_payment());
    }

    #[test]
    fn test_activate_after_payment_sets_the_triple() {
        let mut student = Student::from_application(&application(), Utc::now());
        student.activate_after_payment(Utc::now());

        assert_eq!(student.payment_status, StudentPaymentStatus::Paid);
        assert_eq!(student.internship_status, InternshipStatus::Active);
        assert_eq!(student.status, StudentStatus::Active);
        assert!(student.progress_steps.payment_process);
        assert!(student.progress_steps.internship_active);
        assert_eq!(student.progress_percentage, 60);
        assert!(student.enrollment_date.is_some());
        assert!(!student.is_eligible_for_payment());
    }

    #[test]
    fn test_activation_never_lowers_progress() {
        let mut student = Student::from_application(&application(), Utc::now());
        student.set_progress(80, Utc::now()).unwrap();
        student.activate_after_payment(Utc::now());
        assert_eq!(student.progress_percentage, 80);
    }

    #[test]
    fn test_admin_cannot_set_paid() {
        let mut student = Student::from_application(&application(), Utc::now());
        assert!(student.set_payment_status(StudentPaymentStatus::Paid, Utc::now()).is_err());
        assert!(student.set_payment_status(StudentPaymentStatus::Failed, Utc::now()).is_ok());
        assert_eq!(student.payment_status, StudentPaymentStatus::Failed);
    }

    #[test]
    fn test_progress_bounds() {
        let mut student = Student::from_application(&application(), Utc::now());
        assert!(student.set_progress(101, Utc::now()).is_err());
        assert!(student.set_progress(-1, Utc::now()).is_err());
        assert!(student.set_progress(100, Utc::now()).is_ok());
    }

    #[test]
    fn test_progress_step_names() {
        let mut steps = ProgressSteps::default();
        steps.set("finalShowcase", true).unwrap();
        assert!(steps.final_showcase);
        assert!(steps.set("graduated", true).is_err());
    }

    #[test]
    fn test_bson_layout_is_flat() {
        let student = Student::from_application(&application(), Utc::now());
        let doc = bson::to_document(&student).unwrap();
        assert_eq!(doc.get_str("_id").unwrap(), "uid-1");
        assert_eq!(doc.get_str("paymentStatus").unwrap(), "pending");
        assert_eq!(doc.get_str("fullName").unwrap(), "Asha Rao");
        assert!(doc.get_document("progressSteps").unwrap().get_bool("resumeShortlisted").unwrap());

        let back: Student = bson::from_document(doc).unwrap();
        assert_eq!(back.progress_steps, student.progress_steps);
    }
}

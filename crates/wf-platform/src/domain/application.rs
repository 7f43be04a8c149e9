//! Application Entity
//!
//! One internship application per identity.

use std::fmt;
use std::sync::LazyLock;

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{PlatformError, Result};

/// Application review status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Shortlisted,
    Rejected,
}

/// Effect of a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// Already in the requested status
    Unchanged,
    Shortlist,
    Reject,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Shortlisted => "shortlisted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "shortlisted" => Ok(Self::Shortlisted),
            "rejected" => Ok(Self::Rejected),
            other => Err(PlatformError::validation(format!(
                "Invalid status: {}. Must be one of pending, shortlisted, rejected",
                other
            ))),
        }
    }

    /// Only `pending` moves, and only forward. Requesting the current status
    /// is accepted so retried requests are harmless.
    pub fn transition_to(self, target: ApplicationStatus) -> Result<StatusChange> {
        use ApplicationStatus::*;
        match (self, target) {
            (from, to) if from == to => Ok(StatusChange::Unchanged),
            (Pending, Shortlisted) => Ok(StatusChange::Shortlist),
            (Pending, Rejected) => Ok(StatusChange::Reject),
            (from, to) => Err(PlatformError::invalid_transition(from, to)),
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Personal and academic details entered by the applicant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantDetails {
    pub full_name: String,
    pub email: String,
    pub phone_no: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub location: String,
    pub college: String,
    pub degree: String,
    pub year_of_graduation: i32,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub interested_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_link: Option<String>,
    #[serde(default)]
    pub motivation: String,
    #[serde(default)]
    pub availability: String,
    #[serde(default)]
    pub source: String,
}

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

impl ApplicantDetails {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("fullName", &self.full_name),
            ("phoneNo", &self.phone_no),
            ("college", &self.college),
            ("degree", &self.degree),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PlatformError::validation(format!("{} is required", field)));
            }
        }
        if !is_valid_email(self.email.trim()) {
            return Err(PlatformError::validation("A valid email is required"));
        }
        if !(1950..=2100).contains(&self.year_of_graduation) {
            return Err(PlatformError::validation("yearOfGraduation is out of range"));
        }
        Ok(())
    }

    /// Trim free-text identity fields before storage.
    pub fn normalized(mut self) -> Self {
        self.full_name = self.full_name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.phone_no = self.phone_no.trim().to_string();
        self
    }
}

/// Application record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// UUID
    #[serde(rename = "_id")]
    pub id: String,

    /// Identity of the submitter (unique)
    pub uid: String,

    #[serde(flatten)]
    pub details: ApplicantDetails,

    pub status: ApplicationStatus,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(uid: impl Into<String>, details: ApplicantDetails) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            uid: uid.into(),
            details,
            status: ApplicationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.uid == uid
    }

    pub fn is_editable(&self) -> bool {
        self.status == ApplicationStatus::Pending
    }
}

//! Document Entity
//!
//! Metadata for a binary stored under `documents/{studentUid}/{category}/{fileName}`.

use std::fmt;

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{PlatformError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    OfferLetter,
    Invoice,
    Certificate,
    ProjectPortfolio,
}

impl DocumentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OfferLetter => "offer_letter",
            Self::Invoice => "invoice",
            Self::Certificate => "certificate",
            Self::ProjectPortfolio => "project_portfolio",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "offer_letter" => Ok(Self::OfferLetter),
            "invoice" => Ok(Self::Invoice),
            "certificate" => Ok(Self::Certificate),
            "project_portfolio" => Ok(Self::ProjectPortfolio),
            other => Err(PlatformError::validation(format!(
                "Invalid document type: {}. Must be one of offer_letter, invoice, certificate, project_portfolio",
                other
            ))),
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const ALLOWED_MIME_TYPES: [&str; 6] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "image/jpeg",
    "image/png",
    "application/zip",
];

pub fn is_allowed_mime_type(mime_type: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime_type)
}

/// Reduce an uploaded file name to one safe path segment.
pub fn sanitize_file_name(name: &str) -> Result<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.is_empty() {
        return Err(PlatformError::validation("File name is required"));
    }
    Ok(cleaned)
}

/// Object storage key for a document binary.
pub fn storage_key(student_uid: &str, category: DocumentCategory, file_name: &str) -> String {
    format!("documents/{}/{}/{}", student_uid, category.as_str(), file_name)
}

/// Document metadata record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,

    pub student_uid: String,

    pub category: DocumentCategory,

    pub file_name: String,

    pub storage_key: String,

    pub file_url: String,

    pub file_size: u64,

    pub mime_type: String,

    /// Admin uid, or `system` for generated documents
    pub uploaded_by: String,

    pub is_enabled: bool,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        student_uid: impl Into<String>,
        category: DocumentCategory,
        file_name: impl Into<String>,
        storage_key: impl Into<String>,
        file_url: impl Into<String>,
        file_size: u64,
        mime_type: impl Into<String>,
        uploaded_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            student_uid: student_uid.into(),
            category,
            file_name: file_name.into(),
            storage_key: storage_key.into(),
            file_url: file_url.into(),
            file_size,
            mime_type: mime_type.into(),
            uploaded_by: uploaded_by.into(),
            is_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

//! Custom claims persisted per identity.

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserClaims {
    #[serde(rename = "_id")]
    pub uid: String,

    #[serde(default)]
    pub admin: bool,

    /// Who changed the claim last (`bootstrap` for the first administrator)
    pub updated_by: String,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl UserClaims {
    pub fn new(uid: impl Into<String>, admin: bool, updated_by: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            admin,
            updated_by: updated_by.into(),
            updated_at: Utc::now(),
        }
    }
}

// ============================================================================
// Outbox Types
// ============================================================================

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serde_helpers::optional_bson_datetime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    PENDING,
    PROCESSING,
    COMPLETED,
    FAILED,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::PENDING => "PENDING",
            OutboxStatus::PROCESSING => "PROCESSING",
            OutboxStatus::COMPLETED => "COMPLETED",
            OutboxStatus::FAILED => "FAILED",
        }
    }
}

/// What happened, from the recipient's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "application.submitted")]
    ApplicationSubmitted,
    #[serde(rename = "application.shortlisted")]
    ApplicationShortlisted,
    #[serde(rename = "application.rejected")]
    ApplicationRejected,
    #[serde(rename = "payment.captured")]
    PaymentCaptured,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ApplicationSubmitted => "application.submitted",
            NotificationKind::ApplicationShortlisted => "application.shortlisted",
            NotificationKind::ApplicationRejected => "application.rejected",
            NotificationKind::PaymentCaptured => "payment.captured",
        }
    }
}

/// A notification recorded in the same write as the state change that caused it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxItem {
    #[serde(rename = "_id")]
    pub id: String,

    pub kind: NotificationKind,

    /// Application id or payment order id the notification is about
    pub aggregate_id: String,

    /// Primary recipient email
    pub recipient: String,

    /// Template data
    #[serde(default)]
    pub payload: serde_json::Value,

    pub status: OutboxStatus,

    #[serde(default)]
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(default, with = "optional_bson_datetime", skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,

    #[serde(default, with = "optional_bson_datetime", skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl OutboxItem {
    pub fn new(
        kind: NotificationKind,
        aggregate_id: impl Into<String>,
        recipient: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            aggregate_id: aggregate_id.into(),
            recipient: recipient.into(),
            payload,
            status: OutboxStatus::PENDING,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            claimed_at: None,
            processed_at: None,
        }
    }

    /// Reads a string field from the payload, empty when absent.
    pub fn payload_str(&self, key: &str) -> &str {
        self.payload.get(key).and_then(|v| v.as_str()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_is_pending() {
        let item = OutboxItem::new(
            NotificationKind::ApplicationSubmitted,
            "app-1",
            "a@x.com",
            serde_json::json!({ "fullName": "Asha" }),
        );
        assert_eq!(item.status, OutboxStatus::PENDING);
        assert_eq!(item.attempts, 0);
        assert_eq!(item.payload_str("fullName"), "Asha");
        assert_eq!(item.payload_str("missing"), "");
    }

    #[test]
    fn test_kind_serializes_as_dotted_name() {
        let json = serde_json::to_string(&NotificationKind::PaymentCaptured).unwrap();
        assert_eq!(json, "\"payment.captured\"");
        assert_eq!(NotificationKind::PaymentCaptured.as_str(), "payment.captured");
    }

    #[test]
    fn test_item_bson_layout() {
        let item = OutboxItem::new(
            NotificationKind::ApplicationRejected,
            "app-2",
            "b@x.com",
            serde_json::json!({}),
        );
        let doc = bson::to_document(&item).unwrap();
        assert_eq!(doc.get_str("_id").unwrap(), item.id);
        assert_eq!(doc.get_str("status").unwrap(), "PENDING");
        assert_eq!(doc.get_str("kind").unwrap(), "application.rejected");
        assert!(doc.get_datetime("createdAt").is_ok());
        assert!(!doc.contains_key("claimedAt"));
    }
}

//! In-process outbox used in development mode and tests.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use wf_common::{OutboxItem, OutboxStatus};

use crate::repository::OutboxRepository;

/// Shared list of outbox items. The platform's in-memory store appends to the
/// same list this repository drains.
pub type SharedOutbox = Arc<Mutex<Vec<OutboxItem>>>;

#[derive(Clone, Default)]
pub struct MemoryOutboxRepository {
    items: SharedOutbox,
}

impl MemoryOutboxRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(items: SharedOutbox) -> Self {
        Self { items }
    }

    pub fn push(&self, item: OutboxItem) {
        self.items.lock().push(item);
    }

    pub fn snapshot(&self) -> Vec<OutboxItem> {
        self.items.lock().clone()
    }
}

#[async_trait]
impl OutboxRepository for MemoryOutboxRepository {
    async fn claim_pending(&self, limit: u32) -> Result<Vec<OutboxItem>> {
        let mut items = self.items.lock();
        let now = Utc::now();

        let mut pending: Vec<&mut OutboxItem> = items
            .iter_mut()
            .filter(|i| i.status == OutboxStatus::PENDING)
            .collect();
        pending.sort_by_key(|i| i.created_at);

        Ok(pending
            .into_iter()
            .take(limit as usize)
            .map(|item| {
                item.status = OutboxStatus::PROCESSING;
                item.claimed_at = Some(now);
                item.clone()
            })
            .collect())
    }

    async fn mark_completed(&self, id: &str) -> Result<()> {
        let mut items = self.items.lock();
        if let Some(item) = items.iter_mut().find(|i| i.id == id) {
            item.status = OutboxStatus::COMPLETED;
            item.attempts += 1;
            item.last_error = None;
            item.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_failed(&self, id: &str, error: &str, retry: bool) -> Result<()> {
        let mut items = self.items.lock();
        if let Some(item) = items.iter_mut().find(|i| i.id == id) {
            item.attempts += 1;
            item.last_error = Some(error.to_string());
            if retry {
                item.status = OutboxStatus::PENDING;
                item.claimed_at = None;
            } else {
                item.status = OutboxStatus::FAILED;
                item.processed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn recover_stuck_items(&self, timeout: Duration) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::from_std(timeout)?;
        let mut items = self.items.lock();
        let mut recovered = 0;
        for item in items.iter_mut() {
            let stuck = item.status == OutboxStatus::PROCESSING
                && item.claimed_at.map(|at| at <= cutoff).unwrap_or(true);
            if stuck {
                item.status = OutboxStatus::PENDING;
                item.claimed_at = None;
                recovered += 1;
            }
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_common::NotificationKind;

    fn item(recipient: &str) -> OutboxItem {
        OutboxItem::new(NotificationKind::ApplicationSubmitted, "app", recipient, serde_json::json!({}))
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let repo = MemoryOutboxRepository::new();
        repo.push(item("a@x.com"));
        repo.push(item("b@x.com"));

        let first = repo.claim_pending(10).await.unwrap();
        let second = repo.claim_pending(10).await.unwrap();

        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_retry_returns_item_to_pending() {
        let repo = MemoryOutboxRepository::new();
        repo.push(item("a@x.com"));

        let claimed = repo.claim_pending(1).await.unwrap();
        repo.mark_failed(&claimed[0].id, "smtp down", true).await.unwrap();

        let again = repo.claim_pending(1).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].attempts, 1);
        assert_eq!(again[0].last_error.as_deref(), Some("smtp down"));
    }

    #[tokio::test]
    async fn test_recover_stuck_items() {
        let repo = MemoryOutboxRepository::new();
        repo.push(item("a@x.com"));
        repo.claim_pending(1).await.unwrap();

        assert_eq!(repo.recover_stuck_items(Duration::from_secs(60)).await.unwrap(), 0);
        assert_eq!(repo.recover_stuck_items(Duration::ZERO).await.unwrap(), 1);
        assert_eq!(repo.snapshot()[0].status, OutboxStatus::PENDING);
    }
}

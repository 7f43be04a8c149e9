use async_trait::async_trait;
use wf_common::OutboxItem;
use anyhow::Result;
use std::time::Duration;

#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Move up to `limit` pending items to PROCESSING and return them, oldest first.
    /// An item is handed to at most one caller per claim.
    async fn claim_pending(&self, limit: u32) -> Result<Vec<OutboxItem>>;

    async fn mark_completed(&self, id: &str) -> Result<()>;

    /// Record a failed delivery. With `retry` the item goes back to PENDING,
    /// otherwise it is parked as FAILED.
    async fn mark_failed(&self, id: &str, error: &str, retry: bool) -> Result<()>;

    /// Return items stuck in PROCESSING for longer than `timeout` to PENDING.
    async fn recover_stuck_items(&self, timeout: Duration) -> Result<u64>;
}

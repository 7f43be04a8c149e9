//! Outbox processor tests against the in-memory repository.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_test::assert_ok;
use wf_common::{NotificationKind, OutboxItem, OutboxStatus};
use wf_outbox::{
    EmailMessage, LogMailer, Mailer, MemoryOutboxRepository, OutboxProcessor,
    OutboxProcessorConfig, TemplateContext,
};

/// Fails the first `failures` sends, then delivers.
struct FlakyMailer {
    failures: Mutex<u32>,
    delivered: Mutex<Vec<EmailMessage>>,
}

impl FlakyMailer {
    fn new(failures: u32) -> Self {
        Self {
            failures: Mutex::new(failures),
            delivered: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Mailer for FlakyMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let mut failures = self.failures.lock();
        if *failures > 0 {
            *failures -= 1;
            anyhow::bail!("connection refused");
        }
        self.delivered.lock().push(message.clone());
        Ok(())
    }
}

fn config(max_attempts: u32) -> OutboxProcessorConfig {
    OutboxProcessorConfig {
        poll_interval: Duration::from_millis(10),
        batch_size: 10,
        max_attempts,
        stuck_timeout: Duration::from_secs(60),
    }
}

fn submitted(email: &str) -> OutboxItem {
    OutboxItem::new(
        NotificationKind::ApplicationSubmitted,
        "app-1",
        email,
        serde_json::json!({ "fullName": "Asha" }),
    )
}

#[tokio::test]
async fn test_delivers_and_completes_items() {
    let repo = MemoryOutboxRepository::new();
    repo.push(submitted("a@x.com"));
    let mailer = Arc::new(LogMailer::new());

    let processor = OutboxProcessor::new(
        Arc::new(repo.clone()),
        mailer.clone(),
        TemplateContext::default(),
        config(3),
    );

    assert_eq!(assert_ok!(processor.process_batch().await), 1);
    assert_eq!(mailer.sent().len(), 1);
    assert_eq!(repo.snapshot()[0].status, OutboxStatus::COMPLETED);

    // Completed items are never claimed again.
    assert_eq!(assert_ok!(processor.process_batch().await), 0);
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_failed_delivery_is_retried() {
    let repo = MemoryOutboxRepository::new();
    repo.push(submitted("a@x.com"));
    let mailer = Arc::new(FlakyMailer::new(1));

    let processor = OutboxProcessor::new(
        Arc::new(repo.clone()),
        mailer.clone(),
        TemplateContext::default(),
        config(3),
    );

    assert_ok!(processor.process_batch().await);
    let item = &repo.snapshot()[0];
    assert_eq!(item.status, OutboxStatus::PENDING);
    assert_eq!(item.attempts, 1);

    assert_ok!(processor.process_batch().await);
    assert_eq!(repo.snapshot()[0].status, OutboxStatus::COMPLETED);
    assert_eq!(mailer.delivered.lock().len(), 1);
}

#[tokio::test]
async fn test_item_is_parked_after_max_attempts() {
    let repo = MemoryOutboxRepository::new();
    repo.push(submitted("a@x.com"));
    let mailer = Arc::new(FlakyMailer::new(10));

    let processor = OutboxProcessor::new(
        Arc::new(repo.clone()),
        mailer,
        TemplateContext::default(),
        config(2),
    );

    assert_ok!(processor.process_batch().await);
    assert_ok!(processor.process_batch().await);

    let item = &repo.snapshot()[0];
    assert_eq!(item.status, OutboxStatus::FAILED);
    assert_eq!(item.attempts, 2);
    assert_eq!(item.last_error.as_deref(), Some("connection refused"));

    assert_eq!(assert_ok!(processor.process_batch().await), 0);
}

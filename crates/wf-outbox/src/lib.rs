pub mod repository;
pub mod memory;
pub mod mailer;
pub mod templates;

#[cfg(feature = "mongo")]
pub mod mongo;

use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use crate::repository::OutboxRepository;
use wf_common::env::env_or_parse;
use wf_common::OutboxItem;
use anyhow::Result;
use tracing::{info, error, warn, debug};

// Re-export key types
pub use mailer::{EmailMessage, Mailer, SmtpMailer, SmtpConfig, LogMailer};
pub use memory::{MemoryOutboxRepository, SharedOutbox};
pub use templates::TemplateContext;

#[derive(Debug, Clone)]
pub struct OutboxProcessorConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    /// Deliveries attempted before an item is parked as FAILED
    pub max_attempts: u32,
    /// PROCESSING items older than this are returned to PENDING
    pub stuck_timeout: Duration,
}

impl Default for OutboxProcessorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            batch_size: 50,
            max_attempts: 5,
            stuck_timeout: Duration::from_secs(300),
        }
    }
}

impl OutboxProcessorConfig {
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_millis(env_or_parse("WF_OUTBOX_POLL_INTERVAL_MS", 1000)),
            batch_size: env_or_parse("WF_OUTBOX_BATCH_SIZE", 50),
            max_attempts: env_or_parse("WF_OUTBOX_MAX_ATTEMPTS", 5),
            stuck_timeout: Duration::from_secs(env_or_parse("WF_OUTBOX_STUCK_TIMEOUT_SECS", 300)),
        }
    }
}

pub struct OutboxProcessor {
    repository: Arc<dyn OutboxRepository>,
    mailer: Arc<dyn Mailer>,
    templates: TemplateContext,
    config: OutboxProcessorConfig,
}

impl OutboxProcessor {
    pub fn new(
        repository: Arc<dyn OutboxRepository>,
        mailer: Arc<dyn Mailer>,
        templates: TemplateContext,
        config: OutboxProcessorConfig,
    ) -> Self {
        Self {
            repository,
            mailer,
            templates,
            config,
        }
    }

    pub async fn start(&self) {
        info!("Starting Outbox Processor");
        let mut last_recovery = Instant::now();
        loop {
            if last_recovery.elapsed() >= self.config.stuck_timeout {
                if let Err(e) = self.repository.recover_stuck_items(self.config.stuck_timeout).await {
                    error!("Error recovering stuck outbox items: {}", e);
                }
                last_recovery = Instant::now();
            }

            if let Err(e) = self.process_batch().await {
                error!("Error processing outbox batch: {}", e);
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// Deliver one batch. Returns the number of items claimed.
    pub async fn process_batch(&self) -> Result<usize> {
        let items = self.repository.claim_pending(self.config.batch_size).await?;
        let claimed = items.len();

        for item in items {
            debug!("Processing outbox item [{}] {}", item.id, item.kind.as_str());

            match self.deliver(&item).await {
                Ok(()) => {
                    self.repository.mark_completed(&item.id).await?;
                    metrics::counter!("wf_outbox_delivered_total").increment(1);
                }
                Err(e) => {
                    let retry = item.attempts + 1 < self.config.max_attempts;
                    if retry {
                        warn!("Delivery of outbox item [{}] failed, will retry: {}", item.id, e);
                    } else {
                        error!("Delivery of outbox item [{}] failed permanently: {}", item.id, e);
                        metrics::counter!("wf_outbox_failed_total").increment(1);
                    }
                    self.repository.mark_failed(&item.id, &e.to_string(), retry).await?;
                }
            }
        }

        Ok(claimed)
    }

    async fn deliver(&self, item: &OutboxItem) -> Result<()> {
        for email in templates::render(item, &self.templates) {
            self.mailer.send(&email).await?;
        }
        Ok(())
    }
}

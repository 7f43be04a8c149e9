//! Retention of rejected applications.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::config::RetentionConfig;
use crate::error::{PlatformError, Result};
use crate::repository::ApplicationRepository;

pub struct RetentionService {
    applications: Arc<dyn ApplicationRepository>,
    config: RetentionConfig,
}

impl RetentionService {
    pub fn new(applications: Arc<dyn ApplicationRepository>, config: RetentionConfig) -> Self {
        Self { applications, config }
    }

    /// Delete one batch of rejected applications older than the retention window.
    pub async fn purge_rejected(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = Duration::try_days(self.config.rejected_after_days)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                PlatformError::configuration(format!(
                    "WF_RETENTION_DAYS out of range: {}",
                    self.config.rejected_after_days
                ))
            })?;
        let deleted = self
            .applications
            .delete_rejected_before(cutoff, self.config.batch_size)
            .await?;

        if deleted > 0 {
            info!(deleted, cutoff = %cutoff.to_rfc3339(), "Purged rejected applications");
        }
        Ok(deleted)
    }
}

/// Runs the purge on an interval until shutdown.
pub struct RetentionSweeper {
    service: Arc<RetentionService>,
}

impl RetentionSweeper {
    pub fn new(service: Arc<RetentionService>) -> Self {
        Self { service }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.service.config.interval);
        info!(
            interval_secs = self.service.config.interval.as_secs(),
            retention_days = self.service.config.rejected_after_days,
            "Retention sweeper started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.service.purge_rejected(Utc::now()).await {
                        error!(error = %e, "Retention purge failed");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Retention sweeper stopping");
                    break;
                }
            }
        }
    }
}

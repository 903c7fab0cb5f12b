use chrono::{Duration as ChronoDuration, Utc};
use parley_persist::{HistoryStore, PurgeReport, Result};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::RetentionConfig;

/// Purge everything older than `days` days
pub async fn purge_expired(history: &HistoryStore, days: u32) -> Result<PurgeReport> {
    let cutoff = Utc::now() - ChronoDuration::days(i64::from(days));
    let report = history.purge_older_than(cutoff).await?;

    tracing::info!(
        cutoff = %cutoff,
        messages_deleted = report.messages_deleted,
        threads_deleted = report.threads_deleted,
        "Retention purge finished"
    );
    Ok(report)
}

/// Background retention task; `None` when retention is disabled
pub fn spawn_retention(history: HistoryStore, config: &RetentionConfig) -> Option<JoinHandle<()>> {
    if config.days == 0 {
        return None;
    }

    let days = config.days;
    let period = Duration::from_secs(config.interval_secs.max(60));

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = purge_expired(&history, days).await {
                tracing::error!(error = %e, "Retention purge failed");
            }
        }
    }))
}

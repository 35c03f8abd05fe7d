use crate::plugin::NotifierRegistry;
use fleetmon_common::types::{Alert, DeliveryStatus, NotificationChannel};
use fleetmon_store::{AlertStore, ChannelStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

/// Default number of concurrent delivery workers.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default per-delivery timeout budget in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Resolves target channels for an alert, filters them by severity,
/// fans delivery out with bounded parallelism, and records per-channel
/// outcomes on the alert.
pub struct NotificationManager {
    channels: Arc<dyn ChannelStore>,
    alerts: Arc<dyn AlertStore>,
    registry: Arc<NotifierRegistry>,
    concurrency: usize,
    timeout_secs: u64,
}

impl NotificationManager {
    pub fn new(
        channels: Arc<dyn ChannelStore>,
        alerts: Arc<dyn AlertStore>,
        registry: Arc<NotifierRegistry>,
        concurrency: usize,
        timeout_secs: u64,
    ) -> Self {
        Self {
            channels,
            alerts,
            registry,
            concurrency: concurrency.max(1),
            timeout_secs,
        }
    }

    /// Delivers `alert` to the given channels (or to all enabled channels
    /// when `channel_ids` is `None`) and returns channel_id → success.
    ///
    /// Missing channel IDs are dropped, not errors. Channels whose
    /// `min_severity` exceeds the alert's severity are excluded; an empty
    /// remaining set short-circuits to an empty map. Each delivery runs
    /// in its own task so one channel's failure, panic, or hang cannot
    /// affect another's result.
    pub async fn send_alert(
        &self,
        alert: &Alert,
        channel_ids: Option<&[String]>,
    ) -> HashMap<String, bool> {
        let targets = self.resolve_channels(alert, channel_ids).await;
        if targets.is_empty() {
            tracing::debug!(alert_id = %alert.id, "No notification channels to deliver to");
            return HashMap::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let budget = Duration::from_secs(self.timeout_secs);
        let mut tasks = Vec::with_capacity(targets.len());

        for channel in targets {
            let sem = Arc::clone(&semaphore);
            let registry = Arc::clone(&self.registry);
            let alert = alert.clone();
            let channel_id = channel.id.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("notify semaphore closed");

                let notifier = match registry
                    .create_notifier(channel.channel_type.as_str(), &channel.config)
                {
                    Ok(notifier) => notifier,
                    Err(e) => {
                        tracing::error!(
                            channel_id = %channel.id,
                            channel_type = %channel.channel_type,
                            error = %e,
                            "No usable notifier for channel"
                        );
                        return false;
                    }
                };

                match timeout(budget, notifier.send(&alert)).await {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        tracing::error!(
                            channel_id = %channel.id,
                            channel_type = %channel.channel_type,
                            error = %e,
                            "Notification delivery failed"
                        );
                        false
                    }
                    Err(_) => {
                        tracing::warn!(
                            channel_id = %channel.id,
                            timeout_secs = budget.as_secs(),
                            "Notification delivery timed out"
                        );
                        false
                    }
                }
            });
            tasks.push((channel_id, handle));
        }

        let mut results = HashMap::new();
        for (channel_id, handle) in tasks {
            let ok = match handle.await {
                Ok(ok) => ok,
                Err(e) => {
                    tracing::error!(channel_id = %channel_id, error = %e, "Delivery task panicked");
                    false
                }
            };
            results.insert(channel_id, ok);
        }

        if !alert.id.is_empty() {
            for (channel_id, ok) in &results {
                let status = if *ok {
                    DeliveryStatus::Sent
                } else {
                    DeliveryStatus::Failed
                };
                if let Err(e) = self
                    .alerts
                    .set_notification_status(&alert.id, channel_id, status)
                    .await
                {
                    tracing::warn!(
                        alert_id = %alert.id,
                        channel_id = %channel_id,
                        error = %e,
                        "Failed to record notification status"
                    );
                }
            }
        }

        results
    }

    async fn resolve_channels(
        &self,
        alert: &Alert,
        channel_ids: Option<&[String]>,
    ) -> Vec<NotificationChannel> {
        let candidates = match channel_ids {
            Some(ids) => {
                let mut out = Vec::with_capacity(ids.len());
                for id in ids {
                    match self.channels.get_channel(id).await {
                        Ok(Some(channel)) if channel.enabled => out.push(channel),
                        Ok(Some(_)) => {
                            tracing::debug!(channel_id = %id, "Skipping disabled channel");
                        }
                        Ok(None) => {
                            tracing::debug!(channel_id = %id, "Skipping unknown channel id");
                        }
                        Err(e) => {
                            tracing::warn!(channel_id = %id, error = %e, "Channel lookup failed");
                        }
                    }
                }
                out
            }
            None => match self.channels.list_channels(true).await {
                Ok(channels) => channels,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to list notification channels");
                    Vec::new()
                }
            },
        };

        candidates
            .into_iter()
            .filter(|channel| {
                let min = channel.min_severity();
                if alert.severity >= min {
                    true
                } else {
                    tracing::debug!(
                        channel_id = %channel.id,
                        min_severity = %min,
                        alert_severity = %alert.severity,
                        "Channel filtered by min_severity"
                    );
                    false
                }
            })
            .collect()
    }
}

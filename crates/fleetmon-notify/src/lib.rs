//! Notification delivery for triggered alerts.
//!
//! Alerts are fanned out to one or more channels with bounded
//! parallelism; each channel type (email SMTP, Slack/Discord/generic
//! webhook) is backed by a [`Notifier`] implementation created through
//! the [`plugin::NotifierRegistry`]. One channel's failure never
//! affects another's delivery.

pub mod channels;
pub mod error;
pub mod manager;
pub mod plugin;

mod utils;


use async_trait::async_trait;
use fleetmon_common::types::Alert;

/// Delivers one alert to one kind of external destination.
///
/// Implementations are created by the matching [`plugin::ChannelPlugin`]
/// from a channel's validated config. Delivery errors are returned, not
/// swallowed; the notification manager converts them to per-channel
/// failure flags.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Transmits the alert through this channel.
    async fn send(&self, alert: &Alert) -> error::Result<()>;

    /// Channel type name (e.g. `"email"`, `"slack"`).
    fn channel_type(&self) -> &str;

    /// Plain-text rendering of the alert, shared across channel types
    /// (the email notifier uses it as the fallback body).
    fn format_message(&self, alert: &Alert) -> String {
        plain_text_message(alert)
    }
}

/// Default plain-text rendering of an alert.
pub fn plain_text_message(alert: &Alert) -> String {
    let mut lines = vec![
        format!("Alert: {}", alert.severity),
        format!("Message: {}", alert.message),
    ];
    if let Some(host) = &alert.host_name {
        lines.push(format!("Host: {host}"));
    }
    if let Some(metric) = &alert.metric_name {
        lines.push(format!("Metric: {metric}"));
    }
    if let Some(value) = alert.value {
        lines.push(format!("Value: {value:.2}"));
    }
    if let Some(threshold) = alert.threshold {
        lines.push(format!("Threshold: {threshold:.2}"));
    }
    lines.push(format!("Time: {}", alert.triggered_at.to_rfc3339()));
    lines.join("\n")
}

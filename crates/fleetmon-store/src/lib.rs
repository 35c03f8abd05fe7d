//! Repository interfaces consumed by the alerting core.
//!
//! The engine and managers never talk to a database directly; they go
//! through these traits. [`memory::MemoryStore`] provides a complete
//! in-process implementation used by tests and light embedders; real
//! deployments back them with their own persistence layer.

pub mod memory;


use anyhow::Result;
use async_trait::async_trait;
use fleetmon_common::types::{
    Alert, AlertMute, AlertRule, ChannelType, DeliveryStatus, MetricSnapshot, NotificationChannel,
    StatusSnapshot,
};

/// Read access to the latest collected metric per (host, metric) pair.
///
/// Implementations must be safe to share across tasks (`Send + Sync`)
/// because evaluation and management run concurrently.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Latest reading for the given host and metric, or `None` if the
    /// collector has never produced one.
    async fn latest_metric(&self, host_id: &str, metric_name: &str)
        -> Result<Option<MetricSnapshot>>;
}

/// Read access to device reachability status and the host inventory.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Latest status row for the given host, or `None` if unknown.
    async fn latest_status(&self, host_id: &str) -> Result<Option<StatusSnapshot>>;

    /// All known host IDs. Network-wide rules fan out over this set.
    async fn host_ids(&self) -> Result<Vec<String>>;
}

/// Persistence for alert rules.
#[async_trait]
pub trait AlertRuleStore: Send + Sync {
    async fn create_rule(&self, rule: &AlertRule) -> Result<AlertRule>;

    async fn get_rule(&self, id: &str) -> Result<Option<AlertRule>>;

    /// All rules, optionally restricted to enabled ones.
    async fn list_rules(&self, enabled_only: bool) -> Result<Vec<AlertRule>>;

    /// Rules that apply to the given host: host-scoped matches plus all
    /// network-wide rules.
    async fn list_rules_for_host(&self, host_id: &str) -> Result<Vec<AlertRule>>;

    /// Replaces the stored rule. Returns `None` if the ID is unknown.
    async fn update_rule(&self, rule: &AlertRule) -> Result<Option<AlertRule>>;

    /// Returns true if a rule was deleted. Historical alerts keep their
    /// `alert_rule_id` and are orphaned by deletion.
    async fn delete_rule(&self, id: &str) -> Result<bool>;
}

/// Persistence for triggered alerts.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn create_alert(&self, alert: &Alert) -> Result<Alert>;

    async fn update_alert(&self, alert: &Alert) -> Result<Option<Alert>>;

    async fn get_alert(&self, id: &str) -> Result<Option<Alert>>;

    /// Most recent alerts for a rule, newest first, at most `limit` rows.
    /// The cooldown check scans this bounded window.
    async fn alerts_for_rule(&self, rule_id: &str, limit: usize) -> Result<Vec<Alert>>;

    /// All alerts with no `resolved_at`.
    async fn active_alerts(&self) -> Result<Vec<Alert>>;

    /// Alerts triggered within the last `hours`.
    async fn recent_alerts(&self, hours: i64) -> Result<Vec<Alert>>;

    /// Records one channel's delivery outcome on an alert.
    async fn set_notification_status(
        &self,
        alert_id: &str,
        channel_id: &str,
        status: DeliveryStatus,
    ) -> Result<()>;
}

/// Persistence for notification channels.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn create_channel(&self, channel: &NotificationChannel) -> Result<NotificationChannel>;

    async fn get_channel(&self, id: &str) -> Result<Option<NotificationChannel>>;

    async fn list_channels(&self, enabled_only: bool) -> Result<Vec<NotificationChannel>>;

    async fn channels_by_type(&self, channel_type: ChannelType)
        -> Result<Vec<NotificationChannel>>;

    async fn update_channel(
        &self,
        channel: &NotificationChannel,
    ) -> Result<Option<NotificationChannel>>;
}

/// Persistence for alert mutes.
#[async_trait]
pub trait MuteStore: Send + Sync {
    /// Whether an active mute covers (rule, host). A rule-wide mute
    /// (`host_id = None`) covers every host.
    async fn is_muted(&self, rule_id: &str, host_id: Option<&str>) -> Result<bool>;

    async fn create_mute(&self, mute: &AlertMute) -> Result<AlertMute>;

    /// Removes mutes for (rule, host); `host_id = None` removes the
    /// rule-wide mute. Returns the number of rows removed.
    async fn delete_mute(&self, rule_id: &str, host_id: Option<&str>) -> Result<u64>;

    async fn active_mutes(&self) -> Result<Vec<AlertMute>>;

    /// Drops mutes whose expiry has passed. Returns the number removed.
    async fn delete_expired(&self) -> Result<u64>;
}

use crate::{AlertRuleStore, AlertStore, ChannelStore, MetricSource, MuteStore, StatusSource};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use fleetmon_common::types::{
    Alert, AlertMute, AlertRule, ChannelType, DeliveryStatus, MetricSnapshot, NotificationChannel,
    StatusSnapshot,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process implementation of every repository trait.
///
/// Backed by `RwLock`-guarded maps; each call is individually atomic,
/// matching the contract the engine assumes of real stores. Metric and
/// status snapshots are fed in through [`MemoryStore::record_metric`]
/// and [`MemoryStore::record_status`], standing in for the collector.
#[derive(Default)]
pub struct MemoryStore {
    rules: RwLock<HashMap<String, AlertRule>>,
    alerts: RwLock<HashMap<String, Alert>>,
    channels: RwLock<HashMap<String, NotificationChannel>>,
    mutes: RwLock<HashMap<String, AlertMute>>,
    metrics: RwLock<HashMap<(String, String), MetricSnapshot>>,
    statuses: RwLock<HashMap<String, StatusSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host with an online status, making it visible to
    /// network-wide rules.
    pub async fn register_host(&self, host_id: &str, host_name: &str) {
        self.record_status(host_id, host_name, true).await;
    }

    /// Stores the latest metric reading for (host, metric).
    pub async fn record_metric(&self, host_id: &str, host_name: &str, metric: &str, value: f64) {
        let snapshot = MetricSnapshot {
            value,
            host_name: host_name.to_string(),
            timestamp: Utc::now(),
        };
        self.metrics
            .write()
            .await
            .insert((host_id.to_string(), metric.to_string()), snapshot);
    }

    /// Stores the latest reachability status for a host.
    pub async fn record_status(&self, host_id: &str, host_name: &str, is_online: bool) {
        let snapshot = StatusSnapshot {
            is_online,
            host_name: host_name.to_string(),
            timestamp: Utc::now(),
        };
        self.statuses
            .write()
            .await
            .insert(host_id.to_string(), snapshot);
    }
}

#[async_trait]
impl MetricSource for MemoryStore {
    async fn latest_metric(
        &self,
        host_id: &str,
        metric_name: &str,
    ) -> Result<Option<MetricSnapshot>> {
        let metrics = self.metrics.read().await;
        Ok(metrics
            .get(&(host_id.to_string(), metric_name.to_string()))
            .cloned())
    }
}

#[async_trait]
impl StatusSource for MemoryStore {
    async fn latest_status(&self, host_id: &str) -> Result<Option<StatusSnapshot>> {
        Ok(self.statuses.read().await.get(host_id).cloned())
    }

    async fn host_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.statuses.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl AlertRuleStore for MemoryStore {
    async fn create_rule(&self, rule: &AlertRule) -> Result<AlertRule> {
        self.rules
            .write()
            .await
            .insert(rule.id.clone(), rule.clone());
        Ok(rule.clone())
    }

    async fn get_rule(&self, id: &str) -> Result<Option<AlertRule>> {
        Ok(self.rules.read().await.get(id).cloned())
    }

    async fn list_rules(&self, enabled_only: bool) -> Result<Vec<AlertRule>> {
        let rules = self.rules.read().await;
        let mut out: Vec<AlertRule> = rules
            .values()
            .filter(|r| !enabled_only || r.enabled)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    async fn list_rules_for_host(&self, host_id: &str) -> Result<Vec<AlertRule>> {
        let rules = self.rules.read().await;
        let mut out: Vec<AlertRule> = rules
            .values()
            .filter(|r| match r.host_id.as_deref() {
                Some(h) => h == host_id,
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    async fn update_rule(&self, rule: &AlertRule) -> Result<Option<AlertRule>> {
        let mut rules = self.rules.write().await;
        if rules.contains_key(&rule.id) {
            rules.insert(rule.id.clone(), rule.clone());
            Ok(Some(rule.clone()))
        } else {
            Ok(None)
        }
    }

    async fn delete_rule(&self, id: &str) -> Result<bool> {
        Ok(self.rules.write().await.remove(id).is_some())
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn create_alert(&self, alert: &Alert) -> Result<Alert> {
        self.alerts
            .write()
            .await
            .insert(alert.id.clone(), alert.clone());
        Ok(alert.clone())
    }

    async fn update_alert(&self, alert: &Alert) -> Result<Option<Alert>> {
        let mut alerts = self.alerts.write().await;
        if alerts.contains_key(&alert.id) {
            alerts.insert(alert.id.clone(), alert.clone());
            Ok(Some(alert.clone()))
        } else {
            Ok(None)
        }
    }

    async fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        Ok(self.alerts.read().await.get(id).cloned())
    }

    async fn alerts_for_rule(&self, rule_id: &str, limit: usize) -> Result<Vec<Alert>> {
        let alerts = self.alerts.read().await;
        let mut out: Vec<Alert> = alerts
            .values()
            .filter(|a| a.alert_rule_id == rule_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn active_alerts(&self) -> Result<Vec<Alert>> {
        let alerts = self.alerts.read().await;
        let mut out: Vec<Alert> = alerts.values().filter(|a| a.is_active()).cloned().collect();
        out.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        Ok(out)
    }

    async fn recent_alerts(&self, hours: i64) -> Result<Vec<Alert>> {
        let cutoff = Utc::now() - Duration::hours(hours);
        let alerts = self.alerts.read().await;
        let mut out: Vec<Alert> = alerts
            .values()
            .filter(|a| a.triggered_at >= cutoff)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        Ok(out)
    }

    async fn set_notification_status(
        &self,
        alert_id: &str,
        channel_id: &str,
        status: DeliveryStatus,
    ) -> Result<()> {
        let mut alerts = self.alerts.write().await;
        if let Some(alert) = alerts.get_mut(alert_id) {
            alert
                .notification_status
                .insert(channel_id.to_string(), status);
        } else {
            tracing::warn!(alert_id, "notification status update for unknown alert");
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelStore for MemoryStore {
    async fn create_channel(&self, channel: &NotificationChannel) -> Result<NotificationChannel> {
        self.channels
            .write()
            .await
            .insert(channel.id.clone(), channel.clone());
        Ok(channel.clone())
    }

    async fn get_channel(&self, id: &str) -> Result<Option<NotificationChannel>> {
        Ok(self.channels.read().await.get(id).cloned())
    }

    async fn list_channels(&self, enabled_only: bool) -> Result<Vec<NotificationChannel>> {
        let channels = self.channels.read().await;
        let mut out: Vec<NotificationChannel> = channels
            .values()
            .filter(|c| !enabled_only || c.enabled)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn channels_by_type(
        &self,
        channel_type: ChannelType,
    ) -> Result<Vec<NotificationChannel>> {
        let channels = self.channels.read().await;
        let mut out: Vec<NotificationChannel> = channels
            .values()
            .filter(|c| c.channel_type == channel_type)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn update_channel(
        &self,
        channel: &NotificationChannel,
    ) -> Result<Option<NotificationChannel>> {
        let mut channels = self.channels.write().await;
        if channels.contains_key(&channel.id) {
            channels.insert(channel.id.clone(), channel.clone());
            Ok(Some(channel.clone()))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl MuteStore for MemoryStore {
    async fn is_muted(&self, rule_id: &str, host_id: Option<&str>) -> Result<bool> {
        let now = Utc::now();
        let mutes = self.mutes.read().await;
        Ok(mutes
            .values()
            .any(|m| m.alert_rule_id == rule_id && m.is_active(now) && m.covers_host(host_id)))
    }

    async fn create_mute(&self, mute: &AlertMute) -> Result<AlertMute> {
        self.mutes
            .write()
            .await
            .insert(mute.id.clone(), mute.clone());
        Ok(mute.clone())
    }

    async fn delete_mute(&self, rule_id: &str, host_id: Option<&str>) -> Result<u64> {
        let mut mutes = self.mutes.write().await;
        let before = mutes.len();
        mutes.retain(|_, m| {
            !(m.alert_rule_id == rule_id && m.host_id.as_deref() == host_id)
        });
        Ok((before - mutes.len()) as u64)
    }

    async fn active_mutes(&self) -> Result<Vec<AlertMute>> {
        let now = Utc::now();
        let mutes = self.mutes.read().await;
        let mut out: Vec<AlertMute> = mutes
            .values()
            .filter(|m| m.is_active(now))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.muted_at.cmp(&b.muted_at));
        Ok(out)
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut mutes = self.mutes.write().await;
        let before = mutes.len();
        mutes.retain(|_, m| m.is_active(now));
        Ok((before - mutes.len()) as u64)
    }
}

use crate::config::{AlertingConfig, SeedChannel, SeedFile, SeedRule};
use crate::engine::AlertEngine;
use crate::error::{AlertError, Result};
use chrono::{Duration, Utc};
use fleetmon_common::id;
use fleetmon_common::types::{
    Alert, AlertMute, AlertRule, AlertStatistics, ChannelType, Condition, CreateChannelRequest,
    CreateRuleRequest, NotificationChannel, RuleType, Severity, UpdateRuleRequest,
};
use fleetmon_notify::manager::NotificationManager;
use fleetmon_notify::plugin::NotifierRegistry;
use fleetmon_store::{
    AlertRuleStore, AlertStore, ChannelStore, MetricSource, MuteStore, StatusSource,
};
use std::sync::Arc;

/// Management facade over the alerting subsystem.
///
/// Owns the evaluation engine and the notification fan-out, and exposes
/// rule, channel, and mute CRUD plus the alert lifecycle operations.
/// String-typed request fields (`condition`, `severity`, `rule_type`) are
/// normalized here; everything past this boundary works with the closed
/// enums.
pub struct AlertManager {
    engine: AlertEngine,
    rules: Arc<dyn AlertRuleStore>,
    alerts: Arc<dyn AlertStore>,
    channels: Arc<dyn ChannelStore>,
    mutes: Arc<dyn MuteStore>,
    notifier: NotificationManager,
    registry: Arc<NotifierRegistry>,
    config: AlertingConfig,
}

impl AlertManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rules: Arc<dyn AlertRuleStore>,
        alerts: Arc<dyn AlertStore>,
        channels: Arc<dyn ChannelStore>,
        mutes: Arc<dyn MuteStore>,
        metrics: Arc<dyn MetricSource>,
        statuses: Arc<dyn StatusSource>,
        registry: Arc<NotifierRegistry>,
        config: AlertingConfig,
    ) -> Self {
        let engine = AlertEngine::new(
            Arc::clone(&rules),
            Arc::clone(&alerts),
            Arc::clone(&mutes),
            metrics,
            statuses,
            config.cooldown_scan_limit,
        );
        let notifier = NotificationManager::new(
            Arc::clone(&channels),
            Arc::clone(&alerts),
            Arc::clone(&registry),
            config.notify_concurrency,
            config.notify_timeout_secs,
        );
        Self {
            engine,
            rules,
            alerts,
            channels,
            mutes,
            notifier,
            registry,
            config,
        }
    }

    pub fn engine(&self) -> &AlertEngine {
        &self.engine
    }

    // ---- Rule management ----

    pub async fn create_rule(&self, req: CreateRuleRequest) -> Result<AlertRule> {
        let rule_type: RuleType = req.rule_type.parse().map_err(AlertError::Validation)?;
        let condition: Condition = req.condition.parse().map_err(AlertError::Validation)?;
        let severity: Severity = req.severity.parse().map_err(AlertError::Validation)?;

        let now = Utc::now();
        let rule = AlertRule {
            id: id::next_id(),
            name: req.name,
            description: req.description,
            rule_type,
            metric_name: req.metric_name,
            host_id: req.host_id,
            condition,
            threshold: req.threshold,
            severity,
            enabled: req.enabled,
            notification_channels: req.notification_channels,
            cooldown_minutes: req.cooldown_minutes,
            created_at: now,
            updated_at: now,
        };
        rule.validate().map_err(AlertError::Validation)?;

        let created = self.rules.create_rule(&rule).await?;
        tracing::info!(rule_id = %created.id, name = %created.name, "Alert rule created");
        Ok(created)
    }

    pub async fn get_rule(&self, id: &str) -> Result<AlertRule> {
        self.rules
            .get_rule(id)
            .await?
            .ok_or_else(|| AlertError::NotFound {
                entity: "alert_rule",
                id: id.to_string(),
            })
    }

    pub async fn list_rules(&self, enabled_only: bool) -> Result<Vec<AlertRule>> {
        Ok(self.rules.list_rules(enabled_only).await?)
    }

    pub async fn update_rule(&self, id: &str, req: UpdateRuleRequest) -> Result<AlertRule> {
        let mut rule = self.get_rule(id).await?;

        if let Some(name) = req.name {
            rule.name = name;
        }
        if let Some(description) = req.description {
            rule.description = Some(description);
        }
        if let Some(metric_name) = req.metric_name {
            rule.metric_name = Some(metric_name);
        }
        if let Some(host_id) = req.host_id {
            rule.host_id = Some(host_id);
        }
        if let Some(condition) = req.condition {
            rule.condition = condition.parse().map_err(AlertError::Validation)?;
        }
        if let Some(threshold) = req.threshold {
            rule.threshold = Some(threshold);
        }
        if let Some(severity) = req.severity {
            rule.severity = severity.parse().map_err(AlertError::Validation)?;
        }
        if let Some(enabled) = req.enabled {
            rule.enabled = enabled;
        }
        if let Some(channels) = req.notification_channels {
            rule.notification_channels = channels;
        }
        if let Some(cooldown) = req.cooldown_minutes {
            rule.cooldown_minutes = cooldown;
        }
        rule.updated_at = Utc::now();
        rule.validate().map_err(AlertError::Validation)?;

        self.rules
            .update_rule(&rule)
            .await?
            .ok_or_else(|| AlertError::NotFound {
                entity: "alert_rule",
                id: id.to_string(),
            })
    }

    pub async fn enable_rule(&self, id: &str) -> Result<AlertRule> {
        self.set_rule_enabled(id, true).await
    }

    pub async fn disable_rule(&self, id: &str) -> Result<AlertRule> {
        self.set_rule_enabled(id, false).await
    }

    async fn set_rule_enabled(&self, id: &str, enabled: bool) -> Result<AlertRule> {
        let mut rule = self.get_rule(id).await?;
        rule.enabled = enabled;
        rule.updated_at = Utc::now();
        self.rules
            .update_rule(&rule)
            .await?
            .ok_or_else(|| AlertError::NotFound {
                entity: "alert_rule",
                id: id.to_string(),
            })
    }

    pub async fn delete_rule(&self, id: &str) -> Result<()> {
        if !self.rules.delete_rule(id).await? {
            return Err(AlertError::NotFound {
                entity: "alert_rule",
                id: id.to_string(),
            });
        }
        tracing::info!(rule_id = %id, "Alert rule deleted");
        Ok(())
    }

    // ---- Evaluation and notification ----

    /// Runs one evaluation cycle and fans out notifications for every
    /// newly triggered alert. Delivery failures never undo a trigger;
    /// their outcomes land in the alert's `notification_status`.
    pub async fn evaluate_rules(&self) -> Result<Vec<Alert>> {
        let triggered = self.engine.evaluate_all_rules().await?;

        for alert in &triggered {
            match self.rules.get_rule(&alert.alert_rule_id).await {
                Ok(Some(rule)) => {
                    self.notifier
                        .send_alert(alert, Some(&rule.notification_channels))
                        .await;
                }
                Ok(None) => {
                    tracing::debug!(
                        alert_id = %alert.id,
                        rule_id = %alert.alert_rule_id,
                        "Rule vanished before notification"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        alert_id = %alert.id,
                        error = %e,
                        "Rule lookup failed before notification"
                    );
                }
            }
        }

        Ok(triggered)
    }

    // ---- Alert lifecycle ----

    pub async fn get_alert(&self, id: &str) -> Result<Alert> {
        self.alerts
            .get_alert(id)
            .await?
            .ok_or_else(|| AlertError::NotFound {
                entity: "alert",
                id: id.to_string(),
            })
    }

    pub async fn list_active_alerts(&self) -> Result<Vec<Alert>> {
        Ok(self.alerts.active_alerts().await?)
    }

    pub async fn list_recent_alerts(&self, hours: i64) -> Result<Vec<Alert>> {
        Ok(self.alerts.recent_alerts(hours).await?)
    }

    /// Marks an alert as seen by an operator. Re-acknowledging overwrites
    /// the previous acknowledger; acknowledging a resolved alert is an
    /// error because resolved alerts are immutable.
    pub async fn acknowledge_alert(&self, id: &str, acknowledged_by: &str) -> Result<Alert> {
        let mut alert = self.get_alert(id).await?;
        if !alert.is_active() {
            return Err(AlertError::Validation(format!(
                "alert {id} is already resolved"
            )));
        }
        alert.acknowledge(acknowledged_by, Utc::now());
        self.alerts
            .update_alert(&alert)
            .await?
            .ok_or_else(|| AlertError::NotFound {
                entity: "alert",
                id: id.to_string(),
            })
    }

    /// Resolves an alert. Resolving twice is a no-op that returns the
    /// stored record unchanged.
    pub async fn resolve_alert(&self, id: &str) -> Result<Alert> {
        let mut alert = self.get_alert(id).await?;
        if !alert.is_active() {
            return Ok(alert);
        }
        alert.resolve(Utc::now());
        self.alerts
            .update_alert(&alert)
            .await?
            .ok_or_else(|| AlertError::NotFound {
                entity: "alert",
                id: id.to_string(),
            })
    }

    pub async fn resolve_stale_alerts(&self) -> Result<u64> {
        self.engine
            .resolve_stale_alerts(self.config.stale_alert_hours)
            .await
    }

    pub async fn get_alert_statistics(&self, hours: i64) -> Result<AlertStatistics> {
        let alerts = self.alerts.recent_alerts(hours).await?;
        let mut stats = AlertStatistics::default();

        for alert in &alerts {
            stats.total += 1;
            if alert.resolved_at.is_some() {
                stats.resolved += 1;
            } else if alert.is_acknowledged() {
                stats.acknowledged += 1;
            } else {
                stats.active += 1;
            }
            *stats
                .by_severity
                .entry(alert.severity.to_string())
                .or_insert(0) += 1;
            *stats
                .by_rule
                .entry(alert.alert_rule_id.clone())
                .or_insert(0) += 1;
        }

        Ok(stats)
    }

    // ---- Mutes ----

    pub async fn mute_rule(
        &self,
        rule_id: &str,
        host_id: Option<String>,
        duration_minutes: Option<i64>,
        muted_by: &str,
        reason: Option<String>,
    ) -> Result<AlertMute> {
        // Muting an unknown rule is rejected rather than silently stored.
        self.get_rule(rule_id).await?;

        let now = Utc::now();
        let mute = AlertMute {
            id: id::next_id(),
            alert_rule_id: rule_id.to_string(),
            host_id,
            muted_by: muted_by.to_string(),
            muted_at: now,
            expires_at: duration_minutes.map(|m| now + Duration::minutes(m)),
            reason,
        };
        let created = self.mutes.create_mute(&mute).await?;
        tracing::info!(
            rule_id = %rule_id,
            host_id = ?created.host_id,
            expires_at = ?created.expires_at,
            "Rule muted"
        );
        Ok(created)
    }

    /// Removes the mute for exactly (rule, host). Returns the number of
    /// mutes removed; zero is not an error.
    pub async fn unmute_rule(&self, rule_id: &str, host_id: Option<&str>) -> Result<u64> {
        let removed = self.mutes.delete_mute(rule_id, host_id).await?;
        if removed > 0 {
            tracing::info!(rule_id = %rule_id, host_id = ?host_id, removed, "Rule unmuted");
        }
        Ok(removed)
    }

    pub async fn list_active_mutes(&self) -> Result<Vec<AlertMute>> {
        Ok(self.mutes.active_mutes().await?)
    }

    // ---- Channel management ----

    /// Creates a notification channel, validating its config against the
    /// matching plugin's schema. Types without a registered plugin (sms)
    /// are stored with a warning; deliveries to them will record failure.
    pub async fn create_channel(&self, req: CreateChannelRequest) -> Result<NotificationChannel> {
        let channel_type: ChannelType = req.channel_type.parse().map_err(AlertError::Validation)?;
        if !req.config.is_object() {
            return Err(AlertError::Validation(
                "channel config must be a JSON object".to_string(),
            ));
        }

        if self.registry.has_plugin(channel_type.as_str()) {
            self.registry
                .validate_config(channel_type.as_str(), &req.config)
                .map_err(|e| AlertError::Validation(e.to_string()))?;
        } else {
            tracing::warn!(
                channel_id = %req.id,
                channel_type = %channel_type,
                "No plugin registered for channel type; deliveries will fail"
            );
        }

        let now = Utc::now();
        let channel = NotificationChannel {
            id: req.id,
            name: req.name,
            channel_type,
            config: req.config,
            enabled: req.enabled,
            created_at: now,
            updated_at: now,
        };
        let created = self.channels.create_channel(&channel).await?;
        tracing::info!(
            channel_id = %created.id,
            channel_type = %created.channel_type,
            "Notification channel created"
        );
        Ok(created)
    }

    pub async fn get_channel(&self, id: &str) -> Result<NotificationChannel> {
        self.channels
            .get_channel(id)
            .await?
            .ok_or_else(|| AlertError::NotFound {
                entity: "notification_channel",
                id: id.to_string(),
            })
    }

    pub async fn list_channels(&self, enabled_only: bool) -> Result<Vec<NotificationChannel>> {
        Ok(self.channels.list_channels(enabled_only).await?)
    }

    pub async fn enable_channel(&self, id: &str) -> Result<NotificationChannel> {
        self.set_channel_enabled(id, true).await
    }

    pub async fn disable_channel(&self, id: &str) -> Result<NotificationChannel> {
        self.set_channel_enabled(id, false).await
    }

    async fn set_channel_enabled(&self, id: &str, enabled: bool) -> Result<NotificationChannel> {
        let mut channel = self.get_channel(id).await?;
        channel.enabled = enabled;
        channel.updated_at = Utc::now();
        self.channels
            .update_channel(&channel)
            .await?
            .ok_or_else(|| AlertError::NotFound {
                entity: "notification_channel",
                id: id.to_string(),
            })
    }

    /// Channel config with secrets masked, for management responses.
    pub async fn redacted_channel_config(&self, id: &str) -> Result<serde_json::Value> {
        let channel = self.get_channel(id).await?;
        match self.registry.get_plugin(channel.channel_type.as_str()) {
            Some(plugin) => Ok(plugin.redact_config(&channel.config)),
            None => Ok(channel.config),
        }
    }

    // ---- Seeding ----

    /// Imports rules and channels from a seed file. Returns
    /// (rules created, channels created).
    pub async fn import_seed(&self, seed: &SeedFile) -> Result<(u64, u64)> {
        let rules = self.seed_rules(&seed.rules).await?;
        let channels = self.seed_channels(&seed.channels).await?;
        Ok((rules, channels))
    }

    /// Creates seed rules, skipping any whose name already exists so
    /// re-running the import is safe.
    pub async fn seed_rules(&self, seed_rules: &[SeedRule]) -> Result<u64> {
        let existing_names: Vec<String> = self
            .rules
            .list_rules(false)
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect();

        let mut created = 0u64;
        for seed_rule in seed_rules {
            if existing_names.contains(&seed_rule.name) {
                tracing::debug!(name = %seed_rule.name, "Seed rule already exists, skipping");
                continue;
            }
            let req = CreateRuleRequest {
                name: seed_rule.name.clone(),
                description: seed_rule.description.clone(),
                rule_type: seed_rule.rule_type.clone(),
                metric_name: seed_rule.metric_name.clone(),
                host_id: seed_rule.host_id.clone(),
                condition: seed_rule.condition.clone(),
                threshold: seed_rule.threshold,
                severity: seed_rule.severity.clone(),
                enabled: seed_rule.enabled,
                notification_channels: seed_rule.notification_channels.clone(),
                cooldown_minutes: seed_rule.cooldown_minutes,
            };
            self.create_rule(req).await?;
            created += 1;
        }
        Ok(created)
    }

    /// Creates seed channels, skipping ids that already exist.
    pub async fn seed_channels(&self, seed_channels: &[SeedChannel]) -> Result<u64> {
        let mut created = 0u64;
        for seed_channel in seed_channels {
            if self.channels.get_channel(&seed_channel.id).await?.is_some() {
                tracing::debug!(channel_id = %seed_channel.id, "Seed channel already exists, skipping");
                continue;
            }
            let req = CreateChannelRequest {
                id: seed_channel.id.clone(),
                name: seed_channel.name.clone(),
                channel_type: seed_channel.channel_type.clone(),
                config: seed_channel.config.clone(),
                enabled: seed_channel.enabled,
            };
            self.create_channel(req).await?;
            created += 1;
        }
        Ok(created)
    }
}

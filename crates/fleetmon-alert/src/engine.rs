use crate::error::{AlertError, Result};
use chrono::{Duration, Utc};
use fleetmon_common::types::{Alert, AlertRule, Condition, RuleType};
use fleetmon_store::{AlertRuleStore, AlertStore, MetricSource, MuteStore, StatusSource};
use std::sync::Arc;

/// Evaluates alert rules against the latest metric/status snapshots.
///
/// Suppression happens in two layers: explicit mutes (host-scoped or
/// rule-wide, optionally expiring) and per-(rule, host) cooldown derived
/// from the most recently triggered alert. The engine only reads rules
/// and mutes; alerts are the sole records it creates.
pub struct AlertEngine {
    rules: Arc<dyn AlertRuleStore>,
    alerts: Arc<dyn AlertStore>,
    mutes: Arc<dyn MuteStore>,
    metrics: Arc<dyn MetricSource>,
    statuses: Arc<dyn StatusSource>,
    cooldown_scan_limit: usize,
}

impl AlertEngine {
    pub fn new(
        rules: Arc<dyn AlertRuleStore>,
        alerts: Arc<dyn AlertStore>,
        mutes: Arc<dyn MuteStore>,
        metrics: Arc<dyn MetricSource>,
        statuses: Arc<dyn StatusSource>,
        cooldown_scan_limit: usize,
    ) -> Self {
        Self {
            rules,
            alerts,
            mutes,
            metrics,
            statuses,
            cooldown_scan_limit,
        }
    }

    /// Evaluates every enabled rule and returns the newly created alerts.
    ///
    /// One rule's evaluation failure is logged and does not abort the
    /// batch; failing to load the rule list does.
    pub async fn evaluate_all_rules(&self) -> Result<Vec<Alert>> {
        let rules = self.rules.list_rules(true).await?;
        let mut created = Vec::new();

        for rule in &rules {
            match self.evaluate_rule(rule).await {
                Ok(mut alerts) => created.append(&mut alerts),
                Err(e) => {
                    tracing::error!(rule_id = %rule.id, error = %e, "Rule evaluation failed");
                }
            }
        }

        Ok(created)
    }

    /// Evaluates a single rule, dispatching on its type.
    pub async fn evaluate_rule(&self, rule: &AlertRule) -> Result<Vec<Alert>> {
        match rule.rule_type {
            RuleType::Threshold => self.evaluate_threshold(rule).await,
            RuleType::StatusChange => self.evaluate_status_change(rule).await,
            RuleType::Custom => {
                // Extension point; custom rules have no built-in evaluator.
                tracing::debug!(rule_id = %rule.id, "Skipping custom rule");
                Ok(Vec::new())
            }
        }
    }

    /// Host scope of a rule: its own host, or every known host for
    /// network-wide rules.
    async fn host_scope(&self, rule: &AlertRule) -> Result<Vec<String>> {
        match &rule.host_id {
            Some(host_id) => Ok(vec![host_id.clone()]),
            None => Ok(self.statuses.host_ids().await?),
        }
    }

    async fn evaluate_threshold(&self, rule: &AlertRule) -> Result<Vec<Alert>> {
        let metric_name = rule.metric_name.as_deref().ok_or_else(|| {
            AlertError::Validation(format!("threshold rule {} has no metric_name", rule.id))
        })?;
        let threshold = rule.threshold.ok_or_else(|| {
            AlertError::Validation(format!("threshold rule {} has no threshold", rule.id))
        })?;

        let mut created = Vec::new();
        for host_id in self.host_scope(rule).await? {
            if self.is_suppressed(rule, &host_id).await? {
                continue;
            }

            // No reading yet for this (host, metric) is not an error.
            let Some(snapshot) = self.metrics.latest_metric(&host_id, metric_name).await? else {
                continue;
            };

            if rule.condition.check(snapshot.value, threshold) {
                let message = format!(
                    "{}: {} is {:.1} ({} threshold {:.1})",
                    snapshot.host_name,
                    metric_name,
                    snapshot.value,
                    rule.condition.phrase(),
                    threshold,
                );
                let mut alert = Alert::new(
                    rule.id.clone(),
                    Some(host_id.clone()),
                    Some(snapshot.host_name.clone()),
                    rule.severity,
                    message,
                    Utc::now(),
                );
                alert.metric_name = Some(metric_name.to_string());
                alert.value = Some(snapshot.value);
                alert.threshold = Some(threshold);

                let alert = self.alerts.create_alert(&alert).await?;
                tracing::info!(
                    rule_id = %rule.id,
                    host_id = %host_id,
                    value = snapshot.value,
                    threshold,
                    "Alert triggered"
                );
                created.push(alert);
            }
        }
        Ok(created)
    }

    async fn evaluate_status_change(&self, rule: &AlertRule) -> Result<Vec<Alert>> {
        // Only the offline pattern is supported: eq against 0.
        if !(rule.condition == Condition::Eq && rule.threshold == Some(0.0)) {
            tracing::warn!(
                rule_id = %rule.id,
                condition = %rule.condition,
                "Unsupported status_change pattern; only offline detection (eq 0) is recognized"
            );
            return Ok(Vec::new());
        }

        let mut created = Vec::new();
        for host_id in self.host_scope(rule).await? {
            if self.is_suppressed(rule, &host_id).await? {
                continue;
            }

            let Some(status) = self.statuses.latest_status(&host_id).await? else {
                continue;
            };

            if !status.is_online {
                let alert = Alert::new(
                    rule.id.clone(),
                    Some(host_id.clone()),
                    Some(status.host_name.clone()),
                    rule.severity,
                    format!("{}: Device is offline", status.host_name),
                    Utc::now(),
                );
                let alert = self.alerts.create_alert(&alert).await?;
                tracing::info!(rule_id = %rule.id, host_id = %host_id, "Offline alert triggered");
                created.push(alert);
            }
        }
        Ok(created)
    }

    /// Mute and cooldown gates, applied per host.
    async fn is_suppressed(&self, rule: &AlertRule, host_id: &str) -> Result<bool> {
        if self.mutes.is_muted(&rule.id, Some(host_id)).await? {
            tracing::debug!(rule_id = %rule.id, host_id, "Alert suppressed (muted)");
            return Ok(true);
        }
        if self.in_cooldown(rule, host_id).await? {
            tracing::debug!(rule_id = %rule.id, host_id, "Alert suppressed (cooldown)");
            return Ok(true);
        }
        Ok(false)
    }

    /// Whether the rule's cooldown window still covers this host, based
    /// on the most recent alert for the exact (rule, host) pair within a
    /// bounded scan of the rule's latest alerts.
    async fn in_cooldown(&self, rule: &AlertRule, host_id: &str) -> Result<bool> {
        if rule.cooldown_minutes == 0 {
            return Ok(false);
        }

        let recent = self
            .alerts
            .alerts_for_rule(&rule.id, self.cooldown_scan_limit)
            .await?;
        // Newest first; the first host match is the latest occurrence.
        let Some(last) = recent
            .iter()
            .find(|a| a.host_id.as_deref() == Some(host_id))
        else {
            return Ok(false);
        };

        Ok(Utc::now() < last.triggered_at + Duration::minutes(rule.cooldown_minutes))
    }

    /// Auto-resolves active alerts older than `hours` whose triggering
    /// condition no longer holds. Returns the number resolved. This is
    /// the only transition out of "active" without a human action.
    pub async fn resolve_stale_alerts(&self, hours: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::hours(hours);
        let mut resolved = 0u64;

        for mut alert in self.alerts.active_alerts().await? {
            if alert.triggered_at > cutoff {
                continue;
            }

            // Orphaned alerts (rule deleted) are left for manual handling.
            let Some(rule) = self.rules.get_rule(&alert.alert_rule_id).await? else {
                continue;
            };

            let cleared = match rule.rule_type {
                RuleType::Threshold => self.threshold_cleared(&rule, &alert).await?,
                RuleType::StatusChange => self.host_back_online(&alert).await?,
                RuleType::Custom => false,
            };

            if cleared {
                alert.resolve(Utc::now());
                self.alerts.update_alert(&alert).await?;
                resolved += 1;
                tracing::info!(
                    alert_id = %alert.id,
                    rule_id = %rule.id,
                    "Auto-resolved stale alert"
                );
            }
        }

        Ok(resolved)
    }

    async fn threshold_cleared(&self, rule: &AlertRule, alert: &Alert) -> Result<bool> {
        let (Some(host_id), Some(metric_name), Some(threshold)) = (
            alert.host_id.as_deref(),
            rule.metric_name.as_deref(),
            rule.threshold,
        ) else {
            return Ok(false);
        };

        match self.metrics.latest_metric(host_id, metric_name).await? {
            Some(snapshot) => Ok(!rule.condition.check(snapshot.value, threshold)),
            None => Ok(false),
        }
    }

    async fn host_back_online(&self, alert: &Alert) -> Result<bool> {
        let Some(host_id) = alert.host_id.as_deref() else {
            return Ok(false);
        };
        Ok(self
            .statuses
            .latest_status(host_id)
            .await?
            .map(|s| s.is_online)
            .unwrap_or(false))
    }
}

use crate::config::{AlertingConfig, SeedFile};
use crate::error::AlertError;
use crate::manager::AlertManager;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use fleetmon_common::types::{
    ChannelType, Condition, CreateChannelRequest, CreateRuleRequest, MetricSnapshot, Severity,
    UpdateRuleRequest,
};
use fleetmon_notify::plugin::{ChannelPlugin, NotifierRegistry};
use fleetmon_notify::Notifier;
use fleetmon_store::memory::MemoryStore;
use fleetmon_store::{AlertStore, MetricSource};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

// ── Condition semantics ──

proptest! {
    #[test]
    fn condition_check_matches_operator(value in -1e6f64..1e6, threshold in -1e6f64..1e6) {
        prop_assert_eq!(Condition::Gt.check(value, threshold), value > threshold);
        prop_assert_eq!(Condition::Gte.check(value, threshold), value >= threshold);
        prop_assert_eq!(Condition::Lt.check(value, threshold), value < threshold);
        prop_assert_eq!(Condition::Lte.check(value, threshold), value <= threshold);
        prop_assert_eq!(Condition::Eq.check(value, threshold), value == threshold);
        prop_assert_eq!(Condition::Ne.check(value, threshold), value != threshold);
    }
}

// ── Harness ──

/// Plugin whose notifiers record delivered alert IDs into shared state.
struct RecordingPlugin {
    delivered: Arc<Mutex<Vec<String>>>,
}

struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, alert: &fleetmon_common::types::Alert) -> fleetmon_notify::error::Result<()> {
        self.delivered.lock().unwrap().push(alert.id.clone());
        Ok(())
    }

    fn channel_type(&self) -> &str {
        "webhook"
    }
}

impl ChannelPlugin for RecordingPlugin {
    fn name(&self) -> &str {
        "webhook"
    }

    fn validate_config(&self, config: &Value) -> anyhow::Result<()> {
        if config.get("reject").is_some() {
            anyhow::bail!("config rejected");
        }
        Ok(())
    }

    fn create_notifier(&self, _config: &Value) -> anyhow::Result<Arc<dyn Notifier>> {
        Ok(Arc::new(RecordingNotifier {
            delivered: Arc::clone(&self.delivered),
        }))
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    manager: AlertManager,
    delivered: Arc<Mutex<Vec<String>>>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let delivered = Arc::new(Mutex::new(Vec::new()));

    let mut registry = NotifierRegistry::new();
    registry.register(Box::new(RecordingPlugin {
        delivered: Arc::clone(&delivered),
    }));

    let manager = AlertManager::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(registry),
        AlertingConfig::default(),
    );
    Harness {
        store,
        manager,
        delivered,
    }
}

fn threshold_request(name: &str, host_id: Option<&str>, channels: &[&str]) -> CreateRuleRequest {
    CreateRuleRequest {
        name: name.to_string(),
        description: None,
        rule_type: "threshold".to_string(),
        metric_name: Some("cpu_usage".to_string()),
        host_id: host_id.map(str::to_string),
        condition: "gt".to_string(),
        threshold: Some(80.0),
        severity: "warning".to_string(),
        enabled: true,
        notification_channels: channels.iter().map(|s| s.to_string()).collect(),
        cooldown_minutes: 10,
    }
}

async fn create_webhook_channel(h: &Harness, id: &str, config: Value) {
    h.manager
        .create_channel(CreateChannelRequest {
            id: id.to_string(),
            name: id.to_string(),
            channel_type: "webhook".to_string(),
            config,
            enabled: true,
        })
        .await
        .unwrap();
}

/// Rewrites the triggered_at of every stored alert for a rule, to age
/// alerts without a clock abstraction.
async fn age_alerts(h: &Harness, rule_id: &str, age: Duration) {
    let alerts = h.store.alerts_for_rule(rule_id, 100).await.unwrap();
    for mut alert in alerts {
        alert.triggered_at = Utc::now() - age;
        h.store.update_alert(&alert).await.unwrap();
    }
}

// ── Threshold evaluation ──

#[tokio::test]
async fn threshold_breach_triggers_and_notifies() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;
    h.store.record_metric("h1", "web-01", "cpu_usage", 85.0).await;
    create_webhook_channel(&h, "ch-1", json!({})).await;

    let rule = h
        .manager
        .create_rule(threshold_request("High CPU", Some("h1"), &["ch-1"]))
        .await
        .unwrap();

    let triggered = h.manager.evaluate_rules().await.unwrap();
    assert_eq!(triggered.len(), 1);
    let alert = &triggered[0];
    assert_eq!(alert.alert_rule_id, rule.id);
    assert_eq!(alert.host_id.as_deref(), Some("h1"));
    assert_eq!(alert.severity, Severity::Warning);
    assert!(alert.message.contains("85"), "message: {}", alert.message);
    assert!(alert.message.contains("80"), "message: {}", alert.message);
    assert_eq!(alert.value, Some(85.0));
    assert_eq!(alert.threshold, Some(80.0));

    assert_eq!(h.delivered.lock().unwrap().as_slice(), &[alert.id.clone()]);
    let stored = h.store.get_alert(&alert.id).await.unwrap().unwrap();
    assert_eq!(
        stored.notification_status["ch-1"],
        fleetmon_common::types::DeliveryStatus::Sent
    );
}

#[tokio::test]
async fn threshold_not_breached_stays_quiet() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;
    h.store.record_metric("h1", "web-01", "cpu_usage", 50.0).await;

    h.manager
        .create_rule(threshold_request("High CPU", Some("h1"), &[]))
        .await
        .unwrap();

    assert!(h.manager.evaluate_rules().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_metric_is_skipped_silently() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;

    h.manager
        .create_rule(threshold_request("High CPU", Some("h1"), &[]))
        .await
        .unwrap();

    assert!(h.manager.evaluate_rules().await.unwrap().is_empty());
}

#[tokio::test]
async fn network_wide_rule_covers_all_hosts() {
    let h = harness();
    h.store.record_metric("h1", "web-01", "cpu_usage", 90.0).await;
    h.store.record_metric("h2", "web-02", "cpu_usage", 95.0).await;
    h.store.record_metric("h3", "web-03", "cpu_usage", 10.0).await;
    for (id, name) in [("h1", "web-01"), ("h2", "web-02"), ("h3", "web-03")] {
        h.store.register_host(id, name).await;
    }

    h.manager
        .create_rule(threshold_request("High CPU", None, &[]))
        .await
        .unwrap();

    let triggered = h.manager.evaluate_rules().await.unwrap();
    let mut hosts: Vec<_> = triggered
        .iter()
        .map(|a| a.host_id.clone().unwrap())
        .collect();
    hosts.sort();
    assert_eq!(hosts, vec!["h1", "h2"]);
}

#[tokio::test]
async fn disabled_rule_is_not_evaluated() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;
    h.store.record_metric("h1", "web-01", "cpu_usage", 99.0).await;

    let rule = h
        .manager
        .create_rule(threshold_request("High CPU", Some("h1"), &[]))
        .await
        .unwrap();
    h.manager.disable_rule(&rule.id).await.unwrap();

    assert!(h.manager.evaluate_rules().await.unwrap().is_empty());
}

// ── Cooldown ──

#[tokio::test]
async fn cooldown_suppresses_within_window() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;
    h.store.record_metric("h1", "web-01", "cpu_usage", 85.0).await;

    let mut req = threshold_request("High CPU", Some("h1"), &[]);
    req.cooldown_minutes = 5;
    let rule = h.manager.create_rule(req).await.unwrap();

    assert_eq!(h.manager.evaluate_rules().await.unwrap().len(), 1);

    // Fresh trigger, then a trigger 2 minutes old: both inside the window.
    assert!(h.manager.evaluate_rules().await.unwrap().is_empty());
    age_alerts(&h, &rule.id, Duration::minutes(2)).await;
    assert!(h.manager.evaluate_rules().await.unwrap().is_empty());

    // 10 minutes old: window elapsed, fires again.
    age_alerts(&h, &rule.id, Duration::minutes(10)).await;
    assert_eq!(h.manager.evaluate_rules().await.unwrap().len(), 1);
}

#[tokio::test]
async fn cooldown_is_per_host() {
    let h = harness();
    h.store.record_metric("h1", "web-01", "cpu_usage", 85.0).await;
    h.store.register_host("h1", "web-01").await;
    h.store.register_host("h2", "web-02").await;

    h.manager
        .create_rule(threshold_request("High CPU", None, &[]))
        .await
        .unwrap();

    // Only h1 breaches; its alert starts the cooldown for h1 alone.
    assert_eq!(h.manager.evaluate_rules().await.unwrap().len(), 1);

    h.store.record_metric("h2", "web-02", "cpu_usage", 90.0).await;
    let triggered = h.manager.evaluate_rules().await.unwrap();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].host_id.as_deref(), Some("h2"));
}

#[tokio::test]
async fn zero_cooldown_fires_every_cycle() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;
    h.store.record_metric("h1", "web-01", "cpu_usage", 85.0).await;

    let mut req = threshold_request("High CPU", Some("h1"), &[]);
    req.cooldown_minutes = 0;
    h.manager.create_rule(req).await.unwrap();

    assert_eq!(h.manager.evaluate_rules().await.unwrap().len(), 1);
    assert_eq!(h.manager.evaluate_rules().await.unwrap().len(), 1);
}

// ── Mutes ──

#[tokio::test]
async fn host_scoped_mute_suppresses_only_that_host() {
    let h = harness();
    for (id, name) in [("h1", "web-01"), ("h2", "web-02")] {
        h.store.register_host(id, name).await;
        h.store.record_metric(id, name, "cpu_usage", 90.0).await;
    }

    let rule = h
        .manager
        .create_rule(threshold_request("High CPU", None, &[]))
        .await
        .unwrap();
    h.manager
        .mute_rule(&rule.id, Some("h1".to_string()), None, "ops", None)
        .await
        .unwrap();

    let triggered = h.manager.evaluate_rules().await.unwrap();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].host_id.as_deref(), Some("h2"));
}

#[tokio::test]
async fn rule_wide_mute_suppresses_all_hosts() {
    let h = harness();
    for (id, name) in [("h1", "web-01"), ("h2", "web-02")] {
        h.store.register_host(id, name).await;
        h.store.record_metric(id, name, "cpu_usage", 90.0).await;
    }

    let rule = h
        .manager
        .create_rule(threshold_request("High CPU", None, &[]))
        .await
        .unwrap();
    h.manager
        .mute_rule(&rule.id, None, Some(60), "ops", Some("maintenance".to_string()))
        .await
        .unwrap();

    assert!(h.manager.evaluate_rules().await.unwrap().is_empty());
    assert_eq!(h.manager.list_active_mutes().await.unwrap().len(), 1);

    h.manager.unmute_rule(&rule.id, None).await.unwrap();
    assert_eq!(h.manager.evaluate_rules().await.unwrap().len(), 2);
}

#[tokio::test]
async fn expired_mute_does_not_suppress() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;
    h.store.record_metric("h1", "web-01", "cpu_usage", 90.0).await;

    let rule = h
        .manager
        .create_rule(threshold_request("High CPU", Some("h1"), &[]))
        .await
        .unwrap();
    // Negative duration puts the expiry in the past.
    h.manager
        .mute_rule(&rule.id, Some("h1".to_string()), Some(-1), "ops", None)
        .await
        .unwrap();

    assert_eq!(h.manager.evaluate_rules().await.unwrap().len(), 1);
}

#[tokio::test]
async fn muting_unknown_rule_is_rejected() {
    let h = harness();
    let err = h
        .manager
        .mute_rule("ghost", None, None, "ops", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AlertError::NotFound { .. }));
}

// ── Status change rules ──

fn offline_request(name: &str, host_id: Option<&str>) -> CreateRuleRequest {
    CreateRuleRequest {
        name: name.to_string(),
        description: None,
        rule_type: "status_change".to_string(),
        metric_name: None,
        host_id: host_id.map(str::to_string),
        condition: "eq".to_string(),
        threshold: Some(0.0),
        severity: "critical".to_string(),
        enabled: true,
        notification_channels: Vec::new(),
        cooldown_minutes: 10,
    }
}

#[tokio::test]
async fn offline_host_triggers_status_alert() {
    let h = harness();
    h.store.record_status("h1", "core-sw", false).await;
    h.store.record_status("h2", "edge-sw", true).await;

    h.manager
        .create_rule(offline_request("Device offline", None))
        .await
        .unwrap();

    let triggered = h.manager.evaluate_rules().await.unwrap();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].host_id.as_deref(), Some("h1"));
    assert_eq!(triggered[0].severity, Severity::Critical);
    assert!(triggered[0].message.contains("Device is offline"));
}

#[tokio::test]
async fn unsupported_status_pattern_is_ignored() {
    let h = harness();
    h.store.record_status("h1", "core-sw", false).await;

    let mut req = offline_request("Weird pattern", Some("h1"));
    req.condition = "gt".to_string();
    req.threshold = Some(5.0);
    h.manager.create_rule(req).await.unwrap();

    assert!(h.manager.evaluate_rules().await.unwrap().is_empty());
}

#[tokio::test]
async fn custom_rules_produce_no_alerts() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;

    h.manager
        .create_rule(CreateRuleRequest {
            name: "Custom hook".to_string(),
            description: None,
            rule_type: "custom".to_string(),
            metric_name: None,
            host_id: None,
            condition: "gt".to_string(),
            threshold: None,
            severity: "info".to_string(),
            enabled: true,
            notification_channels: Vec::new(),
            cooldown_minutes: 0,
        })
        .await
        .unwrap();

    assert!(h.manager.evaluate_rules().await.unwrap().is_empty());
}

// ── Per-rule failure isolation ──

/// Metric source that fails every lookup.
struct FailingMetrics;

#[async_trait]
impl MetricSource for FailingMetrics {
    async fn latest_metric(
        &self,
        _host_id: &str,
        _metric_name: &str,
    ) -> anyhow::Result<Option<MetricSnapshot>> {
        anyhow::bail!("metric backend down")
    }
}

#[tokio::test]
async fn one_failing_rule_does_not_abort_the_batch() {
    let store = Arc::new(MemoryStore::new());
    let manager = AlertManager::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(FailingMetrics),
        store.clone(),
        Arc::new(NotifierRegistry::new()),
        AlertingConfig::default(),
    );

    store.record_status("h1", "core-sw", false).await;
    manager
        .create_rule(threshold_request("High CPU", Some("h1"), &[]))
        .await
        .unwrap();
    manager
        .create_rule(offline_request("Device offline", Some("h1")))
        .await
        .unwrap();

    // The threshold rule hits the broken backend; the offline rule still fires.
    let triggered = manager.evaluate_rules().await.unwrap();
    assert_eq!(triggered.len(), 1);
    assert!(triggered[0].message.contains("Device is offline"));
}

// ── Stale alert resolution ──

#[tokio::test]
async fn stale_threshold_alert_resolves_when_condition_clears() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;
    h.store.record_metric("h1", "web-01", "cpu_usage", 85.0).await;

    let rule = h
        .manager
        .create_rule(threshold_request("High CPU", Some("h1"), &[]))
        .await
        .unwrap();
    h.manager.evaluate_rules().await.unwrap();
    age_alerts(&h, &rule.id, Duration::hours(30)).await;

    // Condition still holds: nothing resolves.
    assert_eq!(h.manager.resolve_stale_alerts().await.unwrap(), 0);

    h.store.record_metric("h1", "web-01", "cpu_usage", 40.0).await;
    assert_eq!(h.manager.resolve_stale_alerts().await.unwrap(), 1);
    assert!(h.manager.list_active_alerts().await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_offline_alert_resolves_when_host_returns() {
    let h = harness();
    h.store.record_status("h1", "core-sw", false).await;

    let rule = h
        .manager
        .create_rule(offline_request("Device offline", Some("h1")))
        .await
        .unwrap();
    h.manager.evaluate_rules().await.unwrap();
    age_alerts(&h, &rule.id, Duration::hours(30)).await;

    assert_eq!(h.manager.resolve_stale_alerts().await.unwrap(), 0);

    h.store.record_status("h1", "core-sw", true).await;
    assert_eq!(h.manager.resolve_stale_alerts().await.unwrap(), 1);
}

#[tokio::test]
async fn fresh_alerts_are_not_auto_resolved() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;
    h.store.record_metric("h1", "web-01", "cpu_usage", 85.0).await;

    h.manager
        .create_rule(threshold_request("High CPU", Some("h1"), &[]))
        .await
        .unwrap();
    h.manager.evaluate_rules().await.unwrap();

    // Condition cleared, but the alert is younger than the staleness age.
    h.store.record_metric("h1", "web-01", "cpu_usage", 40.0).await;
    assert_eq!(h.manager.resolve_stale_alerts().await.unwrap(), 0);
    assert_eq!(h.manager.list_active_alerts().await.unwrap().len(), 1);
}

// ── Alert lifecycle ──

#[tokio::test]
async fn acknowledge_and_resolve_lifecycle() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;
    h.store.record_metric("h1", "web-01", "cpu_usage", 85.0).await;
    h.manager
        .create_rule(threshold_request("High CPU", Some("h1"), &[]))
        .await
        .unwrap();
    let alert_id = h.manager.evaluate_rules().await.unwrap()[0].id.clone();

    let acked = h.manager.acknowledge_alert(&alert_id, "alice").await.unwrap();
    assert_eq!(acked.acknowledged_by.as_deref(), Some("alice"));

    // Re-acknowledging overwrites the acknowledger.
    let acked = h.manager.acknowledge_alert(&alert_id, "bob").await.unwrap();
    assert_eq!(acked.acknowledged_by.as_deref(), Some("bob"));

    let resolved = h.manager.resolve_alert(&alert_id).await.unwrap();
    assert!(resolved.resolved_at.is_some());

    // Resolving again is a no-op; acknowledging after resolution errors.
    let again = h.manager.resolve_alert(&alert_id).await.unwrap();
    assert_eq!(again.resolved_at, resolved.resolved_at);
    let err = h
        .manager
        .acknowledge_alert(&alert_id, "carol")
        .await
        .unwrap_err();
    assert!(matches!(err, AlertError::Validation(_)));
}

#[tokio::test]
async fn statistics_count_by_state_severity_and_rule() {
    let h = harness();
    for (id, name) in [("h1", "web-01"), ("h2", "web-02")] {
        h.store.register_host(id, name).await;
        h.store.record_metric(id, name, "cpu_usage", 90.0).await;
    }
    h.store.record_status("h3", "core-sw", false).await;

    let cpu_rule = h
        .manager
        .create_rule(threshold_request("High CPU", None, &[]))
        .await
        .unwrap();
    h.manager
        .create_rule(offline_request("Device offline", Some("h3")))
        .await
        .unwrap();

    let triggered = h.manager.evaluate_rules().await.unwrap();
    assert_eq!(triggered.len(), 3);

    let cpu_alert = triggered
        .iter()
        .find(|a| a.host_id.as_deref() == Some("h1"))
        .unwrap();
    h.manager.acknowledge_alert(&cpu_alert.id, "ops").await.unwrap();
    let other = triggered
        .iter()
        .find(|a| a.host_id.as_deref() == Some("h2"))
        .unwrap();
    h.manager.resolve_alert(&other.id).await.unwrap();

    let stats = h.manager.get_alert_statistics(24).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.acknowledged, 1);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.by_severity["warning"], 2);
    assert_eq!(stats.by_severity["critical"], 1);
    assert_eq!(stats.by_rule[&cpu_rule.id], 2);
}

// ── Rule management ──

#[tokio::test]
async fn create_rule_normalizes_shorthand() {
    let h = harness();
    let mut req = threshold_request("High CPU", None, &[]);
    req.condition = ">".to_string();
    let rule = h.manager.create_rule(req).await.unwrap();
    assert_eq!(rule.condition, Condition::Gt);
}

#[tokio::test]
async fn create_rule_rejects_bad_input() {
    let h = harness();

    let mut missing_metric = threshold_request("High CPU", None, &[]);
    missing_metric.metric_name = None;
    assert!(matches!(
        h.manager.create_rule(missing_metric).await.unwrap_err(),
        AlertError::Validation(_)
    ));

    let mut bad_severity = threshold_request("High CPU", None, &[]);
    bad_severity.severity = "panic".to_string();
    assert!(matches!(
        h.manager.create_rule(bad_severity).await.unwrap_err(),
        AlertError::Validation(_)
    ));

    let mut bad_condition = threshold_request("High CPU", None, &[]);
    bad_condition.condition = "~".to_string();
    assert!(matches!(
        h.manager.create_rule(bad_condition).await.unwrap_err(),
        AlertError::Validation(_)
    ));

    let empty_name = threshold_request("  ", None, &[]);
    assert!(matches!(
        h.manager.create_rule(empty_name).await.unwrap_err(),
        AlertError::Validation(_)
    ));
}

#[tokio::test]
async fn update_rule_applies_partial_changes() {
    let h = harness();
    let rule = h
        .manager
        .create_rule(threshold_request("High CPU", None, &[]))
        .await
        .unwrap();

    let updated = h
        .manager
        .update_rule(
            &rule.id,
            UpdateRuleRequest {
                threshold: Some(95.0),
                severity: Some("critical".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.threshold, Some(95.0));
    assert_eq!(updated.severity, Severity::Critical);
    assert_eq!(updated.name, "High CPU");

    let err = h
        .manager
        .update_rule("ghost", UpdateRuleRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AlertError::NotFound { .. }));
}

#[tokio::test]
async fn delete_rule_not_found() {
    let h = harness();
    let rule = h
        .manager
        .create_rule(threshold_request("High CPU", None, &[]))
        .await
        .unwrap();
    h.manager.delete_rule(&rule.id).await.unwrap();
    assert!(matches!(
        h.manager.delete_rule(&rule.id).await.unwrap_err(),
        AlertError::NotFound { .. }
    ));
}

// ── Channel management ──

#[tokio::test]
async fn create_channel_validates_against_plugin() {
    let h = harness();

    create_webhook_channel(&h, "ok", json!({"webhook_url": "https://example.com"})).await;

    let err = h
        .manager
        .create_channel(CreateChannelRequest {
            id: "bad".to_string(),
            name: "bad".to_string(),
            channel_type: "webhook".to_string(),
            config: json!({"reject": true}),
            enabled: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AlertError::Validation(_)));

    let err = h
        .manager
        .create_channel(CreateChannelRequest {
            id: "arr".to_string(),
            name: "arr".to_string(),
            channel_type: "webhook".to_string(),
            config: json!([1, 2]),
            enabled: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AlertError::Validation(_)));

    let err = h
        .manager
        .create_channel(CreateChannelRequest {
            id: "x".to_string(),
            name: "x".to_string(),
            channel_type: "carrier-pigeon".to_string(),
            config: json!({}),
            enabled: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AlertError::Validation(_)));
}

#[tokio::test]
async fn sms_channel_is_creatable_without_plugin() {
    let h = harness();
    let channel = h
        .manager
        .create_channel(CreateChannelRequest {
            id: "pager".to_string(),
            name: "On-call pager".to_string(),
            channel_type: "sms".to_string(),
            config: json!({"number": "+15551234"}),
            enabled: true,
        })
        .await
        .unwrap();
    assert_eq!(channel.channel_type, ChannelType::Sms);
}

#[tokio::test]
async fn disabled_channel_is_skipped_at_delivery() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;
    h.store.record_metric("h1", "web-01", "cpu_usage", 85.0).await;
    create_webhook_channel(&h, "ch-1", json!({})).await;
    h.manager.disable_channel("ch-1").await.unwrap();

    h.manager
        .create_rule(threshold_request("High CPU", Some("h1"), &["ch-1"]))
        .await
        .unwrap();

    let triggered = h.manager.evaluate_rules().await.unwrap();
    assert_eq!(triggered.len(), 1);
    assert!(h.delivered.lock().unwrap().is_empty());

    h.manager.enable_channel("ch-1").await.unwrap();
    let channel = h.manager.get_channel("ch-1").await.unwrap();
    assert!(channel.enabled);
}

#[tokio::test]
async fn min_severity_channel_filter_applies_end_to_end() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;
    h.store.record_metric("h1", "web-01", "cpu_usage", 85.0).await;
    create_webhook_channel(&h, "ch-critical", json!({"min_severity": "critical"})).await;

    // Warning alert, critical-only channel: triggered but not delivered.
    h.manager
        .create_rule(threshold_request("High CPU", Some("h1"), &["ch-critical"]))
        .await
        .unwrap();
    let triggered = h.manager.evaluate_rules().await.unwrap();
    assert_eq!(triggered.len(), 1);
    assert!(h.delivered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn high_cpu_end_to_end() {
    let h = harness();
    h.store.register_host("h1", "web-01").await;
    h.store.record_metric("h1", "web-01", "cpu_usage", 85.0).await;
    create_webhook_channel(&h, "ops", json!({})).await;

    let mut req = threshold_request("High CPU", Some("h1"), &["ops"]);
    req.cooldown_minutes = 5;
    let rule = h.manager.create_rule(req).await.unwrap();

    // Breach fires once and is delivered.
    let triggered = h.manager.evaluate_rules().await.unwrap();
    assert_eq!(triggered.len(), 1);
    assert!(triggered[0].message.contains("85"));
    assert!(triggered[0].message.contains("80"));
    assert_eq!(h.delivered.lock().unwrap().len(), 1);

    // Still breaching two minutes later: cooldown holds.
    age_alerts(&h, &rule.id, Duration::minutes(2)).await;
    h.store.record_metric("h1", "web-01", "cpu_usage", 90.0).await;
    assert!(h.manager.evaluate_rules().await.unwrap().is_empty());

    // Load drops; immediate stale scan resolves the alert.
    h.store.record_metric("h1", "web-01", "cpu_usage", 60.0).await;
    assert_eq!(h.manager.engine().resolve_stale_alerts(0).await.unwrap(), 1);
    assert!(h.manager.list_active_alerts().await.unwrap().is_empty());
}

// ── Seeding ──

#[tokio::test]
async fn seed_import_is_idempotent() {
    let h = harness();
    let seed: SeedFile = toml::from_str(
        r#"
        [[rules]]
        name = "High CPU"
        rule_type = "threshold"
        metric_name = "cpu_usage"
        condition = "gt"
        threshold = 80.0

        [[channels]]
        id = "ops-webhook"
        name = "Ops webhook"
        channel_type = "webhook"

        [channels.config]
        webhook_url = "https://hooks.example.com/x"
        "#,
    )
    .unwrap();

    assert_eq!(h.manager.import_seed(&seed).await.unwrap(), (1, 1));
    assert_eq!(h.manager.import_seed(&seed).await.unwrap(), (0, 0));

    let rules = h.manager.list_rules(false).await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].severity, Severity::Warning);
    assert_eq!(rules[0].cooldown_minutes, 10);
}

use crate::error::{NotifyError, Result};
use crate::plugin::ChannelPlugin;
use crate::utils::{truncate_string, MAX_BODY_LENGTH};
use crate::Notifier;
use async_trait::async_trait;
use fleetmon_common::types::{Alert, Severity};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Payload shape posted to the webhook URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Slack,
    Discord,
    Generic,
}

impl Default for Platform {
    fn default() -> Self {
        Self::Generic
    }
}

impl Platform {
    fn service(&self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Discord => "discord",
            Self::Generic => "webhook",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct WebhookConfig {
    webhook_url: String,
    #[serde(default)]
    platform: Platform,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_verify_ssl")]
    verify_ssl: bool,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_verify_ssl() -> bool {
    true
}

/// Hex color used in Slack attachments, keyed by severity.
pub fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "#2196F3",
        Severity::Warning => "#FF9800",
        Severity::Critical => "#F44336",
    }
}

/// Integer color used in Discord embeds, same palette as [`severity_color`].
pub fn severity_color_int(severity: Severity) -> u32 {
    match severity {
        Severity::Info => 0x2196F3,
        Severity::Warning => 0xFF9800,
        Severity::Critical => 0xF44336,
    }
}

/// Slack `attachments` payload. Optional alert fields are included only
/// when present.
pub fn slack_payload(alert: &Alert) -> Value {
    let mut fields = vec![
        json!({"title": "Severity", "value": alert.severity.to_string(), "short": true}),
        json!({"title": "Triggered", "value": alert.triggered_at.to_rfc3339(), "short": true}),
    ];
    if let Some(host) = &alert.host_name {
        fields.push(json!({"title": "Host", "value": host, "short": true}));
    }
    if let Some(metric) = &alert.metric_name {
        fields.push(json!({"title": "Metric", "value": metric, "short": true}));
    }
    if let Some(value) = alert.value {
        fields.push(json!({"title": "Value", "value": format!("{value:.2}"), "short": true}));
    }
    if let Some(threshold) = alert.threshold {
        fields.push(json!({"title": "Threshold", "value": format!("{threshold:.2}"), "short": true}));
    }

    json!({
        "attachments": [{
            "color": severity_color(alert.severity),
            "title": format!("Fleetmon alert ({})", alert.severity),
            "text": alert.message,
            "fields": fields,
        }]
    })
}

/// Discord `embeds` payload carrying the same data as the Slack fields.
pub fn discord_payload(alert: &Alert) -> Value {
    let mut fields = vec![
        json!({"name": "Severity", "value": alert.severity.to_string(), "inline": true}),
        json!({"name": "Triggered", "value": alert.triggered_at.to_rfc3339(), "inline": true}),
    ];
    if let Some(host) = &alert.host_name {
        fields.push(json!({"name": "Host", "value": host, "inline": true}));
    }
    if let Some(metric) = &alert.metric_name {
        fields.push(json!({"name": "Metric", "value": metric, "inline": true}));
    }
    if let Some(value) = alert.value {
        fields.push(json!({"name": "Value", "value": format!("{value:.2}"), "inline": true}));
    }
    if let Some(threshold) = alert.threshold {
        fields.push(json!({"name": "Threshold", "value": format!("{threshold:.2}"), "inline": true}));
    }

    json!({
        "embeds": [{
            "title": format!("Fleetmon alert ({})", alert.severity),
            "description": alert.message,
            "color": severity_color_int(alert.severity),
            "timestamp": alert.triggered_at.to_rfc3339(),
            "fields": fields,
        }]
    })
}

/// Flat JSON object for generic HTTP consumers, with a derived lifecycle
/// `status` of `resolved`/`acknowledged`/`active`.
pub fn generic_payload(alert: &Alert) -> Value {
    json!({
        "alert_id": alert.id,
        "rule_id": alert.alert_rule_id,
        "host_id": alert.host_id,
        "host_name": alert.host_name,
        "metric": alert.metric_name,
        "value": alert.value,
        "threshold": alert.threshold,
        "severity": alert.severity.to_string(),
        "message": alert.message,
        "triggered_at": alert.triggered_at.to_rfc3339(),
        "status": alert.status_label(),
    })
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    platform: Platform,
}

impl WebhookNotifier {
    fn from_config(cfg: &WebhookConfig) -> Result<Self> {
        if cfg.webhook_url.trim().is_empty() {
            return Err(NotifyError::InvalidConfig(
                "webhook config requires webhook_url".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .danger_accept_invalid_certs(!cfg.verify_ssl)
            .build()?;
        Ok(Self {
            client,
            url: cfg.webhook_url.clone(),
            platform: cfg.platform,
        })
    }

    fn payload(&self, alert: &Alert) -> Value {
        match self.platform {
            Platform::Slack => slack_payload(alert),
            Platform::Discord => discord_payload(alert),
            Platform::Generic => generic_payload(alert),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let payload = self.payload(alert);
        let response = self.client.post(&self.url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::ApiError {
                service: self.platform.service(),
                status: status.as_u16(),
                body: truncate_string(&body, MAX_BODY_LENGTH),
            });
        }
        Ok(())
    }

    fn channel_type(&self) -> &str {
        self.platform.service()
    }
}

/// Plugin serving one webhook flavor. Registered three times (slack,
/// discord, webhook), each pinning the payload platform; a generic
/// webhook channel may still select a platform through its config.
pub struct WebhookPlugin {
    name: &'static str,
    platform: Option<Platform>,
}

impl WebhookPlugin {
    pub fn slack() -> Self {
        Self {
            name: "slack",
            platform: Some(Platform::Slack),
        }
    }

    pub fn discord() -> Self {
        Self {
            name: "discord",
            platform: Some(Platform::Discord),
        }
    }

    pub fn generic() -> Self {
        Self {
            name: "webhook",
            platform: None,
        }
    }

    fn parse(&self, config: &Value) -> anyhow::Result<WebhookConfig> {
        let mut cfg: WebhookConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("Invalid webhook config: {e}"))?;
        if let Some(platform) = self.platform {
            cfg.platform = platform;
        }
        if cfg.webhook_url.trim().is_empty() {
            anyhow::bail!("Invalid webhook config: webhook_url must not be empty");
        }
        Ok(cfg)
    }
}

impl ChannelPlugin for WebhookPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn validate_config(&self, config: &Value) -> anyhow::Result<()> {
        self.parse(config)?;
        Ok(())
    }

    fn create_notifier(&self, config: &Value) -> anyhow::Result<Arc<dyn Notifier>> {
        let cfg = self.parse(config)?;
        Ok(Arc::new(WebhookNotifier::from_config(&cfg)?))
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use fleetmon_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Comparison operator for threshold rules.
///
/// Parsing accepts both the canonical names and the symbolic shorthand
/// used by management clients.
///
/// # Examples
///
/// ```
/// use fleetmon_common::types::Condition;
///
/// let cond: Condition = ">".parse().unwrap();
/// assert_eq!(cond, Condition::Gt);
/// assert!(cond.check(85.0, 80.0));
/// assert!(!cond.check(80.0, 80.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
}

impl std::str::FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gt" | ">" => Ok(Self::Gt),
            "gte" | ">=" => Ok(Self::Gte),
            "lt" | "<" => Ok(Self::Lt),
            "lte" | "<=" => Ok(Self::Lte),
            "eq" | "=" | "==" => Ok(Self::Eq),
            "ne" | "!=" => Ok(Self::Ne),
            _ => Err(format!("unknown condition: {s}")),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gt => write!(f, "gt"),
            Self::Gte => write!(f, "gte"),
            Self::Lt => write!(f, "lt"),
            Self::Lte => write!(f, "lte"),
            Self::Eq => write!(f, "eq"),
            Self::Ne => write!(f, "ne"),
        }
    }
}

impl Condition {
    /// Evaluates `value` against `threshold` under this operator.
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Gte => value >= threshold,
            Self::Lt => value < threshold,
            Self::Lte => value <= threshold,
            Self::Eq => value == threshold,
            Self::Ne => value != threshold,
        }
    }

    /// Human phrasing used in alert messages.
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::Gt => "above",
            Self::Gte => "at or above",
            Self::Lt => "below",
            Self::Lte => "at or below",
            Self::Eq => "equal to",
            Self::Ne => "not equal to",
        }
    }
}

/// Kind of condition an alert rule evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Threshold,
    StatusChange,
    Custom,
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Threshold => write!(f, "threshold"),
            Self::StatusChange => write!(f, "status_change"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "threshold" => Ok(Self::Threshold),
            "status_change" => Ok(Self::StatusChange),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("unknown rule type: {s}")),
        }
    }
}

/// Kind of external destination a notification channel delivers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Email,
    Slack,
    Discord,
    Webhook,
    Sms,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Slack => "slack",
            Self::Discord => "discord",
            Self::Webhook => "webhook",
            Self::Sms => "sms",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "slack" => Ok(Self::Slack),
            "discord" => Ok(Self::Discord),
            "webhook" => Ok(Self::Webhook),
            "sms" => Ok(Self::Sms),
            _ => Err(format!("unknown channel type: {s}")),
        }
    }
}

/// Per-channel delivery outcome recorded on an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// A monitoring condition evaluated by the alert engine.
///
/// `host_id = None` makes the rule network-wide: it applies to every
/// known host. Threshold rules must carry both `metric_name` and
/// `threshold`; [`AlertRule::validate`] rejects them otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub rule_type: RuleType,
    pub metric_name: Option<String>,
    pub host_id: Option<String>,
    pub condition: Condition,
    pub threshold: Option<f64>,
    pub severity: Severity,
    pub enabled: bool,
    /// Channel IDs this rule's alerts are delivered to, in order.
    pub notification_channels: Vec<String>,
    /// Minimum minutes between two alerts for the same (rule, host) pair.
    /// Zero disables cooldown.
    pub cooldown_minutes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertRule {
    /// Checks the construction invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("rule name must not be empty".to_string());
        }
        if self.cooldown_minutes < 0 {
            return Err("cooldown_minutes must be >= 0".to_string());
        }
        if self.rule_type == RuleType::Threshold {
            if self.metric_name.as_deref().unwrap_or("").is_empty() {
                return Err("threshold rules require metric_name".to_string());
            }
            if self.threshold.is_none() {
                return Err("threshold rules require a threshold value".to_string());
            }
        }
        Ok(())
    }
}

/// One triggered occurrence of an alert rule.
///
/// # Examples
///
/// ```
/// use fleetmon_common::types::{Alert, Severity};
/// use chrono::Utc;
///
/// let mut alert = Alert::new(
///     "rule-1".into(),
///     Some("host-1".into()),
///     Some("web-01".into()),
///     Severity::Warning,
///     "web-01: cpu_usage is 85.0".into(),
///     Utc::now(),
/// );
/// assert!(alert.is_active());
/// assert!(!alert.is_acknowledged());
/// alert.resolve(Utc::now());
/// assert!(!alert.is_active());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub alert_rule_id: String,
    pub host_id: Option<String>,
    pub host_name: Option<String>,
    pub metric_name: Option<String>,
    /// Metric value snapshot at trigger time.
    pub value: Option<f64>,
    /// Rule threshold snapshot at trigger time.
    pub threshold: Option<f64>,
    pub severity: Severity,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// channel_id -> delivery outcome, recorded after fan-out.
    pub notification_status: HashMap<String, DeliveryStatus>,
}

impl Alert {
    pub fn new(
        alert_rule_id: String,
        host_id: Option<String>,
        host_name: Option<String>,
        severity: Severity,
        message: String,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: crate::id::next_id(),
            alert_rule_id,
            host_id,
            host_name,
            metric_name: None,
            value: None,
            threshold: None,
            severity,
            message,
            triggered_at,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            notification_status: HashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged_at.is_some()
    }

    /// Acknowledging twice is allowed and overwrites the acknowledger
    /// and timestamp.
    pub fn acknowledge(&mut self, by: &str, now: DateTime<Utc>) {
        self.acknowledged_at = Some(now);
        self.acknowledged_by = Some(by.to_string());
    }

    pub fn resolve(&mut self, now: DateTime<Utc>) {
        self.resolved_at = Some(now);
    }

    /// Derived lifecycle label used in generic webhook payloads.
    pub fn status_label(&self) -> &'static str {
        if self.resolved_at.is_some() {
            "resolved"
        } else if self.acknowledged_at.is_some() {
            "acknowledged"
        } else {
            "active"
        }
    }
}

/// Temporary suppression of a rule, optionally scoped to one host.
///
/// # Examples
///
/// ```
/// use fleetmon_common::types::AlertMute;
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let mute = AlertMute {
///     id: "m1".into(),
///     alert_rule_id: "rule-1".into(),
///     host_id: None,
///     muted_by: "ops".into(),
///     muted_at: now,
///     expires_at: Some(now - Duration::minutes(1)),
///     reason: None,
/// };
/// assert!(!mute.is_active(now));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMute {
    pub id: String,
    pub alert_rule_id: String,
    /// `None` mutes the rule for all hosts.
    pub host_id: Option<String>,
    pub muted_by: String,
    pub muted_at: DateTime<Utc>,
    /// `None` means the mute never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl AlertMute {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now < expires,
            None => true,
        }
    }

    /// Whether this mute covers the given host (rule-wide mutes cover all).
    pub fn covers_host(&self, host_id: Option<&str>) -> bool {
        match (self.host_id.as_deref(), host_id) {
            (None, _) => true,
            (Some(muted), Some(host)) => muted == host,
            (Some(_), None) => false,
        }
    }
}

/// A configured external delivery target.
///
/// `config` is an opaque JSON object interpreted by the plugin matching
/// `channel_type`; it is validated against the plugin's typed schema when
/// the channel is created. It may carry a `min_severity` key filtering
/// which alerts this channel receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub channel_type: ChannelType,
    pub config: serde_json::Value,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationChannel {
    /// Minimum severity this channel accepts; defaults to `info` when the
    /// config key is absent or unparseable.
    pub fn min_severity(&self) -> Severity {
        self.config
            .get("min_severity")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(Severity::Info)
    }
}

/// Latest metric reading for a (host, metric) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub value: f64,
    pub host_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Latest reachability status for a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub is_online: bool,
    pub host_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Alert counts over a recent window, grouped by severity and rule.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertStatistics {
    pub total: u64,
    pub active: u64,
    pub acknowledged: u64,
    pub resolved: u64,
    pub by_severity: HashMap<String, u64>,
    pub by_rule: HashMap<String, u64>,
}

/// Create-rule request accepted by the management facade.
///
/// `condition` and `severity` arrive as strings so clients may use the
/// symbolic shorthand (`>`, `<=`, `!=`, ...); the facade normalizes them
/// before constructing an [`AlertRule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rule_type: String,
    #[serde(default)]
    pub metric_name: Option<String>,
    #[serde(default)]
    pub host_id: Option<String>,
    pub condition: String,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub notification_channels: Vec<String>,
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,
}

/// Partial rule update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRuleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub metric_name: Option<String>,
    pub host_id: Option<String>,
    pub condition: Option<String>,
    pub threshold: Option<f64>,
    pub severity: Option<String>,
    pub enabled: Option<bool>,
    pub notification_channels: Option<Vec<String>>,
    pub cooldown_minutes: Option<i64>,
}

/// Create-channel request accepted by the management facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChannelRequest {
    /// Caller-chosen channel ID.
    pub id: String,
    pub name: String,
    pub channel_type: String,
    pub config: serde_json::Value,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_severity() -> String {
    "warning".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_cooldown_minutes() -> i64 {
    10
}

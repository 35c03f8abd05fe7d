use serde::{Deserialize, Serialize};

/// Tunables for the alerting core. Loaded from TOML; every field has a
/// default so an empty file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    /// Concurrent notification delivery workers per alert.
    #[serde(default = "default_notify_concurrency")]
    pub notify_concurrency: usize,
    /// Timeout budget for one channel delivery, in seconds.
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,
    /// Age after which active alerts are eligible for auto-resolution.
    #[serde(default = "default_stale_alert_hours")]
    pub stale_alert_hours: i64,
    /// How many of a rule's most recent alerts the cooldown check scans.
    #[serde(default = "default_cooldown_scan_limit")]
    pub cooldown_scan_limit: usize,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            notify_concurrency: default_notify_concurrency(),
            notify_timeout_secs: default_notify_timeout_secs(),
            stale_alert_hours: default_stale_alert_hours(),
            cooldown_scan_limit: default_cooldown_scan_limit(),
        }
    }
}

fn default_notify_concurrency() -> usize {
    5
}

fn default_notify_timeout_secs() -> u64 {
    30
}

fn default_stale_alert_hours() -> i64 {
    24
}

fn default_cooldown_scan_limit() -> usize {
    100
}

impl AlertingConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

// ---- Seed file types (initial rules/channels import) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub rules: Vec<SeedRule>,
    #[serde(default)]
    pub channels: Vec<SeedChannel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRule {
    pub name: String,
    pub rule_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metric_name: Option<String>,
    #[serde(default)]
    pub host_id: Option<String>,
    pub condition: String,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default = "default_seed_severity")]
    pub severity: String,
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub notification_channels: Vec<String>,
    #[serde(default = "default_seed_cooldown_minutes")]
    pub cooldown_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedChannel {
    pub id: String,
    pub name: String,
    pub channel_type: String,
    pub config: serde_json::Value,
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
}

fn default_seed_severity() -> String {
    "warning".to_string()
}

fn default_seed_enabled() -> bool {
    true
}

fn default_seed_cooldown_minutes() -> i64 {
    10
}

impl SeedFile {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let seed: Self = toml::from_str(&content)?;
        Ok(seed)
    }
}

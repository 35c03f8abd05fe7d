use crate::Notifier;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Factory for creating [`Notifier`] instances from JSON configuration.
///
/// Each plugin is registered in the [`NotifierRegistry`] by its `name()`,
/// which matches a channel type. Config validation happens once, when the
/// channel is created through the management facade; delivery then builds
/// a notifier from the already-validated config.
pub trait ChannelPlugin: Send + Sync {
    /// Returns the channel type this plugin serves (e.g. `"email"`,
    /// `"slack"`).
    fn name(&self) -> &str;

    /// Validates a JSON config blob against this plugin's expected schema.
    fn validate_config(&self, config: &Value) -> Result<()>;

    /// Creates a configured notifier from a validated JSON config.
    fn create_notifier(&self, config: &Value) -> Result<Arc<dyn Notifier>>;

    /// Returns a copy of `config` with secrets redacted (e.g. passwords
    /// replaced with `"***"`). Used for management-API responses.
    fn redact_config(&self, config: &Value) -> Value {
        config.clone()
    }
}

/// Registry of available [`ChannelPlugin`]s — the type → implementation
/// map the notification manager consults at delivery time.
///
/// # Examples
///
/// ```
/// use fleetmon_notify::plugin::NotifierRegistry;
///
/// let registry = NotifierRegistry::default();
/// assert!(registry.has_plugin("email"));
/// assert!(registry.has_plugin("slack"));
/// assert!(registry.has_plugin("discord"));
/// assert!(registry.has_plugin("webhook"));
/// assert!(!registry.has_plugin("sms"));
/// ```
pub struct NotifierRegistry {
    plugins: HashMap<String, Box<dyn ChannelPlugin>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn ChannelPlugin>) {
        let name = plugin.name().to_string();
        self.plugins.insert(name, plugin);
    }

    /// Validates `config` for the given channel type. Fails for unknown
    /// types, so misconfigured channels are rejected at creation time.
    pub fn validate_config(&self, type_name: &str, config: &Value) -> Result<()> {
        let plugin = self
            .plugins
            .get(type_name)
            .ok_or_else(|| anyhow::anyhow!("Unknown channel plugin type: {type_name}"))?;
        plugin.validate_config(config)
    }

    pub fn create_notifier(&self, type_name: &str, config: &Value) -> Result<Arc<dyn Notifier>> {
        let plugin = self
            .plugins
            .get(type_name)
            .ok_or_else(|| anyhow::anyhow!("Unknown channel plugin type: {type_name}"))?;
        plugin.create_notifier(config)
    }

    pub fn get_plugin(&self, type_name: &str) -> Option<&dyn ChannelPlugin> {
        self.plugins.get(type_name).map(|p| p.as_ref())
    }

    pub fn has_plugin(&self, type_name: &str) -> bool {
        self.plugins.contains_key(type_name)
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::channels::email::EmailPlugin));
        registry.register(Box::new(crate::channels::webhook::WebhookPlugin::slack()));
        registry.register(Box::new(crate::channels::webhook::WebhookPlugin::discord()));
        registry.register(Box::new(crate::channels::webhook::WebhookPlugin::generic()));
        registry
    }
}

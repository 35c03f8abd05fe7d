use crate::error::{NotifyError, Result};
use crate::plugin::ChannelPlugin;
use crate::Notifier;
use async_trait::async_trait;
use fleetmon_common::types::Alert;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
struct EmailConfig {
    smtp_host: String,
    #[serde(default = "default_smtp_port")]
    smtp_port: u16,
    smtp_username: String,
    smtp_password: String,
    from_email: String,
    to_emails: Vec<String>,
    /// Upgrade the connection with STARTTLS (default). When false the
    /// transport speaks plain SMTP, for relays inside a trusted network.
    #[serde(default = "default_starttls")]
    starttls: bool,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

impl EmailConfig {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("smtp_host", &self.smtp_host),
            ("smtp_username", &self.smtp_username),
            ("smtp_password", &self.smtp_password),
            ("from_email", &self.from_email),
        ] {
            if value.trim().is_empty() {
                return Err(NotifyError::InvalidConfig(format!(
                    "email config field '{field}' must not be empty"
                )));
            }
        }
        if self.to_emails.is_empty() {
            return Err(NotifyError::InvalidConfig(
                "email config requires at least one recipient in to_emails".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    to: Vec<String>,
}

impl EmailNotifier {
    fn from_config(cfg: &EmailConfig) -> Result<Self> {
        cfg.validate()?;

        let mut builder = if cfg.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)
                .map_err(|e| NotifyError::Smtp(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.smtp_host)
        };
        builder = builder
            .port(cfg.smtp_port)
            .credentials(Credentials::new(
                cfg.smtp_username.clone(),
                cfg.smtp_password.clone(),
            ))
            .timeout(Some(Duration::from_secs(cfg.timeout_secs)));

        Ok(Self {
            transport: builder.build(),
            from: cfg.from_email.clone(),
            to: cfg.to_emails.clone(),
        })
    }

    fn subject(alert: &Alert) -> String {
        let topic = alert
            .metric_name
            .as_deref()
            .unwrap_or("alert")
            .to_string();
        match &alert.host_name {
            Some(host) => format!("[fleetmon][{}] {} - {}", alert.severity, topic, host),
            None => format!("[fleetmon][{}] {}", alert.severity, topic),
        }
    }

    fn format_html(alert: &Alert) -> String {
        let mut rows = vec![
            ("Severity", alert.severity.to_string()),
            ("Message", alert.message.clone()),
            ("Time", alert.triggered_at.to_rfc3339()),
        ];
        if let Some(host) = &alert.host_name {
            rows.push(("Host", host.clone()));
        }
        if let Some(metric) = &alert.metric_name {
            rows.push(("Metric", metric.clone()));
        }
        if let Some(value) = alert.value {
            rows.push(("Value", format!("{value:.2}")));
        }
        if let Some(threshold) = alert.threshold {
            rows.push(("Threshold", format!("{threshold:.2}")));
        }

        let body: String = rows
            .iter()
            .map(|(k, v)| {
                format!(
                    "<tr><td style=\"padding:4px 12px;font-weight:bold\">{k}</td>\
                     <td style=\"padding:4px 12px\">{v}</td></tr>"
                )
            })
            .collect();
        format!(
            "<html><body><h3>Fleetmon alert ({})</h3>\
             <table border=\"1\" cellspacing=\"0\">{body}</table></body></html>",
            alert.severity
        )
    }

    fn mailbox(addr: &str) -> Result<Mailbox> {
        addr.parse()
            .map_err(|e| NotifyError::InvalidConfig(format!("invalid email address {addr}: {e}")))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        if self.to.is_empty() {
            return Err(NotifyError::InvalidConfig(
                "no recipients configured".to_string(),
            ));
        }

        let subject = Self::subject(alert);
        let plain = self.format_message(alert);
        let html = Self::format_html(alert);
        let from = Self::mailbox(&self.from)?;

        let mut failures = 0usize;
        for recipient in &self.to {
            let email = Message::builder()
                .from(from.clone())
                .to(Self::mailbox(recipient)?)
                .subject(&subject)
                .multipart(MultiPart::alternative_plain_html(
                    plain.clone(),
                    html.clone(),
                ))
                .map_err(|e| NotifyError::Smtp(e.to_string()))?;

            if let Err(e) = self.transport.send(email).await {
                tracing::warn!(recipient = %recipient, error = %e, "Email send failed");
                failures += 1;
            }
        }

        if failures > 0 {
            return Err(NotifyError::Smtp(format!(
                "{failures} of {} recipients failed",
                self.to.len()
            )));
        }
        Ok(())
    }

    fn channel_type(&self) -> &str {
        "email"
    }
}

pub struct EmailPlugin;

impl ChannelPlugin for EmailPlugin {
    fn name(&self) -> &str {
        "email"
    }

    fn validate_config(&self, config: &Value) -> anyhow::Result<()> {
        let cfg: EmailConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("Invalid email config: {e}"))?;
        cfg.validate()?;
        Ok(())
    }

    fn create_notifier(&self, config: &Value) -> anyhow::Result<Arc<dyn Notifier>> {
        let cfg: EmailConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("Invalid email config: {e}"))?;
        Ok(Arc::new(EmailNotifier::from_config(&cfg)?))
    }

    fn redact_config(&self, config: &Value) -> Value {
        let mut redacted = config.clone();
        if let Some(obj) = redacted.as_object_mut() {
            if obj.contains_key("smtp_password") {
                obj.insert(
                    "smtp_password".to_string(),
                    Value::String("***".to_string()),
                );
            }
        }
        redacted
    }
}

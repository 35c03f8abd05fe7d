/// Errors raised by the alerting core.
///
/// Management operations propagate `Validation` and `NotFound` to the
/// caller; evaluation-time failures for a single rule are caught and
/// logged inside the engine so the rest of the batch proceeds.
///
/// # Examples
///
/// ```rust
/// use fleetmon_alert::error::AlertError;
///
/// let err = AlertError::NotFound {
///     entity: "alert_rule",
///     id: "rule-99".to_string(),
/// };
/// assert!(err.to_string().contains("alert_rule"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// A rule, channel, or mute violates a construction invariant.
    #[error("Alert: validation failed: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("Alert: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// An underlying repository call failed.
    #[error("Alert: storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Convenience `Result` alias for alerting operations.
pub type Result<T> = std::result::Result<T, AlertError>;

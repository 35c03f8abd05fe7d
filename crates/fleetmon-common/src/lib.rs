//! Shared domain types for the fleetmon alerting subsystem.

pub mod id;
pub mod types;

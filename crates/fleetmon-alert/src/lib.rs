//! Rule evaluation and alert lifecycle management.
//!
//! [`engine::AlertEngine`] evaluates enabled rules against the latest
//! metric and status snapshots, enforcing per-(rule, host) cooldown and
//! mute suppression, and auto-resolves stale alerts whose condition has
//! cleared. [`manager::AlertManager`] is the public facade: rule,
//! channel, and mute CRUD, manual acknowledge/resolve, statistics, and
//! the wiring from newly triggered alerts into notification fan-out.

pub mod config;
pub mod engine;
pub mod error;
pub mod manager;

#[cfg(test)]
mod tests;

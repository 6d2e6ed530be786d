//! Recognized configuration options (§6).
//!
//! Loading configuration files, environment layering, and CLI flags is a
//! deployment concern outside this crate; what's specified here is the
//! shape each subsystem consumes. [`AuditConfig::from_env`] /
//! [`BridgeConfig::from_env`] show the teacher's `env::var(..).unwrap_or(..)`
//! idiom for the common case of wiring this struct up from a process
//! environment.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub log_dir: PathBuf,
    pub max_file_size: u64,
    pub retention_days: u32,
    pub queue_capacity: usize,
    pub enable_console_output: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("data/audit"),
            max_file_size: 64 * 1024 * 1024,
            retention_days: 90,
            queue_capacity: 65_536,
            enable_console_output: false,
        }
    }
}

impl AuditConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("AUDIT_LOG_DIR") {
            cfg.log_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("AUDIT_MAX_FILE_SIZE") {
            if let Ok(parsed) = v.parse() {
                cfg.max_file_size = parsed;
            }
        }
        if let Ok(v) = env::var("AUDIT_RETENTION_DAYS") {
            if let Ok(parsed) = v.parse() {
                cfg.retention_days = parsed;
            }
        }
        if let Ok(v) = env::var("AUDIT_QUEUE_CAPACITY") {
            if let Ok(parsed) = v.parse() {
                cfg.queue_capacity = parsed;
            }
        }
        if let Ok(v) = env::var("AUDIT_ENABLE_CONSOLE") {
            cfg.enable_console_output = matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON");
        }
        cfg
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub event_queue_capacity: usize,
    pub enable_metrics: bool,
    pub max_subscriptions: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: 8_192,
            enable_metrics: true,
            max_subscriptions: 4_096,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("BRIDGE_EVENT_QUEUE_CAPACITY") {
            if let Ok(parsed) = v.parse() {
                cfg.event_queue_capacity = parsed;
            }
        }
        if let Ok(v) = env::var("BRIDGE_ENABLE_METRICS") {
            cfg.enable_metrics = matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON");
        }
        if let Ok(v) = env::var("BRIDGE_MAX_SUBSCRIPTIONS") {
            if let Ok(parsed) = v.parse() {
                cfg.max_subscriptions = parsed;
            }
        }
        cfg
    }
}

/// Top-level config bundle; strategy parameters are handled per-factory
/// through `StrategyConfig.parameters` rather than here.
#[derive(Debug, Clone, Default)]
pub struct VelozConfig {
    pub audit: AuditConfig,
    pub bridge: BridgeConfig,
}

impl VelozConfig {
    pub fn from_env() -> Self {
        Self {
            audit: AuditConfig::from_env(),
            bridge: BridgeConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AuditConfig::default();
        assert!(cfg.max_file_size > 0);
        assert!(cfg.queue_capacity > 0);
    }
}

//! Atomic counters for the audit pipeline, snapshot-readable from any thread.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct AuditStats {
    pub total_logged: AtomicU64,
    pub total_flushed: AtomicU64,
    pub total_rotations: AtomicU64,
    pub total_errors: AtomicU64,
}

impl AuditStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, pending_count: u64) -> AuditStatsSnapshot {
        AuditStatsSnapshot {
            total_logged: self.total_logged.load(Ordering::Acquire),
            total_flushed: self.total_flushed.load(Ordering::Acquire),
            total_rotations: self.total_rotations.load(Ordering::Acquire),
            total_errors: self.total_errors.load(Ordering::Acquire),
            pending_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct AuditStatsSnapshot {
    pub total_logged: u64,
    pub total_flushed: u64,
    pub total_rotations: u64,
    pub total_errors: u64,
    pub pending_count: u64,
}

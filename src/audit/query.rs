//! Query filter and result page types for the audit read side.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::entry::{AuditEntry, AuditType};

/// Predicate set applied to the audit log. All fields are conjunctive
/// (AND'd together); an absent field imposes no constraint.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    pub entry_type: Option<AuditType>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    /// Substring match against `action`.
    pub action_contains: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Substring match against any `details` value.
    pub details_contains: Option<String>,
    pub offset: usize,
    pub limit: usize,
    pub reverse: bool,
}

/// A derived `Default` would give `limit: 0`, silently returning zero
/// entries from any filter built with `..Default::default()`; `limit`
/// defaults to the same 100 as `QueryFilter::new()`.
impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            entry_type: None,
            user_id: None,
            ip_address: None,
            action_contains: None,
            since: None,
            until: None,
            details_contains: None,
            offset: 0,
            limit: 100,
            reverse: false,
        }
    }
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(t) = self.entry_type {
            if entry.entry_type != t {
                return false;
            }
        }
        if let Some(u) = &self.user_id {
            if &entry.user_id != u {
                return false;
            }
        }
        if let Some(ip) = &self.ip_address {
            if &entry.ip_address != ip {
                return false;
            }
        }
        if let Some(needle) = &self.action_contains {
            if !entry.action.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp > until {
                return false;
            }
        }
        if let Some(needle) = &self.details_contains {
            if !entry.details.iter().any(|(_, v)| v.contains(needle.as_str())) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub total_count: usize,
    pub has_more: bool,
}

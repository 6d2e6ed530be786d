//! Audit entry type and its canonical NDJSON encoding.
//!
//! Serialization is hand-rolled rather than routed through `serde_json`'s
//! map type: canonical field order and exact escaping are part of the
//! on-disk contract, and a generic `Map` would not preserve either.
//! Parsing goes through `serde_json::Value` for forward-compatible,
//! order-independent field extraction on the read path.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuditType {
    Auth,
    Order,
    ApiKey,
    Error,
    Access,
}

impl AuditType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Order => "order",
            Self::ApiKey => "apikey",
            Self::Error => "error",
            Self::Access => "access",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "auth" => Some(Self::Auth),
            "order" => Some(Self::Order),
            "apikey" => Some(Self::ApiKey),
            "error" => Some(Self::Error),
            "access" => Some(Self::Access),
            _ => None,
        }
    }
}

impl fmt::Display for AuditType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record. Once constructed, fields are never mutated;
/// `details` preserves insertion order for reproducible serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub entry_type: AuditType,
    pub action: String,
    pub user_id: String,
    pub ip_address: String,
    pub request_id: Option<String>,
    pub details: Vec<(String, String)>,
}

impl AuditEntry {
    pub fn new(
        entry_type: AuditType,
        action: impl Into<String>,
        user_id: impl Into<String>,
        ip_address: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            entry_type,
            action: action.into(),
            user_id: user_id.into(),
            ip_address: ip_address.into(),
            request_id: None,
            details: Vec::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    /// Canonical NDJSON line, including the trailing `\n`.
    ///
    /// Field order is exactly `timestamp,type,action,user_id,ip_address,
    /// request_id?,details?`; `request_id`/`details` are omitted entirely
    /// when absent/empty rather than emitted as `null`/`{}`.
    pub fn to_ndjson_line(&self) -> String {
        let mut out = String::with_capacity(128 + self.details.len() * 24);
        out.push('{');
        out.push_str("\"timestamp\":\"");
        out.push_str(&self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true));
        out.push_str("\",\"type\":\"");
        out.push_str(self.entry_type.as_str());
        out.push_str("\",\"action\":\"");
        escape_into(&self.action, &mut out);
        out.push_str("\",\"user_id\":\"");
        escape_into(&self.user_id, &mut out);
        out.push_str("\",\"ip_address\":\"");
        escape_into(&self.ip_address, &mut out);
        out.push('"');
        if let Some(request_id) = &self.request_id {
            out.push_str(",\"request_id\":\"");
            escape_into(request_id, &mut out);
            out.push('"');
        }
        if !self.details.is_empty() {
            out.push_str(",\"details\":{");
            for (i, (k, v)) in self.details.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('"');
                escape_into(k, &mut out);
                out.push_str("\":\"");
                escape_into(v, &mut out);
                out.push('"');
            }
            out.push('}');
        }
        out.push_str("}\n");
        out
    }

    /// Parse a single NDJSON record (without the trailing newline).
    /// Unknown additional top-level fields are accepted and ignored.
    pub fn from_ndjson_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return None;
        }
        let value: serde_json::Value = serde_json::from_str(line).ok()?;
        let obj = value.as_object()?;

        let timestamp = obj.get("timestamp")?.as_str()?;
        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .ok()?
            .with_timezone(&Utc);
        let entry_type = AuditType::from_str(obj.get("type")?.as_str()?)?;
        let action = obj.get("action")?.as_str()?.to_string();
        let user_id = obj.get("user_id")?.as_str()?.to_string();
        let ip_address = obj.get("ip_address")?.as_str()?.to_string();
        let request_id = obj
            .get("request_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let details = obj
            .get("details")
            .and_then(|v| v.as_object())
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            timestamp,
            entry_type,
            action,
            user_id,
            ip_address,
            request_id,
            details,
        })
    }
}

/// Escape `"`, `\`, and control characters per the canonical format.
fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_defined_fields() {
        let entry = AuditEntry::new(AuditType::Order, "create_order", "user123", "10.0.0.1")
            .with_request_id("req-1")
            .with_detail("symbol", "BTCUSDT")
            .with_detail("qty", "1.5");

        let line = entry.to_ndjson_line();
        assert!(line.ends_with("}\n"));
        let parsed = AuditEntry::from_ndjson_line(&line).expect("parses");

        assert_eq!(parsed.entry_type, entry.entry_type);
        assert_eq!(parsed.action, entry.action);
        assert_eq!(parsed.user_id, entry.user_id);
        assert_eq!(parsed.ip_address, entry.ip_address);
        assert_eq!(parsed.request_id, entry.request_id);
        assert_eq!(parsed.details, entry.details);
    }

    #[test]
    fn omits_absent_request_id_and_details() {
        let entry = AuditEntry::new(AuditType::Access, "list_orders", "user1", "127.0.0.1");
        let line = entry.to_ndjson_line();
        assert!(!line.contains("request_id"));
        assert!(!line.contains("details"));
    }

    #[test]
    fn escapes_control_characters_and_quotes() {
        let entry = AuditEntry::new(AuditType::Error, "bad", "user1", "127.0.0.1")
            .with_detail("message", "line1\nline2\t\"quoted\"\\backslash");
        let line = entry.to_ndjson_line();
        let parsed = AuditEntry::from_ndjson_line(&line).unwrap();
        assert_eq!(
            parsed.details[0].1,
            "line1\nline2\t\"quoted\"\\backslash"
        );
    }

    #[test]
    fn field_order_is_canonical() {
        let entry = AuditEntry::new(AuditType::Auth, "login", "user1", "127.0.0.1")
            .with_request_id("r1")
            .with_detail("k", "v");
        let line = entry.to_ndjson_line();
        let ts_pos = line.find("\"timestamp\"").unwrap();
        let type_pos = line.find("\"type\"").unwrap();
        let action_pos = line.find("\"action\"").unwrap();
        let user_pos = line.find("\"user_id\"").unwrap();
        let ip_pos = line.find("\"ip_address\"").unwrap();
        let req_pos = line.find("\"request_id\"").unwrap();
        let details_pos = line.find("\"details\"").unwrap();
        assert!(ts_pos < type_pos);
        assert!(type_pos < action_pos);
        assert!(action_pos < user_pos);
        assert!(user_pos < ip_pos);
        assert!(ip_pos < req_pos);
        assert!(req_pos < details_pos);
    }

    #[test]
    fn parser_accepts_unknown_additional_fields() {
        let line = r#"{"timestamp":"2024-01-01T00:00:00.000000000Z","type":"access","action":"ping","user_id":"u","ip_address":"1.2.3.4","future_field":"ignored"}"#;
        let parsed = AuditEntry::from_ndjson_line(line).expect("parses despite unknown field");
        assert_eq!(parsed.action, "ping");
    }
}

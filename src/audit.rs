use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const AUDIT_CAP: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditSource {
    Ia,
    Bitget,
    System,
    Finance,
}

impl AuditSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSource::Ia => "IA",
            AuditSource::Bitget => "BITGET",
            AuditSource::System => "SYSTEM",
            AuditSource::Finance => "FINANCE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: AuditSource,
    pub message: String,
    #[serde(rename = "type")]
    pub severity: Severity,
}

/// Rolling audit trail, oldest first. Every record is mirrored to the log.
#[derive(Debug, Default)]
pub struct AuditLog {
    events: VecDeque<AuditEvent>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, source: AuditSource, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Error => log::error!("[{}] {}", source.as_str(), message),
            Severity::Warning => log::warn!("[{}] {}", source.as_str(), message),
            Severity::Info | Severity::Success => log::info!("[{}] {}", source.as_str(), message),
        }

        self.events.push_back(AuditEvent {
            id: event_id(),
            timestamp: Utc::now(),
            source,
            message,
            severity,
        });
        while self.events.len() > AUDIT_CAP {
            self.events.pop_front();
        }
    }

    pub fn events(&self) -> impl Iterator<Item = &AuditEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&AuditEvent> {
        self.events.back()
    }
}

fn event_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_capped_at_forty_oldest_dropped() {
        let mut log = AuditLog::new();
        for i in 0..41 {
            log.record(AuditSource::System, Severity::Info, format!("event {i}"));
        }
        assert_eq!(log.len(), AUDIT_CAP);
        assert_eq!(log.events().next().map(|e| e.message.as_str()), Some("event 1"));
        assert_eq!(log.last().map(|e| e.message.as_str()), Some("event 40"));
    }

    #[test]
    fn test_record_keeps_source_and_severity() {
        let mut log = AuditLog::new();
        log.record(AuditSource::Finance, Severity::Success, "deposit");
        let event = log.last().unwrap();
        assert_eq!(event.source, AuditSource::Finance);
        assert_eq!(event.severity, Severity::Success);
        assert_eq!(event.id.len(), 9);
    }
}

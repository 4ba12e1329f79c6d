use super::entity::validate_device_id;
use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of event recorded in the system log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StatusChange,
    Maintenance,
    Error,
    Update,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        Self::StatusChange,
        Self::Maintenance,
        Self::Error,
        Self::Update,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusChange => "status_change",
            Self::Maintenance => "maintenance",
            Self::Error => "error",
            Self::Update => "update",
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| GatewayError::Validation(format!("Unknown event type: {}", s)))
    }
}

/// A log entry waiting to be appended. The store assigns `log_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSystemLog {
    pub device_id: String,
    pub event_type: EventType,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl NewSystemLog {
    pub fn validate(&self) -> Result<()> {
        validate_device_id(&self.device_id)?;
        if self.message.is_empty() {
            return Err(GatewayError::Validation(
                "Log message cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// An appended log row. Append-only: never updated, only purged with its device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemLogEntry {
    pub log_id: i64,
    pub device_id: String,
    pub event_type: EventType,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Filter for reading back a device's logs. Bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct LogQuery {
    pub device_id: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl LogQuery {
    pub fn for_device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            start: None,
            end: None,
        }
    }

    pub fn matches(&self, entry: &SystemLogEntry) -> bool {
        entry.device_id == self.device_id
            && self.start.is_none_or(|start| entry.timestamp >= start)
            && self.end.is_none_or(|end| entry.timestamp <= end)
    }
}

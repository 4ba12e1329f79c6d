//! Row shapes of the relational tables and their conversion into domain types

use chrono::{DateTime, Utc};
use domain::device::{
    DeviceMetadata, DeviceMetadataRecord, DeviceType, EventType, FirmwareVersion, SystemLogEntry,
};
use domain::{Backend, GatewayError};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeviceMetadataRow {
    pub device_id: String,
    pub device_type: String,
    pub location: String,
    pub manufacturer: String,
    pub firmware_version: String,
    pub last_maintenance: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DeviceMetadataRow> for DeviceMetadataRecord {
    type Error = GatewayError;

    fn try_from(row: DeviceMetadataRow) -> Result<Self, Self::Error> {
        let device_type: DeviceType = row.device_type.parse().map_err(corrupt)?;
        let firmware_version = FirmwareVersion::new(row.firmware_version).map_err(corrupt)?;

        Ok(DeviceMetadataRecord {
            metadata: DeviceMetadata {
                device_id: row.device_id,
                device_type,
                location: row.location,
                manufacturer: row.manufacturer,
                firmware_version,
                last_maintenance: row.last_maintenance,
                created_at: row.created_at,
            },
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SystemLogRow {
    pub log_id: i64,
    pub device_id: String,
    pub event_type: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SystemLogRow> for SystemLogEntry {
    type Error = GatewayError;

    fn try_from(row: SystemLogRow) -> Result<Self, Self::Error> {
        let event_type: EventType = row.event_type.parse().map_err(corrupt)?;
        Ok(SystemLogEntry {
            log_id: row.log_id,
            device_id: row.device_id,
            event_type,
            message: row.message,
            timestamp: row.timestamp,
            created_at: row.created_at,
        })
    }
}

/// A stored value no longer parses: a backend fault, not the caller's
fn corrupt(e: GatewayError) -> GatewayError {
    GatewayError::backend(Backend::Relational, format!("unreadable row: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_row(device_type: &str) -> DeviceMetadataRow {
        let now = Utc::now();
        DeviceMetadataRow {
            device_id: "device_1".to_string(),
            device_type: device_type.to_string(),
            location: "Kitchen".to_string(),
            manufacturer: "HomeTech".to_string(),
            firmware_version: "v2.3".to_string(),
            last_maintenance: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_metadata_row_converts() {
        let record = DeviceMetadataRecord::try_from(metadata_row("smart_plug")).unwrap();
        assert_eq!(record.metadata.device_type, DeviceType::SmartPlug);
        assert_eq!(record.metadata.firmware_version.as_str(), "v2.3");
    }

    #[test]
    fn test_unknown_stored_type_is_backend_error() {
        let err = DeviceMetadataRecord::try_from(metadata_row("toaster")).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Backend {
                backend: Backend::Relational,
                ..
            }
        ));
    }
}

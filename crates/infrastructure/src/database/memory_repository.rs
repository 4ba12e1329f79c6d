use async_trait::async_trait;
use chrono::Utc;
use domain::GatewayError;
use domain::device::{
    DeviceMetadata, DeviceMetadataRecord, DeviceRepository, DeviceRowsDeleted, DeviceType,
    LogQuery, NewSystemLog, SystemLogEntry,
};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    metadata: BTreeMap<String, DeviceMetadataRecord>,
    logs: Vec<SystemLogEntry>,
    last_log_id: i64,
}

/// In-process stand-in for the relational store, with the same key and
/// foreign-key rules as the PostgreSQL schema
#[derive(Default)]
pub struct InMemoryDeviceRepository {
    tables: RwLock<Tables>,
}

impl InMemoryDeviceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceRepository for InMemoryDeviceRepository {
    async fn upsert_metadata(
        &self,
        metadata: &DeviceMetadata,
    ) -> Result<DeviceMetadataRecord, GatewayError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let record = match tables.metadata.get(&metadata.device_id) {
            Some(existing) => DeviceMetadataRecord {
                metadata: DeviceMetadata {
                    created_at: existing.metadata.created_at,
                    ..metadata.clone()
                },
                updated_at: now.max(existing.updated_at),
            },
            None => DeviceMetadataRecord {
                metadata: metadata.clone(),
                updated_at: now,
            },
        };

        tables
            .metadata
            .insert(metadata.device_id.clone(), record.clone());
        Ok(record)
    }

    async fn find_metadata(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceMetadataRecord>, GatewayError> {
        Ok(self.tables.read().await.metadata.get(device_id).cloned())
    }

    async fn list_metadata(&self) -> Result<Vec<DeviceMetadataRecord>, GatewayError> {
        Ok(self.tables.read().await.metadata.values().cloned().collect())
    }

    async fn append_log(&self, entry: &NewSystemLog) -> Result<i64, GatewayError> {
        let mut tables = self.tables.write().await;
        if !tables.metadata.contains_key(&entry.device_id) {
            return Err(GatewayError::ForeignKeyViolation {
                device_id: entry.device_id.clone(),
            });
        }

        tables.last_log_id += 1;
        let log_id = tables.last_log_id;
        tables.logs.push(SystemLogEntry {
            log_id,
            device_id: entry.device_id.clone(),
            event_type: entry.event_type,
            message: entry.message.clone(),
            timestamp: entry.timestamp,
            created_at: Utc::now(),
        });
        Ok(log_id)
    }

    async fn query_logs(&self, query: &LogQuery) -> Result<Vec<SystemLogEntry>, GatewayError> {
        let tables = self.tables.read().await;
        let mut entries: Vec<SystemLogEntry> = tables
            .logs
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.log_id.cmp(&a.log_id))
        });
        Ok(entries)
    }

    async fn device_types(&self) -> Result<Vec<DeviceType>, GatewayError> {
        let tables = self.tables.read().await;
        let mut types: Vec<DeviceType> = tables
            .metadata
            .values()
            .map(|r| r.metadata.device_type)
            .collect();
        types.sort_by_key(|t| t.as_str());
        types.dedup();
        Ok(types)
    }

    async fn device_locations(&self) -> Result<Vec<String>, GatewayError> {
        let tables = self.tables.read().await;
        let mut locations: Vec<String> = tables
            .metadata
            .values()
            .map(|r| r.metadata.location.clone())
            .collect();
        locations.sort();
        locations.dedup();
        Ok(locations)
    }

    async fn delete_device(&self, device_id: &str) -> Result<DeviceRowsDeleted, GatewayError> {
        let mut tables = self.tables.write().await;
        let before = tables.logs.len();
        tables.logs.retain(|e| e.device_id != device_id);
        let logs = (before - tables.logs.len()) as u64;
        let metadata = u64::from(tables.metadata.remove(device_id).is_some());
        Ok(DeviceRowsDeleted { logs, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::device::{EventType, FirmwareVersion};

    fn metadata(device_id: &str, device_type: DeviceType, location: &str) -> DeviceMetadata {
        let now = Utc::now();
        DeviceMetadata {
            device_id: device_id.to_string(),
            device_type,
            location: location.to_string(),
            manufacturer: "HomeTech".to_string(),
            firmware_version: FirmwareVersion::from_parts(1, 0),
            last_maintenance: now,
            created_at: now - Duration::days(40),
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at() {
        let repo = InMemoryDeviceRepository::new();
        let first = metadata("device_1", DeviceType::Camera, "Kitchen");
        let stored = repo.upsert_metadata(&first).await.unwrap();

        let mut second = first.clone();
        second.location = "Office".to_string();
        second.created_at = Utc::now();
        let updated = repo.upsert_metadata(&second).await.unwrap();

        assert_eq!(updated.metadata.created_at, first.created_at);
        assert_eq!(updated.metadata.location, "Office");
        assert!(updated.updated_at >= stored.updated_at);
        assert_eq!(repo.list_metadata().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_log_for_unknown_device_is_rejected() {
        let repo = InMemoryDeviceRepository::new();
        let err = repo
            .append_log(&NewSystemLog {
                device_id: "ghost".to_string(),
                event_type: EventType::Error,
                message: "no such device".to_string(),
                timestamp: Utc::now(),
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::ForeignKeyViolation {
                device_id: "ghost".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_types_and_locations_distinct_sorted() {
        let repo = InMemoryDeviceRepository::new();
        repo.upsert_metadata(&metadata("a", DeviceType::SmartPlug, "Office"))
            .await
            .unwrap();
        repo.upsert_metadata(&metadata("b", DeviceType::Camera, "Kitchen"))
            .await
            .unwrap();
        repo.upsert_metadata(&metadata("c", DeviceType::SmartPlug, "Kitchen"))
            .await
            .unwrap();

        assert_eq!(
            repo.device_types().await.unwrap(),
            vec![DeviceType::Camera, DeviceType::SmartPlug]
        );
        assert_eq!(
            repo.device_locations().await.unwrap(),
            vec!["Kitchen".to_string(), "Office".to_string()]
        );
    }
}

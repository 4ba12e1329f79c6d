use super::{
    DeviceMetadata, DeviceMetadataRecord, DeviceType, LogQuery, NewSystemLog, SystemLogEntry,
};
use crate::GatewayError;
use async_trait::async_trait;

/// Rows removed when a device is purged from the relational store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceRowsDeleted {
    pub logs: u64,
    pub metadata: u64,
}

/// Repository interface for the relational store (device metadata + system logs)
///
/// Implementations check out one connection per call and must release it on
/// every exit path.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Insert or update metadata keyed by device_id. Refreshes `updated_at`.
    async fn upsert_metadata(
        &self,
        metadata: &DeviceMetadata,
    ) -> Result<DeviceMetadataRecord, GatewayError>;

    async fn find_metadata(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceMetadataRecord>, GatewayError>;

    async fn list_metadata(&self) -> Result<Vec<DeviceMetadataRecord>, GatewayError>;

    /// Append a log entry and return its sequence-assigned id.
    /// Fails with `ForeignKeyViolation` when the device has no metadata row.
    async fn append_log(&self, entry: &NewSystemLog) -> Result<i64, GatewayError>;

    /// Logs matching the query, newest first
    async fn query_logs(&self, query: &LogQuery) -> Result<Vec<SystemLogEntry>, GatewayError>;

    async fn device_types(&self) -> Result<Vec<DeviceType>, GatewayError>;

    async fn device_locations(&self) -> Result<Vec<String>, GatewayError>;

    /// Remove the device's logs and metadata atomically
    async fn delete_device(&self, device_id: &str) -> Result<DeviceRowsDeleted, GatewayError>;
}

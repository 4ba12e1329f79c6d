//! Persistence gateway
//!
//! Routes each logical operation to the backend that owns it and normalizes
//! the outcome into `domain::Result`. Every backend call is bounded by a
//! deadline and aborted when the caller's cancellation token fires.

mod ingest;

pub use ingest::{DeviceFailure, IngestStage, IngestSummary};

use bytes::Bytes;
use chrono::Utc;
use domain::device::{
    DeviceMetadata, DeviceMetadataRecord, DeviceRepository, DeviceType, LogQuery, NewSystemLog,
    SystemLogEntry, validate_device_id,
};
use domain::object::{
    KeyParts, ObjectBody, ObjectCategory, ObjectRepository, StoredObject, device_prefixes,
    files_prefix, images_prefix, log_blobs_prefix,
};
use domain::telemetry::{SensorReading, SensorRecord, TimeRange, TimeSeriesRepository};
use domain::{Backend, GatewayError, Result};
use futures::StreamExt;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tunables for the gateway
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Deadline applied to each individual backend call
    pub call_timeout: Duration,
    /// Point writes in flight at once within one batch
    pub write_concurrency: usize,
    /// Devices ingested at once by `ingest_fleet`
    pub device_concurrency: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            write_concurrency: 16,
            device_concurrency: 4,
        }
    }
}

/// What a device purge removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub device_id: String,
    pub objects_deleted: u64,
    pub logs_deleted: u64,
    pub metadata_deleted: u64,
    pub time_series_purged: bool,
}

impl DeletionReport {
    pub fn deleted_count(&self) -> u64 {
        self.objects_deleted + self.logs_deleted + self.metadata_deleted
    }
}

/// A log blob read back from the object store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogBlob {
    #[serde(flatten)]
    pub object: StoredObject,
    pub data: serde_json::Value,
}

#[derive(Clone)]
pub struct TelemetryGateway {
    timeseries: Arc<dyn TimeSeriesRepository>,
    devices: Arc<dyn DeviceRepository>,
    objects: Arc<dyn ObjectRepository>,
    settings: GatewaySettings,
}

impl TelemetryGateway {
    pub fn new(
        timeseries: Arc<dyn TimeSeriesRepository>,
        devices: Arc<dyn DeviceRepository>,
        objects: Arc<dyn ObjectRepository>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            timeseries,
            devices,
            objects,
            settings,
        }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Runs one backend call under the deadline and the caller's token
    async fn guarded<T, F>(&self, backend: Backend, cancel: &CancellationToken, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            outcome = tokio::time::timeout(self.settings.call_timeout, call) => match outcome {
                Ok(result) => result,
                Err(_) => Err(GatewayError::unavailable(
                    backend,
                    format!("no response within {:?}", self.settings.call_timeout),
                )),
            },
        }
    }

    // --- Time series ---

    /// Writes one point per reading. Failures are isolated per record:
    /// - all succeeded: `Ok(count)`
    /// - some failed: `PartialWrite`
    /// - all failed: the first error
    pub async fn store_readings(
        &self,
        device_id: &str,
        device_type: DeviceType,
        readings: &[SensorReading],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        validate_device_id(device_id)?;
        if let Some(mismatch) = readings.iter().find(|r| r.device_type() != device_type) {
            return Err(GatewayError::Validation(format!(
                "Reading of type {} in a {} batch for {}",
                mismatch.device_type(),
                device_type,
                device_id
            )));
        }
        if readings.is_empty() {
            return Ok(0);
        }

        // Built up front so the batch future stays Send
        let writes: Vec<_> = readings
            .iter()
            .map(|reading| {
                self.guarded(
                    Backend::TimeSeries,
                    cancel,
                    self.timeseries.write_point(device_id, reading),
                )
            })
            .collect();
        let outcomes: Vec<Result<()>> = futures::stream::iter(writes)
            .buffer_unordered(self.settings.write_concurrency.max(1))
            .take_until(cancel.cancelled())
            .collect()
            .await;

        let interrupted = outcomes.len() < readings.len()
            || outcomes
                .iter()
                .any(|o| matches!(o, Err(GatewayError::Cancelled)));
        if interrupted {
            return Err(GatewayError::Cancelled);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
        let failed = outcomes.len() - succeeded;

        if failed == 0 {
            debug!(device_id = %device_id, points = succeeded, "Sensor batch written");
            return Ok(succeeded);
        }

        warn!(device_id = %device_id, succeeded, failed, "Sensor batch partially rejected");
        if succeeded == 0 {
            if let Some(Err(first)) = outcomes.into_iter().find(|o| o.is_err()) {
                return Err(first);
            }
        }
        Err(GatewayError::PartialWrite { succeeded, failed })
    }

    pub async fn query_range(
        &self,
        device_id: &str,
        range: TimeRange,
        cancel: &CancellationToken,
    ) -> Result<Vec<SensorRecord>> {
        validate_device_id(device_id)?;
        if range.is_empty() {
            return Ok(Vec::new());
        }
        self.guarded(
            Backend::TimeSeries,
            cancel,
            self.timeseries.query_range(device_id, &range),
        )
        .await
    }

    // --- Relational ---

    pub async fn upsert_metadata(
        &self,
        metadata: &DeviceMetadata,
        cancel: &CancellationToken,
    ) -> Result<DeviceMetadataRecord> {
        metadata.validate()?;
        self.guarded(
            Backend::Relational,
            cancel,
            self.devices.upsert_metadata(metadata),
        )
        .await
    }

    pub async fn append_log(&self, entry: &NewSystemLog, cancel: &CancellationToken) -> Result<i64> {
        entry.validate()?;
        self.guarded(Backend::Relational, cancel, self.devices.append_log(entry))
            .await
    }

    /// Logs newest first. Missing bounds leave that side open.
    pub async fn query_logs(
        &self,
        query: &LogQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<SystemLogEntry>> {
        validate_device_id(&query.device_id)?;
        if let (Some(start), Some(end)) = (query.start, query.end) {
            if start > end {
                return Ok(Vec::new());
            }
        }
        self.guarded(Backend::Relational, cancel, self.devices.query_logs(query))
            .await
    }

    pub async fn list_devices(&self, cancel: &CancellationToken) -> Result<Vec<DeviceMetadataRecord>> {
        self.guarded(Backend::Relational, cancel, self.devices.list_metadata())
            .await
    }

    pub async fn get_device(
        &self,
        device_id: &str,
        cancel: &CancellationToken,
    ) -> Result<DeviceMetadataRecord> {
        validate_device_id(device_id)?;
        self.guarded(
            Backend::Relational,
            cancel,
            self.devices.find_metadata(device_id),
        )
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("Device {} not found", device_id)))
    }

    pub async fn device_types(&self, cancel: &CancellationToken) -> Result<Vec<DeviceType>> {
        self.guarded(Backend::Relational, cancel, self.devices.device_types())
            .await
    }

    pub async fn device_locations(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.guarded(Backend::Relational, cancel, self.devices.device_locations())
            .await
    }

    // --- Object store ---

    /// Stores a blob under the key built from `parts` and returns its URL
    pub async fn put_object(
        &self,
        parts: &KeyParts,
        body: Bytes,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let key = parts.key();
        let stored = self
            .guarded(
                Backend::ObjectStore,
                cancel,
                self.objects.put(&key, body, content_type),
            )
            .await?;
        info!(key = %stored.key, size = stored.size, "Object stored");
        Ok(stored.url)
    }

    pub async fn store_device_image(
        &self,
        device_id: &str,
        body: Bytes,
        content_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let parts = KeyParts::new(ObjectCategory::Image, device_id, Utc::now())?;
        let content_type = content_type
            .map(str::to_string)
            .unwrap_or_else(|| parts.category.default_content_type());
        self.put_object(&parts, body, &content_type, cancel).await
    }

    pub async fn store_device_log_blob(
        &self,
        device_id: &str,
        data: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let parts = KeyParts::new(ObjectCategory::LogBlob, device_id, Utc::now())?;
        let body = serde_json::to_vec(data)
            .map_err(|e| GatewayError::Validation(format!("Log blob is not JSON: {}", e)))?;
        let content_type = parts.category.default_content_type();
        self.put_object(&parts, Bytes::from(body), &content_type, cancel)
            .await
    }

    pub async fn store_device_document(
        &self,
        device_id: &str,
        body: Bytes,
        extension: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let category = ObjectCategory::document(extension)?;
        let parts = KeyParts::new(category, device_id, Utc::now())?;
        let content_type = parts.category.default_content_type();
        self.put_object(&parts, body, &content_type, cancel).await
    }

    pub async fn get_object(&self, key: &str, cancel: &CancellationToken) -> Result<ObjectBody> {
        if key.is_empty() || key.split('/').any(|segment| segment.is_empty() || segment == "..") {
            return Err(GatewayError::Validation(format!("Invalid object key: {}", key)));
        }
        self.guarded(Backend::ObjectStore, cancel, self.objects.get(key))
            .await
    }

    /// Images of a device, newest first
    pub async fn list_device_images(
        &self,
        device_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<StoredObject>> {
        validate_device_id(device_id)?;
        let prefix = images_prefix(device_id);
        let mut images = self
            .guarded(Backend::ObjectStore, cancel, self.objects.list(&prefix))
            .await?;
        images.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(images)
    }

    /// Log blobs of a device with their decoded JSON, newest first.
    /// Blobs that are not valid JSON are skipped.
    pub async fn list_device_log_blobs(
        &self,
        device_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<LogBlob>> {
        validate_device_id(device_id)?;
        let prefix = log_blobs_prefix(device_id);
        let mut listed = self
            .guarded(Backend::ObjectStore, cancel, self.objects.list(&prefix))
            .await?;
        listed.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));

        let mut blobs = Vec::with_capacity(listed.len());
        for object in listed {
            let body = self
                .guarded(Backend::ObjectStore, cancel, self.objects.get(&object.key))
                .await?;
            match serde_json::from_slice(&body.body) {
                Ok(data) => blobs.push(LogBlob { object, data }),
                Err(e) => warn!(key = %object.key, error = %e, "Skipping undecodable log blob"),
            }
        }
        Ok(blobs)
    }

    /// Keys of a device's files, optionally narrowed to one kind (e.g. `document`)
    pub async fn list_device_files(
        &self,
        device_id: &str,
        kind: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        validate_device_id(device_id)?;
        let prefix = files_prefix(device_id, kind)?;
        let objects = self
            .guarded(Backend::ObjectStore, cancel, self.objects.list(&prefix))
            .await?;
        Ok(objects.into_iter().map(|o| o.key).collect())
    }

    // --- Cross-backend ---

    /// Purges a device from all three backends.
    ///
    /// Order: objects, time series, then relational rows. Metadata goes last so
    /// a failed purge can be repeated against the same device id.
    pub async fn delete_device(
        &self,
        device_id: &str,
        cancel: &CancellationToken,
    ) -> Result<DeletionReport> {
        validate_device_id(device_id)?;
        let mut report = DeletionReport {
            device_id: device_id.to_string(),
            ..Default::default()
        };

        for prefix in device_prefixes(device_id) {
            let objects = self
                .guarded(Backend::ObjectStore, cancel, self.objects.list(&prefix))
                .await?;
            for object in objects {
                self.guarded(Backend::ObjectStore, cancel, self.objects.delete(&object.key))
                    .await?;
                report.objects_deleted += 1;
            }
        }

        self.guarded(
            Backend::TimeSeries,
            cancel,
            self.timeseries.delete_device(device_id),
        )
        .await?;
        report.time_series_purged = true;

        let rows = self
            .guarded(
                Backend::Relational,
                cancel,
                self.devices.delete_device(device_id),
            )
            .await?;
        report.logs_deleted = rows.logs;
        report.metadata_deleted = rows.metadata;

        info!(
            device_id = %device_id,
            objects = report.objects_deleted,
            logs = report.logs_deleted,
            metadata = report.metadata_deleted,
            "🗑️ Device purged"
        );
        Ok(report)
    }
}

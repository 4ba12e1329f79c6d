use super::TelemetryGateway;
use crate::generator::{GeneratedDevice, GeneratedFleet, TelemetryGenerator};
use chrono::Utc;
use domain::{GatewayError, Result};
use futures::StreamExt;
use rand::Rng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const MAX_DEVICES_PER_RUN: usize = 1000;
pub const MAX_HISTORY_HOURS: u32 = 24 * 30;

/// Devices generated and held in memory at once by `generate_and_store`
pub const GENERATION_SLICE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Metadata,
    Logs,
    SensorData,
}

/// One device that did not make it fully into the backends
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceFailure {
    pub device_id: String,
    pub stage: IngestStage,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestSummary {
    pub devices: usize,
    pub points_written: usize,
    pub logs_written: usize,
    pub failures: Vec<DeviceFailure>,
}

impl IngestSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct DeviceOutcome {
    points: usize,
    logs: usize,
    failure: Option<DeviceFailure>,
}

impl IngestSummary {
    fn absorb(&mut self, other: IngestSummary) {
        self.devices += other.devices;
        self.points_written += other.points_written;
        self.logs_written += other.logs_written;
        self.failures.extend(other.failures);
    }
}

impl TelemetryGateway {
    /// Generates a fleet from `generator` and stores it, one slice of
    /// `GENERATION_SLICE` devices at a time
    pub async fn generate_and_store<R: Rng>(
        &self,
        generator: &mut TelemetryGenerator<R>,
        device_count: usize,
        hours_of_history: u32,
        cancel: &CancellationToken,
    ) -> Result<IngestSummary> {
        if device_count == 0 || device_count > MAX_DEVICES_PER_RUN {
            return Err(GatewayError::Validation(format!(
                "num_devices must be between 1 and {}",
                MAX_DEVICES_PER_RUN
            )));
        }
        if hours_of_history > MAX_HISTORY_HOURS {
            return Err(GatewayError::Validation(format!(
                "hours must be at most {}",
                MAX_HISTORY_HOURS
            )));
        }

        let now = Utc::now();
        let mut summary = IngestSummary::default();
        let mut first = 1;
        while first <= device_count {
            let count = GENERATION_SLICE.min(device_count - first + 1);
            let slice = generator.generate_from(first, count, hours_of_history, now)?;
            summary.absorb(self.ingest_devices(&slice, cancel).await?);
            first += count;
        }

        info!(
            devices = summary.devices,
            points = summary.points_written,
            logs = summary.logs_written,
            failures = summary.failures.len(),
            "📦 Fleet ingested"
        );
        Ok(summary)
    }

    /// Stores every device of the fleet. At most `device_concurrency` devices
    /// are in flight; a device's metadata lands before its logs and points.
    /// Per-device failures are collected, cancellation aborts the whole run.
    pub async fn ingest_fleet(
        &self,
        fleet: &GeneratedFleet,
        cancel: &CancellationToken,
    ) -> Result<IngestSummary> {
        let summary = self.ingest_devices(fleet, cancel).await?;
        info!(
            devices = summary.devices,
            points = summary.points_written,
            logs = summary.logs_written,
            failures = summary.failures.len(),
            "📦 Fleet ingested"
        );
        Ok(summary)
    }

    async fn ingest_devices(
        &self,
        fleet: &GeneratedFleet,
        cancel: &CancellationToken,
    ) -> Result<IngestSummary> {
        let ingests: Vec<_> = fleet
            .devices
            .iter()
            .map(|device| self.ingest_device(device, cancel))
            .collect();
        let outcomes: Vec<DeviceOutcome> = futures::stream::iter(ingests)
            .buffer_unordered(self.settings().device_concurrency.max(1))
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        let mut summary = IngestSummary {
            devices: fleet.devices.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            summary.points_written += outcome.points;
            summary.logs_written += outcome.logs;
            summary.failures.extend(outcome.failure);
        }
        Ok(summary)
    }

    async fn ingest_device(
        &self,
        device: &GeneratedDevice,
        cancel: &CancellationToken,
    ) -> DeviceOutcome {
        let device_id = device.record.device_id();
        let mut outcome = DeviceOutcome::default();

        if let Err(e) = self.upsert_metadata(&device.metadata, cancel).await {
            outcome.failure = Some(failure(device_id, IngestStage::Metadata, &e));
            return outcome;
        }

        for log in &device.logs {
            match self.append_log(log, cancel).await {
                Ok(_) => outcome.logs += 1,
                Err(e) => {
                    outcome.failure = Some(failure(device_id, IngestStage::Logs, &e));
                    return outcome;
                }
            }
        }

        match self
            .store_readings(
                device_id,
                device.record.device_type(),
                &device.history,
                cancel,
            )
            .await
        {
            Ok(points) => outcome.points = points,
            Err(e) => {
                if let GatewayError::PartialWrite { succeeded, .. } = e {
                    outcome.points = succeeded;
                }
                outcome.failure = Some(failure(device_id, IngestStage::SensorData, &e));
            }
        }
        outcome
    }
}

fn failure(device_id: &str, stage: IngestStage, error: &GatewayError) -> DeviceFailure {
    warn!(device_id = %device_id, stage = ?stage, error = %error, "Device ingest failed");
    DeviceFailure {
        device_id: device_id.to_string(),
        stage,
        error: error.public_message(),
    }
}

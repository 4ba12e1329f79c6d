use super::{SensorReading, SensorRecord, TimeRange};
use crate::GatewayError;
use async_trait::async_trait;

/// Repository interface for the time-series store
///
/// Points are written to one measurement, tagged by `device_id` and `device_type`.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait TimeSeriesRepository: Send + Sync {
    /// Write a single point
    async fn write_point(&self, device_id: &str, reading: &SensorReading)
    -> Result<(), GatewayError>;

    /// Points of one device inside the range, oldest first. No data is `Ok(vec![])`.
    async fn query_range(
        &self,
        device_id: &str,
        range: &TimeRange,
    ) -> Result<Vec<SensorRecord>, GatewayError>;

    /// Drop every point tagged with the device
    async fn delete_device(&self, device_id: &str) -> Result<(), GatewayError>;
}

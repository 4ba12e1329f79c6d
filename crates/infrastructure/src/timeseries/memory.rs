use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::GatewayError;
use domain::telemetry::{SensorReading, SensorRecord, TimeRange, TimeSeriesRepository};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// In-process time-series store.
///
/// A point is identified by device and timestamp; writing the same pair again
/// replaces the point, as InfluxDB does for an identical series and time.
#[derive(Default)]
pub struct InMemoryTimeSeriesRepository {
    points: RwLock<HashMap<String, BTreeMap<DateTime<Utc>, SensorReading>>>,
}

impl InMemoryTimeSeriesRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn point_count(&self) -> usize {
        self.points.read().await.values().map(BTreeMap::len).sum()
    }
}

#[async_trait]
impl TimeSeriesRepository for InMemoryTimeSeriesRepository {
    async fn write_point(
        &self,
        device_id: &str,
        reading: &SensorReading,
    ) -> Result<(), GatewayError> {
        self.points
            .write()
            .await
            .entry(device_id.to_string())
            .or_default()
            .insert(reading.timestamp(), reading.clone());
        Ok(())
    }

    async fn query_range(
        &self,
        device_id: &str,
        range: &TimeRange,
    ) -> Result<Vec<SensorRecord>, GatewayError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let points = self.points.read().await;
        let Some(series) = points.get(device_id) else {
            return Ok(Vec::new());
        };

        Ok(series
            .range(range.start..range.end)
            .map(|(_, reading)| SensorRecord {
                device_id: device_id.to_string(),
                reading: reading.clone(),
            })
            .collect())
    }

    async fn delete_device(&self, device_id: &str) -> Result<(), GatewayError> {
        self.points.write().await.remove(device_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn plug(timestamp: DateTime<Utc>) -> SensorReading {
        SensorReading::SmartPlug {
            power_on: true,
            energy_usage: 12.0,
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_range_is_half_open_and_ascending() {
        let repo = InMemoryTimeSeriesRepository::new();
        let t0 = Utc::now();
        for offset in [10, 0, 5] {
            repo.write_point("plug_1", &plug(t0 + Duration::minutes(offset)))
                .await
                .unwrap();
        }

        let records = repo
            .query_range("plug_1", &TimeRange::new(t0, t0 + Duration::minutes(10)))
            .await
            .unwrap();

        let stamps: Vec<_> = records.iter().map(|r| r.reading.timestamp()).collect();
        assert_eq!(stamps, vec![t0, t0 + Duration::minutes(5)]);
    }

    #[tokio::test]
    async fn test_same_timestamp_overwrites() {
        let repo = InMemoryTimeSeriesRepository::new();
        let t0 = Utc::now();
        repo.write_point("plug_1", &plug(t0)).await.unwrap();
        repo.write_point("plug_1", &plug(t0)).await.unwrap();
        assert_eq!(repo.point_count().await, 1);

        repo.delete_device("plug_1").await.unwrap();
        assert_eq!(repo.point_count().await, 0);
    }
}

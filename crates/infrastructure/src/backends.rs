//! Wiring of the three backend adapters selected by the run mode

use crate::config::{BackendMode, ServiceConfig};
use crate::database::{InMemoryDeviceRepository, PostgresDeviceRepository};
use crate::storage::ObjectStoreRepository;
use crate::timeseries::{InMemoryTimeSeriesRepository, InfluxTimeSeriesRepository};
use domain::device::DeviceRepository;
use domain::object::ObjectRepository;
use domain::telemetry::TimeSeriesRepository;
use std::sync::Arc;
use tracing::{info, warn};

/// One adapter per backend port
#[derive(Clone)]
pub struct Backends {
    pub timeseries: Arc<dyn TimeSeriesRepository>,
    pub devices: Arc<dyn DeviceRepository>,
    pub objects: Arc<dyn ObjectRepository>,
}

impl Backends {
    /// In-process adapters; nothing leaves the process
    pub fn in_memory(bucket: &str) -> Self {
        Self {
            timeseries: Arc::new(InMemoryTimeSeriesRepository::new()),
            devices: Arc::new(InMemoryDeviceRepository::new()),
            objects: Arc::new(ObjectStoreRepository::in_memory(bucket)),
        }
    }

    /// Build the adapters for the configured mode. Live mode connects to
    /// PostgreSQL and applies migrations before returning.
    pub async fn connect(config: &ServiceConfig) -> anyhow::Result<Self> {
        match config.backend_mode {
            BackendMode::Memory => {
                info!("🧪 Using in-memory backends");
                Ok(Self::in_memory(&config.s3.bucket))
            }
            BackendMode::Live => {
                let influx = InfluxTimeSeriesRepository::new(
                    &config.influxdb,
                    config.gateway.call_timeout(),
                )?;
                if influx.health_check().await {
                    info!(url = %config.influxdb.url, "✅ InfluxDB reachable");
                } else {
                    warn!(url = %config.influxdb.url, "InfluxDB health check failed, continuing");
                }

                let postgres = PostgresDeviceRepository::connect(&config.postgres).await?;
                postgres.migrate().await?;

                let objects = ObjectStoreRepository::s3(&config.s3)?;

                Ok(Self {
                    timeseries: Arc::new(influx),
                    devices: Arc::new(postgres),
                    objects: Arc::new(objects),
                })
            }
        }
    }
}

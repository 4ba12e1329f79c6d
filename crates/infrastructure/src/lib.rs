//! Infrastructure layer - Backend adapters and configuration

pub mod backends;
pub mod config;
pub mod database;
pub mod storage;
pub mod timeseries;

pub use backends::Backends;
pub use config::{BackendMode, ServiceConfig};
pub use database::{InMemoryDeviceRepository, PostgresDeviceRepository};
pub use storage::ObjectStoreRepository;
pub use timeseries::{InMemoryTimeSeriesRepository, InfluxTimeSeriesRepository};

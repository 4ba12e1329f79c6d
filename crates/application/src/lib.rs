//! Application layer - Gateway use cases and synthetic data generation

pub mod gateway;
pub mod generator;

pub use gateway::{
    DeletionReport, DeviceFailure, GatewaySettings, IngestStage, IngestSummary, LogBlob,
    TelemetryGateway,
};
pub use generator::{GeneratedDevice, GeneratedFleet, TelemetryGenerator};

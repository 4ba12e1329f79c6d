//! Domain layer - Pure telemetry model with no external dependencies
//!
//! This crate contains:
//! - Entities (DeviceRecord, DeviceMetadata, SystemLogEntry, StoredObject)
//! - Value Objects (DeviceType, SensorReading, FirmwareVersion, ObjectKey)
//! - The gateway error taxonomy
//! - Repository interfaces (traits) for the three backends
//!
//! Principles:
//! - No dependencies on infrastructure
//! - Invalid shapes are rejected at construction time
//! - Backends are reached only through the repository traits

pub mod device;
pub mod error;
pub mod object;
pub mod telemetry;

// Re-export commonly used types
pub use device::{
    DeviceMetadata, DeviceMetadataRecord, DeviceRecord, DeviceRepository, DeviceStatus,
    DeviceType, EventType, FirmwareVersion, LogQuery, NewSystemLog, SystemLogEntry,
};
pub use error::{Backend, GatewayError, Result};
pub use object::{KeyParts, ObjectBody, ObjectCategory, ObjectRepository, StoredObject};
pub use telemetry::{FieldValue, SensorReading, SensorRecord, TimeRange, TimeSeriesRepository};

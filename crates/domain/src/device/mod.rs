pub mod entity;
pub mod log;
pub mod metadata;
pub mod repository;

pub use entity::{DeviceRecord, DeviceStatus, DeviceType, validate_device_id};
pub use log::{EventType, LogQuery, NewSystemLog, SystemLogEntry};
pub use metadata::{DeviceMetadata, DeviceMetadataRecord, FirmwareVersion};
pub use repository::{DeviceRepository, DeviceRowsDeleted};

#[cfg(any(test, feature = "mocks"))]
pub use repository::MockDeviceRepository;

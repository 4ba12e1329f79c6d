use crate::error::{GatewayError, Result};
use crate::telemetry::SensorReading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of smart-home device. Selects the shape of its sensor readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Thermostat,
    Camera,
    MotionSensor,
    DoorLock,
    SmartPlug,
}

impl DeviceType {
    pub const ALL: [DeviceType; 5] = [
        Self::Thermostat,
        Self::Camera,
        Self::MotionSensor,
        Self::DoorLock,
        Self::SmartPlug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thermostat => "thermostat",
            Self::Camera => "camera",
            Self::MotionSensor => "motion_sensor",
            Self::DoorLock => "door_lock",
            Self::SmartPlug => "smart_plug",
        }
    }
}

impl std::str::FromStr for DeviceType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| GatewayError::Validation(format!("Unknown device type: {}", s)))
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device operational status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Active,
    Inactive,
    Maintenance,
    Error,
}

impl DeviceStatus {
    pub const ALL: [DeviceStatus; 4] = [
        Self::Active,
        Self::Inactive,
        Self::Maintenance,
        Self::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Maintenance => "maintenance",
            Self::Error => "error",
        }
    }
}

/// Validates a device identifier before it is used as a key anywhere.
///
/// Rules:
/// - Must be non-empty
/// - Max length 50 characters (relational column width)
/// - Only alphanumeric, underscore and hyphen, so it is safe inside object keys
///   and time-series tag values
pub fn validate_device_id(device_id: &str) -> Result<()> {
    if device_id.is_empty() {
        return Err(GatewayError::Validation(
            "Device ID cannot be empty".to_string(),
        ));
    }

    if device_id.len() > 50 {
        return Err(GatewayError::Validation(format!(
            "Device ID too long: {} chars (max 50)",
            device_id.len()
        )));
    }

    if !device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(GatewayError::Validation(format!(
            "Device ID {device_id} must contain only alphanumeric, underscore and hyphen"
        )));
    }

    Ok(())
}

/// A snapshot of one device as produced by the generator.
/// Immutable once built; never retained beyond the write call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    device_id: String,
    device_type: DeviceType,
    location: String,
    status: DeviceStatus,
    sensor_data: SensorReading,
    timestamp: DateTime<Utc>,
}

impl DeviceRecord {
    pub fn new(
        device_id: impl Into<String>,
        location: impl Into<String>,
        status: DeviceStatus,
        sensor_data: SensorReading,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let device_id = device_id.into();
        validate_device_id(&device_id)?;

        Ok(Self {
            device_id,
            device_type: sensor_data.device_type(),
            location: location.into(),
            status,
            sensor_data,
            timestamp,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    pub fn sensor_data(&self) -> &SensorReading {
        &self.sensor_data
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

use crate::device::DeviceType;
use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single field value of a time-series point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Bool(bool),
}

impl FieldValue {
    /// Parses a field as rendered by a text protocol (`true`/`false` or a number)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "true" => Some(Self::Bool(true)),
            "false" => Some(Self::Bool(false)),
            other => other.parse::<f64>().ok().map(Self::Float),
        }
    }
}

/// One sensor reading. The variant is the device type; each variant carries
/// exactly the fields that device reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "device_type", rename_all = "snake_case")]
pub enum SensorReading {
    Thermostat {
        temperature: f64,
        humidity: f64,
        pressure: f64,
        timestamp: DateTime<Utc>,
    },
    Camera {
        motion_detected: bool,
        brightness: f64,
        timestamp: DateTime<Utc>,
    },
    MotionSensor {
        motion_detected: bool,
        sensitivity: f64,
        timestamp: DateTime<Utc>,
    },
    DoorLock {
        locked: bool,
        battery_level: f64,
        timestamp: DateTime<Utc>,
    },
    SmartPlug {
        power_on: bool,
        energy_usage: f64,
        timestamp: DateTime<Utc>,
    },
}

impl SensorReading {
    pub fn device_type(&self) -> DeviceType {
        match self {
            Self::Thermostat { .. } => DeviceType::Thermostat,
            Self::Camera { .. } => DeviceType::Camera,
            Self::MotionSensor { .. } => DeviceType::MotionSensor,
            Self::DoorLock { .. } => DeviceType::DoorLock,
            Self::SmartPlug { .. } => DeviceType::SmartPlug,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Thermostat { timestamp, .. }
            | Self::Camera { timestamp, .. }
            | Self::MotionSensor { timestamp, .. }
            | Self::DoorLock { timestamp, .. }
            | Self::SmartPlug { timestamp, .. } => *timestamp,
        }
    }

    /// Field names reported by a device type, in point order
    pub fn field_names(device_type: DeviceType) -> &'static [&'static str] {
        match device_type {
            DeviceType::Thermostat => &["temperature", "humidity", "pressure"],
            DeviceType::Camera => &["motion_detected", "brightness"],
            DeviceType::MotionSensor => &["motion_detected", "sensitivity"],
            DeviceType::DoorLock => &["locked", "battery_level"],
            DeviceType::SmartPlug => &["power_on", "energy_usage"],
        }
    }

    /// Field set of this reading, excluding the timestamp
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        use FieldValue::{Bool, Float};

        match *self {
            Self::Thermostat {
                temperature,
                humidity,
                pressure,
                ..
            } => vec![
                ("temperature", Float(temperature)),
                ("humidity", Float(humidity)),
                ("pressure", Float(pressure)),
            ],
            Self::Camera {
                motion_detected,
                brightness,
                ..
            } => vec![
                ("motion_detected", Bool(motion_detected)),
                ("brightness", Float(brightness)),
            ],
            Self::MotionSensor {
                motion_detected,
                sensitivity,
                ..
            } => vec![
                ("motion_detected", Bool(motion_detected)),
                ("sensitivity", Float(sensitivity)),
            ],
            Self::DoorLock {
                locked,
                battery_level,
                ..
            } => vec![
                ("locked", Bool(locked)),
                ("battery_level", Float(battery_level)),
            ],
            Self::SmartPlug {
                power_on,
                energy_usage,
                ..
            } => vec![
                ("power_on", Bool(power_on)),
                ("energy_usage", Float(energy_usage)),
            ],
        }
    }

    /// Rebuilds a reading from a stored field set.
    /// Missing or mistyped fields are a validation error.
    pub fn from_fields(
        device_type: DeviceType,
        timestamp: DateTime<Utc>,
        fields: &HashMap<String, FieldValue>,
    ) -> Result<Self> {
        let reading = match device_type {
            DeviceType::Thermostat => Self::Thermostat {
                temperature: float(fields, "temperature")?,
                humidity: float(fields, "humidity")?,
                pressure: float(fields, "pressure")?,
                timestamp,
            },
            DeviceType::Camera => Self::Camera {
                motion_detected: flag(fields, "motion_detected")?,
                brightness: float(fields, "brightness")?,
                timestamp,
            },
            DeviceType::MotionSensor => Self::MotionSensor {
                motion_detected: flag(fields, "motion_detected")?,
                sensitivity: float(fields, "sensitivity")?,
                timestamp,
            },
            DeviceType::DoorLock => Self::DoorLock {
                locked: flag(fields, "locked")?,
                battery_level: float(fields, "battery_level")?,
                timestamp,
            },
            DeviceType::SmartPlug => Self::SmartPlug {
                power_on: flag(fields, "power_on")?,
                energy_usage: float(fields, "energy_usage")?,
                timestamp,
            },
        };
        Ok(reading)
    }
}

fn float(fields: &HashMap<String, FieldValue>, name: &str) -> Result<f64> {
    match fields.get(name) {
        Some(FieldValue::Float(value)) => Ok(*value),
        Some(FieldValue::Bool(_)) => Err(GatewayError::Validation(format!(
            "Field {name} must be numeric"
        ))),
        None => Err(GatewayError::Validation(format!("Missing field {name}"))),
    }
}

fn flag(fields: &HashMap<String, FieldValue>, name: &str) -> Result<bool> {
    match fields.get(name) {
        Some(FieldValue::Bool(value)) => Ok(*value),
        Some(FieldValue::Float(_)) => Err(GatewayError::Validation(format!(
            "Field {name} must be boolean"
        ))),
        None => Err(GatewayError::Validation(format!("Missing field {name}"))),
    }
}

/// A reading read back from the time-series store, with the device it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub device_id: String,
    #[serde(flatten)]
    pub reading: SensorReading,
}

/// Half-open time window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

use super::entity::{DeviceType, validate_device_id};
use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column widths of `device_metadata`, counted in characters
pub const MAX_FIRMWARE_VERSION_CHARS: usize = 20;
pub const MAX_LOCATION_CHARS: usize = 100;
pub const MAX_MANUFACTURER_CHARS: usize = 100;

/// Value object for a firmware version string of the form `vMAJOR.MINOR`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FirmwareVersion(String);

impl FirmwareVersion {
    pub fn new(version: impl Into<String>) -> Result<Self> {
        let version = version.into();

        if version.chars().count() > MAX_FIRMWARE_VERSION_CHARS {
            return Err(GatewayError::Validation(format!(
                "Firmware version {version} is longer than {MAX_FIRMWARE_VERSION_CHARS} chars"
            )));
        }

        let numbers = version.strip_prefix('v').ok_or_else(|| {
            GatewayError::Validation(format!("Firmware version {version} must start with 'v'"))
        })?;

        let valid = match numbers.split_once('.') {
            Some((major, minor)) => is_number(major) && is_number(minor),
            None => false,
        };

        if !valid {
            return Err(GatewayError::Validation(format!(
                "Firmware version {version} must look like vMAJOR.MINOR"
            )));
        }

        Ok(Self(version))
    }

    pub fn from_parts(major: u32, minor: u32) -> Self {
        Self(format!("v{}.{}", major, minor))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_number(part: &str) -> bool {
    !part.is_empty() && part.chars().all(|c| c.is_ascii_digit())
}

impl TryFrom<String> for FirmwareVersion {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<FirmwareVersion> for String {
    fn from(value: FirmwareVersion) -> Self {
        value.0
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive metadata for one device, upserted by `device_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub device_id: String,
    pub device_type: DeviceType,
    pub location: String,
    pub manufacturer: String,
    pub firmware_version: FirmwareVersion,
    pub last_maintenance: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DeviceMetadata {
    pub fn validate(&self) -> Result<()> {
        validate_device_id(&self.device_id)?;

        if self.location.trim().is_empty() {
            return Err(GatewayError::Validation(
                "Location cannot be empty".to_string(),
            ));
        }
        if self.location.chars().count() > MAX_LOCATION_CHARS {
            return Err(GatewayError::Validation(format!(
                "Location is limited to {MAX_LOCATION_CHARS} chars"
            )));
        }
        if self.manufacturer.chars().count() > MAX_MANUFACTURER_CHARS {
            return Err(GatewayError::Validation(format!(
                "Manufacturer is limited to {MAX_MANUFACTURER_CHARS} chars"
            )));
        }
        Ok(())
    }
}

/// A metadata row as stored. `updated_at` is assigned by the store on every upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetadataRecord {
    #[serde(flatten)]
    pub metadata: DeviceMetadata,
    pub updated_at: DateTime<Utc>,
}

impl DeviceMetadataRecord {
    pub fn device_id(&self) -> &str {
        &self.metadata.device_id
    }
}

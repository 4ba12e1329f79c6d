use crate::device::validate_device_id;
use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};

/// Format of the timestamp segment in object keys. Millisecond precision so
/// two uploads in the same second do not overwrite each other.
const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// What kind of blob is stored. Decides the key namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectCategory {
    /// `images/{device_id}/{timestamp}.jpg`
    Image,
    /// `logs/{device_id}/{timestamp}.json`
    LogBlob,
    /// `devices/{device_id}/documents/{timestamp}.{extension}`
    Document { extension: String },
}

impl ObjectCategory {
    pub fn document(extension: impl Into<String>) -> Result<Self> {
        let extension = extension.into();
        validate_segment(&extension, "Document extension", 10)?;
        Ok(Self::Document { extension })
    }

    pub fn extension(&self) -> &str {
        match self {
            Self::Image => "jpg",
            Self::LogBlob => "json",
            Self::Document { extension } => extension,
        }
    }

    /// Content type used when the caller does not provide one
    pub fn default_content_type(&self) -> String {
        match self {
            Self::Image => "image/jpeg".to_string(),
            Self::LogBlob => "application/json".to_string(),
            Self::Document { extension } => format!("application/{}", extension),
        }
    }
}

/// The pieces an object key is built from. Keys are never concatenated ad hoc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParts {
    pub category: ObjectCategory,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
}

impl KeyParts {
    pub fn new(
        category: ObjectCategory,
        device_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let device_id = device_id.into();
        validate_device_id(&device_id)?;
        Ok(Self {
            category,
            device_id,
            timestamp,
        })
    }

    pub fn key(&self) -> String {
        let stamp = self.timestamp.format(KEY_TIMESTAMP_FORMAT);
        let extension = self.category.extension();
        match &self.category {
            ObjectCategory::Image => format!("images/{}/{}.{}", self.device_id, stamp, extension),
            ObjectCategory::LogBlob => format!("logs/{}/{}.{}", self.device_id, stamp, extension),
            ObjectCategory::Document { .. } => format!(
                "devices/{}/documents/{}.{}",
                self.device_id, stamp, extension
            ),
        }
    }
}

pub fn images_prefix(device_id: &str) -> String {
    format!("images/{}/", device_id)
}

pub fn log_blobs_prefix(device_id: &str) -> String {
    format!("logs/{}/", device_id)
}

/// Prefix of a device's files, optionally narrowed to one kind (`document` → `documents/`)
pub fn files_prefix(device_id: &str, kind: Option<&str>) -> Result<String> {
    match kind {
        Some(kind) => {
            validate_segment(kind, "File kind", 30)?;
            Ok(format!("devices/{}/{}s/", device_id, kind))
        }
        None => Ok(format!("devices/{}/", device_id)),
    }
}

/// Every prefix a device owns in the object store
pub fn device_prefixes(device_id: &str) -> [String; 3] {
    [
        images_prefix(device_id),
        log_blobs_prefix(device_id),
        format!("devices/{}/", device_id),
    ]
}

fn validate_segment(value: &str, what: &str, max_len: usize) -> Result<()> {
    if value.is_empty() || value.len() > max_len {
        return Err(GatewayError::Validation(format!(
            "{what} must be 1-{max_len} chars"
        )));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(GatewayError::Validation(format!(
            "{what} {value} must be alphanumeric"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
            + chrono::Duration::milliseconds(42)
    }

    #[test]
    fn test_image_key_layout() {
        let parts = KeyParts::new(ObjectCategory::Image, "device_1", at()).unwrap();
        assert_eq!(parts.key(), "images/device_1/20240309_140507_042.jpg");
    }

    #[test]
    fn test_log_blob_key_layout() {
        let parts = KeyParts::new(ObjectCategory::LogBlob, "device_1", at()).unwrap();
        assert_eq!(parts.key(), "logs/device_1/20240309_140507_042.json");
    }

    #[test]
    fn test_document_key_layout() {
        let category = ObjectCategory::document("pdf").unwrap();
        assert_eq!(category.default_content_type(), "application/pdf");
        let parts = KeyParts::new(category, "device_7", at()).unwrap();
        assert_eq!(
            parts.key(),
            "devices/device_7/documents/20240309_140507_042.pdf"
        );
    }

    #[test]
    fn test_rejects_unsafe_segments() {
        assert!(ObjectCategory::document("../x").is_err());
        assert!(ObjectCategory::document("").is_err());
        assert!(KeyParts::new(ObjectCategory::Image, "a/b", at()).is_err());
        assert!(files_prefix("device_1", Some("doc/../")).is_err());
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(images_prefix("device_1"), "images/device_1/");
        assert_eq!(
            files_prefix("device_1", Some("document")).unwrap(),
            "devices/device_1/documents/"
        );
        assert_eq!(files_prefix("device_1", None).unwrap(), "devices/device_1/");
        assert_eq!(device_prefixes("d").len(), 3);
    }
}

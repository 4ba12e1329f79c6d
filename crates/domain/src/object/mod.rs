pub mod key;
pub mod repository;

pub use key::{
    KeyParts, ObjectCategory, device_prefixes, files_prefix, images_prefix, log_blobs_prefix,
};
pub use repository::ObjectRepository;

#[cfg(any(test, feature = "mocks"))]
pub use repository::MockObjectRepository;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing entry for an object held by the object store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// The bytes of one object, as read back
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectBody {
    pub key: String,
    pub content_type: String,
    pub body: Bytes,
}

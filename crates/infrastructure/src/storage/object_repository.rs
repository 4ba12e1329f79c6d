use crate::config::S3Config;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use domain::object::{ObjectBody, ObjectRepository, StoredObject};
use domain::{Backend, GatewayError};
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectMeta, ObjectStore, PutOptions, PutPayload,
};
use std::sync::Arc;
use tracing::{debug, info};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// ObjectRepository over any `object_store` backend.
///
/// Live mode talks to S3; tests and memory mode use `InMemory`. URLs always
/// take the `s3://{bucket}/{key}` form.
#[derive(Clone)]
pub struct ObjectStoreRepository {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStoreRepository {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn s3(config: &S3Config) -> anyhow::Result<Self> {
        info!(bucket = %config.bucket, region = %config.region, "Initializing S3 object store");

        let mut builder = AmazonS3Builder::from_env()
            .with_region(&config.region)
            .with_bucket_name(&config.bucket)
            .with_allow_http(config.allow_http);
        if let Some(key_id) = &config.access_key_id {
            builder = builder.with_access_key_id(key_id);
        }
        if let Some(secret) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        let store = builder.build().context("failed to build S3 client")?;
        Ok(Self::new(Arc::new(store), &config.bucket))
    }

    pub fn in_memory(bucket: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), bucket)
    }

    fn url(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    fn stored(&self, meta: ObjectMeta) -> StoredObject {
        let key = meta.location.to_string();
        StoredObject {
            url: self.url(&key),
            key,
            size: meta.size as u64,
            last_modified: meta.last_modified,
        }
    }
}

fn parse_path(key: &str) -> Result<Path, GatewayError> {
    Path::parse(key).map_err(|e| GatewayError::Validation(format!("Invalid object key {}: {}", key, e)))
}

fn map_store_error(e: object_store::Error) -> GatewayError {
    match e {
        object_store::Error::NotFound { path, .. } => {
            GatewayError::NotFound(format!("Object {} not found", path))
        }
        other => GatewayError::backend(Backend::ObjectStore, other.to_string()),
    }
}

#[async_trait]
impl ObjectRepository for ObjectStoreRepository {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, GatewayError> {
        let path = parse_path(key)?;
        let size = body.len() as u64;

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&path, PutPayload::from(body), options)
            .await
            .map_err(map_store_error)?;

        debug!(key = %key, size, "Object written");
        Ok(StoredObject {
            key: key.to_string(),
            url: self.url(key),
            size,
            last_modified: Utc::now(),
        })
    }

    async fn get(&self, key: &str) -> Result<ObjectBody, GatewayError> {
        let path = parse_path(key)?;
        let result = self.store.get(&path).await.map_err(map_store_error)?;

        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| v.to_string())
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
        let body = result.bytes().await.map_err(map_store_error)?;

        Ok(ObjectBody {
            key: key.to_string(),
            content_type,
            body,
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, GatewayError> {
        let prefix = parse_path(prefix.trim_end_matches('/'))?;
        let metas: Vec<ObjectMeta> = self
            .store
            .list(Some(&prefix))
            .try_collect()
            .await
            .map_err(map_store_error)?;

        Ok(metas.into_iter().map(|m| self.stored(m)).collect())
    }

    async fn delete(&self, key: &str) -> Result<(), GatewayError> {
        let path = parse_path(key)?;
        self.store.delete(&path).await.map_err(map_store_error)
    }
}

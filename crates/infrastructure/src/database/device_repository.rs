use crate::config::PostgresConfig;
use crate::database::models::{DeviceMetadataRow, SystemLogRow};
use async_trait::async_trait;
use domain::device::{
    DeviceMetadata, DeviceMetadataRecord, DeviceRepository, DeviceRowsDeleted, DeviceType,
    LogQuery, NewSystemLog, SystemLogEntry,
};
use domain::{Backend, GatewayError};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{debug, info};

const METADATA_COLUMNS: &str = "device_id, device_type, location, manufacturer, \
     firmware_version, last_maintenance, created_at, updated_at";

const LOG_COLUMNS: &str = "log_id, device_id, event_type, message, timestamp, created_at";

/// PostgreSQL code for foreign_key_violation
const FOREIGN_KEY_VIOLATION: &str = "23503";
const STRING_DATA_RIGHT_TRUNCATION: &str = "22001";

/// PostgreSQL implementation of DeviceRepository
///
/// Every call checks a connection out of the pool; sqlx returns it on drop,
/// error paths included.
#[derive(Clone)]
pub struct PostgresDeviceRepository {
    pool: PgPool,
}

impl PostgresDeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PostgresConfig) -> anyhow::Result<Self> {
        info!(host = %config.host, port = config.port, database = %config.database, "Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(config.connect_options())
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("✅ Migrations applied successfully");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_sqlx_error(e: sqlx::Error, device_id: &str) -> GatewayError {
    match e {
        sqlx::Error::Database(ref db_err)
            if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) =>
        {
            GatewayError::ForeignKeyViolation {
                device_id: device_id.to_string(),
            }
        }
        sqlx::Error::Database(ref db_err)
            if db_err.code().as_deref() == Some(STRING_DATA_RIGHT_TRUNCATION) =>
        {
            GatewayError::Validation(format!("Value too long for device {}", device_id))
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            GatewayError::unavailable(Backend::Relational, e.to_string())
        }
        other => GatewayError::backend(Backend::Relational, other.to_string()),
    }
}

#[async_trait]
impl DeviceRepository for PostgresDeviceRepository {
    async fn upsert_metadata(
        &self,
        metadata: &DeviceMetadata,
    ) -> Result<DeviceMetadataRecord, GatewayError> {
        // created_at survives the conflict; updated_at never moves backwards
        let sql = format!(
            r#"
            INSERT INTO device_metadata (
                device_id, device_type, location, manufacturer,
                firmware_version, last_maintenance, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, clock_timestamp())
            ON CONFLICT (device_id) DO UPDATE SET
                device_type = EXCLUDED.device_type,
                location = EXCLUDED.location,
                manufacturer = EXCLUDED.manufacturer,
                firmware_version = EXCLUDED.firmware_version,
                last_maintenance = EXCLUDED.last_maintenance,
                updated_at = GREATEST(clock_timestamp(), device_metadata.updated_at)
            RETURNING {}
            "#,
            METADATA_COLUMNS
        );

        let row: DeviceMetadataRow = sqlx::query_as(&sql)
            .bind(&metadata.device_id)
            .bind(metadata.device_type.as_str())
            .bind(&metadata.location)
            .bind(&metadata.manufacturer)
            .bind(metadata.firmware_version.as_str())
            .bind(metadata.last_maintenance)
            .bind(metadata.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, &metadata.device_id))?;

        debug!(device_id = %metadata.device_id, "Metadata upserted");
        row.try_into()
    }

    async fn find_metadata(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceMetadataRecord>, GatewayError> {
        let sql = format!(
            "SELECT {} FROM device_metadata WHERE device_id = $1",
            METADATA_COLUMNS
        );
        let row: Option<DeviceMetadataRow> = sqlx::query_as(&sql)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, device_id))?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_metadata(&self) -> Result<Vec<DeviceMetadataRecord>, GatewayError> {
        let sql = format!(
            "SELECT {} FROM device_metadata ORDER BY device_id",
            METADATA_COLUMNS
        );
        let rows: Vec<DeviceMetadataRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, ""))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn append_log(&self, entry: &NewSystemLog) -> Result<i64, GatewayError> {
        let log_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO system_logs (device_id, event_type, message, timestamp)
            VALUES ($1, $2, $3, $4)
            RETURNING log_id
            "#,
        )
        .bind(&entry.device_id)
        .bind(entry.event_type.as_str())
        .bind(&entry.message)
        .bind(entry.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, &entry.device_id))?;

        Ok(log_id)
    }

    async fn query_logs(&self, query: &LogQuery) -> Result<Vec<SystemLogEntry>, GatewayError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM system_logs WHERE device_id = ",
            LOG_COLUMNS
        ));
        builder.push_bind(query.device_id.clone());
        if let Some(start) = query.start {
            builder.push(" AND timestamp >= ").push_bind(start);
        }
        if let Some(end) = query.end {
            builder.push(" AND timestamp <= ").push_bind(end);
        }
        builder.push(" ORDER BY timestamp DESC, log_id DESC");

        let rows: Vec<SystemLogRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, &query.device_id))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn device_types(&self) -> Result<Vec<DeviceType>, GatewayError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT device_type FROM device_metadata ORDER BY device_type",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, ""))?;

        names
            .iter()
            .map(|name| {
                name.parse().map_err(|e: GatewayError| {
                    GatewayError::backend(Backend::Relational, e.to_string())
                })
            })
            .collect()
    }

    async fn device_locations(&self) -> Result<Vec<String>, GatewayError> {
        sqlx::query_scalar("SELECT DISTINCT location FROM device_metadata ORDER BY location")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, ""))
    }

    async fn delete_device(&self, device_id: &str) -> Result<DeviceRowsDeleted, GatewayError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(e, device_id))?;

        let logs = sqlx::query("DELETE FROM system_logs WHERE device_id = $1")
            .bind(device_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, device_id))?
            .rows_affected();

        let metadata = sqlx::query("DELETE FROM device_metadata WHERE device_id = $1")
            .bind(device_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, device_id))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error(e, device_id))?;

        Ok(DeviceRowsDeleted { logs, metadata })
    }
}

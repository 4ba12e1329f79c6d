use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which adapters back the gateway
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// InfluxDB, PostgreSQL and S3
    #[default]
    Live,
    /// In-process adapters, nothing leaves the process
    Memory,
}

impl std::str::FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown backend mode: {}", other)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    pub call_timeout_secs: u64,
    pub write_concurrency: usize,
    pub device_concurrency: usize,
    pub default_history_hours: u32,
    /// Fixed generator seed; random per request when unset
    #[serde(default)]
    pub generator_seed: Option<u64>,
}

impl GatewayConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InfluxConfig {
    pub url: String,
    #[serde(default)]
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub measurement: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl PostgresConfig {
    pub fn connect_options(&self) -> sqlx::postgres::PgConnectOptions {
        sqlx::postgres::PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct S3Config {
    pub region: String,
    pub bucket: String,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub backend_mode: BackendMode,
    pub api: ApiConfig,
    pub gateway: GatewayConfig,
    pub influxdb: InfluxConfig,
    pub postgres: PostgresConfig,
    pub s3: S3Config,
}

/// Flat variable names the service has always honoured, and the key each one sets
const LEGACY_ENV: [(&str, &str); 15] = [
    ("INFLUXDB_URL", "influxdb.url"),
    ("INFLUXDB_TOKEN", "influxdb.token"),
    ("INFLUXDB_ORG", "influxdb.org"),
    ("INFLUXDB_BUCKET", "influxdb.bucket"),
    ("POSTGRES_HOST", "postgres.host"),
    ("POSTGRES_PORT", "postgres.port"),
    ("POSTGRES_DB", "postgres.database"),
    ("POSTGRES_USER", "postgres.user"),
    ("POSTGRES_PASSWORD", "postgres.password"),
    ("AWS_ACCESS_KEY_ID", "s3.access_key_id"),
    ("AWS_SECRET_ACCESS_KEY", "s3.secret_access_key"),
    ("AWS_REGION", "s3.region"),
    ("S3_BUCKET_NAME", "s3.bucket"),
    ("API_HOST", "api.host"),
    ("API_PORT", "api.port"),
];

/// Keys set by the legacy flat variables found through `lookup`
pub fn legacy_overrides<F>(lookup: F) -> Vec<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    LEGACY_ENV
        .iter()
        .filter_map(|(var, key)| {
            lookup(var)
                .filter(|v| !v.is_empty())
                .map(|value| (*key, value))
        })
        .collect()
}

impl ServiceConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        Self::load_with_overrides(config_dir, &[])
    }

    /// Layering, lowest to highest priority:
    /// built-in defaults, `{config_dir}/default`, `{config_dir}/{RUN_MODE}`,
    /// `TELEMETRY__SECTION__KEY` variables, legacy flat variables, `overrides`.
    pub fn load_with_overrides(
        config_dir: &str,
        overrides: &[(&str, String)],
    ) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Self::defaults()?
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // e.g. TELEMETRY__POSTGRES__HOST=10.0.0.5
            .add_source(
                Environment::with_prefix("TELEMETRY")
                    .separator("__")
                    .try_parsing(true),
            );

        for (key, value) in legacy_overrides(|var| std::env::var(var).ok()) {
            builder = builder.set_override(key, value)?;
        }
        for (key, value) in overrides {
            builder = builder.set_override(*key, value.clone())?;
        }

        builder.build()?.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("backend_mode", "live")?
            .set_default("api.host", "0.0.0.0")?
            .set_default("api.port", 8001)?
            .set_default("gateway.call_timeout_secs", 30)?
            .set_default("gateway.write_concurrency", 16)?
            .set_default("gateway.device_concurrency", 4)?
            .set_default("gateway.default_history_hours", 24)?
            .set_default("influxdb.url", "http://localhost:8086")?
            .set_default("influxdb.token", "")?
            .set_default("influxdb.org", "smart-home")?
            .set_default("influxdb.bucket", "sensor-data")?
            .set_default("influxdb.measurement", "sensor_data")?
            .set_default("postgres.host", "localhost")?
            .set_default("postgres.port", 5432)?
            .set_default("postgres.database", "smart_home")?
            .set_default("postgres.user", "postgres")?
            .set_default("postgres.password", "")?
            .set_default("postgres.max_connections", 10)?
            .set_default("postgres.acquire_timeout_secs", 5)?
            .set_default("s3.region", "us-east-1")?
            .set_default("s3.bucket", "smart-home-data")?
            .set_default("s3.allow_http", false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const NO_DIR: &str = "/nonexistent/telemetry-config";

    #[test]
    fn test_defaults_without_files() {
        let config = ServiceConfig::load_with_overrides(NO_DIR, &[]).unwrap();

        assert_eq!(config.influxdb.measurement, "sensor_data");
        assert_eq!(config.gateway.write_concurrency, 16);
        assert_eq!(config.gateway.device_concurrency, 4);
        assert_eq!(config.gateway.call_timeout(), Duration::from_secs(30));
        assert_eq!(config.gateway.default_history_hours, 24);
        assert_eq!(config.postgres.max_connections, 10);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = vec![
            ("api.port", "9100".to_string()),
            ("backend_mode", "memory".to_string()),
            ("gateway.generator_seed", "42".to_string()),
        ];
        let config = ServiceConfig::load_with_overrides(NO_DIR, &overrides).unwrap();

        assert_eq!(config.api.port, 9100);
        assert_eq!(config.backend_mode, BackendMode::Memory);
        assert_eq!(config.gateway.generator_seed, Some(42));
    }

    #[test]
    fn test_legacy_variables_map_to_sections() {
        let env: HashMap<&str, &str> = [
            ("POSTGRES_DB", "iot"),
            ("S3_BUCKET_NAME", "fleet-blobs"),
            ("INFLUXDB_TOKEN", ""),
        ]
        .into_iter()
        .collect();

        let mut found = legacy_overrides(|var| env.get(var).map(|v| v.to_string()));
        found.sort();

        assert_eq!(
            found,
            vec![
                ("postgres.database", "iot".to_string()),
                ("s3.bucket", "fleet-blobs".to_string()),
            ]
        );
    }

    #[test]
    fn test_backend_mode_parse() {
        assert_eq!("memory".parse::<BackendMode>().unwrap(), BackendMode::Memory);
        assert_eq!("LIVE".parse::<BackendMode>().unwrap(), BackendMode::Live);
        assert!("hybrid".parse::<BackendMode>().is_err());
    }
}

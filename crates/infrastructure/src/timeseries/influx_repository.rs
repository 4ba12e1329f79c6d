use crate::config::InfluxConfig;
use crate::timeseries::{flux, line_protocol};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use domain::telemetry::{SensorReading, SensorRecord, TimeRange, TimeSeriesRepository};
use domain::{Backend, GatewayError};
use reqwest::{RequestBuilder, Response, StatusCode, header};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// InfluxDB v2 implementation of TimeSeriesRepository over the HTTP API
pub struct InfluxTimeSeriesRepository {
    client: reqwest::Client,
    base_url: String,
    token: String,
    org: String,
    bucket: String,
    measurement: String,
}

impl InfluxTimeSeriesRepository {
    pub fn new(config: &InfluxConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let mut base_url = config.url.clone();
        if base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            measurement: config.measurement.clone(),
        })
    }

    fn request(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header(header::AUTHORIZATION, format!("Token {}", self.token))
    }

    /// True when the server answers its health endpoint
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(map_status(status, body))
    }
}

fn map_transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_connect() || e.is_timeout() {
        GatewayError::unavailable(Backend::TimeSeries, e.to_string())
    } else {
        GatewayError::backend(Backend::TimeSeries, e.to_string())
    }
}

fn map_status(status: StatusCode, body: String) -> GatewayError {
    let message = format!("HTTP {}: {}", status.as_u16(), body);
    match status {
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            GatewayError::unavailable(Backend::TimeSeries, message)
        }
        _ => GatewayError::backend(Backend::TimeSeries, message),
    }
}

#[async_trait]
impl TimeSeriesRepository for InfluxTimeSeriesRepository {
    async fn write_point(
        &self,
        device_id: &str,
        reading: &SensorReading,
    ) -> Result<(), GatewayError> {
        let line = line_protocol::encode_point(&self.measurement, device_id, reading)?;

        let request = self
            .request("/api/v2/write")
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(line);
        self.send(request).await?;
        Ok(())
    }

    async fn query_range(
        &self,
        device_id: &str,
        range: &TimeRange,
    ) -> Result<Vec<SensorRecord>, GatewayError> {
        let query = flux::range_query(&self.bucket, &self.measurement, device_id, range);
        debug!(device_id = %device_id, "Running range query");

        let request = self
            .request("/api/v2/query")
            .query(&[("org", self.org.as_str())])
            .header(header::ACCEPT, "application/csv")
            .json(&json!({
                "query": query,
                "type": "flux",
                "dialect": {
                    "header": true,
                    "annotations": [],
                    "delimiter": ",",
                },
            }));

        let body = self
            .send(request)
            .await?
            .text()
            .await
            .map_err(map_transport_error)?;

        flux::decode_records(&body)
    }

    async fn delete_device(&self, device_id: &str) -> Result<(), GatewayError> {
        let stop = Utc::now() + ChronoDuration::days(1);
        let request = self
            .request("/api/v2/delete")
            .query(&[("org", self.org.as_str()), ("bucket", self.bucket.as_str())])
            .json(&json!({
                "start": "1970-01-01T00:00:00Z",
                "stop": stop.to_rfc3339_opts(SecondsFormat::Secs, true),
                "predicate": flux::delete_predicate(&self.measurement, device_id),
            }));
        self.send(request).await?;

        info!(device_id = %device_id, "Time-series points deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::SERVICE_UNAVAILABLE, String::new()),
            GatewayError::BackendUnavailable { .. }
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_REQUEST, "unable to parse".to_string()),
            GatewayError::Backend {
                backend: Backend::TimeSeries,
                ..
            }
        ));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = InfluxConfig {
            url: "http://influx:8086/".to_string(),
            token: "t".to_string(),
            org: "o".to_string(),
            bucket: "b".to_string(),
            measurement: "sensor_data".to_string(),
        };
        let repo = InfluxTimeSeriesRepository::new(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(repo.base_url, "http://influx:8086");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let config = InfluxConfig {
            url: "http://127.0.0.1:9".to_string(),
            token: String::new(),
            org: "o".to_string(),
            bucket: "b".to_string(),
            measurement: "sensor_data".to_string(),
        };
        let repo = InfluxTimeSeriesRepository::new(&config, Duration::from_secs(2)).unwrap();
        let reading = SensorReading::SmartPlug {
            power_on: true,
            energy_usage: 3.5,
            timestamp: Utc::now(),
        };

        let err = repo.write_point("device_1", &reading).await.unwrap_err();
        assert!(matches!(err, GatewayError::BackendUnavailable { .. }));
        assert!(!repo.health_check().await);
    }
}

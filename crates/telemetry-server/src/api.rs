use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use bytes::Bytes;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use domain::device::{DeviceMetadata, DeviceType, EventType, FirmwareVersion, LogQuery, NewSystemLog};
use domain::telemetry::{SensorReading, TimeRange};
use domain::GatewayError;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiMultipart, ApiQuery};
use crate::state::AppState;

/// Upload ceiling for images and documents
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

const DEFAULT_DEVICE_COUNT: usize = 5;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/generate-and-store", post(generate_and_store))
        .route("/devices", get(list_devices))
        .route(
            "/devices/{id}",
            get(get_device).put(upsert_device).delete(delete_device),
        )
        .route(
            "/devices/{id}/sensor-data",
            get(get_sensor_data).post(store_sensor_data),
        )
        .route("/devices/{id}/logs", get(get_logs).post(append_log))
        .route(
            "/devices/{id}/log-blobs",
            get(list_log_blobs).post(store_log_blob),
        )
        .route(
            "/devices/{id}/images",
            get(list_images).post(upload_image),
        )
        .route("/devices/{id}/documents", post(upload_document))
        .route("/devices/{id}/files", get(list_files))
        .route("/objects/{*key}", get(get_object))
        .route("/device-types", get(device_types))
        .route("/device-locations", get(device_locations))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Accepts RFC 3339, or naive ISO-8601 taken as UTC
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, GatewayError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc());
    }
    Err(GatewayError::Validation(format!("Invalid timestamp: {}", raw)))
}

fn parse_optional(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, GatewayError> {
    raw.map(parse_instant).transpose()
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct GenerateParams {
    num_devices: Option<usize>,
    hours: Option<u32>,
}

async fn generate_and_store(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<GenerateParams>,
) -> ApiResult<impl IntoResponse> {
    let num_devices = params.num_devices.unwrap_or(DEFAULT_DEVICE_COUNT);
    let hours = params.hours.unwrap_or(state.default_history_hours);
    let cancel = state.request_token();

    let mut generator = state.generator();
    let summary = state
        .gateway
        .generate_and_store(&mut generator, num_devices, hours, &cancel)
        .await?;

    info!(devices = num_devices, hours, "🏭 Synthetic fleet generated");
    Ok(Json(json!({
        "message": format!("Successfully generated and stored data for {} devices", num_devices),
        "summary": summary,
    })))
}

async fn list_devices(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let devices = state.gateway.list_devices(&state.request_token()).await?;
    Ok(Json(devices))
}

async fn get_device(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let device = state.gateway.get_device(&id, &state.request_token()).await?;
    Ok(Json(device))
}

#[derive(Debug, Deserialize)]
struct UpsertDeviceRequest {
    device_type: DeviceType,
    location: String,
    manufacturer: String,
    firmware_version: FirmwareVersion,
    last_maintenance: DateTime<Utc>,
    created_at: Option<DateTime<Utc>>,
}

async fn upsert_device(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<UpsertDeviceRequest>,
) -> ApiResult<impl IntoResponse> {
    let metadata = DeviceMetadata {
        device_id: id,
        device_type: request.device_type,
        location: request.location,
        manufacturer: request.manufacturer,
        firmware_version: request.firmware_version,
        last_maintenance: request.last_maintenance,
        created_at: request.created_at.unwrap_or_else(Utc::now),
    };
    let record = state
        .gateway
        .upsert_metadata(&metadata, &state.request_token())
        .await?;
    Ok(Json(record))
}

async fn delete_device(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let report = state
        .gateway
        .delete_device(&id, &state.request_token())
        .await?;
    Ok(Json(json!({
        "message": format!("Successfully deleted data for device {}", id),
        "deleted_count": report.deleted_count(),
        "report": report,
    })))
}

#[derive(Debug, Deserialize)]
struct TimeWindowParams {
    start_time: Option<String>,
    end_time: Option<String>,
}

async fn get_sensor_data(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<TimeWindowParams>,
) -> ApiResult<impl IntoResponse> {
    let end = parse_optional(params.end_time.as_deref())?.unwrap_or_else(Utc::now);
    let start = parse_optional(params.start_time.as_deref())?
        .unwrap_or_else(|| end - Duration::hours(i64::from(state.default_history_hours)));

    let records = state
        .gateway
        .query_range(&id, TimeRange::new(start, end), &state.request_token())
        .await?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
struct SensorBatchRequest {
    device_type: DeviceType,
    readings: Vec<SensorReading>,
}

async fn store_sensor_data(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    ApiJson(batch): ApiJson<SensorBatchRequest>,
) -> ApiResult<impl IntoResponse> {
    let stored = state
        .gateway
        .store_readings(&id, batch.device_type, &batch.readings, &state.request_token())
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "stored": stored }))))
}

async fn get_logs(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<TimeWindowParams>,
) -> ApiResult<impl IntoResponse> {
    let query = LogQuery {
        device_id: id,
        start: parse_optional(params.start_time.as_deref())?,
        end: parse_optional(params.end_time.as_deref())?,
    };
    let logs = state
        .gateway
        .query_logs(&query, &state.request_token())
        .await?;
    Ok(Json(logs))
}

#[derive(Debug, Deserialize)]
struct AppendLogRequest {
    event_type: EventType,
    message: String,
    timestamp: Option<DateTime<Utc>>,
}

async fn append_log(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<AppendLogRequest>,
) -> ApiResult<impl IntoResponse> {
    let entry = NewSystemLog {
        device_id: id,
        event_type: request.event_type,
        message: request.message,
        timestamp: request.timestamp.unwrap_or_else(Utc::now),
    };
    let log_id = state
        .gateway
        .append_log(&entry, &state.request_token())
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "log_id": log_id }))))
}

async fn store_log_blob(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    ApiJson(data): ApiJson<serde_json::Value>,
) -> ApiResult<impl IntoResponse> {
    let url = state
        .gateway
        .store_device_log_blob(&id, &data, &state.request_token())
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "log_url": url }))))
}

async fn list_log_blobs(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let blobs = state
        .gateway
        .list_device_log_blobs(&id, &state.request_token())
        .await?;
    Ok(Json(blobs))
}

/// The `file` part of a multipart upload
struct Upload {
    content_type: Option<String>,
    body: Bytes,
}

async fn read_file_field(mut multipart: Multipart) -> ApiResult<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let body = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Unreadable file part: {}", e)))?;
        return Ok(Upload { content_type, body });
    }
    Err(ApiError::BadRequest("Missing multipart field 'file'".to_string()))
}

async fn upload_image(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    ApiMultipart(multipart): ApiMultipart,
) -> ApiResult<impl IntoResponse> {
    let upload = read_file_field(multipart).await?;
    let url = state
        .gateway
        .store_device_image(
            &id,
            upload.body,
            upload.content_type.as_deref(),
            &state.request_token(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "image_url": url }))))
}

async fn list_images(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let images = state
        .gateway
        .list_device_images(&id, &state.request_token())
        .await?;
    Ok(Json(images))
}

#[derive(Debug, Deserialize)]
struct DocumentParams {
    ext: String,
}

async fn upload_document(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<DocumentParams>,
    ApiMultipart(multipart): ApiMultipart,
) -> ApiResult<impl IntoResponse> {
    let upload = read_file_field(multipart).await?;
    let url = state
        .gateway
        .store_device_document(&id, upload.body, &params.ext, &state.request_token())
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "document_url": url }))))
}

#[derive(Debug, Deserialize)]
struct FilesParams {
    kind: Option<String>,
}

async fn list_files(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<FilesParams>,
) -> ApiResult<impl IntoResponse> {
    let files = state
        .gateway
        .list_device_files(&id, params.kind.as_deref(), &state.request_token())
        .await?;
    Ok(Json(files))
}

async fn get_object(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Response> {
    let object = state.gateway.get_object(&key, &state.request_token()).await?;
    Ok(([(header::CONTENT_TYPE, object.content_type)], object.body).into_response())
}

async fn device_types(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let types = state.gateway.device_types(&state.request_token()).await?;
    Ok(Json(types))
}

async fn device_locations(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let locations = state
        .gateway
        .device_locations(&state.request_token())
        .await?;
    Ok(Json(locations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_instant_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_instant("2024-03-01T12:30:00Z").unwrap(), expected);
        assert_eq!(parse_instant("2024-03-01T14:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_instant("2024-03-01T12:30:00").unwrap(), expected);
        assert_eq!(parse_instant("2024-03-01T12:30:00.000").unwrap(), expected);
        assert_eq!(parse_instant("2024-03-01 12:30:00").unwrap(), expected);
        assert_eq!(
            parse_instant("2024-03-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_instant_rejects_garbage() {
        assert!(matches!(
            parse_instant("yesterday"),
            Err(GatewayError::Validation(_))
        ));
    }
}

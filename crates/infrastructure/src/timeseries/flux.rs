//! Flux query construction and decoding of the CSV the query API answers with

use chrono::{DateTime, SecondsFormat, Utc};
use domain::device::DeviceType;
use domain::telemetry::{FieldValue, SensorReading, SensorRecord, TimeRange};
use domain::{Backend, GatewayError};
use std::collections::HashMap;
use tracing::warn;

/// Columns of a pivoted result that are not sensor fields
const RESERVED_COLUMNS: [&str; 9] = [
    "",
    "result",
    "table",
    "_start",
    "_stop",
    "_time",
    "_measurement",
    "device_id",
    "device_type",
];

/// Quote a value as a Flux string literal
pub fn string_literal(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn instant(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// One row per point of the device inside `[range.start, range.end)`, fields pivoted into columns
pub fn range_query(bucket: &str, measurement: &str, device_id: &str, range: &TimeRange) -> String {
    format!(
        r#"from(bucket: {bucket})
  |> range(start: {start}, stop: {stop})
  |> filter(fn: (r) => r["_measurement"] == {measurement})
  |> filter(fn: (r) => r["device_id"] == {device_id})
  |> pivot(rowKey: ["_time"], columnKey: ["_field"], valueColumn: "_value")
  |> group()
  |> sort(columns: ["_time"])"#,
        bucket = string_literal(bucket),
        start = instant(range.start),
        stop = instant(range.end),
        measurement = string_literal(measurement),
        device_id = string_literal(device_id),
    )
}

/// Predicate for the delete API, which uses its own (non-Flux) syntax
pub fn delete_predicate(measurement: &str, device_id: &str) -> String {
    format!(
        "_measurement={} AND device_id={}",
        string_literal(measurement),
        string_literal(device_id)
    )
}

fn malformed(message: impl Into<String>) -> GatewayError {
    GatewayError::backend(Backend::TimeSeries, message)
}

/// Decodes a pivoted range query result.
///
/// The body may hold several tables, each starting with its own header row.
/// Rows whose field set does not match their device type are skipped.
pub fn decode_records(body: &str) -> Result<Vec<SensorRecord>, GatewayError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut header: Option<Vec<String>> = None;
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row.map_err(|e| malformed(format!("invalid CSV: {}", e)))?;

        if row.iter().any(|c| c == "_time") && row.iter().any(|c| c == "table") {
            header = Some(row.iter().map(str::to_string).collect());
            continue;
        }
        if row.iter().any(|c| c == "error") && row.iter().any(|c| c == "reference") {
            return Err(malformed(format!("query failed: {:?}", row)));
        }

        let Some(columns) = header.as_ref() else {
            return Err(malformed("data row before header"));
        };
        let values: HashMap<&str, &str> = columns
            .iter()
            .map(String::as_str)
            .zip(row.iter())
            .collect();

        match decode_row(&values) {
            Ok(record) => records.push(record),
            Err(e) => warn!(error = %e, "Skipping undecodable time-series row"),
        }
    }

    records.sort_by_key(|r| r.reading.timestamp());
    Ok(records)
}

fn decode_row(values: &HashMap<&str, &str>) -> Result<SensorRecord, GatewayError> {
    let column = |name: &str| {
        values
            .get(name)
            .copied()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| malformed(format!("missing column {}", name)))
    };

    let timestamp = DateTime::parse_from_rfc3339(column("_time")?)
        .map_err(|e| malformed(format!("invalid _time: {}", e)))?
        .with_timezone(&Utc);
    let device_id = column("device_id")?.to_string();
    let device_type: DeviceType = column("device_type")?.parse()?;

    let fields: HashMap<String, FieldValue> = values
        .iter()
        .filter(|(name, value)| !RESERVED_COLUMNS.contains(name) && !value.is_empty())
        .filter_map(|(name, value)| FieldValue::parse(value).map(|v| (name.to_string(), v)))
        .collect();

    let reading = SensorReading::from_fields(device_type, timestamp, &fields)?;
    Ok(SensorRecord { device_id, reading })
}

//! InfluxDB line protocol encoding for sensor readings

use domain::GatewayError;
use domain::telemetry::{FieldValue, SensorReading};

/// Encodes one reading as a point of `measurement`, tagged by device id and type.
/// Timestamps are nanoseconds since the epoch.
pub fn encode_point(
    measurement: &str,
    device_id: &str,
    reading: &SensorReading,
) -> Result<String, GatewayError> {
    let nanos = reading.timestamp().timestamp_nanos_opt().ok_or_else(|| {
        GatewayError::Validation(format!(
            "Timestamp {} outside the time-series range",
            reading.timestamp()
        ))
    })?;

    let fields: Vec<String> = reading
        .fields()
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                FieldValue::Float(v) => format!("{}", v),
                FieldValue::Bool(v) => format!("{}", v),
            };
            format!("{}={}", escape_key(key), value)
        })
        .collect();

    Ok(format!(
        "{},device_id={},device_type={} {} {}",
        escape_measurement(measurement),
        escape_key(device_id),
        reading.device_type().as_str(),
        fields.join(","),
        nanos
    ))
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Tag keys, tag values and field keys share the same rules
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_thermostat_point() {
        let reading = SensorReading::Thermostat {
            temperature: 21.5,
            humidity: 45.0,
            pressure: 1013.2,
            timestamp: Utc.timestamp_opt(1_609_459_200, 0).unwrap(),
        };

        let line = encode_point("sensor_data", "device_1", &reading).unwrap();
        assert_eq!(
            line,
            "sensor_data,device_id=device_1,device_type=thermostat \
             temperature=21.5,humidity=45,pressure=1013.2 1609459200000000000"
        );
    }

    #[test]
    fn test_boolean_fields() {
        let reading = SensorReading::DoorLock {
            locked: true,
            battery_level: 88.0,
            timestamp: Utc.timestamp_opt(1, 5).unwrap(),
        };

        let line = encode_point("sensor_data", "lock-7", &reading).unwrap();
        assert_eq!(
            line,
            "sensor_data,device_id=lock-7,device_type=door_lock locked=true,battery_level=88 1000000005"
        );
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_key("a b,c=d"), "a\\ b\\,c\\=d");
        assert_eq!(escape_measurement("sensor data,x"), "sensor\\ data\\,x");
    }
}

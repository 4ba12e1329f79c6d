//! Synthetic smart-home telemetry
//!
//! Pure functions of an injected random source and an explicit `now`: no I/O,
//! no shared state. The same seed and instant always produce the same fleet.

use chrono::{DateTime, Duration, Utc};
use domain::device::{
    DeviceMetadata, DeviceRecord, DeviceStatus, DeviceType, EventType, FirmwareVersion,
    NewSystemLog,
};
use domain::telemetry::SensorReading;
use domain::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const LOCATIONS: [&str; 5] = ["Living Room", "Kitchen", "Bedroom", "Bathroom", "Office"];
pub const MANUFACTURERS: [&str; 3] = ["SmartHome Inc", "IoT Solutions", "HomeTech"];

/// Spacing of generated sensor history
pub const SAMPLE_INTERVAL_MINUTES: i64 = 5;

/// Logs generated per device by `generate`
pub const LOGS_PER_DEVICE: usize = 10;

/// Everything generated for one device
#[derive(Debug, Clone)]
pub struct GeneratedDevice {
    pub record: DeviceRecord,
    pub metadata: DeviceMetadata,
    pub logs: Vec<NewSystemLog>,
    pub history: Vec<SensorReading>,
}

#[derive(Debug, Clone, Default)]
pub struct GeneratedFleet {
    pub devices: Vec<GeneratedDevice>,
}

impl GeneratedFleet {
    pub fn point_count(&self) -> usize {
        self.devices.iter().map(|d| d.history.len()).sum()
    }
}

pub struct TelemetryGenerator<R: Rng = StdRng> {
    rng: R,
}

impl TelemetryGenerator<StdRng> {
    pub fn from_seed(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> TelemetryGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.rng.gen_range(0..items.len())]
    }

    pub fn device_type(&mut self) -> DeviceType {
        *self.pick(&DeviceType::ALL)
    }

    pub fn sensor_reading(
        &mut self,
        device_type: DeviceType,
        timestamp: DateTime<Utc>,
    ) -> SensorReading {
        let rng = &mut self.rng;
        match device_type {
            DeviceType::Thermostat => SensorReading::Thermostat {
                temperature: round1(rng.gen_range(18.0..=25.0)),
                humidity: round1(rng.gen_range(40.0..=60.0)),
                pressure: round1(rng.gen_range(1000.0..=1020.0)),
                timestamp,
            },
            DeviceType::Camera => SensorReading::Camera {
                motion_detected: rng.gen_bool(0.5),
                brightness: round1(rng.gen_range(0.0..=100.0)),
                timestamp,
            },
            DeviceType::MotionSensor => SensorReading::MotionSensor {
                motion_detected: rng.gen_bool(0.5),
                sensitivity: round2(rng.gen_range(0.5..=1.0)),
                timestamp,
            },
            DeviceType::DoorLock => SensorReading::DoorLock {
                locked: rng.gen_bool(0.5),
                battery_level: round1(rng.gen_range(80.0..=100.0)),
                timestamp,
            },
            DeviceType::SmartPlug => SensorReading::SmartPlug {
                power_on: rng.gen_bool(0.5),
                energy_usage: round1(rng.gen_range(0.0..=100.0)),
                timestamp,
            },
        }
    }

    /// One reading every five minutes from `now - hours` up to and including `now`
    pub fn time_series(
        &mut self,
        device_type: DeviceType,
        now: DateTime<Utc>,
        hours: u32,
    ) -> Vec<SensorReading> {
        let start = now - Duration::hours(i64::from(hours));
        let step = Duration::minutes(SAMPLE_INTERVAL_MINUTES);

        let mut readings = Vec::new();
        let mut current = start;
        while current <= now {
            readings.push(self.sensor_reading(device_type, current));
            current += step;
        }
        readings
    }

    /// Devices `device_1..=device_{count}` with random type, location and status
    pub fn devices(&mut self, count: usize, now: DateTime<Utc>) -> Result<Vec<DeviceRecord>> {
        self.devices_from(1, count, now)
    }

    /// `count` devices numbered from `device_{first}`
    pub fn devices_from(
        &mut self,
        first: usize,
        count: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeviceRecord>> {
        (first..first + count)
            .map(|i| {
                let device_type = self.device_type();
                let location = *self.pick(&LOCATIONS);
                let status = *self.pick(&DeviceStatus::ALL);
                let reading = self.sensor_reading(device_type, now);
                DeviceRecord::new(format!("device_{}", i), location, status, reading, now)
            })
            .collect()
    }

    /// Metadata consistent with the device's own type and location
    pub fn metadata(&mut self, device: &DeviceRecord, now: DateTime<Utc>) -> DeviceMetadata {
        let manufacturer = *self.pick(&MANUFACTURERS);
        let firmware_version =
            FirmwareVersion::from_parts(self.rng.gen_range(1..=5), self.rng.gen_range(0..=9));
        let last_maintenance = now - Duration::days(self.rng.gen_range(0..=30));
        let created_at = now - Duration::days(self.rng.gen_range(30..=365));

        DeviceMetadata {
            device_id: device.device_id().to_string(),
            device_type: device.device_type(),
            location: device.location().to_string(),
            manufacturer: manufacturer.to_string(),
            firmware_version,
            last_maintenance,
            created_at,
        }
    }

    /// `count` log entries, one per hour going back from `now`
    pub fn system_logs(
        &mut self,
        device_id: &str,
        count: usize,
        now: DateTime<Utc>,
    ) -> Vec<NewSystemLog> {
        (0..count)
            .map(|i| {
                let event_type = *self.pick(&EventType::ALL);
                NewSystemLog {
                    device_id: device_id.to_string(),
                    event_type,
                    message: format!("Device {} {} event", device_id, event_type.as_str()),
                    timestamp: now - Duration::hours(i as i64),
                }
            })
            .collect()
    }

    pub fn generate(
        &mut self,
        device_count: usize,
        hours_of_history: u32,
        now: DateTime<Utc>,
    ) -> Result<GeneratedFleet> {
        self.generate_from(1, device_count, hours_of_history, now)
    }

    /// One slice of a fleet, numbered from `device_{first}`. Large fleets are
    /// generated slice by slice so only one slice of history is in memory.
    pub fn generate_from(
        &mut self,
        first: usize,
        device_count: usize,
        hours_of_history: u32,
        now: DateTime<Utc>,
    ) -> Result<GeneratedFleet> {
        let devices = self
            .devices_from(first, device_count, now)?
            .into_iter()
            .map(|record| {
                let metadata = self.metadata(&record, now);
                let logs = self.system_logs(record.device_id(), LOGS_PER_DEVICE, now);
                let history = self.time_series(record.device_type(), now, hours_of_history);
                GeneratedDevice {
                    record,
                    metadata,
                    logs,
                    history,
                }
            })
            .collect();

        Ok(GeneratedFleet { devices })
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn assert_in_range(value: f64, min: f64, max: f64) {
        assert!(
            (min..=max).contains(&value),
            "{value} outside [{min}, {max}]"
        );
    }

    #[test]
    fn test_readings_have_exact_field_set_and_ranges() {
        let mut generator = TelemetryGenerator::from_seed(7);

        for device_type in DeviceType::ALL {
            for _ in 0..200 {
                let reading = generator.sensor_reading(device_type, now());
                assert_eq!(reading.device_type(), device_type);
                assert_eq!(reading.timestamp(), now());

                let names: Vec<&str> = reading.fields().iter().map(|(n, _)| *n).collect();
                assert_eq!(names, SensorReading::field_names(device_type));

                match reading {
                    SensorReading::Thermostat {
                        temperature,
                        humidity,
                        pressure,
                        ..
                    } => {
                        assert_in_range(temperature, 18.0, 25.0);
                        assert_in_range(humidity, 40.0, 60.0);
                        assert_in_range(pressure, 1000.0, 1020.0);
                    }
                    SensorReading::Camera { brightness, .. } => {
                        assert_in_range(brightness, 0.0, 100.0)
                    }
                    SensorReading::MotionSensor { sensitivity, .. } => {
                        assert_in_range(sensitivity, 0.5, 1.0)
                    }
                    SensorReading::DoorLock { battery_level, .. } => {
                        assert_in_range(battery_level, 0.0, 100.0)
                    }
                    SensorReading::SmartPlug { energy_usage, .. } => {
                        assert!(energy_usage >= 0.0)
                    }
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_fleet() {
        let a = TelemetryGenerator::from_seed(42).generate(3, 1, now()).unwrap();
        let b = TelemetryGenerator::from_seed(42).generate(3, 1, now()).unwrap();

        for (x, y) in a.devices.iter().zip(b.devices.iter()) {
            assert_eq!(x.record, y.record);
            assert_eq!(x.metadata, y.metadata);
            assert_eq!(x.history, y.history);
        }
    }

    #[test]
    fn test_time_series_spacing() {
        let mut generator = TelemetryGenerator::from_seed(1);
        let series = generator.time_series(DeviceType::SmartPlug, now(), 24);

        assert_eq!(series.len(), 24 * 12 + 1);
        assert_eq!(series[0].timestamp(), now() - Duration::hours(24));
        assert_eq!(series.last().unwrap().timestamp(), now());
        for pair in series.windows(2) {
            assert_eq!(
                pair[1].timestamp() - pair[0].timestamp(),
                Duration::minutes(SAMPLE_INTERVAL_MINUTES)
            );
        }
    }

    #[test]
    fn test_generate_builds_consistent_devices() {
        let fleet = TelemetryGenerator::from_seed(9).generate(4, 2, now()).unwrap();
        assert_eq!(fleet.devices.len(), 4);
        assert_eq!(fleet.point_count(), 4 * (2 * 12 + 1));

        for (i, device) in fleet.devices.iter().enumerate() {
            let id = format!("device_{}", i + 1);
            assert_eq!(device.record.device_id(), id);
            assert_eq!(device.metadata.device_id, id);
            assert_eq!(device.metadata.device_type, device.record.device_type());
            assert_eq!(device.metadata.location, device.record.location());
            assert!(LOCATIONS.contains(&device.record.location()));
            assert!(MANUFACTURERS.contains(&device.metadata.manufacturer.as_str()));
            assert!(device.metadata.created_at <= now() - Duration::days(30));
            assert!(device.metadata.last_maintenance >= now() - Duration::days(30));
            assert_eq!(device.logs.len(), LOGS_PER_DEVICE);
            assert!(device
                .history
                .iter()
                .all(|r| r.device_type() == device.record.device_type()));
        }
    }

    #[test]
    fn test_generate_from_continues_numbering() {
        let slice = TelemetryGenerator::from_seed(3)
            .generate_from(65, 2, 0, now())
            .unwrap();
        let ids: Vec<&str> = slice.devices.iter().map(|d| d.record.device_id()).collect();
        assert_eq!(ids, ["device_65", "device_66"]);
        assert_eq!(slice.point_count(), 2);
    }

    #[test]
    fn test_system_logs_go_back_hourly() {
        let mut generator = TelemetryGenerator::from_seed(3);
        let logs = generator.system_logs("device_5", 3, now());

        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].timestamp, now());
        assert_eq!(logs[2].timestamp, now() - Duration::hours(2));
        for log in &logs {
            assert!(log.message.starts_with("Device device_5 "));
            assert!(log.message.contains(log.event_type.as_str()));
        }
    }
}

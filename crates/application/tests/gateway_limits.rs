//! Concurrency bounds and Send-ness of gateway futures

use application::{GatewaySettings, TelemetryGateway, TelemetryGenerator};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use domain::device::{DeviceType, LogQuery};
use domain::object::KeyParts;
use domain::telemetry::{SensorReading, SensorRecord, TimeRange, TimeSeriesRepository};
use domain::GatewayError;
use infrastructure::{Backends, InMemoryDeviceRepository, ObjectStoreRepository};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Counts point writes in flight and remembers the peak
#[derive(Default)]
struct CountingTimeSeries {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    written: AtomicUsize,
}

#[async_trait]
impl TimeSeriesRepository for CountingTimeSeries {
    async fn write_point(&self, _: &str, _: &SensorReading) -> Result<(), GatewayError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query_range(
        &self,
        _: &str,
        _: &TimeRange,
    ) -> Result<Vec<SensorRecord>, GatewayError> {
        Ok(Vec::new())
    }

    async fn delete_device(&self, _: &str) -> Result<(), GatewayError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_fleet_ingest_bounds_writes_in_flight() {
    let timeseries = Arc::new(CountingTimeSeries::default());
    let gateway = TelemetryGateway::new(
        timeseries.clone(),
        Arc::new(InMemoryDeviceRepository::new()),
        Arc::new(ObjectStoreRepository::in_memory("smart-home-data")),
        GatewaySettings {
            call_timeout: Duration::from_secs(30),
            write_concurrency: 4,
            device_concurrency: 2,
        },
    );

    let mut generator = TelemetryGenerator::from_seed(21);
    let summary = gateway
        .generate_and_store(&mut generator, 100, 2, &CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.is_complete());
    assert_eq!(summary.devices, 100);
    assert_eq!(summary.points_written, 100 * 25);
    assert_eq!(timeseries.written.load(Ordering::SeqCst), 100 * 25);
    assert!(timeseries.peak.load(Ordering::SeqCst) <= 2 * 4);
    assert_eq!(timeseries.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_generate_and_store_numbers_across_slices() {
    let backends = Backends::in_memory("smart-home-data");
    let gateway = TelemetryGateway::new(
        backends.timeseries,
        backends.devices,
        backends.objects,
        GatewaySettings::default(),
    );
    let cancel = CancellationToken::new();

    let mut generator = TelemetryGenerator::from_seed(5);
    let summary = gateway
        .generate_and_store(&mut generator, 70, 0, &cancel)
        .await
        .unwrap();
    assert_eq!(summary.devices, 70);

    let devices = gateway.list_devices(&cancel).await.unwrap();
    assert_eq!(devices.len(), 70);
    assert!(gateway.get_device("device_70", &cancel).await.is_ok());
}

fn assert_send<T: Send>(_: T) {}

#[test]
fn test_gateway_futures_are_send() {
    let backends = Backends::in_memory("smart-home-data");
    let gateway = TelemetryGateway::new(
        backends.timeseries,
        backends.devices,
        backends.objects,
        GatewaySettings::default(),
    );
    let cancel = CancellationToken::new();
    let now = Utc::now();
    let readings: Vec<SensorReading> = Vec::new();
    let mut generator = TelemetryGenerator::from_seed(1);
    let fleet = TelemetryGenerator::from_seed(1).generate(1, 0, now).unwrap();
    let parts = KeyParts::new(domain::object::ObjectCategory::Image, "cam_1", now).unwrap();
    let blob = json!({ "ok": true });

    assert_send(gateway.store_readings("d1", DeviceType::Camera, &readings, &cancel));
    assert_send(gateway.query_range("d1", TimeRange::new(now, now), &cancel));
    assert_send(gateway.upsert_metadata(&fleet.devices[0].metadata, &cancel));
    assert_send(gateway.append_log(&fleet.devices[0].logs[0], &cancel));
    assert_send(gateway.query_logs(&LogQuery::for_device("d1"), &cancel));
    assert_send(gateway.list_devices(&cancel));
    assert_send(gateway.get_device("d1", &cancel));
    assert_send(gateway.device_types(&cancel));
    assert_send(gateway.device_locations(&cancel));
    assert_send(gateway.put_object(&parts, Bytes::new(), "image/jpeg", &cancel));
    assert_send(gateway.store_device_image("d1", Bytes::new(), None, &cancel));
    assert_send(gateway.store_device_log_blob("d1", &blob, &cancel));
    assert_send(gateway.store_device_document("d1", Bytes::new(), "pdf", &cancel));
    assert_send(gateway.get_object("images/d1/x.jpg", &cancel));
    assert_send(gateway.list_device_images("d1", &cancel));
    assert_send(gateway.list_device_log_blobs("d1", &cancel));
    assert_send(gateway.list_device_files("d1", None, &cancel));
    assert_send(gateway.delete_device("d1", &cancel));
    assert_send(gateway.ingest_fleet(&fleet, &cancel));
    assert_send(gateway.generate_and_store(&mut generator, 1, 1, &cancel));
}

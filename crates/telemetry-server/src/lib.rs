pub mod api;
pub mod error;
pub mod extract;
pub mod state;

use application::{GatewaySettings, TelemetryGateway};
use infrastructure::{Backends, ServiceConfig};
use state::AppState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub fn gateway_settings(config: &ServiceConfig) -> GatewaySettings {
    GatewaySettings {
        call_timeout: config.gateway.call_timeout(),
        write_concurrency: config.gateway.write_concurrency,
        device_concurrency: config.gateway.device_concurrency,
    }
}

pub fn setup_app_state(
    config: &ServiceConfig,
    backends: Backends,
    shutdown: CancellationToken,
) -> Arc<AppState> {
    let gateway = TelemetryGateway::new(
        backends.timeseries,
        backends.devices,
        backends.objects,
        gateway_settings(config),
    );
    Arc::new(
        AppState::new(gateway, shutdown)
            .with_generator_seed(config.gateway.generator_seed)
            .with_default_history_hours(config.gateway.default_history_hours),
    )
}

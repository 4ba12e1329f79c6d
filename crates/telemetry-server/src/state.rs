use application::{TelemetryGateway, TelemetryGenerator};
use tokio_util::sync::CancellationToken;

/// Shared by every handler
pub struct AppState {
    pub gateway: TelemetryGateway,
    /// Cancelled on shutdown; each request works under a child token
    pub shutdown: CancellationToken,
    pub generator_seed: Option<u64>,
    pub default_history_hours: u32,
}

impl AppState {
    pub fn new(gateway: TelemetryGateway, shutdown: CancellationToken) -> Self {
        Self {
            gateway,
            shutdown,
            generator_seed: None,
            default_history_hours: 24,
        }
    }

    pub fn with_generator_seed(mut self, seed: Option<u64>) -> Self {
        self.generator_seed = seed;
        self
    }

    pub fn with_default_history_hours(mut self, hours: u32) -> Self {
        self.default_history_hours = hours;
        self
    }

    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Fixed seed when configured, fresh entropy otherwise
    pub fn generator(&self) -> TelemetryGenerator {
        match self.generator_seed {
            Some(seed) => TelemetryGenerator::from_seed(seed),
            None => TelemetryGenerator::from_entropy(),
        }
    }
}

pub mod reading;
pub mod repository;

pub use reading::{FieldValue, SensorReading, SensorRecord, TimeRange};
pub use repository::TimeSeriesRepository;

#[cfg(any(test, feature = "mocks"))]
pub use repository::MockTimeSeriesRepository;

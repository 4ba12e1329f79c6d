pub mod flux;
mod influx_repository;
pub mod line_protocol;
mod memory;

pub use influx_repository::InfluxTimeSeriesRepository;
pub use memory::InMemoryTimeSeriesRepository;

mod device_repository;
mod memory_repository;
pub mod models;

pub use device_repository::PostgresDeviceRepository;
pub use memory_repository::InMemoryDeviceRepository;

mod object_repository;

pub use object_repository::ObjectStoreRepository;

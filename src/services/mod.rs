pub mod directory_service;
pub mod memory_store;
pub mod object_store;
pub mod sqlite_store;

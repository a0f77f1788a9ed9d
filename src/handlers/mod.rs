pub mod directory_handlers;
pub mod health_handlers;

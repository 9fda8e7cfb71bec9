//! Database entities.

pub mod maintenance_request;

pub use maintenance_request::Entity as MaintenanceRequest;

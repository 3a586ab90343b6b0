//! Business logic services.

pub mod backup_service;
pub mod entitlement_service;
pub mod lifecycle_service;
pub mod notify_service;

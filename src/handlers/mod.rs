//! HTTP request handlers.

pub mod activation;
pub mod audit;
pub mod backup;
pub mod entitlements;
pub mod health;
pub mod keys;

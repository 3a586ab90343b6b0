//! Data models representing store records and API wire types.
//!
//! This module contains all data structures persisted in the record store
//! tables plus the request/response bodies exchanged with clients.

/// Audit log entries (capped ring)
pub mod audit;
/// Full-store backup payload
pub mod backup;
/// Key, usage, and tombstone records
pub mod key;
/// Outbound webhook notification envelope
pub mod notification;

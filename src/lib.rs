//! Offline-first sync for golf score data.
//!
//! Profiles, courses, games and per-hole scores live in a device-local SQLite
//! store. The [`services::SyncEngine`] reconciles them with a remote service
//! through a cursor-based state check, push and pull round trip, and the
//! [`services::SyncScheduler`] decides when that round trip runs.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod state;

//! Tessera Core - shared types for the tessera entity store
//!
//! This crate provides the pieces the store and its drivers agree on:
//! - World configuration (initial table sizes, event retention)
//! - Loading configuration from TOML
//! - Configuration error types

pub mod config;
pub mod error;

pub use config::WorldConfig;
pub use error::ConfigError;

//! Infrastructure layer: record store, durable log, partner notifications,
//! configuration and the background workers that tie them together.

pub mod config;
pub mod db;
pub mod external;
pub mod redis;
pub mod workers;

#[cfg(test)]
mod integration_tests;

pub use config::{ConfigError, WorkerConfig};

//! Durable Log Adapter: the relational store holding the transaction log and
//! partner routing configuration.

pub mod durable_log;
pub mod in_memory;
pub mod postgres;

pub use durable_log::{DurableLog, DurableLogError};
pub use in_memory::InMemoryDurableLog;
pub use postgres::{PostgresDurableLog, PostgresPoolConfig};

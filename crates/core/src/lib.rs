//! `txworker-core` — domain types of the transaction callback worker.
//!
//! Pure data and mapping rules; no store, database or network access.

pub mod error;
pub mod id;
pub mod keys;
pub mod log_entry;
pub mod operator;
pub mod payload;
pub mod routing;

pub use error::{DomainError, DomainResult};
pub use id::LogEntryId;
pub use keys::{DEFAULT_KEY_PREFIX, KeyNamespace};
pub use log_entry::LogEntry;
pub use operator::{Operator, RoutingCode};
pub use payload::{PayloadError, TransactionPayload};
pub use routing::{NotificationParams, PartnerRouting};

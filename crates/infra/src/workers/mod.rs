//! Background workers: the dispatch loop and the per-record processor.

pub mod dispatch_loop;
pub mod record_processor;

pub use dispatch_loop::{
    BatchSummary, DispatchConfig, DispatchLoop, DispatchStats, IterationReport,
};
pub use record_processor::{ProcessOutcome, RecordProcessor};

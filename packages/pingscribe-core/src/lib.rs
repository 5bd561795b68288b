//! Pingscribe Core Library
//!
//! This crate turns the output of the system `ping` tool — live invocations
//! or captured transcripts — into one normalized, machine-readable record
//! per destination, whatever ping implementation produced the text:
//! - Dialect detection and parsing (Linux iputils, BusyBox, macOS/BSD,
//!   Windows, plus a best-effort generic grammar)
//! - Single invocations under a hard deadline, with transcript-file support
//! - Concurrent batches over a bounded worker pool with input-order reports
//!
//! # Example
//!
//! ```no_run
//! use pingscribe_core::{BatchOptions, InvocationSpec, PingTarget, run_batch};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let targets = vec![
//!         PingTarget::from_input("192.0.2.1"),
//!         PingTarget::from_input("captures/office-gateway.txt"),
//!     ];
//!     let spec = InvocationSpec {
//!         argv: vec!["ping".into(), "-c".into(), "4".into()],
//!         ..InvocationSpec::default()
//!     };
//!
//!     let report = run_batch(targets, spec, BatchOptions::default()).await?;
//!     for result in &report.results {
//!         println!("{}: {:?}", result.target, result.outcome);
//!     }
//!     Ok(())
//! }
//! ```

pub mod parser;
pub mod runner;

// Re-export commonly used types
pub use parser::{Dialect, Parsed, PingStats, ReplyRecord, host_failure, parse};
pub use runner::batch::{
    BatchConfigError, BatchOptions, BatchReport, TargetOutcome, TargetResult,
    default_worker_count, run_batch,
};
pub use runner::{FailureKind, InvocationSpec, PingTarget, ProbeFailure, RawCapture, invoke};

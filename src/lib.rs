//! bond-pool - a fixed-size worker thread pool with least-loaded dispatch
//!
//! Every worker owns one OS thread and a private FIFO queue. Submitting a
//! task scans the workers and queues it on the least busy one, counting both
//! queued tasks and the task it is running.
//!
//! # Quick Start
//!
//! ```
//! use bond_pool::prelude::*;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let mut pool = ThreadPool::new(4).unwrap();
//! let counter = Arc::new(AtomicUsize::new(0));
//!
//! for _ in 0..8 {
//!     let counter = counter.clone();
//!     pool.submit(move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     })
//!     .unwrap();
//! }
//!
//! // Dropping or shutting down the pool joins every worker. Tasks still
//! // queued at that point are discarded, so wait for them first.
//! while pool.stats().tasks_executed < 8 {
//!     std::thread::yield_now();
//! }
//! pool.shutdown();
//! assert_eq!(counter.load(Ordering::SeqCst), 8);
//! ```
//!
//! # Behavior
//!
//! - **FIFO per worker**: tasks on one worker run in the order they were queued
//! - **Advisory load**: selection and assignment are separate critical sections,
//!   so concurrent submitters may race; balancing is approximate
//! - **Panic isolation**: a panicking task is caught and counted, the worker
//!   keeps running (see [`PanicStrategy`])
//! - **Cancellation**: shutdown lets the running task finish and drops the rest

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use executor::{PanicStrategy, PoolStats, ThreadPool, Worker, WorkerId, WorkerStats};

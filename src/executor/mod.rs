//! Task execution infrastructure.
//!
//! This module provides the worker threads, their private task queues, the
//! panic boundary each task runs inside, and the least-loaded thread pool.

pub mod panic_handler;
pub mod task;
pub mod thread_pool;
pub mod worker;

pub use panic_handler::{PanicHandler, PanicInfo, PanicStrategy};
pub use thread_pool::{PoolStats, ThreadPool};
pub use worker::{Worker, WorkerId, WorkerStats};


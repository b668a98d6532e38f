pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{PanicStrategy, PoolStats, ThreadPool, Worker, WorkerStats};

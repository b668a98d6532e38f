use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What a worker does when one of its tasks panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    /// Abort the whole process.
    Abort,
    /// Count the panic and move on silently.
    Isolate,
    /// Count the panic, log it at `error`, move on.
    #[default]
    LogAndContinue,
}

/// Failure boundary around task execution, shared by every worker of a pool.
#[derive(Debug)]
pub struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
        }
    }

    /// Runs `f`, turning an unwinding panic into `Err`.
    pub fn execute<F, R>(&self, f: F) -> Result<R, PanicInfo>
    where
        F: FnOnce() -> R,
    {
        catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
            self.panic_count.fetch_add(1, Ordering::Relaxed);
            let info = PanicInfo::from(payload);
            self.report(&info);
            info
        })
    }

    fn report(&self, info: &PanicInfo) {
        let current = std::thread::current();
        let thread = current.name().unwrap_or("unnamed");

        match self.strategy {
            PanicStrategy::Isolate => {}
            PanicStrategy::LogAndContinue => {
                tracing::error!(panic = %info.message, thread, "task panicked");
            }
            PanicStrategy::Abort => {
                tracing::error!(panic = %info.message, thread, "task panicked, aborting");
                std::process::abort();
            }
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicInfo {
    pub message: String,
}

impl From<Box<dyn Any + Send>> for PanicInfo {
    fn from(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(s) => *s,
            Err(payload) => match payload.downcast_ref::<&str>() {
                Some(s) => s.to_string(),
                None => "non-string panic payload".to_string(),
            },
        };

        Self { message }
    }
}

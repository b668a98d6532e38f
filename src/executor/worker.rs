// worker thread stuff
use super::panic_handler::PanicHandler;
use super::task::Task;
use crate::config::Config;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub type WorkerId = usize;

// counters for each worker
#[derive(Debug)]
struct WorkerState {
    tasks_executed: AtomicU64,
    tasks_panicked: AtomicU64,
    last_panic: Mutex<Option<String>>,
}

impl WorkerState {
    fn new() -> Self {
        Self {
            tasks_executed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            last_panic: Mutex::new(None),
        }
    }
}

/// Point-in-time view of a worker's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub id: WorkerId,
    /// Tasks queued but not yet started.
    pub pending: usize,
    /// Whether a task is running right now.
    pub busy: bool,
    /// Tasks run to completion or to a caught panic.
    pub tasks_executed: u64,
    pub tasks_panicked: u64,
    /// Payload message of the most recent caught panic.
    pub last_panic: Option<String>,
}

#[derive(Debug)]
struct Queue {
    tasks: VecDeque<Task>,
    // set from pop until the popped task has returned
    in_flight: bool,
    cancelled: bool,
}

#[derive(Debug)]
struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
    state: WorkerState,
    panic_handler: Arc<PanicHandler>,
}

impl Shared {
    // main loop
    fn run(&self, id: WorkerId) {
        tracing::debug!(worker = id, "worker started");

        while let Some(task) = self.next_task() {
            let task_id = task.id;
            tracing::trace!(
                worker = id,
                task = ?task_id,
                queued_us = task.enqueue_time.elapsed().as_micros() as u64,
                "running task"
            );

            if let Err(info) = self.panic_handler.execute(|| task.execute()) {
                self.state.tasks_panicked.fetch_add(1, Ordering::Relaxed);
                *self.state.last_panic.lock() = Some(info.message);
            }
            // pairs with the Acquire load in `Worker::stats`
            self.state.tasks_executed.fetch_add(1, Ordering::Release);
        }

        tracing::debug!(worker = id, "worker stopped");
    }

    /// Blocks until a task is queued or the worker is cancelled. Marks the
    /// previously returned task as finished.
    fn next_task(&self) -> Option<Task> {
        let mut queue = self.queue.lock();
        queue.in_flight = false;
        loop {
            if queue.cancelled {
                return None;
            }
            if let Some(task) = queue.tasks.pop_front() {
                queue.in_flight = true;
                return Some(task);
            }
            self.available.wait(&mut queue);
        }
    }
}

/// A dedicated thread draining a private FIFO task queue.
///
/// Tasks run outside the queue lock, so a long task never blocks
/// [`assign`](Worker::assign) or [`work_load`](Worker::work_load) callers.
/// Each task runs inside the worker's [`PanicHandler`]; a panicking task does
/// not take the thread down unless the strategy is
/// [`Abort`](super::PanicStrategy::Abort).
#[derive(Debug)]
pub struct Worker {
    id: WorkerId,
    name: String,
    stack_size: Option<usize>,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        let config = Config::default();
        let handler = Arc::new(PanicHandler::new(config.panic_strategy));
        Self::with_config(id, &config, handler)
    }

    pub fn with_config(id: WorkerId, config: &Config, panic_handler: Arc<PanicHandler>) -> Self {
        Self {
            id,
            name: format!("{}-{}", config.thread_name_prefix, id),
            stack_size: config.stack_size,
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    tasks: VecDeque::new(),
                    in_flight: false,
                    cancelled: false,
                }),
                available: Condvar::new(),
                state: WorkerState::new(),
                panic_handler,
            }),
            thread: None,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Spawns the worker thread. Calling it again while the thread is alive
    /// does nothing.
    pub fn start(&mut self) -> Result<()> {
        if self.thread.is_some() {
            tracing::debug!(worker = self.id, "worker already started");
            return Ok(());
        }

        if self.shared.queue.lock().cancelled {
            return Err(Error::WorkerStopped(self.id));
        }

        let mut builder = thread::Builder::new().name(self.name.clone());
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let shared = self.shared.clone();
        let id = self.id;
        let thread = builder
            .spawn(move || shared.run(id))
            .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;

        self.thread = Some(thread);
        Ok(())
    }

    /// Appends a task to the tail of the queue.
    ///
    /// Tasks assigned before [`start`](Worker::start) wait for the thread.
    /// Tasks assigned after [`shutdown`](Worker::shutdown) are dropped.
    pub fn assign<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let task = Task::new(f);
        let mut queue = self.shared.queue.lock();
        if queue.cancelled {
            drop(queue);
            tracing::debug!(worker = self.id, task = ?task.id, "worker stopped, task discarded");
            return;
        }
        queue.tasks.push_back(task);
        drop(queue);

        self.shared.available.notify_one();
    }

    /// Number of queued tasks that have not started yet.
    pub fn work_load(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    /// Pending tasks plus the task currently running, if any. This is what
    /// the pool compares when choosing a worker, so a worker busy with a long
    /// task does not look idle.
    pub fn total_load(&self) -> usize {
        let queue = self.shared.queue.lock();
        queue.tasks.len() + usize::from(queue.in_flight)
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    pub fn stats(&self) -> WorkerStats {
        let state = &self.shared.state;
        let tasks_executed = state.tasks_executed.load(Ordering::Acquire);
        let (pending, busy) = {
            let queue = self.shared.queue.lock();
            (queue.tasks.len(), queue.in_flight)
        };

        WorkerStats {
            id: self.id,
            pending,
            busy,
            tasks_executed,
            tasks_panicked: state.tasks_panicked.load(Ordering::Relaxed),
            last_panic: state.last_panic.lock().clone(),
        }
    }

    /// Cancels the worker and joins its thread.
    ///
    /// The task currently running, if any, is allowed to finish. Pending tasks
    /// are dropped without running.
    pub fn shutdown(&mut self) {
        let abandoned = {
            let mut queue = self.shared.queue.lock();
            queue.cancelled = true;
            std::mem::take(&mut queue.tasks)
        };
        self.shared.available.notify_all();

        if !abandoned.is_empty() {
            tracing::debug!(
                worker = self.id,
                abandoned = abandoned.len(),
                "discarding pending tasks"
            );
        }
        drop(abandoned);

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!(worker = self.id, "worker thread terminated by panic");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

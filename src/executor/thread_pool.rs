use super::panic_handler::PanicHandler;
use super::worker::{Worker, WorkerStats};
use crate::config::Config;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Aggregated counters for every worker in a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub pending: usize,
    pub tasks_executed: u64,
    pub tasks_panicked: u64,
    pub workers: Vec<WorkerStats>,
}

/// Fixed set of workers with least-loaded dispatch.
///
/// Selection reads each worker's load under that worker's own lock and then
/// assigns in a second, separate critical section. There is no pool-wide lock,
/// so concurrent submitters can race and pick a worker whose load changed in
/// between; balancing is approximate in exchange for submissions never
/// serializing on one another.
#[derive(Debug)]
pub struct ThreadPool {
    workers: Vec<Worker>,
    panic_handler: Arc<PanicHandler>,
    config: Config,
    shut_down: bool,
}

impl ThreadPool {
    pub fn new(num_workers: usize) -> Result<Self> {
        let config = Config::builder().num_workers(num_workers).build()?;
        Self::with_config(&config)
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let panic_handler = Arc::new(PanicHandler::new(config.panic_strategy));
        let mut workers = Vec::with_capacity(config.num_workers);

        for id in 0..config.num_workers {
            let mut worker = Worker::with_config(id, config, panic_handler.clone());
            // earlier workers are joined when `workers` drops
            worker.start()?;
            workers.push(worker);
        }

        if workers.is_empty() {
            tracing::warn!("thread pool created without workers, submissions will be rejected");
        } else {
            tracing::debug!(workers = workers.len(), "thread pool started");
        }

        Ok(Self {
            workers,
            panic_handler,
            config: config.clone(),
            shut_down: false,
        })
    }

    /// Queues `f` on the worker with the lowest
    /// [`total_load`](Worker::total_load): queued tasks plus the one running.
    ///
    /// Ties go to the lowest worker id. Fails with [`Error::NoWorkers`] when
    /// the pool has no workers; the task is dropped without running.
    pub fn submit<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shut_down {
            return Err(Error::PoolShutdown);
        }

        let worker = self.least_loaded().ok_or(Error::NoWorkers)?;
        worker.assign(f);
        Ok(())
    }

    /// Like [`submit`](ThreadPool::submit), logging the error instead of
    /// returning it.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(e) = self.submit(f) {
            tracing::warn!(error = %e, "task not submitted");
        }
    }

    fn least_loaded(&self) -> Option<&Worker> {
        let mut best: Option<(&Worker, usize)> = None;

        for worker in &self.workers {
            let load = worker.total_load();
            match best {
                Some((_, min)) if min <= load => {}
                _ => {
                    best = Some((worker, load));
                    if load == 0 {
                        break;
                    }
                }
            }
        }

        best.map(|(worker, _)| worker)
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Current queue length of every worker, in id order.
    pub fn work_loads(&self) -> Vec<usize> {
        self.workers.iter().map(Worker::work_load).collect()
    }

    pub fn pending_tasks(&self) -> usize {
        self.workers.iter().map(Worker::work_load).sum()
    }

    pub fn panic_count(&self) -> usize {
        self.panic_handler.panic_count()
    }

    pub fn stats(&self) -> PoolStats {
        let workers: Vec<WorkerStats> = self.workers.iter().map(Worker::stats).collect();

        PoolStats {
            pending: workers.iter().map(|w| w.pending).sum(),
            tasks_executed: workers.iter().map(|w| w.tasks_executed).sum(),
            tasks_panicked: workers.iter().map(|w| w.tasks_panicked).sum(),
            workers,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        for worker in &mut self.workers {
            worker.shutdown();
        }

        tracing::debug!(workers = self.workers.len(), "thread pool stopped");
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PanicStrategy;
    use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn thread_name() -> Option<String> {
        std::thread::current().name().map(str::to_string)
    }

    // Occupies a worker until the returned sender is used or dropped.
    fn block(worker: &Worker) -> Sender<()> {
        let (started_tx, started_rx) = bounded(1);
        let (gate_tx, gate_rx): (Sender<()>, Receiver<()>) = bounded(1);
        worker.assign(move || {
            started_tx.send(()).unwrap();
            let _ = gate_rx.recv();
        });
        started_rx.recv_timeout(TIMEOUT).unwrap();
        gate_tx
    }

    #[test]
    fn test_pool_new() {
        let pool = ThreadPool::new(4).unwrap();
        assert_eq!(pool.num_workers(), 4);
        assert_eq!(pool.work_loads(), vec![0, 0, 0, 0]);
        assert!(pool.workers.iter().all(Worker::is_running));
    }

    #[test]
    fn test_default_config_single_worker() {
        let pool = ThreadPool::with_config(&Config::default()).unwrap();
        assert_eq!(pool.num_workers(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            thread_name_prefix: String::new(),
            ..Config::default()
        };
        assert!(matches!(
            ThreadPool::with_config(&config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_empty_pool_rejects() {
        let pool = ThreadPool::new(0).unwrap();
        assert!(matches!(pool.submit(|| {}), Err(Error::NoWorkers)));
        pool.execute(|| {});
        assert_eq!(pool.pending_tasks(), 0);
    }

    #[test]
    fn test_tie_goes_to_first_worker() {
        let pool = ThreadPool::new(3).unwrap();
        let gates: Vec<_> = pool.workers.iter().map(block).collect();

        // every worker is busy with an empty queue
        pool.submit(|| {}).unwrap();
        assert_eq!(pool.work_loads(), vec![1, 0, 0]);

        pool.submit(|| {}).unwrap();
        pool.submit(|| {}).unwrap();
        assert_eq!(pool.work_loads(), vec![1, 1, 1]);

        pool.submit(|| {}).unwrap();
        assert_eq!(pool.work_loads(), vec![2, 1, 1]);

        drop(gates);
    }

    #[test]
    fn test_busy_worker_not_treated_as_idle() {
        let pool = ThreadPool::new(2).unwrap();
        let gate = block(&pool.workers[0]);

        // worker 0 has an empty queue but is running a task
        let (tx, rx) = unbounded();
        pool.submit(move || tx.send(thread_name()).unwrap()).unwrap();

        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap().as_deref(), Some("bond-worker-1"));
        assert_eq!(pool.work_loads(), vec![0, 0]);

        drop(gate);
    }

    #[test]
    fn test_least_loaded_selection() {
        let pool = ThreadPool::new(2).unwrap();
        let gates: Vec<_> = pool.workers.iter().map(block).collect();

        for _ in 0..4 {
            pool.submit(|| {}).unwrap();
        }
        assert_eq!(pool.work_loads(), vec![2, 2]);
        assert_eq!(pool.pending_tasks(), 4);

        drop(gates);
    }

    #[test]
    fn test_submit_after_shutdown() {
        let mut pool = ThreadPool::new(2).unwrap();
        pool.shutdown();
        pool.shutdown();

        assert!(pool.is_shut_down());
        assert!(matches!(pool.submit(|| {}), Err(Error::PoolShutdown)));
    }

    #[test]
    fn test_panic_counted() {
        let config = Config::builder()
            .num_workers(1)
            .panic_strategy(PanicStrategy::Isolate)
            .build()
            .unwrap();
        let mut pool = ThreadPool::with_config(&config).unwrap();

        let (tx, rx) = unbounded();
        pool.submit(|| panic!("first")).unwrap();
        pool.submit(move || tx.send(()).unwrap()).unwrap();
        rx.recv_timeout(TIMEOUT).unwrap();

        pool.shutdown();
        assert_eq!(pool.panic_count(), 1);

        let stats = pool.stats();
        assert_eq!(stats.tasks_executed, 2);
        assert_eq!(stats.tasks_panicked, 1);
        assert_eq!(stats.workers[0].last_panic.as_deref(), Some("first"));
        assert_eq!(stats.workers.len(), 1);
    }
}

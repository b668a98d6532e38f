use crate::executor::WorkerId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("no workers available, task dropped")]
    NoWorkers,

    #[error("thread pool has been shut down")]
    PoolShutdown,

    #[error("worker {0} has been stopped")]
    WorkerStopped(WorkerId),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }
}

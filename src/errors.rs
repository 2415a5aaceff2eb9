use thiserror::Error;

/// Ошибки построения пула
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PoolError {
    #[error("worker count must be positive")]
    ZeroWorkers,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Некорректный вызов `submit_task`. Отказ из-за состояния пула ошибкой не является,
/// это просто `false`.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum PostError {
    #[error("no callable supplied for task")]
    MissingCallable,
}

#[derive(Debug, Error, PartialEq, PartialOrd, Eq, Ord, Clone)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panic(String),
    #[error("result channel closed before the task finished")]
    ChannelClosed,
    #[error("timed out waiting for task result")]
    Timeout,
    #[error("task was cancelled")]
    Cancelled,
}

//! Пул потоков с управляемым жизненным циклом
//!
//! # Features
//! - Фиксированный набор потоков и неограниченная FIFO очередь
//! - Graceful shutdown: очередь дорабатывается до конца
//! - Kill: очередь выбрасывается, выполняющиеся задачи получают сигнал отмены
//! - Ожидание остановки с таймаутом
//! - Изоляция паник внутри задач
//! - Handles на результат задачи и метрики пула
//! - Общий пул на процесс

pub mod errors;
pub mod global;
pub mod handle;
pub mod model;
pub mod pool;
pub mod queue;
pub mod result;
mod worker;

pub use errors::{PoolError, PostError, TaskError};
pub use global::{global, install_global, try_global};
pub use handle::{join_handles, JoinHandle, Task, TaskBuilder, TaskContext};
pub use model::{PoolMetrics, PoolState, WorkerState, WorkerStatus};
pub use pool::{Config, ThreadPool};
pub use result::TaskResult;

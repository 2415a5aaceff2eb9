use std::fmt;

/// Состояние жизненного цикла пула
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolState {
    Running,
    ShuttingDown,
    Shutdown,
    Killed,
}

impl PoolState {
    /// `Shutdown` и `Killed` финальные: из них переходов нет
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, PoolState::Shutdown | PoolState::Killed)
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoolState::Running => "running",
            PoolState::ShuttingDown => "shutting_down",
            PoolState::Shutdown => "shutdown",
            PoolState::Killed => "killed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Running = 1,
    Dead = 2,
}

impl WorkerState {
    #[inline]
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Idle,
            1 => WorkerState::Running,
            _ => WorkerState::Dead,
        }
    }
}

/// Снимок состояния одного воркера для диагностики
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    pub id: usize,
    pub thread_name: String,
    pub state: WorkerState,
    pub tasks_completed: usize,
}

#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub active_tasks: usize,
    pub idle_workers: usize,
    pub queued_tasks: usize,
    pub total_posted: usize,
    pub rejected_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub discarded_tasks: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.active_tasks + self.idle_workers == 0 {
            return 0.0;
        }
        self.active_tasks as f64 / (self.active_tasks + self.idle_workers) as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed_tasks + self.failed_tasks;
        if total == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / total as f64
    }
}

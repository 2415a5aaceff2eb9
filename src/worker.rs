use super::{
    handle::panic_message,
    model::{WorkerState, WorkerStatus},
    pool::Shared,
};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU8, AtomicUsize, Ordering},
        Arc,
    },
};
use tracing::{debug, error};


/// Ячейка воркера в реестре пула. Поток держит свою копию `Arc`,
/// пул читает из нее статус.
pub(crate) struct WorkerSlot {
    id: usize,
    thread_name: String,
    state: AtomicU8,
    tasks_completed: AtomicUsize,
}

impl WorkerSlot {
    pub(crate) fn new(id: usize, thread_name: String) -> Self {
        Self {
            id,
            thread_name,
            state: AtomicU8::new(WorkerState::Idle as u8),
            tasks_completed: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn snapshot(&self) -> WorkerStatus {
        WorkerStatus {
            id: self.id,
            thread_name: self.thread_name.clone(),
            state: self.state(),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
        }
    }
}


pub(crate) fn worker_loop(shared: Arc<Shared>, slot: Arc<WorkerSlot>) {
    debug!(worker = slot.id, thread = %slot.thread_name, "worker started");

    while let Some(task) = shared.queue.take() {
        // Задачу, снятую с очереди уже после kill, не запускаем
        if shared.kill_token.is_cancelled() {
            drop(task);
            shared.counters.discarded.fetch_add(1, Ordering::Relaxed);
            break;
        }
        if task.is_cancelled() {
            debug!(worker = slot.id, task = task.name().unwrap_or("<anonymous>"), "skipping cancelled task");
            drop(task);
            shared.counters.discarded.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        slot.set_state(WorkerState::Running);
        shared.counters.active.fetch_add(1, Ordering::Relaxed);

        let name = task.name().map(str::to_owned);
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || task.run()));

        shared.counters.active.fetch_sub(1, Ordering::Relaxed);
        slot.tasks_completed.fetch_add(1, Ordering::Relaxed);

        match outcome {
            Ok(()) => {
                shared.counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    worker = slot.id,
                    task = name.as_deref().unwrap_or("<anonymous>"),
                    "task panicked: {}",
                    panic_message(&*payload),
                );
            }
        }

        // kill уже вычеркнул воркер из реестра, ждать следующую задачу незачем
        if slot.state() == WorkerState::Dead {
            break;
        }
        slot.set_state(WorkerState::Idle);
    }

    slot.set_state(WorkerState::Dead);
    debug!(worker = slot.id, "worker exited");
    shared.worker_exited(slot.id);
}

use super::{
    errors::{PoolError, PostError, TaskError},
    handle::{panic_message, Callable, JoinHandle, Task, TaskBuilder, TaskContext},
    model::{PoolMetrics, PoolState, WorkerState, WorkerStatus},
    queue::TaskQueue,
    worker::{worker_loop, WorkerSlot},
};
use std::{
    collections::BTreeMap,
    env,
    fmt,
    ops::Shl,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};


pub const THREADS_ENV: &str = "MANAGED_POOL_THREADS";
pub const THREAD_PREFIX_ENV: &str = "MANAGED_POOL_THREAD_PREFIX";
const DEFAULT_THREAD_PREFIX: &str = "managed-pool";

/// Конфигурация пула потоков
#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: usize,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_string(),
            stack_size: None,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        Self::default()
    }

    pub fn io_bound() -> Self {
        Self {
            num_threads: num_cpus::get() * 2, // Для I/O-bound задач
            ..Default::default()
        }
    }

    /// Дефолты, переопределенные переменными окружения
    /// `MANAGED_POOL_THREADS` и `MANAGED_POOL_THREAD_PREFIX`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = env::var(THREADS_ENV) {
            match parse_threads(&raw) {
                Some(n) => config.num_threads = n,
                None => warn!(
                    value = %raw,
                    fallback = config.num_threads,
                    "ignoring invalid {}", THREADS_ENV
                ),
            }
        }
        if let Ok(prefix) = env::var(THREAD_PREFIX_ENV) {
            if prefix.is_empty() || prefix.contains('\0') {
                warn!(value = %prefix, "ignoring invalid {}", THREAD_PREFIX_ENV);
            } else {
                config.thread_name_prefix = prefix;
            }
        }

        config
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}

fn parse_threads(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|n| *n > 0)
}


#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) total_posted: AtomicUsize,
    pub(crate) rejected: AtomicUsize,
    pub(crate) completed: AtomicUsize,
    pub(crate) failed: AtomicUsize,
    pub(crate) discarded: AtomicUsize,
    pub(crate) active: AtomicUsize,
}

pub(crate) struct Lifecycle {
    state: PoolState,
    workers: BTreeMap<usize, Arc<WorkerSlot>>,
}

/// Общее состояние пула, которое делят контроллер и воркеры.
/// Состояние и реестр воркеров меняются только под `lifecycle`.
pub(crate) struct Shared {
    lifecycle: Mutex<Lifecycle>,
    terminated: Condvar,
    pub(crate) queue: TaskQueue,
    pub(crate) kill_token: CancellationToken,
    pub(crate) counters: Counters,
}

impl Shared {
    fn new() -> Self {
        Self {
            lifecycle: Mutex::new(Lifecycle {
                state: PoolState::Running,
                workers: BTreeMap::new(),
            }),
            terminated: Condvar::new(),
            queue: TaskQueue::new(),
            kill_token: CancellationToken::new(),
            counters: Counters::default(),
        }
    }

    /// Последний вышедший воркер завершает graceful shutdown
    pub(crate) fn worker_exited(&self, id: usize) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.workers.remove(&id);
        if lifecycle.workers.is_empty() && lifecycle.state == PoolState::ShuttingDown {
            lifecycle.state = PoolState::Shutdown;
            debug!("pool drained, state -> {}", PoolState::Shutdown);
            self.terminated.notify_all();
        }
    }
}


/// Пул с фиксированным числом потоков и двумя режимами остановки:
/// `shutdown` дорабатывает очередь, `kill` ее выбрасывает.
///
/// Drop запрашивает graceful shutdown и не блокирует.
pub struct ThreadPool {
    shared: Arc<Shared>,
    config: Config,
}

impl ThreadPool {
    pub fn new(num_threads: usize) -> Result<Self, PoolError> {
        let config = Config {
            num_threads,
            ..Default::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self, PoolError> {
        if config.num_threads == 0 {
            return Err(PoolError::ZeroWorkers);
        }

        let pool = ThreadPool {
            shared: Arc::new(Shared::new()),
            config,
        };

        // Запускаем воркеры
        for id in 0..pool.config.num_threads {
            if let Err(err) = pool.spawn_worker(id) {
                pool.kill();
                return Err(err);
            }
        }

        debug!(
            workers = pool.config.num_threads,
            prefix = %pool.config.thread_name_prefix,
            "thread pool started"
        );
        Ok(pool)
    }

    fn spawn_worker(&self, id: usize) -> Result<(), PoolError> {
        let name = format!("{}-{}", self.config.thread_name_prefix, id);
        let slot = Arc::new(WorkerSlot::new(id, name.clone()));
        // Регистрируем до старта потока, иначе worker_exited может его опередить
        self.shared.lifecycle.lock().workers.insert(id, slot.clone());

        let mut builder = thread::Builder::new().name(name);
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }

        let shared = self.shared.clone();
        match builder.spawn(move || worker_loop(shared, slot)) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.shared.lifecycle.lock().workers.remove(&id);
                Err(PoolError::Spawn(e.to_string()))
            }
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn push(&self, task: Task) -> bool {
        let rejected = {
            let lifecycle = self.shared.lifecycle.lock();
            if lifecycle.state != PoolState::Running {
                Some(task)
            } else {
                self.shared.queue.push(task).err()
            }
        };

        match rejected {
            None => {
                self.shared.counters.total_posted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Some(task) => {
                self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                drop(task);
                false
            }
        }
    }

    fn task(&self, callable: Callable) -> Task {
        Task::new(None, callable, self.shared.kill_token.child_token())
    }

    /// Ставит задачу в очередь. `false`, если пул уже не в `Running`;
    /// в этом случае замыкание не будет вызвано.
    pub fn post<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(self.task(Box::new(move |_: &TaskContext| f())))
    }

    /// Как `post`, но аргументы передаются в замыкание отдельно
    pub fn post_with<A, F>(&self, args: A, f: F) -> bool
    where
        A: Send + 'static,
        F: FnOnce(A) + Send + 'static,
    {
        self.push(self.task(Box::new(move |_: &TaskContext| f(args))))
    }

    /// Задача получает `TaskContext` и может проверять сигнал `kill`
    pub fn post_with_context<F>(&self, f: F) -> bool
    where
        F: FnOnce(&TaskContext) + Send + 'static,
    {
        self.push(self.task(Box::new(f)))
    }

    /// Общая форма `post`. Описание без замыкания это ошибка вызывающего,
    /// а не отказ пула.
    pub fn submit_task(&self, builder: TaskBuilder) -> Result<bool, PostError> {
        let task = builder.build(self.shared.kill_token.child_token())?;
        Ok(self.push(task))
    }

    /// Ставит задачу в очередь и возвращает handle на ее результат.
    /// `None`, если пул задачу не принял.
    pub fn submit<T, F>(&self, f: F) -> Option<JoinHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let token = self.shared.kill_token.child_token();

        let callable: Callable = Box::new(move |ctx: &TaskContext| {
            match panic::catch_unwind(AssertUnwindSafe(|| f(ctx))) {
                Ok(value) => {
                    let _ = tx.send(Ok(value));
                }
                Err(payload) => {
                    let _ = tx.send(Err(TaskError::Panic(panic_message(&*payload))));
                    // Пусть воркер учтет и залогирует панику как обычно
                    panic::resume_unwind(payload);
                }
            }
        });

        if self.push(Task::new(None, callable, token.clone())) {
            Some(JoinHandle::new(token, rx))
        } else {
            None
        }
    }

    /// `Running -> ShuttingDown`. Не блокирует, повторный вызов ничего не делает.
    pub fn shutdown(&self) {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.state != PoolState::Running {
            return;
        }

        lifecycle.state = PoolState::ShuttingDown;
        self.shared.queue.close();
        info!(queued = self.shared.queue.len(), "graceful shutdown requested");

        if lifecycle.workers.is_empty() {
            lifecycle.state = PoolState::Shutdown;
            self.shared.terminated.notify_all();
        }
    }

    /// Переводит пул в `Killed`: очередь выбрасывается, выполняющиеся задачи
    /// получают сигнал отмены через `TaskContext`. Потоки, которые сигнал
    /// игнорируют, отвязываются от пула и дорабатывают сами.
    pub fn kill(&self) {
        {
            let mut lifecycle = self.shared.lifecycle.lock();
            if lifecycle.state.is_terminal() {
                return;
            }

            lifecycle.state = PoolState::Killed;
            for slot in lifecycle.workers.values() {
                slot.set_state(WorkerState::Dead);
            }
            lifecycle.workers.clear();

            // Токен до закрытия очереди: воркер, успевший снять задачу, ее выбросит
            self.shared.kill_token.cancel();
            self.shared.queue.close();
            self.shared.terminated.notify_all();
        }

        let discarded = self.shared.queue.discard();
        self.shared.counters.discarded.fetch_add(discarded, Ordering::Relaxed);
        info!(discarded, "thread pool killed");
    }

    /// Ждет `Shutdown` или `Killed`. `None` ждет без ограничения.
    /// Таймаут касается только ожидающего и пул не останавливает.
    pub fn wait_for_termination(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut lifecycle = self.shared.lifecycle.lock();

        while !lifecycle.state.is_terminal() {
            match deadline {
                None => self.shared.terminated.wait(&mut lifecycle),
                Some(deadline) => {
                    if self.shared.terminated.wait_until(&mut lifecycle, deadline).timed_out() {
                        return lifecycle.state.is_terminal();
                    }
                }
            }
        }
        true
    }

    #[inline]
    pub fn state(&self) -> PoolState {
        self.shared.lifecycle.lock().state
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state() == PoolState::Running
    }

    /// `true` с момента запроса `shutdown`, а не только после полной остановки
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        matches!(self.state(), PoolState::ShuttingDown | PoolState::Shutdown)
    }

    #[inline]
    pub fn is_killed(&self) -> bool {
        self.state() == PoolState::Killed
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.state().is_terminal()
    }

    /// Живые воркеры. Пусто, когда все вышли или пул убит.
    pub fn status(&self) -> Vec<WorkerStatus> {
        self.shared
            .lifecycle
            .lock()
            .workers
            .values()
            .map(|slot| slot.snapshot())
            .collect()
    }

    pub fn metrics(&self) -> PoolMetrics {
        let idle_workers = self
            .shared
            .lifecycle
            .lock()
            .workers
            .values()
            .filter(|slot| slot.state() == WorkerState::Idle)
            .count();
        let counters = &self.shared.counters;

        PoolMetrics {
            active_tasks: counters.active.load(Ordering::Relaxed),
            idle_workers,
            queued_tasks: self.shared.queue.len(),
            total_posted: counters.total_posted.load(Ordering::Relaxed),
            rejected_tasks: counters.rejected.load(Ordering::Relaxed),
            completed_tasks: counters.completed.load(Ordering::Relaxed),
            failed_tasks: counters.failed.load(Ordering::Relaxed),
            discarded_tasks: counters.discarded.load(Ordering::Relaxed),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.shared.lifecycle.lock();
        f.debug_struct("ThreadPool")
            .field("state", &lifecycle.state)
            .field("workers", &lifecycle.workers.len())
            .field("queued", &self.shared.queue.len())
            .finish()
    }
}

/// `&pool << f` это `post` без результата, для цепочек
impl<'a, F> Shl<F> for &'a ThreadPool
where
    F: FnOnce() + Send + 'static,
{
    type Output = &'a ThreadPool;

    fn shl(self, f: F) -> Self::Output {
        self.post(f);
        self
    }
}

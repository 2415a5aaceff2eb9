use super::{
    errors::{PostError, TaskError},
    result::TaskResult,
};
use std::{
    any::Any,
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::{
    sync::oneshot,
    time::Duration,
};
use tokio_util::sync::CancellationToken;


pub(crate) type Callable = Box<dyn FnOnce(&TaskContext) + Send + 'static>;

/// Контекст выполняющейся задачи.
///
/// Прерывание при `kill` кооперативное: долгая задача должна сама проверять
/// `is_cancelled()` в безопасных точках. Задача, которая сигнал игнорирует,
/// доработает до конца на отвязанном потоке.
pub struct TaskContext {
    token: CancellationToken,
}

impl TaskContext {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[inline]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}


/// Единица работы: замыкание с захваченными аргументами.
/// Выполняется ровно один раз одним воркером.
pub struct Task {
    name: Option<String>,
    callable: Callable,
    token: CancellationToken,
}

impl Task {
    pub(crate) fn new(name: Option<String>, callable: Callable, token: CancellationToken) -> Self {
        Self { name, callable, token }
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn run(self) {
        let ctx = TaskContext { token: self.token };
        (self.callable)(&ctx);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}


/// Описание задачи для `ThreadPool::submit_task`.
/// Без замыкания задача невалидна, и пул вернет `PostError::MissingCallable`.
#[derive(Default)]
pub struct TaskBuilder {
    name: Option<String>,
    callable: Option<Callable>,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn callable<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.callable = Some(Box::new(move |_: &TaskContext| f()));
        self
    }

    pub fn callable_with_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&TaskContext) + Send + 'static,
    {
        self.callable = Some(Box::new(f));
        self
    }

    /// Аргументы передаются в замыкание как есть, обычно кортежем
    pub fn callable_with_args<A, F>(mut self, args: A, f: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) + Send + 'static,
    {
        self.callable = Some(Box::new(move |_: &TaskContext| f(args)));
        self
    }

    #[inline]
    pub fn has_callable(&self) -> bool {
        self.callable.is_some()
    }

    pub(crate) fn build(self, token: CancellationToken) -> Result<Task, PostError> {
        let callable = self.callable.ok_or(PostError::MissingCallable)?;
        Ok(Task::new(self.name, callable, token))
    }
}

impl fmt::Debug for TaskBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskBuilder")
            .field("name", &self.name)
            .field("has_callable", &self.callable.is_some())
            .finish()
    }
}


pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}


/// Handle на задачу с поддержкой отмены и timeout
pub struct JoinHandle<T> {
    cancel_token: CancellationToken,
    receiver: oneshot::Receiver<TaskResult<T>>,
}

#[inline]
fn closed_error(token: &CancellationToken) -> TaskError {
    // Задача выброшена без запуска: из-за отмены или потому что пул ее потерял
    if token.is_cancelled() {
        TaskError::Cancelled
    } else {
        TaskError::ChannelClosed
    }
}

impl<T> JoinHandle<T> {

    pub(crate) fn new
    (
        cancel_token: CancellationToken,
        receiver: oneshot::Receiver<TaskResult<T>>,
    ) -> Self {
        Self {
            cancel_token,
            receiver
        }
    }

    /// Отменяет только эту задачу. Если она еще в очереди, воркер ее пропустит.
    #[inline]
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Блокирующее ожидание результата.
    ///
    /// # Panics
    ///
    /// Паникует при вызове из асинхронного контекста tokio, там нужен `.await`.
    pub fn join(self) -> TaskResult<T> {
        let JoinHandle { cancel_token, receiver } = self;
        receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(closed_error(&cancel_token)))
    }

    pub async fn await_timeout(self, timeout: Duration) -> TaskResult<T> {
        let JoinHandle { cancel_token, receiver } = self;
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(closed_error(&cancel_token)),
            Err(_) => Err(TaskError::Timeout),
        }
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(res) => Poll::Ready(res.unwrap_or_else(|_| Err(closed_error(&this.cancel_token)))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Ждет все handles, результаты в порядке завершения
pub async fn join_handles<T>(handles: Vec<JoinHandle<T>>) -> Vec<TaskResult<T>> {
    if handles.is_empty() {
        return Vec::new();
    }

    let len = handles.len();
    let mut futures = FuturesUnordered::from_iter(handles);
    let mut results = Vec::with_capacity(len);

    while let Some(result) = futures.next().await {
        results.push(result);
    }

    results
}

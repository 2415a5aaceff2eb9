use super::handle::Task;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;


/// Неограниченная FIFO очередь задач: много производителей, много потребителей.
///
/// Закрытие роняет sender. Оставшиеся задачи воркеры еще дочитают,
/// после чего `take` вернет `None`.
pub struct TaskQueue {
    sender: Mutex<Option<Sender<Task>>>,
    receiver: Receiver<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: rx,
        }
    }

    /// Возвращает задачу обратно, если очередь уже закрыта
    pub fn push(&self, task: Task) -> Result<(), Task> {
        match self.sender.lock().as_ref() {
            Some(tx) => tx.send(task).map_err(|e| e.into_inner()),
            None => Err(task),
        }
    }

    /// Блокирует до появления задачи или до закрытия пустой очереди
    #[inline]
    pub fn take(&self) -> Option<Task> {
        self.receiver.recv().ok()
    }

    #[inline]
    pub fn try_take(&self) -> Option<Task> {
        self.receiver.try_recv().ok()
    }

    pub fn close(&self) {
        self.sender.lock().take();
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Закрывает очередь и выбрасывает все, что в ней осталось
    pub fn discard(&self) -> usize {
        self.close();
        let mut dropped = 0;
        while let Some(task) = self.try_take() {
            drop(task);
            dropped += 1;
        }
        dropped
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

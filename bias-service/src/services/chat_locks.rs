use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-chat async mutexes serializing the read-append-write section of
/// concurrent turns on the same chat within this process.
#[derive(Clone, Default)]
pub struct ChatLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Held while a turn writes its chat. Dropping it releases the chat and
/// prunes the table entry when nobody else is waiting on it.
pub struct ChatGuard {
    chat_id: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, chat_id: &str) -> ChatGuard {
        let mutex = self
            .locks
            .entry(chat_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_owned().await;

        ChatGuard {
            chat_id: chat_id.to_string(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Number of chats with a live entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for ChatGuard {
    fn drop(&mut self) {
        // Release first so the strong count below only reflects the table
        // and any waiters.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.chat_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

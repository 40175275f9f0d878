//! replicated log abstraction
//!
//! the substrate orders entries identically for every peer and merges
//! concurrent appends; it guarantees nothing about who wrote them. the core
//! only appends, deletes its own latest entry or prunes snapshots.

use parking_lot::RwLock;
use tokio::sync::watch;

/// ordered, externally synchronized append/delete container
pub trait ReplicatedLog<T>: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<T>;

    fn push(&self, item: T);

    /// remove `count` entries starting at `index`
    fn delete(&self, index: usize, count: usize);

    /// change counter, bumped on every mutation (local or merged)
    fn subscribe(&self) -> watch::Receiver<u64>;

    /// entries `[start, len)` as currently observed
    fn read_from(&self, start: usize) -> Vec<T> {
        (start..self.len()).filter_map(|i| self.get(i)).collect()
    }
}

/// in-process log for tests and local sessions
pub struct MemoryLog<T> {
    entries: RwLock<Vec<T>>,
    version: watch::Sender<u64>,
}

impl<T: Clone + Send + Sync> MemoryLog<T> {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            entries: RwLock::new(Vec::new()),
            version,
        }
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl<T: Clone + Send + Sync> Default for MemoryLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> ReplicatedLog<T> for MemoryLog<T> {
    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.entries.read().get(index).cloned()
    }

    fn push(&self, item: T) {
        self.entries.write().push(item);
        self.bump();
    }

    fn delete(&self, index: usize, count: usize) {
        {
            let mut entries = self.entries.write();
            if index >= entries.len() {
                return;
            }
            let end = index.saturating_add(count).min(entries.len());
            entries.drain(index..end);
        }
        self.bump();
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn read_from(&self, start: usize) -> Vec<T> {
        self.entries.read().iter().skip(start).cloned().collect()
    }
}

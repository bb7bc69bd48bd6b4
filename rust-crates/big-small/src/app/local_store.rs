use crate::{
    app::{
        in_memory_timer_storage::InMemoryTimerStorage,
        sled_storage::SledTimerStorage,
        timer_storage::TimerStorage,
    },
    timer::{
        DurationId,
        TimerSnapshot,
    },
};
use std::path::Path;

/// The timer store the game actually runs on: sled when the database opens,
/// otherwise timers that only live as long as the process.
#[derive(Clone)]
pub enum LocalTimerStore {
    Sled(SledTimerStorage),
    InMemory(InMemoryTimerStorage),
}

impl LocalTimerStore {
    pub fn open_or_in_memory<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match SledTimerStorage::open(path) {
            Ok(storage) => {
                tracing::info!("Using sled timer store at {}", path.display());
                LocalTimerStore::Sled(storage)
            }
            Err(err) => {
                tracing::warn!(
                    "Timer store at {} unavailable, falling back to in-memory timers: {err:#}",
                    path.display()
                );
                LocalTimerStore::in_memory()
            }
        }
    }

    pub fn in_memory() -> Self {
        LocalTimerStore::InMemory(InMemoryTimerStorage::new())
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, LocalTimerStore::Sled(_))
    }
}

impl TimerStorage for LocalTimerStore {
    fn get(&self, duration: DurationId) -> crate::Result<Option<TimerSnapshot>> {
        match self {
            LocalTimerStore::Sled(storage) => storage.get(duration),
            LocalTimerStore::InMemory(storage) => storage.get(duration),
        }
    }

    fn put(&mut self, snapshot: &TimerSnapshot) -> crate::Result<()> {
        match self {
            LocalTimerStore::Sled(storage) => storage.put(snapshot),
            LocalTimerStore::InMemory(storage) => storage.put(snapshot),
        }
    }
}

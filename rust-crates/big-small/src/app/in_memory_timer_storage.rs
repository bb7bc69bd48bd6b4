use crate::{
    Error,
    app::timer_storage::TimerStorage,
    timer::{
        DurationId,
        TimerSnapshot,
    },
};
use anyhow::anyhow;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
};

type TimerMap = HashMap<DurationId, TimerSnapshot>;

/// Process-local timers. Used when the on-disk store cannot be opened, and
/// as a test double since clones share the same map.
#[derive(Clone, Default)]
pub struct InMemoryTimerStorage {
    timers: Arc<Mutex<TimerMap>>,
}

impl InMemoryTimerStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_snapshots(snapshots: impl IntoIterator<Item = TimerSnapshot>) -> Self {
        let timers = snapshots
            .into_iter()
            .map(|snapshot| (snapshot.duration, snapshot))
            .collect();
        Self {
            timers: Arc::new(Mutex::new(timers)),
        }
    }

    pub fn timers(&self) -> Arc<Mutex<TimerMap>> {
        self.timers.clone()
    }
}

impl TimerStorage for InMemoryTimerStorage {
    fn get(&self, duration: DurationId) -> crate::Result<Option<TimerSnapshot>> {
        let guard = self
            .timers
            .lock()
            .map_err(|_| Error::StorageUnavailable(anyhow!("timer map lock poisoned")))?;
        Ok(guard.get(&duration).copied())
    }

    fn put(&mut self, snapshot: &TimerSnapshot) -> crate::Result<()> {
        let mut guard = self
            .timers
            .lock()
            .map_err(|_| Error::StorageUnavailable(anyhow!("timer map lock poisoned")))?;
        guard.insert(snapshot.duration, *snapshot);
        Ok(())
    }
}

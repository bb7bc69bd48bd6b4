// Sled-backed persistence for countdown snapshots.
use crate::{
    Error,
    app::timer_storage::TimerStorage,
    timer::{
        DurationId,
        TimerSnapshot,
    },
};
use anyhow::{
    Context,
    anyhow,
};
use sled::{
    Config,
    Db,
    Tree,
};
use std::path::Path;

const TIMERS_TREE: &str = "timers";

#[derive(Clone)]
pub struct SledTimerStorage {
    tree: Tree,
}

impl SledTimerStorage {
    pub fn new(db: &Db) -> anyhow::Result<Self> {
        let tree = db.open_tree(TIMERS_TREE).context("open timers tree")?;
        Ok(Self { tree })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let config = Config::default().path(path);
        let db = config.open().context("open sled database")?;
        Self::new(&db)
    }

    fn key(duration: DurationId) -> [u8; 4] {
        duration.minutes().to_be_bytes()
    }

    fn read(&self, duration: DurationId) -> anyhow::Result<Option<TimerSnapshot>> {
        let value = match self
            .tree
            .get(Self::key(duration))
            .with_context(|| format!("read timer record for {duration}"))?
        {
            Some(value) => value,
            None => return Ok(None),
        };
        let snapshot: TimerSnapshot = serde_json::from_slice(value.as_ref())
            .with_context(|| format!("deserialize timer record for {duration}"))?;
        if snapshot.duration != duration {
            return Err(anyhow!(
                "timer record under key {duration} belongs to {}",
                snapshot.duration
            ));
        }
        Ok(Some(snapshot))
    }

    fn write(&self, snapshot: &TimerSnapshot) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(snapshot).context("serialize timer record")?;
        self.tree
            .insert(Self::key(snapshot.duration), bytes)
            .context("persist timer record")?;
        self.tree.flush().context("flush timer records")?;
        Ok(())
    }
}

impl TimerStorage for SledTimerStorage {
    fn get(&self, duration: DurationId) -> crate::Result<Option<TimerSnapshot>> {
        self.read(duration).map_err(Error::StorageUnavailable)
    }

    fn put(&mut self, snapshot: &TimerSnapshot) -> crate::Result<()> {
        self.write(snapshot).map_err(Error::StorageUnavailable)
    }
}

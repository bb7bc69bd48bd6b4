use crate::timer::{
    DurationId,
    TimerSnapshot,
};

/// Key-value persistence of countdown snapshots, one record per duration.
///
/// Records are independent: writing one duration never touches another, and
/// each duration is only ever written by its own tick, so implementations
/// only need last-write-wins semantics per key.
pub trait TimerStorage {
    /// retrieve the stored snapshot for `duration`, `None` if it was never written
    fn get(&self, duration: DurationId) -> crate::Result<Option<TimerSnapshot>>;

    /// write or overwrite the snapshot keyed by its duration
    fn put(&mut self, snapshot: &TimerSnapshot) -> crate::Result<()>;
}

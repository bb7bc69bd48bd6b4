use crate::{
    Error,
    app::{
        clock::Clock,
        timer_storage::TimerStorage,
    },
    timer::{
        DurationId,
        ReconcileOutcome,
        Tick,
        TimerSnapshot,
    },
};
use std::collections::BTreeMap;

/// Owns the countdown of every configured duration and keeps the store in
/// step with it.
///
/// Writes are best effort: a failing store degrades to in-memory timers for
/// the rest of the session and the first failure is kept for the caller to
/// surface once.
pub struct TimerManager<Storage, C> {
    storage: Storage,
    clock: C,
    timers: BTreeMap<DurationId, TimerSnapshot>,
    storage_failed: bool,
    storage_alert: Option<Error>,
}

impl<Storage, C> TimerManager<Storage, C>
where
    Storage: TimerStorage,
    C: Clock,
{
    pub fn new(storage: Storage, clock: C, durations: &[DurationId]) -> Self {
        let now = clock.now_millis();
        let timers = durations
            .iter()
            .map(|&duration| (duration, TimerSnapshot::fresh(duration, now)))
            .collect();
        Self {
            storage,
            clock,
            timers,
            storage_failed: false,
            storage_alert: None,
        }
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Reconciles every configured duration against the store and returns
    /// the remaining seconds of each.
    pub fn reconcile_all(&mut self) -> Vec<(DurationId, u32)> {
        let durations: Vec<DurationId> = self.timers.keys().copied().collect();
        durations
            .into_iter()
            .map(|duration| (duration, self.reconcile(duration)))
            .collect()
    }

    pub fn reconcile(&mut self, duration: DurationId) -> u32 {
        let now = self.clock.now_millis();
        let snapshot = match self.storage.get(duration) {
            Ok(Some(stored)) => {
                let (snapshot, outcome) = stored.reconciled(now);
                match outcome {
                    ReconcileOutcome::Resumed { elapsed_seconds } => tracing::debug!(
                        %duration,
                        elapsed_seconds,
                        remaining = snapshot.remaining_seconds,
                        "Resumed timer"
                    ),
                    ReconcileOutcome::Expired { elapsed_seconds } => tracing::info!(
                        %duration,
                        elapsed_seconds,
                        "Timer expired while away, restarting cycle"
                    ),
                }
                snapshot
            }
            Ok(None) => TimerSnapshot::fresh(duration, now),
            Err(err) => {
                tracing::warn!(%duration, "Could not read stored timer: {err}");
                self.note_storage_failure(err);
                TimerSnapshot::fresh(duration, now)
            }
        };
        self.timers.insert(duration, snapshot);
        self.persist(&snapshot);
        snapshot.remaining_seconds
    }

    /// One second passed for `duration`. Returns `None` for unknown or
    /// inactive durations.
    pub fn tick(&mut self, duration: DurationId) -> Option<Tick> {
        let current = self.timers.get(&duration).filter(|timer| timer.active)?;
        let tick = current.ticked(self.clock.now_millis());
        self.timers.insert(duration, tick.snapshot);
        self.persist(&tick.snapshot);
        Some(tick)
    }

    /// Marks `duration` as running and persists it. Returns its remaining
    /// seconds, or `None` if it is not configured.
    pub fn activate(&mut self, duration: DurationId) -> Option<u32> {
        let now = self.clock.now_millis();
        let timer = self.timers.get_mut(&duration)?;
        timer.active = true;
        timer.last_persisted_at = now;
        let snapshot = *timer;
        self.persist(&snapshot);
        Some(snapshot.remaining_seconds)
    }

    pub fn remaining(&self, duration: DurationId) -> Option<u32> {
        self.timers
            .get(&duration)
            .map(|timer| timer.remaining_seconds)
    }

    pub fn snapshot(&self, duration: DurationId) -> Option<&TimerSnapshot> {
        self.timers.get(&duration)
    }

    pub fn overview(&self) -> Vec<(DurationId, u32)> {
        self.timers
            .iter()
            .map(|(&duration, timer)| (duration, timer.remaining_seconds))
            .collect()
    }

    pub fn running(&self) -> Vec<DurationId> {
        self.timers
            .values()
            .filter(|timer| timer.active)
            .map(|timer| timer.duration)
            .collect()
    }

    pub fn take_storage_alert(&mut self) -> Option<Error> {
        self.storage_alert.take()
    }

    fn persist(&mut self, snapshot: &TimerSnapshot) {
        if let Err(err) = self.storage.put(snapshot) {
            if self.storage_failed {
                tracing::debug!(duration = %snapshot.duration, "Timer write failed: {err}");
            } else {
                tracing::warn!(
                    duration = %snapshot.duration,
                    "Timer write failed, continuing with in-memory timers: {err}"
                );
            }
            self.note_storage_failure(err);
        }
    }

    fn note_storage_failure(&mut self, err: Error) {
        if !self.storage_failed {
            self.storage_failed = true;
            self.storage_alert = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::app::{
        clock::ManualClock,
        in_memory_timer_storage::InMemoryTimerStorage,
    };
    use anyhow::anyhow;
    use std::time::Duration;

    const ONE: DurationId = DurationId::from_minutes(1);
    const THREE: DurationId = DurationId::from_minutes(3);
    const T0: i64 = 1_700_000_000_000;

    struct FailingTimerStorage;

    impl TimerStorage for FailingTimerStorage {
        fn get(&self, _: DurationId) -> crate::Result<Option<TimerSnapshot>> {
            Err(Error::StorageUnavailable(anyhow!("disk on fire")))
        }

        fn put(&mut self, _: &TimerSnapshot) -> crate::Result<()> {
            Err(Error::StorageUnavailable(anyhow!("disk on fire")))
        }
    }

    #[test]
    fn reconcile_all__when_store_is_empty_then_every_timer_starts_full() {
        // given
        let storage = InMemoryTimerStorage::new();
        let clock = ManualClock::new(T0);
        let mut sut = TimerManager::new(storage.clone(), clock, &[ONE, THREE]);

        // when
        let overview = sut.reconcile_all();

        // then
        assert_eq!(overview, vec![(ONE, 60), (THREE, 180)]);
        let stored = storage.get(THREE).unwrap().unwrap();
        assert_eq!(stored.last_persisted_at, T0);
        assert!(stored.active);
    }

    #[test]
    fn reconcile__when_snapshot_is_stale_then_subtracts_elapsed_seconds() {
        // given
        let stored = TimerSnapshot {
            remaining_seconds: 100,
            last_persisted_at: T0,
            ..TimerSnapshot::fresh(THREE, T0)
        };
        let storage = InMemoryTimerStorage::new_with_snapshots([stored]);
        let clock = ManualClock::new(T0 + 30_500);
        let mut sut = TimerManager::new(storage.clone(), clock, &[THREE]);

        // when
        let remaining = sut.reconcile(THREE);

        // then
        assert_eq!(remaining, 70);
        let persisted = storage.get(THREE).unwrap().unwrap();
        assert_eq!(persisted.remaining_seconds, 70);
        assert_eq!(persisted.last_persisted_at, T0 + 30_000);
    }

    #[test]
    fn tick__when_ticked_three_times_then_remaining_drops_by_three() {
        // given
        let storage = InMemoryTimerStorage::new();
        let clock = ManualClock::new(T0);
        let mut sut = TimerManager::new(storage.clone(), clock.clone(), &[THREE]);
        sut.reconcile_all();

        // when
        for _ in 0..3 {
            clock.advance(Duration::from_secs(1));
            sut.tick(THREE);
        }

        // then
        assert_eq!(sut.remaining(THREE), Some(177));
        let persisted = storage.get(THREE).unwrap().unwrap();
        assert_eq!(persisted.remaining_seconds, 177);
        assert_eq!(persisted.last_persisted_at, T0 + 3_000);
    }

    #[test]
    fn tick__when_timer_hits_zero_then_rolls_over_to_full_cycle() {
        // given
        let stored = TimerSnapshot {
            remaining_seconds: 1,
            ..TimerSnapshot::fresh(ONE, T0)
        };
        let storage = InMemoryTimerStorage::new_with_snapshots([stored]);
        let clock = ManualClock::new(T0);
        let mut sut = TimerManager::new(storage, clock, &[ONE]);
        sut.reconcile_all();

        // when
        let to_zero = sut.tick(ONE).unwrap();
        let wrapped = sut.tick(ONE).unwrap();

        // then
        assert_eq!(to_zero.snapshot.remaining_seconds, 0);
        assert!(!to_zero.rolled_over);
        assert_eq!(wrapped.snapshot.remaining_seconds, 60);
        assert!(wrapped.rolled_over);
    }

    #[test]
    fn tick__when_timer_is_inactive_then_nothing_happens() {
        // given
        let stored = TimerSnapshot {
            active: false,
            ..TimerSnapshot::fresh(ONE, T0)
        };
        let storage = InMemoryTimerStorage::new_with_snapshots([stored]);
        let mut sut = TimerManager::new(storage, ManualClock::new(T0), &[ONE]);
        sut.reconcile_all();

        // when
        let tick = sut.tick(ONE);

        // then
        assert!(tick.is_none());
        assert!(sut.running().is_empty());
        assert_eq!(sut.activate(ONE), Some(60));
        assert_eq!(sut.running(), vec![ONE]);
    }

    #[test]
    fn persist__when_store_fails_then_timers_keep_running_and_alert_is_raised_once() {
        // given
        let clock = ManualClock::new(T0);
        let mut sut = TimerManager::new(FailingTimerStorage, clock, &[ONE]);

        // when
        let overview = sut.reconcile_all();
        let first_alert = sut.take_storage_alert();
        sut.tick(ONE);
        sut.tick(ONE);

        // then
        assert_eq!(overview, vec![(ONE, 60)]);
        assert!(matches!(first_alert, Some(Error::StorageUnavailable(_))));
        assert!(sut.take_storage_alert().is_none());
        assert_eq!(sut.remaining(ONE), Some(58));
    }
}

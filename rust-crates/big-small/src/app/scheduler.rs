use crate::timer::DurationId;
use std::time::Duration;
use tokio::time::{
    self,
    Instant,
    MissedTickBehavior,
};
use tokio_stream::{
    StreamExt,
    StreamMap,
    wrappers::IntervalStream,
};

/// One repeating interval per running duration. Registering a duration twice
/// keeps the existing interval, so a duration never ticks faster than its
/// period.
pub struct TickScheduler {
    period: Duration,
    clocks: StreamMap<DurationId, IntervalStream>,
}

impl TickScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            clocks: StreamMap::new(),
        }
    }

    /// Returns `false` if `duration` already had an interval.
    pub fn register(&mut self, duration: DurationId) -> bool {
        if self.clocks.contains_key(&duration) {
            return false;
        }
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        self.clocks.insert(duration, IntervalStream::new(interval));
        true
    }

    pub fn is_registered(&self, duration: DurationId) -> bool {
        self.clocks.contains_key(&duration)
    }

    pub fn registered(&self) -> Vec<DurationId> {
        self.clocks.keys().copied().collect()
    }

    pub fn clear(&mut self) {
        self.clocks.clear();
    }

    /// Resolves with the next duration whose interval fired. Pends forever
    /// while nothing is registered.
    pub async fn next_tick(&mut self) -> DurationId {
        if self.clocks.is_empty() {
            return std::future::pending().await;
        }
        match self.clocks.next().await {
            Some((duration, _)) => duration,
            None => std::future::pending().await,
        }
    }
}

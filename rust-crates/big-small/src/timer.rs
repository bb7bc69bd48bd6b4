use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

const SECONDS_PER_MINUTE: u32 = 60;
const MILLIS_PER_SECOND: i64 = 1000;

/// Nominal cycle length of a game, in minutes. Doubles as the storage key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DurationId(u32);

impl DurationId {
    pub const fn from_minutes(minutes: u32) -> Self {
        Self(minutes)
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    pub fn total_seconds(self) -> u32 {
        self.0.saturating_mul(SECONDS_PER_MINUTE)
    }
}

impl fmt::Display for DurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.0)
    }
}

/// Persisted countdown state of one duration.
///
/// Field names on the wire follow the record layout shared with the browser
/// client (`timeLeft`, `lastUpdated`, ...), so existing stores stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    #[serde(rename = "id")]
    pub duration: DurationId,
    #[serde(rename = "timeLeft")]
    pub remaining_seconds: u32,
    #[serde(rename = "duration")]
    pub total_seconds: u32,
    #[serde(rename = "lastUpdated")]
    pub last_persisted_at: i64,
    #[serde(rename = "isRunning")]
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The stored countdown is still inside its cycle.
    Resumed { elapsed_seconds: i64 },
    /// One or more cycles finished while nothing was ticking. The timer
    /// restarts at full length; missed cycles are not replayed.
    Expired { elapsed_seconds: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub snapshot: TimerSnapshot,
    pub rolled_over: bool,
}

impl TimerSnapshot {
    pub fn fresh(duration: DurationId, now_millis: i64) -> Self {
        let total = duration.total_seconds();
        Self {
            duration,
            remaining_seconds: total,
            total_seconds: total,
            last_persisted_at: now_millis,
            active: true,
        }
    }

    /// Brings a stored snapshot up to `now_millis` by subtracting the whole
    /// seconds that elapsed since it was last written.
    pub fn reconciled(&self, now_millis: i64) -> (TimerSnapshot, ReconcileOutcome) {
        let total = self.duration.total_seconds();
        let (elapsed_seconds, anchor) = if now_millis < self.last_persisted_at {
            // wall clock moved backwards; trust the stored value as of now
            (0, now_millis)
        } else {
            let elapsed = (now_millis - self.last_persisted_at) / MILLIS_PER_SECOND;
            (elapsed, self.last_persisted_at + elapsed * MILLIS_PER_SECOND)
        };
        let stored = i64::from(self.remaining_seconds.min(total));
        let remaining = stored - elapsed_seconds;

        if remaining <= 0 {
            let snapshot = TimerSnapshot {
                active: self.active,
                ..TimerSnapshot::fresh(self.duration, now_millis)
            };
            return (snapshot, ReconcileOutcome::Expired { elapsed_seconds });
        }

        let snapshot = TimerSnapshot {
            duration: self.duration,
            remaining_seconds: u32::try_from(remaining).unwrap_or(total),
            total_seconds: total,
            last_persisted_at: anchor,
            active: self.active,
        };
        (snapshot, ReconcileOutcome::Resumed { elapsed_seconds })
    }

    /// Advances the countdown by one second. A timer already at zero wraps to
    /// a full cycle instead of going negative.
    pub fn ticked(&self, now_millis: i64) -> Tick {
        let total = self.duration.total_seconds();
        let next = next_remaining(self.remaining_seconds.min(total), total);
        Tick {
            snapshot: TimerSnapshot {
                duration: self.duration,
                remaining_seconds: next,
                total_seconds: total,
                last_persisted_at: now_millis,
                active: true,
            },
            rolled_over: next == total,
        }
    }
}

pub fn next_remaining(current: u32, total: u32) -> u32 {
    if current > 0 { current - 1 } else { total }
}

/// `m:ss` rendering used by the countdown display.
pub fn format_countdown(seconds: u32) -> String {
    format!("{}:{:02}", seconds / SECONDS_PER_MINUTE, seconds % SECONDS_PER_MINUTE)
}

use anyhow::{
    Context,
    Result,
    ensure,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashSet,
    fs,
    path::Path,
    time::Duration,
};

use crate::{
    records::DEFAULT_RECORDS_PER_PAGE,
    timer::DurationId,
    wager::WagerLimits,
};

pub const DEFAULT_BASE_URL: &str = "https://rollix777.com/api";
pub const DEFAULT_DURATION_MINUTES: [u32; 4] = [1, 3, 5, 10];
pub const DEFAULT_USER_ID: u64 = 13;
const DEFAULT_LOW_TIME_SECONDS: u32 = 5;
const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
const DEFAULT_FALLBACK_RECORD_COUNT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Selectable round lengths in minutes, in display order. The first one
    /// is shown on startup.
    pub durations: Vec<DurationId>,
    pub limits: WagerLimits,
    pub low_time_seconds: u32,
    pub tick_interval_ms: u64,
    pub records_per_page: usize,
    pub fallback_record_count: usize,
    pub user_id: u64,
    pub base_url: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            durations: DEFAULT_DURATION_MINUTES
                .into_iter()
                .map(DurationId::from_minutes)
                .collect(),
            limits: WagerLimits::default(),
            low_time_seconds: DEFAULT_LOW_TIME_SECONDS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            records_per_page: DEFAULT_RECORDS_PER_PAGE,
            fallback_record_count: DEFAULT_FALLBACK_RECORD_COUNT,
            user_id: DEFAULT_USER_ID,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl GameConfig {
    /// Reads a JSON config file; missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let config: GameConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.durations.is_empty(), "at least one duration is required");
        let mut seen = HashSet::new();
        for duration in &self.durations {
            ensure!(duration.minutes() > 0, "durations must be positive");
            ensure!(seen.insert(*duration), "duration {duration} listed twice");
        }
        ensure!(
            self.limits.min_stake <= self.limits.max_stake,
            "min stake {} exceeds max stake {}",
            self.limits.min_stake,
            self.limits.max_stake
        );
        ensure!(self.tick_interval_ms > 0, "tick interval must be positive");
        ensure!(self.records_per_page > 0, "records per page must be positive");
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn initial_duration(&self) -> Option<DurationId> {
        self.durations.first().copied()
    }

    pub fn is_configured(&self, duration: DurationId) -> bool {
        self.durations.contains(&duration)
    }
}

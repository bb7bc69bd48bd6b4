use std::time::Duration;

use crate::{
    Error,
    records::RoundId,
    timer::DurationId,
    wager::{
        StakeEntry,
        WagerDraft,
    },
};

/// How long a presentation layer keeps the low-time pulse lit.
pub const LOW_TIME_PULSE: Duration = Duration::from_secs(1);

/// Signals emitted by the game core for whatever renders it.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// Remaining seconds per configured duration; sent once reconciliation
    /// finished and again on request.
    TimerOverview(Vec<(DurationId, u32)>),
    /// One second passed on the displayed duration.
    Tick { duration: DurationId, remaining: u32 },
    LowTimeWarning {
        duration: DurationId,
        remaining: u32,
        pulse: Duration,
    },
    RolledOver { duration: DurationId },
    DurationSelected { duration: DurationId, remaining: u32 },
    ResultsLoading,
    ResultsUpdated {
        round: RoundId,
        records: usize,
        fallback: bool,
    },
    PageChanged { page: usize, total_pages: usize },
    DraftChanged(WagerDraft),
    StakeEntered(StakeEntry),
    Notice(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl From<&Error> for Notice {
    fn from(error: &Error) -> Self {
        match error {
            Error::ValidationFailed(_) => Notice::warning(error.to_string()),
            _ => Notice::error(error.to_string()),
        }
    }
}

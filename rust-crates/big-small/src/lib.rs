pub mod app;

pub mod config;

pub mod events;

pub mod records;

pub mod timer;

pub mod wager;

use crate::wager::Rejection;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure categories surfaced by the game core. None of them is fatal: each
/// one maps onto a degraded-but-playable state and a one-shot notice.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("timer storage unavailable: {0:#}")]
    StorageUnavailable(anyhow::Error),

    #[error("results feed unavailable: {0:#}")]
    FetchFailed(anyhow::Error),

    #[error("bet submission failed: {0:#}")]
    SubmitFailed(anyhow::Error),

    #[error("wager rejected: {0}")]
    ValidationFailed(Rejection),
}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        Error::ValidationFailed(rejection)
    }
}

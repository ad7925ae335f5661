use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("weeks_ago must be >= 0, got {0}")]
    NegativeWeeksAgo(i64),

    #[error("Malformed payroll window {start}..{end}: expected a Tuesday start and the following Monday end")]
    MalformedWindow { start: NaiveDate, end: NaiveDate },

    #[error("Invalid pay delay {0}: expected 1 (standard) or 2 (one-week delayed)")]
    InvalidPayDelay(u8),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ScoreResult<T> = Result<T, ScoreError>;

use thiserror::Error;

/// Expected failure classes surfaced to administrators. Anything outside
/// these is an unexpected error, kept as `anyhow::Error` and persisted to
/// the failures table by the run coordinator.
#[derive(Debug, Error)]
pub enum RatingError {
    #[error("invalid request: {reason}")]
    Validation { reason: String },

    #[error("ordering violation: {reason}")]
    OutOfOrder { reason: String },

    #[error("tournament {id} not found")]
    TournamentNotFound { id: i64 },

    #[error("tournament {id} is locked")]
    Locked { id: i64 },
}

impl RatingError {
    pub fn validation(reason: impl Into<String>) -> Self {
        RatingError::Validation {
            reason: reason.into(),
        }
    }

    pub fn out_of_order(reason: impl Into<String>) -> Self {
        RatingError::OutOfOrder {
            reason: reason.into(),
        }
    }
}

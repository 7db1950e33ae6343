use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngagementError>;

#[derive(Error, Debug)]
pub enum EngagementError {
    /// Transport or connection failure, including per-call timeouts.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A combined content + event write failed and was rolled back.
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    /// The store already holds a like event for this (actor, target, type).
    #[error("Duplicate like event")]
    DuplicateLike,

    /// A stored row breaks the event invariants (unknown tag, wrong target column).
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl EngagementError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngagementError::StoreUnavailable(_) | EngagementError::TransactionAborted(_)
        )
    }

    /// "Bad request" as opposed to "internal error".
    pub fn is_client_error(&self) -> bool {
        matches!(self, EngagementError::InvalidInput(_))
    }
}

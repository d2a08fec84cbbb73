use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("notification not found: {0}")]
    NotFound(Uuid),
    #[error("notification {0} already left the scheduled state")]
    CancelTooLate(Uuid),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

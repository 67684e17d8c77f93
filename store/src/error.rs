use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    #[error("uniqueness violation: {0}")]
    Conflict(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

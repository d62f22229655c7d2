//! Store errors

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Backing store failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store lock poisoned by a panicked transaction")]
    Poisoned,

    #[error("Version key space exhausted")]
    VersionsExhausted,

    #[error("Store failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Poisoned => "STORE_POISONED",
            StoreError::VersionsExhausted => "STORE_VERSIONS_EXHAUSTED",
            StoreError::Backend(_) => "STORE_BACKEND",
        }
    }
}

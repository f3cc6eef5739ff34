use crate::config::ConfigError;
use crate::store::StoreError;
use crate::valuation::RateError;
use thiserror::Error;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("rate lookup error: {0}")]
    Rate(#[from] RateError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(StoreError::Database(err))
    }
}

//! Errors surfaced by the engine facade.

use crate::execution::TierError;
use crate::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no model gateway configured")]
    GatewayUnavailable,

    #[error("model request failed: {0}")]
    Gateway(#[from] TierError),

    #[error("source is written in {0}; translate it before asking for a fix")]
    ForeignLanguage(String),

    #[error("no fix available for these findings")]
    NoFixAvailable,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;

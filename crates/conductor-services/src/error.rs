use conductor_core::ValidationError;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} missing from request")]
    MissingIdentifier(&'static str),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Desired LRP with guid '{0}' not found")]
    DesiredLrpNotFound(String),
    #[error("failed to decode {key}: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
    #[error("failed to encode record: {0}")]
    Encode(serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::DesiredLrpNotFound(_))
    }
}

use rewind_backend::BackendError;
use rewind_core::{CacheError, FetchError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreModError {
    #[error("The core mod index has been disposed")]
    Disposed,

    #[error("Loading the core mod index was superseded by a newer request")]
    LoadCancelled,

    #[error("Invalid core mod index: {details}")]
    Deserialization { details: String },

    #[error("Failed to download the core mod index: {details}")]
    DownloadFailed { details: String },

    #[error("Failed to {operation} core mod {id}: {source}")]
    Registry {
        operation: &'static str,
        id: String,
        #[source]
        source: BackendError,
    },
}

impl CoreModError {
    pub fn registry(operation: &'static str, id: impl Into<String>, source: BackendError) -> Self {
        Self::Registry {
            operation,
            id: id.into(),
            source,
        }
    }

    #[must_use]
    pub fn is_download_failure(&self) -> bool {
        matches!(self, Self::DownloadFailed { .. })
    }
}

impl From<CacheError<FetchError>> for CoreModError {
    fn from(error: CacheError<FetchError>) -> Self {
        match error {
            CacheError::Disposed => Self::Disposed,
            CacheError::Cancelled { .. } => Self::LoadCancelled,
            CacheError::Load(FetchError::Deserialize { details, .. }) => {
                Self::Deserialization { details }
            }
            CacheError::Load(error) => Self::DownloadFailed {
                details: error.to_string(),
            },
        }
    }
}

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Package {app_id} is not installed")]
    NotInstalled { app_id: String },

    #[error("Command failed: {stderr}")]
    CommandFailed { stderr: String },

    #[error("Network error during {operation} ({stage}): {details}")]
    NetworkError {
        operation: &'static str,
        stage: NetworkStage,
        details: String,
    },

    #[error("IO error ({kind}): {message}")]
    IoError {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Operation not supported by this backend: {operation}")]
    Unsupported { operation: &'static str },

    #[error("Patch application failed: {details}")]
    PatchFailed { details: String },

    #[error("Timeout waiting for command")]
    Timeout,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStage {
    #[error("request")]
    Request,
    #[error("response status")]
    Status,
    #[error("response body")]
    Body,
}

impl BackendError {
    pub fn not_installed(app_id: impl Into<String>) -> Self {
        Self::NotInstalled {
            app_id: app_id.into(),
        }
    }

    pub fn command_failed(stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            stderr: stderr.into(),
        }
    }

    pub fn patch_failed(details: impl Into<String>) -> Self {
        Self::PatchFailed {
            details: details.into(),
        }
    }

    pub fn network(
        operation: &'static str,
        stage: NetworkStage,
        details: impl Into<String>,
    ) -> Self {
        Self::NetworkError {
            operation,
            stage,
            details: details.into(),
        }
    }

    pub fn network_request_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::network(operation, NetworkStage::Request, error.to_string())
    }

    /// Uninstalling a package that is already gone reports this, and callers
    /// are allowed to treat it as success.
    #[must_use]
    pub fn is_not_installed(&self) -> bool {
        matches!(self, Self::NotInstalled { .. })
    }

    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::NetworkError { .. } | Self::Timeout)
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendError, NetworkStage};

    #[test]
    fn io_error_conversion_maps_to_io_variant() {
        let mapped = BackendError::from(std::io::Error::other("permission denied"));
        assert!(
            matches!(
                mapped,
                BackendError::IoError { kind, ref message }
                    if kind == std::io::ErrorKind::Other && message.contains("permission denied")
            )
        );
    }

    #[test]
    fn not_installed_is_distinguishable_from_command_failure() {
        let absent = BackendError::not_installed("com.beatgames.beatsaber");
        let failed = BackendError::command_failed("INSTALL_FAILED_INSUFFICIENT_STORAGE");

        assert!(absent.is_not_installed());
        assert!(!failed.is_not_installed());
        assert_eq!(
            absent.to_string(),
            "Package com.beatgames.beatsaber is not installed"
        );
    }

    #[test]
    fn network_helpers_set_expected_stage() {
        let request = BackendError::network_request_from("download diff", "connection reset");
        assert!(matches!(
            request,
            BackendError::NetworkError {
                operation: "download diff",
                stage: NetworkStage::Request,
                ..
            }
        ));
        assert!(request.is_network());

        let status = BackendError::network("download diff", NetworkStage::Status, "HTTP 404");
        assert_eq!(
            status.to_string(),
            "Network error during download diff (response status): HTTP 404"
        );
    }
}

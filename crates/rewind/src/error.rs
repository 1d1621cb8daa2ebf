use rewind_backend::BackendError;
use rewind_core::FetchError;
use rewind_coremods::CoreModError;
use rewind_downgrade::DowngradeError;

use crate::operation::OperationLockError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppErrorDetail {
    Message(String),
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },
    Backend(BackendError),
    Downgrade(DowngradeError),
    CoreMods(CoreModError),
    Fetch(FetchError),
}

impl std::fmt::Display for AppErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(message) => write!(f, "{message}"),
            Self::Io { kind, message } => write!(f, "{kind}: {message}"),
            Self::Backend(error) => write!(f, "{error}"),
            Self::Downgrade(error) => write!(f, "{error}"),
            Self::CoreMods(error) => write!(f, "{error}"),
            Self::Fetch(error) => write!(f, "{error}"),
        }
    }
}

impl From<String> for AppErrorDetail {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<&str> for AppErrorDetail {
    fn from(value: &str) -> Self {
        Self::Message(value.to_string())
    }
}

impl From<std::io::Error> for AppErrorDetail {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<BackendError> for AppErrorDetail {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

impl From<DowngradeError> for AppErrorDetail {
    fn from(value: DowngradeError) -> Self {
        Self::Downgrade(value)
    }
}

impl From<CoreModError> for AppErrorDetail {
    fn from(value: CoreModError) -> Self {
        Self::CoreMods(value)
    }
}

impl From<FetchError> for AppErrorDetail {
    fn from(value: FetchError) -> Self {
        Self::Fetch(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    Message(String),
    NotInstalled,
    OperationInProgress,
    OperationCancelled {
        operation: &'static str,
    },
    OperationLockFailed {
        details: AppErrorDetail,
    },
    /// The network let us down; worth retrying.
    DownloadFailed {
        resource: &'static str,
        details: AppErrorDetail,
    },
    /// A file failed verification and was discarded.
    Corrupted {
        details: AppErrorDetail,
    },
    IndexUnavailable {
        resource: &'static str,
        details: AppErrorDetail,
    },
    DowngradeFailed {
        stage: &'static str,
        details: AppErrorDetail,
    },
    CoreModsFailed {
        action: &'static str,
        details: AppErrorDetail,
    },
    NoModdableVersion {
        version: String,
    },
    SettingsSaveFailed {
        details: AppErrorDetail,
    },
}

impl AppError {
    pub fn operation_cancelled(operation: &'static str) -> Self {
        Self::OperationCancelled { operation }
    }

    pub fn download_failed(resource: &'static str, details: impl Into<AppErrorDetail>) -> Self {
        Self::DownloadFailed {
            resource,
            details: details.into(),
        }
    }

    pub fn corrupted(details: impl Into<AppErrorDetail>) -> Self {
        Self::Corrupted {
            details: details.into(),
        }
    }

    pub fn index_unavailable(resource: &'static str, details: impl Into<AppErrorDetail>) -> Self {
        Self::IndexUnavailable {
            resource,
            details: details.into(),
        }
    }

    pub fn downgrade_failed(stage: &'static str, details: impl Into<AppErrorDetail>) -> Self {
        Self::DowngradeFailed {
            stage,
            details: details.into(),
        }
    }

    pub fn core_mods_failed(action: &'static str, details: impl Into<AppErrorDetail>) -> Self {
        Self::CoreModsFailed {
            action,
            details: details.into(),
        }
    }

    pub fn no_moddable_version(version: impl Into<String>) -> Self {
        Self::NoModdableVersion {
            version: version.into(),
        }
    }

    pub fn settings_save_failed(details: impl Into<AppErrorDetail>) -> Self {
        Self::SettingsSaveFailed {
            details: details.into(),
        }
    }

    #[must_use]
    pub fn is_download_failure(&self) -> bool {
        matches!(self, Self::DownloadFailed { .. })
    }

    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<&str> for AppError {
    fn from(value: &str) -> Self {
        Self::Message(value.to_string())
    }
}

impl From<DowngradeError> for AppError {
    fn from(error: DowngradeError) -> Self {
        match &error {
            DowngradeError::NotInstalled => Self::NotInstalled,
            DowngradeError::DownloadFailed { .. } => {
                Self::download_failed("downgrade files", error)
            }
            DowngradeError::Corrupted { .. } => Self::corrupted(error),
            DowngradeError::Disposed
            | DowngradeError::IndexLoadCancelled
            | DowngradeError::Deserialization { .. } => {
                Self::index_unavailable("downgrade index", error)
            }
            DowngradeError::Device { stage, .. } => Self::downgrade_failed(stage.as_str(), error),
            DowngradeError::VersionMismatch { .. } => Self::downgrade_failed("sanity check", error),
            DowngradeError::AssetMissing { .. } => Self::downgrade_failed("asset pull", error),
            DowngradeError::PatchFailed { .. } => Self::downgrade_failed("patch", error),
            DowngradeError::Io { .. } => Self::downgrade_failed("file access", error),
        }
    }
}

impl From<CoreModError> for AppError {
    fn from(error: CoreModError) -> Self {
        match &error {
            CoreModError::DownloadFailed { .. } => Self::download_failed("core mod index", error),
            CoreModError::Registry { operation, .. } => Self::core_mods_failed(*operation, error),
            CoreModError::Disposed
            | CoreModError::LoadCancelled
            | CoreModError::Deserialization { .. } => {
                Self::index_unavailable("core mod index", error)
            }
        }
    }
}

impl From<OperationLockError> for AppError {
    fn from(error: OperationLockError) -> Self {
        match error {
            OperationLockError::InProgress | OperationLockError::HeldElsewhere => {
                Self::OperationInProgress
            }
            OperationLockError::Io { context, source } => Self::OperationLockFailed {
                details: AppErrorDetail::Message(format!("{context}: {source}")),
            },
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(message) => write!(f, "{message}"),
            Self::NotInstalled => write!(f, "The game is not installed"),
            Self::OperationInProgress => write!(f, "Another operation is already in progress"),
            Self::OperationCancelled { operation } => write!(f, "{operation} cancelled"),
            Self::OperationLockFailed { details } => {
                write!(f, "Failed to take the operation lock: {details}")
            }
            Self::DownloadFailed { resource, details } => write!(
                f,
                "Failed to download {resource}, check your connection: {details}"
            ),
            Self::Corrupted { details } => {
                write!(f, "A downloaded or patched file is corrupted: {details}")
            }
            Self::IndexUnavailable { resource, details } => {
                write!(f, "The {resource} is unavailable: {details}")
            }
            Self::DowngradeFailed { stage, details } => {
                write!(f, "Downgrade failed during {stage}: {details}")
            }
            Self::CoreModsFailed { action, details } => {
                write!(f, "Core mod {action} failed: {details}")
            }
            Self::NoModdableVersion { version } => write!(
                f,
                "No core mods are available for {version} or any version it can be downgraded to"
            ),
            Self::SettingsSaveFailed { details } => {
                write!(f, "Failed to save settings: {details}")
            }
        }
    }
}

impl std::error::Error for AppError {}

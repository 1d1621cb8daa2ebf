use std::fmt;
use std::path::Path;

use rewind_backend::BackendError;
use rewind_core::{CacheError, ChecksumError, FetchError};
use thiserror::Error;

/// Where a checksum mismatch was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStage {
    /// The installed APK used as the patch source.
    Source,
    /// An asset pack pulled from the device.
    DeviceAsset,
    /// A downloaded diff asset.
    Diff,
    /// A patched output file.
    Output,
}

impl fmt::Display for VerifyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Source => "source",
            Self::DeviceAsset => "device asset",
            Self::Diff => "diff",
            Self::Output => "output",
        };
        f.write_str(label)
    }
}

/// Device-mutating steps of a version switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStage {
    ForceStop,
    BackupData,
    BackupAssets,
    Uninstall,
    Install,
    RestoreData,
    RestoreAssets,
    PushAssets,
}

impl DeviceStage {
    /// Stages whose failure aborts the switch.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Uninstall | Self::Install | Self::PushAssets)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ForceStop => "force-stop",
            Self::BackupData => "data backup",
            Self::BackupAssets => "asset backup",
            Self::Uninstall => "uninstall",
            Self::Install => "install",
            Self::RestoreData => "data restore",
            Self::RestoreAssets => "asset restore",
            Self::PushAssets => "asset push",
        }
    }
}

impl fmt::Display for DeviceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DowngradeError {
    #[error("The app is not installed")]
    NotInstalled,

    #[error("Installed version {installed} does not match the downgrade source {expected}")]
    VersionMismatch { installed: String, expected: String },

    #[error("The downgrade index has been disposed")]
    Disposed,

    #[error("Loading the downgrade index was superseded by a newer request")]
    IndexLoadCancelled,

    #[error("Invalid {document}: {details}")]
    Deserialization { document: String, details: String },

    #[error("Failed to download {what}: {details}")]
    DownloadFailed { what: String, details: String },

    #[error("{file} is corrupted ({stage} checksum mismatch)")]
    Corrupted { file: String, stage: VerifyStage },

    #[error("{file} was not found on the device")]
    AssetMissing { file: String },

    #[error("Failed to patch {file}: {details}")]
    PatchFailed { file: String, details: String },

    #[error("Device {stage} failed: {source}")]
    Device {
        stage: DeviceStage,
        #[source]
        source: BackendError,
    },

    #[error("File error on {path}: {details}")]
    Io { path: String, details: String },
}

impl DowngradeError {
    pub fn download_failed(what: impl Into<String>, details: impl fmt::Display) -> Self {
        Self::DownloadFailed {
            what: what.into(),
            details: details.to_string(),
        }
    }

    pub fn corrupted(file: impl Into<String>, stage: VerifyStage) -> Self {
        Self::Corrupted {
            file: file.into(),
            stage,
        }
    }

    #[must_use]
    pub fn device(stage: DeviceStage, source: BackendError) -> Self {
        Self::Device { stage, source }
    }

    pub fn io(path: &Path, details: impl fmt::Display) -> Self {
        Self::Io {
            path: path.display().to_string(),
            details: details.to_string(),
        }
    }

    /// A fetch could not complete; retrying on a better connection may help.
    #[must_use]
    pub fn is_download_failure(&self) -> bool {
        matches!(self, Self::DownloadFailed { .. })
    }

    /// A checksum check failed; the data must not be used.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }

    #[must_use]
    pub fn device_stage(&self) -> Option<DeviceStage> {
        match self {
            Self::Device { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<ChecksumError> for DowngradeError {
    fn from(error: ChecksumError) -> Self {
        Self::io(&error.path, error.source)
    }
}

impl From<CacheError<FetchError>> for DowngradeError {
    fn from(error: CacheError<FetchError>) -> Self {
        match error {
            CacheError::Disposed => Self::Disposed,
            CacheError::Cancelled { .. } => Self::IndexLoadCancelled,
            CacheError::Load(FetchError::Deserialize { url, details }) => Self::Deserialization {
                document: url,
                details,
            },
            CacheError::Load(error) => Self::download_failed("downgrade index", error),
        }
    }
}

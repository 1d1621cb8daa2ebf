use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::BackendError;
use crate::types::InstalledMod;

/// Control channel to the headset.
///
/// Every call may suspend on device I/O. Timeouts are the implementation's
/// business; callers only propagate failures.
#[async_trait]
pub trait DeviceController: Send + Sync {
    async fn force_stop(&self, app_id: &str) -> Result<(), BackendError>;

    /// Must report [`BackendError::NotInstalled`] when the package is already
    /// absent.
    async fn uninstall(&self, app_id: &str) -> Result<(), BackendError>;

    async fn install(&self, apk_path: &Path) -> Result<(), BackendError>;

    /// Copy an asset pack from the device into `dest_dir`. `Ok(None)` when the
    /// file does not exist on the device.
    async fn pull_file(
        &self,
        remote_name: &str,
        dest_dir: &Path,
    ) -> Result<Option<PathBuf>, BackendError>;

    /// Replace the asset pack `remote_name` on the device with the local file,
    /// stored under `local_output_name`.
    async fn push_replace(
        &self,
        remote_name: &str,
        local_output_name: &str,
        local_path: &Path,
    ) -> Result<(), BackendError>;

    async fn backup_data(&self) -> Result<PathBuf, BackendError>;

    async fn backup_assets(&self) -> Result<PathBuf, BackendError>;

    async fn restore_data(&self, backup_path: &Path) -> Result<(), BackendError>;

    async fn restore_assets(&self, backup_path: &Path) -> Result<(), BackendError>;
}

/// Fetches a URL into a local file. Retry and mirror policy belong to the
/// implementation.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), BackendError>;
}

/// Applies an opaque binary diff produced by the external diff tool.
#[async_trait]
pub trait PatchApplier: Send + Sync {
    async fn apply_patch(
        &self,
        source: &Path,
        diff: &Path,
        output: &Path,
    ) -> Result<(), BackendError>;
}

/// Host decision point for conditions that are not errors but must not be
/// passed silently.
#[async_trait]
pub trait DecisionPrompter: Send + Sync {
    /// A diff asset was downloaded but the checksum table has no entry for
    /// it. Return `true` to use it unverified.
    async fn confirm_unverified_diff(&self, diff_name: &str) -> bool;
}

/// Prompter that always refuses unverifiable data.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectUnverified;

#[async_trait]
impl DecisionPrompter for RejectUnverified {
    async fn confirm_unverified_diff(&self, diff_name: &str) -> bool {
        log::warn!("Refusing unverified diff {diff_name}");
        false
    }
}

/// The mods installed for the current game, owned by the host's mod manager.
#[async_trait]
pub trait ModRegistry: Send + Sync {
    async fn installed_mods(&self) -> Result<Vec<InstalledMod>, BackendError>;

    async fn enable_mod(&self, id: &str) -> Result<(), BackendError>;
}

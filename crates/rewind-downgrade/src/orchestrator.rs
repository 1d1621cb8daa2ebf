use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};
use rewind_backend::DeviceController;

use crate::error::{DeviceStage, DowngradeError};
use crate::pipeline::PatchedFiles;

/// What happened to the best-effort steps of a version switch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub data_backup: Option<PathBuf>,
    pub assets_backup: Option<PathBuf>,
    pub data_restored: bool,
    pub assets_restored: bool,
    /// Best-effort stages that failed and were skipped.
    pub skipped: Vec<DeviceStage>,
}

/// Replaces the installed package with verified patched files.
///
/// Once the uninstall has started the sequence runs to completion or to its
/// first fatal failure; it is never cancelled halfway.
pub struct InstallOrchestrator {
    device: Arc<dyn DeviceController>,
    app_id: String,
}

impl InstallOrchestrator {
    #[must_use]
    pub fn new(device: Arc<dyn DeviceController>, app_id: impl Into<String>) -> Self {
        Self {
            device,
            app_id: app_id.into(),
        }
    }

    /// # Errors
    /// Returns [`DowngradeError::Device`] tagged with the uninstall, install
    /// or asset push stage. Backup, restore and force-stop failures are logged
    /// and recorded in the report instead.
    pub async fn replace_app(
        &self,
        patched: &PatchedFiles,
    ) -> Result<InstallReport, DowngradeError> {
        let mut report = InstallReport::default();

        if let Err(error) = self.device.force_stop(&self.app_id).await {
            warn!("Failed to stop {} before replacing it: {error}", self.app_id);
            report.skipped.push(DeviceStage::ForceStop);
        }

        info!("Backing up data directory");
        match self.device.backup_data().await {
            Ok(path) => report.data_backup = Some(path),
            Err(error) => {
                error!("Failed to create data backup: {error}");
                report.skipped.push(DeviceStage::BackupData);
            }
        }

        info!("Backing up asset pack directory");
        match self.device.backup_assets().await {
            Ok(path) => report.assets_backup = Some(path),
            Err(error) => {
                error!("Failed to create asset pack backup: {error}");
                report.skipped.push(DeviceStage::BackupAssets);
            }
        }

        match self.device.uninstall(&self.app_id).await {
            Ok(()) => debug!("Uninstalled {}", self.app_id),
            Err(error) if error.is_not_installed() => {
                warn!("{} was already uninstalled, continuing", self.app_id);
            }
            Err(error) => return Err(DowngradeError::device(DeviceStage::Uninstall, error)),
        }

        info!("Installing {}", patched.apk_path.display());
        self.device
            .install(&patched.apk_path)
            .await
            .map_err(|error| {
                error!("Install failed after the original package was removed: {error}");
                DowngradeError::device(DeviceStage::Install, error)
            })?;

        if let Some(backup) = &report.data_backup {
            info!("Restoring data backup");
            match self.device.restore_data(backup).await {
                Ok(()) => report.data_restored = true,
                Err(error) => {
                    error!("Failed to restore data backup {}: {error}", backup.display());
                    report.skipped.push(DeviceStage::RestoreData);
                }
            }
        }

        if let Some(backup) = &report.assets_backup {
            info!("Restoring asset pack backup");
            match self.device.restore_assets(backup).await {
                Ok(()) => report.assets_restored = true,
                Err(error) => {
                    error!("Failed to restore asset pack backup {}: {error}", backup.display());
                    report.skipped.push(DeviceStage::RestoreAssets);
                }
            }
        }

        info!("Pushing {} patched asset packs", patched.assets.len());
        for asset in &patched.assets {
            debug!("Pushing {}", asset.output_name);
            self.device
                .push_replace(&asset.remote_name, &asset.output_name, &asset.path)
                .await
                .map_err(|error| {
                    error!("Failed to push {}: {error}", asset.output_name);
                    DowngradeError::device(DeviceStage::PushAssets, error)
                })?;
        }

        Ok(report)
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, warn};
use rewind_backend::{ApkInfo, DecisionPrompter, DeviceController, FileTransfer, PatchApplier};
use rewind_core::verify_crc32;

use crate::error::{DowngradeError, VerifyStage};
use crate::index::DowngradeConfig;
use crate::model::{AppDiff, DowngradeIndex, FileDiff};

/// Result of preparing files for patching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preparation {
    Ready,
    /// The host declined to use a diff whose checksum is unknown.
    Declined { diff_name: String },
}

/// Sources verified while preparing an application transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransition {
    /// Pulled asset pack for each entry of `obb_diffs`, in the same order.
    pub asset_sources: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionPreparation {
    Ready(PreparedTransition),
    /// The host declined to use a diff whose checksum is unknown.
    Declined { diff_name: String },
}

impl Preparation {
    fn into_declined(self) -> Option<TransitionPreparation> {
        match self {
            Self::Ready => None,
            Self::Declined { diff_name } => Some(TransitionPreparation::Declined { diff_name }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedAsset {
    /// Asset pack name on the device that this output replaces.
    pub remote_name: String,
    pub output_name: String,
    pub path: PathBuf,
}

/// Verified outputs of an application transition, ready to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedFiles {
    pub apk_path: PathBuf,
    pub assets: Vec<PatchedAsset>,
}

/// Verify, fetch and patch individual files inside the working directory.
pub struct DiffPipeline {
    transfer: Arc<dyn FileTransfer>,
    applier: Arc<dyn PatchApplier>,
    prompter: Arc<dyn DecisionPrompter>,
    config: DowngradeConfig,
}

impl DiffPipeline {
    #[must_use]
    pub fn new(
        transfer: Arc<dyn FileTransfer>,
        applier: Arc<dyn PatchApplier>,
        prompter: Arc<dyn DecisionPrompter>,
        config: DowngradeConfig,
    ) -> Self {
        Self {
            transfer,
            applier,
            prompter,
            config,
        }
    }

    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.config.work_dir
    }

    fn work_path(&self, file_name: &str) -> PathBuf {
        self.config.work_dir.join(file_name)
    }

    /// Steps 1-3 for one file: check the source, download the diff and check
    /// the diff.
    ///
    /// # Errors
    /// Returns a corruption error for any checksum mismatch and a download
    /// failure when the diff cannot be fetched.
    pub async fn prepare_file(
        &self,
        diff: &FileDiff,
        source: &Path,
        source_stage: VerifyStage,
        index: &DowngradeIndex,
    ) -> Result<Preparation, DowngradeError> {
        if !verify_crc32(source, diff.file_crc).await? {
            error!(
                "{} ({}) has an unexpected CRC, is it not the original file?",
                diff.file_name,
                source.display()
            );
            return Err(DowngradeError::corrupted(&diff.file_name, source_stage));
        }

        self.fetch_diff(diff, index).await
    }

    async fn fetch_diff(
        &self,
        diff: &FileDiff,
        index: &DowngradeIndex,
    ) -> Result<Preparation, DowngradeError> {
        let diff_path = self.work_path(&diff.diff_name);
        let url = self.config.diff_url(&diff.diff_name);
        info!("Downloading diff {}", diff.diff_name);
        self.transfer
            .download(&url, &diff_path)
            .await
            .map_err(|error| DowngradeError::download_failed(&diff.diff_name, error))?;

        let Some(expected) = index.checksum(&diff.diff_name) else {
            warn!("CRC for diff {} is unknown", diff.diff_name);
            if self.prompter.confirm_unverified_diff(&diff.diff_name).await {
                warn!("Using unverified diff {}", diff.diff_name);
                return Ok(Preparation::Ready);
            }
            return Ok(Preparation::Declined {
                diff_name: diff.diff_name.clone(),
            });
        };

        if !verify_crc32(&diff_path, expected).await? {
            error!("Diff {} has an unexpected CRC", diff.diff_name);
            return Err(DowngradeError::corrupted(&diff.diff_name, VerifyStage::Diff));
        }

        Ok(Preparation::Ready)
    }

    /// Steps 4-5 for one file: apply the diff and check the output. The
    /// source is `source_override` or the file of the same name in the working
    /// directory. When the output would overwrite the source, the applier
    /// writes to a staging file that replaces the source once verified.
    ///
    /// # Errors
    /// Returns a patch failure when the applier fails and a corruption error
    /// when the output does not match its expected size or CRC.
    pub async fn patch_file(
        &self,
        diff: &FileDiff,
        source_override: Option<&Path>,
    ) -> Result<PathBuf, DowngradeError> {
        info!("Patching {} with {}", diff.file_name, diff.diff_name);
        let diff_path = self.work_path(&diff.diff_name);
        let source =
            source_override.map_or_else(|| self.work_path(&diff.file_name), Path::to_path_buf);
        let output = self.work_path(&diff.output_file_name);
        let staged = if output == source {
            debug!("{} is patched in place, staging the output", diff.file_name);
            self.work_path(&format!("{}.patching", diff.output_file_name))
        } else {
            output.clone()
        };

        self.applier
            .apply_patch(&source, &diff_path, &staged)
            .await
            .map_err(|error| DowngradeError::PatchFailed {
                file: diff.file_name.clone(),
                details: error.to_string(),
            })?;

        let size = tokio::fs::metadata(&staged)
            .await
            .map_err(|error| DowngradeError::io(&staged, error))?
            .len();
        if size != diff.output_size {
            error!(
                "Patched {} is {size} bytes, expected {}",
                diff.output_file_name, diff.output_size
            );
            return Err(DowngradeError::corrupted(
                &diff.output_file_name,
                VerifyStage::Output,
            ));
        }

        if !verify_crc32(&staged, diff.output_crc).await? {
            error!("Patched {} has an unexpected CRC", diff.output_file_name);
            return Err(DowngradeError::corrupted(
                &diff.output_file_name,
                VerifyStage::Output,
            ));
        }

        if staged != output {
            tokio::fs::rename(&staged, &output)
                .await
                .map_err(|error| DowngradeError::io(&output, error))?;
        }

        debug!("Patched {} verified", diff.output_file_name);
        Ok(output)
    }

    /// Prepare every file of `app_diff`: the installed APK first, then each
    /// asset pack pulled fresh from the device. Nothing on the device is
    /// changed.
    ///
    /// # Errors
    /// Any verification, download or pull failure aborts the preparation.
    pub async fn prepare_transition(
        &self,
        apk: &ApkInfo,
        app_diff: &AppDiff,
        index: &DowngradeIndex,
        device: &dyn DeviceController,
    ) -> Result<TransitionPreparation, DowngradeError> {
        tokio::fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(|error| DowngradeError::io(&self.config.work_dir, error))?;

        let apk_ready = self
            .prepare_file(&app_diff.apk_diff, apk.path(), VerifyStage::Source, index)
            .await?;
        if let Some(declined) = apk_ready.into_declined() {
            return Ok(declined);
        }

        let mut asset_sources = Vec::with_capacity(app_diff.obb_diffs.len());
        for obb_diff in &app_diff.obb_diffs {
            let pulled = device
                .pull_file(&obb_diff.file_name, &self.config.work_dir)
                .await
                .map_err(|error| {
                    error!("Failed to pull {} from the device: {error}", obb_diff.file_name);
                    DowngradeError::download_failed(&obb_diff.file_name, error)
                })?;
            let Some(source) = pulled else {
                error!("{} was not found on the device", obb_diff.file_name);
                return Err(DowngradeError::AssetMissing {
                    file: obb_diff.file_name.clone(),
                });
            };

            let ready = self
                .prepare_file(obb_diff, &source, VerifyStage::DeviceAsset, index)
                .await?;
            if let Some(declined) = ready.into_declined() {
                return Ok(declined);
            }
            asset_sources.push(source);
        }

        Ok(TransitionPreparation::Ready(PreparedTransition { asset_sources }))
    }

    /// Patch every prepared file of `app_diff`, reading each asset pack from
    /// the source verified by [`prepare_transition`](Self::prepare_transition).
    ///
    /// # Errors
    /// See [`patch_file`](Self::patch_file). An asset pack without a prepared
    /// source fails with [`DowngradeError::AssetMissing`].
    pub async fn patch_transition(
        &self,
        apk: &ApkInfo,
        app_diff: &AppDiff,
        prepared: &PreparedTransition,
    ) -> Result<PatchedFiles, DowngradeError> {
        let apk_path = self.patch_file(&app_diff.apk_diff, Some(apk.path())).await?;

        let mut assets = Vec::with_capacity(app_diff.obb_diffs.len());
        for (position, obb_diff) in app_diff.obb_diffs.iter().enumerate() {
            let Some(source) = prepared.asset_sources.get(position) else {
                return Err(DowngradeError::AssetMissing {
                    file: obb_diff.file_name.clone(),
                });
            };
            let path = self.patch_file(obb_diff, Some(source)).await?;
            assets.push(PatchedAsset {
                remote_name: obb_diff.file_name.clone(),
                output_name: obb_diff.output_file_name.clone(),
                path,
            });
        }

        Ok(PatchedFiles { apk_path, assets })
    }
}

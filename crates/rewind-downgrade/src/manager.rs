use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info, warn};
use rewind_backend::{
    ApkInfo, DecisionPrompter, DeviceController, FileTransfer, PatchApplier,
};
use rewind_core::HttpTransport;
use semver::Version;

use crate::error::DowngradeError;
use crate::index::{BEAT_SABER_PACKAGE_ID, DowngradeConfig, DowngradeIndexResolver};
use crate::model::AppDiff;
use crate::orchestrator::{InstallOrchestrator, InstallReport};
use crate::pipeline::{DiffPipeline, TransitionPreparation};

/// Last game version before the asset layout changed; nothing older can be
/// diffed from.
pub const MIN_DIFFABLE_VERSION: Version = Version::new(1, 34, 2);

/// Host capabilities a downgrade needs.
#[derive(Clone)]
pub struct DowngradeCapabilities {
    pub device: Arc<dyn DeviceController>,
    pub transfer: Arc<dyn FileTransfer>,
    pub applier: Arc<dyn PatchApplier>,
    pub prompter: Arc<dyn DecisionPrompter>,
}

/// The package switch that just happened. The host replaces its installed
/// app state with [`installed_apk`](Self::installed_apk).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSwitch {
    pub from_version: String,
    pub to_version: String,
    pub apk_path: PathBuf,
    pub report: InstallReport,
}

impl VersionSwitch {
    /// The freshly installed, unmodded package.
    #[must_use]
    pub fn installed_apk(&self, is_64_bit: bool) -> ApkInfo {
        ApkInfo::new(self.to_version.clone(), None, is_64_bit, self.apk_path.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DowngradeOutcome {
    Completed(VersionSwitch),
    /// The host declined an unverifiable diff; the device was not touched.
    Cancelled { diff_name: String },
}

pub struct DowngradeManager {
    resolver: Arc<DowngradeIndexResolver>,
    pipeline: DiffPipeline,
    orchestrator: InstallOrchestrator,
    device: Arc<dyn DeviceController>,
}

impl DowngradeManager {
    #[must_use]
    pub fn new(
        transport: HttpTransport,
        config: DowngradeConfig,
        capabilities: DowngradeCapabilities,
    ) -> Self {
        let resolver = Arc::new(DowngradeIndexResolver::new(transport, &config));
        Self::with_resolver(resolver, config, capabilities)
    }

    #[must_use]
    pub fn with_resolver(
        resolver: Arc<DowngradeIndexResolver>,
        config: DowngradeConfig,
        capabilities: DowngradeCapabilities,
    ) -> Self {
        let DowngradeCapabilities {
            device,
            transfer,
            applier,
            prompter,
        } = capabilities;
        let orchestrator = InstallOrchestrator::new(Arc::clone(&device), config.app_id.clone());
        Self {
            resolver,
            pipeline: DiffPipeline::new(transfer, applier, prompter, config),
            orchestrator,
            device,
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<DowngradeIndexResolver> {
        &self.resolver
    }

    /// Transitions available from `from_version`, newest target first.
    ///
    /// # Errors
    /// Returns an error when the index cannot be loaded.
    pub async fn available_paths(
        &self,
        from_version: Option<&str>,
        refresh: bool,
    ) -> Result<Vec<AppDiff>, DowngradeError> {
        match from_version {
            Some(version) => self.resolver.available_paths(version, refresh).await,
            None => Ok(Vec::new()),
        }
    }

    /// Switch the installed app to `app_diff.to_version`.
    ///
    /// Every file is verified and patched before the device is touched. The
    /// caller must hold the operation lock for the whole call.
    ///
    /// # Errors
    /// Returns [`DowngradeError::NotInstalled`] or
    /// [`DowngradeError::VersionMismatch`] before any I/O, and otherwise the
    /// first download, verification, patch or fatal device failure.
    pub async fn downgrade(
        &self,
        installed: Option<&ApkInfo>,
        app_diff: &AppDiff,
    ) -> Result<DowngradeOutcome, DowngradeError> {
        let Some(apk) = installed else {
            error!("Cannot downgrade an app that is not installed");
            return Err(DowngradeError::NotInstalled);
        };

        if app_diff.from_version != apk.version() {
            warn!(
                "Installed version {} does not match downgrade source {}",
                apk.version(),
                app_diff.from_version
            );
            return Err(DowngradeError::VersionMismatch {
                installed: apk.version().to_string(),
                expected: app_diff.from_version.clone(),
            });
        }

        info!(
            "Starting downgrade from {} to {}",
            app_diff.from_version, app_diff.to_version
        );
        let index = self.resolver.index(false).await?;

        let prepared = match self
            .pipeline
            .prepare_transition(apk, app_diff, &index, self.device.as_ref())
            .await?
        {
            TransitionPreparation::Ready(prepared) => prepared,
            TransitionPreparation::Declined { diff_name } => {
                warn!("Downgrade cancelled, {diff_name} could not be verified");
                return Ok(DowngradeOutcome::Cancelled { diff_name });
            }
        };

        let patched = self
            .pipeline
            .patch_transition(apk, app_diff, &prepared)
            .await?;
        let report = self.orchestrator.replace_app(&patched).await?;

        info!("Downgraded to {}", app_diff.to_version);
        Ok(DowngradeOutcome::Completed(VersionSwitch {
            from_version: app_diff.from_version.clone(),
            to_version: app_diff.to_version.clone(),
            apk_path: patched.apk_path,
            report,
        }))
    }
}

/// Whether downgrading can be offered at all for the installed app. Says
/// nothing about whether the index has paths for its version.
#[must_use]
pub fn downgrade_feature_available(app: Option<&ApkInfo>, package_id: &str) -> bool {
    package_id == BEAT_SABER_PACKAGE_ID
        && app.is_some_and(|app| {
            !app.is_modded()
                && app
                    .sem_version()
                    .is_some_and(|version| version.cmp_precedence(&MIN_DIFFABLE_VERSION).is_gt())
        })
}

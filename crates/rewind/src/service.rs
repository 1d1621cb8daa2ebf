use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info, warn};
use rewind_backend::{ApkInfo, DecisionPrompter, DeviceController, ModRegistry, PatchApplier};
use rewind_core::{HttpFileTransfer, HttpTransport, MirrorTable};
use rewind_coremods::{CoreModDescriptor, CoreModResolver, CoreModStatus};
use rewind_downgrade::{
    AppDiff, DowngradeCapabilities, DowngradeManager, DowngradeOutcome,
    downgrade_feature_available,
};
use rewind_platform::AppPaths;

use crate::error::AppError;
use crate::logging::set_logging_enabled;
use crate::operation::OperationLock;
use crate::selection::{TargetSelection, select_target};
use crate::settings::AppSettings;

/// What the host provides: the headset, the patch tool, the user and the mod
/// manager.
#[derive(Clone)]
pub struct HostCapabilities {
    pub device: Arc<dyn DeviceController>,
    pub applier: Arc<dyn PatchApplier>,
    pub prompter: Arc<dyn DecisionPrompter>,
    pub registry: Arc<dyn ModRegistry>,
}

/// Everything a host needs to downgrade and check core mods, built once from
/// settings.
pub struct RewindService {
    settings: AppSettings,
    paths: AppPaths,
    mirrors: Option<Arc<MirrorTable>>,
    downgrades: DowngradeManager,
    core_mods: CoreModResolver,
    registry: Arc<dyn ModRegistry>,
    lock: OperationLock,
}

impl RewindService {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        settings: AppSettings,
        paths: AppPaths,
        capabilities: HostCapabilities,
    ) -> Result<Self, AppError> {
        let transport = HttpTransport::new(settings.http_timeout())
            .map_err(|error| AppError::Message(format!("Failed to build HTTP client: {error}")))?;

        let mirrors = settings.use_mirror_download.then(|| {
            Arc::new(MirrorTable::new(transport.clone(), settings.mirror_config()))
        });

        let mut transfer = HttpFileTransfer::new(transport.clone())
            .with_retry_delays(settings.retry_delays_secs.clone())
            .with_timeout(settings.download_timeout());
        if let Some(mirrors) = &mirrors {
            transfer = transfer.with_mirrors(Arc::clone(mirrors));
        }

        let HostCapabilities {
            device,
            applier,
            prompter,
            registry,
        } = capabilities;

        let downgrades = DowngradeManager::new(
            transport.clone(),
            settings.downgrade_config(&paths),
            DowngradeCapabilities {
                device,
                transfer: Arc::new(transfer),
                applier,
                prompter,
            },
        );
        let core_mods = CoreModResolver::new(transport, &settings.core_mods_config());
        let lock = OperationLock::new(paths.operation_lock_file());

        Ok(Self {
            settings,
            paths,
            mirrors,
            downgrades,
            core_mods,
            registry,
            lock,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    #[must_use]
    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    #[must_use]
    pub fn operation_lock(&self) -> &OperationLock {
        &self.lock
    }

    /// Warm both indexes in the background. Must be called from within a
    /// Tokio runtime.
    pub fn init(&self) {
        debug!("Warming downgrade and core mod indexes");
        self.downgrades.resolver().init();
        self.core_mods.init();
    }

    /// Persist `settings`. Endpoints and timeouts apply to the next service
    /// built; the logging switch applies immediately.
    ///
    /// # Errors
    /// Returns an error if the settings file cannot be written.
    pub fn save_settings(&mut self, settings: AppSettings) -> Result<(), AppError> {
        settings
            .save(&self.paths)
            .map_err(AppError::settings_save_failed)?;
        set_logging_enabled(settings.debug_logging);
        self.settings = settings;
        Ok(())
    }

    #[must_use]
    pub fn downgrade_available(&self, installed: Option<&ApkInfo>) -> bool {
        downgrade_feature_available(installed, &self.settings.app_id)
    }

    /// # Errors
    /// Returns an error when the downgrade index cannot be loaded.
    pub async fn available_paths(
        &self,
        installed: Option<&ApkInfo>,
        refresh: bool,
    ) -> Result<Vec<AppDiff>, AppError> {
        Ok(self
            .downgrades
            .available_paths(installed.map(ApkInfo::version), refresh)
            .await?)
    }

    /// Decide which version to patch. Indexes are only fetched when the
    /// decision needs them.
    ///
    /// # Errors
    /// Returns an error when a required index cannot be loaded.
    pub async fn select_target(
        &self,
        installed: &ApkInfo,
        refresh: bool,
    ) -> Result<TargetSelection, AppError> {
        let options = self.settings.selection_options();
        let current = installed.version();
        let has_core_mods = self.core_mods.is_available(current, refresh).await?;

        let needs_paths = options.allow_downgrade
            && !(options.auto_downgrade && has_core_mods)
            && self.downgrade_available(Some(installed));
        let paths = if needs_paths {
            self.downgrades
                .available_paths(Some(current), refresh)
                .await?
        } else {
            Vec::new()
        };

        let moddable_versions = if paths.is_empty() || options.expert_mode {
            HashSet::new()
        } else {
            self.core_mods.available_versions(false).await?
        };

        let selection = select_target(
            current,
            has_core_mods,
            &paths,
            &moddable_versions,
            options,
        );
        info!("Target for {current}: {selection:?}");
        Ok(selection)
    }

    /// Downgrade the installed app, holding the operation lock throughout.
    ///
    /// # Errors
    /// Returns [`AppError::OperationInProgress`] if another operation holds
    /// the lock, or the mapped downgrade failure.
    pub async fn downgrade(
        &self,
        installed: Option<&ApkInfo>,
        app_diff: &AppDiff,
    ) -> Result<DowngradeOutcome, AppError> {
        let _guard = self.lock.try_acquire("downgrade")?;
        let outcome = self.downgrades.downgrade(installed, app_diff).await;
        match &outcome {
            Ok(DowngradeOutcome::Completed(switch)) => {
                info!("Switched {} -> {}", switch.from_version, switch.to_version);
            }
            Ok(DowngradeOutcome::Cancelled { diff_name }) => {
                warn!("Downgrade cancelled at {diff_name}");
            }
            Err(error) => warn!("Downgrade to {} failed: {error}", app_diff.to_version),
        }
        Ok(outcome?)
    }

    /// # Errors
    /// Returns an error when the core mod index cannot be loaded.
    pub async fn core_mods_for(
        &self,
        game_version: &str,
        refresh: bool,
    ) -> Result<Vec<CoreModDescriptor>, AppError> {
        Ok(self.core_mods.core_mods_for(game_version, refresh).await?)
    }

    /// Check installed core mods, enabling any that are switched off.
    ///
    /// # Errors
    /// Returns [`AppError::OperationInProgress`] while another operation runs,
    /// or the mapped index or registry failure.
    pub async fn verify_core_mods(
        &self,
        installed: Option<&ApkInfo>,
        refresh: bool,
    ) -> Result<CoreModStatus, AppError> {
        let _guard = self.lock.try_acquire("core mod check")?;
        Ok(self
            .core_mods
            .verify(
                installed.map(ApkInfo::version),
                self.registry.as_ref(),
                refresh,
            )
            .await?)
    }

    pub fn dispose(&self) {
        self.downgrades.resolver().dispose();
        self.core_mods.dispose();
        if let Some(mirrors) = &self.mirrors {
            mirrors.dispose();
        }
    }
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rewind_backend::{BackendError, DeviceController};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ForceStop,
    Uninstall,
    Install(PathBuf),
    Pull(String),
    Push(String, String),
    BackupData,
    BackupAssets,
    RestoreData,
    RestoreAssets,
}

/// Device double that records every call. Asset packs served by
/// `pull_file` come from `assets` and land under `pulled_name_prefix` plus
/// their remote name.
#[derive(Default)]
pub struct FakeDevice {
    pub calls: Mutex<Vec<Call>>,
    pub assets: HashMap<String, Vec<u8>>,
    pub fail_backup_data: bool,
    pub fail_push: bool,
    pub uninstall_error: Option<BackendError>,
    pub install_error: Option<BackendError>,
    pub pull_error: Option<BackendError>,
    pub pulled_name_prefix: Option<&'static str>,
}

impl FakeDevice {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }

    pub fn is_mutated(&self) -> bool {
        self.calls()
            .iter()
            .any(|call| !matches!(call, Call::Pull(_)))
    }
}

#[async_trait]
impl DeviceController for FakeDevice {
    async fn force_stop(&self, _app_id: &str) -> Result<(), BackendError> {
        self.record(Call::ForceStop);
        Ok(())
    }

    async fn uninstall(&self, _app_id: &str) -> Result<(), BackendError> {
        self.record(Call::Uninstall);
        self.uninstall_error.clone().map_or(Ok(()), Err)
    }

    async fn install(&self, apk_path: &Path) -> Result<(), BackendError> {
        self.record(Call::Install(apk_path.to_path_buf()));
        self.install_error.clone().map_or(Ok(()), Err)
    }

    async fn pull_file(
        &self,
        remote_name: &str,
        dest_dir: &Path,
    ) -> Result<Option<PathBuf>, BackendError> {
        self.record(Call::Pull(remote_name.to_string()));
        if let Some(error) = &self.pull_error {
            return Err(error.clone());
        }
        let Some(contents) = self.assets.get(remote_name) else {
            return Ok(None);
        };
        let dest = dest_dir.join(format!(
            "{}{remote_name}",
            self.pulled_name_prefix.unwrap_or_default()
        ));
        std::fs::write(&dest, contents)?;
        Ok(Some(dest))
    }

    async fn push_replace(
        &self,
        remote_name: &str,
        local_output_name: &str,
        _local_path: &Path,
    ) -> Result<(), BackendError> {
        self.record(Call::Push(
            remote_name.to_string(),
            local_output_name.to_string(),
        ));
        if self.fail_push {
            return Err(BackendError::command_failed("No space left on device"));
        }
        Ok(())
    }

    async fn backup_data(&self) -> Result<PathBuf, BackendError> {
        self.record(Call::BackupData);
        if self.fail_backup_data {
            return Err(BackendError::command_failed("Permission denied"));
        }
        Ok(PathBuf::from("/backups/data"))
    }

    async fn backup_assets(&self) -> Result<PathBuf, BackendError> {
        self.record(Call::BackupAssets);
        Ok(PathBuf::from("/backups/obb"))
    }

    async fn restore_data(&self, _backup_path: &Path) -> Result<(), BackendError> {
        self.record(Call::RestoreData);
        Ok(())
    }

    async fn restore_assets(&self, _backup_path: &Path) -> Result<(), BackendError> {
        self.record(Call::RestoreAssets);
        Ok(())
    }
}

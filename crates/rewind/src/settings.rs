use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::TimeDelta;
use log::warn;
use rewind_core::{DEFAULT_MIRROR_REFRESH_MINUTES, DEFAULT_MIRROR_TABLE_URL, MirrorConfig};
use rewind_coremods::{CoreModsConfig, DEFAULT_CORE_MODS_URL};
use rewind_downgrade::{
    BEAT_SABER_PACKAGE_ID, DEFAULT_DIFF_BASE_URL, DEFAULT_DIFF_CHECKSUMS_URL,
    DEFAULT_DIFF_INDEX_URL, DowngradeConfig,
};
use rewind_platform::AppPaths;
use serde::{Deserialize, Serialize};

use crate::selection::SelectionOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_id")]
    pub app_id: String,

    #[serde(default = "default_diff_index_url")]
    pub diff_index_url: String,

    #[serde(default = "default_diff_checksums_url")]
    pub diff_checksums_url: String,

    #[serde(default = "default_diff_base_url")]
    pub diff_base_url: String,

    #[serde(default = "default_core_mods_url")]
    pub core_mods_url: String,

    #[serde(default = "default_mirror_table_url")]
    pub mirror_table_url: String,

    #[serde(default)]
    pub use_mirror_download: bool,

    #[serde(default = "default_mirror_refresh_minutes")]
    pub mirror_refresh_minutes: i64,

    #[serde(default = "default_true")]
    pub auto_downgrade: bool,

    #[serde(default = "default_true")]
    pub allow_downgrade: bool,

    #[serde(default)]
    pub expert_mode: bool,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    #[serde(default = "default_retry_delays")]
    pub retry_delays_secs: Vec<u64>,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_true() -> bool {
    true
}

fn default_app_id() -> String {
    BEAT_SABER_PACKAGE_ID.to_string()
}

fn default_diff_index_url() -> String {
    DEFAULT_DIFF_INDEX_URL.to_string()
}

fn default_diff_checksums_url() -> String {
    DEFAULT_DIFF_CHECKSUMS_URL.to_string()
}

fn default_diff_base_url() -> String {
    DEFAULT_DIFF_BASE_URL.to_string()
}

fn default_core_mods_url() -> String {
    DEFAULT_CORE_MODS_URL.to_string()
}

fn default_mirror_table_url() -> String {
    DEFAULT_MIRROR_TABLE_URL.to_string()
}

fn default_mirror_refresh_minutes() -> i64 {
    DEFAULT_MIRROR_REFRESH_MINUTES
}

fn default_http_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    1800
}

fn default_retry_delays() -> Vec<u64> {
    vec![0, 2, 5]
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            diff_index_url: default_diff_index_url(),
            diff_checksums_url: default_diff_checksums_url(),
            diff_base_url: default_diff_base_url(),
            core_mods_url: default_core_mods_url(),
            mirror_table_url: default_mirror_table_url(),
            use_mirror_download: false,
            mirror_refresh_minutes: default_mirror_refresh_minutes(),
            auto_downgrade: true,
            allow_downgrade: true,
            expert_mode: false,
            http_timeout_secs: default_http_timeout(),
            download_timeout_secs: default_download_timeout(),
            retry_delays_secs: default_retry_delays(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl AppSettings {
    /// Settings from `paths`, or defaults when the file is absent or invalid.
    #[must_use]
    pub fn load(paths: &AppPaths) -> Self {
        Self::load_from(&paths.settings_file())
    }

    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(error) => {
                warn!("Failed to read settings {}: {error}", path.display());
                return Self::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|error| {
            warn!("Ignoring invalid settings {}: {error}", path.display());
            Self::default()
        })
    }

    /// # Errors
    /// Returns an error if the directories cannot be created or the file
    /// cannot be written.
    pub fn save(&self, paths: &AppPaths) -> std::io::Result<()> {
        paths.ensure_dirs()?;
        self.save_to(&paths.settings_file())
    }

    /// Write through a temporary file in the same directory so a crash never
    /// leaves a truncated settings file behind.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written or renamed into place.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let parent = path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "settings path has no parent")
        })?;
        let content = serde_json::to_vec_pretty(self)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(&content)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|error| error.error)?;
        Ok(())
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    #[must_use]
    pub fn downgrade_config(&self, paths: &AppPaths) -> DowngradeConfig {
        DowngradeConfig {
            app_id: self.app_id.clone(),
            index_url: self.diff_index_url.clone(),
            checksums_url: self.diff_checksums_url.clone(),
            diff_base_url: self.diff_base_url.clone(),
            work_dir: paths.downgrade_dir(),
        }
    }

    #[must_use]
    pub fn core_mods_config(&self) -> CoreModsConfig {
        CoreModsConfig {
            index_url: self.core_mods_url.clone(),
        }
    }

    #[must_use]
    pub fn mirror_config(&self) -> MirrorConfig {
        MirrorConfig {
            table_url: self.mirror_table_url.clone(),
            refresh_interval: TimeDelta::try_minutes(self.mirror_refresh_minutes.max(0))
                .unwrap_or(TimeDelta::MAX),
            ..MirrorConfig::default()
        }
    }

    #[must_use]
    pub fn selection_options(&self) -> SelectionOptions {
        SelectionOptions {
            auto_downgrade: self.auto_downgrade,
            allow_downgrade: self.allow_downgrade,
            expert_mode: self.expert_mode,
        }
    }
}

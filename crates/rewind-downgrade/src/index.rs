use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use rewind_core::{FetchError, HttpTransport, Loader, SharedCache};
use tokio_util::sync::CancellationToken;

use crate::error::DowngradeError;
use crate::model::{AppDiff, DowngradeIndex};

pub const BEAT_SABER_PACKAGE_ID: &str = "com.beatgames.beatsaber";
pub const DEFAULT_DIFF_BASE_URL: &str =
    "https://github.com/Lauriethefish/mbf-diffs/releases/download/1.0.0/";
pub const DEFAULT_DIFF_INDEX_URL: &str =
    "https://github.com/Lauriethefish/mbf-diffs/releases/download/1.0.0/index.json";
pub const DEFAULT_DIFF_CHECKSUMS_URL: &str =
    "https://github.com/Lauriethefish/mbf-diffs/releases/download/1.0.0/assets.crc32.json";

#[derive(Debug, Clone)]
pub struct DowngradeConfig {
    pub app_id: String,
    pub index_url: String,
    pub checksums_url: String,
    /// Prefix that diff asset names are appended to.
    pub diff_base_url: String,
    /// Scratch directory for pulled sources, diffs and patched outputs.
    pub work_dir: PathBuf,
}

impl DowngradeConfig {
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_id: BEAT_SABER_PACKAGE_ID.to_string(),
            index_url: DEFAULT_DIFF_INDEX_URL.to_string(),
            checksums_url: DEFAULT_DIFF_CHECKSUMS_URL.to_string(),
            diff_base_url: DEFAULT_DIFF_BASE_URL.to_string(),
            work_dir: work_dir.into(),
        }
    }

    #[must_use]
    pub fn diff_url(&self, diff_name: &str) -> String {
        format!("{}{diff_name}", self.diff_base_url)
    }
}

struct DowngradeIndexLoader {
    transport: HttpTransport,
    index_url: String,
    checksums_url: String,
}

#[async_trait]
impl Loader<DowngradeIndex> for DowngradeIndexLoader {
    type Error = FetchError;

    fn name(&self) -> &'static str {
        "downgrade index"
    }

    async fn load(
        &self,
        _cancel: CancellationToken,
        _previous: Option<Arc<DowngradeIndex>>,
    ) -> Result<DowngradeIndex, FetchError> {
        info!("Loading downgrade index");
        let (diffs, checksums) = tokio::try_join!(
            self.transport.fetch_json::<Vec<AppDiff>>(&self.index_url),
            self.transport
                .fetch_json::<HashMap<String, u32>>(&self.checksums_url),
        )?;

        let index = DowngradeIndex::build(diffs, checksums);
        debug!(
            "Loaded {} app diffs from {} versions and {} checksums",
            index.diff_count(),
            index.paths.len(),
            index.checksums.len()
        );
        Ok(index)
    }
}

/// Cached view of the remote diff index.
pub struct DowngradeIndexResolver {
    cache: Arc<SharedCache<DowngradeIndex, FetchError>>,
}

impl DowngradeIndexResolver {
    #[must_use]
    pub fn new(transport: HttpTransport, config: &DowngradeConfig) -> Self {
        Self {
            cache: Arc::new(SharedCache::new(DowngradeIndexLoader {
                transport,
                index_url: config.index_url.clone(),
                checksums_url: config.checksums_url.clone(),
            })),
        }
    }

    /// Every transition starting at `from_version`, newest target first.
    /// Blank or unknown versions have none.
    ///
    /// # Errors
    /// Returns an error when the index cannot be loaded.
    pub async fn available_paths(
        &self,
        from_version: &str,
        refresh: bool,
    ) -> Result<Vec<AppDiff>, DowngradeError> {
        if from_version.trim().is_empty() {
            return Ok(Vec::new());
        }

        let index = self.index(refresh).await?;
        Ok(index.paths_from(from_version).to_vec())
    }

    /// # Errors
    /// Returns an error when the index cannot be loaded.
    pub async fn index(&self, refresh: bool) -> Result<Arc<DowngradeIndex>, DowngradeError> {
        self.cache.get_or_load(refresh).await.map_err(DowngradeError::from)
    }

    /// Start loading in the background.
    pub fn init(&self) {
        self.cache.init();
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<DowngradeIndex>> {
        self.cache.snapshot()
    }

    pub fn dispose(&self) {
        self.cache.dispose();
    }
}

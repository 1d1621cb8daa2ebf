use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, warn};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::cache::{Loader, SharedCache};
use crate::http::{FetchError, HttpTransport};

pub const DEFAULT_MIRROR_TABLE_URL: &str = "https://bs.wgzeyu.com/localization/mods.json";
pub const DEFAULT_MIRROR_REFRESH_MINUTES: i64 = 5;

#[derive(Debug, Deserialize)]
struct MirrorEntry {
    #[serde(rename = "mirrorUrl")]
    mirror_url: Option<String>,
}

/// Known download mirrors keyed by the original URL.
#[derive(Debug, Clone, Default)]
pub struct MirrorSnapshot {
    pub mirrors: HashMap<String, String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl MirrorSnapshot {
    fn is_stale(&self, now: DateTime<Utc>, interval: TimeDelta) -> bool {
        self.fetched_at
            .is_none_or(|fetched_at| now - fetched_at >= interval)
    }
}

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub table_url: String,
    pub refresh_interval: TimeDelta,
    /// Mirrors that are always known, used when the table has no entry.
    pub static_mirrors: HashMap<String, String>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            table_url: DEFAULT_MIRROR_TABLE_URL.to_string(),
            refresh_interval: TimeDelta::minutes(DEFAULT_MIRROR_REFRESH_MINUTES),
            static_mirrors: HashMap::new(),
        }
    }
}

struct MirrorLoader {
    transport: HttpTransport,
    url: String,
}

#[async_trait]
impl Loader<MirrorSnapshot> for MirrorLoader {
    type Error = FetchError;

    fn name(&self) -> &'static str {
        "download mirror table"
    }

    async fn load(
        &self,
        _cancel: CancellationToken,
        previous: Option<Arc<MirrorSnapshot>>,
    ) -> Result<MirrorSnapshot, FetchError> {
        let table: HashMap<String, MirrorEntry> = self.transport.fetch_json(&self.url).await?;

        // New entries are layered over what we already knew.
        let mut mirrors = previous
            .map(|snapshot| snapshot.mirrors.clone())
            .unwrap_or_default();
        for (original, entry) in table {
            if let Some(mirror_url) = entry.mirror_url.filter(|url| !url.is_empty()) {
                mirrors.insert(original, mirror_url);
            }
        }

        debug!("Mirror table now has {} entries", mirrors.len());
        Ok(MirrorSnapshot {
            mirrors,
            fetched_at: Some(Utc::now()),
        })
    }
}

/// Rewrites download URLs to regional mirrors.
pub struct MirrorTable {
    cache: SharedCache<MirrorSnapshot, FetchError>,
    config: MirrorConfig,
}

impl MirrorTable {
    #[must_use]
    pub fn new(transport: HttpTransport, config: MirrorConfig) -> Self {
        let loader = MirrorLoader {
            transport,
            url: config.table_url.clone(),
        };
        Self {
            cache: SharedCache::new(loader),
            config,
        }
    }

    /// The URL to download `original` from. Never fails: when the table
    /// cannot be refreshed the last good copy is used, then the static
    /// mirrors, then `original` itself.
    pub async fn mirror_url(&self, original: &str) -> String {
        let snapshot = match self.cache.snapshot() {
            Some(snapshot)
                if !snapshot.is_stale(Utc::now(), self.config.refresh_interval) =>
            {
                Some(snapshot)
            }
            _ => match self.cache.refresh().await {
                Ok(snapshot) => Some(snapshot),
                Err(error) => {
                    warn!("Failed to refresh mirror table, using last known copy: {error}");
                    self.cache.snapshot()
                }
            },
        };

        if let Some(mirror) = snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.mirrors.get(original))
        {
            debug!("Using mirror {mirror} for {original}");
            return mirror.clone();
        }

        if let Some(mirror) = self.config.static_mirrors.get(original) {
            debug!("Using static mirror {mirror} for {original}");
            return mirror.clone();
        }

        original.to_string()
    }

    pub fn dispose(&self) {
        self.cache.dispose();
    }
}
